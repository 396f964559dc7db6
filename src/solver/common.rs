//! Shared driver plumbing: validation, initial residual, run bookkeeping.

use std::time::Instant;

use super::{SolverParams, SolverStatus};
use crate::array::{Array, MemLocation};
use crate::error::{Error, Result};
use crate::ops::SparsrOps;
use crate::runtime::{Runtime, RuntimeClient};
use crate::sparse::{SparseMatrix, SparseStorage};

/// Per-run constants every driver carries: entry timestamp and the
/// stopping floor `max(rtol·‖b‖, atol)`.
pub(crate) struct RunState {
    pub started: Instant,
    pub floor: f64,
}

impl RunState {
    pub fn converged(&self, res: f64) -> bool {
        res <= self.floor
    }
}

/// Operator checks common to every driver: CSR or COO, device-resident,
/// square, float element type. Returns the system size.
pub(crate) fn validate_operator<R: Runtime>(
    a: &SparseMatrix<R>,
    op: &'static str,
) -> Result<usize> {
    match a {
        SparseMatrix::Csr(_) | SparseMatrix::Coo(_) => {}
        other => {
            return Err(Error::UnsupportedFormat {
                format: other.format(),
                op,
            })
        }
    }
    if a.location() != MemLocation::Device {
        return Err(Error::UnsupportedLocation {
            op,
            required: "device",
        });
    }
    let [nrows, ncols] = a.shape();
    if nrows != ncols {
        return Err(Error::ShapeMismatch {
            expected: vec![nrows, nrows],
            got: vec![nrows, ncols],
        });
    }
    if !a.dtype().is_float() {
        return Err(Error::UnsupportedDType {
            dtype: a.dtype(),
            op,
        });
    }
    Ok(nrows)
}

/// Full single-RHS system validation: operator checks plus conforming,
/// device-resident `b` and `x`.
pub(crate) fn validate_system<R: Runtime>(
    a: &SparseMatrix<R>,
    b: &Array<R>,
    x: &Array<R>,
    op: &'static str,
) -> Result<usize> {
    let n = validate_operator(a, op)?;
    for v in [b, x] {
        if v.len() != n {
            return Err(Error::ShapeMismatch {
                expected: vec![n],
                got: vec![v.len()],
            });
        }
        if v.dtype() != a.dtype() {
            return Err(Error::DTypeMismatch {
                lhs: a.dtype(),
                rhs: v.dtype(),
            });
        }
        if v.location() != MemLocation::Device {
            return Err(Error::UnsupportedLocation {
                op,
                required: "device",
            });
        }
    }
    Ok(n)
}

/// Driver entry: validate, reset feedback, form `r₀ = b − A·x₀`, seed the
/// feedback fields, and record the entry residual. One SpMV.
pub(crate) fn begin<R, C>(
    client: &C,
    a: &SparseMatrix<R>,
    b: &Array<R>,
    x: &Array<R>,
    params: &mut SolverParams,
    op: &'static str,
) -> Result<(RunState, Array<R>)>
where
    R: Runtime,
    C: RuntimeClient<R> + SparsrOps<R>,
{
    validate_system(a, b, x, op)?;
    params.reset_feedback();
    let started = Instant::now();

    let bnorm = client.nrm2(b)?;
    let r = client.spmv(-1.0, a, x, 1.0, b)?;
    params.spmv_count += 1;
    let nom0 = client.nrm2(&r)?;
    params.init_res = nom0;
    params.iter_res = nom0;

    let state = RunState {
        started,
        floor: (params.rtol * bnorm).max(params.atol),
    };
    if params.verbose > 0 {
        params.res_vec.push(nom0);
        params.timing.push(state.started.elapsed().as_secs_f64());
    }
    log::debug!(
        "{op}: initial residual {nom0:.6e}, stopping floor {:.6e}",
        state.floor
    );
    Ok((state, r))
}

/// Append a residual sample when the verbose stride hits.
pub(crate) fn record(params: &mut SolverParams, state: &RunState, res: f64) {
    if params.verbose > 0 && params.numiter % params.verbose == 0 {
        params.res_vec.push(res);
        params.timing.push(state.started.elapsed().as_secs_f64());
        log::debug!("iter {:>5}: residual {res:.6e}", params.numiter);
    }
}

/// Driver exit: recompute the true residual `‖b − A·x‖` (the recurrence
/// residual drifts), classify budget-exhausted runs, and fill the feedback
/// block. `outcome` carries a status the driver already decided on;
/// `None` applies the end-of-budget rule: progress within tolerance →
/// `Success`, progress without → `SlowConvergence`, none → `Diverged`.
pub(crate) fn finish<R, C>(
    client: &C,
    a: &SparseMatrix<R>,
    b: &Array<R>,
    x: &Array<R>,
    params: &mut SolverParams,
    state: &RunState,
    outcome: Option<SolverStatus>,
) -> Result<SolverStatus>
where
    R: Runtime,
    C: RuntimeClient<R> + SparsrOps<R>,
{
    let resid = client.spmv(-1.0, a, x, 1.0, b)?;
    params.final_res = client.nrm2(&resid)?;
    if params.verbose > 0 {
        params.res_vec.push(params.final_res);
        params.timing.push(state.started.elapsed().as_secs_f64());
    }

    let status = outcome.unwrap_or({
        if params.init_res > params.final_res {
            if state.converged(params.final_res) {
                SolverStatus::Success
            } else {
                SolverStatus::SlowConvergence
            }
        } else {
            SolverStatus::Diverged
        }
    });
    params.runtime = state.started.elapsed().as_secs_f64();
    params.info = status;
    log::debug!(
        "{status}: {} iterations, {} spmv, final residual {:.6e} in {:.3e} s",
        params.numiter,
        params.spmv_count,
        params.final_res,
        params.runtime
    );
    Ok(status)
}
