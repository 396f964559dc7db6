//! Conjugate gradient over a block of right-hand sides.

use std::time::Instant;

use super::common;
use super::{SolverParams, SolverStatus};
use crate::array::{Array, MemLocation};
use crate::error::{Error, Result};
use crate::ops::SparsrOps;
use crate::precond::Preconditioner;
use crate::runtime::{Runtime, RuntimeClient};
use crate::sparse::{DenseData, SparseMatrix, SparseStorage};

/// PCG over every column of a dense right-hand-side block.
///
/// Columns carry independent CG recurrences but share the iteration loop:
/// each pass applies the operator to all still-active direction columns
/// before any update, and the run ends only when every column is inside
/// its own stopping floor `max(rtol·‖b_j‖, atol)`. Columns that reach
/// their floor freeze in place while the rest keep iterating. Feedback
/// fields report the worst column.
pub fn block_pcg<R, C>(
    client: &C,
    a: &SparseMatrix<R>,
    b: &DenseData<R>,
    x: &mut DenseData<R>,
    params: &mut SolverParams,
    precond: &mut Preconditioner<R>,
) -> Result<SolverStatus>
where
    R: Runtime,
    C: RuntimeClient<R> + SparsrOps<R>,
{
    let n = common::validate_operator(a, "block_pcg")?;
    let num_rhs = b.shape()[1];
    if num_rhs == 0 {
        return Err(Error::InvalidArgument {
            arg: "b",
            reason: "right-hand-side block has no columns".to_string(),
        });
    }
    if b.shape()[0] != n {
        return Err(Error::ShapeMismatch {
            expected: vec![n, num_rhs],
            got: b.shape().to_vec(),
        });
    }
    if x.shape() != b.shape() {
        return Err(Error::ShapeMismatch {
            expected: b.shape().to_vec(),
            got: x.shape().to_vec(),
        });
    }
    for dt in [b.dtype(), x.dtype()] {
        if dt != a.dtype() {
            return Err(Error::DTypeMismatch {
                lhs: a.dtype(),
                rhs: dt,
            });
        }
    }
    if b.location() != MemLocation::Device || x.location() != MemLocation::Device {
        return Err(Error::UnsupportedLocation {
            op: "block_pcg",
            required: "device",
        });
    }

    params.reset_feedback();
    let started = Instant::now();
    let device = client.device();

    let mut b_cols = Vec::with_capacity(num_rhs);
    let mut x_cols = Vec::with_capacity(num_rhs);
    let mut floors = Vec::with_capacity(num_rhs);
    for j in 0..num_rhs {
        let bj = b.column(j, device)?;
        floors.push((params.rtol * client.nrm2(&bj)?).max(params.atol));
        b_cols.push(bj);
        x_cols.push(x.column(j, device)?);
    }

    let mut r_cols = Vec::with_capacity(num_rhs);
    let mut res = vec![0.0f64; num_rhs];
    for j in 0..num_rhs {
        let r = client.spmv(-1.0, a, &x_cols[j], 1.0, &b_cols[j])?;
        params.spmv_count += 1;
        res[j] = client.nrm2(&r)?;
        r_cols.push(r);
    }
    let worst = res.iter().cloned().fold(0.0, f64::max);
    params.init_res = worst;
    params.iter_res = worst;
    if params.verbose > 0 {
        params.res_vec.push(worst);
        params.timing.push(started.elapsed().as_secs_f64());
    }
    log::debug!("block_pcg: {num_rhs} columns, worst initial residual {worst:.6e}");

    let mut active: Vec<bool> = res.iter().zip(&floors).map(|(r, f)| r > f).collect();
    if !active.iter().any(|a| *a) {
        return finish_block(
            client,
            a,
            &b_cols,
            &x_cols,
            x,
            &floors,
            params,
            started,
            Some(SolverStatus::Success),
        );
    }

    let mut p_cols = Vec::with_capacity(num_rhs);
    let mut rho = vec![0.0f64; num_rhs];
    for j in 0..num_rhs {
        let h = precond.apply(client, &r_cols[j])?;
        rho[j] = client.dot(&r_cols[j], &h)?;
        p_cols.push(h);
    }

    while params.numiter < params.maxiter {
        // operator batch over the active direction columns, curvature
        // checked before anything is updated
        let mut ap_cols: Vec<Option<(Array<R>, f64)>> = (0..num_rhs).map(|_| None).collect();
        for j in 0..num_rhs {
            if !active[j] {
                continue;
            }
            let ap = client.spmv(1.0, a, &p_cols[j], 0.0, &r_cols[j])?;
            params.spmv_count += 1;
            let pap = client.dot(&p_cols[j], &ap)?;
            if pap <= 0.0 {
                log::warn!(
                    "block_pcg: column {j} curvature {pap:.6e} at iteration {}, \
                     operator not positive definite",
                    params.numiter
                );
                return finish_block(
                    client,
                    a,
                    &b_cols,
                    &x_cols,
                    x,
                    &floors,
                    params,
                    started,
                    Some(SolverStatus::NotPositiveDefinite),
                );
            }
            ap_cols[j] = Some((ap, pap));
        }
        params.numiter += 1;

        for j in 0..num_rhs {
            if let Some((ap, pap)) = &ap_cols[j] {
                let alpha = rho[j] / pap;
                x_cols[j] = client.axpy(alpha, &p_cols[j], &x_cols[j])?;
                r_cols[j] = client.axpy(-alpha, ap, &r_cols[j])?;
                res[j] = client.nrm2(&r_cols[j])?;
                active[j] = res[j] > floors[j];
            }
        }
        let worst = res.iter().cloned().fold(0.0, f64::max);
        params.iter_res = worst;
        if params.verbose > 0 && params.numiter % params.verbose == 0 {
            params.res_vec.push(worst);
            params.timing.push(started.elapsed().as_secs_f64());
            log::debug!("iter {:>5}: worst residual {worst:.6e}", params.numiter);
        }
        if !active.iter().any(|a| *a) {
            return finish_block(
                client,
                a,
                &b_cols,
                &x_cols,
                x,
                &floors,
                params,
                started,
                Some(SolverStatus::Success),
            );
        }

        for j in 0..num_rhs {
            if !active[j] {
                continue;
            }
            let h = precond.apply(client, &r_cols[j])?;
            let rho_new = client.dot(&r_cols[j], &h)?;
            let beta = rho_new / rho[j];
            p_cols[j] = client.axpy(beta, &p_cols[j], &h)?;
            rho[j] = rho_new;
        }
    }

    finish_block(client, a, &b_cols, &x_cols, x, &floors, params, started, None)
}

/// Write the column iterates back into `x`, recompute every column's true
/// residual fresh, and classify the run from the worst column.
fn finish_block<R, C>(
    client: &C,
    a: &SparseMatrix<R>,
    b_cols: &[Array<R>],
    x_cols: &[Array<R>],
    x: &mut DenseData<R>,
    floors: &[f64],
    params: &mut SolverParams,
    started: Instant,
    outcome: Option<SolverStatus>,
) -> Result<SolverStatus>
where
    R: Runtime,
    C: RuntimeClient<R> + SparsrOps<R>,
{
    *x = DenseData::from_columns(x_cols, client.device())?;

    let mut worst = 0.0f64;
    let mut within = true;
    for ((bj, xj), floor) in b_cols.iter().zip(x_cols).zip(floors) {
        let resid = client.spmv(-1.0, a, xj, 1.0, bj)?;
        let res = client.nrm2(&resid)?;
        worst = worst.max(res);
        within &= res <= *floor;
    }
    params.final_res = worst;
    if params.verbose > 0 {
        params.res_vec.push(worst);
        params.timing.push(started.elapsed().as_secs_f64());
    }

    let status = outcome.unwrap_or({
        if params.init_res > worst {
            if within {
                SolverStatus::Success
            } else {
                SolverStatus::SlowConvergence
            }
        } else {
            SolverStatus::Diverged
        }
    });
    params.runtime = started.elapsed().as_secs_f64();
    params.info = status;
    log::debug!(
        "{status}: {} iterations, {} spmv, worst final residual {:.6e} in {:.3e} s",
        params.numiter,
        params.spmv_count,
        params.final_res,
        params.runtime
    );
    Ok(status)
}
