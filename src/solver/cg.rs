//! Preconditioned conjugate gradient.

use super::common::{self, RunState};
use super::{SolverParams, SolverStatus};
use crate::array::Array;
use crate::error::Result;
use crate::ops::SparsrOps;
use crate::precond::Preconditioner;
use crate::runtime::{Runtime, RuntimeClient};
use crate::sparse::SparseMatrix;

/// Conjugate gradient on an SPD system, one SpMV per iteration.
///
/// The curvature `⟨p, A·p⟩` is checked before every solution update; a
/// non-positive value classifies the run as
/// [`NotPositiveDefinite`](SolverStatus::NotPositiveDefinite) — on the very
/// first pass this leaves `numiter == 0` and `x` untouched.
pub fn pcg<R, C>(
    client: &C,
    a: &SparseMatrix<R>,
    b: &Array<R>,
    x: &mut Array<R>,
    params: &mut SolverParams,
    precond: &mut Preconditioner<R>,
) -> Result<SolverStatus>
where
    R: Runtime,
    C: RuntimeClient<R> + SparsrOps<R>,
{
    let (state, mut r): (RunState, Array<R>) = common::begin(client, a, b, x, params, "pcg")?;
    if state.converged(params.init_res) {
        return common::finish(client, a, b, x, params, &state, Some(SolverStatus::Success));
    }

    let h = precond.apply(client, &r)?;
    let mut rho = client.dot(&r, &h)?;
    let mut p = h;

    while params.numiter < params.maxiter {
        let ap = client.spmv(1.0, a, &p, 0.0, &r)?;
        params.spmv_count += 1;
        let pap = client.dot(&p, &ap)?;
        if pap <= 0.0 {
            log::warn!("pcg: curvature {pap:.6e} at iteration {}", params.numiter);
            return common::finish(
                client,
                a,
                b,
                x,
                params,
                &state,
                Some(SolverStatus::NotPositiveDefinite),
            );
        }
        params.numiter += 1;

        let alpha = rho / pap;
        *x = client.axpy(alpha, &p, x)?;
        r = client.axpy(-alpha, &ap, &r)?;

        let res = client.nrm2(&r)?;
        params.iter_res = res;
        common::record(params, &state, res);
        if state.converged(res) {
            return common::finish(client, a, b, x, params, &state, Some(SolverStatus::Success));
        }

        let h = precond.apply(client, &r)?;
        let rho_new = client.dot(&r, &h)?;
        let beta = rho_new / rho;
        p = client.axpy(beta, &p, &h)?;
        rho = rho_new;
    }

    common::finish(client, a, b, x, params, &state, None)
}
