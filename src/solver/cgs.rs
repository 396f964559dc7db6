//! Preconditioned conjugate gradient squared.

use super::common;
use super::{SolverParams, SolverStatus};
use crate::array::{Array, MemLocation};
use crate::error::Result;
use crate::ops::SparsrOps;
use crate::precond::Preconditioner;
use crate::runtime::{Runtime, RuntimeClient};
use crate::sparse::SparseMatrix;

/// Conjugate gradient squared with a fixed shadow residual, two SpMV per
/// iteration.
///
/// CGS squares the Bi-CG polynomial, so it handles nonsymmetric systems
/// but converges erratically; a vanishing or non-finite inner product in
/// either recurrence classifies the run as
/// [`Diverged`](SolverStatus::Diverged) on the spot. Starting `p` and `q`
/// at zero folds the customary first-iteration special case into the
/// regular update.
pub fn pcgs<R, C>(
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
    let (state, mut r) = common::begin(client, a, b, x, params, "pcgs")?;
    if state.converged(params.init_res) {
        return common::finish(client, a, b, x, params, &state, Some(SolverStatus::Success));
    }

    let r_tld = client.copy(&r)?;
    let mut p = Array::zeros(b.len(), b.dtype(), MemLocation::Device, client.device())?;
    let mut q = p.clone();
    let mut rho = 1.0f64;

    while params.numiter < params.maxiter {
        let rho_new = client.dot(&r_tld, &r)?;
        if !rho_new.is_finite() || rho_new == 0.0 {
            log::warn!("pcgs: shadow product {rho_new:.6e} at iteration {}", params.numiter);
            return common::finish(client, a, b, x, params, &state, Some(SolverStatus::Diverged));
        }
        let beta = rho_new / rho;
        let u = client.axpy(beta, &q, &r)?;
        let pq = client.axpy(beta, &p, &q)?;
        p = client.axpy(beta, &pq, &u)?;

        let p_hat = precond.apply(client, &p)?;
        let v = client.spmv(1.0, a, &p_hat, 0.0, &r)?;
        params.spmv_count += 1;
        let sigma = client.dot(&r_tld, &v)?;
        if !sigma.is_finite() || sigma == 0.0 {
            log::warn!("pcgs: breakdown {sigma:.6e} at iteration {}", params.numiter);
            return common::finish(client, a, b, x, params, &state, Some(SolverStatus::Diverged));
        }
        let alpha = rho_new / sigma;

        q = client.axpy(-alpha, &v, &u)?;
        let uq = client.add(&u, &q)?;
        let uq_hat = precond.apply(client, &uq)?;
        let t = client.spmv(1.0, a, &uq_hat, 0.0, &r)?;
        params.spmv_count += 1;

        *x = client.axpy(alpha, &uq_hat, x)?;
        r = client.axpy(-alpha, &t, &r)?;
        rho = rho_new;
        params.numiter += 1;

        let res = client.nrm2(&r)?;
        params.iter_res = res;
        common::record(params, &state, res);
        if state.converged(res) {
            return common::finish(client, a, b, x, params, &state, Some(SolverStatus::Success));
        }
    }

    common::finish(client, a, b, x, params, &state, None)
}
