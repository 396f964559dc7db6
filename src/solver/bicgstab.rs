//! Stabilized bi-conjugate gradient.

use super::common::{self, RunState};
use super::{SolverParams, SolverStatus};
use crate::array::{Array, MemLocation};
use crate::error::Result;
use crate::ops::SparsrOps;
use crate::precond::Preconditioner;
use crate::runtime::{Runtime, RuntimeClient};
use crate::sparse::SparseMatrix;

/// BiCGSTAB for nonsymmetric systems, two SpMV per iteration.
///
/// Each iteration alternates a Bi-CG step with a local residual-minimizing
/// step, which smooths the erratic CGS convergence. The recurrence scalars
/// (`rho`, the shadow product with `v`, `⟨t,t⟩`, `omega`) can all legally
/// vanish; any such breakdown ends the run immediately, classified
/// [`Success`](SolverStatus::Success) when the residual is already inside
/// the stopping floor and [`Diverged`](SolverStatus::Diverged) otherwise.
pub fn bicgstab<R, C>(
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
    let (state, mut r) = common::begin(client, a, b, x, params, "bicgstab")?;
    if state.converged(params.init_res) {
        return common::finish(client, a, b, x, params, &state, Some(SolverStatus::Success));
    }

    let r_tld = client.copy(&r)?;
    let mut p = Array::zeros(b.len(), b.dtype(), MemLocation::Device, client.device())?;
    let mut v = p.clone();
    let mut rho = 1.0f64;
    let mut alpha = 1.0f64;
    let mut omega = 1.0f64;

    while params.numiter < params.maxiter {
        let rho_new = client.dot(&r_tld, &r)?;
        if !rho_new.is_finite() || rho_new == 0.0 {
            return breakdown(client, a, b, x, params, &state, "rho", rho_new);
        }
        let beta = (rho_new / rho) * (alpha / omega);
        let pv = client.axpy(-omega, &v, &p)?;
        p = client.axpy(beta, &pv, &r)?;

        let p_hat = precond.apply(client, &p)?;
        v = client.spmv(1.0, a, &p_hat, 0.0, &r)?;
        params.spmv_count += 1;
        let rv = client.dot(&r_tld, &v)?;
        if !rv.is_finite() || rv == 0.0 {
            return breakdown(client, a, b, x, params, &state, "r~·v", rv);
        }
        alpha = rho_new / rv;

        let s = client.axpy(-alpha, &v, &r)?;
        let snorm = client.nrm2(&s)?;
        if state.converged(snorm) {
            // half-step already inside the floor
            *x = client.axpy(alpha, &p_hat, x)?;
            params.numiter += 1;
            params.iter_res = snorm;
            common::record(params, &state, snorm);
            return common::finish(client, a, b, x, params, &state, Some(SolverStatus::Success));
        }

        let s_hat = precond.apply(client, &s)?;
        let t = client.spmv(1.0, a, &s_hat, 0.0, &r)?;
        params.spmv_count += 1;
        let tt = client.dot(&t, &t)?;
        let ts = client.dot(&t, &s)?;
        if !tt.is_finite() || !ts.is_finite() || tt == 0.0 {
            return breakdown(client, a, b, x, params, &state, "t·t", tt);
        }
        omega = ts / tt;

        *x = client.axpy(alpha, &p_hat, x)?;
        *x = client.axpy(omega, &s_hat, x)?;
        r = client.axpy(-omega, &t, &s)?;
        rho = rho_new;
        params.numiter += 1;

        let res = client.nrm2(&r)?;
        params.iter_res = res;
        common::record(params, &state, res);
        if state.converged(res) {
            return common::finish(client, a, b, x, params, &state, Some(SolverStatus::Success));
        }
        if omega == 0.0 {
            return breakdown(client, a, b, x, params, &state, "omega", omega);
        }
    }

    common::finish(client, a, b, x, params, &state, None)
}

fn breakdown<R, C>(
    client: &C,
    a: &SparseMatrix<R>,
    b: &Array<R>,
    x: &Array<R>,
    params: &mut SolverParams,
    state: &RunState,
    what: &str,
    value: f64,
) -> Result<SolverStatus>
where
    R: Runtime,
    C: RuntimeClient<R> + SparsrOps<R>,
{
    log::warn!(
        "bicgstab: {what} = {value:.6e} at iteration {}, stopping",
        params.numiter
    );
    let outcome = if state.converged(params.iter_res) {
        SolverStatus::Success
    } else {
        SolverStatus::Diverged
    };
    common::finish(client, a, b, x, params, state, Some(outcome))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::cpu::{CpuClient, CpuDevice, CpuRuntime};
    use crate::sparse::CsrData;

    fn setup_client() -> (CpuClient, CpuDevice) {
        let device = CpuDevice::new();
        (CpuClient::new(device.clone()), device)
    }

    fn device_vec(device: &CpuDevice, v: &[f64]) -> Array<CpuRuntime> {
        Array::from_slice(v, MemLocation::Device, device).unwrap()
    }

    #[test]
    fn solves_nonsymmetric_system() {
        let (client, device) = setup_client();
        let csr = CsrData::<CpuRuntime>::from_slices(
            &[0, 2, 4, 6],
            &[0, 1, 1, 2, 0, 2],
            &[4.0f64, 1.0, 3.0, -1.0, 0.5, 5.0],
            [3, 3],
            MemLocation::Host,
            &device,
        )
        .unwrap()
        .to_location(MemLocation::Device, &device)
        .unwrap();
        let a = SparseMatrix::Csr(csr);
        // b = A·[1, 2, 3]
        let b = device_vec(&device, &[6.0, 3.0, 15.5]);
        let mut x = device_vec(&device, &[0.0; 3]);

        let mut params = SolverParams {
            rtol: 1e-12,
            maxiter: 50,
            ..SolverParams::default()
        };
        let mut pre = Preconditioner::identity();
        let status = bicgstab(&client, &a, &b, &mut x, &mut params, &mut pre).unwrap();

        assert_eq!(status, SolverStatus::Success);
        let got = x.to_vec::<f64>().unwrap();
        assert!((got[0] - 1.0).abs() < 1e-8);
        assert!((got[1] - 2.0).abs() < 1e-8);
        assert!((got[2] - 3.0).abs() < 1e-8);
    }

    #[test]
    fn shadow_breakdown_reports_divergence() {
        let (client, device) = setup_client();
        // A·r₀ is orthogonal to the shadow residual on the first step
        let csr = CsrData::<CpuRuntime>::from_slices(
            &[0, 1, 2],
            &[1, 0],
            &[1.0f64, 1.0],
            [2, 2],
            MemLocation::Host,
            &device,
        )
        .unwrap()
        .to_location(MemLocation::Device, &device)
        .unwrap();
        let a = SparseMatrix::Csr(csr);
        let b = device_vec(&device, &[1.0, 0.0]);
        let mut x = device_vec(&device, &[0.0, 0.0]);

        let mut params = SolverParams::default();
        let mut pre = Preconditioner::identity();
        let status = bicgstab(&client, &a, &b, &mut x, &mut params, &mut pre).unwrap();
        assert_eq!(status, SolverStatus::Diverged);
        assert_eq!(params.numiter, 0);
    }
}
