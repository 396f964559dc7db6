//! Application of a prepared descriptor to a residual vector
//!
//! `M⁻¹·r` splits into a left solve against `L` and a right solve against
//! `U` so the Krylov drivers can interleave them with their recurrences.
//! The factor kinds pick between exact substitution and the approximate
//! sweep solve at each call based on the descriptor's `trisolver`; the
//! sweep flavor keeps its previous result in the scratch vectors as the
//! next call's starting guess.

use super::{PrecondKind, Preconditioner, TriSolver};
use crate::array::Array;
use crate::error::{Error, Result};
use crate::ops::SparsrOps;
use crate::runtime::{Runtime, RuntimeClient};

fn ready<'a, T>(slot: &'a Option<T>, what: &str) -> Result<&'a T> {
    slot.as_ref()
        .ok_or_else(|| Error::Internal(format!("precond apply: {what} missing, run setup first")))
}

pub(crate) fn apply_left<R, C>(
    pre: &mut Preconditioner<R>,
    client: &C,
    r: &Array<R>,
) -> Result<Array<R>>
where
    R: Runtime,
    C: RuntimeClient<R> + SparsrOps<R>,
{
    match pre.params.kind {
        PrecondKind::None => client.copy(r),
        PrecondKind::Jacobi => {
            let d = ready(&pre.d, "diagonal")?;
            client.elementwise_div(r, d)
        }
        _ => {
            let l = ready(&pre.l, "lower factor")?;
            match pre.params.trisolver {
                TriSolver::Exact => client.trisolve_lower(l, r, false),
                TriSolver::JacobiSweeps { iters } => {
                    let d2 = ready(&pre.d2, "lower diagonal")?;
                    let warm = ready(&pre.work1, "lower scratch")?;
                    let z = client.jacobi_trisolve_sweeps(l, d2, r, warm, iters)?;
                    pre.work1 = Some(z.clone());
                    Ok(z)
                }
            }
        }
    }
}

pub(crate) fn apply_right<R, C>(
    pre: &mut Preconditioner<R>,
    client: &C,
    z: &Array<R>,
) -> Result<Array<R>>
where
    R: Runtime,
    C: RuntimeClient<R> + SparsrOps<R>,
{
    match pre.params.kind {
        // diagonal scaling is done entirely on the left
        PrecondKind::None | PrecondKind::Jacobi => client.copy(z),
        _ => {
            let u = ready(&pre.u, "upper factor")?;
            match pre.params.trisolver {
                TriSolver::Exact => client.trisolve_upper(u, z),
                TriSolver::JacobiSweeps { iters } => {
                    let d = ready(&pre.d, "upper diagonal")?;
                    let warm = ready(&pre.work2, "upper scratch")?;
                    let y = client.jacobi_trisolve_sweeps(u, d, z, warm, iters)?;
                    pre.work2 = Some(y.clone());
                    Ok(y)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::{CustomFactors, PrecondParams, Preconditioner, TriSolver};
    use super::*;
    use crate::array::MemLocation;
    use crate::precond::PrecondKind;
    use crate::runtime::cpu::{CpuClient, CpuDevice, CpuRuntime};
    use crate::sparse::CsrData;

    fn setup_client() -> (CpuClient, CpuDevice) {
        let device = CpuDevice::new();
        (CpuClient::new(device.clone()), device)
    }

    // exact LU of [[2, -1], [-1, 2]]
    fn exact_lu(device: &CpuDevice) -> CustomFactors<CpuRuntime> {
        let l = CsrData::from_slices(
            &[0, 1, 3],
            &[0, 0, 1],
            &[1.0f64, -0.5, 1.0],
            [2, 2],
            MemLocation::Host,
            device,
        )
        .unwrap();
        let u = CsrData::from_slices(
            &[0, 2, 3],
            &[0, 1, 1],
            &[2.0f64, -1.0, 1.5],
            [2, 2],
            MemLocation::Host,
            device,
        )
        .unwrap();
        CustomFactors { l, u }
    }

    #[test]
    fn identity_apply_copies() {
        let (client, device) = setup_client();
        let r = Array::<CpuRuntime>::from_slice(&[3.0f64, -2.0], MemLocation::Device, &device)
            .unwrap();
        let mut pre = Preconditioner::identity();
        let z = pre.apply(&client, &r).unwrap();
        assert_eq!(z.to_vec::<f64>().unwrap(), vec![3.0, -2.0]);
    }

    #[test]
    fn exact_factors_invert_the_matrix() {
        let (client, device) = setup_client();
        let mut pre = Preconditioner::<CpuRuntime>::identity();
        pre.setup_custom(&client, exact_lu(&device)).unwrap();

        // A·[1, 1] = [1, 1], so M⁻¹·r recovers [1, 1]
        let r = Array::from_slice(&[1.0f64, 1.0], MemLocation::Device, &device).unwrap();
        let z = pre.apply(&client, &r).unwrap();
        let z = z.to_vec::<f64>().unwrap();
        assert!((z[0] - 1.0).abs() < 1e-12);
        assert!((z[1] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn sweep_trisolver_matches_exact_on_small_factors() {
        let (client, device) = setup_client();
        // Jacobi sweeps on a triangular system settle in n sweeps, so three
        // are exact here and the warm-started second apply stays exact
        let mut pre = Preconditioner::<CpuRuntime>::new(PrecondParams {
            trisolver: TriSolver::JacobiSweeps { iters: 3 },
            ..PrecondParams::default()
        });
        pre.setup_custom(&client, exact_lu(&device)).unwrap();
        assert!(pre.work1.is_some());

        let r = Array::from_slice(&[1.0f64, 1.0], MemLocation::Device, &device).unwrap();
        for _ in 0..2 {
            let z = pre.apply(&client, &r).unwrap();
            let z = z.to_vec::<f64>().unwrap();
            assert!((z[0] - 1.0).abs() < 1e-12);
            assert!((z[1] - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn apply_before_setup_is_reported() {
        let (client, device) = setup_client();
        let r = Array::<CpuRuntime>::from_slice(&[1.0f64], MemLocation::Device, &device).unwrap();
        let mut pre =
            Preconditioner::new(PrecondParams::with_kind(PrecondKind::ParIlu));
        assert!(matches!(
            pre.apply(&client, &r),
            Err(Error::Internal(_))
        ));
    }
}
