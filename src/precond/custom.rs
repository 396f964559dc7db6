//! Externally supplied triangular factors
//!
//! Factors computed outside the built-in engines (a direct solver's exact
//! LU, factors carried over from a previous run) are installed through
//! [`Preconditioner::setup_custom`] and then behave exactly like a ParILU
//! pair: same packaged state, same triangular-solve machinery at apply
//! time.

use super::parilu::{package_lu, require_nonzero_diagonal, stage_host_csr};
use super::Preconditioner;
use crate::error::{Error, Result};
use crate::ops::SparsrOps;
use crate::runtime::{Runtime, RuntimeClient};
use crate::sparse::{CsrData, FillMode, SparseMatrix, SparseStorage};
use crate::transform;

/// Factor pair for [`Preconditioner::setup_custom`].
///
/// Both handles are taken as-is: `l` must store its full diagonal
/// explicitly (ones for a unit-lower factor) and `u` must carry a nonzero
/// entry on every diagonal position, since the apply-side substitutions
/// divide by the stored diagonals.
#[derive(Debug, Clone)]
pub struct CustomFactors<R: Runtime> {
    /// Lower triangular factor.
    pub l: CsrData<R>,
    /// Upper triangular factor.
    pub u: CsrData<R>,
}

pub(crate) fn setup<R, C>(
    pre: &mut Preconditioner<R>,
    client: &C,
    factors: CustomFactors<R>,
) -> Result<()>
where
    R: Runtime,
    C: RuntimeClient<R> + SparsrOps<R>,
{
    let l = stage_host_csr(&SparseMatrix::Csr(factors.l), "custom setup")?
        .with_fill_mode(FillMode::Lower);
    let u = stage_host_csr(&SparseMatrix::Csr(factors.u), "custom setup")?
        .with_fill_mode(FillMode::Upper);

    let n = transform::expect_square(&l)?;
    let un = transform::expect_square(&u)?;
    if n != un {
        return Err(Error::ShapeMismatch {
            expected: vec![n, n],
            got: vec![un, un],
        });
    }
    if l.dtype() != u.dtype() {
        return Err(Error::DTypeMismatch {
            lhs: l.dtype(),
            rhs: u.dtype(),
        });
    }
    require_nonzero_diagonal(&l)?;
    require_nonzero_diagonal(&u)?;

    log::debug!(
        "custom setup: installing factors, nnz(L) {} nnz(U) {}",
        l.nnz(),
        u.nnz()
    );
    package_lu(pre, client, l, u)
}

#[cfg(test)]
mod tests {
    use super::super::{PrecondKind, PrecondParams, Preconditioner};
    use super::*;
    use crate::array::MemLocation;
    use crate::runtime::cpu::{CpuClient, CpuDevice, CpuRuntime};

    fn setup_client() -> (CpuClient, CpuDevice) {
        let device = CpuDevice::new();
        (CpuClient::new(device.clone()), device)
    }

    fn exact_lu(device: &CpuDevice) -> CustomFactors<CpuRuntime> {
        // LU of [[2, -1], [-1, 2]]
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
    fn installs_factors_with_parilu_packaging() {
        let (client, device) = setup_client();
        let mut pre = Preconditioner::<CpuRuntime>::identity();
        pre.setup_custom(&client, exact_lu(&device)).unwrap();

        assert_eq!(pre.params.kind, PrecondKind::Custom);
        assert!(pre.is_ready());
        let l = pre.l.as_ref().unwrap();
        assert_eq!(l.location(), MemLocation::Device);
        assert_eq!(pre.m.as_ref().unwrap().nnz(), 4);
        assert_eq!(
            pre.d.as_ref().unwrap().to_vec::<f64>().unwrap(),
            vec![2.0, 1.5]
        );
        assert_eq!(
            pre.d2.as_ref().unwrap().to_vec::<f64>().unwrap(),
            vec![1.0, 1.0]
        );
    }

    #[test]
    fn rejects_mismatched_factor_shapes() {
        let (client, device) = setup_client();
        let mut factors = exact_lu(&device);
        factors.u = CsrData::from_slices(
            &[0, 1],
            &[0],
            &[1.0f64],
            [1, 1],
            MemLocation::Host,
            &device,
        )
        .unwrap();

        let mut pre = Preconditioner::<CpuRuntime>::identity();
        assert!(matches!(
            pre.setup_custom(&client, factors),
            Err(Error::ShapeMismatch { .. })
        ));
        assert!(!pre.is_ready());
    }

    #[test]
    fn rejects_upper_factor_without_full_diagonal() {
        let (client, device) = setup_client();
        let mut factors = exact_lu(&device);
        // row 1 of U has no diagonal entry
        factors.u = CsrData::from_slices(
            &[0, 2, 2],
            &[0, 1],
            &[2.0f64, -1.0],
            [2, 2],
            MemLocation::Host,
            &device,
        )
        .unwrap();

        let mut pre = Preconditioner::<CpuRuntime>::identity();
        assert!(matches!(
            pre.setup_custom(&client, factors),
            Err(Error::MissingDiagonal { row: 1 })
        ));
    }

    #[test]
    fn plain_setup_refuses_the_custom_kind() {
        let (client, device) = setup_client();
        let a = CsrData::<CpuRuntime>::from_slices(
            &[0, 1],
            &[0],
            &[1.0f64],
            [1, 1],
            MemLocation::Host,
            &device,
        )
        .unwrap();

        let mut pre = Preconditioner::new(PrecondParams::with_kind(PrecondKind::Custom));
        assert!(matches!(
            pre.setup(&client, &SparseMatrix::Csr(a)),
            Err(Error::InvalidArgument { arg: "kind", .. })
        ));
    }
}
