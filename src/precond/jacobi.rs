//! Diagonal (Jacobi) preconditioner setup

use super::Preconditioner;
use crate::array::MemLocation;
use crate::dtype::Element;
use crate::error::{Error, Result};
use crate::ops::SparsrOps;
use crate::runtime::{Runtime, RuntimeClient};
use crate::sparse::{SparseMatrix, SparseStorage};

/// Extract `diag(A)` into the descriptor's `d` slot, device-resident.
///
/// A zero or absent diagonal entry fails the setup; the apply path divides
/// by `d` without further checks.
pub(crate) fn setup<R, C>(
    pre: &mut Preconditioner<R>,
    client: &C,
    a: &SparseMatrix<R>,
) -> Result<()>
where
    R: Runtime,
    C: RuntimeClient<R> + SparsrOps<R>,
{
    let csr = super::parilu::stage_host_csr(a, "jacobi setup")?;

    crate::dispatch_dtype!(csr.dtype(), T => {
        let (row_ptrs, cols, vals) = csr.host_views::<T>("jacobi setup")?;
        let n = csr.nrows();
        let mut diag = vec![T::zero(); n];
        for (r, slot) in diag.iter_mut().enumerate() {
            let hit = (row_ptrs[r] as usize..row_ptrs[r + 1] as usize)
                .find(|&p| cols[p] as usize == r);
            match hit {
                Some(p) if vals[p].to_f64() != 0.0 => *slot = vals[p],
                _ => return Err(Error::MissingDiagonal { row: r }),
            }
        }
        pre.d = Some(crate::array::Array::from_slice(
            &diag,
            MemLocation::Device,
            client.device(),
        )?);
        Ok(())
    }, "jacobi setup")
}
