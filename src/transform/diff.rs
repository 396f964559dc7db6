//! Frobenius-style distance between two sparsity-matched matrices

use super::expect_host_csr;
use crate::dtype::Element;
use crate::error::{Error, Result};
use crate::runtime::Runtime;
use crate::sparse::{SparseMatrix, SparseStorage};

/// Frobenius norm of the difference of `A` and `B`, restricted to positions
/// stored in both matrices.
///
/// Only matched `(row, col)` pairs contribute `(a_ij - b_ij)^2`; an entry
/// present in one matrix but absent from the other adds nothing, so this is
/// a proper Frobenius distance only when the two patterns agree. Factor
/// refinement loops use it to watch successive iterates on a fixed pattern,
/// where the restriction is exact.
///
/// # Errors
/// * [`ShapeMismatch`](crate::error::Error::ShapeMismatch) when the shapes
///   differ
pub fn frobenius_diff<R: Runtime>(a: &SparseMatrix<R>, b: &SparseMatrix<R>) -> Result<f64> {
    let a = expect_host_csr(a, "frobenius_diff")?;
    let b = expect_host_csr(b, "frobenius_diff")?;
    if a.shape() != b.shape() {
        return Err(Error::ShapeMismatch {
            expected: a.shape().to_vec(),
            got: b.shape().to_vec(),
        });
    }
    let nrows = a.nrows();

    crate::dispatch_dtype!(a.dtype(), T => {
        let (a_ptrs, a_cols, a_vals) = a.host_views::<T>("frobenius_diff")?;
        let (b_ptrs, b_cols, b_vals) = b.host_views::<T>("frobenius_diff")?;

        let mut sum = 0.0f64;
        for r in 0..nrows {
            let b_lo = b_ptrs[r] as usize;
            let b_hi = b_ptrs[r + 1] as usize;
            for p in a_ptrs[r] as usize..a_ptrs[r + 1] as usize {
                let c = a_cols[p];
                if let Some(q) = (b_lo..b_hi).find(|&q| b_cols[q] == c) {
                    let d = a_vals[p].to_f64() - b_vals[q].to_f64();
                    sum += d * d;
                }
            }
        }
        Ok(sum.sqrt())
    }, "frobenius_diff")
}
