//! Merge split triangular factors back into one matrix

use super::{expect_host_csr, expect_square};
use crate::array::MemLocation;
use crate::error::{Error, Result};
use crate::runtime::Runtime;
use crate::sparse::{CsrData, SparseMatrix, SparseStorage};

/// Merge a strictly lower factor `L` and a diagonal-plus-upper factor `U`
/// into a single CSR matrix, row by row.
///
/// Row `i` of the result is row `i` of `L` followed by row `i` of `U`;
/// with both inputs sorted by column the output stays sorted. This is the
/// storage layout classical incomplete-LU routines operate on, with `L`'s
/// unit diagonal implicit.
///
/// # Errors
/// * [`InvalidArgument`](crate::error::Error::InvalidArgument) when `L`
///   carries an entry on or above the diagonal (names the offending row)
/// * [`ShapeMismatch`](crate::error::Error::ShapeMismatch) when the shapes
///   differ
/// * [`DTypeMismatch`](crate::error::Error::DTypeMismatch) when the dtypes
///   differ
pub fn lumerge<R: Runtime>(l: &SparseMatrix<R>, u: &SparseMatrix<R>) -> Result<CsrData<R>> {
    let l = expect_host_csr(l, "lumerge")?;
    let u = expect_host_csr(u, "lumerge")?;
    let n = expect_square(l)?;
    if l.shape() != u.shape() {
        return Err(Error::ShapeMismatch {
            expected: l.shape().to_vec(),
            got: u.shape().to_vec(),
        });
    }
    if l.dtype() != u.dtype() {
        return Err(Error::DTypeMismatch {
            lhs: l.dtype(),
            rhs: u.dtype(),
        });
    }
    let device = l.values().device().clone();

    crate::dispatch_dtype!(l.dtype(), T => {
        let (l_ptrs, l_cols, l_vals) = l.host_views::<T>("lumerge")?;
        let (u_ptrs, u_cols, u_vals) = u.host_views::<T>("lumerge")?;

        let nnz = l_cols.len() + u_cols.len();
        let mut ptrs = vec![0i64; n + 1];
        let mut cols = Vec::with_capacity(nnz);
        let mut vals = Vec::with_capacity(nnz);

        for r in 0..n {
            for p in l_ptrs[r] as usize..l_ptrs[r + 1] as usize {
                if l_cols[p] as usize >= r {
                    return Err(Error::InvalidArgument {
                        arg: "l",
                        reason: format!(
                            "row {r} has an entry in column {} on or above the diagonal",
                            l_cols[p]
                        ),
                    });
                }
                cols.push(l_cols[p]);
                vals.push(l_vals[p]);
            }
            for p in u_ptrs[r] as usize..u_ptrs[r + 1] as usize {
                cols.push(u_cols[p]);
                vals.push(u_vals[p]);
            }
            ptrs[r + 1] = cols.len() as i64;
        }

        CsrData::from_slices(&ptrs, &cols, &vals, [n, n], MemLocation::Host, &device)
    }, "lumerge")
}
