//! Supernode detection for block-structured preconditioning

use super::{expect_host_csr, expect_square};
use crate::array::MemLocation;
use crate::dtype::Element;
use crate::error::{Error, Result};
use crate::runtime::Runtime;
use crate::sparse::{CsrData, SparseMatrix, SparseStorage};

/// Group consecutive rows with identical relative sparsity structure into
/// supernodes of at most `max_block_size` rows.
///
/// Two adjacent rows belong to the same supernode when their column
/// patterns, shifted by the row index, coincide. The returned offsets mark
/// the first row of each block and close with `num_rows`, so block `k`
/// covers rows `[offsets[k], offsets[k + 1])`. The pattern matrix `S` is an
/// all-ones block-diagonal CSR over those blocks, ready to serve as a
/// block-Jacobi sparsity template.
///
/// # Errors
/// * [`InvalidArgument`](crate::error::Error::InvalidArgument) for
///   `max_block_size == 0`
pub fn supernodal_pattern<R: Runtime>(
    max_block_size: usize,
    a: &SparseMatrix<R>,
) -> Result<(CsrData<R>, Vec<i64>)> {
    let csr = expect_host_csr(a, "supernodal_pattern")?;
    let n = expect_square(csr)?;
    if max_block_size == 0 {
        return Err(Error::InvalidArgument {
            arg: "max_block_size",
            reason: "must be nonzero".to_string(),
        });
    }
    let device = csr.values().device().clone();

    let row_ptrs = csr.row_ptrs().host_slice::<i64>("supernodal_pattern")?;
    let cols = csr.col_indices().host_slice::<i64>("supernodal_pattern")?;

    // relative pattern of row r: column offsets c - r, sorted
    let relative = |r: usize| -> Vec<i64> {
        let mut offs: Vec<i64> = (row_ptrs[r] as usize..row_ptrs[r + 1] as usize)
            .map(|p| cols[p] - r as i64)
            .collect();
        offs.sort_unstable();
        offs
    };

    let mut offsets = vec![0i64];
    let mut r = 0;
    while r < n {
        let pattern = relative(r);
        let mut width = 1;
        while r + width < n && width < max_block_size && relative(r + width) == pattern {
            width += 1;
        }
        r += width;
        offsets.push(r as i64);
    }

    // all-ones block diagonal over the detected blocks
    let mut s_ptrs = vec![0i64; n + 1];
    let mut s_cols = Vec::new();
    for w in offsets.windows(2) {
        let (lo, hi) = (w[0] as usize, w[1] as usize);
        for row in lo..hi {
            for c in lo..hi {
                s_cols.push(c as i64);
            }
            s_ptrs[row + 1] = s_cols.len() as i64;
        }
    }
    let s_vals = vec![1.0f64; s_cols.len()];

    log::debug!(
        "supernodal_pattern: {} rows grouped into {} blocks (cap {max_block_size})",
        n,
        offsets.len().saturating_sub(1)
    );

    crate::dispatch_dtype!(csr.dtype(), T => {
        let vals: Vec<T> = s_vals.iter().map(|&v| T::from_f64(v)).collect();
        let s = CsrData::from_slices(&s_ptrs, &s_cols, &vals, [n, n], MemLocation::Host, &device)?;
        Ok((s, offsets))
    }, "supernodal_pattern")
}
