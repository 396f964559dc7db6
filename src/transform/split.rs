//! Block-diagonal / remainder splitting

use super::{expect_host_csr, expect_square};
use crate::array::MemLocation;
use crate::error::{Error, Result};
use crate::runtime::Runtime;
use crate::sparse::{CsrData, SparseMatrix, SparseStorage};

/// Split a square CSR matrix into its block-diagonal part `D` and the
/// remainder `R`.
///
/// Rows `[0, offset)` form one block; the remaining rows partition into
/// blocks of `block_size` (the last block may be short). A nonzero belongs
/// to `D` when its column falls inside its row's block, otherwise to `R`.
/// Within each `D` row the diagonal entry is emitted first; relaxation
/// kernels that pivot on it can then read it at the row start.
///
/// Both outputs keep `A`'s global shape, and
/// `nnz(D) + nnz(R) == nnz(A)`.
///
/// # Errors
/// * [`MissingDiagonal`](crate::error::Error::MissingDiagonal) when a row
///   has no literal diagonal entry (also logged as a warning)
/// * [`InvalidArgument`](crate::error::Error::InvalidArgument) for
///   `block_size == 0` or `offset >= num_rows`
pub fn split<R: Runtime>(
    offset: usize,
    block_size: usize,
    a: &SparseMatrix<R>,
) -> Result<(CsrData<R>, CsrData<R>)> {
    let csr = expect_host_csr(a, "split")?;
    let n = expect_square(csr)?;
    if block_size == 0 {
        return Err(Error::InvalidArgument {
            arg: "block_size",
            reason: "must be nonzero".to_string(),
        });
    }
    if offset >= n && n > 0 {
        return Err(Error::InvalidArgument {
            arg: "offset",
            reason: format!("offset {offset} exceeds matrix dimension {n}"),
        });
    }
    let device = csr.values().device().clone();

    crate::dispatch_dtype!(csr.dtype(), T => {
        let (row_ptrs, cols, vals) = csr.host_views::<T>("split")?;

        let mut d_ptrs = vec![0i64; n + 1];
        let mut d_cols = Vec::new();
        let mut d_vals = Vec::new();
        let mut r_ptrs = vec![0i64; n + 1];
        let mut r_cols = Vec::new();
        let mut r_vals = Vec::new();

        for r in 0..n {
            let (lo, hi) = block_bounds(r, offset, block_size, n);
            let start = row_ptrs[r] as usize;
            let end = row_ptrs[r + 1] as usize;

            let diag_pos = (start..end).find(|&p| cols[p] as usize == r);
            let diag_pos = match diag_pos {
                Some(p) => p,
                None => {
                    log::warn!("split: row {r} has no diagonal entry");
                    return Err(Error::MissingDiagonal { row: r });
                }
            };

            d_cols.push(cols[diag_pos]);
            d_vals.push(vals[diag_pos]);
            for p in start..end {
                if p == diag_pos {
                    continue;
                }
                let c = cols[p] as usize;
                if c >= lo && c < hi {
                    d_cols.push(cols[p]);
                    d_vals.push(vals[p]);
                } else {
                    r_cols.push(cols[p]);
                    r_vals.push(vals[p]);
                }
            }
            d_ptrs[r + 1] = d_cols.len() as i64;
            r_ptrs[r + 1] = r_cols.len() as i64;
        }

        let d = CsrData::from_slices(&d_ptrs, &d_cols, &d_vals, [n, n], MemLocation::Host, &device)?;
        let rm = CsrData::from_slices(&r_ptrs, &r_cols, &r_vals, [n, n], MemLocation::Host, &device)?;
        Ok((d, rm))
    }, "split")
}

/// Column range of the block containing row `r`.
#[inline]
fn block_bounds(r: usize, offset: usize, block_size: usize, n: usize) -> (usize, usize) {
    if r < offset {
        (0, offset)
    } else {
        let k = (r - offset) / block_size;
        let lo = offset + k * block_size;
        (lo, (lo + block_size).min(n))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::cpu::{CpuDevice, CpuRuntime};
    use crate::sparse::SparseStorage;

    fn tridiag(n: usize, device: &CpuDevice) -> CsrData<CpuRuntime> {
        let mut ptrs = vec![0i64];
        let mut cols = Vec::new();
        let mut vals = Vec::new();
        for r in 0..n {
            for c in r.saturating_sub(1)..(r + 2).min(n) {
                cols.push(c as i64);
                vals.push(if c == r { 4.0f64 } else { -1.0 });
            }
            ptrs.push(cols.len() as i64);
        }
        CsrData::from_slices(&ptrs, &cols, &vals, [n, n], MemLocation::Host, device).unwrap()
    }

    #[test]
    fn nnz_is_partitioned() {
        let device = CpuDevice::new();
        let a = tridiag(7, &device);
        let total = a.nnz();
        let (d, r) = split(0, 2, &a.into()).unwrap();
        assert_eq!(d.nnz() + r.nnz(), total);
        assert_eq!(d.shape(), [7, 7]);
        assert_eq!(r.shape(), [7, 7]);
    }

    #[test]
    fn diagonal_leads_each_block_row() {
        let device = CpuDevice::new();
        let a = tridiag(6, &device);
        let (d, _) = split(1, 2, &a.into()).unwrap();
        let (ptrs, cols, _) = d.host_views::<f64>("test").unwrap();
        for r in 0..6 {
            let start = ptrs[r] as usize;
            assert!(ptrs[r + 1] as usize > start, "row {r} lost its diagonal");
            assert_eq!(cols[start] as usize, r, "diagonal not first in row {r}");
        }
    }

    #[test]
    fn offset_rows_form_leading_block() {
        let device = CpuDevice::new();
        let a = tridiag(5, &device);
        // offset 3: rows 0..3 share block [0, 3)
        let (d, r) = split(3, 2, &a.into()).unwrap();
        let (dp, dc, _) = d.host_views::<f64>("test").unwrap();
        for row in 0..3 {
            for p in dp[row] as usize..dp[row + 1] as usize {
                assert!((dc[p] as usize) < 3);
            }
        }
        let (rp, rc, _) = r.host_views::<f64>("test").unwrap();
        for row in 0..3 {
            for p in rp[row] as usize..rp[row + 1] as usize {
                assert!((rc[p] as usize) >= 3);
            }
        }
    }

    #[test]
    fn missing_diagonal_is_an_error() {
        let device = CpuDevice::new();
        let a = CsrData::<CpuRuntime>::from_slices(
            &[0, 1, 2],
            &[1, 0],
            &[1.0f64, 1.0],
            [2, 2],
            MemLocation::Host,
            &device,
        )
        .unwrap();
        assert!(matches!(
            split(0, 1, &a.into()),
            Err(Error::MissingDiagonal { row: 0 })
        ));
    }

    #[test]
    fn zero_block_size_rejected() {
        let device = CpuDevice::new();
        let a = tridiag(3, &device);
        assert!(matches!(
            split(0, 0, &a.into()),
            Err(Error::InvalidArgument { .. })
        ));
    }
}
