//! CSR transposition via arena buckets

use super::expect_host_csr;
use crate::array::MemLocation;
use crate::dtype::Element;
use crate::error::Result;
use crate::runtime::Runtime;
use crate::sparse::{CsrData, FillMode, SparseMatrix, SparseStorage};

/// Transpose a host CSR matrix, applying `op` to every value on the way.
///
/// One O(nnz) pass threads each source entry onto its destination row's
/// bucket: a flat `next` arena plus `head`/`tail` cursors per destination
/// row, so no per-bucket allocation happens. Because entries are appended
/// in source-row order and the buckets are drained in destination-row
/// order, the output columns come out sorted.
///
/// Values pass through f64; `op` receives each source value and its result
/// is stored at the transposed position. The fill mode tag is mirrored
/// (`Lower` ↔ `Upper`).
pub fn transpose_with<R, F>(a: &SparseMatrix<R>, op: F) -> Result<CsrData<R>>
where
    R: Runtime,
    F: Fn(f64) -> f64,
{
    let csr = expect_host_csr(a, "transpose")?;
    let [nrows, ncols] = csr.shape();
    let device = csr.values().device().clone();

    crate::dispatch_dtype!(csr.dtype(), T => {
        let (row_ptrs, cols, vals) = csr.host_views::<T>("transpose")?;
        let nnz = vals.len();

        // arena: per-entry forward link + per-destination-row chain ends
        let mut next = vec![-1i64; nnz];
        let mut head = vec![-1i64; ncols];
        let mut tail = vec![-1i64; ncols];
        let mut row_of = vec![0i64; nnz];

        for r in 0..nrows {
            for pos in row_ptrs[r] as usize..row_ptrs[r + 1] as usize {
                row_of[pos] = r as i64;
                let d = cols[pos] as usize;
                if head[d] < 0 {
                    head[d] = pos as i64;
                } else {
                    next[tail[d] as usize] = pos as i64;
                }
                tail[d] = pos as i64;
            }
        }

        let mut t_ptrs = vec![0i64; ncols + 1];
        let mut t_cols = Vec::with_capacity(nnz);
        let mut t_vals = Vec::with_capacity(nnz);
        for d in 0..ncols {
            let mut cursor = head[d];
            while cursor >= 0 {
                let pos = cursor as usize;
                t_cols.push(row_of[pos]);
                t_vals.push(T::from_f64(op(vals[pos].to_f64())));
                cursor = next[pos];
            }
            t_ptrs[d + 1] = t_cols.len() as i64;
        }

        let out = CsrData::from_slices(
            &t_ptrs,
            &t_cols,
            &t_vals,
            [ncols, nrows],
            MemLocation::Host,
            &device,
        )?;
        Ok(out.with_fill_mode(match csr.fill_mode() {
            FillMode::Lower => FillMode::Upper,
            FillMode::Upper => FillMode::Lower,
            FillMode::Full => FillMode::Full,
        }))
    }, "transpose")
}

/// Value-preserving transpose.
pub fn transpose<R: Runtime>(a: &SparseMatrix<R>) -> Result<CsrData<R>> {
    transpose_with(a, |v| v)
}

/// Conjugate transpose; identical to [`transpose`] for the real dtypes.
pub fn transpose_conj<R: Runtime>(a: &SparseMatrix<R>) -> Result<CsrData<R>> {
    transpose_with(a, |v| v)
}

/// Structure-only transpose: every stored value becomes one.
pub fn transpose_pattern<R: Runtime>(a: &SparseMatrix<R>) -> Result<CsrData<R>> {
    transpose_with(a, |_| 1.0)
}

/// Transpose with absolute values.
pub fn transpose_abs<R: Runtime>(a: &SparseMatrix<R>) -> Result<CsrData<R>> {
    transpose_with(a, f64::abs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::cpu::{CpuDevice, CpuRuntime};
    use crate::sparse::SparseStorage;

    fn sample(device: &CpuDevice) -> CsrData<CpuRuntime> {
        // [[1, 0, 2], [0, -3, 0]]
        CsrData::from_slices(
            &[0, 2, 3],
            &[0, 2, 1],
            &[1.0f64, 2.0, -3.0],
            [2, 3],
            MemLocation::Host,
            device,
        )
        .unwrap()
    }

    #[test]
    fn transpose_matches_hand_result() {
        let device = CpuDevice::new();
        let t = transpose(&sample(&device).into()).unwrap();
        assert_eq!(t.shape(), [3, 2]);
        let (ptrs, cols, vals) = t.host_views::<f64>("test").unwrap();
        assert_eq!(ptrs, &[0, 1, 2, 3]);
        assert_eq!(cols, &[0, 1, 0]);
        assert_eq!(vals, &[1.0, -3.0, 2.0]);
    }

    #[test]
    fn involution_restores_original() {
        let device = CpuDevice::new();
        let a = sample(&device);
        let tt = transpose(&transpose(&a.clone().into()).unwrap().into()).unwrap();
        let (ap, ac, av) = a.host_views::<f64>("test").unwrap();
        let (tp, tc, tv) = tt.host_views::<f64>("test").unwrap();
        assert_eq!(ap, tp);
        assert_eq!(ac, tc);
        assert_eq!(av, tv);
    }

    #[test]
    fn output_columns_are_sorted() {
        let device = CpuDevice::new();
        let t = transpose(&sample(&device).into()).unwrap();
        let (ptrs, cols, _) = t.host_views::<f64>("test").unwrap();
        for r in 0..3 {
            let row = &cols[ptrs[r] as usize..ptrs[r + 1] as usize];
            assert!(row.windows(2).all(|w| w[0] < w[1]));
        }
    }

    #[test]
    fn pattern_and_abs_variants() {
        let device = CpuDevice::new();
        let p = transpose_pattern(&sample(&device).into()).unwrap();
        assert!(p.values().to_vec::<f64>().unwrap().iter().all(|&v| v == 1.0));
        let m = transpose_abs(&sample(&device).into()).unwrap();
        assert!(m.values().to_vec::<f64>().unwrap().iter().all(|&v| v > 0.0));
    }

    #[test]
    fn fill_mode_is_mirrored() {
        let device = CpuDevice::new();
        let l = CsrData::<CpuRuntime>::from_slices(
            &[0, 1, 3],
            &[0, 0, 1],
            &[2.0f64, 1.0, 3.0],
            [2, 2],
            MemLocation::Host,
            &device,
        )
        .unwrap()
        .with_fill_mode(FillMode::Lower);
        let u = transpose(&l.into()).unwrap();
        assert_eq!(u.fill_mode(), FillMode::Upper);
    }
}
