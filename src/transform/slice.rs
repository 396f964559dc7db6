//! Contiguous row slicing for 1-D domain decomposition

use super::{expect_host_csr, expect_square};
use crate::array::MemLocation;
use crate::dtype::Element;
use crate::error::{Error, Result};
use crate::runtime::Runtime;
use crate::sparse::{CsrData, SparseMatrix, SparseStorage};

/// Which external columns a slice references, and how strongly.
///
/// One entry per global column. `touched[c]` is set when some local row has
/// a nonzero in column `c` outside the local range; `weight[c]` accumulates
/// the absolute values of those references. Subdomain drivers use the plan
/// to decide which remote values are worth exchanging.
#[derive(Clone, Debug)]
pub struct CommPlan {
    /// Per-column marker for external references.
    pub touched: Vec<bool>,
    /// Per-column accumulated `|value|` of external references.
    pub weight: Vec<f64>,
}

impl CommPlan {
    /// `true` when the slice is fully self-contained.
    pub fn is_empty(&self) -> bool {
        !self.touched.iter().any(|&t| t)
    }

    /// Number of distinct external columns referenced.
    pub fn num_touched(&self) -> usize {
        self.touched.iter().filter(|&&t| t).count()
    }
}

/// Output of [`slice`]: the subdomain matrices plus the communication plan.
pub struct SliceResult<R: Runtime> {
    /// `A` on the local rows, identity rows elsewhere; keeps the global shape.
    pub b: CsrData<R>,
    /// Local rows restricted to local columns, renumbered to start at zero.
    pub aloc: CsrData<R>,
    /// Local rows restricted to external columns; columns keep their global
    /// indices, so the shape is `(end - start) x num_rows`.
    pub anloc: CsrData<R>,
    /// External-column references of the local rows.
    pub plan: CommPlan,
    /// First local row (global index).
    pub start: usize,
    /// One past the last local row (global index).
    pub end: usize,
}

/// Cut slice `slice_id` of `num_slices` equal row chunks out of a square
/// host CSR matrix.
///
/// The row range is `[slice_id * chunk, (slice_id + 1) * chunk)` clamped to
/// the matrix, with `chunk = ceil(num_rows / num_slices)`. With
/// `num_slices == 1` the result degenerates: `b` and `aloc` equal `A`,
/// `anloc` is empty and the plan touches nothing.
///
/// # Errors
/// * [`InvalidArgument`](crate::error::Error::InvalidArgument) for
///   `num_slices == 0` or `slice_id >= num_slices`
pub fn slice<R: Runtime>(
    num_slices: usize,
    slice_id: usize,
    a: &SparseMatrix<R>,
) -> Result<SliceResult<R>> {
    let csr = expect_host_csr(a, "slice")?;
    let n = expect_square(csr)?;
    if num_slices == 0 {
        return Err(Error::InvalidArgument {
            arg: "num_slices",
            reason: "must be nonzero".to_string(),
        });
    }
    if slice_id >= num_slices {
        return Err(Error::InvalidArgument {
            arg: "slice_id",
            reason: format!("slice {slice_id} out of range for {num_slices} slices"),
        });
    }
    let device = csr.values().device().clone();

    let chunk = n.div_ceil(num_slices).max(1);
    let start = (slice_id * chunk).min(n);
    let end = ((slice_id + 1) * chunk).min(n);
    let local = end - start;

    crate::dispatch_dtype!(csr.dtype(), T => {
        let (row_ptrs, cols, vals) = csr.host_views::<T>("slice")?;

        let mut b_ptrs = vec![0i64; n + 1];
        let mut b_cols = Vec::new();
        let mut b_vals = Vec::new();
        let mut aloc_ptrs = vec![0i64; local + 1];
        let mut aloc_cols = Vec::new();
        let mut aloc_vals = Vec::new();
        let mut anloc_ptrs = vec![0i64; local + 1];
        let mut anloc_cols = Vec::new();
        let mut anloc_vals = Vec::new();
        let mut touched = vec![false; n];
        let mut weight = vec![0.0f64; n];

        for r in 0..n {
            if r < start || r >= end {
                // outside the slice: identity row
                b_cols.push(r as i64);
                b_vals.push(T::one());
                b_ptrs[r + 1] = b_cols.len() as i64;
                continue;
            }
            let lr = r - start;
            for p in row_ptrs[r] as usize..row_ptrs[r + 1] as usize {
                let c = cols[p] as usize;
                b_cols.push(cols[p]);
                b_vals.push(vals[p]);
                if c >= start && c < end {
                    aloc_cols.push((c - start) as i64);
                    aloc_vals.push(vals[p]);
                } else {
                    anloc_cols.push(cols[p]);
                    anloc_vals.push(vals[p]);
                    touched[c] = true;
                    weight[c] += vals[p].to_f64().abs();
                }
            }
            b_ptrs[r + 1] = b_cols.len() as i64;
            aloc_ptrs[lr + 1] = aloc_cols.len() as i64;
            anloc_ptrs[lr + 1] = anloc_cols.len() as i64;
        }

        let b = CsrData::from_slices(&b_ptrs, &b_cols, &b_vals, [n, n], MemLocation::Host, &device)?;
        let aloc = CsrData::from_slices(
            &aloc_ptrs,
            &aloc_cols,
            &aloc_vals,
            [local, local],
            MemLocation::Host,
            &device,
        )?;
        let anloc = CsrData::from_slices(
            &anloc_ptrs,
            &anloc_cols,
            &anloc_vals,
            [local, n],
            MemLocation::Host,
            &device,
        )?;
        log::debug!(
            "slice {slice_id}/{num_slices}: rows [{start}, {end}), {} external columns",
            touched.iter().filter(|&&t| t).count()
        );
        Ok(SliceResult {
            b,
            aloc,
            anloc,
            plan: CommPlan { touched, weight },
            start,
            end,
        })
    }, "slice")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::cpu::{CpuDevice, CpuRuntime};
    use crate::sparse::SparseStorage;

    // 4x4 with off-block couplings:
    // [ 4 -1  0 -1 ]
    // [-1  4 -1  0 ]
    // [ 0 -1  4 -1 ]
    // [-1  0 -1  4 ]
    fn ring(device: &CpuDevice) -> CsrData<CpuRuntime> {
        CsrData::from_slices(
            &[0, 3, 6, 9, 12],
            &[0, 1, 3, 0, 1, 2, 1, 2, 3, 0, 2, 3],
            &[4.0f64, -1.0, -1.0, -1.0, 4.0, -1.0, -1.0, 4.0, -1.0, -1.0, -1.0, 4.0],
            [4, 4],
            MemLocation::Host,
            device,
        )
        .unwrap()
    }

    #[test]
    fn slice_splits_local_and_external() {
        let device = CpuDevice::new();
        let a = SparseMatrix::Csr(ring(&device));
        let s = slice(2, 0, &a).unwrap();

        assert_eq!((s.start, s.end), (0, 2));
        assert_eq!(s.aloc.shape(), [2, 2]);
        assert_eq!(s.anloc.shape(), [2, 4]);

        // local block is [[4,-1],[-1,4]]
        let (ptrs, cols, vals) = s.aloc.host_views::<f64>("test").unwrap();
        assert_eq!(ptrs, &[0, 2, 4]);
        assert_eq!(cols, &[0, 1, 0, 1]);
        assert_eq!(vals, &[4.0, -1.0, -1.0, 4.0]);

        // row 0 references column 3, row 1 references nothing external
        let (aptrs, acols, avals) = s.anloc.host_views::<f64>("test").unwrap();
        assert_eq!(aptrs, &[0, 1, 2]);
        assert_eq!(acols, &[3, 2]);
        assert_eq!(avals, &[-1.0, -1.0]);

        assert!(!s.plan.touched[0] && !s.plan.touched[1]);
        assert!(s.plan.touched[2] && s.plan.touched[3]);
        assert_eq!(s.plan.weight[3], 1.0);
        assert_eq!(s.plan.num_touched(), 2);
    }

    #[test]
    fn slice_pads_remote_rows_with_identity() {
        let device = CpuDevice::new();
        let a = SparseMatrix::Csr(ring(&device));
        let s = slice(2, 1, &a).unwrap();

        assert_eq!((s.start, s.end), (2, 4));
        let (ptrs, cols, vals) = s.b.host_views::<f64>("test").unwrap();
        // rows 0 and 1 are identity, rows 2 and 3 copy A
        assert_eq!(ptrs, &[0, 1, 2, 5, 8]);
        assert_eq!(&cols[..2], &[0, 1]);
        assert_eq!(&vals[..2], &[1.0, 1.0]);
        assert_eq!(&cols[2..5], &[1, 2, 3]);
    }

    #[test]
    fn single_slice_degenerates_to_identity_plan() {
        let device = CpuDevice::new();
        let a = SparseMatrix::Csr(ring(&device));
        let s = slice(1, 0, &a).unwrap();

        assert_eq!((s.start, s.end), (0, 4));
        assert_eq!(s.aloc.nnz(), 12);
        assert_eq!(s.anloc.nnz(), 0);
        assert!(s.plan.is_empty());
        assert_eq!(s.b.nnz(), 12);
    }

    #[test]
    fn slice_id_out_of_range_is_rejected() {
        let device = CpuDevice::new();
        let a = SparseMatrix::Csr(ring(&device));
        assert!(matches!(
            slice(2, 2, &a),
            Err(Error::InvalidArgument { arg: "slice_id", .. })
        ));
        assert!(matches!(
            slice(0, 0, &a),
            Err(Error::InvalidArgument { arg: "num_slices", .. })
        ));
    }
}
