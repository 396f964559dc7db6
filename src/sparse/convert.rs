//! Explicit format conversions
//!
//! All conversions work on host-resident payloads; transfer the result when
//! device residency is needed. Each function is variant-to-variant, there is
//! no implicit conversion anywhere in the crate.

use crate::array::MemLocation;
use crate::dtype::Element;
use crate::error::{Error, Result};
use crate::runtime::Runtime;

use super::coo::CooData;
use super::csr::CsrData;
use super::dense::DenseData;
use super::ell::EllData;
use super::format::{MajorOrder, SparseStorage};
use super::sellp::SellpData;

fn require_host<S: SparseStorage>(m: &S, op: &'static str) -> Result<()> {
    if m.location() != MemLocation::Host {
        return Err(Error::UnsupportedLocation {
            op,
            required: "host",
        });
    }
    Ok(())
}

/// Expand CSR row pointers into explicit COO triplets
pub fn csr_to_coo<R: Runtime>(a: &CsrData<R>) -> Result<CooData<R>> {
    require_host(a, "csr_to_coo")?;
    let device = a.values().device().clone();

    crate::dispatch_dtype!(a.dtype(), T => {
        let (row_ptrs, col_indices, values) = a.host_views::<T>("csr_to_coo")?;
        let mut rows = Vec::with_capacity(values.len());
        for r in 0..a.nrows() {
            for _ in row_ptrs[r]..row_ptrs[r + 1] {
                rows.push(r as i64);
            }
        }
        CooData::from_slices(&rows, col_indices, values, a.shape(), MemLocation::Host, &device)
    }, "csr_to_coo")
}

/// Compress COO triplets into CSR, sorting by (row, col) and summing duplicates
pub fn coo_to_csr<R: Runtime>(a: &CooData<R>) -> Result<CsrData<R>> {
    require_host(a, "coo_to_csr")?;
    let device = a.values().device().clone();
    let [nrows, _] = a.shape();

    crate::dispatch_dtype!(a.dtype(), T => {
        let rows = a.row_indices().host_slice::<i64>("coo_to_csr")?;
        let cols = a.col_indices().host_slice::<i64>("coo_to_csr")?;
        let vals = a.values().host_slice::<T>("coo_to_csr")?;

        let mut order: Vec<usize> = (0..vals.len()).collect();
        order.sort_by_key(|&k| (rows[k], cols[k]));

        let mut merged_ptrs = vec![0i64; nrows + 1];
        let mut merged_cols: Vec<i64> = Vec::with_capacity(vals.len());
        let mut merged_vals: Vec<T> = Vec::with_capacity(vals.len());
        let mut last: Option<(i64, i64)> = None;

        for &k in &order {
            if last == Some((rows[k], cols[k])) {
                if let Some(v) = merged_vals.last_mut() {
                    *v = *v + vals[k];
                }
            } else {
                merged_cols.push(cols[k]);
                merged_vals.push(vals[k]);
                merged_ptrs[rows[k] as usize + 1] += 1;
                last = Some((rows[k], cols[k]));
            }
        }
        for r in 0..nrows {
            merged_ptrs[r + 1] += merged_ptrs[r];
        }

        CsrData::from_slices(
            &merged_ptrs,
            &merged_cols,
            &merged_vals,
            a.shape(),
            MemLocation::Host,
            &device,
        )
    }, "coo_to_csr")
}

/// Pad CSR rows to a uniform width (ELLPACK)
pub fn csr_to_ell<R: Runtime>(a: &CsrData<R>) -> Result<EllData<R>> {
    require_host(a, "csr_to_ell")?;
    let device = a.values().device().clone();
    let nrows = a.nrows();

    crate::dispatch_dtype!(a.dtype(), T => {
        let (row_ptrs, col_indices, values) = a.host_views::<T>("csr_to_ell")?;
        let max_row_nnz = (0..nrows)
            .map(|r| (row_ptrs[r + 1] - row_ptrs[r]) as usize)
            .max()
            .unwrap_or(0);

        let mut cols = vec![-1i64; nrows * max_row_nnz];
        let mut vals = vec![T::zero(); nrows * max_row_nnz];
        for r in 0..nrows {
            let start = row_ptrs[r] as usize;
            let end = row_ptrs[r + 1] as usize;
            for (j, pos) in (start..end).enumerate() {
                cols[r * max_row_nnz + j] = col_indices[pos];
                vals[r * max_row_nnz + j] = values[pos];
            }
        }

        EllData::new(
            crate::array::Array::from_slice(&cols, MemLocation::Host, &device)?,
            crate::array::Array::from_slice(&vals, MemLocation::Host, &device)?,
            a.shape(),
            max_row_nnz,
            a.nnz(),
        )
    }, "csr_to_ell")
}

/// Slice CSR rows into SELL-P blocks of `blocksize` rows padded to `alignment`
pub fn csr_to_sellp<R: Runtime>(
    a: &CsrData<R>,
    blocksize: usize,
    alignment: usize,
) -> Result<SellpData<R>> {
    require_host(a, "csr_to_sellp")?;
    if blocksize == 0 || alignment == 0 {
        return Err(Error::InvalidArgument {
            arg: "blocksize/alignment",
            reason: "must be nonzero".to_string(),
        });
    }
    let device = a.values().device().clone();
    let nrows = a.nrows();
    let numblocks = nrows.div_ceil(blocksize);

    crate::dispatch_dtype!(a.dtype(), T => {
        let (row_ptrs, col_indices, values) = a.host_views::<T>("csr_to_sellp")?;

        let mut slice_ptrs = vec![0i64; numblocks + 1];
        for s in 0..numblocks {
            let row_lo = s * blocksize;
            let row_hi = ((s + 1) * blocksize).min(nrows);
            let widest = (row_lo..row_hi)
                .map(|r| (row_ptrs[r + 1] - row_ptrs[r]) as usize)
                .max()
                .unwrap_or(0);
            let width = widest.div_ceil(alignment) * alignment;
            slice_ptrs[s + 1] = slice_ptrs[s] + (width * blocksize) as i64;
        }

        let total = slice_ptrs[numblocks] as usize;
        let mut cols = vec![-1i64; total];
        let mut vals = vec![T::zero(); total];

        for s in 0..numblocks {
            let base = slice_ptrs[s] as usize;
            let row_lo = s * blocksize;
            let row_hi = ((s + 1) * blocksize).min(nrows);
            for r in row_lo..row_hi {
                let i = r - row_lo;
                let start = row_ptrs[r] as usize;
                let end = row_ptrs[r + 1] as usize;
                for (j, pos) in (start..end).enumerate() {
                    // column-major inside the slice
                    cols[base + j * blocksize + i] = col_indices[pos];
                    vals[base + j * blocksize + i] = values[pos];
                }
            }
        }

        SellpData::new(
            crate::array::Array::from_slice(&slice_ptrs, MemLocation::Host, &device)?,
            crate::array::Array::from_slice(&cols, MemLocation::Host, &device)?,
            crate::array::Array::from_slice(&vals, MemLocation::Host, &device)?,
            a.shape(),
            blocksize,
            alignment,
            numblocks,
            a.nnz(),
        )
    }, "csr_to_sellp")
}

/// Scatter CSR entries into a row-major dense matrix
pub fn csr_to_dense<R: Runtime>(a: &CsrData<R>) -> Result<DenseData<R>> {
    require_host(a, "csr_to_dense")?;
    let device = a.values().device().clone();
    let [nrows, ncols] = a.shape();

    crate::dispatch_dtype!(a.dtype(), T => {
        let (row_ptrs, col_indices, values) = a.host_views::<T>("csr_to_dense")?;
        let mut flat = vec![T::zero(); nrows * ncols];
        for r in 0..nrows {
            for pos in row_ptrs[r] as usize..row_ptrs[r + 1] as usize {
                flat[r * ncols + col_indices[pos] as usize] = values[pos];
            }
        }
        DenseData::from_slice(&flat, a.shape(), MajorOrder::Row, MemLocation::Host, &device)
    }, "csr_to_dense")
}

/// Compress a dense matrix into CSR, dropping explicit zeros
pub fn dense_to_csr<R: Runtime>(a: &DenseData<R>) -> Result<CsrData<R>> {
    require_host(a, "dense_to_csr")?;
    let device = a.values().device().clone();
    let [nrows, ncols] = a.shape();

    crate::dispatch_dtype!(a.dtype(), T => {
        let flat: Vec<T> = a.values().to_vec()?;
        let at = |r: usize, c: usize| match a.major() {
            MajorOrder::Row => flat[r * ncols + c],
            MajorOrder::Col => flat[c * nrows + r],
        };

        let mut row_ptrs = vec![0i64; nrows + 1];
        let mut cols: Vec<i64> = Vec::new();
        let mut vals: Vec<T> = Vec::new();
        for r in 0..nrows {
            for c in 0..ncols {
                let v = at(r, c);
                if v != T::zero() {
                    cols.push(c as i64);
                    vals.push(v);
                }
            }
            row_ptrs[r + 1] = cols.len() as i64;
        }

        CsrData::from_slices(&row_ptrs, &cols, &vals, a.shape(), MemLocation::Host, &device)
    }, "dense_to_csr")
}
