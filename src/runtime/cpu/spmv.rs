//! Format-polymorphic SpMV for the CPU backend
//!
//! One row-parallel kernel per storage format; the entry point dispatches on
//! the matrix variant. Row dot products accumulate in f64 and are cast back
//! to the storage dtype on the way out.

#[cfg(feature = "rayon")]
use rayon::prelude::*;

use super::{typed_view, CpuClient, CpuRuntime};
use crate::array::Array;
use crate::dtype::Element;
use crate::error::{Error, Result};
use crate::ops::SpmvOps;
use crate::runtime::RuntimeClient;
use crate::sparse::{
    CooData, CsrData, DenseData, EllData, MajorOrder, SellpData, SparseMatrix, SparseStorage,
};

impl SpmvOps<CpuRuntime> for CpuClient {
    fn spmv(
        &self,
        alpha: f64,
        a: &SparseMatrix<CpuRuntime>,
        x: &Array<CpuRuntime>,
        beta: f64,
        y: &Array<CpuRuntime>,
    ) -> Result<Array<CpuRuntime>> {
        let [nrows, ncols] = a.shape();
        if x.len() != ncols {
            return Err(Error::ShapeMismatch {
                expected: vec![ncols],
                got: vec![x.len()],
            });
        }
        if y.len() != nrows {
            return Err(Error::ShapeMismatch {
                expected: vec![nrows],
                got: vec![y.len()],
            });
        }
        if x.dtype() != a.dtype() || y.dtype() != a.dtype() {
            return Err(Error::DTypeMismatch {
                lhs: a.dtype(),
                rhs: if x.dtype() != a.dtype() { x.dtype() } else { y.dtype() },
            });
        }

        crate::dispatch_dtype!(a.dtype(), T => {
            let xs = typed_view::<T>(x, "spmv")?;
            let ys = typed_view::<T>(y, "spmv")?;
            let out: Vec<T> = match a {
                SparseMatrix::Csr(m) => spmv_csr(m, xs, ys, alpha, beta)?,
                SparseMatrix::Coo(m) => spmv_coo(m, xs, ys, alpha, beta)?,
                SparseMatrix::Ell(m) => spmv_ell(m, xs, ys, alpha, beta)?,
                SparseMatrix::SellP(m) => spmv_sellp(m, xs, ys, alpha, beta)?,
                SparseMatrix::Dense(m) => spmv_dense(m, xs, ys, alpha, beta)?,
            };
            Array::from_slice(&out, x.location(), self.device())
        }, "spmv")
    }
}

#[inline]
fn combine<T: Element>(alpha: f64, acc: f64, beta: f64, yi: T) -> T {
    if beta == 0.0 {
        T::from_f64(alpha * acc)
    } else {
        T::from_f64(alpha * acc + beta * yi.to_f64())
    }
}

fn spmv_csr<T: Element>(
    m: &CsrData<CpuRuntime>,
    xs: &[T],
    ys: &[T],
    alpha: f64,
    beta: f64,
) -> Result<Vec<T>> {
    let row_ptrs = typed_view::<i64>(m.row_ptrs(), "spmv")?;
    let cols = typed_view::<i64>(m.col_indices(), "spmv")?;
    let vals = typed_view::<T>(m.values(), "spmv")?;

    let row = |r: usize| -> T {
        let start = row_ptrs[r] as usize;
        let end = row_ptrs[r + 1] as usize;
        let mut acc = 0.0f64;
        for pos in start..end {
            acc += vals[pos].to_f64() * xs[cols[pos] as usize].to_f64();
        }
        combine(alpha, acc, beta, ys[r])
    };

    #[cfg(feature = "rayon")]
    {
        Ok((0..m.nrows()).into_par_iter().map(row).collect())
    }
    #[cfg(not(feature = "rayon"))]
    {
        Ok((0..m.nrows()).map(row).collect())
    }
}

/// Coordinate scatter; serial because triplets of one row may be anywhere.
fn spmv_coo<T: Element>(
    m: &CooData<CpuRuntime>,
    xs: &[T],
    ys: &[T],
    alpha: f64,
    beta: f64,
) -> Result<Vec<T>> {
    let rows = typed_view::<i64>(m.row_indices(), "spmv")?;
    let cols = typed_view::<i64>(m.col_indices(), "spmv")?;
    let vals = typed_view::<T>(m.values(), "spmv")?;

    let mut acc = vec![0.0f64; m.nrows()];
    for k in 0..vals.len() {
        acc[rows[k] as usize] += vals[k].to_f64() * xs[cols[k] as usize].to_f64();
    }
    Ok((0..m.nrows())
        .map(|r| combine(alpha, acc[r], beta, ys[r]))
        .collect())
}

fn spmv_ell<T: Element>(
    m: &EllData<CpuRuntime>,
    xs: &[T],
    ys: &[T],
    alpha: f64,
    beta: f64,
) -> Result<Vec<T>> {
    let cols = typed_view::<i64>(m.col_indices(), "spmv")?;
    let vals = typed_view::<T>(m.values(), "spmv")?;
    let width = m.max_row_nnz();

    let row = |r: usize| -> T {
        let mut acc = 0.0f64;
        for j in 0..width {
            let c = cols[r * width + j];
            if c < 0 {
                break; // padding is right-aligned within the row
            }
            acc += vals[r * width + j].to_f64() * xs[c as usize].to_f64();
        }
        combine(alpha, acc, beta, ys[r])
    };

    #[cfg(feature = "rayon")]
    {
        Ok((0..m.nrows()).into_par_iter().map(row).collect())
    }
    #[cfg(not(feature = "rayon"))]
    {
        Ok((0..m.nrows()).map(row).collect())
    }
}

fn spmv_sellp<T: Element>(
    m: &SellpData<CpuRuntime>,
    xs: &[T],
    ys: &[T],
    alpha: f64,
    beta: f64,
) -> Result<Vec<T>> {
    let slice_ptrs = typed_view::<i64>(m.slice_ptrs(), "spmv")?;
    let cols = typed_view::<i64>(m.col_indices(), "spmv")?;
    let vals = typed_view::<T>(m.values(), "spmv")?;
    let nrows = m.nrows();
    let bs = m.blocksize();

    let mut out = vec![T::zero(); nrows];
    let slice = |s: usize, chunk: &mut [T]| {
        let base = slice_ptrs[s] as usize;
        let width = (slice_ptrs[s + 1] as usize - base) / bs;
        for (i, slot) in chunk.iter_mut().enumerate() {
            let r = s * bs + i;
            let mut acc = 0.0f64;
            for j in 0..width {
                let c = cols[base + j * bs + i];
                if c < 0 {
                    break; // rest of this lane is padding
                }
                acc += vals[base + j * bs + i].to_f64() * xs[c as usize].to_f64();
            }
            *slot = combine(alpha, acc, beta, ys[r]);
        }
    };

    #[cfg(feature = "rayon")]
    {
        out.par_chunks_mut(bs)
            .enumerate()
            .for_each(|(s, chunk)| slice(s, chunk));
    }
    #[cfg(not(feature = "rayon"))]
    {
        out.chunks_mut(bs)
            .enumerate()
            .for_each(|(s, chunk)| slice(s, chunk));
    }
    Ok(out)
}

fn spmv_dense<T: Element>(
    m: &DenseData<CpuRuntime>,
    xs: &[T],
    ys: &[T],
    alpha: f64,
    beta: f64,
) -> Result<Vec<T>> {
    let vals = typed_view::<T>(m.values(), "spmv")?;
    let [nrows, ncols] = m.shape();
    let major = m.major();

    let row = |r: usize| -> T {
        let mut acc = 0.0f64;
        match major {
            MajorOrder::Row => {
                for c in 0..ncols {
                    acc += vals[r * ncols + c].to_f64() * xs[c].to_f64();
                }
            }
            MajorOrder::Col => {
                for c in 0..ncols {
                    acc += vals[c * nrows + r].to_f64() * xs[c].to_f64();
                }
            }
        }
        combine(alpha, acc, beta, ys[r])
    };

    #[cfg(feature = "rayon")]
    {
        Ok((0..nrows).into_par_iter().map(row).collect())
    }
    #[cfg(not(feature = "rayon"))]
    {
        Ok((0..nrows).map(row).collect())
    }
}
