//! ParILU(0) / ParIC(0) fixed-point factorization setup
//!
//! Instead of a sequential Gaussian elimination, both engines iterate the
//! factorization equations on a fixed sparsity pattern: every retained
//! position is recomputed from the factor values of the previous round, so
//! one round is embarrassingly parallel and a handful of rounds is usually
//! as good a preconditioner as the exact incomplete factorization. Symbolic
//! work (splitting, transposes, merges) runs on host copies; the numeric
//! rounds go through the client's sweep kernels on device-resident data.

use super::{levels, Preconditioner, TriSolver};
use crate::array::{Array, MemLocation};
use crate::dtype::Element;
use crate::error::{Error, Result};
use crate::ops::SparsrOps;
use crate::runtime::{Runtime, RuntimeClient};
use crate::sparse::{convert, CooData, CsrData, FillMode, SparseMatrix, SparseStorage};
use crate::transform;

/// Bring the input onto the host in CSR form, converting COO if needed.
pub(crate) fn stage_host_csr<R: Runtime>(
    a: &SparseMatrix<R>,
    op: &'static str,
) -> Result<CsrData<R>> {
    let host = match a.location() {
        MemLocation::Host => a.clone(),
        MemLocation::Device => {
            let device = match a {
                SparseMatrix::Csr(d) => d.values().device().clone(),
                SparseMatrix::Coo(d) => d.values().device().clone(),
                _ => {
                    return Err(Error::UnsupportedFormat {
                        format: a.format(),
                        op,
                    })
                }
            };
            a.to_location(MemLocation::Host, &device)?
        }
    };
    match host {
        SparseMatrix::Csr(csr) => Ok(csr),
        SparseMatrix::Coo(coo) => convert::coo_to_csr(&coo),
        other => Err(Error::UnsupportedFormat {
            format: other.format(),
            op,
        }),
    }
}

/// Every row must store a nonzero diagonal entry; the sweeps pivot on it.
pub(crate) fn require_nonzero_diagonal<R: Runtime>(a: &CsrData<R>) -> Result<()> {
    crate::dispatch_dtype!(a.dtype(), T => {
        let (row_ptrs, cols, vals) = a.host_views::<T>("precond setup")?;
        for r in 0..a.nrows() {
            let hit = (row_ptrs[r] as usize..row_ptrs[r + 1] as usize)
                .find(|&p| cols[p] as usize == r);
            match hit {
                Some(p) if vals[p].to_f64() != 0.0 => {}
                _ => {
                    log::warn!("precond setup: row {r} has no usable diagonal");
                    return Err(Error::MissingDiagonal { row: r });
                }
            }
        }
        Ok(())
    }, "precond setup")
}

/// Split a host CSR matrix into the initial ILU factors: `L` = strictly
/// lower part plus an explicit unit diagonal, `U` = upper part including
/// the diagonal. Columns stay sorted.
pub(crate) fn split_lu<R: Runtime>(a: &CsrData<R>) -> Result<(CsrData<R>, CsrData<R>)> {
    let n = transform::expect_square(a)?;
    let device = a.values().device().clone();

    crate::dispatch_dtype!(a.dtype(), T => {
        let (row_ptrs, cols, vals) = a.host_views::<T>("split_lu")?;

        let mut l_ptrs = vec![0i64; n + 1];
        let mut l_cols = Vec::new();
        let mut l_vals = Vec::new();
        let mut u_ptrs = vec![0i64; n + 1];
        let mut u_cols = Vec::new();
        let mut u_vals = Vec::new();

        for r in 0..n {
            for p in row_ptrs[r] as usize..row_ptrs[r + 1] as usize {
                let c = cols[p] as usize;
                if c < r {
                    l_cols.push(cols[p]);
                    l_vals.push(vals[p]);
                } else {
                    u_cols.push(cols[p]);
                    u_vals.push(vals[p]);
                }
            }
            l_cols.push(r as i64);
            l_vals.push(T::one());
            l_ptrs[r + 1] = l_cols.len() as i64;
            u_ptrs[r + 1] = u_cols.len() as i64;
        }

        let l = CsrData::from_slices(&l_ptrs, &l_cols, &l_vals, [n, n], MemLocation::Host, &device)?
            .with_fill_mode(FillMode::Lower);
        let u = CsrData::from_slices(&u_ptrs, &u_cols, &u_vals, [n, n], MemLocation::Host, &device)?
            .with_fill_mode(FillMode::Upper);
        Ok((l, u))
    }, "split_lu")
}

/// Lower triangle including the diagonal, tagged `Lower`.
pub(crate) fn lower_with_diag<R: Runtime>(a: &CsrData<R>) -> Result<CsrData<R>> {
    triangle(a, true)
}

/// Strictly lower triangle, tagged `Lower`.
pub(crate) fn strict_lower<R: Runtime>(a: &CsrData<R>) -> Result<CsrData<R>> {
    triangle(a, false)
}

fn triangle<R: Runtime>(a: &CsrData<R>, keep_diag: bool) -> Result<CsrData<R>> {
    let n = transform::expect_square(a)?;
    let device = a.values().device().clone();

    crate::dispatch_dtype!(a.dtype(), T => {
        let (row_ptrs, cols, vals) = a.host_views::<T>("triangle")?;
        let mut t_ptrs = vec![0i64; n + 1];
        let mut t_cols = Vec::new();
        let mut t_vals = Vec::new();
        for r in 0..n {
            for p in row_ptrs[r] as usize..row_ptrs[r + 1] as usize {
                let c = cols[p] as usize;
                if c < r || (keep_diag && c == r) {
                    t_cols.push(cols[p]);
                    t_vals.push(vals[p]);
                }
            }
            t_ptrs[r + 1] = t_cols.len() as i64;
        }
        let t = CsrData::from_slices(&t_ptrs, &t_cols, &t_vals, [n, n], MemLocation::Host, &device)?;
        Ok(t.with_fill_mode(FillMode::Lower))
    }, "triangle")
}

/// `(A + Aᵗ) / 2` on the union pattern, built through duplicate-summing
/// COO compression.
pub(crate) fn symmetrize<R: Runtime>(a: &CsrData<R>) -> Result<CsrData<R>> {
    let n = transform::expect_square(a)?;
    let device = a.values().device().clone();

    crate::dispatch_dtype!(a.dtype(), T => {
        let (row_ptrs, cols, vals) = a.host_views::<T>("symmetrize")?;
        let nnz = vals.len();
        let mut rows2 = Vec::with_capacity(2 * nnz);
        let mut cols2 = Vec::with_capacity(2 * nnz);
        let mut vals2 = Vec::with_capacity(2 * nnz);
        for r in 0..n {
            for p in row_ptrs[r] as usize..row_ptrs[r + 1] as usize {
                let half = T::from_f64(vals[p].to_f64() * 0.5);
                rows2.push(r as i64);
                cols2.push(cols[p]);
                vals2.push(half);
                rows2.push(cols[p]);
                cols2.push(r as i64);
                vals2.push(half);
            }
        }
        let coo = CooData::from_slices(&rows2, &cols2, &vals2, [n, n], MemLocation::Host, &device)?;
        convert::coo_to_csr(&coo)
    }, "symmetrize")
}

/// Package finished host factors into the descriptor: merged form,
/// extracted diagonals, device residency, and sweep-solver scratch.
pub(crate) fn package_lu<R, C>(
    pre: &mut Preconditioner<R>,
    client: &C,
    l_host: CsrData<R>,
    u_host: CsrData<R>,
) -> Result<()>
where
    R: Runtime,
    C: RuntimeClient<R> + SparsrOps<R>,
{
    let n = l_host.nrows();
    let dtype = l_host.dtype();
    let m_host = transform::lumerge(
        &SparseMatrix::Csr(strict_lower(&l_host)?),
        &SparseMatrix::Csr(u_host.clone()),
    )?;
    let (d_host, d2_host) = crate::dispatch_dtype!(l_host.dtype(), T => {
        (u_host.diagonal::<T>()?, l_host.diagonal::<T>()?)
    }, "precond packaging");

    let device = client.device();
    pre.l = Some(l_host.to_location(MemLocation::Device, device)?);
    pre.u = Some(u_host.to_location(MemLocation::Device, device)?);
    pre.m = Some(m_host.to_location(MemLocation::Device, device)?);
    pre.d = Some(d_host.to_location(MemLocation::Device, device)?);
    pre.d2 = Some(d2_host.to_location(MemLocation::Device, device)?);
    if let TriSolver::JacobiSweeps { .. } = pre.params.trisolver {
        pre.work1 = Some(Array::zeros(n, dtype, MemLocation::Device, device)?);
        pre.work2 = Some(Array::zeros(n, dtype, MemLocation::Device, device)?);
    }
    Ok(())
}

/// ParILU(0): fixed-point incomplete LU on the (optionally level-expanded)
/// pattern of `A`.
pub(crate) fn setup_parilu<R, C>(
    pre: &mut Preconditioner<R>,
    client: &C,
    a: &SparseMatrix<R>,
) -> Result<()>
where
    R: Runtime,
    C: RuntimeClient<R> + SparsrOps<R>,
{
    let host_a = stage_host_csr(a, "parilu setup")?;
    transform::expect_square(&host_a)?;
    require_nonzero_diagonal(&host_a)?;

    let work = if pre.params.levels == 0 {
        host_a
    } else {
        levels::fill_pattern(&host_a, pre.params.levels)?
    };
    let (l, u) = split_lu(&work)?;
    let ut = transform::transpose(&SparseMatrix::Csr(u))?;
    let a_coo = convert::csr_to_coo(&work)?;

    let device = client.device();
    let a_dev = a_coo.to_location(MemLocation::Device, device)?;
    let mut l_dev = l.to_location(MemLocation::Device, device)?;
    let mut ut_dev = ut.to_location(MemLocation::Device, device)?;
    for _ in 0..pre.params.sweeps {
        let (l_vals, ut_vals) = client.parilu_sweep(&a_dev, &l_dev, &ut_dev)?;
        l_dev.update_values(l_vals)?;
        ut_dev.update_values(ut_vals)?;
    }

    let l_host = l_dev.to_location(MemLocation::Host, device)?;
    let ut_host = ut_dev.to_location(MemLocation::Host, device)?;
    let u_host = transform::transpose(&SparseMatrix::Csr(ut_host))?;
    log::debug!(
        "parilu setup: {} sweeps, nnz(L) {} nnz(U) {}",
        pre.params.sweeps,
        l_host.nnz(),
        u_host.nnz()
    );
    package_lu(pre, client, l_host, u_host)
}

/// ParIC(0): fixed-point incomplete Cholesky on the lower pattern of the
/// symmetrized input.
///
/// A non-positive pivot during the sweeps is a setup fault and surfaces as
/// [`NotPositiveDefinite`](crate::error::Error::NotPositiveDefinite).
pub(crate) fn setup_paric<R, C>(
    pre: &mut Preconditioner<R>,
    client: &C,
    a: &SparseMatrix<R>,
) -> Result<()>
where
    R: Runtime,
    C: RuntimeClient<R> + SparsrOps<R>,
{
    let host_a = stage_host_csr(a, "paric setup")?;
    transform::expect_square(&host_a)?;
    let sym = symmetrize(&host_a)?;
    require_nonzero_diagonal(&sym)?;

    let work = if pre.params.levels == 0 {
        sym
    } else {
        levels::fill_pattern(&sym, pre.params.levels)?
    };
    let l = lower_with_diag(&work)?;
    let a_coo = convert::csr_to_coo(&l)?;

    let device = client.device();
    let a_dev = a_coo.to_location(MemLocation::Device, device)?;
    let mut l_dev = l.to_location(MemLocation::Device, device)?;
    for _ in 0..pre.params.sweeps {
        let l_vals = client.paric_sweep(&a_dev, &l_dev)?;
        l_dev.update_values(l_vals)?;
    }

    let l_host = l_dev.to_location(MemLocation::Host, device)?;
    let u_host = transform::transpose(&SparseMatrix::Csr(l_host.clone()))?;
    log::debug!(
        "paric setup: {} sweeps, nnz(L) {}",
        pre.params.sweeps,
        l_host.nnz()
    );
    package_lu(pre, client, l_host, u_host)
}
