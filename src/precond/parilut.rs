//! ParILUT / ParICT adaptive-threshold factorization setup
//!
//! Where ParILU(0) freezes the sparsity pattern up front, these engines let
//! the pattern breathe: each round proposes candidate positions from the
//! product pattern, admits them with zero values, refines everything with a
//! fixed-point sweep, then evicts the weakest entries so the fill count
//! shrinks geometrically toward `nnz(A) × atol`. The eviction threshold is
//! an order statistic found by randomized quickselect over the off-diagonal
//! magnitudes. Pattern surgery runs on host triples; the numeric sweeps go
//! through the client kernels like the fixed-pattern engines.

use super::Preconditioner;
#[cfg(not(feature = "rayon"))]
use crate::error::Error;
use crate::error::Result;
use crate::ops::SparsrOps;
use crate::runtime::{Runtime, RuntimeClient};
use crate::sparse::SparseMatrix;

#[cfg(feature = "rayon")]
use super::parilu::{
    lower_with_diag, package_lu, require_nonzero_diagonal, split_lu, stage_host_csr, symmetrize,
};
#[cfg(feature = "rayon")]
use crate::array::MemLocation;
#[cfg(feature = "rayon")]
use crate::dtype::Element;
#[cfg(feature = "rayon")]
use crate::sparse::{CooData, CsrData, FillMode, SparseStorage};
#[cfg(feature = "rayon")]
use crate::transform;
#[cfg(feature = "rayon")]
use rand::rngs::StdRng;
#[cfg(feature = "rayon")]
use rand::{Rng, SeedableRng};
#[cfg(feature = "rayon")]
use std::cmp::Ordering;
#[cfg(feature = "rayon")]
use std::collections::BTreeSet;

#[cfg(feature = "rayon")]
const SELECT_SEED: u64 = 42;

/// ParILUT: incomplete LU with a threshold-adapted pattern.
#[cfg(feature = "rayon")]
pub(crate) fn setup_parilut<R, C>(
    pre: &mut Preconditioner<R>,
    client: &C,
    a: &SparseMatrix<R>,
) -> Result<()>
where
    R: Runtime,
    C: RuntimeClient<R> + SparsrOps<R>,
{
    let host_a = stage_host_csr(a, "parilut setup")?;
    transform::expect_square(&host_a)?;
    require_nonzero_diagonal(&host_a)?;
    crate::dispatch_dtype!(host_a.dtype(), T => {
        adaptive_lu::<R, C, T>(pre, client, &host_a)
    }, "parilut setup")
}

#[cfg(not(feature = "rayon"))]
pub(crate) fn setup_parilut<R, C>(
    _pre: &mut Preconditioner<R>,
    _client: &C,
    _a: &SparseMatrix<R>,
) -> Result<()>
where
    R: Runtime,
    C: RuntimeClient<R> + SparsrOps<R>,
{
    Err(Error::UnsupportedOperation {
        op: "parilut setup",
        reason: "requires the rayon feature",
    })
}

/// ParICT: incomplete Cholesky with a threshold-adapted lower pattern.
///
/// The input is symmetrized first; a non-positive pivot during the sweeps
/// surfaces as [`NotPositiveDefinite`](crate::error::Error::NotPositiveDefinite).
#[cfg(feature = "rayon")]
pub(crate) fn setup_parict<R, C>(
    pre: &mut Preconditioner<R>,
    client: &C,
    a: &SparseMatrix<R>,
) -> Result<()>
where
    R: Runtime,
    C: RuntimeClient<R> + SparsrOps<R>,
{
    let host_a = stage_host_csr(a, "parict setup")?;
    transform::expect_square(&host_a)?;
    let sym = symmetrize(&host_a)?;
    require_nonzero_diagonal(&sym)?;
    crate::dispatch_dtype!(sym.dtype(), T => {
        adaptive_ic::<R, C, T>(pre, client, &sym)
    }, "parict setup")
}

#[cfg(not(feature = "rayon"))]
pub(crate) fn setup_parict<R, C>(
    _pre: &mut Preconditioner<R>,
    _client: &C,
    _a: &SparseMatrix<R>,
) -> Result<()>
where
    R: Runtime,
    C: RuntimeClient<R> + SparsrOps<R>,
{
    Err(Error::UnsupportedOperation {
        op: "parict setup",
        reason: "requires the rayon feature",
    })
}

#[cfg(feature = "rayon")]
fn adaptive_lu<R, C, T>(pre: &mut Preconditioner<R>, client: &C, a: &CsrData<R>) -> Result<()>
where
    R: Runtime,
    C: RuntimeClient<R> + SparsrOps<R>,
    T: Element,
{
    let device = client.device().clone();
    let (l0, u0) = split_lu(a)?;
    let mut l = Factor::<T>::from_csr(&l0, "parilut setup")?;
    let mut u = Factor::<T>::from_csr(&u0, "parilut setup")?;
    let src = Factor::<T>::from_csr(a, "parilut setup")?;

    let l_target = fill_target(l.nnz(), l.n, pre.params.atol);
    let u_target = fill_target(u.nnz(), u.n, pre.params.atol);
    let mut rng = StdRng::seed_from_u64(SELECT_SEED);

    for round in 0..pre.params.sweeps {
        let remaining = pre.params.sweeps - round;

        // (a) candidate positions: pattern(A) ∪ pattern(L·U) minus current
        let (l_cand, u_cand) = lu_candidates(&l, &u, &src);

        // (b) rate the candidates against the current factors
        let ut = u.transpose();
        let worst = worst_residual(&l, &ut, &src, &l_cand).max(worst_residual(&l, &ut, &src, &u_cand));
        log::trace!(
            "parilut round {round}: {} candidates, max residual {worst:.3e}",
            l_cand.len() + u_cand.len()
        );

        // (c) admit them with zero values
        l.insert_zeros(&l_cand);
        u.insert_zeros(&u_cand);

        // (d) refine on the widened pattern
        device_lu_sweep(client, &src, &mut l, &mut u)?;

        // (e) per-factor eviction thresholds
        let l_thr = select_threshold(&mut rng, &l, remaining, l_target);
        let u_thr = select_threshold(&mut rng, &u, remaining, u_target);

        // (f) evict small off-diagonal entries
        l.remove_below(l_thr);
        u.remove_below(u_thr);

        // (g) settle the survivors
        device_lu_sweep(client, &src, &mut l, &mut u)?;

        log::debug!(
            "parilut round {round}: nnz(L) {} nnz(U) {}",
            l.nnz(),
            u.nnz()
        );
    }

    let l_host = l.to_csr::<R>(FillMode::Lower, &device)?;
    let u_host = u.to_csr::<R>(FillMode::Upper, &device)?;
    package_lu(pre, client, l_host, u_host)
}

#[cfg(feature = "rayon")]
fn adaptive_ic<R, C, T>(pre: &mut Preconditioner<R>, client: &C, sym: &CsrData<R>) -> Result<()>
where
    R: Runtime,
    C: RuntimeClient<R> + SparsrOps<R>,
    T: Element,
{
    let device = client.device().clone();
    let l0 = lower_with_diag(sym)?;
    let mut l = Factor::<T>::from_csr(&l0, "parict setup")?;
    let src = l.clone();

    let l_target = fill_target(l.nnz(), l.n, pre.params.atol);
    let mut rng = StdRng::seed_from_u64(SELECT_SEED);

    for round in 0..pre.params.sweeps {
        let remaining = pre.params.sweeps - round;

        let lt = l.transpose();
        let cand = ic_candidates(&l, &lt, &src);
        let worst = worst_residual(&l, &l, &src, &cand);
        log::trace!(
            "parict round {round}: {} candidates, max residual {worst:.3e}",
            cand.len()
        );

        l.insert_zeros(&cand);
        device_ic_sweep(client, &src, &mut l)?;

        let thr = select_threshold(&mut rng, &l, remaining, l_target);
        l.remove_below(thr);
        device_ic_sweep(client, &src, &mut l)?;

        log::debug!("parict round {round}: nnz(L) {}", l.nnz());
    }

    let l_host = l.to_csr::<R>(FillMode::Lower, &device)?;
    let u_host = transform::transpose(&SparseMatrix::Csr(l_host.clone()))?;
    package_lu(pre, client, l_host, u_host)
}

/// Host-side CSR triple the adaptive rounds mutate in place.
#[cfg(feature = "rayon")]
#[derive(Clone)]
struct Factor<T> {
    ptrs: Vec<i64>,
    cols: Vec<i64>,
    vals: Vec<T>,
    n: usize,
}

#[cfg(feature = "rayon")]
impl<T: Element> Factor<T> {
    fn from_csr<R: Runtime>(csr: &CsrData<R>, op: &'static str) -> Result<Self> {
        let (ptrs, cols, vals) = csr.host_views::<T>(op)?;
        Ok(Self {
            ptrs: ptrs.to_vec(),
            cols: cols.to_vec(),
            vals: vals.to_vec(),
            n: csr.nrows(),
        })
    }

    fn to_csr<R: Runtime>(&self, mode: FillMode, device: &R::Device) -> Result<CsrData<R>> {
        Ok(CsrData::from_slices(
            &self.ptrs,
            &self.cols,
            &self.vals,
            [self.n, self.n],
            MemLocation::Host,
            device,
        )?
        .with_fill_mode(mode))
    }

    fn nnz(&self) -> usize {
        self.cols.len()
    }

    fn row(&self, r: usize) -> std::ops::Range<usize> {
        self.ptrs[r] as usize..self.ptrs[r + 1] as usize
    }

    fn contains(&self, r: usize, c: usize) -> bool {
        self.cols[self.row(r)].binary_search(&(c as i64)).is_ok()
    }

    /// Stored value at (r, c), zero when the position is not retained.
    fn get(&self, r: usize, c: usize) -> T {
        let range = self.row(r);
        match self.cols[range.clone()].binary_search(&(c as i64)) {
            Ok(off) => self.vals[range.start + off],
            Err(_) => T::zero(),
        }
    }

    /// Column-sorted transpose by counting sort.
    fn transpose(&self) -> Self {
        let mut counts = vec![0i64; self.n + 1];
        for &c in &self.cols {
            counts[c as usize + 1] += 1;
        }
        for i in 0..self.n {
            counts[i + 1] += counts[i];
        }
        let ptrs = counts.clone();
        let mut cols = vec![0i64; self.nnz()];
        let mut vals = vec![T::zero(); self.nnz()];
        let mut next = counts;
        for r in 0..self.n {
            for p in self.row(r) {
                let c = self.cols[p] as usize;
                let slot = next[c] as usize;
                cols[slot] = r as i64;
                vals[slot] = self.vals[p];
                next[c] += 1;
            }
        }
        Self {
            ptrs,
            cols,
            vals,
            n: self.n,
        }
    }

    /// Merge zero-valued entries at `cands`, which must be sorted by
    /// (row, col) and disjoint from the current pattern.
    fn insert_zeros(&mut self, cands: &[(usize, usize)]) {
        if cands.is_empty() {
            return;
        }
        let mut ptrs = Vec::with_capacity(self.ptrs.len());
        ptrs.push(0i64);
        let mut cols = Vec::with_capacity(self.nnz() + cands.len());
        let mut vals = Vec::with_capacity(self.nnz() + cands.len());
        let mut ci = 0;
        for r in 0..self.n {
            let range = self.row(r);
            let mut p = range.start;
            loop {
                let cand = (ci < cands.len() && cands[ci].0 == r).then(|| cands[ci].1 as i64);
                match cand {
                    Some(c) if p >= range.end || c < self.cols[p] => {
                        cols.push(c);
                        vals.push(T::zero());
                        ci += 1;
                    }
                    _ if p < range.end => {
                        cols.push(self.cols[p]);
                        vals.push(self.vals[p]);
                        p += 1;
                    }
                    _ => break,
                }
            }
            ptrs.push(cols.len() as i64);
        }
        self.ptrs = ptrs;
        self.cols = cols;
        self.vals = vals;
    }

    /// Drop off-diagonal entries with magnitude strictly below `thr`.
    fn remove_below(&mut self, thr: f64) {
        if thr <= 0.0 {
            return;
        }
        let mut ptrs = Vec::with_capacity(self.ptrs.len());
        ptrs.push(0i64);
        let mut cols = Vec::with_capacity(self.nnz());
        let mut vals = Vec::with_capacity(self.nnz());
        for r in 0..self.n {
            for p in self.row(r) {
                if self.cols[p] as usize == r || self.vals[p].abs().to_f64() >= thr {
                    cols.push(self.cols[p]);
                    vals.push(self.vals[p]);
                }
            }
            ptrs.push(cols.len() as i64);
        }
        self.ptrs = ptrs;
        self.cols = cols;
        self.vals = vals;
    }
}

/// Positions of pattern(A) ∪ pattern(L·U) absent from the current factors,
/// partitioned into strictly-lower (for `L`) and strictly-upper (for `U`)
/// lists. Diagonal positions are always retained and never proposed.
#[cfg(feature = "rayon")]
fn lu_candidates<T: Element>(
    l: &Factor<T>,
    u: &Factor<T>,
    src: &Factor<T>,
) -> (Vec<(usize, usize)>, Vec<(usize, usize)>) {
    let mut l_cand = Vec::new();
    let mut u_cand = Vec::new();
    for i in 0..src.n {
        let mut prod = BTreeSet::new();
        for p in l.row(i) {
            let k = l.cols[p] as usize;
            for q in u.row(k) {
                prod.insert(u.cols[q] as usize);
            }
        }
        for p in src.row(i) {
            prod.insert(src.cols[p] as usize);
        }
        for j in prod {
            match j.cmp(&i) {
                Ordering::Less if !l.contains(i, j) => l_cand.push((i, j)),
                Ordering::Greater if !u.contains(i, j) => u_cand.push((i, j)),
                _ => {}
            }
        }
    }
    (l_cand, u_cand)
}

/// Strictly-lower positions of pattern(A) ∪ pattern(L·Lᵗ) absent from `l`.
#[cfg(feature = "rayon")]
fn ic_candidates<T: Element>(
    l: &Factor<T>,
    lt: &Factor<T>,
    src: &Factor<T>,
) -> Vec<(usize, usize)> {
    let mut cand = Vec::new();
    for i in 0..src.n {
        let mut prod = BTreeSet::new();
        for p in l.row(i) {
            let k = l.cols[p] as usize;
            for q in lt.row(k) {
                let j = lt.cols[q] as usize;
                if j < i {
                    prod.insert(j);
                }
            }
        }
        for p in src.row(i) {
            let j = src.cols[p] as usize;
            if j < i {
                prod.insert(j);
            }
        }
        for j in prod {
            if !l.contains(i, j) {
                cand.push((i, j));
            }
        }
    }
    cand
}

/// Largest |a_ij − (L·U)_ij| over the candidate positions. `ut` holds the
/// upper factor transposed so each product is a sorted-merge dot of two
/// rows; passing `l` for both arguments rates `L·Lᵗ` instead.
#[cfg(feature = "rayon")]
fn worst_residual<T: Element>(
    l: &Factor<T>,
    ut: &Factor<T>,
    src: &Factor<T>,
    cands: &[(usize, usize)],
) -> f64 {
    let mut worst = 0.0f64;
    for &(i, j) in cands {
        let li = l.row(i);
        let uj = ut.row(j);
        let dot = sparse_dot(
            &l.cols[li.clone()],
            &l.vals[li],
            &ut.cols[uj.clone()],
            &ut.vals[uj],
        );
        let r = src.get(i, j).to_f64() - dot;
        worst = worst.max(r.abs());
    }
    worst
}

#[cfg(feature = "rayon")]
fn sparse_dot<T: Element>(acols: &[i64], avals: &[T], bcols: &[i64], bvals: &[T]) -> f64 {
    let mut p = 0;
    let mut q = 0;
    let mut s = 0.0;
    while p < acols.len() && q < bcols.len() {
        match acols[p].cmp(&bcols[q]) {
            Ordering::Less => p += 1,
            Ordering::Greater => q += 1,
            Ordering::Equal => {
                s += avals[p].to_f64() * bvals[q].to_f64();
                p += 1;
                q += 1;
            }
        }
    }
    s
}

/// One device round of the incomplete-LU fixed point on the current
/// pattern: rebuilds the union coordinate input with source values (zero
/// on fill), runs the sweep kernel, and writes the refined values back.
#[cfg(feature = "rayon")]
fn device_lu_sweep<R, C, T>(
    client: &C,
    src: &Factor<T>,
    l: &mut Factor<T>,
    u: &mut Factor<T>,
) -> Result<()>
where
    R: Runtime,
    C: RuntimeClient<R> + SparsrOps<R>,
    T: Element,
{
    let device = client.device();
    let upper_nnz = l.nnz() - l.n + u.nnz();
    let mut rows = Vec::with_capacity(upper_nnz);
    let mut cols = Vec::with_capacity(upper_nnz);
    let mut vals = Vec::with_capacity(upper_nnz);
    for r in 0..src.n {
        for p in l.row(r) {
            let c = l.cols[p] as usize;
            if c < r {
                rows.push(r as i64);
                cols.push(c as i64);
                vals.push(src.get(r, c));
            }
        }
        for p in u.row(r) {
            let c = u.cols[p] as usize;
            rows.push(r as i64);
            cols.push(c as i64);
            vals.push(src.get(r, c));
        }
    }
    let a_coo = CooData::from_slices(&rows, &cols, &vals, [src.n, src.n], MemLocation::Host, device)?;
    let mut ut = u.transpose();

    let a_dev = a_coo.to_location(MemLocation::Device, device)?;
    let l_dev = l
        .to_csr::<R>(FillMode::Lower, device)?
        .to_location(MemLocation::Device, device)?;
    let ut_dev = ut
        .to_csr::<R>(FillMode::Lower, device)?
        .to_location(MemLocation::Device, device)?;
    let (l_vals, ut_vals) = client.parilu_sweep(&a_dev, &l_dev, &ut_dev)?;
    l.vals = l_vals.to_vec::<T>()?;
    ut.vals = ut_vals.to_vec::<T>()?;
    *u = ut.transpose();
    Ok(())
}

/// One device round of the incomplete-Cholesky fixed point on the current
/// lower pattern.
#[cfg(feature = "rayon")]
fn device_ic_sweep<R, C, T>(client: &C, src: &Factor<T>, l: &mut Factor<T>) -> Result<()>
where
    R: Runtime,
    C: RuntimeClient<R> + SparsrOps<R>,
    T: Element,
{
    let device = client.device();
    let mut rows = Vec::with_capacity(l.nnz());
    let mut cols = Vec::with_capacity(l.nnz());
    let mut vals = Vec::with_capacity(l.nnz());
    for r in 0..l.n {
        for p in l.row(r) {
            let c = l.cols[p] as usize;
            rows.push(r as i64);
            cols.push(c as i64);
            vals.push(src.get(r, c));
        }
    }
    let a_coo = CooData::from_slices(&rows, &cols, &vals, [l.n, l.n], MemLocation::Host, device)?;

    let a_dev = a_coo.to_location(MemLocation::Device, device)?;
    let l_dev = l
        .to_csr::<R>(FillMode::Lower, device)?
        .to_location(MemLocation::Device, device)?;
    let l_vals = client.paric_sweep(&a_dev, &l_dev)?;
    l.vals = l_vals.to_vec::<T>()?;
    Ok(())
}

/// Final retained-entry count a factor decays toward: `nnz₀ × atol`,
/// never below one entry per row so the diagonal always fits.
#[cfg(feature = "rayon")]
fn fill_target(nnz0: usize, n: usize, atol: f64) -> usize {
    (((nnz0 as f64) * atol).ceil() as usize).max(n)
}

/// Eviction threshold for one factor. Interpolates the retained count
/// geometrically from `current` to `target` over the remaining rounds and
/// returns the order statistic separating the entries to drop; 0 when no
/// removal is due this round.
#[cfg(feature = "rayon")]
fn select_threshold<T: Element>(
    rng: &mut StdRng,
    f: &Factor<T>,
    remaining: usize,
    target: usize,
) -> f64 {
    let current = f.nnz();
    if current <= target {
        return 0.0;
    }
    let allowed = ((target as f64).powf(1.0 / remaining as f64)
        * (current as f64).powf((remaining as f64 - 1.0) / remaining as f64))
    .ceil() as usize;
    let num_rm = current.saturating_sub(allowed);
    if num_rm == 0 {
        return 0.0;
    }

    // diagonal entries never enter the pool
    let mut pool = Vec::with_capacity(current - f.n);
    for r in 0..f.n {
        for p in f.row(r) {
            if f.cols[p] as usize != r {
                pool.push(f.vals[p].abs().to_f64());
            }
        }
    }
    if num_rm >= pool.len() {
        return f64::INFINITY;
    }
    kth_smallest(rng, &mut pool, num_rm)
}

/// k-th smallest (0-indexed) by randomized quickselect; reorders the pool.
#[cfg(feature = "rayon")]
fn kth_smallest(rng: &mut StdRng, pool: &mut [f64], k: usize) -> f64 {
    let mut lo = 0usize;
    let mut hi = pool.len();
    loop {
        if hi - lo <= 1 {
            return pool[lo];
        }
        let pivot = pool[rng.gen_range(lo..hi)];
        let mut lt = lo;
        let mut i = lo;
        let mut gt = hi;
        while i < gt {
            if pool[i] < pivot {
                pool.swap(lt, i);
                lt += 1;
                i += 1;
            } else if pool[i] > pivot {
                gt -= 1;
                pool.swap(i, gt);
            } else {
                i += 1;
            }
        }
        if k < lt {
            hi = lt;
        } else if k < gt {
            return pivot;
        } else {
            lo = gt;
        }
    }
}
