//! Stationary-iteration and factorization sweep kernels.

use crate::array::Array;
use crate::error::Result;
use crate::runtime::Runtime;
use crate::sparse::{CooData, CsrData};

/// One-shot sweep kernels consumed by the fixed-point factorizations and the
/// block-asynchronous relaxation drivers.
///
/// The factorization sweeps are Jacobi-style: every nonzero is recomputed
/// from the values the factors held when the sweep started, so entries can
/// be processed in any order (or in parallel) and the result is independent
/// of traversal order. Backends return fresh value arrays; the caller swaps
/// them into the factor containers between sweeps.
pub trait SweepOps<R: Runtime> {
    /// One fixed-point sweep of the incomplete-LU equations.
    ///
    /// `a` holds the union pattern of both factors in coordinate form with
    /// the source matrix's values (zero on fill positions). `l` is lower
    /// triangular with an explicitly stored unit diagonal; `ut` is the upper
    /// factor stored transposed, so each entry's dependency walk is a merge
    /// of one `l` row and one `ut` row. For an entry at (i, j) the sweep
    /// computes
    ///
    /// ```text
    ///   s = a[i,j] − Σ_{k < min(i,j)} L[i,k]·U[k,j]
    /// ```
    ///
    /// and writes `s / U[j,j]` into `L[i,j]` when `i > j`, or `s` into
    /// `U[i,j]` otherwise. Unit-diagonal positions of `l` are left at one.
    ///
    /// Returns the new value arrays `(l_values, ut_values)`.
    fn parilu_sweep(
        &self,
        a: &CooData<R>,
        l: &CsrData<R>,
        ut: &CsrData<R>,
    ) -> Result<(Array<R>, Array<R>)>;

    /// One fixed-point sweep of the incomplete-Cholesky equations.
    ///
    /// `a` holds the lower-triangular pattern (including the diagonal) of
    /// the symmetrized source matrix; `l` shares that pattern. Off-diagonal
    /// entries get `(a[i,j] − Σ_{k<j} L[i,k]·L[j,k]) / L[j,j]`; diagonal
    /// entries get the square root of the analogous partial sum.
    ///
    /// # Errors
    /// [`NotPositiveDefinite`](crate::error::Error::NotPositiveDefinite) when
    /// a diagonal partial sum is not strictly positive, naming the row.
    fn paric_sweep(&self, a: &CooData<R>, l: &CsrData<R>) -> Result<Array<R>>;

    /// One round of block-relaxation over overlapping diagonal/off-diagonal
    /// splits.
    ///
    /// Each element of `parts` is a `(D, R)` pair covering the whole matrix
    /// (`D + R = A`), with block boundaries staggered between pairs. For
    /// each pair in order the kernel freezes the off-block contribution
    /// `z = b − R·x` at the entering iterate, then refines `x` with
    /// `localiter` Jacobi sweeps against `D` alone:
    ///
    /// ```text
    ///   x ← diag(A)⁻¹ · (z − (D − diag(A))·x)
    /// ```
    ///
    /// `diag` carries `diag(A)` (equal to `diag(D)` for every pair, since a
    /// row's diagonal always falls inside its own block).
    fn bajac_overlap_sweep(
        &self,
        parts: &[(CsrData<R>, CsrData<R>)],
        diag: &Array<R>,
        b: &Array<R>,
        x: &Array<R>,
        localiter: usize,
    ) -> Result<Array<R>>;

    /// One pass of selective Jacobi updates over an explicit index list.
    ///
    /// For each row index `r` in `indices` (I64, duplicates allowed, order
    /// respected) the kernel recomputes
    ///
    /// ```text
    ///   x[r] = (b[r] − Σ_{c≠r} A[r,c]·x[c]) / A[r,r]
    /// ```
    ///
    /// using the freshest values of `x`, so a row listed twice is refined
    /// twice within the pass. Rows not listed keep their entering value.
    fn jacobi_select_update(
        &self,
        a: &CsrData<R>,
        indices: &Array<R>,
        b: &Array<R>,
        x: &Array<R>,
    ) -> Result<Array<R>>;
}
