//! Triangular solve traits: exact substitution and the sweep approximation.

use crate::array::Array;
use crate::error::Result;
use crate::runtime::Runtime;
use crate::sparse::CsrData;

/// Solves with the triangular factors produced by the preconditioner setups.
///
/// Two flavors: exact forward/backward substitution, and an approximate
/// solve that runs a fixed number of Jacobi sweeps against the factor. The
/// sweep variant trades accuracy for parallelism; factorization-based
/// preconditioners select between them through their
/// [`TriSolver`](crate::precond::TriSolver) parameter.
pub trait TriangularOps<R: Runtime> {
    /// Exact forward substitution `L·x = b` over a lower-triangular CSR.
    ///
    /// With `unit_diagonal` the stored diagonal (if any) is ignored and ones
    /// are used; otherwise every row must carry a nonzero diagonal entry or
    /// [`MissingDiagonal`](crate::error::Error::MissingDiagonal) is returned.
    fn trisolve_lower(&self, l: &CsrData<R>, b: &Array<R>, unit_diagonal: bool)
        -> Result<Array<R>>;

    /// Exact backward substitution `U·x = b` over an upper-triangular CSR
    /// with a stored diagonal.
    fn trisolve_upper(&self, u: &CsrData<R>, b: &Array<R>) -> Result<Array<R>>;

    /// Approximate triangular solve by `iters` damped-free Jacobi sweeps:
    /// `x ← D⁻¹·(b − (F − D)·x)` with `D = diag(factor)` given in `diag`.
    ///
    /// `x0` seeds the iteration; passing the previous apply's output warms
    /// the solve across preconditioner applications. The update rule never
    /// inspects triangularity, so the same kernel serves both factors.
    fn jacobi_trisolve_sweeps(
        &self,
        factor: &CsrData<R>,
        diag: &Array<R>,
        b: &Array<R>,
        x0: &Array<R>,
        iters: usize,
    ) -> Result<Array<R>>;
}
