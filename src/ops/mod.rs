//! Client operation traits
//!
//! One trait per kernel family; backends implement them on their client type.
//! The solver core and the preconditioner engines are written against these
//! traits only, never against a concrete backend.

mod spmv;
mod sweeps;
mod trisolve;
mod vector;

pub use spmv::SpmvOps;
pub use sweeps::SweepOps;
pub use trisolve::TriangularOps;
pub use vector::VectorOps;

use crate::runtime::Runtime;

/// Everything the solver core needs from a backend, in one bound.
///
/// Blanket-implemented for any client that provides the four kernel
/// families, so backends never implement this trait directly.
pub trait SparsrOps<R: Runtime>:
    VectorOps<R> + SpmvOps<R> + TriangularOps<R> + SweepOps<R>
{
}

impl<R, C> SparsrOps<R> for C
where
    R: Runtime,
    C: VectorOps<R> + SpmvOps<R> + TriangularOps<R> + SweepOps<R>,
{
}
