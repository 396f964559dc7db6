//! # sparsr
//!
//! **Iterative sparse solvers and parallel incomplete-factorization
//! preconditioners with a pluggable accelerator runtime.**
//!
//! sparsr solves large sparse linear systems with Krylov and block-relaxation
//! methods, preconditioned by fixed-point incomplete factorizations that are
//! built sweep-by-sweep instead of row-by-row, so setup parallelizes the same
//! way the solves do.
//!
//! ## What's inside
//!
//! - **Solvers**: PCG (single and multi-RHS block), CGS, BiCGSTAB,
//!   block-asynchronous Jacobi with overlapping decompositions, overlap-aware
//!   selective Jacobi
//! - **Preconditioners**: Jacobi, ParILU(0)/ParIC(0), threshold-adaptive
//!   ParILUT/ParICT, externally supplied triangular factors
//! - **Containers**: CSR, COO, ELL, sliced-ELLPACK, and dense multi-RHS
//!   blocks, with explicit host/device placement and format conversions
//! - **Transforms**: block split/merge, transpose, slicing for domain
//!   decomposition, diagonal scaling, pattern utilities
//! - **Runtime seam**: the solver core only talks to [`Runtime`]/
//!   [`RuntimeClient`] traits; the crate ships a CPU reference backend
//!
//! ## Quick start
//!
//! ```
//! use sparsr::prelude::*;
//! use sparsr::precond::Preconditioner;
//! use sparsr::solver::{self, Method, SolverParams};
//!
//! # fn run() -> Result<()> {
//! let device = CpuRuntime::default_device();
//! let client = CpuClient::new(device.clone());
//!
//! // the SPD system [[2,-1],[-1,2]]·x = [1,0]
//! let a = CsrData::from_slices(
//!     &[0, 2, 4],
//!     &[0, 1, 0, 1],
//!     &[2.0f64, -1.0, -1.0, 2.0],
//!     [2, 2],
//!     MemLocation::Host,
//!     &device,
//! )?
//! .to_location(MemLocation::Device, &device)?;
//! let a = SparseMatrix::Csr(a);
//! let b = Array::from_slice(&[1.0f64, 0.0], MemLocation::Device, &device)?;
//! let mut x = Array::zeros(2, DType::F64, MemLocation::Device, &device)?;
//!
//! let mut params = SolverParams::default();
//! let mut precond = Preconditioner::identity();
//! let status = solver::solve(&client, Method::Pcg, &a, &b, &mut x, &mut params, &mut precond)?;
//! assert!(status.is_success());
//! # Ok(())
//! # }
//! # run().unwrap();
//! ```
//!
//! ## Feature flags
//!
//! - `cpu` (default): CPU reference backend
//! - `rayon` (default): multi-threaded sweep kernels; the threshold-adaptive
//!   factorizations require it
//!
//! [`Runtime`]: runtime::Runtime
//! [`RuntimeClient`]: runtime::RuntimeClient

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod array;
pub mod dtype;
pub mod error;
pub mod ops;
pub mod precond;
pub mod runtime;
pub mod solver;
pub mod sparse;
pub mod transform;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::array::{Array, MemLocation};
    pub use crate::dtype::DType;
    pub use crate::error::{Error, Result};
    pub use crate::ops::{SparsrOps, SpmvOps, SweepOps, TriangularOps, VectorOps};
    pub use crate::runtime::{Allocator, Device, Runtime, RuntimeClient};
    pub use crate::sparse::{
        CooData, CsrData, DenseData, EllData, FillMode, MajorOrder, SellpData, SparseMatrix,
        SparseStorage, StorageFormat,
    };

    #[cfg(feature = "cpu")]
    pub use crate::runtime::cpu::{CpuClient, CpuDevice, CpuRuntime};
}

/// Default runtime for the enabled backend set
#[cfg(feature = "cpu")]
pub type DefaultRuntime = runtime::cpu::CpuRuntime;
