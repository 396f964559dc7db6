//! Iterative solver drivers
//!
//! Krylov drivers (PCG and its block variant, CGS, BiCGSTAB) and stationary
//! block-relaxation drivers over one shared state machine: validate, form
//! the initial residual, iterate with client kernels, then classify the run
//! from the recomputed true residual. Configuration and feedback travel in
//! a single [`SolverParams`] block, so a caller can inspect iteration
//! counts, residual history, and timings after any run.
//!
//! Non-convergence is a result, not a fault: drivers return
//! `Ok(`[`SolverStatus`]`)` for every completed run and reserve `Err` for
//! structural problems (shape or dtype mismatches, unsupported formats,
//! missing state).
//!
//! ```no_run
//! use sparsr::prelude::*;
//! use sparsr::precond::Preconditioner;
//! use sparsr::solver::{self, Method, SolverParams};
//!
//! # fn demo(client: &CpuClient, a: &SparseMatrix<CpuRuntime>, b: &Array<CpuRuntime>,
//! #         x: &mut Array<CpuRuntime>) -> Result<()> {
//! let mut params = SolverParams::default();
//! let mut precond = Preconditioner::identity();
//! let status = solver::solve(client, Method::Pcg, a, b, x, &mut params, &mut precond)?;
//! assert!(status.is_success());
//! # Ok(())
//! # }
//! ```

mod bicgstab;
mod block_cg;
mod block_jacobi;
mod cg;
mod cgs;
mod common;
mod overlap_jacobi;

pub use bicgstab::bicgstab;
pub use block_cg::block_pcg;
pub use block_jacobi::{block_async_jacobi, BlockAsyncConfig};
pub use cg::pcg;
pub use cgs::pcgs;
pub use overlap_jacobi::{overlap_jacobi, OverlapJacobiConfig};

use std::fmt;

use crate::array::Array;
use crate::error::Result;
use crate::ops::SparsrOps;
use crate::precond::Preconditioner;
use crate::runtime::{Runtime, RuntimeClient};
use crate::sparse::SparseMatrix;

/// Terminal classification of a driver run.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum SolverStatus {
    /// No run has finished yet.
    #[default]
    NotConverged,
    /// Stopping rule satisfied.
    Success,
    /// Budget exhausted while the residual was still shrinking.
    SlowConvergence,
    /// Residual stagnated or grew, or a recurrence broke down.
    Diverged,
    /// Curvature check failed: the operator is not positive definite.
    NotPositiveDefinite,
}

impl SolverStatus {
    /// True for [`Success`](Self::Success).
    pub fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }
}

impl fmt::Display for SolverStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::NotConverged => "not converged",
            Self::Success => "success",
            Self::SlowConvergence => "slow convergence",
            Self::Diverged => "diverged",
            Self::NotPositiveDefinite => "not positive definite",
        })
    }
}

/// Configuration and feedback for one driver run.
///
/// The first four fields configure the run; the rest are feedback, cleared
/// at entry and filled in as the run progresses. The stopping rule is
/// `‖r‖ ≤ max(rtol·‖b‖, atol)`.
#[derive(Clone, Debug)]
pub struct SolverParams {
    /// Iteration budget.
    pub maxiter: usize,
    /// Relative tolerance against `‖b‖`.
    pub rtol: f64,
    /// Absolute residual floor.
    pub atol: f64,
    /// Recording stride: every `verbose` iterations the residual norm and
    /// elapsed time are appended to `res_vec`/`timing` (entry and exit are
    /// always included); 0 records nothing.
    pub verbose: usize,

    /// Iterations taken.
    pub numiter: usize,
    /// Sparse matrix-vector products consumed.
    pub spmv_count: usize,
    /// `‖b − A·x₀‖` at entry.
    pub init_res: f64,
    /// Last recurrence residual norm.
    pub iter_res: f64,
    /// True residual norm recomputed at exit.
    pub final_res: f64,
    /// Wall-clock seconds of the run.
    pub runtime: f64,
    /// Recorded residual norms.
    pub res_vec: Vec<f64>,
    /// Seconds since entry for each recorded residual.
    pub timing: Vec<f64>,
    /// Terminal classification, mirroring the driver's return value.
    pub info: SolverStatus,
}

impl Default for SolverParams {
    fn default() -> Self {
        Self {
            maxiter: 1000,
            rtol: 1e-10,
            atol: 1e-16,
            verbose: 0,
            numiter: 0,
            spmv_count: 0,
            init_res: 0.0,
            iter_res: 0.0,
            final_res: 0.0,
            runtime: 0.0,
            res_vec: Vec::new(),
            timing: Vec::new(),
            info: SolverStatus::NotConverged,
        }
    }
}

impl SolverParams {
    /// Clear the feedback fields for a fresh run; drivers call this at
    /// entry so a params block can travel through repeated solves.
    pub fn reset_feedback(&mut self) {
        self.numiter = 0;
        self.spmv_count = 0;
        self.init_res = 0.0;
        self.iter_res = 0.0;
        self.final_res = 0.0;
        self.runtime = 0.0;
        self.res_vec.clear();
        self.timing.clear();
        self.info = SolverStatus::NotConverged;
    }
}

/// Single right-hand-side method selector for [`solve`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Method {
    /// Preconditioned conjugate gradient (SPD systems).
    Pcg,
    /// Preconditioned conjugate gradient squared.
    Pcgs,
    /// Stabilized bi-conjugate gradient.
    Bicgstab,
}

/// Run the selected single right-hand-side driver on `A·x = b`.
pub fn solve<R, C>(
    client: &C,
    method: Method,
    a: &SparseMatrix<R>,
    b: &Array<R>,
    x: &mut Array<R>,
    params: &mut SolverParams,
    precond: &mut Preconditioner<R>,
) -> Result<SolverStatus>
where
    R: Runtime,
    C: RuntimeClient<R> + SparsrOps<R>,
{
    match method {
        Method::Pcg => cg::pcg(client, a, b, x, params, precond),
        Method::Pcgs => cgs::pcgs(client, a, b, x, params, precond),
        Method::Bicgstab => bicgstab::bicgstab(client, a, b, x, params, precond),
    }
}
