//! Preconditioner descriptors and setup engines
//!
//! A [`Preconditioner`] is a passive descriptor: setup engines fill in the
//! triangular factors (or the diagonal) and the solver drivers apply them
//! through the client's kernel traits. The descriptor owns everything the
//! apply path needs — factors, extracted diagonals, and the scratch vectors
//! the sweep-based triangular solve reuses between applications — so one
//! setup serves any number of solves.
//!
//! Engines follow a common staging discipline: symbolic work (pattern
//! splitting, transposes, merges) happens on host copies, numeric sweeps run
//! through client kernels on device-resident data, and the packaged factors
//! end up device-resident next to the solver's vectors.

mod apply;
mod custom;
mod jacobi;
mod levels;
mod parilu;
mod parilut;

pub use custom::CustomFactors;

pub(crate) use parilu::stage_host_csr;

use std::time::Instant;

use crate::array::Array;
use crate::error::{Error, Result};
use crate::ops::SparsrOps;
use crate::runtime::{Runtime, RuntimeClient};
use crate::sparse::{CsrData, SparseMatrix};

/// Which preconditioner a descriptor holds.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum PrecondKind {
    /// Identity: apply is a copy.
    #[default]
    None,
    /// Diagonal (Jacobi) scaling.
    Jacobi,
    /// Incomplete LU via fixed-point sweeps on the static pattern of `A`.
    ParIlu,
    /// Incomplete Cholesky via fixed-point sweeps on the symmetrized
    /// lower pattern.
    ParIc,
    /// Incomplete LU with adaptive threshold fill (pattern changes between
    /// rounds).
    ParIlut,
    /// Incomplete Cholesky with adaptive threshold fill.
    ParIct,
    /// Externally computed factors installed through
    /// [`Preconditioner::setup_custom`].
    Custom,
}

/// How the triangular solves behind `apply` are carried out.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum TriSolver {
    /// Exact forward/backward substitution.
    #[default]
    Exact,
    /// Approximate solve by a fixed number of Jacobi sweeps per apply;
    /// scratch vectors carry the previous result across applies as a warm
    /// start.
    JacobiSweeps {
        /// Sweeps per triangular solve.
        iters: usize,
    },
}

/// Setup-time knobs for the factorization engines.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PrecondParams {
    /// Which engine runs at setup.
    pub kind: PrecondKind,
    /// Symbolic fill level for the static-pattern engines (ILU(k)-style
    /// pattern expansion before the sweeps; 0 keeps the pattern of `A`).
    pub levels: usize,
    /// Fixed-point sweep rounds.
    pub sweeps: usize,
    /// Fill target for the threshold engines: final factor nnz aims at
    /// `initial nnz × atol`. Ignored by the static-pattern engines.
    pub atol: f64,
    /// Triangular solve flavor used at apply time.
    pub trisolver: TriSolver,
}

impl Default for PrecondParams {
    fn default() -> Self {
        Self {
            kind: PrecondKind::None,
            levels: 0,
            sweeps: 5,
            atol: 1.0,
            trisolver: TriSolver::Exact,
        }
    }
}

impl PrecondParams {
    /// Parameters for the given kind with default knobs.
    pub fn with_kind(kind: PrecondKind) -> Self {
        Self {
            kind,
            ..Self::default()
        }
    }
}

/// Preconditioner descriptor: parameters plus the state the setup engines
/// produce.
///
/// Field meaning follows the factorization convention `A ≈ L·U`: `l` is the
/// lower factor (explicit diagonal; ones for the LU family), `u` the upper
/// factor, `m` the merged single-matrix form classical ILU routines expect,
/// `d`/`d2` the diagonals of `u`/`l`, and `work1`/`work2` the sweep-solver
/// scratch vectors. Engines that do not need a field leave it `None`.
#[derive(Debug)]
pub struct Preconditioner<R: Runtime> {
    /// Setup-time parameters.
    pub params: PrecondParams,
    /// Lower triangular factor.
    pub l: Option<CsrData<R>>,
    /// Upper triangular factor (`Lᵗ` for the Cholesky family).
    pub u: Option<CsrData<R>>,
    /// Merged factors in single-matrix storage.
    pub m: Option<CsrData<R>>,
    /// Diagonal of `u` (or of `A` for the Jacobi kind).
    pub d: Option<Array<R>>,
    /// Diagonal of `l`.
    pub d2: Option<Array<R>>,
    /// Scratch for the lower sweep solve; reused across applies.
    pub work1: Option<Array<R>>,
    /// Scratch for the upper sweep solve; reused across applies.
    pub work2: Option<Array<R>>,
    /// Wall-clock seconds the last setup took.
    pub setup_time: f64,
}

impl<R: Runtime> Preconditioner<R> {
    /// Empty descriptor for the given parameters.
    pub fn new(params: PrecondParams) -> Self {
        Self {
            params,
            l: None,
            u: None,
            m: None,
            d: None,
            d2: None,
            work1: None,
            work2: None,
            setup_time: 0.0,
        }
    }

    /// Identity preconditioner; applies are copies.
    pub fn identity() -> Self {
        Self::new(PrecondParams::default())
    }

    /// True once factors (or the Jacobi diagonal) are in place.
    pub fn is_ready(&self) -> bool {
        match self.params.kind {
            PrecondKind::None => true,
            PrecondKind::Jacobi => self.d.is_some(),
            _ => self.l.is_some() && self.u.is_some(),
        }
    }

    /// Run the setup engine selected by `params.kind` on `a`.
    ///
    /// Replaces any previously held state. `Custom` descriptors are filled
    /// through [`setup_custom`](Self::setup_custom) instead.
    pub fn setup<C>(&mut self, client: &C, a: &SparseMatrix<R>) -> Result<()>
    where
        C: RuntimeClient<R> + SparsrOps<R>,
    {
        let started = Instant::now();
        self.clear();
        match self.params.kind {
            PrecondKind::None => Ok(()),
            PrecondKind::Jacobi => jacobi::setup(self, client, a),
            PrecondKind::ParIlu => parilu::setup_parilu(self, client, a),
            PrecondKind::ParIc => parilu::setup_paric(self, client, a),
            PrecondKind::ParIlut => parilut::setup_parilut(self, client, a),
            PrecondKind::ParIct => parilut::setup_parict(self, client, a),
            PrecondKind::Custom => Err(Error::InvalidArgument {
                arg: "kind",
                reason: "custom factors are installed through setup_custom".to_string(),
            }),
        }?;
        self.setup_time = started.elapsed().as_secs_f64();
        log::debug!(
            "precond setup: kind {:?} in {:.3e} s",
            self.params.kind,
            self.setup_time
        );
        Ok(())
    }

    /// Install externally computed triangular factors.
    ///
    /// Validates and packages them with the same state the ParILU engine
    /// produces, and switches `params.kind` to `Custom`.
    pub fn setup_custom<C>(&mut self, client: &C, factors: CustomFactors<R>) -> Result<()>
    where
        C: RuntimeClient<R> + SparsrOps<R>,
    {
        let started = Instant::now();
        self.clear();
        self.params.kind = PrecondKind::Custom;
        custom::setup(self, client, factors)?;
        self.setup_time = started.elapsed().as_secs_f64();
        Ok(())
    }

    /// Solve `L z = r` (or diagonal-scale / copy for the non-factor kinds).
    pub fn apply_left<C>(&mut self, client: &C, r: &Array<R>) -> Result<Array<R>>
    where
        C: RuntimeClient<R> + SparsrOps<R>,
    {
        apply::apply_left(self, client, r)
    }

    /// Solve `U y = z` (copy for the non-factor kinds).
    pub fn apply_right<C>(&mut self, client: &C, z: &Array<R>) -> Result<Array<R>>
    where
        C: RuntimeClient<R> + SparsrOps<R>,
    {
        apply::apply_right(self, client, z)
    }

    /// Full application `M⁻¹·r`: left solve followed by right solve.
    pub fn apply<C>(&mut self, client: &C, r: &Array<R>) -> Result<Array<R>>
    where
        C: RuntimeClient<R> + SparsrOps<R>,
    {
        let z = apply::apply_left(self, client, r)?;
        apply::apply_right(self, client, &z)
    }

    fn clear(&mut self) {
        self.l = None;
        self.u = None;
        self.m = None;
        self.d = None;
        self.d2 = None;
        self.work1 = None;
        self.work2 = None;
        self.setup_time = 0.0;
    }
}
