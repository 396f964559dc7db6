//! Error types for sparsr

use crate::dtype::DType;
use crate::sparse::StorageFormat;
use thiserror::Error;

/// Result type alias using sparsr's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in sparsr operations
///
/// These are faults: bad arguments, structural precondition violations,
/// resource exhaustion. Algorithmic outcomes of a solve (converged, slow
/// convergence, divergence) are not errors; they are reported through
/// [`crate::solver::SolverStatus`] in the solver feedback block.
#[derive(Error, Debug)]
pub enum Error {
    /// Shape mismatch in an operation
    #[error("Shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        /// Expected shape
        expected: Vec<usize>,
        /// Actual shape
        got: Vec<usize>,
    },

    /// Unsupported dtype for an operation
    #[error("Unsupported dtype {dtype:?} for operation '{op}'")]
    UnsupportedDType {
        /// The unsupported dtype
        dtype: DType,
        /// The operation name
        op: &'static str,
    },

    /// DType mismatch between operands
    #[error("DType mismatch: {lhs:?} vs {rhs:?}")]
    DTypeMismatch {
        /// Left-hand side dtype
        lhs: DType,
        /// Right-hand side dtype
        rhs: DType,
    },

    /// Device mismatch between operands
    #[error("Device mismatch: operands must live on the same device")]
    DeviceMismatch,

    /// Storage format not accepted by an operation
    #[error("Unsupported format {format:?} for operation '{op}'")]
    UnsupportedFormat {
        /// The offending storage format
        format: StorageFormat,
        /// The operation name
        op: &'static str,
    },

    /// Memory location (host/device) not accepted by an operation
    #[error("Operation '{op}' requires {required}-resident data")]
    UnsupportedLocation {
        /// The operation name
        op: &'static str,
        /// "host" or "device"
        required: &'static str,
    },

    /// A parameter lies outside its fixed legal set
    #[error("Unsupported configuration: {param} = {value} (allowed: {allowed})")]
    UnsupportedConfiguration {
        /// The parameter name
        param: &'static str,
        /// The rejected value
        value: usize,
        /// Human-readable description of the legal set
        allowed: &'static str,
    },

    /// Operation unavailable in this build
    ///
    /// Permanent capability gap, not a retryable condition. Raised before any
    /// state is mutated.
    #[error("Unsupported operation '{op}': {reason}")]
    UnsupportedOperation {
        /// The operation name
        op: &'static str,
        /// Why it is unavailable
        reason: &'static str,
    },

    /// Out of memory
    #[error("Out of memory: failed to allocate {size} bytes")]
    OutOfMemory {
        /// Requested size in bytes
        size: usize,
    },

    /// Index out of bounds
    #[error("Index {index} out of bounds for dimension of size {size}")]
    IndexOutOfBounds {
        /// The invalid index
        index: usize,
        /// Size of the dimension
        size: usize,
    },

    /// Invalid argument provided to an operation
    #[error("Invalid argument '{arg}': {reason}")]
    InvalidArgument {
        /// The argument name
        arg: &'static str,
        /// Reason for invalidity
        reason: String,
    },

    /// A row of a matrix that must carry a literal diagonal entry does not
    #[error("Row {row} has no diagonal entry")]
    MissingDiagonal {
        /// The offending row
        row: usize,
    },

    /// Factorization breakdown: a pivot that must be positive was not
    #[error("Matrix is not positive definite (breakdown at row {row})")]
    NotPositiveDefinite {
        /// Row at which the pivot test failed
        row: usize,
    },

    /// Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}
