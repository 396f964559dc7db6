//! Storage format definitions and the common descriptor trait

use crate::array::MemLocation;
use crate::dtype::DType;

/// Sparse/dense matrix storage format
///
/// A closed set of variants; every format-specific payload lives in its own
/// data struct, and conversions between formats are explicit functions in
/// [`crate::sparse::convert`], never implicit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageFormat {
    /// Compressed Sparse Row: row pointers + column indices + values
    ///
    /// The working format of the solver core and all transforms.
    Csr,

    /// Coordinate format: explicit (row, col, value) triplets
    ///
    /// Best for construction and for kernels that walk all nonzeros
    /// independently (the fixed-point factorization sweeps).
    Coo,

    /// ELLPACK: rows padded to a uniform width
    ///
    /// Best for SpMV on wide-SIMD targets when row lengths are even.
    Ell,

    /// Sliced ELLPACK with padding: per-slice width, aligned
    ///
    /// ELL's regularity without paying the worst row's padding globally.
    SellP,

    /// Dense column- or row-major storage
    ///
    /// Used for multi-RHS blocks and small dense factors.
    Dense,
}

impl StorageFormat {
    /// Returns the format name as a string
    pub fn name(&self) -> &'static str {
        match self {
            StorageFormat::Csr => "CSR",
            StorageFormat::Coo => "COO",
            StorageFormat::Ell => "ELL",
            StorageFormat::SellP => "SELL-P",
            StorageFormat::Dense => "DENSE",
        }
    }
}

impl std::fmt::Display for StorageFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Which triangle of a matrix carries meaningful entries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FillMode {
    /// Whole matrix
    #[default]
    Full,
    /// Lower triangle (factors `L`)
    Lower,
    /// Upper triangle (factors `U`)
    Upper,
}

/// Element order of a dense payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MajorOrder {
    /// Row-major
    Row,
    /// Column-major (multi-RHS blocks)
    #[default]
    Col,
}

/// Trait for matrix storage payloads
///
/// The common descriptor surface every format implements: dimensions, nonzero
/// count, dtype, and where the payload lives.
pub trait SparseStorage: Sized {
    /// Returns the storage format tag
    fn format(&self) -> StorageFormat;

    /// Returns the shape as [nrows, ncols]
    fn shape(&self) -> [usize; 2];

    /// Returns the number of rows
    #[inline]
    fn nrows(&self) -> usize {
        self.shape()[0]
    }

    /// Returns the number of columns
    #[inline]
    fn ncols(&self) -> usize {
        self.shape()[1]
    }

    /// Returns the number of stored non-zero elements
    fn nnz(&self) -> usize;

    /// Returns the data type of values
    fn dtype(&self) -> DType;

    /// Returns where the payload arrays live
    fn location(&self) -> MemLocation;

    /// Returns the sparsity ratio (fraction of zeros)
    #[inline]
    fn sparsity(&self) -> f64 {
        let total = (self.nrows() * self.ncols()) as f64;
        if total == 0.0 {
            0.0
        } else {
            1.0 - (self.nnz() as f64 / total)
        }
    }

    /// Returns true if the matrix stores no non-zeros
    #[inline]
    fn is_empty(&self) -> bool {
        self.nnz() == 0
    }

    /// Returns the payload memory usage in bytes (approximate)
    fn memory_usage(&self) -> usize;
}
