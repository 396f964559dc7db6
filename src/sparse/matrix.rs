//! Tagged matrix wrapper over the storage variants

use crate::array::MemLocation;
use crate::dtype::DType;
use crate::error::{Error, Result};
use crate::runtime::Runtime;

use super::coo::CooData;
use super::csr::CsrData;
use super::dense::DenseData;
use super::ell::EllData;
use super::format::{SparseStorage, StorageFormat};
use super::sellp::SellpData;

/// A matrix in any supported storage format
///
/// The common currency of the transforms, preconditioner engines, and
/// solver drivers. Each variant carries only its own payload arrays;
/// format conversions are explicit calls into [`crate::sparse::convert`].
#[derive(Clone, Debug)]
pub enum SparseMatrix<R: Runtime> {
    /// Compressed sparse row
    Csr(CsrData<R>),
    /// Coordinate triplets
    Coo(CooData<R>),
    /// ELLPACK
    Ell(EllData<R>),
    /// Sliced ELLPACK with padding
    SellP(SellpData<R>),
    /// Dense
    Dense(DenseData<R>),
}

impl<R: Runtime> SparseMatrix<R> {
    /// Borrow the CSR payload, or fail with `UnsupportedFormat`
    pub fn expect_csr(&self, op: &'static str) -> Result<&CsrData<R>> {
        match self {
            Self::Csr(data) => Ok(data),
            other => Err(Error::UnsupportedFormat {
                format: other.format(),
                op,
            }),
        }
    }

    /// Borrow the CSR payload if this is a CSR matrix
    pub fn as_csr(&self) -> Option<&CsrData<R>> {
        match self {
            Self::Csr(data) => Some(data),
            _ => None,
        }
    }

    /// Copy this matrix to the given location, preserving the format
    pub fn to_location(&self, location: MemLocation, device: &R::Device) -> Result<Self> {
        Ok(match self {
            Self::Csr(d) => Self::Csr(d.to_location(location, device)?),
            Self::Coo(d) => Self::Coo(d.to_location(location, device)?),
            Self::Ell(d) => Self::Ell(d.to_location(location, device)?),
            Self::SellP(d) => Self::SellP(d.to_location(location, device)?),
            Self::Dense(d) => Self::Dense(d.to_location(location, device)?),
        })
    }
}

impl<R: Runtime> SparseStorage for SparseMatrix<R> {
    fn format(&self) -> StorageFormat {
        match self {
            Self::Csr(_) => StorageFormat::Csr,
            Self::Coo(_) => StorageFormat::Coo,
            Self::Ell(_) => StorageFormat::Ell,
            Self::SellP(_) => StorageFormat::SellP,
            Self::Dense(_) => StorageFormat::Dense,
        }
    }

    fn shape(&self) -> [usize; 2] {
        match self {
            Self::Csr(d) => d.shape(),
            Self::Coo(d) => d.shape(),
            Self::Ell(d) => d.shape(),
            Self::SellP(d) => d.shape(),
            Self::Dense(d) => d.shape(),
        }
    }

    fn nnz(&self) -> usize {
        match self {
            Self::Csr(d) => d.nnz(),
            Self::Coo(d) => d.nnz(),
            Self::Ell(d) => d.nnz(),
            Self::SellP(d) => d.nnz(),
            Self::Dense(d) => d.nnz(),
        }
    }

    fn dtype(&self) -> DType {
        match self {
            Self::Csr(d) => d.dtype(),
            Self::Coo(d) => d.dtype(),
            Self::Ell(d) => d.dtype(),
            Self::SellP(d) => d.dtype(),
            Self::Dense(d) => d.dtype(),
        }
    }

    fn location(&self) -> MemLocation {
        match self {
            Self::Csr(d) => d.location(),
            Self::Coo(d) => d.location(),
            Self::Ell(d) => d.location(),
            Self::SellP(d) => d.location(),
            Self::Dense(d) => d.location(),
        }
    }

    fn memory_usage(&self) -> usize {
        match self {
            Self::Csr(d) => d.memory_usage(),
            Self::Coo(d) => d.memory_usage(),
            Self::Ell(d) => d.memory_usage(),
            Self::SellP(d) => d.memory_usage(),
            Self::Dense(d) => d.memory_usage(),
        }
    }
}

impl<R: Runtime> From<CsrData<R>> for SparseMatrix<R> {
    fn from(data: CsrData<R>) -> Self {
        Self::Csr(data)
    }
}

impl<R: Runtime> From<CooData<R>> for SparseMatrix<R> {
    fn from(data: CooData<R>) -> Self {
        Self::Coo(data)
    }
}

impl<R: Runtime> From<EllData<R>> for SparseMatrix<R> {
    fn from(data: EllData<R>) -> Self {
        Self::Ell(data)
    }
}

impl<R: Runtime> From<SellpData<R>> for SparseMatrix<R> {
    fn from(data: SellpData<R>) -> Self {
        Self::SellP(data)
    }
}

impl<R: Runtime> From<DenseData<R>> for SparseMatrix<R> {
    fn from(data: DenseData<R>) -> Self {
        Self::Dense(data)
    }
}
