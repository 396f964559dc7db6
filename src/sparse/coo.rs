//! COO (coordinate) matrix data

use crate::array::{Array, MemLocation};
use crate::dtype::{DType, Element};
use crate::error::{Error, Result};
use crate::runtime::Runtime;

use super::csr::check_payload_agreement;
use super::format::{SparseStorage, StorageFormat};

/// COO sparse matrix payload: parallel (row, col, value) triplet arrays
///
/// Entries are not required to be sorted. The fixed-point factorization
/// sweeps traverse COO because every stored entry updates independently.
#[derive(Clone)]
pub struct CooData<R: Runtime> {
    pub(crate) row_indices: Array<R>,
    pub(crate) col_indices: Array<R>,
    pub(crate) values: Array<R>,
    pub(crate) shape: [usize; 2],
}

impl<R: Runtime> CooData<R> {
    /// Create a COO matrix from already-built payload arrays
    pub fn new(
        row_indices: Array<R>,
        col_indices: Array<R>,
        values: Array<R>,
        shape: [usize; 2],
    ) -> Result<Self> {
        let nnz = values.len();

        if row_indices.len() != nnz || col_indices.len() != nnz {
            return Err(Error::ShapeMismatch {
                expected: vec![nnz, nnz],
                got: vec![row_indices.len(), col_indices.len()],
            });
        }
        if row_indices.dtype() != DType::I64 {
            return Err(Error::DTypeMismatch {
                lhs: DType::I64,
                rhs: row_indices.dtype(),
            });
        }
        if col_indices.dtype() != DType::I64 {
            return Err(Error::DTypeMismatch {
                lhs: DType::I64,
                rhs: col_indices.dtype(),
            });
        }
        if !values.dtype().is_float() {
            return Err(Error::UnsupportedDType {
                dtype: values.dtype(),
                op: "CooData::new",
            });
        }
        check_payload_agreement(&[&row_indices, &col_indices, &values])?;

        Ok(Self {
            row_indices,
            col_indices,
            values,
            shape,
        })
    }

    /// Build a COO matrix from host slices, validating index bounds
    pub fn from_slices<T: Element>(
        row_indices: &[i64],
        col_indices: &[i64],
        values: &[T],
        shape: [usize; 2],
        location: MemLocation,
        device: &R::Device,
    ) -> Result<Self> {
        if row_indices.len() != values.len() || col_indices.len() != values.len() {
            return Err(Error::ShapeMismatch {
                expected: vec![values.len(), values.len()],
                got: vec![row_indices.len(), col_indices.len()],
            });
        }
        let [nrows, ncols] = shape;
        for &r in row_indices {
            if r < 0 || r as usize >= nrows {
                return Err(Error::IndexOutOfBounds {
                    index: r.max(0) as usize,
                    size: nrows,
                });
            }
        }
        for &c in col_indices {
            if c < 0 || c as usize >= ncols {
                return Err(Error::IndexOutOfBounds {
                    index: c.max(0) as usize,
                    size: ncols,
                });
            }
        }

        Ok(Self {
            row_indices: Array::from_slice(row_indices, location, device)?,
            col_indices: Array::from_slice(col_indices, location, device)?,
            values: Array::from_slice(values, location, device)?,
            shape,
        })
    }

    /// Returns the row indices array
    pub fn row_indices(&self) -> &Array<R> {
        &self.row_indices
    }

    /// Returns the column indices array
    pub fn col_indices(&self) -> &Array<R> {
        &self.col_indices
    }

    /// Returns the values array
    pub fn values(&self) -> &Array<R> {
        &self.values
    }

    /// Copy this matrix to the given location
    pub fn to_location(&self, location: MemLocation, device: &R::Device) -> Result<Self> {
        Ok(Self {
            row_indices: self.row_indices.to_location(location, device)?,
            col_indices: self.col_indices.to_location(location, device)?,
            values: self.values.to_location(location, device)?,
            shape: self.shape,
        })
    }
}

impl<R: Runtime> SparseStorage for CooData<R> {
    fn format(&self) -> StorageFormat {
        StorageFormat::Coo
    }

    fn shape(&self) -> [usize; 2] {
        self.shape
    }

    fn nnz(&self) -> usize {
        self.values.len()
    }

    fn dtype(&self) -> DType {
        self.values.dtype()
    }

    fn location(&self) -> MemLocation {
        self.values.location()
    }

    fn memory_usage(&self) -> usize {
        self.row_indices.size_bytes() + self.col_indices.size_bytes() + self.values.size_bytes()
    }
}

impl<R: Runtime> std::fmt::Debug for CooData<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CooData")
            .field("shape", &self.shape)
            .field("nnz", &self.nnz())
            .field("dtype", &self.dtype())
            .field("location", &self.location())
            .finish()
    }
}
