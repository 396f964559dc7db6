//! ELLPACK matrix data

use crate::array::{Array, MemLocation};
use crate::dtype::DType;
use crate::error::{Error, Result};
use crate::runtime::Runtime;

use super::csr::check_payload_agreement;
use super::format::{SparseStorage, StorageFormat};

/// ELLPACK payload: every row padded to `max_row_nnz` entries
///
/// `values` and `col_indices` are row-major with row stride `max_row_nnz`;
/// padding positions carry column index -1 and value zero. `nnz` reports the
/// count of real (non-padding) entries.
#[derive(Clone)]
pub struct EllData<R: Runtime> {
    pub(crate) col_indices: Array<R>,
    pub(crate) values: Array<R>,
    pub(crate) shape: [usize; 2],
    pub(crate) max_row_nnz: usize,
    pub(crate) nnz: usize,
}

impl<R: Runtime> EllData<R> {
    /// Create an ELL matrix from padded payload arrays
    ///
    /// `nnz` is the number of non-padding entries the payload encodes.
    pub fn new(
        col_indices: Array<R>,
        values: Array<R>,
        shape: [usize; 2],
        max_row_nnz: usize,
        nnz: usize,
    ) -> Result<Self> {
        let padded = shape[0] * max_row_nnz;

        if values.len() != padded || col_indices.len() != padded {
            return Err(Error::ShapeMismatch {
                expected: vec![padded, padded],
                got: vec![values.len(), col_indices.len()],
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
                op: "EllData::new",
            });
        }
        if nnz > padded {
            return Err(Error::InvalidArgument {
                arg: "nnz",
                reason: format!("{} exceeds padded storage {}", nnz, padded),
            });
        }
        check_payload_agreement(&[&col_indices, &values])?;

        Ok(Self {
            col_indices,
            values,
            shape,
            max_row_nnz,
            nnz,
        })
    }

    /// Width every row is padded to
    pub fn max_row_nnz(&self) -> usize {
        self.max_row_nnz
    }

    /// Returns the padded column indices array
    pub fn col_indices(&self) -> &Array<R> {
        &self.col_indices
    }

    /// Returns the padded values array
    pub fn values(&self) -> &Array<R> {
        &self.values
    }

    /// Copy this matrix to the given location
    pub fn to_location(&self, location: MemLocation, device: &R::Device) -> Result<Self> {
        Ok(Self {
            col_indices: self.col_indices.to_location(location, device)?,
            values: self.values.to_location(location, device)?,
            shape: self.shape,
            max_row_nnz: self.max_row_nnz,
            nnz: self.nnz,
        })
    }
}

impl<R: Runtime> SparseStorage for EllData<R> {
    fn format(&self) -> StorageFormat {
        StorageFormat::Ell
    }

    fn shape(&self) -> [usize; 2] {
        self.shape
    }

    fn nnz(&self) -> usize {
        self.nnz
    }

    fn dtype(&self) -> DType {
        self.values.dtype()
    }

    fn location(&self) -> MemLocation {
        self.values.location()
    }

    fn memory_usage(&self) -> usize {
        self.col_indices.size_bytes() + self.values.size_bytes()
    }
}

impl<R: Runtime> std::fmt::Debug for EllData<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EllData")
            .field("shape", &self.shape)
            .field("nnz", &self.nnz)
            .field("max_row_nnz", &self.max_row_nnz)
            .field("location", &self.location())
            .finish()
    }
}
