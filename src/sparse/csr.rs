//! CSR (Compressed Sparse Row) matrix data

use crate::array::{Array, MemLocation};
use crate::dtype::{DType, Element};
use crate::error::{Error, Result};
use crate::runtime::{Device, Runtime};

use super::format::{FillMode, SparseStorage, StorageFormat};

/// CSR sparse matrix payload
///
/// Invariants, enforced at construction: `row_ptrs` has length `nrows + 1`,
/// is monotonically non-decreasing, and its last entry equals `nnz`;
/// `col_indices` and `values` both have length `nnz`; index arrays are I64
/// and values are a float dtype; all three arrays share one location and one
/// device.
#[derive(Clone)]
pub struct CsrData<R: Runtime> {
    pub(crate) row_ptrs: Array<R>,
    pub(crate) col_indices: Array<R>,
    pub(crate) values: Array<R>,
    pub(crate) shape: [usize; 2],
    pub(crate) fill_mode: FillMode,
}

impl<R: Runtime> CsrData<R> {
    /// Create a CSR matrix from already-built payload arrays
    ///
    /// # Errors
    ///
    /// Returns an error if array lengths disagree with `shape`, index arrays
    /// are not I64, values are not a float dtype, or the arrays do not share
    /// a location and device.
    pub fn new(
        row_ptrs: Array<R>,
        col_indices: Array<R>,
        values: Array<R>,
        shape: [usize; 2],
    ) -> Result<Self> {
        let [nrows, _ncols] = shape;
        let nnz = values.len();

        if row_ptrs.len() != nrows + 1 {
            return Err(Error::ShapeMismatch {
                expected: vec![nrows + 1],
                got: vec![row_ptrs.len()],
            });
        }
        if col_indices.len() != nnz {
            return Err(Error::ShapeMismatch {
                expected: vec![nnz],
                got: vec![col_indices.len()],
            });
        }
        if row_ptrs.dtype() != DType::I64 {
            return Err(Error::DTypeMismatch {
                lhs: DType::I64,
                rhs: row_ptrs.dtype(),
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
                op: "CsrData::new",
            });
        }
        check_payload_agreement(&[&row_ptrs, &col_indices, &values])?;

        Ok(Self {
            row_ptrs,
            col_indices,
            values,
            shape,
            fill_mode: FillMode::Full,
        })
    }

    /// Build a CSR matrix from host slices, validating the structure
    ///
    /// Checks that `row_ptrs` is monotone with `row_ptrs[nrows] == nnz` and
    /// that every column index is in bounds, then places the payload at
    /// `location`.
    pub fn from_slices<T: Element>(
        row_ptrs: &[i64],
        col_indices: &[i64],
        values: &[T],
        shape: [usize; 2],
        location: MemLocation,
        device: &R::Device,
    ) -> Result<Self> {
        let [nrows, ncols] = shape;

        if row_ptrs.len() != nrows + 1 {
            return Err(Error::ShapeMismatch {
                expected: vec![nrows + 1],
                got: vec![row_ptrs.len()],
            });
        }
        if col_indices.len() != values.len() {
            return Err(Error::ShapeMismatch {
                expected: vec![values.len()],
                got: vec![col_indices.len()],
            });
        }
        if row_ptrs[0] != 0 {
            return Err(Error::InvalidArgument {
                arg: "row_ptrs",
                reason: format!("first entry must be 0, got {}", row_ptrs[0]),
            });
        }
        for i in 0..nrows {
            if row_ptrs[i + 1] < row_ptrs[i] {
                return Err(Error::InvalidArgument {
                    arg: "row_ptrs",
                    reason: format!("not monotone at row {}", i),
                });
            }
        }
        if row_ptrs[nrows] as usize != values.len() {
            return Err(Error::InvalidArgument {
                arg: "row_ptrs",
                reason: format!(
                    "last entry {} does not match nnz {}",
                    row_ptrs[nrows],
                    values.len()
                ),
            });
        }
        for &col in col_indices {
            if col < 0 || col as usize >= ncols {
                return Err(Error::IndexOutOfBounds {
                    index: col.max(0) as usize,
                    size: ncols,
                });
            }
        }

        Ok(Self {
            row_ptrs: Array::from_slice(row_ptrs, location, device)?,
            col_indices: Array::from_slice(col_indices, location, device)?,
            values: Array::from_slice(values, location, device)?,
            shape,
            fill_mode: FillMode::Full,
        })
    }

    /// Create an empty CSR matrix (no stored entries)
    pub fn empty(
        shape: [usize; 2],
        dtype: DType,
        location: MemLocation,
        device: &R::Device,
    ) -> Result<Self> {
        let [nrows, _ncols] = shape;
        let row_ptrs: Vec<i64> = vec![0; nrows + 1];

        Ok(Self {
            row_ptrs: Array::from_slice(&row_ptrs, location, device)?,
            col_indices: Array::zeros(0, DType::I64, location, device)?,
            values: Array::zeros(0, dtype, location, device)?,
            shape,
            fill_mode: FillMode::Full,
        })
    }

    /// Tag which triangle this matrix represents
    pub fn with_fill_mode(mut self, fill_mode: FillMode) -> Self {
        self.fill_mode = fill_mode;
        self
    }

    /// Returns the fill mode tag
    pub fn fill_mode(&self) -> FillMode {
        self.fill_mode
    }

    /// Returns the row pointers array
    pub fn row_ptrs(&self) -> &Array<R> {
        &self.row_ptrs
    }

    /// Returns the column indices array
    pub fn col_indices(&self) -> &Array<R> {
        &self.col_indices
    }

    /// Returns the values array
    pub fn values(&self) -> &Array<R> {
        &self.values
    }

    /// Replace the values array, preserving the sparsity pattern
    ///
    /// Used by numeric refinement to reuse a symbolic structure.
    pub fn update_values(&mut self, new_values: Array<R>) -> Result<()> {
        if new_values.len() != self.values.len() {
            return Err(Error::ShapeMismatch {
                expected: vec![self.values.len()],
                got: vec![new_values.len()],
            });
        }
        if new_values.dtype() != self.values.dtype() {
            return Err(Error::DTypeMismatch {
                lhs: self.values.dtype(),
                rhs: new_values.dtype(),
            });
        }
        self.values = new_values;
        Ok(())
    }

    /// Borrow all three payloads as host slices
    ///
    /// Fails with `UnsupportedLocation` for device-resident matrices; `op`
    /// names the caller for the diagnostic.
    pub fn host_views<T: Element>(&self, op: &'static str) -> Result<(&[i64], &[i64], &[T])> {
        Ok((
            self.row_ptrs.host_slice::<i64>(op)?,
            self.col_indices.host_slice::<i64>(op)?,
            self.values.host_slice::<T>(op)?,
        ))
    }

    /// Extract the diagonal as an array at this matrix's location
    ///
    /// Positions without a stored diagonal entry come back as zero.
    pub fn diagonal<T: Element>(&self) -> Result<Array<R>> {
        let n = self.nrows().min(self.ncols());
        let device = self.values.device().clone();

        if T::DTYPE != self.dtype() {
            return Err(Error::DTypeMismatch {
                lhs: T::DTYPE,
                rhs: self.dtype(),
            });
        }

        let row_ptrs: Vec<i64> = self.row_ptrs.to_vec()?;
        let col_indices: Vec<i64> = self.col_indices.to_vec()?;
        let values: Vec<T> = self.values.to_vec()?;

        let mut diag = vec![T::zero(); n];
        for (row, d) in diag.iter_mut().enumerate() {
            let start = row_ptrs[row] as usize;
            let end = row_ptrs[row + 1] as usize;
            for pos in start..end {
                if col_indices[pos] as usize == row {
                    *d = values[pos];
                    break;
                }
            }
        }

        Array::from_slice(&diag, self.location(), &device)
    }

    /// Check whether every row up to `min(nrows, ncols)` stores a diagonal entry
    pub fn has_full_diagonal(&self) -> Result<bool> {
        let n = self.nrows().min(self.ncols());
        let row_ptrs: Vec<i64> = self.row_ptrs.to_vec()?;
        let col_indices: Vec<i64> = self.col_indices.to_vec()?;

        for row in 0..n {
            let start = row_ptrs[row] as usize;
            let end = row_ptrs[row + 1] as usize;
            if !col_indices[start..end].iter().any(|&c| c as usize == row) {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Copy this matrix to the given location
    pub fn to_location(&self, location: MemLocation, device: &R::Device) -> Result<Self> {
        Ok(Self {
            row_ptrs: self.row_ptrs.to_location(location, device)?,
            col_indices: self.col_indices.to_location(location, device)?,
            values: self.values.to_location(location, device)?,
            shape: self.shape,
            fill_mode: self.fill_mode,
        })
    }
}

impl<R: Runtime> SparseStorage for CsrData<R> {
    fn format(&self) -> StorageFormat {
        StorageFormat::Csr
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
        self.row_ptrs.size_bytes() + self.col_indices.size_bytes() + self.values.size_bytes()
    }
}

impl<R: Runtime> std::fmt::Debug for CsrData<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CsrData")
            .field("shape", &self.shape)
            .field("nnz", &self.nnz())
            .field("dtype", &self.dtype())
            .field("location", &self.location())
            .field("fill_mode", &self.fill_mode)
            .finish()
    }
}

pub(crate) fn check_payload_agreement<R: Runtime>(arrays: &[&Array<R>]) -> Result<()> {
    let (first, rest) = match arrays.split_first() {
        Some(split) => split,
        None => return Ok(()),
    };
    for a in rest {
        if a.location() != first.location() {
            return Err(Error::InvalidArgument {
                arg: "payload",
                reason: "arrays must share one memory location".to_string(),
            });
        }
        if !a.device().is_same(first.device()) {
            return Err(Error::DeviceMismatch);
        }
    }
    Ok(())
}
