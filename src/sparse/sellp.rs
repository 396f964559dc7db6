//! SELL-P (sliced ELLPACK with padding) matrix data

use crate::array::{Array, MemLocation};
use crate::dtype::DType;
use crate::error::{Error, Result};
use crate::runtime::Runtime;

use super::csr::check_payload_agreement;
use super::format::{SparseStorage, StorageFormat};

/// SELL-P payload: rows grouped into slices of `blocksize` rows, each slice
/// padded to its own width rounded up to `alignment`
///
/// Storage for slice `s` occupies `[slice_ptrs[s], slice_ptrs[s+1])` and is
/// column-major within the slice: entry `j` of slice-local row `i` sits at
/// `slice_ptrs[s] + j * blocksize + i`. Every slice stores a full
/// `blocksize` rows; trailing rows past `nrows` are all padding. Padding
/// positions carry column index -1 and value zero.
#[derive(Clone)]
pub struct SellpData<R: Runtime> {
    pub(crate) slice_ptrs: Array<R>,
    pub(crate) col_indices: Array<R>,
    pub(crate) values: Array<R>,
    pub(crate) shape: [usize; 2],
    pub(crate) blocksize: usize,
    pub(crate) alignment: usize,
    pub(crate) numblocks: usize,
    pub(crate) nnz: usize,
}

impl<R: Runtime> SellpData<R> {
    /// Create a SELL-P matrix from payload arrays
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        slice_ptrs: Array<R>,
        col_indices: Array<R>,
        values: Array<R>,
        shape: [usize; 2],
        blocksize: usize,
        alignment: usize,
        numblocks: usize,
        nnz: usize,
    ) -> Result<Self> {
        if blocksize == 0 || alignment == 0 {
            return Err(Error::InvalidArgument {
                arg: "blocksize/alignment",
                reason: "must be nonzero".to_string(),
            });
        }
        if numblocks != shape[0].div_ceil(blocksize) {
            return Err(Error::InvalidArgument {
                arg: "numblocks",
                reason: format!(
                    "expected ceil({}/{}) = {}, got {}",
                    shape[0],
                    blocksize,
                    shape[0].div_ceil(blocksize),
                    numblocks
                ),
            });
        }
        if slice_ptrs.len() != numblocks + 1 {
            return Err(Error::ShapeMismatch {
                expected: vec![numblocks + 1],
                got: vec![slice_ptrs.len()],
            });
        }
        if slice_ptrs.dtype() != DType::I64 || col_indices.dtype() != DType::I64 {
            return Err(Error::DTypeMismatch {
                lhs: DType::I64,
                rhs: col_indices.dtype(),
            });
        }
        if values.len() != col_indices.len() {
            return Err(Error::ShapeMismatch {
                expected: vec![col_indices.len()],
                got: vec![values.len()],
            });
        }
        if !values.dtype().is_float() {
            return Err(Error::UnsupportedDType {
                dtype: values.dtype(),
                op: "SellpData::new",
            });
        }
        check_payload_agreement(&[&slice_ptrs, &col_indices, &values])?;

        Ok(Self {
            slice_ptrs,
            col_indices,
            values,
            shape,
            blocksize,
            alignment,
            numblocks,
            nnz,
        })
    }

    /// Rows per slice
    pub fn blocksize(&self) -> usize {
        self.blocksize
    }

    /// Width-rounding unit of each slice
    pub fn alignment(&self) -> usize {
        self.alignment
    }

    /// Number of slices
    pub fn numblocks(&self) -> usize {
        self.numblocks
    }

    /// Returns the slice pointer array
    pub fn slice_ptrs(&self) -> &Array<R> {
        &self.slice_ptrs
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
            slice_ptrs: self.slice_ptrs.to_location(location, device)?,
            col_indices: self.col_indices.to_location(location, device)?,
            values: self.values.to_location(location, device)?,
            shape: self.shape,
            blocksize: self.blocksize,
            alignment: self.alignment,
            numblocks: self.numblocks,
            nnz: self.nnz,
        })
    }
}

impl<R: Runtime> SparseStorage for SellpData<R> {
    fn format(&self) -> StorageFormat {
        StorageFormat::SellP
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
        self.slice_ptrs.size_bytes() + self.col_indices.size_bytes() + self.values.size_bytes()
    }
}

impl<R: Runtime> std::fmt::Debug for SellpData<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SellpData")
            .field("shape", &self.shape)
            .field("nnz", &self.nnz)
            .field("blocksize", &self.blocksize)
            .field("alignment", &self.alignment)
            .field("numblocks", &self.numblocks)
            .field("location", &self.location())
            .finish()
    }
}
