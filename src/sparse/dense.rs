//! Dense matrix data (multi-RHS blocks, small dense factors)

use crate::array::{Array, MemLocation};
use crate::dtype::{DType, Element};
use crate::error::{Error, Result};
use crate::runtime::Runtime;

use super::format::{MajorOrder, SparseStorage, StorageFormat};

/// Dense payload with explicit element order
///
/// Column-major is the default; a multi-RHS block stores each right-hand
/// side as one contiguous column.
#[derive(Clone)]
pub struct DenseData<R: Runtime> {
    pub(crate) values: Array<R>,
    pub(crate) shape: [usize; 2],
    pub(crate) major: MajorOrder,
}

impl<R: Runtime> DenseData<R> {
    /// Create a dense matrix from a values array
    pub fn new(values: Array<R>, shape: [usize; 2], major: MajorOrder) -> Result<Self> {
        if values.len() != shape[0] * shape[1] {
            return Err(Error::ShapeMismatch {
                expected: vec![shape[0] * shape[1]],
                got: vec![values.len()],
            });
        }
        if !values.dtype().is_float() {
            return Err(Error::UnsupportedDType {
                dtype: values.dtype(),
                op: "DenseData::new",
            });
        }

        Ok(Self {
            values,
            shape,
            major,
        })
    }

    /// Build a dense matrix from a host slice
    pub fn from_slice<T: Element>(
        data: &[T],
        shape: [usize; 2],
        major: MajorOrder,
        location: MemLocation,
        device: &R::Device,
    ) -> Result<Self> {
        Self::new(Array::from_slice(data, location, device)?, shape, major)
    }

    /// Assemble a column-major dense block from equal-length column arrays
    pub fn from_columns(columns: &[Array<R>], device: &R::Device) -> Result<Self> {
        let ncols = columns.len();
        if ncols == 0 {
            return Err(Error::InvalidArgument {
                arg: "columns",
                reason: "need at least one column".to_string(),
            });
        }
        let nrows = columns[0].len();
        let dtype = columns[0].dtype();
        let location = columns[0].location();
        if !dtype.is_float() {
            return Err(Error::UnsupportedDType {
                dtype,
                op: "DenseData::from_columns",
            });
        }

        crate::dispatch_dtype!(dtype, T => {
            let mut flat: Vec<T> = Vec::with_capacity(nrows * ncols);
            for col in columns {
                if col.len() != nrows {
                    return Err(Error::ShapeMismatch {
                        expected: vec![nrows],
                        got: vec![col.len()],
                    });
                }
                flat.extend_from_slice(&col.to_vec::<T>()?);
            }
            Self::from_slice(&flat, [nrows, ncols], MajorOrder::Col, location, device)
        }, "DenseData::from_columns")
    }

    /// Extract column `j` as a standalone array at this matrix's location
    ///
    /// Column-major blocks copy one contiguous run; row-major gathers with
    /// stride `ncols`.
    pub fn column(&self, j: usize, device: &R::Device) -> Result<Array<R>> {
        let [nrows, ncols] = self.shape;
        if j >= ncols {
            return Err(Error::IndexOutOfBounds {
                index: j,
                size: ncols,
            });
        }

        crate::dispatch_dtype!(self.dtype(), T => {
            let data: Vec<T> = self.values.to_vec()?;
            let col: Vec<T> = match self.major {
                MajorOrder::Col => data[j * nrows..(j + 1) * nrows].to_vec(),
                MajorOrder::Row => (0..nrows).map(|i| data[i * ncols + j]).collect(),
            };
            Array::from_slice(&col, self.location(), device)
        }, "DenseData::column")
    }

    /// Element order of the payload
    pub fn major(&self) -> MajorOrder {
        self.major
    }

    /// Returns the values array
    pub fn values(&self) -> &Array<R> {
        &self.values
    }

    /// Copy this matrix to the given location
    pub fn to_location(&self, location: MemLocation, device: &R::Device) -> Result<Self> {
        Ok(Self {
            values: self.values.to_location(location, device)?,
            shape: self.shape,
            major: self.major,
        })
    }
}

impl<R: Runtime> SparseStorage for DenseData<R> {
    fn format(&self) -> StorageFormat {
        StorageFormat::Dense
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
        self.values.size_bytes()
    }
}

impl<R: Runtime> std::fmt::Debug for DenseData<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DenseData")
            .field("shape", &self.shape)
            .field("major", &self.major)
            .field("location", &self.location())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::cpu::CpuRuntime;
    use crate::runtime::Runtime;

    #[test]
    fn column_extraction_col_major() {
        let device = CpuRuntime::default_device();
        // 2x2: columns [1,2] and [3,4]
        let d = DenseData::<CpuRuntime>::from_slice(
            &[1.0f64, 2.0, 3.0, 4.0],
            [2, 2],
            MajorOrder::Col,
            MemLocation::Host,
            &device,
        )
        .unwrap();
        let c1 = d.column(1, &device).unwrap();
        assert_eq!(c1.to_vec::<f64>().unwrap(), vec![3.0, 4.0]);
    }

    #[test]
    fn column_extraction_row_major() {
        let device = CpuRuntime::default_device();
        let d = DenseData::<CpuRuntime>::from_slice(
            &[1.0f64, 3.0, 2.0, 4.0],
            [2, 2],
            MajorOrder::Row,
            MemLocation::Host,
            &device,
        )
        .unwrap();
        let c1 = d.column(1, &device).unwrap();
        assert_eq!(c1.to_vec::<f64>().unwrap(), vec![3.0, 4.0]);
    }

    #[test]
    fn from_columns_roundtrip() {
        let device = CpuRuntime::default_device();
        let c0 =
            Array::<CpuRuntime>::from_slice(&[1.0f64, 2.0], MemLocation::Host, &device).unwrap();
        let c1 =
            Array::<CpuRuntime>::from_slice(&[3.0f64, 4.0], MemLocation::Host, &device).unwrap();
        let d = DenseData::from_columns(&[c0, c1], &device).unwrap();
        assert_eq!(d.shape(), [2, 2]);
        assert_eq!(
            d.values().to_vec::<f64>().unwrap(),
            vec![1.0, 2.0, 3.0, 4.0]
        );
    }
}
