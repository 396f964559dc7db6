//! Sparse matrix-vector product trait.

use crate::array::Array;
use crate::error::Result;
use crate::runtime::Runtime;
use crate::sparse::SparseMatrix;

/// Format-polymorphic sparse matrix-vector product.
///
/// One entry point for every storage format; the backend dispatches on the
/// [`SparseMatrix`](crate::sparse::SparseMatrix) variant so the solver core
/// never needs to know how `A` is stored.
pub trait SpmvOps<R: Runtime> {
    /// General product `alpha·A·x + beta·y`.
    ///
    /// Returns a fresh array of length `A.nrows()`; `y` is read, never
    /// written. Passing `beta == 0.0` skips reading `y`'s values but its
    /// length is still validated.
    ///
    /// # Errors
    /// Returns [`ShapeMismatch`](crate::error::Error::ShapeMismatch) when
    /// `x.len() != A.ncols()` or `y.len() != A.nrows()`, and
    /// [`DTypeMismatch`](crate::error::Error::DTypeMismatch) when the operand
    /// dtypes disagree with the matrix values.
    ///
    /// # Example
    ///
    /// ```
    /// use sparsr::prelude::*;
    ///
    /// let device = CpuDevice::new();
    /// let client = CpuRuntime::default_client(&device);
    ///
    /// // [[2, 0], [1, 3]]
    /// let a: SparseMatrix<CpuRuntime> = CsrData::from_slices(
    ///     &[0, 1, 3],
    ///     &[0, 0, 1],
    ///     &[2.0f64, 1.0, 3.0],
    ///     [2, 2],
    ///     MemLocation::Device,
    ///     &device,
    /// )?
    /// .into();
    ///
    /// let x = Array::<CpuRuntime>::from_slice(&[1.0f64, 1.0], MemLocation::Device, &device)?;
    /// let y = Array::<CpuRuntime>::zeros(2, DType::F64, MemLocation::Device, &device)?;
    ///
    /// let out = client.spmv(1.0, &a, &x, 0.0, &y)?;
    /// assert_eq!(out.to_vec::<f64>()?, vec![2.0, 4.0]);
    /// # Ok::<(), sparsr::error::Error>(())
    /// ```
    fn spmv(
        &self,
        alpha: f64,
        a: &SparseMatrix<R>,
        x: &Array<R>,
        beta: f64,
        y: &Array<R>,
    ) -> Result<Array<R>>;
}
