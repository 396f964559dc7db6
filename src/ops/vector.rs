//! Dense vector (BLAS-1) operations trait.

use crate::array::Array;
use crate::error::Result;
use crate::runtime::Runtime;

/// Dense vector operations on arrays.
///
/// Value kernels return a fresh array placed at the location of their first
/// array argument; reductions (`dot`, `nrm2`) synchronize the device and
/// return a host `f64` regardless of the storage dtype.
///
/// # Example
///
/// ```
/// use sparsr::prelude::*;
///
/// let device = CpuDevice::new();
/// let client = CpuRuntime::default_client(&device);
///
/// let x = Array::<CpuRuntime>::from_slice(&[1.0f64, 2.0, 3.0], MemLocation::Device, &device)?;
/// let y = Array::<CpuRuntime>::from_slice(&[4.0f64, 5.0, 6.0], MemLocation::Device, &device)?;
///
/// assert_eq!(client.dot(&x, &y)?, 32.0);
/// let z = client.axpy(2.0, &x, &y)?; // [6.0, 9.0, 12.0]
/// assert_eq!(z.to_vec::<f64>()?, vec![6.0, 9.0, 12.0]);
/// # Ok::<(), sparsr::error::Error>(())
/// ```
pub trait VectorOps<R: Runtime> {
    /// Inner product `xᵀ·y`, accumulated in f64.
    ///
    /// Synchronizing: the result is read back to the host.
    ///
    /// # Errors
    /// Returns an error if lengths or dtypes differ, or the dtype is not a
    /// float type.
    fn dot(&self, x: &Array<R>, y: &Array<R>) -> Result<f64>;

    /// Euclidean norm `‖x‖₂`, accumulated in f64.
    ///
    /// Synchronizing: the result is read back to the host.
    fn nrm2(&self, x: &Array<R>) -> Result<f64>;

    /// `alpha·x + y`.
    ///
    /// # Arguments
    /// * `alpha` - Scalar multiplier, converted to the storage dtype
    /// * `x` - Scaled operand
    /// * `y` - Added operand (same length and dtype as `x`)
    fn axpy(&self, alpha: f64, x: &Array<R>, y: &Array<R>) -> Result<Array<R>>;

    /// `alpha·x`.
    fn scal(&self, alpha: f64, x: &Array<R>) -> Result<Array<R>>;

    /// A copy of `x` at the same location.
    fn copy(&self, x: &Array<R>) -> Result<Array<R>>;

    /// Element-wise `x + y`.
    fn add(&self, x: &Array<R>, y: &Array<R>) -> Result<Array<R>>;

    /// Element-wise `x - y`.
    fn sub(&self, x: &Array<R>, y: &Array<R>) -> Result<Array<R>>;

    /// Element-wise `x / y`.
    ///
    /// Division by a zero element produces the IEEE result for the storage
    /// dtype; callers that need a guarded divide (the Jacobi scaling path)
    /// validate the divisor up front.
    fn elementwise_div(&self, x: &Array<R>, y: &Array<R>) -> Result<Array<R>>;
}
