//! BLAS-1 kernels for the CPU backend

#[cfg(feature = "rayon")]
use rayon::prelude::*;

use super::{typed_view, CpuClient, CpuRuntime};
use crate::array::Array;
use crate::dtype::Element;
use crate::error::{Error, Result};
use crate::ops::VectorOps;
use crate::runtime::{Device, RuntimeClient};

/// Inputs to a two-operand kernel must agree on length, dtype and device.
fn check_pair(x: &Array<CpuRuntime>, y: &Array<CpuRuntime>) -> Result<()> {
    if x.len() != y.len() {
        return Err(Error::ShapeMismatch {
            expected: vec![x.len()],
            got: vec![y.len()],
        });
    }
    if x.dtype() != y.dtype() {
        return Err(Error::DTypeMismatch {
            lhs: x.dtype(),
            rhs: y.dtype(),
        });
    }
    if !x.device().is_same(y.device()) {
        return Err(Error::DeviceMismatch);
    }
    Ok(())
}

fn map_unary<T: Element, F>(xs: &[T], f: F) -> Vec<T>
where
    F: Fn(T) -> T + Send + Sync,
{
    #[cfg(feature = "rayon")]
    {
        xs.par_iter().map(|&v| f(v)).collect()
    }
    #[cfg(not(feature = "rayon"))]
    {
        xs.iter().map(|&v| f(v)).collect()
    }
}

fn map_binary<T: Element, F>(xs: &[T], ys: &[T], f: F) -> Vec<T>
where
    F: Fn(T, T) -> T + Send + Sync,
{
    #[cfg(feature = "rayon")]
    {
        xs.par_iter().zip(ys.par_iter()).map(|(&a, &b)| f(a, b)).collect()
    }
    #[cfg(not(feature = "rayon"))]
    {
        xs.iter().zip(ys.iter()).map(|(&a, &b)| f(a, b)).collect()
    }
}

impl VectorOps<CpuRuntime> for CpuClient {
    fn dot(&self, x: &Array<CpuRuntime>, y: &Array<CpuRuntime>) -> Result<f64> {
        check_pair(x, y)?;
        crate::dispatch_dtype!(x.dtype(), T => {
            let xs = typed_view::<T>(x, "dot")?;
            let ys = typed_view::<T>(y, "dot")?;
            #[cfg(feature = "rayon")]
            {
                Ok(xs
                    .par_iter()
                    .zip(ys.par_iter())
                    .map(|(&a, &b)| a.to_f64() * b.to_f64())
                    .sum())
            }
            #[cfg(not(feature = "rayon"))]
            {
                Ok(xs
                    .iter()
                    .zip(ys.iter())
                    .map(|(&a, &b)| a.to_f64() * b.to_f64())
                    .sum())
            }
        }, "dot")
    }

    fn nrm2(&self, x: &Array<CpuRuntime>) -> Result<f64> {
        crate::dispatch_dtype!(x.dtype(), T => {
            let xs = typed_view::<T>(x, "nrm2")?;
            #[cfg(feature = "rayon")]
            let sum: f64 = xs.par_iter().map(|&a| { let v = a.to_f64(); v * v }).sum();
            #[cfg(not(feature = "rayon"))]
            let sum: f64 = xs.iter().map(|&a| { let v = a.to_f64(); v * v }).sum();
            Ok(sum.sqrt())
        }, "nrm2")
    }

    fn axpy(
        &self,
        alpha: f64,
        x: &Array<CpuRuntime>,
        y: &Array<CpuRuntime>,
    ) -> Result<Array<CpuRuntime>> {
        check_pair(x, y)?;
        crate::dispatch_dtype!(x.dtype(), T => {
            let xs = typed_view::<T>(x, "axpy")?;
            let ys = typed_view::<T>(y, "axpy")?;
            let a = T::from_f64(alpha);
            let out = map_binary(xs, ys, |xi, yi| a * xi + yi);
            Array::from_slice(&out, x.location(), self.device())
        }, "axpy")
    }

    fn scal(&self, alpha: f64, x: &Array<CpuRuntime>) -> Result<Array<CpuRuntime>> {
        crate::dispatch_dtype!(x.dtype(), T => {
            let xs = typed_view::<T>(x, "scal")?;
            let a = T::from_f64(alpha);
            let out = map_unary(xs, |xi| a * xi);
            Array::from_slice(&out, x.location(), self.device())
        }, "scal")
    }

    fn copy(&self, x: &Array<CpuRuntime>) -> Result<Array<CpuRuntime>> {
        x.to_location(x.location(), self.device())
    }

    fn add(&self, x: &Array<CpuRuntime>, y: &Array<CpuRuntime>) -> Result<Array<CpuRuntime>> {
        check_pair(x, y)?;
        crate::dispatch_dtype!(x.dtype(), T => {
            let xs = typed_view::<T>(x, "add")?;
            let ys = typed_view::<T>(y, "add")?;
            let out = map_binary(xs, ys, |a, b| a + b);
            Array::from_slice(&out, x.location(), self.device())
        }, "add")
    }

    fn sub(&self, x: &Array<CpuRuntime>, y: &Array<CpuRuntime>) -> Result<Array<CpuRuntime>> {
        check_pair(x, y)?;
        crate::dispatch_dtype!(x.dtype(), T => {
            let xs = typed_view::<T>(x, "sub")?;
            let ys = typed_view::<T>(y, "sub")?;
            let out = map_binary(xs, ys, |a, b| a - b);
            Array::from_slice(&out, x.location(), self.device())
        }, "sub")
    }

    fn elementwise_div(
        &self,
        x: &Array<CpuRuntime>,
        y: &Array<CpuRuntime>,
    ) -> Result<Array<CpuRuntime>> {
        check_pair(x, y)?;
        crate::dispatch_dtype!(x.dtype(), T => {
            let xs = typed_view::<T>(x, "elementwise_div")?;
            let ys = typed_view::<T>(y, "elementwise_div")?;
            let out = map_binary(xs, ys, |a, b| a / b);
            Array::from_slice(&out, x.location(), self.device())
        }, "elementwise_div")
    }
}
