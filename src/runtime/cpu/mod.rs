//! CPU runtime implementation
//!
//! The reference backend: every kernel the solver core consumes (BLAS1,
//! format-polymorphic SpMV, triangular solves, stationary and factorization
//! sweeps) implemented on host memory. Value kernels compute in the element
//! type and accumulate reductions in f64.

mod client;
mod device;
mod runtime;
mod spmv;
mod sweeps;
mod trisolve;
mod vector;

pub use client::{CpuAllocator, CpuClient};
pub use device::CpuDevice;
pub use runtime::CpuRuntime;

use crate::array::{Array, MemLocation};
use crate::dtype::Element;
use crate::error::{Error, Result};

/// Borrow an array's payload as a typed slice, wherever it lives.
///
/// Host payloads are reinterpreted in place. Device payloads on this backend
/// are ordinary (64-byte aligned) host allocations behind a handle, so the
/// handle is turned back into a slice; the borrow of `a` keeps the
/// allocation alive while the view exists.
pub(crate) fn typed_view<'a, T: Element>(
    a: &'a Array<CpuRuntime>,
    op: &'static str,
) -> Result<&'a [T]> {
    match a.location() {
        MemLocation::Host => a.host_slice::<T>(op),
        MemLocation::Device => {
            if a.dtype() != T::DTYPE {
                return Err(Error::DTypeMismatch {
                    lhs: T::DTYPE,
                    rhs: a.dtype(),
                });
            }
            if a.is_empty() {
                return Ok(&[]);
            }
            let ptr = a
                .device_ptr()
                .ok_or_else(|| Error::Internal(format!("{op}: device array lost its handle")))?;
            // Safety: the allocation holds `len` elements of `T` (dtype
            // checked above), is aligned far beyond `T`'s requirement, and
            // outlives the borrow of `a`. Kernels never mutate payloads in
            // place, so no aliasing write can occur during the view.
            Ok(unsafe { std::slice::from_raw_parts(ptr as *const T, a.len()) })
        }
    }
}
