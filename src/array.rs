//! Array: dtype-erased 1-D buffers with Arc-based sharing
//!
//! Every vector and every payload array of a sparse matrix is an [`Array`].
//! The payload lives either in host memory or behind a device handle, never
//! both: the storage enum makes the two locations mutually exclusive, so a
//! stale host/device mirror cannot exist. Transfers between locations are
//! explicit [`Array::to_location`] calls.
//!
//! Cloning an array is a cheap reference-counted view; the device buffer is
//! released exactly once, when the last reference drops.

use crate::dtype::{DType, Element};
use crate::error::{Error, Result};
use crate::runtime::Runtime;
use std::sync::Arc;

/// Where a payload lives
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum MemLocation {
    /// Host (pageable CPU) memory
    Host,
    /// Device memory behind a runtime handle
    Device,
}

impl MemLocation {
    /// Lowercase name for diagnostics
    pub const fn name(self) -> &'static str {
        match self {
            Self::Host => "host",
            Self::Device => "device",
        }
    }
}

// Host bytes are backed by a Vec<u64> so the buffer start is 8-byte aligned
// for Pod casts to f64/i64/f32.
enum Payload {
    Host { words: Vec<u64>, len_bytes: usize },
    Device { ptr: u64, size_bytes: usize },
}

struct ArrayInner<R: Runtime> {
    payload: Payload,
    len: usize,
    dtype: DType,
    device: R::Device,
}

impl<R: Runtime> Drop for ArrayInner<R> {
    fn drop(&mut self) {
        if let Payload::Device { ptr, size_bytes } = self.payload {
            R::deallocate(ptr, size_bytes, &self.device);
        }
    }
}

/// Dtype-erased 1-D array on a host or device location
pub struct Array<R: Runtime> {
    inner: Arc<ArrayInner<R>>,
}

impl<R: Runtime> Clone for Array<R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<R: Runtime> Array<R> {
    /// Create an array by copying a typed slice to the given location
    pub fn from_slice<T: Element>(
        data: &[T],
        location: MemLocation,
        device: &R::Device,
    ) -> Result<Self> {
        let bytes: &[u8] = bytemuck::cast_slice(data);
        Self::from_bytes(bytes, data.len(), T::DTYPE, location, device)
    }

    /// Create a zero-filled array
    pub fn zeros(
        len: usize,
        dtype: DType,
        location: MemLocation,
        device: &R::Device,
    ) -> Result<Self> {
        let size_bytes = len * dtype.size_in_bytes();
        let payload = match location {
            MemLocation::Host => Payload::Host {
                words: vec![0u64; size_bytes.div_ceil(8)],
                len_bytes: size_bytes,
            },
            MemLocation::Device => {
                let ptr = R::allocate(size_bytes, device)?;
                Payload::Device { ptr, size_bytes }
            }
        };

        Ok(Self {
            inner: Arc::new(ArrayInner {
                payload,
                len,
                dtype,
                device: device.clone(),
            }),
        })
    }

    fn from_bytes(
        bytes: &[u8],
        len: usize,
        dtype: DType,
        location: MemLocation,
        device: &R::Device,
    ) -> Result<Self> {
        let payload = match location {
            MemLocation::Host => {
                let mut words = vec![0u64; bytes.len().div_ceil(8)];
                bytemuck::cast_slice_mut::<u64, u8>(&mut words)[..bytes.len()]
                    .copy_from_slice(bytes);
                Payload::Host {
                    words,
                    len_bytes: bytes.len(),
                }
            }
            MemLocation::Device => {
                let ptr = R::allocate(bytes.len(), device)?;
                R::copy_to_device(bytes, ptr, device)?;
                Payload::Device {
                    ptr,
                    size_bytes: bytes.len(),
                }
            }
        };

        Ok(Self {
            inner: Arc::new(ArrayInner {
                payload,
                len,
                dtype,
                device: device.clone(),
            }),
        })
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        self.inner.len
    }

    /// True if the array holds no elements
    pub fn is_empty(&self) -> bool {
        self.inner.len == 0
    }

    /// Element type
    pub fn dtype(&self) -> DType {
        self.inner.dtype
    }

    /// Payload location
    pub fn location(&self) -> MemLocation {
        match self.inner.payload {
            Payload::Host { .. } => MemLocation::Host,
            Payload::Device { .. } => MemLocation::Device,
        }
    }

    /// Device this array is bound to
    pub fn device(&self) -> &R::Device {
        &self.inner.device
    }

    /// Size of the payload in bytes
    pub fn size_bytes(&self) -> usize {
        self.inner.len * self.inner.dtype.size_in_bytes()
    }

    /// Copy the contents into a typed host `Vec`, regardless of location
    pub fn to_vec<T: Element>(&self) -> Result<Vec<T>> {
        if T::DTYPE != self.inner.dtype {
            return Err(Error::DTypeMismatch {
                lhs: T::DTYPE,
                rhs: self.inner.dtype,
            });
        }

        match &self.inner.payload {
            Payload::Host { words, len_bytes } => {
                let bytes = &bytemuck::cast_slice::<u64, u8>(words)[..*len_bytes];
                Ok(bytemuck::cast_slice::<u8, T>(bytes).to_vec())
            }
            Payload::Device { ptr, size_bytes } => {
                let mut out = vec![T::zero(); self.inner.len];
                let dst: &mut [u8] = bytemuck::cast_slice_mut(&mut out);
                debug_assert_eq!(dst.len(), *size_bytes);
                R::copy_from_device(*ptr, dst, &self.inner.device)?;
                Ok(out)
            }
        }
    }

    /// Materialize a copy of this array at the given location
    ///
    /// Always copies, including host-to-host and device-to-device.
    pub fn to_location(&self, location: MemLocation, device: &R::Device) -> Result<Self> {
        match (&self.inner.payload, location) {
            (Payload::Host { words, len_bytes }, _) => {
                let bytes = &bytemuck::cast_slice::<u64, u8>(words)[..*len_bytes];
                Self::from_bytes(bytes, self.inner.len, self.inner.dtype, location, device)
            }
            (Payload::Device { ptr, size_bytes }, MemLocation::Device) => {
                let dst = R::allocate(*size_bytes, device)?;
                R::copy_within_device(*ptr, dst, *size_bytes, device)?;
                Ok(Self {
                    inner: Arc::new(ArrayInner {
                        payload: Payload::Device {
                            ptr: dst,
                            size_bytes: *size_bytes,
                        },
                        len: self.inner.len,
                        dtype: self.inner.dtype,
                        device: device.clone(),
                    }),
                })
            }
            (Payload::Device { ptr, size_bytes }, MemLocation::Host) => {
                let mut words = vec![0u64; size_bytes.div_ceil(8)];
                {
                    let dst = &mut bytemuck::cast_slice_mut::<u64, u8>(&mut words)[..*size_bytes];
                    R::copy_from_device(*ptr, dst, &self.inner.device)?;
                }
                Ok(Self {
                    inner: Arc::new(ArrayInner {
                        payload: Payload::Host {
                            words,
                            len_bytes: *size_bytes,
                        },
                        len: self.inner.len,
                        dtype: self.inner.dtype,
                        device: device.clone(),
                    }),
                })
            }
        }
    }

    /// View host payload as a typed slice
    ///
    /// Errors with `UnsupportedLocation` for device-resident arrays; `op`
    /// names the caller for the message.
    pub fn host_slice<T: Element>(&self, op: &'static str) -> Result<&[T]> {
        if T::DTYPE != self.inner.dtype {
            return Err(Error::DTypeMismatch {
                lhs: T::DTYPE,
                rhs: self.inner.dtype,
            });
        }
        match &self.inner.payload {
            Payload::Host { words, len_bytes } => {
                let bytes = &bytemuck::cast_slice::<u64, u8>(words)[..*len_bytes];
                Ok(bytemuck::cast_slice::<u8, T>(bytes))
            }
            Payload::Device { .. } => Err(Error::UnsupportedLocation {
                op,
                required: "host",
            }),
        }
    }

    /// Raw device handle, if device-resident
    pub(crate) fn device_ptr(&self) -> Option<u64> {
        match self.inner.payload {
            Payload::Device { ptr, .. } => Some(ptr),
            Payload::Host { .. } => None,
        }
    }
}

impl<R: Runtime> std::fmt::Debug for Array<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Array")
            .field("len", &self.len())
            .field("dtype", &self.dtype())
            .field("location", &self.location())
            .finish()
    }
}
