//! Data type system for sparsr arrays
//!
//! Matrix values are stored in one of the floating-point dtypes; index arrays
//! (row pointers, column indices) are always `I64`. The [`Element`] trait
//! connects Rust's type system to the runtime dtype tag, and the
//! [`dispatch_dtype!`] macro turns a runtime tag back into a concrete type
//! for kernel launches.

use bytemuck::{Pod, Zeroable};
use num_traits::NumOps;
use std::fmt;
use std::ops::Neg;

/// Element types understood by the runtime
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum DType {
    /// 64-bit floating point
    F64,
    /// 32-bit floating point
    F32,
    /// 64-bit signed integer (index arrays)
    I64,
}

impl DType {
    /// Size of one element in bytes
    #[inline]
    pub const fn size_in_bytes(self) -> usize {
        match self {
            Self::F64 | Self::I64 => 8,
            Self::F32 => 4,
        }
    }

    /// Returns true if this is a floating point type
    #[inline]
    pub const fn is_float(self) -> bool {
        matches!(self, Self::F64 | Self::F32)
    }

    /// Get the default dtype for floating point values
    #[inline]
    pub const fn default_float() -> Self {
        Self::F64
    }

    /// Short name for display (e.g., "f64", "i64")
    pub const fn short_name(self) -> &'static str {
        match self {
            Self::F64 => "f64",
            Self::F32 => "f32",
            Self::I64 => "i64",
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.short_name())
    }
}

/// Trait for types that can be elements of an array
///
/// Connects Rust's type system to sparsr's runtime dtype system. Kernels are
/// generic over `Element`; reductions accumulate in `f64` regardless of the
/// storage type.
pub trait Element:
    Copy
    + Clone
    + Send
    + Sync
    + Pod
    + Zeroable
    + 'static
    + NumOps
    + Neg<Output = Self>
    + PartialOrd
    + fmt::Debug
{
    /// The corresponding DType for this Rust type
    const DTYPE: DType;

    /// Convert to f64 for generic numeric operations
    fn to_f64(self) -> f64;

    /// Convert from f64 to this type
    fn from_f64(v: f64) -> Self;

    /// Zero value
    fn zero() -> Self;

    /// One value
    fn one() -> Self;

    /// Absolute value
    fn abs(self) -> Self;

    /// Complex conjugate; identity for real types
    #[inline]
    fn conj(self) -> Self {
        self
    }
}

impl Element for f64 {
    const DTYPE: DType = DType::F64;

    #[inline]
    fn to_f64(self) -> f64 {
        self
    }

    #[inline]
    fn from_f64(v: f64) -> Self {
        v
    }

    #[inline]
    fn zero() -> Self {
        0.0
    }

    #[inline]
    fn one() -> Self {
        1.0
    }

    #[inline]
    fn abs(self) -> Self {
        f64::abs(self)
    }
}

impl Element for f32 {
    const DTYPE: DType = DType::F32;

    #[inline]
    fn to_f64(self) -> f64 {
        self as f64
    }

    #[inline]
    fn from_f64(v: f64) -> Self {
        v as f32
    }

    #[inline]
    fn zero() -> Self {
        0.0
    }

    #[inline]
    fn one() -> Self {
        1.0
    }

    #[inline]
    fn abs(self) -> Self {
        f32::abs(self)
    }
}

impl Element for i64 {
    const DTYPE: DType = DType::I64;

    #[inline]
    fn to_f64(self) -> f64 {
        self as f64
    }

    #[inline]
    fn from_f64(v: f64) -> Self {
        v as i64
    }

    #[inline]
    fn zero() -> Self {
        0
    }

    #[inline]
    fn one() -> Self {
        1
    }

    #[inline]
    fn abs(self) -> Self {
        i64::abs(self)
    }
}

/// Macro for runtime dtype dispatch to typed operations.
///
/// Takes a `DType` value and executes a code block with `T` bound to the
/// corresponding Rust type. Integer dtypes are rejected with
/// [`crate::error::Error::UnsupportedDType`]; value kernels only run on
/// floats, and index arrays are accessed as `i64` directly.
#[macro_export]
macro_rules! dispatch_dtype {
    ($dtype:expr, $T:ident => $body:block, $error_op:expr) => {
        match $dtype {
            $crate::dtype::DType::F64 => {
                type $T = f64;
                $body
            }
            $crate::dtype::DType::F32 => {
                type $T = f32;
                $body
            }
            other => {
                return Err($crate::error::Error::UnsupportedDType {
                    dtype: other,
                    op: $error_op,
                });
            }
        }
    };
}
