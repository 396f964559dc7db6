//! Runtime abstraction for compute backends
//!
//! The solver core is written against [`Runtime`]/[`RuntimeClient`] and
//! never touches memory directly: buffers are `u64` handles, transfers are
//! explicit, and kernels are dispatched through the client. The crate ships
//! the CPU reference backend; an accelerator backend implements the same
//! traits.

mod allocator;
mod traits;

#[cfg(feature = "cpu")]
pub mod cpu;

pub use allocator::Allocator;
pub use traits::{Device, Runtime, RuntimeClient};
