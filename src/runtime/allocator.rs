//! Memory allocator trait
//!
//! Allocators manage device memory behind `u64` handles and keep a running
//! count of live bytes. The byte count is what lets tests assert that a
//! failed validation performed zero device allocations.

/// Memory allocator trait for runtime backends
pub trait Allocator: Clone + Send + Sync {
    /// Allocate memory of given size
    ///
    /// Returns a device pointer (u64) that can be used for operations.
    fn allocate(&self, size_bytes: usize) -> crate::error::Result<u64>;

    /// Deallocate memory
    fn deallocate(&self, ptr: u64, size_bytes: usize);

    /// Get the total live allocated bytes
    fn allocated_bytes(&self) -> usize;
}
