//! CPU client and allocator implementation

use super::device::CpuDevice;
use super::runtime::CpuRuntime;
use crate::error::Result;
use crate::runtime::{Allocator, Runtime, RuntimeClient};

/// CPU client for operation dispatch
#[derive(Clone, Debug)]
pub struct CpuClient {
    pub(crate) device: CpuDevice,
    allocator: CpuAllocator,
}

impl CpuClient {
    /// Create a new CPU client
    pub fn new(device: CpuDevice) -> Self {
        let allocator = CpuAllocator {
            device: device.clone(),
        };
        Self { device, allocator }
    }
}

impl RuntimeClient<CpuRuntime> for CpuClient {
    fn device(&self) -> &CpuDevice {
        &self.device
    }

    fn synchronize(&self) {
        // CPU operations are synchronous, nothing to do
    }

    fn allocator(&self) -> &CpuAllocator {
        &self.allocator
    }
}

/// CPU allocator delegating to the runtime's aligned heap allocation
///
/// All CPU "device" allocations share one live-byte counter, so the count
/// reported here covers arrays created through any client or device handle.
#[derive(Clone, Debug)]
pub struct CpuAllocator {
    device: CpuDevice,
}

impl Allocator for CpuAllocator {
    fn allocate(&self, size_bytes: usize) -> Result<u64> {
        CpuRuntime::allocate(size_bytes, &self.device)
    }

    fn deallocate(&self, ptr: u64, size_bytes: usize) {
        CpuRuntime::deallocate(ptr, size_bytes, &self.device);
    }

    fn allocated_bytes(&self) -> usize {
        super::runtime::live_bytes()
    }
}
