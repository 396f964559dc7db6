//! Trait for device identification and capability queries

/// Trait for device identification
pub trait Device: Clone + Send + Sync + 'static {
    /// Unique identifier for this device
    fn id(&self) -> usize;

    /// Check if two devices are the same
    fn is_same(&self, other: &Self) -> bool {
        self.id() == other.id()
    }

    /// Human-readable name
    fn name(&self) -> String {
        format!("Device({})", self.id())
    }

    /// Whether the device can be used right now
    fn is_available(&self) -> bool {
        true
    }

    /// Total device memory in bytes, if the backend reports it
    fn total_memory(&self) -> Option<usize> {
        None
    }
}
