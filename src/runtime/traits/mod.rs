//! Core runtime traits

mod client;
mod device;
mod runtime;

pub use client::RuntimeClient;
pub use device::Device;
pub use runtime::Runtime;
