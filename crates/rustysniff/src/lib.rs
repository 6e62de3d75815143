//! RustySniff - live capture of Bluetooth HCI traffic on Linux
//!
//! This library opens raw `AF_BLUETOOTH` HCI sockets and delivers the frames
//! crossing a controller, or the kernel's monitor channel, to a callback,
//! each prefixed with the pseudo-header of its capture link type.
//!
//! Device names follow two conventions:
//! - `bluetooth<N>` captures controller `hci<N>`
//! - `bluetooth-monitor` captures the monitor channel of all controllers

pub mod backend;
pub mod device;
pub mod error;
pub mod handle;
pub mod hci;
pub mod version;

#[cfg(test)]
mod testutil;

use std::sync::Arc;

// Re-export common types for convenience
pub use device::{DeviceList, Interface, InterfaceFlags};
pub use error::{CaptureError, ErrorBuffer, PCAP_ERRBUF_SIZE};
pub use handle::{CaptureHandle, Direction, PacketFilter, PacketHeader, ReadStatus, Stats, MAXIMUM_SNAPLEN};
pub use hci::{HciSocket, SystemProvider, Timeval, TransportProvider};
pub use version::KernelVersion;

/// Lists every Bluetooth interface available on this host
pub fn find_all_devices() -> Result<DeviceList, CaptureError> {
    find_all_devices_with(&SystemProvider)
}

/// Lists every Bluetooth interface `provider` can reach
pub fn find_all_devices_with(provider: &dyn TransportProvider) -> Result<DeviceList, CaptureError> {
    let mut list = DeviceList::new();
    backend::controller::find_all_devices(&mut list, provider)?;
    backend::monitor::find_all_devices(&mut list, provider)?;
    Ok(list)
}

/// Creates an inactive capture handle for `device`
pub fn create(device: &str) -> Result<CaptureHandle, CaptureError> {
    create_with(device, Arc::new(SystemProvider))
}

/// Creates an inactive capture handle for `device` on sockets from `provider`
pub fn create_with(device: &str, provider: Arc<dyn TransportProvider>) -> Result<CaptureHandle, CaptureError> {
    backend::controller::create(device, Arc::clone(&provider))
        .or_else(|| backend::monitor::create(device, provider))
        .ok_or_else(|| CaptureError::NoSuchDevice(device.to_string()))
}
