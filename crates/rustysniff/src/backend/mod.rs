//! Capture backends
//!
//! Two backends share one shape: [`controller`] captures the raw HCI traffic
//! of a single controller, [`monitor`] captures the kernel's monitor channel
//! covering every controller. Each provides an enumerator, a factory that
//! claims matching device names, and a [`CaptureBackend`](crate::handle::CaptureBackend)
//! implementation.

pub mod controller;
pub mod monitor;


use crate::error::CaptureError;
use crate::handle::HandleCore;
use crate::hci::socket::option_bytes;
use crate::hci::TransportProvider;
use libc::c_int;

/// Last `/`-separated component of a device name
pub(crate) fn device_basename(device: &str) -> &str {
    device.rsplit('/').next().unwrap_or(device)
}

/// Lays out the receive buffer and records the link type
///
/// The first `control_size` bytes receive control messages, the frame
/// header follows, then room for a full snapshot.
pub(crate) fn prepare(core: &mut HandleCore, control_size: usize, header_size: usize, linktype: i32) {
    core.bufsize = core.snapshot() + control_size + header_size;
    core.offset = control_size;
    core.linktype = linktype;
}

/// Opens the socket and allocates the receive buffer
pub(crate) fn open_socket(core: &mut HandleCore, provider: &dyn TransportProvider) -> Result<(), CaptureError> {
    let transport = provider
        .open()
        .map_err(|e| CaptureError::os("Can't create raw socket", e))?;
    core.transport = Some(transport);
    core.alloc_buffer()
}

pub(crate) fn set_int_option(core: &mut HandleCore, level: c_int, name: c_int, value: c_int) -> std::io::Result<()> {
    match core.transport.as_mut() {
        Some(transport) => transport.set_option(level, name, option_bytes(&value)),
        None => Err(std::io::Error::from_raw_os_error(libc::EBADF)),
    }
}

/// Applies a requested socket receive buffer size, if any
pub(crate) fn set_receive_buffer(core: &mut HandleCore) -> Result<(), CaptureError> {
    if core.opts.buffer_size == 0 {
        return Ok(());
    }
    let size = c_int::try_from(core.opts.buffer_size).unwrap_or(c_int::MAX);
    set_int_option(core, libc::SOL_SOCKET, libc::SO_RCVBUF, size)
        .map_err(|e| CaptureError::os("SO_RCVBUF", e))
}

/// Publishes the socket as the handle's pollable descriptor
pub(crate) fn finish_activation(core: &mut HandleCore) -> Result<(), CaptureError> {
    let fd = core.transport_mut()?.raw_fd();
    core.selectable_fd = Some(fd);
    Ok(())
}
