//! Per-controller capture (`bluetooth<N>`)
//!
//! Binds a raw HCI socket to one controller and delivers every HCI packet
//! crossing it, prefixed with a 4-byte direction header
//! (`DLT_BLUETOOTH_HCI_H4_WITH_PHDR`).

use super::{device_basename, finish_activation, open_socket, prepare, set_int_option, set_receive_buffer};
use crate::device::{DeviceList, InterfaceFlags};
use crate::error::CaptureError;
use crate::handle::{
    recv_retrying, CaptureBackend, CaptureHandle, Direction, HandleCore, PacketHeader, ReadStatus, Received, Stats,
};
use crate::hci::abi::{HciBindAddr, HciDevStats, HciFilter};
use crate::hci::cmsg;
use crate::hci::constants::*;
use crate::hci::socket::option_bytes;
use crate::hci::{H4Header, TransportProvider};
use crate::version::{self, KernelVersion};
use std::io::{self, IoSliceMut};
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

/// Name prefix of per-controller interfaces
pub const BT_IFACE: &str = "bluetooth";

/// Bytes reserved in front of the frame for control messages
const BT_CTRL_SIZE: usize = 128;

/// Controller index encoded in a device name such as `bluetooth0`
///
/// Any leading path is ignored. The prefix must be followed by decimal
/// digits only, and the value must fit a kernel device id.
pub fn parse_device_index(device: &str) -> Option<u16> {
    let digits = device_basename(device).strip_prefix(BT_IFACE)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

fn interface_flags(dev_opt: u32) -> InterfaceFlags {
    let mut flags = InterfaceFlags::WIRELESS;
    if dev_opt & (1 << HCI_UP) != 0 {
        flags |= InterfaceFlags::UP;
    }
    if dev_opt & (1 << HCI_RUNNING) != 0 {
        flags |= InterfaceFlags::RUNNING;
    }
    flags
}

/// Appends one `bluetooth<N>` interface per controller the kernel reports
///
/// A kernel without Bluetooth support contributes nothing and is not an
/// error.
pub fn find_all_devices(list: &mut DeviceList, provider: &dyn TransportProvider) -> Result<(), CaptureError> {
    let mut sock = match provider.open() {
        Ok(sock) => sock,
        Err(e) if e.raw_os_error() == Some(libc::EAFNOSUPPORT) => {
            debug!("Bluetooth is not supported by this kernel, no controllers listed");
            return Ok(());
        }
        Err(e) => return Err(CaptureError::os("Can't open raw Bluetooth socket", e)),
    };

    let devices = sock
        .device_list()
        .map_err(|e| CaptureError::os("Can't get Bluetooth device list via ioctl", e))?;

    for (i, dev) in devices.iter().enumerate() {
        let name = format!("{BT_IFACE}{}", dev.dev_id);
        let description = format!("Bluetooth adapter number {i}");
        list.add(&name, interface_flags(dev.dev_opt), &description)?;
    }

    debug!(count = devices.len(), "listed Bluetooth controllers");
    Ok(())
}

/// Claims `device` if it names a controller
///
/// Returns `None`, without touching any socket, when the name is not ours.
pub fn create(device: &str, provider: Arc<dyn TransportProvider>) -> Option<CaptureHandle> {
    let dev_id = parse_device_index(device)?;
    Some(CaptureHandle::new(device, Box::new(ControllerBackend { dev_id, provider })))
}

/// Folds the kernel's per-controller counters into capture statistics
///
/// Both directions are observed by the capture, so transmit counters count
/// as received.
pub fn fold_stats(s: &HciDevStats) -> Stats {
    Stats {
        received: s
            .evt_rx
            .wrapping_add(s.acl_rx)
            .wrapping_add(s.sco_rx)
            .wrapping_add(s.cmd_tx)
            .wrapping_add(s.acl_tx)
            .wrapping_add(s.sco_tx),
        dropped: s.err_rx.wrapping_add(s.err_tx),
        if_dropped: 0,
    }
}

/// Backend state of a per-controller capture
pub struct ControllerBackend {
    dev_id: u16,
    provider: Arc<dyn TransportProvider>,
}

impl ControllerBackend {
    pub fn dev_id(&self) -> u16 {
        self.dev_id
    }

    fn configure(&mut self, core: &mut HandleCore) -> Result<(), CaptureError> {
        open_socket(core, self.provider.as_ref())?;

        set_int_option(core, SOL_HCI, HCI_DATA_DIR, 1)
            .map_err(|e| CaptureError::os("Can't enable data direction info", e))?;
        set_int_option(core, SOL_HCI, HCI_TIME_STAMP, 1)
            .map_err(|e| CaptureError::os("Can't enable time stamp", e))?;

        // Let every packet type and event through, filtering happens in userspace
        let filter = HciFilter::accept_all();
        core.transport_mut()?
            .set_option(SOL_HCI, HCI_FILTER, option_bytes(&filter))
            .map_err(|e| CaptureError::os("Can't set filter", e))?;

        let kernel = version::probe(self.provider.as_ref()).unwrap_or_else(|| {
            warn!(fallback = %KernelVersion::FALLBACK, "can't determine kernel version");
            KernelVersion::FALLBACK
        });
        let addr = HciBindAddr::raw_for_kernel(self.dev_id, kernel);
        debug!(%kernel, ?addr, "binding HCI socket");

        core.transport_mut()?
            .bind(&addr)
            .map_err(|e| CaptureError::os(format_args!("Can't attach to device {}", self.dev_id), e))?;

        set_receive_buffer(core)?;
        finish_activation(core)
    }
}

impl CaptureBackend for ControllerBackend {
    fn activate(&mut self, core: &mut HandleCore) -> Result<(), CaptureError> {
        if core.opts.rfmon {
            return Err(CaptureError::RfmonNotSupported);
        }

        self.dev_id = parse_device_index(&core.source).ok_or_else(|| {
            CaptureError::Generic(format!("Can't get Bluetooth device index from {}", core.source))
        })?;

        prepare(core, BT_CTRL_SIZE, H4Header::SIZE, DLT_BLUETOOTH_HCI_H4_WITH_PHDR);

        if let Err(e) = self.configure(core) {
            core.cleanup_live_common();
            return Err(e);
        }

        info!(device = %core.source, dev_id = self.dev_id, snaplen = core.snapshot(), "capture activated");
        Ok(())
    }

    fn read(
        &mut self,
        core: &mut HandleCore,
        _max_packets: i32,
        callback: &mut dyn FnMut(&PacketHeader, &[u8]),
    ) -> Result<ReadStatus, CaptureError> {
        let offset = core.offset;
        let snapshot = core.snapshot();

        let received = {
            let transport = core.transport.as_deref_mut().ok_or(CaptureError::NotActivated)?;
            let (control, rest) = core.buffer.split_at_mut(offset);
            let payload = &mut rest[H4Header::SIZE..H4Header::SIZE + snapshot];
            let mut bufs = [IoSliceMut::new(payload)];
            recv_retrying(transport, &core.break_loop, &mut bufs, control)
        };

        let msg = match received {
            Ok(Received::Datagram(msg)) => msg,
            Ok(Received::Cancelled) => return Ok(ReadStatus::Cancelled),
            Err(e) => return Err(CaptureError::os("Can't receive packet", e)),
        };

        let anc = cmsg::decode_hci(&core.buffer[..msg.control_len.min(offset)]);
        let incoming = anc.is_incoming();

        if !core.direction.admits(incoming) {
            trace!(incoming, "frame discarded by direction setting");
            return Ok(ReadStatus::Filtered);
        }

        H4Header::new(incoming)
            .write_to(&mut core.buffer[offset..])
            .ok_or_else(|| CaptureError::Generic("Receive buffer too small for frame header".into()))?;

        let caplen = msg.bytes.min(snapshot) + H4Header::SIZE;
        let header = PacketHeader {
            ts: anc.timestamp.unwrap_or_default(),
            caplen: caplen as u32,
            len: caplen as u32,
        };

        let frame = &core.buffer[offset..offset + caplen];
        if !core.accepts(frame, header.len, header.caplen) {
            return Ok(ReadStatus::Filtered);
        }
        callback(&header, frame);
        Ok(ReadStatus::Delivered)
    }

    fn inject(&mut self, _core: &mut HandleCore, _packet: &[u8]) -> Result<usize, CaptureError> {
        Err(CaptureError::Generic("inject not supported on bluetooth devices".into()))
    }

    fn set_direction(&mut self, core: &mut HandleCore, direction: Direction) -> Result<(), CaptureError> {
        core.direction = direction;
        Ok(())
    }

    fn stats(&mut self, core: &mut HandleCore) -> Result<Stats, CaptureError> {
        let transport = core.transport_mut()?;
        let info = loop {
            match transport.device_info(self.dev_id) {
                Ok(info) => break info,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(CaptureError::os("Can't get stats via ioctl", e)),
            }
        };
        Ok(fold_stats(&info.stat))
    }
}
