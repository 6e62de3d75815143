//! Monitor channel capture (`bluetooth-monitor`)
//!
//! The monitor channel carries the traffic of every controller, each
//! datagram wrapped in a management header. The header is replaced by the
//! adapter index and opcode (`DLT_BLUETOOTH_LINUX_MONITOR`).

use super::{device_basename, finish_activation, open_socket, prepare, set_int_option, set_receive_buffer};
use crate::device::{DeviceList, InterfaceFlags};
use crate::error::CaptureError;
use crate::handle::{
    recv_retrying, CaptureBackend, CaptureHandle, Direction, HandleCore, PacketHeader, ReadStatus, Received, Stats,
};
use crate::hci::abi::HciBindAddr;
use crate::hci::cmsg;
use crate::hci::constants::{DLT_BLUETOOTH_LINUX_MONITOR, HCI_CHANNEL_MONITOR, HCI_DEV_NONE};
use crate::hci::{MgmtHeader, MonitorHeader, TransportProvider};
use crate::version::{self, KernelVersion};
use std::io::IoSliceMut;
use std::sync::Arc;
use tracing::{debug, info, trace};

/// Name of the monitor interface
pub const INTERFACE_NAME: &str = "bluetooth-monitor";

const INTERFACE_DESCRIPTION: &str = "Bluetooth Linux Monitor";

/// Bytes reserved in front of the frame for control messages
const BT_CONTROL_SIZE: usize = 32;

/// First kernel providing the monitor channel
pub const MONITOR_MIN_KERNEL: KernelVersion = KernelVersion::new(3, 4, 0);

/// Appends the monitor interface when the running kernel provides it
pub fn find_all_devices(list: &mut DeviceList, provider: &dyn TransportProvider) -> Result<(), CaptureError> {
    match version::probe(provider) {
        Some(kernel) if kernel >= MONITOR_MIN_KERNEL => list.add(
            INTERFACE_NAME,
            InterfaceFlags::WIRELESS | InterfaceFlags::CONNECTION_STATUS_NOT_APPLICABLE,
            INTERFACE_DESCRIPTION,
        ),
        kernel => {
            debug!(?kernel, "no Bluetooth monitor channel on this kernel");
            Ok(())
        }
    }
}

/// Claims `device` if it names the monitor interface
pub fn create(device: &str, provider: Arc<dyn TransportProvider>) -> Option<CaptureHandle> {
    if device_basename(device) != INTERFACE_NAME {
        return None;
    }
    Some(CaptureHandle::new(device, Box::new(MonitorBackend { provider })))
}

/// Backend of a monitor channel capture
pub struct MonitorBackend {
    provider: Arc<dyn TransportProvider>,
}

impl MonitorBackend {
    fn configure(&mut self, core: &mut HandleCore) -> Result<(), CaptureError> {
        open_socket(core, self.provider.as_ref())?;

        let addr = HciBindAddr::channel(HCI_DEV_NONE, HCI_CHANNEL_MONITOR);
        core.transport_mut()?
            .bind(&addr)
            .map_err(|e| CaptureError::os("Can't attach to interface", e))?;

        set_int_option(core, libc::SOL_SOCKET, libc::SO_TIMESTAMP, 1)
            .map_err(|e| CaptureError::os("Can't enable time stamp", e))?;

        set_receive_buffer(core)?;
        finish_activation(core)
    }
}

impl CaptureBackend for MonitorBackend {
    fn activate(&mut self, core: &mut HandleCore) -> Result<(), CaptureError> {
        if core.opts.rfmon {
            return Err(CaptureError::RfmonNotSupported);
        }

        prepare(core, BT_CONTROL_SIZE, MonitorHeader::SIZE, DLT_BLUETOOTH_LINUX_MONITOR);

        if let Err(e) = self.configure(core) {
            core.cleanup_live_common();
            return Err(e);
        }

        info!(device = %core.source, snaplen = core.snapshot(), "monitor capture activated");
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
        let mut mgmt = [0u8; MgmtHeader::SIZE];

        let received = {
            let transport = core.transport.as_deref_mut().ok_or(CaptureError::NotActivated)?;
            let (control, rest) = core.buffer.split_at_mut(offset);
            let payload = &mut rest[MonitorHeader::SIZE..MonitorHeader::SIZE + snapshot];
            let mut bufs = [IoSliceMut::new(&mut mgmt), IoSliceMut::new(payload)];
            recv_retrying(transport, &core.break_loop, &mut bufs, control)
        };

        let msg = match received {
            Ok(Received::Datagram(msg)) => msg,
            Ok(Received::Cancelled) => return Ok(ReadStatus::Cancelled),
            Err(e) => return Err(CaptureError::os("Can't receive packet", e)),
        };

        let Some(mgmt) = MgmtHeader::parse(&mgmt[..msg.bytes.min(MgmtHeader::SIZE)]) else {
            trace!(bytes = msg.bytes, "monitor datagram shorter than its header");
            return Ok(ReadStatus::Filtered);
        };

        let anc = cmsg::decode_monitor(&core.buffer[..msg.control_len.min(offset)]);

        MonitorHeader::from(mgmt)
            .write_to(&mut core.buffer[offset..])
            .ok_or_else(|| CaptureError::Generic("Receive buffer too small for frame header".into()))?;

        let caplen = (msg.bytes - MgmtHeader::SIZE).min(snapshot) + MonitorHeader::SIZE;
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
        Err(CaptureError::Generic("inject not supported yet".into()))
    }

    /// Recorded on the handle, but monitor frames carry no direction to act on
    fn set_direction(&mut self, core: &mut HandleCore, direction: Direction) -> Result<(), CaptureError> {
        core.direction = direction;
        Ok(())
    }

    fn stats(&mut self, _core: &mut HandleCore) -> Result<Stats, CaptureError> {
        Ok(Stats::default())
    }
}
