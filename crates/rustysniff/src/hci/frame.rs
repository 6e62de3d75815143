//! Frame headers
//!
//! Captured frames are handed out with a small pseudo-header in front of the
//! payload, in the layouts the capture-file link types expect. The monitor
//! channel additionally prefixes every datagram with a management header
//! that is parsed here.

use byteorder::{BigEndian, LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::Cursor;

/// Pseudo-header of `DLT_BLUETOOTH_HCI_H4_WITH_PHDR`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct H4Header {
    /// 1 for frames received from the controller, 0 for frames sent to it
    pub direction: u32,
}

impl H4Header {
    pub const SIZE: usize = 4;

    pub fn new(incoming: bool) -> Self {
        Self {
            direction: u32::from(incoming),
        }
    }

    /// Writes the header in network byte order; `out` must hold `SIZE` bytes
    pub fn write_to(&self, out: &mut [u8]) -> Option<()> {
        let mut cursor = Cursor::new(out.get_mut(..Self::SIZE)?);
        cursor.write_u32::<BigEndian>(self.direction).ok()
    }

    pub fn parse(data: &[u8]) -> Option<Self> {
        let mut cursor = Cursor::new(data);
        let direction = cursor.read_u32::<BigEndian>().ok()?;
        Some(Self { direction })
    }
}

/// Pseudo-header of `DLT_BLUETOOTH_LINUX_MONITOR`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MonitorHeader {
    pub adapter_id: u16,
    pub opcode: u16,
}

impl MonitorHeader {
    pub const SIZE: usize = 4;

    /// Writes the header in network byte order; `out` must hold `SIZE` bytes
    pub fn write_to(&self, out: &mut [u8]) -> Option<()> {
        let mut cursor = Cursor::new(out.get_mut(..Self::SIZE)?);
        cursor.write_u16::<BigEndian>(self.adapter_id).ok()?;
        cursor.write_u16::<BigEndian>(self.opcode).ok()
    }

    pub fn parse(data: &[u8]) -> Option<Self> {
        let mut cursor = Cursor::new(data);
        let adapter_id = cursor.read_u16::<BigEndian>().ok()?;
        let opcode = cursor.read_u16::<BigEndian>().ok()?;
        Some(Self { adapter_id, opcode })
    }
}

impl From<MgmtHeader> for MonitorHeader {
    fn from(hdr: MgmtHeader) -> Self {
        MonitorHeader {
            adapter_id: hdr.index,
            opcode: hdr.opcode,
        }
    }
}

/// Management header prefixed by the kernel to monitor-channel datagrams
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MgmtHeader {
    pub opcode: u16,
    pub index: u16,
    pub len: u16,
}

impl MgmtHeader {
    pub const SIZE: usize = super::constants::MGMT_HDR_SIZE;

    /// Parses the header; the kernel writes its fields little endian
    pub fn parse(data: &[u8]) -> Option<Self> {
        let mut cursor = Cursor::new(data);
        let opcode = cursor.read_u16::<LittleEndian>().ok()?;
        let index = cursor.read_u16::<LittleEndian>().ok()?;
        let len = cursor.read_u16::<LittleEndian>().ok()?;
        Some(Self { opcode, index, len })
    }

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut out = [0u8; Self::SIZE];
        out[0..2].copy_from_slice(&self.opcode.to_le_bytes());
        out[2..4].copy_from_slice(&self.index.to_le_bytes());
        out[4..6].copy_from_slice(&self.len.to_le_bytes());
        out
    }
}
