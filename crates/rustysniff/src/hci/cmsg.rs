//! Ancillary (control message) decoding
//!
//! `recvmsg` fills the control buffer with a sequence of `cmsghdr` records.
//! The walker here reads them straight out of the byte buffer, following the
//! kernel's alignment rules, so the buffer needs no particular alignment.

use super::constants::{HCI_CMSG_DIR, HCI_CMSG_TSTAMP};
use libc::c_int;
use std::mem::size_of;

/// Capture timestamp carried with a frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Timeval {
    pub tv_sec: i64,
    pub tv_usec: i64,
}

impl Timeval {
    fn read(data: &[u8]) -> Option<Self> {
        if data.len() < size_of::<libc::timeval>() {
            return None;
        }
        // SAFETY: length checked above, read_unaligned tolerates any alignment
        let tv: libc::timeval = unsafe { std::ptr::read_unaligned(data.as_ptr().cast()) };
        Some(Timeval {
            tv_sec: tv.tv_sec as i64,
            tv_usec: tv.tv_usec as i64,
        })
    }
}

/// One decoded control message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlMessage<'a> {
    pub level: c_int,
    pub kind: c_int,
    pub data: &'a [u8],
}

pub(crate) const fn cmsg_align(len: usize) -> usize {
    (len + size_of::<usize>() - 1) & !(size_of::<usize>() - 1)
}

/// Offset of the payload inside a control message
pub(crate) const CMSG_DATA_OFFSET: usize = cmsg_align(size_of::<libc::cmsghdr>());

/// Iterator over the control messages in a received control buffer
pub struct ControlMessages<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ControlMessages<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }
}

impl<'a> Iterator for ControlMessages<'a> {
    type Item = ControlMessage<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let rest = self.buf.get(self.pos..)?;
        if rest.len() < size_of::<libc::cmsghdr>() {
            return None;
        }
        // SAFETY: at least one full header remains in the buffer
        let hdr: libc::cmsghdr = unsafe { std::ptr::read_unaligned(rest.as_ptr().cast()) };
        let len = hdr.cmsg_len as usize;
        if len < size_of::<libc::cmsghdr>() {
            return None;
        }
        let end = len.min(rest.len());
        let data = rest.get(CMSG_DATA_OFFSET.min(end)..end).unwrap_or(&[]);
        self.pos = self.pos.saturating_add(cmsg_align(len));
        Some(ControlMessage {
            level: hdr.cmsg_level,
            kind: hdr.cmsg_type,
            data,
        })
    }
}

/// Metadata delivered alongside one datagram
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Ancillary {
    /// Non-zero for frames received from the controller
    pub direction: Option<i32>,
    pub timestamp: Option<Timeval>,
}

impl Ancillary {
    pub fn is_incoming(&self) -> bool {
        self.direction.unwrap_or(0) != 0
    }
}

/// Decodes the metadata of a raw-channel HCI socket
///
/// Only the message type is looked at; anything that is neither a direction
/// nor a timestamp is skipped.
pub fn decode_hci(control: &[u8]) -> Ancillary {
    let mut anc = Ancillary::default();
    for msg in ControlMessages::new(control) {
        match msg.kind {
            HCI_CMSG_DIR => {
                if let Some(bytes) = msg.data.get(..size_of::<c_int>()) {
                    let mut raw = [0u8; size_of::<c_int>()];
                    raw.copy_from_slice(bytes);
                    anc.direction = Some(c_int::from_ne_bytes(raw));
                }
            }
            HCI_CMSG_TSTAMP => {
                if let Some(ts) = Timeval::read(msg.data) {
                    anc.timestamp = Some(ts);
                }
            }
            _ => {}
        }
    }
    anc
}

/// Decodes the metadata of a monitor-channel socket (`SO_TIMESTAMP` only)
pub fn decode_monitor(control: &[u8]) -> Ancillary {
    let mut anc = Ancillary::default();
    for msg in ControlMessages::new(control) {
        if msg.level != libc::SOL_SOCKET || msg.kind != libc::SCM_TIMESTAMP {
            continue;
        }
        if let Some(ts) = Timeval::read(msg.data) {
            anc.timestamp = Some(ts);
        }
    }
    anc
}

/// Appends one control message in kernel layout, as `put_cmsg` would
#[cfg(test)]
pub(crate) fn encode(buf: &mut Vec<u8>, level: c_int, kind: c_int, data: &[u8]) {
    let start = buf.len();
    let len = CMSG_DATA_OFFSET + data.len();
    // SAFETY: cmsghdr is plain old data
    let mut hdr: libc::cmsghdr = unsafe { std::mem::zeroed() };
    hdr.cmsg_len = len as _;
    hdr.cmsg_level = level;
    hdr.cmsg_type = kind;
    // SAFETY: reading the bytes of an initialized plain struct
    let hdr_bytes = unsafe {
        std::slice::from_raw_parts(
            (&hdr as *const libc::cmsghdr).cast::<u8>(),
            size_of::<libc::cmsghdr>(),
        )
    };
    buf.extend_from_slice(hdr_bytes);
    buf.resize(start + CMSG_DATA_OFFSET, 0);
    buf.extend_from_slice(data);
    buf.resize(start + cmsg_align(len), 0);
}

/// Bytes of a `timeval`, as carried in timestamp control messages
#[cfg(test)]
pub(crate) fn timeval_bytes(sec: i64, usec: i64) -> Vec<u8> {
    let tv = libc::timeval {
        tv_sec: sec as libc::time_t,
        tv_usec: usec as libc::suseconds_t,
    };
    // SAFETY: reading the bytes of an initialized plain struct
    unsafe {
        std::slice::from_raw_parts(
            (&tv as *const libc::timeval).cast::<u8>(),
            size_of::<libc::timeval>(),
        )
    }
    .to_vec()
}
