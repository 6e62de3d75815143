//! Capture handles
//!
//! A [`CaptureHandle`] pairs the state every live capture needs (options,
//! socket, receive buffer, filter, error buffer) with the backend that was
//! selected for its device name. The backend implements [`CaptureBackend`];
//! everything that is the same for all backends lives on [`HandleCore`].

use crate::error::{CaptureError, ErrorBuffer};
use crate::hci::{HciTransport, RecvMsg, Timeval};
use std::io::{self, IoSliceMut};
use std::os::unix::io::RawFd;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Largest snapshot length a handle accepts
pub const MAXIMUM_SNAPLEN: u32 = 262_144;

/// Which traffic direction a handle delivers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Direction {
    #[default]
    InOut,
    In,
    Out,
}

impl Direction {
    /// Whether a frame travelling in the given direction passes this setting
    pub fn admits(self, incoming: bool) -> bool {
        match self {
            Direction::InOut => true,
            Direction::In => incoming,
            Direction::Out => !incoming,
        }
    }
}

/// Per-frame information handed to the delivery callback
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PacketHeader {
    pub ts: Timeval,
    /// Bytes available in the delivered slice
    pub caplen: u32,
    /// Length of the frame on the wire
    pub len: u32,
}

/// Outcome of one read step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadStatus {
    /// A frame was handed to the callback
    Delivered,
    /// A datagram arrived but was rejected by the direction setting or filter
    Filtered,
    /// `breakloop` was requested while waiting
    Cancelled,
}

impl ReadStatus {
    pub fn code(self) -> i32 {
        match self {
            ReadStatus::Delivered => 1,
            ReadStatus::Filtered => 0,
            ReadStatus::Cancelled => -2,
        }
    }
}

/// Cumulative interface counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    pub received: u32,
    pub dropped: u32,
    pub if_dropped: u32,
}

/// A compiled filter program, evaluated in userspace on every frame
pub trait PacketFilter: Send {
    /// `frame` holds the `caplen` captured bytes of a `len` byte frame
    fn matches(&self, frame: &[u8], len: u32, caplen: u32) -> bool;
}

impl<F> PacketFilter for F
where
    F: Fn(&[u8], u32, u32) -> bool + Send,
{
    fn matches(&self, frame: &[u8], len: u32, caplen: u32) -> bool {
        self(frame, len, caplen)
    }
}

/// Options fixed at activation time
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureOptions {
    /// 0 selects `MAXIMUM_SNAPLEN`
    pub snapshot: u32,
    pub rfmon: bool,
    /// Socket receive buffer size; 0 keeps the kernel default
    pub buffer_size: u32,
}

/// State shared by every backend
pub struct HandleCore {
    pub(crate) source: String,
    pub(crate) opts: CaptureOptions,
    pub(crate) transport: Option<Box<dyn HciTransport>>,
    pub(crate) buffer: Vec<u8>,
    pub(crate) bufsize: usize,
    /// Start of the frame header; the bytes before it hold control messages
    pub(crate) offset: usize,
    pub(crate) linktype: i32,
    pub(crate) direction: Direction,
    pub(crate) filter: Option<Box<dyn PacketFilter>>,
    pub(crate) break_loop: Arc<AtomicBool>,
    pub(crate) selectable_fd: Option<RawFd>,
    pub(crate) errbuf: ErrorBuffer,
    pub(crate) activated: bool,
}

pub(crate) enum Received {
    Datagram(RecvMsg),
    Cancelled,
}

impl HandleCore {
    fn new(source: &str) -> Self {
        HandleCore {
            source: source.to_string(),
            opts: CaptureOptions::default(),
            transport: None,
            buffer: Vec::new(),
            bufsize: 0,
            offset: 0,
            linktype: 0,
            direction: Direction::InOut,
            filter: None,
            break_loop: Arc::new(AtomicBool::new(false)),
            selectable_fd: None,
            errbuf: ErrorBuffer::new(),
            activated: false,
        }
    }

    pub(crate) fn snapshot(&self) -> usize {
        self.opts.snapshot as usize
    }

    /// Allocates the receive buffer of `bufsize` bytes
    pub(crate) fn alloc_buffer(&mut self) -> Result<(), CaptureError> {
        let mut buffer = Vec::new();
        buffer
            .try_reserve_exact(self.bufsize)
            .map_err(|e| CaptureError::Generic(format!("Can't allocate dump buffer: {e}")))?;
        buffer.resize(self.bufsize, 0);
        self.buffer = buffer;
        Ok(())
    }

    pub(crate) fn transport_mut(&mut self) -> Result<&mut Box<dyn HciTransport>, CaptureError> {
        self.transport.as_mut().ok_or(CaptureError::NotActivated)
    }

    /// Releases everything activation acquired
    pub(crate) fn cleanup_live_common(&mut self) {
        self.transport = None;
        self.buffer = Vec::new();
        self.selectable_fd = None;
    }

    /// Runs the installed filter, if any, over a finished frame
    pub(crate) fn accepts(&self, frame: &[u8], len: u32, caplen: u32) -> bool {
        self.filter
            .as_ref()
            .map_or(true, |f| f.matches(frame, len, caplen))
    }
}

/// Blocks for one datagram, retrying interrupted calls
///
/// The cancellation flag is checked before every attempt and cleared when
/// it is seen.
pub(crate) fn recv_retrying(
    transport: &mut dyn HciTransport,
    break_loop: &AtomicBool,
    bufs: &mut [IoSliceMut<'_>],
    control: &mut [u8],
) -> io::Result<Received> {
    loop {
        if break_loop.swap(false, Ordering::AcqRel) {
            return Ok(Received::Cancelled);
        }
        match transport.recv_msg(bufs, control) {
            Ok(msg) => return Ok(Received::Datagram(msg)),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
}

/// The operation set a capture backend installs on its handle
pub trait CaptureBackend: Send {
    /// Opens and configures the socket and sizes the receive buffer
    fn activate(&mut self, core: &mut HandleCore) -> Result<(), CaptureError>;

    /// Receives one datagram and hands it to `callback` if it is accepted
    ///
    /// `max_packets` is a hint; one datagram is processed per call.
    fn read(
        &mut self,
        core: &mut HandleCore,
        max_packets: i32,
        callback: &mut dyn FnMut(&PacketHeader, &[u8]),
    ) -> Result<ReadStatus, CaptureError>;

    fn inject(&mut self, core: &mut HandleCore, packet: &[u8]) -> Result<usize, CaptureError>;

    fn set_direction(&mut self, core: &mut HandleCore, direction: Direction) -> Result<(), CaptureError>;

    fn stats(&mut self, core: &mut HandleCore) -> Result<Stats, CaptureError>;
}

/// A live capture on one device
pub struct CaptureHandle {
    core: HandleCore,
    backend: Box<dyn CaptureBackend>,
}

impl CaptureHandle {
    pub(crate) fn new(source: &str, backend: Box<dyn CaptureBackend>) -> Self {
        CaptureHandle {
            core: HandleCore::new(source),
            backend,
        }
    }

    /// Device name the handle was created for
    pub fn source(&self) -> &str {
        &self.core.source
    }

    fn before_activation(&mut self) -> Result<&mut CaptureOptions, CaptureError> {
        if self.core.activated {
            return Err(self.core.errbuf.record(CaptureError::AlreadyActivated));
        }
        Ok(&mut self.core.opts)
    }

    fn after_activation(&mut self) -> Result<(), CaptureError> {
        if !self.core.activated {
            return Err(self.core.errbuf.record(CaptureError::NotActivated));
        }
        Ok(())
    }

    pub fn set_snaplen(&mut self, snaplen: u32) -> Result<(), CaptureError> {
        self.before_activation()?.snapshot = snaplen;
        Ok(())
    }

    pub fn set_rfmon(&mut self, rfmon: bool) -> Result<(), CaptureError> {
        self.before_activation()?.rfmon = rfmon;
        Ok(())
    }

    pub fn set_buffer_size(&mut self, size: u32) -> Result<(), CaptureError> {
        self.before_activation()?.buffer_size = size;
        Ok(())
    }

    pub fn activate(&mut self) -> Result<(), CaptureError> {
        self.before_activation()?;
        if self.core.opts.snapshot == 0 || self.core.opts.snapshot > MAXIMUM_SNAPLEN {
            self.core.opts.snapshot = MAXIMUM_SNAPLEN;
        }
        match self.backend.activate(&mut self.core) {
            Ok(()) => {
                self.core.activated = true;
                Ok(())
            }
            Err(e) => Err(self.core.errbuf.record(e)),
        }
    }

    pub fn is_activated(&self) -> bool {
        self.core.activated
    }

    /// Processes one datagram, delivering it to `callback` if accepted
    ///
    /// The slice handed to the callback borrows the handle's buffer and is
    /// overwritten by the next call.
    pub fn dispatch<F>(&mut self, max_packets: i32, mut callback: F) -> Result<ReadStatus, CaptureError>
    where
        F: FnMut(&PacketHeader, &[u8]),
    {
        self.after_activation()?;
        self.backend
            .read(&mut self.core, max_packets, &mut callback)
            .map_err(|e| self.core.errbuf.record(e))
    }

    pub fn inject(&mut self, packet: &[u8]) -> Result<usize, CaptureError> {
        self.after_activation()?;
        self.backend
            .inject(&mut self.core, packet)
            .map_err(|e| self.core.errbuf.record(e))
    }

    pub fn set_direction(&mut self, direction: Direction) -> Result<(), CaptureError> {
        self.backend
            .set_direction(&mut self.core, direction)
            .map_err(|e| self.core.errbuf.record(e))
    }

    pub fn direction(&self) -> Direction {
        self.core.direction
    }

    /// Installs a userspace filter; the kernel does no filtering for these sockets
    pub fn set_filter<F>(&mut self, filter: F) -> Result<(), CaptureError>
    where
        F: PacketFilter + 'static,
    {
        self.after_activation()?;
        self.core.filter = Some(Box::new(filter));
        Ok(())
    }

    pub fn clear_filter(&mut self) {
        self.core.filter = None;
    }

    pub fn stats(&mut self) -> Result<Stats, CaptureError> {
        self.after_activation()?;
        self.backend
            .stats(&mut self.core)
            .map_err(|e| self.core.errbuf.record(e))
    }

    pub fn nonblock(&mut self) -> Result<bool, CaptureError> {
        let fd = self.pollable()?;
        let flags = unsafe { libc::fcntl(fd, libc::F_GETFL, 0) };
        if flags == -1 {
            let err = CaptureError::os("F_GETFL", io::Error::last_os_error());
            return Err(self.core.errbuf.record(err));
        }
        Ok(flags & libc::O_NONBLOCK != 0)
    }

    pub fn set_nonblock(&mut self, nonblock: bool) -> Result<(), CaptureError> {
        let fd = self.pollable()?;
        let flags = unsafe { libc::fcntl(fd, libc::F_GETFL, 0) };
        if flags == -1 {
            let err = CaptureError::os("F_GETFL", io::Error::last_os_error());
            return Err(self.core.errbuf.record(err));
        }
        let flags = if nonblock {
            flags | libc::O_NONBLOCK
        } else {
            flags & !libc::O_NONBLOCK
        };
        if unsafe { libc::fcntl(fd, libc::F_SETFL, flags) } == -1 {
            let err = CaptureError::os("F_SETFL", io::Error::last_os_error());
            return Err(self.core.errbuf.record(err));
        }
        Ok(())
    }

    fn pollable(&mut self) -> Result<RawFd, CaptureError> {
        self.after_activation()?;
        self.core
            .selectable_fd
            .ok_or_else(|| self.core.errbuf.record(CaptureError::NotActivated))
    }

    /// Asks the read step in progress, or the next one, to return `Cancelled`
    pub fn breakloop(&self) {
        self.core.break_loop.store(true, Ordering::Release);
    }

    /// Flag that cancels reads when set, usable from other threads
    pub fn break_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.core.break_loop)
    }

    /// Descriptor to wait on before calling `dispatch`
    pub fn selectable_fd(&self) -> Option<RawFd> {
        self.core.selectable_fd
    }

    pub fn datalink(&self) -> i32 {
        self.core.linktype
    }

    pub fn snapshot(&self) -> u32 {
        self.core.opts.snapshot
    }

    /// Size of the receive buffer allocated at activation
    pub fn buffer_len(&self) -> usize {
        self.core.buffer.len()
    }

    /// Last diagnostic recorded on this handle
    pub fn geterr(&self) -> &str {
        self.core.errbuf.as_str()
    }
}

impl std::fmt::Debug for CaptureHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureHandle")
            .field("source", &self.core.source)
            .field("activated", &self.core.activated)
            .field("linktype", &self.core.linktype)
            .field("direction", &self.core.direction)
            .finish()
    }
}
