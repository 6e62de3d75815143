//! HCI socket implementation for capturing Bluetooth traffic
//!
//! This module provides a wrapper around the raw `AF_BLUETOOTH` socket and
//! the two traits the capture backends talk to. Backends only ever see
//! [`HciTransport`] and [`TransportProvider`], so the whole receive path can
//! be driven by a scripted transport in tests.

use super::abi::{HciBindAddr, HciDevInfo, HciDevListReq, HciDevReq};
use super::constants::{AF_BLUETOOTH, BTPROTO_HCI, HCIGETDEVINFO, HCIGETDEVLIST, HCI_MAX_DEV};
use libc::c_int;
use std::ffi::CStr;
use std::io::{self, IoSliceMut};
use std::os::unix::io::{AsRawFd, RawFd};

/// Result of one `recvmsg` call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecvMsg {
    /// Bytes scattered into the data buffers
    pub bytes: usize,
    /// Bytes of control messages written to the control buffer
    pub control_len: usize,
}

/// Operations a capture backend performs on an open HCI socket
pub trait HciTransport: Send {
    /// Descriptor to poll for readiness
    fn raw_fd(&self) -> RawFd;

    fn bind(&mut self, addr: &HciBindAddr) -> io::Result<()>;

    fn set_option(&mut self, level: c_int, name: c_int, value: &[u8]) -> io::Result<()>;

    /// Receives one datagram, scattered over `bufs`, plus its control messages
    fn recv_msg(&mut self, bufs: &mut [IoSliceMut<'_>], control: &mut [u8]) -> io::Result<RecvMsg>;

    /// `HCIGETDEVLIST`: the controllers the kernel knows about
    fn device_list(&mut self) -> io::Result<Vec<HciDevReq>>;

    /// `HCIGETDEVINFO` for one controller
    fn device_info(&mut self, dev_id: u16) -> io::Result<HciDevInfo>;
}

/// Source of HCI sockets and of the facts about the host they depend on
pub trait TransportProvider: Send + Sync {
    /// Opens a new, unbound raw HCI socket
    fn open(&self) -> io::Result<Box<dyn HciTransport>>;

    /// Release string of the running kernel
    fn kernel_release(&self) -> Option<String>;
}

/// Views a plain `#[repr(C)]` value as the bytes passed to `setsockopt`
pub(crate) fn option_bytes<T: Copy>(value: &T) -> &[u8] {
    // SAFETY: T is Copy plain data and the slice lives no longer than `value`
    unsafe { std::slice::from_raw_parts((value as *const T).cast::<u8>(), std::mem::size_of::<T>()) }
}

/// A raw `AF_BLUETOOTH`/`BTPROTO_HCI` socket
#[derive(Debug)]
pub struct HciSocket {
    fd: RawFd,
}

impl HciSocket {
    /// Opens a new raw HCI socket, not yet bound to anything
    pub fn open() -> io::Result<Self> {
        let fd = unsafe { libc::socket(AF_BLUETOOTH, libc::SOCK_RAW | libc::SOCK_CLOEXEC, BTPROTO_HCI) };

        if fd < 0 {
            return Err(io::Error::last_os_error());
        }

        Ok(HciSocket { fd })
    }
}

impl HciTransport for HciSocket {
    fn raw_fd(&self) -> RawFd {
        self.fd
    }

    fn bind(&mut self, addr: &HciBindAddr) -> io::Result<()> {
        let (ptr, len) = match addr {
            HciBindAddr::Legacy(a) => (
                a as *const _ as *const libc::sockaddr,
                std::mem::size_of_val(a),
            ),
            HciBindAddr::Channel(a) => (
                a as *const _ as *const libc::sockaddr,
                std::mem::size_of_val(a),
            ),
        };

        let result = unsafe { libc::bind(self.fd, ptr, len as libc::socklen_t) };

        if result < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    fn set_option(&mut self, level: c_int, name: c_int, value: &[u8]) -> io::Result<()> {
        let result = unsafe {
            libc::setsockopt(
                self.fd,
                level,
                name,
                value.as_ptr() as *const libc::c_void,
                value.len() as libc::socklen_t,
            )
        };

        if result < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    fn recv_msg(&mut self, bufs: &mut [IoSliceMut<'_>], control: &mut [u8]) -> io::Result<RecvMsg> {
        let mut msg: libc::msghdr = unsafe { std::mem::zeroed() };
        // IoSliceMut is ABI compatible with iovec on unix
        msg.msg_iov = bufs.as_mut_ptr().cast::<libc::iovec>();
        msg.msg_iovlen = bufs.len() as _;
        msg.msg_control = control.as_mut_ptr() as *mut libc::c_void;
        msg.msg_controllen = control.len() as _;

        let received = unsafe { libc::recvmsg(self.fd, &mut msg, 0) };

        if received < 0 {
            return Err(io::Error::last_os_error());
        }

        Ok(RecvMsg {
            bytes: received as usize,
            control_len: (msg.msg_controllen as usize).min(control.len()),
        })
    }

    fn device_list(&mut self) -> io::Result<Vec<HciDevReq>> {
        let mut req = HciDevListReq::default();

        let result = unsafe { libc::ioctl(self.fd, HCIGETDEVLIST as _, &mut req as *mut HciDevListReq) };

        if result < 0 {
            return Err(io::Error::last_os_error());
        }

        let count = (req.dev_num as usize).min(HCI_MAX_DEV);
        Ok(req.dev_req[..count].to_vec())
    }

    fn device_info(&mut self, dev_id: u16) -> io::Result<HciDevInfo> {
        let mut info = HciDevInfo {
            dev_id,
            ..Default::default()
        };

        let result = unsafe { libc::ioctl(self.fd, HCIGETDEVINFO as _, &mut info as *mut HciDevInfo) };

        if result < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(info)
    }
}

impl AsRawFd for HciSocket {
    fn as_raw_fd(&self) -> RawFd {
        self.fd
    }
}

impl Drop for HciSocket {
    fn drop(&mut self) {
        unsafe {
            libc::close(self.fd);
        }
    }
}

/// Real sockets on the running host
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemProvider;

impl TransportProvider for SystemProvider {
    fn open(&self) -> io::Result<Box<dyn HciTransport>> {
        Ok(Box::new(HciSocket::open()?))
    }

    fn kernel_release(&self) -> Option<String> {
        let mut uts: libc::utsname = unsafe { std::mem::zeroed() };
        if unsafe { libc::uname(&mut uts) } != 0 {
            return None;
        }
        let release = unsafe { CStr::from_ptr(uts.release.as_ptr()) };
        release.to_str().ok().map(str::to_owned)
    }
}
