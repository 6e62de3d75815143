//! HCI socket constants
//!
//! Mirrors of values from the Linux Bluetooth headers. The kernel does not
//! export these through libc, so they are kept here and must track the
//! kernel ABI (`include/net/bluetooth/hci_sock.h`, `hci.h`, `mgmt.h`).

use libc::c_int;

// Socket family and protocol
pub const AF_BLUETOOTH: c_int = 31;
pub const BTPROTO_HCI: c_int = 1;

// Socket option level and options
pub const SOL_HCI: c_int = 0;
pub const HCI_DATA_DIR: c_int = 1;
pub const HCI_FILTER: c_int = 2;
pub const HCI_TIME_STAMP: c_int = 3;

// Control message types delivered at SOL_HCI
pub const HCI_CMSG_DIR: c_int = 0x0001;
pub const HCI_CMSG_TSTAMP: c_int = 0x0002;

// Channels
pub const HCI_CHANNEL_RAW: u16 = 0;
pub const HCI_CHANNEL_MONITOR: u16 = 2;

// "No specific controller"
pub const HCI_DEV_NONE: u16 = 0xffff;

// Maximum number of entries requested from HCIGETDEVLIST
pub const HCI_MAX_DEV: usize = 16;

// Device flag bits reported in hci_dev_req.dev_opt
pub const HCI_UP: u32 = 0;
pub const HCI_RUNNING: u32 = 2;

// Size of the monitor channel's management header
pub const MGMT_HDR_SIZE: usize = 6;

const IOC_READ: libc::c_ulong = 2;

const fn ior(ty: u8, nr: u8, size: usize) -> libc::c_ulong {
    (IOC_READ << 30) | ((size as libc::c_ulong) << 16) | ((ty as libc::c_ulong) << 8) | nr as libc::c_ulong
}

// ioctl requests, both declared as _IOR('H', nr, int)
pub const HCIGETDEVLIST: libc::c_ulong = ior(b'H', 210, std::mem::size_of::<c_int>());
pub const HCIGETDEVINFO: libc::c_ulong = ior(b'H', 211, std::mem::size_of::<c_int>());

// Link-layer header types of the frames handed to callers
pub const DLT_BLUETOOTH_HCI_H4_WITH_PHDR: i32 = 201;
pub const DLT_BLUETOOTH_LINUX_MONITOR: i32 = 254;
