//! Fixed-layout records exchanged with the kernel
//!
//! These are `#[repr(C)]` copies of structures from the Linux Bluetooth
//! headers. Their sizes are checked at compile time; a mismatch means the
//! kernel ABI moved and this module needs updating.

use super::constants::{AF_BLUETOOTH, HCI_CHANNEL_RAW, HCI_MAX_DEV};
use crate::version::KernelVersion;

/// Original `sockaddr_hci`, before channels existed
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SockaddrHciV1 {
    pub hci_family: libc::sa_family_t,
    pub hci_dev: u16,
}

/// `sockaddr_hci` with the channel field
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SockaddrHciV2 {
    pub hci_family: libc::sa_family_t,
    pub hci_dev: u16,
    pub hci_channel: u16,
}

/// Address an HCI socket is bound to, in one of the two kernel layouts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HciBindAddr {
    Legacy(SockaddrHciV1),
    Channel(SockaddrHciV2),
}

/// First kernel accepting the channel field in `sockaddr_hci`
pub const CHANNEL_ADDR_MIN_KERNEL: KernelVersion = KernelVersion::new(2, 6, 38);

impl HciBindAddr {
    /// Raw-channel address for `dev_id`, in the layout `kernel` understands
    pub fn raw_for_kernel(dev_id: u16, kernel: KernelVersion) -> Self {
        if kernel < CHANNEL_ADDR_MIN_KERNEL {
            HciBindAddr::Legacy(SockaddrHciV1 {
                hci_family: AF_BLUETOOTH as libc::sa_family_t,
                hci_dev: dev_id,
            })
        } else {
            Self::channel(dev_id, HCI_CHANNEL_RAW)
        }
    }

    pub fn channel(dev_id: u16, channel: u16) -> Self {
        HciBindAddr::Channel(SockaddrHciV2 {
            hci_family: AF_BLUETOOTH as libc::sa_family_t,
            hci_dev: dev_id,
            hci_channel: channel,
        })
    }

    pub fn dev_id(&self) -> u16 {
        match self {
            HciBindAddr::Legacy(a) => a.hci_dev,
            HciBindAddr::Channel(a) => a.hci_dev,
        }
    }

    pub fn channel_id(&self) -> Option<u16> {
        match self {
            HciBindAddr::Legacy(_) => None,
            HciBindAddr::Channel(a) => Some(a.hci_channel),
        }
    }
}

/// Kernel-side HCI socket filter (`struct hci_ufilter`)
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HciFilter {
    pub type_mask: u32,
    pub event_mask: [u32; 2],
    pub opcode: u16,
    // Trailing padding, spelled out so every byte handed to the kernel is initialized
    _pad: u16,
}

impl HciFilter {
    /// Every packet type and event passes, no opcode restriction
    pub fn accept_all() -> Self {
        HciFilter {
            type_mask: u32::MAX,
            event_mask: [u32::MAX; 2],
            opcode: 0,
            _pad: 0,
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct HciDevReq {
    pub dev_id: u16,
    pub dev_opt: u32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct HciDevListReq {
    pub dev_num: u16,
    pub dev_req: [HciDevReq; HCI_MAX_DEV],
}

impl Default for HciDevListReq {
    fn default() -> Self {
        HciDevListReq {
            dev_num: HCI_MAX_DEV as u16,
            dev_req: [HciDevReq::default(); HCI_MAX_DEV],
        }
    }
}

/// Per-controller counters kept by the kernel
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HciDevStats {
    pub err_rx: u32,
    pub err_tx: u32,
    pub cmd_tx: u32,
    pub evt_rx: u32,
    pub acl_tx: u32,
    pub acl_rx: u32,
    pub sco_tx: u32,
    pub sco_rx: u32,
    pub byte_rx: u32,
    pub byte_tx: u32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct HciDevInfo {
    pub dev_id: u16,
    pub name: [u8; 8],
    pub bdaddr: [u8; 6],
    pub flags: u32,
    pub dev_type: u8,
    pub features: [u8; 8],
    pub pkt_type: u32,
    pub link_policy: u32,
    pub link_mode: u32,
    pub acl_mtu: u16,
    pub acl_pkts: u16,
    pub sco_mtu: u16,
    pub sco_pkts: u16,
    pub stat: HciDevStats,
}

const _: () = assert!(std::mem::size_of::<SockaddrHciV1>() == 4);
const _: () = assert!(std::mem::size_of::<SockaddrHciV2>() == 6);
const _: () = assert!(std::mem::size_of::<HciFilter>() == 16);
const _: () = assert!(std::mem::size_of::<HciDevReq>() == 8);
const _: () = assert!(std::mem::size_of::<HciDevStats>() == 40);
const _: () = assert!(std::mem::size_of::<HciDevInfo>() == 92);
