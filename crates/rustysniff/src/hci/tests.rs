//! Unit tests for the HCI socket layer

use super::abi::*;
use super::cmsg::*;
use super::constants::*;
use super::frame::*;
use crate::version::KernelVersion;

#[test]
fn test_decode_hci_direction_and_timestamp() {
    let mut control = Vec::new();
    encode(&mut control, SOL_HCI, HCI_CMSG_DIR, &1i32.to_ne_bytes());
    encode(&mut control, SOL_HCI, HCI_CMSG_TSTAMP, &timeval_bytes(1_700_000_000, 250_000));

    let anc = decode_hci(&control);
    assert_eq!(anc.direction, Some(1));
    assert!(anc.is_incoming());
    assert_eq!(
        anc.timestamp,
        Some(Timeval {
            tv_sec: 1_700_000_000,
            tv_usec: 250_000
        })
    );
}

#[test]
fn test_decode_hci_ignores_unknown_types() {
    let mut control = Vec::new();
    encode(&mut control, SOL_HCI, 0x7f, &[0xaa; 12]);
    encode(&mut control, SOL_HCI, HCI_CMSG_DIR, &0i32.to_ne_bytes());

    let anc = decode_hci(&control);
    assert_eq!(anc.direction, Some(0));
    assert!(!anc.is_incoming());
    assert_eq!(anc.timestamp, None);
}

#[test]
fn test_decode_empty_and_truncated_control() {
    assert_eq!(decode_hci(&[]), Ancillary::default());

    let mut control = Vec::new();
    encode(&mut control, SOL_HCI, HCI_CMSG_DIR, &1i32.to_ne_bytes());
    // A header cut short yields nothing rather than garbage
    assert_eq!(decode_hci(&control[..4]), Ancillary::default());
}

#[test]
fn test_decode_monitor_only_takes_socket_timestamps() {
    let mut control = Vec::new();
    // Same type number, wrong level
    encode(&mut control, SOL_HCI, libc::SCM_TIMESTAMP, &timeval_bytes(1, 1));
    encode(&mut control, libc::SOL_SOCKET, libc::SCM_TIMESTAMP, &timeval_bytes(42, 7));

    let anc = decode_monitor(&control);
    assert_eq!(anc.direction, None);
    assert_eq!(anc.timestamp, Some(Timeval { tv_sec: 42, tv_usec: 7 }));
}

#[test]
fn test_control_message_walk() {
    let mut control = Vec::new();
    encode(&mut control, 1, 2, &[1, 2, 3]);
    encode(&mut control, 3, 4, &[]);

    let msgs: Vec<_> = ControlMessages::new(&control).collect();
    assert_eq!(msgs.len(), 2);
    assert_eq!((msgs[0].level, msgs[0].kind, msgs[0].data), (1, 2, &[1u8, 2, 3][..]));
    assert_eq!((msgs[1].level, msgs[1].kind), (3, 4));
    assert!(msgs[1].data.is_empty());
}

#[test]
fn test_h4_header_layout() {
    let mut out = [0xffu8; 6];
    H4Header::new(true).write_to(&mut out).unwrap();
    assert_eq!(&out[..4], &[0, 0, 0, 1]);
    assert_eq!(&out[4..], &[0xff, 0xff]);

    H4Header::new(false).write_to(&mut out).unwrap();
    assert_eq!(&out[..4], &[0, 0, 0, 0]);

    assert!(H4Header::new(true).write_to(&mut out[..3]).is_none());
}

#[test]
fn test_monitor_header_from_mgmt() {
    let mgmt = MgmtHeader::parse(&[0x02, 0x00, 0x01, 0x00, 0x10, 0x00]).unwrap();
    assert_eq!(mgmt.opcode, 0x0002);
    assert_eq!(mgmt.index, 0x0001);
    assert_eq!(mgmt.len, 0x0010);

    let mut out = [0u8; 4];
    MonitorHeader::from(mgmt).write_to(&mut out).unwrap();
    // Adapter index first, both fields big endian
    assert_eq!(out, [0x00, 0x01, 0x00, 0x02]);

    assert!(MgmtHeader::parse(&[0x02, 0x00, 0x01]).is_none());
}

#[test]
fn test_bind_layout_follows_kernel_version() {
    let old = HciBindAddr::raw_for_kernel(3, KernelVersion::new(2, 6, 37));
    assert!(matches!(old, HciBindAddr::Legacy(_)));
    assert_eq!(old.dev_id(), 3);
    assert_eq!(old.channel_id(), None);

    let new = HciBindAddr::raw_for_kernel(3, KernelVersion::new(2, 6, 38));
    assert_eq!(new.channel_id(), Some(HCI_CHANNEL_RAW));

    let modern = HciBindAddr::raw_for_kernel(0, KernelVersion::new(6, 1, 0));
    assert!(matches!(modern, HciBindAddr::Channel(_)));
}

#[test]
fn test_accept_all_filter() {
    let filter = HciFilter::accept_all();
    assert_eq!(filter.type_mask, u32::MAX);
    assert_eq!(filter.event_mask, [u32::MAX, u32::MAX]);
    assert_eq!(filter.opcode, 0);
}

#[test]
fn test_ioctl_numbers() {
    assert_eq!(HCIGETDEVLIST, 0x8004_48d2);
    assert_eq!(HCIGETDEVINFO, 0x8004_48d3);
}
