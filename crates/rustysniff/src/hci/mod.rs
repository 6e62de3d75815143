//! Bluetooth HCI socket layer
//!
//! This module holds the kernel ABI mirrors and the socket abstraction the
//! capture backends are written against.

pub mod abi;
pub mod cmsg;
pub mod constants;
pub mod frame;
pub mod socket;

#[cfg(test)]
mod tests;

pub use abi::{HciBindAddr, HciDevInfo, HciDevReq, HciDevStats, HciFilter};
pub use cmsg::{Ancillary, Timeval};
pub use frame::{H4Header, MonitorHeader, MgmtHeader};
pub use socket::{HciSocket, HciTransport, RecvMsg, SystemProvider, TransportProvider};
