//! Error types for the rustysniff library
//!
//! This module defines the error type returned by capture operations and the
//! bounded error buffer every handle keeps its last diagnostic in.

use thiserror::Error;

/// Size of a capture handle's error buffer, terminator included
pub const PCAP_ERRBUF_SIZE: usize = 256;

/// Generic failure
pub const PCAP_ERROR: i32 = -1;
/// Operation requires an activated handle
pub const PCAP_ERROR_NOT_ACTIVATED: i32 = -3;
/// Operation requires a handle that has not been activated yet
pub const PCAP_ERROR_ACTIVATED: i32 = -4;
/// Monitor (rfmon) mode was requested but is not supported
pub const PCAP_ERROR_RFMON_NOTSUP: i32 = -6;

/// Errors that can occur when working with capture handles
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("{0}")]
    Generic(String),

    #[error("Monitor mode is not supported on Bluetooth devices")]
    RfmonNotSupported,

    #[error("The capture handle has not been activated")]
    NotActivated,

    #[error("The capture handle has already been activated")]
    AlreadyActivated,

    #[error("No such device: {0}")]
    NoSuchDevice(String),
}

impl CaptureError {
    /// Builds a generic failure from a context prefix and an OS error
    pub(crate) fn os(context: impl std::fmt::Display, err: std::io::Error) -> Self {
        CaptureError::Generic(format!("{context}: {err}"))
    }

    /// Numeric status code of this error as seen by status-code based callers
    pub fn code(&self) -> i32 {
        match self {
            CaptureError::Generic(_) | CaptureError::NoSuchDevice(_) => PCAP_ERROR,
            CaptureError::RfmonNotSupported => PCAP_ERROR_RFMON_NOTSUP,
            CaptureError::NotActivated => PCAP_ERROR_NOT_ACTIVATED,
            CaptureError::AlreadyActivated => PCAP_ERROR_ACTIVATED,
        }
    }
}

/// Bounded, human-readable diagnostic owned by a capture handle
///
/// Text longer than `PCAP_ERRBUF_SIZE - 1` bytes is cut on a character
/// boundary, so the buffer can always be handed to a C caller with its
/// terminator.
#[derive(Debug, Default, Clone)]
pub struct ErrorBuffer {
    text: String,
}

impl ErrorBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the stored diagnostic
    pub fn set(&mut self, message: &str) {
        let mut end = message.len().min(PCAP_ERRBUF_SIZE - 1);
        while !message.is_char_boundary(end) {
            end -= 1;
        }
        self.text.clear();
        self.text.push_str(&message[..end]);
    }

    /// Stores the diagnostic of an error and hands the error back
    pub fn record(&mut self, err: CaptureError) -> CaptureError {
        self.set(&err.to_string());
        err
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}
