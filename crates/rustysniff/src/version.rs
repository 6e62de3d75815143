//! Kernel version probing
//!
//! The HCI socket ABI changed over kernel releases, so a couple of decisions
//! are taken from the running kernel's release string.

use crate::hci::TransportProvider;

/// A `major.minor.patch` kernel version
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct KernelVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl KernelVersion {
    /// Assumed when the running kernel's version cannot be determined
    pub const FALLBACK: KernelVersion = KernelVersion::new(2, 6, 37);

    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self { major, minor, patch }
    }

    /// Parses a release string such as `"6.8.0-45-generic"`
    ///
    /// All three numeric components must be present; anything after the
    /// digits of the patch level is ignored.
    pub fn parse(release: &str) -> Option<Self> {
        let mut parts = release.trim_start().splitn(3, '.');
        let major = parts.next()?.parse().ok()?;
        let minor = parts.next()?.parse().ok()?;
        let patch_part = parts.next()?;
        let digits = patch_part
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(patch_part.len());
        let patch = patch_part[..digits].parse().ok()?;
        Some(Self::new(major, minor, patch))
    }
}

impl std::fmt::Display for KernelVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Version of the running kernel, if its release string can be read and parsed
pub fn probe(provider: &dyn TransportProvider) -> Option<KernelVersion> {
    provider
        .kernel_release()
        .as_deref()
        .and_then(KernelVersion::parse)
}
