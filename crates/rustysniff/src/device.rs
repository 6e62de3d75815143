//! Interface lists produced by device discovery

use crate::error::CaptureError;
use bitflags::bitflags;

bitflags! {
    /// Properties reported for a discovered interface
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct InterfaceFlags: u32 {
        const LOOPBACK = 0x0000_0001;
        const UP = 0x0000_0002;
        const RUNNING = 0x0000_0004;
        const WIRELESS = 0x0000_0008;
        const CONNECTION_STATUS_NOT_APPLICABLE = 0x0000_0030;
    }
}

/// One capturable interface
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interface {
    pub name: String,
    pub description: Option<String>,
    pub flags: InterfaceFlags,
}

/// Caller-owned list the enumerators append to
#[derive(Debug, Clone, Default)]
pub struct DeviceList {
    interfaces: Vec<Interface>,
}

impl DeviceList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an interface; names must be unique within the list
    pub fn add(
        &mut self,
        name: &str,
        flags: InterfaceFlags,
        description: &str,
    ) -> Result<(), CaptureError> {
        if self.find(name).is_some() {
            return Err(CaptureError::Generic(format!(
                "Interface {name} is already in the device list"
            )));
        }
        self.interfaces.push(Interface {
            name: name.to_string(),
            description: (!description.is_empty()).then(|| description.to_string()),
            flags,
        });
        Ok(())
    }

    pub fn find(&self, name: &str) -> Option<&Interface> {
        self.interfaces.iter().find(|i| i.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Interface> {
        self.interfaces.iter()
    }

    pub fn len(&self) -> usize {
        self.interfaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interfaces.is_empty()
    }
}

impl IntoIterator for DeviceList {
    type Item = Interface;
    type IntoIter = std::vec::IntoIter<Interface>;

    fn into_iter(self) -> Self::IntoIter {
        self.interfaces.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_names_are_rejected() {
        let mut list = DeviceList::new();
        list.add("bluetooth0", InterfaceFlags::WIRELESS, "Bluetooth adapter number 0")
            .unwrap();
        assert!(list.add("bluetooth0", InterfaceFlags::empty(), "").is_err());
        assert_eq!(list.len(), 1);

        let iface = list.find("bluetooth0").unwrap();
        assert_eq!(iface.description.as_deref(), Some("Bluetooth adapter number 0"));
    }
}
