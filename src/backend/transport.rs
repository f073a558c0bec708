//! Transport traits for byte-stream devices
//!
//! This module provides the common interface the supervisor uses for every
//! device, enabling both real serial ports and mock devices for testing.
//!
//! A [`Transport`] knows how to open a device; the resulting [`DeviceLink`] is
//! owned by the supervisor's worker thread for as long as the link is open.
//! Implementations must report a missing or busy device as
//! [`SerialVisError::TransportUnavailable`](crate::error::SerialVisError::TransportUnavailable)
//! and a failure of an open link as
//! [`SerialVisError::TransportIo`](crate::error::SerialVisError::TransportIo),
//! since the supervisor retries the former and reconnects on the latter.

use crate::config::PortSettings;
use crate::error::Result;
use std::time::Duration;

/// Opens device links
///
/// # Example
///
/// ```ignore
/// fn first_line(transport: &dyn Transport, settings: &PortSettings) -> Result<Option<Vec<u8>>> {
///     let mut link = transport.open(settings, Duration::from_secs(1))?;
///     let line = link.read_line();
///     link.close();
///     line
/// }
/// ```
pub trait Transport: Send + Sync {
    /// Open the device described by `settings`
    ///
    /// `read_timeout` bounds every subsequent [`DeviceLink::read_line`] call.
    fn open(&self, settings: &PortSettings, read_timeout: Duration) -> Result<Box<dyn DeviceLink>>;

    /// Short human-readable name of the transport kind
    fn kind(&self) -> &'static str;
}

/// An open connection to a device
pub trait DeviceLink: Send {
    /// Read one newline-terminated line
    ///
    /// Returns `Ok(None)` when no complete line is available yet, either
    /// because the read timeout passed or because only part of a line has
    /// arrived. The returned bytes exclude the terminator. Partial lines are
    /// kept until the rest arrives.
    fn read_line(&mut self) -> Result<Option<Vec<u8>>>;

    /// Release the device
    fn close(self: Box<Self>);
}

/// Information about an available port (for listing)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectedPort {
    /// Device identifier to pass in [`PortSettings::name`]
    pub name: String,
    /// Kind of port (USB, PCI, Bluetooth, ...)
    pub port_type: String,
    /// USB vendor/product ID, if known
    pub usb_id: Option<(u16, u16)>,
    /// USB product string, if known
    pub product: Option<String>,
}

impl DetectedPort {
    /// Get a display-friendly name for this port
    pub fn display_name(&self) -> String {
        match (&self.usb_id, &self.product) {
            (Some((vid, pid)), Some(product)) => {
                format!("{} ({:04x}:{:04x}) - {}", self.name, vid, pid, product)
            }
            (Some((vid, pid)), None) => format!("{} ({:04x}:{:04x})", self.name, vid, pid),
            _ => format!("{} [{}]", self.name, self.port_type),
        }
    }
}

impl std::fmt::Display for DetectedPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detected_port_display() {
        let usb = DetectedPort {
            name: "/dev/ttyUSB0".into(),
            port_type: "USB".into(),
            usb_id: Some((0x1a86, 0x7523)),
            product: Some("USB Serial".into()),
        };
        assert_eq!(usb.to_string(), "/dev/ttyUSB0 (1a86:7523) - USB Serial");

        let pci = DetectedPort {
            name: "/dev/ttyS0".into(),
            port_type: "PCI".into(),
            usb_id: None,
            product: None,
        };
        assert_eq!(pci.to_string(), "/dev/ttyS0 [PCI]");
    }
}
