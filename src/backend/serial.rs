//! Serial port transport
//!
//! This module provides the real-hardware [`Transport`] built on the
//! `serialport` crate. It handles opening the port, assembling lines from
//! timed reads, and mapping OS errors onto the supervisor's error taxonomy.
//!
//! # Error mapping
//!
//! - Open fails with "no device" or an OS error (missing node, busy, permission
//!   denied) → [`SerialVisError::TransportUnavailable`]
//! - Read times out or ends mid-line → `Ok(None)`, partial line kept for the next call
//! - Line grows past [`MAX_LINE_LEN`] without a terminator → dropped up to the next newline
//! - Read hits end of stream or any other OS error → [`SerialVisError::TransportIo`]
//!
//! # Example
//!
//! ```ignore
//! use serialvis_rs::backend::SerialPortTransport;
//!
//! for port in SerialPortTransport::list_ports() {
//!     println!("Found: {}", port);
//! }
//! ```

use crate::backend::transport::{DetectedPort, DeviceLink, Transport};
use crate::config::{Parity, PortSettings};
use crate::error::{Result, SerialVisError};
use serialport::{DataBits, SerialPort, SerialPortType, StopBits};
use std::io::{BufRead, BufReader, ErrorKind};
use std::time::Duration;

/// Lines longer than this without a terminator are discarded as line noise
pub const MAX_LINE_LEN: usize = 4096;

/// Transport for physical and virtual serial ports
#[derive(Debug, Clone, Copy, Default)]
pub struct SerialPortTransport;

impl SerialPortTransport {
    pub fn new() -> Self {
        Self
    }

    /// List serial ports currently present on the system
    pub fn list_ports() -> Vec<DetectedPort> {
        match serialport::available_ports() {
            Ok(ports) => ports
                .into_iter()
                .map(|info| {
                    let (port_type, usb_id, product) = match info.port_type {
                        SerialPortType::UsbPort(usb) => {
                            ("USB".to_string(), Some((usb.vid, usb.pid)), usb.product)
                        }
                        SerialPortType::PciPort => ("PCI".to_string(), None, None),
                        SerialPortType::BluetoothPort => ("Bluetooth".to_string(), None, None),
                        SerialPortType::Unknown => ("Unknown".to_string(), None, None),
                    };
                    DetectedPort {
                        name: info.port_name,
                        port_type,
                        usb_id,
                        product,
                    }
                })
                .collect(),
            Err(e) => {
                tracing::warn!("Failed to enumerate serial ports: {}", e);
                Vec::new()
            }
        }
    }
}

impl Transport for SerialPortTransport {
    fn open(&self, settings: &PortSettings, read_timeout: Duration) -> Result<Box<dyn DeviceLink>> {
        let port = serialport::new(&settings.name, settings.baud_rate)
            .data_bits(to_serialport_data_bits(settings.data_bits))
            .stop_bits(to_serialport_stop_bits(settings.stop_bits))
            .parity(to_serialport_parity(settings.parity))
            .timeout(read_timeout)
            .open()
            .map_err(|e| match e.kind() {
                serialport::ErrorKind::NoDevice | serialport::ErrorKind::Io(_) => {
                    SerialVisError::unavailable(&settings.name, &e.description)
                }
                _ => SerialVisError::from(e)
                    .with_context(format!("Failed to open {}", settings.name)),
            })?;

        tracing::debug!("Opened {}", settings);
        Ok(Box::new(SerialLink::new(settings.name.clone(), port)))
    }

    fn kind(&self) -> &'static str {
        "serial"
    }
}

/// An open serial port with line assembly
///
/// Each call consumes at most one buffered chunk, so a device that streams
/// without pause still hands control back to the supervisor between chunks.
struct SerialLink<R = BufReader<Box<dyn SerialPort>>> {
    name: String,
    reader: R,
    pending: Vec<u8>,
    /// Set after an overlong line was dropped, until its terminator shows up
    discarding: bool,
}

impl SerialLink {
    fn new(name: String, port: Box<dyn SerialPort>) -> Self {
        Self::with_reader(name, BufReader::new(port))
    }
}

impl<R: BufRead> SerialLink<R> {
    fn with_reader(name: String, reader: R) -> Self {
        Self {
            name,
            reader,
            pending: Vec::with_capacity(128),
            discarding: false,
        }
    }

    fn next_line(&mut self) -> Result<Option<Vec<u8>>> {
        let chunk = match self.reader.fill_buf() {
            Ok(chunk) => chunk,
            Err(e)
                if matches!(
                    e.kind(),
                    ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted
                ) =>
            {
                return Ok(None);
            }
            Err(e) => {
                return Err(SerialVisError::TransportIo(format!("{}: {}", self.name, e)));
            }
        };

        if chunk.is_empty() {
            return Err(SerialVisError::TransportIo(format!(
                "{}: end of stream",
                self.name
            )));
        }

        match chunk.iter().position(|&b| b == b'\n') {
            Some(end) => {
                if !self.discarding {
                    self.pending.extend_from_slice(&chunk[..end]);
                }
                self.reader.consume(end + 1);

                let line = std::mem::take(&mut self.pending);
                if std::mem::take(&mut self.discarding) {
                    return Ok(None);
                }
                Ok(Some(line))
            }
            None => {
                let len = chunk.len();
                if !self.discarding {
                    self.pending.extend_from_slice(chunk);
                }
                self.reader.consume(len);

                if self.pending.len() > MAX_LINE_LEN {
                    tracing::warn!(
                        "Discarding {} bytes without line terminator from {}",
                        self.pending.len(),
                        self.name
                    );
                    self.pending.clear();
                    self.discarding = true;
                }
                Ok(None)
            }
        }
    }
}

impl<R: BufRead + Send> DeviceLink for SerialLink<R> {
    fn read_line(&mut self) -> Result<Option<Vec<u8>>> {
        self.next_line()
    }

    fn close(self: Box<Self>) {
        tracing::debug!("Closing {}", self.name);
        // Dropping the port releases the OS handle
    }
}

/// Convert our Parity enum to serialport crate's Parity type
fn to_serialport_parity(parity: Parity) -> serialport::Parity {
    match parity {
        Parity::None => serialport::Parity::None,
        Parity::Odd => serialport::Parity::Odd,
        Parity::Even => serialport::Parity::Even,
    }
}

/// Convert data bits count to serialport crate's DataBits type
fn to_serialport_data_bits(bits: u8) -> DataBits {
    match bits {
        5 => DataBits::Five,
        6 => DataBits::Six,
        7 => DataBits::Seven,
        _ => DataBits::Eight,
    }
}

/// Convert stop bits count to serialport crate's StopBits type
fn to_serialport_stop_bits(bits: u8) -> StopBits {
    match bits {
        2 => StopBits::Two,
        _ => StopBits::One,
    }
}
