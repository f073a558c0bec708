//! # SerialVis-RS: Serial Telemetry Ingestion
//!
//! Ingests line-oriented telemetry from a serial device, decodes it into
//! coordinate samples or commands, and keeps the data ready for a plotting
//! front end. The device may be absent at startup or drop out mid-stream; the
//! backend waits, reconnects, and carries on without losing collected samples.
//!
//! ## Architecture
//!
//! - **Backend**: A supervisor thread owns the serial link (open with retry,
//!   read loop, reconnect on failure)
//! - **Decoder**: Maps each text line to an [`Event`]
//! - **Sample store**: Append-only, thread-safe buffer read by the consumer
//! - **Observer**: One callback receives every decoded event, synchronously
//!
//! ## Wire Protocol
//!
//! One item per newline-terminated line:
//!
//! - `toggle` (any case) → [`Command::Toggle`]
//! - `<x> <y> [...]` → [`Sample`]
//! - anything else is logged and ignored
//!
//! ## Example
//!
//! ```ignore
//! use serialvis_rs::{AppConfig, SerialBackend, SerialPortTransport};
//! use std::sync::Arc;
//!
//! fn main() -> serialvis_rs::Result<()> {
//!     let config = AppConfig::for_port("/dev/ttyUSB0", 9600);
//!     let mut backend = SerialBackend::new(config, SerialPortTransport::new());
//!
//!     backend.set_observer(Arc::new(|event| tracing::info!("{:?}", event)));
//!     backend.connect()?;
//!
//!     loop {
//!         std::thread::sleep(std::time::Duration::from_millis(500));
//!         let points = backend.samples();
//!         // redraw `points`
//!     }
//! }
//! ```

pub mod backend;
pub mod config;
pub mod error;
pub mod types;

// Re-export commonly used types
pub use backend::{
    MockDevice, MockTransport, SampleStore, SerialBackend, SerialPortTransport, StatusNotice,
    StatusSink,
};
pub use config::AppConfig;
pub use error::{Result, SerialVisError};
pub use types::{Command, ConnectionState, Event, LinkStats, Sample};
