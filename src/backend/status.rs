//! Connection status notifications
//!
//! The supervisor reports lifecycle changes through an injected [`StatusSink`]
//! instead of a process-wide logger. [`TracingSink`] is the default and turns
//! notices into `tracing` events; [`RecordingSink`] keeps them in memory.

use std::sync::{Arc, Mutex};

/// A lifecycle change worth telling the outside world about
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusNotice {
    /// The device could not be opened; emitted once per unavailable streak
    WaitingForDevice { port: String },
    /// The link is open
    Connected { port: String, baud_rate: u32 },
    /// The open link failed and a reconnect cycle is starting
    LinkLost { port: String, reason: String },
    /// The supervisor stopped and released the link
    Disconnected { port: String },
}

/// Receiver of status notices
pub trait StatusSink: Send + Sync {
    fn notify(&self, notice: &StatusNotice);
}

/// Forwards notices to `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl StatusSink for TracingSink {
    fn notify(&self, notice: &StatusNotice) {
        match notice {
            StatusNotice::WaitingForDevice { port } => {
                tracing::warn!("Device {} not connected. Waiting for connection...", port)
            }
            StatusNotice::Connected { port, baud_rate } => {
                tracing::info!("Connected to {} at {} baud", port, baud_rate)
            }
            StatusNotice::LinkLost { port, reason } => {
                tracing::error!(
                    "Serial communication error on {}: {}. Attempting to reconnect...",
                    port,
                    reason
                )
            }
            StatusNotice::Disconnected { port } => {
                tracing::info!("Serial connection to {} closed", port)
            }
        }
    }
}

/// Keeps every notice in memory
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    notices: Arc<Mutex<Vec<StatusNotice>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// All notices received so far
    pub fn notices(&self) -> Vec<StatusNotice> {
        self.lock().clone()
    }

    /// Count notices matching a predicate
    pub fn count(&self, predicate: impl Fn(&StatusNotice) -> bool) -> usize {
        self.lock().iter().filter(|n| predicate(n)).count()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<StatusNotice>> {
        self.notices.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl StatusSink for RecordingSink {
    fn notify(&self, notice: &StatusNotice) {
        tracing::debug!(?notice, "status");
        self.lock().push(notice.clone());
    }
}
