//! Connection Supervisor
//!
//! This module contains the worker loop that owns the device link. It runs on
//! its own thread, started by [`SerialBackend::connect`](crate::backend::SerialBackend::connect),
//! and talks to the rest of the system only through shared handles: the sample
//! store, the event dispatcher, the status sink and the [`LinkMonitor`].
//!
//! # State machine
//!
//! ```text
//!  Disconnected ──connect──▶ Connecting ──open ok──▶ Connected
//!                              ▲   │ unavailable          │ link failure
//!                              │   └─ wait retry_interval │
//!                              └──── wait io_error_pause ◀─ Failed
//! ```
//!
//! Stop moves every state to `Disconnected`. The worker only ever blocks on the
//! link's bounded read timeout or on a backoff wait that the stop signal cuts
//! short, so a stop request is honoured within one read timeout.
//!
//! # Failure handling
//!
//! - **Device unavailable** at open: retried forever; the status sink hears
//!   about it once per streak of failed opens
//! - **Link failure** while reading: link closed, pause, full reopen; the sample
//!   store is untouched
//! - **Malformed line**: logged and dropped, never dispatched
//! - **Transport panic** while reading: counted as a fault and handled like a
//!   link failure
//! - **Anything else**: logged and counted; the loop keeps going

use crate::backend::decoder::decode_bytes;
use crate::backend::dispatcher::EventDispatcher;
use crate::backend::sample_store::SampleStore;
use crate::backend::status::{StatusNotice, StatusSink};
use crate::backend::transport::{DeviceLink, Transport};
use crate::config::{PortSettings, TimingConfig};
use crate::types::{ConnectionState, Event, LinkStats};
use crossbeam_channel::{Receiver, RecvTimeoutError};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

/// Pause after an unexpected read fault, so a persistently broken link cannot spin
const FAULT_PAUSE: Duration = Duration::from_millis(50);

/// Connection state and counters, written by the supervisor and read by anyone
#[derive(Debug, Default)]
pub struct LinkMonitor {
    state: RwLock<ConnectionState>,
    /// Supervisor session allowed to write `state`; bumped per worker and on detach
    session: AtomicU64,
    lines_read: AtomicU64,
    samples: AtomicU64,
    commands: AtomicU64,
    malformed: AtomicU64,
    open_attempts: AtomicU64,
    connections: AtomicU64,
    reconnects: AtomicU64,
    faults: AtomicU64,
}

impl LinkMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current connection state
    pub fn state(&self) -> ConnectionState {
        *self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub(crate) fn set_state(&self, state: ConnectionState) {
        let mut current = self.state.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        Self::transition(&mut current, state);
    }

    /// Start a new supervisor session, making any earlier one stale
    pub(crate) fn begin_session(&self) -> u64 {
        let _guard = self.state.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        self.session.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Revoke the current session's write access (the worker was detached)
    pub(crate) fn retire_session(&self) {
        self.begin_session();
    }

    pub(crate) fn is_current(&self, session: u64) -> bool {
        self.session.load(Ordering::SeqCst) == session
    }

    /// Set the state on behalf of `session`; ignored once the session is stale
    fn set_session_state(&self, session: u64, state: ConnectionState) {
        let mut current = self.state.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        if self.is_current(session) {
            Self::transition(&mut current, state);
        } else {
            tracing::debug!("Ignoring {} from stale supervisor session {}", state, session);
        }
    }

    fn transition(current: &mut ConnectionState, state: ConnectionState) {
        if *current != state {
            tracing::debug!("Connection state: {} -> {}", *current, state);
            *current = state;
        }
    }

    /// Snapshot of the counters
    pub fn stats(&self) -> LinkStats {
        LinkStats {
            lines_read: self.lines_read.load(Ordering::Relaxed),
            samples: self.samples.load(Ordering::Relaxed),
            commands: self.commands.load(Ordering::Relaxed),
            malformed: self.malformed.load(Ordering::Relaxed),
            open_attempts: self.open_attempts.load(Ordering::Relaxed),
            connections: self.connections.load(Ordering::Relaxed),
            reconnects: self.reconnects.load(Ordering::Relaxed),
            faults: self.faults.load(Ordering::Relaxed),
        }
    }

    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Why the read loop ended
#[derive(Debug)]
enum LinkOutcome {
    /// Stop was requested
    Stopped,
    /// The link failed and must be reopened
    Failed(String),
}

/// Shared handles the supervisor works with
pub struct SupervisorContext {
    pub transport: Arc<dyn Transport>,
    pub store: SampleStore,
    pub dispatcher: Arc<EventDispatcher>,
    pub sink: Arc<dyn StatusSink>,
    pub monitor: Arc<LinkMonitor>,
}

/// Owns the device link and drives the reconnect state machine
pub struct ConnectionSupervisor {
    settings: PortSettings,
    timing: TimingConfig,
    ctx: SupervisorContext,
    /// Cleared to request a stop
    running: Arc<AtomicBool>,
    /// Disconnected by the controller to cut backoff waits short
    stop_rx: Receiver<()>,
    /// Whether the current unavailable streak has been reported
    waiting_reported: bool,
    /// Session id from the monitor; state and notices stop once it goes stale
    session: u64,
}

impl ConnectionSupervisor {
    /// Create a new supervisor
    pub fn new(
        settings: PortSettings,
        timing: TimingConfig,
        ctx: SupervisorContext,
        running: Arc<AtomicBool>,
        stop_rx: Receiver<()>,
    ) -> Self {
        Self {
            settings,
            timing,
            session: ctx.monitor.begin_session(),
            ctx,
            running,
            stop_rx,
            waiting_reported: false,
        }
    }

    /// Run until stop is requested
    pub fn run(mut self) {
        let _span = tracing::info_span!("supervisor", port = %self.settings.name).entered();
        tracing::info!(
            "Connection supervisor started ({} transport, {})",
            self.ctx.transport.kind(),
            self.settings
        );

        while self.is_running() {
            let Some(mut link) = self.open_with_retry() else {
                break;
            };

            let outcome = self.read_loop(link.as_mut());
            if panic::catch_unwind(AssertUnwindSafe(|| link.close())).is_err() {
                LinkMonitor::bump(&self.ctx.monitor.faults);
                tracing::error!("Transport panicked while closing {}", self.settings.name);
            }

            match outcome {
                LinkOutcome::Stopped => break,
                LinkOutcome::Failed(reason) => {
                    self.set_state(ConnectionState::Failed);
                    LinkMonitor::bump(&self.ctx.monitor.reconnects);
                    self.notify(&StatusNotice::LinkLost {
                        port: self.settings.name.clone(),
                        reason,
                    });
                    if self.pause(self.timing.io_error_pause()) {
                        break;
                    }
                }
            }
        }

        self.set_state(ConnectionState::Disconnected);
        self.notify(&StatusNotice::Disconnected {
            port: self.settings.name.clone(),
        });
        tracing::info!("Connection supervisor stopped");
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn set_state(&self, state: ConnectionState) {
        self.ctx.monitor.set_session_state(self.session, state);
    }

    /// Forward a notice unless this supervisor was detached and replaced
    fn notify(&self, notice: &StatusNotice) {
        if self.ctx.monitor.is_current(self.session) {
            self.ctx.sink.notify(notice);
        }
    }

    /// Wait for `duration` or until stop is requested; returns true on stop
    fn pause(&self, duration: Duration) -> bool {
        match self.stop_rx.recv_timeout(duration) {
            Err(RecvTimeoutError::Timeout) => !self.is_running(),
            Ok(()) | Err(RecvTimeoutError::Disconnected) => true,
        }
    }

    /// Open the device, retrying until it succeeds or stop is requested
    fn open_with_retry(&mut self) -> Option<Box<dyn DeviceLink>> {
        self.set_state(ConnectionState::Connecting);

        loop {
            if !self.is_running() {
                return None;
            }

            LinkMonitor::bump(&self.ctx.monitor.open_attempts);
            match self
                .ctx
                .transport
                .open(&self.settings, self.timing.read_timeout())
            {
                Ok(link) => {
                    if !self.is_running() {
                        link.close();
                        return None;
                    }
                    self.waiting_reported = false;
                    self.set_state(ConnectionState::Connected);
                    LinkMonitor::bump(&self.ctx.monitor.connections);
                    self.notify(&StatusNotice::Connected {
                        port: self.settings.name.clone(),
                        baud_rate: self.settings.baud_rate,
                    });
                    return Some(link);
                }
                Err(e) if e.is_unavailable() => {
                    if !self.waiting_reported {
                        self.waiting_reported = true;
                        self.notify(&StatusNotice::WaitingForDevice {
                            port: self.settings.name.clone(),
                        });
                    } else {
                        tracing::trace!("Still waiting for {}: {}", self.settings.name, e);
                    }
                }
                Err(e) => {
                    tracing::error!("Failed to open {}: {}", self.settings.name, e);
                }
            }

            if self.pause(self.timing.retry_interval()) {
                return None;
            }
        }
    }

    /// Read and process lines until the link fails or stop is requested
    fn read_loop(&mut self, link: &mut dyn DeviceLink) -> LinkOutcome {
        while self.is_running() {
            let read = match panic::catch_unwind(AssertUnwindSafe(|| link.read_line())) {
                Ok(read) => read,
                Err(payload) => {
                    // Link state is unknown after a panic; reopen
                    LinkMonitor::bump(&self.ctx.monitor.faults);
                    let reason = panic_message(payload.as_ref());
                    tracing::error!("Transport panicked while reading {}: {}", self.settings.name, reason);
                    return LinkOutcome::Failed(format!("transport panicked: {}", reason));
                }
            };

            match read {
                Ok(None) => {}
                Ok(Some(bytes)) => self.handle_line(&bytes),
                Err(e) if e.is_link_failure() => {
                    return LinkOutcome::Failed(e.to_string());
                }
                Err(e) => {
                    LinkMonitor::bump(&self.ctx.monitor.faults);
                    tracing::error!("Unexpected error while reading {}: {:?}", self.settings.name, e);
                    if self.pause(FAULT_PAUSE) {
                        break;
                    }
                }
            }
        }
        LinkOutcome::Stopped
    }

    /// Decode one line, store samples and forward the event
    fn handle_line(&self, bytes: &[u8]) {
        let Some(event) = decode_bytes(bytes) else {
            return;
        };
        let monitor = &self.ctx.monitor;
        LinkMonitor::bump(&monitor.lines_read);

        match &event {
            Event::Sample(sample) => {
                self.ctx.store.append(*sample);
                LinkMonitor::bump(&monitor.samples);
                tracing::trace!("Sample {}", sample);
            }
            Event::Command(cmd) => {
                LinkMonitor::bump(&monitor.commands);
                tracing::info!("Received '{}' command", cmd);
            }
            Event::Malformed(line) => {
                LinkMonitor::bump(&monitor.malformed);
                tracing::warn!("Invalid format received: {}", line);
                return;
            }
        }

        self.ctx.dispatcher.dispatch(&event);
    }
}

/// Best-effort text of a panic payload
fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
