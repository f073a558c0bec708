//! Backend module for serial telemetry ingestion
//!
//! This module handles all device communication in a separate thread to keep
//! the consumer (typically a plot refreshing on a timer) responsive.
//!
//! # Architecture
//!
//! - [`SerialBackend`] - Public start/stop API; owns the worker thread
//! - [`ConnectionSupervisor`] - Worker loop: open with retry, read, reconnect
//! - [`decoder`] - Text line → [`Event`](crate::types::Event)
//! - [`SampleStore`] - Append-only sample buffer shared with consumers
//! - [`EventDispatcher`] - Delivers events to the registered observer
//! - [`StatusSink`] - Receives lifecycle notices (waiting, connected, lost)
//!
//! # Components
//!
//! - [`SerialPortTransport`] - Real serial ports via the `serialport` crate
//! - [`MockTransport`] - Scripted device for tests and demo runs
//!
//! # Example
//!
//! ```ignore
//! use serialvis_rs::backend::{SerialBackend, SerialPortTransport};
//! use serialvis_rs::config::AppConfig;
//! use std::sync::Arc;
//!
//! let mut backend = SerialBackend::new(AppConfig::default(), SerialPortTransport::new());
//! backend.set_observer(Arc::new(|event| println!("{:?}", event)));
//! backend.connect()?;
//!
//! // From a refresh timer
//! for sample in backend.samples() {
//!     // draw it
//! }
//!
//! backend.disconnect();
//! ```

pub mod decoder;
pub mod dispatcher;
pub mod mock;
pub mod sample_store;
pub mod serial;
pub mod status;
pub mod supervisor;
pub mod transport;

pub use decoder::{decode_bytes, decode_line};
pub use dispatcher::{channel_observer, ChannelObserver, EventDispatcher, Observer};
pub use mock::{MockDevice, MockPattern, MockTransport};
pub use sample_store::SampleStore;
pub use serial::SerialPortTransport;
pub use status::{RecordingSink, StatusNotice, StatusSink, TracingSink};
pub use supervisor::{ConnectionSupervisor, LinkMonitor, SupervisorContext};
pub use transport::{DetectedPort, DeviceLink, Transport};

use crate::config::AppConfig;
use crate::error::Result;
use crate::types::{ConnectionState, Event, LinkStats, Sample};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

/// Handles for a running supervisor thread
struct WorkerHandle {
    running: Arc<AtomicBool>,
    /// Dropped to wake the supervisor out of a backoff wait
    stop_tx: Sender<()>,
    /// Disconnects when the worker thread exits
    done_rx: Receiver<()>,
    thread: JoinHandle<()>,
}

/// Public entry point: connects, disconnects and exposes the collected data
///
/// The sample store and the observer registration outlive individual
/// connections, so a disconnect/connect cycle keeps every sample collected so
/// far.
pub struct SerialBackend {
    config: AppConfig,
    transport: Arc<dyn Transport>,
    store: SampleStore,
    dispatcher: Arc<EventDispatcher>,
    sink: Arc<dyn StatusSink>,
    monitor: Arc<LinkMonitor>,
    worker: Option<WorkerHandle>,
}

impl SerialBackend {
    /// Create a backend for the given config and transport
    ///
    /// Status notices go to `tracing` unless a sink is set with [`Self::with_sink`].
    pub fn new(config: AppConfig, transport: impl Transport + 'static) -> Self {
        Self {
            config,
            transport: Arc::new(transport),
            store: SampleStore::new(),
            dispatcher: Arc::new(EventDispatcher::new()),
            sink: Arc::new(TracingSink),
            monitor: Arc::new(LinkMonitor::new()),
            worker: None,
        }
    }

    /// Replace the status sink (takes effect on the next connect)
    pub fn with_sink(mut self, sink: impl StatusSink + 'static) -> Self {
        self.sink = Arc::new(sink);
        self
    }

    /// Start the supervisor if it is not already running
    ///
    /// Returns as soon as the worker thread is spawned; opening the device and
    /// any retries happen in the background. Calling this while connected or
    /// connecting does nothing.
    pub fn connect(&mut self) -> Result<()> {
        if let Some(worker) = &self.worker {
            if !worker.thread.is_finished() {
                tracing::debug!("Connect requested but supervisor already running");
                return Ok(());
            }
        }
        // Reap a worker that exited on its own
        if let Some(worker) = self.worker.take() {
            Self::join_worker(worker);
        }

        self.config.validate()?;

        let running = Arc::new(AtomicBool::new(true));
        let (stop_tx, stop_rx) = bounded::<()>(0);
        let (done_tx, done_rx) = bounded::<()>(0);

        let supervisor = ConnectionSupervisor::new(
            self.config.port.clone(),
            self.config.timing.clone(),
            SupervisorContext {
                transport: self.transport.clone(),
                store: self.store.clone(),
                dispatcher: self.dispatcher.clone(),
                sink: self.sink.clone(),
                monitor: self.monitor.clone(),
            },
            running.clone(),
            stop_rx,
        );

        self.monitor.set_state(ConnectionState::Connecting);
        let thread = std::thread::Builder::new()
            .name("serialvis-supervisor".into())
            .spawn(move || {
                let _done = done_tx;
                supervisor.run();
            })
            .map_err(|e| {
                self.monitor.set_state(ConnectionState::Disconnected);
                e
            })?;

        self.worker = Some(WorkerHandle {
            running,
            stop_tx,
            done_rx,
            thread,
        });
        Ok(())
    }

    /// Stop the supervisor and release the device
    ///
    /// Waits up to the configured shutdown timeout for the worker to close the
    /// link. Calling this while already disconnected does nothing.
    pub fn disconnect(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };

        worker.running.store(false, Ordering::SeqCst);
        let WorkerHandle {
            stop_tx,
            done_rx,
            thread,
            ..
        } = worker;
        drop(stop_tx);

        match done_rx.recv_timeout(self.config.timing.shutdown_timeout()) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if thread.join().is_err() {
                    tracing::error!("Supervisor thread panicked");
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                tracing::warn!(
                    "Supervisor did not stop within {:?}; detaching it",
                    self.config.timing.shutdown_timeout()
                );
                // Its late state changes and notices must not clobber a later session
                self.monitor.retire_session();
            }
        }
        self.monitor.set_state(ConnectionState::Disconnected);
    }

    fn join_worker(worker: WorkerHandle) {
        if worker.thread.join().is_err() {
            tracing::error!("Supervisor thread panicked");
        }
    }

    /// Register the observer, replacing any previous one
    pub fn set_observer(&self, observer: Observer) {
        self.dispatcher.set_observer(observer);
    }

    /// Remove the observer
    pub fn clear_observer(&self) {
        self.dispatcher.clear_observer();
    }

    /// Register a channel-backed observer and return its receiving end
    ///
    /// Decouples a slow consumer from ingestion: when `capacity` events are
    /// waiting, new ones are dropped and counted on the returned observer.
    pub fn subscribe(&self, capacity: usize) -> (ChannelObserver, Receiver<Event>) {
        let (observer, receiver) = channel_observer(capacity);
        self.dispatcher.set_observer(observer.clone().into_observer());
        (observer, receiver)
    }

    /// Snapshot of every sample received so far, in arrival order
    pub fn samples(&self) -> Vec<Sample> {
        self.store.snapshot()
    }

    /// Shared handle to the sample store
    pub fn sample_store(&self) -> SampleStore {
        self.store.clone()
    }

    /// Current connection state
    pub fn state(&self) -> ConnectionState {
        self.monitor.state()
    }

    /// True while a supervisor thread is alive
    pub fn is_running(&self) -> bool {
        self.worker
            .as_ref()
            .is_some_and(|worker| !worker.thread.is_finished())
    }

    /// Counters describing the link so far
    pub fn stats(&self) -> LinkStats {
        let mut stats = self.monitor.stats();
        stats.faults += self.dispatcher.faults();
        stats
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }
}

impl Drop for SerialBackend {
    fn drop(&mut self) {
        self.disconnect();
    }
}
