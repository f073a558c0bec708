//! Mock Transport Implementation for Testing
//!
//! This module provides a scripted serial device that can be used to exercise
//! the supervisor without real hardware. A [`MockTransport`] is handed to the
//! backend; the paired [`MockDevice`] stays with the test (or the demo
//! simulator) and controls what the "device" does.
//!
//! # Features
//!
//! - **Availability**: plug and unplug the device; an unplugged device fails to
//!   open and kills any open link
//! - **Line feed**: queue lines or raw bytes for the link to read
//! - **Failure injection**: make the next read fail with a link error or with an
//!   unexpected (non-link) fault
//! - **Counters**: open attempts, successful opens, closes, currently open links
//! - **Patterns**: generate plausible telemetry for demo runs
//!
//! # Example
//!
//! ```ignore
//! use serialvis_rs::backend::mock::MockTransport;
//!
//! let (transport, device) = MockTransport::new();
//! device.unplug();
//! // ... backend.connect() keeps retrying ...
//! device.plug();
//! device.push_line("1.0 2.0");
//! ```

use crate::backend::transport::{DeviceLink, Transport};
use crate::config::PortSettings;
use crate::error::{Result, SerialVisError};
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// One scripted item the device will produce
#[derive(Debug, Clone)]
enum MockFeed {
    Line(Vec<u8>),
    LinkFailure(String),
    Fault(String),
}

/// State shared between the transport, its links and the device handle
#[derive(Debug)]
struct MockShared {
    available: AtomicBool,
    /// Bumped on every unplug so links opened before it start failing
    generation: AtomicU64,
    open_attempts: AtomicUsize,
    opens: AtomicUsize,
    closes: AtomicUsize,
    open_links: AtomicUsize,
}

/// Transport half of a mock device
#[derive(Debug)]
pub struct MockTransport {
    shared: Arc<MockShared>,
    feed: Receiver<MockFeed>,
}

impl MockTransport {
    /// Create a plugged-in mock device and its control handle
    pub fn new() -> (Self, MockDevice) {
        let (tx, rx) = unbounded();
        let shared = Arc::new(MockShared {
            available: AtomicBool::new(true),
            generation: AtomicU64::new(0),
            open_attempts: AtomicUsize::new(0),
            opens: AtomicUsize::new(0),
            closes: AtomicUsize::new(0),
            open_links: AtomicUsize::new(0),
        });

        (
            Self {
                shared: shared.clone(),
                feed: rx,
            },
            MockDevice { shared, feed: tx },
        )
    }
}

impl Transport for MockTransport {
    fn open(&self, settings: &PortSettings, read_timeout: Duration) -> Result<Box<dyn DeviceLink>> {
        self.shared.open_attempts.fetch_add(1, Ordering::SeqCst);

        if !self.shared.available.load(Ordering::SeqCst) {
            return Err(SerialVisError::unavailable(
                &settings.name,
                "mock device unplugged",
            ));
        }

        self.shared.opens.fetch_add(1, Ordering::SeqCst);
        self.shared.open_links.fetch_add(1, Ordering::SeqCst);
        tracing::debug!("Mock device opened as {}", settings);

        Ok(Box::new(MockLink {
            shared: self.shared.clone(),
            feed: self.feed.clone(),
            read_timeout,
            generation: self.shared.generation.load(Ordering::SeqCst),
        }))
    }

    fn kind(&self) -> &'static str {
        "mock"
    }
}

/// An open link to the mock device
struct MockLink {
    shared: Arc<MockShared>,
    feed: Receiver<MockFeed>,
    read_timeout: Duration,
    generation: u64,
}

impl MockLink {
    fn check_plugged(&self) -> Result<()> {
        if self.shared.generation.load(Ordering::SeqCst) != self.generation {
            Err(SerialVisError::TransportIo("mock device unplugged".into()))
        } else {
            Ok(())
        }
    }
}

impl DeviceLink for MockLink {
    fn read_line(&mut self) -> Result<Option<Vec<u8>>> {
        self.check_plugged()?;

        match self.feed.recv_timeout(self.read_timeout) {
            Ok(MockFeed::Line(bytes)) => Ok(Some(bytes)),
            Ok(MockFeed::LinkFailure(reason)) => Err(SerialVisError::TransportIo(reason)),
            Ok(MockFeed::Fault(reason)) => Err(SerialVisError::Fault(reason)),
            Err(RecvTimeoutError::Timeout) => {
                self.check_plugged()?;
                Ok(None)
            }
            Err(RecvTimeoutError::Disconnected) => {
                Err(SerialVisError::TransportIo("mock device dropped".into()))
            }
        }
    }

    fn close(self: Box<Self>) {
        self.shared.closes.fetch_add(1, Ordering::SeqCst);
        self.shared.open_links.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Control handle for a mock device
#[derive(Debug, Clone)]
pub struct MockDevice {
    shared: Arc<MockShared>,
    feed: Sender<MockFeed>,
}

impl MockDevice {
    /// Make the device openable again
    pub fn plug(&self) {
        self.shared.available.store(true, Ordering::SeqCst);
    }

    /// Remove the device: opens fail and open links fail on their next read
    pub fn unplug(&self) {
        self.shared.available.store(false, Ordering::SeqCst);
        self.shared.generation.fetch_add(1, Ordering::SeqCst);
    }

    pub fn is_plugged(&self) -> bool {
        self.shared.available.load(Ordering::SeqCst)
    }

    /// Queue a line of text (terminator not required)
    pub fn push_line(&self, line: &str) {
        self.push_bytes(line.as_bytes());
    }

    /// Queue one line of raw bytes
    pub fn push_bytes(&self, bytes: &[u8]) {
        let _ = self.feed.send(MockFeed::Line(bytes.to_vec()));
    }

    /// Make the next read fail as if the cable were yanked mid-transfer
    pub fn fail_next_read(&self, reason: &str) {
        let _ = self.feed.send(MockFeed::LinkFailure(reason.to_string()));
    }

    /// Make the next read fail with an error that is not a link failure
    pub fn fault_next_read(&self, reason: &str) {
        let _ = self.feed.send(MockFeed::Fault(reason.to_string()));
    }

    /// Items queued but not yet read
    pub fn pending(&self) -> usize {
        self.feed.len()
    }

    pub fn open_attempts(&self) -> usize {
        self.shared.open_attempts.load(Ordering::SeqCst)
    }

    pub fn opens(&self) -> usize {
        self.shared.opens.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.shared.closes.load(Ordering::SeqCst)
    }

    /// Links opened and not yet closed
    pub fn open_links(&self) -> usize {
        self.shared.open_links.load(Ordering::SeqCst)
    }

    /// Plug the device in after `delay`, unless `running` is cleared first
    pub fn plug_after(&self, delay: Duration, running: Arc<AtomicBool>) -> JoinHandle<()> {
        let device = self.clone();
        std::thread::spawn(move || {
            let plug_at = Instant::now() + delay;
            while running.load(Ordering::SeqCst) && Instant::now() < plug_at {
                std::thread::sleep(Duration::from_millis(10).min(delay));
            }
            if running.load(Ordering::SeqCst) {
                tracing::info!("Simulated device plugged in");
                device.plug();
            }
        })
    }

    /// Feed lines from `pattern` every `interval` until `running` is cleared
    ///
    /// Every `toggle_every` lines a `toggle` command is sent instead (0 disables).
    pub fn simulate(
        &self,
        pattern: MockPattern,
        interval: Duration,
        toggle_every: usize,
        running: Arc<AtomicBool>,
    ) -> JoinHandle<()> {
        let device = self.clone();
        std::thread::spawn(move || {
            let start = Instant::now();
            let mut index = 0usize;
            while running.load(Ordering::SeqCst) {
                if toggle_every > 0 && index > 0 && index % toggle_every == 0 {
                    device.push_line("toggle");
                } else {
                    device.push_line(&pattern.line(index, start.elapsed().as_secs_f64()));
                }
                index += 1;
                std::thread::sleep(interval);
            }
        })
    }
}

/// Data patterns for simulated telemetry
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MockPattern {
    /// Points walking around a circle
    Circle { radius: f64, steps: usize },
    /// Points along the line y = slope * x, x advancing by `step`
    Ramp { slope: f64, step: f64 },
    /// y = amplitude * sin(2π f t) against elapsed time
    Sine { frequency: f64, amplitude: f64 },
}

impl Default for MockPattern {
    fn default() -> Self {
        MockPattern::Circle {
            radius: 5.0,
            steps: 36,
        }
    }
}

impl MockPattern {
    /// Wire line for the `index`-th point at `elapsed` seconds
    pub fn line(&self, index: usize, elapsed: f64) -> String {
        let (x, y) = match *self {
            MockPattern::Circle { radius, steps } => {
                let angle = std::f64::consts::TAU * (index % steps.max(1)) as f64
                    / steps.max(1) as f64;
                (radius * angle.cos(), radius * angle.sin())
            }
            MockPattern::Ramp { slope, step } => {
                let x = index as f64 * step;
                (x, slope * x)
            }
            MockPattern::Sine {
                frequency,
                amplitude,
            } => (
                elapsed,
                amplitude * (std::f64::consts::TAU * frequency * elapsed).sin(),
            ),
        };
        format!("{:.3} {:.3}", x, y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::decoder::decode_line;
    use crate::types::{Event, Sample};

    fn settings() -> PortSettings {
        PortSettings::new("/dev/mock0", 9600)
    }

    #[test]
    fn test_mock_open_and_close() {
        let (transport, device) = MockTransport::new();
        let link = transport
            .open(&settings(), Duration::from_millis(10))
            .unwrap();
        assert_eq!(device.opens(), 1);
        assert_eq!(device.open_links(), 1);

        link.close();
        assert_eq!(device.closes(), 1);
        assert_eq!(device.open_links(), 0);
    }

    #[test]
    fn test_mock_unplugged_is_unavailable() {
        let (transport, device) = MockTransport::new();
        device.unplug();

        let err = transport
            .open(&settings(), Duration::from_millis(10))
            .err()
            .unwrap();
        assert!(err.is_unavailable());
        assert_eq!(device.open_attempts(), 1);
        assert_eq!(device.opens(), 0);
    }

    #[test]
    fn test_mock_read_sequence() {
        let (transport, device) = MockTransport::new();
        let mut link = transport
            .open(&settings(), Duration::from_millis(10))
            .unwrap();

        device.push_line("1 2");
        device.fault_next_read("glitch");
        device.fail_next_read("cable yanked");
        assert_eq!(device.pending(), 3);

        assert_eq!(link.read_line().unwrap(), Some(b"1 2".to_vec()));
        let fault = link.read_line().unwrap_err();
        assert!(matches!(fault, SerialVisError::Fault(_)));
        assert!(!fault.is_link_failure());
        let failure = link.read_line().unwrap_err();
        assert!(failure.is_link_failure());
        assert_eq!(link.read_line().unwrap(), None);
    }

    #[test]
    fn test_unplug_kills_open_link() {
        let (transport, device) = MockTransport::new();
        let mut link = transport
            .open(&settings(), Duration::from_millis(10))
            .unwrap();

        device.unplug();
        assert!(!device.is_plugged());
        device.plug();
        assert!(device.is_plugged());
        assert!(link.read_line().unwrap_err().is_link_failure());

        // A fresh link works again
        let mut fresh = transport
            .open(&settings(), Duration::from_millis(10))
            .unwrap();
        assert_eq!(fresh.read_line().unwrap(), None);
    }

    #[test]
    fn test_plug_after_delay() {
        let (_transport, device) = MockTransport::new();
        device.unplug();

        let handle = device.plug_after(Duration::from_millis(20), Arc::new(AtomicBool::new(true)));
        handle.join().unwrap();
        assert!(device.is_plugged());
    }

    #[test]
    fn test_simulator_threads_stop_when_cleared() {
        let (_transport, device) = MockTransport::new();
        device.unplug();
        let running = Arc::new(AtomicBool::new(true));

        let plug = device.plug_after(Duration::from_secs(60), running.clone());
        let feed = device.simulate(MockPattern::default(), Duration::from_millis(5), 0, running.clone());
        std::thread::sleep(Duration::from_millis(30));

        let start = Instant::now();
        running.store(false, Ordering::SeqCst);
        plug.join().unwrap();
        feed.join().unwrap();

        assert!(start.elapsed() < Duration::from_secs(1));
        assert!(!device.is_plugged());
        assert!(device.pending() > 0);
    }

    #[test]
    fn test_patterns_decode_as_samples() {
        let patterns = [
            MockPattern::default(),
            MockPattern::Ramp {
                slope: 0.5,
                step: 1.0,
            },
            MockPattern::Sine {
                frequency: 1.0,
                amplitude: 3.0,
            },
        ];
        for pattern in patterns {
            for i in 0..10 {
                let event = decode_line(&pattern.line(i, i as f64 * 0.1)).unwrap();
                assert!(matches!(event, Event::Sample(_)), "{:?}", event);
            }
        }

        let ramp = MockPattern::Ramp {
            slope: 2.0,
            step: 0.5,
        };
        assert_eq!(
            decode_line(&ramp.line(4, 0.0)),
            Some(Event::Sample(Sample::new(2.0, 4.0)))
        );
    }
}
