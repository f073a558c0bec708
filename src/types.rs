//! Core data types for SerialVis-RS
//!
//! This module contains the fundamental data structures that flow from the
//! serial link to the consumer.
//!
//! # Main Types
//!
//! - [`Sample`] - An immutable (x, y) coordinate pair decoded from one line
//! - [`Command`] - A discrete instruction sent by the device (e.g. `toggle`)
//! - [`Event`] - One decoded unit: a command, a sample, or a malformed line
//! - [`ConnectionState`] - Lifecycle state of the serial link
//! - [`LinkStats`] - Counters describing what the link has delivered so far

use serde::{Deserialize, Serialize};

/// A single decoded coordinate pair
///
/// Samples are created once by the line decoder and never mutated.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub x: f64,
    pub y: f64,
}

impl Sample {
    /// Create a new sample
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Convert to the `[x, y]` form used by plotting libraries
    pub fn as_plot_point(&self) -> [f64; 2] {
        [self.x, self.y]
    }
}

impl From<(f64, f64)> for Sample {
    fn from((x, y): (f64, f64)) -> Self {
        Self { x, y }
    }
}

impl std::fmt::Display for Sample {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.2}, {:.2})", self.x, self.y)
    }
}

/// Commands the device can send instead of a sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Command {
    /// Flip the consumer's display mode
    Toggle,
}

impl Command {
    /// Wire name of the command (always lowercase)
    pub fn name(&self) -> &'static str {
        match self {
            Command::Toggle => "toggle",
        }
    }

    /// Look up a command by its wire name, ignoring ASCII case
    pub fn from_name(name: &str) -> Option<Self> {
        if name.eq_ignore_ascii_case("toggle") {
            Some(Command::Toggle)
        } else {
            None
        }
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// One decoded unit derived from a single input line
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// A recognized command
    Command(Command),
    /// A coordinate sample
    Sample(Sample),
    /// A non-empty line that is neither a command nor a sample
    Malformed(String),
}

impl Event {
    /// Returns the sample payload, if any
    pub fn as_sample(&self) -> Option<Sample> {
        match self {
            Event::Sample(sample) => Some(*sample),
            _ => None,
        }
    }

    /// Returns the command payload, if any
    pub fn as_command(&self) -> Option<Command> {
        match self {
            Event::Command(cmd) => Some(*cmd),
            _ => None,
        }
    }

    pub fn is_malformed(&self) -> bool {
        matches!(self, Event::Malformed(_))
    }
}

/// Connection state of the serial link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// Not connected and not trying to connect
    #[default]
    Disconnected,
    /// Attempting to open the device (possibly waiting for it to appear)
    Connecting,
    /// Link open and the read loop running
    Connected,
    /// The link failed and is being torn down before a reconnect
    Failed,
}

impl ConnectionState {
    /// True while the supervisor is working towards or holding a connection
    pub fn is_active(&self) -> bool {
        !matches!(self, ConnectionState::Disconnected)
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "Disconnected"),
            ConnectionState::Connecting => write!(f, "Connecting..."),
            ConnectionState::Connected => write!(f, "Connected"),
            ConnectionState::Failed => write!(f, "Failed"),
        }
    }
}

/// Statistics about what the link has delivered
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkStats {
    /// Non-empty lines received from the device
    pub lines_read: u64,
    /// Lines decoded as samples
    pub samples: u64,
    /// Lines decoded as commands
    pub commands: u64,
    /// Lines that could not be decoded
    pub malformed: u64,
    /// Calls to the transport's open, successful or not
    pub open_attempts: u64,
    /// Successful opens
    pub connections: u64,
    /// Reconnect cycles started after a link failure
    pub reconnects: u64,
    /// Unexpected faults (read errors that were not link failures, observer panics)
    pub faults: u64,
}

impl LinkStats {
    /// Percentage of received lines that decoded into a command or sample
    pub fn decode_rate(&self) -> f64 {
        if self.lines_read == 0 {
            100.0
        } else {
            ((self.samples + self.commands) as f64 / self.lines_read as f64) * 100.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_names() {
        assert_eq!(Command::Toggle.name(), "toggle");
        assert_eq!(Command::from_name("TOGGLE"), Some(Command::Toggle));
        assert_eq!(Command::from_name("ToGgLe"), Some(Command::Toggle));
        assert_eq!(Command::from_name("toggles"), None);
    }

    #[test]
    fn test_event_accessors() {
        let event = Event::Sample(Sample::new(1.0, -2.0));
        assert_eq!(event.as_sample(), Some(Sample::new(1.0, -2.0)));
        assert_eq!(event.as_command(), None);
        assert!(!event.is_malformed());

        let event = Event::Malformed("nope".into());
        assert!(event.is_malformed());
        assert_eq!(event.as_sample(), None);
    }

    #[test]
    fn test_sample_display() {
        assert_eq!(Sample::new(1.5, -0.25).to_string(), "(1.50, -0.25)");
        assert_eq!(Sample::from((3.0, 4.0)).as_plot_point(), [3.0, 4.0]);
    }

    #[test]
    fn test_connection_state_default() {
        let state = ConnectionState::default();
        assert_eq!(state, ConnectionState::Disconnected);
        assert!(!state.is_active());
        assert!(ConnectionState::Failed.is_active());
    }

    #[test]
    fn test_decode_rate() {
        let mut stats = LinkStats::default();
        assert_eq!(stats.decode_rate(), 100.0);

        stats.lines_read = 4;
        stats.samples = 2;
        stats.commands = 1;
        stats.malformed = 1;
        assert!((stats.decode_rate() - 75.0).abs() < f64::EPSILON);
    }
}
