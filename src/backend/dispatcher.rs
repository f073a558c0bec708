//! Event delivery to the registered observer
//!
//! Delivery is synchronous: [`EventDispatcher::dispatch`] runs the observer on
//! the read-loop thread, so a slow observer delays ingestion of the following
//! lines. Consumers that need to stay decoupled can register a
//! [`ChannelObserver`], which forwards events into a bounded crossbeam channel
//! and drops the newest event when the channel is full.

use crate::types::Event;
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

/// Callback receiving decoded events
pub type Observer = Arc<dyn Fn(&Event) + Send + Sync>;

/// Holds at most one observer and invokes it for each dispatched event
#[derive(Default)]
pub struct EventDispatcher {
    observer: RwLock<Option<Observer>>,
    faults: AtomicU64,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an observer, replacing any previous one
    ///
    /// Takes effect for events dispatched after this call returns.
    pub fn set_observer(&self, observer: Observer) {
        *self.slot_mut() = Some(observer);
    }

    /// Remove the current observer
    pub fn clear_observer(&self) {
        *self.slot_mut() = None;
    }

    pub fn has_observer(&self) -> bool {
        self.slot().is_some()
    }

    /// Deliver an event to the current observer, if any
    ///
    /// The observer slot is not locked while the callback runs, so replacing
    /// the observer never waits on a callback in progress. A panicking observer
    /// is logged and counted; it never takes the read loop down with it.
    pub fn dispatch(&self, event: &Event) {
        let Some(observer) = self.slot().clone() else {
            return;
        };

        if panic::catch_unwind(AssertUnwindSafe(|| observer(event))).is_err() {
            self.faults.fetch_add(1, Ordering::Relaxed);
            tracing::error!("Observer panicked while handling {:?}", event);
        }
    }

    /// Number of observer invocations that panicked
    pub fn faults(&self) -> u64 {
        self.faults.load(Ordering::Relaxed)
    }

    fn slot(&self) -> std::sync::RwLockReadGuard<'_, Option<Observer>> {
        self.observer.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn slot_mut(&self) -> std::sync::RwLockWriteGuard<'_, Option<Observer>> {
        self.observer.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl std::fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("has_observer", &self.has_observer())
            .field("faults", &self.faults())
            .finish()
    }
}

/// Observer that forwards events into a bounded channel
///
/// When the consumer falls behind and the channel fills up, new events are
/// dropped (and counted) instead of blocking the read loop.
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    sender: Sender<Event>,
    dropped: Arc<AtomicU64>,
}

impl ChannelObserver {
    /// Forward an event without blocking
    pub fn forward(&self, event: &Event) {
        match self.sender.try_send(event.clone()) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
            Err(TrySendError::Disconnected(_)) => {
                tracing::trace!("Event receiver dropped, discarding event");
            }
        }
    }

    /// Number of events dropped because the channel was full
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Convert into an [`Observer`] callback
    pub fn into_observer(self) -> Observer {
        Arc::new(move |event: &Event| self.forward(event))
    }
}

/// Build a channel-backed observer with the given capacity
///
/// Returns the observer half (register it with the dispatcher, keep a clone to
/// read the drop counter) and the receiving half for the consumer.
pub fn channel_observer(capacity: usize) -> (ChannelObserver, Receiver<Event>) {
    let (sender, receiver) = bounded(capacity);
    (
        ChannelObserver {
            sender,
            dropped: Arc::new(AtomicU64::new(0)),
        },
        receiver,
    )
}
