//! Shared, append-only sample buffer
//!
//! The read loop is the only writer; any number of consumers take snapshots.
//! The lock is held only for a single push or a single copy, so a reader never
//! waits on I/O and never observes a partially written entry.
//!
//! The buffer is unbounded: every sample received since the store was created
//! stays available, in arrival order, for redrawing.

use crate::types::Sample;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Ordered, thread-safe collection of samples
///
/// Cloning is cheap and every clone refers to the same buffer.
#[derive(Debug, Clone, Default)]
pub struct SampleStore {
    inner: Arc<RwLock<Vec<Sample>>>,
}

impl SampleStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a sample at the end
    pub fn append(&self, sample: Sample) {
        self.write().push(sample);
    }

    /// Copy of every sample appended so far, in arrival order
    pub fn snapshot(&self) -> Vec<Sample> {
        self.read().clone()
    }

    /// Copy of the samples from index `start` onward
    ///
    /// Lets a polling consumer fetch only what arrived since its last poll.
    pub fn snapshot_since(&self, start: usize) -> Vec<Sample> {
        let samples = self.read();
        samples.get(start..).map(<[Sample]>::to_vec).unwrap_or_default()
    }

    /// Most recently appended sample
    pub fn last(&self) -> Option<Sample> {
        self.read().last().copied()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    // A panic while holding the lock cannot leave a Vec half-pushed, so a
    // poisoned lock still guards consistent data.
    fn read(&self) -> RwLockReadGuard<'_, Vec<Sample>> {
        self.inner.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<Sample>> {
        self.inner.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
