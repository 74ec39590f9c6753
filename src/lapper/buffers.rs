//! Per-baton state with fine-grained locking.
//!
//! [`BatonArena`] stores one state object per baton, each behind its own
//! [`tokio::sync::Mutex`]. Work on different batons proceeds concurrently;
//! work on the same baton is serialized. The outer map is only
//! write-locked when a baton is seen for the first time.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};

use crate::domain::{BatonId, Detection};

/// Arena of per-baton state objects addressed by baton id.
#[derive(Debug)]
pub struct BatonArena<T> {
    slots: RwLock<HashMap<BatonId, Arc<Mutex<T>>>>,
}

impl<T> Default for BatonArena<T> {
    fn default() -> Self {
        Self {
            slots: RwLock::new(HashMap::new()),
        }
    }
}

impl<T: Default> BatonArena<T> {
    /// Creates an empty arena.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the slot for `baton_id`, creating a default one on first use.
    pub async fn get_or_create(&self, baton_id: BatonId) -> Arc<Mutex<T>> {
        if let Some(slot) = self.slots.read().await.get(&baton_id) {
            return Arc::clone(slot);
        }
        let mut slots = self.slots.write().await;
        Arc::clone(slots.entry(baton_id).or_default())
    }

    /// Returns the slot for `baton_id` if the baton has been seen.
    pub async fn get(&self, baton_id: BatonId) -> Option<Arc<Mutex<T>>> {
        self.slots.read().await.get(&baton_id).cloned()
    }

    /// Number of batons with a slot.
    pub async fn len(&self) -> usize {
        self.slots.read().await.len()
    }

    /// Returns `true` if no baton has a slot yet.
    pub async fn is_empty(&self) -> bool {
        self.slots.read().await.is_empty()
    }
}

/// A detection together with the circuit position it was evaluated at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferedDetection {
    /// The accepted detection.
    pub detection: Detection,
    /// Position of its beacon when it was buffered.
    pub position: i64,
}

/// Ordered detections of one baton since its current lap started.
///
/// The first entry is the reference: the position the current lap started
/// from.
#[derive(Debug, Default)]
pub struct DetectionBuffer {
    entries: Vec<BufferedDetection>,
}

impl DetectionBuffer {
    /// Appends an entry in arrival order.
    pub fn push(&mut self, entry: BufferedDetection) {
        self.entries.push(entry);
    }

    /// Index of the first entry after the reference that sits at the
    /// reference's position.
    #[must_use]
    pub fn first_return(&self) -> Option<usize> {
        let (reference, rest) = self.entries.split_first()?;
        rest.iter()
            .position(|candidate| candidate.position == reference.position)
            .map(|i| i + 1)
    }

    /// Replaces the buffer with the single entry at `index`, which becomes
    /// the new reference. Returns that entry.
    pub fn reset_to(&mut self, index: usize) -> Option<BufferedDetection> {
        let entry = self.entries.get(index).copied()?;
        self.entries.clear();
        self.entries.push(entry);
        Some(entry)
    }

    /// Buffered detections, reference first.
    #[must_use]
    pub fn detections(&self) -> Vec<Detection> {
        self.entries.iter().map(|e| e.detection).collect()
    }

    /// Number of buffered detections.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the baton has no history.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
