//! Per-connection subscription manager.
//!
//! Tracks which batons a WebSocket client follows and provides
//! server-side event filtering.

use std::collections::HashSet;

use crate::domain::{BatonId, RaceEvent};

/// Manages the set of baton subscriptions for a single WebSocket connection.
#[derive(Debug, Default)]
pub struct SubscriptionManager {
    /// Subscribed baton ids. Ignored while `subscribe_all` is set.
    baton_ids: HashSet<BatonId>,
    /// Whether the client follows every baton (wildcard `"*"`).
    subscribe_all: bool,
}

impl SubscriptionManager {
    /// Creates a new empty subscription manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds baton ids to the subscription set.
    pub fn subscribe(&mut self, ids: &[BatonId], wildcard: bool) {
        if wildcard {
            self.subscribe_all = true;
        }
        self.baton_ids.extend(ids.iter().copied());
    }

    /// Removes baton ids from the subscription set. `wildcard` clears the
    /// wildcard subscription.
    pub fn unsubscribe(&mut self, ids: &[BatonId], wildcard: bool) {
        if wildcard {
            self.subscribe_all = false;
        }
        for id in ids {
            self.baton_ids.remove(id);
        }
    }

    /// Returns `true` if the event should be forwarded. Events not tied to
    /// a baton only reach wildcard subscribers.
    #[must_use]
    pub fn matches(&self, event: &RaceEvent) -> bool {
        if self.subscribe_all {
            return true;
        }
        event
            .baton_id()
            .is_some_and(|id| self.baton_ids.contains(&id))
    }

    /// Returns the number of explicitly subscribed batons.
    #[must_use]
    pub fn count(&self) -> usize {
        self.baton_ids.len()
    }

    /// Returns `true` if the wildcard subscription is active.
    #[must_use]
    pub fn is_subscribed_all(&self) -> bool {
        self.subscribe_all
    }
}
