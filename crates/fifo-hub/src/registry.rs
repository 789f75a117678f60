//! # Connection Registry
//!
//! The live set of observers. Only the hub's event loop mutates it; readers
//! copy observers out and release the lock before pushing anything.

use std::collections::HashMap;

use crate::observer::{Observer, ObserverId};
use crate::protocol::PresenceEntry;

/// Registered observers keyed by connection ID.
#[derive(Debug, Default)]
pub struct Registry {
    observers: HashMap<ObserverId, Observer>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an observer. Returns false if the ID was already present.
    pub fn insert(&mut self, observer: Observer) -> bool {
        self.observers.insert(observer.id(), observer).is_none()
    }

    /// Removes an observer. Removing an absent ID is a no-op returning `None`.
    pub fn remove(&mut self, id: &ObserverId) -> Option<Observer> {
        self.observers.remove(id)
    }

    pub fn contains(&self, id: &ObserverId) -> bool {
        self.observers.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    /// Copies every observer handle.
    pub fn observers(&self) -> Vec<Observer> {
        self.observers.values().cloned().collect()
    }

    /// Copies the handles of observers entitled to presence rosters.
    pub fn elevated(&self) -> Vec<Observer> {
        self.observers
            .values()
            .filter(|o| o.identity().sees_presence())
            .cloned()
            .collect()
    }

    /// Presence roster, sorted by display name so every recipient sees the
    /// same order.
    pub fn roster(&self) -> Vec<PresenceEntry> {
        let mut roster: Vec<PresenceEntry> = self
            .observers
            .values()
            .map(|o| PresenceEntry::from(o.identity()))
            .collect();
        roster.sort_by(|a, b| {
            a.full_name
                .cmp(&b.full_name)
                .then_with(|| a.username.cmp(&b.username))
                .then_with(|| a.id.cmp(&b.id))
        });
        roster
    }

    /// Empties the registry, returning everything that was in it.
    pub fn drain(&mut self) -> Vec<Observer> {
        self.observers.drain().map(|(_, o)| o).collect()
    }
}
