//! Tracked-target registry
//!
//! An arena of tracked targets: a dense slot vector that preserves insertion
//! order, plus a side index from [`TargetId`] to slot position. Removal
//! tombstones the slot in O(1); tombstones are compacted away once they
//! outnumber the live entries.
//!
//! A parallel `marker_by_key` index maps each identity key to the marker of
//! the most recently registered live entry with that key.

use crate::types::{Result, TargetId, TrackedTarget, TrackerError};
use std::collections::HashMap;

/// Below this many tombstones compaction is not worth the index rebuild
const MIN_COMPACT_TOMBSTONES: usize = 8;

#[derive(Debug, Clone)]
struct Slot {
    id: TargetId,
    target: TrackedTarget,
}

/// Ordered, deduplication-aware store of tracked targets
#[derive(Debug, Default)]
pub struct TargetRegistry {
    slots: Vec<Option<Slot>>,
    index: HashMap<TargetId, usize>,
    marker_by_key: HashMap<String, String>,
    /// Live ids per identity key, in registration order
    ids_by_key: HashMap<String, Vec<TargetId>>,
    tombstones: usize,
    next_id: u64,
}

impl TargetRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a target and return its id
    pub fn insert(&mut self, target: TrackedTarget) -> TargetId {
        let id = TargetId(self.next_id);
        self.next_id += 1;

        self.marker_by_key
            .insert(target.identity_key.clone(), target.marker.clone());
        self.ids_by_key
            .entry(target.identity_key.clone())
            .or_default()
            .push(id);

        self.index.insert(id, self.slots.len());
        self.slots.push(Some(Slot { id, target }));

        log::trace!("Registry insert {} ({} live)", id, self.len());
        id
    }

    /// Remove the entry with the given id
    ///
    /// Fails with [`TrackerError::StaleTarget`] if the id was already removed
    /// or never belonged to this registry.
    pub fn remove(&mut self, id: TargetId) -> Result<TrackedTarget> {
        let position = self
            .index
            .remove(&id)
            .ok_or(TrackerError::StaleTarget(id))?;
        let slot = self.slots[position]
            .take()
            .ok_or(TrackerError::StaleTarget(id))?;
        self.tombstones += 1;

        let key = &slot.target.identity_key;
        let remaining = match self.ids_by_key.get_mut(key) {
            Some(ids) => {
                ids.retain(|other| *other != id);
                ids.last().copied()
            }
            None => None,
        };
        let latest_marker = remaining
            .and_then(|latest| self.get(latest))
            .map(|latest| latest.marker.clone());
        match latest_marker {
            Some(marker) => {
                self.marker_by_key.insert(key.clone(), marker);
            }
            None => {
                self.ids_by_key.remove(key);
                self.marker_by_key.remove(key);
            }
        }

        if self.tombstones >= MIN_COMPACT_TOMBSTONES && self.tombstones > self.len() {
            self.compact();
        }

        log::trace!("Registry remove {} ({} live)", id, self.len());
        Ok(slot.target)
    }

    /// Look up a live entry
    pub fn get(&self, id: TargetId) -> Option<&TrackedTarget> {
        let position = *self.index.get(&id)?;
        self.slots[position].as_ref().map(|slot| &slot.target)
    }

    /// True if the id refers to a live entry
    pub fn contains(&self, id: TargetId) -> bool {
        self.index.contains_key(&id)
    }

    /// Number of live entries
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// True if no entries are live
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Live entries in registration order
    pub fn iter(&self) -> impl Iterator<Item = (TargetId, &TrackedTarget)> {
        self.slots
            .iter()
            .flatten()
            .map(|slot| (slot.id, &slot.target))
    }

    /// Live targets in registration order
    pub fn targets(&self) -> Vec<TrackedTarget> {
        self.iter().map(|(_, target)| target.clone()).collect()
    }

    /// Marker currently associated with an identity key
    pub fn marker_for_key(&self, key: &str) -> Option<&str> {
        self.marker_by_key.get(key).map(String::as_str)
    }

    /// The identity key → marker index
    pub fn markers_by_key(&self) -> &HashMap<String, String> {
        &self.marker_by_key
    }

    fn compact(&mut self) {
        self.slots.retain(Option::is_some);
        self.index.clear();
        for (position, slot) in self.slots.iter().enumerate() {
            if let Some(slot) = slot {
                self.index.insert(slot.id, position);
            }
        }
        log::trace!("Registry compacted {} tombstones", self.tombstones);
        self.tombstones = 0;
    }
}
