//! Shadow previous-value tracking for foreign-key fields.
//!
//! When a save notification arrives the record already carries its new
//! foreign key. The tracker remembers the last value the engine processed
//! for each `(relation, record)` so a reassignment can be told apart from a
//! plain update and the old owner's collection can be fixed up.
//!
//! The table is bounded: past its capacity the least recently used value is
//! dropped and that record falls back to `Unknown`, which the engine then
//! primes from the record's cached snapshot.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use crate::cache::LruTracker;
use crate::model::{Pk, RelationId};

/// Tracked foreign-key values kept before the oldest is dropped.
pub const DEFAULT_SHADOW_CAPACITY: usize = 10_000;

type Slot = (RelationId, Pk);

/// What the tracker knows about a foreign key before the current change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Previous {
    /// The record was never observed
    Unknown,
    /// Last processed value; `None` is a null foreign key
    Known(Option<Pk>),
}

#[derive(Debug, Default)]
struct Table {
    values: HashMap<Slot, Option<Pk>>,
    lru: LruTracker<Slot>,
}

impl Table {
    fn insert(&mut self, slot: Slot, value: Option<Pk>, capacity: usize) {
        if !self.values.contains_key(&slot) && self.values.len() >= capacity {
            if let Some(oldest) = self.lru.evict_oldest() {
                self.values.remove(&oldest);
            }
        }
        self.lru.touch(&slot);
        self.values.insert(slot, value);
    }
}

#[derive(Debug)]
pub struct ShadowTracker {
    capacity: usize,
    table: Mutex<Table>,
}

impl Default for ShadowTracker {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_SHADOW_CAPACITY)
    }
}

impl ShadowTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            table: Mutex::new(Table::default()),
        }
    }

    fn table(&self) -> std::sync::MutexGuard<'_, Table> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn previous(&self, relation: &RelationId, pk: Pk) -> Previous {
        let slot = (relation.clone(), pk);
        let mut table = self.table();
        match table.values.get(&slot).copied() {
            Some(value) => {
                table.lru.touch(&slot);
                Previous::Known(value)
            }
            None => Previous::Unknown,
        }
    }

    /// Records the value the engine just processed.
    pub fn remember(&self, relation: &RelationId, pk: Pk, value: Option<Pk>) {
        self.table()
            .insert((relation.clone(), pk), value, self.capacity);
    }

    /// Seeds the value for a record seen on a read path. Never overrides a
    /// value the engine already processed.
    pub fn observe(&self, relation: &RelationId, pk: Pk, value: Option<Pk>) {
        let slot = (relation.clone(), pk);
        let mut table = self.table();
        if !table.values.contains_key(&slot) {
            table.insert(slot, value, self.capacity);
        }
    }

    pub fn forget(&self, relation: &RelationId, pk: Pk) {
        let slot = (relation.clone(), pk);
        let mut table = self.table();
        table.values.remove(&slot);
        table.lru.remove(&slot);
    }

    pub fn len(&self) -> usize {
        self.table().values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EntityName;

    fn author() -> RelationId {
        RelationId::new(EntityName::parse("library.Book").unwrap(), "author")
    }

    #[test]
    fn test_unknown_until_remembered() {
        let shadow = ShadowTracker::new();
        assert_eq!(shadow.previous(&author(), 1), Previous::Unknown);

        shadow.remember(&author(), 1, Some(4));
        assert_eq!(shadow.previous(&author(), 1), Previous::Known(Some(4)));

        shadow.remember(&author(), 1, None);
        assert_eq!(shadow.previous(&author(), 1), Previous::Known(None));
    }

    #[test]
    fn test_observe_does_not_override() {
        let shadow = ShadowTracker::new();
        shadow.observe(&author(), 1, Some(4));
        shadow.observe(&author(), 1, Some(9));
        assert_eq!(shadow.previous(&author(), 1), Previous::Known(Some(4)));

        shadow.remember(&author(), 1, Some(9));
        assert_eq!(shadow.previous(&author(), 1), Previous::Known(Some(9)));
    }

    #[test]
    fn test_forget() {
        let shadow = ShadowTracker::new();
        shadow.remember(&author(), 1, Some(4));
        shadow.forget(&author(), 1);
        assert!(shadow.is_empty());
        assert_eq!(shadow.previous(&author(), 1), Previous::Unknown);
    }

    #[test]
    fn test_capacity_drops_least_recently_used() {
        let shadow = ShadowTracker::with_capacity(2);
        shadow.observe(&author(), 1, Some(4));
        shadow.remember(&author(), 2, Some(5));
        // Touch 1 so that 2 is now the oldest
        shadow.previous(&author(), 1);
        shadow.observe(&author(), 3, None);

        assert_eq!(shadow.len(), 2);
        assert_eq!(shadow.previous(&author(), 1), Previous::Known(Some(4)));
        assert_eq!(shadow.previous(&author(), 2), Previous::Unknown);
        assert_eq!(shadow.previous(&author(), 3), Previous::Known(None));
    }

    #[test]
    fn test_repeated_reads_stay_bounded() {
        let shadow = ShadowTracker::with_capacity(16);
        for round in 0..5 {
            for pk in 0..100 {
                shadow.observe(&author(), pk, Some(round));
            }
        }
        assert_eq!(shadow.len(), 16);
    }
}
