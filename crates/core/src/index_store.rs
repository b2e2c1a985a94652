//! Reverse index store contract and an in-memory implementation.
//!
//! The store maps `(index, key)` to the stub locations of every unit that
//! contributed it. A unit's entries are only ever replaced as a whole.

use crate::index_sink::{IndexEntry, StubIndexKey};
use crate::stub::StubLocation;
use parking_lot::RwLock;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Identity of a source unit, typically its project-relative path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UnitId(Arc<str>);

impl UnitId {
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(Arc::from(id.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UnitId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// A stub location qualified by its unit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UnitLocation {
    pub unit: UnitId,
    pub location: StubLocation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    Committed { replaced: usize, added: usize },
    /// A newer rebuild of the unit was already committed.
    Stale { current: u64 },
}

pub trait ReverseIndexStore: Send + Sync {
    /// Atomically replaces everything previously committed for `unit`.
    /// Last commit wins by `sequence`.
    fn commit(&self, unit: &UnitId, sequence: u64, entries: Vec<IndexEntry>) -> CommitOutcome;

    fn remove_unit(&self, unit: &UnitId, sequence: u64) -> CommitOutcome;

    fn query(&self, index: StubIndexKey, key: &str) -> Vec<UnitLocation>;

    fn keys(&self, index: StubIndexKey) -> Vec<Arc<str>>;
}

#[derive(Default)]
struct StoreState {
    by_key: HashMap<(StubIndexKey, Arc<str>), BTreeSet<UnitLocation>>,
    units: HashMap<UnitId, UnitRecord>,
}

#[derive(Default)]
struct UnitRecord {
    sequence: u64,
    entries: Vec<IndexEntry>,
}

impl StoreState {
    fn retire(&mut self, unit: &UnitId, entries: &[IndexEntry]) {
        for entry in entries {
            let slot = (entry.index, Arc::clone(&entry.key));
            if let Some(locations) = self.by_key.get_mut(&slot) {
                locations.remove(&UnitLocation {
                    unit: unit.clone(),
                    location: entry.location.clone(),
                });
                if locations.is_empty() {
                    self.by_key.remove(&slot);
                }
            }
        }
    }

    fn publish(&mut self, unit: &UnitId, entries: &[IndexEntry]) {
        for entry in entries {
            self.by_key
                .entry((entry.index, Arc::clone(&entry.key)))
                .or_default()
                .insert(UnitLocation {
                    unit: unit.clone(),
                    location: entry.location.clone(),
                });
        }
    }
}

/// In-memory store. Writers hold the write lock for the whole swap, so a
/// reader sees either the old or the new entry set of a unit.
#[derive(Default)]
pub struct InMemoryIndexStore {
    state: RwLock<StoreState>,
}

impl InMemoryIndexStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn unit_count(&self) -> usize {
        self.state.read().units.len()
    }

    pub fn entry_count(&self) -> usize {
        self.state.read().units.values().map(|u| u.entries.len()).sum()
    }

    pub fn unit_sequence(&self, unit: &UnitId) -> Option<u64> {
        self.state.read().units.get(unit).map(|u| u.sequence)
    }

    pub fn units(&self) -> Vec<UnitId> {
        let mut units: Vec<UnitId> = self.state.read().units.keys().cloned().collect();
        units.sort();
        units
    }
}

impl ReverseIndexStore for InMemoryIndexStore {
    fn commit(&self, unit: &UnitId, sequence: u64, entries: Vec<IndexEntry>) -> CommitOutcome {
        let mut state = self.state.write();
        if let Some(current) = state.units.get(unit).map(|record| record.sequence) {
            if current >= sequence {
                debug!("dropping stale commit {} for {} (current {})", sequence, unit, current);
                return CommitOutcome::Stale { current };
            }
        }

        let previous = state.units.remove(unit).unwrap_or_default();
        state.retire(unit, &previous.entries);
        state.publish(unit, &entries);

        let added = entries.len();
        state.units.insert(unit.clone(), UnitRecord { sequence, entries });
        CommitOutcome::Committed {
            replaced: previous.entries.len(),
            added,
        }
    }

    fn remove_unit(&self, unit: &UnitId, sequence: u64) -> CommitOutcome {
        let mut state = self.state.write();
        match state.units.get(unit).map(|record| record.sequence) {
            Some(current) if current >= sequence => CommitOutcome::Stale { current },
            Some(_) => {
                let previous = state.units.remove(unit).unwrap_or_default();
                state.retire(unit, &previous.entries);
                CommitOutcome::Committed {
                    replaced: previous.entries.len(),
                    added: 0,
                }
            }
            None => CommitOutcome::Committed {
                replaced: 0,
                added: 0,
            },
        }
    }

    fn query(&self, index: StubIndexKey, key: &str) -> Vec<UnitLocation> {
        let state = self.state.read();
        state
            .by_key
            .get(&(index, Arc::from(key)))
            .map(|locations| locations.iter().cloned().collect())
            .unwrap_or_default()
    }

    fn keys(&self, index: StubIndexKey) -> Vec<Arc<str>> {
        let state = self.state.read();
        let mut keys: Vec<Arc<str>> = state
            .by_key
            .keys()
            .filter(|(i, _)| *i == index)
            .map(|(_, key)| Arc::clone(key))
            .collect();
        keys.sort();
        keys
    }
}
