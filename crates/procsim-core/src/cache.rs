//! Client-side cache of the latest snapshot per process.
//!
//! Every update carries the complete snapshot, so the cache never merges
//! fields: the incoming snapshot replaces what was there. Entries keep the
//! order in which their id was first seen.

use crate::{ProcessId, ProcessSnapshot, ProcessState, SnapshotError};
use indexmap::IndexMap;

#[derive(Debug, Clone, PartialEq)]
pub struct CachedProcess {
    pub snapshot: ProcessSnapshot,
    /// Set by a finalize event and never cleared by later updates.
    pub finalized: bool,
    /// Set once any state other than New has been observed for this id.
    pub left_new: bool,
}

impl CachedProcess {
    pub fn id(&self) -> ProcessId {
        self.snapshot.id
    }

    pub fn is_terminal(&self) -> bool {
        self.finalized || self.snapshot.is_terminal()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Inserted,
    Replaced,
}

#[derive(Debug, Clone, Default)]
pub struct StateCache {
    entries: IndexMap<ProcessId, CachedProcess>,
}

impl StateCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply_update(&mut self, snapshot: ProcessSnapshot) -> Result<Applied, SnapshotError> {
        self.apply(snapshot, false)
    }

    pub fn apply_finalize(&mut self, snapshot: ProcessSnapshot) -> Result<Applied, SnapshotError> {
        self.apply(snapshot, true)
    }

    /// Drops every entry at once and returns how many there were.
    pub fn reset(&mut self) -> usize {
        std::mem::take(&mut self.entries).len()
    }

    pub fn snapshot_all(&self) -> Vec<&ProcessSnapshot> {
        self.entries.values().map(|entry| &entry.snapshot).collect()
    }

    pub fn entries(&self) -> impl Iterator<Item = &CachedProcess> {
        self.entries.values()
    }

    pub fn entry_at(&self, index: usize) -> Option<&CachedProcess> {
        self.entries.get_index(index).map(|(_, entry)| entry)
    }

    pub fn get(&self, id: ProcessId) -> Option<&CachedProcess> {
        self.entries.get(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Latest transition timestamp across every cached history.
    pub fn latest_timestamp(&self) -> Option<f64> {
        self.entries
            .values()
            .filter_map(|entry| entry.snapshot.last_transition())
            .map(|transition| transition.at)
            .reduce(f64::max)
    }

    fn apply(&mut self, snapshot: ProcessSnapshot, finalize: bool) -> Result<Applied, SnapshotError> {
        snapshot.validate()?;
        let left_new = snapshot.state != ProcessState::New;
        match self.entries.get_mut(&snapshot.id) {
            Some(entry) => {
                entry.finalized |= finalize;
                entry.left_new |= left_new;
                entry.snapshot = snapshot;
                Ok(Applied::Replaced)
            }
            None => {
                self.entries.insert(
                    snapshot.id,
                    CachedProcess {
                        snapshot,
                        finalized: finalize,
                        left_new,
                    },
                );
                Ok(Applied::Inserted)
            }
        }
    }
}
