//! Batched updates
//!
//! A `BatchUpdater` collects inserts and reference count changes, remembering
//! which values may have ended up unused. `commit` sweeps only those
//! candidates instead of the whole dictionary, then publishes.

use enumstore_core::{EntryRef, EnumValue, Generation, Result};
use rustc_hash::FxHashSet;

use crate::store::EnumStore;

/// Batch of inserts and reference count changes on one store
pub struct BatchUpdater<'a, T: EnumValue> {
    store: &'a mut EnumStore<T>,
    possibly_unused: FxHashSet<EntryRef>,
}

impl<'a, T: EnumValue> BatchUpdater<'a, T> {
    pub(crate) fn new(store: &'a mut EnumStore<T>) -> Self {
        BatchUpdater {
            store,
            possibly_unused: FxHashSet::default(),
        }
    }

    /// Find or store a value
    ///
    /// The reference count is not touched; a newly stored value is unused
    /// until `inc_ref_count` says otherwise.
    pub fn insert(&mut self, value: &T) -> Result<EntryRef> {
        let added = self.store.add(value)?;
        if added.inserted {
            self.possibly_unused.insert(added.entry_ref);
        }
        Ok(added.entry_ref)
    }

    /// Take another reference to a value
    pub fn inc_ref_count(&mut self, entry_ref: EntryRef) {
        self.store.inc_ref_count(entry_ref);
    }

    /// Drop a reference to a value
    pub fn dec_ref_count(&mut self, entry_ref: EntryRef) {
        if self.store.dec_ref_count(entry_ref) == 0 {
            self.possibly_unused.insert(entry_ref);
        }
    }

    /// Number of values that may be unused
    pub fn possibly_unused(&self) -> usize {
        self.possibly_unused.len()
    }

    /// Free the values the batch left unused and publish
    ///
    /// Returns the new generation and the number of values freed.
    pub fn commit(self) -> (Generation, usize) {
        let freed = self.store.free_unused_values_in(&self.possibly_unused);
        (self.store.commit(), freed)
    }
}
