//! Live enum dictionary
//!
//! Ordered map from distinct value to its `EntryRef` in the data store.
//! Only the writer touches the live dictionary; readers go through a
//! `FrozenDictionary` obtained with `freeze`.
//!
//! # Design
//!
//! The map sits behind an `Arc`. Freezing clones the `Arc`; the first
//! mutation after a freeze copies the map (`Arc::make_mut`), so a frozen
//! snapshot never changes once published. Between freezes mutations are in
//! place.
//!
//! Reference counts are not kept here: they live next to the values in the
//! data store, which the dictionary consults when sweeping unused entries.

use enumstore_core::{EntryRef, EnumValue, Error, MemoryUsage, Result};
use enumstore_datastore::{DataStore, EntryRefRemapper};
use rustc_hash::FxHashSet;
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::debug;

use crate::frozen::FrozenDictionary;
use crate::key::{find_entry, find_folded, DictKey, DictMap, DictionaryEntry, FoldedRefs};

/// Capabilities of a dictionary, fixed at construction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DictionaryKind {
    /// Distinct values only
    #[default]
    Unique,
    /// Distinct values, each with a posting list reference
    WithPostings,
}

impl DictionaryKind {
    /// Check if posting list references are carried
    pub fn has_postings(&self) -> bool {
        matches!(self, DictionaryKind::WithPostings)
    }
}

/// Outcome of `EnumDictionary::add`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddResult {
    /// Reference of the (possibly pre-existing) value
    pub entry_ref: EntryRef,
    /// Whether the value was newly stored
    pub inserted: bool,
}

/// Writer-side ordered dictionary over stored values
#[derive(Debug, Clone)]
pub struct EnumDictionary<T> {
    kind: DictionaryKind,
    map: Arc<DictMap<T>>,
}

impl<T: EnumValue> EnumDictionary<T> {
    /// Create an empty dictionary
    pub fn new(kind: DictionaryKind) -> Self {
        EnumDictionary {
            kind,
            map: Arc::new(DictMap::new()),
        }
    }

    /// Capabilities of this dictionary
    pub fn kind(&self) -> DictionaryKind {
        self.kind
    }

    /// Number of distinct values
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Check if no value is present
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    // ========================================================================
    // Lookup
    // ========================================================================

    /// Find the reference of a value
    pub fn find_index(&self, value: &T) -> Option<EntryRef> {
        find_entry(&self.map, value).map(|entry| entry.entry_ref)
    }

    /// All values folded-equal to `value`, ascending primary order
    pub fn find_matching_folded(&self, value: &T) -> FoldedRefs {
        find_folded(&self.map, value)
    }

    /// Find a value's reference and posting list
    ///
    /// Returns `Error::Unsupported` for a `Unique` dictionary.
    pub fn find_posting_list(&self, value: &T) -> Result<Option<(EntryRef, EntryRef)>> {
        self.require_postings()?;
        Ok(find_entry(&self.map, value).map(|entry| (entry.entry_ref, entry.posting)))
    }

    /// Iterate values and their references in ascending primary order
    pub fn iter(&self) -> impl Iterator<Item = (&T, EntryRef)> + '_ {
        self.map.iter().map(|(key, entry)| (key.value(), entry.entry_ref))
    }

    /// References in ascending primary order
    pub fn refs(&self) -> Vec<EntryRef> {
        self.map.values().map(|entry| entry.entry_ref).collect()
    }

    // ========================================================================
    // Mutation
    // ========================================================================

    /// Find a value, storing it on a miss
    ///
    /// The reference count is left alone; the caller increments it. A value
    /// the saved layout cannot hold is `Error::InvalidValue`.
    pub fn add(&mut self, store: &mut DataStore<T>, value: &T) -> Result<AddResult> {
        if let Some(entry) = find_entry(&self.map, value) {
            return Ok(AddResult {
                entry_ref: entry.entry_ref,
                inserted: false,
            });
        }
        if let Some(reason) = value.unstorable_reason() {
            return Err(Error::InvalidValue(reason));
        }
        let entry_ref = store.allocate(value.clone())?;
        Arc::make_mut(&mut self.map)
            .insert(DictKey::new(value.clone()), DictionaryEntry::new(entry_ref));
        Ok(AddResult {
            entry_ref,
            inserted: true,
        })
    }

    /// Set the posting list of a value
    ///
    /// Returns whether the value was found; `Error::Unsupported` for a
    /// `Unique` dictionary.
    pub fn update_posting_list(&mut self, value: &T, posting: EntryRef) -> Result<bool> {
        self.require_postings()?;
        let map = Arc::make_mut(&mut self.map);
        match map.get_mut(&DictKey::new(value.clone())) {
            Some(entry) => {
                entry.posting = posting;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Remove every value with a zero reference count
    ///
    /// Removed values are put on the data store's hold list. Returns the
    /// number of values removed.
    pub fn free_unused(&mut self, store: &mut DataStore<T>) -> usize {
        let unused: Vec<DictKey<T>> = self
            .map
            .iter()
            .filter(|(_, entry)| store.ref_count(entry.entry_ref) == 0)
            .map(|(key, _)| key.clone())
            .collect();
        if unused.is_empty() {
            return 0;
        }
        let map = Arc::make_mut(&mut self.map);
        for key in &unused {
            if let Some(entry) = map.remove(key) {
                store.hold(entry.entry_ref);
            }
        }
        debug!(target: "enumstore::datastore", freed = unused.len(), "Freed unused values");
        unused.len()
    }

    /// Remove the candidates that have a zero reference count
    ///
    /// Candidates not in the dictionary are ignored.
    pub fn free_unused_in(
        &mut self,
        store: &mut DataStore<T>,
        candidates: &FxHashSet<EntryRef>,
    ) -> usize {
        let mut freed = 0;
        for &entry_ref in candidates {
            if store.ref_count(entry_ref) != 0 {
                continue;
            }
            let Some(value) = store.try_get(entry_ref).cloned() else {
                continue;
            };
            let key = DictKey::new(value);
            if self.map.get(&key).map(|entry| entry.entry_ref) != Some(entry_ref) {
                continue;
            }
            Arc::make_mut(&mut self.map).remove(&key);
            store.hold(entry_ref);
            freed += 1;
        }
        freed
    }

    /// Replace the contents with already-stored values
    ///
    /// # Panics
    ///
    /// If `refs` is not strictly ascending by the primary order of the values
    /// they point at. The caller produced a corrupt sequence and the store
    /// cannot continue with it.
    pub fn build(&mut self, store: &DataStore<T>, refs: &[EntryRef]) {
        let mut map = DictMap::new();
        let mut prev: Option<&T> = None;
        for &entry_ref in refs {
            let value = store.get(entry_ref);
            if let Some(prev) = prev {
                assert_eq!(
                    prev.cmp_primary(value),
                    Ordering::Less,
                    "dictionary build input not strictly ascending at {:?}",
                    entry_ref
                );
            }
            map.insert(DictKey::new(value.clone()), DictionaryEntry::new(entry_ref));
            prev = Some(value);
        }
        self.map = Arc::new(map);
    }

    /// Move the values living in compacted buffers, in dictionary order
    ///
    /// Every moved reference is recorded in `remapper` and rewritten in the
    /// dictionary.
    pub fn move_entries(
        &mut self,
        store: &mut DataStore<T>,
        remapper: &mut EntryRefRemapper,
    ) -> Result<usize> {
        if remapper.compacted_buffers().next().is_none() {
            return Ok(0);
        }
        let mut moved = 0;
        for entry in Arc::make_mut(&mut self.map).values_mut() {
            if !remapper.is_compacted(entry.entry_ref) {
                continue;
            }
            let new_ref = store.move_entry(entry.entry_ref)?;
            remapper.record(entry.entry_ref, new_ref);
            entry.entry_ref = new_ref;
            moved += 1;
        }
        Ok(moved)
    }

    // ========================================================================
    // Snapshots and accounting
    // ========================================================================

    /// Take an immutable snapshot for readers
    pub fn freeze(&self) -> FrozenDictionary<T> {
        FrozenDictionary::new(self.kind, Arc::clone(&self.map))
    }

    /// Estimated memory held by the map
    pub fn memory_usage(&self) -> MemoryUsage {
        let node = std::mem::size_of::<DictKey<T>>() + std::mem::size_of::<DictionaryEntry>();
        let bytes: usize = self
            .map
            .keys()
            .map(|key| node + key.value().heap_bytes())
            .sum();
        MemoryUsage::new(bytes, bytes, 0, 0)
    }

    fn require_postings(&self) -> Result<()> {
        if self.kind.has_postings() {
            Ok(())
        } else {
            Err(Error::Unsupported("posting lists on a unique dictionary"))
        }
    }
}

impl<T: EnumValue> Default for EnumDictionary<T> {
    fn default() -> Self {
        Self::new(DictionaryKind::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use enumstore_core::StoreConfig;

    fn setup() -> (DataStore<String>, EnumDictionary<String>) {
        (
            DataStore::new(StoreConfig::for_testing()),
            EnumDictionary::new(DictionaryKind::Unique),
        )
    }

    fn s(v: &str) -> String {
        v.to_string()
    }

    // ========================================
    // Add and find
    // ========================================

    #[test]
    fn test_add_dedups() {
        let (mut store, mut dict) = setup();
        let a = dict.add(&mut store, &s("apple")).unwrap();
        let b = dict.add(&mut store, &s("banana")).unwrap();
        let again = dict.add(&mut store, &s("apple")).unwrap();

        assert!(a.inserted);
        assert!(b.inserted);
        assert!(!again.inserted);
        assert_eq!(again.entry_ref, a.entry_ref);
        assert_eq!(dict.len(), 2);
        assert_eq!(dict.find_index(&s("banana")), Some(b.entry_ref));
        assert_eq!(dict.find_index(&s("cherry")), None);
    }

    #[test]
    fn test_add_rejects_unstorable_value() {
        let (mut store, mut dict) = setup();
        assert!(matches!(
            dict.add(&mut store, &s("a\0b")),
            Err(Error::InvalidValue(_))
        ));
        assert!(dict.is_empty());
        assert_eq!(store.address_space_usage().used(), 1);
    }

    #[test]
    fn test_iter_ascending() {
        let (mut store, mut dict) = setup();
        for v in ["pear", "Apple", "fig", "apple"] {
            dict.add(&mut store, &s(v)).unwrap();
        }
        let values: Vec<&String> = dict.iter().map(|(v, _)| v).collect();
        assert_eq!(values, vec!["Apple", "apple", "fig", "pear"]);
    }

    #[test]
    fn test_find_matching_folded() {
        let (mut store, mut dict) = setup();
        let upper = dict.add(&mut store, &s("Apple")).unwrap().entry_ref;
        let lower = dict.add(&mut store, &s("apple")).unwrap().entry_ref;
        dict.add(&mut store, &s("apricot")).unwrap();

        let refs = dict.find_matching_folded(&s("APPLE"));
        assert_eq!(refs.as_slice(), &[upper, lower]);
    }

    // ========================================
    // Postings
    // ========================================

    #[test]
    fn test_postings_unsupported_on_unique() {
        let (mut store, mut dict) = setup();
        dict.add(&mut store, &s("x")).unwrap();
        assert!(matches!(
            dict.find_posting_list(&s("x")),
            Err(Error::Unsupported(_))
        ));
        assert!(matches!(
            dict.update_posting_list(&s("x"), EntryRef::new(3, 3)),
            Err(Error::Unsupported(_))
        ));
    }

    #[test]
    fn test_postings_round_trip() {
        let mut store = DataStore::new(StoreConfig::for_testing());
        let mut dict = EnumDictionary::new(DictionaryKind::WithPostings);
        let r = dict.add(&mut store, &7u32).unwrap().entry_ref;

        assert_eq!(dict.find_posting_list(&7).unwrap(), Some((r, EntryRef::INVALID)));
        assert!(dict.update_posting_list(&7, EntryRef::new(2, 9)).unwrap());
        assert!(!dict.update_posting_list(&8, EntryRef::new(2, 9)).unwrap());
        assert_eq!(dict.find_posting_list(&7).unwrap(), Some((r, EntryRef::new(2, 9))));
        assert_eq!(dict.find_posting_list(&8).unwrap(), None);
    }

    // ========================================
    // Freeing
    // ========================================

    #[test]
    fn test_free_unused_holds_refs() {
        let (mut store, mut dict) = setup();
        let a = dict.add(&mut store, &s("apple")).unwrap().entry_ref;
        let b = dict.add(&mut store, &s("banana")).unwrap().entry_ref;
        store.inc_ref_count(a);

        assert_eq!(dict.free_unused(&mut store), 1);
        assert_eq!(dict.find_index(&s("banana")), None);
        assert_eq!(store.held_entries(), 1);
        // Held value still readable
        assert_eq!(store.get(b), "banana");
        assert_eq!(dict.free_unused(&mut store), 0);
    }

    #[test]
    fn test_free_unused_in_only_candidates() {
        let (mut store, mut dict) = setup();
        let a = dict.add(&mut store, &s("a")).unwrap().entry_ref;
        let b = dict.add(&mut store, &s("b")).unwrap().entry_ref;
        let c = dict.add(&mut store, &s("c")).unwrap().entry_ref;
        store.inc_ref_count(c);

        let candidates: FxHashSet<EntryRef> = [b, c].into_iter().collect();
        assert_eq!(dict.free_unused_in(&mut store, &candidates), 1);
        assert_eq!(dict.find_index(&s("a")), Some(a));
        assert_eq!(dict.find_index(&s("b")), None);
        assert_eq!(dict.find_index(&s("c")), Some(c));
    }

    // ========================================
    // Build
    // ========================================

    #[test]
    fn test_build_from_sorted_refs() {
        let (mut store, mut dict) = setup();
        let refs: Vec<EntryRef> = ["a", "b", "c"]
            .iter()
            .map(|v| store.allocate(s(v)).unwrap())
            .collect();
        dict.build(&store, &refs);
        assert_eq!(dict.refs(), refs);
        assert_eq!(dict.find_index(&s("b")), Some(refs[1]));
    }

    #[test]
    #[should_panic(expected = "not strictly ascending")]
    fn test_build_rejects_unsorted() {
        let (mut store, mut dict) = setup();
        let refs: Vec<EntryRef> = ["a", "c", "b"]
            .iter()
            .map(|v| store.allocate(s(v)).unwrap())
            .collect();
        dict.build(&store, &refs);
    }

    #[test]
    #[should_panic(expected = "not strictly ascending")]
    fn test_build_rejects_duplicates() {
        let (mut store, mut dict) = setup();
        let refs: Vec<EntryRef> = ["a", "a"]
            .iter()
            .map(|v| store.allocate(s(v)).unwrap())
            .collect();
        dict.build(&store, &refs);
    }

    // ========================================
    // Snapshots
    // ========================================

    #[test]
    fn test_frozen_snapshot_is_stable() {
        let (mut store, mut dict) = setup();
        let a = dict.add(&mut store, &s("a")).unwrap().entry_ref;
        let frozen = dict.freeze();

        dict.add(&mut store, &s("b")).unwrap();
        assert_eq!(dict.free_unused(&mut store), 2);

        assert_eq!(frozen.len(), 1);
        assert_eq!(frozen.find_index(&s("a")), Some(a));
        assert_eq!(frozen.find_index(&s("b")), None);
        assert!(dict.is_empty());
    }

    #[test]
    fn test_memory_usage_grows_with_values() {
        let (mut store, mut dict) = setup();
        let empty = dict.memory_usage();
        dict.add(&mut store, &s("hello")).unwrap();
        let one = dict.memory_usage();
        assert_eq!(empty.used_bytes, 0);
        assert!(one.used_bytes > 6);
    }
}
