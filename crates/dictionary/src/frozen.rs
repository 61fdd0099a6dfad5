//! Frozen dictionary snapshots
//!
//! A `FrozenDictionary` is an immutable, point-in-time view of the dictionary.
//! It shares the map with the live dictionary until the writer's next
//! mutation, and is safe to read from any thread without coordination.

use enumstore_core::{EntryRef, EnumValue, Error, Result};
use std::sync::Arc;

use crate::dictionary::DictionaryKind;
use crate::key::{find_entry, find_folded, DictMap, FoldedRefs};

/// Immutable dictionary snapshot
#[derive(Debug)]
pub struct FrozenDictionary<T> {
    kind: DictionaryKind,
    map: Arc<DictMap<T>>,
}

impl<T> Clone for FrozenDictionary<T> {
    fn clone(&self) -> Self {
        FrozenDictionary {
            kind: self.kind,
            map: Arc::clone(&self.map),
        }
    }
}

impl<T: EnumValue> FrozenDictionary<T> {
    pub(crate) fn new(kind: DictionaryKind, map: Arc<DictMap<T>>) -> Self {
        FrozenDictionary { kind, map }
    }

    /// Empty snapshot
    pub fn empty(kind: DictionaryKind) -> Self {
        FrozenDictionary {
            kind,
            map: Arc::new(DictMap::new()),
        }
    }

    /// Number of distinct values
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Check if no value is present
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Find the reference of a value as of this snapshot
    pub fn find_index(&self, value: &T) -> Option<EntryRef> {
        find_entry(&self.map, value).map(|entry| entry.entry_ref)
    }

    /// All values folded-equal to `value`, ascending primary order
    pub fn find_matching_folded(&self, value: &T) -> FoldedRefs {
        find_folded(&self.map, value)
    }

    /// Find a value's reference and posting list as of this snapshot
    pub fn find_posting_list(&self, value: &T) -> Result<Option<(EntryRef, EntryRef)>> {
        if !self.kind.has_postings() {
            return Err(Error::Unsupported("posting lists on a unique dictionary"));
        }
        Ok(find_entry(&self.map, value).map(|entry| (entry.entry_ref, entry.posting)))
    }

    /// Iterate values and their references in ascending primary order
    pub fn iter(&self) -> impl Iterator<Item = (&T, EntryRef)> + '_ {
        self.map.iter().map(|(key, entry)| (key.value(), entry.entry_ref))
    }

    /// Check if two snapshots share the same map
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.map, &other.map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EnumDictionary;
    use enumstore_core::StoreConfig;
    use enumstore_datastore::DataStore;
    use std::thread;

    #[test]
    fn test_empty_snapshot() {
        let frozen: FrozenDictionary<u32> = FrozenDictionary::empty(DictionaryKind::Unique);
        assert!(frozen.is_empty());
        assert_eq!(frozen.find_index(&1), None);
        assert!(frozen.find_posting_list(&1).is_err());
    }

    #[test]
    fn test_freeze_without_mutation_shares_map() {
        let mut store = DataStore::new(StoreConfig::for_testing());
        let mut dict = EnumDictionary::new(DictionaryKind::Unique);
        dict.add(&mut store, &1u32).unwrap();

        let first = dict.freeze();
        let second = dict.freeze();
        assert!(first.ptr_eq(&second));

        dict.add(&mut store, &2u32).unwrap();
        assert!(!dict.freeze().ptr_eq(&first));
    }

    #[test]
    fn test_snapshot_read_from_threads() {
        let mut store = DataStore::new(StoreConfig::for_testing());
        let mut dict = EnumDictionary::new(DictionaryKind::Unique);
        for v in 0..50u64 {
            dict.add(&mut store, &v).unwrap();
        }
        let frozen = dict.freeze();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let frozen = frozen.clone();
                thread::spawn(move || {
                    for v in 0..50u64 {
                        assert!(frozen.find_index(&v).is_some());
                    }
                    frozen.iter().map(|(v, _)| *v).collect::<Vec<_>>()
                })
            })
            .collect();

        dict.free_unused(&mut store);
        for h in handles {
            assert_eq!(h.join().unwrap(), (0..50).collect::<Vec<_>>());
        }
    }
}
