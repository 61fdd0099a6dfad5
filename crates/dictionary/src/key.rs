//! Dictionary key ordering
//!
//! Keys order by the primary comparator of the values they carry. A lookup
//! can also use a folded lower-bound probe: it sorts after every value in an
//! earlier folded class and before every value in its own class, so a range
//! scan starting at the probe visits exactly one folded class.

use enumstore_core::{EntryRef, EnumValue};
use smallvec::SmallVec;
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Refs of one folded class, ascending primary order
pub type FoldedRefs = SmallVec<[EntryRef; 4]>;

/// Ordered key of the dictionary map
#[derive(Debug, Clone)]
pub struct DictKey<T> {
    value: T,
    folded_probe: bool,
}

impl<T> DictKey<T> {
    /// Key for a stored value
    pub fn new(value: T) -> Self {
        DictKey {
            value,
            folded_probe: false,
        }
    }

    /// Probe sorting first within the folded class of `value`
    pub fn folded_lower_bound(value: T) -> Self {
        DictKey {
            value,
            folded_probe: true,
        }
    }

    /// Value carried by this key
    pub fn value(&self) -> &T {
        &self.value
    }
}

impl<T: EnumValue> Ord for DictKey<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.folded_probe, other.folded_probe) {
            (false, false) => self.value.cmp_primary(&other.value),
            (true, false) => self
                .value
                .cmp_folded(&other.value)
                .then(Ordering::Less),
            (false, true) => self
                .value
                .cmp_folded(&other.value)
                .then(Ordering::Greater),
            (true, true) => self.value.cmp_folded(&other.value),
        }
    }
}

impl<T: EnumValue> PartialOrd for DictKey<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T: EnumValue> PartialEq for DictKey<T> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<T: EnumValue> Eq for DictKey<T> {}

/// Per-value payload of the dictionary map
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DictionaryEntry {
    /// Where the value lives in the data store
    pub entry_ref: EntryRef,
    /// Posting list of the value; invalid when none or unsupported
    pub posting: EntryRef,
}

impl DictionaryEntry {
    pub(crate) fn new(entry_ref: EntryRef) -> Self {
        DictionaryEntry {
            entry_ref,
            posting: EntryRef::INVALID,
        }
    }
}

pub(crate) type DictMap<T> = BTreeMap<DictKey<T>, DictionaryEntry>;

pub(crate) fn find_entry<'a, T: EnumValue>(
    map: &'a DictMap<T>,
    value: &T,
) -> Option<&'a DictionaryEntry> {
    map.get(&DictKey::new(value.clone()))
}

pub(crate) fn find_folded<T: EnumValue>(map: &DictMap<T>, value: &T) -> FoldedRefs {
    map.range(DictKey::folded_lower_bound(value.clone())..)
        .take_while(|(key, _)| key.value().cmp_folded(value) == Ordering::Equal)
        .map(|(_, entry)| entry.entry_ref)
        .collect()
}
