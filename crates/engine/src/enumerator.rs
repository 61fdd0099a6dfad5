//! Dense enum values for saving per-document references
//!
//! An `Enumerator` numbers the values of a dictionary snapshot `1..=len` in
//! ascending order. Saved data refers to values by these numbers, which stay
//! meaningful after a reload even though `EntryRef`s do not.

use enumstore_core::EntryRef;
use rustc_hash::FxHashMap;

/// Mapping between `EntryRef`s and dense 1-based enum values
#[derive(Debug, Clone, Default)]
pub struct Enumerator {
    refs: Vec<EntryRef>,
    enums: FxHashMap<EntryRef, u32>,
}

impl Enumerator {
    /// Number references in the order given
    pub fn new(refs: Vec<EntryRef>) -> Self {
        let enums = refs
            .iter()
            .enumerate()
            .map(|(i, &entry_ref)| (entry_ref, i as u32 + 1))
            .collect();
        Enumerator { refs, enums }
    }

    /// Enum value of a reference
    pub fn enum_value(&self, entry_ref: EntryRef) -> Option<u32> {
        self.enums.get(&entry_ref).copied()
    }

    /// Reference behind an enum value
    pub fn entry_ref(&self, enum_value: u32) -> Option<EntryRef> {
        let index = enum_value.checked_sub(1)? as usize;
        self.refs.get(index).copied()
    }

    /// References in enum order
    pub fn refs(&self) -> &[EntryRef] {
        &self.refs
    }

    /// Number of enumerated values
    pub fn len(&self) -> usize {
        self.refs.len()
    }

    /// Check if nothing was enumerated
    pub fn is_empty(&self) -> bool {
        self.refs.is_empty()
    }
}
