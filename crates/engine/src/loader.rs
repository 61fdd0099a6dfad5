//! Bulk loading
//!
//! Two ways to populate an empty store:
//!
//! - `EnumeratedLoader`: the saved unique values (see
//!   `EnumStore::save_unique_values`) followed by the 1-based enum value of
//!   every use. Reference counts come from counting the uses.
//! - `NonEnumeratedLoader`: raw values in ascending order, each with a
//!   reference count. Equal neighbours are merged.
//!
//! Both build the dictionary in one pass from sorted input instead of
//! inserting value by value.

use enumstore_core::{DecodeError, EntryRef, EnumValue, Error, Generation, Result, ValueCodec};
use rustc_hash::FxHashSet;
use std::cmp::Ordering;
use tracing::info;

use crate::store::EnumStore;

/// Decode a unique-values buffer
///
/// Each record must be strictly greater than the one before it; only the
/// immediate predecessor is compared.
pub(crate) fn decode_unique_values<T: EnumValue + ValueCodec>(src: &[u8]) -> Result<Vec<T>> {
    let mut values: Vec<T> = Vec::new();
    let mut offset = 0;
    while offset < src.len() {
        let (value, consumed) = T::read_from(&src[offset..]).map_err(|err| match err {
            DecodeError::Truncated { needed } => Error::Truncated {
                offset,
                needed,
                available: src.len() - offset,
            },
            DecodeError::Malformed(reason) => Error::Malformed { offset, reason },
        })?;
        if let Some(prev) = values.last() {
            if prev.cmp_primary(&value) != Ordering::Less {
                return Err(Error::OutOfOrder {
                    record: values.len(),
                });
            }
        }
        values.push(value);
        offset += consumed;
    }
    Ok(values)
}

// ============================================================================
// Enumerated
// ============================================================================

/// Loads saved unique values, then counts their uses
pub struct EnumeratedLoader<'a, T: EnumValue + ValueCodec> {
    store: &'a mut EnumStore<T>,
    refs: Vec<EntryRef>,
    histogram: Vec<u32>,
    uses: usize,
}

impl<'a, T: EnumValue + ValueCodec> EnumeratedLoader<'a, T> {
    pub(crate) fn new(store: &'a mut EnumStore<T>) -> Self {
        EnumeratedLoader {
            store,
            refs: Vec::new(),
            histogram: Vec::new(),
            uses: 0,
        }
    }

    /// Load the unique values; returns how many were loaded
    pub fn load_unique_values(&mut self, src: &[u8]) -> Result<usize> {
        self.refs = self.store.load_unique_values(src)?;
        self.histogram = vec![0; self.refs.len()];
        Ok(self.refs.len())
    }

    /// References of the loaded values, in enum order
    pub fn enum_refs(&self) -> &[EntryRef] {
        &self.refs
    }

    /// Count one use of a 1-based enum value
    pub fn add_use(&mut self, enum_value: u32) -> Result<()> {
        let record = self.uses;
        let slot = enum_value
            .checked_sub(1)
            .and_then(|index| self.histogram.get_mut(index as usize))
            .ok_or(Error::InvalidEnumValue(enum_value))?;
        *slot = slot
            .checked_add(1)
            .ok_or(Error::CountOverflow { record })?;
        self.uses += 1;
        Ok(())
    }

    /// Set reference counts from the counted uses and drop unused values
    ///
    /// Publishes the loaded state. Returns the new generation and the
    /// number of values dropped.
    pub fn finish(self) -> (Generation, usize) {
        let mut unused = FxHashSet::default();
        for (&entry_ref, &count) in self.refs.iter().zip(&self.histogram) {
            self.store.set_ref_count(entry_ref, count);
            if count == 0 {
                unused.insert(entry_ref);
            }
        }
        let freed = self.store.free_unused_values_in(&unused);
        info!(
            target: "enumstore::load",
            values = self.refs.len() - freed,
            unused = freed,
            "Enumerated load finished"
        );
        (self.store.commit(), freed)
    }
}

// ============================================================================
// Non-enumerated
// ============================================================================

/// Loads ascending raw values with reference counts
///
/// Dropping the loader without `finish` discards what was loaded.
pub struct NonEnumeratedLoader<'a, T: EnumValue> {
    store: &'a mut EnumStore<T>,
    refs: Vec<EntryRef>,
    counts: Vec<u32>,
    records: usize,
}

impl<'a, T: EnumValue> NonEnumeratedLoader<'a, T> {
    pub(crate) fn new(store: &'a mut EnumStore<T>) -> Self {
        NonEnumeratedLoader {
            store,
            refs: Vec::new(),
            counts: Vec::new(),
            records: 0,
        }
    }

    /// Add a value with its reference count
    ///
    /// A value equal to the previous one adds to its count. A value less
    /// than the previous one is `Error::OutOfOrder`; a merged count above
    /// `u32::MAX` is `Error::CountOverflow`.
    pub fn insert(&mut self, value: &T, ref_count: u32) -> Result<EntryRef> {
        let record = self.records;
        self.records += 1;
        if let Some(&last) = self.refs.last() {
            match self.store.get_value(last).cmp_primary(value) {
                Ordering::Less => {}
                Ordering::Equal => {
                    if let Some(count) = self.counts.last_mut() {
                        *count = count
                            .checked_add(ref_count)
                            .ok_or(Error::CountOverflow { record })?;
                    }
                    return Ok(last);
                }
                Ordering::Greater => return Err(Error::OutOfOrder { record }),
            }
        }
        if let Some(reason) = value.unstorable_reason() {
            return Err(Error::InvalidValue(reason));
        }
        let entry_ref = self.store.allocate_value(value.clone())?;
        self.refs.push(entry_ref);
        self.counts.push(ref_count);
        Ok(entry_ref)
    }

    /// Build the dictionary and publish
    ///
    /// Values whose total count is 0 are dropped. Returns the new generation
    /// and the number of values kept.
    pub fn finish(mut self) -> (Generation, usize) {
        let refs = std::mem::take(&mut self.refs);
        let counts = std::mem::take(&mut self.counts);
        self.store.build_dictionary(&refs);

        let mut unused = FxHashSet::default();
        for (&entry_ref, &count) in refs.iter().zip(&counts) {
            self.store.set_ref_count(entry_ref, count);
            if count == 0 {
                unused.insert(entry_ref);
            }
        }
        let freed = self.store.free_unused_values_in(&unused);
        info!(
            target: "enumstore::load",
            records = self.records,
            values = refs.len() - freed,
            "Non-enumerated load finished"
        );
        (self.store.commit(), refs.len() - freed)
    }
}

impl<'a, T: EnumValue> Drop for NonEnumeratedLoader<'a, T> {
    fn drop(&mut self) {
        if !self.refs.is_empty() {
            let refs = std::mem::take(&mut self.refs);
            self.store.discard_values(&refs);
        }
    }
}
