//! The enum store writer
//!
//! `EnumStore<T>` deduplicates values of type `T`: every distinct value is
//! stored once, found through an ordered dictionary, and reference counted
//! by its external holders.
//!
//! # Ownership
//!
//! The store value is the single writer: every mutation takes `&mut self`.
//! Readers on other threads use `EnumStoreReader` handles and only see what
//! the writer published with `commit`.
//!
//! # Lifecycle of a value
//!
//! ```text
//! insert ──▶ live (ref count > 0)
//!   dec_ref_count to 0 ──▶ unused (still in the dictionary)
//!   free_unused_values ──▶ held (removed, still readable)
//!   commit, once no reader is older ──▶ slot reusable
//! ```

use enumstore_core::{
    AddressSpace, CompactionStrategy, EntryRef, EnumValue, Error, Generation, MemoryUsage,
    Result, StoreConfig, ValueCodec,
};
use enumstore_datastore::{DataStore, GenerationHandler};
use enumstore_dictionary::{AddResult, DictionaryKind, EnumDictionary, FoldedRefs};
use rustc_hash::FxHashSet;
use std::cmp::Ordering;
use std::io::Write;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::batch::BatchUpdater;
use crate::compaction::{CompactionNeed, EnumIndexRemapper};
use crate::enumerator::Enumerator;
use crate::loader::{decode_unique_values, EnumeratedLoader, NonEnumeratedLoader};
use crate::reader::{EnumStoreReader, Published, ReadSnapshot};

/// Deduplicating, ordered value store with concurrent readers
pub struct EnumStore<T> {
    config: StoreConfig,
    values: DataStore<T>,
    dictionary: EnumDictionary<T>,
    generations: Arc<GenerationHandler>,
    published: Arc<Published<T>>,
    /// Writer's own reference to what `published` points at
    last_published: Arc<ReadSnapshot<T>>,
    /// Values-only usage as of the last `update_stat`
    cached_values_memory: MemoryUsage,
    cached_address_space: AddressSpace,
}

impl<T: EnumValue> EnumStore<T> {
    /// Create a store with the default configuration
    pub fn new(kind: DictionaryKind) -> Self {
        Self::create(StoreConfig::default(), kind)
    }

    /// Create a store with a custom configuration
    pub fn with_config(config: StoreConfig, kind: DictionaryKind) -> Result<Self> {
        config.validate()?;
        Ok(Self::create(config, kind))
    }

    fn create(config: StoreConfig, kind: DictionaryKind) -> Self {
        let values = DataStore::new(config.clone());
        let dictionary = EnumDictionary::new(kind);
        let snapshot = Arc::new(ReadSnapshot::new(dictionary.freeze(), values.view()));
        let cached_values_memory = values.memory_usage();
        let cached_address_space = values.address_space_usage();
        EnumStore {
            config,
            values,
            dictionary,
            generations: Arc::new(GenerationHandler::new()),
            published: Arc::new(Published::new(Arc::clone(&snapshot))),
            last_published: snapshot,
            cached_values_memory,
            cached_address_space,
        }
    }

    /// Configuration in use
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Capabilities of the dictionary
    pub fn kind(&self) -> DictionaryKind {
        self.dictionary.kind()
    }

    /// Number of distinct values
    pub fn len(&self) -> usize {
        self.dictionary.len()
    }

    /// Check if no value is present
    pub fn is_empty(&self) -> bool {
        self.dictionary.is_empty()
    }

    /// Underlying slot allocator
    pub fn data_store(&self) -> &DataStore<T> {
        &self.values
    }

    // ========================================================================
    // Insert and lookup
    // ========================================================================

    /// Insert a value and take a reference to it
    ///
    /// Returns the existing reference when an equal value is present; either
    /// way the reference count goes up by one.
    pub fn insert(&mut self, value: &T) -> Result<EntryRef> {
        let added = self.dictionary.add(&mut self.values, value)?;
        self.values.inc_ref_count(added.entry_ref);
        Ok(added.entry_ref)
    }

    /// Find or store a value without touching its reference count
    pub fn add(&mut self, value: &T) -> Result<AddResult> {
        self.dictionary.add(&mut self.values, value)
    }

    /// Find a value in the live dictionary
    pub fn find_index(&self, value: &T) -> Option<EntryRef> {
        self.dictionary.find_index(value)
    }

    /// Find a value in the last published dictionary
    pub fn find_frozen_index(&self, value: &T) -> Option<EntryRef> {
        self.last_published.dictionary.find_index(value)
    }

    /// Resolve a reference
    ///
    /// # Panics
    ///
    /// If the reference does not point at a value.
    pub fn get_value(&self, entry_ref: EntryRef) -> &T {
        self.values.get(entry_ref)
    }

    /// Resolve a reference, `None` if it does not point at a value
    pub fn try_get_value(&self, entry_ref: EntryRef) -> Option<&T> {
        self.values.try_get(entry_ref)
    }

    /// All values folded-equal to `value`, ascending order
    pub fn find_folded_enums(&self, value: &T) -> FoldedRefs {
        self.dictionary.find_matching_folded(value)
    }

    /// Check if `b` starts a new folded class after `a`
    ///
    /// # Panics
    ///
    /// If `b` folds before `a`: the refs were not taken in dictionary order.
    pub fn folded_change(&self, a: EntryRef, b: EntryRef) -> bool {
        let ordering = self.get_value(a).cmp_folded(self.get_value(b));
        assert_ne!(
            ordering,
            Ordering::Greater,
            "folded order violated between {:?} and {:?}",
            a,
            b
        );
        ordering == Ordering::Less
    }

    /// Find a value's reference and posting list
    pub fn find_posting_list(&self, value: &T) -> Result<Option<(EntryRef, EntryRef)>> {
        self.dictionary.find_posting_list(value)
    }

    /// Set the posting list of a value, returning whether it was found
    pub fn update_posting_list(&mut self, value: &T, posting: EntryRef) -> Result<bool> {
        self.dictionary.update_posting_list(value, posting)
    }

    /// Iterate values and their references in ascending order
    pub fn iter(&self) -> impl Iterator<Item = (&T, EntryRef)> + '_ {
        self.dictionary.iter()
    }

    // ========================================================================
    // Reference counts
    // ========================================================================

    /// Reference count of a value
    pub fn get_ref_count(&self, entry_ref: EntryRef) -> u32 {
        self.values.ref_count(entry_ref)
    }

    /// Take another reference to a value
    pub fn inc_ref_count(&mut self, entry_ref: EntryRef) -> u32 {
        self.values.inc_ref_count(entry_ref)
    }

    /// Drop a reference to a value
    ///
    /// A value whose count reaches 0 stays in the dictionary until
    /// `free_unused_values`.
    ///
    /// # Panics
    ///
    /// On underflow.
    pub fn dec_ref_count(&mut self, entry_ref: EntryRef) -> u32 {
        self.values.dec_ref_count(entry_ref)
    }

    /// Overwrite the reference count of a value
    pub fn set_ref_count(&mut self, entry_ref: EntryRef, count: u32) {
        self.values.set_ref_count(entry_ref, count)
    }

    /// Remove every value nobody references
    pub fn free_unused_values(&mut self) -> usize {
        self.dictionary.free_unused(&mut self.values)
    }

    /// Remove the candidates nobody references
    pub fn free_unused_values_in(&mut self, candidates: &FxHashSet<EntryRef>) -> usize {
        self.dictionary.free_unused_in(&mut self.values, candidates)
    }

    // ========================================================================
    // Generations
    // ========================================================================

    /// Tag everything held in the active generation with `generation`
    pub fn transfer_hold_lists(&mut self, generation: Generation) {
        self.values.transfer_hold_lists(generation);
    }

    /// Reclaim holds tagged strictly below `first_used`
    pub fn trim_hold_lists(&mut self, first_used: Generation) {
        self.values.trim_hold_lists(first_used);
    }

    /// Publish the current state to readers and reclaim what they released
    ///
    /// Returns the new generation.
    pub fn commit(&mut self) -> Generation {
        let snapshot = Arc::new(ReadSnapshot::new(self.dictionary.freeze(), self.values.view()));
        self.published.publish(Arc::clone(&snapshot));
        self.last_published = snapshot;

        let current = self.generations.current_generation();
        self.values.transfer_hold_lists(current);
        self.published.transfer_hold_lists(current);
        let next = self.generations.inc_generation();
        let first_used = self.generations.first_used_generation();
        self.values.trim_hold_lists(first_used);
        self.published.trim_hold_lists(first_used);
        next
    }

    /// Current writer generation
    pub fn generation(&self) -> Generation {
        self.generations.current_generation()
    }

    /// Reader tracking shared with every `EnumStoreReader`
    pub fn generation_handler(&self) -> &Arc<GenerationHandler> {
        &self.generations
    }

    /// Handle for reading from other threads
    pub fn reader(&self) -> EnumStoreReader<T> {
        EnumStoreReader::new(Arc::clone(&self.published), Arc::clone(&self.generations))
    }

    // ========================================================================
    // Statistics and compaction
    // ========================================================================

    /// Recompute usage statistics
    ///
    /// Caches the values' memory and address-space usage for
    /// `consider_compact` and returns memory usage including the dictionary.
    pub fn update_stat(&mut self) -> MemoryUsage {
        self.cached_values_memory = self.values.memory_usage();
        self.cached_address_space = self.values.address_space_usage();
        let mut usage = self.cached_values_memory;
        usage.merge(&self.dictionary.memory_usage());
        usage
    }

    /// Values memory usage as of the last `update_stat`
    pub fn values_memory_usage(&self) -> MemoryUsage {
        self.cached_values_memory
    }

    /// Address-space usage as of the last `update_stat`
    pub fn address_space_usage(&self) -> AddressSpace {
        self.cached_address_space
    }

    /// Compact if the cached statistics cross the strategy's thresholds
    ///
    /// Returns `None` when nothing was compacted.
    pub fn consider_compact(
        &mut self,
        strategy: &CompactionStrategy,
    ) -> Result<Option<EnumIndexRemapper>> {
        let need = CompactionNeed::evaluate(
            &self.config,
            strategy,
            &self.cached_values_memory,
            &self.cached_address_space,
        );
        if !need.any() {
            return Ok(None);
        }
        debug!(
            target: "enumstore::compaction",
            memory = need.memory,
            address_space = need.address_space,
            dead_bytes = self.cached_values_memory.dead_bytes,
            dead_entries = self.cached_address_space.dead(),
            "Compaction threshold crossed"
        );
        let remapper = self.compact_worst(need.memory, need.address_space)?;
        if remapper.compacted_buffers().is_empty() {
            return Ok(None);
        }
        Ok(Some(remapper))
    }

    /// Move live values out of the worst buffers
    ///
    /// Values move in ascending dictionary order. The dictionary is updated;
    /// every other holder of references must apply the returned remap before
    /// `finish_compact`.
    pub fn compact_worst(
        &mut self,
        compact_memory: bool,
        compact_address_space: bool,
    ) -> Result<EnumIndexRemapper> {
        let mut remapper = self
            .values
            .start_compact_worst_buffers(compact_memory, compact_address_space)?;
        let moved = self.dictionary.move_entries(&mut self.values, &mut remapper)?;
        let remapper = EnumIndexRemapper::new(remapper, moved);
        if !remapper.compacted_buffers().is_empty() {
            info!(
                target: "enumstore::compaction",
                moved,
                buffers = ?remapper.compacted_buffers(),
                "Moved values out of compacted buffers"
            );
        }
        Ok(remapper)
    }

    /// Hand the compacted buffers to the hold list
    ///
    /// They are freed by a later `commit` once no reader can use them.
    pub fn finish_compact(&mut self, remapper: EnumIndexRemapper) {
        self.values.finish_compact(remapper.inner());
    }

    // ========================================================================
    // Enumeration and bulk paths
    // ========================================================================

    /// Number the values `1..=len` in dictionary order
    pub fn make_enumerator(&self) -> Enumerator {
        Enumerator::new(self.dictionary.refs())
    }

    /// Start a batch of inserts and reference count changes
    pub fn batch_updater(&mut self) -> BatchUpdater<'_, T> {
        BatchUpdater::new(self)
    }

    /// Start loading ascending values with reference counts
    ///
    /// Requires an empty store.
    pub fn make_non_enumerated_loader(&mut self) -> Result<NonEnumeratedLoader<'_, T>> {
        if !self.is_empty() {
            return Err(Error::NotEmpty);
        }
        Ok(NonEnumeratedLoader::new(self))
    }

    pub(crate) fn allocate_value(&mut self, value: T) -> Result<EntryRef> {
        self.values.allocate(value)
    }

    pub(crate) fn discard_values(&mut self, refs: &[EntryRef]) {
        for &entry_ref in refs {
            self.values.hold(entry_ref);
        }
    }

    pub(crate) fn build_dictionary(&mut self, refs: &[EntryRef]) {
        self.dictionary.build(&self.values, refs);
    }
}

impl<T: EnumValue + ValueCodec> EnumStore<T> {
    /// Write the raw record of one value
    pub fn write_value<W: Write + ?Sized>(
        &self,
        writer: &mut W,
        entry_ref: EntryRef,
    ) -> Result<()> {
        let value = self
            .values
            .try_get(entry_ref)
            .ok_or(Error::InvalidRef(entry_ref))?;
        value.write_to(writer)?;
        Ok(())
    }

    /// Write every value in dictionary order
    ///
    /// The output is what `load_unique_values` reads back. Returns the
    /// number of values written.
    pub fn save_unique_values<W: Write + ?Sized>(&self, writer: &mut W) -> Result<usize> {
        let mut count = 0;
        for (value, _) in self.dictionary.iter() {
            value.write_to(writer)?;
            count += 1;
        }
        debug!(target: "enumstore::load", values = count, "Saved unique values");
        Ok(count)
    }

    /// Load values saved by `save_unique_values` into an empty store
    ///
    /// Every record is decoded and order-checked before anything is stored,
    /// so a corrupt buffer leaves the store unchanged. Loaded values have a
    /// reference count of 0. Returns their references in load order.
    pub fn load_unique_values(&mut self, src: &[u8]) -> Result<Vec<EntryRef>> {
        if !self.is_empty() {
            return Err(Error::NotEmpty);
        }
        let decoded = decode_unique_values::<T>(src).map_err(|err| {
            warn!(
                target: "enumstore::load",
                error = %err,
                bytes = src.len(),
                "Rejected unique values"
            );
            err
        })?;

        let mut refs = Vec::with_capacity(decoded.len());
        for value in decoded {
            match self.values.allocate(value) {
                Ok(entry_ref) => refs.push(entry_ref),
                Err(err) => {
                    self.discard_values(&refs);
                    return Err(err);
                }
            }
        }
        self.dictionary.build(&self.values, &refs);
        info!(
            target: "enumstore::load",
            values = refs.len(),
            bytes = src.len(),
            "Loaded unique values"
        );
        Ok(refs)
    }

    /// Start loading saved unique values followed by enum value uses
    ///
    /// Requires an empty store.
    pub fn make_enumerated_loader(&mut self) -> Result<EnumeratedLoader<'_, T>> {
        if !self.is_empty() {
            return Err(Error::NotEmpty);
        }
        Ok(EnumeratedLoader::new(self))
    }
}

impl<T: EnumValue> Default for EnumStore<T> {
    fn default() -> Self {
        Self::new(DictionaryKind::default())
    }
}

impl<T> std::fmt::Debug for EnumStore<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnumStore")
            .field("generation", &self.generations.current_generation())
            .field("values", &self.values)
            .finish()
    }
}
