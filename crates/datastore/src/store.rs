//! Typed slot allocator
//!
//! `DataStore<T>` owns the backing buffers and hands out `EntryRef`s to
//! stored values. It is owned by exactly one writer; readers only ever see
//! `DataStoreView`s.
//!
//! # Design
//!
//! - Values are appended to the primary buffer; when it is full a new buffer
//!   with twice the capacity (up to the configured maximum) becomes primary.
//! - Each slot carries a reference count, kept in a writer-only side table.
//! - `hold` never frees immediately: the slot goes on the generation hold
//!   list and becomes reusable (free list) once trimmed.
//! - Compaction moves live entries out of the worst buffers into fresh slots
//!   at the end of the primary buffer; the emptied buffers are then held as
//!   a whole and freed on trim.
//!
//! # Accounting
//!
//! Every slot handed out is `used`; a used slot is live, held or dead. Dead
//! slots are reused from the free list. Byte counts use
//! `size_of::<T>() + size_of::<u32>()` per slot plus `EnumValue::heap_bytes`.

use enumstore_core::{
    AddressSpace, EntryRef, EnumValue, Error, Generation, MemoryUsage, Result, StoreConfig,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::buffer::{read_slot, write_slot, BufferData, BufferState, BufferStatus};
use crate::hold_list::GenerationHoldList;
use crate::remap::EntryRefRemapper;
use crate::view::DataStoreView;

/// Something released by trimming the hold list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HoldItem {
    /// A single slot, with the heap bytes its value owned
    Entry { entry_ref: EntryRef, heap_bytes: usize },
    /// A whole buffer emptied by compaction
    Buffer(u32),
}

/// Typed slot allocator with deferred reclamation
pub struct DataStore<T> {
    config: StoreConfig,
    states: Vec<BufferState>,
    data: Vec<Option<BufferData<T>>>,
    /// Reference count per used slot, indexed like `data`
    ref_counts: Vec<Vec<u32>>,
    /// Buffer new values are appended to
    primary: u32,
    /// Capacity of the next buffer to activate
    next_capacity: u32,
    free_list: Vec<EntryRef>,
    hold_list: GenerationHoldList<HoldItem>,
}

impl<T: EnumValue> DataStore<T> {
    /// Create a data store
    ///
    /// The configuration is assumed valid (see `StoreConfig::validate`).
    pub fn new(config: StoreConfig) -> Self {
        let mut store = DataStore {
            next_capacity: config.initial_buffer_entries,
            config,
            states: Vec::new(),
            data: Vec::new(),
            ref_counts: Vec::new(),
            primary: 0,
            free_list: Vec::new(),
            hold_list: GenerationHoldList::new(),
        };
        store.activate_buffer(0);
        store
    }

    /// Bytes accounted per slot
    #[inline]
    pub fn entry_size() -> usize {
        std::mem::size_of::<T>() + std::mem::size_of::<u32>()
    }

    /// Configuration in use
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    // ========================================================================
    // Allocation and access
    // ========================================================================

    /// Copy a value into the store and return its reference
    ///
    /// Reuses a reclaimed slot when one is available. The new entry has a
    /// reference count of 0.
    pub fn allocate(&mut self, value: T) -> Result<EntryRef> {
        if let Some(entry_ref) = self.free_list.pop() {
            let buffer = entry_ref.buffer_id() as usize;
            self.states[buffer].reuse_dead_slot(value.heap_bytes());
            self.store_slot(entry_ref, Some(value));
            self.ref_counts[buffer][entry_ref.offset() as usize] = 0;
            return Ok(entry_ref);
        }
        self.allocate_fresh(value)
    }

    /// Append a value to the primary buffer, never reusing a slot
    pub fn allocate_fresh(&mut self, value: T) -> Result<EntryRef> {
        if !self.states[self.primary as usize].has_room() {
            self.switch_primary_buffer()?;
        }
        let buffer = self.primary;
        let offset = self.states[buffer as usize].push_slot(value.heap_bytes());
        let entry_ref = EntryRef::new(buffer, offset);
        self.store_slot(entry_ref, Some(value));
        self.ref_counts[buffer as usize].push(0);
        Ok(entry_ref)
    }

    /// Resolve a reference, `None` if it does not point at a value
    pub fn try_get(&self, entry_ref: EntryRef) -> Option<&T> {
        if !entry_ref.valid() {
            return None;
        }
        let data = self.data.get(entry_ref.buffer_id() as usize)?.as_ref()?;
        read_slot(data, entry_ref.offset())
    }

    /// Resolve a reference
    ///
    /// # Panics
    ///
    /// If the reference does not point at a value. Passing a reference that
    /// was never handed out, or was already reclaimed, is a caller bug.
    pub fn get(&self, entry_ref: EntryRef) -> &T {
        self.try_get(entry_ref)
            .unwrap_or_else(|| panic!("entry reference {:?} does not point at a value", entry_ref))
    }

    /// Take an immutable view of all buffers
    pub fn view(&self) -> DataStoreView<T> {
        DataStoreView::new(self.data.iter().cloned().collect())
    }

    // ========================================================================
    // Reference counts
    // ========================================================================

    /// Reference count of an entry
    pub fn ref_count(&self, entry_ref: EntryRef) -> u32 {
        self.ref_counts
            .get(entry_ref.buffer_id() as usize)
            .and_then(|counts| counts.get(entry_ref.offset() as usize))
            .copied()
            .unwrap_or(0)
    }

    /// Increment the reference count of an entry
    pub fn inc_ref_count(&mut self, entry_ref: EntryRef) -> u32 {
        let count = self.ref_count_mut(entry_ref);
        *count += 1;
        *count
    }

    /// Decrement the reference count of an entry
    ///
    /// # Panics
    ///
    /// If the count is already 0: the holders' bookkeeping is corrupt.
    pub fn dec_ref_count(&mut self, entry_ref: EntryRef) -> u32 {
        let count = self.ref_count_mut(entry_ref);
        assert!(*count > 0, "reference count underflow for {:?}", entry_ref);
        *count -= 1;
        *count
    }

    /// Overwrite the reference count of an entry
    pub fn set_ref_count(&mut self, entry_ref: EntryRef, count: u32) {
        *self.ref_count_mut(entry_ref) = count;
    }

    fn ref_count_mut(&mut self, entry_ref: EntryRef) -> &mut u32 {
        self.ref_counts
            .get_mut(entry_ref.buffer_id() as usize)
            .and_then(|counts| counts.get_mut(entry_ref.offset() as usize))
            .unwrap_or_else(|| panic!("entry reference {:?} has no reference count", entry_ref))
    }

    // ========================================================================
    // Deferred reclamation
    // ========================================================================

    /// Put a slot on the active generation's hold list
    ///
    /// The value stays readable until the hold is trimmed.
    pub fn hold(&mut self, entry_ref: EntryRef) {
        let heap_bytes = self.get(entry_ref).heap_bytes();
        self.states[entry_ref.buffer_id() as usize].hold_slot(heap_bytes);
        self.hold_list.hold(HoldItem::Entry {
            entry_ref,
            heap_bytes,
        });
    }

    /// Tag everything held in the active generation with `generation`
    pub fn transfer_hold_lists(&mut self, generation: Generation) {
        self.hold_list.transfer(generation);
    }

    /// Reclaim every hold tagged strictly below `first_used`
    ///
    /// `first_used` must be a lower bound on the generation of every reader
    /// that may still use a held reference.
    pub fn trim_hold_lists(&mut self, first_used: Generation) {
        let released = self.hold_list.trim(first_used);
        if released.is_empty() {
            return;
        }
        let (mut entries, mut buffers) = (0usize, 0usize);
        for item in released {
            match item {
                HoldItem::Entry {
                    entry_ref,
                    heap_bytes,
                } => {
                    entries += 1;
                    self.release_entry(entry_ref, heap_bytes);
                }
                HoldItem::Buffer(buffer_id) => {
                    buffers += 1;
                    self.free_buffer(buffer_id);
                }
            }
        }
        debug!(
            target: "enumstore::datastore",
            first_used,
            entries,
            buffers,
            "Trimmed hold lists"
        );
    }

    fn release_entry(&mut self, entry_ref: EntryRef, heap_bytes: usize) {
        let buffer = entry_ref.buffer_id() as usize;
        let state = &mut self.states[buffer];
        state.release_held_slot(heap_bytes);
        // Slots in buffers on their way out are never handed out again
        if state.status() == BufferStatus::Active && !state.is_compacting() {
            self.store_slot(entry_ref, None);
            self.ref_counts[buffer][entry_ref.offset() as usize] = 0;
            self.free_list.push(entry_ref);
        }
    }

    /// Number of holds not yet trimmed, pending ones included
    pub fn held_entries(&self) -> usize {
        self.hold_list.pending_len() + self.hold_list.held_len()
    }

    /// Number of reclaimed slots waiting for reuse
    pub fn free_list_len(&self) -> usize {
        self.free_list.len()
    }

    // ========================================================================
    // Compaction support
    // ========================================================================

    /// Select the worst buffers and mark them as compacting
    ///
    /// Picks the buffer with most dead bytes when `compact_memory` is set and
    /// the one with most dead entries when `compact_address_space` is set.
    /// Returns a remapper covering the selected buffers (possibly none).
    ///
    /// Fails with `Error::AddressSpaceExhausted`, changing nothing, when the
    /// live entries of the selected buffers would not fit in fresh slots.
    pub fn start_compact_worst_buffers(
        &mut self,
        compact_memory: bool,
        compact_address_space: bool,
    ) -> Result<EntryRefRemapper> {
        let mut selected: Vec<u32> = Vec::with_capacity(2);
        if compact_memory {
            if let Some(id) = self.worst_buffer(|state| Self::dead_bytes(state)) {
                selected.push(id);
            }
        }
        if compact_address_space {
            if let Some(id) = self.worst_buffer(|state| state.dead() as usize) {
                if !selected.contains(&id) {
                    selected.push(id);
                }
            }
        }

        if selected.is_empty() {
            return Ok(EntryRefRemapper::default());
        }
        let needed: u64 = selected
            .iter()
            .map(|&id| u64::from(self.states[id as usize].live()))
            .sum();
        let room = self.fresh_room(&selected, needed);
        if room < needed {
            warn!(
                target: "enumstore::compaction",
                buffers = ?selected,
                needed,
                room,
                "Not enough room to compact"
            );
            return Err(Error::AddressSpaceExhausted {
                buffers: self.config.max_buffers,
            });
        }
        if selected.contains(&self.primary) {
            self.switch_primary_buffer()?;
        }
        for &id in &selected {
            self.states[id as usize].set_compacting();
        }
        self.free_list
            .retain(|entry_ref| !selected.contains(&entry_ref.buffer_id()));

        info!(
            target: "enumstore::compaction",
            buffers = ?selected,
            compact_memory,
            compact_address_space,
            "Compacting buffers"
        );
        Ok(EntryRefRemapper::new(
            selected
                .iter()
                .map(|&id| (id, self.states[id as usize].used())),
        ))
    }

    /// Move a live entry to a fresh slot, keeping its reference count
    ///
    /// The old slot keeps its value for readers until the buffer is freed.
    pub fn move_entry(&mut self, old: EntryRef) -> Result<EntryRef> {
        let value = self
            .try_get(old)
            .cloned()
            .ok_or(Error::InvalidRef(old))?;
        let heap_bytes = value.heap_bytes();
        let count = self.ref_count(old);
        let new = self.allocate_fresh(value)?;
        self.set_ref_count(new, count);
        self.set_ref_count(old, 0);
        self.states[old.buffer_id() as usize].moved_out(heap_bytes);
        Ok(new)
    }

    /// Put the buffers covered by `remapper` on the hold list
    pub fn finish_compact(&mut self, remapper: &EntryRefRemapper) {
        for buffer_id in remapper.compacted_buffers() {
            let state = &mut self.states[buffer_id as usize];
            if state.status() != BufferStatus::Active || !state.is_compacting() {
                continue;
            }
            state.on_hold();
            self.hold_list.hold(HoldItem::Buffer(buffer_id));
        }
    }

    /// Fresh slots `allocate_fresh` can hand out while `excluded` is
    /// compacting, counted up to `needed`
    fn fresh_room(&self, excluded: &[u32], needed: u64) -> u64 {
        let mut room = 0u64;
        if !excluded.contains(&self.primary) {
            let primary = &self.states[self.primary as usize];
            room += u64::from(primary.capacity() - primary.used());
        }
        let free = self
            .states
            .iter()
            .filter(|state| state.status() == BufferStatus::Free)
            .count();
        let unborn = (self.config.max_buffers as usize).saturating_sub(self.states.len());
        let mut capacity = self.next_capacity;
        for _ in 0..free + unborn {
            if room >= needed {
                break;
            }
            room += u64::from(capacity);
            capacity = capacity
                .saturating_mul(2)
                .min(self.config.max_entries_per_buffer);
        }
        room
    }

    fn worst_buffer(&self, metric: impl Fn(&BufferState) -> usize) -> Option<u32> {
        self.states
            .iter()
            .enumerate()
            .filter(|(_, state)| state.status() == BufferStatus::Active && !state.is_compacting())
            .map(|(id, state)| (metric(state), id as u32))
            .filter(|(dead, _)| *dead > 0)
            .max()
            .map(|(_, id)| id)
    }

    fn dead_bytes(state: &BufferState) -> usize {
        state.dead() as usize * Self::entry_size()
    }

    // ========================================================================
    // Accounting
    // ========================================================================

    /// Byte accounting over all buffers
    pub fn memory_usage(&self) -> MemoryUsage {
        let entry_size = Self::entry_size();
        let mut usage = MemoryUsage::default();
        for state in &self.states {
            let allocated = state.capacity() as usize * entry_size + state.extra_used_bytes();
            let used = state.used() as usize * entry_size + state.extra_used_bytes();
            match state.status() {
                BufferStatus::Free => {}
                BufferStatus::Active => {
                    usage.allocated_bytes += allocated;
                    usage.used_bytes += used;
                    usage.dead_bytes += state.dead() as usize * entry_size;
                    usage.allocated_bytes_on_hold +=
                        state.hold() as usize * entry_size + state.extra_hold_bytes();
                }
                BufferStatus::Hold => {
                    usage.allocated_bytes += allocated;
                    usage.used_bytes += used;
                    usage.dead_bytes += used;
                    usage.allocated_bytes_on_hold += allocated;
                }
            }
        }
        usage
    }

    /// Address-space accounting over all buffers
    pub fn address_space_usage(&self) -> AddressSpace {
        let (mut used, mut dead) = (0usize, 0usize);
        for state in &self.states {
            match state.status() {
                BufferStatus::Free => {}
                BufferStatus::Active => {
                    used += state.used() as usize;
                    dead += state.dead() as usize;
                }
                BufferStatus::Hold => {
                    used += state.used() as usize;
                    dead += state.used() as usize;
                }
            }
        }
        AddressSpace::new(used, dead, self.config.address_space_limit())
    }

    /// State of one buffer
    pub fn buffer_state(&self, buffer_id: u32) -> Option<&BufferState> {
        self.states.get(buffer_id as usize)
    }

    /// Id of the buffer new values are appended to
    pub fn primary_buffer_id(&self) -> u32 {
        self.primary
    }

    /// Number of buffers that are not free
    pub fn buffers_in_use(&self) -> usize {
        self.states
            .iter()
            .filter(|state| state.status() != BufferStatus::Free)
            .count()
    }

    // ========================================================================
    // Buffer management
    // ========================================================================

    fn switch_primary_buffer(&mut self) -> Result<()> {
        let id = match self
            .states
            .iter()
            .position(|state| state.status() == BufferStatus::Free)
        {
            Some(id) => id as u32,
            None if (self.states.len() as u32) < self.config.max_buffers => self.states.len() as u32,
            None => {
                return Err(Error::AddressSpaceExhausted {
                    buffers: self.config.max_buffers,
                })
            }
        };
        self.activate_buffer(id);
        debug!(
            target: "enumstore::datastore",
            buffer = id,
            capacity = self.states[id as usize].capacity(),
            "Switched primary buffer"
        );
        Ok(())
    }

    fn activate_buffer(&mut self, id: u32) {
        let index = id as usize;
        if index == self.states.len() {
            self.states.push(BufferState::free());
            self.data.push(None);
            self.ref_counts.push(Vec::new());
        }
        let capacity = self.next_capacity;
        self.next_capacity = capacity
            .saturating_mul(2)
            .min(self.config.max_entries_per_buffer);

        self.states[index].activate(capacity);
        self.data[index] = Some(Arc::new(Vec::new()));
        self.ref_counts[index] = Vec::new();
        if id == 0 {
            // Offset 0 of buffer 0 is the invalid sentinel
            self.states[0].reserve_dead_slot();
            self.ref_counts[0].push(0);
        }
        self.primary = id;
    }

    fn free_buffer(&mut self, buffer_id: u32) {
        let index = buffer_id as usize;
        debug_assert_eq!(self.states[index].status(), BufferStatus::Hold);
        self.states[index] = BufferState::free();
        self.data[index] = None;
        self.ref_counts[index] = Vec::new();
        debug!(target: "enumstore::datastore", buffer = buffer_id, "Freed buffer");
    }

    fn store_slot(&mut self, entry_ref: EntryRef, value: Option<T>) {
        match self.data[entry_ref.buffer_id() as usize].as_mut() {
            Some(data) => write_slot(data, entry_ref.offset(), value),
            None => panic!("write to unbacked buffer {}", entry_ref.buffer_id()),
        }
    }
}

impl<T: EnumValue> Default for DataStore<T> {
    fn default() -> Self {
        Self::new(StoreConfig::default())
    }
}

impl<T> std::fmt::Debug for DataStore<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataStore")
            .field("buffers", &self.states.len())
            .field("primary", &self.primary)
            .field("free_list", &self.free_list.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_store() -> DataStore<u32> {
        DataStore::new(StoreConfig::for_testing())
    }

    // ========================================
    // Allocation
    // ========================================

    #[test]
    fn test_first_ref_skips_sentinel() {
        let mut store = small_store();
        let r = store.allocate(42).unwrap();
        assert!(r.valid());
        assert_eq!(r, EntryRef::new(0, 1));
        assert_eq!(*store.get(r), 42);
        assert_eq!(store.ref_count(r), 0);
    }

    #[test]
    fn test_allocation_switches_buffers_when_full() {
        let mut store = small_store();
        let refs: Vec<_> = (0..100u32).map(|v| store.allocate(v).unwrap()).collect();

        for (v, r) in refs.iter().enumerate() {
            assert_eq!(*store.get(*r), v as u32);
        }
        // 15 + 32 + 53 over buffers of 16, 32 and 64 entries
        assert_eq!(store.buffers_in_use(), 3);
        assert_eq!(refs[15].buffer_id(), 1);
        assert_eq!(refs[47].buffer_id(), 2);
    }

    #[test]
    fn test_address_space_exhaustion() {
        let config = StoreConfig::for_testing()
            .with_initial_buffer_entries(2)
            .with_max_entries_per_buffer(2)
            .with_max_buffers(2);
        let mut store: DataStore<u32> = DataStore::new(config);
        store.allocate(1).unwrap();
        store.allocate(2).unwrap();
        store.allocate(3).unwrap();
        assert!(matches!(
            store.allocate(4),
            Err(Error::AddressSpaceExhausted { buffers: 2 })
        ));
    }

    #[test]
    fn test_try_get_invalid() {
        let store = small_store();
        assert_eq!(store.try_get(EntryRef::INVALID), None);
        assert_eq!(store.try_get(EntryRef::new(0, 5)), None);
        assert_eq!(store.try_get(EntryRef::new(9, 0)), None);
    }

    #[test]
    #[should_panic(expected = "does not point at a value")]
    fn test_get_invalid_panics() {
        let store = small_store();
        store.get(EntryRef::new(0, 3));
    }

    // ========================================
    // Reference counts
    // ========================================

    #[test]
    fn test_ref_counts() {
        let mut store = small_store();
        let r = store.allocate(5).unwrap();
        assert_eq!(store.inc_ref_count(r), 1);
        assert_eq!(store.inc_ref_count(r), 2);
        assert_eq!(store.dec_ref_count(r), 1);
        store.set_ref_count(r, 10);
        assert_eq!(store.ref_count(r), 10);
    }

    #[test]
    #[should_panic(expected = "underflow")]
    fn test_ref_count_underflow_panics() {
        let mut store = small_store();
        let r = store.allocate(5).unwrap();
        store.dec_ref_count(r);
    }

    // ========================================
    // Hold lists
    // ========================================

    #[test]
    fn test_held_slot_not_reused_before_trim() {
        let mut store = small_store();
        let r = store.allocate(7).unwrap();
        store.hold(r);
        store.transfer_hold_lists(3);

        // Still readable and not reusable
        assert_eq!(*store.get(r), 7);
        let other = store.allocate(8).unwrap();
        assert_ne!(other, r);

        store.trim_hold_lists(3);
        assert_eq!(store.free_list_len(), 0);
        assert_eq!(store.try_get(r), Some(&7));

        store.trim_hold_lists(4);
        assert_eq!(store.free_list_len(), 1);
        assert_eq!(store.try_get(r), None);

        let reused = store.allocate(9).unwrap();
        assert_eq!(reused, r);
        assert_eq!(*store.get(reused), 9);
    }

    #[test]
    fn test_hold_accounting() {
        let mut store = small_store();
        let r = store.allocate(7).unwrap();
        let entry = DataStore::<u32>::entry_size();
        let before = store.memory_usage();

        store.hold(r);
        let held = store.memory_usage();
        assert_eq!(held.allocated_bytes_on_hold, entry);
        assert_eq!(held.dead_bytes, before.dead_bytes);

        store.transfer_hold_lists(0);
        store.trim_hold_lists(1);
        let trimmed = store.memory_usage();
        assert_eq!(trimmed.allocated_bytes_on_hold, 0);
        assert_eq!(trimmed.dead_bytes, before.dead_bytes + entry);

        store.allocate(8).unwrap();
        assert_eq!(store.memory_usage().dead_bytes, before.dead_bytes);
    }

    #[test]
    fn test_string_heap_bytes_accounted() {
        let mut store: DataStore<String> = DataStore::new(StoreConfig::for_testing());
        let base = store.memory_usage().used_bytes;
        let r = store.allocate("hello".to_string()).unwrap();
        let entry = DataStore::<String>::entry_size();
        assert_eq!(store.memory_usage().used_bytes, base + entry + 6);

        store.hold(r);
        store.transfer_hold_lists(0);
        store.trim_hold_lists(1);
        assert_eq!(store.memory_usage().used_bytes, base + entry);
    }

    // ========================================
    // Views
    // ========================================

    #[test]
    fn test_view_is_isolated_from_later_writes() {
        let mut store = small_store();
        let r = store.allocate(1).unwrap();
        let view = store.view();

        store.hold(r);
        store.transfer_hold_lists(0);
        store.trim_hold_lists(1);
        let reused = store.allocate(2).unwrap();
        assert_eq!(reused, r);

        assert_eq!(view.get(r), Some(&1));
        assert_eq!(store.view().get(r), Some(&2));
    }

    // ========================================
    // Compaction
    // ========================================

    #[test]
    fn test_compact_moves_live_entries() {
        let mut store = small_store();
        let refs: Vec<_> = (0..15u32).map(|v| store.allocate(v).unwrap()).collect();
        for r in &refs {
            store.inc_ref_count(*r);
        }
        for r in &refs[..10] {
            store.dec_ref_count(*r);
            store.hold(*r);
        }
        store.transfer_hold_lists(0);
        store.trim_hold_lists(1);

        let mut remapper = store.start_compact_worst_buffers(true, true).unwrap();
        assert_eq!(remapper.compacted_buffers().collect::<Vec<_>>(), vec![0]);
        assert_eq!(store.free_list_len(), 0);

        for old in &refs[10..] {
            let new = store.move_entry(*old).unwrap();
            remapper.record(*old, new);
        }
        store.finish_compact(&remapper);

        for (v, old) in refs.iter().enumerate().skip(10) {
            let new = remapper.remap(*old);
            assert_ne!(new.buffer_id(), 0);
            assert_eq!(*store.get(new), v as u32);
            assert_eq!(store.ref_count(new), 1);
        }

        // Old buffer stays readable until trimmed
        assert_eq!(store.try_get(refs[12]), Some(&12));
        assert_eq!(store.buffer_state(0).unwrap().status(), BufferStatus::Hold);
        store.transfer_hold_lists(1);
        store.trim_hold_lists(2);
        assert_eq!(store.buffer_state(0).unwrap().status(), BufferStatus::Free);
        assert_eq!(store.try_get(refs[12]), None);
    }

    #[test]
    fn test_sentinel_slot_counts_as_dead() {
        let mut store = small_store();
        store.allocate(1).unwrap();
        let remapper = store.start_compact_worst_buffers(false, true).unwrap();
        assert_eq!(remapper.compacted_buffers().collect::<Vec<_>>(), vec![0]);
        // Primary moved off the compacting buffer
        assert_eq!(store.primary_buffer_id(), 1);
    }

    #[test]
    fn test_freed_buffer_id_is_reused() {
        let mut store = small_store();
        let refs: Vec<_> = (0..5u32).map(|v| store.allocate(v).unwrap()).collect();
        for r in &refs {
            store.hold(*r);
        }
        store.transfer_hold_lists(0);
        store.trim_hold_lists(1);

        let remapper = store.start_compact_worst_buffers(true, false).unwrap();
        store.finish_compact(&remapper);
        store.transfer_hold_lists(1);
        store.trim_hold_lists(2);
        assert_eq!(store.buffers_in_use(), 1);

        // No dead space left anywhere
        let remapper = store.start_compact_worst_buffers(true, true).unwrap();
        assert!(remapper.compacted_buffers().next().is_none());

        // Overflow the primary buffer so the freed id 0 gets reactivated
        let primary = store.primary_buffer_id();
        let capacity = store.buffer_state(primary).unwrap().capacity();
        for v in 0..=capacity {
            store.allocate(v).unwrap();
        }
        assert_eq!(store.primary_buffer_id(), 0);
        // Sentinel reserved again
        assert_eq!(store.buffer_state(0).unwrap().dead(), 1);
    }

    #[test]
    fn test_compact_without_room_changes_nothing() {
        let config = StoreConfig::for_testing()
            .with_initial_buffer_entries(4)
            .with_max_entries_per_buffer(4)
            .with_max_buffers(2);
        let mut store: DataStore<u32> = DataStore::new(config);
        // Buffer 0: sentinel, 1, 2, 3. Buffer 1: 4, 5, 6
        let refs: Vec<_> = (1..=6u32).map(|v| store.allocate(v).unwrap()).collect();
        store.hold(refs[0]);
        store.transfer_hold_lists(0);
        store.trim_hold_lists(1);
        assert_eq!(store.free_list_len(), 1);

        // Two live entries in buffer 0, one fresh slot in buffer 1
        assert!(matches!(
            store.start_compact_worst_buffers(true, true),
            Err(Error::AddressSpaceExhausted { buffers: 2 })
        ));
        assert!(!store.buffer_state(0).unwrap().is_compacting());
        assert_eq!(store.free_list_len(), 1);
        assert_eq!(store.primary_buffer_id(), 1);
        assert_eq!(store.allocate(7).unwrap(), refs[0]);
    }

    #[test]
    fn test_compact_counts_buffers_not_yet_created() {
        let config = StoreConfig::for_testing()
            .with_initial_buffer_entries(4)
            .with_max_entries_per_buffer(4)
            .with_max_buffers(3);
        let mut store: DataStore<u32> = DataStore::new(config);
        let refs: Vec<_> = (1..=6u32).map(|v| store.allocate(v).unwrap()).collect();
        store.hold(refs[0]);
        store.transfer_hold_lists(0);
        store.trim_hold_lists(1);

        let mut remapper = store.start_compact_worst_buffers(true, false).unwrap();
        for old in &refs[1..3] {
            let new = store.move_entry(*old).unwrap();
            remapper.record(*old, new);
        }
        assert_eq!(remapper.remap(refs[1]), EntryRef::new(1, 3));
        assert_eq!(remapper.remap(refs[2]), EntryRef::new(2, 0));
    }

    #[test]
    fn test_address_space_usage() {
        let mut store = small_store();
        for v in 0..10u32 {
            store.allocate(v).unwrap();
        }
        let space = store.address_space_usage();
        assert_eq!(space.used(), 11);
        assert_eq!(space.dead(), 1);
        assert_eq!(space.limit(), 64 * 64);
    }
}
