//! Buffer state and storage
//!
//! A buffer is a fixed-capacity array of entry slots, addressed by the
//! offset part of an `EntryRef`. Slot storage is split into chunks behind
//! `Arc`s: the writer mutates through `Arc::make_mut`, so a chunk shared with
//! a published view is copied before the first write, and readers keep
//! seeing the chunk as it was when they took the view.
//!
//! # Lifecycle
//!
//! ```text
//! Free ──activate──▶ Active ──finish_compact──▶ Hold ──trim──▶ Free
//! ```

use std::sync::Arc;

/// Slots per chunk
pub(crate) const CHUNK_ENTRIES: usize = 256;

/// A chunk of slots; `None` marks a slot with no value
pub(crate) type Chunk<T> = Arc<Vec<Option<T>>>;

/// Slot storage for one buffer
pub(crate) type BufferData<T> = Arc<Vec<Chunk<T>>>;

/// Buffer lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferStatus {
    /// Not backed by memory; the id may be reused
    Free,
    /// Backed by memory and addressable
    Active,
    /// Emptied by compaction, waiting for readers to move on
    Hold,
}

/// Accounting for one buffer, in entries unless stated otherwise
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferState {
    status: BufferStatus,
    capacity: u32,
    used: u32,
    dead: u32,
    hold: u32,
    extra_used_bytes: usize,
    extra_hold_bytes: usize,
    compacting: bool,
}

impl BufferState {
    /// State of a buffer id that is not in use
    pub fn free() -> Self {
        BufferState {
            status: BufferStatus::Free,
            capacity: 0,
            used: 0,
            dead: 0,
            hold: 0,
            extra_used_bytes: 0,
            extra_hold_bytes: 0,
            compacting: false,
        }
    }

    pub(crate) fn activate(&mut self, capacity: u32) {
        debug_assert_eq!(self.status, BufferStatus::Free);
        *self = BufferState {
            status: BufferStatus::Active,
            capacity,
            ..BufferState::free()
        };
    }

    pub(crate) fn on_hold(&mut self) {
        debug_assert_eq!(self.status, BufferStatus::Active);
        self.status = BufferStatus::Hold;
    }

    /// Current status
    pub fn status(&self) -> BufferStatus {
        self.status
    }

    /// Slots the buffer can address
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Slots handed out so far (high-water mark)
    pub fn used(&self) -> u32 {
        self.used
    }

    /// Slots holding no live value and not on hold
    pub fn dead(&self) -> u32 {
        self.dead
    }

    /// Slots waiting on the hold list
    pub fn hold(&self) -> u32 {
        self.hold
    }

    /// Slots holding values that are neither dead nor held
    pub fn live(&self) -> u32 {
        self.used - self.dead - self.hold
    }

    /// Heap bytes owned by values in this buffer
    pub fn extra_used_bytes(&self) -> usize {
        self.extra_used_bytes
    }

    /// Heap bytes owned by held values
    pub fn extra_hold_bytes(&self) -> usize {
        self.extra_hold_bytes
    }

    /// Check if live entries are being moved out of this buffer
    pub fn is_compacting(&self) -> bool {
        self.compacting
    }

    /// Check if another slot can be handed out
    pub fn has_room(&self) -> bool {
        self.used < self.capacity
    }

    pub(crate) fn push_slot(&mut self, heap_bytes: usize) -> u32 {
        debug_assert!(self.has_room());
        let offset = self.used;
        self.used += 1;
        self.extra_used_bytes += heap_bytes;
        offset
    }

    pub(crate) fn reserve_dead_slot(&mut self) {
        self.used += 1;
        self.dead += 1;
    }

    pub(crate) fn reuse_dead_slot(&mut self, heap_bytes: usize) {
        debug_assert!(self.dead > 0);
        self.dead -= 1;
        self.extra_used_bytes += heap_bytes;
    }

    pub(crate) fn hold_slot(&mut self, heap_bytes: usize) {
        self.hold += 1;
        self.extra_hold_bytes += heap_bytes;
    }

    pub(crate) fn release_held_slot(&mut self, heap_bytes: usize) {
        debug_assert!(self.hold > 0);
        self.hold -= 1;
        self.dead += 1;
        self.extra_hold_bytes -= heap_bytes;
        self.extra_used_bytes -= heap_bytes;
    }

    pub(crate) fn moved_out(&mut self, heap_bytes: usize) {
        self.dead += 1;
        self.extra_used_bytes -= heap_bytes;
    }

    pub(crate) fn set_compacting(&mut self) {
        self.compacting = true;
    }
}

impl Default for BufferState {
    fn default() -> Self {
        Self::free()
    }
}

/// Split an offset into chunk index and slot index
#[inline]
pub(crate) fn chunk_position(offset: u32) -> (usize, usize) {
    let offset = offset as usize;
    (offset / CHUNK_ENTRIES, offset % CHUNK_ENTRIES)
}

/// Read a slot from buffer storage
#[inline]
pub(crate) fn read_slot<T>(data: &BufferData<T>, offset: u32) -> Option<&T> {
    let (chunk, slot) = chunk_position(offset);
    data.get(chunk)?.get(slot)?.as_ref()
}

/// Write a slot, copying shared chunks first
pub(crate) fn write_slot<T: Clone>(data: &mut BufferData<T>, offset: u32, value: Option<T>) {
    let (chunk, slot) = chunk_position(offset);
    let chunks = Arc::make_mut(data);
    while chunks.len() <= chunk {
        chunks.push(Arc::new(vec![None; CHUNK_ENTRIES]));
    }
    Arc::make_mut(&mut chunks[chunk])[slot] = value;
}
