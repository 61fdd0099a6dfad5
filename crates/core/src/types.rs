//! Core types for the enum store
//!
//! This module defines the foundational handle types:
//! - EntryRef: Opaque reference to a stored value (buffer id + offset)
//! - Generation: Writer epoch counter used to defer reclamation

use serde::{Deserialize, Serialize};
use std::fmt;

/// Writer epoch counter
///
/// Bumped once per write epoch boundary. Holds recorded at generation `G`
/// are released once every reader is known to be at a generation `> G`.
pub type Generation = u64;

/// Number of bits used for the offset within a buffer
pub const OFFSET_BITS: u32 = 22;

/// Number of bits used for the buffer id
pub const BUFFER_BITS: u32 = 32 - OFFSET_BITS;

/// Maximum number of entries a single buffer can address
pub const MAX_OFFSET: u32 = 1 << OFFSET_BITS;

/// Maximum number of buffers a data store can address
pub const MAX_BUFFERS: u32 = 1 << BUFFER_BITS;

/// Opaque reference to a stored value
///
/// Packs `(buffer_id, offset)` into a single `u32`. The raw value 0 is the
/// invalid sentinel; offset 0 of buffer 0 is therefore never handed out.
///
/// An `EntryRef` is only meaningful for the store which produced it, and is
/// always resolved through that store. Compaction may invalidate it, in which
/// case the remap produced by the compaction gives the replacement.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct EntryRef(u32);

impl EntryRef {
    /// The invalid sentinel
    pub const INVALID: EntryRef = EntryRef(0);

    /// Create a reference from buffer id and offset
    ///
    /// # Panics
    ///
    /// If `buffer_id >= MAX_BUFFERS` or `offset >= MAX_OFFSET`.
    pub fn new(buffer_id: u32, offset: u32) -> Self {
        assert!(buffer_id < MAX_BUFFERS, "buffer id {} out of range", buffer_id);
        assert!(offset < MAX_OFFSET, "offset {} out of range", offset);
        EntryRef((buffer_id << OFFSET_BITS) | offset)
    }

    /// Recreate a reference from its raw representation
    pub const fn from_raw(raw: u32) -> Self {
        EntryRef(raw)
    }

    /// Raw packed representation
    #[inline]
    pub const fn raw(&self) -> u32 {
        self.0
    }

    /// Check that this is not the invalid sentinel
    #[inline]
    pub const fn valid(&self) -> bool {
        self.0 != 0
    }

    /// Buffer the referenced entry lives in
    #[inline]
    pub const fn buffer_id(&self) -> u32 {
        self.0 >> OFFSET_BITS
    }

    /// Offset of the entry within its buffer
    #[inline]
    pub const fn offset(&self) -> u32 {
        self.0 & (MAX_OFFSET - 1)
    }
}

impl fmt::Debug for EntryRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.valid() {
            f.debug_struct("EntryRef")
                .field("buffer", &self.buffer_id())
                .field("offset", &self.offset())
                .finish()
        } else {
            write!(f, "EntryRef(invalid)")
        }
    }
}

impl fmt::Display for EntryRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.buffer_id(), self.offset())
    }
}
