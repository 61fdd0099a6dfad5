//! Compaction planning and the remap handed to external owners
//!
//! # Trigger
//!
//! Compaction is considered on the statistics cached by the last
//! `update_stat`. Memory compaction is wanted when
//! `dead_bytes >= dead_bytes_slack` and `used_bytes * ratio < dead_bytes`;
//! address-space compaction likewise on entry counts.
//!
//! # Protocol
//!
//! 1. `consider_compact` (or `compact_worst`) moves live values out of the
//!    worst buffers and returns an `EnumIndexRemapper`.
//! 2. Every external holder of `EntryRef`s applies the remap.
//! 3. `finish_compact` puts the old buffers on the hold list.
//! 4. `commit` publishes the moved dictionary and frees the old buffers once
//!    no reader can still use them.

use enumstore_core::{AddressSpace, CompactionStrategy, EntryRef, MemoryUsage, StoreConfig};
use enumstore_datastore::EntryRefRemapper;

/// Which kinds of compaction the cached statistics call for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CompactionNeed {
    /// Dead bytes crossed the threshold
    pub memory: bool,
    /// Dead address space crossed the threshold
    pub address_space: bool,
}

impl CompactionNeed {
    /// Evaluate the trigger against usage statistics
    pub fn evaluate(
        config: &StoreConfig,
        strategy: &CompactionStrategy,
        memory: &MemoryUsage,
        address_space: &AddressSpace,
    ) -> Self {
        let memory = memory.dead_bytes >= config.dead_bytes_slack
            && (memory.used_bytes as f64) * strategy.max_dead_bytes_ratio()
                < memory.dead_bytes as f64;
        let address_space = address_space.dead() >= config.dead_address_space_slack
            && (address_space.used() as f64) * strategy.max_dead_address_space_ratio()
                < address_space.dead() as f64;
        CompactionNeed {
            memory,
            address_space,
        }
    }

    /// Check if any compaction is wanted
    pub fn any(&self) -> bool {
        self.memory || self.address_space
    }
}

/// Old-to-new reference mapping from one compaction
///
/// References outside the compacted buffers map to themselves. External
/// owners must apply the remap before `EnumStore::finish_compact`.
#[derive(Debug, Clone)]
pub struct EnumIndexRemapper {
    remapper: EntryRefRemapper,
    moved: usize,
}

impl EnumIndexRemapper {
    pub(crate) fn new(remapper: EntryRefRemapper, moved: usize) -> Self {
        EnumIndexRemapper { remapper, moved }
    }

    pub(crate) fn inner(&self) -> &EntryRefRemapper {
        &self.remapper
    }

    /// Translate a reference
    #[inline]
    pub fn remap(&self, entry_ref: EntryRef) -> EntryRef {
        self.remapper.remap(entry_ref)
    }

    /// Translate references in place
    pub fn remap_slice(&self, refs: &mut [EntryRef]) {
        self.remapper.remap_slice(refs)
    }

    /// Check if a reference needs translating
    pub fn needs_remap(&self, entry_ref: EntryRef) -> bool {
        self.remapper.is_compacted(entry_ref)
    }

    /// Iterate over `(old, new)` pairs for every moved value
    pub fn iter(&self) -> impl Iterator<Item = (EntryRef, EntryRef)> + '_ {
        self.remapper.iter()
    }

    /// Ids of the compacted buffers
    pub fn compacted_buffers(&self) -> Vec<u32> {
        self.remapper.compacted_buffers().collect()
    }

    /// Number of values moved
    pub fn moved(&self) -> usize {
        self.moved
    }
}
