//! Old-to-new reference mapping produced by compaction
//!
//! Only references into buffers that were compacted change; every other
//! reference maps to itself. References into a compacted buffer that were
//! not live at compaction time map to `EntryRef::INVALID`.

use enumstore_core::EntryRef;
use std::collections::BTreeMap;

/// Remap from references in compacted buffers to their new location
#[derive(Debug, Clone, Default)]
pub struct EntryRefRemapper {
    /// Compacted buffer id → new reference per old offset
    mappings: BTreeMap<u32, Vec<EntryRef>>,
}

impl EntryRefRemapper {
    /// Create a remapper for buffers of the given sizes
    pub fn new(buffers: impl IntoIterator<Item = (u32, u32)>) -> Self {
        let mappings = buffers
            .into_iter()
            .map(|(buffer_id, used)| (buffer_id, vec![EntryRef::INVALID; used as usize]))
            .collect();
        EntryRefRemapper { mappings }
    }

    /// Record that `old` now lives at `new`
    ///
    /// # Panics
    ///
    /// If `old` is not in a compacted buffer.
    pub fn record(&mut self, old: EntryRef, new: EntryRef) {
        let mapping = self
            .mappings
            .get_mut(&old.buffer_id())
            .unwrap_or_else(|| panic!("{:?} is not in a compacted buffer", old));
        mapping[old.offset() as usize] = new;
    }

    /// Translate a reference
    pub fn remap(&self, entry_ref: EntryRef) -> EntryRef {
        match self.mappings.get(&entry_ref.buffer_id()) {
            Some(mapping) => mapping
                .get(entry_ref.offset() as usize)
                .copied()
                .unwrap_or(EntryRef::INVALID),
            None => entry_ref,
        }
    }

    /// Translate references in place
    pub fn remap_slice(&self, refs: &mut [EntryRef]) {
        for entry_ref in refs.iter_mut() {
            *entry_ref = self.remap(*entry_ref);
        }
    }

    /// Check if a reference points into a compacted buffer
    pub fn is_compacted(&self, entry_ref: EntryRef) -> bool {
        self.mappings.contains_key(&entry_ref.buffer_id())
    }

    /// Ids of the compacted buffers, ascending
    pub fn compacted_buffers(&self) -> impl Iterator<Item = u32> + '_ {
        self.mappings.keys().copied()
    }

    /// Iterate over `(old, new)` pairs for every moved entry
    pub fn iter(&self) -> impl Iterator<Item = (EntryRef, EntryRef)> + '_ {
        self.mappings.iter().flat_map(|(&buffer_id, mapping)| {
            mapping
                .iter()
                .enumerate()
                .filter(|(_, new)| new.valid())
                .map(move |(offset, &new)| (EntryRef::new(buffer_id, offset as u32), new))
        })
    }

    /// Number of moved entries
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    /// Check if nothing was moved
    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }
}
