//! Read-only view of data store buffers
//!
//! A view holds its own `Arc`s to every buffer's storage at the time it was
//! taken. Writes after that copy the affected chunk, so the view never
//! changes underneath a reader and reading it takes no lock.

use enumstore_core::EntryRef;
use std::sync::Arc;

use crate::buffer::{read_slot, BufferData};

/// Immutable snapshot of slot storage
pub struct DataStoreView<T> {
    buffers: Arc<[Option<BufferData<T>>]>,
}

impl<T> DataStoreView<T> {
    pub(crate) fn new(buffers: Arc<[Option<BufferData<T>>]>) -> Self {
        DataStoreView { buffers }
    }

    /// Resolve a reference, `None` if it does not point at a value
    pub fn get(&self, entry_ref: EntryRef) -> Option<&T> {
        if !entry_ref.valid() {
            return None;
        }
        let data = self.buffers.get(entry_ref.buffer_id() as usize)?.as_ref()?;
        read_slot(data, entry_ref.offset())
    }

    /// Number of buffer ids covered by this view
    pub fn num_buffers(&self) -> usize {
        self.buffers.len()
    }
}

impl<T> Clone for DataStoreView<T> {
    fn clone(&self) -> Self {
        DataStoreView {
            buffers: Arc::clone(&self.buffers),
        }
    }
}

impl<T> std::fmt::Debug for DataStoreView<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataStoreView")
            .field("buffers", &self.buffers.len())
            .finish()
    }
}
