//! Slot allocation and deferred reclamation for the enum store
//!
//! This crate owns the memory side of the store:
//! - DataStore: typed slot allocator with reference counts and free lists
//! - DataStoreView: lock-free read view of slot storage
//! - GenerationHoldList: generation-tagged deferred frees
//! - GenerationHandler: reader tracking that bounds what may be freed
//! - EntryRefRemapper: old-to-new reference mapping produced by compaction

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod buffer;
pub mod generation;
pub mod hold_list;
pub mod remap;
pub mod store;
pub mod view;

pub use buffer::{BufferState, BufferStatus};
pub use generation::{GenerationGuard, GenerationHandler};
pub use hold_list::GenerationHoldList;
pub use remap::EntryRefRemapper;
pub use store::DataStore;
pub use view::DataStoreView;
