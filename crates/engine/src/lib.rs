//! Enum store engine
//!
//! This crate ties the lower layers into the public store:
//! - EnumStore: single writer owning values, dictionary and generations
//! - EnumStoreReader / ReadGuard: lock-free readers on published snapshots
//! - Compaction: trigger evaluation and the remap handed to external owners
//! - BatchUpdater: batched inserts and reference count changes
//! - Loaders and save path: bulk restore from saved unique values
//! - Enumerator: dense enum values for saving per-document references

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod batch;
pub mod compaction;
pub mod enumerator;
pub mod loader;
pub mod reader;
pub mod store;

pub use batch::BatchUpdater;
pub use compaction::{CompactionNeed, EnumIndexRemapper};
pub use enumerator::Enumerator;
pub use loader::{EnumeratedLoader, NonEnumeratedLoader};
pub use reader::{EnumStoreReader, ReadGuard};
pub use store::EnumStore;

pub use enumstore_core::{
    AddressSpace, CompactionStrategy, ConfigError, EntryRef, EnumValue, Error, Generation,
    MemoryUsage, Result, StoreConfig, ValueCodec,
};
pub use enumstore_dictionary::{AddResult, DictionaryKind, FoldedRefs};
