//! Enumstore - deduplicating value store for searchable attributes
//!
//! Every distinct value is stored once and identified by a compact 32-bit
//! [`EntryRef`]. Values are kept in an ordered dictionary, reference counted
//! by the documents that use them, and readable from other threads through
//! published snapshots while a single writer keeps mutating.
//!
//! # Quick Start
//!
//! ```
//! use enumstore::{DictionaryKind, EnumStore};
//!
//! let mut store: EnumStore<String> = EnumStore::new(DictionaryKind::Unique);
//! let apple = store.insert(&"apple".to_string())?;
//! assert_eq!(store.insert(&"apple".to_string())?, apple);
//! assert_eq!(store.get_ref_count(apple), 2);
//!
//! // Readers only see what was committed
//! let reader = store.reader();
//! assert!(reader.read().find_enum(&"apple".to_string()).is_none());
//! store.commit();
//! assert_eq!(reader.read().find_enum(&"apple".to_string()), Some(apple));
//! # Ok::<(), enumstore::Error>(())
//! ```
//!
//! # Architecture
//!
//! - `datastore`: slot allocator with reference counts, hold lists and
//!   buffer compaction
//! - `dictionary`: ordered value index with frozen snapshots
//! - engine (re-exported at the root): the [`EnumStore`] writer, readers,
//!   loaders and compaction

pub use enumstore_engine::*;

/// Slot allocator and generation tracking
pub mod datastore {
    pub use enumstore_datastore::*;
}

/// Ordered value dictionary
pub mod dictionary {
    pub use enumstore_dictionary::*;
}
