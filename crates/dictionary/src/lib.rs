//! Ordered dictionary over stored values
//!
//! This crate maps distinct values to their `EntryRef` in the data store:
//! - DictKey: primary and folded ordering of dictionary keys
//! - EnumDictionary: writer-side dictionary, with a capability tag
//! - FrozenDictionary: immutable snapshot for lock-free readers

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod dictionary;
pub mod frozen;
pub mod key;

pub use dictionary::{AddResult, DictionaryKind, EnumDictionary};
pub use frozen::FrozenDictionary;
pub use key::{DictKey, DictionaryEntry, FoldedRefs};
