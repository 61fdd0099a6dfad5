//! Core types and traits for the enum store
//!
//! This crate defines the foundational types used throughout the system:
//! - EntryRef: Opaque, copyable reference to a stored value
//! - Generation: Writer epoch counter for deferred reclamation
//! - EnumValue: Primary and folded ordering over stored values
//! - ValueCodec: Raw record encoding for the save/load path
//! - MemoryUsage / AddressSpace: Accounting snapshots
//! - StoreConfig / CompactionStrategy: Configuration
//! - Error: Error type hierarchy

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod codec;
pub mod config;
pub mod error;
pub mod memory;
pub mod types;
pub mod value;

pub use codec::{DecodeError, ValueCodec};
pub use config::{CompactionStrategy, ConfigError, StoreConfig};
pub use error::{Error, Result};
pub use memory::{AddressSpace, MemoryUsage};
pub use types::{EntryRef, Generation, MAX_BUFFERS, MAX_OFFSET};
pub use value::EnumValue;
