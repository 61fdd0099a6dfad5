//! Error types for the enum store
//!
//! This module defines all error types used throughout the system.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.
//!
//! Lookup misses are not errors; they are reported through `Option`.
//! Corruption of already-published in-memory state is not reported here
//! either: it panics, since the store cannot be repaired locally.

use crate::config::ConfigError;
use crate::types::EntryRef;
use std::io;
use thiserror::Error;

/// Result type alias for enum store operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the enum store
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error while saving values
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Load buffer ended in the middle of a record
    #[error("Truncated record at offset {offset}: need {needed} bytes, {available} available")]
    Truncated {
        /// Byte offset of the incomplete record
        offset: usize,
        /// Bytes required by the record
        needed: usize,
        /// Bytes left in the buffer
        available: usize,
    },

    /// Loaded record is not strictly greater than its predecessor
    #[error("Record {record} is out of order")]
    OutOfOrder {
        /// Zero-based index of the offending record
        record: usize,
    },

    /// Loaded record could not be decoded
    #[error("Malformed record at offset {offset}: {reason}")]
    Malformed {
        /// Byte offset of the record
        offset: usize,
        /// What was wrong with it
        reason: &'static str,
    },

    /// Saved enum value does not name a loaded value
    #[error("Enum value {0} out of range")]
    InvalidEnumValue(u32),

    /// Loaded uses or counts of one value exceed `u32::MAX`
    #[error("Reference count overflow at record {record}")]
    CountOverflow {
        /// Zero-based index of the record that overflowed
        record: usize,
    },

    /// Value cannot be represented in the saved layout
    #[error("Invalid value: {0}")]
    InvalidValue(&'static str),

    /// Operation requires an empty store
    #[error("Store is not empty")]
    NotEmpty,

    /// Reference does not point at a live entry
    #[error("Invalid entry reference: {0:?}")]
    InvalidRef(EntryRef),

    /// No buffer id left for a new buffer
    #[error("Address space exhausted: all {buffers} buffers in use")]
    AddressSpaceExhausted {
        /// Number of buffers available to the store
        buffers: u32,
    },

    /// Store configuration rejected
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// Operation not supported by this store's dictionary kind
    #[error("Unsupported operation: {0}")]
    Unsupported(&'static str),
}

impl Error {
    /// Check if this error means the loaded data is corrupt
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            Error::Truncated { .. }
                | Error::OutOfOrder { .. }
                | Error::Malformed { .. }
                | Error::InvalidEnumValue(_)
                | Error::CountOverflow { .. }
        )
    }
}
