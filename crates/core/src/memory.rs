//! Memory and address-space accounting
//!
//! Snapshots of aggregate counters consumed by the compactor and by external
//! resource monitors. They are plain values; the store recomputes them on
//! demand.

use serde::{Deserialize, Serialize};

/// Byte accounting for a store component
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryUsage {
    /// Bytes reserved by backing buffers
    pub allocated_bytes: usize,
    /// Bytes occupied by entries, live or not
    pub used_bytes: usize,
    /// Bytes occupied by entries that are free for reuse
    pub dead_bytes: usize,
    /// Bytes that cannot be reused until their hold generation is trimmed
    pub allocated_bytes_on_hold: usize,
}

impl MemoryUsage {
    /// Create a usage snapshot
    pub fn new(
        allocated_bytes: usize,
        used_bytes: usize,
        dead_bytes: usize,
        allocated_bytes_on_hold: usize,
    ) -> Self {
        MemoryUsage {
            allocated_bytes,
            used_bytes,
            dead_bytes,
            allocated_bytes_on_hold,
        }
    }

    /// Add another component's usage to this one
    pub fn merge(&mut self, other: &MemoryUsage) {
        self.allocated_bytes += other.allocated_bytes;
        self.used_bytes += other.used_bytes;
        self.dead_bytes += other.dead_bytes;
        self.allocated_bytes_on_hold += other.allocated_bytes_on_hold;
    }

    /// Dead bytes as a fraction of used bytes (0.0 when nothing is used)
    pub fn dead_ratio(&self) -> f64 {
        if self.used_bytes == 0 {
            0.0
        } else {
            self.dead_bytes as f64 / self.used_bytes as f64
        }
    }
}

/// Address-space accounting, in entries
///
/// `used` counts every entry slot handed out by a buffer (live, held or
/// dead), `dead` the ones that hold no live value. `limit` is the fixed
/// ceiling given by the reference layout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressSpace {
    used: usize,
    dead: usize,
    limit: usize,
}

impl AddressSpace {
    /// Create an address-space snapshot
    pub fn new(used: usize, dead: usize, limit: usize) -> Self {
        AddressSpace { used, dead, limit }
    }

    /// Entry slots in use
    pub fn used(&self) -> usize {
        self.used
    }

    /// Entry slots holding no live value
    pub fn dead(&self) -> usize {
        self.dead
    }

    /// Fixed ceiling
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Fraction of the ceiling occupied by live entries
    pub fn usage(&self) -> f64 {
        if self.limit == 0 {
            0.0
        } else {
            self.used.saturating_sub(self.dead) as f64 / self.limit as f64
        }
    }
}
