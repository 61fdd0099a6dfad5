//! Generation-tagged deferred frees
//!
//! A hold list collects items that were logically removed but must not be
//! physically reused while a reader may still observe them.
//!
//! # Lifecycle
//!
//! ```text
//! hold(item)              → pending (active generation)
//! transfer(generation)    → pending items tagged with `generation` (superseded)
//! trim(first_used)        → items tagged < first_used are returned (reclaimable)
//! ```
//!
//! The caller frees whatever `trim` returns. `first_used` must be a lower
//! bound on the generation of every in-flight reader.

use enumstore_core::Generation;
use std::collections::VecDeque;

/// Per-generation lists of items pending reclamation
#[derive(Debug)]
pub struct GenerationHoldList<T> {
    /// Items held in the active generation, not yet tagged
    pending: Vec<T>,
    /// Tagged lists, oldest first; generations are non-decreasing
    held: VecDeque<(Generation, Vec<T>)>,
}

impl<T> GenerationHoldList<T> {
    /// Create an empty hold list
    pub fn new() -> Self {
        GenerationHoldList {
            pending: Vec::new(),
            held: VecDeque::new(),
        }
    }

    /// Hold an item in the active generation
    pub fn hold(&mut self, item: T) {
        self.pending.push(item);
    }

    /// Tag every pending item with `generation`
    ///
    /// # Panics
    ///
    /// If `generation` is older than the last transferred generation.
    pub fn transfer(&mut self, generation: Generation) {
        if self.pending.is_empty() {
            return;
        }
        if let Some((last, list)) = self.held.back_mut() {
            assert!(
                *last <= generation,
                "hold list generation went backwards: {} after {}",
                generation,
                last
            );
            if *last == generation {
                list.append(&mut self.pending);
                return;
            }
        }
        let items = std::mem::take(&mut self.pending);
        self.held.push_back((generation, items));
    }

    /// Remove and return every item tagged strictly below `first_used`
    pub fn trim(&mut self, first_used: Generation) -> Vec<T> {
        let mut released = Vec::new();
        while let Some((generation, _)) = self.held.front() {
            if *generation >= first_used {
                break;
            }
            if let Some((_, mut items)) = self.held.pop_front() {
                released.append(&mut items);
            }
        }
        released
    }

    /// Items held in the active generation
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Items tagged with a generation but not yet trimmed
    pub fn held_len(&self) -> usize {
        self.held.iter().map(|(_, items)| items.len()).sum()
    }

    /// Oldest generation still holding items
    pub fn oldest_generation(&self) -> Option<Generation> {
        self.held.front().map(|(generation, _)| *generation)
    }

    /// Check if nothing is held
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty() && self.held.is_empty()
    }

    /// Iterate over every held item, pending ones included
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        self.held
            .iter()
            .flat_map(|(_, items)| items.iter())
            .chain(self.pending.iter())
    }
}

impl<T> Default for GenerationHoldList<T> {
    fn default() -> Self {
        Self::new()
    }
}
