//! Reader tracking for generation-based reclamation
//!
//! The writer bumps the generation at each epoch boundary; readers take a
//! `GenerationGuard` before looking at published state. The oldest guarded
//! generation bounds what hold lists may release.
//!
//! # Ordering
//!
//! Guards are counted per generation in a ring of atomic counters, so taking
//! and dropping a guard never blocks. A reader bumps the counter of the
//! generation it loaded, then re-checks that the generation is still
//! current; if the writer moved on in between, it backs out and retries.
//! A registration that passes the re-check happened before the writer's
//! next `inc_generation`, so the writer's following scan sees it.
//!
//! Generations that share a counter only make the scan more conservative.
//! Readers must load published state only after taking their guard.

use enumstore_core::Generation;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

/// Counters in the reader ring
const READER_SLOTS: usize = 64;

/// Tracks the current generation and the generations readers are using
#[derive(Debug)]
pub struct GenerationHandler {
    /// Current writer generation
    current: AtomicU64,
    /// Live guards, indexed by generation modulo `READER_SLOTS`
    readers: Box<[AtomicUsize]>,
    /// Result of the last scan; no guard is older
    oldest: AtomicU64,
}

impl GenerationHandler {
    /// Create a handler starting at generation 0
    pub fn new() -> Self {
        GenerationHandler {
            current: AtomicU64::new(0),
            readers: (0..READER_SLOTS).map(|_| AtomicUsize::new(0)).collect(),
            oldest: AtomicU64::new(0),
        }
    }

    /// Current writer generation
    #[inline]
    pub fn current_generation(&self) -> Generation {
        self.current.load(Ordering::SeqCst)
    }

    /// Advance to the next generation and return it
    ///
    /// Only the writer calls this.
    pub fn inc_generation(&self) -> Generation {
        self.current.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Oldest generation any reader may still observe
    ///
    /// Equals the current generation when no guard is live. Scans from the
    /// previous result; at most one full turn of the ring.
    pub fn first_used_generation(&self) -> Generation {
        let current = self.current_generation();
        let start = self.oldest.load(Ordering::Relaxed).min(current);
        let span = (current - start).min(READER_SLOTS as u64);
        let first_used = (start..start + span)
            .find(|&generation| self.slot(generation).load(Ordering::SeqCst) > 0)
            .unwrap_or(current);
        self.oldest.fetch_max(first_used, Ordering::Relaxed);
        first_used
    }

    /// Register a reader at the current generation
    pub fn take_guard(self: &Arc<Self>) -> GenerationGuard {
        loop {
            let generation = self.current_generation();
            let slot = self.slot(generation);
            slot.fetch_add(1, Ordering::SeqCst);
            if self.current_generation() == generation {
                return GenerationGuard {
                    handler: Arc::clone(self),
                    generation,
                };
            }
            slot.fetch_sub(1, Ordering::SeqCst);
        }
    }

    /// Number of live guards
    pub fn reader_count(&self) -> usize {
        self.readers
            .iter()
            .map(|count| count.load(Ordering::SeqCst))
            .sum()
    }

    #[inline]
    fn slot(&self, generation: Generation) -> &AtomicUsize {
        &self.readers[(generation % READER_SLOTS as u64) as usize]
    }
}

impl Default for GenerationHandler {
    fn default() -> Self {
        Self::new()
    }
}

/// A reader's claim on a generation
///
/// While the guard lives, nothing held at this generation or later is
/// reclaimed.
#[derive(Debug)]
pub struct GenerationGuard {
    handler: Arc<GenerationHandler>,
    generation: Generation,
}

impl GenerationGuard {
    /// Generation this guard pins
    pub fn generation(&self) -> Generation {
        self.generation
    }
}

impl Clone for GenerationGuard {
    fn clone(&self) -> Self {
        // Already pinned, no re-check needed
        self.handler
            .slot(self.generation)
            .fetch_add(1, Ordering::SeqCst);
        GenerationGuard {
            handler: Arc::clone(&self.handler),
            generation: self.generation,
        }
    }
}

impl Drop for GenerationGuard {
    fn drop(&mut self) {
        self.handler
            .slot(self.generation)
            .fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_first_used_without_readers_is_current() {
        let handler = GenerationHandler::new();
        assert_eq!(handler.first_used_generation(), 0);
        handler.inc_generation();
        handler.inc_generation();
        assert_eq!(handler.current_generation(), 2);
        assert_eq!(handler.first_used_generation(), 2);
    }

    #[test]
    fn test_guard_pins_generation() {
        let handler = Arc::new(GenerationHandler::new());
        handler.inc_generation();
        let guard = handler.take_guard();
        assert_eq!(guard.generation(), 1);

        handler.inc_generation();
        handler.inc_generation();
        assert_eq!(handler.first_used_generation(), 1);

        drop(guard);
        assert_eq!(handler.first_used_generation(), 3);
    }

    #[test]
    fn test_oldest_guard_wins() {
        let handler = Arc::new(GenerationHandler::new());
        let old = handler.take_guard();
        handler.inc_generation();
        let young = handler.take_guard();
        assert_eq!(handler.reader_count(), 2);
        assert_eq!(handler.first_used_generation(), 0);

        drop(old);
        assert_eq!(handler.first_used_generation(), 1);
        drop(young);
        assert_eq!(handler.reader_count(), 0);
    }

    #[test]
    fn test_cloned_guard_counts_separately() {
        let handler = Arc::new(GenerationHandler::new());
        let guard = handler.take_guard();
        let copy = guard.clone();
        handler.inc_generation();
        drop(guard);
        assert_eq!(handler.first_used_generation(), 0);
        drop(copy);
        assert_eq!(handler.first_used_generation(), 1);
    }

    #[test]
    fn test_guards_across_threads() {
        let handler = Arc::new(GenerationHandler::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let handler = Arc::clone(&handler);
                thread::spawn(move || {
                    for _ in 0..1000 {
                        let guard = handler.take_guard();
                        assert!(guard.generation() <= handler.current_generation());
                    }
                })
            })
            .collect();

        for _ in 0..100 {
            handler.inc_generation();
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(handler.reader_count(), 0);
        assert_eq!(handler.first_used_generation(), 100);
    }

    #[test]
    fn test_guard_older_than_ring_still_pins() {
        let handler = Arc::new(GenerationHandler::new());
        handler.inc_generation();
        let guard = handler.take_guard();
        for _ in 0..(3 * READER_SLOTS) {
            handler.inc_generation();
            assert_eq!(handler.first_used_generation(), 1);
        }
        // A young reader sharing the old reader's counter
        let current = handler.current_generation();
        let young = handler.take_guard();
        assert_eq!(young.generation(), current);
        assert_eq!(handler.first_used_generation(), 1);

        // Shared counter: the scan cannot tell the two apart
        drop(guard);
        assert!(handler.first_used_generation() <= current);
        drop(young);
        assert_eq!(handler.first_used_generation(), current);
        assert_eq!(handler.reader_count(), 0);
    }

    #[test]
    fn test_first_used_never_passes_a_live_guard() {
        let handler = Arc::new(GenerationHandler::new());
        let stop = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let readers: Vec<_> = (0..4)
            .map(|_| {
                let handler = Arc::clone(&handler);
                let stop = Arc::clone(&stop);
                thread::spawn(move || {
                    while !stop.load(Ordering::Relaxed) {
                        let guard = handler.take_guard();
                        // Holds for the guard's whole life
                        assert!(handler.first_used_generation() <= guard.generation());
                    }
                })
            })
            .collect();

        for _ in 0..2000 {
            handler.inc_generation();
            handler.first_used_generation();
        }
        stop.store(true, Ordering::Relaxed);
        for h in readers {
            h.join().unwrap();
        }
        assert_eq!(handler.reader_count(), 0);
    }
}
