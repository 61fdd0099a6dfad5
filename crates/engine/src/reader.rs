//! Concurrent read access
//!
//! The writer publishes a `ReadSnapshot` on every commit: the frozen
//! dictionary plus a view of the value buffers at that point. Readers pin a
//! generation first, then load the latest snapshot pointer. Neither step
//! takes a lock.
//!
//! A replaced snapshot goes on a generation hold list, the same way freed
//! values do, so a reader that loaded the old pointer can still take its
//! own reference to it.
//!
//! # Example
//!
//! ```ignore
//! let reader = store.reader();
//! std::thread::spawn(move || {
//!     let guard = reader.read();
//!     if let Some(entry_ref) = guard.find_enum(&"apple".to_string()) {
//!         println!("{}", guard.get_value(entry_ref).unwrap());
//!     }
//! });
//! ```

use enumstore_core::{EntryRef, EnumValue, Generation, Result};
use enumstore_datastore::{DataStoreView, GenerationGuard, GenerationHandler, GenerationHoldList};
use enumstore_dictionary::{FoldedRefs, FrozenDictionary};
use parking_lot::Mutex;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicPtr, Ordering};
use std::sync::Arc;

/// Everything a reader needs, as of one commit
#[derive(Debug)]
pub(crate) struct ReadSnapshot<T> {
    pub(crate) dictionary: FrozenDictionary<T>,
    pub(crate) values: DataStoreView<T>,
}

impl<T> ReadSnapshot<T> {
    pub(crate) fn new(dictionary: FrozenDictionary<T>, values: DataStoreView<T>) -> Self {
        ReadSnapshot { dictionary, values }
    }
}

/// Latest published snapshot, shared by the writer and its readers
///
/// `current` owns one strong count of the snapshot it points at. Replaced
/// snapshots keep that count on `retired` until trimmed.
pub(crate) struct Published<T> {
    current: AtomicPtr<ReadSnapshot<T>>,
    /// Only the writer locks this
    retired: Mutex<GenerationHoldList<Arc<ReadSnapshot<T>>>>,
    _owns: PhantomData<Arc<ReadSnapshot<T>>>,
}

impl<T> Published<T> {
    pub(crate) fn new(snapshot: Arc<ReadSnapshot<T>>) -> Self {
        Published {
            current: AtomicPtr::new(Arc::into_raw(snapshot) as *mut ReadSnapshot<T>),
            retired: Mutex::new(GenerationHoldList::new()),
            _owns: PhantomData,
        }
    }

    /// Take a reference to the latest snapshot
    ///
    /// `guard` must have been taken before this call.
    fn load(&self, _guard: &GenerationGuard) -> Arc<ReadSnapshot<T>> {
        let raw = self.current.load(Ordering::SeqCst);
        // SAFETY: `raw` came from `Arc::into_raw`. Its strong count stays
        // owned by `current` or `retired` until a trim below the guard's
        // generation, and the guard was registered before the load.
        unsafe {
            Arc::increment_strong_count(raw);
            Arc::from_raw(raw)
        }
    }

    /// Make `snapshot` the latest; the one it replaces is held
    pub(crate) fn publish(&self, snapshot: Arc<ReadSnapshot<T>>) {
        let raw = Arc::into_raw(snapshot) as *mut ReadSnapshot<T>;
        let old = self.current.swap(raw, Ordering::SeqCst);
        // SAFETY: `old` came from `Arc::into_raw` and `current` no longer
        // owns its count.
        let old = unsafe { Arc::from_raw(old) };
        self.retired.lock().hold(old);
    }

    /// Tag replaced snapshots with `generation`
    pub(crate) fn transfer_hold_lists(&self, generation: Generation) {
        self.retired.lock().transfer(generation);
    }

    /// Drop replaced snapshots no reader can still be loading
    pub(crate) fn trim_hold_lists(&self, first_used: Generation) {
        let released = self.retired.lock().trim(first_used);
        drop(released);
    }

    /// Number of replaced snapshots not yet dropped
    #[cfg(test)]
    pub(crate) fn retired_len(&self) -> usize {
        let retired = self.retired.lock();
        retired.pending_len() + retired.held_len()
    }
}

impl<T> Drop for Published<T> {
    fn drop(&mut self) {
        // SAFETY: no reader or writer is left to load the pointer
        unsafe { drop(Arc::from_raw(*self.current.get_mut())) };
    }
}

/// Handle for reading an enum store from any thread
pub struct EnumStoreReader<T> {
    published: Arc<Published<T>>,
    generations: Arc<GenerationHandler>,
}

impl<T> Clone for EnumStoreReader<T> {
    fn clone(&self) -> Self {
        EnumStoreReader {
            published: Arc::clone(&self.published),
            generations: Arc::clone(&self.generations),
        }
    }
}

impl<T: EnumValue> EnumStoreReader<T> {
    pub(crate) fn new(published: Arc<Published<T>>, generations: Arc<GenerationHandler>) -> Self {
        EnumStoreReader {
            published,
            generations,
        }
    }

    /// Pin the current generation and take the latest snapshot
    pub fn read(&self) -> ReadGuard<T> {
        // Guard before snapshot: the snapshot is never older than the guard
        let guard = self.generations.take_guard();
        let snapshot = self.published.load(&guard);
        ReadGuard { guard, snapshot }
    }
}

impl<T> std::fmt::Debug for EnumStoreReader<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnumStoreReader")
            .field("generation", &self.generations.current_generation())
            .finish()
    }
}

/// A pinned, immutable view of the store
///
/// Held references stay readable for as long as the guard lives.
pub struct ReadGuard<T> {
    guard: GenerationGuard,
    snapshot: Arc<ReadSnapshot<T>>,
}

impl<T: EnumValue> ReadGuard<T> {
    /// Generation pinned by this guard
    pub fn generation(&self) -> Generation {
        self.guard.generation()
    }

    /// Find the reference of a value
    pub fn find_enum(&self, value: &T) -> Option<EntryRef> {
        self.snapshot.dictionary.find_index(value)
    }

    /// Resolve a reference, `None` if it does not point at a value
    pub fn get_value(&self, entry_ref: EntryRef) -> Option<&T> {
        self.snapshot.values.get(entry_ref)
    }

    /// All values folded-equal to `value`, ascending primary order
    pub fn find_folded_enums(&self, value: &T) -> FoldedRefs {
        self.snapshot.dictionary.find_matching_folded(value)
    }

    /// Find a value's reference and posting list
    pub fn find_posting_list(&self, value: &T) -> Result<Option<(EntryRef, EntryRef)>> {
        self.snapshot.dictionary.find_posting_list(value)
    }

    /// Iterate values and their references in ascending order
    pub fn iter(&self) -> impl Iterator<Item = (&T, EntryRef)> + '_ {
        self.snapshot.dictionary.iter()
    }

    /// Number of distinct values
    pub fn len(&self) -> usize {
        self.snapshot.dictionary.len()
    }

    /// Check if no value is present
    pub fn is_empty(&self) -> bool {
        self.snapshot.dictionary.is_empty()
    }
}

impl<T> std::fmt::Debug for ReadGuard<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadGuard")
            .field("generation", &self.guard.generation())
            .finish()
    }
}
