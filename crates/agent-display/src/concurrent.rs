//! Copy-on-write listener list.
//!
//! `add`/`remove` swap in a whole new backing vector under a short-held
//! mutex; `for_each` snapshots the current `Arc` and iterates it without
//! holding any lock, so a listener that unregisters itself mid-iteration
//! can't deadlock or corrupt the in-flight snapshot.

use std::sync::Arc;

use parking_lot::Mutex;

pub struct ConcurrentList<T> {
    inner: Mutex<Arc<Vec<T>>>,
}

impl<T> Default for ConcurrentList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + PartialEq> ConcurrentList<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Arc::new(Vec::new())),
        }
    }

    /// Adds `item` and returns the new list length, so the caller can run
    /// edge-of-one side effects (e.g. enabling an underlying callback when
    /// the first listener registers).
    pub fn add(&self, item: T) -> usize {
        let mut guard = self.inner.lock();
        let mut next = (**guard).clone();
        next.push(item);
        let len = next.len();
        *guard = Arc::new(next);
        len
    }

    /// Removes the first listener equal to `item` and returns the new list
    /// length, so the caller can run edge-of-zero side effects (e.g.
    /// disabling an underlying callback when the last listener
    /// unregisters). A no-op removal still returns the current length.
    pub fn remove(&self, item: &T) -> usize {
        let mut guard = self.inner.lock();
        let mut next = (**guard).clone();
        if let Some(pos) = next.iter().position(|existing| existing == item) {
            next.remove(pos);
        }
        let len = next.len();
        *guard = Arc::new(next);
        len
    }

    /// Snapshots the current list and invokes `f` on each element without
    /// holding the lock.
    pub fn for_each(&self, mut f: impl FnMut(&T)) {
        let snapshot = self.inner.lock().clone();
        for item in snapshot.iter() {
            f(item);
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn add_remove_reports_transition_lengths() {
        let list: ConcurrentList<i32> = ConcurrentList::new();
        assert_eq!(list.add(1), 1);
        assert_eq!(list.add(2), 2);
        assert_eq!(list.remove(&1), 1);
        assert_eq!(list.remove(&2), 0);
    }

    #[test]
    fn for_each_sees_consistent_snapshot_during_mutation() {
        let list: ConcurrentList<i32> = ConcurrentList::new();
        list.add(1);
        list.add(2);
        list.add(3);

        let seen = AtomicUsize::new(0);
        list.for_each(|_| {
            seen.fetch_add(1, Ordering::Relaxed);
            // A listener unregistering mid-iteration must not affect this
            // in-flight snapshot.
            list.remove(&2);
        });
        assert_eq!(seen.load(Ordering::Relaxed), 3);
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn remove_of_absent_item_is_a_noop() {
        let list: ConcurrentList<i32> = ConcurrentList::new();
        list.add(1);
        assert_eq!(list.remove(&42), 1);
    }
}
