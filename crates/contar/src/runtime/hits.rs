//! Class-owned hit counters
//!
//! Instrumented code on any number of threads increments the same array.
//! Increments use relaxed ordering: losing a hit under a race would be
//! acceptable, only zero versus non-zero has to be exact. Counters saturate
//! instead of wrapping so they never decrease.

use crate::data::HitId;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// Dense counter storage indexed by [`HitId`]
#[derive(Debug)]
pub struct HitsArray {
    counters: Box<[AtomicU32]>,
    touched: AtomicBool,
}

impl HitsArray {
    /// Create an array with `size` zeroed counters
    #[must_use]
    pub fn new(size: usize) -> Self {
        Self {
            counters: (0..size).map(|_| AtomicU32::new(0)).collect(),
            touched: AtomicBool::new(false),
        }
    }

    /// Increment one counter
    ///
    /// Unresolved ids are ignored. An out-of-range id is a defect: it trips a
    /// debug assertion and is skipped in release builds.
    #[inline]
    pub fn increment(&self, id: HitId) {
        self.add(id, 1);
    }

    /// Add `count` hits to one counter
    #[inline]
    pub fn add(&self, id: HitId, count: u32) {
        let Some(idx) = id.index() else {
            return;
        };
        let Some(cell) = self.counters.get(idx) else {
            debug_assert!(false, "hit id {id} out of range for {} counters", self.counters.len());
            return;
        };
        let current = cell.load(Ordering::Relaxed);
        if current == u32::MAX || count == 0 {
            return;
        }
        let next = current.saturating_add(count);
        // A concurrent increment between load and this add is tolerated
        let _ = cell.fetch_add(next - current, Ordering::Relaxed);
        if cell.load(Ordering::Relaxed) < current {
            cell.store(u32::MAX, Ordering::Relaxed);
        }
    }

    /// Current value of a counter (0 for unresolved or out-of-range ids)
    #[inline]
    #[must_use]
    pub fn get(&self, id: HitId) -> u32 {
        id.index()
            .and_then(|idx| self.counters.get(idx))
            .map_or(0, |c| c.load(Ordering::Relaxed))
    }

    /// Copy of all counters
    #[must_use]
    pub fn snapshot(&self) -> Vec<u32> {
        self.counters
            .iter()
            .map(|c| c.load(Ordering::Relaxed))
            .collect()
    }

    /// Number of counters
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.counters.len()
    }

    /// Whether the array has no counters
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }

    /// Record that code of the owning class ran
    #[inline]
    pub fn touch(&self) {
        self.touched.store(true, Ordering::Relaxed);
    }

    /// Whether any instrumented method of the owning class ran
    #[must_use]
    pub fn is_touched(&self) -> bool {
        self.touched.load(Ordering::Relaxed)
    }

    /// Number of counters with at least one hit
    #[must_use]
    pub fn covered_count(&self) -> usize {
        self.counters
            .iter()
            .filter(|c| c.load(Ordering::Relaxed) > 0)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_increment_and_get() {
        let hits = HitsArray::new(3);
        hits.increment(HitId::new(1));
        hits.increment(HitId::new(1));
        assert_eq!(hits.get(HitId::new(1)), 2);
        assert_eq!(hits.get(HitId::new(0)), 0);
        assert_eq!(hits.snapshot(), vec![0, 2, 0]);
        assert_eq!(hits.covered_count(), 1);
    }

    #[test]
    fn test_unresolved_is_ignored() {
        let hits = HitsArray::new(2);
        hits.increment(HitId::UNRESOLVED);
        assert_eq!(hits.snapshot(), vec![0, 0]);
        assert_eq!(hits.get(HitId::UNRESOLVED), 0);
    }

    #[test]
    #[cfg(not(debug_assertions))]
    fn test_out_of_range_skipped_in_release() {
        let hits = HitsArray::new(1);
        hits.increment(HitId::new(5));
        assert_eq!(hits.snapshot(), vec![0]);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "out of range")]
    fn test_out_of_range_panics_in_debug() {
        let hits = HitsArray::new(1);
        hits.increment(HitId::new(5));
    }

    #[test]
    fn test_saturates() {
        let hits = HitsArray::new(1);
        hits.add(HitId::new(0), u32::MAX - 1);
        hits.add(HitId::new(0), 10);
        assert_eq!(hits.get(HitId::new(0)), u32::MAX);
        hits.increment(HitId::new(0));
        assert_eq!(hits.get(HitId::new(0)), u32::MAX);
    }

    #[test]
    fn test_touch() {
        let hits = HitsArray::new(0);
        assert!(hits.is_empty());
        assert!(!hits.is_touched());
        hits.touch();
        assert!(hits.is_touched());
    }

    #[test]
    fn test_concurrent_increments_are_counted() {
        const THREADS: u32 = 4;
        const PER_THREAD: u32 = 10_000;
        let hits = Arc::new(HitsArray::new(1));
        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let hits = Arc::clone(&hits);
                thread::spawn(move || {
                    for _ in 0..PER_THREAD {
                        hits.increment(HitId::new(0));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(hits.get(HitId::new(0)), THREADS * PER_THREAD);
    }
}
