//! Method-local counter buffering
//!
//! In [`CounterStorage::MethodLocal`](crate::config::CounterStorage) mode an
//! invocation counts into a plain buffer covering only the ids its method
//! owns, and adds that buffer into the shared [`HitsArray`] once when it
//! leaves. The hot path is a plain add with no atomic traffic.

use super::HitsArray;
use crate::data::HitId;

/// Hit buffer for one method invocation
#[derive(Debug, Default)]
pub struct LocalHits {
    base: u32,
    local: Vec<u32>,
    pending: bool,
}

impl LocalHits {
    /// Create a zeroed buffer for ids `base..base + len`
    #[must_use]
    pub fn new(base: u32, len: u32) -> Self {
        Self {
            base,
            local: vec![0; len as usize],
            pending: false,
        }
    }

    /// Increment the local counter for `id`
    ///
    /// Returns `false` without counting when `id` is outside the method's
    /// range, as happens for a line shared with another method.
    #[inline(always)]
    pub fn increment(&mut self, id: HitId) -> bool {
        let Some(count) = self.slot(id).and_then(|slot| self.local.get_mut(slot)) else {
            return false;
        };
        *count = count.saturating_add(1);
        self.pending = true;
        true
    }

    /// Local count for `id` since the last flush
    #[inline]
    #[must_use]
    pub fn get(&self, id: HitId) -> u32 {
        self.slot(id)
            .and_then(|slot| self.local.get(slot))
            .copied()
            .unwrap_or(0)
    }

    fn slot(&self, id: HitId) -> Option<usize> {
        let index = u32::try_from(id.index()?).ok()?;
        index.checked_sub(self.base).map(|offset| offset as usize)
    }

    /// Add the buffered counts into `hits` and reset the buffer
    pub fn flush_into(&mut self, hits: &HitsArray) {
        if !self.pending {
            return;
        }
        for (offset, count) in self.local.iter_mut().enumerate() {
            if *count > 0 {
                let id = u32::try_from(offset).map_or(HitId::UNRESOLVED, |o| HitId::new(self.base + o));
                hits.add(id, *count);
                *count = 0;
            }
        }
        self.pending = false;
    }

    /// First id covered by the buffer
    #[must_use]
    pub fn base(&self) -> u32 {
        self.base
    }

    /// Number of ids covered by the buffer
    #[must_use]
    pub fn len(&self) -> usize {
        self.local.len()
    }

    /// Whether the buffer covers no ids
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.local.is_empty()
    }

    /// Whether any hit was counted since the last flush
    #[must_use]
    pub fn has_pending(&self) -> bool {
        self.pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_only_owned_range() {
        let mut local = LocalHits::new(3, 2);
        assert!(local.increment(HitId::new(3)));
        assert!(local.increment(HitId::new(4)));
        assert!(local.increment(HitId::new(4)));
        assert!(!local.increment(HitId::new(2)));
        assert!(!local.increment(HitId::new(5)));
        assert!(!local.increment(HitId::UNRESOLVED));
        assert_eq!(local.get(HitId::new(3)), 1);
        assert_eq!(local.get(HitId::new(4)), 2);
        assert_eq!(local.get(HitId::new(2)), 0);
        assert!(local.has_pending());
    }

    #[test]
    fn test_flush_adds_and_resets() {
        let hits = HitsArray::new(6);
        let mut local = LocalHits::new(3, 2);
        let _ = local.increment(HitId::new(4));
        local.flush_into(&hits);
        let _ = local.increment(HitId::new(4));
        local.flush_into(&hits);
        local.flush_into(&hits);
        assert_eq!(hits.snapshot(), vec![0, 0, 0, 0, 2, 0]);
        assert!(!local.has_pending());
        assert_eq!(local.get(HitId::new(4)), 0);
    }

    #[test]
    fn test_default_is_empty() {
        let local = LocalHits::default();
        assert!(local.is_empty());
        assert_eq!(local.base(), 0);
        assert_eq!(local.len(), 0);
    }
}
