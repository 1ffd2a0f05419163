//! Type-safe hit identifiers
//!
//! Every tracked unit (line, jump direction, switch arm) owns one slot of its
//! class's hits array. A unit whose location could not be resolved to a
//! tracked line carries [`HitId::UNRESOLVED`] and is never counted.

use std::fmt;

/// Dense index into a hits array, or `-1` when unresolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HitId(i32);

impl HitId {
    /// Sentinel for a unit that must never be incremented
    pub const UNRESOLVED: Self = Self(-1);

    /// Create a resolved id
    ///
    /// # Panics
    ///
    /// Debug assertion if `id` does not fit a non-negative `i32`.
    #[inline]
    #[must_use]
    pub fn new(id: u32) -> Self {
        debug_assert!(i32::try_from(id).is_ok(), "hit id {id} overflows");
        Self(i32::try_from(id).unwrap_or(i32::MAX))
    }

    /// Get the raw value (`-1` when unresolved)
    #[inline]
    #[must_use]
    pub const fn as_i32(self) -> i32 {
        self.0
    }

    /// Whether this id refers to an array slot
    #[inline]
    #[must_use]
    pub const fn is_resolved(self) -> bool {
        self.0 >= 0
    }

    /// Array index, `None` when unresolved
    #[inline]
    #[must_use]
    pub fn index(self) -> Option<usize> {
        usize::try_from(self.0).ok()
    }
}

impl Default for HitId {
    fn default() -> Self {
        Self::UNRESOLVED
    }
}

impl fmt::Display for HitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
