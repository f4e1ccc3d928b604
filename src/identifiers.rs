//! Type-safe identifiers.
//!
//! Newtype wrappers prevent mixing interceptor IDs with other integers.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::num::NonZeroU64;

// ============================================================================
// InterceptorId
// ============================================================================

/// Identifier of a session registration in a [`FlowRouter`](crate::FlowRouter).
///
/// Assigned by the router, starting at 1 and increasing monotonically.
/// IDs are never reused within one router.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InterceptorId(NonZeroU64);

impl InterceptorId {
    /// Creates an ID from a raw value.
    ///
    /// Returns `None` for zero.
    #[inline]
    #[must_use]
    pub fn from_u64(value: u64) -> Option<Self> {
        NonZeroU64::new(value).map(Self)
    }

    /// Returns the raw value.
    #[inline]
    #[must_use]
    pub fn as_u64(&self) -> u64 {
        self.0.get()
    }
}

impl fmt::Display for InterceptorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Tests
// ============================================================================
