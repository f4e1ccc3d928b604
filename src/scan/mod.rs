//! Scroll-and-deduplicate scanning of paginated lists.
//!
//! [`ScrollScan`] repeatedly captures the screen, reports matches of a target
//! feature that were not already visible before the last swipe, and swipes
//! on. Deduplication is the pure function [`new_items`].

// ============================================================================
// Submodules
// ============================================================================

/// Dedup tolerance and new-item detection.
pub mod dedup;

/// Scan configuration, hooks and loop.
pub mod scanner;

// ============================================================================
// Re-exports
// ============================================================================

pub use dedup::{DedupTolerance, new_items};
pub use scanner::{
    DEFAULT_INTERVAL, DEFAULT_STEP, DEFAULT_THRESHOLD, MAX_STEP, ScanControl, ScanHooks,
    ScanReport, ScrollScan, StopReason, Swipe,
};
