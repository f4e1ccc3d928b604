//! Page graph and navigation.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`PageGraph`] | Immutable pages, fragments and anchors |
//! | [`Navigator`] | Touches anchors and backs out using live recognition |
//!
//! Pages are recognized by features; anchors are clickable features with
//! declared destinations ([`ToWhere`]). Touching an anchor waits for the first
//! destination to show up and runs its [`EntryScript`].

// ============================================================================
// Submodules
// ============================================================================

/// Pages, fragments, anchors and the validating builder.
pub mod graph;

/// Anchor touching and back navigation.
pub mod navigator;

// ============================================================================
// Re-exports
// ============================================================================

pub use graph::{
    Anchor, DEFAULT_ACTIVATION_TIMEOUT, EntryScript, FnScript, Fragment, Page, PageGraph,
    PageGraphBuilder, ToWhere,
};
pub use navigator::{DEFAULT_DESTINATION_TIMEOUT, Navigator, TouchAnchor};
