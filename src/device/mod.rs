//! Device and matching-engine seams.
//!
//! The crate never talks to a phone or runs template matching itself. Both
//! are external collaborators plugged in through two traits:
//!
//! | Trait | Responsibility |
//! |-------|----------------|
//! | [`Device`] | screenshots, touches, swipes, key events, resolution |
//! | [`Matcher`] | locating templates in a screenshot |
//!
//! Not finding a template is an empty result, never an error.
//!
//! # Example
//!
//! ```ignore
//! struct AdbDevice { /* ... */ }
//!
//! #[async_trait]
//! impl Device for AdbDevice {
//!     async fn capture_screen(&self) -> Result<Screen> { /* screencap */ }
//!     async fn touch(&self, point: Point) -> Result<()> { /* input tap */ }
//!     async fn swipe(&self, from: Point, to: Point) -> Result<()> { /* input swipe */ }
//!     async fn key_event(&self, key: &str) -> Result<()> { /* input keyevent */ }
//!     async fn resolution(&self) -> Result<Resolution> { /* wm size */ }
//! }
//! ```

// ============================================================================
// Submodules
// ============================================================================

/// Features, templates and match results.
pub mod feature;

/// Points, rectangles, resolutions and touch targets.
pub mod geometry;

#[cfg(test)]
pub(crate) mod fake;

// ============================================================================
// Imports
// ============================================================================

use async_trait::async_trait;

use crate::error::Result;

use feature::{Template, TemplateMatch};
use geometry::{Point, Rect, Resolution};

// ============================================================================
// Re-exports
// ============================================================================

pub use feature::{Feature, MatchResult, first_visible, is_visible};
pub use geometry::Target;

// ============================================================================
// Types
// ============================================================================

/// A captured screenshot.
pub type Screen = image::DynamicImage;

/// Key name of the system back button.
pub const KEY_BACK: &str = "BACK";

// ============================================================================
// Device
// ============================================================================

/// Device driver primitives.
///
/// Every call completes before returning; the navigator and scanner issue
/// them one at a time from the script task.
#[async_trait]
pub trait Device: Send + Sync {
    /// Captures the current screen.
    async fn capture_screen(&self) -> Result<Screen>;

    /// Taps at a pixel position.
    async fn touch(&self, point: Point) -> Result<()>;

    /// Swipes between two pixel positions.
    async fn swipe(&self, from: Point, to: Point) -> Result<()>;

    /// Sends a key event such as [`KEY_BACK`].
    async fn key_event(&self, key: &str) -> Result<()>;

    /// Returns the current screen resolution.
    async fn resolution(&self) -> Result<Resolution>;
}

// ============================================================================
// Matcher
// ============================================================================

/// Template matching engine.
pub trait Matcher: Send + Sync {
    /// Finds every occurrence of `template` on `screen`.
    ///
    /// With `region`, only occurrences inside it (pixel coordinates) are
    /// returned; positions stay in full-screen coordinates.
    fn find_all(
        &self,
        template: &Template,
        screen: &Screen,
        region: Option<Rect>,
    ) -> Result<Vec<TemplateMatch>>;

    /// Finds the most confident occurrence of `template`.
    fn find_best(
        &self,
        template: &Template,
        screen: &Screen,
        region: Option<Rect>,
    ) -> Result<Option<TemplateMatch>> {
        Ok(self
            .find_all(template, screen, region)?
            .into_iter()
            .max_by(|a, b| a.confidence.total_cmp(&b.confidence)))
    }
}
