//! Deciding which matches are new after a scroll.

use serde::{Deserialize, Serialize};

use crate::device::MatchResult;
use crate::device::geometry::Point;

// ============================================================================
// DedupTolerance
// ============================================================================

/// Allowed position error when comparing a match with a scrolled one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DedupTolerance {
    /// Fraction of the swipe displacement length.
    Ratio(f32),
    /// Fixed number of pixels.
    Pixels(f32),
}

impl Default for DedupTolerance {
    fn default() -> Self {
        Self::Ratio(0.1)
    }
}

impl DedupTolerance {
    /// Returns the tolerance in pixels for a swipe displacement.
    #[inline]
    #[must_use]
    pub fn pixels(&self, displacement: Point) -> f32 {
        match *self {
            Self::Ratio(ratio) => ratio * displacement.length(),
            Self::Pixels(pixels) => pixels,
        }
    }

    /// Returns `true` for a finite, non-negative tolerance.
    #[inline]
    #[must_use]
    pub fn is_valid(&self) -> bool {
        let value = match *self {
            Self::Ratio(v) | Self::Pixels(v) => v,
        };
        value.is_finite() && value >= 0.0
    }
}

// ============================================================================
// new_items
// ============================================================================

/// Returns the matches of `current` not seen on the previous screen.
///
/// A match is already seen when some match of `previous`, moved by
/// `displacement`, lies within `tolerance` of it on both axes. Matches at or
/// below `bottom_row` are dropped. The result is ordered top to bottom, then
/// left to right.
///
/// # Arguments
///
/// * `current` - Matches on the screen just captured
/// * `previous` - Matches on the screen before the swipe
/// * `displacement` - Expected movement of content caused by the swipe
/// * `tolerance` - Allowed position error in pixels
/// * `bottom_row` - Vertical position of the end-of-list marker, if visible
#[must_use]
pub fn new_items(
    current: &[MatchResult],
    previous: &[MatchResult],
    displacement: Point,
    tolerance: f32,
    bottom_row: Option<f32>,
) -> Vec<MatchResult> {
    let mut fresh: Vec<MatchResult> = current
        .iter()
        .filter(|m| bottom_row.is_none_or(|row| m.position.y < row))
        .filter(|m| !previous.iter().any(|p| same_item(p, m, displacement, tolerance)))
        .cloned()
        .collect();

    fresh.sort_by(|a, b| {
        a.position
            .y
            .total_cmp(&b.position.y)
            .then(a.position.x.total_cmp(&b.position.x))
    });
    fresh
}

#[inline]
fn same_item(before: &MatchResult, after: &MatchResult, displacement: Point, tolerance: f32) -> bool {
    let expected = before.position + displacement;
    (expected.x - after.position.x).abs() <= tolerance
        && (expected.y - after.position.y).abs() <= tolerance
}

// ============================================================================
// Tests
// ============================================================================
