//! Screen geometry: points, rectangles, resolutions and touch targets.
//!
//! Pixel coordinates use the device's screen orientation with the origin at
//! the top-left corner. Relative coordinates are fractions of the screen in
//! `0.0..=1.0` on both axes.

use std::ops::{Add, Sub};

use serde::{Deserialize, Serialize};

use super::feature::Feature;

// ============================================================================
// Point
// ============================================================================

/// A position or displacement on screen.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal coordinate.
    pub x: f32,
    /// Vertical coordinate.
    pub y: f32,
}

impl Point {
    /// Creates a point.
    #[inline]
    #[must_use]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Returns this point moved by `(dx, dy)`.
    #[inline]
    #[must_use]
    pub fn offset(self, dx: f32, dy: f32) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }

    /// Returns the Euclidean length of this point taken as a vector.
    #[inline]
    #[must_use]
    pub fn length(self) -> f32 {
        self.x.hypot(self.y)
    }
}

impl Add for Point {
    type Output = Point;

    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Point {
    type Output = Point;

    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

// ============================================================================
// Rect
// ============================================================================

/// Axis-aligned rectangle.
///
/// Used both in pixels and, for search regions, in relative fractions.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    /// Left edge.
    pub left: f32,
    /// Top edge.
    pub top: f32,
    /// Right edge.
    pub right: f32,
    /// Bottom edge.
    pub bottom: f32,
}

impl Rect {
    /// Creates a rectangle from its edges.
    #[inline]
    #[must_use]
    pub const fn new(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Creates a rectangle of the given size centered on `center`.
    #[must_use]
    pub fn around(center: Point, width: f32, height: f32) -> Self {
        Self::new(
            center.x - width / 2.0,
            center.y - height / 2.0,
            center.x + width / 2.0,
            center.y + height / 2.0,
        )
    }

    /// Returns the width.
    #[inline]
    #[must_use]
    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    /// Returns the height.
    #[inline]
    #[must_use]
    pub fn height(&self) -> f32 {
        self.bottom - self.top
    }

    /// Returns the center point.
    #[inline]
    #[must_use]
    pub fn center(&self) -> Point {
        Point::new(
            (self.left + self.right) / 2.0,
            (self.top + self.bottom) / 2.0,
        )
    }

    /// Returns `true` if `point` lies inside (edges included).
    #[inline]
    #[must_use]
    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.left && point.x <= self.right && point.y >= self.top && point.y <= self.bottom
    }
}

// ============================================================================
// Resolution
// ============================================================================

/// Screen size in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Resolution {
    /// Creates a resolution.
    #[inline]
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Converts a relative point to pixels.
    #[must_use]
    pub fn point(&self, relative: Point) -> Point {
        Point::new(
            relative.x * self.width as f32,
            relative.y * self.height as f32,
        )
    }

    /// Converts a relative rectangle to pixels.
    #[must_use]
    pub fn rect(&self, relative: Rect) -> Rect {
        let top_left = self.point(Point::new(relative.left, relative.top));
        let bottom_right = self.point(Point::new(relative.right, relative.bottom));
        Rect::new(top_left.x, top_left.y, bottom_right.x, bottom_right.y)
    }
}

// ============================================================================
// Target
// ============================================================================

/// Something that can be touched.
///
/// Scripts may name a feature, an absolute pixel position, or a position
/// relative to the screen size. The navigator resolves it to pixels once.
#[derive(Debug, Clone)]
pub enum Target {
    /// Location of a recognized feature.
    Feature(Feature),
    /// Absolute pixel position.
    Absolute(Point),
    /// Fraction of the screen size on each axis.
    Relative(Point),
}

impl Target {
    /// Creates an absolute target.
    #[inline]
    #[must_use]
    pub fn at(x: f32, y: f32) -> Self {
        Self::Absolute(Point::new(x, y))
    }

    /// Creates a relative target.
    #[inline]
    #[must_use]
    pub fn relative(x: f32, y: f32) -> Self {
        Self::Relative(Point::new(x, y))
    }
}

impl From<Feature> for Target {
    fn from(feature: Feature) -> Self {
        Self::Feature(feature)
    }
}

impl From<Point> for Target {
    fn from(point: Point) -> Self {
        Self::Absolute(point)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_arithmetic() {
        let a = Point::new(10.0, 20.0);
        let b = Point::new(3.0, -5.0);
        assert_eq!(a + b, Point::new(13.0, 15.0));
        assert_eq!(a - b, Point::new(7.0, 25.0));
        assert_eq!(Point::new(3.0, 4.0).length(), 5.0);
    }

    #[test]
    fn test_resolution_converts_relative() {
        let res = Resolution::new(1080, 1920);
        assert_eq!(res.point(Point::new(0.5, 0.75)), Point::new(540.0, 1440.0));

        let rect = res.rect(Rect::new(0.0, 0.1, 1.0, 0.9));
        assert_eq!(rect.top, 192.0);
        assert_eq!(rect.bottom, 1728.0);
        assert_eq!(rect.width(), 1080.0);
    }

    #[test]
    fn test_rect_contains_edges() {
        let rect = Rect::around(Point::new(50.0, 50.0), 20.0, 10.0);
        assert!(rect.contains(Point::new(40.0, 45.0)));
        assert!(rect.contains(rect.center()));
        assert!(!rect.contains(Point::new(39.0, 50.0)));
    }
}
