//! Swipe, rescan and deduplicate loop over a scrolling list.
//!
//! # Example
//!
//! ```ignore
//! let report = ScrollScan::new(article)
//!     .with_bottom(no_more_results)
//!     .with_max_hits(20)
//!     .run(device.as_ref(), matcher.as_ref(), &mut hooks)
//!     .await?;
//!
//! println!("{} hits after {} swipes ({})", report.hits, report.swipes, report.stop);
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::sleep;
use tracing::{debug, info};

use crate::device::geometry::{Point, Rect, Resolution};
use crate::device::{Device, Feature, MatchResult, Matcher, Screen};
use crate::error::{Error, Result};

use super::dedup::{DedupTolerance, new_items};

// ============================================================================
// Constants
// ============================================================================

/// Default scroll step as a fraction of the screen height.
pub const DEFAULT_STEP: f32 = 0.15;

/// Largest scroll step accepted; larger steps are clamped.
pub const MAX_STEP: f32 = 0.75;

/// Default minimum match confidence.
pub const DEFAULT_THRESHOLD: f32 = 0.95;

/// Default delay after each swipe.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(1);

// ============================================================================
// Swipe
// ============================================================================

/// Swipe gesture used to scroll. Coordinates are screen fractions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Swipe {
    /// Vertical swipe up from three quarters of the screen height.
    Step(f32),
    /// Explicit start and end points.
    Points(Point, Point),
    /// Start point and displacement.
    Vector {
        /// Start point.
        from: Point,
        /// Displacement.
        delta: Point,
    },
}

impl Default for Swipe {
    fn default() -> Self {
        Self::Step(DEFAULT_STEP)
    }
}

impl Swipe {
    /// Returns the start and end points in pixels.
    #[must_use]
    pub fn resolve(&self, resolution: Resolution) -> (Point, Point) {
        let (from, to) = match *self {
            Self::Step(step) => {
                let step = step.min(MAX_STEP);
                (Point::new(0.5, 0.75), Point::new(0.5, 0.75 - step))
            }
            Self::Points(from, to) => (from, to),
            Self::Vector { from, delta } => (from, from + delta),
        };
        (resolution.point(from), resolution.point(to))
    }
}

// ============================================================================
// Hooks
// ============================================================================

/// Whether a scan should go on after a hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanControl {
    /// Keep scanning.
    Continue,
    /// End the scan.
    Stop,
}

/// Callbacks invoked serially by [`ScrollScan::run`].
///
/// Errors returned by a hook abort the scan and are propagated.
#[async_trait]
pub trait ScanHooks: Send {
    /// Called once per new item, top to bottom.
    async fn on_match(&mut self, item: &MatchResult) -> Result<ScanControl>;

    /// Called before each swipe.
    async fn before_swipe(&mut self) -> Result<ScanControl> {
        Ok(ScanControl::Continue)
    }

    /// Called after each swipe and its delay.
    async fn after_swipe(&mut self) -> Result<ScanControl> {
        Ok(ScanControl::Continue)
    }
}

// ============================================================================
// ScanReport
// ============================================================================

/// Why a scan ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The end-of-list marker became visible.
    BottomReached,
    /// `max_hits` items were reported.
    MaxHits,
    /// `max_swipes` swipes were performed and the last screen was scanned.
    MaxSwipes,
    /// A hook returned [`ScanControl::Stop`].
    Stopped,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::BottomReached => "bottom reached",
            Self::MaxHits => "max hits",
            Self::MaxSwipes => "max swipes",
            Self::Stopped => "stopped by hook",
        })
    }
}

/// Outcome of a finished scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanReport {
    /// Items passed to `on_match`.
    pub hits: usize,
    /// Swipes performed.
    pub swipes: usize,
    /// Why the scan ended.
    pub stop: StopReason,
}

// ============================================================================
// ScrollScan
// ============================================================================

/// Scan configuration.
///
/// Without `max_hits`, `max_swipes` or a bottom marker the scan only ends
/// when a hook stops it.
#[derive(Debug, Clone)]
pub struct ScrollScan {
    target: Feature,
    bottom: Option<Feature>,
    swipe: Swipe,
    region: Option<Rect>,
    max_hits: Option<usize>,
    max_swipes: Option<usize>,
    threshold: f32,
    interval: Duration,
    tolerance: DedupTolerance,
}

impl ScrollScan {
    /// Creates a scan for `target` with default settings.
    #[must_use]
    pub fn new(target: Feature) -> Self {
        Self {
            target,
            bottom: None,
            swipe: Swipe::default(),
            region: None,
            max_hits: None,
            max_swipes: None,
            threshold: DEFAULT_THRESHOLD,
            interval: DEFAULT_INTERVAL,
            tolerance: DedupTolerance::default(),
        }
    }

    /// Sets the end-of-list marker.
    #[must_use]
    pub fn with_bottom(mut self, bottom: Feature) -> Self {
        self.bottom = Some(bottom);
        self
    }

    /// Sets the swipe gesture.
    #[must_use]
    pub fn with_swipe(mut self, swipe: Swipe) -> Self {
        self.swipe = swipe;
        self
    }

    /// Restricts matching to a region given in screen fractions.
    #[must_use]
    pub fn with_region(mut self, region: Rect) -> Self {
        self.region = Some(region);
        self
    }

    /// Stops after `hits` items.
    #[must_use]
    pub fn with_max_hits(mut self, hits: usize) -> Self {
        self.max_hits = Some(hits);
        self
    }

    /// Stops after `swipes` swipes.
    #[must_use]
    pub fn with_max_swipes(mut self, swipes: usize) -> Self {
        self.max_swipes = Some(swipes);
        self
    }

    /// Sets the minimum match confidence.
    #[must_use]
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    /// Sets the delay after each swipe.
    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Sets the dedup tolerance.
    #[must_use]
    pub fn with_tolerance(mut self, tolerance: DedupTolerance) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for a non-positive step, a threshold outside
    /// `0.0..=1.0`, a zero hit limit or an invalid tolerance.
    pub fn validate(&self) -> Result<()> {
        if let Swipe::Step(step) = self.swipe
            && (step.is_nan() || step <= 0.0)
        {
            return Err(Error::config("scan step must be greater than zero"));
        }
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(Error::config("scan threshold must be within 0.0..=1.0"));
        }
        if self.max_hits == Some(0) {
            return Err(Error::config("max hits must be greater than zero"));
        }
        if !self.tolerance.is_valid() {
            return Err(Error::config("dedup tolerance must be finite and non-negative"));
        }
        Ok(())
    }
}

// ============================================================================
// Scan Loop
// ============================================================================

impl ScrollScan {
    /// Runs the scan.
    ///
    /// # Errors
    ///
    /// Returns configuration errors, device or matcher failures, and errors
    /// returned by hooks. Natural termination is reported in [`ScanReport`].
    pub async fn run(
        &self,
        device: &dyn Device,
        matcher: &dyn Matcher,
        hooks: &mut dyn ScanHooks,
    ) -> Result<ScanReport> {
        self.validate()?;

        let resolution = device.resolution().await?;
        let (from, to) = self.swipe.resolve(resolution);
        let displacement = to - from;
        let tolerance = self.tolerance.pixels(displacement);
        let region = self.region.map(|r| resolution.rect(r));

        debug!(
            feature = self.target.name(),
            dy = displacement.y,
            tolerance,
            "Scroll scan started"
        );

        let mut hits = 0;
        let mut swipes = 0;
        let mut previous = Vec::new();

        let stop = loop {
            let screen = device.capture_screen().await?;
            let current = self.find(&self.target, matcher, &screen, region)?;
            let bottom_row = match &self.bottom {
                Some(bottom) => self
                    .find(bottom, matcher, &screen, region)?
                    .iter()
                    .map(|m| m.position.y)
                    .reduce(f32::min),
                None => None,
            };

            let fresh = new_items(&current, &previous, displacement, tolerance, bottom_row);
            debug!(matches = current.len(), new = fresh.len(), swipes, "Scanned screen");

            let mut stopped = None;
            for item in &fresh {
                hits += 1;
                if hooks.on_match(item).await? == ScanControl::Stop {
                    stopped = Some(StopReason::Stopped);
                    break;
                }
                if self.max_hits.is_some_and(|max| hits >= max) {
                    stopped = Some(StopReason::MaxHits);
                    break;
                }
            }
            if let Some(reason) = stopped {
                break reason;
            }

            if bottom_row.is_some() {
                break StopReason::BottomReached;
            }
            if self.max_swipes.is_some_and(|max| swipes >= max) {
                break StopReason::MaxSwipes;
            }
            if hooks.before_swipe().await? == ScanControl::Stop {
                break StopReason::Stopped;
            }

            device.swipe(from, to).await?;
            swipes += 1;
            sleep(self.interval).await;

            if hooks.after_swipe().await? == ScanControl::Stop {
                break StopReason::Stopped;
            }
            previous = current;
        };

        let report = ScanReport { hits, swipes, stop };
        info!(hits, swipes, stop = %stop, "Scroll scan finished");
        Ok(report)
    }

    fn find(
        &self,
        feature: &Feature,
        matcher: &dyn Matcher,
        screen: &Screen,
        region: Option<Rect>,
    ) -> Result<Vec<MatchResult>> {
        let mut found = feature.locate_all(matcher, screen, region)?;
        found.retain(|m| m.confidence >= self.threshold);
        Ok(found)
    }
}

// ============================================================================
// Tests
// ============================================================================
