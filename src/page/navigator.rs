//! Screen-driven navigation over a [`PageGraph`].
//!
//! The navigator keeps no notion of a current page. Every decision is made by
//! capturing a fresh screenshot and asking the matcher which features are
//! visible on it.
//!
//! # Example
//!
//! ```ignore
//! let nav = Navigator::new(graph, device, matcher, NavigationOptions::default());
//!
//! nav.touch_anchor("to_detail", TouchAnchor::new()).await?;
//! nav.back_to("home", None).await?;
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::time::{Instant, sleep};
use tracing::{debug, error, info};

use crate::bot::NavigationOptions;
use crate::device::geometry::{Point, Target};
use crate::device::{Device, Feature, KEY_BACK, MatchResult, Matcher, Screen, first_visible};
use crate::error::{Error, Result};

use super::graph::{EntryScript, Fragment, Page, PageGraph};

// ============================================================================
// Constants
// ============================================================================

/// Default time allowed for an anchor's destination to show up.
pub const DEFAULT_DESTINATION_TIMEOUT: Duration = Duration::from_secs(10);

// ============================================================================
// TouchAnchor
// ============================================================================

/// Parameters of [`Navigator::touch_anchor`].
#[derive(Debug, Clone)]
pub struct TouchAnchor {
    /// Position to touch instead of the anchor's feature.
    pub position: Option<Target>,

    /// Press back after the destination's script ran.
    pub auto_back: bool,

    /// Wait for a destination and run its script.
    pub run_script: bool,

    /// Time allowed for a destination to become visible.
    pub timeout: Duration,

    /// Extra arguments handed to the destination's script.
    pub args: Value,
}

impl Default for TouchAnchor {
    fn default() -> Self {
        Self {
            position: None,
            auto_back: true,
            run_script: true,
            timeout: DEFAULT_DESTINATION_TIMEOUT,
            args: Value::Null,
        }
    }
}

impl TouchAnchor {
    /// Creates default parameters: touch the feature, run the script, go back.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Touches `target` instead of the anchor's feature.
    #[inline]
    #[must_use]
    pub fn with_position(mut self, target: impl Into<Target>) -> Self {
        self.position = Some(target.into());
        self
    }

    /// Enables or disables the back key after the script.
    #[inline]
    #[must_use]
    pub fn with_auto_back(mut self, auto_back: bool) -> Self {
        self.auto_back = auto_back;
        self
    }

    /// Enables or disables waiting for the destination.
    #[inline]
    #[must_use]
    pub fn with_run_script(mut self, run_script: bool) -> Self {
        self.run_script = run_script;
        self
    }

    /// Sets the destination timeout.
    #[inline]
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the script arguments.
    #[inline]
    #[must_use]
    pub fn with_args(mut self, args: Value) -> Self {
        self.args = args;
        self
    }
}

// ============================================================================
// Navigator
// ============================================================================

/// Drives a device through a page graph.
#[derive(Clone)]
pub struct Navigator {
    graph: Arc<PageGraph>,
    device: Arc<dyn Device>,
    matcher: Arc<dyn Matcher>,
    options: NavigationOptions,
}

impl fmt::Debug for Navigator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Navigator")
            .field("pages", &self.graph.len())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Navigator {
    /// Creates a navigator.
    #[must_use]
    pub fn new(
        graph: Arc<PageGraph>,
        device: Arc<dyn Device>,
        matcher: Arc<dyn Matcher>,
        options: NavigationOptions,
    ) -> Self {
        Self {
            graph,
            device,
            matcher,
            options,
        }
    }

    /// Returns the page graph.
    #[inline]
    #[must_use]
    pub fn graph(&self) -> &PageGraph {
        &self.graph
    }

    /// Returns the device.
    #[inline]
    #[must_use]
    pub fn device(&self) -> &Arc<dyn Device> {
        &self.device
    }

    /// Returns the matcher.
    #[inline]
    #[must_use]
    pub fn matcher(&self) -> &Arc<dyn Matcher> {
        &self.matcher
    }

    /// Returns the timings.
    #[inline]
    #[must_use]
    pub fn options(&self) -> &NavigationOptions {
        &self.options
    }
}

// ============================================================================
// Recognition
// ============================================================================

impl Navigator {
    /// Captures the current screen.
    pub async fn capture(&self) -> Result<Screen> {
        self.device.capture_screen().await
    }

    /// Polls until any of `features` is visible or `timeout` elapses.
    ///
    /// At least one screenshot is always examined, so a zero timeout is a
    /// single probe.
    pub async fn wait_any(
        &self,
        features: &[Feature],
        timeout: Duration,
    ) -> Result<Option<MatchResult>> {
        let deadline = Instant::now() + timeout;
        loop {
            let screen = self.capture().await?;
            if let Some(found) = first_visible(features, self.matcher.as_ref(), &screen)? {
                return Ok(Some(found));
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            sleep(self.options.poll_interval.min(deadline - now)).await;
        }
    }

    /// Polls for a single feature.
    pub async fn wait_feature(
        &self,
        feature: &Feature,
        timeout: Duration,
    ) -> Result<Option<MatchResult>> {
        self.wait_any(std::slice::from_ref(feature), timeout).await
    }

    /// Returns `true` if any of `features` shows up within `timeout`.
    ///
    /// An empty set is never visible.
    pub async fn exists(&self, features: &[Feature], timeout: Duration) -> Result<bool> {
        if features.is_empty() {
            return Ok(false);
        }
        Ok(self.wait_any(features, timeout).await?.is_some())
    }

    /// Returns `true` if the page shows up within `timeout`.
    ///
    /// A page without features is never considered active.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PageNotFound`] for an undefined page.
    pub async fn is_page_active(&self, page: &str, timeout: Duration) -> Result<bool> {
        let page = self.lookup_page(page)?;
        self.page_visible(page, timeout).await
    }

    /// Returns `true` if the fragment shows up within `timeout`, defaulting to
    /// the fragment's activation timeout.
    ///
    /// A fragment without features is assumed active once the timeout has
    /// elapsed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PageNotFound`] or [`Error::FragmentNotFound`] for an
    /// undefined destination.
    pub async fn is_fragment_active(
        &self,
        page: &str,
        fragment: &str,
        timeout: Option<Duration>,
    ) -> Result<bool> {
        let page = self.lookup_page(page)?;
        let fragment = self.lookup_fragment(page, fragment)?;
        let timeout = timeout.unwrap_or(fragment.activation_timeout());
        self.fragment_visible(fragment, timeout).await
    }

    async fn page_visible(&self, page: &Page, timeout: Duration) -> Result<bool> {
        self.exists(page.features(), timeout).await
    }

    async fn fragment_visible(&self, fragment: &Fragment, timeout: Duration) -> Result<bool> {
        if fragment.features().is_empty() {
            sleep(timeout).await;
            return Ok(true);
        }
        self.exists(fragment.features(), timeout).await
    }
}

// ============================================================================
// Device Actions
// ============================================================================

impl Navigator {
    /// Resolves a target to a pixel position.
    ///
    /// Features are polled for up to the configured find timeout. Returns
    /// `None` if the feature never showed up.
    pub async fn resolve(&self, target: &Target) -> Result<Option<Point>> {
        match target {
            Target::Feature(feature) => Ok(self
                .wait_feature(feature, self.options.find_timeout)
                .await?
                .map(|m| m.position)),
            Target::Absolute(point) => Ok(Some(*point)),
            Target::Relative(point) => Ok(Some(self.device.resolution().await?.point(*point))),
        }
    }

    /// Touches a target. Returns `false` if it could not be resolved.
    pub async fn touch(&self, target: &Target) -> Result<bool> {
        let Some(point) = self.resolve(target).await? else {
            return Ok(false);
        };
        debug!(x = point.x, y = point.y, "Touch");
        self.device.touch(point).await?;
        Ok(true)
    }

    /// Swipes between two targets. Returns `false` if either could not be
    /// resolved.
    pub async fn swipe(&self, from: &Target, to: &Target) -> Result<bool> {
        let (Some(from), Some(to)) = (self.resolve(from).await?, self.resolve(to).await?) else {
            return Ok(false);
        };
        debug!(from_x = from.x, from_y = from.y, to_x = to.x, to_y = to.y, "Swipe");
        self.device.swipe(from, to).await?;
        Ok(true)
    }

    /// Presses the system back key.
    pub async fn go_back(&self) -> Result<()> {
        debug!("Back");
        self.device.key_event(KEY_BACK).await
    }

    /// Captures the screen and writes it to `path`.
    ///
    /// The image format follows the file extension.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Image`] if encoding or writing fails.
    pub async fn save_screenshot(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let screen = self.capture().await?;
        screen.save(path)?;
        debug!(path = %path.display(), "Screenshot saved");
        Ok(())
    }
}

// ============================================================================
// Graph Navigation
// ============================================================================

impl Navigator {
    /// Touches an anchor and enters the first destination that shows up.
    ///
    /// Destinations are tried in declaration order. A destination on another
    /// page gets `timeout` to show up; when it does its entry script runs,
    /// followed by a back key if `auto_back` is set. A fragment of the
    /// anchor's own page is probed the same way but its script never presses
    /// back. The anchor's own page is waited out for `timeout` and then probed
    /// once. After a destination on the anchor's own page has been tried, the
    /// remaining destinations are probed with a zero timeout.
    ///
    /// # Arguments
    ///
    /// * `anchor` - Anchor name
    /// * `params` - Touch position, destination timeout and script arguments
    ///
    /// # Errors
    ///
    /// - [`Error::AnchorNotFound`] if the anchor is undefined
    /// - [`Error::ParameterIncorrect`] if neither a position nor a feature is
    ///   available
    /// - [`Error::TouchFailed`] if the touch location cannot be resolved or no
    ///   destination shows up
    pub async fn touch_anchor(&self, anchor: &str, params: TouchAnchor) -> Result<()> {
        let (page, definition) = self
            .graph
            .anchor(anchor)
            .ok_or_else(|| fail(Error::anchor_not_found(anchor)))?;

        let target = match (params.position, definition.feature()) {
            (Some(position), _) => position,
            (None, Some(feature)) => Target::Feature(feature.clone()),
            (None, None) => {
                return Err(fail(Error::parameter_incorrect(format!(
                    "anchor {anchor} has no feature and no position was given"
                ))));
            }
        };

        debug!(anchor, page = page.name(), "Touching anchor");
        if !self.touch(&target).await? {
            return Err(fail(Error::touch_failed(anchor, "touch location not found")));
        }
        if !params.run_script {
            return Ok(());
        }

        let mut timeout = params.timeout;
        for dest in definition.targets() {
            let dest_page = self.lookup_page(dest.page_name())?;
            let fragment = match dest.fragment_name() {
                Some(name) => Some(self.lookup_fragment(dest_page, name)?),
                None => None,
            };

            if dest_page.name() != page.name() {
                let entered = match fragment {
                    Some(fragment) => self.fragment_visible(fragment, timeout).await?,
                    None => self.page_visible(dest_page, timeout).await?,
                };
                if entered {
                    info!(anchor, destination = %dest, "Entered destination");
                    let script = fragment.map_or(dest_page.script(), Fragment::script);
                    return self.enter(script, params.auto_back, &params.args).await;
                }
            } else {
                match fragment {
                    Some(fragment) => {
                        if self.fragment_visible(fragment, timeout).await? {
                            info!(anchor, destination = %dest, "Entered fragment");
                            return self.enter(fragment.script(), false, &params.args).await;
                        }
                    }
                    None => {
                        sleep(timeout).await;
                        if self.page_visible(dest_page, Duration::ZERO).await? {
                            info!(anchor, destination = %dest, "Stayed on page");
                            return Ok(());
                        }
                    }
                }
                timeout = Duration::ZERO;
            }
        }

        Err(fail(Error::touch_failed(anchor, "no destination became visible")))
    }

    /// Backs out until `page` (or one of its fragments) is visible.
    ///
    /// Each step first looks for an anchor on `page` leading exactly to the
    /// target and touches it. Without one, the system back key is pressed.
    ///
    /// # Errors
    ///
    /// - [`Error::PageNotFound`] / [`Error::FragmentNotFound`] for an
    ///   undefined target
    /// - [`Error::ParameterIncorrect`] if the target page has no features
    /// - [`Error::BackExhausted`] if `max_back_steps` is set and reached
    pub async fn back_to(&self, page: &str, fragment: Option<&str>) -> Result<()> {
        let definition = self.lookup_page(page)?;
        let features = match fragment {
            Some(name) => {
                let fragment = self.lookup_fragment(definition, name)?;
                if fragment.features().is_empty() {
                    debug!(page, fragment = name, "Fragment has no features, treated as reached");
                    return Ok(());
                }
                fragment.features()
            }
            None if definition.features().is_empty() => {
                return Err(fail(Error::parameter_incorrect(format!(
                    "page {page} has no features to recognize it by"
                ))));
            }
            None => definition.features(),
        };

        let anchors: Vec<_> = definition
            .anchors_to(page, fragment)
            .filter_map(|a| a.feature().map(|f| (a.name(), f)))
            .collect();
        let target = fragment.map_or_else(|| page.to_string(), |f| format!("{page}/{f}"));

        let mut steps = 0u32;
        while !self
            .exists(features, self.options.back_probe_timeout)
            .await?
        {
            if let Some(max) = self.options.max_back_steps
                && steps >= max
            {
                return Err(fail(Error::back_exhausted(&target, steps)));
            }
            steps += 1;

            let mut touched = false;
            for (name, feature) in &anchors {
                if let Some(found) = self
                    .wait_feature(feature, self.options.anchor_probe_timeout)
                    .await?
                {
                    debug!(anchor = name, target = %target, "Back through anchor");
                    self.device.touch(found.position).await?;
                    touched = true;
                    break;
                }
            }
            if !touched {
                self.go_back().await?;
            }
        }

        info!(target = %target, steps, "Back at target");
        Ok(())
    }

    async fn enter(
        &self,
        script: Option<&Arc<dyn EntryScript>>,
        auto_back: bool,
        args: &Value,
    ) -> Result<()> {
        if let Some(script) = script {
            script.run(self, args).await?;
        }
        if auto_back {
            self.go_back().await?;
        }
        Ok(())
    }

    fn lookup_page(&self, name: &str) -> Result<&Page> {
        self.graph
            .page(name)
            .ok_or_else(|| fail(Error::page_not_found(name)))
    }

    fn lookup_fragment<'a>(&self, page: &'a Page, name: &str) -> Result<&'a Fragment> {
        page.fragment(name)
            .ok_or_else(|| fail(Error::fragment_not_found(page.name(), name)))
    }
}

/// Logs a navigation error before it is returned.
fn fail(err: Error) -> Error {
    error!(error = %err, "Navigation failed");
    err
}

// ============================================================================
// Tests
// ============================================================================
