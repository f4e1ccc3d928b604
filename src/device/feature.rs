//! Visual features and match results.
//!
//! A [`Feature`] names one or more [`Template`]s. It is visible on a screen
//! when any of its templates is found there. Templates are opaque to this
//! crate: they are handed to the [`Matcher`] as-is.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::Result;

use super::Matcher;
use super::Screen;
use super::geometry::{Point, Rect};

// ============================================================================
// Template
// ============================================================================

/// Handle to an image template understood by the matching engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    /// Template image location.
    pub path: PathBuf,

    /// Minimum confidence the engine should accept, if not its default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f32>,
}

impl Template {
    /// Creates a template with the engine's default threshold.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            threshold: None,
        }
    }

    /// Sets the acceptance threshold.
    #[must_use]
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = Some(threshold);
        self
    }

    /// Returns the template location.
    #[inline]
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

// ============================================================================
// TemplateMatch / MatchResult
// ============================================================================

/// One occurrence of a template reported by the matcher.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TemplateMatch {
    /// Point to touch (usually the center of `rect`).
    pub position: Point,

    /// Matched area in screen pixels.
    pub rect: Rect,

    /// Engine confidence in `0.0..=1.0`.
    pub confidence: f32,
}

/// One occurrence of a feature on screen.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
    /// Name of the matched feature.
    pub feature: String,

    /// Index of the template that matched within the feature.
    pub template: usize,

    /// Point to touch.
    pub position: Point,

    /// Matched area in screen pixels.
    pub rect: Rect,

    /// Engine confidence.
    pub confidence: f32,
}

impl MatchResult {
    fn from_template(feature: &str, template: usize, m: TemplateMatch) -> Self {
        Self {
            feature: feature.to_string(),
            template,
            position: m.position,
            rect: m.rect,
            confidence: m.confidence,
        }
    }
}

// ============================================================================
// Feature
// ============================================================================

/// Named any-of set of templates.
///
/// Cheap to clone.
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    name: Arc<str>,
    templates: Arc<[Template]>,
}

impl Feature {
    /// Creates a single-template feature.
    #[must_use]
    pub fn new(name: impl Into<String>, template: Template) -> Self {
        Self::any_of(name, vec![template])
    }

    /// Creates a feature visible when any of `templates` is.
    #[must_use]
    pub fn any_of(name: impl Into<String>, templates: Vec<Template>) -> Self {
        let name: String = name.into();
        Self {
            name: name.into(),
            templates: templates.into(),
        }
    }

    /// Returns the feature name.
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the templates.
    #[inline]
    #[must_use]
    pub fn templates(&self) -> &[Template] {
        &self.templates
    }

    /// Locates the feature on a screen.
    ///
    /// Templates are tried in order; the best match of the first template
    /// found is returned.
    pub fn locate(
        &self,
        matcher: &dyn Matcher,
        screen: &Screen,
        region: Option<Rect>,
    ) -> Result<Option<MatchResult>> {
        for (index, template) in self.templates.iter().enumerate() {
            if let Some(m) = matcher.find_best(template, screen, region)? {
                return Ok(Some(MatchResult::from_template(&self.name, index, m)));
            }
        }
        Ok(None)
    }

    /// Returns every occurrence of every template.
    pub fn locate_all(
        &self,
        matcher: &dyn Matcher,
        screen: &Screen,
        region: Option<Rect>,
    ) -> Result<Vec<MatchResult>> {
        let mut results = Vec::new();
        for (index, template) in self.templates.iter().enumerate() {
            results.extend(
                matcher
                    .find_all(template, screen, region)?
                    .into_iter()
                    .map(|m| MatchResult::from_template(&self.name, index, m)),
            );
        }
        Ok(results)
    }
}

// ============================================================================
// Visibility
// ============================================================================

/// Returns the first of `features` visible on `screen`.
///
/// Pure with respect to the screen: no device access, no waiting.
pub fn first_visible(
    features: &[Feature],
    matcher: &dyn Matcher,
    screen: &Screen,
) -> Result<Option<MatchResult>> {
    for feature in features {
        if let Some(found) = feature.locate(matcher, screen, None)? {
            return Ok(Some(found));
        }
    }
    Ok(None)
}

/// Returns `true` if any of `features` is visible on `screen`.
pub fn is_visible(features: &[Feature], matcher: &dyn Matcher, screen: &Screen) -> Result<bool> {
    Ok(first_visible(features, matcher, screen)?.is_some())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use crate::device::fake::{FakeState, blank_screen, feature};

    #[test]
    fn test_any_of_reports_matching_template() {
        let (state, matcher) = FakeState::shared_matcher();
        state.lock().show("comment_dark", 100.0, 200.0);

        let comments = Feature::any_of(
            "comments",
            vec![Template::new("comment_light"), Template::new("comment_dark")],
        );
        let found = comments
            .locate(matcher.as_ref(), &blank_screen(), None)
            .unwrap()
            .expect("visible");

        assert_eq!(found.feature, "comments");
        assert_eq!(found.template, 1);
        assert_eq!(found.position, Point::new(100.0, 200.0));
    }

    #[test]
    fn test_region_restricts_search() {
        let (state, matcher) = FakeState::shared_matcher();
        state.lock().show("item", 100.0, 1800.0);

        let region = Rect::new(0.0, 0.0, 1080.0, 1000.0);
        let found = feature("item")
            .locate_all(matcher.as_ref(), &blank_screen(), Some(region))
            .unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn test_is_visible_with_no_features() {
        let (_state, matcher) = FakeState::shared_matcher();
        assert!(!is_visible(&[], matcher.as_ref(), &blank_screen()).unwrap());
    }
}
