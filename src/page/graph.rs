//! Page graph definition.
//!
//! Pages, fragments and anchors are declared once at startup through
//! [`PageGraphBuilder`], which rejects duplicate names and edges pointing at
//! undefined pages or fragments. The built graph is immutable and shared
//! behind an `Arc`.
//!
//! # Example
//!
//! ```ignore
//! let graph = PageGraph::builder()
//!     .page(
//!         Page::new("home")
//!             .with_feature(home_tab)
//!             .with_anchor(Anchor::new("to_detail").with_feature(card).to(ToWhere::page("detail"))),
//!     )
//!     .page(Page::new("detail").with_feature(detail_title).with_script(ReadDetail))
//!     .build()?;
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rustc_hash::{FxHashMap, FxHashSet};
use serde_json::Value;
use tracing::debug;

use crate::device::Feature;
use crate::error::{Error, Result};

use super::navigator::Navigator;

// ============================================================================
// Constants
// ============================================================================

/// Default time allowed for a fragment to show up.
pub const DEFAULT_ACTIVATION_TIMEOUT: Duration = Duration::from_secs(5);

// ============================================================================
// EntryScript
// ============================================================================

/// Script run after a page or fragment is entered through an anchor.
///
/// `args` are the caller's extra arguments passed through
/// [`TouchAnchor::with_args`](super::TouchAnchor::with_args).
#[async_trait]
pub trait EntryScript: Send + Sync {
    /// Runs the script.
    async fn run(&self, nav: &Navigator, args: &Value) -> Result<()>;
}

/// Adapter turning a synchronous closure into an [`EntryScript`].
pub struct FnScript<F>(pub F);

#[async_trait]
impl<F> EntryScript for FnScript<F>
where
    F: Fn(&Navigator, &Value) -> Result<()> + Send + Sync,
{
    async fn run(&self, nav: &Navigator, args: &Value) -> Result<()> {
        (self.0)(nav, args)
    }
}

// ============================================================================
// ToWhere
// ============================================================================

/// Declared destination of an anchor.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ToWhere {
    page: String,
    fragment: Option<String>,
}

impl ToWhere {
    /// Destination is a page.
    #[inline]
    #[must_use]
    pub fn page(page: impl Into<String>) -> Self {
        Self {
            page: page.into(),
            fragment: None,
        }
    }

    /// Destination is a fragment of a page.
    #[inline]
    #[must_use]
    pub fn fragment(page: impl Into<String>, fragment: impl Into<String>) -> Self {
        Self {
            page: page.into(),
            fragment: Some(fragment.into()),
        }
    }

    /// Returns the destination page name.
    #[inline]
    #[must_use]
    pub fn page_name(&self) -> &str {
        &self.page
    }

    /// Returns the destination fragment name, if any.
    #[inline]
    #[must_use]
    pub fn fragment_name(&self) -> Option<&str> {
        self.fragment.as_deref()
    }

    /// Returns `true` if this edge leads exactly to `page`/`fragment`.
    #[inline]
    #[must_use]
    pub fn leads_to(&self, page: &str, fragment: Option<&str>) -> bool {
        self.page == page && self.fragment.as_deref() == fragment
    }
}

impl fmt::Display for ToWhere {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.fragment {
            Some(fragment) => write!(f, "{}/{}", self.page, fragment),
            None => f.write_str(&self.page),
        }
    }
}

// ============================================================================
// Anchor
// ============================================================================

/// Named clickable element with declared navigation outcomes.
#[derive(Debug, Clone)]
pub struct Anchor {
    name: String,
    feature: Option<Feature>,
    targets: Vec<ToWhere>,
}

impl Anchor {
    /// Creates an anchor without a feature or destinations.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            feature: None,
            targets: Vec::new(),
        }
    }

    /// Sets the feature used to locate the anchor.
    #[must_use]
    pub fn with_feature(mut self, feature: Feature) -> Self {
        self.feature = Some(feature);
        self
    }

    /// Appends a destination. Destinations are tried in declaration order.
    #[must_use]
    pub fn to(mut self, target: ToWhere) -> Self {
        self.targets.push(target);
        self
    }

    /// Returns the anchor name.
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the anchor feature, if any.
    #[inline]
    #[must_use]
    pub fn feature(&self) -> Option<&Feature> {
        self.feature.as_ref()
    }

    /// Returns the destinations.
    #[inline]
    #[must_use]
    pub fn targets(&self) -> &[ToWhere] {
        &self.targets
    }
}

// ============================================================================
// Fragment
// ============================================================================

/// Sub-state of a page, such as a dialog or a revealed panel.
#[derive(Clone)]
pub struct Fragment {
    name: String,
    features: Vec<Feature>,
    script: Option<Arc<dyn EntryScript>>,
    activation_timeout: Duration,
}

impl fmt::Debug for Fragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fragment")
            .field("name", &self.name)
            .field("features", &self.features.len())
            .field("has_script", &self.script.is_some())
            .field("activation_timeout", &self.activation_timeout)
            .finish()
    }
}

impl Fragment {
    /// Creates a fragment with the default activation timeout.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            features: Vec::new(),
            script: None,
            activation_timeout: DEFAULT_ACTIVATION_TIMEOUT,
        }
    }

    /// Adds an identifying feature.
    #[must_use]
    pub fn with_feature(mut self, feature: Feature) -> Self {
        self.features.push(feature);
        self
    }

    /// Sets the entry script.
    #[must_use]
    pub fn with_script(mut self, script: impl EntryScript + 'static) -> Self {
        self.script = Some(Arc::new(script));
        self
    }

    /// Sets the activation timeout.
    #[must_use]
    pub fn with_activation_timeout(mut self, timeout: Duration) -> Self {
        self.activation_timeout = timeout;
        self
    }

    /// Returns the fragment name.
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the identifying features.
    #[inline]
    #[must_use]
    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    /// Returns the entry script.
    #[inline]
    #[must_use]
    pub fn script(&self) -> Option<&Arc<dyn EntryScript>> {
        self.script.as_ref()
    }

    /// Returns the activation timeout.
    #[inline]
    #[must_use]
    pub fn activation_timeout(&self) -> Duration {
        self.activation_timeout
    }
}

// ============================================================================
// Page
// ============================================================================

/// Recognizable application screen.
#[derive(Clone)]
pub struct Page {
    name: String,
    features: Vec<Feature>,
    anchors: Vec<Anchor>,
    fragments: Vec<Fragment>,
    script: Option<Arc<dyn EntryScript>>,
}

impl fmt::Debug for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Page")
            .field("name", &self.name)
            .field("features", &self.features.len())
            .field("anchors", &self.anchors)
            .field("fragments", &self.fragments)
            .field("has_script", &self.script.is_some())
            .finish()
    }
}

impl Page {
    /// Creates an empty page.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            features: Vec::new(),
            anchors: Vec::new(),
            fragments: Vec::new(),
            script: None,
        }
    }

    /// Adds an identifying feature.
    #[must_use]
    pub fn with_feature(mut self, feature: Feature) -> Self {
        self.features.push(feature);
        self
    }

    /// Adds an anchor.
    #[must_use]
    pub fn with_anchor(mut self, anchor: Anchor) -> Self {
        self.anchors.push(anchor);
        self
    }

    /// Adds a fragment.
    #[must_use]
    pub fn with_fragment(mut self, fragment: Fragment) -> Self {
        self.fragments.push(fragment);
        self
    }

    /// Sets the entry script.
    #[must_use]
    pub fn with_script(mut self, script: impl EntryScript + 'static) -> Self {
        self.script = Some(Arc::new(script));
        self
    }

    /// Returns the page name.
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the identifying features.
    #[inline]
    #[must_use]
    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    /// Returns the anchors in declaration order.
    #[inline]
    #[must_use]
    pub fn anchors(&self) -> &[Anchor] {
        &self.anchors
    }

    /// Returns the entry script.
    #[inline]
    #[must_use]
    pub fn script(&self) -> Option<&Arc<dyn EntryScript>> {
        self.script.as_ref()
    }

    /// Looks up a fragment by name.
    #[must_use]
    pub fn fragment(&self, name: &str) -> Option<&Fragment> {
        self.fragments.iter().find(|f| f.name == name)
    }

    /// Returns anchors on this page with an edge leading exactly to
    /// `page`/`fragment`.
    pub fn anchors_to<'a>(
        &'a self,
        page: &'a str,
        fragment: Option<&'a str>,
    ) -> impl Iterator<Item = &'a Anchor> + 'a {
        self.anchors
            .iter()
            .filter(move |a| a.targets.iter().any(|t| t.leads_to(page, fragment)))
    }
}

// ============================================================================
// PageGraph
// ============================================================================

/// Immutable set of pages with name indexes.
#[derive(Debug)]
pub struct PageGraph {
    pages: Vec<Page>,
    page_index: FxHashMap<String, usize>,
    /// Anchor name to (page index, anchor index).
    anchor_index: FxHashMap<String, (usize, usize)>,
}

impl PageGraph {
    /// Starts a graph definition.
    #[inline]
    #[must_use]
    pub fn builder() -> PageGraphBuilder {
        PageGraphBuilder::new()
    }

    /// Looks up a page.
    #[must_use]
    pub fn page(&self, name: &str) -> Option<&Page> {
        self.page_index.get(name).map(|&i| &self.pages[i])
    }

    /// Looks up an anchor and the page declaring it.
    #[must_use]
    pub fn anchor(&self, name: &str) -> Option<(&Page, &Anchor)> {
        self.anchor_index.get(name).map(|&(p, a)| {
            let page = &self.pages[p];
            (page, &page.anchors[a])
        })
    }

    /// Returns all pages in declaration order.
    #[inline]
    #[must_use]
    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    /// Returns the number of pages.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.pages.len()
    }

    /// Returns `true` if the graph has no pages.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}

// ============================================================================
// PageGraphBuilder
// ============================================================================

/// Validating builder for [`PageGraph`].
#[derive(Debug, Default)]
pub struct PageGraphBuilder {
    pages: Vec<Page>,
}

impl PageGraphBuilder {
    /// Creates an empty builder.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a page.
    #[must_use]
    pub fn page(mut self, page: Page) -> Self {
        self.pages.push(page);
        self
    }

    /// Builds the graph.
    ///
    /// # Errors
    ///
    /// - [`Error::DuplicateName`] for a repeated page name, anchor name
    ///   (anywhere in the graph) or fragment name (within a page)
    /// - [`Error::Config`] for a destination naming an undefined page or
    ///   fragment
    pub fn build(self) -> Result<PageGraph> {
        let mut page_index = FxHashMap::default();
        let mut anchor_index = FxHashMap::default();

        for (p, page) in self.pages.iter().enumerate() {
            if page_index.insert(page.name.clone(), p).is_some() {
                return Err(Error::duplicate_name("page", &page.name));
            }

            let mut fragments = FxHashSet::default();
            for fragment in &page.fragments {
                if !fragments.insert(fragment.name.as_str()) {
                    return Err(Error::duplicate_name(
                        "fragment",
                        format!("{}/{}", page.name, fragment.name),
                    ));
                }
            }

            for (a, anchor) in page.anchors.iter().enumerate() {
                if anchor_index.insert(anchor.name.clone(), (p, a)).is_some() {
                    return Err(Error::duplicate_name("anchor", &anchor.name));
                }
            }
        }

        let graph = PageGraph {
            pages: self.pages,
            page_index,
            anchor_index,
        };
        graph.check_edges()?;

        debug!(
            pages = graph.pages.len(),
            anchors = graph.anchor_index.len(),
            "Page graph built"
        );
        Ok(graph)
    }
}

impl PageGraph {
    fn check_edges(&self) -> Result<()> {
        for page in &self.pages {
            for anchor in &page.anchors {
                for target in &anchor.targets {
                    let Some(dest) = self.page(&target.page) else {
                        return Err(Error::config(format!(
                            "Anchor {} points at undefined page {}",
                            anchor.name, target.page
                        )));
                    };
                    if let Some(fragment) = &target.fragment
                        && dest.fragment(fragment).is_none()
                    {
                        return Err(Error::config(format!(
                            "Anchor {} points at undefined fragment {}",
                            anchor.name, target
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
