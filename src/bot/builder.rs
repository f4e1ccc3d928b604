//! Builder pattern for bot configuration.
//!
//! # Example
//!
//! ```ignore
//! use flowpilot::Bot;
//!
//! let bot = Bot::builder()
//!     .router(Arc::clone(&router))
//!     .device(device)
//!     .matcher(matcher)
//!     .graph(graph)
//!     .options(BotOptions::new().with_device_ip(ip))
//!     .build()?;
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use crate::device::{Device, Matcher};
use crate::error::{Error, Result};
use crate::network::FlowRouter;
use crate::page::PageGraph;

use super::core::Bot;
use super::options::BotOptions;

// ============================================================================
// BotBuilder
// ============================================================================

/// Builder for configuring a [`Bot`].
///
/// Use [`Bot::builder()`] to create a new builder.
#[derive(Default)]
pub struct BotBuilder {
    /// Router shared with the proxy.
    router: Option<Arc<FlowRouter>>,
    /// Page graph; empty when not set.
    graph: Option<Arc<PageGraph>>,
    /// Device driver.
    device: Option<Arc<dyn Device>>,
    /// Matching engine.
    matcher: Option<Arc<dyn Matcher>>,
    /// Session options.
    options: BotOptions,
}

impl fmt::Debug for BotBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BotBuilder")
            .field("router", &self.router.is_some())
            .field("graph", &self.graph.as_ref().map(|g| g.len()))
            .field("device", &self.device.is_some())
            .field("matcher", &self.matcher.is_some())
            .field("options", &self.options)
            .finish()
    }
}

// ============================================================================
// BotBuilder Implementation
// ============================================================================

impl BotBuilder {
    /// Creates a builder with no configuration.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the router the proxy delivers flows to.
    #[inline]
    #[must_use]
    pub fn router(mut self, router: Arc<FlowRouter>) -> Self {
        self.router = Some(router);
        self
    }

    /// Sets the page graph.
    #[inline]
    #[must_use]
    pub fn graph(mut self, graph: impl Into<Arc<PageGraph>>) -> Self {
        self.graph = Some(graph.into());
        self
    }

    /// Sets the device driver.
    #[inline]
    #[must_use]
    pub fn device(mut self, device: Arc<dyn Device>) -> Self {
        self.device = Some(device);
        self
    }

    /// Sets the matching engine.
    #[inline]
    #[must_use]
    pub fn matcher(mut self, matcher: Arc<dyn Matcher>) -> Self {
        self.matcher = Some(matcher);
        self
    }

    /// Sets the session options.
    #[inline]
    #[must_use]
    pub fn options(mut self, options: BotOptions) -> Self {
        self.options = options;
        self
    }

    /// Builds the bot with validation.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the router, device or matcher is missing,
    /// or if the options are invalid.
    pub fn build(self) -> Result<Bot> {
        let router = self.router.ok_or_else(|| {
            Error::config(
                "Flow router is required. Use .router() to set it.\n\
                 Example: Bot::builder().router(Arc::new(FlowRouter::new()))",
            )
        })?;
        let device = self
            .device
            .ok_or_else(|| Error::config("Device is required. Use .device() to set it."))?;
        let matcher = self
            .matcher
            .ok_or_else(|| Error::config("Matcher is required. Use .matcher() to set it."))?;
        self.options.validate()?;

        let graph = match self.graph {
            Some(graph) => graph,
            None => Arc::new(PageGraph::builder().build()?),
        };

        Ok(Bot::new(router, graph, device, matcher, self.options))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use crate::device::fake::rig;

    fn complete() -> BotBuilder {
        let (_state, device, matcher) = rig();
        BotBuilder::new()
            .router(Arc::new(FlowRouter::new()))
            .device(device)
            .matcher(matcher)
            .options(BotOptions::new().with_intercept_all())
    }

    #[test]
    fn test_new_creates_empty_builder() {
        let builder = BotBuilder::new();
        assert!(builder.router.is_none());
        assert!(builder.device.is_none());
        assert!(builder.graph.is_none());
    }

    #[test]
    fn test_build_with_defaults() {
        let bot = complete().build().unwrap();
        assert!(bot.navigator().graph().is_empty());
        assert!(!bot.is_running());
    }

    #[test]
    fn test_build_fails_without_router() {
        let (_state, device, matcher) = rig();
        let err = BotBuilder::new()
            .device(device)
            .matcher(matcher)
            .options(BotOptions::new().with_intercept_all())
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("router"));
    }

    #[test]
    fn test_build_fails_without_device() {
        let (_state, _device, matcher) = rig();
        let err = BotBuilder::new()
            .router(Arc::new(FlowRouter::new()))
            .matcher(matcher)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("Device"));
    }

    #[test]
    fn test_build_validates_options() {
        let err = complete().options(BotOptions::new()).build().unwrap_err();
        assert!(err.is_config_error());
    }
}
