//! Error types for flowpilot.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use flowpilot::{Result, TouchAnchor};
//!
//! async fn open_detail(bot: &Bot) -> Result<()> {
//!     bot.touch_anchor("to_detail", TouchAnchor::new()).await?;
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`], [`Error::DuplicateName`], [`Error::InvalidPattern`] |
//! | Navigation | [`Error::AnchorNotFound`], [`Error::PageNotFound`], [`Error::FragmentNotFound`], [`Error::ParameterIncorrect`], [`Error::TouchFailed`], [`Error::BackExhausted`] |
//! | Collaborators | [`Error::Device`], [`Error::Matcher`], [`Error::Interceptor`], [`Error::Protocol`] |
//! | External | [`Error::Io`], [`Error::Json`], [`Error::Image`] |
//!
//! Not finding a feature on screen and timing out while waiting for captured
//! data are ordinary return values, never errors.

// ============================================================================
// Imports
// ============================================================================

use std::io::Error as IoError;
use std::result::Result as StdResult;

use thiserror::Error;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// Each variant includes relevant context for debugging.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when bot options or the page graph definition are invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    /// A name that must be unique was declared twice.
    #[error("Duplicate {kind} name: {name}")]
    DuplicateName {
        /// What kind of entity was duplicated (page, anchor, fragment, filter).
        kind: &'static str,
        /// The duplicated name.
        name: String,
    },

    /// Filter URL pattern failed to compile.
    #[error("Invalid pattern for filter {filter}: {message}")]
    InvalidPattern {
        /// Filter name.
        filter: String,
        /// Regex compiler message.
        message: String,
    },

    // ========================================================================
    // Navigation Errors
    // ========================================================================
    /// Anchor is not defined in the page graph.
    #[error("Anchor not found: {anchor}")]
    AnchorNotFound {
        /// The missing anchor name.
        anchor: String,
    },

    /// Page is not defined in the page graph.
    #[error("Page not found: {page}")]
    PageNotFound {
        /// The missing page name.
        page: String,
    },

    /// Fragment is not defined on its page.
    #[error("Fragment not found: {page}/{fragment}")]
    FragmentNotFound {
        /// Page the fragment was looked up on.
        page: String,
        /// The missing fragment name.
        fragment: String,
    },

    /// A required parameter is missing or inconsistent.
    ///
    /// Returned e.g. when an anchor without a feature is touched without an
    /// explicit position.
    #[error("Parameter incorrect: {message}")]
    ParameterIncorrect {
        /// Description of the problem.
        message: String,
    },

    /// Touch could not be performed or led nowhere.
    ///
    /// Returned when the touch location cannot be resolved, or when none of
    /// the anchor's declared destinations became visible after the touch.
    #[error("Touch failed on {anchor}: {reason}")]
    TouchFailed {
        /// Anchor (or target description) that was touched.
        anchor: String,
        /// Why the touch is considered failed.
        reason: String,
    },

    /// Back navigation gave up after the configured number of steps.
    #[error("Could not get back to {target} after {steps} steps")]
    BackExhausted {
        /// Page or `page/fragment` that was the back target.
        target: String,
        /// Number of back steps performed.
        steps: u32,
    },

    // ========================================================================
    // Collaborator Errors
    // ========================================================================
    /// Device driver failure (screenshot, touch, swipe, key event).
    #[error("Device error: {message}")]
    Device {
        /// Description of the device failure.
        message: String,
    },

    /// Template matching engine failure.
    #[error("Matcher error: {message}")]
    Matcher {
        /// Description of the matcher failure.
        message: String,
    },

    /// Callback registered with the flow router failed.
    #[error("Interceptor error: {message}")]
    Interceptor {
        /// Description of the callback failure.
        message: String,
    },

    /// Proxy event could not be understood.
    ///
    /// Returned when a flow event delivered as JSON is malformed.
    #[error("Protocol error: {message}")]
    Protocol {
        /// Description of the protocol violation.
        message: String,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Image encoding or decoding error.
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a duplicate name error.
    #[inline]
    pub fn duplicate_name(kind: &'static str, name: impl Into<String>) -> Self {
        Self::DuplicateName {
            kind,
            name: name.into(),
        }
    }

    /// Creates an invalid pattern error.
    #[inline]
    pub fn invalid_pattern(filter: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidPattern {
            filter: filter.into(),
            message: message.into(),
        }
    }

    /// Creates an anchor not found error.
    #[inline]
    pub fn anchor_not_found(anchor: impl Into<String>) -> Self {
        Self::AnchorNotFound {
            anchor: anchor.into(),
        }
    }

    /// Creates a page not found error.
    #[inline]
    pub fn page_not_found(page: impl Into<String>) -> Self {
        Self::PageNotFound { page: page.into() }
    }

    /// Creates a fragment not found error.
    #[inline]
    pub fn fragment_not_found(page: impl Into<String>, fragment: impl Into<String>) -> Self {
        Self::FragmentNotFound {
            page: page.into(),
            fragment: fragment.into(),
        }
    }

    /// Creates a parameter incorrect error.
    #[inline]
    pub fn parameter_incorrect(message: impl Into<String>) -> Self {
        Self::ParameterIncorrect {
            message: message.into(),
        }
    }

    /// Creates a touch failed error.
    #[inline]
    pub fn touch_failed(anchor: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::TouchFailed {
            anchor: anchor.into(),
            reason: reason.into(),
        }
    }

    /// Creates a back exhausted error.
    #[inline]
    pub fn back_exhausted(target: impl Into<String>, steps: u32) -> Self {
        Self::BackExhausted {
            target: target.into(),
            steps,
        }
    }

    /// Creates a device error.
    #[inline]
    pub fn device(message: impl Into<String>) -> Self {
        Self::Device {
            message: message.into(),
        }
    }

    /// Creates a matcher error.
    #[inline]
    pub fn matcher(message: impl Into<String>) -> Self {
        Self::Matcher {
            message: message.into(),
        }
    }

    /// Creates an interceptor error.
    #[inline]
    pub fn interceptor(message: impl Into<String>) -> Self {
        Self::Interceptor {
            message: message.into(),
        }
    }

    /// Creates a protocol error.
    #[inline]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this error comes from the page-graph navigator.
    ///
    /// Navigation errors point at a defect in the page-graph definition or an
    /// unknown screen state; scripts should not continue after one.
    #[inline]
    #[must_use]
    pub fn is_navigation_error(&self) -> bool {
        matches!(
            self,
            Self::AnchorNotFound { .. }
                | Self::PageNotFound { .. }
                | Self::FragmentNotFound { .. }
                | Self::ParameterIncorrect { .. }
                | Self::TouchFailed { .. }
                | Self::BackExhausted { .. }
        )
    }

    /// Returns `true` if this is a static configuration error.
    #[inline]
    #[must_use]
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::Config { .. } | Self::DuplicateName { .. } | Self::InvalidPattern { .. }
        )
    }

    /// Returns `true` if this error came from an external collaborator.
    #[inline]
    #[must_use]
    pub fn is_collaborator_error(&self) -> bool {
        matches!(
            self,
            Self::Device { .. }
                | Self::Matcher { .. }
                | Self::Interceptor { .. }
                | Self::Protocol { .. }
        )
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::ErrorKind;

    #[test]
    fn test_error_display() {
        let err = Error::anchor_not_found("to_detail");
        assert_eq!(err.to_string(), "Anchor not found: to_detail");
    }

    #[test]
    fn test_fragment_display() {
        let err = Error::fragment_not_found("home", "menu");
        assert_eq!(err.to_string(), "Fragment not found: home/menu");
    }

    #[test]
    fn test_is_navigation_error() {
        assert!(Error::touch_failed("a", "no destination").is_navigation_error());
        assert!(Error::parameter_incorrect("no feature").is_navigation_error());
        assert!(Error::back_exhausted("home", 3).is_navigation_error());
        assert!(!Error::config("bad").is_navigation_error());
    }

    #[test]
    fn test_is_config_error() {
        assert!(Error::duplicate_name("page", "home").is_config_error());
        assert!(Error::invalid_pattern("search", "unclosed group").is_config_error());
        assert!(!Error::device("offline").is_config_error());
    }

    #[test]
    fn test_is_collaborator_error() {
        assert!(Error::device("adb gone").is_collaborator_error());
        assert!(Error::matcher("bad template").is_collaborator_error());
        assert!(Error::interceptor("refused").is_collaborator_error());
        assert!(Error::protocol("missing phase").is_collaborator_error());
        assert!(!Error::anchor_not_found("x").is_collaborator_error());
        assert!(!Error::config("no device").is_collaborator_error());
    }

    #[test]
    fn test_from_io_error() {
        let io_err = IoError::new(ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_from_json_error() {
        let json_err = serde_json::from_str::<String>("invalid").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Json(_)));
    }
}
