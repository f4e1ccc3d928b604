//! flowpilot - Screen-driven mobile app automation with traffic correlation.
//!
//! This library drives a mobile application by recognizing features on its
//! screen, and ties each UI action to the backend traffic it causes as seen
//! through an intercepting proxy.
//!
//! # Architecture
//!
//! Two roles share the library:
//!
//! - **Script task (async)**: touches, swipes and waits on captured data
//! - **Proxy thread(s) (sync)**: hand every flow to a [`FlowRouter`]
//!
//! Key design principles:
//!
//! - One explicit [`FlowRouter`] routes flows to sessions by client address
//! - Each [`Bot`] owns a [`DataSubscription`] that scripts block on
//! - No current-page state: navigation re-derives it from fresh screenshots
//! - Device and matching engine are external, behind [`Device`] and [`Matcher`]
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use std::time::Duration;
//! use flowpilot::{Bot, BotOptions, Filter, FlowRouter, Result, TouchAnchor};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let router = Arc::new(FlowRouter::new());
//!     // proxy: router.on_response(&mut flow) for every response
//!
//!     let bot = Bot::builder()
//!         .router(Arc::clone(&router))
//!         .device(device)
//!         .matcher(matcher)
//!         .graph(graph)
//!         .options(BotOptions::new().with_device_ip("192.168.1.23".parse().unwrap()))
//!         .build()?;
//!
//!     bot.start()?;
//!     bot.subscribe([Filter::new("detail", r"/api/item/detail")?]);
//!     bot.touch_anchor("to_detail", TouchAnchor::new().with_auto_back(false)).await?;
//!
//!     let captured = bot.wait_data(Some("detail"), Duration::from_secs(10)).await;
//!     println!("ready: {}, records: {}", captured.ready, captured.records.len());
//!
//!     bot.back_to("home", None).await?;
//!     bot.stop();
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`bot`] | Session facade, builder and options |
//! | [`device`] | Device and matcher traits, geometry, features |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`network`] | Flow routing and data subscriptions |
//! | [`page`] | Page graph and navigator |
//! | [`scan`] | Scroll-and-deduplicate scanning |

// ============================================================================
// Modules
// ============================================================================

/// Automation session.
///
/// Use [`Bot::builder()`] to create a configured session.
pub mod bot;

/// Device and matching-engine seams.
///
/// - [`Device`] - screenshots and input events
/// - [`Matcher`] - template location
/// - [`Feature`] - named any-of set of templates
pub mod device;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers.
pub mod identifiers;

/// Intercepted traffic.
///
/// - [`FlowRouter`] - process-wide session registry
/// - [`DataSubscription`] - capture filters with timed retrieval
pub mod network;

/// Page graph and navigation.
pub mod page;

/// Scroll scanning of paginated lists.
pub mod scan;

// ============================================================================
// Re-exports
// ============================================================================

// Bot types
pub use bot::{Bot, BotBuilder, BotOptions, BotScript, NavigationOptions};

// Device types
pub use device::feature::{Template, TemplateMatch};
pub use device::geometry::{Point, Rect, Resolution};
pub use device::{Device, Feature, KEY_BACK, MatchResult, Matcher, Screen, Target};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::InterceptorId;

// Network types
pub use network::{
    Captured, DataSubscription, Filter, Flow, FlowCallback, FlowPhase, FlowRequest, FlowResponse,
    FlowRouter, INTERNAL_URL_PREFIX, Record, RouteOutcome,
};

// Page types
pub use page::{
    Anchor, EntryScript, FnScript, Fragment, Navigator, Page, PageGraph, PageGraphBuilder,
    ToWhere, TouchAnchor,
};

// Scan types
pub use scan::{
    DedupTolerance, ScanControl, ScanHooks, ScanReport, ScrollScan, StopReason, Swipe, new_items,
};
