//! Intercepted traffic: flow routing and data subscriptions.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Flow`] | One HTTP exchange seen by the proxy |
//! | [`FlowRouter`] | Process-wide registry dispatching flows to sessions |
//! | [`DataSubscription`] | Per-session capture filters with timed retrieval |
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use flowpilot::{DataSubscription, Filter, FlowRouter};
//!
//! let router = Arc::new(FlowRouter::new());
//! let subscription = Arc::new(DataSubscription::new());
//!
//! let id = router.register(None, Some(subscription.interceptor()), Some(device_ip), false);
//!
//! subscription.subscribe([Filter::new("detail", r"/item/product/detail")?]);
//! // ... touch something on the device ...
//! let captured = subscription.wait(Some("detail"), Duration::from_secs(10)).await;
//! ```

// ============================================================================
// Submodules
// ============================================================================

/// Flow value types and proxy event parsing.
pub mod flow;

/// Session registry and flow dispatch.
pub mod router;

/// Capture filters and blocking retrieval.
pub mod subscription;

// ============================================================================
// Re-exports
// ============================================================================

pub use flow::{Flow, FlowPhase, FlowRequest, FlowResponse};
pub use router::{FlowCallback, FlowRouter, INTERNAL_URL_PREFIX, RouteOutcome};
pub use subscription::{Captured, DataSubscription, Filter, Record};
