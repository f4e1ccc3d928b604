//! Automation session: lifecycle, configuration and script API.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Bot`] | Session facade over router, subscription, navigator and scanner |
//! | [`BotBuilder`] | Fluent configuration builder |
//! | [`BotOptions`] | Traffic binding and navigator timings |
//! | [`BotScript`] | Main script of a run |
//!
//! # Example
//!
//! ```ignore
//! use flowpilot::{Bot, BotOptions, FlowRouter};
//!
//! let router = Arc::new(FlowRouter::new());
//! // hand `router` to the proxy ...
//!
//! let bot = Bot::builder()
//!     .router(Arc::clone(&router))
//!     .device(device)
//!     .matcher(matcher)
//!     .graph(graph)
//!     .options(BotOptions::from_file("bot.json")?)
//!     .build()?;
//!
//! bot.run(&MainScript).await?;
//! ```

// ============================================================================
// Submodules
// ============================================================================

/// Fluent builder pattern for bot configuration.
pub mod builder;

/// Core bot implementation.
pub mod core;

/// Traffic binding and timing options.
pub mod options;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::BotBuilder;
pub use core::{Bot, BotScript};
pub use options::{BotOptions, NavigationOptions};
