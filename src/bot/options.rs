//! Bot configuration.
//!
//! Options are plain values with `with_*` builder methods. They can also be
//! loaded from a JSON file, where durations are written in milliseconds.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use flowpilot::BotOptions;
//!
//! let options = BotOptions::new()
//!     .with_device_ip("192.168.1.23".parse()?)
//!     .with_find_timeout(Duration::from_secs(5))
//!     .with_max_back_steps(8);
//!
//! options.validate()?;
//! ```
//!
//! The same configuration as JSON:
//!
//! ```json
//! {
//!   "deviceIp": "192.168.1.23",
//!   "navigation": { "findTimeoutMs": 5000, "maxBackSteps": 8 }
//! }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fs;
use std::net::IpAddr;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Default delay between two recognition attempts.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Default time allowed to find a feature before touching it.
pub const DEFAULT_FIND_TIMEOUT: Duration = Duration::from_secs(10);

/// Default probe while backing out to a page.
pub const DEFAULT_BACK_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Default probe for a one-hop anchor while backing out.
pub const DEFAULT_ANCHOR_PROBE_TIMEOUT: Duration = Duration::from_millis(100);

// ============================================================================
// NavigationOptions
// ============================================================================

/// Timings used by the navigator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NavigationOptions {
    /// Delay between two screenshots while polling for a feature.
    #[serde(rename = "pollIntervalMs", with = "millis")]
    pub poll_interval: Duration,

    /// Time allowed to find a feature before touching it.
    #[serde(rename = "findTimeoutMs", with = "millis")]
    pub find_timeout: Duration,

    /// Probe for the target page on each `back_to` step.
    #[serde(rename = "backProbeTimeoutMs", with = "millis")]
    pub back_probe_timeout: Duration,

    /// Probe for a one-hop anchor on each `back_to` step.
    #[serde(rename = "anchorProbeTimeoutMs", with = "millis")]
    pub anchor_probe_timeout: Duration,

    /// Upper bound on `back_to` steps. `None` keeps going forever.
    pub max_back_steps: Option<u32>,
}

impl Default for NavigationOptions {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            find_timeout: DEFAULT_FIND_TIMEOUT,
            back_probe_timeout: DEFAULT_BACK_PROBE_TIMEOUT,
            anchor_probe_timeout: DEFAULT_ANCHOR_PROBE_TIMEOUT,
            max_back_steps: None,
        }
    }
}

impl NavigationOptions {
    /// Validates the timings.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for a zero poll interval or a zero step bound.
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval.is_zero() {
            return Err(Error::config("poll interval must be greater than zero"));
        }
        if self.max_back_steps == Some(0) {
            return Err(Error::config("max back steps must be greater than zero"));
        }
        Ok(())
    }
}

// ============================================================================
// BotOptions
// ============================================================================

/// Session configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BotOptions {
    /// Address the device's traffic comes from.
    pub device_ip: Option<IpAddr>,

    /// Receive every flow regardless of client address.
    pub intercept_all: bool,

    /// Navigator timings.
    pub navigation: NavigationOptions,
}

// ============================================================================
// Constructors
// ============================================================================

impl BotOptions {
    /// Creates options with default timings and no traffic binding.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads and validates options from a JSON file.
    ///
    /// Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// - [`Error::Io`] if the file cannot be read
    /// - [`Error::Json`] if it is not valid options JSON
    /// - [`Error::Config`] if validation fails
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        let options: Self = serde_json::from_str(&text)?;
        options.validate()?;

        debug!(path = %path.display(), "Loaded bot options");
        Ok(options)
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl BotOptions {
    /// Binds the session to the device's address.
    #[inline]
    #[must_use]
    pub fn with_device_ip(mut self, ip: IpAddr) -> Self {
        self.device_ip = Some(ip);
        self
    }

    /// Receives every flow.
    #[inline]
    #[must_use]
    pub fn with_intercept_all(mut self) -> Self {
        self.intercept_all = true;
        self
    }

    /// Replaces all navigator timings.
    #[inline]
    #[must_use]
    pub fn with_navigation(mut self, navigation: NavigationOptions) -> Self {
        self.navigation = navigation;
        self
    }

    /// Sets the polling interval.
    #[inline]
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.navigation.poll_interval = interval;
        self
    }

    /// Sets the time allowed to find a feature before touching it.
    #[inline]
    #[must_use]
    pub fn with_find_timeout(mut self, timeout: Duration) -> Self {
        self.navigation.find_timeout = timeout;
        self
    }

    /// Sets the `back_to` probe timeouts.
    #[inline]
    #[must_use]
    pub fn with_back_probes(mut self, page: Duration, anchor: Duration) -> Self {
        self.navigation.back_probe_timeout = page;
        self.navigation.anchor_probe_timeout = anchor;
        self
    }

    /// Bounds the number of `back_to` steps.
    #[inline]
    #[must_use]
    pub fn with_max_back_steps(mut self, steps: u32) -> Self {
        self.navigation.max_back_steps = Some(steps);
        self
    }
}

// ============================================================================
// Validation
// ============================================================================

impl BotOptions {
    /// Validates the options.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the session would receive no traffic or
    /// if the timings are invalid.
    pub fn validate(&self) -> Result<()> {
        if self.device_ip.is_none() && !self.intercept_all {
            return Err(Error::config(
                "No traffic binding. Set device_ip or enable intercept_all.\n\
                 Example: BotOptions::new().with_device_ip(\"192.168.1.23\".parse()?)",
            ));
        }
        self.navigation.validate()
    }
}

// ============================================================================
// Serde Helpers
// ============================================================================

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::Write;

    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let options = BotOptions::new();
        assert!(options.device_ip.is_none());
        assert!(!options.intercept_all);
        assert_eq!(options.navigation.back_probe_timeout, Duration::from_secs(5));
        assert_eq!(
            options.navigation.anchor_probe_timeout,
            Duration::from_millis(100)
        );
        assert!(options.navigation.max_back_steps.is_none());
    }

    #[test]
    fn test_validate_requires_binding() {
        let err = BotOptions::new().validate().unwrap_err();
        assert!(err.is_config_error());

        assert!(BotOptions::new().with_intercept_all().validate().is_ok());
        assert!(
            BotOptions::new()
                .with_device_ip("10.0.0.7".parse().unwrap())
                .validate()
                .is_ok()
        );
    }

    #[test]
    fn test_validate_rejects_bad_timings() {
        let zero_poll = BotOptions::new()
            .with_intercept_all()
            .with_poll_interval(Duration::ZERO);
        assert!(zero_poll.validate().is_err());

        let zero_steps = BotOptions::new()
            .with_intercept_all()
            .with_max_back_steps(0);
        assert!(zero_steps.validate().is_err());
    }

    #[test]
    fn test_from_file_fills_defaults() -> anyhow::Result<()> {
        let mut file = NamedTempFile::new()?;
        write!(
            file,
            r#"{{"deviceIp": "192.168.1.23", "navigation": {{"findTimeoutMs": 2500, "maxBackSteps": 4}}}}"#
        )?;

        let options = BotOptions::from_file(file.path())?;
        assert_eq!(options.device_ip, Some("192.168.1.23".parse::<IpAddr>()?));
        assert_eq!(options.navigation.find_timeout, Duration::from_millis(2500));
        assert_eq!(options.navigation.max_back_steps, Some(4));
        assert_eq!(options.navigation.poll_interval, DEFAULT_POLL_INTERVAL);
        Ok(())
    }

    #[test]
    fn test_from_file_validates() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{{}}").unwrap();

        let err = BotOptions::from_file(file.path()).unwrap_err();
        assert!(err.is_config_error());
    }

    #[test]
    fn test_from_file_missing() {
        let err = BotOptions::from_file("/nonexistent/flowpilot.json").unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_serialize_uses_milliseconds() {
        let options = BotOptions::new().with_intercept_all();
        let json = serde_json::to_value(&options).unwrap();
        assert_eq!(json["interceptAll"], true);
        assert_eq!(json["navigation"]["backProbeTimeoutMs"], 5000);
    }
}
