//! Named data subscriptions over intercepted traffic.
//!
//! A script subscribes to the responses it expects an action to trigger,
//! performs the action, then waits for the captured records:
//!
//! ```ignore
//! use std::time::Duration;
//! use flowpilot::Filter;
//!
//! bot.subscribe([Filter::new("search", r"/api/search/getResult")?]);
//! bot.touch_anchor("search_button", TouchAnchor::new().with_run_script(false)).await?;
//!
//! let captured = bot.wait_data(Some("search"), Duration::from_secs(10)).await;
//! if captured.ready {
//!     for record in &captured.records {
//!         println!("{} -> {} bytes", record.url, record.response_body.len());
//!     }
//! }
//! ```
//!
//! Records are appended from the proxy's callback thread via
//! [`DataSubscription::on_flow_matched`] and drained by the script task in
//! [`DataSubscription::wait`]. Buffers are only emptied by a drain, so waiting
//! on the wrong name lets the other buffers grow.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Notify;
use tokio::time::{Instant, timeout_at};
use tracing::{debug, trace};

use crate::error::{Error, Result};

use super::flow::Flow;
use super::router::FlowCallback;

// ============================================================================
// Filter
// ============================================================================

/// Named capture rule matching request URLs.
///
/// The pattern is a regular expression searched anywhere in the URL,
/// ignoring case.
#[derive(Clone)]
pub struct Filter {
    name: String,
    pattern: Regex,
    once_only: bool,
}

impl fmt::Debug for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Filter")
            .field("name", &self.name)
            .field("pattern", &self.pattern.as_str())
            .field("once_only", &self.once_only)
            .finish()
    }
}

impl Filter {
    /// Creates a filter that is removed after its records are drained.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPattern`] if `pattern` is not a valid regex.
    pub fn new(name: impl Into<String>, pattern: &str) -> Result<Self> {
        let name = name.into();
        let pattern = RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .map_err(|e| Error::invalid_pattern(&name, e.to_string()))?;

        Ok(Self {
            name,
            pattern,
            once_only: true,
        })
    }

    /// Creates a filter that stays subscribed after each drain.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPattern`] if `pattern` is not a valid regex.
    pub fn persistent(name: impl Into<String>, pattern: &str) -> Result<Self> {
        Ok(Self::new(name, pattern)?.with_once_only(false))
    }

    /// Sets whether the filter is removed after its first drain.
    #[inline]
    #[must_use]
    pub fn with_once_only(mut self, once_only: bool) -> Self {
        self.once_only = once_only;
        self
    }

    /// Returns the filter name.
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the URL pattern source.
    #[inline]
    #[must_use]
    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    /// Returns `true` if the filter is removed on drain.
    #[inline]
    #[must_use]
    pub fn is_once_only(&self) -> bool {
        self.once_only
    }

    /// Returns `true` if the filter matches `url`.
    #[inline]
    #[must_use]
    pub fn matches(&self, url: &str) -> bool {
        self.pattern.is_match(url)
    }
}

// ============================================================================
// Record
// ============================================================================

/// One captured exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    /// Name of the filter that captured it.
    pub name: String,

    /// Request URL.
    pub url: String,

    /// HTTP method.
    pub method: String,

    /// Request body as text.
    pub request_body: String,

    /// Response body as text.
    pub response_body: String,

    /// Capture time, milliseconds since the Unix epoch.
    pub captured_at_ms: u64,
}

impl Record {
    /// Builds a record from a flow.
    #[must_use]
    pub fn from_flow(name: impl Into<String>, flow: &Flow) -> Self {
        let captured_at_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);

        Self {
            name: name.into(),
            url: flow.request.url.clone(),
            method: flow.request.method.clone(),
            request_body: flow.request_text(),
            response_body: flow.response_text(),
            captured_at_ms,
        }
    }

    /// Parses the response body as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if the body is not valid JSON.
    pub fn json(&self) -> Result<Value> {
        Ok(serde_json::from_str(&self.response_body)?)
    }
}

// ============================================================================
// Captured
// ============================================================================

/// Result of [`DataSubscription::wait`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Captured {
    /// `true` if the wait condition was met before the timeout.
    pub ready: bool,

    /// Records drained by this wait, in capture order per filter.
    pub records: Vec<Record>,
}

impl Captured {
    /// Returns the records captured by one filter.
    pub fn by_name<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Record> + 'a {
        self.records.iter().filter(move |r| r.name == name)
    }
}

// ============================================================================
// DataSubscription
// ============================================================================

/// A subscribed filter and its buffered records.
struct Slot {
    filter: Filter,
    records: Vec<Record>,
}

/// Per-session table of capture filters.
///
/// Thread-safe: the proxy thread appends, the script task waits and drains.
#[derive(Default)]
pub struct DataSubscription {
    slots: Mutex<Vec<Slot>>,
    notify: Notify,
}

impl fmt::Debug for DataSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataSubscription")
            .field("filters", &self.filter_names())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// DataSubscription - Subscription Management
// ============================================================================

impl DataSubscription {
    /// Creates an empty subscription table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds filters to the table.
    ///
    /// Re-subscribing an existing name replaces its pattern and `once_only`
    /// flag but keeps records not yet drained; later captures are appended
    /// after them. Filters are tested against flows in subscription order.
    pub fn subscribe(&self, filters: impl IntoIterator<Item = Filter>) {
        let mut slots = self.slots.lock();

        for filter in filters {
            if let Some(slot) = slots.iter_mut().find(|s| s.filter.name == filter.name) {
                debug!(
                    filter = %filter.name,
                    pending = slot.records.len(),
                    "Re-subscribing filter, keeping pending records"
                );
                slot.filter = filter;
            } else {
                debug!(filter = %filter.name, pattern = filter.pattern(), "Subscribing filter");
                slots.push(Slot {
                    filter,
                    records: Vec::new(),
                });
            }
        }
    }

    /// Removes a filter and discards its pending records.
    ///
    /// Returns `true` if the filter existed.
    pub fn unsubscribe(&self, name: &str) -> bool {
        let mut slots = self.slots.lock();
        let before = slots.len();
        slots.retain(|s| s.filter.name != name);
        before != slots.len()
    }

    /// Removes every filter.
    pub fn clear(&self) {
        self.slots.lock().clear();
    }

    /// Returns the number of records buffered for `name`.
    #[must_use]
    pub fn pending(&self, name: &str) -> usize {
        self.slots
            .lock()
            .iter()
            .find(|s| s.filter.name == name)
            .map_or(0, |s| s.records.len())
    }

    /// Returns the subscribed filter names in subscription order.
    #[must_use]
    pub fn filter_names(&self) -> Vec<String> {
        self.slots
            .lock()
            .iter()
            .map(|s| s.filter.name.clone())
            .collect()
    }
}

// ============================================================================
// DataSubscription - Producer
// ============================================================================

impl DataSubscription {
    /// Captures a flow into the first filter whose pattern matches its URL.
    ///
    /// Called on the proxy callback thread. Returns `true` if a record was
    /// captured.
    pub fn on_flow_matched(&self, flow: &Flow) -> bool {
        {
            let mut slots = self.slots.lock();
            let Some(slot) = slots.iter_mut().find(|s| s.filter.matches(&flow.request.url))
            else {
                trace!(url = %flow.request.url, "No filter matched");
                return false;
            };

            debug!(filter = %slot.filter.name, url = %flow.request.url, "Captured record");
            slot.records
                .push(Record::from_flow(slot.filter.name.clone(), flow));
        }

        self.notify.notify_waiters();
        true
    }

    /// Wraps this table as a router callback.
    #[must_use]
    pub fn interceptor(self: &Arc<Self>) -> FlowCallback {
        let subscription = Arc::clone(self);
        Arc::new(move |flow: &mut Flow| {
            subscription.on_flow_matched(flow);
            Ok(())
        })
    }
}

// ============================================================================
// DataSubscription - Consumer
// ============================================================================

impl DataSubscription {
    /// Waits for captured records.
    ///
    /// With `Some(name)`, waits until that filter has records. With `None`,
    /// waits until every subscribed filter has records. An unknown name is
    /// never ready.
    ///
    /// Ready filters are drained: once-only filters are removed, persistent
    /// ones have their buffer cleared. On timeout, records already buffered
    /// for the requested filters are drained the same way and returned with
    /// `ready == false`.
    pub async fn wait(&self, name: Option<&str>, timeout: Duration) -> Captured {
        let deadline = Instant::now() + timeout;

        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut slots = self.slots.lock();
                if is_ready(&slots, name) {
                    let records = drain(&mut slots, name);
                    debug!(?name, count = records.len(), "Subscription ready");
                    return Captured {
                        ready: true,
                        records,
                    };
                }
            }

            if timeout_at(deadline, notified).await.is_err() {
                let records = drain(&mut self.slots.lock(), name);
                debug!(
                    ?name,
                    count = records.len(),
                    timeout_ms = timeout.as_millis() as u64,
                    "Subscription wait timed out"
                );
                return Captured {
                    ready: false,
                    records,
                };
            }
        }
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Checks the wait condition.
fn is_ready(slots: &[Slot], name: Option<&str>) -> bool {
    match name {
        Some(name) => slots
            .iter()
            .any(|s| s.filter.name == name && !s.records.is_empty()),
        None => slots.iter().all(|s| !s.records.is_empty()),
    }
}

/// Takes buffered records of the requested filters.
fn drain(slots: &mut Vec<Slot>, name: Option<&str>) -> Vec<Record> {
    let mut records = Vec::new();

    slots.retain_mut(|slot| {
        let requested = name.is_none_or(|n| slot.filter.name == n);
        if !requested || slot.records.is_empty() {
            return true;
        }
        records.append(&mut slot.records);
        !slot.filter.once_only
    });

    records
}

// ============================================================================
// Tests
// ============================================================================
