//! Intercepted network flow types.
//!
//! A [`Flow`] is one HTTP exchange seen by the intercepting proxy. The proxy
//! hands it to the [`FlowRouter`](super::FlowRouter) twice: once when the
//! request arrives ([`FlowPhase::Request`]) and once when the response is
//! available ([`FlowPhase::Response`]).
//!
//! # Proxy Events
//!
//! Proxies running out of process can deliver flows as JSON events:
//!
//! ```ignore
//! let event = serde_json::json!({
//!     "phase": "response",
//!     "clientIp": "192.168.1.20",
//!     "request": { "url": "https://api.example.com/search", "method": "GET" },
//!     "response": { "status": 200, "body": "{\"items\":[]}" }
//! });
//!
//! let (phase, mut flow) = Flow::from_event(&event)?;
//! router.route(&mut flow, phase);
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::collections::HashMap;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr};

use serde_json::Value;
use url::Url;

use crate::error::{Error, Result};

// ============================================================================
// FlowPhase
// ============================================================================

/// Point in the exchange at which a flow is routed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlowPhase {
    /// Request received from the client, not yet forwarded.
    Request,
    /// Response received from the server.
    Response,
}

impl FlowPhase {
    /// Returns the phase name used in proxy events.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Request => "request",
            Self::Response => "response",
        }
    }
}

impl fmt::Display for FlowPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// FlowRequest / FlowResponse
// ============================================================================

/// Request half of a flow.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlowRequest {
    /// Full request URL.
    pub url: String,

    /// HTTP method (GET, POST, etc.).
    pub method: String,

    /// Request headers.
    pub headers: HashMap<String, String>,

    /// Raw request body.
    pub body: Vec<u8>,
}

/// Response half of a flow.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlowResponse {
    /// HTTP status code.
    pub status: u16,

    /// Response headers.
    pub headers: HashMap<String, String>,

    /// Raw response body.
    pub body: Vec<u8>,
}

impl FlowResponse {
    /// Creates a response with a status and body.
    #[must_use]
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: body.into(),
        }
    }

    /// Adds a header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Returns the body decoded as UTF-8, replacing invalid sequences.
    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

// ============================================================================
// Flow
// ============================================================================

/// One HTTP exchange observed by the proxy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Flow {
    /// Address of the client (device) that issued the request.
    pub client_ip: IpAddr,

    /// The request.
    pub request: FlowRequest,

    /// The response, once available or when synthesized by the router.
    pub response: Option<FlowResponse>,
}

impl Flow {
    /// Creates a request-only flow.
    #[must_use]
    pub fn new(client_ip: IpAddr, method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            client_ip,
            request: FlowRequest {
                url: url.into(),
                method: method.into(),
                ..FlowRequest::default()
            },
            response: None,
        }
    }

    /// Sets the request body.
    #[must_use]
    pub fn with_request_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.request.body = body.into();
        self
    }

    /// Sets the response.
    #[must_use]
    pub fn with_response(mut self, response: FlowResponse) -> Self {
        self.response = Some(response);
        self
    }

    /// Returns the request URL.
    #[inline]
    #[must_use]
    pub fn url(&self) -> &str {
        &self.request.url
    }

    /// Returns the host part of the request URL, if it parses.
    #[must_use]
    pub fn host(&self) -> Option<String> {
        Url::parse(&self.request.url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
    }

    /// Returns the request body decoded as UTF-8 (lossy).
    #[must_use]
    pub fn request_text(&self) -> String {
        String::from_utf8_lossy(&self.request.body).into_owned()
    }

    /// Returns the response body decoded as UTF-8 (lossy), empty if no response.
    #[must_use]
    pub fn response_text(&self) -> String {
        self.response
            .as_ref()
            .map(FlowResponse::text)
            .unwrap_or_default()
    }
}

// ============================================================================
// Flow - Event Parsing
// ============================================================================

impl Flow {
    /// Parses a proxy event into its phase and flow.
    ///
    /// Missing optional fields default the way the proxy would report them:
    /// method `GET`, empty bodies, status 0.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] if the phase is unknown, or the URL or
    /// client IP is missing or invalid.
    pub fn from_event(event: &Value) -> Result<(FlowPhase, Flow)> {
        let phase = match event.get("phase").and_then(|v| v.as_str()) {
            Some("request") => FlowPhase::Request,
            Some("response") => FlowPhase::Response,
            other => {
                return Err(Error::protocol(format!(
                    "Unknown flow phase: {}",
                    other.unwrap_or("<missing>")
                )));
            }
        };

        let client_ip = event
            .get("clientIp")
            .and_then(|v| v.as_str())
            .map(|s| {
                s.parse::<IpAddr>()
                    .map_err(|e| Error::protocol(format!("Invalid clientIp {s}: {e}")))
            })
            .transpose()?
            .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));

        let request = event
            .get("request")
            .ok_or_else(|| Error::protocol("Flow event has no request"))?;

        let url = request
            .get("url")
            .and_then(|v| v.as_str())
            .ok_or_else(|| Error::protocol("Flow request has no url"))?
            .to_string();

        let flow = Flow {
            client_ip,
            request: FlowRequest {
                url,
                method: request
                    .get("method")
                    .and_then(|v| v.as_str())
                    .unwrap_or("GET")
                    .to_string(),
                headers: parse_headers(request),
                body: parse_body(request),
            },
            response: event.get("response").filter(|v| !v.is_null()).map(|r| {
                FlowResponse {
                    status: r
                        .get("status")
                        .and_then(Value::as_u64)
                        .and_then(|v| u16::try_from(v).ok())
                        .unwrap_or(0),
                    headers: parse_headers(r),
                    body: parse_body(r),
                }
            }),
        };

        Ok((phase, flow))
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Parses a `headers` object, skipping non-string values.
fn parse_headers(value: &Value) -> HashMap<String, String> {
    value
        .get("headers")
        .and_then(|v| v.as_object())
        .map(|obj| {
            obj.iter()
                .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                .collect()
        })
        .unwrap_or_default()
}

/// Parses a `body` field given as text.
fn parse_body(value: &Value) -> Vec<u8> {
    value
        .get("body")
        .and_then(|v| v.as_str())
        .map(|s| s.as_bytes().to_vec())
        .unwrap_or_default()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    #[test]
    fn test_flow_host() {
        let flow = Flow::new(
            IpAddr::V4(Ipv4Addr::LOCALHOST),
            "GET",
            "https://api.example.com/v1/items?page=2",
        );
        assert_eq!(flow.host().as_deref(), Some("api.example.com"));
    }

    #[test]
    fn test_response_text_without_response() {
        let flow = Flow::new(IpAddr::V4(Ipv4Addr::LOCALHOST), "GET", "http://a/");
        assert_eq!(flow.response_text(), "");
    }

    #[test]
    fn test_from_event_response() {
        let event = json!({
            "phase": "response",
            "clientIp": "192.168.1.20",
            "request": {
                "url": "https://api.example.com/search",
                "method": "POST",
                "body": "q=berries",
                "headers": { "Content-Type": "application/x-www-form-urlencoded" }
            },
            "response": { "status": 200, "body": "{\"items\":[]}" }
        });

        let (phase, flow) = Flow::from_event(&event).expect("valid event");
        assert_eq!(phase, FlowPhase::Response);
        assert_eq!(flow.client_ip, "192.168.1.20".parse::<IpAddr>().unwrap());
        assert_eq!(flow.request.method, "POST");
        assert_eq!(flow.request_text(), "q=berries");
        assert_eq!(
            flow.request.headers.get("Content-Type").map(String::as_str),
            Some("application/x-www-form-urlencoded")
        );
        assert_eq!(flow.response.as_ref().map(|r| r.status), Some(200));
        assert_eq!(flow.response_text(), "{\"items\":[]}");
    }

    #[test]
    fn test_from_event_defaults() {
        let event = json!({
            "phase": "request",
            "clientIp": "10.0.0.2",
            "request": { "url": "http://example.com/" }
        });

        let (phase, flow) = Flow::from_event(&event).expect("valid event");
        assert_eq!(phase, FlowPhase::Request);
        assert_eq!(flow.request.method, "GET");
        assert!(flow.request.body.is_empty());
        assert!(flow.response.is_none());
    }

    #[test]
    fn test_from_event_out_of_range_status() {
        let event = json!({
            "phase": "response",
            "clientIp": "10.0.0.2",
            "request": { "url": "http://example.com/" },
            "response": { "status": 70000 }
        });

        let (_, flow) = Flow::from_event(&event).expect("valid event");
        assert_eq!(flow.response.map(|r| r.status), Some(0));
    }

    #[test]
    fn test_from_event_rejects_unknown_phase() {
        let event = json!({ "phase": "connect", "request": { "url": "http://a/" } });
        let err = Flow::from_event(&event).unwrap_err();
        assert!(matches!(err, Error::Protocol { .. }));
    }

    #[test]
    fn test_from_event_rejects_bad_ip() {
        let event = json!({
            "phase": "request",
            "clientIp": "not-an-ip",
            "request": { "url": "http://a/" }
        });
        assert!(Flow::from_event(&event).is_err());
    }
}
