//! Flow router shared by all automation sessions.
//!
//! One proxy serves many devices. Each automation session registers its
//! interceptor callbacks here, either bound to its device's IP address or
//! in intercept-all mode, and the proxy hands every flow to the router.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │              FlowRouter                 │
//! │  ┌─────────────────────────────────┐   │
//! │  │ id=1 → 192.168.1.20 → callbacks │   │
//! │  │ id=2 → 192.168.1.21 → callbacks │   │
//! │  │ id=3 → (all)        → callbacks │   │
//! │  └─────────────────────────────────┘   │
//! └─────────────────────────────────────────┘
//!         ▲ on_request / on_response
//!         │
//!       proxy
//! ```
//!
//! Callbacks run on the proxy's thread, outside the registry lock. A failing
//! or panicking callback is logged and skipped; it never reaches the proxy or
//! the other sessions.

// ============================================================================
// Imports
// ============================================================================

use std::any::Any;
use std::fmt;
use std::net::IpAddr;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tracing::{debug, error, info, warn};

use crate::error::Result;
use crate::identifiers::InterceptorId;

use super::flow::{Flow, FlowPhase, FlowResponse};

// ============================================================================
// Constants
// ============================================================================

/// URL prefix reserved for the router itself.
///
/// Requests to this prefix are answered by the router and never reach a
/// session callback or the network.
pub const INTERNAL_URL_PREFIX: &str = "http://flowpilot.internal/";

/// Body of the synthetic response for short-circuited requests.
const CANCELLED_BODY: &[u8] = b"terminated the request by flowpilot";

// ============================================================================
// Types
// ============================================================================

/// Interceptor callback invoked for each routed flow.
///
/// Returning an error only logs it; the flow continues to the next session.
pub type FlowCallback = Arc<dyn Fn(&mut Flow) -> Result<()> + Send + Sync>;

/// What [`FlowRouter::route`] did with a flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    /// The flow targeted the internal prefix and got a synthetic response.
    ShortCircuited,
    /// The flow was handed to this many callbacks.
    Dispatched(usize),
}

/// One session's registration.
struct Registration {
    on_request: Option<FlowCallback>,
    on_response: Option<FlowCallback>,
    ip: Option<IpAddr>,
    intercept_all: bool,
}

impl Registration {
    fn callback(&self, phase: FlowPhase) -> Option<&FlowCallback> {
        match phase {
            FlowPhase::Request => self.on_request.as_ref(),
            FlowPhase::Response => self.on_response.as_ref(),
        }
    }

    fn accepts(&self, client_ip: IpAddr) -> bool {
        self.intercept_all || self.ip == Some(client_ip)
    }
}

/// Tables guarded by the router lock.
#[derive(Default)]
struct Tables {
    last_id: u64,
    sessions: FxHashMap<InterceptorId, Registration>,
    ip_to_id: FxHashMap<IpAddr, InterceptorId>,
}

// ============================================================================
// FlowRouter
// ============================================================================

/// Registry of interceptor sessions and dispatcher of proxy flows.
///
/// Construct one per process and share it (`Arc<FlowRouter>`) between the
/// proxy integration and every bot.
///
/// # Example
///
/// ```ignore
/// let router = Arc::new(FlowRouter::new());
///
/// let id = router.register(
///     None,
///     Some(Arc::new(|flow: &mut Flow| {
///         println!("{}", flow.url());
///         Ok(())
///     })),
///     Some("192.168.1.20".parse()?),
///     false,
/// );
///
/// // From the proxy thread
/// router.on_response(&mut flow);
/// ```
#[derive(Default)]
pub struct FlowRouter {
    tables: Mutex<Tables>,
}

impl fmt::Debug for FlowRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlowRouter")
            .field("sessions", &self.len())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// FlowRouter - Registration
// ============================================================================

impl FlowRouter {
    /// Creates an empty router.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a session's callbacks.
    ///
    /// # Arguments
    ///
    /// * `on_request` - Called for request-phase flows
    /// * `on_response` - Called for response-phase flows
    /// * `ip` - Device IP the session is bound to
    /// * `intercept_all` - Receive flows from every client regardless of IP
    ///
    /// # Returns
    ///
    /// The new session ID, or `None` (and nothing registered) when both
    /// callbacks are absent.
    pub fn register(
        &self,
        on_request: Option<FlowCallback>,
        on_response: Option<FlowCallback>,
        ip: Option<IpAddr>,
        intercept_all: bool,
    ) -> Option<InterceptorId> {
        if on_request.is_none() && on_response.is_none() {
            debug!("Skipping interceptor registration without callbacks");
            return None;
        }

        let mut tables = self.tables.lock();
        tables.last_id += 1;
        let id = InterceptorId::from_u64(tables.last_id)?;

        if let Some(ip) = ip
            && let Some(previous) = tables.ip_to_id.insert(ip, id)
        {
            warn!(%ip, %previous, %id, "IP already bound, reverse lookup moves to newest session");
        }

        tables.sessions.insert(
            id,
            Registration {
                on_request,
                on_response,
                ip,
                intercept_all,
            },
        );

        info!(%id, ?ip, intercept_all, "Interceptor registered");
        Some(id)
    }

    /// Removes a session.
    ///
    /// Unknown IDs are ignored, so calling this twice is harmless.
    pub fn unregister(&self, id: InterceptorId) {
        let mut tables = self.tables.lock();
        let Some(registration) = tables.sessions.remove(&id) else {
            debug!(%id, "Interceptor already unregistered");
            return;
        };

        if let Some(ip) = registration.ip
            && tables.ip_to_id.get(&ip) == Some(&id)
        {
            tables.ip_to_id.remove(&ip);
        }

        info!(%id, "Interceptor unregistered");
    }

    /// Returns the session most recently bound to `ip`.
    #[must_use]
    pub fn session_for_ip(&self, ip: IpAddr) -> Option<InterceptorId> {
        self.tables.lock().ip_to_id.get(&ip).copied()
    }

    /// Returns the number of registered sessions.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.tables.lock().sessions.len()
    }

    /// Returns `true` if no session is registered.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Builds a URL that the router answers itself.
    ///
    /// A session can point a pending request at this URL to let it complete
    /// without tearing down the proxy.
    #[must_use]
    pub fn cancel_url(tag: &str) -> String {
        format!("{INTERNAL_URL_PREFIX}cancel/{tag}")
    }
}

// ============================================================================
// FlowRouter - Dispatch
// ============================================================================

impl FlowRouter {
    /// Proxy entry point for request-phase flows.
    pub fn on_request(&self, flow: &mut Flow) -> RouteOutcome {
        self.route(flow, FlowPhase::Request)
    }

    /// Proxy entry point for response-phase flows.
    pub fn on_response(&self, flow: &mut Flow) -> RouteOutcome {
        self.route(flow, FlowPhase::Response)
    }

    /// Dispatches a flow to every matching session.
    ///
    /// A session matches if it intercepts all flows, or if it is bound to the
    /// flow's client IP. Callbacks are invoked in registration order.
    pub fn route(&self, flow: &mut Flow, phase: FlowPhase) -> RouteOutcome {
        if phase == FlowPhase::Request && flow.request.url.starts_with(INTERNAL_URL_PREFIX) {
            debug!(url = %flow.request.url, "Short-circuiting internal request");
            flow.response = Some(
                FlowResponse::new(200, CANCELLED_BODY).with_header("Content-Type", "text/html"),
            );
            return RouteOutcome::ShortCircuited;
        }

        let callbacks: Vec<(InterceptorId, FlowCallback)> = {
            let tables = self.tables.lock();
            let mut matched: Vec<_> = tables
                .sessions
                .iter()
                .filter(|(_, reg)| reg.accepts(flow.client_ip))
                .filter_map(|(id, reg)| reg.callback(phase).map(|cb| (*id, Arc::clone(cb))))
                .collect();
            matched.sort_unstable_by_key(|(id, _)| *id);
            matched
        };

        for (id, callback) in &callbacks {
            invoke(*id, callback, flow, phase);
        }

        RouteOutcome::Dispatched(callbacks.len())
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Runs one callback, containing both errors and panics.
fn invoke(id: InterceptorId, callback: &FlowCallback, flow: &mut Flow, phase: FlowPhase) {
    match catch_unwind(AssertUnwindSafe(|| callback(flow))) {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            warn!(%id, %phase, url = %flow.request.url, error = %e, "Interceptor callback failed");
        }
        Err(payload) => {
            error!(
                %id,
                %phase,
                url = %flow.request.url,
                panic = panic_message(payload.as_ref()),
                "Interceptor callback panicked"
            );
        }
    }
}

/// Extracts a readable message from a panic payload.
fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "<non-string panic>"
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::net::Ipv4Addr;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::error::Error;

    fn ip(last: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(192, 168, 1, last))
    }

    fn counter() -> (Arc<AtomicUsize>, FlowCallback) {
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = Arc::clone(&count);
        let callback: FlowCallback = Arc::new(move |_flow: &mut Flow| {
            count_clone.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        (count, callback)
    }

    fn flow_from(last: u8) -> Flow {
        Flow::new(ip(last), "GET", "https://api.example.com/list")
    }

    #[test]
    fn test_register_without_callbacks_is_noop() {
        let router = FlowRouter::new();
        assert!(router.register(None, None, Some(ip(1)), false).is_none());
        assert!(router.is_empty());
    }

    #[test]
    fn test_ids_are_monotonic() {
        let router = FlowRouter::new();
        let (_, cb) = counter();
        let a = router.register(None, Some(Arc::clone(&cb)), None, true).unwrap();
        let b = router.register(None, Some(Arc::clone(&cb)), None, true).unwrap();
        router.unregister(a);
        let c = router.register(None, Some(cb), None, true).unwrap();
        assert!(a < b && b < c);
    }

    #[test]
    fn test_route_by_ip_and_intercept_all() {
        let router = FlowRouter::new();
        let (bound, bound_cb) = counter();
        let (other, other_cb) = counter();
        let (all, all_cb) = counter();

        router.register(None, Some(bound_cb), Some(ip(20)), false);
        router.register(None, Some(other_cb), Some(ip(21)), false);
        router.register(None, Some(all_cb), None, true);

        let outcome = router.on_response(&mut flow_from(20));
        assert_eq!(outcome, RouteOutcome::Dispatched(2));
        assert_eq!(bound.load(Ordering::SeqCst), 1);
        assert_eq!(other.load(Ordering::SeqCst), 0);
        assert_eq!(all.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unbound_session_without_intercept_all_gets_nothing() {
        let router = FlowRouter::new();
        let (count, cb) = counter();
        router.register(None, Some(cb), None, false);

        router.on_response(&mut flow_from(20));
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_phase_selects_callback() {
        let router = FlowRouter::new();
        let (requests, req_cb) = counter();
        let (responses, resp_cb) = counter();
        router.register(Some(req_cb), Some(resp_cb), Some(ip(20)), false);

        router.on_request(&mut flow_from(20));
        router.on_request(&mut flow_from(20));
        router.on_response(&mut flow_from(20));

        assert_eq!(requests.load(Ordering::SeqCst), 2);
        assert_eq!(responses.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unregister_stops_delivery() {
        let router = FlowRouter::new();
        let (count, cb) = counter();
        let id = router.register(None, Some(cb), Some(ip(20)), false).unwrap();

        router.on_response(&mut flow_from(20));
        router.unregister(id);
        router.unregister(id);
        router.on_response(&mut flow_from(20));

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(router.session_for_ip(ip(20)).is_none());
    }

    #[test]
    fn test_shared_ip_sessions_each_receive_flow() {
        let router = FlowRouter::new();
        let (first, first_cb) = counter();
        let (second, second_cb) = counter();
        let a = router.register(None, Some(first_cb), Some(ip(20)), false).unwrap();
        let b = router.register(None, Some(second_cb), Some(ip(20)), false).unwrap();

        router.on_response(&mut flow_from(20));

        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(second.load(Ordering::SeqCst), 1);
        assert_eq!(router.session_for_ip(ip(20)), Some(b));

        // Removing the older session keeps the newer reverse binding
        router.unregister(a);
        assert_eq!(router.session_for_ip(ip(20)), Some(b));
    }

    #[test]
    fn test_failing_callbacks_are_contained() {
        let router = FlowRouter::new();
        let (count, cb) = counter();
        router.register(
            None,
            Some(Arc::new(|_flow: &mut Flow| Err(Error::interceptor("boom")))),
            None,
            true,
        );
        router.register(
            None,
            Some(Arc::new(|_flow: &mut Flow| panic!("callback bug"))),
            None,
            true,
        );
        router.register(None, Some(cb), None, true);

        let outcome = router.on_response(&mut flow_from(9));
        assert_eq!(outcome, RouteOutcome::Dispatched(3));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_internal_url_short_circuits() {
        let router = FlowRouter::new();
        let (count, cb) = counter();
        router.register(Some(cb), None, None, true);

        let mut flow = Flow::new(ip(20), "GET", FlowRouter::cancel_url("search"));
        let outcome = router.on_request(&mut flow);

        assert_eq!(outcome, RouteOutcome::ShortCircuited);
        assert_eq!(count.load(Ordering::SeqCst), 0);
        let response = flow.response.expect("synthetic response");
        assert_eq!(response.status, 200);
        assert_eq!(
            response.headers.get("Content-Type").map(String::as_str),
            Some("text/html")
        );
    }

    #[test]
    fn test_callback_may_reenter_router() {
        let router = Arc::new(FlowRouter::new());
        let router_clone = Arc::clone(&router);
        let id_cell: Arc<Mutex<Option<InterceptorId>>> = Arc::new(Mutex::new(None));
        let id_clone = Arc::clone(&id_cell);

        let id = router
            .register(
                None,
                Some(Arc::new(move |_flow: &mut Flow| {
                    if let Some(id) = id_clone.lock().take() {
                        router_clone.unregister(id);
                    }
                    Ok(())
                })),
                None,
                true,
            )
            .unwrap();
        *id_cell.lock() = Some(id);

        router.on_response(&mut flow_from(1));
        assert!(router.is_empty());
    }
}
