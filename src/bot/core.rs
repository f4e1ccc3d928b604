//! Automation session facade.
//!
//! A [`Bot`] ties one device to the shared [`FlowRouter`]: it registers a
//! response interceptor feeding its [`DataSubscription`] while running, and
//! exposes the navigation and scanning operations scripts need.
//!
//! # Example
//!
//! ```ignore
//! struct Harvest;
//!
//! #[async_trait]
//! impl BotScript for Harvest {
//!     async fn run(&self, bot: &Bot) -> Result<()> {
//!         bot.subscribe([Filter::new("detail", r"/api/item/detail")?]);
//!         bot.touch_anchor("to_detail", TouchAnchor::new()).await?;
//!         let captured = bot.wait_data(Some("detail"), Duration::from_secs(10)).await;
//!         for record in captured.records { println!("{}", record.json()?); }
//!         bot.back_to("home", None).await
//!     }
//! }
//!
//! bot.run(&Harvest).await?;
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{debug, error, info};

use crate::device::{Device, Matcher};
use crate::error::{Error, Result};
use crate::identifiers::InterceptorId;
use crate::network::{Captured, DataSubscription, Filter, FlowRouter};
use crate::page::{Navigator, PageGraph, TouchAnchor};
use crate::scan::{ScanHooks, ScanReport, ScrollScan};

use super::builder::BotBuilder;
use super::options::BotOptions;

// ============================================================================
// BotScript
// ============================================================================

/// Main script of an automation run.
#[async_trait]
pub trait BotScript: Send + Sync {
    /// Runs the script against a started bot.
    async fn run(&self, bot: &Bot) -> Result<()>;
}

// ============================================================================
// Types
// ============================================================================

/// Internal shared state for the bot.
pub(crate) struct BotInner {
    /// Router shared with the proxy.
    pub router: Arc<FlowRouter>,

    /// Capture filters fed by the interceptor.
    pub subscription: Arc<DataSubscription>,

    /// Navigator over the page graph.
    pub navigator: Navigator,

    /// Session options.
    pub options: BotOptions,

    /// Registration while running.
    pub interceptor: Mutex<Option<InterceptorId>>,
}

impl Drop for BotInner {
    fn drop(&mut self) {
        if let Some(id) = self.interceptor.get_mut().take() {
            self.router.unregister(id);
            debug!(interceptor = %id, "Interceptor released on drop");
        }
    }
}

// ============================================================================
// Bot
// ============================================================================

/// One automation session.
///
/// Cheap to clone; the interceptor is unregistered by [`Bot::stop`] or when
/// the last clone is dropped.
#[derive(Clone)]
pub struct Bot {
    /// Shared inner state.
    pub(crate) inner: Arc<BotInner>,
}

impl fmt::Debug for Bot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bot")
            .field("device_ip", &self.inner.options.device_ip)
            .field("interceptor", &self.interceptor_id())
            .field("subscription", &self.inner.subscription)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Bot - Construction
// ============================================================================

impl Bot {
    /// Creates a configuration builder.
    #[inline]
    #[must_use]
    pub fn builder() -> BotBuilder {
        BotBuilder::new()
    }

    pub(crate) fn new(
        router: Arc<FlowRouter>,
        graph: Arc<PageGraph>,
        device: Arc<dyn Device>,
        matcher: Arc<dyn Matcher>,
        options: BotOptions,
    ) -> Self {
        let navigator = Navigator::new(graph, device, matcher, options.navigation);
        Self {
            inner: Arc::new(BotInner {
                router,
                subscription: Arc::new(DataSubscription::new()),
                navigator,
                options,
                interceptor: Mutex::new(None),
            }),
        }
    }

    /// Returns the navigator.
    #[inline]
    #[must_use]
    pub fn navigator(&self) -> &Navigator {
        &self.inner.navigator
    }

    /// Returns the capture table.
    #[inline]
    #[must_use]
    pub fn subscription(&self) -> &Arc<DataSubscription> {
        &self.inner.subscription
    }

    /// Returns the shared router.
    #[inline]
    #[must_use]
    pub fn router(&self) -> &Arc<FlowRouter> {
        &self.inner.router
    }

    /// Returns the session options.
    #[inline]
    #[must_use]
    pub fn options(&self) -> &BotOptions {
        &self.inner.options
    }
}

// ============================================================================
// Bot - Lifecycle
// ============================================================================

impl Bot {
    /// Registers the response interceptor. Calling it again is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Interceptor`] if the router refuses the registration.
    pub fn start(&self) -> Result<InterceptorId> {
        let mut slot = self.inner.interceptor.lock();
        if let Some(id) = *slot {
            return Ok(id);
        }

        let options = &self.inner.options;
        let id = self
            .inner
            .router
            .register(
                None,
                Some(self.inner.subscription.interceptor()),
                options.device_ip,
                options.intercept_all,
            )
            .ok_or_else(|| Error::interceptor("router refused the registration"))?;

        *slot = Some(id);
        info!(
            interceptor = %id,
            device_ip = ?options.device_ip,
            intercept_all = options.intercept_all,
            "Bot started"
        );
        Ok(id)
    }

    /// Unregisters the interceptor and drops captured data. Idempotent.
    pub fn stop(&self) {
        let Some(id) = self.inner.interceptor.lock().take() else {
            return;
        };
        self.inner.router.unregister(id);
        self.inner.subscription.clear();
        info!(interceptor = %id, "Bot stopped");
    }

    /// Returns `true` while the interceptor is registered.
    #[inline]
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.inner.interceptor.lock().is_some()
    }

    /// Returns the interceptor registration, if running.
    #[inline]
    #[must_use]
    pub fn interceptor_id(&self) -> Option<InterceptorId> {
        *self.inner.interceptor.lock()
    }

    /// Starts the bot, runs `script`, and stops the bot.
    ///
    /// The bot is stopped whether or not the script succeeds.
    ///
    /// # Errors
    ///
    /// Returns the registration error or the script's error.
    pub async fn run(&self, script: &dyn BotScript) -> Result<()> {
        self.start()?;
        let result = script.run(self).await;
        if let Err(e) = &result {
            error!(error = %e, "Bot script failed");
        }
        self.stop();
        result
    }
}

// ============================================================================
// Bot - Script API
// ============================================================================

impl Bot {
    /// Adds capture filters. See [`DataSubscription::subscribe`].
    pub fn subscribe(&self, filters: impl IntoIterator<Item = Filter>) {
        self.inner.subscription.subscribe(filters);
    }

    /// Removes a capture filter.
    pub fn unsubscribe(&self, name: &str) -> bool {
        self.inner.subscription.unsubscribe(name)
    }

    /// Waits for captured data. See [`DataSubscription::wait`].
    pub async fn wait_data(&self, name: Option<&str>, timeout: Duration) -> Captured {
        self.inner.subscription.wait(name, timeout).await
    }

    /// Touches an anchor. See [`Navigator::touch_anchor`].
    ///
    /// # Errors
    ///
    /// Returns navigation and device errors.
    pub async fn touch_anchor(&self, anchor: &str, params: TouchAnchor) -> Result<()> {
        self.inner.navigator.touch_anchor(anchor, params).await
    }

    /// Backs out to a page or fragment. See [`Navigator::back_to`].
    ///
    /// # Errors
    ///
    /// Returns navigation and device errors.
    pub async fn back_to(&self, page: &str, fragment: Option<&str>) -> Result<()> {
        self.inner.navigator.back_to(page, fragment).await
    }

    /// Runs a scroll scan on this bot's device.
    ///
    /// # Errors
    ///
    /// Returns configuration, device, matcher and hook errors.
    pub async fn scroll_scan(
        &self,
        scan: &ScrollScan,
        hooks: &mut dyn ScanHooks,
    ) -> Result<ScanReport> {
        let nav = &self.inner.navigator;
        scan.run(nav.device().as_ref(), nav.matcher().as_ref(), hooks)
            .await
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::net::{IpAddr, Ipv4Addr};

    use crate::device::MatchResult;
    use crate::device::fake::{feature, rig};
    use crate::network::{Flow, FlowResponse};
    use crate::scan::ScanControl;

    const DEVICE: IpAddr = IpAddr::V4(Ipv4Addr::new(192, 168, 1, 23));

    fn bot_on(router: &Arc<FlowRouter>) -> Bot {
        let (state, device, matcher) = rig();
        state.lock().show("item", 540.0, 400.0);
        Bot::builder()
            .router(Arc::clone(router))
            .device(device)
            .matcher(matcher)
            .options(
                BotOptions::new()
                    .with_device_ip(DEVICE)
                    .with_poll_interval(Duration::from_millis(5)),
            )
            .build()
            .unwrap()
    }

    fn detail_flow(ip: IpAddr) -> Flow {
        Flow::new(ip, "GET", "https://shop.example/api/item/detail?id=7")
            .with_response(FlowResponse::new(200, r#"{"id":7}"#))
    }

    #[test]
    fn test_start_registers_once() {
        let router = Arc::new(FlowRouter::new());
        let bot = bot_on(&router);

        let id = bot.start().unwrap();
        assert_eq!(bot.start().unwrap(), id);
        assert_eq!(router.len(), 1);
        assert_eq!(router.session_for_ip(DEVICE), Some(id));

        bot.stop();
        bot.stop();
        assert!(router.is_empty());
        assert!(!bot.is_running());
    }

    #[test]
    fn test_drop_unregisters() {
        let router = Arc::new(FlowRouter::new());
        let bot = bot_on(&router);
        bot.start().unwrap();

        let clone = bot.clone();
        drop(bot);
        assert_eq!(router.len(), 1);

        drop(clone);
        assert!(router.is_empty());
    }

    #[tokio::test]
    async fn test_routed_flows_reach_wait_data() {
        let router = Arc::new(FlowRouter::new());
        let bot = bot_on(&router);
        bot.start().unwrap();
        bot.subscribe([Filter::new("detail", r"/api/item/detail").unwrap()]);

        router.on_response(&mut detail_flow(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 9))));
        router.on_response(&mut detail_flow(DEVICE));

        let captured = bot
            .wait_data(Some("detail"), Duration::from_millis(200))
            .await;
        assert!(captured.ready);
        assert_eq!(captured.records.len(), 1);
        assert_eq!(captured.records[0].json().unwrap()["id"], 7);
    }

    struct Probe {
        router: Arc<FlowRouter>,
        fail: bool,
    }

    #[async_trait]
    impl BotScript for Probe {
        async fn run(&self, bot: &Bot) -> Result<()> {
            assert!(bot.is_running());
            assert_eq!(self.router.len(), 1);
            if self.fail {
                return Err(Error::device("adb disconnected"));
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_run_stops_after_script() {
        let router = Arc::new(FlowRouter::new());
        let bot = bot_on(&router);

        let ok = Probe {
            router: Arc::clone(&router),
            fail: false,
        };
        bot.run(&ok).await.unwrap();
        assert!(router.is_empty());

        let failing = Probe {
            router: Arc::clone(&router),
            fail: true,
        };
        let err = bot.run(&failing).await.unwrap_err();
        assert!(err.is_collaborator_error());
        assert!(router.is_empty());
    }

    struct Count(usize);

    #[async_trait]
    impl ScanHooks for Count {
        async fn on_match(&mut self, _item: &MatchResult) -> Result<ScanControl> {
            self.0 += 1;
            Ok(ScanControl::Continue)
        }
    }

    #[tokio::test]
    async fn test_scroll_scan_uses_bot_device() {
        let router = Arc::new(FlowRouter::new());
        let bot = bot_on(&router);

        let mut hooks = Count(0);
        let report = bot
            .scroll_scan(
                &ScrollScan::new(feature("item")).with_max_swipes(0),
                &mut hooks,
            )
            .await
            .unwrap();
        assert_eq!(report.hits, 1);
        assert_eq!(hooks.0, 1);
    }
}
