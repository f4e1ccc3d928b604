//! Scripted device and matcher for tests.
//!
//! The fake "screen" is a table of template names to positions. Reactions
//! installed on the device mutate that table when the script touches, swipes
//! or presses keys, which is enough to drive the navigator and scanner.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tracing_subscriber::EnvFilter;

use crate::error::Result;

use super::feature::{Feature, Template, TemplateMatch};
use super::geometry::{Point, Rect, Resolution};
use super::{Device, Matcher, Screen};

pub(crate) type Shared = Arc<Mutex<FakeState>>;

type TouchReaction = Box<dyn FnMut(Point, &mut FakeState) + Send>;
type KeyReaction = Box<dyn FnMut(&str, &mut FakeState) + Send>;
type SwipeReaction = Box<dyn FnMut(Point, Point, &mut FakeState) + Send>;

/// What is on screen plus a log of device calls.
#[derive(Default)]
pub(crate) struct FakeState {
    visible: FxHashMap<String, Vec<TemplateMatch>>,
    pub touches: Vec<Point>,
    pub swipes: Vec<(Point, Point)>,
    pub keys: Vec<String>,
    pub captures: usize,
}

impl FakeState {
    /// Adds an occurrence of a template.
    pub fn show(&mut self, name: &str, x: f32, y: f32) {
        self.show_with(name, x, y, 0.99);
    }

    /// Adds an occurrence with a given confidence.
    pub fn show_with(&mut self, name: &str, x: f32, y: f32, confidence: f32) {
        let position = Point::new(x, y);
        self.visible
            .entry(name.to_string())
            .or_default()
            .push(TemplateMatch {
                position,
                rect: Rect::around(position, 40.0, 40.0),
                confidence,
            });
    }

    /// Moves every occurrence of a template.
    pub fn shift(&mut self, name: &str, dx: f32, dy: f32) {
        for m in self.visible.get_mut(name).into_iter().flatten() {
            m.position = m.position.offset(dx, dy);
            m.rect = Rect::around(m.position, m.rect.width(), m.rect.height());
        }
    }

    /// Removes everything from the screen.
    pub fn clear_screen(&mut self) {
        self.visible.clear();
    }

    /// Creates shared state and a matcher reading it.
    pub fn shared_matcher() -> (Shared, Arc<FakeMatcher>) {
        let state: Shared = Arc::new(Mutex::new(FakeState::default()));
        let matcher = Arc::new(FakeMatcher {
            state: Arc::clone(&state),
        });
        (state, matcher)
    }
}

/// Scripted device.
pub(crate) struct FakeDevice {
    state: Shared,
    resolution: Resolution,
    on_touch: Mutex<Option<TouchReaction>>,
    on_key: Mutex<Option<KeyReaction>>,
    on_swipe: Mutex<Option<SwipeReaction>>,
}

impl FakeDevice {
    pub fn on_touch(&self, reaction: impl FnMut(Point, &mut FakeState) + Send + 'static) {
        *self.on_touch.lock() = Some(Box::new(reaction));
    }

    pub fn on_key(&self, reaction: impl FnMut(&str, &mut FakeState) + Send + 'static) {
        *self.on_key.lock() = Some(Box::new(reaction));
    }

    pub fn on_swipe(&self, reaction: impl FnMut(Point, Point, &mut FakeState) + Send + 'static) {
        *self.on_swipe.lock() = Some(Box::new(reaction));
    }
}

#[async_trait]
impl Device for FakeDevice {
    async fn capture_screen(&self) -> Result<Screen> {
        self.state.lock().captures += 1;
        Ok(blank_screen())
    }

    async fn touch(&self, point: Point) -> Result<()> {
        let mut reaction = self.on_touch.lock();
        let mut state = self.state.lock();
        state.touches.push(point);
        if let Some(reaction) = reaction.as_mut() {
            reaction(point, &mut state);
        }
        Ok(())
    }

    async fn swipe(&self, from: Point, to: Point) -> Result<()> {
        let mut reaction = self.on_swipe.lock();
        let mut state = self.state.lock();
        state.swipes.push((from, to));
        if let Some(reaction) = reaction.as_mut() {
            reaction(from, to, &mut state);
        }
        Ok(())
    }

    async fn key_event(&self, key: &str) -> Result<()> {
        let mut reaction = self.on_key.lock();
        let mut state = self.state.lock();
        state.keys.push(key.to_string());
        if let Some(reaction) = reaction.as_mut() {
            reaction(key, &mut state);
        }
        Ok(())
    }

    async fn resolution(&self) -> Result<Resolution> {
        Ok(self.resolution)
    }
}

/// Matcher answering from the fake screen table by template path.
pub(crate) struct FakeMatcher {
    state: Shared,
}

impl Matcher for FakeMatcher {
    fn find_all(
        &self,
        template: &Template,
        _screen: &Screen,
        region: Option<Rect>,
    ) -> Result<Vec<TemplateMatch>> {
        let key = template.path().to_string_lossy();
        let threshold = template.threshold.unwrap_or(0.0);
        let state = self.state.lock();

        Ok(state
            .visible
            .get(key.as_ref())
            .map(|matches| {
                matches
                    .iter()
                    .filter(|m| m.confidence >= threshold)
                    .filter(|m| region.is_none_or(|r| r.contains(m.position)))
                    .copied()
                    .collect()
            })
            .unwrap_or_default())
    }
}

/// Routes `tracing` output to the test harness; `RUST_LOG` selects levels.
pub(crate) fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Creates a 1080x1920 scripted device and its matcher.
pub(crate) fn rig() -> (Shared, Arc<FakeDevice>, Arc<FakeMatcher>) {
    init_tracing();
    let (state, matcher) = FakeState::shared_matcher();
    let device = Arc::new(FakeDevice {
        state: Arc::clone(&state),
        resolution: Resolution::new(1080, 1920),
        on_touch: Mutex::new(None),
        on_key: Mutex::new(None),
        on_swipe: Mutex::new(None),
    });
    (state, device, matcher)
}

/// Feature whose single template is keyed by `name`.
pub(crate) fn feature(name: &str) -> Feature {
    Feature::new(name, Template::new(name))
}

/// Placeholder screenshot.
pub(crate) fn blank_screen() -> Screen {
    Screen::new_rgba8(1, 1)
}
