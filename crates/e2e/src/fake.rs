//! In-memory driver
//!
//! A scripted stand-in for a browser page: elements live in a table keyed by
//! the exact selector string the page objects use, and reactions registered
//! per action mutate that table the way the real UI would respond.

use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::driver::{Driver, WaitState};
use crate::error::{E2eError, E2eResult};
use crate::network::RouteRule;

/// A rendered element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeElement {
    pub text: String,
    pub value: String,
    pub visible: bool,
    pub enabled: bool,
}

impl FakeElement {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            value: String::new(),
            visible: true,
            enabled: true,
        }
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

/// The element table reactions operate on
#[derive(Debug, Default)]
pub struct FakeDom {
    elements: HashMap<String, Vec<FakeElement>>,
}

impl FakeDom {
    /// Replace every match of `selector` with a single element
    pub fn insert(&mut self, selector: &str, element: FakeElement) {
        self.elements.insert(selector.to_string(), vec![element]);
    }

    /// Add one more match for `selector`
    pub fn push(&mut self, selector: &str, element: FakeElement) {
        self.elements.entry(selector.to_string()).or_default().push(element);
    }

    pub fn remove(&mut self, selector: &str) {
        self.elements.remove(selector);
    }

    pub fn get(&self, selector: &str) -> &[FakeElement] {
        self.elements.get(selector).map(Vec::as_slice).unwrap_or(&[])
    }

    fn first(&self, selector: &str) -> Option<&FakeElement> {
        self.get(selector).first()
    }

    fn first_mut(&mut self, selector: &str) -> Option<&mut FakeElement> {
        self.elements.get_mut(selector).and_then(|els| els.first_mut())
    }

    fn set_last_text(&mut self, selector: &str, text: String) {
        let els = self.elements.entry(selector.to_string()).or_default();
        match els.last_mut() {
            Some(el) => el.text = text,
            None => els.push(FakeElement::new(text)),
        }
    }
}

/// Callback run after an action; receives the URL or pressed key
pub type Reaction = Box<dyn Fn(&mut FakeDom, &str) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Action {
    Goto,
    Click,
    Press,
}

#[derive(Default)]
struct FakeState {
    dom: FakeDom,
    reactions: HashMap<(Action, String), Vec<Reaction>>,
    frames: HashMap<String, VecDeque<String>>,
    evaluations: HashMap<String, serde_json::Value>,
    actions: Vec<String>,
    routes: Vec<RouteRule>,
    url: String,
    offline: bool,
    fail_screenshots: bool,
    closed: bool,
}

impl FakeState {
    fn react(&mut self, action: Action, key: &str, arg: &str) {
        if let Some(reactions) = self.reactions.get(&(action, key.to_string())) {
            for reaction in reactions {
                reaction(&mut self.dom, arg);
            }
        }
    }

    fn interactable(&self, selector: &str) -> E2eResult<()> {
        match self.dom.first(selector) {
            Some(el) if el.visible && el.enabled => Ok(()),
            Some(el) if el.visible => Err(E2eError::Timeout(format!("{} to be enabled", selector))),
            _ => Err(E2eError::ElementNotFound {
                selector: selector.to_string(),
            }),
        }
    }
}

/// In-memory [`Driver`]
#[derive(Default)]
pub struct FakeDriver {
    state: Mutex<FakeState>,
}

impl FakeDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, selector: &str, element: FakeElement) {
        self.state.lock().dom.insert(selector, element);
    }

    pub fn push(&self, selector: &str, element: FakeElement) {
        self.state.lock().dom.push(selector, element);
    }

    pub fn remove(&self, selector: &str) {
        self.state.lock().dom.remove(selector);
    }

    pub fn on_goto(&self, url: &str, reaction: impl Fn(&mut FakeDom, &str) + Send + Sync + 'static) {
        self.on(Action::Goto, url, reaction);
    }

    pub fn on_click(&self, selector: &str, reaction: impl Fn(&mut FakeDom, &str) + Send + Sync + 'static) {
        self.on(Action::Click, selector, reaction);
    }

    pub fn on_press(&self, selector: &str, reaction: impl Fn(&mut FakeDom, &str) + Send + Sync + 'static) {
        self.on(Action::Press, selector, reaction);
    }

    fn on(&self, action: Action, key: &str, reaction: impl Fn(&mut FakeDom, &str) + Send + Sync + 'static) {
        self.state
            .lock()
            .reactions
            .entry((action, key.to_string()))
            .or_default()
            .push(Box::new(reaction));
    }

    /// Each text read of `selector` advances the last match to the next frame;
    /// the final frame sticks.
    pub fn stream_text<I, S>(&self, selector: &str, frames: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.state
            .lock()
            .frames
            .insert(selector.to_string(), frames.into_iter().map(Into::into).collect());
    }

    pub fn on_evaluate(&self, expression: &str, value: serde_json::Value) {
        self.state.lock().evaluations.insert(expression.to_string(), value);
    }

    pub fn fail_screenshots(&self, fail: bool) {
        self.state.lock().fail_screenshots = fail;
    }

    /// Actions performed so far, e.g. `click:#send`, `fill:#input=hello`
    pub fn actions(&self) -> Vec<String> {
        self.state.lock().actions.clone()
    }

    pub fn routes(&self) -> Vec<RouteRule> {
        self.state.lock().routes.clone()
    }

    pub fn is_offline(&self) -> bool {
        self.state.lock().offline
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }
}

#[async_trait]
impl Driver for FakeDriver {
    async fn goto(&self, url: &str) -> E2eResult<()> {
        let mut state = self.state.lock();
        if state.offline {
            return Err(E2eError::Playwright(format!("net::ERR_INTERNET_DISCONNECTED at {}", url)));
        }
        state.actions.push(format!("goto:{}", url));
        state.url = url.to_string();
        state.react(Action::Goto, url, url);
        Ok(())
    }

    async fn reload(&self) -> E2eResult<()> {
        let mut state = self.state.lock();
        state.actions.push("reload".to_string());
        let url = state.url.clone();
        state.react(Action::Goto, &url, &url);
        Ok(())
    }

    async fn current_url(&self) -> E2eResult<String> {
        Ok(self.state.lock().url.clone())
    }

    async fn wait_for(&self, selector: &str, state: WaitState, _timeout: Duration) -> E2eResult<()> {
        let guard = self.state.lock();
        let els = guard.dom.get(selector);
        let satisfied = match state {
            WaitState::Visible => els.iter().any(|e| e.visible),
            WaitState::Hidden => !els.iter().any(|e| e.visible),
            WaitState::Attached => !els.is_empty(),
            WaitState::Detached => els.is_empty(),
        };
        if satisfied {
            Ok(())
        } else {
            Err(E2eError::Timeout(format!("{} to be {}", selector, state.as_str())))
        }
    }

    async fn click(&self, selector: &str, _timeout: Duration) -> E2eResult<()> {
        let mut state = self.state.lock();
        state.interactable(selector)?;
        state.actions.push(format!("click:{}", selector));
        state.react(Action::Click, selector, "");
        Ok(())
    }

    async fn fill(&self, selector: &str, value: &str, _timeout: Duration) -> E2eResult<()> {
        let mut state = self.state.lock();
        state.interactable(selector)?;
        if let Some(el) = state.dom.first_mut(selector) {
            el.value = value.to_string();
        }
        state.actions.push(format!("fill:{}={}", selector, value));
        Ok(())
    }

    async fn press(&self, selector: &str, key: &str) -> E2eResult<()> {
        let mut state = self.state.lock();
        state.interactable(selector)?;
        state.actions.push(format!("press:{}={}", selector, key));
        state.react(Action::Press, selector, key);
        Ok(())
    }

    async fn select_option(&self, selector: &str, label: &str, _timeout: Duration) -> E2eResult<()> {
        let mut state = self.state.lock();
        state.interactable(selector)?;
        if let Some(el) = state.dom.first_mut(selector) {
            el.value = label.to_string();
        }
        state.actions.push(format!("select:{}={}", selector, label));
        Ok(())
    }

    async fn count(&self, selector: &str) -> E2eResult<usize> {
        Ok(self.state.lock().dom.get(selector).len())
    }

    async fn all_text_contents(&self, selector: &str) -> E2eResult<Vec<String>> {
        let mut state = self.state.lock();
        let next = state.frames.get_mut(selector).and_then(|q| q.pop_front());
        if let Some(frame) = next {
            state.dom.set_last_text(selector, frame);
        }
        Ok(state.dom.get(selector).iter().map(|e| e.text.clone()).collect())
    }

    async fn is_visible(&self, selector: &str) -> E2eResult<bool> {
        Ok(self.state.lock().dom.first(selector).map(|e| e.visible).unwrap_or(false))
    }

    async fn is_enabled(&self, selector: &str) -> E2eResult<bool> {
        self.state
            .lock()
            .dom
            .first(selector)
            .map(|e| e.enabled)
            .ok_or_else(|| E2eError::ElementNotFound {
                selector: selector.to_string(),
            })
    }

    async fn input_value(&self, selector: &str) -> E2eResult<String> {
        self.state
            .lock()
            .dom
            .first(selector)
            .map(|e| e.value.clone())
            .ok_or_else(|| E2eError::ElementNotFound {
                selector: selector.to_string(),
            })
    }

    async fn screenshot(&self, path: &Path, _full_page: bool) -> E2eResult<()> {
        let fail = self.state.lock().fail_screenshots;
        if fail {
            return Err(E2eError::Playwright("screenshot capture failed".to_string()));
        }
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, b"\x89PNG fake").await?;
        self.state
            .lock()
            .actions
            .push(format!("screenshot:{}", path.display()));
        Ok(())
    }

    async fn evaluate(&self, expression: &str) -> E2eResult<serde_json::Value> {
        Ok(self
            .state
            .lock()
            .evaluations
            .get(expression)
            .cloned()
            .unwrap_or(serde_json::Value::Null))
    }

    async fn set_offline(&self, offline: bool) -> E2eResult<()> {
        self.state.lock().offline = offline;
        Ok(())
    }

    async fn route(&self, rule: &RouteRule) -> E2eResult<()> {
        self.state.lock().routes.push(rule.clone());
        Ok(())
    }

    async fn unroute_all(&self) -> E2eResult<()> {
        self.state.lock().routes.clear();
        Ok(())
    }

    async fn close(&self) -> E2eResult<()> {
        self.state.lock().closed = true;
        Ok(())
    }
}
