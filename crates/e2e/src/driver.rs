//! Browser driver abstraction
//!
//! Page objects and the streaming detector only talk to a [`Driver`]. The
//! Playwright bridge is the production implementation; the in-memory
//! [`FakeDriver`](crate::fake::FakeDriver) backs the unit tests.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::E2eResult;
use crate::network::RouteRule;

/// Element state to wait for
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitState {
    #[default]
    Visible,
    Hidden,
    Attached,
    Detached,
}

impl WaitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            WaitState::Visible => "visible",
            WaitState::Hidden => "hidden",
            WaitState::Attached => "attached",
            WaitState::Detached => "detached",
        }
    }
}

/// One page in one isolated browser context.
///
/// Selectors are Playwright selector strings (CSS, `text=`, `:has-text()`,
/// comma-separated fallbacks). All methods report failures as errors; the
/// interaction layer decides which of them are tolerated.
#[async_trait]
pub trait Driver: Send + Sync {
    /// Navigate to a URL, relative to the configured base URL when it starts with `/`
    async fn goto(&self, url: &str) -> E2eResult<()>;

    async fn reload(&self) -> E2eResult<()>;

    async fn current_url(&self) -> E2eResult<String>;

    async fn wait_for(&self, selector: &str, state: WaitState, timeout: Duration) -> E2eResult<()>;

    async fn click(&self, selector: &str, timeout: Duration) -> E2eResult<()>;

    async fn fill(&self, selector: &str, value: &str, timeout: Duration) -> E2eResult<()>;

    /// Press a key on the first match of `selector`
    async fn press(&self, selector: &str, key: &str) -> E2eResult<()>;

    /// Select an option by its visible label
    async fn select_option(&self, selector: &str, label: &str, timeout: Duration) -> E2eResult<()>;

    async fn count(&self, selector: &str) -> E2eResult<usize>;

    /// Text content of every match, in document order
    async fn all_text_contents(&self, selector: &str) -> E2eResult<Vec<String>>;

    async fn is_visible(&self, selector: &str) -> E2eResult<bool>;

    async fn is_enabled(&self, selector: &str) -> E2eResult<bool>;

    async fn input_value(&self, selector: &str) -> E2eResult<String>;

    async fn screenshot(&self, path: &Path, full_page: bool) -> E2eResult<()>;

    /// Evaluate a JavaScript expression in the page
    async fn evaluate(&self, expression: &str) -> E2eResult<serde_json::Value>;

    async fn set_offline(&self, offline: bool) -> E2eResult<()>;

    async fn route(&self, rule: &RouteRule) -> E2eResult<()>;

    async fn unroute_all(&self) -> E2eResult<()>;

    async fn close(&self) -> E2eResult<()>;
}

/// Opens one isolated driver per scenario
#[async_trait]
pub trait DriverFactory: Send + Sync {
    async fn open(&self, scenario: &str) -> E2eResult<Arc<dyn Driver>>;
}
