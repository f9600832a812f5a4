//! Base interaction layer
//!
//! Timeout-bounded wrappers over raw driver actions. None of them return an
//! error: interaction failures are logged and folded into an [`Outcome`] (or
//! `false`/`0`/empty for probes) so a missing element degrades one check
//! instead of aborting the scenario.

use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::driver::{Driver, WaitState};
use crate::error::{E2eError, E2eResult};

/// Result of a user-level action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Success,
    Failure { reason: String },
}

impl Outcome {
    pub fn failure(reason: impl Into<String>) -> Self {
        Outcome::Failure {
            reason: reason.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success)
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Outcome::Success => None,
            Outcome::Failure { reason } => Some(reason),
        }
    }

    pub fn from_result<T>(result: E2eResult<T>) -> Self {
        match result {
            Ok(_) => Outcome::Success,
            Err(e) => Outcome::failure(e.to_string()),
        }
    }

    /// Name the step that produced this outcome, for chaining multi-step flows
    pub fn step(self, action: &str) -> Result<(), String> {
        match self {
            Outcome::Success => Ok(()),
            Outcome::Failure { reason } => Err(format!("{}: {}", action, reason)),
        }
    }

    /// Turn a failure into a scenario assertion failure
    pub fn into_result(self, action: &str) -> E2eResult<()> {
        match self {
            Outcome::Success => Ok(()),
            Outcome::Failure { reason } => {
                Err(E2eError::AssertionFailed(format!("{} failed: {}", action, reason)))
            }
        }
    }
}

impl From<Result<(), String>> for Outcome {
    fn from(result: Result<(), String>) -> Self {
        match result {
            Ok(()) => Outcome::Success,
            Err(reason) => Outcome::Failure { reason },
        }
    }
}

/// Shared primitives every page object builds on
#[derive(Clone)]
pub struct Interactor {
    driver: Arc<dyn Driver>,
    artifacts_dir: PathBuf,
    timeout: Duration,
}

impl Interactor {
    pub fn new(driver: Arc<dyn Driver>, artifacts_dir: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            driver,
            artifacts_dir: artifacts_dir.into(),
            timeout,
        }
    }

    pub fn driver(&self) -> &dyn Driver {
        self.driver.as_ref()
    }

    /// Default bound for UI affordances
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn artifacts_dir(&self) -> &Path {
        &self.artifacts_dir
    }

    pub async fn safe_click(&self, selector: &str) -> Outcome {
        self.safe_click_within(selector, self.timeout).await
    }

    /// Wait for `selector` to be visible, then click it
    pub async fn safe_click_within(&self, selector: &str, timeout: Duration) -> Outcome {
        let result = async {
            self.driver.wait_for(selector, WaitState::Visible, timeout).await?;
            self.driver.click(selector, timeout).await
        }
        .await;

        if let Err(e) = &result {
            warn!(selector, error = %e, "Click failed");
        }
        Outcome::from_result(result)
    }

    pub async fn safe_fill(&self, selector: &str, value: &str) -> Outcome {
        self.safe_fill_within(selector, value, self.timeout).await
    }

    /// Wait for `selector` to be visible, then replace its value
    pub async fn safe_fill_within(&self, selector: &str, value: &str, timeout: Duration) -> Outcome {
        let result = async {
            self.driver.wait_for(selector, WaitState::Visible, timeout).await?;
            self.driver.fill(selector, value, timeout).await
        }
        .await;

        if let Err(e) = &result {
            warn!(selector, error = %e, "Fill failed");
        }
        Outcome::from_result(result)
    }

    pub async fn safe_select(&self, selector: &str, label: &str) -> Outcome {
        let result = async {
            self.driver.wait_for(selector, WaitState::Visible, self.timeout).await?;
            self.driver.select_option(selector, label, self.timeout).await
        }
        .await;

        if let Err(e) = &result {
            warn!(selector, label, error = %e, "Select failed");
        }
        Outcome::from_result(result)
    }

    /// Probe for a feature that may or may not be present
    pub async fn element_exists(&self, selector: &str, timeout: Duration) -> bool {
        match self.driver.wait_for(selector, WaitState::Visible, timeout).await {
            Ok(()) => true,
            Err(e) => {
                debug!(selector, error = %e, "Element not present");
                false
            }
        }
    }

    pub async fn is_visible(&self, selector: &str) -> bool {
        self.driver.is_visible(selector).await.unwrap_or(false)
    }

    pub async fn count_of(&self, selector: &str) -> usize {
        match self.driver.count(selector).await {
            Ok(n) => n,
            Err(e) => {
                warn!(selector, error = %e, "Count failed");
                0
            }
        }
    }

    pub async fn texts_of(&self, selector: &str) -> Vec<String> {
        match self.driver.all_text_contents(selector).await {
            Ok(texts) => texts,
            Err(e) => {
                warn!(selector, error = %e, "Reading text failed");
                Vec::new()
            }
        }
    }

    /// Best-effort full-page screenshot; `None` when capture fails
    pub async fn screenshot(&self, name: &str) -> Option<PathBuf> {
        let path = self.artifacts_dir.join(artifact_file_name(name, Utc::now()));

        if let Err(e) = tokio::fs::create_dir_all(&self.artifacts_dir).await {
            warn!(dir = %self.artifacts_dir.display(), error = %e, "Cannot create artifacts directory");
            return None;
        }

        match self.driver.screenshot(&path, true).await {
            Ok(()) => {
                debug!(path = %path.display(), "Screenshot saved");
                Some(path)
            }
            Err(e) => {
                warn!(name, error = %e, "Screenshot failed");
                None
            }
        }
    }
}

/// `{name}_{timestamp}.png` with the timestamp made filesystem safe
pub fn artifact_file_name(name: &str, at: DateTime<Utc>) -> String {
    static UNSAFE: OnceLock<Regex> = OnceLock::new();
    let unsafe_chars = UNSAFE.get_or_init(|| Regex::new(r"[^\w\-]+").expect("static regex"));

    let label = unsafe_chars.replace_all(name.trim(), "_");
    let stamp = at
        .to_rfc3339_opts(SecondsFormat::Millis, true)
        .replace([':', '.'], "-");

    format!("{}_{}.png", label, stamp)
}
