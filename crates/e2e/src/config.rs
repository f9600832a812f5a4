//! Harness configuration
//!
//! Resolution order: built-in defaults, then the YAML file (if any), then
//! `E2E_*` environment variables. Command-line flags are applied on top by
//! the harness binary.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{E2eError, E2eResult};
use crate::locators::Locators;
use crate::playwright::PlaywrightConfig;
use crate::server::AppConfig;
use crate::streaming::StreamingConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Frontend origin the browser navigates to
    pub base_url: String,

    /// Backend origin for direct API calls
    pub api_url: String,

    pub credentials: Credentials,
    pub playwright: PlaywrightConfig,

    /// Screenshot output
    pub artifacts_dir: PathBuf,

    /// `test-results.json` output
    pub output_dir: PathBuf,

    pub timeouts: Timeouts,
    pub streaming: StreamingConfig,
    pub locators: Locators,
    pub app: AppConfig,

    /// Scenarios run concurrently, each in its own browser
    pub workers: usize,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            api_url: "http://localhost:8000".to_string(),
            credentials: Credentials::default(),
            playwright: PlaywrightConfig::default(),
            artifacts_dir: PathBuf::from("test-results/screenshots"),
            output_dir: PathBuf::from("test-results"),
            timeouts: Timeouts::default(),
            streaming: StreamingConfig::default(),
            locators: Locators::default(),
            app: AppConfig::default(),
            workers: 1,
        }
    }
}

/// Login pair used by every scenario that signs in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Default for Credentials {
    fn default() -> Self {
        Self {
            username: "admin".to_string(),
            password: "pwd123".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    /// UI affordances: buttons, inputs, tabs
    pub ui_ms: u64,

    /// Generated chat responses
    pub response_ms: u64,

    /// Whole scenario, browser launch included
    pub scenario_ms: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            ui_ms: 5_000,
            response_ms: 30_000,
            scenario_ms: 120_000,
        }
    }
}

impl Timeouts {
    pub fn ui(&self) -> Duration {
        Duration::from_millis(self.ui_ms)
    }

    pub fn response(&self) -> Duration {
        Duration::from_millis(self.response_ms)
    }

    pub fn scenario(&self) -> Duration {
        Duration::from_millis(self.scenario_ms)
    }
}

impl HarnessConfig {
    /// Defaults, optional YAML file, then process environment
    pub fn load(path: Option<&Path>) -> E2eResult<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> E2eResult<Self> {
        debug!("Loading harness config from {}", path.display());
        let content = std::fs::read_to_string(path)
            .map_err(|e| E2eError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(yaml: &str) -> E2eResult<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Apply `E2E_*` overrides read through `lookup`
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> E2eResult<()> {
        if let Some(url) = lookup("E2E_BASE_URL") {
            self.base_url = url;
        }
        if let Some(url) = lookup("E2E_API_URL") {
            self.api_url = url;
        }
        if let Some(username) = lookup("E2E_USERNAME") {
            self.credentials.username = username;
        }
        if let Some(password) = lookup("E2E_PASSWORD") {
            self.credentials.password = password;
        }
        if let Some(headless) = lookup("E2E_HEADLESS") {
            self.playwright.headless = parse_bool(&headless)
                .ok_or_else(|| E2eError::Config(format!("E2E_HEADLESS: not a boolean: {}", headless)))?;
        }
        if let Some(workers) = lookup("E2E_WORKERS") {
            self.workers = workers
                .trim()
                .parse()
                .map_err(|_| E2eError::Config(format!("E2E_WORKERS: not a number: {}", workers)))?;
        }
        Ok(())
    }

    pub fn validate(&self) -> E2eResult<()> {
        if self.workers == 0 {
            return Err(E2eError::Config("workers must be at least 1".to_string()));
        }
        for (name, url) in [("base_url", &self.base_url), ("api_url", &self.api_url)] {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(E2eError::Config(format!("{} must be an http(s) URL: {}", name, url)));
            }
        }
        if self.timeouts.ui_ms == 0 || self.timeouts.scenario_ms == 0 {
            return Err(E2eError::Config("timeouts must be > 0".to_string()));
        }
        self.streaming.validate()
    }

    /// `base_url` joined with an absolute path
    pub fn page_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
