//! Error types for E2E testing

use thiserror::Error;

#[derive(Error, Debug)]
pub enum E2eError {
    #[error("Application failed to start: {0}")]
    AppStartup(String),

    #[error("Application at {url} unreachable after {attempts} attempts")]
    AppUnreachable { url: String, attempts: usize },

    #[error("Playwright not found. Install with: npx playwright install")]
    PlaywrightNotFound,

    #[error("Playwright error: {0}")]
    Playwright(String),

    #[error("Element not found: {selector}")]
    ElementNotFound { selector: String },

    #[error("Timeout waiting for: {0}")]
    Timeout(String),

    #[error("Assertion failed: {0}")]
    AssertionFailed(String),

    #[error("Skipped: {0}")]
    Skipped(String),

    #[error("Unexpected status {status} from {endpoint} (accepted: {accepted:?})")]
    UnexpectedStatus {
        endpoint: String,
        status: u16,
        accepted: Vec<u16>,
    },

    #[error("Flow script parse error: {0}")]
    ScriptParse(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl E2eError {
    /// Whether this error marks a scenario as skipped rather than failed
    pub fn is_skip(&self) -> bool {
        matches!(self, E2eError::Skipped(_))
    }
}

pub type E2eResult<T> = Result<T, E2eError>;

/// Fail the enclosing scenario with `message` unless `condition` holds
pub fn ensure(condition: bool, message: impl Into<String>) -> E2eResult<()> {
    if condition {
        Ok(())
    } else {
        Err(E2eError::AssertionFailed(message.into()))
    }
}

/// End the enclosing scenario as skipped
pub fn skip<T>(reason: impl Into<String>) -> E2eResult<T> {
    Err(E2eError::Skipped(reason.into()))
}
