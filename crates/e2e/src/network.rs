//! Network-condition simulation
//!
//! Conditions are applied inside the browser through request interception:
//! - Latency injection
//! - Jitter simulation
//! - Request loss (aborted requests)
//! - Forced error responses
//! - Offline mode

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::driver::Driver;
use crate::error::{E2eError, E2eResult};

/// Interception rule handed to the driver for every request matching `pattern`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteRule {
    /// Glob pattern understood by Playwright's `page.route`, e.g. `**/api/**`
    pub pattern: String,

    #[serde(default)]
    pub delay_ms: u64,

    /// Extra random delay in `0..=jitter_ms`
    #[serde(default)]
    pub jitter_ms: u64,

    /// Probability (0.0 - 1.0) of aborting a matching request
    #[serde(default)]
    pub abort_ratio: f64,

    /// Answer with this status instead of forwarding the request
    #[serde(default)]
    pub fulfill_status: Option<u16>,

    #[serde(default)]
    pub fulfill_body: Option<String>,
}

/// A simulated network profile
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkConditions {
    #[serde(default)]
    pub latency_ms: u64,

    #[serde(default)]
    pub jitter_ms: u64,

    /// Fraction of requests to drop (0.0 - 1.0)
    #[serde(default)]
    pub loss_ratio: f64,

    #[serde(default)]
    pub offline: bool,

    /// Fail every matching request with this status
    #[serde(default)]
    pub fail_status: Option<u16>,
}

impl NetworkConditions {
    /// Browser context has no connectivity at all
    pub fn offline() -> Self {
        Self {
            offline: true,
            ..Default::default()
        }
    }

    /// High latency link with some jitter
    pub fn slow_3g() -> Self {
        Self {
            latency_ms: 400,
            jitter_ms: 100,
            ..Default::default()
        }
    }

    /// A link that loses a fraction of requests
    pub fn flaky(loss_ratio: f64) -> Self {
        Self {
            loss_ratio,
            ..Default::default()
        }
    }

    /// Backend answering every call with `status`
    pub fn api_failure(status: u16) -> Self {
        Self {
            fail_status: Some(status),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> E2eResult<()> {
        if !(0.0..=1.0).contains(&self.loss_ratio) {
            return Err(E2eError::Config(format!(
                "loss_ratio must be within 0.0..=1.0, got {}",
                self.loss_ratio
            )));
        }
        if let Some(status) = self.fail_status {
            if !(100..=599).contains(&status) {
                return Err(E2eError::Config(format!("invalid fail_status {}", status)));
            }
        }
        Ok(())
    }

    /// Lower bound of the delay every forwarded request sees
    pub fn min_delay_ms(&self) -> u64 {
        self.latency_ms
    }

    /// Upper bound of the injected delay
    pub fn max_delay_ms(&self) -> u64 {
        self.latency_ms.saturating_add(self.jitter_ms)
    }

    /// Interception rule for `pattern`, or `None` when requests pass untouched
    pub fn to_route_rule(&self, pattern: &str) -> Option<RouteRule> {
        if self.latency_ms == 0
            && self.jitter_ms == 0
            && self.loss_ratio <= 0.0
            && self.fail_status.is_none()
        {
            return None;
        }

        Some(RouteRule {
            pattern: pattern.to_string(),
            delay_ms: self.latency_ms,
            jitter_ms: self.jitter_ms,
            abort_ratio: self.loss_ratio,
            fulfill_status: self.fail_status,
            fulfill_body: self
                .fail_status
                .map(|status| format!(r#"{{"error":"simulated failure","status":{}}}"#, status)),
        })
    }

    /// Apply these conditions to requests matching `pattern`
    pub async fn apply(&self, driver: &dyn Driver, pattern: &str) -> E2eResult<()> {
        self.validate()?;

        if self.offline {
            debug!("Switching browser context offline");
            driver.set_offline(true).await?;
        }

        if let Some(rule) = self.to_route_rule(pattern) {
            debug!(?rule, "Installing route");
            driver.route(&rule).await?;
        }

        Ok(())
    }

    /// Restore normal connectivity
    pub async fn reset(driver: &dyn Driver) -> E2eResult<()> {
        driver.set_offline(false).await?;
        driver.unroute_all().await
    }
}
