//! Streaming-response detection
//!
//! The harness has no hook into the chat transport, so it infers streaming
//! from the outside: after a message is sent it samples the length of the
//! newest assistant message at a fixed interval. Growth between samples means
//! the response is still being rendered; a run of unchanged samples once the
//! text is past a minimum length means the stream has ended.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use crate::error::{E2eError, E2eResult};
use crate::interaction::Interactor;
use crate::metrics::MetricsRecorder;
use crate::pages::{poll_until, ChatPage};

/// Sampling parameters, tunable per environment latency
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamingConfig {
    /// Bound on waiting for the assistant message node to appear
    pub first_content_timeout_ms: u64,

    pub poll_interval_ms: u64,

    /// Hard cap on samples taken after first content
    pub max_polls: usize,

    /// Consecutive samples without growth that end the stream
    pub stable_polls: usize,

    /// Length the text must exceed before stability counts
    pub min_length: usize,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            first_content_timeout_ms: 10_000,
            poll_interval_ms: 500,
            max_polls: 60,
            stable_polls: 3,
            min_length: 50,
        }
    }
}

impl StreamingConfig {
    pub fn first_content_timeout(&self) -> Duration {
        Duration::from_millis(self.first_content_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn validate(&self) -> E2eResult<()> {
        if self.poll_interval_ms == 0 {
            return Err(E2eError::Config("streaming.poll_interval_ms must be > 0".to_string()));
        }
        if self.max_polls == 0 {
            return Err(E2eError::Config("streaming.max_polls must be > 0".to_string()));
        }
        if self.stable_polls == 0 {
            return Err(E2eError::Config("streaming.stable_polls must be > 0".to_string()));
        }
        Ok(())
    }
}

/// Why the sampling loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// Text past the minimum length stopped growing
    Stable,
    /// Sample cap reached first
    PollCap,
    /// No assistant message appeared at all
    NoContent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamingReport {
    pub first_content_ms: Option<u64>,
    /// Observed length after each growth step, strictly increasing
    pub lengths: Vec<usize>,
    /// Time between consecutive growth steps
    pub update_intervals_ms: Vec<u64>,
    pub total_ms: u64,
    pub final_length: usize,
    pub update_count: usize,
    pub polls: usize,
    pub termination: Termination,
}

impl StreamingReport {
    fn no_content(total_ms: u64) -> Self {
        Self {
            first_content_ms: None,
            lengths: Vec::new(),
            update_intervals_ms: Vec::new(),
            total_ms,
            final_length: 0,
            update_count: 0,
            polls: 0,
            termination: Termination::NoContent,
        }
    }

    pub fn mean_update_interval_ms(&self) -> Option<f64> {
        if self.update_intervals_ms.is_empty() {
            return None;
        }
        let sum: u64 = self.update_intervals_ms.iter().sum();
        Some(sum as f64 / self.update_intervals_ms.len() as f64)
    }

    /// The text grew across more than one sample
    pub fn is_streamed(&self) -> bool {
        self.update_count > 1
    }

    pub fn record_into(&self, metrics: &MetricsRecorder, test: &str) {
        if let Some(first) = self.first_content_ms {
            metrics.record(test, "time_to_first_content_ms", first as f64);
        }
        if let Some(mean) = self.mean_update_interval_ms() {
            metrics.record(test, "mean_update_interval_ms", mean);
        }
        metrics.record(test, "total_response_ms", self.total_ms as f64);
        metrics.record(test, "final_length", self.final_length as f64);
        metrics.record(test, "update_count", self.update_count as f64);
    }
}

pub struct StreamingDetector {
    config: StreamingConfig,
}

impl StreamingDetector {
    pub fn new(config: StreamingConfig) -> Self {
        Self { config }
    }

    /// Observe the reply to a message that was just sent.
    ///
    /// `baseline` is the assistant message count before sending; the reply is
    /// the first assistant node beyond it. Timings in the report count from
    /// `sent_at`, the moment the send button was clicked.
    pub async fn observe(&self, chat: &ChatPage, baseline: usize, sent_at: Instant) -> StreamingReport {
        self.observe_selector(chat.interactor(), &chat.locators().assistant_message, baseline, sent_at)
            .await
    }

    pub async fn observe_selector(
        &self,
        ui: &Interactor,
        selector: &str,
        baseline: usize,
        sent_at: Instant,
    ) -> StreamingReport {
        let start = sent_at;

        let appeared = poll_until(self.config.first_content_timeout(), move || async move {
            ui.count_of(selector).await > baseline
        })
        .await;
        if !appeared {
            warn!(selector, "No assistant message appeared");
            return StreamingReport::no_content(start.elapsed().as_millis() as u64);
        }
        let first_content_ms = start.elapsed().as_millis() as u64;
        debug!(first_content_ms, "First content");

        let mut lengths: Vec<usize> = Vec::new();
        let mut update_intervals_ms = Vec::new();
        let mut last_len = 0;
        let mut last_growth: Option<Instant> = None;
        let mut stable = 0;
        let mut polls = 0;
        let mut termination = Termination::PollCap;

        while polls < self.config.max_polls {
            if polls > 0 {
                sleep(self.config.poll_interval()).await;
            }
            polls += 1;

            let len = ui
                .texts_of(selector)
                .await
                .last()
                .map(|t| t.chars().count())
                .unwrap_or(0);

            if len > last_len {
                let now = Instant::now();
                if let Some(prev) = last_growth {
                    update_intervals_ms.push(now.duration_since(prev).as_millis() as u64);
                }
                last_growth = Some(now);
                last_len = len;
                lengths.push(len);
                stable = 0;
            } else {
                stable += 1;
            }

            if last_len > self.config.min_length && stable >= self.config.stable_polls {
                termination = Termination::Stable;
                break;
            }
        }

        let report = StreamingReport {
            first_content_ms: Some(first_content_ms),
            update_count: lengths.len(),
            lengths,
            update_intervals_ms,
            total_ms: start.elapsed().as_millis() as u64,
            final_length: last_len,
            polls,
            termination,
        };

        info!(
            first_content_ms,
            total_ms = report.total_ms,
            final_length = report.final_length,
            updates = report.update_count,
            termination = ?report.termination,
            "Streaming observation finished"
        );
        report
    }
}
