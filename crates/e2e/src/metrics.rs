//! Performance metric aggregation
//!
//! Scenarios append samples to a shared [`MetricsRecorder`] for the whole
//! run; the runner drains it once at teardown into a [`PerformanceReport`].

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    pub test: String,
    pub metric: String,
    pub value: f64,
    pub timestamp: DateTime<Utc>,
}

/// Append-only, run-scoped sample log shared by every scenario
#[derive(Debug, Clone, Default)]
pub struct MetricsRecorder {
    samples: Arc<Mutex<Vec<MetricSample>>>,
}

impl MetricsRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, test: &str, metric: &str, value: f64) {
        info!(test, metric, value, "Recorded metric");
        self.samples.lock().push(MetricSample {
            test: test.to_string(),
            metric: metric.to_string(),
            value,
            timestamp: Utc::now(),
        });
    }

    pub fn len(&self) -> usize {
        self.samples.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.lock().is_empty()
    }

    /// Aggregate without consuming the samples
    pub fn snapshot_report(&self) -> PerformanceReport {
        PerformanceReport::from_samples(&self.samples.lock())
    }

    /// Aggregate and clear; later calls see only samples recorded afterwards
    pub fn drain_report(&self) -> PerformanceReport {
        let samples = std::mem::take(&mut *self.samples.lock());
        PerformanceReport::from_samples(&samples)
    }
}

/// Aggregate of one (test, metric) group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSummary {
    pub test: String,
    pub metric: String,
    pub count: usize,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceReport {
    pub summaries: Vec<MetricSummary>,
}

impl PerformanceReport {
    /// Group by test then metric name, both sorted
    pub fn from_samples(samples: &[MetricSample]) -> Self {
        let mut groups: BTreeMap<(&str, &str), Vec<f64>> = BTreeMap::new();
        for sample in samples {
            groups
                .entry((sample.test.as_str(), sample.metric.as_str()))
                .or_default()
                .push(sample.value);
        }

        let summaries = groups
            .into_iter()
            .map(|((test, metric), values)| {
                let count = values.len();
                let sum: f64 = values.iter().sum();
                MetricSummary {
                    test: test.to_string(),
                    metric: metric.to_string(),
                    count,
                    mean: sum / count as f64,
                    min: values.iter().copied().fold(f64::INFINITY, f64::min),
                    max: values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
                }
            })
            .collect();

        Self { summaries }
    }

    pub fn get(&self, test: &str, metric: &str) -> Option<&MetricSummary> {
        self.summaries
            .iter()
            .find(|s| s.test == test && s.metric == metric)
    }

    pub fn is_empty(&self) -> bool {
        self.summaries.is_empty()
    }
}

impl fmt::Display for PerformanceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.summaries.is_empty() {
            return writeln!(f, "No performance metrics recorded.");
        }

        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic);
        table.set_header(vec!["Test", "Metric", "Samples", "Mean", "Min", "Max"]);

        for s in &self.summaries {
            table.add_row(vec![
                s.test.clone(),
                s.metric.clone(),
                s.count.to_string(),
                format!("{:.2}", s.mean),
                format!("{:.2}", s.min),
                format!("{:.2}", s.max),
            ]);
        }

        writeln!(f, "Performance Report")?;
        writeln!(f, "{table}")
    }
}
