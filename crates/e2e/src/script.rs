//! Declarative YAML flow scripts
//!
//! Simple click-through checks that need no Rust code live as YAML files in a
//! flows directory. Each file is one [`FlowScript`]; the runner turns every
//! loaded script into a scenario.

use std::path::Path;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::driver::WaitState;
use crate::error::{E2eError, E2eResult};
use crate::interaction::{Interactor, Outcome};
use crate::pages::poll_until;

/// A complete flow parsed from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowScript {
    /// Unique name for this flow
    pub name: String,

    #[serde(default)]
    pub description: String,

    /// Labels selectable with `--tag`
    #[serde(default)]
    pub tags: Vec<String>,

    /// Sign in with the configured credentials before the first step
    #[serde(default)]
    pub login: bool,

    /// Steps to execute in order
    pub steps: Vec<FlowStep>,
}

/// A single step in a flow
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum FlowStep {
    /// Navigate to a URL (relative to base)
    Navigate {
        url: String,
        #[serde(default)]
        wait_for_selector: Option<String>,
    },

    Click {
        selector: String,
        #[serde(default)]
        timeout_ms: Option<u64>,
    },

    Fill {
        selector: String,
        value: String,
    },

    /// Press a key on an element
    Press {
        selector: String,
        key: String,
    },

    /// Wait for an element to reach a state
    Wait {
        selector: String,
        #[serde(default = "default_wait_timeout")]
        timeout_ms: u64,
        #[serde(default)]
        state: WaitState,
    },

    /// Fixed delay (use sparingly)
    Sleep {
        ms: u64,
    },

    /// Assert something about an element; every given field must hold
    Assert {
        selector: String,
        #[serde(default)]
        visible: Option<bool>,
        #[serde(default)]
        text_contains: Option<String>,
        #[serde(default)]
        count: Option<usize>,
        #[serde(default)]
        timeout_ms: Option<u64>,
    },

    Screenshot {
        name: String,
    },

    /// Pick a dropdown option by its label
    Select {
        selector: String,
        label: String,
    },

    /// Log a message (for debugging)
    Log {
        message: String,
    },
}

fn default_wait_timeout() -> u64 {
    5000
}

impl FlowStep {
    /// Short label used in results and failure messages
    pub fn describe(&self) -> String {
        match self {
            FlowStep::Navigate { url, .. } => format!("navigate {}", url),
            FlowStep::Click { selector, .. } => format!("click {}", selector),
            FlowStep::Fill { selector, .. } => format!("fill {}", selector),
            FlowStep::Press { selector, key } => format!("press {} on {}", key, selector),
            FlowStep::Wait { selector, state, .. } => format!("wait {} {}", selector, state.as_str()),
            FlowStep::Sleep { ms } => format!("sleep {}ms", ms),
            FlowStep::Assert { selector, .. } => format!("assert {}", selector),
            FlowStep::Screenshot { name } => format!("screenshot {}", name),
            FlowStep::Select { selector, label } => format!("select {} in {}", label, selector),
            FlowStep::Log { .. } => "log".to_string(),
        }
    }
}

/// Result of one executed step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub step_index: usize,
    pub step: String,
    pub success: bool,
    pub duration_ms: u64,
    pub error: Option<String>,
    pub screenshot_path: Option<String>,
}

impl FlowScript {
    /// Parse a flow from YAML string
    pub fn from_yaml(yaml: &str) -> E2eResult<Self> {
        let script: Self = serde_yaml::from_str(yaml)?;
        if script.name.trim().is_empty() {
            return Err(E2eError::ScriptParse("flow name is empty".to_string()));
        }
        if script.steps.is_empty() {
            return Err(E2eError::ScriptParse(format!("flow '{}' has no steps", script.name)));
        }
        Ok(script)
    }

    /// Parse a flow from a YAML file
    pub fn from_file(path: &Path) -> E2eResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content).map_err(|e| E2eError::ScriptParse(format!("{}: {}", path.display(), e)))
    }

    /// Load all flows from a directory, sorted by file path
    pub fn load_all(dir: &Path) -> E2eResult<Vec<Self>> {
        let mut paths: Vec<_> = walkdir::WalkDir::new(dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.path()
                    .extension()
                    .map(|ext| ext == "yaml" || ext == "yml")
                    .unwrap_or(false)
            })
            .map(|e| e.into_path())
            .collect();
        paths.sort();

        let flows = paths
            .iter()
            .map(|path| Self::from_file(path))
            .collect::<E2eResult<Vec<_>>>()?;

        debug!("Loaded {} flow(s) from {}", flows.len(), dir.display());
        Ok(flows)
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    /// Keep the flows carrying at least one of `tags`; no tags keeps all
    pub fn retain_tagged(flows: &mut Vec<Self>, tags: &[String]) {
        if tags.is_empty() {
            return;
        }
        flows.retain(|flow| tags.iter().any(|tag| flow.has_tag(tag)));
    }

    /// Run every step in order, stopping at the first failure
    pub async fn execute(&self, ui: &Interactor) -> Vec<StepResult> {
        info!(flow = %self.name, steps = self.steps.len(), "Executing flow");

        let mut results = Vec::with_capacity(self.steps.len());
        for (index, step) in self.steps.iter().enumerate() {
            let start = Instant::now();
            let (outcome, screenshot) = run_step(ui, step).await;

            let result = StepResult {
                step_index: index,
                step: step.describe(),
                success: outcome.is_success(),
                duration_ms: start.elapsed().as_millis() as u64,
                error: outcome.reason().map(str::to_string),
                screenshot_path: screenshot.map(|p| p.to_string_lossy().into_owned()),
            };

            let failed = !result.success;
            if failed {
                warn!(flow = %self.name, step = index, error = ?result.error, "Flow step failed");
            }
            results.push(result);
            if failed {
                break;
            }
        }
        results
    }
}

/// First failed step as a scenario error
pub fn first_failure(results: &[StepResult]) -> E2eResult<()> {
    match results.iter().find(|r| !r.success) {
        None => Ok(()),
        Some(r) => Err(E2eError::AssertionFailed(format!(
            "step {} ({}): {}",
            r.step_index + 1,
            r.step,
            r.error.as_deref().unwrap_or("failed")
        ))),
    }
}

async fn run_step(ui: &Interactor, step: &FlowStep) -> (Outcome, Option<std::path::PathBuf>) {
    let outcome = match step {
        FlowStep::Navigate { url, wait_for_selector } => match ui.driver().goto(url).await {
            Err(e) => Outcome::failure(e.to_string()),
            Ok(()) => match wait_for_selector {
                Some(sel) if !ui.element_exists(sel, ui.timeout()).await => {
                    Outcome::failure(format!("{} did not appear", sel))
                }
                _ => Outcome::Success,
            },
        },
        FlowStep::Click { selector, timeout_ms } => {
            let timeout = timeout_ms.map(Duration::from_millis).unwrap_or(ui.timeout());
            ui.safe_click_within(selector, timeout).await
        }
        FlowStep::Fill { selector, value } => ui.safe_fill(selector, value).await,
        FlowStep::Press { selector, key } => Outcome::from_result(ui.driver().press(selector, key).await),
        FlowStep::Wait {
            selector,
            timeout_ms,
            state,
        } => Outcome::from_result(
            ui.driver()
                .wait_for(selector, *state, Duration::from_millis(*timeout_ms))
                .await,
        ),
        FlowStep::Sleep { ms } => {
            tokio::time::sleep(Duration::from_millis(*ms)).await;
            Outcome::Success
        }
        FlowStep::Assert {
            selector,
            visible,
            text_contains,
            count,
            timeout_ms,
        } => {
            let timeout = timeout_ms.map(Duration::from_millis).unwrap_or(ui.timeout());
            check_assertion(ui, selector, *visible, text_contains.as_deref(), *count, timeout).await
        }
        FlowStep::Screenshot { name } => {
            return match ui.screenshot(name).await {
                Some(path) => (Outcome::Success, Some(path)),
                // capture failures never fail a flow
                None => (Outcome::Success, None),
            };
        }
        FlowStep::Select { selector, label } => ui.safe_select(selector, label).await,
        FlowStep::Log { message } => {
            info!("{}", message);
            Outcome::Success
        }
    };
    (outcome, None)
}

async fn check_assertion(
    ui: &Interactor,
    selector: &str,
    visible: Option<bool>,
    text_contains: Option<&str>,
    count: Option<usize>,
    timeout: Duration,
) -> Outcome {
    if let Some(expected) = visible {
        let state = if expected { WaitState::Visible } else { WaitState::Hidden };
        if ui.driver().wait_for(selector, state, timeout).await.is_err() {
            return Outcome::failure(format!("expected {} to be {}", selector, state.as_str()));
        }
    }

    if let Some(needle) = text_contains {
        let found = poll_until(timeout, move || async move {
            ui.texts_of(selector).await.iter().any(|t| t.contains(needle))
        })
        .await;
        if !found {
            return Outcome::failure(format!("no {} contains '{}'", selector, needle));
        }
    }

    if let Some(expected) = count {
        let matched = poll_until(timeout, move || async move { ui.count_of(selector).await == expected }).await;
        if !matched {
            let actual = ui.count_of(selector).await;
            return Outcome::failure(format!("expected {} x {}, found {}", expected, selector, actual));
        }
    }

    Outcome::Success
}
