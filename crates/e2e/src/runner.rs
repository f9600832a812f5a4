//! Scenario runner
//!
//! Every scenario gets its own driver (a fresh browser context), runs under
//! the scenario timeout, and ends as passed, failed or skipped. The metrics
//! recorder is owned here and handed to scenarios through their context; it
//! is drained exactly once, at teardown.

use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use futures::future::BoxFuture;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::api::ApiClient;
use crate::config::HarnessConfig;
use crate::driver::{Driver, DriverFactory};
use crate::error::{E2eError, E2eResult};
use crate::interaction::Interactor;
use crate::metrics::{MetricsRecorder, PerformanceReport};
use crate::pages::{AdminPage, ChatPage, LoginPage};
use crate::script::{first_failure, FlowScript};
use crate::streaming::StreamingDetector;

/// Feature area a scenario belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Area {
    Auth,
    Chat,
    Agents,
    KnowledgeBase,
    Sessions,
    Admin,
    Performance,
    ErrorHandling,
    Network,
    /// Loaded from YAML flow files
    Scripted,
}

impl Area {
    pub fn as_str(&self) -> &'static str {
        match self {
            Area::Auth => "auth",
            Area::Chat => "chat",
            Area::Agents => "agents",
            Area::KnowledgeBase => "knowledge_base",
            Area::Sessions => "sessions",
            Area::Admin => "admin",
            Area::Performance => "performance",
            Area::ErrorHandling => "error_handling",
            Area::Network => "network",
            Area::Scripted => "scripted",
        }
    }
}

impl fmt::Display for Area {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

type ScenarioFn = Arc<dyn Fn(ScenarioContext) -> BoxFuture<'static, E2eResult<()>> + Send + Sync>;

/// One self-contained test case
#[derive(Clone)]
pub struct Scenario {
    pub name: String,
    pub area: Area,
    run: ScenarioFn,
}

impl Scenario {
    pub fn new<F, Fut>(name: impl Into<String>, area: Area, run: F) -> Self
    where
        F: Fn(ScenarioContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = E2eResult<()>> + Send + 'static,
    {
        Self {
            name: name.into(),
            area,
            run: Arc::new(move |ctx| Box::pin(run(ctx))),
        }
    }

    /// Wrap a YAML flow
    pub fn from_flow(flow: FlowScript) -> Self {
        let flow = Arc::new(flow);
        Scenario::new(flow.name.clone(), Area::Scripted, move |ctx| {
            let flow = flow.clone();
            async move {
                if flow.login {
                    ctx.sign_in().await?;
                }
                let results = flow.execute(&ctx.interactor()).await;
                first_failure(&results)
            }
        })
    }
}

impl fmt::Debug for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scenario")
            .field("name", &self.name)
            .field("area", &self.area)
            .finish()
    }
}

/// Which registered scenarios to run
#[derive(Debug, Clone, Default)]
pub struct ScenarioFilter {
    /// Empty means every area
    pub areas: Vec<Area>,
    /// Substring of the scenario name
    pub name: Option<String>,
}

impl ScenarioFilter {
    pub fn matches(&self, scenario: &Scenario) -> bool {
        (self.areas.is_empty() || self.areas.contains(&scenario.area))
            && self
                .name
                .as_deref()
                .map_or(true, |n| scenario.name.contains(n))
    }
}

/// Everything a scenario body can reach
#[derive(Clone)]
pub struct ScenarioContext {
    name: String,
    config: Arc<HarnessConfig>,
    driver: Arc<dyn Driver>,
    api: ApiClient,
    metrics: MetricsRecorder,
}

impl ScenarioContext {
    pub fn new(
        name: impl Into<String>,
        config: Arc<HarnessConfig>,
        driver: Arc<dyn Driver>,
        api: ApiClient,
        metrics: MetricsRecorder,
    ) -> Self {
        Self {
            name: name.into(),
            config,
            driver,
            api,
            metrics,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    pub fn driver(&self) -> &dyn Driver {
        self.driver.as_ref()
    }

    /// Unauthenticated API client
    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn metrics(&self) -> &MetricsRecorder {
        &self.metrics
    }

    pub fn interactor(&self) -> Interactor {
        Interactor::new(
            self.driver.clone(),
            self.config.artifacts_dir.clone(),
            self.config.timeouts.ui(),
        )
    }

    pub fn login_page(&self) -> LoginPage {
        LoginPage::new(self.interactor(), self.config.locators.login.clone())
    }

    pub fn chat_page(&self) -> ChatPage {
        ChatPage::new(self.interactor(), self.config.locators.chat.clone())
    }

    pub fn admin_page(&self) -> AdminPage {
        AdminPage::new(self.interactor(), self.config.locators.admin.clone())
    }

    pub fn streaming_detector(&self) -> StreamingDetector {
        StreamingDetector::new(self.config.streaming.clone())
    }

    /// Log in through the UI with the configured credentials
    pub async fn sign_in(&self) -> E2eResult<()> {
        let creds = &self.config.credentials;
        self.login_page()
            .login(&creds.username, &creds.password)
            .await
            .into_result("login")
    }

    /// API client carrying a bearer token for the configured credentials
    pub async fn api_session(&self) -> E2eResult<ApiClient> {
        let creds = &self.config.credentials;
        self.api.sign_in(&creds.username, &creds.password).await
    }

    /// Record a metric under this scenario's name
    pub fn record(&self, metric: &str, value: f64) {
        self.metrics.record(&self.name, metric, value);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioStatus {
    Passed,
    Failed,
    Skipped,
}

/// Result of running a single scenario
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub name: String,
    pub area: Area,
    pub status: ScenarioStatus,
    pub duration_ms: u64,
    /// Failure message, or the skip reason
    pub error: Option<String>,
    pub screenshot: Option<String>,
}

/// Result of running all scenarios
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteResult {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub duration_ms: u64,
    pub results: Vec<ScenarioResult>,
}

impl SuiteResult {
    pub fn from_results(results: Vec<ScenarioResult>, duration_ms: u64) -> Self {
        let count = |status: ScenarioStatus| results.iter().filter(|r| r.status == status).count();
        Self {
            total: results.len(),
            passed: count(ScenarioStatus::Passed),
            failed: count(ScenarioStatus::Failed),
            skipped: count(ScenarioStatus::Skipped),
            duration_ms,
            results,
        }
    }

    pub fn success(&self) -> bool {
        self.failed == 0
    }
}

#[derive(Serialize)]
struct ResultsFile<'a> {
    #[serde(flatten)]
    suite: &'a SuiteResult,
    performance: &'a PerformanceReport,
}

pub struct TestRunner {
    config: Arc<HarnessConfig>,
    factory: Arc<dyn DriverFactory>,
    api: ApiClient,
    metrics: MetricsRecorder,
}

impl TestRunner {
    pub fn new(config: HarnessConfig, factory: Arc<dyn DriverFactory>) -> E2eResult<Self> {
        config.validate()?;
        let api = ApiClient::new(config.api_url.clone(), config.timeouts.response())?;
        Ok(Self {
            config: Arc::new(config),
            factory,
            api,
            metrics: MetricsRecorder::new(),
        })
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    pub fn metrics(&self) -> &MetricsRecorder {
        &self.metrics
    }

    /// Run the scenarios `filter` selects, `workers` at a time; results keep
    /// registration order
    pub async fn run(&self, scenarios: Vec<Scenario>, filter: &ScenarioFilter) -> SuiteResult {
        let start = Instant::now();
        let selected: Vec<Scenario> = scenarios.into_iter().filter(|s| filter.matches(s)).collect();

        info!(
            "Running {} scenario(s) with {} worker(s)...",
            selected.len(),
            self.config.workers
        );

        let results: Vec<ScenarioResult> = stream::iter(selected.into_iter().map(|s| self.run_scenario(s)))
            .buffered(self.config.workers)
            .collect()
            .await;

        let suite = SuiteResult::from_results(results, start.elapsed().as_millis() as u64);

        info!(
            "Test Results: {} passed, {} failed, {} skipped ({} ms)",
            suite.passed, suite.failed, suite.skipped, suite.duration_ms
        );
        suite
    }

    /// Run one scenario in a fresh driver
    pub async fn run_scenario(&self, scenario: Scenario) -> ScenarioResult {
        let start = Instant::now();
        debug!("Running scenario: {}", scenario.name);

        let driver = match self.factory.open(&scenario.name).await {
            Ok(driver) => driver,
            Err(e) => {
                error!("✗ {} - could not open browser: {}", scenario.name, e);
                return ScenarioResult {
                    name: scenario.name,
                    area: scenario.area,
                    status: ScenarioStatus::Failed,
                    duration_ms: start.elapsed().as_millis() as u64,
                    error: Some(e.to_string()),
                    screenshot: None,
                };
            }
        };

        let ctx = ScenarioContext::new(
            scenario.name.clone(),
            self.config.clone(),
            driver.clone(),
            self.api.clone(),
            self.metrics.clone(),
        );
        let ui = ctx.interactor();

        let limit = self.config.timeouts.scenario();
        let outcome = match tokio::time::timeout(limit, (scenario.run)(ctx)).await {
            Ok(result) => result,
            Err(_) => Err(E2eError::Timeout(format!(
                "scenario '{}' exceeded {} ms",
                scenario.name,
                limit.as_millis()
            ))),
        };

        let (status, error, screenshot) = match outcome {
            Ok(()) => (ScenarioStatus::Passed, None, None),
            Err(E2eError::Skipped(reason)) => (ScenarioStatus::Skipped, Some(reason), None),
            Err(e) => {
                let shot = ui.screenshot(&format!("failure_{}", scenario.name)).await;
                (
                    ScenarioStatus::Failed,
                    Some(e.to_string()),
                    shot.map(|p| p.to_string_lossy().into_owned()),
                )
            }
        };

        if let Err(e) = driver.close().await {
            warn!(scenario = %scenario.name, error = %e, "Closing browser failed");
        }

        let duration_ms = start.elapsed().as_millis() as u64;
        match status {
            ScenarioStatus::Passed => info!("✓ {} ({} ms)", scenario.name, duration_ms),
            ScenarioStatus::Skipped => info!(
                "○ {} - skipped: {}",
                scenario.name,
                error.as_deref().unwrap_or_default()
            ),
            ScenarioStatus::Failed => error!(
                "✗ {} - {}",
                scenario.name,
                error.as_deref().unwrap_or("unknown error")
            ),
        }

        ScenarioResult {
            name: scenario.name,
            area: scenario.area,
            status,
            duration_ms,
            error,
            screenshot,
        }
    }

    /// Print the performance report and write `test-results.json`. The
    /// recorder is drained, so a second teardown reports nothing.
    pub fn teardown(&self, suite: &SuiteResult) -> E2eResult<PathBuf> {
        let report = self.metrics.drain_report();
        println!("{}", report);
        self.write_results(suite, &report)
    }

    /// Write results to JSON file
    pub fn write_results(&self, suite: &SuiteResult, report: &PerformanceReport) -> E2eResult<PathBuf> {
        std::fs::create_dir_all(&self.config.output_dir)?;

        let path = self.config.output_dir.join("test-results.json");
        let json = serde_json::to_string_pretty(&ResultsFile {
            suite,
            performance: report,
        })?;
        std::fs::write(&path, json)?;

        info!("Results written to: {}", path.display());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ensure, skip};
    use crate::fake::FakeDriver;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct Fakes {
        opened: Mutex<Vec<Arc<FakeDriver>>>,
        refuse: bool,
    }

    #[async_trait]
    impl DriverFactory for Fakes {
        async fn open(&self, _scenario: &str) -> E2eResult<Arc<dyn Driver>> {
            if self.refuse {
                return Err(E2eError::PlaywrightNotFound);
            }
            let driver = Arc::new(FakeDriver::new());
            self.opened.lock().push(driver.clone());
            Ok(driver as Arc<dyn Driver>)
        }
    }

    fn config(dir: &std::path::Path) -> HarnessConfig {
        HarnessConfig {
            artifacts_dir: dir.join("screenshots"),
            output_dir: dir.to_path_buf(),
            ..Default::default()
        }
    }

    fn scenarios() -> Vec<Scenario> {
        vec![
            Scenario::new("passes", Area::Auth, |ctx| async move {
                ctx.record("duration_ms", 12.0);
                Ok(())
            }),
            Scenario::new("fails", Area::Chat, |_ctx| async move {
                let replies = 0;
                ensure(replies > 0, "no reply rendered")
            }),
            Scenario::new("skips", Area::Agents, |_ctx| async move { skip("no agents configured") }),
        ]
    }

    #[tokio::test]
    async fn statuses_counted_in_registration_order() {
        let dir = tempfile::tempdir().unwrap();
        let factory = Arc::new(Fakes::default());
        let runner = TestRunner::new(config(dir.path()), factory.clone()).unwrap();

        let suite = runner.run(scenarios(), &ScenarioFilter::default()).await;

        assert_eq!((suite.total, suite.passed, suite.failed, suite.skipped), (3, 1, 1, 1));
        assert!(!suite.success());
        let names: Vec<_> = suite.results.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["passes", "fails", "skips"]);
        assert_eq!(suite.results[2].error.as_deref(), Some("no agents configured"));
        assert!(suite.results[1].screenshot.as_deref().unwrap().contains("failure_fails_"));

        // one fresh browser per scenario, all closed
        let opened = factory.opened.lock();
        assert_eq!(opened.len(), 3);
        assert!(opened.iter().all(|d| d.is_closed()));
    }

    #[tokio::test]
    async fn filter_selects_by_area_and_name() {
        let dir = tempfile::tempdir().unwrap();
        let runner = TestRunner::new(config(dir.path()), Arc::new(Fakes::default())).unwrap();

        let filter = ScenarioFilter {
            areas: vec![Area::Auth, Area::Agents],
            name: Some("ski".to_string()),
        };
        let suite = runner.run(scenarios(), &filter).await;
        assert_eq!(suite.total, 1);
        assert_eq!(suite.results[0].name, "skips");
    }

    #[tokio::test]
    async fn browser_launch_failure_fails_scenario() {
        let dir = tempfile::tempdir().unwrap();
        let factory = Arc::new(Fakes {
            refuse: true,
            ..Default::default()
        });
        let runner = TestRunner::new(config(dir.path()), factory).unwrap();

        let suite = runner.run(scenarios(), &ScenarioFilter::default()).await;
        assert_eq!(suite.failed, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn scenario_timeout_is_a_failure() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config(dir.path());
        cfg.timeouts.scenario_ms = 1_000;
        let runner = TestRunner::new(cfg, Arc::new(Fakes::default())).unwrap();

        let hang = Scenario::new("hangs", Area::Performance, |_ctx| async move {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        });
        let result = runner.run_scenario(hang).await;
        assert_eq!(result.status, ScenarioStatus::Failed);
        assert!(result.error.unwrap().contains("exceeded 1000 ms"));
    }

    #[tokio::test]
    async fn teardown_drains_metrics_into_results_file() {
        let dir = tempfile::tempdir().unwrap();
        let runner = TestRunner::new(config(dir.path()), Arc::new(Fakes::default())).unwrap();

        let suite = runner.run(scenarios(), &ScenarioFilter::default()).await;
        let path = runner.teardown(&suite).unwrap();

        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(written["passed"], 1);
        assert_eq!(written["results"][1]["status"], "failed");
        assert_eq!(written["performance"]["summaries"][0]["test"], "passes");
        assert!(runner.metrics().is_empty());
    }

    #[tokio::test]
    async fn flows_run_as_scripted_scenarios() {
        let dir = tempfile::tempdir().unwrap();
        let runner = TestRunner::new(config(dir.path()), Arc::new(Fakes::default())).unwrap();

        let flow = FlowScript::from_yaml(
            "name: missing-button\nsteps:\n  - action: click\n    selector: '#nope'\n    timeout_ms: 10\n",
        )
        .unwrap();
        let scenario = Scenario::from_flow(flow);
        assert_eq!(scenario.area, Area::Scripted);

        let result = runner.run_scenario(scenario).await;
        assert_eq!(result.status, ScenarioStatus::Failed);
        assert!(result.error.unwrap().contains("step 1"));
    }
}
