//! Playwright browser automation
//!
//! Each [`PlaywrightSession`] runs the embedded bridge script under `node`.
//! The bridge owns one browser, one context and one page; commands go over
//! stdin as JSON lines and every command gets exactly one JSON reply line.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command as TokioCommand};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::driver::{Driver, DriverFactory, WaitState};
use crate::error::{E2eError, E2eResult};
use crate::network::RouteRule;

const BRIDGE_SCRIPT: &str = include_str!("bridge.js");

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Browser {
    #[default]
    Chromium,
    Firefox,
    Webkit,
}

impl Browser {
    pub fn as_str(&self) -> &'static str {
        match self {
            Browser::Chromium => "chromium",
            Browser::Firefox => "firefox",
            Browser::Webkit => "webkit",
        }
    }
}

impl FromStr for Browser {
    type Err = E2eError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "chromium" | "chrome" => Ok(Browser::Chromium),
            "firefox" => Ok(Browser::Firefox),
            "webkit" | "safari" => Ok(Browser::Webkit),
            other => Err(E2eError::Config(format!("unknown browser: {}", other))),
        }
    }
}

/// Configuration for Playwright
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaywrightConfig {
    pub browser: Browser,
    pub headless: bool,
    pub viewport_width: u32,
    pub viewport_height: u32,

    /// Upper bound on a single bridge round trip, on top of any wait the
    /// command itself carries
    pub command_timeout_ms: u64,

    /// Bound on browser launch
    pub launch_timeout_ms: u64,

    /// Slow every browser action down, for watching headed runs
    pub slow_mo_ms: u64,

    /// `node` executable
    pub node_binary: PathBuf,

    /// Directory whose `node_modules` provides `playwright`
    pub project_dir: PathBuf,
}

impl Default for PlaywrightConfig {
    fn default() -> Self {
        Self {
            browser: Browser::Chromium,
            headless: true,
            viewport_width: 1280,
            viewport_height: 720,
            command_timeout_ms: 10_000,
            launch_timeout_ms: 30_000,
            slow_mo_ms: 0,
            node_binary: PathBuf::from("node"),
            project_dir: PathBuf::from("."),
        }
    }
}

/// Check if Playwright is installed
pub fn check_playwright_installed() -> E2eResult<()> {
    let output = Command::new("npx")
        .args(["--no-install", "playwright", "--version"])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();

    match output {
        Ok(status) if status.success() => Ok(()),
        _ => Err(E2eError::PlaywrightNotFound),
    }
}

/// Bridge commands; `op` selects the handler in bridge.js
#[derive(Debug, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum BridgeCommand<'a> {
    Goto { url: &'a str },
    Reload,
    Url,
    WaitFor { selector: &'a str, state: WaitState, timeout: u64 },
    Click { selector: &'a str, timeout: u64 },
    Fill { selector: &'a str, value: &'a str, timeout: u64 },
    Press { selector: &'a str, key: &'a str },
    Select { selector: &'a str, label: &'a str, timeout: u64 },
    Count { selector: &'a str },
    Texts { selector: &'a str },
    Visible { selector: &'a str },
    Enabled { selector: &'a str },
    Value { selector: &'a str },
    Screenshot { path: String, full_page: bool },
    Evaluate { expression: &'a str },
    Offline { offline: bool },
    Route { rule: &'a RouteRule },
    UnrouteAll,
    Close,
}

impl BridgeCommand<'_> {
    /// Wait the command performs inside the browser, added to the round-trip bound
    fn own_timeout(&self) -> Duration {
        match self {
            BridgeCommand::WaitFor { timeout, .. }
            | BridgeCommand::Click { timeout, .. }
            | BridgeCommand::Fill { timeout, .. }
            | BridgeCommand::Select { timeout, .. } => Duration::from_millis(*timeout),
            _ => Duration::ZERO,
        }
    }

    fn encode(&self, id: u64) -> E2eResult<String> {
        let mut message = serde_json::to_value(self)?;
        message["id"] = id.into();
        let mut line = serde_json::to_string(&message)?;
        line.push('\n');
        Ok(line)
    }
}

#[derive(Debug, Deserialize)]
struct BridgeReply {
    id: u64,
    ok: bool,
    #[serde(default)]
    value: serde_json::Value,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    timeout: bool,
}

impl BridgeReply {
    fn into_result(self) -> E2eResult<serde_json::Value> {
        if self.ok {
            return Ok(self.value);
        }
        let message = self.error.unwrap_or_else(|| "unknown bridge error".to_string());
        if self.timeout {
            Err(E2eError::Timeout(message))
        } else {
            Err(E2eError::Playwright(message))
        }
    }
}

struct BridgeIo {
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
}

impl BridgeIo {
    /// Read lines until the reply for `id`; anything else is logged and skipped
    async fn read_reply(&mut self, id: u64) -> E2eResult<BridgeReply> {
        loop {
            let line = self
                .stdout
                .next_line()
                .await?
                .ok_or_else(|| E2eError::Playwright("bridge exited".to_string()))?;

            match serde_json::from_str::<BridgeReply>(&line) {
                Ok(reply) if reply.id == id => return Ok(reply),
                Ok(reply) => debug!(expected = id, got = reply.id, "Skipping stale bridge reply"),
                Err(_) => debug!(target: "playwright", "{}", line),
            }
        }
    }
}

/// One browser page driven through the bridge
pub struct PlaywrightSession {
    io: Mutex<BridgeIo>,
    child: Mutex<Child>,
    next_id: AtomicU64,
    command_timeout: Duration,
    _script_dir: TempDir,
}

impl PlaywrightSession {
    /// Start the bridge and wait for the browser to come up
    pub async fn launch(config: &PlaywrightConfig, base_url: &str) -> E2eResult<Self> {
        let script_dir = tempfile::tempdir()?;
        let script_path = script_dir.path().join("bridge.js");
        tokio::fs::write(&script_path, BRIDGE_SCRIPT).await?;

        let options = serde_json::json!({
            "browser": config.browser.as_str(),
            "headless": config.headless,
            "slow_mo_ms": config.slow_mo_ms,
            "viewport": { "width": config.viewport_width, "height": config.viewport_height },
            "base_url": base_url,
        });

        debug!("Running Playwright bridge: {}", script_path.display());

        let mut child = TokioCommand::new(&config.node_binary)
            .arg(&script_path)
            .arg(options.to_string())
            .current_dir(&config.project_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| E2eError::Playwright(format!("failed to spawn {}: {}", config.node_binary.display(), e)))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| E2eError::Playwright("bridge stdin unavailable".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| E2eError::Playwright("bridge stdout unavailable".to_string()))?;

        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(target: "playwright", "{}", line);
                }
            });
        }

        let mut io = BridgeIo {
            stdin,
            stdout: BufReader::new(stdout).lines(),
        };

        let launch_timeout = Duration::from_millis(config.launch_timeout_ms);
        tokio::time::timeout(launch_timeout, io.read_reply(0))
            .await
            .map_err(|_| E2eError::Timeout("browser launch".to_string()))??
            .into_result()?;

        info!(browser = config.browser.as_str(), base_url, "Browser ready");

        Ok(Self {
            io: Mutex::new(io),
            child: Mutex::new(child),
            next_id: AtomicU64::new(1),
            command_timeout: Duration::from_millis(config.command_timeout_ms),
            _script_dir: script_dir,
        })
    }

    async fn call(&self, command: BridgeCommand<'_>) -> E2eResult<serde_json::Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let line = command.encode(id)?;
        let budget = self.command_timeout + command.own_timeout();

        let mut io = self.io.lock().await;
        io.stdin.write_all(line.as_bytes()).await?;
        io.stdin.flush().await?;

        tokio::time::timeout(budget, io.read_reply(id))
            .await
            .map_err(|_| E2eError::Timeout(format!("bridge reply to {:?}", command)))??
            .into_result()
    }

    async fn call_unit(&self, command: BridgeCommand<'_>) -> E2eResult<()> {
        self.call(command).await.map(|_| ())
    }

    async fn call_as<T: serde::de::DeserializeOwned>(&self, command: BridgeCommand<'_>) -> E2eResult<T> {
        Ok(serde_json::from_value(self.call(command).await?)?)
    }
}

#[async_trait]
impl Driver for PlaywrightSession {
    async fn goto(&self, url: &str) -> E2eResult<()> {
        self.call_unit(BridgeCommand::Goto { url }).await
    }

    async fn reload(&self) -> E2eResult<()> {
        self.call_unit(BridgeCommand::Reload).await
    }

    async fn current_url(&self) -> E2eResult<String> {
        self.call_as(BridgeCommand::Url).await
    }

    async fn wait_for(&self, selector: &str, state: WaitState, timeout: Duration) -> E2eResult<()> {
        self.call_unit(BridgeCommand::WaitFor {
            selector,
            state,
            timeout: timeout.as_millis() as u64,
        })
        .await
    }

    async fn click(&self, selector: &str, timeout: Duration) -> E2eResult<()> {
        self.call_unit(BridgeCommand::Click {
            selector,
            timeout: timeout.as_millis() as u64,
        })
        .await
    }

    async fn fill(&self, selector: &str, value: &str, timeout: Duration) -> E2eResult<()> {
        self.call_unit(BridgeCommand::Fill {
            selector,
            value,
            timeout: timeout.as_millis() as u64,
        })
        .await
    }

    async fn press(&self, selector: &str, key: &str) -> E2eResult<()> {
        self.call_unit(BridgeCommand::Press { selector, key }).await
    }

    async fn select_option(&self, selector: &str, label: &str, timeout: Duration) -> E2eResult<()> {
        self.call_unit(BridgeCommand::Select {
            selector,
            label,
            timeout: timeout.as_millis() as u64,
        })
        .await
    }

    async fn count(&self, selector: &str) -> E2eResult<usize> {
        self.call_as(BridgeCommand::Count { selector }).await
    }

    async fn all_text_contents(&self, selector: &str) -> E2eResult<Vec<String>> {
        self.call_as(BridgeCommand::Texts { selector }).await
    }

    async fn is_visible(&self, selector: &str) -> E2eResult<bool> {
        self.call_as(BridgeCommand::Visible { selector }).await
    }

    async fn is_enabled(&self, selector: &str) -> E2eResult<bool> {
        self.call_as(BridgeCommand::Enabled { selector }).await
    }

    async fn input_value(&self, selector: &str) -> E2eResult<String> {
        self.call_as(BridgeCommand::Value { selector }).await
    }

    async fn screenshot(&self, path: &Path, full_page: bool) -> E2eResult<()> {
        self.call_unit(BridgeCommand::Screenshot {
            path: path.to_string_lossy().into_owned(),
            full_page,
        })
        .await
    }

    async fn evaluate(&self, expression: &str) -> E2eResult<serde_json::Value> {
        self.call(BridgeCommand::Evaluate { expression }).await
    }

    async fn set_offline(&self, offline: bool) -> E2eResult<()> {
        self.call_unit(BridgeCommand::Offline { offline }).await
    }

    async fn route(&self, rule: &RouteRule) -> E2eResult<()> {
        self.call_unit(BridgeCommand::Route { rule }).await
    }

    async fn unroute_all(&self) -> E2eResult<()> {
        self.call_unit(BridgeCommand::UnrouteAll).await
    }

    async fn close(&self) -> E2eResult<()> {
        if let Err(e) = self.call_unit(BridgeCommand::Close).await {
            warn!(error = %e, "Bridge did not acknowledge close");
        }

        let mut child = self.child.lock().await;
        match tokio::time::timeout(Duration::from_secs(5), child.wait()).await {
            Ok(status) => {
                debug!(status = ?status?, "Bridge exited");
            }
            Err(_) => {
                warn!("Bridge did not exit, killing");
                child.kill().await?;
            }
        }
        Ok(())
    }
}

/// Opens a fresh bridge, and with it a fresh browser context, per scenario
pub struct PlaywrightFactory {
    config: PlaywrightConfig,
    base_url: String,
}

impl PlaywrightFactory {
    pub fn new(config: PlaywrightConfig, base_url: impl Into<String>) -> Self {
        Self {
            config,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl DriverFactory for PlaywrightFactory {
    async fn open(&self, scenario: &str) -> E2eResult<Arc<dyn Driver>> {
        debug!(scenario, "Launching browser");
        let session = PlaywrightSession::launch(&self.config, &self.base_url).await?;
        Ok(Arc::new(session))
    }
}
