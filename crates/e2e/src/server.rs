//! Application under test - optional spawning and reachability checks

use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use crate::error::{E2eError, E2eResult};

const READY_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// How to bring up the frontend and backend, if the harness should
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Shell commands started in order, e.g. the backend then the frontend
    /// dev server. Empty means the application is already running.
    pub commands: Vec<String>,

    /// Working directory for the commands
    pub working_dir: Option<PathBuf>,

    /// URL that must answer before scenarios start; defaults to the
    /// frontend base URL
    pub ready_url: Option<String>,

    pub startup_timeout_ms: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            commands: Vec::new(),
            working_dir: None,
            ready_url: None,
            startup_timeout_ms: 60_000,
        }
    }
}

/// Handle to spawned application processes
pub struct AppServer {
    children: Vec<Child>,
    ready_url: String,
}

impl AppServer {
    /// Spawn the configured commands and wait until `ready_url` answers
    pub async fn start(config: &AppConfig, base_url: &str) -> E2eResult<Self> {
        let ready_url = config.ready_url.clone().unwrap_or_else(|| base_url.to_string());
        let mut server = AppServer {
            children: Vec::new(),
            ready_url,
        };

        for command in &config.commands {
            info!("Spawning: {}", command);

            let mut cmd = Command::new("sh");
            cmd.arg("-c")
                .arg(command)
                .stdout(Stdio::null())
                .stderr(Stdio::null());
            if let Some(dir) = &config.working_dir {
                cmd.current_dir(dir);
            }
            // the shell and everything it starts share one process group
            #[cfg(unix)]
            {
                use std::os::unix::process::CommandExt;
                cmd.process_group(0);
            }

            let child = cmd
                .spawn()
                .map_err(|e| E2eError::AppStartup(format!("failed to spawn '{}': {}", command, e)))?;
            server.children.push(child);
        }

        server
            .wait_until_ready(Duration::from_millis(config.startup_timeout_ms))
            .await?;

        info!("Application is reachable at {}", server.ready_url);
        Ok(server)
    }

    /// Any HTTP response counts; only connection-level failures mean not ready
    async fn wait_until_ready(&self, timeout: Duration) -> E2eResult<()> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(2))
            .build()?;

        let start = Instant::now();
        let mut attempts = 0;

        while start.elapsed() < timeout {
            attempts += 1;

            match client.get(&self.ready_url).send().await {
                Ok(resp) => {
                    debug!("Readiness probe returned {}", resp.status());
                    return Ok(());
                }
                Err(e) => {
                    if attempts == 1 {
                        info!("Waiting for application to start...");
                    }
                    if !e.is_connect() && !e.is_timeout() {
                        warn!("Readiness probe error: {}", e);
                    }
                }
            }

            sleep(READY_POLL_INTERVAL).await;
        }

        Err(E2eError::AppUnreachable {
            url: self.ready_url.clone(),
            attempts,
        })
    }

    pub fn ready_url(&self) -> &str {
        &self.ready_url
    }

    pub fn spawned(&self) -> usize {
        self.children.len()
    }

    /// Stop spawned process groups, newest first
    pub fn stop(&mut self) {
        while let Some(mut child) = self.children.pop() {
            info!("Stopping application process group (pgid: {})", child.id());

            #[cfg(unix)]
            {
                use nix::sys::signal::{killpg, Signal};
                use nix::unistd::Pid;

                let pgid = Pid::from_raw(child.id() as i32);
                if killpg(pgid, Signal::SIGTERM).is_ok() {
                    std::thread::sleep(Duration::from_millis(500));
                    let _ = killpg(pgid, Signal::SIGKILL);
                }
            }

            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

impl Drop for AppServer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Whether `url` answers HTTP at all within `timeout`
pub async fn probe(url: &str, timeout: Duration) -> bool {
    let client = match reqwest::Client::builder().timeout(timeout).build() {
        Ok(client) => client,
        Err(_) => return false,
    };
    client.get(url).send().await.is_ok()
}
