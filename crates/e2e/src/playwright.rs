//! Playwright browser automation
//!
//! Runs a program built by [`crate::script::ScriptBuilder`] under `node` and
//! collects the step events it prints.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::str::FromStr;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command as TokioCommand;
use tracing::{debug, info, warn};

use crate::config::SuiteConfig;
use crate::error::{E2eError, E2eResult};

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
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "chromium" | "chrome" => Ok(Browser::Chromium),
            "firefox" => Ok(Browser::Firefox),
            "webkit" | "safari" => Ok(Browser::Webkit),
            other => Err(format!("unknown browser '{}'", other)),
        }
    }
}

/// One line of progress printed by a generated program
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ScriptEvent {
    StepStarted {
        index: usize,
    },
    StepPassed {
        index: usize,
        duration_ms: u64,
        #[serde(default)]
        captured: Option<BTreeMap<String, String>>,
    },
    StepFailed {
        index: usize,
        duration_ms: u64,
        error: String,
    },
    /// Every step passed
    Finished,
    /// Failure outside any step, e.g. the browser did not launch
    Crashed {
        error: String,
    },
}

impl ScriptEvent {
    /// Parse a stdout line; anything that is not an event yields `None`
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if !line.starts_with('{') {
            return None;
        }
        serde_json::from_str(line).ok()
    }
}

/// What came back from one program run
#[derive(Debug, Clone, Default)]
pub struct ScriptRun {
    pub events: Vec<ScriptEvent>,

    /// The process exited with status 0
    pub exited_ok: bool,

    /// The run was killed after exceeding its time budget
    pub timed_out: bool,

    pub stderr: String,
}

/// Playwright runner handle
pub struct PlaywrightHandle {
    /// Directory `node` runs in
    workdir: PathBuf,

    /// Module path override for `@playwright/test`
    node_path: Option<PathBuf>,

    /// Upper bound on one program run
    run_timeout: Duration,
}

impl PlaywrightHandle {
    /// Create a new Playwright handle, failing early when the toolchain is missing
    pub fn new(config: &SuiteConfig) -> E2eResult<Self> {
        Self::check_playwright_installed(&config.browser.workdir)?;

        Ok(Self {
            workdir: config.browser.workdir.clone(),
            node_path: config.browser.node_path.clone(),
            run_timeout: config.timeouts.run(),
        })
    }

    /// Handle for plain `node` programs, skipping the Playwright check
    #[cfg(test)]
    pub(crate) fn for_node(run_timeout: Duration) -> Self {
        Self {
            workdir: std::env::temp_dir(),
            node_path: None,
            run_timeout,
        }
    }

    /// Check that node and Playwright are installed
    fn check_playwright_installed(workdir: &std::path::Path) -> E2eResult<()> {
        let ok = |program: &str, args: &[&str]| {
            Command::new(program)
                .args(args)
                .current_dir(workdir)
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .map(|status| status.success())
                .unwrap_or(false)
        };

        if ok("node", &["--version"]) && ok("npx", &["playwright", "--version"]) {
            Ok(())
        } else {
            Err(E2eError::PlaywrightNotFound)
        }
    }

    /// Execute a generated program and collect its events
    pub async fn run_script(&self, script: &str) -> E2eResult<ScriptRun> {
        let temp_dir = tempfile::tempdir()?;
        let script_path = temp_dir.path().join("scenario.cjs");
        tokio::fs::write(&script_path, script).await?;

        debug!("Running Playwright script: {}", script_path.display());

        let mut cmd = TokioCommand::new("node");
        cmd.arg(&script_path)
            .current_dir(&self.workdir)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        // The script lives in a temp dir, so module lookup must be pointed back
        let node_path = self
            .node_path
            .clone()
            .unwrap_or_else(|| self.workdir.join("node_modules"));
        cmd.env("NODE_PATH", node_path);

        let mut child = cmd.spawn()?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| E2eError::Playwright("node stdout not captured".to_string()))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| E2eError::Playwright("node stderr not captured".to_string()))?;

        let stderr_task = tokio::spawn(async move {
            let mut buf = String::new();
            let _ = stderr.read_to_string(&mut buf).await;
            buf
        });

        let mut events = Vec::new();
        let mut lines = BufReader::new(stdout).lines();

        let outcome = tokio::time::timeout(self.run_timeout, async {
            while let Some(line) = lines.next_line().await? {
                match ScriptEvent::parse(&line) {
                    Some(event) => {
                        debug!("Script event: {:?}", event);
                        events.push(event);
                    }
                    None => debug!("[node] {}", line),
                }
            }
            child.wait().await
        })
        .await;

        let (exited_ok, timed_out) = match outcome {
            Ok(status) => (status?.success(), false),
            Err(_) => {
                warn!("Playwright run exceeded {:?}, killing it", self.run_timeout);
                let _ = child.kill().await;
                (false, true)
            }
        };

        let stderr = stderr_task.await.unwrap_or_default();
        if !stderr.trim().is_empty() {
            debug!("[node stderr] {}", stderr.trim());
        }

        info!(
            "Playwright run finished: {} event(s), exit ok: {}",
            events.len(),
            exited_ok
        );

        Ok(ScriptRun {
            events,
            exited_ok,
            timed_out,
            stderr,
        })
    }
}

/// Whether `node` can be started, for tests that run real programs
#[cfg(test)]
pub(crate) fn node_available() -> bool {
    Command::new("node")
        .arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}
