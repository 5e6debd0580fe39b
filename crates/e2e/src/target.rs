//! The application under test: optional launching and reachability probing

use std::process::{Child, Command, Stdio};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::config::{LaunchConfig, TargetConfig};
use crate::error::{E2eError, E2eResult};

/// Handle to the application under test
///
/// When the application was launched by this handle it is stopped on drop.
pub struct TargetHandle {
    child: Option<Child>,
    base_url: String,
}

impl TargetHandle {
    /// Launch the application if configured, then wait until it answers
    pub async fn attach(config: &TargetConfig) -> E2eResult<Self> {
        let child = match &config.launch {
            Some(launch) => Some(spawn(launch)?),
            None => None,
        };

        let handle = TargetHandle {
            child,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        };

        handle
            .wait_for_reachable(&config.probe_path, config.startup_timeout())
            .await?;

        info!("Target is reachable at {}", handle.base_url);
        Ok(handle)
    }

    /// Poll the probe URL until any non-5xx answer arrives
    async fn wait_for_reachable(&self, probe_path: &str, timeout_duration: Duration) -> E2eResult<()> {
        let probe_url = format!("{}{}", self.base_url, probe_path);
        let mut builder = reqwest::Client::builder().timeout(Duration::from_secs(2));
        if is_loopback(&self.base_url) {
            builder = builder.no_proxy();
        }
        let client = builder.build()?;

        let start = std::time::Instant::now();
        let mut attempts = 0;

        loop {
            attempts += 1;

            match client.get(&probe_url).send().await {
                Ok(resp) if !resp.status().is_server_error() => {
                    return Ok(());
                }
                Ok(resp) => {
                    warn!("Probe returned {}", resp.status());
                }
                Err(e) => {
                    if attempts == 1 {
                        info!("Waiting for {} to answer...", probe_url);
                    }
                    // Refused connections are expected while the app boots
                    if !e.is_connect() {
                        warn!("Probe error: {}", e);
                    }
                }
            }

            if start.elapsed() >= timeout_duration {
                break;
            }
            sleep(Duration::from_millis(250)).await;
        }

        Err(E2eError::TargetUnreachable {
            url: probe_url,
            attempts,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Whether this handle owns a launched process
    pub fn is_launched(&self) -> bool {
        self.child.is_some()
    }

    /// Stop the launched application, if any
    pub fn stop(&mut self) -> E2eResult<()> {
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };

        info!("Stopping target application (pid: {})", child.id());

        #[cfg(unix)]
        {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;

            let pid = Pid::from_raw(child.id() as i32);
            if kill(pid, Signal::SIGTERM).is_ok() {
                std::thread::sleep(Duration::from_millis(500));
            }
        }

        let _ = child.kill();
        let _ = child.wait();

        Ok(())
    }
}

impl Drop for TargetHandle {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

/// Local targets must not be routed through a system proxy
fn is_loopback(base_url: &str) -> bool {
    reqwest::Url::parse(base_url)
        .ok()
        .and_then(|url| url.host_str().map(str::to_string))
        .map(|host| matches!(host.as_str(), "localhost" | "127.0.0.1" | "[::1]" | "::1"))
        .unwrap_or(false)
}

fn spawn(launch: &LaunchConfig) -> E2eResult<Child> {
    info!("Launching target: {} {}", launch.program, launch.args.join(" "));

    let mut cmd = Command::new(&launch.program);
    cmd.args(&launch.args)
        .envs(&launch.env)
        .stdout(Stdio::null())
        .stderr(Stdio::null());

    if let Some(dir) = &launch.workdir {
        cmd.current_dir(dir);
    }

    cmd.spawn().map_err(|e| {
        E2eError::TargetStartup(format!("failed to spawn {}: {}", launch.program, e))
    })
}
