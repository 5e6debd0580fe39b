//! Suite configuration

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::E2eResult;
use crate::playwright::Browser;

/// Everything a run needs besides the scenarios themselves
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SuiteConfig {
    /// Application under test
    pub target: TargetConfig,

    /// Browser session settings
    pub browser: BrowserConfig,

    /// Default timeouts
    pub timeouts: TimeoutConfig,

    /// Screenshot and report locations
    pub artifacts: ArtifactConfig,
}

/// Application under test
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetConfig {
    /// Base URL every scenario path is resolved against
    pub base_url: String,

    /// Path probed to decide the application is up
    pub probe_path: String,

    /// How long to wait for the application to answer, in seconds
    pub startup_timeout_secs: u64,

    /// Command that starts the application (None = already running)
    pub launch: Option<LaunchConfig>,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            probe_path: "/".to_string(),
            startup_timeout_secs: 30,
            launch: None,
        }
    }
}

impl TargetConfig {
    pub fn startup_timeout(&self) -> Duration {
        Duration::from_secs(self.startup_timeout_secs)
    }
}

/// Command used to launch the application under test
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LaunchConfig {
    pub program: String,

    #[serde(default)]
    pub args: Vec<String>,

    /// Working directory for the command
    #[serde(default)]
    pub workdir: Option<PathBuf>,

    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    pub browser: Browser,

    pub headless: bool,

    /// Directory `node` runs in; `@playwright/test` is resolved from here
    pub workdir: PathBuf,

    /// Extra module path for resolving `@playwright/test`
    pub node_path: Option<PathBuf>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            browser: Browser::Chromium,
            headless: true,
            workdir: PathBuf::from("."),
            node_path: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Default for expect steps without their own timeout
    pub expect_ms: u64,

    /// Default for actions (click, navigation, reading text)
    pub action_ms: u64,

    /// Upper bound on one whole scenario run
    pub run_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            expect_ms: 5000,
            action_ms: 30000,
            run_secs: 300,
        }
    }
}

impl TimeoutConfig {
    pub fn run(&self) -> Duration {
        Duration::from_secs(self.run_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactConfig {
    /// Root for screenshots and the JSON report
    pub output_dir: PathBuf,

    /// Screenshots with a same-named file here are diffed against it
    pub baseline_dir: Option<PathBuf>,

    /// Allowed share of differing pixels, in percent
    pub threshold: f64,
}

impl Default for ArtifactConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("test-results"),
            baseline_dir: None,
            threshold: 0.5,
        }
    }
}

impl SuiteConfig {
    /// Load configuration from file, falling back to defaults when it is missing
    pub fn load(path: &Path) -> E2eResult<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = toml::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Absolute location of a screenshot path taken from a scenario
    pub fn artifact_path(&self, relative: &Path) -> PathBuf {
        let root = if self.artifacts.output_dir.is_absolute() {
            self.artifacts.output_dir.clone()
        } else {
            std::env::current_dir()
                .map(|cwd| cwd.join(&self.artifacts.output_dir))
                .unwrap_or_else(|_| self.artifacts.output_dir.clone())
        };
        root.join(relative)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SuiteConfig::default();
        assert_eq!(config.target.base_url, "http://localhost:3000");
        assert_eq!(config.timeouts.expect_ms, 5000);
        assert!(config.browser.headless);
        assert!(config.target.launch.is_none());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: SuiteConfig = toml::from_str(
            r#"
[target]
base_url = "http://127.0.0.1:4000"

[target.launch]
program = "npm"
args = ["run", "dev"]
workdir = "frontend"

[browser]
browser = "firefox"
"#,
        )
        .unwrap();
        assert_eq!(config.target.base_url, "http://127.0.0.1:4000");
        assert_eq!(config.target.probe_path, "/");
        assert_eq!(config.browser.browser, Browser::Firefox);
        assert_eq!(config.artifacts.threshold, 0.5);
        let launch = config.target.launch.unwrap();
        assert_eq!(launch.args, vec!["run", "dev"]);
        assert_eq!(launch.workdir, Some(PathBuf::from("frontend")));
    }

    #[test]
    fn test_missing_file_loads_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = SuiteConfig::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.timeouts.action_ms, 30000);
    }

    #[test]
    fn test_artifact_path_is_absolute() {
        let config = SuiteConfig::default();
        let path = config.artifact_path(Path::new("screenshots/done.png"));
        assert!(path.is_absolute());
        assert!(path.ends_with("test-results/screenshots/done.png"));
    }
}
