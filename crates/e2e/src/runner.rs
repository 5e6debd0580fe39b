//! Main test runner that orchestrates the target, Playwright and artifact checks

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, error, info, warn};

use crate::artifact::{self, ArtifactRecord};
use crate::config::SuiteConfig;
use crate::error::{E2eError, E2eResult, FailureKind};
use crate::playwright::{PlaywrightHandle, ScriptEvent, ScriptRun};
use crate::script::ScriptBuilder;
use crate::spec::{TestSpec, TestStep};
use crate::target::TargetHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Passed,
    Failed,
    /// Never reached because an earlier step failed
    Skipped,
}

/// Outcome of one step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub index: usize,
    pub name: String,
    pub status: StepStatus,
    pub duration_ms: u64,
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub captured: BTreeMap<String, String>,
}

/// The first step that failed, and why
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepFailure {
    pub index: usize,
    pub step: String,
    pub kind: FailureKind,
    pub message: String,
}

/// Result of running a single scenario
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioReport {
    pub name: String,
    pub success: bool,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub steps: Vec<StepResult>,
    pub captured: BTreeMap<String, String>,
    pub failure: Option<StepFailure>,
    pub artifacts: Vec<ArtifactRecord>,
    pub error: Option<String>,
}

/// Result of running several scenarios
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteReport {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub duration_ms: u64,
    pub results: Vec<ScenarioReport>,
}

/// Step results folded from a script event stream
#[derive(Debug, Clone)]
pub struct FoldedRun {
    pub steps: Vec<StepResult>,
    pub captured: BTreeMap<String, String>,
    pub failure: Option<StepFailure>,
    pub finished: bool,
    /// Error thrown outside any step
    pub crash: Option<String>,
}

/// Turn the events of one run into per-step results.
///
/// Steps never mentioned after a failure are `Skipped`. A step that started
/// but has no outcome failed with [`FailureKind::Timeout`].
pub fn fold_events(spec: &TestSpec, run: &ScriptRun) -> FoldedRun {
    let mut outcomes: BTreeMap<usize, StepResult> = BTreeMap::new();
    let mut captured = BTreeMap::new();
    let mut failure = None;
    let mut in_flight = None;
    let mut finished = false;
    let mut crash = None;

    let name_of = |index: usize| {
        spec.steps
            .get(index)
            .map(TestStep::describe)
            .unwrap_or_else(|| format!("step {}", index))
    };

    for event in &run.events {
        match event {
            ScriptEvent::StepStarted { index } => in_flight = Some(*index),
            ScriptEvent::StepPassed {
                index,
                duration_ms,
                captured: values,
            } => {
                in_flight = None;
                let values = values.clone().unwrap_or_default();
                captured.extend(values.clone());
                outcomes.insert(
                    *index,
                    StepResult {
                        index: *index,
                        name: name_of(*index),
                        status: StepStatus::Passed,
                        duration_ms: *duration_ms,
                        error: None,
                        captured: values,
                    },
                );
            }
            ScriptEvent::StepFailed {
                index,
                duration_ms,
                error,
            } => {
                in_flight = None;
                let kind = spec
                    .steps
                    .get(*index)
                    .map(|step| FailureKind::classify(step, error))
                    .unwrap_or(FailureKind::Script);
                outcomes.insert(
                    *index,
                    StepResult {
                        index: *index,
                        name: name_of(*index),
                        status: StepStatus::Failed,
                        duration_ms: *duration_ms,
                        error: Some(error.clone()),
                        captured: BTreeMap::new(),
                    },
                );
                if failure.is_none() {
                    failure = Some(StepFailure {
                        index: *index,
                        step: name_of(*index),
                        kind,
                        message: error.clone(),
                    });
                }
            }
            ScriptEvent::Finished => finished = true,
            ScriptEvent::Crashed { error } => crash = Some(error.clone()),
        }
    }

    if failure.is_none() {
        if let Some(index) = in_flight {
            let message = if run.timed_out {
                "run exceeded its time budget".to_string()
            } else {
                crash.clone().unwrap_or_else(|| "step never reported an outcome".to_string())
            };
            outcomes.insert(
                index,
                StepResult {
                    index,
                    name: name_of(index),
                    status: StepStatus::Failed,
                    duration_ms: 0,
                    error: Some(message.clone()),
                    captured: BTreeMap::new(),
                },
            );
            failure = Some(StepFailure {
                index,
                step: name_of(index),
                kind: FailureKind::Timeout,
                message,
            });
        }
    }

    let steps = (0..spec.steps.len())
        .map(|index| {
            outcomes.remove(&index).unwrap_or_else(|| StepResult {
                index,
                name: name_of(index),
                status: StepStatus::Skipped,
                duration_ms: 0,
                error: None,
                captured: BTreeMap::new(),
            })
        })
        .collect();

    FoldedRun {
        steps,
        captured,
        failure,
        finished,
        crash,
    }
}

/// Main E2E test runner
pub struct TestRunner {
    config: SuiteConfig,

    /// Attached target (if any)
    target: Option<TargetHandle>,
}

impl TestRunner {
    /// Create a new test runner with default configuration
    pub fn new() -> Self {
        Self::with_config(SuiteConfig::default())
    }

    pub fn with_config(config: SuiteConfig) -> Self {
        Self { config, target: None }
    }

    pub fn config(&self) -> &SuiteConfig {
        &self.config
    }

    /// Launch (if configured) and wait for the target application
    pub async fn attach_target(&mut self) -> E2eResult<()> {
        if self.target.is_some() {
            return Ok(());
        }

        let target = TargetHandle::attach(&self.config.target).await?;
        self.target = Some(target);
        Ok(())
    }

    /// Stop a target this runner launched
    pub fn detach_target(&mut self) -> E2eResult<()> {
        if let Some(mut target) = self.target.take() {
            target.stop()?;
        }
        Ok(())
    }

    /// The Playwright program a scenario compiles to
    pub fn script_for(&self, spec: &TestSpec) -> E2eResult<String> {
        spec.validate()?;
        Ok(ScriptBuilder::new(&self.config).build(spec))
    }

    /// Run all scenarios found in a directory
    pub async fn run_all(&mut self, dir: &Path) -> E2eResult<SuiteReport> {
        let specs = TestSpec::load_all(dir)?;
        self.run_specs(&specs).await
    }

    /// Run scenarios in a directory matching a tag
    pub async fn run_tagged(&mut self, dir: &Path, tag: &str) -> E2eResult<SuiteReport> {
        let specs = TestSpec::load_all(dir)?;
        let filtered: Vec<TestSpec> = TestSpec::filter_by_tag(&specs, tag)
            .into_iter()
            .cloned()
            .collect();
        self.run_specs(&filtered).await
    }

    /// Run a list of scenarios
    pub async fn run_specs(&mut self, specs: &[TestSpec]) -> E2eResult<SuiteReport> {
        let start = Instant::now();
        let mut results = Vec::new();
        let mut passed = 0;
        let mut failed = 0;

        if specs.is_empty() {
            warn!("No scenarios to run");
            return Ok(SuiteReport {
                total: 0,
                passed: 0,
                failed: 0,
                duration_ms: 0,
                results,
            });
        }

        self.attach_target().await?;

        info!("Running {} scenario(s)...", specs.len());

        for spec in specs {
            let result = match self.run_spec(spec).await {
                Ok(result) => result,
                Err(e) => ScenarioReport {
                    name: spec.name.clone(),
                    success: false,
                    started_at: Utc::now(),
                    duration_ms: 0,
                    steps: vec![],
                    captured: BTreeMap::new(),
                    failure: None,
                    artifacts: vec![],
                    error: Some(e.to_string()),
                },
            };

            if result.success {
                passed += 1;
                info!("✓ {} ({} ms)", result.name, result.duration_ms);
            } else {
                failed += 1;
                error!(
                    "✗ {} - {}",
                    result.name,
                    result.error.as_deref().unwrap_or("unknown error")
                );
            }
            results.push(result);
        }

        let duration_ms = start.elapsed().as_millis() as u64;
        info!(
            "Results: {} passed, {} failed ({} ms)",
            passed, failed, duration_ms
        );

        Ok(SuiteReport {
            total: specs.len(),
            passed,
            failed,
            duration_ms,
            results,
        })
    }

    /// Run a single scenario in one browser session
    pub async fn run_spec(&mut self, spec: &TestSpec) -> E2eResult<ScenarioReport> {
        let started_at = Utc::now();
        let start = Instant::now();
        debug!("Running scenario: {}", spec.name);

        let script = self.script_for(spec)?;
        self.attach_target().await?;

        let screenshots: Vec<PathBuf> = spec
            .screenshot_paths()
            .map(|p| self.config.artifact_path(p))
            .collect();
        for path in &screenshots {
            artifact::clear_stale(path)?;
        }

        let playwright = PlaywrightHandle::new(&self.config)?;
        let run = playwright.run_script(&script).await?;
        let folded = fold_events(spec, &run);

        let mut error = None;
        if let Some(failure) = &folded.failure {
            warn!(
                "Step {} ({}) failed: {}: {}",
                failure.index, failure.step, failure.kind, failure.message
            );
            error = Some(
                E2eError::StepFailed {
                    index: failure.index,
                    step: failure.step.clone(),
                    reason: format!("{}: {}", failure.kind, failure.message),
                }
                .to_string(),
            );
        } else if !folded.finished || !run.exited_ok {
            return Err(E2eError::Playwright(format!(
                "script ended without finishing (timed out: {}): {}\n{}",
                run.timed_out,
                folded.crash.as_deref().unwrap_or("no error reported"),
                run.stderr.trim()
            )));
        }

        let mut artifacts = Vec::new();
        if error.is_none() {
            match self.check_artifacts(spec, &screenshots) {
                Ok(records) => artifacts = records,
                Err(e) => error = Some(e.to_string()),
            }
        }

        for (name, value) in &folded.captured {
            debug!("Captured {} = {:?}", name, value);
        }

        Ok(ScenarioReport {
            name: spec.name.clone(),
            success: error.is_none(),
            started_at,
            duration_ms: start.elapsed().as_millis() as u64,
            steps: folded.steps,
            captured: folded.captured,
            failure: folded.failure,
            artifacts,
            error,
        })
    }

    /// Inspect screenshots and diff them against baselines when present
    fn check_artifacts(&self, spec: &TestSpec, screenshots: &[PathBuf]) -> E2eResult<Vec<ArtifactRecord>> {
        let mut records = Vec::new();

        for path in screenshots {
            let mut record = artifact::inspect(path, spec.viewport)?;

            let baseline = self
                .config
                .artifacts
                .baseline_dir
                .as_ref()
                .zip(path.file_name())
                .map(|(dir, name)| dir.join(name))
                .filter(|p| p.exists());

            if let Some(baseline) = baseline {
                let threshold = self.config.artifacts.threshold;
                let diff = artifact::compare(path, &baseline, threshold)?;
                if !diff.matches {
                    return Err(E2eError::ScreenshotMismatch {
                        name: path.display().to_string(),
                        diff_percent: diff.diff_percent,
                        threshold,
                    });
                }
                record.baseline = Some(diff);
            }

            info!("Artifact {} ({}x{}, sha256 {})", path.display(), record.width, record.height, record.sha256);
            records.push(record);
        }

        Ok(records)
    }

    /// Write the suite report as JSON into the artifacts directory
    pub fn write_results(&self, results: &SuiteReport) -> E2eResult<PathBuf> {
        let path = self.config.artifact_path(Path::new("test-results.json"));
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(results)?;
        std::fs::write(&path, json)?;

        info!("Results written to: {}", path.display());
        Ok(path)
    }
}

impl Default for TestRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TestRunner {
    fn drop(&mut self) {
        let _ = self.detach_target();
    }
}
