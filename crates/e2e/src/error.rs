//! Error types for E2E testing

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::spec::TestStep;

#[derive(Error, Debug)]
pub enum E2eError {
    #[error("Target application failed to start: {0}")]
    TargetStartup(String),

    #[error("Target application at {url} unreachable after {attempts} attempts")]
    TargetUnreachable { url: String, attempts: usize },

    #[error("Playwright not found. Install with: npm i -D @playwright/test && npx playwright install")]
    PlaywrightNotFound,

    #[error("Playwright error: {0}")]
    Playwright(String),

    #[error("Test spec parse error: {0}")]
    SpecParse(String),

    #[error("Invalid test spec '{spec}': {reason}")]
    SpecInvalid { spec: String, reason: String },

    #[error("Step {index} failed: {step} - {reason}")]
    StepFailed {
        index: usize,
        step: String,
        reason: String,
    },

    #[error("Artifact check failed: {0}")]
    Artifact(String),

    #[error("Screenshot mismatch: {name} differs by {diff_percent:.2}% (threshold: {threshold:.2}%)")]
    ScreenshotMismatch {
        name: String,
        diff_percent: f64,
        threshold: f64,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Config error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),
}

pub type E2eResult<T> = Result<T, E2eError>;

/// Why a scenario step failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// An expected UI state never showed up.
    AssertionTimeout,
    /// A locator matched no element, or several under strict mode.
    LocatorNotFound,
    /// The page address did not match after navigating.
    NavigationMismatch,
    /// The run was cut off while the step was in flight.
    Timeout,
    /// Anything else thrown inside the step.
    Script,
}

impl FailureKind {
    /// Classify a Playwright error message raised while running `step`.
    pub fn classify(step: &TestStep, message: &str) -> Self {
        if matches!(step, TestStep::ExpectUrl { .. }) {
            return FailureKind::NavigationMismatch;
        }

        let message = message.to_lowercase();
        if message.contains("strict mode violation") || message.contains("resolved to 0 elements") {
            return FailureKind::LocatorNotFound;
        }

        // Actions say "Timeout 30000ms exceeded", expects say "Timed out 5000ms waiting"
        let timed_out = message.contains("timeout") || message.contains("timed out");
        if !timed_out {
            return FailureKind::Script;
        }

        match step {
            TestStep::ExpectVisible { .. } | TestStep::ExpectText { .. } => {
                FailureKind::AssertionTimeout
            }
            TestStep::Click { .. } | TestStep::CaptureText { .. } => FailureKind::LocatorNotFound,
            _ => FailureKind::Timeout,
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FailureKind::AssertionTimeout => "assertion timeout",
            FailureKind::LocatorNotFound => "locator not found",
            FailureKind::NavigationMismatch => "navigation mismatch",
            FailureKind::Timeout => "timeout",
            FailureKind::Script => "script error",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::Locator;
    use test_case::test_case;

    fn heading() -> Locator {
        Locator::role("heading", "Réserver une table")
    }

    #[test]
    fn test_url_failures_are_navigation_mismatches() {
        let step = TestStep::ExpectUrl {
            pattern: "/u/reserver".to_string(),
            timeout_ms: None,
        };
        let msg = "Timed out 5000ms waiting for expect(page).toHaveURL(expected)";
        assert_eq!(FailureKind::classify(&step, msg), FailureKind::NavigationMismatch);
    }

    #[test_case("Timed out 15000ms waiting for expect(locator).toBeVisible()", FailureKind::AssertionTimeout ; "visible timeout")]
    #[test_case("strict mode violation: getByRole('heading') resolved to 2 elements", FailureKind::LocatorNotFound ; "ambiguous locator")]
    #[test_case("variable 'slot_time' was never captured", FailureKind::Script ; "script error")]
    fn test_classify_expect_visible(message: &str, expected: FailureKind) {
        let step = TestStep::ExpectVisible {
            locator: heading(),
            timeout_ms: Some(15000),
        };
        assert_eq!(FailureKind::classify(&step, message), expected);
    }

    #[test_case("Timed out 10000ms waiting for expect(locator).toBeVisible()" ; "capitalised expect message")]
    #[test_case("TimeoutError: locator.waitFor: timeout 10000ms exceeded" ; "timeout error prefix")]
    fn test_expect_timeouts_ignore_case(message: &str) {
        let step = TestStep::ExpectText {
            locator: heading(),
            text: "${slot_time}".to_string(),
            timeout_ms: None,
        };
        assert_eq!(FailureKind::classify(&step, message), FailureKind::AssertionTimeout);
    }

    #[test]
    fn test_click_timeout_means_missing_element() {
        let step = TestStep::Click {
            locator: Locator::role("button", "Confirm Reservation"),
            timeout_ms: None,
        };
        let msg = "locator.click: Timeout 30000ms exceeded.";
        assert_eq!(FailureKind::classify(&step, msg), FailureKind::LocatorNotFound);
    }

    #[test]
    fn test_navigate_timeout() {
        let step = TestStep::Navigate {
            path: "/u/accueil".to_string(),
        };
        let msg = "page.goto: Timeout 30000ms exceeded.";
        assert_eq!(FailureKind::classify(&step, msg), FailureKind::Timeout);
    }
}
