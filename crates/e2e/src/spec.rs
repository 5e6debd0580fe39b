//! Declarative scenario specification
//!
//! A scenario is an ordered list of steps run in one browser session. Values
//! read with `capture_text` can be referenced by later `expect_text` steps as
//! `${name}`.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::error::{E2eError, E2eResult};

/// Pattern for `${name}` references inside `expect_text` templates
pub const VARIABLE_PATTERN: &str = r"\$\{(\w+)\}";

/// A complete scenario parsed from YAML or built in code
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestSpec {
    /// Unique name for this scenario
    pub name: String,

    /// Human-readable description
    #[serde(default)]
    pub description: String,

    /// Tags for filtering scenarios
    #[serde(default)]
    pub tags: Vec<String>,

    /// Viewport size for the browser context
    #[serde(default)]
    pub viewport: Viewport,

    /// Steps to execute in order
    pub steps: Vec<TestStep>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Viewport { width: 1280, height: 720 }
    }
}

/// How to find an element on the page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Locator {
    #[serde(flatten)]
    pub by: By,

    /// Narrow the match to its first element
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub first: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "by", rename_all = "snake_case")]
pub enum By {
    Css {
        selector: String,
    },
    Xpath {
        expression: String,
    },
    /// ARIA role plus accessible name
    Role {
        role: String,
        name: String,
        #[serde(default)]
        exact: bool,
    },
    Text {
        text: String,
        #[serde(default)]
        exact: bool,
    },
    /// The sibling element that follows the one whose text is `label`
    LabelValue {
        label: String,
        #[serde(default = "default_label_element")]
        element: String,
    },
}

fn default_label_element() -> String {
    "p".to_string()
}

impl Locator {
    pub fn css(selector: impl Into<String>) -> Self {
        By::Css { selector: selector.into() }.into()
    }

    pub fn xpath(expression: impl Into<String>) -> Self {
        By::Xpath { expression: expression.into() }.into()
    }

    pub fn role(role: impl Into<String>, name: impl Into<String>) -> Self {
        By::Role {
            role: role.into(),
            name: name.into(),
            exact: false,
        }
        .into()
    }

    pub fn text(text: impl Into<String>) -> Self {
        By::Text {
            text: text.into(),
            exact: false,
        }
        .into()
    }

    pub fn label_value(label: impl Into<String>) -> Self {
        By::LabelValue {
            label: label.into(),
            element: default_label_element(),
        }
        .into()
    }

    /// Restrict this locator to its first match
    pub fn first(mut self) -> Self {
        self.first = true;
        self
    }

    /// Short form used in step names and failure reports
    pub fn describe(&self) -> String {
        let base = match &self.by {
            By::Css { selector } => format!("css={}", selector),
            By::Xpath { expression } => format!("xpath={}", expression),
            By::Role { role, name, .. } => format!("role={}[{}]", role, name),
            By::Text { text, .. } => format!("text={}", text),
            By::LabelValue { label, .. } => format!("label={}", label),
        };
        if self.first {
            format!("{} >> first", base)
        } else {
            base
        }
    }
}

impl From<By> for Locator {
    fn from(by: By) -> Self {
        Locator { by, first: false }
    }
}

/// XPath for the element following the one labelled `label`.
///
/// Returns `None` when the label holds both quote characters and cannot be
/// written as an XPath string literal.
pub fn label_value_xpath(label: &str, element: &str) -> Option<String> {
    let quote = if !label.contains('"') {
        '"'
    } else if !label.contains('\'') {
        '\''
    } else {
        return None;
    };
    Some(format!(
        "//{el}[text()={q}{label}{q}]/following-sibling::{el}",
        el = element,
        q = quote,
        label = label
    ))
}

/// A single step in a scenario
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum TestStep {
    /// Navigate to a path relative to the base URL
    Navigate { path: String },

    /// Click an element
    Click {
        locator: Locator,
        #[serde(default)]
        timeout_ms: Option<u64>,
    },

    /// Assert the page address matches a regular expression
    ExpectUrl {
        pattern: String,
        #[serde(default)]
        timeout_ms: Option<u64>,
    },

    /// Assert an element becomes visible
    ExpectVisible {
        locator: Locator,
        #[serde(default)]
        timeout_ms: Option<u64>,
    },

    /// Assert an element's text, with `${name}` interpolation
    ExpectText {
        locator: Locator,
        text: String,
        #[serde(default)]
        timeout_ms: Option<u64>,
    },

    /// Read an element's inner text into a variable
    CaptureText { locator: Locator, into: String },

    /// Take a screenshot, path relative to the artifacts directory
    Screenshot {
        path: PathBuf,
        #[serde(default = "default_full_page")]
        full_page: bool,
    },
}

fn default_full_page() -> bool {
    true
}

impl TestStep {
    /// Stable name for logs and reports
    pub fn describe(&self) -> String {
        match self {
            TestStep::Navigate { path } => format!("navigate:{}", path),
            TestStep::Click { locator, .. } => format!("click:{}", locator.describe()),
            TestStep::ExpectUrl { pattern, .. } => format!("expect_url:{}", pattern),
            TestStep::ExpectVisible { locator, .. } => {
                format!("expect_visible:{}", locator.describe())
            }
            TestStep::ExpectText { locator, text, .. } => {
                format!("expect_text:{}={}", locator.describe(), text)
            }
            TestStep::CaptureText { locator, into } => {
                format!("capture_text:{}->{}", locator.describe(), into)
            }
            TestStep::Screenshot { path, .. } => format!("screenshot:{}", path.display()),
        }
    }

    pub fn locator(&self) -> Option<&Locator> {
        match self {
            TestStep::Click { locator, .. }
            | TestStep::ExpectVisible { locator, .. }
            | TestStep::ExpectText { locator, .. }
            | TestStep::CaptureText { locator, .. } => Some(locator),
            TestStep::Navigate { .. } | TestStep::ExpectUrl { .. } | TestStep::Screenshot { .. } => {
                None
            }
        }
    }

    fn timeout_ms(&self) -> Option<u64> {
        match self {
            TestStep::Click { timeout_ms, .. }
            | TestStep::ExpectUrl { timeout_ms, .. }
            | TestStep::ExpectVisible { timeout_ms, .. }
            | TestStep::ExpectText { timeout_ms, .. } => *timeout_ms,
            _ => None,
        }
    }
}

/// Names referenced as `${name}` in a text template, in order of appearance
pub fn template_variables(template: &str) -> E2eResult<Vec<String>> {
    let re = Regex::new(VARIABLE_PATTERN)?;
    Ok(re
        .captures_iter(template)
        .map(|c| c[1].to_string())
        .collect())
}

impl TestSpec {
    /// Parse a scenario from a YAML string
    pub fn from_yaml(yaml: &str) -> E2eResult<Self> {
        serde_yaml::from_str(yaml).map_err(E2eError::from)
    }

    /// Parse a scenario from a YAML file
    pub fn from_file(path: &Path) -> E2eResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
            .map_err(|e| E2eError::SpecParse(format!("{}: {}", path.display(), e)))
    }

    /// Load all scenarios from a directory, ordered by file name
    pub fn load_all(dir: &Path) -> E2eResult<Vec<Self>> {
        let mut specs = Vec::new();

        for entry in walkdir::WalkDir::new(dir)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.path()
                    .extension()
                    .map(|ext| ext == "yaml" || ext == "yml")
                    .unwrap_or(false)
            })
        {
            specs.push(Self::from_file(entry.path())?);
        }

        Ok(specs)
    }

    /// Filter scenarios by tag
    pub fn filter_by_tag<'a>(specs: &'a [Self], tag: &str) -> Vec<&'a Self> {
        specs.iter().filter(|s| s.tags.iter().any(|t| t == tag)).collect()
    }

    /// Screenshot paths this scenario writes, in step order
    pub fn screenshot_paths(&self) -> impl Iterator<Item = &Path> {
        self.steps.iter().filter_map(|step| match step {
            TestStep::Screenshot { path, .. } => Some(path.as_path()),
            _ => None,
        })
    }

    /// Check the scenario is runnable before a browser is started
    pub fn validate(&self) -> E2eResult<()> {
        let invalid = |reason: String| E2eError::SpecInvalid {
            spec: self.name.clone(),
            reason,
        };

        if self.steps.is_empty() {
            return Err(invalid("no steps".to_string()));
        }
        if self.viewport.width == 0 || self.viewport.height == 0 {
            return Err(invalid("viewport must be non-empty".to_string()));
        }

        let name_re = Regex::new(r"^\w+$")?;
        let mut captured: HashSet<&str> = HashSet::new();
        let mut screenshots: HashSet<&Path> = HashSet::new();

        for (index, step) in self.steps.iter().enumerate() {
            let at = |reason: String| invalid(format!("step {} ({}): {}", index, step.describe(), reason));

            if step.timeout_ms() == Some(0) {
                return Err(at("timeout must be positive".to_string()));
            }

            if let Some(Locator {
                by: By::LabelValue { label, element },
                ..
            }) = step.locator()
            {
                if label_value_xpath(label, element).is_none() {
                    return Err(at("label mixes both quote characters".to_string()));
                }
            }

            match step {
                TestStep::ExpectUrl { pattern, .. } => {
                    if let Err(e) = Regex::new(pattern) {
                        return Err(at(format!("bad url pattern: {}", e)));
                    }
                }
                TestStep::ExpectText { text, .. } => {
                    for var in template_variables(text)? {
                        if !captured.contains(var.as_str()) {
                            return Err(at(format!("${{{}}} used before it is captured", var)));
                        }
                    }
                }
                TestStep::CaptureText { into, .. } => {
                    if !name_re.is_match(into) {
                        return Err(at(format!("'{}' is not a valid variable name", into)));
                    }
                    if !captured.insert(into.as_str()) {
                        return Err(at(format!("'{}' captured twice", into)));
                    }
                }
                TestStep::Screenshot { path, .. } => {
                    if path.as_os_str().is_empty() || path.is_absolute() {
                        return Err(at("screenshot path must be relative".to_string()));
                    }
                    if !screenshots.insert(path.as_path()) {
                        return Err(at("screenshot path used twice".to_string()));
                    }
                }
                TestStep::Navigate { .. } | TestStep::Click { .. } | TestStep::ExpectVisible { .. } => {}
            }
        }

        Ok(())
    }
}
