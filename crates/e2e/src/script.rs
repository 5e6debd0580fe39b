//! Compiles a scenario into a single Playwright program
//!
//! All steps run inside one browser context so values captured early stay
//! available later. Progress is reported as one JSON object per stdout line,
//! see [`crate::playwright::ScriptEvent`].

use std::path::PathBuf;

use crate::config::SuiteConfig;
use crate::spec::{label_value_xpath, By, Locator, TestSpec, TestStep};

/// Runtime helpers shared by every generated program
const PRELUDE: &str = r#"
const emit = (event) => console.log(JSON.stringify(event));
const vars = {};
const interpolate = (template) => template.replace(/\$\{(\w+)\}/g, (_, name) => {
  if (!(name in vars)) {
    throw new Error(`variable '${name}' was never captured`);
  }
  return vars[name];
});

let stepFailed = false;
async function step(index, body) {
  const started = Date.now();
  emit({ event: 'step_started', index });
  try {
    const captured = await body();
    emit({ event: 'step_passed', index, duration_ms: Date.now() - started, captured: captured ?? null });
  } catch (error) {
    stepFailed = true;
    emit({ event: 'step_failed', index, duration_ms: Date.now() - started, error: String(error && error.message || error) });
    throw error;
  }
}
"#;

const FOOTER: &str = r#"
    emit({ event: 'finished' });
  } catch (error) {
    if (!stepFailed) {
      emit({ event: 'crashed', error: String(error && error.message || error) });
    }
    process.exitCode = 1;
  } finally {
    await browser.close();
  }
})();
"#;

/// Builds Playwright programs for a suite configuration
pub struct ScriptBuilder<'a> {
    config: &'a SuiteConfig,
}

impl<'a> ScriptBuilder<'a> {
    pub fn new(config: &'a SuiteConfig) -> Self {
        Self { config }
    }

    /// Build the program for a whole scenario
    pub fn build(&self, spec: &TestSpec) -> String {
        let mut script = String::new();

        script.push_str("const { chromium, firefox, webkit, expect } = require('@playwright/test');\n");
        script.push_str(PRELUDE);

        script.push_str(&format!(
            r#"
(async () => {{
  const browser = await {browser}.launch({{ headless: {headless} }});
  try {{
    const context = await browser.newContext({{
      baseURL: {base_url},
      viewport: {{ width: {width}, height: {height} }}
    }});
    context.setDefaultTimeout({action_ms});
    const page = await context.newPage();
"#,
            browser = self.config.browser.browser.as_str(),
            headless = self.config.browser.headless,
            base_url = js_str(&self.config.target.base_url),
            width = spec.viewport.width,
            height = spec.viewport.height,
            action_ms = self.config.timeouts.action_ms,
        ));

        for (index, step) in spec.steps.iter().enumerate() {
            script.push_str(&format!("\n    // Step {}: {}\n", index, step.describe()));
            script.push_str(&format!(
                "    await step({}, async () => {{\n{}\n    }});\n",
                index,
                self.step_to_js(step)
            ));
        }

        script.push_str(FOOTER);
        script
    }

    /// Body of one step; returns captured values when the step reads any
    fn step_to_js(&self, step: &TestStep) -> String {
        match step {
            TestStep::Navigate { path } => {
                format!("      await page.goto({});", js_str(path))
            }
            TestStep::Click { locator, timeout_ms } => {
                let options = timeout_ms
                    .map(|t| format!("{{ timeout: {} }}", t))
                    .unwrap_or_default();
                format!("      await {}.click({});", locator_to_js(locator), options)
            }
            TestStep::ExpectUrl { pattern, timeout_ms } => {
                format!(
                    "      await expect(page).toHaveURL(new RegExp({}), {{ timeout: {} }});",
                    js_str(pattern),
                    self.expect_timeout(*timeout_ms)
                )
            }
            TestStep::ExpectVisible { locator, timeout_ms } => {
                format!(
                    "      await expect({}).toBeVisible({{ timeout: {} }});",
                    locator_to_js(locator),
                    self.expect_timeout(*timeout_ms)
                )
            }
            TestStep::ExpectText { locator, text, timeout_ms } => {
                format!(
                    "      await expect({}).toHaveText(interpolate({}), {{ timeout: {} }});",
                    locator_to_js(locator),
                    js_str(text),
                    self.expect_timeout(*timeout_ms)
                )
            }
            TestStep::CaptureText { locator, into } => {
                format!(
                    "      vars[{name}] = await {locator}.innerText();\n      return {{ [{name}]: vars[{name}] }};",
                    name = js_str(into),
                    locator = locator_to_js(locator)
                )
            }
            TestStep::Screenshot { path, full_page } => {
                let target: PathBuf = self.config.artifact_path(path);
                format!(
                    "      await page.screenshot({{ path: {}, fullPage: {} }});",
                    js_str(&target.to_string_lossy()),
                    full_page
                )
            }
        }
    }

    fn expect_timeout(&self, timeout_ms: Option<u64>) -> u64 {
        timeout_ms.unwrap_or(self.config.timeouts.expect_ms)
    }
}

/// JavaScript expression selecting `locator` on `page`
pub fn locator_to_js(locator: &Locator) -> String {
    let base = match &locator.by {
        By::Css { selector } => format!("page.locator({})", js_str(selector)),
        By::Xpath { expression } => {
            format!("page.locator({})", js_str(&format!("xpath={}", expression)))
        }
        By::Role { role, name, exact } => format!(
            "page.getByRole({}, {{ name: {}, exact: {} }})",
            js_str(role),
            js_str(name),
            exact
        ),
        By::Text { text, exact } => {
            format!("page.getByText({}, {{ exact: {} }})", js_str(text), exact)
        }
        By::LabelValue { label, element } => {
            // Unquotable labels are rejected by TestSpec::validate
            let xpath = label_value_xpath(label, element).unwrap_or_default();
            format!("page.locator({})", js_str(&format!("xpath={}", xpath)))
        }
    };

    if locator.first {
        format!("{}.first()", base)
    } else {
        base
    }
}

/// Quote a string as a JavaScript literal
fn js_str(value: &str) -> String {
    // A JSON string is a valid JS string literal
    serde_json::Value::String(value.to_string()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::Viewport;

    fn spec(steps: Vec<TestStep>) -> TestSpec {
        TestSpec {
            name: "t".to_string(),
            description: String::new(),
            tags: vec![],
            viewport: Viewport::default(),
            steps,
        }
    }

    #[test]
    fn test_session_configuration() {
        let config = SuiteConfig::default();
        let script = ScriptBuilder::new(&config).build(&spec(vec![TestStep::Navigate {
            path: "/u/accueil".to_string(),
        }]));

        assert!(script.contains("require('@playwright/test')"));
        assert!(script.contains("await chromium.launch({ headless: true })"));
        assert!(script.contains(r#"baseURL: "http://localhost:3000""#));
        assert!(script.contains("viewport: { width: 1280, height: 720 }"));
        assert!(script.contains("context.setDefaultTimeout(30000)"));
        assert!(script.contains(r#"await page.goto("/u/accueil");"#));
        assert!(script.contains("await browser.close()"));
    }

    #[test]
    fn test_locators() {
        assert_eq!(
            locator_to_js(&Locator::role("heading", "Réserver une table")),
            r#"page.getByRole("heading", { name: "Réserver une table", exact: false })"#
        );
        assert_eq!(
            locator_to_js(&Locator::css(r#"button[type="button"]:not([disabled])"#).first()),
            r#"page.locator("button[type=\"button\"]:not([disabled])").first()"#
        );
        assert_eq!(
            locator_to_js(&Locator::label_value("Guests")),
            r#"page.locator("xpath=//p[text()=\"Guests\"]/following-sibling::p")"#
        );
        assert_eq!(
            locator_to_js(&Locator::text("Réservation confirmée avec succès !")),
            r#"page.getByText("Réservation confirmée avec succès !", { exact: false })"#
        );
    }

    #[test]
    fn test_expect_timeouts_fall_back_to_default() {
        let config = SuiteConfig::default();
        let script = ScriptBuilder::new(&config).build(&spec(vec![
            TestStep::ExpectVisible {
                locator: Locator::role("heading", "Confirm your reservation"),
                timeout_ms: None,
            },
            TestStep::ExpectVisible {
                locator: Locator::text("Réservation confirmée avec succès !"),
                timeout_ms: Some(10000),
            },
        ]));
        assert!(script.contains("toBeVisible({ timeout: 5000 })"));
        assert!(script.contains("toBeVisible({ timeout: 10000 })"));
    }

    #[test]
    fn test_capture_and_interpolate() {
        let config = SuiteConfig::default();
        let script = ScriptBuilder::new(&config).build(&spec(vec![
            TestStep::CaptureText {
                locator: Locator::css("button").first(),
                into: "slot_time".to_string(),
            },
            TestStep::ExpectText {
                locator: Locator::label_value("Time"),
                text: "${slot_time}".to_string(),
                timeout_ms: None,
            },
        ]));
        assert!(script.contains(r#"vars["slot_time"] = await page.locator("button").first().innerText();"#));
        assert!(script.contains(r#"toHaveText(interpolate("${slot_time}"), { timeout: 5000 })"#));
        assert!(script.contains("await step(0, async () => {"));
        assert!(script.contains("await step(1, async () => {"));
    }

    #[test]
    fn test_url_pattern_is_escaped() {
        let config = SuiteConfig::default();
        let script = ScriptBuilder::new(&config).build(&spec(vec![TestStep::ExpectUrl {
            pattern: r"/u/confirmation\?".to_string(),
            timeout_ms: None,
        }]));
        assert!(script.contains(r#"toHaveURL(new RegExp("/u/confirmation\\?"), { timeout: 5000 })"#));
    }

    #[test]
    fn test_screenshot_goes_to_artifacts_dir() {
        let config = SuiteConfig::default();
        let script = ScriptBuilder::new(&config).build(&spec(vec![TestStep::Screenshot {
            path: PathBuf::from("screenshots/done.png"),
            full_page: true,
        }]));
        let expected = config.artifact_path(std::path::Path::new("screenshots/done.png"));
        assert!(script.contains(&format!("path: {}", js_str(&expected.to_string_lossy()))));
        assert!(script.contains("fullPage: true"));
    }
}
