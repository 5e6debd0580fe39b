//! Reservation flow E2E checker
//!
//! This crate drives the table reservation web application through a browser
//! and reports, step by step, whether the flow still works:
//! - Waits for (or launches) the application under test
//! - Compiles declarative scenarios into one Playwright program per run
//! - Streams step events back from `node` and pinpoints the first failure
//! - Checks the screenshot the flow leaves behind
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  reservation-e2e (Rust)                     │
//! ├─────────────────────────────────────────────────────────────┤
//! │  TestRunner                                                 │
//! │    ├── attach_target() -> TargetHandle                      │
//! │    ├── ScriptBuilder::build(spec) -> JS program             │
//! │    ├── PlaywrightHandle::run_script() -> ScriptRun          │
//! │    ├── fold_events() -> StepResult / StepFailure            │
//! │    └── artifact::inspect() / compare()                      │
//! ├─────────────────────────────────────────────────────────────┤
//! │  TestSpec (YAML or scenario::reservation_flow())            │
//! │    ├── name, tags, viewport                                 │
//! │    └── steps: [TestStep]                                    │
//! │          ├── navigate { path }                              │
//! │          ├── click { locator }                              │
//! │          ├── expect_url { pattern }                         │
//! │          ├── expect_visible { locator }                     │
//! │          ├── expect_text { locator, text: "${var}" }        │
//! │          ├── capture_text { locator, into }                 │
//! │          └── screenshot { path }                            │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod artifact;
pub mod config;
pub mod error;
pub mod playwright;
pub mod runner;
pub mod scenario;
pub mod script;
pub mod spec;
pub mod target;

pub use config::SuiteConfig;
pub use error::{E2eError, E2eResult, FailureKind};
pub use runner::{ScenarioReport, SuiteReport, TestRunner};
pub use spec::{Locator, TestSpec, TestStep};
