//! Live run of the reservation flow.
//!
//! Needs the reservation application on http://localhost:3000 (or
//! RESERVATION_E2E_BASE_URL) and `@playwright/test` with browsers installed:
//!
//! ```text
//! cargo test -p reservation-e2e --test reservation_flow -- --ignored
//! ```

use reservation_e2e::runner::StepStatus;
use reservation_e2e::{scenario, SuiteConfig, TestRunner};

#[tokio::test]
#[ignore = "requires the reservation app and Playwright"]
async fn new_reservation_flow() {
    let mut config = SuiteConfig::default();
    if let Ok(url) = std::env::var("RESERVATION_E2E_BASE_URL") {
        config.target.base_url = url;
    }

    let mut runner = TestRunner::with_config(config);
    let report = runner
        .run_spec(&scenario::reservation_flow())
        .await
        .expect("runner error");

    assert!(report.success, "scenario failed: {:?}", report.failure);
    assert!(report.steps.iter().all(|s| s.status == StepStatus::Passed));

    let slot = &report.captured[scenario::SLOT_VAR];
    assert!(!slot.trim().is_empty());

    assert_eq!(report.artifacts.len(), 1);
    let shot = &report.artifacts[0];
    assert!(shot.path.ends_with(scenario::SCREENSHOT_PATH));
    assert_eq!(shot.width, 1280);
}
