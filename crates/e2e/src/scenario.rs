//! Built-in reservation flow: landing page, reservation form, confirmation
//! page, success toast.

use std::path::PathBuf;

use crate::spec::{Locator, TestSpec, TestStep, Viewport};

pub const NAME: &str = "reservation-flow";

pub const LANDING_PATH: &str = "/u/accueil";
pub const LANDING_HEADING: &str = "Découvrez une Expérience Culinaire Inoubliable";
pub const LANDING_CTA: &str =
    r#"//div[contains(@class, "relative z-10")]//a[text()="Réserver"]"#;

pub const RESERVE_URL: &str = "/u/reserver";
pub const RESERVE_HEADING: &str = "Réserver une table";
pub const AVAILABLE_SLOT: &str = r#"button[type="button"]:not([disabled])"#;
pub const SLOT_TIMEOUT_MS: u64 = 15000;
pub const RESERVE_BUTTON: &str = "Réserver";

pub const CONFIRM_URL: &str = "/u/confirmation";
pub const CONFIRM_HEADING: &str = "Confirm your reservation";
pub const DEFAULT_GUESTS: &str = "2";
pub const CONFIRM_BUTTON: &str = "Confirm Reservation";

pub const SUCCESS_TOAST: &str = "Réservation confirmée avec succès !";
pub const TOAST_TIMEOUT_MS: u64 = 10000;

pub const SCREENSHOT_PATH: &str = "screenshots/reservation-confirmed.png";

/// Variable holding the picked time slot
pub const SLOT_VAR: &str = "slot_time";

pub fn reservation_flow() -> TestSpec {
    let slot = Locator::css(AVAILABLE_SLOT).first();

    TestSpec {
        name: NAME.to_string(),
        description: "New reservation from the landing page to the confirmation toast".to_string(),
        tags: vec!["reservation".to_string(), "smoke".to_string()],
        viewport: Viewport { width: 1280, height: 720 },
        steps: vec![
            TestStep::Navigate {
                path: LANDING_PATH.to_string(),
            },
            TestStep::ExpectVisible {
                locator: Locator::role("heading", LANDING_HEADING),
                timeout_ms: None,
            },
            TestStep::Click {
                locator: Locator::xpath(LANDING_CTA),
                timeout_ms: None,
            },
            TestStep::ExpectUrl {
                pattern: RESERVE_URL.to_string(),
                timeout_ms: None,
            },
            TestStep::ExpectVisible {
                locator: Locator::role("heading", RESERVE_HEADING),
                timeout_ms: None,
            },
            // Slots come from a backend query and can be slow
            TestStep::ExpectVisible {
                locator: slot.clone(),
                timeout_ms: Some(SLOT_TIMEOUT_MS),
            },
            TestStep::CaptureText {
                locator: slot.clone(),
                into: SLOT_VAR.to_string(),
            },
            TestStep::Click {
                locator: slot,
                timeout_ms: None,
            },
            TestStep::Click {
                locator: Locator::role("button", RESERVE_BUTTON),
                timeout_ms: None,
            },
            TestStep::ExpectUrl {
                pattern: CONFIRM_URL.to_string(),
                timeout_ms: None,
            },
            TestStep::ExpectVisible {
                locator: Locator::role("heading", CONFIRM_HEADING),
                timeout_ms: None,
            },
            TestStep::ExpectText {
                locator: Locator::label_value("Guests"),
                text: DEFAULT_GUESTS.to_string(),
                timeout_ms: None,
            },
            TestStep::ExpectText {
                locator: Locator::label_value("Time"),
                text: format!("${{{}}}", SLOT_VAR),
                timeout_ms: None,
            },
            TestStep::Click {
                locator: Locator::role("button", CONFIRM_BUTTON),
                timeout_ms: None,
            },
            TestStep::ExpectVisible {
                locator: Locator::text(SUCCESS_TOAST),
                timeout_ms: Some(TOAST_TIMEOUT_MS),
            },
            TestStep::Screenshot {
                path: PathBuf::from(SCREENSHOT_PATH),
                full_page: true,
            },
        ],
    }
}
