//! Loading scenario files from disk

use std::path::{Path, PathBuf};

use reservation_e2e::spec::TestStep;
use reservation_e2e::{scenario, E2eError, TestSpec};

fn bundled_specs() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("specs")
}

#[test]
fn bundled_specs_are_valid() {
    let specs = TestSpec::load_all(&bundled_specs()).unwrap();
    assert!(!specs.is_empty());
    for spec in &specs {
        spec.validate().unwrap();
    }
}

#[test]
fn bundled_smoke_tag_selects_reservation_flow() {
    let specs = TestSpec::load_all(&bundled_specs()).unwrap();
    let smoke = TestSpec::filter_by_tag(&specs, "smoke");
    assert_eq!(smoke.len(), 1);
    assert_eq!(smoke[0].name, scenario::NAME);
    assert!(TestSpec::filter_by_tag(&specs, "privatisation").is_empty());
}

#[test]
fn load_all_skips_other_files_and_sorts() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("b.yml"),
        "name: second\nsteps:\n  - action: navigate\n    path: /u/reserver\n",
    )
    .unwrap();
    std::fs::write(
        dir.path().join("a.yaml"),
        "name: first\nsteps:\n  - action: navigate\n    path: /u/accueil\n",
    )
    .unwrap();
    std::fs::write(dir.path().join("notes.txt"), "not a scenario").unwrap();

    let specs = TestSpec::load_all(dir.path()).unwrap();
    let names: Vec<_> = specs.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["first", "second"]);
    assert_eq!(
        specs[0].steps[0],
        TestStep::Navigate {
            path: "/u/accueil".to_string()
        }
    );
}

#[test]
fn broken_file_names_its_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.yaml");
    std::fs::write(&path, "name: broken\nsteps:\n  - action: teleport\n").unwrap();

    match TestSpec::load_all(dir.path()) {
        Err(E2eError::SpecParse(msg)) => assert!(msg.contains("broken.yaml"), "{}", msg),
        other => panic!("unexpected result: {:?}", other.map(|s| s.len())),
    }
}
