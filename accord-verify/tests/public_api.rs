mod common;

use std::collections::BTreeMap;

use accord_verify::{analyze, write_check_report, CheckerConfig};

#[test]
fn repeated_runs_report_identical_warnings() {
    let unit = common::increment_overflow_unit();
    let run = || analyze(&unit, None, &CheckerConfig::default(), BTreeMap::new());
    assert_eq!(run(), run());
}

#[cfg(not(feature = "z3"))]
#[test]
fn without_a_solver_findings_are_softened_to_might_happen() {
    let unit = common::increment_overflow_unit();
    let warnings = analyze(&unit, None, &CheckerConfig::default(), BTreeMap::new());
    assert!(warnings
        .iter()
        .any(|w| w.message == "Overflow (resulting value larger than 2**256 - 1) might happen here."));
    assert!(warnings.iter().all(|w| !w.message.contains("happens here")));
}

#[cfg(not(feature = "z3"))]
#[test]
fn replay_responses_are_honored_without_a_live_solver() {
    let unit = common::increment_overflow_unit();
    let mut responses = BTreeMap::new();
    responses.insert("not-a-real-digest".to_string(), "unsat".to_string());
    let warnings = analyze(&unit, None, &CheckerConfig::default(), responses);
    assert!(warnings.iter().all(|w| !w.message.contains("will be ignored")));
}

#[test]
fn check_reports_round_trip_to_json() {
    let unit = common::increment_overflow_unit();
    let warnings = analyze(&unit, None, &CheckerConfig::default(), BTreeMap::new());
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("artifacts/check.json");
    write_check_report(&path, &warnings).expect("report written");
    let text = std::fs::read_to_string(&path).expect("report readable");
    assert!(text.contains("accord.check.v1"));
    let parsed: serde_json::Value = serde_json::from_str(&text).expect("valid json");
    assert_eq!(
        parsed["warnings"].as_array().map(|a| a.len()),
        Some(warnings.len())
    );
}
