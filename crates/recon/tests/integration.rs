use std::path::PathBuf;

use polecheck_recon::engine::{parse_input, parse_kmz, run, QcInput};
use polecheck_recon::model::{FiberMatchStatus, QcReport, SpanStatus, WireChangeType};
use polecheck_recon::overlay::EditOverlay;
use polecheck_recon::{QcConfig, QcRule, QcStatus};
use serde_json::Value;

fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn read_fixture(name: &str) -> String {
    let path = fixtures_dir().join(name);
    std::fs::read_to_string(&path).unwrap_or_else(|e| panic!("cannot read {}: {e}", path.display()))
}

fn load_json(name: &str) -> Value {
    parse_input(&read_fixture(name), name).unwrap()
}

fn load_and_run(document: &str, kmz: Option<&str>, overlay: Option<&str>) -> QcReport {
    let input = QcInput {
        document: load_json(document),
        remedy_document: None,
        kmz: kmz.map(|name| parse_kmz(&read_fixture(name), name).unwrap()),
        overlay: overlay.map(|name| EditOverlay::from_json(&read_fixture(name)).unwrap()),
    };
    run(&QcConfig::default(), &input).unwrap()
}

fn check(report: &QcReport, pole: &str, rule: QcRule) -> QcStatus {
    let pole = report
        .poles
        .iter()
        .find(|p| p.structure_id == pole)
        .unwrap_or_else(|| panic!("no pole {pole}"));
    pole.results.get(rule).map(|r| r.status).unwrap()
}

// -------------------------------------------------------------------------
// Full pipeline over a SPIDAcalc-style project
// -------------------------------------------------------------------------

#[test]
fn project_poles_and_layers() {
    let report = load_and_run("project.json", Some("fiber-map.json"), None);

    assert!(report.summary.recognized);
    assert_eq!(report.summary.poles, 2);
    let ids: Vec<&str> = report.poles.iter().map(|p| p.structure_id.as_str()).collect();
    assert_eq!(ids, vec!["PL-1", "PL-2"]);
    assert_eq!(
        report.summary.pass + report.summary.fail + report.summary.warning + report.summary.not_checked,
        2
    );
    for pole in &report.poles {
        assert_eq!(pole.results.checks.len(), QcRule::ALL.len());
    }
}

#[test]
fn project_span_diff() {
    let report = load_and_run("project.json", None, None);
    let comparison = &report.design_comparison;

    assert_eq!(comparison.span_results.len(), 1);
    let span = &comparison.span_results[0];
    assert_eq!(span.span_status, SpanStatus::Matched);
    assert_eq!((span.pole_a_id.as_str(), span.pole_b_id.as_str()), ("PL-1", "PL-2"));

    // Fiber raised from 9.0 to 9.5 at PL-1.
    assert_eq!(span.changes_at_pole_a.len(), 1);
    assert_eq!(span.changes_at_pole_a[0].change_type, WireChangeType::Modified);
    assert_eq!(span.changes_at_pole_a[0].wire.id, "fbr-1");

    // Neutral added on the remedy side at PL-2.
    assert_eq!(span.changes_at_pole_b.len(), 1);
    assert_eq!(span.changes_at_pole_b[0].change_type, WireChangeType::Added);
    assert_eq!(span.changes_at_pole_b[0].wire.id, "neu-2");

    assert_eq!(comparison.summary.spans_matched, 1);
    assert_eq!(comparison.summary.wires_modified, 1);
    assert_eq!(comparison.summary.wires_added, 1);
    assert_eq!(comparison.summary.wires_removed, 0);
}

#[test]
fn project_fiber_reconciliation_matches_map() {
    let report = load_and_run("project.json", Some("fiber-map.json"), None);

    assert_eq!(report.fiber_comparison.len(), 1);
    let row = &report.fiber_comparison[0];
    assert_eq!(row.span_id, "PL-1|PL-2");
    assert_eq!(row.proposed_fiber_count, 48);
    assert_eq!(row.remedy_fiber_count, 48);
    assert_eq!(row.kmz_fiber_count, Some(48));
    assert_eq!(row.status, FiberMatchStatus::Match);
    assert_eq!(report.summary.fiber_status_counts["MATCH"], 1);

    assert_eq!(check(&report, "PL-1", QcRule::FiberSizeCheck), QcStatus::Pass);
    assert_eq!(check(&report, "PL-2", QcRule::FiberSizeCheck), QcStatus::Pass);
}

#[test]
fn project_without_fiber_map() {
    let report = load_and_run("project.json", None, None);
    assert_eq!(report.fiber_comparison[0].status, FiberMatchStatus::NoKmzDataLoaded);
    assert_eq!(check(&report, "PL-1", QcRule::FiberSizeCheck), QcStatus::Warning);
}

#[test]
fn project_metadata_rules() {
    let report = load_and_run("project.json", None, None);
    for id in ["PL-1", "PL-2"] {
        assert_eq!(check(&report, id, QcRule::StationNameCheck), QcStatus::Pass);
        assert_eq!(check(&report, id, QcRule::LoadCaseCheck), QcStatus::Pass);
        assert_eq!(check(&report, id, QcRule::ProjectSettingsCheck), QcStatus::Pass);
        assert_eq!(check(&report, id, QcRule::WireEndPointOrderCheck), QcStatus::Pass);
    }
}

#[test]
fn overlay_fiber_edit_changes_reconciliation() {
    let report = load_and_run("project.json", Some("fiber-map.json"), Some("overlay.json"));
    let row = &report.fiber_comparison[0];
    assert_eq!(row.proposed_fiber_count, 96);
    assert_eq!(row.status, FiberMatchStatus::Mismatch);
    assert_eq!(check(&report, "PL-1", QcRule::FiberSizeCheck), QcStatus::Fail);
}

#[test]
fn overlay_leaves_input_document_untouched() {
    let original = load_json("project.json");
    let input = QcInput {
        document: original.clone(),
        overlay: Some(EditOverlay::from_json(&read_fixture("overlay.json")).unwrap()),
        ..Default::default()
    };
    run(&QcConfig::default(), &input).unwrap();
    assert_eq!(input.document, original);
}

#[test]
fn export_writes_fiber_and_environment_edits() {
    let original = load_json("project.json");
    let overlay = EditOverlay::from_json(&read_fixture("overlay.json")).unwrap();
    let config = QcConfig::default();
    let poles = polecheck_recon::extract_pole_data(&original);

    let exported = overlay.export_corrected_json(&original, &poles, &config);
    let text = exported.to_string();
    assert!(text.contains("Gigapower 96ct"));
    assert!(text.contains("RESIDENTIAL"));
    assert!(!original.to_string().contains("Gigapower 96ct"));
}

// -------------------------------------------------------------------------
// Other input shapes
// -------------------------------------------------------------------------

#[test]
fn flat_poles_station_names() {
    let report = load_and_run("flat-poles.json", None, None);
    assert_eq!(report.summary.poles, 2);
    assert_eq!(check(&report, "PL-10", QcRule::StationNameCheck), QcStatus::Pass);
    assert_eq!(check(&report, "pl-11", QcRule::StationNameCheck), QcStatus::Fail);
    assert_eq!(report.summary.fail, 1);
    assert!(report.design_comparison.span_results.is_empty());
}

#[test]
fn unrecognized_document_is_not_an_error() {
    let report = load_and_run("unrecognized.json", None, None);
    assert!(!report.summary.recognized);
    assert!(report.poles.is_empty());
    assert!(report.fiber_comparison.is_empty());
}

#[test]
fn separate_remedy_export_is_compared() {
    let project = load_json("project.json");
    let input = QcInput {
        document: project.clone(),
        remedy_document: Some(project),
        ..Default::default()
    };
    let report = run(&QcConfig::default(), &input).unwrap();
    // Remedy layer of the second export against PROPOSED of the first.
    assert_eq!(report.design_comparison.summary.spans_matched, 1);
    assert_eq!(report.design_comparison.summary.wires_modified, 1);
}

#[test]
fn fiber_map_features() {
    let kmz = parse_kmz(&read_fixture("fiber-map.json"), "fiber-map.json").unwrap();
    assert_eq!(kmz.len(), 2);
    assert_eq!(kmz[0].fiber_size, "48");
    assert_eq!(kmz[0].c_sro.as_deref(), Some("PSA_317"));
    assert_eq!(kmz[1].fiber_count, 96);
    // LineString takes its first vertex.
    assert_eq!(kmz[1].coordinates.map(|c| c.longitude), Some(-106.70));
}

#[test]
fn malformed_top_level_json_is_an_error() {
    let err = parse_input("{\"leads\": [", "broken.json").unwrap_err();
    assert!(err.to_string().contains("broken.json"));
}
