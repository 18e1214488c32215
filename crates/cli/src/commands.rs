//! `polecheck check|spans|fiber|export`: read files, run the engine, report.

use std::path::{Path, PathBuf};

use polecheck_core::{KmzFiberData, Pole};
use polecheck_recon::engine::{compare_documents, load_poles, parse_input, parse_kmz, run, QcInput};
use polecheck_recon::model::{FiberMatchStatus, QcReport, SpanStatus};
use polecheck_recon::overlay::EditOverlay;
use polecheck_recon::{
    extract_pole_data, match_kmz_to_poles, process_fiber_comparison_data, QcStatus, EXPORT_FILE_NAME,
};
use serde::Serialize;
use serde_json::Value;

use crate::exit_codes::{EXIT_DIFFS, EXIT_QC_FAILED, EXIT_UNRECOGNIZED};
use crate::{load_config, read_text, source_name, write_text, CliError};

fn load_document(path: &Path) -> Result<Value, CliError> {
    let text = read_text(path)?;
    Ok(parse_input(&text, &source_name(path))?)
}

fn load_kmz(path: Option<&Path>) -> Result<Option<Vec<KmzFiberData>>, CliError> {
    let Some(path) = path else {
        return Ok(None);
    };
    let text = read_text(path)?;
    let kmz = parse_kmz(&text, &source_name(path))?;
    if kmz.is_empty() {
        log::warn!("{}: no usable fiber map features", path.display());
    }
    Ok(Some(kmz))
}

fn load_overlay(path: Option<&Path>) -> Result<Option<EditOverlay>, CliError> {
    match path {
        Some(path) => Ok(Some(EditOverlay::from_json(&read_text(path)?)?)),
        None => Ok(None),
    }
}

fn unrecognized(path: &Path) -> CliError {
    CliError::new(EXIT_UNRECOGNIZED, format!("{}: no recognizable pole structure", path.display()))
        .with_hint("expected leads[].locations[], locations[], poles[] or clientData.poles[]")
}

/// Poles of a document, or exit 6 when none of the shapes matched.
fn require_poles(path: &Path, document: &Value) -> Result<Vec<Pole>, CliError> {
    let poles = extract_pole_data(document);
    if poles.is_empty() {
        return Err(unrecognized(path));
    }
    Ok(poles)
}

fn to_json<T: Serialize>(value: &T) -> Result<String, CliError> {
    serde_json::to_string_pretty(value).map_err(|e| CliError::io(format!("JSON serialization error: {e}")))
}

// ---------------------------------------------------------------------------
// check
// ---------------------------------------------------------------------------

pub fn cmd_check(
    input: PathBuf,
    kmz: Option<PathBuf>,
    remedy: Option<PathBuf>,
    overlay: Option<PathBuf>,
    config: Option<PathBuf>,
    json_output: bool,
    output_file: Option<PathBuf>,
) -> Result<(), CliError> {
    let config = load_config(config.as_deref())?;
    let qc_input = QcInput {
        document: load_document(&input)?,
        remedy_document: remedy.as_deref().map(load_document).transpose()?,
        kmz: load_kmz(kmz.as_deref())?,
        overlay: load_overlay(overlay.as_deref())?,
    };

    let report = run(&config, &qc_input)?;
    if !report.summary.recognized {
        return Err(unrecognized(&input));
    }

    let json_str = to_json(&report)?;
    if let Some(ref path) = output_file {
        write_text(path, &json_str)?;
        eprintln!("wrote {}", path.display());
    }
    if json_output {
        println!("{json_str}");
    }

    print_check_summary(&report);

    if report.summary.fail > 0 {
        return Err(CliError::new(EXIT_QC_FAILED, format!("{} pole(s) failed QC", report.summary.fail)));
    }
    Ok(())
}

fn print_check_summary(report: &QcReport) {
    for pole in &report.poles {
        let results = &pole.results;
        eprintln!(
            "{:<16} {:<11} {} pass, {} fail, {} warning",
            pole.structure_id, results.overall_status, results.pass_count, results.fail_count, results.warning_count,
        );
        for (rule, check) in &results.checks {
            if check.status == QcStatus::Fail {
                eprintln!("    {}: {}", rule.label(), check.message);
            }
        }
    }
    let s = &report.summary;
    eprintln!(
        "qc '{}': {} poles: {} pass, {} fail, {} warning, {} not checked",
        report.meta.config_name, s.poles, s.pass, s.fail, s.warning, s.not_checked,
    );
    if !s.fiber_status_counts.is_empty() {
        let counts: Vec<String> = s.fiber_status_counts.iter().map(|(k, v)| format!("{v} {k}")).collect();
        eprintln!("fiber spans: {}", counts.join(", "));
    }
}

// ---------------------------------------------------------------------------
// spans
// ---------------------------------------------------------------------------

pub fn cmd_spans(
    input: PathBuf,
    remedy: Option<PathBuf>,
    config: Option<PathBuf>,
    json_output: bool,
    strict: bool,
) -> Result<(), CliError> {
    let config = load_config(config.as_deref())?;
    let proposed = require_poles(&input, &load_document(&input)?)?;
    let remedy_poles = match remedy {
        Some(ref path) => Some(require_poles(path, &load_document(path)?)?),
        None => None,
    };

    let results = compare_documents(&proposed, remedy_poles.as_deref(), &config.span);

    if json_output {
        println!("{}", to_json(&results)?);
    }

    for span in &results.span_results {
        let status = match span.span_status {
            SpanStatus::Matched => "matched",
            SpanStatus::AddedInRemedy => "added",
            SpanStatus::RemovedInRemedy => "removed",
        };
        eprintln!("{:<8} {} - {}", status, span.pole_a_id, span.pole_b_id);
        for change in span.changes() {
            eprintln!(
                "    {:?} {} @ {} {}",
                change.change_type,
                change.wire.key(),
                change.pole_id,
                change.change_details.join("; "),
            );
        }
    }
    let s = &results.summary;
    eprintln!(
        "spans: {} matched, {} added, {} removed; wires: {} added, {} removed, {} modified",
        s.spans_matched, s.spans_added, s.spans_removed, s.wires_added, s.wires_removed, s.wires_modified,
    );

    let differs = s.spans_added + s.spans_removed + s.wires_added + s.wires_removed + s.wires_modified > 0;
    if strict && differs {
        return Err(CliError::new(EXIT_DIFFS, "designs differ"));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// fiber
// ---------------------------------------------------------------------------

pub fn cmd_fiber(
    input: PathBuf,
    kmz: Option<PathBuf>,
    by_pole: bool,
    config: Option<PathBuf>,
    json_output: bool,
    strict: bool,
) -> Result<(), CliError> {
    if by_pole && kmz.is_none() {
        return Err(CliError::args("--by-pole needs a fiber map (--kmz)"));
    }
    let config = load_config(config.as_deref())?;
    let poles = require_poles(&input, &load_document(&input)?)?;
    let kmz = load_kmz(kmz.as_deref())?;

    if by_pole {
        let entries = kmz.unwrap_or_default();
        let matches = match_kmz_to_poles(&entries, &poles, &config.kmz);
        if json_output {
            println!("{}", to_json(&matches)?);
        }
        for m in &matches {
            eprintln!("{:<16} {:<10} {:>6} ({:?}, {:.0})", m.pole_id, m.fiber_size, m.fiber_count, m.kind, m.distance);
        }
        eprintln!("matched {} of {} fiber map samples to poles", matches.len(), entries.len());
        return Ok(());
    }

    let rows = process_fiber_comparison_data(&poles, kmz.as_deref(), &config);
    if json_output {
        println!("{}", to_json(&rows)?);
    }

    let mut differences = 0;
    for row in &rows {
        eprintln!(
            "{:<24} P {:>4} R {:>4} KMZ {:>4}  {}",
            row.span_id,
            row.proposed_fiber_count,
            row.remedy_fiber_count,
            row.kmz_fiber_count.map(|c| c.to_string()).unwrap_or_else(|| "-".into()),
            row.status,
        );
        if matches!(
            row.status,
            FiberMatchStatus::Mismatch | FiberMatchStatus::JsonOnly | FiberMatchStatus::KmzOnly
        ) {
            differences += 1;
        }
    }
    eprintln!("{} spans, {} disagree with the fiber map", rows.len(), differences);

    if strict && differences > 0 {
        return Err(CliError::new(EXIT_DIFFS, format!("{differences} span(s) disagree with the fiber map")));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// export
// ---------------------------------------------------------------------------

pub fn cmd_export(
    input: PathBuf,
    overlay: PathBuf,
    output: Option<PathBuf>,
    config: Option<PathBuf>,
) -> Result<(), CliError> {
    let config = load_config(config.as_deref())?;
    let document = load_document(&input)?;
    let overlay = EditOverlay::from_json(&read_text(&overlay)?)?;

    // Edits are addressed against the parsed, unedited model.
    let poles = load_poles(&document, None, &config);
    if poles.is_empty() {
        return Err(unrecognized(&input));
    }

    let corrected = overlay.export_corrected_json(&document, &poles, &config);
    let path = output.unwrap_or_else(|| PathBuf::from(EXPORT_FILE_NAME));
    write_text(&path, &to_json(&corrected)?)?;
    eprintln!(
        "wrote {} ({} environment edit(s), {} fiber size edit(s))",
        path.display(),
        overlay.environments.len(),
        overlay.fiber_sizes.len(),
    );
    Ok(())
}
