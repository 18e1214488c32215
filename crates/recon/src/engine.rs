use log::{debug, info};
use polecheck_core::{KmzFiberData, Pole, PROPOSED, REMEDY};
use serde_json::Value;

use crate::config::{QcConfig, SpanConfig};
use crate::diff::{compare_layers, DesignSide};
use crate::error::QcError;
use crate::fiber_compare::process_fiber_comparison_data;
use crate::kmz::kmz_from_feature_collection;
use crate::model::{DesignComparisonResults, PoleQcResult, QcMeta, QcReport};
use crate::overlay::EditOverlay;
use crate::parse::{extract_pole_data, extract_project_info, validate_pole_data};
use crate::qc::{run_rules, RuleContext};
use crate::summary::compute_summary;

/// Pre-loaded documents for one run. File reading happens elsewhere.
#[derive(Debug, Clone, Default)]
pub struct QcInput {
    /// Pole/design JSON.
    pub document: Value,
    /// Separate export holding the remedy design, when it is not a layer of `document`.
    pub remedy_document: Option<Value>,
    pub kmz: Option<Vec<KmzFiberData>>,
    pub overlay: Option<EditOverlay>,
}

/// Parse one top-level JSON document. This is the only catastrophic input error.
pub fn parse_input(text: &str, source_name: &str) -> Result<Value, QcError> {
    serde_json::from_str(text).map_err(|e| QcError::InputParse {
        source_name: source_name.to_string(),
        message: e.to_string(),
    })
}

/// Parse a GeoJSON-like fiber map.
pub fn parse_kmz(text: &str, source_name: &str) -> Result<Vec<KmzFiberData>, QcError> {
    parse_input(text, source_name).map(|json| kmz_from_feature_collection(&json))
}

/// Parse, validate and patch poles for one document.
pub fn load_poles(document: &Value, overlay: Option<&EditOverlay>, config: &QcConfig) -> Vec<Pole> {
    let mut poles = extract_pole_data(document);
    let invalid = validate_pole_data(&mut poles);
    if invalid > 0 {
        debug!("{invalid} attachments without an assembly unit");
    }
    match overlay {
        Some(overlay) if !overlay.is_empty() => overlay.apply_to_poles(&poles, config),
        _ => poles,
    }
}

/// PROPOSED of `proposed` against REMEDY of `remedy`, or of the same poles
/// when there is no separate remedy export.
pub fn compare_documents(proposed: &[Pole], remedy: Option<&[Pole]>, config: &SpanConfig) -> DesignComparisonResults {
    let remedy_side = match remedy {
        // A standalone remedy export may only carry its design as PROPOSED.
        Some(other) if !other.iter().any(|p| p.layer(REMEDY).is_some()) => DesignSide::new(other, PROPOSED),
        Some(other) => DesignSide::new(other, REMEDY),
        None => DesignSide::new(proposed, REMEDY),
    };
    compare_layers(DesignSide::new(proposed, PROPOSED), remedy_side, config)
}

/// Run the whole pipeline: parse, compare designs, reconcile fiber, QC every pole.
pub fn run(config: &QcConfig, input: &QcInput) -> Result<QcReport, QcError> {
    config.validate()?;

    let poles = load_poles(&input.document, input.overlay.as_ref(), config);
    let project = extract_project_info(&input.document);
    let kmz = input.kmz.as_deref();

    let remedy_poles = input
        .remedy_document
        .as_ref()
        .map(|doc| load_poles(doc, input.overlay.as_ref(), config));
    let design_comparison = compare_documents(&poles, remedy_poles.as_deref(), &config.span);

    let fiber_comparison = process_fiber_comparison_data(&poles, kmz, config);

    let results: Vec<PoleQcResult> = poles
        .iter()
        .map(|pole| {
            let ctx = RuleContext::new(pole, config)
                .with_project(Some(&project))
                .with_kmz(kmz)
                .with_neighbors(&poles);
            PoleQcResult {
                structure_id: pole.structure_id.clone(),
                results: run_rules(&ctx),
            }
        })
        .collect();

    let summary = compute_summary(&results, &fiber_comparison, !poles.is_empty());
    info!(
        "checked {} poles: {} pass, {} fail, {} warning",
        summary.poles, summary.pass, summary.fail, summary.warning
    );

    Ok(QcReport {
        meta: QcMeta {
            config_name: config.name.clone(),
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            run_at: chrono::Utc::now().to_rfc3339(),
        },
        summary,
        poles: results,
        design_comparison,
        fiber_comparison,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unrecognized_input_is_an_empty_report() {
        let input = QcInput { document: json!({"hello": "world"}), ..Default::default() };
        let report = run(&QcConfig::default(), &input).unwrap();
        assert!(!report.summary.recognized);
        assert_eq!(report.summary.poles, 0);
        assert!(report.design_comparison.span_results.is_empty());
    }

    #[test]
    fn invalid_config_is_rejected() {
        let mut config = QcConfig::default();
        config.kmz.pole_far_threshold = 1.0;
        let err = run(&config, &QcInput::default()).unwrap_err();
        assert!(matches!(err, QcError::ConfigValidation(_)));
    }

    #[test]
    fn top_level_json_errors_name_the_source() {
        let err = parse_input("{ not json", "poles.json").unwrap_err();
        assert!(err.to_string().starts_with("poles.json: not valid JSON"));
    }

    #[test]
    fn meta_carries_config_name() {
        let config = QcConfig { name: "district-7".into(), ..QcConfig::default() };
        let input = QcInput {
            document: json!({"poles": [{"structureId": "PL-1"}]}),
            ..Default::default()
        };
        let report = run(&config, &input).unwrap();
        assert_eq!(report.meta.config_name, "district-7");
        assert_eq!(report.poles.len(), 1);
        assert!(report.summary.recognized);
    }
}
