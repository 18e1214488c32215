//! Wire inventory diff for each span across the PROPOSED and REMEDY layers.

use std::collections::HashMap;

use log::debug;
use polecheck_core::{Measure, Pole, PoleWire, PROPOSED, REMEDY};

use crate::config::SpanConfig;
use crate::model::{
    DesignComparisonResults, DesignComparisonSummary, IdentifiedSpan, SpanComparisonResult,
    SpanStatus, WireChange, WireChangeType,
};
use crate::spans::{identify_spans_in_layer, match_spans_between_layers};

/// One side of a comparison: the poles to read and the layer to read from them.
#[derive(Debug, Clone, Copy)]
pub struct DesignSide<'a> {
    pub poles: &'a [Pole],
    pub layer: &'a str,
}

impl<'a> DesignSide<'a> {
    pub fn new(poles: &'a [Pole], layer: &'a str) -> Self {
        Self { poles, layer }
    }

    fn pole(&self, id: &str) -> Option<&'a Pole> {
        self.poles.iter().find(|p| p.structure_id == id)
    }

    /// Wires hanging on one WEP of one pole. Dangling references resolve to nothing.
    fn wires_at(&self, pole_id: &str, wep_id: &str) -> Vec<&'a PoleWire> {
        let Some(layer) = self.pole(pole_id).and_then(|p| p.layer(self.layer)) else {
            return Vec::new();
        };
        layer
            .wire_end_point(wep_id)
            .map(|wep| layer.wires_for_end_point(wep))
            .unwrap_or_default()
    }
}

/// Compare PROPOSED against REMEDY. A single input file passes the same poles
/// for both sides.
pub fn compare_designs(proposed: &[Pole], remedy: &[Pole], config: &SpanConfig) -> DesignComparisonResults {
    compare_layers(
        DesignSide::new(proposed, PROPOSED),
        DesignSide::new(remedy, REMEDY),
        config,
    )
}

pub fn compare_layers(
    proposed: DesignSide<'_>,
    remedy: DesignSide<'_>,
    config: &SpanConfig,
) -> DesignComparisonResults {
    let proposed_spans = identify_spans_in_layer(proposed.poles, proposed.layer, config);
    let remedy_spans = identify_spans_in_layer(remedy.poles, remedy.layer, config);

    let mut span_results = match_spans_between_layers(&proposed_spans, &remedy_spans);
    for result in span_results.iter_mut() {
        let (at_a, at_b) = compare_wires_for_span(result, proposed, remedy, config);
        result.changes_at_pole_a = at_a;
        result.changes_at_pole_b = at_b;
    }

    let summary = summarize(&span_results);
    debug!(
        "design comparison: {} matched, {} added, {} removed spans",
        summary.spans_matched, summary.spans_added, summary.spans_removed
    );
    DesignComparisonResults { span_results, summary }
}

/// Wire changes at pole A and pole B of one span.
pub fn compare_wires_for_span(
    span: &SpanComparisonResult,
    proposed: DesignSide<'_>,
    remedy: DesignSide<'_>,
    config: &SpanConfig,
) -> (Vec<WireChange>, Vec<WireChange>) {
    let endpoints = |s: &IdentifiedSpan| {
        [
            (s.pole_a_id.clone(), s.pole_a_wep_id.clone()),
            (s.pole_b_id.clone(), s.pole_b_wep_id.clone()),
        ]
    };

    match span.span_status {
        SpanStatus::Matched => {
            let (Some(p), Some(r)) = (&span.proposed_span, &span.remedy_span) else {
                return (Vec::new(), Vec::new());
            };
            let [(pa, pwa), (pb, pwb)] = endpoints(p);
            let [(_, rwa), (_, rwb)] = endpoints(r);
            (
                diff_endpoint(&pa, proposed.wires_at(&pa, &pwa), &pwa, remedy.wires_at(&pa, &rwa), &rwa, config),
                diff_endpoint(&pb, proposed.wires_at(&pb, &pwb), &pwb, remedy.wires_at(&pb, &rwb), &rwb, config),
            )
        }
        SpanStatus::RemovedInRemedy => {
            let Some(p) = &span.proposed_span else {
                return (Vec::new(), Vec::new());
            };
            let [(pa, wa), (pb, wb)] = endpoints(p);
            (
                synthesize(WireChangeType::Removed, &pa, &wa, proposed.wires_at(&pa, &wa)),
                synthesize(WireChangeType::Removed, &pb, &wb, proposed.wires_at(&pb, &wb)),
            )
        }
        SpanStatus::AddedInRemedy => {
            let Some(r) = &span.remedy_span else {
                return (Vec::new(), Vec::new());
            };
            let [(pa, wa), (pb, wb)] = endpoints(r);
            (
                synthesize(WireChangeType::Added, &pa, &wa, remedy.wires_at(&pa, &wa)),
                synthesize(WireChangeType::Added, &pb, &wb, remedy.wires_at(&pb, &wb)),
            )
        }
    }
}

fn synthesize(kind: WireChangeType, pole_id: &str, wep_id: &str, wires: Vec<&PoleWire>) -> Vec<WireChange> {
    wires
        .into_iter()
        .map(|wire| WireChange {
            change_type: kind,
            pole_id: pole_id.to_string(),
            wire_end_point_id: wep_id.to_string(),
            wire: wire.clone(),
            previous_wire: None,
            change_details: Vec::new(),
        })
        .collect()
}

fn diff_endpoint(
    pole_id: &str,
    before: Vec<&PoleWire>,
    before_wep: &str,
    after: Vec<&PoleWire>,
    after_wep: &str,
    config: &SpanConfig,
) -> Vec<WireChange> {
    let after_by_key: HashMap<&str, &PoleWire> = after.iter().map(|w| (w.key(), *w)).collect();
    let before_keys: HashMap<&str, &PoleWire> = before.iter().map(|w| (w.key(), *w)).collect();
    let mut changes = Vec::new();

    for wire in &before {
        match after_by_key.get(wire.key()) {
            None => changes.extend(synthesize(WireChangeType::Removed, pole_id, before_wep, vec![*wire])),
            Some(now) => {
                if let Some(detail) = height_change(wire.attachment_height.as_ref(), now.attachment_height.as_ref(), config) {
                    changes.push(WireChange {
                        change_type: WireChangeType::Modified,
                        pole_id: pole_id.to_string(),
                        wire_end_point_id: after_wep.to_string(),
                        wire: (*now).clone(),
                        previous_wire: Some((*wire).clone()),
                        change_details: vec![detail],
                    });
                }
            }
        }
    }

    for wire in &after {
        if !before_keys.contains_key(wire.key()) {
            changes.extend(synthesize(WireChangeType::Added, pole_id, after_wep, vec![*wire]));
        }
    }
    changes
}

fn fmt_height(m: Option<&Measure>) -> String {
    match m {
        Some(m) if m.unit.is_empty() => format!("{:.2}", m.value),
        Some(m) => format!("{:.2} {}", m.value, m.unit),
        None => "none".into(),
    }
}

/// Detail string when the attachment height moved beyond tolerance.
/// Unit changes and appearing/disappearing heights always count.
fn height_change(before: Option<&Measure>, after: Option<&Measure>, config: &SpanConfig) -> Option<String> {
    let changed = match (before, after) {
        (Some(b), Some(a)) => !b.same_unit(a) || (b.value - a.value).abs() > config.wire_height_tolerance,
        (None, None) => false,
        _ => true,
    };
    changed.then(|| format!("attachmentHeight: {} -> {}", fmt_height(before), fmt_height(after)))
}

fn summarize(results: &[SpanComparisonResult]) -> DesignComparisonSummary {
    let mut summary = DesignComparisonSummary::default();
    for result in results {
        match result.span_status {
            SpanStatus::Matched => summary.spans_matched += 1,
            SpanStatus::AddedInRemedy => summary.spans_added += 1,
            SpanStatus::RemovedInRemedy => summary.spans_removed += 1,
        }
        for change in result.changes() {
            match change.change_type {
                WireChangeType::Added => summary.wires_added += 1,
                WireChangeType::Removed => summary.wires_removed += 1,
                WireChangeType::Modified => summary.wires_modified += 1,
            }
        }
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spans::tests::wep;
    use polecheck_core::model::ClientItem;
    use polecheck_core::PoleLayer;

    fn wire(id: &str, height: f64) -> PoleWire {
        PoleWire {
            id: id.into(),
            attachment_height: Some(Measure::new(height, "METRE")),
            ..Default::default()
        }
    }

    fn layer(wep_id: &str, direction: f64, wires: Vec<PoleWire>) -> PoleLayer {
        let mut end_point = wep(wep_id, direction, 50.0);
        end_point.wires = wires.iter().map(|w| w.id.clone()).collect();
        PoleLayer {
            wires,
            wire_end_points: vec![end_point],
            ..Default::default()
        }
    }

    fn two_poles(
        proposed_p1: Vec<PoleWire>,
        remedy_p1: Option<Vec<PoleWire>>,
    ) -> Vec<Pole> {
        let mut p1 = Pole::new("P1");
        let mut p2 = Pole::new("P2");
        p1.layers.insert(PROPOSED.into(), layer("w1", 90.0, proposed_p1));
        p2.layers.insert(PROPOSED.into(), layer("w2", 270.0, vec![wire("m", 7.0)]));
        if let Some(remedy) = remedy_p1 {
            p1.layers.insert(REMEDY.into(), layer("r1", 90.0, remedy));
            p2.layers.insert(REMEDY.into(), layer("r2", 270.0, vec![wire("m", 7.0)]));
        }
        vec![p1, p2]
    }

    #[test]
    fn removed_span_reports_every_proposed_wire() {
        let mut fiber = wire("f1", 6.5);
        fiber.client_item = ClientItem { size: "Gigapower 48ct".into(), item_type: String::new() };
        let poles = two_poles(vec![fiber], None);

        let results = compare_designs(&poles, &poles, &SpanConfig::default());
        assert_eq!(results.span_results.len(), 1);
        let span = &results.span_results[0];
        assert_eq!(span.span_status, SpanStatus::RemovedInRemedy);
        assert_eq!(span.changes_at_pole_a.len(), 1);
        let change = &span.changes_at_pole_a[0];
        assert_eq!(change.change_type, WireChangeType::Removed);
        assert_eq!(change.pole_id, "P1");
        assert_eq!(change.wire.client_item.size, "Gigapower 48ct");
        assert_eq!(results.summary.spans_removed, 1);
        assert_eq!(results.summary.wires_removed, 2);
    }

    #[test]
    fn matched_span_diffs_by_key_and_height() {
        let mut ext = wire("x", 5.0);
        ext.external_id = Some("EXT-1".into());
        let mut ext_moved = wire("y", 5.5);
        ext_moved.external_id = Some("EXT-1".into());

        let poles = two_poles(
            vec![wire("keep", 6.0), wire("gone", 6.2), ext, wire("tiny", 4.0)],
            Some(vec![wire("keep", 6.0), wire("new", 6.4), ext_moved, wire("tiny", 4.005)]),
        );
        let results = compare_designs(&poles, &poles, &SpanConfig::default());
        let span = &results.span_results[0];
        assert_eq!(span.span_status, SpanStatus::Matched);

        let changes: Vec<(WireChangeType, &str)> = span
            .changes_at_pole_a
            .iter()
            .map(|c| (c.change_type, c.wire.key()))
            .collect();
        assert_eq!(
            changes,
            vec![
                (WireChangeType::Removed, "gone"),
                (WireChangeType::Modified, "EXT-1"),
                (WireChangeType::Added, "new"),
            ]
        );
        let modified = &span.changes_at_pole_a[1];
        assert_eq!(modified.change_details, vec!["attachmentHeight: 5.00 METRE -> 5.50 METRE"]);
        assert_eq!(modified.previous_wire.as_ref().unwrap().id, "x");
        assert_eq!(modified.wire_end_point_id, "r1");
        assert!(span.changes_at_pole_b.is_empty());
    }

    #[test]
    fn added_span_reports_remedy_wires() {
        let mut p1 = Pole::new("P1");
        let mut p2 = Pole::new("P2");
        p1.layers.insert(REMEDY.into(), layer("r1", 90.0, vec![wire("a", 6.0)]));
        p2.layers.insert(REMEDY.into(), layer("r2", 270.0, vec![wire("b", 6.0)]));
        let poles = vec![p1, p2];

        let results = compare_designs(&poles, &poles, &SpanConfig::default());
        let span = &results.span_results[0];
        assert_eq!(span.span_status, SpanStatus::AddedInRemedy);
        assert_eq!(span.changes_at_pole_b[0].change_type, WireChangeType::Added);
        assert_eq!(span.changes_at_pole_b[0].wire_end_point_id, "r2");
        assert_eq!(results.summary.wires_added, 2);
    }

    #[test]
    fn dangling_wire_references_are_ignored() {
        let mut poles = two_poles(vec![wire("a", 6.0)], None);
        poles[0].layer_mut(PROPOSED).unwrap().wire_end_points[0].wires.push("ghost".into());
        let results = compare_designs(&poles, &poles, &SpanConfig::default());
        assert_eq!(results.span_results[0].changes_at_pole_a.len(), 1);
    }
}
