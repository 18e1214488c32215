//! Span inference from reciprocal WEP geometry, and span matching across layers.

use std::collections::{BTreeMap, HashSet};

use log::debug;
use polecheck_core::geo::{angles_opposite, distances_match};
use polecheck_core::{Pole, WireEndPoint};

use crate::config::SpanConfig;
use crate::model::{IdentifiedSpan, SpanComparisonResult, SpanKey, SpanStatus};

/// True when two WEPs on different poles describe the same physical span:
/// opposite directions and equal lengths within tolerance, same unit.
pub fn weps_reciprocal(a: &WireEndPoint, b: &WireEndPoint, config: &SpanConfig) -> bool {
    let (Some((dir_a, dist_a)), Some((dir_b, dist_b))) = (a.geometry(), b.geometry()) else {
        return false;
    };
    angles_opposite(dir_a, dir_b, config.angle_tolerance_deg)
        && distances_match(
            dist_a,
            dist_b,
            config.distance_rel_tolerance,
            config.distance_abs_tolerance,
        )
}

/// Infer the spans of one layer. Each unordered pole pair is emitted at most
/// once, on its first reciprocal WEP hit; a WEP keeps scanning the remaining
/// poles after a hit so no pair depends on visiting order. Output is sorted by pole pair so the
/// result does not depend on input order.
pub fn identify_spans_in_layer(poles: &[Pole], layer: &str, config: &SpanConfig) -> Vec<IdentifiedSpan> {
    let layered: Vec<(&str, &[WireEndPoint])> = poles
        .iter()
        .filter_map(|p| {
            p.layer(layer)
                .map(|l| (p.structure_id.as_str(), l.wire_end_points.as_slice()))
        })
        .collect();

    let mut processed: HashSet<SpanKey> = HashSet::new();
    let mut spans = Vec::new();

    for (pole_a, weps_a) in &layered {
        for wep_a in weps_a.iter().filter(|w| w.geometry().is_some()) {
            for (pole_b, weps_b) in &layered {
                if pole_a == pole_b {
                    continue;
                }
                let key = SpanKey::new(pole_a, pole_b);
                if processed.contains(&key) {
                    continue;
                }
                if let Some(wep_b) = weps_b.iter().find(|w| weps_reciprocal(wep_a, w, config)) {
                    spans.push(IdentifiedSpan::new(pole_a, &wep_a.id, pole_b, &wep_b.id));
                    processed.insert(key);
                }
            }
        }
    }

    spans.sort_by_key(|s| s.key());
    debug!("layer {layer}: {} spans across {} poles", spans.len(), layered.len());
    spans
}

/// Partition two span sets by pole pair. Proposed spans keep their order
/// (MATCHED or REMOVED_IN_REMEDY); unconsumed remedy spans follow as
/// ADDED_IN_REMEDY in pole-pair order. Wire changes are left empty.
pub fn match_spans_between_layers(
    proposed: &[IdentifiedSpan],
    remedy: &[IdentifiedSpan],
) -> Vec<SpanComparisonResult> {
    let mut remedy_by_key: BTreeMap<SpanKey, &IdentifiedSpan> = BTreeMap::new();
    for span in remedy {
        remedy_by_key.entry(span.key()).or_insert(span);
    }

    let mut seen = HashSet::new();
    let mut results = Vec::new();
    for span in proposed {
        let key = span.key();
        if !seen.insert(key.clone()) {
            continue;
        }
        let (remedy_span, status) = match remedy_by_key.remove(&key) {
            Some(r) => (Some(r.clone()), SpanStatus::Matched),
            None => (None, SpanStatus::RemovedInRemedy),
        };
        results.push(SpanComparisonResult {
            proposed_span: Some(span.clone()),
            remedy_span,
            pole_a_id: key.pole_a,
            pole_b_id: key.pole_b,
            changes_at_pole_a: Vec::new(),
            changes_at_pole_b: Vec::new(),
            span_status: status,
        });
    }

    for (key, span) in remedy_by_key {
        results.push(SpanComparisonResult {
            proposed_span: None,
            remedy_span: Some(span.clone()),
            pole_a_id: key.pole_a,
            pole_b_id: key.pole_b,
            changes_at_pole_a: Vec::new(),
            changes_at_pole_b: Vec::new(),
            span_status: SpanStatus::AddedInRemedy,
        });
    }
    results
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use polecheck_core::{Measure, PoleLayer, PROPOSED};
    use proptest::prelude::*;

    pub(crate) fn wep(id: &str, direction: f64, distance: f64) -> WireEndPoint {
        WireEndPoint {
            id: id.into(),
            direction: Some(direction),
            distance: Some(Measure::new(distance, "METRE")),
            wep_type: Some("NEXT_POLE".into()),
            ..Default::default()
        }
    }

    pub(crate) fn pole_with(id: &str, layer: &str, weps: Vec<WireEndPoint>) -> Pole {
        let mut pole = Pole::new(id);
        pole.layers.insert(
            layer.into(),
            PoleLayer {
                wire_end_points: weps,
                ..Default::default()
            },
        );
        pole
    }

    fn keys(spans: &[IdentifiedSpan]) -> Vec<SpanKey> {
        spans.iter().map(|s| s.key()).collect()
    }

    #[test]
    fn reciprocal_weps_form_one_span() {
        let p1 = pole_with("P1", PROPOSED, vec![wep("w1", 90.0, 50.0)]);
        let p2 = pole_with("P2", PROPOSED, vec![wep("w2", 270.0, 50.0)]);
        let config = SpanConfig::default();

        let forward = identify_spans_in_layer(&[p1.clone(), p2.clone()], PROPOSED, &config);
        let backward = identify_spans_in_layer(&[p2, p1], PROPOSED, &config);
        assert_eq!(forward.len(), 1);
        assert_eq!(forward[0].pole_a_id, "P1");
        assert_eq!(forward[0].pole_a_wep_id, "w1");
        assert_eq!(forward[0].pole_b_id, "P2");
        assert_eq!(forward[0].pole_b_wep_id, "w2");
        assert_eq!(forward, backward);
    }

    #[test]
    fn tolerance_edges() {
        let config = SpanConfig::default();
        assert!(weps_reciprocal(&wep("a", 90.0, 50.0), &wep("b", 274.0, 52.0), &config));
        assert!(!weps_reciprocal(&wep("a", 90.0, 50.0), &wep("b", 280.0, 50.0), &config));
        assert!(!weps_reciprocal(&wep("a", 90.0, 50.0), &wep("b", 270.0, 60.0), &config));

        let mut feet = wep("b", 270.0, 50.0);
        feet.distance = Some(Measure::new(50.0, "FOOT"));
        assert!(!weps_reciprocal(&wep("a", 90.0, 50.0), &feet, &config));
    }

    #[test]
    fn incomplete_weps_are_skipped() {
        let mut no_dir = wep("w1", 0.0, 50.0);
        no_dir.direction = None;
        let no_id = wep("", 90.0, 50.0);
        let p1 = pole_with("P1", PROPOSED, vec![no_dir, no_id]);
        let p2 = pole_with("P2", PROPOSED, vec![wep("w2", 270.0, 50.0)]);
        assert!(identify_spans_in_layer(&[p1, p2], PROPOSED, &SpanConfig::default()).is_empty());
    }

    #[test]
    fn pair_is_emitted_once_even_with_two_reciprocal_weps() {
        let p1 = pole_with("P1", PROPOSED, vec![wep("w1", 90.0, 50.0), wep("w3", 92.0, 50.0)]);
        let p2 = pole_with("P2", PROPOSED, vec![wep("w2", 270.0, 50.0)]);
        let spans = identify_spans_in_layer(&[p1, p2], PROPOSED, &SpanConfig::default());
        assert_eq!(spans.len(), 1);
    }

    #[test]
    fn other_layers_are_ignored() {
        let p1 = pole_with("P1", "REMEDY", vec![wep("w1", 90.0, 50.0)]);
        let p2 = pole_with("P2", PROPOSED, vec![wep("w2", 270.0, 50.0)]);
        assert!(identify_spans_in_layer(&[p1, p2], PROPOSED, &SpanConfig::default()).is_empty());
    }

    #[test]
    fn matching_partitions_spans() {
        let ab = IdentifiedSpan::new("A", "1", "B", "2");
        let bc = IdentifiedSpan::new("B", "3", "C", "4");
        let cd = IdentifiedSpan::new("D", "5", "C", "6");
        let results = match_spans_between_layers(&[ab.clone(), bc], &[cd, ab]);

        let statuses: Vec<(String, SpanStatus)> = results
            .iter()
            .map(|r| (r.key().to_string(), r.span_status))
            .collect();
        assert_eq!(
            statuses,
            vec![
                ("A|B".to_string(), SpanStatus::Matched),
                ("B|C".to_string(), SpanStatus::RemovedInRemedy),
                ("C|D".to_string(), SpanStatus::AddedInRemedy),
            ]
        );
        assert!(results[0].remedy_span.is_some());
        assert!(results[1].remedy_span.is_none());
        assert!(results[2].proposed_span.is_none());
    }

    fn build_layer(links: &[(usize, usize, f64, f64)]) -> Vec<Pole> {
        let mut poles: Vec<Pole> = (0..5)
            .map(|i| pole_with(&format!("P{i}"), PROPOSED, Vec::new()))
            .collect();
        for (n, &(from, to, dir, dist)) in links.iter().enumerate() {
            if from == to {
                continue;
            }
            poles[from].layer_mut(PROPOSED).unwrap().wire_end_points.push(wep(&format!("a{n}"), dir, dist));
            poles[to]
                .layer_mut(PROPOSED)
                .unwrap()
                .wire_end_points
                .push(wep(&format!("b{n}"), (dir + 180.0) % 360.0, dist));
        }
        poles
    }

    proptest! {
        #[test]
        fn span_keys_are_order_independent(
            links in prop::collection::vec((0usize..5, 0usize..5, 0.0f64..360.0, 1.0f64..200.0), 0..8)
        ) {
            let poles = build_layer(&links);
            let mut reversed = poles.clone();
            reversed.reverse();
            let config = SpanConfig::default();

            let forward = keys(&identify_spans_in_layer(&poles, PROPOSED, &config));
            let backward = keys(&identify_spans_in_layer(&reversed, PROPOSED, &config));
            prop_assert_eq!(&forward, &backward);

            let unique: HashSet<&SpanKey> = forward.iter().collect();
            prop_assert_eq!(unique.len(), forward.len());
        }

        #[test]
        fn every_span_key_lands_in_exactly_one_partition(
            proposed in prop::collection::btree_set((0u8..4, 0u8..4), 0..6),
            remedy in prop::collection::btree_set((0u8..4, 0u8..4), 0..6),
        ) {
            let to_spans = |pairs: &std::collections::BTreeSet<(u8, u8)>| -> Vec<IdentifiedSpan> {
                let mut seen = HashSet::new();
                pairs
                    .iter()
                    .filter(|(a, b)| a != b)
                    .map(|(a, b)| IdentifiedSpan::new(&format!("P{a}"), "x", &format!("P{b}"), "y"))
                    .filter(|s| seen.insert(s.key()))
                    .collect()
            };
            let p = to_spans(&proposed);
            let r = to_spans(&remedy);
            let results = match_spans_between_layers(&p, &r);

            let all: HashSet<SpanKey> = p.iter().chain(r.iter()).map(|s| s.key()).collect();
            let got: Vec<SpanKey> = results.iter().map(|s| s.key()).collect();
            let got_set: HashSet<SpanKey> = got.iter().cloned().collect();
            prop_assert_eq!(got.len(), got_set.len());
            prop_assert_eq!(got_set, all);
        }
    }
}
