//! Span-level fiber reconciliation: JSON fiber counts per span against the
//! nearest fiber-map sample to the span midpoint.

use std::collections::BTreeMap;

use polecheck_core::geo::{haversine_m, midpoint};
use polecheck_core::{extract_fiber_size, is_fiber_wire, KmzFiberData, Pole, PoleWire, PROPOSED, REMEDY};

use crate::config::QcConfig;
use crate::kmz::kmz_count;
use crate::model::{FiberMatchStatus, IdentifiedSpan, ProcessedSpanData, SpanKey, WireRef};
use crate::spans::identify_spans_in_layer;

/// Fiber on one side of a span: size text of the first fiber wire and the
/// summed count of every fiber wire hanging on the span.
#[derive(Debug, Default)]
struct SideFiber {
    size: String,
    count: u32,
    refs: Vec<WireRef>,
}

fn pole<'a>(poles: &'a [Pole], id: &str) -> Option<&'a Pole> {
    poles.iter().find(|p| p.structure_id == id)
}

fn fiber_wires_at<'a>(poles: &'a [Pole], layer: &str, pole_id: &str, wep_id: &str) -> Vec<&'a PoleWire> {
    let Some(l) = pole(poles, pole_id).and_then(|p| p.layer(layer)) else {
        return Vec::new();
    };
    l.wire_end_point(wep_id)
        .map(|wep| l.wires_for_end_point(wep))
        .unwrap_or_default()
        .into_iter()
        .filter(|w| is_fiber_wire(w))
        .collect()
}

/// Count from the pole A end, or the pole B end when A carries no fiber. Wire
/// references cover both ends so an edit reaches every copy of the cable.
fn side_fiber(poles: &[Pole], layer: &str, span: Option<&IdentifiedSpan>) -> SideFiber {
    let Some(span) = span else {
        return SideFiber::default();
    };
    let at_a = fiber_wires_at(poles, layer, &span.pole_a_id, &span.pole_a_wep_id);
    let at_b = fiber_wires_at(poles, layer, &span.pole_b_id, &span.pole_b_wep_id);
    let counted = if at_a.is_empty() { &at_b } else { &at_a };

    let refs = at_a
        .iter()
        .map(|w| (span.pole_a_id.as_str(), *w))
        .chain(at_b.iter().map(|w| (span.pole_b_id.as_str(), *w)))
        .map(|(pole_id, w)| WireRef {
            structure_id: pole_id.to_string(),
            layer: layer.to_string(),
            wire_id: w.id.clone(),
        })
        .collect();

    SideFiber {
        size: counted.first().map(|w| w.size_text().to_string()).unwrap_or_default(),
        count: counted.iter().map(|w| extract_fiber_size(*w)).sum(),
        refs,
    }
}

/// One row per span found in PROPOSED and/or REMEDY, in pole-pair order.
pub fn process_fiber_comparison_data(
    poles: &[Pole],
    kmz: Option<&[KmzFiberData]>,
    config: &QcConfig,
) -> Vec<ProcessedSpanData> {
    let mut spans: BTreeMap<SpanKey, (Option<IdentifiedSpan>, Option<IdentifiedSpan>)> = BTreeMap::new();
    for span in identify_spans_in_layer(poles, PROPOSED, &config.span) {
        let key = span.key();
        spans.entry(key).or_default().0 = Some(span);
    }
    for span in identify_spans_in_layer(poles, REMEDY, &config.span) {
        let key = span.key();
        spans.entry(key).or_default().1 = Some(span);
    }

    let kmz = kmz.filter(|k| !k.is_empty());
    spans
        .into_iter()
        .map(|(key, (proposed, remedy))| {
            let p = side_fiber(poles, PROPOSED, proposed.as_ref());
            let r = side_fiber(poles, REMEDY, remedy.as_ref());
            let mut wire_refs = p.refs;
            wire_refs.extend(r.refs);

            let ends = (
                pole(poles, &key.pole_a).and_then(|x| x.coordinates),
                pole(poles, &key.pole_b).and_then(|x| x.coordinates),
            );
            let mid = match ends {
                (Some(a), Some(b)) => Some(midpoint(a, b)),
                _ => None,
            };

            let nearest = match (kmz, mid) {
                (Some(entries), Some(m)) => entries
                    .iter()
                    .filter_map(|e| e.coordinates.map(|c| (e, haversine_m(m, c))))
                    .min_by(|a, b| a.1.total_cmp(&b.1)),
                _ => None,
            };
            let within = nearest.filter(|(_, d)| *d <= config.kmz.span_radius_m);

            let status = match (kmz, mid, within) {
                (None, _, _) => FiberMatchStatus::NoKmzDataLoaded,
                (_, None, _) => FiberMatchStatus::NoPoleCoords,
                (_, _, None) => FiberMatchStatus::NoKmzNearby,
                (_, _, Some((entry, _))) => classify(p.count, r.count, kmz_count(entry)),
            };

            ProcessedSpanData {
                span_id: key.to_string(),
                pole_a_id: key.pole_a,
                pole_b_id: key.pole_b,
                proposed_fiber_size: p.size,
                proposed_fiber_count: p.count,
                remedy_fiber_size: r.size,
                remedy_fiber_count: r.count,
                midpoint: mid,
                kmz_fiber_size: within.map(|(e, _)| e.fiber_size.clone()),
                kmz_fiber_count: within.map(|(e, _)| kmz_count(e)),
                kmz_distance_m: nearest.map(|(_, d)| d),
                status,
                wire_refs,
            }
        })
        .collect()
}

/// Exact comparison; fiber counts are discrete.
pub fn classify(proposed: u32, remedy: u32, kmz: u32) -> FiberMatchStatus {
    let json_has = proposed > 0 || remedy > 0;
    match (json_has, kmz > 0) {
        (true, true) if proposed == kmz || remedy == kmz => FiberMatchStatus::Match,
        (true, true) => FiberMatchStatus::Mismatch,
        (true, false) => FiberMatchStatus::JsonOnly,
        (false, true) => FiberMatchStatus::KmzOnly,
        (false, false) => FiberMatchStatus::NoFiberFound,
    }
}

/// Rows per status, keyed by the status name.
pub fn status_counts(rows: &[ProcessedSpanData]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for row in rows {
        *counts.entry(row.status.to_string()).or_insert(0) += 1;
    }
    counts
}
