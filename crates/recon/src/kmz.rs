//! Fiber-map samples from GeoJSON-like features, and pole-level matching.

use log::{debug, info};
use polecheck_core::describe::extract_any;
use polecheck_core::geo::squared_coordinate_delta;
use polecheck_core::text::{as_f64, first_text, ids_related};
use polecheck_core::{extract_fiber_size, Coordinates, KmzFiberData, Pole};
use serde_json::Value;

use crate::config::KmzConfig;
use crate::model::{PoleKmzMatch, PoleMatchKind};

const SIZE_KEYS: &[&str] = &["cb_capafo", "fiber_size", "fiberSize"];
const COUNT_KEYS: &[&str] = &["fiber_count", "fiberCount"];
const POLE_ID_KEYS: &[&str] = &["pole_id", "poleId"];

/// First vertex of a Point / LineString / MultiLineString geometry.
fn first_vertex(geometry: &Value) -> Option<Coordinates> {
    let mut coords = geometry.get("coordinates")?;
    // Descend through nested arrays until we reach a [lon, lat] pair.
    while let Some(first) = coords.as_array().and_then(|a| a.first()) {
        if first.is_array() {
            coords = first;
        } else {
            break;
        }
    }
    coords.as_array().and_then(|pair| Coordinates::from_lon_lat(pair))
}

/// Text of the first present key in `properties`, falling back to the same keys
/// encoded inside the description.
fn property(properties: &Value, description: &str, keys: &[&str]) -> Option<String> {
    first_text(properties, keys).or_else(|| extract_any(description, keys))
}

/// Build one fiber-map sample. Features without any usable fields yield `None`.
pub fn kmz_from_feature(feature: &Value) -> Option<KmzFiberData> {
    let empty = Value::Null;
    let properties = feature.get("properties").unwrap_or(&empty);
    let description = first_text(properties, &["description"]).unwrap_or_default();

    let fiber_size = property(properties, &description, SIZE_KEYS).unwrap_or_default();
    let pole_id = property(properties, &description, POLE_ID_KEYS);
    let c_sro = property(properties, &description, &["c_sro"]);
    let mut data = KmzFiberData {
        pole_id,
        coordinates: feature.get("geometry").and_then(first_vertex),
        fiber_size: fiber_size.trim().to_string(),
        fiber_count: 0,
        description,
        c_sro,
    };

    // cb_capafo is authoritative when present; an explicit count only fills in for it.
    let capacity = property(properties, &data.description, &["cb_capafo"])
        .map(|text| text.trim().parse::<u32>().unwrap_or_else(|_| extract_fiber_size(text.as_str())))
        .filter(|n| *n > 0);
    let explicit = COUNT_KEYS
        .iter()
        .filter_map(|k| properties.get(*k))
        .find_map(as_f64)
        .filter(|n| *n > 0.0 && n.fract() == 0.0)
        .map(|n| n as u32);
    data.fiber_count = capacity
        .or(explicit)
        .or_else(|| data.fiber_size.parse::<u32>().ok())
        .unwrap_or_else(|| extract_fiber_size(&data));

    if data.coordinates.is_none() && data.pole_id.is_none() && data.fiber_count == 0 {
        return None;
    }
    Some(data)
}

/// All samples of a `FeatureCollection` (or a bare feature array).
pub fn kmz_from_feature_collection(json: &Value) -> Vec<KmzFiberData> {
    let features = json
        .get("features")
        .and_then(Value::as_array)
        .or_else(|| json.as_array());
    let Some(features) = features else {
        return Vec::new();
    };
    let data: Vec<KmzFiberData> = features.iter().filter_map(kmz_from_feature).collect();
    debug!("fiber map: {} of {} features usable", data.len(), features.len());
    data
}

/// Count a sample stands for: the stored count, else whatever its text yields.
pub fn kmz_count(entry: &KmzFiberData) -> u32 {
    if entry.fiber_count > 0 {
        entry.fiber_count
    } else {
        extract_fiber_size(entry)
    }
}

fn has_fiber_size(entry: &KmzFiberData) -> bool {
    !entry.fiber_size.is_empty() || entry.fiber_count > 0
}

/// Attach fiber-map samples to poles: direct id match first, then the nearest
/// pole by squared coordinate delta under the close threshold. When fewer than
/// `min_close_match_ratio` of the usable samples land, every sample is retried
/// against the far threshold. Sorted by ascending distance.
pub fn match_kmz_to_poles(kmz: &[KmzFiberData], poles: &[Pole], config: &KmzConfig) -> Vec<PoleKmzMatch> {
    let candidates: Vec<PoleKmzMatch> = kmz
        .iter()
        .enumerate()
        .filter(|(_, e)| e.coordinates.is_some() && has_fiber_size(e))
        .filter_map(|(i, e)| best_pole(i, e, poles))
        .collect();
    let usable = kmz
        .iter()
        .filter(|e| e.coordinates.is_some() && has_fiber_size(e))
        .count();
    if usable == 0 {
        return Vec::new();
    }

    let within = |threshold: f64| -> Vec<PoleKmzMatch> {
        candidates
            .iter()
            .filter(|m| m.kind == PoleMatchKind::DirectId || m.distance < threshold)
            .cloned()
            .collect()
    };

    let mut matches = within(config.pole_close_threshold);
    let ratio = matches.len() as f64 / usable as f64;
    if ratio < config.min_close_match_ratio {
        info!(
            "fiber map: only {}/{} samples matched within {}, retrying with {}",
            matches.len(),
            usable,
            config.pole_close_threshold,
            config.pole_far_threshold
        );
        matches = within(config.pole_far_threshold);
    }

    matches.sort_by(|a, b| a.distance.total_cmp(&b.distance).then(a.kmz_index.cmp(&b.kmz_index)));
    matches
}

fn best_pole(index: usize, entry: &KmzFiberData, poles: &[Pole]) -> Option<PoleKmzMatch> {
    let coords = entry.coordinates?;
    let build = |pole: &Pole, distance: f64, kind: PoleMatchKind| PoleKmzMatch {
        kmz_index: index,
        pole_id: pole.structure_id.clone(),
        distance,
        kind,
        fiber_size: entry.fiber_size.clone(),
        fiber_count: kmz_count(entry),
    };

    if let Some(kmz_id) = entry.pole_id.as_deref() {
        if let Some(pole) = poles.iter().find(|p| ids_related(kmz_id, &p.structure_id)) {
            let distance = pole
                .coordinates
                .map(|c| squared_coordinate_delta(coords, c))
                .unwrap_or(0.0);
            return Some(build(pole, distance, PoleMatchKind::DirectId));
        }
    }

    poles
        .iter()
        .filter_map(|p| p.coordinates.map(|c| (p, squared_coordinate_delta(coords, c))))
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(pole, d)| build(pole, d, PoleMatchKind::Nearest))
}
