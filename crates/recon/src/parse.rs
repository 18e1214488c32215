//! Pole/span model builder.
//!
//! Input JSON comes in four unrelated shapes. They are tried in priority order
//! (`SHAPES`) and the first one that yields at least one pole wins:
//!
//! 1. `leads[].locations[].designs[]`
//! 2. flat `locations[].designs[]`
//! 3. pre-built `poles[]` (pass-through)
//! 4. `clientData.poles[]` (minimal placeholder poles)
//!
//! Elements that cannot be placed at a height are dropped with a logged
//! reason; nothing in here fails on malformed data.

use std::collections::HashSet;

use log::{debug, warn};
use polecheck_core::model::{
    AnalysisResults, Attachment, AttachmentKind, ClearanceResult, ClientItem, EnvironmentStatus,
    PoleProperties,
};
use polecheck_core::text::{as_f64, coerce_text, field_text, first_text, non_empty, path_text};
use polecheck_core::{
    Coordinates, Measure, Owner, Pole, PoleLayer, PoleWire, ProjectInfo, WireEndPoint, EXISTING,
    PROPOSED, REMEDY,
};
use serde_json::Value;

pub type Detector = fn(&Value) -> bool;
pub type ShapeExtractor = fn(&Value) -> Vec<Pole>;

/// Priority-ordered input shapes.
pub const SHAPES: &[(&str, Detector, ShapeExtractor)] = &[
    ("leads", has_leads, extract_from_leads),
    ("locations", has_locations, extract_from_locations),
    ("poles", has_poles, extract_prebuilt_poles),
    ("client_data", has_client_data_poles, extract_from_client_data),
];

/// Build the pole model from any supported input shape. Empty when nothing matched.
pub fn extract_pole_data(json: &Value) -> Vec<Pole> {
    for (name, detect, extract) in SHAPES {
        if !detect(json) {
            continue;
        }
        let poles = extract(json);
        if poles.is_empty() {
            debug!("input shape '{name}' present but yielded no poles");
            continue;
        }
        debug!("input shape '{name}' yielded {} poles", poles.len());
        return poles;
    }
    warn!("input matched none of the known pole data shapes");
    Vec::new()
}

/// Mark each attachment valid iff its assembly unit is a non-empty string.
/// Advisory only. Returns the number of invalid attachments.
pub fn validate_pole_data(poles: &mut [Pole]) -> usize {
    let mut invalid = 0;
    for pole in poles.iter_mut() {
        for layer in pole.layers.values_mut() {
            for attachment in layer.attachments.iter_mut() {
                let valid = !attachment.assembly_unit.trim().is_empty();
                if !valid {
                    invalid += 1;
                }
                attachment.is_valid = Some(valid);
            }
        }
    }
    invalid
}

// ---------------------------------------------------------------------------
// Shape detection
// ---------------------------------------------------------------------------

fn non_empty_array<'a>(value: Option<&'a Value>) -> Option<&'a Vec<Value>> {
    value.and_then(Value::as_array).filter(|a| !a.is_empty())
}

fn has_leads(json: &Value) -> bool {
    non_empty_array(json.get("leads")).is_some()
}

fn has_locations(json: &Value) -> bool {
    non_empty_array(json.get("locations")).is_some()
}

fn has_poles(json: &Value) -> bool {
    non_empty_array(json.get("poles")).is_some()
}

fn has_client_data_poles(json: &Value) -> bool {
    non_empty_array(json.get("clientData").and_then(|c| c.get("poles"))).is_some()
}

/// Location objects in the order the parser visits them: every
/// `leads[].locations[]` when any exist, otherwise top-level `locations[]`.
pub fn location_values(json: &Value) -> Vec<&Value> {
    let from_leads: Vec<&Value> = json
        .get("leads")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|lead| lead.get("locations").and_then(Value::as_array))
        .flatten()
        .collect();
    if !from_leads.is_empty() {
        return from_leads;
    }
    json.get("locations")
        .and_then(Value::as_array)
        .map(|locs| locs.iter().collect())
        .unwrap_or_default()
}

/// Mutable counterpart of [`location_values`], same order.
pub fn location_values_mut(json: &mut Value) -> Vec<&mut Value> {
    let leads_have_locations = !location_values_from_leads_empty(json);
    if leads_have_locations {
        return json
            .get_mut("leads")
            .and_then(Value::as_array_mut)
            .into_iter()
            .flatten()
            .filter_map(|lead| lead.get_mut("locations").and_then(Value::as_array_mut))
            .flatten()
            .collect();
    }
    json.get_mut("locations")
        .and_then(Value::as_array_mut)
        .map(|locs| locs.iter_mut().collect())
        .unwrap_or_default()
}

fn location_values_from_leads_empty(json: &Value) -> bool {
    json.get("leads")
        .and_then(Value::as_array)
        .map(|leads| {
            leads.iter().all(|lead| {
                lead.get("locations")
                    .and_then(Value::as_array)
                    .map(|l| l.is_empty())
                    .unwrap_or(true)
            })
        })
        .unwrap_or(true)
}

// ---------------------------------------------------------------------------
// Structure ids
// ---------------------------------------------------------------------------

/// Hands out unique structure ids in preference order:
/// `structure.pole.id`, `structure.pole.externalId`, `location.label`, `POLE_<n>`.
#[derive(Debug, Default)]
pub struct StructureIds {
    taken: HashSet<String>,
    visited: usize,
}

impl StructureIds {
    pub fn assign(&mut self, location: &Value) -> String {
        self.visited += 1;
        let designs = designs_of(location);
        let from_designs = |key: &str| {
            designs
                .iter()
                .map(|d| path_text(d, &["structure", "pole", key]))
                .find(|s| !s.trim().is_empty())
        };

        let candidates = [
            from_designs("id"),
            from_designs("externalId"),
            non_empty(field_text(location, "label")),
        ];
        for candidate in candidates.into_iter().flatten() {
            let candidate = candidate.trim().to_string();
            if self.taken.insert(candidate.clone()) {
                return candidate;
            }
            debug!("structure id '{candidate}' already taken, trying next candidate");
        }

        let mut n = self.visited;
        loop {
            let placeholder = format!("POLE_{n}");
            if self.taken.insert(placeholder.clone()) {
                return placeholder;
            }
            n += 1;
        }
    }
}

fn designs_of(location: &Value) -> Vec<&Value> {
    location
        .get("designs")
        .and_then(Value::as_array)
        .map(|d| d.iter().collect())
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Shapes 1 + 2: SPIDAcalc locations
// ---------------------------------------------------------------------------

fn extract_from_leads(json: &Value) -> Vec<Pole> {
    let locations: Vec<&Value> = json
        .get("leads")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|lead| lead.get("locations").and_then(Value::as_array))
        .flatten()
        .collect();
    poles_from_locations(&locations)
}

fn extract_from_locations(json: &Value) -> Vec<Pole> {
    let locations: Vec<&Value> = json
        .get("locations")
        .and_then(Value::as_array)
        .map(|l| l.iter().collect())
        .unwrap_or_default();
    poles_from_locations(&locations)
}

fn poles_from_locations(locations: &[&Value]) -> Vec<Pole> {
    let mut ids = StructureIds::default();
    locations
        .iter()
        .filter(|loc| loc.is_object())
        .map(|loc| location_to_pole(loc, &mut ids))
        .collect()
}

fn location_to_pole(location: &Value, ids: &mut StructureIds) -> Pole {
    let structure_id = ids.assign(location);
    let label = field_text(location, "label");
    let alias = non_empty(label).filter(|l| l.trim() != structure_id);

    let coordinates = location
        .get("geographicCoordinate")
        .and_then(|g| g.get("coordinates"))
        .and_then(Value::as_array)
        .and_then(|pair| Coordinates::from_lon_lat(pair));
    if coordinates.is_none() {
        debug!("{structure_id}: location has no usable coordinates");
    }

    let mut pole = Pole {
        structure_id,
        alias,
        coordinates,
        ..Default::default()
    };

    for (i, design) in designs_of(location).into_iter().enumerate() {
        let name = layer_name(design, i);
        if pole.layers.contains_key(&name) {
            warn!("{}: duplicate design layer '{name}', keeping the first", pole.structure_id);
            continue;
        }
        let layer = design_to_layer(design, &pole.structure_id, &name);
        pole.layers.insert(name, layer);
    }
    pole
}

/// Layer name from the design label, then `layerType`, then position.
pub fn layer_name(design: &Value, index: usize) -> String {
    let label = field_text(design, "label");
    let lower = label.to_lowercase();
    for canonical in [EXISTING, PROPOSED, REMEDY] {
        if lower.contains(&canonical.to_lowercase()) {
            return canonical.to_string();
        }
    }
    match field_text(design, "layerType").trim() {
        "Measured" => return EXISTING.into(),
        "Recommended" => return PROPOSED.into(),
        "Remedy" => return REMEDY.into(),
        _ => {}
    }
    if !label.trim().is_empty() {
        return label.trim().to_uppercase();
    }
    format!("DESIGN_{}", index + 1)
}

fn design_to_layer(design: &Value, pole_id: &str, layer: &str) -> PoleLayer {
    let empty = Value::Null;
    let structure = design.get("structure").unwrap_or(&empty);

    let mut attachments = Vec::new();
    for item in array(structure, "insulators") {
        let height = measure_at(item, "offset").or_else(|| measure_at(item, "attachmentHeight"));
        push_attachment(&mut attachments, item, AttachmentKind::Insulator, height, pole_id, layer);
    }
    for item in array(structure, "equipments") {
        let height = measure_at(item, "attachmentHeight").or_else(|| measure_at(item, "offset"));
        push_attachment(&mut attachments, item, AttachmentKind::Equipment, height, pole_id, layer);
    }
    for item in array(structure, "guys") {
        let height = measure_at(item, "attachmentHeight")
            .or_else(|| measure_at(item, "height"))
            .or_else(|| {
                let target = field_text(item, "attachmentId");
                attachments
                    .iter()
                    .find(|a: &&Attachment| !target.is_empty() && a.answers_to(&target))
                    .and_then(|a| a.height.clone())
            });
        push_attachment(&mut attachments, item, AttachmentKind::Guy, height, pole_id, layer);
    }
    for item in array(structure, "anchors") {
        // Anchors sit in the ground; no display height applies.
        attachments.push(build_attachment(item, AttachmentKind::Anchor, None));
    }

    let wires = array(structure, "wires")
        .filter_map(|w| build_wire(w, pole_id, layer))
        .collect();

    let wire_end_points = array(structure, "wireEndPoints").map(build_wire_end_point).collect();

    let clearance_results = array(design, "clearanceResults").map(build_clearance).collect();

    PoleLayer {
        attachments,
        wires,
        wire_end_points,
        pole_properties: structure.get("pole").map(|p| build_pole_properties(p, design)),
        clearance_results,
        analysis_results: build_analysis(design),
    }
}

fn array<'a>(value: &'a Value, key: &str) -> impl Iterator<Item = &'a Value> {
    value
        .get(key)
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter(|v| v.is_object())
}

fn measure_at(value: &Value, key: &str) -> Option<Measure> {
    value.get(key).and_then(Measure::from_value)
}

/// `clientItem` is either an object or a bare catalog name.
fn client_item_text(item: &Value, key: &str) -> String {
    match item.get("clientItem") {
        Some(ci @ Value::Object(_)) => field_text(ci, key),
        Some(other) if key == "type" || key == "size" => coerce_text(other),
        _ => String::new(),
    }
}

fn build_attachment(item: &Value, kind: AttachmentKind, height: Option<Measure>) -> Attachment {
    let attachment_type = non_empty(client_item_text(item, "type"))
        .or_else(|| first_text(item, &["type", "attachmentType"]))
        .unwrap_or_default();
    Attachment {
        id: field_text(item, "id"),
        external_id: non_empty(field_text(item, "externalId")),
        kind,
        attachment_type,
        owner: item.get("owner").map(Owner::from_value).unwrap_or_default(),
        description: first_text(item, &["description", "label"]).unwrap_or_default(),
        size: non_empty(client_item_text(item, "size"))
            .or_else(|| first_text(item, &["size"]))
            .unwrap_or_default(),
        assembly_unit: first_text(item, &["assemblyUnit"])
            .or_else(|| non_empty(client_item_text(item, "assemblyUnit")))
            .unwrap_or_default(),
        height,
        usage_group: non_empty(field_text(item, "usageGroup")),
        is_valid: None,
    }
}

fn push_attachment(
    out: &mut Vec<Attachment>,
    item: &Value,
    kind: AttachmentKind,
    height: Option<Measure>,
    pole_id: &str,
    layer: &str,
) {
    if height.is_none() {
        warn!(
            "{pole_id} [{layer}]: dropping {kind:?} '{}': no height to place it at",
            field_text(item, "id")
        );
        return;
    }
    out.push(build_attachment(item, kind, height));
}

fn build_wire(item: &Value, pole_id: &str, layer: &str) -> Option<PoleWire> {
    let id = field_text(item, "id");
    let Some(attachment_height) = measure_at(item, "attachmentHeight") else {
        warn!("{pole_id} [{layer}]: dropping wire '{id}': no attachmentHeight");
        return None;
    };

    let client_item = match item.get("clientItem") {
        Some(ci @ Value::Object(_)) => ClientItem {
            size: field_text(ci, "size"),
            item_type: field_text(ci, "type"),
        },
        Some(other) => ClientItem {
            size: coerce_text(other),
            item_type: String::new(),
        },
        None => ClientItem::default(),
    };

    let mut associated: Vec<String> = item
        .get("associatedAttachments")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .map(coerce_text)
        .filter(|s| !s.is_empty())
        .collect();
    if let Some(att) = non_empty(field_text(item, "attachmentId")) {
        if !associated.contains(&att) {
            associated.push(att);
        }
    }

    Some(PoleWire {
        id,
        external_id: non_empty(field_text(item, "externalId")),
        owner: item.get("owner").map(Owner::from_value).unwrap_or_default(),
        attachment_height: Some(attachment_height),
        size: field_text(item, "size"),
        wire_type: field_text(item, "type"),
        description: field_text(item, "description"),
        client_item,
        tension: item.get("tension").and_then(as_f64),
        usage_group: non_empty(field_text(item, "usageGroup")),
        associated_attachments: associated,
    })
}

fn build_wire_end_point(item: &Value) -> WireEndPoint {
    let environment_status = EnvironmentStatus::from_code(&field_text(item, "environmentStatus"));
    WireEndPoint {
        id: field_text(item, "id"),
        external_id: non_empty(field_text(item, "externalId")),
        direction: item.get("direction").and_then(as_f64),
        distance: measure_at(item, "distance"),
        wep_type: non_empty(field_text(item, "type")),
        wires: item
            .get("wires")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .map(coerce_text)
            .filter(|s| !s.is_empty())
            .collect(),
        environment: non_empty(field_text(item, "environment")),
        environment_status,
    }
}

fn build_clearance(item: &Value) -> ClearanceResult {
    ClearanceResult {
        label: first_text(item, &["label", "description", "id"]).unwrap_or_default(),
        status: field_text(item, "status"),
        actual: item.get("actual").and_then(as_f64),
        required: item.get("required").and_then(as_f64),
        unit: field_text(item, "unit"),
    }
}

fn build_pole_properties(pole: &Value, design: &Value) -> PoleProperties {
    let remedies = design
        .get("remedies")
        .or_else(|| design.get("structure").and_then(|s| s.get("remedies")))
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .map(|r| first_text(r, &["description", "label"]).unwrap_or_else(|| coerce_text(r)))
        .filter(|s| !s.is_empty())
        .collect();

    PoleProperties {
        species: non_empty(client_item_text(pole, "species"))
            .or_else(|| first_text(pole, &["species"]))
            .unwrap_or_default(),
        pole_class: non_empty(client_item_text(pole, "classOfPole"))
            .or_else(|| first_text(pole, &["class", "classOfPole"]))
            .unwrap_or_default(),
        length: pole
            .get("clientItem")
            .and_then(|ci| ci.get("height"))
            .and_then(Measure::from_value)
            .or_else(|| measure_at(pole, "length")),
        glc: measure_at(pole, "glc"),
        agl: measure_at(pole, "agl"),
        environment: non_empty(field_text(pole, "environment")),
        remedies,
    }
}

/// Max pole stress ratio from `analysis[].results[]`, or a precomputed
/// `analysisResults.maxStressRatio`.
fn build_analysis(design: &Value) -> Option<AnalysisResults> {
    if let Some(ratio) = design
        .get("analysisResults")
        .and_then(|a| a.get("maxStressRatio"))
        .and_then(as_f64)
    {
        return Some(AnalysisResults { max_stress_ratio: Some(ratio) });
    }

    let mut max: Option<f64> = None;
    let results = design
        .get("analysis")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .flat_map(|case| array(case, "results"));
    for result in results {
        let component = field_text(result, "component").to_lowercase();
        if !component.is_empty() && !component.contains("pole") {
            continue;
        }
        let kind = field_text(result, "analysisType").to_uppercase();
        if !kind.is_empty() && kind != "STRESS" {
            continue;
        }
        let Some(actual) = result.get("actual").and_then(as_f64) else {
            continue;
        };
        let ratio = if field_text(result, "unit").eq_ignore_ascii_case("PERCENT") {
            actual / 100.0
        } else {
            match result.get("allowable").and_then(as_f64) {
                Some(allowable) if allowable > 0.0 => actual / allowable,
                _ => continue,
            }
        };
        max = Some(max.map_or(ratio, |m: f64| m.max(ratio)));
    }
    max.map(|ratio| AnalysisResults { max_stress_ratio: Some(ratio) })
}

// ---------------------------------------------------------------------------
// Shape 3: pre-built poles
// ---------------------------------------------------------------------------

fn extract_prebuilt_poles(json: &Value) -> Vec<Pole> {
    let mut ids = HashSet::new();
    let mut poles = Vec::new();
    for (i, item) in json
        .get("poles")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .enumerate()
    {
        match serde_json::from_value::<Pole>(item.clone()) {
            Ok(mut pole) => {
                if pole.structure_id.trim().is_empty() || ids.contains(&pole.structure_id) {
                    pole.structure_id = format!("POLE_{}", i + 1);
                }
                ids.insert(pole.structure_id.clone());
                poles.push(pole);
            }
            Err(e) => warn!("poles[{i}]: skipped, not a pole record: {e}"),
        }
    }
    poles
}

// ---------------------------------------------------------------------------
// Shape 4: clientData.poles fallback
// ---------------------------------------------------------------------------

fn extract_from_client_data(json: &Value) -> Vec<Pole> {
    json.get("clientData")
        .and_then(|c| c.get("poles"))
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .enumerate()
        .map(|(i, item)| {
            let mut pole = Pole::new(format!("POLE_{}", i + 1));
            let properties = PoleProperties {
                species: field_text(item, "species"),
                pole_class: first_text(item, &["classOfPole", "class"]).unwrap_or_default(),
                length: measure_at(item, "height").or_else(|| measure_at(item, "length")),
                glc: Some(Measure::new(0.0, "METRE")),
                ..Default::default()
            };
            pole.layers.insert(
                EXISTING.into(),
                PoleLayer {
                    pole_properties: Some(properties),
                    ..Default::default()
                },
            );
            pole
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Project metadata
// ---------------------------------------------------------------------------

const ADDRESS_PARTS: &[&str] = &["number", "street", "city", "county", "state", "zip_code", "zipCode"];

pub fn extract_project_info(json: &Value) -> ProjectInfo {
    let address = match json.get("address") {
        Some(addr @ Value::Object(map)) => {
            let known: Vec<String> = ADDRESS_PARTS
                .iter()
                .map(|k| field_text(addr, k))
                .filter(|s| !s.trim().is_empty())
                .collect();
            if known.is_empty() {
                map.values()
                    .map(coerce_text)
                    .filter(|s| !s.trim().is_empty())
                    .collect::<Vec<_>>()
                    .join(", ")
            } else {
                known.join(", ")
            }
        }
        Some(other) => coerce_text(other),
        None => String::new(),
    };

    let default_load_cases = json
        .get("defaultLoadCases")
        .and_then(Value::as_array)
        .map(|cases| {
            cases
                .iter()
                .map(|c| match c {
                    Value::Object(_) => first_text(c, &["name", "label"]).unwrap_or_default(),
                    other => coerce_text(other),
                })
                .filter(|s| !s.is_empty())
                .collect()
        });

    ProjectInfo {
        engineer: field_text(json, "engineer"),
        comments: field_text(json, "comments"),
        general_location: field_text(json, "generalLocation"),
        address,
        default_load_cases,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn location(label: &str, pole_id: Option<&str>, lon: f64, lat: f64) -> Value {
        let mut pole = json!({
            "glc": {"value": 1.1, "unit": "METRE"},
            "agl": {"value": 12.0, "unit": "METRE"},
            "clientItem": {"species": "Southern Pine", "classOfPole": "3",
                           "height": {"value": 13.7, "unit": "METRE"}}
        });
        if let Some(id) = pole_id {
            pole["id"] = json!(id);
        }
        json!({
            "label": label,
            "geographicCoordinate": {"type": "Point", "coordinates": [lon, lat]},
            "designs": [
                {"label": "Existing", "layerType": "Measured", "structure": {"pole": pole.clone()}},
                {"label": "Proposed", "layerType": "Recommended", "structure": {
                    "pole": pole,
                    "insulators": [
                        {"id": "Ins#1", "owner": {"id": "PNM"}, "offset": {"value": 10.0, "unit": "METRE"},
                         "clientItem": "Pole Top", "assemblyUnit": "IPT-1"},
                        {"id": "Ins#2", "owner": {"id": "PNM"}}
                    ],
                    "wires": [
                        {"id": "Wire#1", "owner": {"id": "AT&T", "industry": "COMMUNICATION"},
                         "attachmentHeight": {"value": 6.5, "unit": "METRE"},
                         "clientItem": {"size": "Gigapower 48ct", "type": "Fiber"},
                         "usageGroup": "COMMUNICATION_BUNDLE", "attachmentId": "Ins#1"},
                        {"id": "Wire#2", "owner": {"id": "PNM"}}
                    ],
                    "wireEndPoints": [
                        {"id": "WEP#1", "direction": 90, "distance": {"value": 50, "unit": "METRE"},
                         "type": "NEXT_POLE", "wires": ["Wire#1"], "environmentStatus": "NE"}
                    ]
                }}
            ]
        })
    }

    #[test]
    fn leads_shape_builds_layers_and_swaps_coordinates() {
        let input = json!({"leads": [{"locations": [location("1-PL100", None, -106.6, 35.1)]}]});
        let poles = extract_pole_data(&input);
        assert_eq!(poles.len(), 1);
        let pole = &poles[0];
        assert_eq!(pole.structure_id, "1-PL100");
        let coords = pole.coordinates.unwrap();
        assert_eq!(coords.latitude, 35.1);
        assert_eq!(coords.longitude, -106.6);
        assert!(pole.layer(EXISTING).is_some());
        let proposed = pole.layer(PROPOSED).unwrap();
        assert_eq!(proposed.wire_end_points.len(), 1);
        assert_eq!(proposed.wire_end_points[0].direction, Some(90.0));
    }

    #[test]
    fn elements_without_height_are_dropped() {
        let input = json!({"locations": [location("P1", None, -106.6, 35.1)]});
        let poles = extract_pole_data(&input);
        let proposed = poles[0].layer(PROPOSED).unwrap();
        assert_eq!(proposed.wires.len(), 1);
        assert_eq!(proposed.wires[0].id, "Wire#1");
        assert_eq!(proposed.attachments.len(), 1);
        assert_eq!(proposed.attachments[0].attachment_type, "Pole Top");
        assert_eq!(proposed.wires[0].associated_attachments, vec!["Ins#1"]);
    }

    #[test]
    fn structure_id_prefers_pole_id_then_label() {
        let input = json!({"locations": [
            location("label-a", Some("PL-7"), -106.6, 35.1),
            location("label-b", None, -106.6, 35.2),
        ]});
        let poles = extract_pole_data(&input);
        assert_eq!(poles[0].structure_id, "PL-7");
        assert_eq!(poles[0].alias.as_deref(), Some("label-a"));
        assert_eq!(poles[1].structure_id, "label-b");
    }

    #[test]
    fn duplicate_pole_ids_fall_back_to_next_candidate() {
        let input = json!({"locations": [
            location("1-PL1", Some("Pole"), -106.6, 35.1),
            location("1-PL2", Some("Pole"), -106.6, 35.2),
            location("", Some("Pole"), -106.6, 35.3),
        ]});
        let poles = extract_pole_data(&input);
        let ids: Vec<&str> = poles.iter().map(|p| p.structure_id.as_str()).collect();
        assert_eq!(ids, vec!["Pole", "1-PL2", "POLE_3"]);
    }

    #[test]
    fn object_valued_strings_are_coerced() {
        let input = json!({"locations": [{
            "label": {"text": "odd"},
            "designs": [{"label": "Proposed", "structure": {"wires": [
                {"id": 17, "owner": {"id": {"name": "X"}}, "description": null,
                 "attachmentHeight": {"value": 5, "unit": "METRE"}}
            ]}}]
        }]});
        let poles = extract_pole_data(&input);
        assert_eq!(poles[0].structure_id, r#"{"text":"odd"}"#);
        let wire = &poles[0].layer(PROPOSED).unwrap().wires[0];
        assert_eq!(wire.id, "17");
        assert_eq!(wire.owner.id, r#"{"name":"X"}"#);
        assert_eq!(wire.description, "");
    }

    #[test]
    fn prebuilt_poles_pass_through() {
        let input = json!({"poles": [
            {"structureId": "PL-1", "layers": {"PROPOSED": {"wires": [{"id": "w1"}]}}},
            "not a pole"
        ]});
        let poles = extract_pole_data(&input);
        assert_eq!(poles.len(), 1);
        assert_eq!(poles[0].layer(PROPOSED).unwrap().wires[0].id, "w1");
    }

    #[test]
    fn prebuilt_poles_keep_records_with_text_numbers() {
        let input = json!({"poles": [
            {"structureId": "PL-1", "layers": {"PROPOSED": {
                "wireEndPoints": [{"id": "e1", "direction": "90", "environmentStatus": ""}]
            }}},
            {"structureId": "PL-2", "layers": {"PROPOSED": {
                "wires": [{"id": "w1", "tension": "1200"}]
            }}},
            {"structureId": "PL-3", "layers": {"EXISTING": {
                "analysisResults": {"maxStressRatio": "high"}
            }}}
        ]});
        let poles = extract_pole_data(&input);
        let ids: Vec<&str> = poles.iter().map(|p| p.structure_id.as_str()).collect();
        assert_eq!(ids, ["PL-1", "PL-2", "PL-3"]);
        let wep = &poles[0].layer(PROPOSED).unwrap().wire_end_points[0];
        assert_eq!(wep.direction, Some(90.0));
        assert!(wep.environment_status.is_none());
        assert_eq!(poles[1].layer(PROPOSED).unwrap().wires[0].tension, Some(1200.0));
        assert!(poles[2].layer(EXISTING).unwrap().max_stress_ratio().is_none());
    }

    #[test]
    fn client_data_fallback_builds_minimal_poles() {
        let input = json!({"clientData": {"poles": [
            {"species": "Douglas Fir", "classOfPole": "2"},
            {"species": "Southern Pine"}
        ]}});
        let poles = extract_pole_data(&input);
        assert_eq!(poles.len(), 2);
        assert_eq!(poles[1].structure_id, "POLE_2");
        assert_eq!(poles[0].layers.len(), 1);
        let props = poles[0].layer(EXISTING).unwrap().pole_properties.as_ref().unwrap();
        assert_eq!(props.glc.as_ref().unwrap().value, 0.0);
        assert_eq!(props.pole_class, "2");
    }

    #[test]
    fn leads_take_priority_over_other_shapes() {
        let input = json!({
            "leads": [{"locations": [location("LEAD-1", None, -106.6, 35.1)]}],
            "poles": [{"structureId": "FLAT-1"}]
        });
        let poles = extract_pole_data(&input);
        assert_eq!(poles[0].structure_id, "LEAD-1");
    }

    #[test]
    fn empty_leads_fall_through_to_next_shape() {
        let input = json!({"leads": [{"locations": []}], "poles": [{"structureId": "FLAT-1"}]});
        let poles = extract_pole_data(&input);
        assert_eq!(poles[0].structure_id, "FLAT-1");
    }

    #[test]
    fn unrecognized_input_yields_no_poles() {
        assert!(extract_pole_data(&json!({"something": "else"})).is_empty());
        assert!(extract_pole_data(&json!([1, 2, 3])).is_empty());
    }

    #[test]
    fn validation_marks_assembly_units() {
        let input = json!({"locations": [location("P1", None, -106.6, 35.1)]});
        let mut poles = extract_pole_data(&input);
        let invalid = validate_pole_data(&mut poles);
        assert_eq!(invalid, 0);
        let att = &poles[0].layer(PROPOSED).unwrap().attachments[0];
        assert_eq!(att.is_valid, Some(true));

        poles[0].layer_mut(PROPOSED).unwrap().attachments[0].assembly_unit = "  ".into();
        assert_eq!(validate_pole_data(&mut poles), 1);
    }

    #[test]
    fn stress_ratio_from_analysis_results() {
        let design = json!({"analysis": [{"results": [
            {"component": "Pole", "analysisType": "STRESS", "unit": "PERCENT", "actual": 45.0},
            {"component": "Pole", "analysisType": "STRESS", "actual": 30.0, "allowable": 50.0},
            {"component": "Anchor#1", "analysisType": "STRESS", "unit": "PERCENT", "actual": 99.0}
        ]}]});
        let analysis = build_analysis(&design).unwrap();
        assert!((analysis.max_stress_ratio.unwrap() - 0.6).abs() < 1e-9);
    }

    #[test]
    fn layer_names() {
        assert_eq!(layer_name(&json!({"label": "Remedy Design"}), 0), REMEDY);
        assert_eq!(layer_name(&json!({"layerType": "Measured"}), 0), EXISTING);
        assert_eq!(layer_name(&json!({"label": "alt"}), 2), "ALT");
        assert_eq!(layer_name(&json!({}), 2), "DESIGN_3");
    }

    #[test]
    fn project_info_extraction() {
        let input = json!({
            "engineer": "J. Rivera",
            "generalLocation": "Albuquerque",
            "address": {"number": "100", "street": "Main St", "city": "ABQ", "state": ""},
            "defaultLoadCases": ["NESC Medium B", {"name": "NESC Heavy"}]
        });
        let info = extract_project_info(&input);
        assert_eq!(info.engineer, "J. Rivera");
        assert_eq!(info.comments, "");
        assert_eq!(info.address, "100, Main St, ABQ");
        assert_eq!(
            info.default_load_cases.unwrap(),
            vec!["NESC Medium B".to_string(), "NESC Heavy".to_string()]
        );
        assert!(extract_project_info(&json!({})).default_load_cases.is_none());
    }

    #[test]
    fn location_values_follow_parser_order() {
        let input = json!({"locations": [{"label": "a"}, {"label": "b"}]});
        let labels: Vec<String> = location_values(&input)
            .iter()
            .map(|l| field_text(l, "label"))
            .collect();
        assert_eq!(labels, vec!["a", "b"]);
    }
}
