//! User edits held as a patch over the parsed model, and the corrected-JSON
//! export that writes them back into the original document.
//!
//! The parsed `Pole` list is never mutated: [`EditOverlay::apply_to_poles`]
//! returns a patched copy and [`EditOverlay::export_corrected_json`] a patched
//! copy of the input JSON.

use std::collections::HashMap;

use log::{debug, warn};
use polecheck_core::fiber::is_fiber_text;
use polecheck_core::model::EnvironmentStatus;
use polecheck_core::text::field_text;
use polecheck_core::{Pole, WireEndPoint, PROPOSED, REMEDY};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::config::QcConfig;
use crate::error::QcError;
use crate::fiber_compare::process_fiber_comparison_data;
use crate::model::WireRef;
use crate::parse::{layer_name, location_values_mut, StructureIds};

pub const EXPORT_FILE_NAME: &str = "updated-spidacalc-data.json";

/// Environment entered for a pole, or for one of its wire end points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentEdit {
    pub structure_id: String,
    pub environment: String,
    /// When absent the pole record and every WEP on the pole are updated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wire_end_point_id: Option<String>,
}

/// New fiber size text for every fiber wire of one span (`poleA|poleB`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FiberSizeEdit {
    pub span_id: String,
    pub fiber_size: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditOverlay {
    #[serde(default)]
    pub environments: Vec<EnvironmentEdit>,
    #[serde(default)]
    pub fiber_sizes: Vec<FiberSizeEdit>,
    /// Rewrite REMEDY wire end points into PROPOSED order.
    #[serde(default)]
    pub reorder_wire_end_points: bool,
}

impl EditOverlay {
    pub fn from_json(input: &str) -> Result<Self, QcError> {
        serde_json::from_str(input).map_err(|e| QcError::OverlayParse(e.to_string()))
    }

    pub fn is_empty(&self) -> bool {
        self.environments.is_empty() && self.fiber_sizes.is_empty() && !self.reorder_wire_end_points
    }

    /// Wires addressed by each fiber edit, resolved against the unedited model.
    fn fiber_targets(&self, poles: &[Pole], config: &QcConfig) -> HashMap<WireRef, String> {
        if self.fiber_sizes.is_empty() {
            return HashMap::new();
        }
        let rows = process_fiber_comparison_data(poles, None, config);
        let mut targets = HashMap::new();
        for edit in &self.fiber_sizes {
            let Some(row) = rows.iter().find(|r| r.span_id == edit.span_id) else {
                warn!("fiber size edit for unknown span '{}' ignored", edit.span_id);
                continue;
            };
            for wire_ref in &row.wire_refs {
                targets.insert(wire_ref.clone(), edit.fiber_size.clone());
            }
        }
        targets
    }

    /// Patched copy of the parsed poles.
    pub fn apply_to_poles(&self, poles: &[Pole], config: &QcConfig) -> Vec<Pole> {
        let targets = self.fiber_targets(poles, config);
        let mut patched = poles.to_vec();

        for pole in patched.iter_mut() {
            for edit in self.environments.iter().filter(|e| e.structure_id == pole.structure_id) {
                for layer in pole.layers.values_mut() {
                    if edit.wire_end_point_id.is_none() {
                        if let Some(props) = layer.pole_properties.as_mut() {
                            props.environment = Some(edit.environment.clone());
                        }
                    }
                    for wep in layer.wire_end_points.iter_mut().filter(|w| edit.targets(&w.id)) {
                        wep.environment = Some(edit.environment.clone());
                        wep.environment_status = Some(EnvironmentStatus::Entered);
                    }
                }
            }

            for (layer_key, layer) in pole.layers.iter_mut() {
                for wire in layer.wires.iter_mut() {
                    let key = WireRef {
                        structure_id: pole.structure_id.clone(),
                        layer: layer_key.clone(),
                        wire_id: wire.id.clone(),
                    };
                    if let Some(size) = targets.get(&key) {
                        wire.client_item.size = size.clone();
                        wire.size = size.clone();
                        if is_fiber_text(&wire.description) {
                            wire.description = size.clone();
                        }
                    }
                }
            }

            if self.reorder_wire_end_points {
                reorder_wire_end_points(pole);
            }
        }
        patched
    }

    /// Corrected copy of the original input. Only the location-based shapes
    /// can be written back; other shapes are returned unchanged.
    pub fn export_corrected_json(&self, original: &Value, poles: &[Pole], config: &QcConfig) -> Value {
        let targets = self.fiber_targets(poles, config);
        let mut by_pole: HashMap<&str, Vec<(&WireRef, &String)>> = HashMap::new();
        for (wire_ref, size) in &targets {
            by_pole.entry(wire_ref.structure_id.as_str()).or_default().push((wire_ref, size));
        }

        let mut out = original.clone();
        let mut ids = StructureIds::default();
        let locations = location_values_mut(&mut out);
        if locations.is_empty() && !self.is_empty() {
            warn!("input has no locations; edits cannot be written back");
        }

        // Numbered exactly as the parser numbers them: non-object entries never count.
        for location in locations.into_iter().filter(|l| l.is_object()) {
            let structure_id = ids.assign(location);
            if self.reorder_wire_end_points && reorder_wire_end_points_for_location(location) {
                debug!("{structure_id}: REMEDY wire end points reordered");
            }

            let env_edits: Vec<&EnvironmentEdit> = self
                .environments
                .iter()
                .filter(|e| e.structure_id == structure_id)
                .collect();
            let fiber_edits = by_pole.get(structure_id.as_str());
            if env_edits.is_empty() && fiber_edits.is_none() {
                continue;
            }

            let Some(designs) = location.get_mut("designs").and_then(Value::as_array_mut) else {
                continue;
            };
            for (i, design) in designs.iter_mut().enumerate() {
                let layer = layer_name(design, i);
                let Some(structure) = design.get_mut("structure") else {
                    continue;
                };
                for edit in &env_edits {
                    write_environment(structure, edit);
                }
                for (wire_ref, size) in fiber_edits.into_iter().flatten() {
                    if wire_ref.layer == layer {
                        write_fiber_size(structure, &wire_ref.wire_id, size);
                    }
                }
            }
        }
        out
    }
}

impl EnvironmentEdit {
    fn targets(&self, wep_id: &str) -> bool {
        self.wire_end_point_id.as_deref().map_or(true, |id| id == wep_id)
    }
}

fn write_environment(structure: &mut Value, edit: &EnvironmentEdit) {
    if edit.wire_end_point_id.is_none() {
        if let Some(pole) = structure.get_mut("pole").and_then(Value::as_object_mut) {
            pole.insert("environment".into(), json!(edit.environment));
        }
    }
    let Some(weps) = structure.get_mut("wireEndPoints").and_then(Value::as_array_mut) else {
        return;
    };
    for wep in weps.iter_mut() {
        if !edit.targets(&field_text(wep, "id")) {
            continue;
        }
        if let Some(obj) = wep.as_object_mut() {
            obj.insert("environment".into(), json!(edit.environment));
            obj.insert("environmentStatus".into(), json!("E"));
        }
    }
}

fn write_fiber_size(structure: &mut Value, wire_id: &str, size: &str) {
    let Some(wires) = structure.get_mut("wires").and_then(Value::as_array_mut) else {
        return;
    };
    for wire in wires.iter_mut().filter(|w| field_text(w, "id") == wire_id) {
        let description = field_text(wire, "description");
        let Some(obj) = wire.as_object_mut() else {
            continue;
        };
        match obj.get_mut("clientItem") {
            Some(Value::Object(item)) => {
                item.insert("size".into(), json!(size));
            }
            _ => {
                obj.insert("clientItem".into(), json!({ "size": size }));
            }
        }
        obj.insert("size".into(), json!(size));
        if is_fiber_text(&description) {
            obj.insert("description".into(), json!(size));
        }
    }
}

// ---------------------------------------------------------------------------
// Wire end point order repair
// ---------------------------------------------------------------------------

/// Items whose id appears in `reference` come first, in reference order;
/// the rest keep their relative order at the end.
pub fn reorder_by_reference<T>(reference: &[String], items: Vec<T>, id_of: impl Fn(&T) -> String) -> Vec<T> {
    let position = |item: &T| reference.iter().position(|r| *r == id_of(item));
    let (mut shared, rest): (Vec<T>, Vec<T>) = items.into_iter().partition(|i| position(i).is_some());
    shared.sort_by_key(|i| position(i));
    shared.extend(rest);
    shared
}

/// Put the pole's REMEDY wire end points into PROPOSED order. Returns whether
/// anything moved.
pub fn reorder_wire_end_points(pole: &mut Pole) -> bool {
    let Some(reference) = pole
        .layer(PROPOSED)
        .map(|l| l.wire_end_points.iter().map(|w| w.id.clone()).collect::<Vec<_>>())
    else {
        return false;
    };
    let Some(remedy) = pole.layer_mut(REMEDY) else {
        return false;
    };
    let before: Vec<String> = remedy.wire_end_points.iter().map(|w| w.id.clone()).collect();
    let weps = std::mem::take(&mut remedy.wire_end_points);
    remedy.wire_end_points = reorder_by_reference(&reference, weps, |w: &WireEndPoint| w.id.clone());
    remedy.wire_end_points.iter().map(|w| &w.id).ne(before.iter())
}

/// JSON counterpart of [`reorder_wire_end_points`] for one raw location.
pub fn reorder_wire_end_points_for_location(location: &mut Value) -> bool {
    let Some(designs) = location.get_mut("designs").and_then(Value::as_array_mut) else {
        return false;
    };
    let layer_of: Vec<String> = designs.iter().enumerate().map(|(i, d)| layer_name(d, i)).collect();
    let wep_ids = |design: &Value| -> Vec<String> {
        design
            .get("structure")
            .and_then(|s| s.get("wireEndPoints"))
            .and_then(Value::as_array)
            .map(|weps| weps.iter().map(|w| field_text(w, "id")).collect())
            .unwrap_or_default()
    };

    let Some(reference) = layer_of
        .iter()
        .position(|l| l == PROPOSED)
        .map(|i| wep_ids(&designs[i]))
    else {
        return false;
    };
    let Some(remedy_index) = layer_of.iter().position(|l| l == REMEDY) else {
        return false;
    };
    let Some(weps) = designs[remedy_index]
        .get_mut("structure")
        .and_then(|s| s.get_mut("wireEndPoints"))
        .and_then(Value::as_array_mut)
    else {
        return false;
    };

    let before: Vec<String> = weps.iter().map(|w| field_text(w, "id")).collect();
    let reordered = reorder_by_reference(&reference, std::mem::take(weps), |w: &Value| field_text(w, "id"));
    *weps = reordered;
    weps.iter().map(|w| field_text(w, "id")).ne(before.into_iter())
}
