use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::text::{
    as_f64, coerce_text, field_text, lenient, lenient_bool, lenient_f64, lenient_list, lenient_opt,
    non_empty,
};

pub const EXISTING: &str = "EXISTING";
pub const PROPOSED: &str = "PROPOSED";
pub const REMEDY: &str = "REMEDY";

// ---------------------------------------------------------------------------
// Geometry values
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// From a GeoJSON-ordered `[lon, lat]` pair.
    pub fn from_lon_lat(pair: &[Value]) -> Option<Self> {
        let lon = pair.first()?.as_f64()?;
        let lat = pair.get(1)?.as_f64()?;
        if !lat.is_finite() || !lon.is_finite() {
            return None;
        }
        Some(Self::new(lat, lon))
    }

    /// `{latitude, longitude}` with numeric or numeric-text members.
    pub fn from_value(value: &Value) -> Option<Self> {
        let lat = value.get("latitude").and_then(as_f64)?;
        let lon = value.get("longitude").and_then(as_f64)?;
        if !lat.is_finite() || !lon.is_finite() {
            return None;
        }
        Some(Self::new(lat, lon))
    }
}

fn lenient_coordinates<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<Coordinates>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(Coordinates::from_value(&value))
}

/// A value with its unit, e.g. `{ "value": 12.5, "unit": "METRE" }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measure {
    pub value: f64,
    #[serde(default, deserialize_with = "lenient")]
    pub unit: String,
}

impl Measure {
    pub fn new(value: f64, unit: impl Into<String>) -> Self {
        Self { value, unit: unit.into() }
    }

    /// `{value, unit}` object or bare number. Non-finite values are dropped.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Object(_) => {
                let v = value.get("value").and_then(as_f64)?;
                Some(Self::new(v, field_text(value, "unit")))
            }
            other => as_f64(other).map(|v| Self::new(v, "")),
        }
        .filter(|m| m.value.is_finite())
    }

    /// Units are compared verbatim; no conversion is ever attempted.
    pub fn same_unit(&self, other: &Measure) -> bool {
        self.unit.trim() == other.unit.trim()
    }
}

fn lenient_measure<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Measure>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(Measure::from_value(&value))
}

// ---------------------------------------------------------------------------
// Owners and items
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Owner {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub industry: Option<String>,
}

impl Owner {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into(), industry: None }
    }

    /// Accepts `{id, industry}` objects as well as bare scalars.
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Object(_) => Self {
                id: field_text(value, "id"),
                industry: non_empty(field_text(value, "industry")),
            },
            other => Self { id: coerce_text(other), industry: None },
        }
    }

    pub fn same_as(&self, other: &Owner) -> bool {
        self.id.trim().eq_ignore_ascii_case(other.id.trim())
    }
}

impl<'de> Deserialize<'de> for Owner {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(Owner::from_value(&value))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClientItem {
    #[serde(default, deserialize_with = "lenient")]
    pub size: String,
    #[serde(rename = "type", default, deserialize_with = "lenient")]
    pub item_type: String,
}

/// A conductor or cable attached to a pole in one layer.
///
/// The fiber count is never stored; see [`crate::fiber::extract_fiber_size`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoleWire {
    #[serde(default, deserialize_with = "lenient")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient_opt", skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    #[serde(default)]
    pub owner: Owner,
    #[serde(default, deserialize_with = "lenient_measure", skip_serializing_if = "Option::is_none")]
    pub attachment_height: Option<Measure>,
    #[serde(default, deserialize_with = "lenient")]
    pub size: String,
    #[serde(rename = "type", default, deserialize_with = "lenient")]
    pub wire_type: String,
    #[serde(default, deserialize_with = "lenient")]
    pub description: String,
    #[serde(default)]
    pub client_item: ClientItem,
    #[serde(default, deserialize_with = "lenient_f64", skip_serializing_if = "Option::is_none")]
    pub tension: Option<f64>,
    #[serde(default, deserialize_with = "lenient_opt", skip_serializing_if = "Option::is_none")]
    pub usage_group: Option<String>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub associated_attachments: Vec<String>,
}

impl PoleWire {
    /// Diff key: `externalId` when present, else `id`.
    pub fn key(&self) -> &str {
        match self.external_id.as_deref() {
            Some(ext) if !ext.trim().is_empty() => ext,
            _ => &self.id,
        }
    }

    pub fn answers_to(&self, id: &str) -> bool {
        self.id == id || self.external_id.as_deref() == Some(id)
    }

    /// Best available size text: `clientItem.size`, then `size`.
    pub fn size_text(&self) -> &str {
        if !self.client_item.size.trim().is_empty() {
            &self.client_item.size
        } else {
            &self.size
        }
    }

    pub fn usage_is(&self, group: &str) -> bool {
        self.usage_group
            .as_deref()
            .map(|u| u.trim().eq_ignore_ascii_case(group))
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttachmentKind {
    Insulator,
    Equipment,
    Guy,
    Anchor,
    #[default]
    Other,
}

/// Unknown kinds fall back to [`AttachmentKind::Other`].
fn lenient_kind<'de, D: Deserializer<'de>>(deserializer: D) -> Result<AttachmentKind, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_default())
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    #[serde(default, deserialize_with = "lenient")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient_opt", skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_kind")]
    pub kind: AttachmentKind,
    #[serde(default, deserialize_with = "lenient")]
    pub attachment_type: String,
    #[serde(default)]
    pub owner: Owner,
    #[serde(default, deserialize_with = "lenient")]
    pub description: String,
    #[serde(default, deserialize_with = "lenient")]
    pub size: String,
    #[serde(default, deserialize_with = "lenient")]
    pub assembly_unit: String,
    #[serde(default, deserialize_with = "lenient_measure", skip_serializing_if = "Option::is_none")]
    pub height: Option<Measure>,
    #[serde(default, deserialize_with = "lenient_opt", skip_serializing_if = "Option::is_none")]
    pub usage_group: Option<String>,
    /// Set by validation: `assemblyUnit` is a non-empty string. Advisory only.
    #[serde(default, deserialize_with = "lenient_bool", skip_serializing_if = "Option::is_none")]
    pub is_valid: Option<bool>,
}

impl Attachment {
    pub fn answers_to(&self, id: &str) -> bool {
        self.id == id || self.external_id.as_deref() == Some(id)
    }
}

// ---------------------------------------------------------------------------
// Wire end points
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnvironmentStatus {
    #[serde(rename = "E")]
    Entered,
    #[serde(rename = "NE")]
    NotEntered,
}

impl EnvironmentStatus {
    /// `E` or `NE`; any other code means the status was never recorded.
    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim() {
            "E" => Some(Self::Entered),
            "NE" => Some(Self::NotEntered),
            _ => None,
        }
    }
}

fn lenient_status<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<EnvironmentStatus>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(EnvironmentStatus::from_code(&coerce_text(&value)))
}

/// Far-end termination of the wires leaving a pole, relative to that pole.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireEndPoint {
    #[serde(default, deserialize_with = "lenient")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient_opt", skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    /// Degrees, 0 = north, clockwise.
    #[serde(default, deserialize_with = "lenient_f64", skip_serializing_if = "Option::is_none")]
    pub direction: Option<f64>,
    #[serde(default, deserialize_with = "lenient_measure", skip_serializing_if = "Option::is_none")]
    pub distance: Option<Measure>,
    #[serde(rename = "type", default, deserialize_with = "lenient_opt", skip_serializing_if = "Option::is_none")]
    pub wep_type: Option<String>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub wires: Vec<String>,
    #[serde(default, deserialize_with = "lenient_opt", skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,
    #[serde(default, deserialize_with = "lenient_status", skip_serializing_if = "Option::is_none")]
    pub environment_status: Option<EnvironmentStatus>,
}

impl WireEndPoint {
    /// Direction and distance, when both are present and the id is usable.
    pub fn geometry(&self) -> Option<(f64, &Measure)> {
        if self.id.trim().is_empty() {
            return None;
        }
        let direction = self.direction.filter(|d| d.is_finite())?;
        let distance = self.distance.as_ref().filter(|d| d.value.is_finite())?;
        Some((direction, distance))
    }

    pub fn is_pole_to_pole(&self) -> bool {
        matches!(
            self.wep_type.as_deref().map(str::trim),
            Some("NEXT_POLE") | Some("PREVIOUS_POLE") | Some("OTHER_POLE")
        )
    }

    pub fn environment_entered(&self) -> bool {
        match self.environment_status {
            Some(EnvironmentStatus::Entered) => true,
            Some(EnvironmentStatus::NotEntered) => false,
            None => self
                .environment
                .as_deref()
                .map(|e| !e.trim().is_empty())
                .unwrap_or(false),
        }
    }
}

// ---------------------------------------------------------------------------
// Layers and poles
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoleProperties {
    #[serde(default, deserialize_with = "lenient")]
    pub species: String,
    #[serde(rename = "class", default, deserialize_with = "lenient")]
    pub pole_class: String,
    #[serde(default, deserialize_with = "lenient_measure", skip_serializing_if = "Option::is_none")]
    pub length: Option<Measure>,
    #[serde(default, deserialize_with = "lenient_measure", skip_serializing_if = "Option::is_none")]
    pub glc: Option<Measure>,
    #[serde(default, deserialize_with = "lenient_measure", skip_serializing_if = "Option::is_none")]
    pub agl: Option<Measure>,
    #[serde(default, deserialize_with = "lenient_opt", skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub remedies: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearanceResult {
    #[serde(default, deserialize_with = "lenient")]
    pub label: String,
    #[serde(default, deserialize_with = "lenient")]
    pub status: String,
    #[serde(default, deserialize_with = "lenient_f64", skip_serializing_if = "Option::is_none")]
    pub actual: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64", skip_serializing_if = "Option::is_none")]
    pub required: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub unit: String,
}

impl ClearanceResult {
    pub fn is_failing(&self) -> bool {
        matches!(
            self.status.trim().to_ascii_uppercase().as_str(),
            "FAIL" | "FAILED" | "FAILING" | "VIOLATION"
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResults {
    #[serde(default, deserialize_with = "lenient_f64", skip_serializing_if = "Option::is_none")]
    pub max_stress_ratio: Option<f64>,
}

/// One design variant of a pole. Layers never derive from one another.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoleLayer {
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    #[serde(default)]
    pub wires: Vec<PoleWire>,
    #[serde(default)]
    pub wire_end_points: Vec<WireEndPoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pole_properties: Option<PoleProperties>,
    #[serde(default)]
    pub clearance_results: Vec<ClearanceResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis_results: Option<AnalysisResults>,
}

impl PoleLayer {
    pub fn wire(&self, id: &str) -> Option<&PoleWire> {
        self.wires.iter().find(|w| w.answers_to(id))
    }

    pub fn attachment(&self, id: &str) -> Option<&Attachment> {
        self.attachments.iter().find(|a| a.answers_to(id))
    }

    pub fn wire_end_point(&self, id: &str) -> Option<&WireEndPoint> {
        self.wire_end_points.iter().find(|w| w.id == id)
    }

    /// Wires referenced by a WEP, resolved against this layer. Dangling ids are skipped.
    pub fn wires_for_end_point(&self, wep: &WireEndPoint) -> Vec<&PoleWire> {
        wep.wires.iter().filter_map(|id| self.wire(id)).collect()
    }

    pub fn max_stress_ratio(&self) -> Option<f64> {
        self.analysis_results.as_ref().and_then(|a| a.max_stress_ratio)
    }
}

/// One physical utility pole.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pole {
    #[serde(default, deserialize_with = "lenient")]
    pub structure_id: String,
    #[serde(default, deserialize_with = "lenient_opt", skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(default, deserialize_with = "lenient_coordinates", skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<Coordinates>,
    #[serde(default)]
    pub layers: BTreeMap<String, PoleLayer>,
}

impl Pole {
    pub fn new(structure_id: impl Into<String>) -> Self {
        Self {
            structure_id: structure_id.into(),
            ..Default::default()
        }
    }

    /// Case-insensitive layer lookup.
    pub fn layer(&self, name: &str) -> Option<&PoleLayer> {
        self.layers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v)
    }

    pub fn layer_mut(&mut self, name: &str) -> Option<&mut PoleLayer> {
        self.layers
            .iter_mut()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v)
    }

    /// The named layers that exist on this pole, with their canonical names.
    pub fn layers_named<'a>(&'a self, names: &'a [&'a str]) -> impl Iterator<Item = (&'a str, &'a PoleLayer)> + 'a {
        names
            .iter()
            .filter_map(move |name| self.layer(name).map(|layer| (*name, layer)))
    }
}

// ---------------------------------------------------------------------------
// Project + external fiber map
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectInfo {
    #[serde(default, deserialize_with = "lenient")]
    pub engineer: String,
    #[serde(default, deserialize_with = "lenient")]
    pub comments: String,
    #[serde(default, deserialize_with = "lenient")]
    pub general_location: String,
    #[serde(default, deserialize_with = "lenient")]
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_load_cases: Option<Vec<String>>,
}

/// One sample from an external fiber map.
///
/// `description` may itself encode the authoritative values as an HTML table,
/// a JSON object or free text; see [`crate::describe`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KmzFiberData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pole_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<Coordinates>,
    #[serde(default)]
    pub fiber_size: String,
    #[serde(default)]
    pub fiber_count: u32,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub c_sro: Option<String>,
}
