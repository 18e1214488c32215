use std::collections::BTreeMap;
use std::fmt;

use polecheck_core::{Coordinates, PoleWire};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Spans
// ---------------------------------------------------------------------------

/// Order-independent pole pair. `pole_a <= pole_b` always holds.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SpanKey {
    pub pole_a: String,
    pub pole_b: String,
}

impl SpanKey {
    pub fn new(a: &str, b: &str) -> Self {
        if a <= b {
            Self { pole_a: a.to_string(), pole_b: b.to_string() }
        } else {
            Self { pole_a: b.to_string(), pole_b: a.to_string() }
        }
    }
}

impl fmt::Display for SpanKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", self.pole_a, self.pole_b)
    }
}

/// Inferred physical connection between two poles within one layer.
/// Pole A is always the lexically smaller id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentifiedSpan {
    #[serde(rename = "poleA_Id")]
    pub pole_a_id: String,
    #[serde(rename = "poleA_WEP_Id")]
    pub pole_a_wep_id: String,
    #[serde(rename = "poleB_Id")]
    pub pole_b_id: String,
    #[serde(rename = "poleB_WEP_Id")]
    pub pole_b_wep_id: String,
}

impl IdentifiedSpan {
    /// Build with endpoints sorted by pole id.
    pub fn new(pole_x: &str, wep_x: &str, pole_y: &str, wep_y: &str) -> Self {
        if pole_x <= pole_y {
            Self {
                pole_a_id: pole_x.into(),
                pole_a_wep_id: wep_x.into(),
                pole_b_id: pole_y.into(),
                pole_b_wep_id: wep_y.into(),
            }
        } else {
            Self {
                pole_a_id: pole_y.into(),
                pole_a_wep_id: wep_y.into(),
                pole_b_id: pole_x.into(),
                pole_b_wep_id: wep_x.into(),
            }
        }
    }

    pub fn key(&self) -> SpanKey {
        SpanKey::new(&self.pole_a_id, &self.pole_b_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SpanStatus {
    Matched,
    AddedInRemedy,
    RemovedInRemedy,
}

impl fmt::Display for SpanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Matched => write!(f, "MATCHED"),
            Self::AddedInRemedy => write!(f, "ADDED_IN_REMEDY"),
            Self::RemovedInRemedy => write!(f, "REMOVED_IN_REMEDY"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WireChangeType {
    Added,
    Removed,
    Modified,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WireChange {
    #[serde(rename = "type")]
    pub change_type: WireChangeType,
    pub pole_id: String,
    pub wire_end_point_id: String,
    pub wire: PoleWire,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_wire: Option<PoleWire>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub change_details: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpanComparisonResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proposed_span: Option<IdentifiedSpan>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remedy_span: Option<IdentifiedSpan>,
    #[serde(rename = "poleA_Id")]
    pub pole_a_id: String,
    #[serde(rename = "poleB_Id")]
    pub pole_b_id: String,
    #[serde(rename = "changesAtPoleA")]
    pub changes_at_pole_a: Vec<WireChange>,
    #[serde(rename = "changesAtPoleB")]
    pub changes_at_pole_b: Vec<WireChange>,
    pub span_status: SpanStatus,
}

impl SpanComparisonResult {
    pub fn key(&self) -> SpanKey {
        SpanKey::new(&self.pole_a_id, &self.pole_b_id)
    }

    pub fn changes(&self) -> impl Iterator<Item = &WireChange> {
        self.changes_at_pole_a.iter().chain(self.changes_at_pole_b.iter())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DesignComparisonSummary {
    pub spans_matched: usize,
    pub spans_added: usize,
    pub spans_removed: usize,
    pub wires_added: usize,
    pub wires_removed: usize,
    pub wires_modified: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DesignComparisonResults {
    pub span_results: Vec<SpanComparisonResult>,
    pub summary: DesignComparisonSummary,
}

// ---------------------------------------------------------------------------
// Fiber-map reconciliation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FiberMatchStatus {
    Match,
    Mismatch,
    JsonOnly,
    KmzOnly,
    NoFiberFound,
    NoKmzNearby,
    NoPoleCoords,
    NoKmzDataLoaded,
}

impl fmt::Display for FiberMatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Match => "MATCH",
            Self::Mismatch => "MISMATCH",
            Self::JsonOnly => "JSON_ONLY",
            Self::KmzOnly => "KMZ_ONLY",
            Self::NoFiberFound => "NO_FIBER_FOUND",
            Self::NoKmzNearby => "NO_KMZ_NEARBY",
            Self::NoPoleCoords => "NO_POLE_COORDS",
            Self::NoKmzDataLoaded => "NO_KMZ_DATA_LOADED",
        };
        write!(f, "{s}")
    }
}

/// Address of one wire inside the parsed model.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireRef {
    pub structure_id: String,
    pub layer: String,
    pub wire_id: String,
}

/// One row of the span fiber comparison table.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedSpanData {
    /// Stable synthetic id (`poleA|poleB`), used to address fiber-size edits.
    pub span_id: String,
    #[serde(rename = "poleA_Id")]
    pub pole_a_id: String,
    #[serde(rename = "poleB_Id")]
    pub pole_b_id: String,
    pub proposed_fiber_size: String,
    pub proposed_fiber_count: u32,
    pub remedy_fiber_size: String,
    pub remedy_fiber_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub midpoint: Option<Coordinates>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kmz_fiber_size: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kmz_fiber_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kmz_distance_m: Option<f64>,
    pub status: FiberMatchStatus,
    pub wire_refs: Vec<WireRef>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PoleMatchKind {
    DirectId,
    Nearest,
}

/// A fiber-map entry attached to a pole.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoleKmzMatch {
    pub kmz_index: usize,
    pub pole_id: String,
    /// Squared 1e-5-degree delta; 0 for direct id matches without coordinates.
    pub distance: f64,
    pub kind: PoleMatchKind,
    pub fiber_size: String,
    pub fiber_count: u32,
}

// ---------------------------------------------------------------------------
// QC
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QcStatus {
    Pass,
    Fail,
    Warning,
    NotChecked,
}

impl fmt::Display for QcStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pass => write!(f, "PASS"),
            Self::Fail => write!(f, "FAIL"),
            Self::Warning => write!(f, "WARNING"),
            Self::NotChecked => write!(f, "NOT_CHECKED"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QcCheckResult {
    pub status: QcStatus,
    pub message: String,
    pub details: Vec<String>,
}

impl QcCheckResult {
    pub fn new(status: QcStatus, message: impl Into<String>) -> Self {
        Self { status, message: message.into(), details: Vec::new() }
    }

    pub fn pass(message: impl Into<String>) -> Self {
        Self::new(QcStatus::Pass, message)
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self::new(QcStatus::Fail, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(QcStatus::Warning, message)
    }

    pub fn not_checked(message: impl Into<String>) -> Self {
        Self::new(QcStatus::NotChecked, message)
    }

    pub fn with_details(mut self, details: Vec<String>) -> Self {
        self.details = details;
        self
    }
}

/// The fixed battery of rules. Declaration order is report order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum QcRule {
    OwnerCheck,
    AnchorCheck,
    LayerComparisonCheck,
    PoleStressCheck,
    StationNameCheck,
    LoadCaseCheck,
    ProjectSettingsCheck,
    MessengerSizeCheck,
    FiberSizeCheck,
    WireEndPointOrderCheck,
    AssemblyUnitCheck,
    PoleSpecCheck,
    GlcCheck,
    EnvironmentCheck,
    ClearanceCheck,
    TensionCheck,
    AttachmentHeightCheck,
    SpanGeometryCheck,
}

impl QcRule {
    pub const ALL: [QcRule; 18] = [
        QcRule::OwnerCheck,
        QcRule::AnchorCheck,
        QcRule::LayerComparisonCheck,
        QcRule::PoleStressCheck,
        QcRule::StationNameCheck,
        QcRule::LoadCaseCheck,
        QcRule::ProjectSettingsCheck,
        QcRule::MessengerSizeCheck,
        QcRule::FiberSizeCheck,
        QcRule::WireEndPointOrderCheck,
        QcRule::AssemblyUnitCheck,
        QcRule::PoleSpecCheck,
        QcRule::GlcCheck,
        QcRule::EnvironmentCheck,
        QcRule::ClearanceCheck,
        QcRule::TensionCheck,
        QcRule::AttachmentHeightCheck,
        QcRule::SpanGeometryCheck,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Self::OwnerCheck => "Owner consistency",
            Self::AnchorCheck => "Anchor / guy spec",
            Self::LayerComparisonCheck => "Layer comparison",
            Self::PoleStressCheck => "Pole stress change",
            Self::StationNameCheck => "Station name format",
            Self::LoadCaseCheck => "Load cases",
            Self::ProjectSettingsCheck => "Project settings",
            Self::MessengerSizeCheck => "Messenger size",
            Self::FiberSizeCheck => "Fiber size",
            Self::WireEndPointOrderCheck => "Wire end point order",
            Self::AssemblyUnitCheck => "Assembly units",
            Self::PoleSpecCheck => "Pole specification",
            Self::GlcCheck => "Ground line circumference",
            Self::EnvironmentCheck => "WEP environment",
            Self::ClearanceCheck => "Clearances",
            Self::TensionCheck => "Wire tension",
            Self::AttachmentHeightCheck => "Attachment height",
            Self::SpanGeometryCheck => "Span geometry",
        }
    }
}

impl fmt::Display for QcRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QcResults {
    pub checks: BTreeMap<QcRule, QcCheckResult>,
    pub overall_status: QcStatus,
    pub pass_count: usize,
    pub fail_count: usize,
    pub warning_count: usize,
}

impl QcResults {
    pub fn get(&self, rule: QcRule) -> Option<&QcCheckResult> {
        self.checks.get(&rule)
    }
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoleQcResult {
    pub structure_id: String,
    pub results: QcResults,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QcSummary {
    pub poles: usize,
    pub pass: usize,
    pub fail: usize,
    pub warning: usize,
    pub not_checked: usize,
    /// False when the input matched none of the known shapes.
    pub recognized: bool,
    pub fiber_status_counts: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QcMeta {
    pub config_name: String,
    pub engine_version: String,
    pub run_at: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QcReport {
    pub meta: QcMeta,
    pub summary: QcSummary,
    pub poles: Vec<PoleQcResult>,
    pub design_comparison: DesignComparisonResults,
    pub fiber_comparison: Vec<ProcessedSpanData>,
}
