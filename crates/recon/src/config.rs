use serde::{Deserialize, Serialize};

use crate::error::QcError;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Thresholds and rule parameters. Every table is optional; missing values
/// take the defaults below.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QcConfig {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default)]
    pub span: SpanConfig,
    #[serde(default)]
    pub kmz: KmzConfig,
    #[serde(default)]
    pub rules: RuleConfig,
}

fn default_name() -> String {
    "default".into()
}

impl Default for QcConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            span: SpanConfig::default(),
            kmz: KmzConfig::default(),
            rules: RuleConfig::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Span geometry
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpanConfig {
    /// Max deviation from 180 degrees for two WEPs to face each other.
    pub angle_tolerance_deg: f64,
    /// Relative span-length tolerance.
    pub distance_rel_tolerance: f64,
    /// Absolute span-length tolerance used when lengths are near zero.
    pub distance_abs_tolerance: f64,
    /// Attachment-height change above which a wire counts as MODIFIED.
    pub wire_height_tolerance: f64,
}

impl Default for SpanConfig {
    fn default() -> Self {
        Self {
            angle_tolerance_deg: 5.0,
            distance_rel_tolerance: 0.05,
            distance_abs_tolerance: 0.01,
            wire_height_tolerance: 0.01,
        }
    }
}

// ---------------------------------------------------------------------------
// Fiber map
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KmzConfig {
    /// Max haversine distance from a span midpoint to its KMZ point.
    pub span_radius_m: f64,
    /// Pole matching, squared 1e-5-degree units.
    pub pole_close_threshold: f64,
    pub pole_far_threshold: f64,
    /// Below this share of close matches the far threshold is used.
    pub min_close_match_ratio: f64,
    /// Proximity used by the fiber-size rule when ids do not match.
    pub pole_radius_m: f64,
}

impl Default for KmzConfig {
    fn default() -> Self {
        Self {
            span_radius_m: 50.0,
            pole_close_threshold: 5000.0,
            pole_far_threshold: 10000.0,
            min_close_match_ratio: 0.5,
            pole_radius_m: 30.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleConfig {
    /// Relative max-stress change (EXISTING vs REMEDY) that warns.
    pub stress_change_threshold: f64,
    pub required_load_case: String,
    pub messenger_sizes: Vec<String>,
    pub guy_sizes: Vec<String>,
    /// When false, a non-standard guy size is reported but does not fail.
    pub enforce_guy_size: bool,
    pub guy_owner: String,
    pub anchor_size_marker: String,
    pub layer_match_height_tolerance: f64,
    /// Max deviation between a WEP direction and the bearing to its far pole.
    pub bearing_tolerance_deg: f64,
}

impl Default for RuleConfig {
    fn default() -> Self {
        Self {
            stress_change_threshold: 0.20,
            required_load_case: "NESC Medium B".into(),
            messenger_sizes: vec!["1/4".into(), "3/8".into(), "10M".into()],
            guy_sizes: vec!["3/8".into(), "1/2".into()],
            enforce_guy_size: false,
            guy_owner: "PNM".into(),
            anchor_size_marker: "12".into(),
            layer_match_height_tolerance: 0.1,
            bearing_tolerance_deg: 15.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl QcConfig {
    pub fn from_toml(input: &str) -> Result<Self, QcError> {
        let config: QcConfig =
            toml::from_str(input).map_err(|e| QcError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, QcError> {
        toml::to_string_pretty(self).map_err(|e| QcError::ConfigParse(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), QcError> {
        let positive = [
            ("span.angle_tolerance_deg", self.span.angle_tolerance_deg),
            ("span.distance_rel_tolerance", self.span.distance_rel_tolerance),
            ("span.distance_abs_tolerance", self.span.distance_abs_tolerance),
            ("span.wire_height_tolerance", self.span.wire_height_tolerance),
            ("kmz.span_radius_m", self.kmz.span_radius_m),
            ("kmz.pole_close_threshold", self.kmz.pole_close_threshold),
            ("kmz.pole_far_threshold", self.kmz.pole_far_threshold),
            ("kmz.pole_radius_m", self.kmz.pole_radius_m),
            ("rules.stress_change_threshold", self.rules.stress_change_threshold),
            ("rules.layer_match_height_tolerance", self.rules.layer_match_height_tolerance),
            ("rules.bearing_tolerance_deg", self.rules.bearing_tolerance_deg),
        ];
        for (field, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(QcError::ConfigValidation(format!(
                    "{field} must be a positive number, got {value}"
                )));
            }
        }

        if self.span.angle_tolerance_deg >= 90.0 {
            return Err(QcError::ConfigValidation(
                "span.angle_tolerance_deg must be below 90".into(),
            ));
        }

        if self.kmz.pole_far_threshold < self.kmz.pole_close_threshold {
            return Err(QcError::ConfigValidation(format!(
                "kmz.pole_far_threshold ({}) must not be below kmz.pole_close_threshold ({})",
                self.kmz.pole_far_threshold, self.kmz.pole_close_threshold
            )));
        }

        if !(0.0..=1.0).contains(&self.kmz.min_close_match_ratio) {
            return Err(QcError::ConfigValidation(format!(
                "kmz.min_close_match_ratio must be within [0, 1], got {}",
                self.kmz.min_close_match_ratio
            )));
        }

        if self.rules.required_load_case.trim().is_empty() {
            return Err(QcError::ConfigValidation(
                "rules.required_load_case must not be empty".into(),
            ));
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
