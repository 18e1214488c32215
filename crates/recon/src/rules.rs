//! The QC rule battery. Each rule is a pure function of a [`RuleContext`].
//!
//! Missing data degrades a rule to NOT_CHECKED or WARNING; only a positive
//! finding produces FAIL.

use polecheck_core::geo::{angular_difference, bearing_deg, haversine_m};
use polecheck_core::text::{contains_ci, ids_related};
use polecheck_core::{
    extract_fiber_size, is_fiber_wire, is_gigapower, Attachment, AttachmentKind, KmzFiberData,
    Measure, Pole, PoleLayer, PoleWire, WireEndPoint, EXISTING, PROPOSED, REMEDY,
};

use crate::kmz::kmz_count;
use crate::model::{QcCheckResult, QcRule, QcStatus};
use crate::qc::RuleContext;
use crate::spans::weps_reciprocal;

const DESIGN_LAYERS: &[&str] = &[PROPOSED, REMEDY];

impl QcRule {
    pub fn evaluate(&self, ctx: &RuleContext<'_>) -> QcCheckResult {
        match self {
            Self::OwnerCheck => owner_check(ctx),
            Self::AnchorCheck => anchor_check(ctx),
            Self::LayerComparisonCheck => layer_comparison_check(ctx),
            Self::PoleStressCheck => pole_stress_check(ctx),
            Self::StationNameCheck => station_name_check(ctx),
            Self::LoadCaseCheck => load_case_check(ctx),
            Self::ProjectSettingsCheck => project_settings_check(ctx),
            Self::MessengerSizeCheck => messenger_size_check(ctx),
            Self::FiberSizeCheck => fiber_size_check(ctx),
            Self::WireEndPointOrderCheck => wep_order_check(ctx),
            Self::AssemblyUnitCheck => assembly_unit_check(ctx),
            Self::PoleSpecCheck => pole_spec_check(ctx),
            Self::GlcCheck => glc_check(ctx),
            Self::EnvironmentCheck => environment_check(ctx),
            Self::ClearanceCheck => clearance_check(ctx),
            Self::TensionCheck => tension_check(ctx),
            Self::AttachmentHeightCheck => attachment_height_check(ctx),
            Self::SpanGeometryCheck => span_geometry_check(ctx),
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn design_layers(pole: &Pole) -> impl Iterator<Item = (&str, &PoleLayer)> {
    pole.layers_named(DESIGN_LAYERS)
}

fn all_layers(pole: &Pole) -> impl Iterator<Item = (&str, &PoleLayer)> {
    pole.layers.iter().map(|(name, layer)| (name.as_str(), layer))
}

/// Common shape of the counting rules: nothing inspected is NOT_CHECKED, any
/// issue gives `failing`, otherwise PASS.
fn verdict(checked: usize, issues: Vec<String>, failing: QcStatus, what: &str) -> QcCheckResult {
    if checked == 0 {
        return QcCheckResult::not_checked(format!("No {what} to check"));
    }
    if issues.is_empty() {
        return QcCheckResult::pass(format!("{checked} {what} checked, no issues"));
    }
    QcCheckResult::new(failing, format!("{} issue(s) across {checked} {what}", issues.len()))
        .with_details(issues)
}

fn fmt_measure(m: &Measure) -> String {
    if m.unit.is_empty() {
        format!("{:.2}", m.value)
    } else {
        format!("{:.2} {}", m.value, m.unit)
    }
}

fn heights_close(a: Option<&Measure>, b: Option<&Measure>, tolerance: f64) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a.same_unit(b) && (a.value - b.value).abs() <= tolerance,
        _ => false,
    }
}

fn same_text(a: &str, b: &str) -> bool {
    !a.trim().is_empty() && a.trim().eq_ignore_ascii_case(b.trim())
}

fn same_group(a: Option<&str>, b: Option<&str>) -> bool {
    a.unwrap_or("").trim().eq_ignore_ascii_case(b.unwrap_or("").trim())
}

// ---------------------------------------------------------------------------
// Ownership and hardware
// ---------------------------------------------------------------------------

fn owner_check(ctx: &RuleContext<'_>) -> QcCheckResult {
    let mut checked = 0;
    let mut issues = Vec::new();
    for (name, layer) in design_layers(ctx.pole) {
        for wire in &layer.wires {
            for attachment_id in &wire.associated_attachments {
                let Some(attachment) = layer.attachment(attachment_id) else {
                    continue;
                };
                checked += 1;
                if !wire.owner.same_as(&attachment.owner) {
                    issues.push(format!(
                        "{name}: wire {} (owner {}) on attachment {} (owner {})",
                        wire.id, wire.owner.id, attachment.id, attachment.owner.id
                    ));
                }
            }
        }
    }
    verdict(checked, issues, QcStatus::Fail, "wire attachments")
}

fn is_guy_wire(wire: &PoleWire) -> bool {
    wire.usage_is("GUY")
        || contains_ci(&wire.wire_type, "guy")
        || contains_ci(&wire.client_item.item_type, "guy")
}

fn anchor_check(ctx: &RuleContext<'_>) -> QcCheckResult {
    let rules = &ctx.config.rules;
    let mut checked = 0;
    let mut issues = Vec::new();
    let mut notes = Vec::new();

    for (name, layer) in design_layers(ctx.pole) {
        let guys: Vec<(&str, &str)> = layer
            .wires
            .iter()
            .filter(|w| is_guy_wire(w) && same_text(&w.owner.id, &rules.guy_owner))
            .map(|w| (w.id.as_str(), w.size_text()))
            .chain(
                layer
                    .attachments
                    .iter()
                    .filter(|a| a.kind == AttachmentKind::Guy && same_text(&a.owner.id, &rules.guy_owner))
                    .map(|a| (a.id.as_str(), a.size.as_str())),
            )
            .collect();
        if guys.is_empty() {
            continue;
        }

        let has_anchor = layer.attachments.iter().any(|a| {
            a.kind == AttachmentKind::Anchor
                && same_text(&a.owner.id, &rules.guy_owner)
                && [&a.description, &a.size, &a.attachment_type]
                    .iter()
                    .any(|t| t.contains(rules.anchor_size_marker.as_str()))
        });

        for (id, size) in guys {
            checked += 1;
            if !has_anchor {
                issues.push(format!(
                    "{name}: guy {id} has no {} anchor sized {}",
                    rules.guy_owner, rules.anchor_size_marker
                ));
            }
            if !rules.guy_sizes.iter().any(|s| size.contains(s.as_str())) {
                let msg = format!(
                    "{name}: guy {id} size '{size}' is not one of {}",
                    rules.guy_sizes.join(", ")
                );
                if rules.enforce_guy_size {
                    issues.push(msg);
                } else {
                    notes.push(format!("{msg} (not enforced)"));
                }
            }
        }
    }

    let mut result = verdict(checked, issues, QcStatus::Fail, &format!("{} guys", rules.guy_owner));
    result.details.extend(notes);
    result
}

fn attachments_correspond(a: &Attachment, b: &Attachment, tolerance: f64) -> bool {
    same_text(&a.id, &b.id)
        || matches!((&a.external_id, &b.external_id), (Some(x), Some(y)) if same_text(x, y))
        || (heights_close(a.height.as_ref(), b.height.as_ref(), tolerance)
            && same_text(&a.attachment_type, &b.attachment_type))
}

fn wires_correspond(a: &PoleWire, b: &PoleWire, tolerance: f64) -> bool {
    same_text(&a.id, &b.id)
        || matches!((&a.external_id, &b.external_id), (Some(x), Some(y)) if same_text(x, y))
        || (heights_close(a.attachment_height.as_ref(), b.attachment_height.as_ref(), tolerance)
            && same_text(&a.wire_type, &b.wire_type))
}

/// Owner and usage-group changes from EXISTING to each design layer. These
/// are often intentional, so they only warn.
fn layer_comparison_check(ctx: &RuleContext<'_>) -> QcCheckResult {
    let Some(existing) = ctx.pole.layer(EXISTING) else {
        return QcCheckResult::not_checked("No EXISTING layer to compare against");
    };
    let tolerance = ctx.config.rules.layer_match_height_tolerance;
    let mut checked = 0;
    let mut issues = Vec::new();

    for (name, layer) in design_layers(ctx.pole) {
        for before in &existing.attachments {
            let Some(after) = layer
                .attachments
                .iter()
                .find(|a| attachments_correspond(before, a, tolerance))
            else {
                continue;
            };
            checked += 1;
            if !before.owner.same_as(&after.owner) {
                issues.push(format!(
                    "{name}: attachment {} owner {} -> {}",
                    before.id, before.owner.id, after.owner.id
                ));
            }
            if !same_group(before.usage_group.as_deref(), after.usage_group.as_deref()) {
                issues.push(format!(
                    "{name}: attachment {} usage group {} -> {}",
                    before.id,
                    before.usage_group.as_deref().unwrap_or("-"),
                    after.usage_group.as_deref().unwrap_or("-")
                ));
            }
        }
        for before in &existing.wires {
            let Some(after) = layer.wires.iter().find(|w| wires_correspond(before, w, tolerance)) else {
                continue;
            };
            checked += 1;
            if !before.owner.same_as(&after.owner) {
                issues.push(format!(
                    "{name}: wire {} owner {} -> {}",
                    before.id, before.owner.id, after.owner.id
                ));
            }
            if !same_group(before.usage_group.as_deref(), after.usage_group.as_deref()) {
                issues.push(format!(
                    "{name}: wire {} usage group {} -> {}",
                    before.id,
                    before.usage_group.as_deref().unwrap_or("-"),
                    after.usage_group.as_deref().unwrap_or("-")
                ));
            }
        }
    }
    verdict(checked, issues, QcStatus::Warning, "corresponding items")
}

// ---------------------------------------------------------------------------
// Analysis and project
// ---------------------------------------------------------------------------

/// Relative change of max stress. A zero baseline with any nonzero remedy
/// stress counts as exactly 100%.
pub fn stress_change(existing: f64, remedy: f64) -> f64 {
    if existing == 0.0 {
        if remedy == 0.0 {
            0.0
        } else {
            1.0
        }
    } else {
        ((remedy - existing) / existing).abs()
    }
}

fn pole_stress_check(ctx: &RuleContext<'_>) -> QcCheckResult {
    let stress = |layer: &str| ctx.pole.layer(layer).and_then(|l| l.max_stress_ratio());
    let (Some(existing), Some(remedy)) = (stress(EXISTING), stress(REMEDY)) else {
        return QcCheckResult::not_checked("Stress results missing for EXISTING or REMEDY");
    };
    let change = stress_change(existing, remedy);
    let threshold = ctx.config.rules.stress_change_threshold;
    let detail = format!(
        "existing {:.1}%, remedy {:.1}%, change {:.1}%",
        existing * 100.0,
        remedy * 100.0,
        change * 100.0
    );
    if change > threshold {
        QcCheckResult::warning(format!("Pole stress changed by more than {:.0}%", threshold * 100.0))
            .with_details(vec![detail])
    } else {
        QcCheckResult::pass("Pole stress change within limits").with_details(vec![detail])
    }
}

fn station_name_check(ctx: &RuleContext<'_>) -> QcCheckResult {
    let id = &ctx.pole.structure_id;
    if id.chars().any(char::is_lowercase) {
        QcCheckResult::fail("Station name contains lowercase letters").with_details(vec![id.clone()])
    } else {
        QcCheckResult::pass("Station name format OK")
    }
}

fn load_case_check(ctx: &RuleContext<'_>) -> QcCheckResult {
    let Some(project) = ctx.project else {
        return QcCheckResult::not_checked("No project info");
    };
    let required = ctx.config.rules.required_load_case.as_str();
    match &project.default_load_cases {
        None => QcCheckResult::warning("No default load cases defined"),
        Some(cases) if cases.iter().any(|c| c.contains(required)) => {
            QcCheckResult::pass(format!("Load case '{required}' present"))
        }
        Some(cases) => QcCheckResult::fail(format!("Required load case '{required}' missing"))
            .with_details(cases.clone()),
    }
}

fn project_settings_check(ctx: &RuleContext<'_>) -> QcCheckResult {
    let Some(project) = ctx.project else {
        return QcCheckResult::not_checked("No project info");
    };
    let missing: Vec<String> = [
        ("engineer", &project.engineer),
        ("comments", &project.comments),
        ("generalLocation", &project.general_location),
        ("address", &project.address),
    ]
    .iter()
    .filter(|(_, value)| value.trim().is_empty())
    .map(|(field, _)| format!("{field} is empty"))
    .collect();

    if missing.is_empty() {
        QcCheckResult::pass("Project settings complete")
    } else {
        QcCheckResult::warning("Project settings incomplete").with_details(missing)
    }
}

// ---------------------------------------------------------------------------
// Wires and fiber
// ---------------------------------------------------------------------------

fn messenger_size_check(ctx: &RuleContext<'_>) -> QcCheckResult {
    let allowed = &ctx.config.rules.messenger_sizes;
    let mut checked = 0;
    let mut issues = Vec::new();
    for (name, layer) in design_layers(ctx.pole) {
        for wire in layer.wires.iter().filter(|w| w.usage_is("COMMUNICATION_BUNDLE")) {
            checked += 1;
            let size = wire.size_text().trim();
            if size.is_empty() {
                issues.push(format!("{name}: messenger {} has no size", wire.id));
            } else if !allowed.iter().any(|s| contains_ci(size, s)) {
                issues.push(format!(
                    "{name}: messenger {} size '{size}' is not one of {}",
                    wire.id,
                    allowed.join(", ")
                ));
            }
        }
    }
    verdict(checked, issues, QcStatus::Fail, "messengers")
}

fn kmz_relevant(pole: &Pole, entry: &KmzFiberData, radius_m: f64) -> bool {
    let by_id = entry.pole_id.as_deref().is_some_and(|id| {
        ids_related(id, &pole.structure_id)
            || pole.alias.as_deref().is_some_and(|alias| ids_related(id, alias))
    });
    by_id
        || matches!(
            (pole.coordinates, entry.coordinates),
            (Some(a), Some(b)) if haversine_m(a, b) <= radius_m
        )
}

fn fiber_size_check(ctx: &RuleContext<'_>) -> QcCheckResult {
    let Some(kmz) = ctx.kmz.filter(|k| !k.is_empty()) else {
        return QcCheckResult::warning("No fiber map data loaded");
    };
    let relevant: Vec<&KmzFiberData> = kmz
        .iter()
        .filter(|e| kmz_relevant(ctx.pole, e, ctx.config.kmz.pole_radius_m))
        .collect();
    if relevant.is_empty() {
        return QcCheckResult::warning("No fiber map data for this pole");
    }
    let Some(entry) = relevant.iter().copied().find(|e| is_gigapower(*e)) else {
        return QcCheckResult::pass("No Gigapower fiber data for this pole");
    };
    let expected = kmz_count(entry);
    if expected == 0 {
        return QcCheckResult::warning("Gigapower fiber map entry has no fiber count")
            .with_details(vec![entry.fiber_size.clone()]);
    }

    let mut passed = 0;
    let mut failed = 0;
    let mut details = Vec::new();
    for (name, layer) in design_layers(ctx.pole) {
        let wires: Vec<&PoleWire> = layer.wires.iter().filter(|w| is_fiber_wire(w)).collect();
        if wires.is_empty() {
            details.push(format!("{name}: no fiber wires, skipped"));
            continue;
        }
        let total: u32 = wires.iter().map(|w| extract_fiber_size(*w)).sum();
        if total == expected {
            passed += 1;
            details.push(format!("{name}: {total} fibers, matches fiber map"));
        } else {
            failed += 1;
            details.push(format!("{name}: {total} fibers, fiber map says {expected}"));
        }
    }

    let result = if failed > 0 {
        QcCheckResult::fail(format!("Fiber count mismatch in {failed} layer(s)"))
    } else if passed > 0 {
        QcCheckResult::pass("Fiber count matches fiber map")
    } else {
        QcCheckResult::warning("No fiber wires in PROPOSED or REMEDY")
    };
    result.with_details(details)
}

/// Ids present in both lists, each list keeping its own relative order.
pub fn common_wep_order(proposed: &[WireEndPoint], remedy: &[WireEndPoint]) -> (Vec<String>, Vec<String>) {
    let ordered = |from: &[WireEndPoint], other: &[WireEndPoint]| -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for wep in from {
            if other.iter().any(|o| o.id == wep.id) && !out.contains(&wep.id) {
                out.push(wep.id.clone());
            }
        }
        out
    };
    (ordered(proposed, remedy), ordered(remedy, proposed))
}

fn wep_order_check(ctx: &RuleContext<'_>) -> QcCheckResult {
    let (Some(proposed), Some(remedy)) = (ctx.pole.layer(PROPOSED), ctx.pole.layer(REMEDY)) else {
        return QcCheckResult::not_checked("PROPOSED and REMEDY layers are both required");
    };
    let (p_order, r_order) = common_wep_order(&proposed.wire_end_points, &remedy.wire_end_points);
    if p_order.is_empty() {
        return QcCheckResult::not_checked("No wire end points shared by PROPOSED and REMEDY");
    }
    if p_order == r_order {
        QcCheckResult::pass(format!("{} shared wire end points in the same order", p_order.len()))
    } else {
        QcCheckResult::fail("Wire end point order differs between PROPOSED and REMEDY").with_details(vec![
            format!("PROPOSED: {}", p_order.join(", ")),
            format!("REMEDY: {}", r_order.join(", ")),
        ])
    }
}

fn tension_check(ctx: &RuleContext<'_>) -> QcCheckResult {
    let mut checked = 0;
    let mut issues = Vec::new();
    for (name, layer) in design_layers(ctx.pole) {
        for wire in &layer.wires {
            checked += 1;
            if wire.tension.filter(|t| t.is_finite()).is_none() {
                issues.push(format!("{name}: wire {} has no tension", wire.id));
            }
        }
    }
    verdict(checked, issues, QcStatus::Warning, "wires")
}

// ---------------------------------------------------------------------------
// Pole record completeness
// ---------------------------------------------------------------------------

fn assembly_unit_check(ctx: &RuleContext<'_>) -> QcCheckResult {
    let mut checked = 0;
    let mut issues = Vec::new();
    for (name, layer) in design_layers(ctx.pole) {
        for attachment in &layer.attachments {
            checked += 1;
            let valid = attachment
                .is_valid
                .unwrap_or_else(|| !attachment.assembly_unit.trim().is_empty());
            if !valid {
                issues.push(format!("{name}: {:?} {} has no assembly unit", attachment.kind, attachment.id));
            }
        }
    }
    verdict(checked, issues, QcStatus::Warning, "attachments")
}

fn pole_spec_check(ctx: &RuleContext<'_>) -> QcCheckResult {
    let mut checked = 0;
    let mut issues = Vec::new();
    for (name, layer) in design_layers(ctx.pole) {
        let Some(props) = &layer.pole_properties else {
            continue;
        };
        checked += 1;
        let mut missing = Vec::new();
        if props.species.trim().is_empty() {
            missing.push("species");
        }
        if props.pole_class.trim().is_empty() {
            missing.push("class");
        }
        if props.length.is_none() {
            missing.push("length");
        }
        if !missing.is_empty() {
            issues.push(format!("{name}: missing {}", missing.join(", ")));
        }
    }
    verdict(checked, issues, QcStatus::Warning, "pole specifications")
}

fn glc_check(ctx: &RuleContext<'_>) -> QcCheckResult {
    let mut checked = 0;
    let mut issues = Vec::new();
    for (name, layer) in design_layers(ctx.pole) {
        let Some(props) = &layer.pole_properties else {
            continue;
        };
        checked += 1;
        match &props.glc {
            None => issues.push(format!("{name}: no ground line circumference")),
            Some(glc) if glc.value <= 0.0 => {
                issues.push(format!("{name}: ground line circumference is {}", fmt_measure(glc)))
            }
            Some(_) => {}
        }
    }
    verdict(checked, issues, QcStatus::Warning, "pole records")
}

fn environment_check(ctx: &RuleContext<'_>) -> QcCheckResult {
    let mut checked = 0;
    let mut issues = Vec::new();
    for (name, layer) in all_layers(ctx.pole) {
        for wep in &layer.wire_end_points {
            checked += 1;
            if !wep.environment_entered() {
                issues.push(format!("{name}: wire end point {} environment not entered", wep.id));
            }
        }
    }
    verdict(checked, issues, QcStatus::Warning, "wire end points")
}

fn clearance_check(ctx: &RuleContext<'_>) -> QcCheckResult {
    let mut checked = 0;
    let mut issues = Vec::new();
    for (name, layer) in all_layers(ctx.pole) {
        for clearance in &layer.clearance_results {
            checked += 1;
            if clearance.is_failing() {
                let value = |v: Option<f64>| v.map(|v| format!("{v:.2}")).unwrap_or_else(|| "?".into());
                issues.push(format!(
                    "{name}: {} actual {} required {} {}",
                    clearance.label,
                    value(clearance.actual),
                    value(clearance.required),
                    clearance.unit
                ).trim_end().to_string());
            }
        }
    }
    verdict(checked, issues, QcStatus::Fail, "clearance results")
}

fn attachment_height_check(ctx: &RuleContext<'_>) -> QcCheckResult {
    let mut checked = 0;
    let mut issues = Vec::new();
    for (name, layer) in design_layers(ctx.pole) {
        let Some(agl) = layer.pole_properties.as_ref().and_then(|p| p.agl.as_ref()) else {
            continue;
        };
        let heights = layer
            .wires
            .iter()
            .filter_map(|w| w.attachment_height.as_ref().map(|h| ("wire", w.id.as_str(), h)))
            .chain(
                layer
                    .attachments
                    .iter()
                    .filter_map(|a| a.height.as_ref().map(|h| ("attachment", a.id.as_str(), h))),
            );
        for (kind, id, height) in heights {
            if !height.same_unit(agl) {
                continue;
            }
            checked += 1;
            if height.value > agl.value {
                issues.push(format!(
                    "{name}: {kind} {id} at {} is above pole top {}",
                    fmt_measure(height),
                    fmt_measure(agl)
                ));
            }
        }
    }
    verdict(checked, issues, QcStatus::Fail, "attachment heights")
}

fn span_geometry_check(ctx: &RuleContext<'_>) -> QcCheckResult {
    let tolerance = ctx.config.rules.bearing_tolerance_deg;
    let mut checked = 0;
    let mut issues = Vec::new();

    for (name, layer) in design_layers(ctx.pole) {
        for wep in layer.wire_end_points.iter().filter(|w| w.is_pole_to_pole()) {
            checked += 1;
            if wep.direction.is_none() {
                issues.push(format!("{name}: wire end point {} has no direction", wep.id));
            }
            match &wep.distance {
                Some(d) if d.value > 0.0 => {}
                _ => issues.push(format!("{name}: wire end point {} has no positive distance", wep.id)),
            }
            if wep.wires.is_empty() {
                issues.push(format!("{name}: wire end point {} carries no wires", wep.id));
            }

            let (Some(here), Some((direction, _))) = (ctx.pole.coordinates, wep.geometry()) else {
                continue;
            };
            let far = ctx.neighbors.iter().find(|other| {
                other.structure_id != ctx.pole.structure_id
                    && other.coordinates.is_some()
                    && other.layer(name).is_some_and(|l| {
                        l.wire_end_points
                            .iter()
                            .any(|o| weps_reciprocal(wep, o, &ctx.config.span))
                    })
            });
            if let Some(there) = far.and_then(|p| p.coordinates.map(|c| (p, c))) {
                let bearing = bearing_deg(here, there.1);
                let off = angular_difference(bearing, direction);
                if off > tolerance {
                    issues.push(format!(
                        "{name}: wire end point {} points {direction:.0}°, {} lies at {bearing:.0}°",
                        wep.id, there.0.structure_id
                    ));
                }
            }
        }
    }
    verdict(checked, issues, QcStatus::Warning, "pole-to-pole wire end points")
}
