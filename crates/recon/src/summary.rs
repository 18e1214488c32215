use crate::fiber_compare::status_counts;
use crate::model::{PoleQcResult, ProcessedSpanData, QcStatus, QcSummary};

/// Roll per-pole verdicts and fiber rows into report-level counts.
pub fn compute_summary(poles: &[PoleQcResult], fiber: &[ProcessedSpanData], recognized: bool) -> QcSummary {
    let mut summary = QcSummary {
        poles: poles.len(),
        recognized,
        fiber_status_counts: status_counts(fiber),
        ..Default::default()
    };
    for pole in poles {
        match pole.results.overall_status {
            QcStatus::Pass => summary.pass += 1,
            QcStatus::Fail => summary.fail += 1,
            QcStatus::Warning => summary.warning += 1,
            QcStatus::NotChecked => summary.not_checked += 1,
        }
    }
    summary
}
