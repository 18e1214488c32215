//! QC evaluation: run every rule against one pole and roll the verdicts up.

use std::collections::BTreeMap;

use polecheck_core::{KmzFiberData, Pole, ProjectInfo};

use crate::config::QcConfig;
use crate::model::{QcCheckResult, QcResults, QcRule, QcStatus};

/// Everything a rule may look at. Rules never mutate it.
#[derive(Debug, Clone, Copy)]
pub struct RuleContext<'a> {
    pub pole: &'a Pole,
    pub project: Option<&'a ProjectInfo>,
    pub kmz: Option<&'a [KmzFiberData]>,
    /// The rest of the parsed poles, for rules that look across a span.
    /// Empty when a pole is checked on its own.
    pub neighbors: &'a [Pole],
    pub config: &'a QcConfig,
}

impl<'a> RuleContext<'a> {
    pub fn new(pole: &'a Pole, config: &'a QcConfig) -> Self {
        Self {
            pole,
            project: None,
            kmz: None,
            neighbors: &[],
            config,
        }
    }

    pub fn with_project(mut self, project: Option<&'a ProjectInfo>) -> Self {
        self.project = project;
        self
    }

    pub fn with_kmz(mut self, kmz: Option<&'a [KmzFiberData]>) -> Self {
        self.kmz = kmz;
        self
    }

    pub fn with_neighbors(mut self, neighbors: &'a [Pole]) -> Self {
        self.neighbors = neighbors;
        self
    }
}

/// Run the full battery against one pole.
pub fn run_qc_checks(
    pole: &Pole,
    project: Option<&ProjectInfo>,
    kmz: Option<&[KmzFiberData]>,
    config: &QcConfig,
) -> QcResults {
    let ctx = RuleContext::new(pole, config).with_project(project).with_kmz(kmz);
    run_rules(&ctx)
}

pub fn run_rules(ctx: &RuleContext<'_>) -> QcResults {
    let checks = QcRule::ALL
        .iter()
        .map(|rule| (*rule, rule.evaluate(ctx)))
        .collect();
    aggregate(checks)
}

/// FAIL beats WARNING beats PASS; all NOT_CHECKED stays NOT_CHECKED.
pub fn overall_status<'a>(statuses: impl IntoIterator<Item = &'a QcStatus>) -> QcStatus {
    let mut overall = QcStatus::NotChecked;
    for status in statuses {
        overall = match (overall, status) {
            (_, QcStatus::Fail) | (QcStatus::Fail, _) => QcStatus::Fail,
            (_, QcStatus::Warning) | (QcStatus::Warning, _) => QcStatus::Warning,
            (_, QcStatus::Pass) | (QcStatus::Pass, _) => QcStatus::Pass,
            _ => QcStatus::NotChecked,
        };
    }
    overall
}

pub fn aggregate(checks: BTreeMap<QcRule, QcCheckResult>) -> QcResults {
    let count = |s: QcStatus| checks.values().filter(|c| c.status == s).count();
    let overall_status = overall_status(checks.values().map(|c| &c.status));
    QcResults {
        pass_count: count(QcStatus::Pass),
        fail_count: count(QcStatus::Fail),
        warning_count: count(QcStatus::Warning),
        overall_status,
        checks,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn status_strategy() -> impl Strategy<Value = QcStatus> {
        prop_oneof![
            Just(QcStatus::Pass),
            Just(QcStatus::Fail),
            Just(QcStatus::Warning),
            Just(QcStatus::NotChecked),
        ]
    }

    fn results_from(statuses: &[QcStatus]) -> QcResults {
        let checks = QcRule::ALL
            .iter()
            .zip(statuses)
            .map(|(rule, status)| (*rule, QcCheckResult::new(*status, "")))
            .collect();
        aggregate(checks)
    }

    #[test]
    fn empty_is_not_checked() {
        let results = aggregate(BTreeMap::new());
        assert_eq!(results.overall_status, QcStatus::NotChecked);
        assert_eq!(results.pass_count + results.fail_count + results.warning_count, 0);
    }

    #[test]
    fn counts_skip_not_checked() {
        let results = results_from(&[
            QcStatus::Pass,
            QcStatus::Pass,
            QcStatus::Warning,
            QcStatus::NotChecked,
        ]);
        assert_eq!(results.overall_status, QcStatus::Warning);
        assert_eq!(results.pass_count, 2);
        assert_eq!(results.warning_count, 1);
        assert_eq!(results.fail_count, 0);
    }

    #[test]
    fn a_pole_always_gets_every_rule() {
        let pole = Pole::new("PL-1");
        let results = run_qc_checks(&pole, None, None, &QcConfig::default());
        assert_eq!(results.checks.len(), QcRule::ALL.len());
    }

    proptest! {
        #[test]
        fn any_fail_means_fail(statuses in prop::collection::vec(status_strategy(), 1..18)) {
            let results = results_from(&statuses);
            let expected = if statuses.contains(&QcStatus::Fail) {
                QcStatus::Fail
            } else if statuses.contains(&QcStatus::Warning) {
                QcStatus::Warning
            } else if statuses.contains(&QcStatus::Pass) {
                QcStatus::Pass
            } else {
                QcStatus::NotChecked
            };
            prop_assert_eq!(results.overall_status, expected);
        }
    }
}
