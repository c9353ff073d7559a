//! Outcome of a reconciliation run.

use std::fmt;

use serde::Serialize;

use crate::orchestrator::SyncPhase;

/// An item that could not be reconciled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemFailure {
    pub item: String,
    pub error: String,
}

/// Per-phase result containing the natural keys of the items touched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PhaseReport {
    pub created: Vec<String>,
    pub updated: Vec<String>,
    pub deleted: Vec<String>,
    pub skipped: Vec<String>,
    pub failed: Vec<ItemFailure>,
}

impl PhaseReport {
    pub fn created(&mut self, item: impl Into<String>) {
        self.created.push(item.into());
    }

    pub fn updated(&mut self, item: impl Into<String>) {
        self.updated.push(item.into());
    }

    pub fn deleted(&mut self, item: impl Into<String>) {
        self.deleted.push(item.into());
    }

    pub fn skipped(&mut self, item: impl Into<String>) {
        self.skipped.push(item.into());
    }

    /// Records a failed item and logs it. Processing of other items continues.
    pub fn failed(&mut self, item: impl Into<String>, error: impl fmt::Display) {
        let item = item.into();
        let error = error.to_string();
        tracing::warn!(item = %item, error = %error, "item reconciliation failed");
        self.failed.push(ItemFailure { item, error });
    }

    /// Records `created` or `updated` depending on whether the entity was new.
    pub fn upserted(&mut self, item: impl Into<String>, was_new: bool) {
        if was_new {
            self.created(item);
        } else {
            self.updated(item);
        }
    }

    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }

    /// Appends everything recorded in `other`.
    pub fn merge(&mut self, other: PhaseReport) {
        self.created.extend(other.created);
        self.updated.extend(other.updated);
        self.deleted.extend(other.deleted);
        self.skipped.extend(other.skipped);
        self.failed.extend(other.failed);
    }
}

/// Result of a whole run: one [`PhaseReport`] per executed phase, in order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReconcileReport {
    pub package: String,
    pub version: String,
    pub phases: Vec<(SyncPhase, PhaseReport)>,
}

impl ReconcileReport {
    pub fn new(package: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            version: version.into(),
            phases: Vec::new(),
        }
    }

    pub fn record(&mut self, phase: SyncPhase, report: PhaseReport) {
        self.phases.push((phase, report));
    }

    pub fn phase(&self, phase: SyncPhase) -> Option<&PhaseReport> {
        self.phases
            .iter()
            .find(|(p, _)| *p == phase)
            .map(|(_, report)| report)
    }

    pub fn has_failures(&self) -> bool {
        self.phases.iter().any(|(_, report)| report.has_failures())
    }

    /// Every failed item across phases.
    pub fn failures(&self) -> impl Iterator<Item = (SyncPhase, &ItemFailure)> {
        self.phases
            .iter()
            .flat_map(|(phase, report)| report.failed.iter().map(move |f| (*phase, f)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_report_counts() {
        let mut report = PhaseReport::default();
        report.upserted("a", true);
        report.upserted("b", false);
        report.deleted("c");
        report.failed("d", "boom");
        assert_eq!(report.created, vec!["a"]);
        assert_eq!(report.updated, vec!["b"]);
        assert_eq!(report.deleted, vec!["c"]);
        assert!(report.has_failures());
        assert_eq!(report.failed[0].error, "boom");
    }

    #[test]
    fn test_reconcile_report_lookup() {
        let mut run = ReconcileReport::new("blog", "1.0.0");
        let mut menus = PhaseReport::default();
        menus.failed("blog.menu", "denied");
        run.record(SyncPhase::SyncMenus, menus);
        run.record(SyncPhase::SyncSettings, PhaseReport::default());

        assert!(run.has_failures());
        assert!(run.phase(SyncPhase::SyncSettings).is_some());
        assert!(run.phase(SyncPhase::SyncResources).is_none());
        let failures: Vec<_> = run.failures().collect();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0, SyncPhase::SyncMenus);
    }
}
