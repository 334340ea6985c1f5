//! # Bulk Stage Coordinator
//!
//! Applies one target stage to a batch of plantations.
//!
//! Best-effort batch semantics:
//! - Selected plantations not already at the target are moved and logged
//! - Selected plantations already at the target are left byte-for-byte unchanged
//! - Unknown ids are ignored and reported
//!
//! The target may be earlier than a plantation's current stage. Manual
//! correction of a wrongly advanced plantation goes through here, so the
//! coordinator does not enforce forward-only progression.
//! [`crate::system::suggested_target_stage`] is the forward-only hint for
//! callers that want one.

use crate::system::GrowthStage;
use crate::types::{Plantation, PlantationId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// What a bulk stage change did, for the audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkStageReport {
    pub target: GrowthStage,
    pub at: DateTime<Utc>,
    /// Plantations moved to `target`, in snapshot order.
    pub updated: Vec<PlantationId>,
    /// Selected plantations already at `target`.
    pub skipped: Vec<PlantationId>,
    /// Selected ids not present in the snapshot.
    pub missing: Vec<PlantationId>,
    pub note: Option<String>,
}

impl BulkStageReport {
    /// Did the batch change anything?
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.updated.is_empty()
    }

    /// One-line human-readable summary.
    #[must_use]
    pub fn audit_note(&self) -> String {
        let mut line = format!(
            "Moved {} plantation(s) to {} ({} already there",
            self.updated.len(),
            self.target,
            self.skipped.len()
        );
        if !self.missing.is_empty() {
            line.push_str(&format!(", {} not found", self.missing.len()));
        }
        line.push(')');
        if let Some(note) = &self.note {
            line.push_str(&format!(": {}", note));
        }
        line
    }
}

/// New snapshot plus the audit report.
#[derive(Debug, Clone)]
pub struct BulkStageOutcome {
    pub plantations: Vec<Plantation>,
    pub report: BulkStageReport,
}

/// The BulkStageCoordinator applies a stage to a selection of plantations.
pub struct BulkStageCoordinator;

impl BulkStageCoordinator {
    /// Move every selected plantation to `target`.
    ///
    /// Each moved plantation gets its `updated_at` bumped to `now` and a
    /// [`crate::types::StageUpdate`] carrying `note` appended to its log.
    pub fn apply(
        plantations: Vec<Plantation>,
        target: GrowthStage,
        selected_ids: &BTreeSet<PlantationId>,
        note: Option<String>,
        now: DateTime<Utc>,
    ) -> BulkStageOutcome {
        let note = note
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());

        let mut updated = Vec::new();
        let mut skipped = Vec::new();
        let mut seen = BTreeSet::new();

        let plantations: Vec<Plantation> = plantations
            .into_iter()
            .map(|mut plantation| {
                if !selected_ids.contains(&plantation.id) {
                    return plantation;
                }
                seen.insert(plantation.id.clone());

                let from = plantation.stage;
                if plantation.set_stage(target, note.clone(), now) {
                    if target < from {
                        tracing::info!(
                            plantation_id = %plantation.id,
                            from = %from,
                            to = %target,
                            "stage moved backwards by bulk update"
                        );
                    }
                    updated.push(plantation.id.clone());
                } else {
                    skipped.push(plantation.id.clone());
                }
                plantation
            })
            .collect();

        let missing: Vec<PlantationId> = selected_ids
            .iter()
            .filter(|id| !seen.contains(*id))
            .cloned()
            .collect();

        let report = BulkStageReport {
            target,
            at: now,
            updated,
            skipped,
            missing,
            note,
        };

        tracing::info!(
            target = %report.target,
            updated = report.updated.len(),
            skipped = report.skipped.len(),
            missing = report.missing.len(),
            "bulk stage update applied"
        );

        BulkStageOutcome {
            plantations,
            report,
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeDelta, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 7, 1, 8, 0, 0)
            .single()
            .expect("valid timestamp")
    }

    fn plantation(id: &str, stage: GrowthStage) -> Plantation {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).expect("valid date");
        let mut p = Plantation::new(PlantationId::new(id), id, start, t0());
        p.stage = stage;
        p
    }

    fn ids(list: &[&str]) -> BTreeSet<PlantationId> {
        list.iter().map(|s| PlantationId::new(*s)).collect()
    }

    #[test]
    fn moves_selected_and_skips_unselected() {
        let later = t0() + TimeDelta::days(3);
        let outcome = BulkStageCoordinator::apply(
            vec![
                plantation("a", GrowthStage::Planted),
                plantation("b", GrowthStage::Planted),
            ],
            GrowthStage::Growing,
            &ids(&["a"]),
            Some("Canopy closed".into()),
            later,
        );

        let a = &outcome.plantations[0];
        assert_eq!(a.stage, GrowthStage::Growing);
        assert_eq!(a.updated_at, later);
        assert_eq!(a.update_log[0].note.as_deref(), Some("Canopy closed"));

        let b = &outcome.plantations[1];
        assert_eq!(b.stage, GrowthStage::Planted);
        assert_eq!(b.updated_at, t0());

        assert_eq!(outcome.report.updated, vec![PlantationId::new("a")]);
    }

    #[test]
    fn batch_already_at_target_is_unchanged() {
        let input = vec![
            plantation("a", GrowthStage::Harvested),
            plantation("b", GrowthStage::Harvested),
        ];
        let outcome = BulkStageCoordinator::apply(
            input.clone(),
            GrowthStage::Harvested,
            &ids(&["a", "b"]),
            Some("again".into()),
            t0() + TimeDelta::days(1),
        );

        assert_eq!(outcome.plantations, input);
        assert!(outcome.report.is_noop());
        assert_eq!(outcome.report.skipped.len(), 2);
    }

    #[test]
    fn unknown_ids_are_reported_not_errors() {
        let outcome = BulkStageCoordinator::apply(
            vec![plantation("a", GrowthStage::Planted)],
            GrowthStage::Growing,
            &ids(&["a", "ghost"]),
            None,
            t0(),
        );
        assert_eq!(outcome.report.missing, vec![PlantationId::new("ghost")]);
        assert_eq!(outcome.report.updated.len(), 1);
    }

    #[test]
    fn regression_is_allowed() {
        let outcome = BulkStageCoordinator::apply(
            vec![plantation("a", GrowthStage::Harvested)],
            GrowthStage::Growing,
            &ids(&["a"]),
            Some("harvest entered by mistake".into()),
            t0(),
        );
        let a = &outcome.plantations[0];
        assert_eq!(a.stage, GrowthStage::Growing);
        assert_eq!(a.update_log[0].from, GrowthStage::Harvested);
        assert_eq!(a.harvested_on, None);
    }

    #[test]
    fn blank_note_is_dropped_and_audit_line_renders() {
        let outcome = BulkStageCoordinator::apply(
            vec![
                plantation("a", GrowthStage::Planted),
                plantation("b", GrowthStage::Growing),
            ],
            GrowthStage::Growing,
            &ids(&["a", "b", "zz"]),
            Some("   ".into()),
            t0(),
        );
        assert_eq!(outcome.plantations[0].update_log[0].note, None);
        assert_eq!(
            outcome.report.audit_note(),
            "Moved 1 plantation(s) to Growing (1 already there, 1 not found)"
        );
    }
}
