//! # Session Module
//!
//! Host-level operations over a store and a clock.
//!
//! A `Session` is what the CLI talks to. It loads snapshots from the store,
//! hands them to the pure engines (scheduler, scorer, bulk coordinator) with
//! the current instant, and writes the results back.
//!
//! ## Storage Backends
//!
//! - `InMemory`: [`MemoryStore`] (fast, volatile)
//! - `Persistent`: [`RedbStore`] (disk-backed, ACID)

use crate::bulk::{BulkStageCoordinator, BulkStageReport};
use crate::health::{HealthReport, HealthScorer, average_days_to_harvest};
use crate::ports::{Clock, MemoryStore, PlantationStore, SystemClock};
use crate::primitives;
use crate::scheduler::{
    ApplyOutcome, RecurringTaskTemplate, SchedulerRun, TemplateDraft, process_templates,
};
use crate::storage::RedbStore;
use crate::system::{GrowthStage, suggested_target_stage};
use crate::types::{
    CollaboratorRef, Plantation, PlantationDraft, PlantationId, Task, TaskId, TaskStatus,
    VerdantError, YieldCheckpoint,
};
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::BTreeSet;
use std::path::Path;

/// Storage backend for a Session.
#[derive(Debug)]
pub enum StorageBackend {
    /// In-memory store (fast, volatile).
    InMemory(MemoryStore),
    /// Disk-backed store using redb (ACID, persistent).
    Persistent(RedbStore),
}

impl Default for StorageBackend {
    fn default() -> Self {
        Self::InMemory(MemoryStore::new())
    }
}

impl StorageBackend {
    fn store(&self) -> &dyn PlantationStore {
        match self {
            Self::InMemory(store) => store,
            Self::Persistent(store) => store,
        }
    }

    fn store_mut(&mut self) -> &mut dyn PlantationStore {
        match self {
            Self::InMemory(store) => store,
            Self::Persistent(store) => store,
        }
    }
}

/// Result of one scheduler pass, as committed.
#[derive(Debug, Clone)]
pub struct SchedulerSummary {
    pub run: SchedulerRun,
    pub outcome: ApplyOutcome,
}

/// A Session combines a store with a clock.
pub struct Session {
    backend: StorageBackend,
    clock: Box<dyn Clock>,
    scorer: HealthScorer,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("backend", &self.backend)
            .finish_non_exhaustive()
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    /// Create an empty in-memory session on the system clock.
    #[must_use]
    pub fn new() -> Self {
        Self::with_backend(StorageBackend::default())
    }

    /// Create a session over an existing backend, on the system clock.
    #[must_use]
    pub fn with_backend(backend: StorageBackend) -> Self {
        Self {
            backend,
            clock: Box::new(SystemClock),
            scorer: HealthScorer::new(),
        }
    }

    /// Create a session with persistent redb storage.
    ///
    /// Opens or creates a redb database at the given path.
    /// All changes are persisted as they are made.
    pub fn with_redb(path: impl AsRef<Path>) -> Result<Self, VerdantError> {
        let store = RedbStore::open(path)?;
        Ok(Self::with_backend(StorageBackend::Persistent(store)))
    }

    /// Replace the clock.
    #[must_use]
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// Is this session backed by disk?
    #[must_use]
    pub fn is_persistent(&self) -> bool {
        matches!(self.backend, StorageBackend::Persistent(_))
    }

    /// The session's current instant.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    // =========================================================================
    // READS
    // =========================================================================

    /// Fetch one plantation.
    pub fn plantation(&self, id: &PlantationId) -> Result<Plantation, VerdantError> {
        self.backend
            .store()
            .get_plantation(id)?
            .ok_or_else(|| VerdantError::PlantationNotFound(id.clone()))
    }

    /// Every plantation, ordered by id.
    pub fn plantations(&self) -> Result<Vec<Plantation>, VerdantError> {
        self.backend.store().list_plantations()
    }

    /// Every recurring template, ordered by id.
    pub fn templates(&self) -> Result<Vec<RecurringTaskTemplate>, VerdantError> {
        self.backend.store().list_templates()
    }

    // =========================================================================
    // PLANTATION EDITS
    // =========================================================================

    /// Create a plantation from raw input.
    pub fn add_plantation(&mut self, draft: PlantationDraft) -> Result<Plantation, VerdantError> {
        let plantation = draft.into_plantation(self.now());
        self.backend
            .store_mut()
            .insert_plantation(plantation.clone())?;
        tracing::info!(plantation_id = %plantation.id, "plantation added");
        Ok(plantation)
    }

    /// Validate and store a recurring template.
    pub fn add_template(
        &mut self,
        draft: TemplateDraft,
    ) -> Result<RecurringTaskTemplate, VerdantError> {
        let template = RecurringTaskTemplate::try_from(draft)?;
        self.backend
            .store_mut()
            .insert_template(template.clone())?;
        tracing::info!(
            template_id = %template.id,
            plantation_id = %template.plantation_id,
            frequency = %template.frequency,
            "template added"
        );
        Ok(template)
    }

    /// Add a one-off task. The id is `<plantation>#<n>`, the first free `n`.
    pub fn add_task(
        &mut self,
        plantation_id: &PlantationId,
        title: &str,
        description: Option<String>,
        due_date: DateTime<Utc>,
    ) -> Result<Task, VerdantError> {
        let title = title.trim();
        if title.is_empty() || title.len() > primitives::MAX_TITLE_LENGTH {
            return Err(VerdantError::InvalidTask(format!(
                "title must be 1..={} characters",
                primitives::MAX_TITLE_LENGTH
            )));
        }

        let now = self.now();
        self.edit(plantation_id, |plantation| {
            let mut n = plantation.tasks.len().saturating_add(1);
            let mut id = TaskId(format!("{}#{}", plantation.id, n));
            while plantation.task(&id).is_some() {
                n = n.saturating_add(1);
                id = TaskId(format!("{}#{}", plantation.id, n));
            }
            let task = Task::new(id, title, due_date).with_description(description);
            plantation.push_task(task.clone(), now);
            Ok(task)
        })
    }

    /// Change a task's status.
    pub fn set_task_status(
        &mut self,
        plantation_id: &PlantationId,
        task_id: &TaskId,
        status: TaskStatus,
    ) -> Result<(), VerdantError> {
        let now = self.now();
        self.edit(plantation_id, |plantation| {
            plantation.set_task_status(task_id, status, now)
        })
    }

    /// Append a yield checkpoint.
    pub fn record_yield(
        &mut self,
        plantation_id: &PlantationId,
        date: NaiveDate,
        yield_kg: f64,
    ) -> Result<(), VerdantError> {
        let now = self.now();
        self.edit(plantation_id, |plantation| {
            plantation.record_yield(YieldCheckpoint::new(date, yield_kg), now);
            Ok(())
        })
    }

    /// Add a collaborator. Returns `false` if already present.
    pub fn add_collaborator(
        &mut self,
        plantation_id: &PlantationId,
        collaborator: CollaboratorRef,
    ) -> Result<bool, VerdantError> {
        let now = self.now();
        self.edit(plantation_id, |plantation| {
            Ok(plantation.add_collaborator(collaborator, now))
        })
    }

    /// Move one plantation to its next stage. Harvested stays Harvested.
    pub fn advance_stage(
        &mut self,
        plantation_id: &PlantationId,
        note: Option<String>,
    ) -> Result<GrowthStage, VerdantError> {
        let now = self.now();
        self.edit(plantation_id, |plantation| {
            let next = plantation.stage.next_stage();
            plantation.set_stage(next, note, now);
            Ok(next)
        })
    }

    /// Load, mutate, and store one plantation.
    fn edit<T>(
        &mut self,
        plantation_id: &PlantationId,
        f: impl FnOnce(&mut Plantation) -> Result<T, VerdantError>,
    ) -> Result<T, VerdantError> {
        let mut plantation = self.plantation(plantation_id)?;
        let value = f(&mut plantation)?;
        self.backend.store_mut().replace_plantation(plantation)?;
        Ok(value)
    }

    // =========================================================================
    // ENGINES
    // =========================================================================

    /// Evaluate every template and commit the run.
    pub fn run_scheduler(&mut self) -> Result<SchedulerSummary, VerdantError> {
        let now = self.now();
        let templates = self.templates()?;
        let run = process_templates(&templates, now);
        let outcome = if run.is_empty() {
            ApplyOutcome::default()
        } else {
            self.backend.store_mut().commit_scheduler_run(&run, now)?
        };
        Ok(SchedulerSummary { run, outcome })
    }

    /// Health report for one plantation.
    pub fn health(&self, plantation_id: &PlantationId) -> Result<HealthReport, VerdantError> {
        let plantations = self.plantations()?;
        let plantation = plantations
            .iter()
            .find(|p| &p.id == plantation_id)
            .ok_or_else(|| VerdantError::PlantationNotFound(plantation_id.clone()))?;
        let average = average_days_to_harvest(&plantations);
        Ok(self.scorer.report(plantation, average, self.now()))
    }

    /// Health reports for every plantation, best score first (ties by id).
    pub fn health_all(&self) -> Result<Vec<(PlantationId, HealthReport)>, VerdantError> {
        let plantations = self.plantations()?;
        let average = average_days_to_harvest(&plantations);
        let now = self.now();

        let mut reports: Vec<(PlantationId, HealthReport)> = plantations
            .iter()
            .map(|p| (p.id.clone(), self.scorer.report(p, average, now)))
            .collect();
        reports.sort_by(|a, b| b.1.score.cmp(&a.1.score).then_with(|| a.0.cmp(&b.0)));
        Ok(reports)
    }

    /// Move a selection of plantations to `target` and persist the changes.
    pub fn bulk_set_stage(
        &mut self,
        target: GrowthStage,
        selected_ids: &BTreeSet<PlantationId>,
        note: Option<String>,
    ) -> Result<BulkStageReport, VerdantError> {
        let now = self.now();
        let snapshot = self.plantations()?;
        let outcome = BulkStageCoordinator::apply(snapshot, target, selected_ids, note, now);

        if !outcome.report.is_noop() {
            let changed: Vec<Plantation> = outcome
                .plantations
                .into_iter()
                .filter(|p| outcome.report.updated.contains(&p.id))
                .collect();
            self.backend.store_mut().replace_plantations(&changed)?;
        }
        Ok(outcome.report)
    }

    /// Suggested bulk target for a selection.
    pub fn suggest_stage(
        &self,
        selected_ids: &BTreeSet<PlantationId>,
    ) -> Result<GrowthStage, VerdantError> {
        Ok(suggested_target_stage(&self.plantations()?, selected_ids))
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::FixedClock;
    use crate::types::TemplateId;
    use chrono::{TimeDelta, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 4, 1, 9, 0, 0)
            .single()
            .expect("valid timestamp")
    }

    fn draft(id: &str) -> PlantationDraft {
        PlantationDraft {
            id: PlantationId::new(id),
            name: format!("Block {id}"),
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).expect("valid date"),
            tree_count: 100,
            area_hectares: 1.5,
            carbon_offset_tons: 0.0,
        }
    }

    fn session() -> (Session, FixedClock) {
        let clock = FixedClock::new(t0());
        (Session::new().with_clock(clock.clone()), clock)
    }

    #[test]
    fn add_task_assigns_sequential_ids() {
        let (mut session, _) = session();
        let id = PlantationId::new("a");
        session.add_plantation(draft("a")).expect("add");

        let first = session
            .add_task(&id, "Prune", None, t0() + TimeDelta::days(5))
            .expect("task");
        let second = session
            .add_task(&id, "Mulch", None, t0() + TimeDelta::days(6))
            .expect("task");
        assert_eq!(first.id, TaskId::new("a#1"));
        assert_eq!(second.id, TaskId::new("a#2"));
        assert!(session.add_task(&id, "   ", None, t0()).is_err());
    }

    #[test]
    fn edits_bump_updated_at_to_clock() {
        let (mut session, clock) = session();
        let id = PlantationId::new("a");
        session.add_plantation(draft("a")).expect("add");

        clock.advance(TimeDelta::days(10));
        session
            .add_collaborator(&id, CollaboratorRef::new("sam"))
            .expect("collaborator");
        assert_eq!(
            session.plantation(&id).expect("get").updated_at,
            t0() + TimeDelta::days(10)
        );
    }

    #[test]
    fn advance_stage_stops_at_harvested() {
        let (mut session, _) = session();
        let id = PlantationId::new("a");
        session.add_plantation(draft("a")).expect("add");

        assert_eq!(
            session.advance_stage(&id, None).expect("advance"),
            GrowthStage::Growing
        );
        assert_eq!(
            session.advance_stage(&id, None).expect("advance"),
            GrowthStage::Harvested
        );
        assert_eq!(
            session.advance_stage(&id, None).expect("advance"),
            GrowthStage::Harvested
        );
        assert_eq!(session.plantation(&id).expect("get").update_log.len(), 2);
    }

    #[test]
    fn run_scheduler_fires_then_waits() {
        let (mut session, clock) = session();
        session.add_plantation(draft("a")).expect("add");
        session
            .add_template(TemplateDraft {
                id: TemplateId::new("water"),
                plantation_id: PlantationId::new("a"),
                title: "Water".into(),
                description: None,
                frequency: "daily".into(),
                interval: 1,
                lead_time_days: 0,
                next_run_date: t0(),
                enabled: true,
            })
            .expect("template");

        let first = session.run_scheduler().expect("run");
        assert_eq!(first.outcome.appended, 1);

        let again = session.run_scheduler().expect("run");
        assert!(again.run.is_empty());

        clock.advance(TimeDelta::days(1));
        let next_day = session.run_scheduler().expect("run");
        assert_eq!(next_day.outcome.appended, 1);
        assert_eq!(
            session
                .plantation(&PlantationId::new("a"))
                .expect("get")
                .tasks
                .len(),
            2
        );
    }

    #[test]
    fn health_all_sorted_by_score() {
        let (mut session, clock) = session();
        session.add_plantation(draft("stale")).expect("add");
        clock.advance(TimeDelta::days(40));
        session.add_plantation(draft("fresh")).expect("add");

        let reports = session.health_all().expect("health");
        assert_eq!(reports[0].0, PlantationId::new("fresh"));
        assert!(reports[0].1.score >= reports[1].1.score);
    }

    #[test]
    fn bulk_set_stage_persists_updates_only() {
        let (mut session, _) = session();
        session.add_plantation(draft("a")).expect("add");
        session.add_plantation(draft("b")).expect("add");

        let selected: BTreeSet<PlantationId> =
            [PlantationId::new("a"), PlantationId::new("zz")].into_iter().collect();
        assert_eq!(
            session.suggest_stage(&selected).expect("suggest"),
            GrowthStage::Growing
        );

        let report = session
            .bulk_set_stage(GrowthStage::Growing, &selected, None)
            .expect("bulk");
        assert_eq!(report.updated, vec![PlantationId::new("a")]);
        assert_eq!(report.missing, vec![PlantationId::new("zz")]);
        assert_eq!(
            session.plantation(&PlantationId::new("b")).expect("get").stage,
            GrowthStage::Planted
        );
    }

    #[test]
    fn unknown_plantation_is_an_error() {
        let (mut session, _) = session();
        assert!(matches!(
            session.advance_stage(&PlantationId::new("ghost"), None),
            Err(VerdantError::PlantationNotFound(_))
        ));
        assert!(session.health(&PlantationId::new("ghost")).is_err());
    }
}
