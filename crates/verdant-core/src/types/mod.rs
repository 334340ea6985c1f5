//! # Core Type Definitions
//!
//! This module contains the entity types the lifecycle engine works on:
//! - Identifiers (`PlantationId`, `TaskId`, `TemplateId`, `CollaboratorRef`)
//! - Work items (`Task`, `TaskStatus`)
//! - Plantation state (`Plantation`, `YieldCheckpoint`, `StageUpdate`)
//! - Error types (`VerdantError`)
//!
//! ## Determinism Guarantees
//!
//! All types in this module:
//! - Take `now` as an argument whenever they record time
//! - Implement `Ord` on identifiers for deterministic ordering in `BTreeMap`/`BTreeSet`
//! - Never perform arithmetic on floating-point fields

use crate::system::GrowthStage;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// =============================================================================
// IDENTIFIERS
// =============================================================================

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl $name {
            /// Create a new identifier from a string.
            #[must_use]
            pub fn new(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            /// Get the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self::new(s)
            }
        }
    };
}

string_id!(
    /// Opaque, unique identifier of a plantation. Assigned by the host store.
    PlantationId
);

string_id!(
    /// Identifier of a task inside a plantation.
    TaskId
);

string_id!(
    /// Identifier of a recurring task template.
    TemplateId
);

string_id!(
    /// Reference to a collaborator (wallet address, email, handle...).
    CollaboratorRef
);

// =============================================================================
// TASKS
// =============================================================================

/// Workflow status of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
}

impl TaskStatus {
    /// Lowercase label used on the command line and in JSON.
    #[must_use]
    pub fn as_label(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
        }
    }

    /// Is this task still open (anything but completed)?
    #[must_use]
    pub fn is_open(self) -> bool {
        !matches!(self, TaskStatus::Completed)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}

impl FromStr for TaskStatus {
    type Err = VerdantError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "pending" => Ok(TaskStatus::Pending),
            "in_progress" => Ok(TaskStatus::InProgress),
            "completed" => Ok(TaskStatus::Completed),
            _ => Err(VerdantError::UnknownTaskStatus(s.to_string())),
        }
    }
}

/// A concrete work item attached to a plantation.
///
/// Created either directly by a user or by the recurring scheduler. The core
/// never deletes tasks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    pub description: Option<String>,
    pub due_date: DateTime<Utc>,
    pub status: TaskStatus,
    /// Template that emitted this task, if any.
    pub template_id: Option<TemplateId>,
}

impl Task {
    /// Create a pending task.
    #[must_use]
    pub fn new(id: TaskId, title: impl Into<String>, due_date: DateTime<Utc>) -> Self {
        Self {
            id,
            title: title.into(),
            description: None,
            due_date,
            status: TaskStatus::Pending,
            template_id: None,
        }
    }

    /// Attach a description.
    #[must_use]
    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = description;
        self
    }

    /// Is this task open and due within `window_end`?
    #[must_use]
    pub fn is_due_by(&self, window_end: DateTime<Utc>) -> bool {
        self.status.is_open() && self.due_date <= window_end
    }
}

// =============================================================================
// YIELD & UPDATE LOG
// =============================================================================

/// One point on a plantation's yield history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YieldCheckpoint {
    pub date: NaiveDate,
    pub yield_kg: f64,
}

impl YieldCheckpoint {
    /// Create a checkpoint. Negative yields are clamped to zero.
    #[must_use]
    pub fn new(date: NaiveDate, yield_kg: f64) -> Self {
        Self {
            date,
            yield_kg: yield_kg.max(0.0),
        }
    }
}

/// A recorded stage change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageUpdate {
    pub at: DateTime<Utc>,
    pub from: GrowthStage,
    pub to: GrowthStage,
    pub note: Option<String>,
}

// =============================================================================
// PLANTATION
// =============================================================================

/// A plantation and everything the lifecycle engine reads from it.
///
/// Owned by the store. Core components borrow or receive snapshots and
/// return new snapshots; they never hold on to a plantation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plantation {
    pub id: PlantationId,
    pub name: String,
    pub stage: GrowthStage,
    pub start_date: NaiveDate,
    pub tree_count: u64,
    pub area_hectares: f64,
    pub carbon_offset_tons: f64,
    /// Insertion order is creation order.
    pub tasks: Vec<Task>,
    pub yield_timeline: Vec<YieldCheckpoint>,
    pub collaborators: BTreeSet<CollaboratorRef>,
    pub updated_at: DateTime<Utc>,
    /// Date the plantation last entered `Harvested`.
    pub harvested_on: Option<NaiveDate>,
    pub update_log: Vec<StageUpdate>,
}

impl Plantation {
    /// Create a freshly planted plantation with no history.
    #[must_use]
    pub fn new(
        id: PlantationId,
        name: impl Into<String>,
        start_date: NaiveDate,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            stage: GrowthStage::Planted,
            start_date,
            tree_count: 0,
            area_hectares: 0.0,
            carbon_offset_tons: 0.0,
            tasks: Vec::new(),
            yield_timeline: Vec::new(),
            collaborators: BTreeSet::new(),
            updated_at: now,
            harvested_on: None,
            update_log: Vec::new(),
        }
    }

    /// Find a task by id.
    #[must_use]
    pub fn task(&self, id: &TaskId) -> Option<&Task> {
        self.tasks.iter().find(|t| &t.id == id)
    }

    /// Append a task.
    ///
    /// Returns `false` and leaves the plantation untouched if a task with the
    /// same id already exists. Scheduler retries rely on this.
    pub fn push_task(&mut self, task: Task, now: DateTime<Utc>) -> bool {
        if self.task(&task.id).is_some() {
            return false;
        }
        self.tasks.push(task);
        self.updated_at = now;
        true
    }

    /// Change the status of an existing task.
    pub fn set_task_status(
        &mut self,
        id: &TaskId,
        status: TaskStatus,
        now: DateTime<Utc>,
    ) -> Result<(), VerdantError> {
        let task = self
            .tasks
            .iter_mut()
            .find(|t| &t.id == id)
            .ok_or_else(|| VerdantError::TaskNotFound(id.clone()))?;
        task.status = status;
        self.updated_at = now;
        Ok(())
    }

    /// Append a yield checkpoint.
    pub fn record_yield(&mut self, checkpoint: YieldCheckpoint, now: DateTime<Utc>) {
        self.yield_timeline.push(checkpoint);
        self.updated_at = now;
    }

    /// Add a collaborator. Returns `false` if already present.
    pub fn add_collaborator(&mut self, collaborator: CollaboratorRef, now: DateTime<Utc>) -> bool {
        let added = self.collaborators.insert(collaborator);
        if added {
            self.updated_at = now;
        }
        added
    }

    /// Move to `stage`, appending to the update log.
    ///
    /// Returns `false` (and records nothing) when already at `stage`.
    /// Any stage is accepted, including earlier ones.
    pub fn set_stage(&mut self, stage: GrowthStage, note: Option<String>, now: DateTime<Utc>) -> bool {
        if self.stage == stage {
            return false;
        }
        self.update_log.push(StageUpdate {
            at: now,
            from: self.stage,
            to: stage,
            note,
        });
        self.harvested_on = if stage == GrowthStage::Harvested {
            Some(now.date_naive())
        } else {
            None
        };
        self.stage = stage;
        self.updated_at = now;
        true
    }

    /// Whole days between `updated_at` and `now`, never negative.
    #[must_use]
    pub fn days_since_update(&self, now: DateTime<Utc>) -> i64 {
        now.signed_duration_since(self.updated_at).num_days().max(0)
    }

    /// Whole days between `start_date` and `now`, never negative.
    ///
    /// A start date in the future yields zero.
    #[must_use]
    pub fn age_days(&self, now: DateTime<Utc>) -> i64 {
        now.date_naive()
            .signed_duration_since(self.start_date)
            .num_days()
            .max(0)
    }
}

/// Raw plantation input as it arrives from a form or the command line.
///
/// Converting into a [`Plantation`] clamps out-of-range numerics instead of
/// rejecting them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlantationDraft {
    pub id: PlantationId,
    pub name: String,
    pub start_date: NaiveDate,
    pub tree_count: i64,
    pub area_hectares: f64,
    pub carbon_offset_tons: f64,
}

impl PlantationDraft {
    /// Build the plantation, stamping `now` as its last update.
    #[must_use]
    pub fn into_plantation(self, now: DateTime<Utc>) -> Plantation {
        let mut plantation = Plantation::new(self.id, self.name, self.start_date, now);
        plantation.tree_count = self.tree_count.max(0) as u64;
        plantation.area_hectares = clamp_non_negative(self.area_hectares);
        plantation.carbon_offset_tons = clamp_non_negative(self.carbon_offset_tons);
        plantation
    }
}

/// NaN and negative values both become zero.
fn clamp_non_negative(value: f64) -> f64 {
    if value.is_nan() { 0.0 } else { value.max(0.0) }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in the Verdant system.
///
/// - Validation errors are raised at construction time, never mid-run
/// - Use `Result<T, VerdantError>` for fallible operations
/// - The CORE should never panic; all errors must be recoverable
#[derive(Debug, Error)]
pub enum VerdantError {
    /// A recurring task template failed validation.
    #[error("Invalid template: {0}")]
    InvalidTemplate(String),

    /// A one-off task failed validation.
    #[error("Invalid task: {0}")]
    InvalidTask(String),

    /// The frequency label is not one of daily, weekly, monthly.
    #[error("Unknown frequency: {0}")]
    UnknownFrequency(String),

    /// The stage label is not a known growth stage.
    #[error("Unknown growth stage: {0}")]
    UnknownStage(String),

    /// The task status label is not known.
    #[error("Unknown task status: {0}")]
    UnknownTaskStatus(String),

    /// The requested plantation was not found in the store.
    #[error("Plantation not found: {0}")]
    PlantationNotFound(PlantationId),

    /// The requested task was not found on the plantation.
    #[error("Task not found: {0}")]
    TaskNotFound(TaskId),

    /// A plantation with this id already exists.
    #[error("Plantation already exists: {0}")]
    DuplicatePlantation(PlantationId),

    /// A template with this id already exists.
    #[error("Template already exists: {0}")]
    DuplicateTemplate(TemplateId),

    /// A serialization or deserialization error occurred.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    IoError(String),

    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, day, 9, 0, 0)
            .single()
            .expect("valid timestamp")
    }

    fn sample() -> Plantation {
        let start = NaiveDate::from_ymd_opt(2024, 3, 1).expect("valid date");
        Plantation::new(PlantationId::new("p-1"), "North Ridge", start, at(1))
    }

    #[test]
    fn task_status_labels_roundtrip() {
        for status in [TaskStatus::Pending, TaskStatus::InProgress, TaskStatus::Completed] {
            let parsed: TaskStatus = status.as_label().parse().expect("parse");
            assert_eq!(parsed, status);
        }
        assert_eq!("In-Progress".parse::<TaskStatus>().expect("parse"), TaskStatus::InProgress);
        assert!(matches!(
            "done".parse::<TaskStatus>(),
            Err(VerdantError::UnknownTaskStatus(_))
        ));
    }

    #[test]
    fn push_task_rejects_duplicate_ids() {
        let mut plantation = sample();
        let task = Task::new(TaskId::new("t-1"), "Prune", at(5));

        assert!(plantation.push_task(task.clone(), at(2)));
        assert!(!plantation.push_task(task, at(3)));
        assert_eq!(plantation.tasks.len(), 1);
        assert_eq!(plantation.updated_at, at(2));
    }

    #[test]
    fn set_task_status_bumps_updated_at() {
        let mut plantation = sample();
        plantation.push_task(Task::new(TaskId::new("t-1"), "Prune", at(5)), at(2));

        plantation
            .set_task_status(&TaskId::new("t-1"), TaskStatus::Completed, at(4))
            .expect("status");
        assert_eq!(plantation.tasks[0].status, TaskStatus::Completed);
        assert_eq!(plantation.updated_at, at(4));

        let missing = plantation.set_task_status(&TaskId::new("nope"), TaskStatus::Pending, at(5));
        assert!(matches!(missing, Err(VerdantError::TaskNotFound(_))));
    }

    #[test]
    fn set_stage_records_log_and_harvest_date() {
        let mut plantation = sample();

        assert!(plantation.set_stage(GrowthStage::Harvested, Some("early".into()), at(10)));
        assert_eq!(plantation.harvested_on, Some(at(10).date_naive()));
        assert_eq!(plantation.update_log.len(), 1);
        assert_eq!(plantation.update_log[0].from, GrowthStage::Planted);

        assert!(!plantation.set_stage(GrowthStage::Harvested, None, at(11)));
        assert_eq!(plantation.update_log.len(), 1);
        assert_eq!(plantation.updated_at, at(10));

        assert!(plantation.set_stage(GrowthStage::Growing, None, at(12)));
        assert_eq!(plantation.harvested_on, None);
    }

    #[test]
    fn future_start_date_has_zero_age() {
        let mut plantation = sample();
        plantation.start_date = NaiveDate::from_ymd_opt(2030, 1, 1).expect("valid date");
        assert_eq!(plantation.age_days(at(1)), 0);
    }

    #[test]
    fn draft_clamps_negative_numerics() {
        let draft = PlantationDraft {
            id: PlantationId::new("p-2"),
            name: "South Slope".into(),
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).expect("valid date"),
            tree_count: -40,
            area_hectares: -2.5,
            carbon_offset_tons: f64::NAN,
        };
        let plantation = draft.into_plantation(at(1));
        assert_eq!(plantation.tree_count, 0);
        assert_eq!(plantation.area_hectares, 0.0);
        assert_eq!(plantation.carbon_offset_tons, 0.0);
    }

    #[test]
    fn collaborators_are_a_set() {
        let mut plantation = sample();
        assert!(plantation.add_collaborator(CollaboratorRef::new("0xabc"), at(2)));
        assert!(!plantation.add_collaborator(CollaboratorRef::new("0xabc"), at(3)));
        assert_eq!(plantation.collaborators.len(), 1);
        assert_eq!(plantation.updated_at, at(2));
    }
}
