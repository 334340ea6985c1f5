//! # Recurring Scheduler
//!
//! Turns recurring task templates into concrete tasks.
//!
//! Scheduling is evaluated on demand: the host calls [`process_templates`]
//! with the current template set and `now`, and persists the returned
//! [`SchedulerRun`] as one unit. There is no timer inside the core.
//!
//! ## Firing rule
//!
//! An enabled template fires when `now >= next_run_date - lead_time_days`.
//! A firing emits one pending task due at `next_run_date` and advances
//! `next_run_date` by exactly one `interval x frequency` step from its prior
//! value, so firings stay on a fixed grid however late evaluation runs.
//!
//! ## Catch-up
//!
//! A template that missed several periods still fires once per call. Each
//! further call catches up one more period until `next_run_date` is back in
//! the future.

use crate::primitives::MAX_TITLE_LENGTH;
use crate::types::{Plantation, PlantationId, Task, TaskId, TemplateId, VerdantError};
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::NonZeroU32;
use std::str::FromStr;

// =============================================================================
// FREQUENCY
// =============================================================================

/// Unit of recurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
}

impl Frequency {
    /// Day multiplier for one unit of this frequency.
    ///
    /// | Frequency | Days |
    /// |-----------|------|
    /// | Daily     | 1    |
    /// | Weekly    | 7    |
    /// | Monthly   | 30   |
    #[must_use]
    pub const fn days_per_unit(self) -> u32 {
        match self {
            Frequency::Daily => 1,
            Frequency::Weekly => 7,
            Frequency::Monthly => 30,
        }
    }

    /// Lowercase label.
    #[must_use]
    pub fn as_label(&self) -> &'static str {
        match self {
            Frequency::Daily => "daily",
            Frequency::Weekly => "weekly",
            Frequency::Monthly => "monthly",
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}

impl FromStr for Frequency {
    type Err = VerdantError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "daily" => Ok(Frequency::Daily),
            "weekly" => Ok(Frequency::Weekly),
            "monthly" => Ok(Frequency::Monthly),
            _ => Err(VerdantError::UnknownFrequency(s.to_string())),
        }
    }
}

// =============================================================================
// TEMPLATE
// =============================================================================

/// A recurring task definition attached to one plantation.
///
/// `next_run_date` is always the next scheduled firing. Construct from raw
/// input through [`TemplateDraft`]; the field types make an invalid interval
/// or frequency unrepresentable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurringTaskTemplate {
    pub id: TemplateId,
    pub plantation_id: PlantationId,
    pub title: String,
    pub description: Option<String>,
    pub frequency: Frequency,
    /// Fire every `interval` units of `frequency`.
    pub interval: NonZeroU32,
    /// Days before `next_run_date` that the generated task becomes visible.
    pub lead_time_days: u32,
    pub next_run_date: DateTime<Utc>,
    pub enabled: bool,
}

impl RecurringTaskTemplate {
    /// Length of one firing period.
    #[must_use]
    pub fn step(&self) -> TimeDelta {
        let days = u64::from(self.interval.get()) * u64::from(self.frequency.days_per_unit());
        TimeDelta::days(days as i64)
    }

    /// Earliest instant at which the current firing becomes due.
    #[must_use]
    pub fn visible_from(&self) -> DateTime<Utc> {
        self.next_run_date
            .checked_sub_signed(TimeDelta::days(i64::from(self.lead_time_days)))
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    /// Would this template fire at `now`?
    #[must_use]
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.enabled && now >= self.visible_from()
    }

    /// The `next_run_date` after one firing.
    #[must_use]
    pub fn following_run_date(&self) -> DateTime<Utc> {
        self.next_run_date
            .checked_add_signed(self.step())
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Id of the task emitted for the current `next_run_date`.
    ///
    /// Derived from the template id and the firing date, so re-evaluating the
    /// same snapshot produces the same id.
    #[must_use]
    pub fn occurrence_task_id(&self) -> TaskId {
        TaskId(format!("{}@{}", self.id, self.next_run_date.timestamp()))
    }

    /// Build the task for the current firing.
    #[must_use]
    pub fn materialize(&self) -> Task {
        let mut task = Task::new(self.occurrence_task_id(), self.title.clone(), self.next_run_date)
            .with_description(self.description.clone());
        task.template_id = Some(self.id.clone());
        task
    }
}

/// Unvalidated template input, as it arrives from a form or the CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateDraft {
    pub id: TemplateId,
    pub plantation_id: PlantationId,
    pub title: String,
    pub description: Option<String>,
    pub frequency: String,
    pub interval: i64,
    pub lead_time_days: i64,
    pub next_run_date: DateTime<Utc>,
    pub enabled: bool,
}

impl TryFrom<TemplateDraft> for RecurringTaskTemplate {
    type Error = VerdantError;

    fn try_from(draft: TemplateDraft) -> Result<Self, Self::Error> {
        let frequency: Frequency = draft.frequency.parse()?;

        let interval = u32::try_from(draft.interval)
            .ok()
            .and_then(NonZeroU32::new)
            .ok_or_else(|| {
                VerdantError::InvalidTemplate(format!(
                    "interval must be a positive integer, got {}",
                    draft.interval
                ))
            })?;

        let lead_time_days = u32::try_from(draft.lead_time_days).map_err(|_| {
            VerdantError::InvalidTemplate(format!(
                "lead time must be a non-negative number of days, got {}",
                draft.lead_time_days
            ))
        })?;

        let title = draft.title.trim();
        if title.is_empty() {
            return Err(VerdantError::InvalidTemplate("title is empty".to_string()));
        }
        if title.len() > MAX_TITLE_LENGTH {
            return Err(VerdantError::InvalidTemplate(format!(
                "title exceeds {} bytes",
                MAX_TITLE_LENGTH
            )));
        }

        Ok(Self {
            id: draft.id,
            plantation_id: draft.plantation_id,
            title: title.to_string(),
            description: draft.description,
            frequency,
            interval,
            lead_time_days,
            next_run_date: draft.next_run_date,
            enabled: draft.enabled,
        })
    }
}

// =============================================================================
// SCHEDULER RUN
// =============================================================================

/// A task emitted by a firing, addressed to its plantation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FiredTask {
    pub plantation_id: PlantationId,
    pub task: Task,
}

/// Result of one scheduler evaluation.
///
/// Persist `updated_templates` and append `fired_tasks` together; persisting
/// only one half can lose or duplicate a firing.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SchedulerRun {
    pub fired_tasks: Vec<FiredTask>,
    /// Every input template, in input order, with fired ones advanced.
    pub updated_templates: Vec<RecurringTaskTemplate>,
}

/// Outcome of appending a run's tasks to plantation snapshots.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyOutcome {
    /// Tasks appended.
    pub appended: usize,
    /// Tasks whose id was already present (a retried run).
    pub duplicates: usize,
    /// Tasks whose plantation was not in the snapshot.
    pub orphaned: Vec<TaskId>,
}

impl SchedulerRun {
    /// Number of tasks emitted.
    #[must_use]
    pub fn fired_count(&self) -> usize {
        self.fired_tasks.len()
    }

    /// Did anything fire?
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fired_tasks.is_empty()
    }

    /// Append fired tasks to the matching plantations.
    ///
    /// Tasks already present (same id) are skipped. Tasks for plantations
    /// missing from the snapshot are reported, not applied.
    pub fn apply(&self, plantations: &mut [Plantation], now: DateTime<Utc>) -> ApplyOutcome {
        let mut outcome = ApplyOutcome::default();

        for fired in &self.fired_tasks {
            match plantations.iter_mut().find(|p| p.id == fired.plantation_id) {
                Some(plantation) => {
                    if plantation.push_task(fired.task.clone(), now) {
                        outcome.appended = outcome.appended.saturating_add(1);
                    } else {
                        outcome.duplicates = outcome.duplicates.saturating_add(1);
                    }
                }
                None => {
                    tracing::warn!(
                        plantation_id = %fired.plantation_id,
                        task_id = %fired.task.id,
                        "dropping fired task for unknown plantation"
                    );
                    outcome.orphaned.push(fired.task.id.clone());
                }
            }
        }

        outcome
    }
}

// =============================================================================
// EVALUATION
// =============================================================================

/// Evaluate every template against `now`.
///
/// Pure function of its inputs: calling it twice with the same arguments
/// returns identical runs. Disabled templates never fire and are never
/// advanced. Each due template fires exactly once per call.
#[must_use]
pub fn process_templates(templates: &[RecurringTaskTemplate], now: DateTime<Utc>) -> SchedulerRun {
    let mut run = SchedulerRun {
        fired_tasks: Vec::new(),
        updated_templates: Vec::with_capacity(templates.len()),
    };

    for template in templates {
        if !template.is_due(now) {
            run.updated_templates.push(template.clone());
            continue;
        }

        let task = template.materialize();
        let mut advanced = template.clone();
        advanced.next_run_date = template.following_run_date();

        tracing::debug!(
            template_id = %template.id,
            plantation_id = %template.plantation_id,
            due = %task.due_date,
            next_run = %advanced.next_run_date,
            "template fired"
        );

        run.fired_tasks.push(FiredTask {
            plantation_id: template.plantation_id.clone(),
            task,
        });
        run.updated_templates.push(advanced);
    }

    tracing::info!(
        templates = templates.len(),
        fired = run.fired_tasks.len(),
        "scheduler evaluated"
    );

    run
}

// =============================================================================
// TESTS
// =============================================================================
