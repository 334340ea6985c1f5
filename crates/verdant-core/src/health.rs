//! # Health Module
//!
//! Composite health scoring for plantations.
//!
//! - Score is an integer in `[0, 100]`, for display and sorting only
//! - Insights are an ordered list of qualitative notes
//! - Never gates a write
//!
//! Scoring uses exact integer arithmetic (no floats): every term is scaled
//! to tenths over a common denominator, then rounded half-up once at the end.

use crate::primitives::{
    FRESH_UPDATE_DAYS, HEALTHY_SCORE, LONG_GROWTH_DAYS, STALE_UPDATE_DAYS, URGENT_WINDOW_DAYS,
    YIELD_HISTORY_MIN,
};
use crate::system::GrowthStage;
use crate::types::{Plantation, TaskStatus};
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

/// Starting score before any signal is applied.
pub const BASE_SCORE: i64 = 50;

/// Maximum contribution of the task-completion ratio.
pub const COMPLETION_WEIGHT: i64 = 20;

/// Penalty per urgent task.
pub const URGENT_PENALTY: i64 = 10;

/// Bonus for a recently updated plantation.
pub const FRESH_BONUS: i64 = 10;

/// Penalty for a stale plantation.
pub const STALE_PENALTY: i64 = 15;

/// Bonus per yield checkpoint, capped at `YIELD_BONUS_CAP`.
pub const YIELD_BONUS_PER_CHECKPOINT: i64 = 2;
pub const YIELD_BONUS_CAP: i64 = 10;

/// Bonus per collaborator, capped at `COLLABORATOR_BONUS_CAP`.
pub const COLLABORATOR_BONUS_PER_REF: i64 = 3;
pub const COLLABORATOR_BONUS_CAP: i64 = 15;

// =============================================================================
// INSIGHTS
// =============================================================================

/// Insight severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Success,
}

/// A qualitative note about a plantation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Insight {
    pub severity: Severity,
    pub message: String,
}

impl Insight {
    fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
        }
    }
}

/// Full health evaluation of one plantation at one instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthReport {
    pub score: u8,
    pub insights: Vec<Insight>,
    pub urgent_tasks: usize,
    pub days_since_update: i64,
    pub age_days: i64,
}

impl HealthReport {
    /// Is the score at or above the healthy threshold?
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        self.score >= HEALTHY_SCORE
    }
}

// =============================================================================
// SCORER
// =============================================================================

/// Reduces a plantation's signals into a bounded score plus insights.
///
/// All derived ages are computed from the `now` passed in, so results change
/// across calls without any cache to invalidate.
#[derive(Debug, Clone, Copy, Default)]
pub struct HealthScorer;

impl HealthScorer {
    /// Create a scorer.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Open tasks due within the urgent window (overdue ones included).
    #[must_use]
    pub fn urgent_task_count(&self, plantation: &Plantation, now: DateTime<Utc>) -> usize {
        let window_end = now
            .checked_add_signed(TimeDelta::days(URGENT_WINDOW_DAYS))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        plantation
            .tasks
            .iter()
            .filter(|t| t.is_due_by(window_end))
            .count()
    }

    /// Compute the health score.
    ///
    /// Scoring algorithm:
    /// - Base 50
    /// - `+ progress(stage) x 0.3`
    /// - `+ completed / total x 20` when there are tasks
    /// - `- 10` per urgent task
    /// - `+ 10` if updated within 7 days, `- 15` if not updated for over 30
    /// - `+ 2` per yield checkpoint, capped at `+ 10`
    /// - `+ 3` per collaborator, capped at `+ 15`
    ///
    /// Clamped to `[0, 100]` and rounded to the nearest integer.
    /// `average_days_to_harvest` does not affect the score.
    #[must_use]
    pub fn score(
        &self,
        plantation: &Plantation,
        _average_days_to_harvest: Option<u32>,
        now: DateTime<Utc>,
    ) -> u8 {
        let urgent = self.urgent_task_count(plantation, now);
        self.score_with(plantation, urgent, plantation.days_since_update(now))
    }

    fn score_with(&self, plantation: &Plantation, urgent: usize, days_since_update: i64) -> u8 {
        let total = plantation.tasks.len() as i64;
        let completed = plantation
            .tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Completed)
            .count() as i64;

        let recency = if days_since_update <= FRESH_UPDATE_DAYS {
            FRESH_BONUS
        } else if days_since_update > STALE_UPDATE_DAYS {
            -STALE_PENALTY
        } else {
            0
        };

        let yield_bonus = (plantation.yield_timeline.len() as i64)
            .saturating_mul(YIELD_BONUS_PER_CHECKPOINT)
            .min(YIELD_BONUS_CAP);
        let collaborator_bonus = (plantation.collaborators.len() as i64)
            .saturating_mul(COLLABORATOR_BONUS_PER_REF)
            .min(COLLABORATOR_BONUS_CAP);
        let urgent_penalty = (urgent as i64).saturating_mul(URGENT_PENALTY);

        // Integer terms in tenths; progress x 0.3 == progress x 3 tenths.
        let whole_tenths = (BASE_SCORE + recency + yield_bonus + collaborator_bonus)
            .saturating_sub(urgent_penalty)
            .saturating_mul(10)
            .saturating_add(i64::from(plantation.stage.progress()) * 3);

        // Common denominator: 10 x total, so the completion ratio stays exact.
        let denominator = 10 * total.max(1);
        let numerator = whole_tenths
            .saturating_mul(total.max(1))
            .saturating_add(completed * COMPLETION_WEIGHT * 10);

        if numerator <= 0 {
            return 0;
        }

        // Round half-up: floor((2n + d) / 2d).
        let rounded = numerator
            .saturating_mul(2)
            .saturating_add(denominator)
            / (2 * denominator);
        rounded.min(100) as u8
    }

    /// Produce the ordered insight list.
    ///
    /// Order is fixed; every check is independent and may co-occur:
    /// 1. warning: urgent tasks
    /// 2. warning: stale updates
    /// 3. info: still growing after a long time
    /// 4. success: healthy score
    /// 5. success: consistent yield history
    /// 6. info: no collaborators
    #[must_use]
    pub fn insights(
        &self,
        plantation: &Plantation,
        average_days_to_harvest: Option<u32>,
        now: DateTime<Utc>,
    ) -> Vec<Insight> {
        self.report(plantation, average_days_to_harvest, now).insights
    }

    /// Score and insights together, sharing one pass over the derived ages.
    #[must_use]
    pub fn report(
        &self,
        plantation: &Plantation,
        average_days_to_harvest: Option<u32>,
        now: DateTime<Utc>,
    ) -> HealthReport {
        let urgent = self.urgent_task_count(plantation, now);
        let days_since_update = plantation.days_since_update(now);
        let age_days = plantation.age_days(now);
        let score = self.score_with(plantation, urgent, days_since_update);

        let mut insights = Vec::new();

        if urgent > 0 {
            insights.push(Insight::new(
                Severity::Warning,
                format!("{} task(s) due soon or overdue", urgent),
            ));
        }

        if days_since_update > STALE_UPDATE_DAYS {
            insights.push(Insight::new(
                Severity::Warning,
                format!("No updates in {} days", days_since_update),
            ));
        }

        if plantation.stage == GrowthStage::Growing && age_days > LONG_GROWTH_DAYS {
            let message = match average_days_to_harvest {
                Some(avg) => format!(
                    "Growing for {} days; historical average to harvest is {} days",
                    age_days, avg
                ),
                None => format!("Growing for {} days; consider planning the harvest", age_days),
            };
            insights.push(Insight::new(Severity::Info, message));
        }

        if score >= HEALTHY_SCORE {
            insights.push(Insight::new(Severity::Success, "Plantation health is excellent"));
        }

        if plantation.yield_timeline.len() >= YIELD_HISTORY_MIN {
            insights.push(Insight::new(
                Severity::Success,
                format!(
                    "Consistent yield history ({} checkpoints)",
                    plantation.yield_timeline.len()
                ),
            ));
        }

        if plantation.collaborators.is_empty() {
            insights.push(Insight::new(
                Severity::Info,
                "No collaborators yet; invite a team member",
            ));
        }

        HealthReport {
            score,
            insights,
            urgent_tasks: urgent,
            days_since_update,
            age_days,
        }
    }
}

/// Mean days from start to harvest over plantations with a recorded harvest.
///
/// Rounded to the nearest day. `None` when nothing has been harvested.
#[must_use]
pub fn average_days_to_harvest(plantations: &[Plantation]) -> Option<u32> {
    let durations: Vec<i64> = plantations
        .iter()
        .filter(|p| p.stage == GrowthStage::Harvested)
        .filter_map(|p| p.harvested_on.map(|d| d.signed_duration_since(p.start_date).num_days()))
        .map(|days| days.max(0))
        .collect();

    if durations.is_empty() {
        return None;
    }

    let count = durations.len() as i64;
    let sum = durations.iter().fold(0i64, |acc, d| acc.saturating_add(*d));
    let mean = sum.saturating_mul(2).saturating_add(count) / (2 * count);
    u32::try_from(mean).ok()
}

// =============================================================================
// TESTS
// =============================================================================
