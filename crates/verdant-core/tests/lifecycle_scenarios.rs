//! # Lifecycle Scenario Tests (L0-L3)
//!
//! End-to-end scenarios over the public API. If ANY tier fails, the engine
//! is INVALID.
//!
//! ## Tiers
//! - L0: Stage Model
//! - L1: Recurring Scheduling
//! - L2: Health Scoring
//! - L3: Bulk Stage Changes and Sessions

use chrono::{DateTime, NaiveDate, TimeDelta, TimeZone, Utc};
use std::collections::BTreeSet;
use verdant_core::{
    CollaboratorRef, GrowthStage, HealthScorer, Plantation, PlantationId, RecurringTaskTemplate,
    Task, TaskId, TemplateDraft, TemplateId, process_templates,
};

fn day(n: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, n, 0, 0, 0)
        .single()
        .expect("valid timestamp")
}

fn plantation(id: &str, now: DateTime<Utc>) -> Plantation {
    let start = NaiveDate::from_ymd_opt(2024, 5, 1).expect("valid date");
    Plantation::new(PlantationId::new(id), format!("Block {id}"), start, now)
}

fn draft(frequency: &str, interval: i64, lead: i64, next_run_date: DateTime<Utc>) -> TemplateDraft {
    TemplateDraft {
        id: TemplateId::new("tpl"),
        plantation_id: PlantationId::new("p"),
        title: "Fertilize".into(),
        description: Some("NPK 10-10-10".into()),
        frequency: frequency.into(),
        interval,
        lead_time_days: lead,
        next_run_date,
        enabled: true,
    }
}

// =============================================================================
// TIER L0: STAGE MODEL
// =============================================================================

mod l0_stage_model {
    use super::*;

    /// L0.1: Stages advance in declared order and stop at Harvested.
    #[test]
    fn next_stage_walks_the_order() {
        assert_eq!(GrowthStage::Planted.next_stage(), GrowthStage::Growing);
        assert_eq!(GrowthStage::Growing.next_stage(), GrowthStage::Harvested);
        assert_eq!(GrowthStage::Harvested.next_stage(), GrowthStage::Harvested);
    }

    /// L0.2: Progress mapping is fixed.
    #[test]
    fn progress_mapping() {
        assert_eq!(GrowthStage::Planted.progress(), 25);
        assert_eq!(GrowthStage::Growing.progress(), 60);
        assert_eq!(GrowthStage::Harvested.progress(), 100);
    }

    /// L0.3: Labels parse back to stages.
    #[test]
    fn labels_parse() {
        let parsed: GrowthStage = "growing".parse().expect("parse");
        assert_eq!(parsed, GrowthStage::Growing);
        assert!("sprouting".parse::<GrowthStage>().is_err());
    }
}

// =============================================================================
// TIER L1: RECURRING SCHEDULING
// =============================================================================

mod l1_scheduling {
    use super::*;

    /// L1.1: Weekly template with one day of lead fires the day before it is due.
    #[test]
    fn fires_at_visible_from() {
        let tpl = RecurringTaskTemplate::try_from(draft("weekly", 1, 1, day(10))).expect("valid");

        let run = process_templates(std::slice::from_ref(&tpl), day(9));
        assert_eq!(run.fired_tasks.len(), 1);
        assert_eq!(run.fired_tasks[0].task.due_date, day(10));
        assert_eq!(run.updated_templates[0].next_run_date, day(17));

        let early = process_templates(std::slice::from_ref(&tpl), day(8));
        assert!(early.fired_tasks.is_empty());
        assert_eq!(early.updated_templates[0].next_run_date, day(10));
    }

    /// L1.2: Far-overdue template catches up one period per call.
    #[test]
    fn catch_up_is_one_step_per_call() {
        let mut templates =
            vec![RecurringTaskTemplate::try_from(draft("weekly", 2, 0, day(1))).expect("valid")];
        let now = day(1) + TimeDelta::days(100);

        let mut due_dates = Vec::new();
        for _ in 0..3 {
            let run = process_templates(&templates, now);
            assert_eq!(run.fired_tasks.len(), 1);
            due_dates.push(run.fired_tasks[0].task.due_date);
            templates = run.updated_templates;
        }

        assert_eq!(
            due_dates,
            vec![day(1), day(15), day(29)],
            "each call fires the next grid point"
        );
    }

    /// L1.3: Retrying a run before persisting yields the same task ids.
    #[test]
    fn retry_is_identical() {
        let tpl = RecurringTaskTemplate::try_from(draft("daily", 3, 0, day(2))).expect("valid");
        let first = process_templates(std::slice::from_ref(&tpl), day(5));
        let second = process_templates(std::slice::from_ref(&tpl), day(5));
        assert_eq!(first, second);

        let mut snapshot = vec![plantation("p", day(1))];
        first.apply(&mut snapshot, day(5));
        let retry = second.apply(&mut snapshot, day(5));
        assert_eq!(retry.duplicates, 1);
        assert_eq!(snapshot[0].tasks.len(), 1);
    }

    /// L1.4: Invalid templates never reach the scheduler.
    #[test]
    fn invalid_templates_rejected() {
        assert!(RecurringTaskTemplate::try_from(draft("weekly", 0, 0, day(1))).is_err());
        assert!(RecurringTaskTemplate::try_from(draft("weekly", -3, 0, day(1))).is_err());
        assert!(RecurringTaskTemplate::try_from(draft("weekly", 1, -1, day(1))).is_err());
        assert!(RecurringTaskTemplate::try_from(draft("fortnightly", 1, 0, day(1))).is_err());
    }
}

// =============================================================================
// TIER L2: HEALTH SCORING
// =============================================================================

mod l2_health {
    use super::*;

    /// L2.1: Urgent, stale plantation scores below a fresh, quiet one.
    #[test]
    fn neglect_lowers_score() {
        let now = day(20);

        let mut neglected = plantation("n", now - TimeDelta::days(40));
        neglected.tasks.push(Task::new(TaskId::new("a"), "Spray", now - TimeDelta::days(2)));
        neglected.tasks.push(Task::new(TaskId::new("b"), "Prune", now + TimeDelta::days(1)));

        let mut cared_for = plantation("c", now - TimeDelta::days(1));
        cared_for.tasks.push(Task::new(TaskId::new("a"), "Spray", now + TimeDelta::days(20)));
        cared_for.tasks.push(Task::new(TaskId::new("b"), "Prune", now + TimeDelta::days(21)));

        let scorer = HealthScorer::new();
        assert!(scorer.score(&neglected, None, now) < scorer.score(&cared_for, None, now));
    }

    /// L2.2: Empty plantation scores without error.
    #[test]
    fn empty_plantation_scores() {
        let now = day(3);
        let report = HealthScorer::new().report(&plantation("e", now), None, now);
        // 50 + 25 x 0.3 + 10 = 67.5, rounded half-up.
        assert_eq!(report.score, 68);
        assert_eq!(report.urgent_tasks, 0);
    }

    /// L2.3: Insight order is fixed.
    #[test]
    fn insight_order() {
        let now = day(1) + TimeDelta::days(80);
        let mut p = plantation("g", day(1));
        p.stage = GrowthStage::Growing;
        p.tasks.push(Task::new(TaskId::new("late"), "Harvest prep", now));

        let messages: Vec<String> = HealthScorer::new()
            .insights(&p, Some(120), now)
            .into_iter()
            .map(|i| i.message)
            .collect();

        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0], "1 task(s) due soon or overdue");
        assert!(messages[1].starts_with("No updates in"));
        assert!(messages[2].contains("historical average to harvest is 120 days"));
        assert!(messages[3].starts_with("No collaborators"));
    }

    /// L2.4: A well-kept harvested plantation reaches the cap.
    #[test]
    fn thriving_plantation_is_capped() {
        let now = day(5);
        let mut p = plantation("h", now);
        p.stage = GrowthStage::Harvested;
        for name in ["ana", "ben", "chi", "dee", "eli"] {
            p.collaborators.insert(CollaboratorRef::new(name));
        }
        let report = HealthScorer::new().report(&p, None, now);
        assert_eq!(report.score, 100);
        assert!(report.is_healthy());
    }
}

// =============================================================================
// TIER L3: BULK STAGE CHANGES AND SESSIONS
// =============================================================================

mod l3_bulk_and_session {
    use super::*;
    use verdant_core::{BulkStageCoordinator, FixedClock, PlantationDraft, Session};

    /// L3.1: Bulk move updates only selected plantations not already at target.
    #[test]
    fn bulk_move_mixed_batch() {
        let now = day(12);
        let mut grown = plantation("b", day(1));
        grown.stage = GrowthStage::Growing;
        let snapshot = vec![plantation("a", day(1)), grown, plantation("c", day(1))];
        let selected: BTreeSet<PlantationId> =
            ["a", "b"].into_iter().map(PlantationId::new).collect();

        let outcome = BulkStageCoordinator::apply(
            snapshot,
            GrowthStage::Growing,
            &selected,
            Some("Monsoon check".into()),
            now,
        );

        assert_eq!(outcome.report.updated, vec![PlantationId::new("a")]);
        assert_eq!(outcome.report.skipped, vec![PlantationId::new("b")]);
        assert_eq!(outcome.plantations[1].updated_at, day(1));
        assert_eq!(outcome.plantations[2].stage, GrowthStage::Planted);
    }

    /// L3.2: A persistent session keeps scheduler output across reopen.
    #[test]
    fn session_round_trip_through_redb() {
        let temp = tempfile::tempdir().expect("temp dir");
        let path = temp.path().join("verdant.redb");
        let clock = FixedClock::new(day(9));

        {
            let mut session = Session::with_redb(&path)
                .expect("open")
                .with_clock(clock.clone());
            session
                .add_plantation(PlantationDraft {
                    id: PlantationId::new("p"),
                    name: "Hillside".into(),
                    start_date: NaiveDate::from_ymd_opt(2024, 5, 1).expect("valid date"),
                    tree_count: -5,
                    area_hectares: 2.0,
                    carbon_offset_tons: -1.0,
                })
                .expect("add plantation");
            session
                .add_template(draft("weekly", 1, 1, day(10)))
                .expect("add template");
            let summary = session.run_scheduler().expect("run");
            assert_eq!(summary.outcome.appended, 1);
        }

        let session = Session::with_redb(&path).expect("reopen").with_clock(clock);
        let stored = session.plantation(&PlantationId::new("p")).expect("get");
        assert_eq!(stored.tree_count, 0);
        assert_eq!(stored.tasks.len(), 1);
        assert_eq!(stored.tasks[0].due_date, day(10));
        assert_eq!(session.templates().expect("templates")[0].next_run_date, day(17));
    }

    /// L3.3: Harvest dates feed the average used by insights.
    #[test]
    fn harvest_average_reaches_insights() {
        let clock = FixedClock::new(day(1));
        let mut session = Session::new().with_clock(clock.clone());
        for id in ["done", "growing"] {
            session
                .add_plantation(PlantationDraft {
                    id: PlantationId::new(id),
                    name: id.into(),
                    start_date: NaiveDate::from_ymd_opt(2024, 3, 1).expect("valid date"),
                    tree_count: 10,
                    area_hectares: 1.0,
                    carbon_offset_tons: 0.0,
                })
                .expect("add");
        }

        let done = PlantationId::new("done");
        session.advance_stage(&done, None).expect("advance");
        session.advance_stage(&done, None).expect("advance");
        session
            .advance_stage(&PlantationId::new("growing"), None)
            .expect("advance");

        // 2024-03-01 .. 2024-06-01 is 92 days.
        let report = session.health(&PlantationId::new("growing")).expect("health");
        assert!(
            report
                .insights
                .iter()
                .any(|i| i.message.contains("historical average to harvest is 92 days"))
        );
    }
}
