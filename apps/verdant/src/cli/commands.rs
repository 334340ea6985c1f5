//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.
//! Every command prints either a human-readable summary or, in JSON mode,
//! one pretty-printed JSON document on stdout.

use crate::config::{Backend, VerdantConfig};
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::BTreeSet;
use verdant_core::{
    CollaboratorRef, GrowthStage, HealthReport, PlantationDraft, PlantationId, Session,
    TaskId, TaskStatus, TemplateDraft, VerdantError,
};

fn print_json(value: &serde_json::Value) {
    println!("{}", serde_json::to_string_pretty(value).unwrap_or_default());
}

// =============================================================================
// INIT COMMAND
// =============================================================================

/// Initialize new database.
pub fn cmd_init(config: &VerdantConfig, force: bool) -> Result<(), VerdantError> {
    if config.backend == Backend::Memory {
        println!("Memory backend selected; nothing to initialize");
        return Ok(());
    }

    let db_path = &config.database;
    if db_path.exists() {
        if !force {
            return Err(VerdantError::IoError(format!(
                "Database already exists at {}. Use --force to overwrite.",
                db_path.display()
            )));
        }
        std::fs::remove_file(db_path)
            .map_err(|e| VerdantError::IoError(format!("Remove old database: {}", e)))?;
        tracing::info!(path = %db_path.display(), "removed existing database");
    }

    let _session = Session::with_redb(db_path)?;
    println!("Initialized new redb database at {}", db_path.display());
    Ok(())
}

// =============================================================================
// STATUS COMMAND
// =============================================================================

/// Show store summary.
pub fn cmd_status(
    session: &Session,
    config: &VerdantConfig,
    json_mode: bool,
) -> Result<(), VerdantError> {
    let plantations = session.plantations()?;
    let templates = session.templates()?;

    let count_at = |stage: GrowthStage| plantations.iter().filter(|p| p.stage == stage).count();
    let open_tasks: usize = plantations
        .iter()
        .map(|p| p.tasks.iter().filter(|t| t.status.is_open()).count())
        .sum();
    let enabled_templates = templates.iter().filter(|t| t.enabled).count();

    if json_mode {
        print_json(&serde_json::json!({
            "database": config.database.to_string_lossy(),
            "backend": config.backend.to_string(),
            "plantations": plantations.len(),
            "planted": count_at(GrowthStage::Planted),
            "growing": count_at(GrowthStage::Growing),
            "harvested": count_at(GrowthStage::Harvested),
            "open_tasks": open_tasks,
            "templates": templates.len(),
            "enabled_templates": enabled_templates,
        }));
        return Ok(());
    }

    println!("Verdant Store Status");
    println!("====================");
    println!("Database: {}", config.database.display());
    println!("Backend:  {}", config.backend);
    println!();
    println!("Plantations: {}", plantations.len());
    for stage in GrowthStage::order() {
        println!("  {:<10} {}", stage.name(), count_at(stage));
    }
    println!("Open tasks:  {}", open_tasks);
    println!(
        "Templates:   {} ({} enabled)",
        templates.len(),
        enabled_templates
    );

    Ok(())
}

// =============================================================================
// RECORD COMMANDS
// =============================================================================

/// Register a plantation.
pub fn cmd_add_plantation(
    session: &mut Session,
    json_mode: bool,
    draft: PlantationDraft,
) -> Result<(), VerdantError> {
    let plantation = session.add_plantation(draft)?;

    if json_mode {
        print_json(&serde_json::to_value(&plantation).unwrap_or_default());
    } else {
        println!(
            "Added plantation {} ({}), {} trees on {} ha, started {}",
            plantation.id,
            plantation.name,
            plantation.tree_count,
            plantation.area_hectares,
            plantation.start_date
        );
    }
    Ok(())
}

/// Register a recurring template.
pub fn cmd_add_template(
    session: &mut Session,
    json_mode: bool,
    draft: TemplateDraft,
) -> Result<(), VerdantError> {
    let template = session.add_template(draft)?;

    if json_mode {
        print_json(&serde_json::to_value(&template).unwrap_or_default());
    } else {
        println!(
            "Added template {} for {}: \"{}\" every {} x {}, next run {}{}",
            template.id,
            template.plantation_id,
            template.title,
            template.interval,
            template.frequency,
            template.next_run_date.to_rfc3339(),
            if template.enabled { "" } else { " (disabled)" }
        );
    }
    Ok(())
}

/// Add a one-off task.
pub fn cmd_add_task(
    session: &mut Session,
    json_mode: bool,
    plantation_id: &PlantationId,
    title: &str,
    description: Option<String>,
    due: DateTime<Utc>,
) -> Result<(), VerdantError> {
    let task = session.add_task(plantation_id, title, description, due)?;

    if json_mode {
        print_json(&serde_json::to_value(&task).unwrap_or_default());
    } else {
        println!(
            "Added task {} \"{}\" due {}",
            task.id,
            task.title,
            task.due_date.to_rfc3339()
        );
    }
    Ok(())
}

/// Change a task's status.
pub fn cmd_set_task_status(
    session: &mut Session,
    json_mode: bool,
    plantation_id: &PlantationId,
    task_id: &TaskId,
    status: TaskStatus,
) -> Result<(), VerdantError> {
    session.set_task_status(plantation_id, task_id, status)?;

    if json_mode {
        print_json(&serde_json::json!({
            "plantation": plantation_id,
            "task": task_id,
            "status": status,
        }));
    } else {
        println!("Task {} is now {}", task_id, status);
    }
    Ok(())
}

/// Record a yield checkpoint.
pub fn cmd_record_yield(
    session: &mut Session,
    json_mode: bool,
    plantation_id: &PlantationId,
    date: NaiveDate,
    yield_kg: f64,
) -> Result<(), VerdantError> {
    session.record_yield(plantation_id, date, yield_kg)?;
    let checkpoints = session.plantation(plantation_id)?.yield_timeline.len();

    if json_mode {
        print_json(&serde_json::json!({
            "plantation": plantation_id,
            "date": date,
            "checkpoints": checkpoints,
        }));
    } else {
        println!(
            "Recorded yield for {} on {} ({} checkpoint(s) total)",
            plantation_id, date, checkpoints
        );
    }
    Ok(())
}

/// Add a collaborator.
pub fn cmd_add_collaborator(
    session: &mut Session,
    json_mode: bool,
    plantation_id: &PlantationId,
    collaborator: CollaboratorRef,
) -> Result<(), VerdantError> {
    let added = session.add_collaborator(plantation_id, collaborator.clone())?;

    if json_mode {
        print_json(&serde_json::json!({
            "plantation": plantation_id,
            "collaborator": collaborator,
            "added": added,
        }));
    } else if added {
        println!("Added {} to {}", collaborator, plantation_id);
    } else {
        println!("{} already collaborates on {}", collaborator, plantation_id);
    }
    Ok(())
}

// =============================================================================
// STAGE COMMANDS
// =============================================================================

/// Move one plantation to its next stage.
pub fn cmd_advance(
    session: &mut Session,
    json_mode: bool,
    plantation_id: &PlantationId,
    note: Option<String>,
) -> Result<(), VerdantError> {
    let before = session.plantation(plantation_id)?.stage;
    let after = session.advance_stage(plantation_id, note)?;

    if json_mode {
        print_json(&serde_json::json!({
            "plantation": plantation_id,
            "from": before,
            "to": after,
            "progress": after.progress(),
            "changed": before != after,
        }));
    } else if before == after {
        println!("{} is already {}", plantation_id, after);
    } else {
        println!(
            "{}: {} -> {} ({}%)",
            plantation_id,
            before,
            after,
            after.progress()
        );
    }
    Ok(())
}

/// Move a selection to one stage.
pub fn cmd_bulk_stage(
    session: &mut Session,
    json_mode: bool,
    target: GrowthStage,
    ids: &BTreeSet<PlantationId>,
    note: Option<String>,
) -> Result<(), VerdantError> {
    let report = session.bulk_set_stage(target, ids, note)?;

    if json_mode {
        let mut value = serde_json::to_value(&report).unwrap_or_default();
        if let Some(map) = value.as_object_mut() {
            map.insert("audit_note".into(), report.audit_note().into());
        }
        print_json(&value);
    } else {
        println!("{}", report.audit_note());
        for id in &report.missing {
            println!("  not found: {}", id);
        }
    }
    Ok(())
}

/// Suggest a bulk target for a selection.
pub fn cmd_suggest_stage(
    session: &Session,
    json_mode: bool,
    ids: &BTreeSet<PlantationId>,
) -> Result<(), VerdantError> {
    let suggestion = session.suggest_stage(ids)?;

    if json_mode {
        print_json(&serde_json::json!({ "suggested_stage": suggestion }));
    } else {
        println!("Suggested target stage: {}", suggestion);
    }
    Ok(())
}

// =============================================================================
// SCHEDULER COMMAND
// =============================================================================

/// Fire every due template once.
pub fn cmd_run_scheduler(session: &mut Session, json_mode: bool) -> Result<(), VerdantError> {
    let summary = session.run_scheduler()?;

    if json_mode {
        let fired: Vec<serde_json::Value> = summary
            .run
            .fired_tasks
            .iter()
            .map(|f| {
                serde_json::json!({
                    "plantation": f.plantation_id,
                    "task": f.task.id,
                    "title": f.task.title,
                    "due": f.task.due_date,
                })
            })
            .collect();
        print_json(&serde_json::json!({
            "fired": fired,
            "appended": summary.outcome.appended,
            "duplicates": summary.outcome.duplicates,
            "orphaned": summary.outcome.orphaned,
        }));
        return Ok(());
    }

    if summary.run.is_empty() {
        println!("No templates due");
        return Ok(());
    }
    println!("Fired {} task(s):", summary.run.fired_count());
    for fired in &summary.run.fired_tasks {
        println!(
            "  {} {} \"{}\" due {}",
            fired.plantation_id,
            fired.task.id,
            fired.task.title,
            fired.task.due_date.to_rfc3339()
        );
    }
    if !summary.outcome.orphaned.is_empty() {
        println!(
            "Dropped {} task(s) for missing plantations",
            summary.outcome.orphaned.len()
        );
    }
    Ok(())
}

// =============================================================================
// HEALTH COMMAND
// =============================================================================

/// Score one plantation, or all of them best first.
pub fn cmd_health(
    session: &Session,
    json_mode: bool,
    plantation_id: Option<&PlantationId>,
) -> Result<(), VerdantError> {
    let reports: Vec<(PlantationId, HealthReport)> = match plantation_id {
        Some(id) => vec![(id.clone(), session.health(id)?)],
        None => session.health_all()?,
    };

    if json_mode {
        let value: Vec<serde_json::Value> = reports
            .iter()
            .map(|(id, report)| {
                serde_json::json!({
                    "plantation": id,
                    "score": report.score,
                    "healthy": report.is_healthy(),
                    "urgent_tasks": report.urgent_tasks,
                    "days_since_update": report.days_since_update,
                    "age_days": report.age_days,
                    "insights": report.insights,
                })
            })
            .collect();
        print_json(&serde_json::Value::Array(value));
        return Ok(());
    }

    if reports.is_empty() {
        println!("No plantations");
        return Ok(());
    }
    for (id, report) in &reports {
        println!("{:<20} {:>3}/100", id.as_str(), report.score);
        for insight in &report.insights {
            println!("  [{:?}] {}", insight.severity, insight.message);
        }
    }
    Ok(())
}
