//! # Verdant CLI Module
//!
//! This module implements the CLI interface for Verdant.
//!
//! ## Available Commands
//!
//! - `init` - Initialize new database
//! - `status` - Show store summary
//! - `add-plantation` / `add-template` / `add-task` - Create records
//! - `set-task-status` / `record-yield` / `add-collaborator` - Edit a plantation
//! - `advance` - Move one plantation to its next stage
//! - `bulk-stage` / `suggest-stage` - Batch stage changes
//! - `run-scheduler` - Fire due recurring templates
//! - `health` - Score one or all plantations

mod commands;

use crate::config::{Backend, CliOverrides, VerdantConfig};
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use std::collections::BTreeSet;
use std::path::PathBuf;
use verdant_core::{
    CollaboratorRef, GrowthStage, PlantationDraft, PlantationId, Session, TaskId, TaskStatus,
    TemplateDraft, TemplateId, VerdantError,
};

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// Verdant - plantation lifecycle engine
///
/// Tracks growth stages, fires recurring care tasks and scores plantation health.
#[derive(Parser, Debug)]
#[command(name = "verdant")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to the plantation database [default: verdant.redb]
    #[arg(short = 'D', long, global = true)]
    pub database: Option<PathBuf>,

    /// Storage backend: "redb" (ACID database) or "memory" (empty, read-only dry runs)
    #[arg(short = 'B', long, global = true)]
    pub backend: Option<String>,

    /// Path to the TOML config file [default: verdant.toml]
    #[arg(short = 'c', long, global = true)]
    pub config: Option<PathBuf>,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a new empty database
    Init {
        /// Replace an existing database file
        #[arg(short, long)]
        force: bool,
    },

    /// Show store summary
    Status,

    /// Register a plantation
    AddPlantation {
        #[arg(long)]
        id: String,

        #[arg(long)]
        name: String,

        /// Planting date (YYYY-MM-DD)
        #[arg(long, value_parser = parse_date)]
        start_date: NaiveDate,

        /// Negative values are stored as zero
        #[arg(long, default_value = "0", allow_hyphen_values = true)]
        trees: i64,

        #[arg(long, default_value = "0", allow_hyphen_values = true)]
        area_hectares: f64,

        #[arg(long, default_value = "0", allow_hyphen_values = true)]
        carbon_tons: f64,
    },

    /// Register a recurring task template
    AddTemplate {
        #[arg(long)]
        id: String,

        #[arg(long)]
        plantation: String,

        #[arg(long)]
        title: String,

        #[arg(long)]
        description: Option<String>,

        /// daily, weekly or monthly
        #[arg(long, default_value = "weekly")]
        frequency: String,

        /// Fire every N frequency units
        #[arg(long, default_value = "1", allow_hyphen_values = true)]
        interval: i64,

        /// Days before the run date that the task becomes due
        #[arg(long, default_value = "0", allow_hyphen_values = true)]
        lead_time_days: i64,

        /// First run (RFC 3339 or YYYY-MM-DD)
        #[arg(long, value_parser = parse_timestamp)]
        next_run: DateTime<Utc>,

        /// Store the template without letting it fire
        #[arg(long)]
        disabled: bool,
    },

    /// Add a one-off task to a plantation
    AddTask {
        #[arg(long)]
        plantation: String,

        #[arg(long)]
        title: String,

        #[arg(long)]
        description: Option<String>,

        /// Due date (RFC 3339 or YYYY-MM-DD)
        #[arg(long, value_parser = parse_timestamp)]
        due: DateTime<Utc>,
    },

    /// Change a task's status
    SetTaskStatus {
        #[arg(long)]
        plantation: String,

        #[arg(long)]
        task: String,

        /// pending, in_progress or completed
        #[arg(long)]
        status: TaskStatus,
    },

    /// Record a yield checkpoint
    RecordYield {
        #[arg(long)]
        plantation: String,

        /// Harvest date (YYYY-MM-DD)
        #[arg(long, value_parser = parse_date)]
        date: NaiveDate,

        #[arg(long, allow_hyphen_values = true)]
        kg: f64,
    },

    /// Add a collaborator to a plantation
    AddCollaborator {
        #[arg(long)]
        plantation: String,

        #[arg(long)]
        collaborator: String,
    },

    /// Move a plantation to its next growth stage
    Advance {
        #[arg(long)]
        plantation: String,

        #[arg(long)]
        note: Option<String>,
    },

    /// Move several plantations to one stage
    BulkStage {
        /// planted, growing or harvested
        #[arg(long)]
        target: GrowthStage,

        /// Plantation ids (comma-separated)
        #[arg(long, value_delimiter = ',', required = true)]
        ids: Vec<String>,

        #[arg(long)]
        note: Option<String>,
    },

    /// Suggest a bulk target stage for a selection
    SuggestStage {
        /// Plantation ids (comma-separated)
        #[arg(long, value_delimiter = ',')]
        ids: Vec<String>,
    },

    /// Fire every due recurring template once
    RunScheduler,

    /// Score plantation health
    Health {
        /// Score a single plantation instead of all of them
        #[arg(long)]
        plantation: Option<String>,
    },
}

impl Commands {
    /// Whether the command changes stored state.
    #[must_use]
    pub fn is_write(&self) -> bool {
        !matches!(
            self,
            Commands::Init { .. }
                | Commands::Status
                | Commands::SuggestStage { .. }
                | Commands::Health { .. }
        )
    }
}

impl Cli {
    /// Flags that take part in config resolution.
    #[must_use]
    pub fn overrides(&self) -> CliOverrides {
        CliOverrides {
            config: self.config.clone(),
            database: self.database.clone(),
            backend: self.backend.clone(),
        }
    }
}

// =============================================================================
// ARGUMENT PARSERS
// =============================================================================

fn parse_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|e| format!("expected YYYY-MM-DD: {}", e))
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, String> {
    let s = s.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Ok(ts.with_timezone(&Utc));
    }
    parse_date(s)?
        .and_hms_opt(0, 0, 0)
        .map(|naive| naive.and_utc())
        .ok_or_else(|| format!("invalid timestamp '{}'", s))
}

/// Comma-separated ids, blanks dropped.
fn id_set(ids: Vec<String>) -> BTreeSet<PlantationId> {
    ids.into_iter()
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .map(PlantationId)
        .collect()
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments and resolved configuration.
pub fn execute(cli: Cli, config: &VerdantConfig) -> Result<(), VerdantError> {
    let json_mode = cli.json_mode;

    let command = match cli.command {
        Some(Commands::Init { force }) => return cmd_init(config, force),
        // No subcommand - show status by default
        None => Commands::Status,
        Some(command) => command,
    };

    // A memory store starts empty on every run, so writes would be lost.
    if config.backend == Backend::Memory && command.is_write() {
        return Err(VerdantError::ConfigError(
            "the memory backend is read-only from the command line; use --backend redb to record changes"
                .to_string(),
        ));
    }

    let mut session = open_session(config)?;

    match command {
        Commands::Init { .. } | Commands::Status => cmd_status(&session, config, json_mode),
        Commands::AddPlantation {
            id,
            name,
            start_date,
            trees,
            area_hectares,
            carbon_tons,
        } => cmd_add_plantation(
            &mut session,
            json_mode,
            PlantationDraft {
                id: PlantationId::new(id),
                name,
                start_date,
                tree_count: trees,
                area_hectares,
                carbon_offset_tons: carbon_tons,
            },
        ),
        Commands::AddTemplate {
            id,
            plantation,
            title,
            description,
            frequency,
            interval,
            lead_time_days,
            next_run,
            disabled,
        } => cmd_add_template(
            &mut session,
            json_mode,
            TemplateDraft {
                id: TemplateId::new(id),
                plantation_id: PlantationId::new(plantation),
                title,
                description,
                frequency,
                interval,
                lead_time_days,
                next_run_date: next_run,
                enabled: !disabled,
            },
        ),
        Commands::AddTask {
            plantation,
            title,
            description,
            due,
        } => cmd_add_task(
            &mut session,
            json_mode,
            &PlantationId::new(plantation),
            &title,
            description,
            due,
        ),
        Commands::SetTaskStatus {
            plantation,
            task,
            status,
        } => cmd_set_task_status(
            &mut session,
            json_mode,
            &PlantationId::new(plantation),
            &TaskId::new(task),
            status,
        ),
        Commands::RecordYield {
            plantation,
            date,
            kg,
        } => cmd_record_yield(
            &mut session,
            json_mode,
            &PlantationId::new(plantation),
            date,
            kg,
        ),
        Commands::AddCollaborator {
            plantation,
            collaborator,
        } => cmd_add_collaborator(
            &mut session,
            json_mode,
            &PlantationId::new(plantation),
            CollaboratorRef::new(collaborator),
        ),
        Commands::Advance { plantation, note } => cmd_advance(
            &mut session,
            json_mode,
            &PlantationId::new(plantation),
            note,
        ),
        Commands::BulkStage { target, ids, note } => {
            cmd_bulk_stage(&mut session, json_mode, target, &id_set(ids), note)
        }
        Commands::SuggestStage { ids } => cmd_suggest_stage(&session, json_mode, &id_set(ids)),
        Commands::RunScheduler => cmd_run_scheduler(&mut session, json_mode),
        Commands::Health { plantation } => {
            cmd_health(&session, json_mode, plantation.map(PlantationId::new).as_ref())
        }
    }
}

/// Open a session on the configured backend.
pub fn open_session(config: &VerdantConfig) -> Result<Session, VerdantError> {
    match config.backend {
        Backend::Redb => Session::with_redb(&config.database),
        Backend::Memory => Ok(Session::new()),
    }
}
