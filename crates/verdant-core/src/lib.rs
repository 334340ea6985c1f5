//! # verdant-core
//!
//! The plantation lifecycle engine for Verdant - THE LOGIC.
//!
//! This crate decides when recurring care tasks fire, how healthy a
//! plantation is, and how a batch of plantations moves between growth
//! stages. Everything else (command line, configuration, log output) is the
//! app's job.
//!
//! ## Architectural Constraints
//!
//! The CORE:
//! - Is deterministic: time arrives through the [`Clock`] port, never `Utc::now()`
//! - Keeps the engines pure: scheduler, scorer and coordinator take snapshots
//!   and return new values; only [`Session`] writes to a [`PlantationStore`]
//! - Has NO async, NO network dependencies (pure Rust)
//! - Uses integer arithmetic for scores

// =============================================================================
// MODULES
// =============================================================================

pub mod bulk;
pub mod formats;
pub mod health;
pub mod ports;
pub mod primitives;
pub mod scheduler;
pub mod session;
pub mod storage;
pub mod system;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{
    CollaboratorRef, Plantation, PlantationDraft, PlantationId, StageUpdate, Task, TaskId,
    TaskStatus, TemplateId, VerdantError, YieldCheckpoint,
};

// =============================================================================
// RE-EXPORTS: Engines
// =============================================================================

pub use bulk::{BulkStageCoordinator, BulkStageOutcome, BulkStageReport};
pub use health::{HealthReport, HealthScorer, Insight, Severity, average_days_to_harvest};
pub use scheduler::{
    ApplyOutcome, FiredTask, Frequency, RecurringTaskTemplate, SchedulerRun, TemplateDraft,
    process_templates,
};
pub use session::{SchedulerSummary, Session, StorageBackend};

// =============================================================================
// RE-EXPORTS: Ports and Storage
// =============================================================================

pub use formats::{RecordHeader, decode_record, encode_record};
pub use ports::{Clock, FixedClock, MemoryStore, PlantationStore, SystemClock};
pub use storage::RedbStore;

// =============================================================================
// RE-EXPORTS: System (from system module)
// =============================================================================

pub use system::{GrowthStage, suggested_target_stage};
