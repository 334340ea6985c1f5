//! # Plantation Store
//!
//! The injected key-value store the lifecycle engine reads from and writes to.
//!
//! This module defines the `PlantationStore` trait and its in-memory
//! implementation. All data structures use `BTreeMap` for deterministic
//! ordering. The redb-backed implementation lives in [`crate::storage`].

use crate::scheduler::{ApplyOutcome, RecurringTaskTemplate, SchedulerRun};
use crate::types::{Plantation, PlantationId, TemplateId, VerdantError};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

// =============================================================================
// PLANTATIONSTORE TRAIT
// =============================================================================

/// The PlantationStore trait defines read and replace-in-place operations.
///
/// All fallible operations return `Result<T, VerdantError>` to support both
/// in-memory and persistent storage backends uniformly. Listings are ordered
/// by id.
pub trait PlantationStore {
    /// Get a plantation by id.
    fn get_plantation(&self, id: &PlantationId) -> Result<Option<Plantation>, VerdantError>;

    /// List every plantation.
    fn list_plantations(&self) -> Result<Vec<Plantation>, VerdantError>;

    /// Insert a new plantation. Fails if the id is taken.
    fn insert_plantation(&mut self, plantation: Plantation) -> Result<(), VerdantError>;

    /// Replace existing plantations in one unit. Fails, writing nothing, if
    /// any of them is unknown.
    fn replace_plantations(&mut self, plantations: &[Plantation]) -> Result<(), VerdantError>;

    /// List every recurring template.
    fn list_templates(&self) -> Result<Vec<RecurringTaskTemplate>, VerdantError>;

    /// Insert a new template. Fails if the id is taken or its plantation is unknown.
    fn insert_template(&mut self, template: RecurringTaskTemplate) -> Result<(), VerdantError>;

    /// Replace templates in one unit. Unknown ids are inserted.
    fn replace_templates(&mut self, templates: &[RecurringTaskTemplate])
    -> Result<(), VerdantError>;

    /// Replace a single plantation.
    fn replace_plantation(&mut self, plantation: Plantation) -> Result<(), VerdantError> {
        self.replace_plantations(std::slice::from_ref(&plantation))
    }

    /// Persist a scheduler run: append fired tasks and store advanced templates.
    ///
    /// Backends with transactions override this to write both halves
    /// atomically.
    fn commit_scheduler_run(
        &mut self,
        run: &SchedulerRun,
        now: DateTime<Utc>,
    ) -> Result<ApplyOutcome, VerdantError> {
        let mut plantations = self.list_plantations()?;
        let outcome = run.apply(&mut plantations, now);
        let touched: Vec<Plantation> = plantations
            .into_iter()
            .filter(|p| run.fired_tasks.iter().any(|f| f.plantation_id == p.id))
            .collect();
        self.replace_plantations(&touched)?;
        self.replace_templates(&run.updated_templates)?;
        Ok(outcome)
    }
}

// =============================================================================
// IN-MEMORY IMPLEMENTATION
// =============================================================================

/// In-memory store.
///
/// Uses `BTreeMap` exclusively for deterministic ordering.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    plantations: BTreeMap<PlantationId, Plantation>,
    templates: BTreeMap<TemplateId, RecurringTaskTemplate>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of plantations.
    #[must_use]
    pub fn plantation_count(&self) -> usize {
        self.plantations.len()
    }

    /// Number of templates.
    #[must_use]
    pub fn template_count(&self) -> usize {
        self.templates.len()
    }
}

impl PlantationStore for MemoryStore {
    fn get_plantation(&self, id: &PlantationId) -> Result<Option<Plantation>, VerdantError> {
        Ok(self.plantations.get(id).cloned())
    }

    fn list_plantations(&self) -> Result<Vec<Plantation>, VerdantError> {
        Ok(self.plantations.values().cloned().collect())
    }

    fn insert_plantation(&mut self, plantation: Plantation) -> Result<(), VerdantError> {
        if self.plantations.contains_key(&plantation.id) {
            return Err(VerdantError::DuplicatePlantation(plantation.id));
        }
        self.plantations.insert(plantation.id.clone(), plantation);
        Ok(())
    }

    fn replace_plantations(&mut self, plantations: &[Plantation]) -> Result<(), VerdantError> {
        if let Some(unknown) = plantations
            .iter()
            .find(|p| !self.plantations.contains_key(&p.id))
        {
            return Err(VerdantError::PlantationNotFound(unknown.id.clone()));
        }
        for plantation in plantations {
            self.plantations
                .insert(plantation.id.clone(), plantation.clone());
        }
        Ok(())
    }

    fn list_templates(&self) -> Result<Vec<RecurringTaskTemplate>, VerdantError> {
        Ok(self.templates.values().cloned().collect())
    }

    fn insert_template(&mut self, template: RecurringTaskTemplate) -> Result<(), VerdantError> {
        if self.templates.contains_key(&template.id) {
            return Err(VerdantError::DuplicateTemplate(template.id));
        }
        if !self.plantations.contains_key(&template.plantation_id) {
            return Err(VerdantError::PlantationNotFound(template.plantation_id));
        }
        self.templates.insert(template.id.clone(), template);
        Ok(())
    }

    fn replace_templates(
        &mut self,
        templates: &[RecurringTaskTemplate],
    ) -> Result<(), VerdantError> {
        for template in templates {
            self.templates.insert(template.id.clone(), template.clone());
        }
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================
