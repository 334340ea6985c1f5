//! # redb-backed Plantation Storage
//!
//! A disk-backed store using the redb embedded database.
//!
//! Two tables, both keyed by id string, hold header-framed postcard records
//! (see [`crate::formats`]). Every mutating call is a single write
//! transaction, so a scheduler run commits its appended tasks and advanced
//! templates together or not at all.

use crate::formats::{decode_record, encode_record};
use crate::scheduler::{ApplyOutcome, RecurringTaskTemplate, SchedulerRun};
use crate::ports::PlantationStore;
use crate::types::{Plantation, PlantationId, VerdantError};
use chrono::{DateTime, Utc};
use redb::{Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition};
use std::path::Path;

/// Table for plantations: id -> encoded Plantation
const PLANTATIONS: TableDefinition<&str, &[u8]> = TableDefinition::new("plantations");

/// Table for templates: id -> encoded RecurringTaskTemplate
const TEMPLATES: TableDefinition<&str, &[u8]> = TableDefinition::new("templates");

fn io_err(e: impl std::fmt::Display) -> VerdantError {
    VerdantError::IoError(e.to_string())
}

/// A disk-backed plantation store using redb.
pub struct RedbStore {
    db: Database,
}

impl std::fmt::Debug for RedbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbStore").finish_non_exhaustive()
    }
}

impl RedbStore {
    /// Open or create a store at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, VerdantError> {
        let db = Database::create(path.as_ref()).map_err(io_err)?;

        // Initialize tables if they don't exist
        {
            let write_txn = db.begin_write().map_err(io_err)?;
            let _ = write_txn.open_table(PLANTATIONS).map_err(io_err)?;
            let _ = write_txn.open_table(TEMPLATES).map_err(io_err)?;
            write_txn.commit().map_err(io_err)?;
        }

        tracing::debug!(path = %path.as_ref().display(), "opened redb store");
        Ok(Self { db })
    }

    /// Number of stored plantations.
    pub fn plantation_count(&self) -> Result<u64, VerdantError> {
        let read_txn = self.db.begin_read().map_err(io_err)?;
        let table = read_txn.open_table(PLANTATIONS).map_err(io_err)?;
        table.len().map_err(io_err)
    }

    /// Number of stored templates.
    pub fn template_count(&self) -> Result<u64, VerdantError> {
        let read_txn = self.db.begin_read().map_err(io_err)?;
        let table = read_txn.open_table(TEMPLATES).map_err(io_err)?;
        table.len().map_err(io_err)
    }
}

impl PlantationStore for RedbStore {
    fn get_plantation(&self, id: &PlantationId) -> Result<Option<Plantation>, VerdantError> {
        let read_txn = self.db.begin_read().map_err(io_err)?;
        let table = read_txn.open_table(PLANTATIONS).map_err(io_err)?;
        match table.get(id.as_str()).map_err(io_err)? {
            Some(guard) => decode_record(guard.value()).map(Some),
            None => Ok(None),
        }
    }

    fn list_plantations(&self) -> Result<Vec<Plantation>, VerdantError> {
        let read_txn = self.db.begin_read().map_err(io_err)?;
        let table = read_txn.open_table(PLANTATIONS).map_err(io_err)?;

        let mut plantations = Vec::new();
        for entry in table.iter().map_err(io_err)? {
            let (_, value) = entry.map_err(io_err)?;
            plantations.push(decode_record(value.value())?);
        }
        Ok(plantations)
    }

    fn insert_plantation(&mut self, plantation: Plantation) -> Result<(), VerdantError> {
        let bytes = encode_record(&plantation)?;
        let write_txn = self.db.begin_write().map_err(io_err)?;
        let exists = {
            let mut table = write_txn.open_table(PLANTATIONS).map_err(io_err)?;
            let exists = table.get(plantation.id.as_str()).map_err(io_err)?.is_some();
            if !exists {
                table
                    .insert(plantation.id.as_str(), bytes.as_slice())
                    .map_err(io_err)?;
            }
            exists
        };

        if exists {
            write_txn.abort().map_err(io_err)?;
            return Err(VerdantError::DuplicatePlantation(plantation.id));
        }
        write_txn.commit().map_err(io_err)
    }

    fn replace_plantations(&mut self, plantations: &[Plantation]) -> Result<(), VerdantError> {
        let write_txn = self.db.begin_write().map_err(io_err)?;
        let unknown = {
            let mut table = write_txn.open_table(PLANTATIONS).map_err(io_err)?;
            let mut unknown = None;
            for plantation in plantations {
                if table.get(plantation.id.as_str()).map_err(io_err)?.is_none() {
                    unknown = Some(plantation.id.clone());
                    break;
                }
                let bytes = encode_record(plantation)?;
                table
                    .insert(plantation.id.as_str(), bytes.as_slice())
                    .map_err(io_err)?;
            }
            unknown
        };

        if let Some(id) = unknown {
            write_txn.abort().map_err(io_err)?;
            return Err(VerdantError::PlantationNotFound(id));
        }
        write_txn.commit().map_err(io_err)
    }

    fn list_templates(&self) -> Result<Vec<RecurringTaskTemplate>, VerdantError> {
        let read_txn = self.db.begin_read().map_err(io_err)?;
        let table = read_txn.open_table(TEMPLATES).map_err(io_err)?;

        let mut templates = Vec::new();
        for entry in table.iter().map_err(io_err)? {
            let (_, value) = entry.map_err(io_err)?;
            templates.push(decode_record(value.value())?);
        }
        Ok(templates)
    }

    fn insert_template(&mut self, template: RecurringTaskTemplate) -> Result<(), VerdantError> {
        let bytes = encode_record(&template)?;
        let write_txn = self.db.begin_write().map_err(io_err)?;
        let rejection = {
            let plantations = write_txn.open_table(PLANTATIONS).map_err(io_err)?;
            let mut templates = write_txn.open_table(TEMPLATES).map_err(io_err)?;

            if templates.get(template.id.as_str()).map_err(io_err)?.is_some() {
                Some(VerdantError::DuplicateTemplate(template.id.clone()))
            } else if plantations
                .get(template.plantation_id.as_str())
                .map_err(io_err)?
                .is_none()
            {
                Some(VerdantError::PlantationNotFound(
                    template.plantation_id.clone(),
                ))
            } else {
                templates
                    .insert(template.id.as_str(), bytes.as_slice())
                    .map_err(io_err)?;
                None
            }
        };

        if let Some(err) = rejection {
            write_txn.abort().map_err(io_err)?;
            return Err(err);
        }
        write_txn.commit().map_err(io_err)
    }

    fn replace_templates(
        &mut self,
        templates: &[RecurringTaskTemplate],
    ) -> Result<(), VerdantError> {
        let write_txn = self.db.begin_write().map_err(io_err)?;
        {
            let mut table = write_txn.open_table(TEMPLATES).map_err(io_err)?;
            for template in templates {
                let bytes = encode_record(template)?;
                table
                    .insert(template.id.as_str(), bytes.as_slice())
                    .map_err(io_err)?;
            }
        }
        write_txn.commit().map_err(io_err)
    }

    fn commit_scheduler_run(
        &mut self,
        run: &SchedulerRun,
        now: DateTime<Utc>,
    ) -> Result<ApplyOutcome, VerdantError> {
        let write_txn = self.db.begin_write().map_err(io_err)?;
        let outcome = {
            let mut plantation_table = write_txn.open_table(PLANTATIONS).map_err(io_err)?;
            let mut template_table = write_txn.open_table(TEMPLATES).map_err(io_err)?;

            // Load only the plantations this run touches.
            let mut touched: Vec<Plantation> = Vec::new();
            for fired in &run.fired_tasks {
                if touched.iter().any(|p| p.id == fired.plantation_id) {
                    continue;
                }
                let stored = plantation_table
                    .get(fired.plantation_id.as_str())
                    .map_err(io_err)?
                    .map(|guard| decode_record::<Plantation>(guard.value()))
                    .transpose()?;
                if let Some(plantation) = stored {
                    touched.push(plantation);
                }
            }

            let outcome = run.apply(&mut touched, now);

            for plantation in &touched {
                let bytes = encode_record(plantation)?;
                plantation_table
                    .insert(plantation.id.as_str(), bytes.as_slice())
                    .map_err(io_err)?;
            }
            for template in &run.updated_templates {
                let bytes = encode_record(template)?;
                template_table
                    .insert(template.id.as_str(), bytes.as_slice())
                    .map_err(io_err)?;
            }
            outcome
        };
        write_txn.commit().map_err(io_err)?;

        tracing::debug!(
            appended = outcome.appended,
            duplicates = outcome.duplicates,
            templates = run.updated_templates.len(),
            "scheduler run committed"
        );
        Ok(outcome)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::scheduler::{TemplateDraft, process_templates};
    use crate::types::TemplateId;
    use chrono::{NaiveDate, TimeDelta, TimeZone};
    use tempfile::tempdir;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0)
            .single()
            .expect("valid timestamp")
    }

    fn plantation(id: &str) -> Plantation {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).expect("valid date");
        Plantation::new(PlantationId::new(id), format!("Block {id}"), start, t0())
    }

    fn template(id: &str, plantation: &str) -> RecurringTaskTemplate {
        RecurringTaskTemplate::try_from(TemplateDraft {
            id: TemplateId::new(id),
            plantation_id: PlantationId::new(plantation),
            title: "Inspect irrigation".into(),
            description: None,
            frequency: "weekly".into(),
            interval: 2,
            lead_time_days: 0,
            next_run_date: t0(),
            enabled: true,
        })
        .expect("valid template")
    }

    #[test]
    fn basic_operations() {
        let temp = tempdir().expect("temp dir");
        let mut store = RedbStore::open(temp.path().join("test.redb")).expect("open db");

        store.insert_plantation(plantation("b")).expect("insert");
        store.insert_plantation(plantation("a")).expect("insert");
        assert_eq!(store.plantation_count().expect("count"), 2);

        let ids: Vec<PlantationId> = store
            .list_plantations()
            .expect("list")
            .into_iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(ids, vec![PlantationId::new("a"), PlantationId::new("b")]);
    }

    #[test]
    fn duplicate_insert_leaves_original() {
        let temp = tempdir().expect("temp dir");
        let mut store = RedbStore::open(temp.path().join("test.redb")).expect("open db");

        store.insert_plantation(plantation("a")).expect("insert");
        let mut clash = plantation("a");
        clash.name = "Impostor".into();
        assert!(matches!(
            store.insert_plantation(clash),
            Err(VerdantError::DuplicatePlantation(_))
        ));

        let stored = store
            .get_plantation(&PlantationId::new("a"))
            .expect("get")
            .expect("present");
        assert_eq!(stored.name, "Block a");
    }

    #[test]
    fn persistence() {
        let temp = tempdir().expect("temp dir");
        let db_path = temp.path().join("test.redb");

        // Create and populate
        {
            let mut store = RedbStore::open(&db_path).expect("open db");
            store.insert_plantation(plantation("a")).expect("insert");
            store.insert_template(template("t", "a")).expect("insert");
        }

        // Reopen and verify
        {
            let store = RedbStore::open(&db_path).expect("open db");
            assert_eq!(store.plantation_count().expect("count"), 1);
            assert_eq!(store.template_count().expect("count"), 1);
            assert_eq!(store.list_templates().expect("list")[0], template("t", "a"));
        }
    }

    #[test]
    fn replace_unknown_writes_nothing() {
        let temp = tempdir().expect("temp dir");
        let mut store = RedbStore::open(temp.path().join("test.redb")).expect("open db");
        store.insert_plantation(plantation("a")).expect("insert");

        let mut renamed = plantation("a");
        renamed.name = "Renamed".into();
        assert!(
            store
                .replace_plantations(&[renamed, plantation("ghost")])
                .is_err()
        );

        let stored = store
            .get_plantation(&PlantationId::new("a"))
            .expect("get")
            .expect("present");
        assert_eq!(stored.name, "Block a");
    }

    #[test]
    fn template_for_unknown_plantation_rejected() {
        let temp = tempdir().expect("temp dir");
        let mut store = RedbStore::open(temp.path().join("test.redb")).expect("open db");
        assert!(matches!(
            store.insert_template(template("t", "ghost")),
            Err(VerdantError::PlantationNotFound(_))
        ));
        assert_eq!(store.template_count().expect("count"), 0);
    }

    #[test]
    fn scheduler_run_commits_tasks_and_templates_together() {
        let temp = tempdir().expect("temp dir");
        let db_path = temp.path().join("test.redb");
        let now = t0() + TimeDelta::hours(2);

        {
            let mut store = RedbStore::open(&db_path).expect("open db");
            store.insert_plantation(plantation("a")).expect("insert");
            store.insert_template(template("t", "a")).expect("insert");

            let run = process_templates(&store.list_templates().expect("list"), now);
            let outcome = store.commit_scheduler_run(&run, now).expect("commit");
            assert_eq!(outcome.appended, 1);
        }

        let store = RedbStore::open(&db_path).expect("open db");
        let stored = store
            .get_plantation(&PlantationId::new("a"))
            .expect("get")
            .expect("present");
        assert_eq!(stored.tasks.len(), 1);
        assert_eq!(stored.tasks[0].template_id, Some(TemplateId::new("t")));
        assert_eq!(
            store.list_templates().expect("list")[0].next_run_date,
            t0() + TimeDelta::days(14)
        );

        // A second run at the same instant finds nothing due.
        let rerun = process_templates(&store.list_templates().expect("list"), now);
        assert!(rerun.is_empty());
    }
}
