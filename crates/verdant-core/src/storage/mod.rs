//! # Storage
//!
//! Persistent [`crate::PlantationStore`] backends.

mod redb_store;

pub use redb_store::RedbStore;
