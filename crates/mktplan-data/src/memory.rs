//! In-memory backend with optional JSON snapshot persistence.
//!
//! This is the local/mocked stand-in for the remote persistence service: a
//! process-wide set of relations held behind a mutex. The lock is only held
//! for the synchronous map operation, never across an await. A
//! `fail_next`/`fail_after` slot lets tests inject one failing call, either
//! the next one or the nth, to exercise the stores' abort-on-failure
//! discipline.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::backend::{Backend, BackendError, Filter, Order, Relation, Row};

/// In-memory implementation of [`Backend`].
#[derive(Default)]
pub struct MemoryBackend {
    relations: Mutex<HashMap<Relation, Vec<Row>>>,
    fail_after: Mutex<Option<(usize, String)>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a backend from a JSON snapshot file.
    ///
    /// Unknown relation names in the snapshot are skipped with a debug log
    /// rather than rejected, so old snapshots stay loadable.
    pub fn load_snapshot(path: &Path) -> Result<Self, BackendError> {
        let contents = std::fs::read_to_string(path)?;
        let raw: HashMap<String, Vec<Row>> = serde_json::from_str(&contents)?;

        let mut relations = HashMap::new();
        for (name, rows) in raw {
            match name.parse::<Relation>() {
                Ok(relation) => {
                    relations.insert(relation, rows);
                }
                Err(_) => {
                    debug!(relation = %name, "skipping unknown relation in snapshot");
                }
            }
        }

        Ok(Self {
            relations: Mutex::new(relations),
            fail_after: Mutex::new(None),
        })
    }

    /// Write the current contents to a JSON snapshot file.
    pub fn save_snapshot(&self, path: &Path) -> Result<(), BackendError> {
        let raw: HashMap<String, Vec<Row>> = self
            .lock_relations()
            .iter()
            .map(|(relation, rows)| (relation.to_string(), rows.clone()))
            .collect();

        let contents = serde_json::to_string_pretty(&raw)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Make the next backend call fail with `BackendError::Unavailable`.
    pub fn fail_next(&self, message: &str) {
        self.fail_after(0, message);
    }

    /// Let `calls_to_allow` backend calls through, then fail the one after
    /// with `BackendError::Unavailable`. Used to break the second call of a
    /// multi-step mutation.
    pub fn fail_after(&self, calls_to_allow: usize, message: &str) {
        *self.lock_fail() = Some((calls_to_allow, message.to_owned()));
    }

    /// Number of rows currently stored in a relation.
    pub fn row_count(&self, relation: Relation) -> usize {
        self.lock_relations()
            .get(&relation)
            .map_or(0, |rows| rows.len())
    }

    fn lock_relations(&self) -> MutexGuard<'_, HashMap<Relation, Vec<Row>>> {
        self.relations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_fail(&self) -> MutexGuard<'_, Option<(usize, String)>> {
        self.fail_after
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn check_injected_failure(&self) -> Result<(), BackendError> {
        let mut slot = self.lock_fail();
        match slot.take() {
            Some((0, message)) => Err(BackendError::Unavailable(message)),
            Some((remaining, message)) => {
                *slot = Some((remaining - 1, message));
                Ok(())
            }
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn select(
        &self,
        relation: Relation,
        filter: &Filter,
        order: Option<&Order>,
    ) -> Result<Vec<Row>, BackendError> {
        self.check_injected_failure()?;

        let relations = self.lock_relations();
        let mut rows: Vec<Row> = relations
            .get(&relation)
            .map(|rows| rows.iter().filter(|r| filter.matches(r)).cloned().collect())
            .unwrap_or_default();
        drop(relations);

        if let Some(order) = order {
            order.apply(&mut rows);
        }
        Ok(rows)
    }

    async fn insert(&self, relation: Relation, rows: Vec<Row>) -> Result<Row, BackendError> {
        self.check_injected_failure()?;

        let Some(first) = rows.first().cloned() else {
            return Err(BackendError::Invalid("insert with no rows".to_owned()));
        };

        self.lock_relations()
            .entry(relation)
            .or_default()
            .extend(rows);
        Ok(first)
    }

    async fn update(
        &self,
        relation: Relation,
        filter: &Filter,
        patch: Row,
    ) -> Result<(), BackendError> {
        self.check_injected_failure()?;

        let mut relations = self.lock_relations();
        if let Some(rows) = relations.get_mut(&relation) {
            for row in rows.iter_mut().filter(|r| filter.matches(r)) {
                for (field, value) in &patch {
                    row.insert(field.clone(), value.clone());
                }
            }
        }
        Ok(())
    }

    async fn delete(&self, relation: Relation, filter: &Filter) -> Result<(), BackendError> {
        self.check_injected_failure()?;

        let mut relations = self.lock_relations();
        if let Some(rows) = relations.get_mut(&relation) {
            rows.retain(|r| !filter.matches(r));
        }
        Ok(())
    }

    async fn upsert(&self, relation: Relation, rows: Vec<Row>) -> Result<(), BackendError> {
        self.check_injected_failure()?;

        let mut relations = self.lock_relations();
        let existing = relations.entry(relation).or_default();
        for row in rows {
            let id = row.get("id").cloned().unwrap_or(Value::Null);
            match existing.iter_mut().find(|r| r.get("id") == Some(&id)) {
                Some(slot) => *slot = row,
                None => existing.push(row),
            }
        }
        Ok(())
    }
}
