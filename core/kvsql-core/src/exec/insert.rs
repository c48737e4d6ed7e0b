//! INSERT — batch existence pre-check followed by sequential writes.
//!
//! In strict mode the whole batch is rejected when any key already exists,
//! so a failed statement writes nothing. Two rows carrying the same key in
//! one batch are rejected the same way; only `InsertMode::Ignore` writes
//! both, the later row merging over the earlier one. The check and the writes are
//! separate round trips: a concurrent writer may still create a colliding key
//! in between.

use crate::config::ExecutorConfig;
use crate::cursor::{RowCursor, StaticCursor};
use crate::error::{KvsqlError, KvsqlResult};
use crate::exec::Executor;
use crate::sql::metadata::ResultMetadata;
use crate::storage::{Key, StorageClient, UserKey};
use crate::value::{Bins, Value};
use ahash::AHashSet;
use std::sync::Arc;
use tracing::{debug, info};

/// Conflict handling of an INSERT
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InsertMode {
    /// Fail the batch on any existing or repeated key
    #[default]
    Strict,
    /// `INSERT IGNORE`: no pre-check, rows are merged into existing records
    Ignore,
}

/// Update count plus the (row-less) result cursor of an INSERT.
pub struct InsertOutcome {
    pub rows_written: usize,
    pub cursor: Box<dyn RowCursor>,
}

impl InsertOutcome {
    pub fn into_parts(self) -> (usize, Box<dyn RowCursor>) {
        (self.rows_written, self.cursor)
    }
}

pub struct InsertExecutor {
    namespace: String,
    set: String,
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
    pk_index: usize,
    mode: InsertMode,
}

impl InsertExecutor {
    /// Fails with `MissingPrimaryKey` when `columns` lacks the primary-key column.
    pub fn new(
        config: &ExecutorConfig,
        set: impl Into<String>,
        columns: Vec<String>,
        rows: Vec<Vec<Value>>,
    ) -> KvsqlResult<Self> {
        let pk_index = columns
            .iter()
            .position(|c| *c == config.primary_key_column)
            .ok_or_else(|| KvsqlError::MissingPrimaryKey {
                column: config.primary_key_column.clone(),
            })?;

        Ok(Self {
            namespace: config.namespace.clone(),
            set: set.into(),
            columns,
            rows,
            pk_index,
            mode: InsertMode::default(),
        })
    }

    pub fn with_mode(mut self, mode: InsertMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Keys of all rows; any unsupported key literal fails the whole batch.
    fn keys(&self) -> KvsqlResult<Vec<Key>> {
        let pk_column = &self.columns[self.pk_index];
        self.rows
            .iter()
            .map(|row| {
                if row.len() != self.columns.len() {
                    return Err(KvsqlError::invalid_value(
                        pk_column,
                        format!("row has {} values for {} columns", row.len(), self.columns.len()),
                    ));
                }
                let user_key = UserKey::from_value(pk_column, &row[self.pk_index])?;
                Ok(Key::new(&self.namespace, &self.set, user_key))
            })
            .collect()
    }

    fn check_absent(&self, client: &dyn StorageClient, keys: &[Key]) -> KvsqlResult<()> {
        let mut seen = AHashSet::with_capacity(keys.len());
        let mut duplicates: Vec<String> = keys
            .iter()
            .filter(|key| !seen.insert(key.digest()))
            .map(|key| key.user_key().to_value().to_string())
            .collect();

        let existing = client.get_batch(keys)?;
        duplicates.extend(
            keys.iter()
                .zip(existing)
                .filter(|(_, record)| record.is_some())
                .map(|(key, _)| key.user_key().to_value().to_string()),
        );

        if duplicates.is_empty() {
            Ok(())
        } else {
            Err(KvsqlError::DuplicateKey {
                keys: duplicates.join(", "),
            })
        }
    }

    fn bins_of(&self, row: &[Value]) -> Bins {
        self.columns
            .iter()
            .zip(row)
            .enumerate()
            .filter(|(i, _)| *i != self.pk_index)
            .map(|(_, (name, value))| (name.clone(), value.clone()))
            .collect()
    }
}

impl Executor for InsertExecutor {
    type Output = InsertOutcome;

    fn apply(&self, client: &Arc<dyn StorageClient>) -> KvsqlResult<Self::Output> {
        let keys = self.keys()?;
        if self.mode == InsertMode::Strict {
            self.check_absent(client.as_ref(), &keys)?;
        }

        let mut rows_written = 0;
        for (key, row) in keys.iter().zip(&self.rows) {
            debug!(target: "kvsql", key = %key, "insert row");
            client.put(key, &self.bins_of(row))?;
            rows_written += 1;
        }
        info!(target: "kvsql", set = %self.set, rows_written, "insert complete");

        Ok(InsertOutcome {
            rows_written,
            cursor: Box::new(StaticCursor::empty(ResultMetadata::empty(
                &self.namespace,
                &self.set,
            ))),
        })
    }
}
