//! Record cursor — row cursor over a storage record stream.
//!
//! Metadata is computed lazily. When some column has no declared type the
//! cursor samples one record: before the first `next()` the sampled record is
//! kept in a single-row replay buffer and handed out by the next `next()`, so
//! asking for metadata never skips a row.

use crate::config::ExecutorConfig;
use crate::cursor::{CursorState, RowCursor};
use crate::discovery::{needs_sample, resolve_columns};
use crate::error::{KvsqlError, KvsqlResult};
use crate::sql::column::{Column, ColumnRole};
use crate::sql::metadata::ResultMetadata;
use crate::storage::{KeyRecord, RecordStream};
use crate::value::{Bins, Value};
use tracing::trace;

/// "Any record of the set" lookup used when the stream yields nothing to sample.
pub type AnyRecordFallback = Box<dyn FnMut() -> KvsqlResult<Option<KeyRecord>> + Send>;

pub struct RecordCursor {
    schema: String,
    table: String,
    columns: Vec<Column>,
    config: ExecutorConfig,
    stream: Box<dyn RecordStream>,
    state: CursorState,
    current: Option<KeyRecord>,
    /// Record fetched ahead of `next()`
    replay: Option<KeyRecord>,
    source_exhausted: bool,
    fallback: Option<AnyRecordFallback>,
    metadata: Option<ResultMetadata>,
}

impl RecordCursor {
    pub fn new(
        schema: impl Into<String>,
        table: impl Into<String>,
        columns: Vec<Column>,
        config: &ExecutorConfig,
        stream: Box<dyn RecordStream>,
    ) -> Self {
        Self {
            schema: schema.into(),
            table: table.into(),
            columns,
            config: config.clone(),
            stream,
            state: CursorState::new(),
            current: None,
            replay: None,
            source_exhausted: false,
            fallback: None,
            metadata: None,
        }
    }

    pub fn with_fallback(mut self, fallback: AnyRecordFallback) -> Self {
        self.fallback = Some(fallback);
        self
    }

    /// Metadata fixed up front; no sampling will happen.
    pub fn with_metadata(mut self, metadata: ResultMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    fn fetch(&mut self) -> KvsqlResult<Option<KeyRecord>> {
        if let Some(record) = self.replay.take() {
            return Ok(Some(record));
        }
        if self.source_exhausted {
            return Ok(None);
        }
        let record = self.stream.next_record()?;
        if record.is_none() {
            self.source_exhausted = true;
        }
        Ok(record)
    }

    /// Fetch ahead without moving the cursor.
    fn peek(&mut self) -> KvsqlResult<Option<&KeyRecord>> {
        if self.replay.is_none() {
            self.replay = self.fetch()?;
        }
        Ok(self.replay.as_ref())
    }

    /// Record to infer types from: the current row, the next one, or any
    /// record of the set.
    fn sample(&mut self) -> KvsqlResult<Option<KeyRecord>> {
        if let Some(current) = &self.current {
            return Ok(Some(current.clone()));
        }
        if !self.state.is_done() {
            if let Some(next) = self.peek()? {
                return Ok(Some(next.clone()));
            }
        }
        match self.fallback.as_mut() {
            Some(any_record) => any_record(),
            None => Ok(None),
        }
    }

    /// Stored bins plus enabled key pseudo-fields.
    fn fields_of(&self, record: &KeyRecord) -> Bins {
        let mut fields = record.record.bins.clone();
        if let Some(key) = &record.key {
            if self.config.special_fields.pk {
                fields.insert(self.config.primary_key_column.clone(), key.user_key().to_value());
            }
            if self.config.special_fields.pk_digest {
                fields.insert(self.config.digest_column.clone(), Value::Bytes(key.digest().to_vec()));
            }
        }
        fields
    }

    fn compute_metadata(&mut self) -> KvsqlResult<ResultMetadata> {
        if !self.columns.iter().any(needs_sample) {
            return Ok(ResultMetadata::new(self.columns.clone()));
        }

        let samples: Vec<Bins> = self.sample()?.map(|r| self.fields_of(&r)).into_iter().collect();
        let reserved = [
            self.config.primary_key_column.as_str(),
            self.config.digest_column.as_str(),
        ];
        let columns = resolve_columns(&self.columns, |_| samples.as_slice(), &reserved);
        trace!(target: "kvsql", table = %self.table, sampled = samples.len(), "cursor metadata sampled");

        if columns.is_empty() {
            return Ok(ResultMetadata::empty(&self.schema, &self.table).discovered());
        }
        Ok(ResultMetadata::new(columns).discovered())
    }

    /// Stored name of `label`: by label, then by name (hidden columns
    /// included), then passed through when the projection has a wildcard.
    fn resolve_name(&self, label: &str) -> KvsqlResult<(String, ColumnRole)> {
        let column = self
            .columns
            .iter()
            .find(|c| c.display_label() == label)
            .or_else(|| self.columns.iter().find(|c| c.name == label));
        match column {
            Some(c) if !c.is_wildcard() => Ok((c.name.clone(), c.role)),
            _ if self.columns.iter().any(Column::is_wildcard) => {
                Ok((label.to_string(), ColumnRole::Data))
            }
            _ => Err(KvsqlError::ColumnNotFound(label.to_string())),
        }
    }
}

impl RowCursor for RecordCursor {
    fn next(&mut self) -> KvsqlResult<bool> {
        self.state.ensure_open()?;
        if self.state.is_done() {
            return Ok(false);
        }
        match self.fetch()? {
            Some(record) => {
                trace!(target: "kvsql", key = ?record.key, "row fetched");
                self.current = Some(record);
                self.state.advance();
                Ok(true)
            }
            None => {
                self.current = None;
                self.state.finish();
                Ok(false)
            }
        }
    }

    fn close(&mut self) {
        if self.state.close() {
            self.stream.close();
            self.current = None;
            self.replay = None;
        }
    }

    fn metadata(&mut self) -> KvsqlResult<ResultMetadata> {
        self.state.ensure_open()?;
        if let Some(metadata) = &self.metadata {
            return Ok(metadata.clone());
        }
        let metadata = self.compute_metadata()?;
        self.metadata = Some(metadata.clone());
        Ok(metadata)
    }

    fn read_value(&mut self, label: &str) -> KvsqlResult<Value> {
        let (name, role) = self.resolve_name(label)?;
        let Some(record) = &self.current else {
            return Err(KvsqlError::UnsupportedOperation(
                "read outside of a row".to_string(),
            ));
        };
        let pseudo = |enabled: bool, column: &str| {
            name == column && (enabled || role == ColumnRole::PrimaryKey)
        };

        if let Some(key) = &record.key {
            if pseudo(self.config.special_fields.pk, &self.config.primary_key_column) {
                return Ok(key.user_key().to_value());
            }
            if pseudo(self.config.special_fields.pk_digest, &self.config.digest_column) {
                return Ok(Value::Bytes(key.digest().to_vec()));
            }
        }
        Ok(record.record.bins.get(&name).cloned().unwrap_or(Value::Null))
    }

    fn state(&self) -> &CursorState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut CursorState {
        &mut self.state
    }

    fn is_last(&mut self) -> KvsqlResult<bool> {
        self.state.ensure_open()?;
        if self.current.is_none() {
            return Ok(false);
        }
        Ok(self.peek()?.is_none())
    }
}

impl Drop for RecordCursor {
    fn drop(&mut self) {
        self.close();
    }
}
