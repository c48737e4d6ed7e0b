//! Cursors over rows produced without storage access.

use crate::cursor::{CursorState, RowCursor};
use crate::error::KvsqlResult;
use crate::sql::metadata::ResultMetadata;
use crate::value::{Bins, Value};
use std::collections::VecDeque;

/// Cursor over a fixed list of rows.
pub struct StaticCursor {
    rows: VecDeque<Bins>,
    current: Option<Bins>,
    metadata: ResultMetadata,
    state: CursorState,
}

impl StaticCursor {
    pub fn new(metadata: ResultMetadata, rows: Vec<Bins>) -> Self {
        Self {
            rows: rows.into(),
            current: None,
            metadata,
            state: CursorState::new(),
        }
    }

    /// Exactly one row with no columns, for queries reading no set
    pub fn constant() -> Self {
        Self::new(ResultMetadata::default(), vec![Bins::new()])
    }

    /// No rows at all
    pub fn empty(metadata: ResultMetadata) -> Self {
        Self::new(metadata, Vec::new())
    }
}

impl RowCursor for StaticCursor {
    fn next(&mut self) -> KvsqlResult<bool> {
        self.state.ensure_open()?;
        if self.state.is_done() {
            return Ok(false);
        }
        match self.rows.pop_front() {
            Some(row) => {
                self.current = Some(row);
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
            self.rows.clear();
            self.current = None;
        }
    }

    fn metadata(&mut self) -> KvsqlResult<ResultMetadata> {
        self.state.ensure_open()?;
        Ok(self.metadata.clone())
    }

    fn read_value(&mut self, label: &str) -> KvsqlResult<Value> {
        self.metadata.find_column(label)?;
        Ok(self
            .current
            .as_ref()
            .and_then(|row| row.get(label))
            .cloned()
            .unwrap_or(Value::Null))
    }

    fn state(&self) -> &CursorState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut CursorState {
        &mut self.state
    }

    fn is_last(&mut self) -> KvsqlResult<bool> {
        self.state.ensure_open()?;
        Ok(self.current.is_some() && self.rows.is_empty())
    }
}

impl Default for StaticCursor {
    fn default() -> Self {
        Self::empty(ResultMetadata::default())
    }
}
