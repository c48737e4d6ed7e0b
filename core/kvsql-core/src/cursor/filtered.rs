//! Filtered cursor — residual row predicate over another cursor (HAVING).

use crate::cursor::{CursorState, RowCursor};
use crate::error::KvsqlResult;
use crate::sql::metadata::ResultMetadata;
use crate::value::Value;
use std::sync::Arc;

/// Row-level predicate evaluated against the inner cursor's current row.
pub type RowPredicate = Arc<dyn Fn(&mut dyn RowCursor) -> KvsqlResult<bool> + Send + Sync>;

/// Skips inner rows failing the predicate. Holds no rows of its own.
pub struct FilteredCursor {
    inner: Box<dyn RowCursor>,
    predicate: RowPredicate,
    state: CursorState,
}

impl FilteredCursor {
    pub fn new(inner: Box<dyn RowCursor>, predicate: RowPredicate) -> Self {
        Self {
            inner,
            predicate,
            state: CursorState::new(),
        }
    }
}

impl RowCursor for FilteredCursor {
    fn next(&mut self) -> KvsqlResult<bool> {
        self.state.ensure_open()?;
        if self.state.is_done() {
            return Ok(false);
        }
        while self.inner.next()? {
            if (self.predicate)(&mut *self.inner)? {
                self.state.advance();
                return Ok(true);
            }
        }
        self.state.finish();
        Ok(false)
    }

    fn close(&mut self) {
        if self.state.close() {
            self.inner.close();
        }
    }

    fn metadata(&mut self) -> KvsqlResult<ResultMetadata> {
        self.state.ensure_open()?;
        self.inner.metadata()
    }

    fn read_value(&mut self, label: &str) -> KvsqlResult<Value> {
        self.inner.get_object(label)
    }

    fn state(&self) -> &CursorState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut CursorState {
        &mut self.state
    }
}
