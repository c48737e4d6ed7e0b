//! Row cursors — forward-only, read-only iteration over storage records.
//!
//! State machine:
//!
//! ```text
//! BEFORE_FIRST --next--> POSITIONED(1) --next--> ... --next=false--> AFTER_LAST
//!       \__________________________ close __________________________/
//!                                     |
//!                                  CLOSED
//! ```
//!
//! `CLOSED` rejects `next` and every getter with [`KvsqlError::ClosedResource`].
//! Scroll methods always fail with [`KvsqlError::UnsupportedOperation`].

pub mod coerce;
pub mod filtered;
pub mod record;
pub mod synthetic;

pub use coerce::{Blob, FromValue, SqlArray, epoch_millis};
pub use filtered::{FilteredCursor, RowPredicate};
pub use record::{AnyRecordFallback, RecordCursor};
pub use synthetic::StaticCursor;

use crate::error::{KvsqlError, KvsqlResult};
use crate::sql::metadata::ResultMetadata;
use crate::value::Value;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use std::io;
use tracing::warn;

/// Requested fetch direction. Only `Forward` is honoured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchDirection {
    #[default]
    Forward,
    Reverse,
    Unknown,
}

/// Position and flags shared by every cursor implementation.
#[derive(Debug, Default)]
pub struct CursorState {
    /// 0 = before first row
    position: usize,
    done: bool,
    closed: bool,
    was_null: bool,
    warnings: Vec<String>,
}

impl CursorState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn was_null(&self) -> bool {
        self.was_null
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Move to the next row; warnings of the previous row are dropped.
    pub fn advance(&mut self) {
        self.position += 1;
        self.warnings.clear();
    }

    pub fn finish(&mut self) {
        self.done = true;
    }

    /// Returns `true` on the first call only.
    pub fn close(&mut self) -> bool {
        !std::mem::replace(&mut self.closed, true)
    }

    pub fn ensure_open(&self) -> KvsqlResult<()> {
        if self.closed {
            return Err(KvsqlError::ClosedResource("cursor".to_string()));
        }
        Ok(())
    }

    /// Open and positioned on a row.
    pub fn ensure_row(&self) -> KvsqlResult<()> {
        self.ensure_open()?;
        if self.position == 0 || self.done {
            return Err(KvsqlError::UnsupportedOperation(
                "read outside of a row".to_string(),
            ));
        }
        Ok(())
    }

    pub fn record_read(&mut self, value: &Value) {
        self.was_null = value.is_null();
    }

    pub fn push_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    pub fn clear_warnings(&mut self) {
        self.warnings.clear();
    }
}

fn unsupported<T>(operation: &str) -> KvsqlResult<T> {
    Err(KvsqlError::UnsupportedOperation(format!(
        "{operation} on a forward-only cursor"
    )))
}

/// Forward-only row cursor consumed by callers and by row-source executors.
///
/// Implementors provide iteration, metadata and raw column reads; position
/// queries, null tracking and typed getters come from the default methods.
/// A cursor is driven by one thread at a time.
pub trait RowCursor: Send {
    /// Advance to the next row. `false` once the source is exhausted.
    fn next(&mut self) -> KvsqlResult<bool>;

    /// Release the underlying stream. Idempotent.
    fn close(&mut self);

    fn metadata(&mut self) -> KvsqlResult<ResultMetadata>;

    /// Raw value of `label` in the current row (no null tracking).
    fn read_value(&mut self, label: &str) -> KvsqlResult<Value>;

    fn state(&self) -> &CursorState;

    fn state_mut(&mut self) -> &mut CursorState;

    /// Requires a look-ahead the cursor may not support.
    fn is_last(&mut self) -> KvsqlResult<bool> {
        unsupported("isLast")
    }

    fn is_closed(&self) -> bool {
        self.state().is_closed()
    }

    /// Whether the most recent getter read a null.
    fn was_null(&self) -> bool {
        self.state().was_null()
    }

    /// 1-based current row, 0 when not on a row
    fn row(&self) -> usize {
        let state = self.state();
        if state.is_done() { 0 } else { state.position() }
    }

    fn is_before_first(&self) -> bool {
        let state = self.state();
        state.position() == 0 && !state.is_done()
    }

    fn is_after_last(&self) -> bool {
        self.state().is_done()
    }

    fn is_first(&self) -> bool {
        self.row() == 1
    }

    /// Move to the first row; only possible before the cursor was advanced.
    fn first(&mut self) -> KvsqlResult<bool> {
        self.state().ensure_open()?;
        if !self.is_before_first() {
            return unsupported("cannot rewind: first");
        }
        self.next()
    }

    fn absolute(&mut self, _row: i64) -> KvsqlResult<bool> {
        unsupported("absolute")
    }

    fn relative(&mut self, _rows: i64) -> KvsqlResult<bool> {
        unsupported("relative")
    }

    fn previous(&mut self) -> KvsqlResult<bool> {
        unsupported("previous")
    }

    fn before_first(&mut self) -> KvsqlResult<()> {
        unsupported("beforeFirst")
    }

    fn after_last(&mut self) -> KvsqlResult<()> {
        unsupported("afterLast")
    }

    fn last(&mut self) -> KvsqlResult<bool> {
        unsupported("last")
    }

    /// Non-forward directions are ignored with a warning.
    fn set_fetch_direction(&mut self, direction: FetchDirection) -> KvsqlResult<()> {
        self.state().ensure_open()?;
        if direction != FetchDirection::Forward {
            warn!(target: "kvsql", ?direction, "fetch direction ignored");
            self.state_mut()
                .push_warning(format!("fetch direction {direction:?} is not supported; using Forward"));
        }
        Ok(())
    }

    fn fetch_direction(&self) -> FetchDirection {
        FetchDirection::Forward
    }

    /// Rows are fetched one at a time; 0 keeps the default.
    fn set_fetch_size(&mut self, rows: usize) -> KvsqlResult<()> {
        match rows {
            0 | 1 => Ok(()),
            _ => unsupported("fetch size other than 1"),
        }
    }

    fn fetch_size(&self) -> usize {
        1
    }

    fn warnings(&self) -> &[String] {
        self.state().warnings()
    }

    fn clear_warnings(&mut self) {
        self.state_mut().clear_warnings()
    }

    /// 0-based visible index of `label`
    fn find_column(&mut self, label: &str) -> KvsqlResult<usize> {
        self.metadata()?.find_column(label)
    }

    /// Raw value of `label`; sets the null flag.
    fn get_object(&mut self, label: &str) -> KvsqlResult<Value> {
        self.state().ensure_row()?;
        let value = self.read_value(label)?;
        self.state_mut().record_read(&value);
        Ok(value)
    }

    fn get_object_as<T: FromValue>(&mut self, label: &str) -> KvsqlResult<T>
    where
        Self: Sized,
    {
        T::from_value(&self.get_object(label)?)
    }

    fn get_string(&mut self, label: &str) -> KvsqlResult<Option<String>> {
        FromValue::from_value(&self.get_object(label)?)
    }

    fn get_bool(&mut self, label: &str) -> KvsqlResult<bool> {
        FromValue::from_value(&self.get_object(label)?)
    }

    fn get_i8(&mut self, label: &str) -> KvsqlResult<i8> {
        FromValue::from_value(&self.get_object(label)?)
    }

    fn get_i16(&mut self, label: &str) -> KvsqlResult<i16> {
        FromValue::from_value(&self.get_object(label)?)
    }

    fn get_i32(&mut self, label: &str) -> KvsqlResult<i32> {
        FromValue::from_value(&self.get_object(label)?)
    }

    fn get_i64(&mut self, label: &str) -> KvsqlResult<i64> {
        FromValue::from_value(&self.get_object(label)?)
    }

    fn get_f32(&mut self, label: &str) -> KvsqlResult<f32> {
        FromValue::from_value(&self.get_object(label)?)
    }

    fn get_f64(&mut self, label: &str) -> KvsqlResult<f64> {
        FromValue::from_value(&self.get_object(label)?)
    }

    fn get_bytes(&mut self, label: &str) -> KvsqlResult<Option<Vec<u8>>> {
        FromValue::from_value(&self.get_object(label)?)
    }

    fn get_blob(&mut self, label: &str) -> KvsqlResult<Option<Blob>> {
        FromValue::from_value(&self.get_object(label)?)
    }

    fn get_binary_stream(&mut self, label: &str) -> KvsqlResult<Option<io::Cursor<Vec<u8>>>> {
        FromValue::from_value(&self.get_object(label)?)
    }

    fn get_date(&mut self, label: &str) -> KvsqlResult<Option<NaiveDate>> {
        FromValue::from_value(&self.get_object(label)?)
    }

    fn get_time(&mut self, label: &str) -> KvsqlResult<Option<NaiveTime>> {
        FromValue::from_value(&self.get_object(label)?)
    }

    fn get_timestamp(&mut self, label: &str) -> KvsqlResult<Option<NaiveDateTime>> {
        FromValue::from_value(&self.get_object(label)?)
    }

    fn get_array(&mut self, label: &str) -> KvsqlResult<Option<SqlArray>> {
        FromValue::from_value(&self.get_object(label)?)
    }
}

impl<C: RowCursor + ?Sized> RowCursor for Box<C> {
    fn next(&mut self) -> KvsqlResult<bool> {
        (**self).next()
    }

    fn close(&mut self) {
        (**self).close()
    }

    fn metadata(&mut self) -> KvsqlResult<ResultMetadata> {
        (**self).metadata()
    }

    fn read_value(&mut self, label: &str) -> KvsqlResult<Value> {
        (**self).read_value(label)
    }

    fn state(&self) -> &CursorState {
        (**self).state()
    }

    fn state_mut(&mut self) -> &mut CursorState {
        (**self).state_mut()
    }

    fn is_last(&mut self) -> KvsqlResult<bool> {
        (**self).is_last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_close_reports_first_call_only() {
        let mut state = CursorState::new();
        assert!(state.close());
        assert!(!state.close());
        assert!(matches!(
            state.ensure_open(),
            Err(KvsqlError::ClosedResource(_))
        ));
    }

    #[test]
    fn test_state_advance_clears_warnings() {
        let mut state = CursorState::new();
        state.push_warning("w");
        state.advance();
        assert!(state.warnings().is_empty());
        assert_eq!(state.position(), 1);
        assert!(state.ensure_row().is_ok());
        state.finish();
        assert!(state.ensure_row().is_err());
    }
}
