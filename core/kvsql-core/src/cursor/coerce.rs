//! Value → scalar coercion for cursor getters.
//!
//! Numeric kinds convert freely between integer and floating forms (narrowing
//! truncates). Null reads as the zero value of primitive kinds; use
//! `Option<T>` to observe it. Text parses to date/time/timestamp through an
//! epoch-milliseconds intermediate.

use crate::error::{KvsqlError, KvsqlResult};
use crate::sql::column::SqlType;
use crate::value::{Value, ValueKind};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use std::io;

/// Conversion from a stored [`Value`] to a Rust scalar.
pub trait FromValue: Sized {
    fn from_value(value: &Value) -> KvsqlResult<Self>;
}

fn mismatch<T>(expected: &str, value: &Value) -> KvsqlResult<T> {
    Err(KvsqlError::type_mismatch(expected, value.kind().to_string()))
}

impl FromValue for Value {
    fn from_value(value: &Value) -> KvsqlResult<Self> {
        Ok(value.clone())
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value) -> KvsqlResult<Self> {
        if value.is_null() {
            Ok(None)
        } else {
            Ok(Some(T::from_value(value)?))
        }
    }
}

impl FromValue for i64 {
    fn from_value(value: &Value) -> KvsqlResult<Self> {
        match value {
            Value::Null => Ok(0),
            Value::Bool(b) => Ok(i64::from(*b)),
            Value::Text(s) => s
                .trim()
                .parse()
                .or_else(|_| s.trim().parse::<f64>().map(|f| f as i64))
                .map_err(|_| KvsqlError::type_mismatch("Int64", format!("Text({s:?})"))),
            other => match other.to_i64_lossy() {
                Some(v) => Ok(v),
                None => mismatch("Int64", other),
            },
        }
    }
}

macro_rules! impl_narrow_int {
    ($($t:ty),*) => {
        $(
            impl FromValue for $t {
                fn from_value(value: &Value) -> KvsqlResult<Self> {
                    Ok(i64::from_value(value)? as $t)
                }
            }
        )*
    };
}

impl_narrow_int!(i8, i16, i32);

impl FromValue for f64 {
    fn from_value(value: &Value) -> KvsqlResult<Self> {
        match value {
            Value::Null => Ok(0.0),
            Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
            Value::Text(s) => s
                .trim()
                .parse()
                .map_err(|_| KvsqlError::type_mismatch("Float64", format!("Text({s:?})"))),
            other => match other.as_f64() {
                Some(v) => Ok(v),
                None => mismatch("Float64", other),
            },
        }
    }
}

impl FromValue for f32 {
    fn from_value(value: &Value) -> KvsqlResult<Self> {
        Ok(f64::from_value(value)? as f32)
    }
}

impl FromValue for bool {
    fn from_value(value: &Value) -> KvsqlResult<Self> {
        match value {
            Value::Null => Ok(false),
            Value::Bool(b) => Ok(*b),
            Value::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" => Ok(true),
                "false" | "0" => Ok(false),
                _ => mismatch("Bool", value),
            },
            other => match other.as_f64() {
                Some(v) => Ok(v != 0.0),
                None => mismatch("Bool", other),
            },
        }
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> KvsqlResult<Self> {
        match value {
            Value::Null => mismatch("Text", value),
            Value::Text(s) => Ok(s.clone()),
            other => Ok(other.to_string()),
        }
    }
}

impl FromValue for Vec<u8> {
    fn from_value(value: &Value) -> KvsqlResult<Self> {
        match value {
            Value::Bytes(b) => Ok(b.clone()),
            Value::Text(s) => Ok(s.as_bytes().to_vec()),
            other => mismatch("Bytes", other),
        }
    }
}

/// Large-object handle over a stored byte sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    data: Vec<u8>,
}

impl Blob {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// `len` bytes starting at 0-based `offset`, clamped to the blob end.
    pub fn bytes(&self, offset: usize, len: usize) -> &[u8] {
        let start = offset.min(self.data.len());
        let end = start.saturating_add(len).min(self.data.len());
        &self.data[start..end]
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_stream(self) -> io::Cursor<Vec<u8>> {
        io::Cursor::new(self.data)
    }
}

impl FromValue for Blob {
    fn from_value(value: &Value) -> KvsqlResult<Self> {
        Vec::<u8>::from_value(value).map(Blob::new)
    }
}

impl FromValue for io::Cursor<Vec<u8>> {
    fn from_value(value: &Value) -> KvsqlResult<Self> {
        Blob::from_value(value).map(Blob::into_stream)
    }
}

/// Epoch milliseconds of a temporal value.
///
/// Integers are taken as milliseconds already; text is parsed as RFC 3339,
/// `YYYY-MM-DD HH:MM:SS[.fff]`, `YYYY-MM-DD`, `HH:MM:SS[.fff]` or a plain
/// millisecond count.
pub fn epoch_millis(value: &Value) -> KvsqlResult<i64> {
    match value {
        Value::Text(s) => parse_epoch_millis(s.trim())
            .ok_or_else(|| KvsqlError::type_mismatch("Timestamp", format!("Text({s:?})"))),
        other => match other.as_i64() {
            Some(ms) => Ok(ms),
            None => mismatch("Timestamp", other),
        },
    }
}

fn parse_epoch_millis(s: &str) -> Option<i64> {
    if let Ok(ms) = s.parse::<i64>() {
        return Some(ms);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.timestamp_millis());
    }
    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Some(dt.and_utc().timestamp_millis());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(date.and_time(NaiveTime::default()).and_utc().timestamp_millis());
    }
    if let Ok(time) = NaiveTime::parse_from_str(s, "%H:%M:%S%.f") {
        let epoch = NaiveDate::default();
        return Some(epoch.and_time(time).and_utc().timestamp_millis());
    }
    None
}

fn datetime_of(value: &Value) -> KvsqlResult<NaiveDateTime> {
    let ms = epoch_millis(value)?;
    DateTime::from_timestamp_millis(ms)
        .map(|dt| dt.naive_utc())
        .ok_or_else(|| KvsqlError::type_mismatch("Timestamp", format!("{ms} ms out of range")))
}

impl FromValue for NaiveDateTime {
    fn from_value(value: &Value) -> KvsqlResult<Self> {
        datetime_of(value)
    }
}

impl FromValue for NaiveDate {
    fn from_value(value: &Value) -> KvsqlResult<Self> {
        Ok(datetime_of(value)?.date())
    }
}

impl FromValue for NaiveTime {
    fn from_value(value: &Value) -> KvsqlResult<Self> {
        Ok(datetime_of(value)?.time())
    }
}

/// SQL array view of a list value.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlArray {
    /// Type shared by every non-null element, `Object` when they differ
    pub base_type: SqlType,
    pub elements: Vec<Value>,
}

impl SqlArray {
    pub fn new(elements: Vec<Value>) -> Self {
        let mut kinds = elements.iter().map(Value::kind).filter(|k| *k != ValueKind::Null);
        let base_type = match kinds.next() {
            Some(first) if kinds.all(|k| k == first) => SqlType::of_kind(first),
            _ => SqlType::Object,
        };
        Self { base_type, elements }
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

impl FromValue for SqlArray {
    fn from_value(value: &Value) -> KvsqlResult<Self> {
        match value {
            Value::List(items) => Ok(SqlArray::new(items.clone())),
            Value::Bytes(bytes) => Ok(SqlArray::new(
                bytes.iter().map(|b| Value::Int8(*b as i8)).collect(),
            )),
            other => mismatch("List", other),
        }
    }
}
