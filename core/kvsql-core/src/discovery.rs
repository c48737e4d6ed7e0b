//! Type discovery — infer SQL types of undeclared columns by sampling records.
//!
//! Columns with a declared type pass through unchanged. A wildcard column
//! expands to every field observed across the sampled records, in first-seen
//! order. Any other undeclared column takes the type of its first non-null
//! sampled value and stays `Unknown` when none is seen.

use crate::config::{DEFAULT_SAMPLE_LIMIT, ExecutorConfig};
use crate::error::KvsqlResult;
use crate::sql::column::{Column, ColumnRole, SqlType};
use crate::storage::{KeyRecord, RecordStream, StorageClient};
use crate::value::Bins;
use ahash::{AHashMap, AHashSet};
use std::sync::Arc;
use tracing::debug;

/// Fetches the records of `(namespace, table)`, lazily.
pub type RecordFetcher<R> =
    Box<dyn Fn(&str, &str) -> KvsqlResult<Box<dyn Iterator<Item = KvsqlResult<R>>>> + Send + Sync>;

/// Named values of one fetched record.
pub type RecordToFields<R> = Box<dyn Fn(&R) -> Bins + Send + Sync>;

/// Resolves undeclared column types.
pub trait TypeDiscoverer: Send + Sync {
    fn discover_type(&self, columns: &[Column]) -> KvsqlResult<Vec<Column>>;
}

/// Discoverer over any record source.
pub struct GenericTypeDiscoverer<R> {
    fetcher: RecordFetcher<R>,
    to_fields: RecordToFields<R>,
    sample_limit: usize,
}

impl<R> GenericTypeDiscoverer<R> {
    pub fn new<F, M>(fetcher: F, to_fields: M) -> Self
    where
        F: Fn(&str, &str) -> KvsqlResult<Box<dyn Iterator<Item = KvsqlResult<R>>>> + Send + Sync + 'static,
        M: Fn(&R) -> Bins + Send + Sync + 'static,
    {
        Self {
            fetcher: Box::new(fetcher),
            to_fields: Box::new(to_fields),
            sample_limit: DEFAULT_SAMPLE_LIMIT,
        }
    }

    pub fn with_sample_limit(mut self, limit: usize) -> Self {
        self.sample_limit = limit;
        self
    }

    fn sample(&self, namespace: &str, table: &str) -> KvsqlResult<Vec<Bins>> {
        let records = (self.fetcher)(namespace, table)?;
        let mut samples = Vec::new();
        for record in records.take(self.sample_limit) {
            samples.push((self.to_fields)(&record?));
        }
        debug!(target: "kvsql", namespace, table, sampled = samples.len(), "type discovery sample");
        Ok(samples)
    }
}

impl GenericTypeDiscoverer<KeyRecord> {
    /// Sample with full scans of the store; only stored bins are observed.
    /// At most `config.sample_limit` records are read per table.
    pub fn for_storage(client: Arc<dyn StorageClient>, config: &ExecutorConfig) -> Self {
        Self::new(
            move |namespace, table| {
                let stream = client.scan(namespace, table)?;
                Ok(Box::new(StreamRecords { stream }) as Box<dyn Iterator<Item = KvsqlResult<KeyRecord>>>)
            },
            |record: &KeyRecord| record.record.bins.clone(),
        )
        .with_sample_limit(config.sample_limit)
    }
}

impl<R> TypeDiscoverer for GenericTypeDiscoverer<R> {
    fn discover_type(&self, columns: &[Column]) -> KvsqlResult<Vec<Column>> {
        let mut samples: AHashMap<(String, String), Vec<Bins>> = AHashMap::new();
        for column in columns.iter().filter(|c| needs_sample(c)) {
            let table = (column.schema.clone(), column.table.clone());
            if !samples.contains_key(&table) {
                let sampled = self.sample(&table.0, &table.1)?;
                samples.insert(table, sampled);
            }
        }
        if samples.is_empty() {
            return Ok(columns.to_vec());
        }

        Ok(resolve_columns(
            columns,
            |c| {
                samples
                    .get(&(c.schema.clone(), c.table.clone()))
                    .map(Vec::as_slice)
                    .unwrap_or_default()
            },
            &[],
        ))
    }
}

/// Closes the stream once dropped.
struct StreamRecords {
    stream: Box<dyn RecordStream>,
}

impl Iterator for StreamRecords {
    type Item = KvsqlResult<KeyRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        self.stream.next_record().transpose()
    }
}

impl Drop for StreamRecords {
    fn drop(&mut self) {
        self.stream.close();
    }
}

pub(crate) fn needs_sample(column: &Column) -> bool {
    column.is_wildcard() || !column.has_declared_type()
}

fn first_type(samples: &[Bins], name: &str) -> SqlType {
    samples
        .iter()
        .filter_map(|bins| bins.get(name))
        .find(|v| !v.is_null())
        .map(SqlType::of_value)
        .unwrap_or_default()
}

/// Apply sampled types to `columns`. `reserved` names never come out of a
/// wildcard expansion.
pub(crate) fn resolve_columns<'s, F>(columns: &[Column], samples_of: F, reserved: &[&str]) -> Vec<Column>
where
    F: Fn(&Column) -> &'s [Bins],
{
    let mut resolved = Vec::with_capacity(columns.len());
    for column in columns {
        if !needs_sample(column) {
            resolved.push(column.clone());
            continue;
        }
        let samples = samples_of(column);
        if !column.is_wildcard() {
            let mut typed = column.clone();
            typed.sql_type = first_type(samples, &column.name);
            resolved.push(typed);
            continue;
        }

        let mut seen: AHashSet<&str> = columns
            .iter()
            .filter(|c| !c.is_wildcard() && c.schema == column.schema && c.table == column.table)
            .map(|c| c.name.as_str())
            .chain(reserved.iter().copied())
            .collect();
        for name in samples.iter().flat_map(|bins| bins.keys()) {
            if seen.insert(name.as_str()) {
                resolved.push(
                    Column::new(ColumnRole::Data, &column.schema, &column.table, name.as_str())
                        .with_type(first_type(samples, name)),
                );
            }
        }
    }
    resolved
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::column::WILDCARD;
    use crate::storage::{Key, MemoryStorage, UserKey};
    use crate::value::Value;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn adam_and_eve() -> Arc<MemoryStorage> {
        let store = Arc::new(MemoryStorage::new());
        for (pk, name) in [(1, "Adam"), (2, "Eve")] {
            let mut bins = Bins::new();
            bins.insert("name".to_string(), Value::Text(name.to_string()));
            store
                .put(&Key::new("test", "people", UserKey::Int(pk)), &bins)
                .unwrap();
        }
        store
    }

    fn wildcard(table: &str) -> Column {
        Column::new(ColumnRole::Data, "test", table, WILDCARD)
    }

    #[test]
    fn test_wildcard_expands_to_observed_fields() {
        let store = adam_and_eve();
        let discoverer = GenericTypeDiscoverer::for_storage(store.clone(), &ExecutorConfig::default());

        let columns = discoverer.discover_type(&[wildcard("people")]).unwrap();
        assert_eq!(columns.len(), 1);
        assert_eq!(columns[0].name, "name");
        assert_eq!(columns[0].sql_type, SqlType::Varchar);
        assert_eq!(store.closed_streams(), 1);
    }

    #[test]
    fn test_empty_table_discovers_nothing() {
        let store = Arc::new(MemoryStorage::new());
        let discoverer = GenericTypeDiscoverer::for_storage(store, &ExecutorConfig::default());
        assert!(discoverer.discover_type(&[wildcard("people")]).unwrap().is_empty());
    }

    #[test]
    fn test_declared_columns_skip_sampling() {
        let fetches = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fetches);
        let discoverer = GenericTypeDiscoverer::new(
            move |_, _| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(Box::new(std::iter::empty()) as Box<dyn Iterator<Item = KvsqlResult<Bins>>>)
            },
            |bins: &Bins| bins.clone(),
        );
        let declared = ColumnRole::Data
            .create("test", "people", "name", "name")
            .with_type(SqlType::Varchar);

        let columns = discoverer.discover_type(&[declared.clone()]).unwrap();
        assert_eq!(columns, vec![declared]);
        assert_eq!(fetches.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_first_non_null_wins_within_limit() {
        let rows: Vec<Bins> = vec![
            [("age".to_string(), Value::Null)].into_iter().collect(),
            [("age".to_string(), Value::Int64(3))].into_iter().collect(),
            [("age".to_string(), Value::Text("x".into()))].into_iter().collect(),
        ];
        let source = rows.clone();
        let discoverer = GenericTypeDiscoverer::new(
            move |_, _| {
                let records = source.clone().into_iter().map(Ok);
                Ok(Box::new(records) as Box<dyn Iterator<Item = KvsqlResult<Bins>>>)
            },
            |bins: &Bins| bins.clone(),
        );
        let age = Column::new(ColumnRole::Data, "test", "people", "age");

        let columns = discoverer.discover_type(std::slice::from_ref(&age)).unwrap();
        assert_eq!(columns[0].sql_type, SqlType::BigInt);

        let limited = discoverer.with_sample_limit(1).discover_type(&[age]).unwrap();
        assert_eq!(limited[0].sql_type, SqlType::Unknown);
    }

    #[test]
    fn test_config_sample_limit_bounds_storage_scan() {
        let store = adam_and_eve();
        let mut bins = Bins::new();
        bins.insert("born".to_string(), Value::Int64(3));
        store
            .put(&Key::new("test", "people", UserKey::Int(3)), &bins)
            .unwrap();
        let born = Column::new(ColumnRole::Data, "test", "people", "born");

        let full = GenericTypeDiscoverer::for_storage(store.clone(), &ExecutorConfig::default());
        let columns = full.discover_type(std::slice::from_ref(&born)).unwrap();
        assert_eq!(columns[0].sql_type, SqlType::BigInt);

        let config = ExecutorConfig::default().with_sample_limit(1);
        let limited = GenericTypeDiscoverer::for_storage(store.clone(), &config);
        let columns = limited.discover_type(&[born]).unwrap();
        assert_eq!(columns[0].sql_type, SqlType::Unknown);
        assert_eq!(store.closed_streams(), 2);
    }

    #[test]
    fn test_wildcard_skips_explicit_columns() {
        let samples: Vec<Bins> = vec![
            [
                ("a".to_string(), Value::Int64(1)),
                ("b".to_string(), Value::Text("x".into())),
            ]
            .into_iter()
            .collect(),
            [("c".to_string(), Value::Bool(true))].into_iter().collect(),
        ];
        let columns = vec![
            Column::new(ColumnRole::Data, "test", "t", "b").with_type(SqlType::Varchar),
            wildcard("t"),
        ];
        let resolved = resolve_columns(&columns, |_| samples.as_slice(), &[]);
        let names: Vec<_> = resolved.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["b", "a", "c"]);
        assert_eq!(resolved[2].sql_type, SqlType::Boolean);
    }
}
