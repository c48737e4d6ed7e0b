//! In-memory store backend using BTreeMap
//!
//! Same contract as a networked cluster, one map per namespace/set. Every
//! trait call counts as one round trip, which tests use to verify how many
//! storage operations a statement issued.

use crate::error::KvsqlResult;
use crate::storage::aggregate::aggregate;
use crate::storage::{
    Aggregation, Key, KeyRecord, Record, RecordStream, Statement, StorageClient, UserKey,
    VecRecordStream,
};
use crate::value::Bins;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

type SetId = (String, String);

/// In-memory store backend
pub struct MemoryStorage {
    sets: RwLock<HashMap<SetId, BTreeMap<UserKey, Bins>>>,
    round_trips: AtomicUsize,
    closed_streams: Arc<AtomicUsize>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self {
            sets: RwLock::new(HashMap::new()),
            round_trips: AtomicUsize::new(0),
            closed_streams: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Storage calls served so far
    pub fn round_trips(&self) -> usize {
        self.round_trips.load(Ordering::SeqCst)
    }

    /// Streams handed out and then closed
    pub fn closed_streams(&self) -> usize {
        self.closed_streams.load(Ordering::SeqCst)
    }

    /// Number of records in a set
    pub fn count(&self, namespace: &str, set: &str) -> usize {
        self.sets
            .read()
            .get(&(namespace.to_string(), set.to_string()))
            .map(|m| m.len())
            .unwrap_or(0)
    }

    fn touch(&self) {
        self.round_trips.fetch_add(1, Ordering::SeqCst);
    }

    fn collect(&self, namespace: &str, set: &str, statement: Option<&Statement>) -> Vec<KeyRecord> {
        let sets = self.sets.read();
        let Some(records) = sets.get(&(namespace.to_string(), set.to_string())) else {
            return Vec::new();
        };
        let filter = statement.and_then(|s| s.filter.as_ref());
        records
            .iter()
            .filter(|(_, bins)| filter.is_none_or(|f| f.matches(bins)))
            .map(|(user_key, bins)| {
                KeyRecord::new(
                    Key::new(namespace, set, user_key.clone()),
                    Record::new(bins.clone()),
                )
            })
            .collect()
    }

    fn stream(&self, records: Vec<KeyRecord>) -> Box<dyn RecordStream> {
        Box::new(VecRecordStream::new(records).with_close_counter(Arc::clone(&self.closed_streams)))
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageClient for MemoryStorage {
    fn get(&self, key: &Key) -> KvsqlResult<Option<Record>> {
        self.touch();
        let sets = self.sets.read();
        Ok(sets
            .get(&(key.namespace().to_string(), key.set().to_string()))
            .and_then(|m| m.get(key.user_key()))
            .map(|bins| Record::new(bins.clone())))
    }

    fn get_batch(&self, keys: &[Key]) -> KvsqlResult<Vec<Option<Record>>> {
        self.touch();
        let sets = self.sets.read();
        Ok(keys
            .iter()
            .map(|key| {
                sets.get(&(key.namespace().to_string(), key.set().to_string()))
                    .and_then(|m| m.get(key.user_key()))
                    .map(|bins| Record::new(bins.clone()))
            })
            .collect())
    }

    fn put(&self, key: &Key, bins: &Bins) -> KvsqlResult<()> {
        self.touch();
        let mut sets = self.sets.write();
        let stored = sets
            .entry((key.namespace().to_string(), key.set().to_string()))
            .or_default()
            .entry(key.user_key().clone())
            .or_default();
        for (name, value) in bins {
            if value.is_null() {
                stored.remove(name);
            } else {
                stored.insert(name.clone(), value.clone().normalized());
            }
        }
        Ok(())
    }

    fn scan(&self, namespace: &str, set: &str) -> KvsqlResult<Box<dyn RecordStream>> {
        self.touch();
        Ok(self.stream(self.collect(namespace, set, None)))
    }

    fn query(&self, statement: &Statement) -> KvsqlResult<Box<dyn RecordStream>> {
        self.touch();
        Ok(self.stream(self.collect(&statement.namespace, &statement.set, Some(statement))))
    }

    fn query_aggregate(
        &self,
        statement: &Statement,
        aggregation: &Aggregation,
    ) -> KvsqlResult<Box<dyn RecordStream>> {
        self.touch();
        let matched = self.collect(&statement.namespace, &statement.set, Some(statement));
        let groups = aggregate(matched.into_iter().map(|r| r.record.bins), aggregation);
        Ok(self.stream(groups))
    }

    fn any_record(&self, namespace: &str, set: &str) -> KvsqlResult<Option<KeyRecord>> {
        self.touch();
        let sets = self.sets.read();
        Ok(sets
            .get(&(namespace.to_string(), set.to_string()))
            .and_then(|m| m.iter().next())
            .map(|(user_key, bins)| {
                KeyRecord::new(
                    Key::new(namespace, set, user_key.clone()),
                    Record::new(bins.clone()),
                )
            }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Filter;
    use crate::value::Value;

    fn bins(entries: &[(&str, Value)]) -> Bins {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_put_and_get() {
        let store = MemoryStorage::new();
        let key = Key::new("test", "people", UserKey::Int(1));
        store
            .put(&key, &bins(&[("name", Value::Text("John".into())), ("kids", Value::Int32(2))]))
            .unwrap();

        let record = store.get(&key).unwrap().unwrap();
        assert_eq!(record.bins.get("kids"), Some(&Value::Int64(2)));
        assert_eq!(store.round_trips(), 2);
    }

    #[test]
    fn test_put_null_removes_bin() {
        let store = MemoryStorage::new();
        let key = Key::new("test", "people", UserKey::Int(1));
        store.put(&key, &bins(&[("a", Value::Int64(1))])).unwrap();
        store.put(&key, &bins(&[("a", Value::Null), ("b", Value::Int64(2))])).unwrap();

        let record = store.get(&key).unwrap().unwrap();
        assert!(!record.bins.contains_key("a"));
        assert_eq!(record.bins.len(), 1);
    }

    #[test]
    fn test_get_batch_is_one_round_trip() {
        let store = MemoryStorage::new();
        let keys: Vec<Key> = (1..=3)
            .map(|i| Key::new("test", "people", UserKey::Int(i)))
            .collect();
        store.put(&keys[1], &bins(&[("a", Value::Int64(1))])).unwrap();

        let before = store.round_trips();
        let found = store.get_batch(&keys).unwrap();
        assert_eq!(store.round_trips() - before, 1);
        assert_eq!(found.iter().filter(|r| r.is_some()).count(), 1);
        assert!(found[1].is_some());
    }

    #[test]
    fn test_query_with_filter() {
        let store = MemoryStorage::new();
        for i in 0..5 {
            let key = Key::new("test", "people", UserKey::Int(i));
            store.put(&key, &bins(&[("age", Value::Int64(20 + i))])).unwrap();
        }

        let statement = Statement::new("test", "people").with_filter(Filter::range("age", 21, 22));
        let mut stream = store.query(&statement).unwrap();
        let mut seen = Vec::new();
        while let Some(record) = stream.next_record().unwrap() {
            seen.push(record.key.unwrap().user_key().clone());
        }
        assert_eq!(seen, vec![UserKey::Int(1), UserKey::Int(2)]);
    }

    #[test]
    fn test_any_record_on_missing_set() {
        let store = MemoryStorage::new();
        assert!(store.any_record("test", "nothing").unwrap().is_none());
    }
}
