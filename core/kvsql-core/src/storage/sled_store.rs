//! sled-backed durable store.
//!
//! Each namespace/set maps to a separate sled `Tree` named `namespace.set`.
//! Keys are [`UserKey::to_storage_bytes`], values are bincode-encoded bins.

use crate::error::KvsqlResult;
use crate::storage::aggregate::aggregate;
use crate::storage::{
    Aggregation, Key, KeyRecord, Record, RecordStream, Statement, StorageClient, UserKey,
    VecRecordStream,
};
use crate::value::Bins;
use std::path::Path;

/// Durable store backed by sled
pub struct SledStorage {
    db: sled::Db,
}

impl SledStorage {
    /// Open the store at the given directory path.
    pub fn open(path: &Path) -> KvsqlResult<Self> {
        let db = sled::open(path)?;
        Ok(Self { db })
    }

    /// Open a temporary store (for testing). Data is deleted on drop.
    pub fn open_temporary() -> KvsqlResult<Self> {
        let config = sled::Config::new().temporary(true);
        let db = config.open()?;
        Ok(Self { db })
    }

    /// Persist buffered writes.
    pub fn flush(&self) -> KvsqlResult<()> {
        self.db.flush()?;
        Ok(())
    }

    fn tree(&self, namespace: &str, set: &str) -> KvsqlResult<sled::Tree> {
        Ok(self.db.open_tree(format!("{namespace}.{set}"))?)
    }

    fn read_bins(bytes: &[u8]) -> KvsqlResult<Bins> {
        Ok(bincode::deserialize(bytes)?)
    }

    fn load(&self, namespace: &str, set: &str, statement: Option<&Statement>) -> KvsqlResult<Vec<KeyRecord>> {
        let tree = self.tree(namespace, set)?;
        let filter = statement.and_then(|s| s.filter.as_ref());
        let mut result = Vec::new();
        for item in tree.iter() {
            let (k, v) = item?;
            let bins = Self::read_bins(&v)?;
            if filter.is_some_and(|f| !f.matches(&bins)) {
                continue;
            }
            let user_key = UserKey::from_storage_bytes(&k)?;
            result.push(KeyRecord::new(
                Key::new(namespace, set, user_key),
                Record::new(bins),
            ));
        }
        Ok(result)
    }
}

impl StorageClient for SledStorage {
    fn get(&self, key: &Key) -> KvsqlResult<Option<Record>> {
        let tree = self.tree(key.namespace(), key.set())?;
        tree.get(key.user_key().to_storage_bytes())?
            .map(|ivec| Self::read_bins(&ivec).map(Record::new))
            .transpose()
    }

    fn get_batch(&self, keys: &[Key]) -> KvsqlResult<Vec<Option<Record>>> {
        keys.iter().map(|key| self.get(key)).collect()
    }

    fn put(&self, key: &Key, bins: &Bins) -> KvsqlResult<()> {
        let tree = self.tree(key.namespace(), key.set())?;
        let storage_key = key.user_key().to_storage_bytes();
        let mut stored = match tree.get(&storage_key)? {
            Some(ivec) => Self::read_bins(&ivec)?,
            None => Bins::new(),
        };
        for (name, value) in bins {
            if value.is_null() {
                stored.remove(name);
            } else {
                stored.insert(name.clone(), value.clone().normalized());
            }
        }
        let encoded = bincode::serialize(&stored)?;
        tree.insert(storage_key, encoded)?;
        Ok(())
    }

    fn scan(&self, namespace: &str, set: &str) -> KvsqlResult<Box<dyn RecordStream>> {
        Ok(Box::new(VecRecordStream::new(self.load(namespace, set, None)?)))
    }

    fn query(&self, statement: &Statement) -> KvsqlResult<Box<dyn RecordStream>> {
        let records = self.load(&statement.namespace, &statement.set, Some(statement))?;
        Ok(Box::new(VecRecordStream::new(records)))
    }

    fn query_aggregate(
        &self,
        statement: &Statement,
        aggregation: &Aggregation,
    ) -> KvsqlResult<Box<dyn RecordStream>> {
        let matched = self.load(&statement.namespace, &statement.set, Some(statement))?;
        let groups = aggregate(matched.into_iter().map(|r| r.record.bins), aggregation);
        Ok(Box::new(VecRecordStream::new(groups)))
    }

    fn any_record(&self, namespace: &str, set: &str) -> KvsqlResult<Option<KeyRecord>> {
        let tree = self.tree(namespace, set)?;
        match tree.first()? {
            Some((k, v)) => Ok(Some(KeyRecord::new(
                Key::new(namespace, set, UserKey::from_storage_bytes(&k)?),
                Record::new(Self::read_bins(&v)?),
            ))),
            None => Ok(None),
        }
    }
}
