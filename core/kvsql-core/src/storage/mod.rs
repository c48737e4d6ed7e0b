//! Storage module — the key-value store collaborator.
//!
//! The SQL layer depends only on the [`StorageClient`] trait. The store offers
//! keyed access, one pushable secondary-index [`Filter`] per query, and a
//! server-side [`Aggregation`]; it has no joins and no transactions.

pub mod aggregate;
pub mod filter;
pub mod key;
pub mod memory;
pub mod sled_store;

pub use filter::{Filter, FilterValue};
pub use key::{DIGEST_LEN, Key, UserKey};
pub use memory::MemoryStorage;
pub use sled_store::SledStorage;

use crate::error::KvsqlResult;
use crate::value::Bins;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Field bag of one stored record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    pub bins: Bins,
}

impl Record {
    pub fn new(bins: Bins) -> Self {
        Self { bins }
    }
}

/// A record together with its key, as produced by queries and scans.
///
/// Aggregation results have no key.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyRecord {
    pub key: Option<Key>,
    pub record: Record,
}

impl KeyRecord {
    pub fn new(key: Key, record: Record) -> Self {
        Self {
            key: Some(key),
            record,
        }
    }

    pub fn keyless(bins: Bins) -> Self {
        Self {
            key: None,
            record: Record::new(bins),
        }
    }
}

/// Secondary-index query over one set.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub namespace: String,
    pub set: String,
    /// At most one server-side filter; `None` scans the whole set.
    pub filter: Option<Filter>,
}

impl Statement {
    pub fn new(namespace: impl Into<String>, set: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            set: set.into(),
            filter: None,
        }
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }
}

/// Server-side aggregation producing keyless grouping records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Aggregation {
    /// One record per distinct combination of the listed bins
    Distinct(Vec<String>),
    /// Distinct groups plus a row count stored under `alias`
    GroupCount { group_by: Vec<String>, alias: String },
}

/// Server-side record iterator.
///
/// `close` releases the server-side resources and must be idempotent.
pub trait RecordStream: Send {
    fn next_record(&mut self) -> KvsqlResult<Option<KeyRecord>>;

    fn close(&mut self);
}

/// Connected client of the key-value store.
///
/// Every call is one blocking network round trip; timeouts and retries are
/// the client's own configuration.
///
/// # Contract
///
/// - `get`: `None` for absent keys.
/// - `get_batch`: one round trip for all keys, results in key order.
/// - `put`: merges bins into the record, creating it if absent.
/// - `scan`/`query`: records of one set, optionally filtered by one index filter.
/// - `query_aggregate`: grouping records computed server-side.
/// - `any_record`: some record of the set, for metadata sampling when a
///   query matched nothing.
pub trait StorageClient: Send + Sync {
    fn get(&self, key: &Key) -> KvsqlResult<Option<Record>>;

    fn get_batch(&self, keys: &[Key]) -> KvsqlResult<Vec<Option<Record>>>;

    fn put(&self, key: &Key, bins: &Bins) -> KvsqlResult<()>;

    fn scan(&self, namespace: &str, set: &str) -> KvsqlResult<Box<dyn RecordStream>>;

    fn query(&self, statement: &Statement) -> KvsqlResult<Box<dyn RecordStream>>;

    fn query_aggregate(
        &self,
        statement: &Statement,
        aggregation: &Aggregation,
    ) -> KvsqlResult<Box<dyn RecordStream>>;

    fn any_record(&self, namespace: &str, set: &str) -> KvsqlResult<Option<KeyRecord>>;
}

/// Stream over records already materialized by the store.
pub struct VecRecordStream {
    records: VecDeque<KeyRecord>,
    closed: bool,
    close_counter: Option<Arc<AtomicUsize>>,
}

impl VecRecordStream {
    pub fn new(records: Vec<KeyRecord>) -> Self {
        Self {
            records: records.into(),
            closed: false,
            close_counter: None,
        }
    }

    /// Count effective closes into `counter`.
    pub fn with_close_counter(mut self, counter: Arc<AtomicUsize>) -> Self {
        self.close_counter = Some(counter);
        self
    }
}

impl RecordStream for VecRecordStream {
    fn next_record(&mut self) -> KvsqlResult<Option<KeyRecord>> {
        if self.closed {
            return Ok(None);
        }
        Ok(self.records.pop_front())
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.records.clear();
        if let Some(counter) = &self.close_counter {
            counter.fetch_add(1, Ordering::SeqCst);
        }
    }
}
