//! Storage plans — which single storage operation serves a SELECT.
//!
//! The store answers one of: a keyed get, one index-backed filter, or a full
//! scan. Every predicate that does not fit the chosen operation is kept as a
//! residual and evaluated client-side on the fetched stream.

use crate::error::{KvsqlError, KvsqlResult};
use crate::sql::predicate::{OperatorRegistry, Predicate};
use crate::storage::{
    Filter, Key, KeyRecord, RecordStream, Statement, StorageClient, UserKey, VecRecordStream,
};
use tracing::debug;

/// Storage operation of a plan
#[derive(Debug, Clone, PartialEq)]
pub enum StoragePlan {
    FullScan,
    PointLookup(Key),
    PushedFilter(Filter),
}

/// A storage plan plus the predicates left for client-side evaluation.
///
/// Invariant: at most one filter is pushed to the store.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryPlan {
    namespace: String,
    set: Option<String>,
    storage: StoragePlan,
    residual: Vec<Filter>,
}

impl QueryPlan {
    /// Plan over `namespace.set`; `None` for statements that read no set.
    pub fn new(namespace: impl Into<String>, set: Option<String>) -> Self {
        Self {
            namespace: namespace.into(),
            set,
            storage: StoragePlan::FullScan,
            residual: Vec::new(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn set(&self) -> Option<&str> {
        self.set.as_deref()
    }

    pub fn storage(&self) -> &StoragePlan {
        &self.storage
    }

    pub fn residual(&self) -> &[Filter] {
        &self.residual
    }

    /// Constant expression query, e.g. `SELECT 1+2`
    pub fn is_constant(&self) -> bool {
        self.set.is_none()
    }

    /// Key in this plan's namespace and set
    pub fn key(&self, user_key: UserKey) -> Key {
        Key::new(&self.namespace, self.set.clone().unwrap_or_default(), user_key)
    }

    /// Point lookups are not conjoined: the last one wins. A filter pushed
    /// earlier is demoted to residual.
    pub fn with_point_lookup(mut self, key: Key) -> Self {
        if let StoragePlan::PushedFilter(filter) =
            std::mem::replace(&mut self.storage, StoragePlan::FullScan)
        {
            self.residual.push(filter);
        }
        self.storage = StoragePlan::PointLookup(key);
        self
    }

    /// Push `filter` if nothing is pushed yet, keep it residual otherwise.
    pub fn with_filter(mut self, filter: Filter) -> Self {
        match self.storage {
            StoragePlan::FullScan => self.storage = StoragePlan::PushedFilter(filter),
            StoragePlan::PointLookup(_) | StoragePlan::PushedFilter(_) => {
                self.residual.push(filter)
            }
        }
        self
    }

    /// Issue the single storage operation of this plan.
    ///
    /// Residual predicates are applied to the returned stream.
    pub fn execute(&self, client: &dyn StorageClient) -> KvsqlResult<Box<dyn RecordStream>> {
        let set = self.set.as_deref().ok_or_else(|| {
            KvsqlError::UnsupportedOperation("storage access for a constant query".to_string())
        })?;

        let stream: Box<dyn RecordStream> = match &self.storage {
            StoragePlan::PointLookup(key) => {
                debug!(target: "kvsql", key = %key, "point lookup");
                let records = client
                    .get(key)?
                    .map(|record| KeyRecord::new(key.clone(), record))
                    .into_iter()
                    .collect();
                Box::new(VecRecordStream::new(records))
            }
            StoragePlan::PushedFilter(filter) => {
                debug!(target: "kvsql", set = %set, filter = %filter, "index query");
                client.query(&Statement::new(&self.namespace, set).with_filter(filter.clone()))?
            }
            StoragePlan::FullScan => {
                debug!(target: "kvsql", set = %set, "full scan");
                client.scan(&self.namespace, set)?
            }
        };

        if self.residual.is_empty() {
            Ok(stream)
        } else {
            Ok(Box::new(ResidualStream::new(stream, self.residual.clone())))
        }
    }

    /// Secondary-index statement carrying the pushed filter, if any.
    pub fn statement(&self) -> Option<Statement> {
        let set = self.set.as_deref()?;
        let statement = Statement::new(&self.namespace, set);
        Some(match &self.storage {
            StoragePlan::PushedFilter(filter) => statement.with_filter(filter.clone()),
            _ => statement,
        })
    }
}

/// Accumulates WHERE predicates into one [`QueryPlan`].
pub struct PlanBuilder<'a> {
    registry: &'a OperatorRegistry,
    plan: QueryPlan,
}

impl<'a> PlanBuilder<'a> {
    pub fn new(registry: &'a OperatorRegistry, namespace: impl Into<String>, set: Option<String>) -> Self {
        Self {
            registry,
            plan: QueryPlan::new(namespace, set),
        }
    }

    pub fn predicate(mut self, predicate: Predicate) -> KvsqlResult<Self> {
        self.plan = self.registry.classify(self.plan, predicate)?;
        Ok(self)
    }

    pub fn predicates<I>(self, predicates: I) -> KvsqlResult<Self>
    where
        I: IntoIterator<Item = Predicate>,
    {
        predicates.into_iter().try_fold(self, |b, p| b.predicate(p))
    }

    pub fn build(self) -> QueryPlan {
        debug!(
            target: "kvsql",
            storage = ?self.plan.storage,
            residual = self.plan.residual.len(),
            "query plan built"
        );
        self.plan
    }
}

/// Drops records failing any residual filter.
pub struct ResidualStream {
    inner: Box<dyn RecordStream>,
    residual: Vec<Filter>,
}

impl ResidualStream {
    pub fn new(inner: Box<dyn RecordStream>, residual: Vec<Filter>) -> Self {
        Self { inner, residual }
    }
}

impl RecordStream for ResidualStream {
    fn next_record(&mut self) -> KvsqlResult<Option<KeyRecord>> {
        while let Some(record) = self.inner.next_record()? {
            if self.residual.iter().all(|f| f.matches(&record.record.bins)) {
                return Ok(Some(record));
            }
        }
        Ok(None)
    }

    fn close(&mut self) {
        self.inner.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryStorage, UserKey};
    use crate::value::{Bins, Value};

    fn seeded() -> MemoryStorage {
        let store = MemoryStorage::new();
        for (pk, name, year) in [(1, "John", 1940), (2, "Paul", 1942), (3, "George", 1943)] {
            let mut bins = Bins::new();
            bins.insert("name".to_string(), Value::Text(name.to_string()));
            bins.insert("year".to_string(), Value::Int64(year));
            store
                .put(&Key::new("test", "people", UserKey::Int(pk)), &bins)
                .unwrap();
        }
        store
    }

    fn names(mut stream: Box<dyn RecordStream>) -> Vec<String> {
        let mut out = Vec::new();
        while let Some(r) = stream.next_record().unwrap() {
            if let Some(Value::Text(n)) = r.record.bins.get("name") {
                out.push(n.clone());
            }
        }
        out
    }

    #[test]
    fn test_second_filter_becomes_residual() {
        let plan = QueryPlan::new("test", Some("people".into()))
            .with_filter(Filter::range("year", 1941, i64::MAX))
            .with_filter(Filter::equal_text("name", "George"));

        assert_eq!(
            plan.storage(),
            &StoragePlan::PushedFilter(Filter::range("year", 1941, i64::MAX))
        );
        assert_eq!(plan.residual(), &[Filter::equal_text("name", "George")]);
    }

    #[test]
    fn test_point_lookup_demotes_pushed_filter() {
        let plan = QueryPlan::new("test", Some("people".into()))
            .with_filter(Filter::equal_text("name", "Paul"));
        let key = plan.key(UserKey::Int(2));
        let plan = plan.with_point_lookup(key.clone());

        assert_eq!(plan.storage(), &StoragePlan::PointLookup(key));
        assert_eq!(plan.residual(), &[Filter::equal_text("name", "Paul")]);
    }

    #[test]
    fn test_execute_issues_one_round_trip() {
        let store = seeded();
        let plan = QueryPlan::new("test", Some("people".into()))
            .with_filter(Filter::range("year", 1941, i64::MAX))
            .with_filter(Filter::equal_text("name", "George"));

        let before = store.round_trips();
        let stream = plan.execute(&store).unwrap();
        assert_eq!(store.round_trips() - before, 1);
        assert_eq!(names(stream), vec!["George"]);
    }

    #[test]
    fn test_execute_point_lookup_with_residual_miss() {
        let store = seeded();
        let plan = QueryPlan::new("test", Some("people".into()));
        let key = plan.key(UserKey::Int(1));
        let plan = plan
            .with_point_lookup(key)
            .with_filter(Filter::equal_text("name", "Paul"));

        assert!(names(plan.execute(&store).unwrap()).is_empty());
    }

    #[test]
    fn test_constant_plan_does_not_execute() {
        let store = MemoryStorage::new();
        let plan = QueryPlan::new("test", None);
        assert!(plan.is_constant());
        assert!(plan.execute(&store).is_err());
        assert_eq!(store.round_trips(), 0);
    }
}
