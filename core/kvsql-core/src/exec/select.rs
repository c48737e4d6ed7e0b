//! SELECT over one set.

use crate::config::ExecutorConfig;
use crate::cursor::{RowCursor, StaticCursor};
use crate::discovery::TypeDiscoverer;
use crate::error::KvsqlResult;
use crate::exec::{Executor, record_cursor};
use crate::sql::column::Column;
use crate::sql::plan::{PlanBuilder, QueryPlan};
use crate::sql::predicate::{OperatorRegistry, Predicate};
use crate::storage::StorageClient;
use std::sync::Arc;
use tracing::debug;

pub struct SelectExecutor {
    config: ExecutorConfig,
    plan: QueryPlan,
    columns: Vec<Column>,
    discoverer: Option<Arc<dyn TypeDiscoverer>>,
}

impl SelectExecutor {
    pub fn new(config: &ExecutorConfig, plan: QueryPlan, columns: Vec<Column>) -> Self {
        Self {
            config: config.clone(),
            plan,
            columns,
            discoverer: None,
        }
    }

    /// Classify `predicates` with the built-in operators into a plan over
    /// `set` (`None` for a constant query).
    pub fn prepare<I>(
        config: &ExecutorConfig,
        set: Option<&str>,
        columns: Vec<Column>,
        predicates: I,
    ) -> KvsqlResult<Self>
    where
        I: IntoIterator<Item = Predicate>,
    {
        let registry = OperatorRegistry::new(&config.primary_key_column);
        let plan = PlanBuilder::new(&registry, &config.namespace, set.map(str::to_string))
            .predicates(predicates)?
            .build();
        Ok(Self::new(config, plan, columns))
    }

    /// Resolve undeclared column types up front instead of from the first row.
    pub fn with_discoverer(mut self, discoverer: Arc<dyn TypeDiscoverer>) -> Self {
        self.discoverer = Some(discoverer);
        self
    }

    pub fn plan(&self) -> &QueryPlan {
        &self.plan
    }
}

impl Executor for SelectExecutor {
    type Output = Box<dyn RowCursor>;

    fn apply(&self, client: &Arc<dyn StorageClient>) -> KvsqlResult<Self::Output> {
        let Some(set) = self.plan.set() else {
            debug!(target: "kvsql", "constant query");
            return Ok(Box::new(StaticCursor::constant()));
        };
        let namespace = self.plan.namespace();

        let cursor = record_cursor(
            &self.config,
            client,
            self.discoverer.as_ref(),
            (namespace, set),
            &self.columns,
            || self.plan.execute(client.as_ref()),
        )?;
        Ok(Box::new(cursor))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::GenericTypeDiscoverer;
    use crate::sql::column::{ColumnRole, SqlType, WILDCARD};
    use crate::storage::{DIGEST_LEN, Key, MemoryStorage, UserKey};
    use crate::value::{Bins, Value};

    fn seeded() -> Arc<MemoryStorage> {
        let store = Arc::new(MemoryStorage::new());
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

    fn column(name: &str) -> Column {
        ColumnRole::Data.create("test", "people", name, name)
    }

    #[test]
    fn test_constant_query_reads_nothing() {
        let store = seeded();
        let client: Arc<dyn StorageClient> = store.clone();
        let before = store.round_trips();

        let exec = SelectExecutor::prepare(
            &ExecutorConfig::default(),
            None,
            Vec::new(),
            Vec::<Predicate>::new(),
        )
        .unwrap();
        let mut cursor = exec.apply(&client).unwrap();
        assert!(cursor.next().unwrap());
        assert!(!cursor.next().unwrap());
        assert_eq!(store.round_trips(), before);
    }

    #[test]
    fn test_point_lookup_select() {
        let store = seeded();
        let client: Arc<dyn StorageClient> = store.clone();
        let exec = SelectExecutor::prepare(
            &ExecutorConfig::default(),
            Some("people"),
            vec![column("name")],
            [Predicate::eq("PK", 2)],
        )
        .unwrap();

        let mut cursor = exec.apply(&client).unwrap();
        assert!(cursor.next().unwrap());
        assert_eq!(cursor.get_string("name").unwrap().as_deref(), Some("Paul"));
        assert!(!cursor.next().unwrap());
    }

    #[test]
    fn test_residual_after_pushed_filter() {
        let store = seeded();
        let client: Arc<dyn StorageClient> = store.clone();
        let exec = SelectExecutor::prepare(
            &ExecutorConfig::default(),
            Some("people"),
            vec![column("name")],
            [Predicate::gt("year", 1940), Predicate::eq("name", "George")],
        )
        .unwrap();
        assert_eq!(exec.plan().residual().len(), 1);

        let before = store.round_trips();
        let mut cursor = exec.apply(&client).unwrap();
        assert!(cursor.next().unwrap());
        assert_eq!(cursor.get_string("name").unwrap().as_deref(), Some("George"));
        assert!(!cursor.next().unwrap());
        assert_eq!(store.round_trips() - before, 1);
    }

    #[test]
    fn test_discoverer_resolves_wildcard_up_front() {
        let store = seeded();
        let client: Arc<dyn StorageClient> = store.clone();
        let exec = SelectExecutor::prepare(
            &ExecutorConfig::default(),
            Some("people"),
            vec![column(WILDCARD)],
            Vec::<Predicate>::new(),
        )
        .unwrap()
        .with_discoverer(Arc::new(GenericTypeDiscoverer::for_storage(
            client.clone(),
            &ExecutorConfig::default(),
        )));

        let mut cursor = exec.apply(&client).unwrap();
        let md = cursor.metadata().unwrap();
        assert!(md.is_discovered());
        assert_eq!(md.labels(), vec!["name", "year"]);
        assert_eq!(md.column_type(1).unwrap(), SqlType::BigInt);
        assert!(cursor.next().unwrap());
        assert_eq!(cursor.get_i64("year").unwrap(), 1940);
    }

    #[test]
    fn test_empty_result_samples_any_record() {
        let store = seeded();
        let client: Arc<dyn StorageClient> = store.clone();
        let exec = SelectExecutor::prepare(
            &ExecutorConfig::default(),
            Some("people"),
            vec![column("year")],
            [Predicate::eq("name", "Ringo")],
        )
        .unwrap();

        let mut cursor = exec.apply(&client).unwrap();
        assert_eq!(cursor.metadata().unwrap().column_type(0).unwrap(), SqlType::BigInt);
        assert!(!cursor.next().unwrap());
    }

    #[test]
    fn test_discovered_wildcard_still_reads_every_field() {
        let store = Arc::new(MemoryStorage::new());
        let rows = [
            (1, "name", Value::Text("John".into())),
            (2, "name", Value::Text("Paul".into())),
            (3, "late", Value::Int64(7)),
        ];
        for (pk, bin, value) in rows {
            let mut bins = Bins::new();
            bins.insert(bin.to_string(), value);
            store
                .put(&Key::new("test", "people", UserKey::Int(pk)), &bins)
                .unwrap();
        }
        let client: Arc<dyn StorageClient> = store.clone();
        let config = ExecutorConfig::default().with_sample_limit(1);

        let exec = SelectExecutor::prepare(
            &config,
            Some("people"),
            vec![column(WILDCARD)],
            Vec::<Predicate>::new(),
        )
        .unwrap()
        .with_discoverer(Arc::new(GenericTypeDiscoverer::for_storage(client.clone(), &config)));

        let mut cursor = exec.apply(&client).unwrap();
        assert_eq!(cursor.metadata().unwrap().labels(), vec!["name"]);

        assert!(cursor.next().unwrap());
        assert_eq!(cursor.get_i64("PK").unwrap(), 1);
        assert_eq!(cursor.get_bytes("PK_DIGEST").unwrap().map(|d| d.len()), Some(DIGEST_LEN));
        assert_eq!(cursor.get_i64("late").unwrap(), 0);
        assert!(cursor.was_null());

        assert!(cursor.next().unwrap());
        assert!(cursor.next().unwrap());
        assert_eq!(cursor.get_i64("late").unwrap(), 7);
        assert_eq!(cursor.get_string("name").unwrap(), None);
        assert!(!cursor.next().unwrap());
    }
}
