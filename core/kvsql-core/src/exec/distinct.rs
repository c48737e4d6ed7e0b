//! DISTINCT / GROUP BY over the store's native aggregation query.
//!
//! The store computes the groups from at most one pushed filter; residual
//! predicates on such a plan are rejected. A point-lookup plan reads its
//! single record (residuals applied) and groups it client-side. A HAVING
//! predicate is applied by decorating the resulting cursor.

use crate::config::ExecutorConfig;
use crate::cursor::{FilteredCursor, RowCursor, RowPredicate};
use crate::discovery::TypeDiscoverer;
use crate::error::{KvsqlError, KvsqlResult};
use crate::exec::{Executor, record_cursor};
use crate::sql::column::Column;
use crate::sql::plan::{QueryPlan, StoragePlan};
use crate::storage::aggregate::aggregate;
use crate::storage::{Aggregation, RecordStream, StorageClient, VecRecordStream};
use crate::value::Bins;
use std::sync::Arc;
use tracing::debug;

pub struct DistinctExecutor {
    config: ExecutorConfig,
    plan: QueryPlan,
    columns: Vec<Column>,
    aggregation: Aggregation,
    having: Option<RowPredicate>,
    discoverer: Option<Arc<dyn TypeDiscoverer>>,
}

impl DistinctExecutor {
    pub fn new(
        config: &ExecutorConfig,
        plan: QueryPlan,
        columns: Vec<Column>,
        aggregation: Aggregation,
    ) -> Self {
        Self {
            config: config.clone(),
            plan,
            columns,
            aggregation,
            having: None,
            discoverer: None,
        }
    }

    pub fn with_having(mut self, predicate: RowPredicate) -> Self {
        self.having = Some(predicate);
        self
    }

    /// Resolve undeclared column types up front instead of from the first group.
    pub fn with_discoverer(mut self, discoverer: Arc<dyn TypeDiscoverer>) -> Self {
        self.discoverer = Some(discoverer);
        self
    }

    /// Groups of the single record a point lookup yields.
    fn aggregate_point(&self, client: &dyn StorageClient) -> KvsqlResult<Box<dyn RecordStream>> {
        let mut matched = self.plan.execute(client)?;
        let drained = drain(&mut *matched);
        matched.close();
        let groups = aggregate(drained?, &self.aggregation);
        Ok(Box::new(VecRecordStream::new(groups)))
    }

    fn aggregate_query(&self, client: &dyn StorageClient) -> KvsqlResult<Box<dyn RecordStream>> {
        let statement = self.plan.statement().ok_or_else(|| {
            KvsqlError::UnsupportedOperation("aggregation without a set".to_string())
        })?;
        debug!(target: "kvsql", set = %statement.set, aggregation = ?self.aggregation, "aggregate query");
        client.query_aggregate(&statement, &self.aggregation)
    }
}

fn drain(stream: &mut dyn RecordStream) -> KvsqlResult<Vec<Bins>> {
    let mut bins = Vec::new();
    while let Some(record) = stream.next_record()? {
        bins.push(record.record.bins);
    }
    Ok(bins)
}

impl Executor for DistinctExecutor {
    type Output = Box<dyn RowCursor>;

    fn apply(&self, client: &Arc<dyn StorageClient>) -> KvsqlResult<Self::Output> {
        let Some(set) = self.plan.set() else {
            return Err(KvsqlError::UnsupportedOperation(
                "aggregation without a set".to_string(),
            ));
        };
        let point = matches!(self.plan.storage(), StoragePlan::PointLookup(_));
        if !point && !self.plan.residual().is_empty() {
            return Err(KvsqlError::UnsupportedOperation(
                "aggregation with predicates beyond one index filter".to_string(),
            ));
        }

        let cursor = record_cursor(
            &self.config,
            client,
            self.discoverer.as_ref(),
            (self.plan.namespace(), set),
            &self.columns,
            || {
                if point {
                    self.aggregate_point(client.as_ref())
                } else {
                    self.aggregate_query(client.as_ref())
                }
            },
        )?;

        Ok(match &self.having {
            Some(predicate) => Box::new(FilteredCursor::new(Box::new(cursor), Arc::clone(predicate))),
            None => Box::new(cursor),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::column::{ColumnRole, SqlType};
    use crate::discovery::GenericTypeDiscoverer;
    use crate::storage::{Filter, Key, MemoryStorage, UserKey};
    use crate::value::Value;

    fn seeded() -> Arc<dyn StorageClient> {
        let store = MemoryStorage::new();
        let rows = [
            (1, "Liverpool", 1940),
            (2, "Liverpool", 1942),
            (3, "Liverpool", 1943),
            (4, "London", 1940),
        ];
        for (pk, city, year) in rows {
            let mut bins = Bins::new();
            bins.insert("city".to_string(), Value::Text(city.to_string()));
            bins.insert("year".to_string(), Value::Int64(year));
            store
                .put(&Key::new("test", "people", UserKey::Int(pk)), &bins)
                .unwrap();
        }
        Arc::new(store)
    }

    fn plan() -> QueryPlan {
        QueryPlan::new("test", Some("people".to_string()))
    }

    fn city() -> Column {
        ColumnRole::Data
            .create("test", "people", "city", "city")
            .with_type(SqlType::Varchar)
    }

    fn cities(mut cursor: Box<dyn RowCursor>) -> Vec<String> {
        let mut out = Vec::new();
        while cursor.next().unwrap() {
            out.push(cursor.get_string("city").unwrap().unwrap_or_default());
        }
        out
    }

    #[test]
    fn test_distinct_values() {
        let exec = DistinctExecutor::new(
            &ExecutorConfig::default(),
            plan(),
            vec![city()],
            Aggregation::Distinct(vec!["city".to_string()]),
        );
        assert_eq!(cities(exec.apply(&seeded()).unwrap()), vec!["Liverpool", "London"]);
    }

    #[test]
    fn test_having_filters_groups() {
        let count = Column::new(ColumnRole::Expression, "test", "people", "cnt")
            .with_expression("COUNT(*)")
            .with_type(SqlType::BigInt);
        let exec = DistinctExecutor::new(
            &ExecutorConfig::default(),
            plan(),
            vec![city(), count],
            Aggregation::GroupCount {
                group_by: vec!["city".to_string()],
                alias: "cnt".to_string(),
            },
        )
        .with_having(Arc::new(|row: &mut dyn RowCursor| -> KvsqlResult<bool> {
            Ok(row.get_i64("cnt")? > 1)
        }));

        let mut cursor = exec.apply(&seeded()).unwrap();
        assert_eq!(cursor.metadata().unwrap().column_name(1).unwrap(), "COUNT(*)");
        assert!(cursor.next().unwrap());
        assert_eq!(cursor.get_string("city").unwrap().as_deref(), Some("Liverpool"));
        assert_eq!(cursor.get_i64("cnt").unwrap(), 3);
        assert!(!cursor.next().unwrap());
    }

    #[test]
    fn test_pushed_filter_restricts_groups() {
        let exec = DistinctExecutor::new(
            &ExecutorConfig::default(),
            plan().with_filter(Filter::equal_int("year", 1940)),
            vec![city()],
            Aggregation::Distinct(vec!["city".to_string()]),
        );
        assert_eq!(cities(exec.apply(&seeded()).unwrap()), vec!["Liverpool", "London"]);

        let exec = DistinctExecutor::new(
            &ExecutorConfig::default(),
            plan().with_filter(Filter::range("year", 1941, 1950)),
            vec![city()],
            Aggregation::Distinct(vec!["city".to_string()]),
        );
        assert_eq!(cities(exec.apply(&seeded()).unwrap()), vec!["Liverpool"]);
    }

    #[test]
    fn test_residual_predicates_are_rejected() {
        let exec = DistinctExecutor::new(
            &ExecutorConfig::default(),
            plan()
                .with_filter(Filter::equal_int("year", 1940))
                .with_filter(Filter::equal_text("city", "London")),
            vec![city()],
            Aggregation::Distinct(vec!["city".to_string()]),
        );
        assert!(matches!(
            exec.apply(&seeded()),
            Err(KvsqlError::UnsupportedOperation(_))
        ));
    }

    #[test]
    fn test_point_lookup_groups_one_record() {
        let point = || plan().with_point_lookup(Key::new("test", "people", UserKey::Int(4)));
        let exec = DistinctExecutor::new(
            &ExecutorConfig::default(),
            point(),
            vec![city()],
            Aggregation::Distinct(vec!["city".to_string()]),
        );
        assert_eq!(cities(exec.apply(&seeded()).unwrap()), vec!["London"]);

        let exec = DistinctExecutor::new(
            &ExecutorConfig::default(),
            point().with_filter(Filter::equal_int("year", 1941)),
            vec![city()],
            Aggregation::Distinct(vec!["city".to_string()]),
        );
        assert!(cities(exec.apply(&seeded()).unwrap()).is_empty());
    }

    #[test]
    fn test_empty_groups_sample_any_record() {
        let untyped = ColumnRole::Data.create("test", "people", "city", "city");
        let exec = DistinctExecutor::new(
            &ExecutorConfig::default(),
            plan().with_filter(Filter::equal_int("year", 9999)),
            vec![untyped],
            Aggregation::Distinct(vec!["city".to_string()]),
        );

        let mut cursor = exec.apply(&seeded()).unwrap();
        assert_eq!(cursor.metadata().unwrap().column_type(0).unwrap(), SqlType::Varchar);
        assert!(!cursor.next().unwrap());
    }

    #[test]
    fn test_discoverer_types_columns_up_front() {
        let client = seeded();
        let config = ExecutorConfig::default();
        let untyped = ColumnRole::Data.create("test", "people", "year", "year");
        let exec = DistinctExecutor::new(
            &config,
            plan(),
            vec![untyped],
            Aggregation::Distinct(vec!["year".to_string()]),
        )
        .with_discoverer(Arc::new(GenericTypeDiscoverer::for_storage(Arc::clone(&client), &config)));

        let mut cursor = exec.apply(&client).unwrap();
        let md = cursor.metadata().unwrap();
        assert!(md.is_discovered());
        assert_eq!(md.column_type(0).unwrap(), SqlType::BigInt);
        assert!(cursor.next().unwrap());
        assert_eq!(cursor.get_i64("year").unwrap(), 1940);
    }
}
