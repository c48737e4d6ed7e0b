// SQL 모듈 진입점
pub mod column;
pub mod metadata;
pub mod plan;
pub mod predicate;

pub use column::{Column, ColumnRole, SqlType, WILDCARD};
pub use metadata::ResultMetadata;
pub use plan::{PlanBuilder, QueryPlan, ResidualStream, StoragePlan};
pub use predicate::{Operator, OperatorRegistry, PlanRule, Predicate};
