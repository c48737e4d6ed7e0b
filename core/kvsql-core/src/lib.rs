//! # kvsql — SQL execution over a schemaless key-value store
//!
//! kvsql는 조인도 스키마도 없는 키-값 저장소 앞에서 동작하는 SQL 실행 계층입니다.
//! 이미 파싱된 SQL 구성 요소(술어, 컬럼, DISTINCT 표시)를 받아 저장소 연산으로
//! 변환하고, 결과를 타입이 있는 커서 기반 행 스트림으로 제공합니다.
//!
//! ## 주요 특징
//!
//! - **Predicate pushdown**: PK 등호는 point lookup, 그 외 하나의 술어만 인덱스 필터로 푸시
//! - **Residual predicates**: 푸시되지 못한 술어는 클라이언트 측에서 평가
//! - **Row cursor**: forward-only, lazy 메타데이터, replay buffer, null 추적
//! - **Type discovery**: 타입 미선언 컬럼은 레코드 샘플링으로 추론
//! - **Batch insert**: 일괄 존재 확인 후 쓰기 (배치 단위 insert-if-absent)
//!
//! ## 빠른 시작
//!
//! ```rust
//! use std::sync::Arc;
//! use kvsql_core::cursor::RowCursor;
//! use kvsql_core::exec::{Executor, InsertExecutor, SelectExecutor};
//! use kvsql_core::sql::{ColumnRole, Predicate};
//! use kvsql_core::storage::{MemoryStorage, StorageClient};
//! use kvsql_core::{ExecutorConfig, Value};
//!
//! # fn main() -> kvsql_core::KvsqlResult<()> {
//! let config = ExecutorConfig::default();
//! let client: Arc<dyn StorageClient> = Arc::new(MemoryStorage::new());
//!
//! // 데이터 삽입
//! let insert = InsertExecutor::new(
//!     &config,
//!     "people",
//!     vec!["PK".to_string(), "name".to_string()],
//!     vec![vec![Value::Int64(1), Value::from("Adam")]],
//! )?;
//! assert_eq!(insert.apply(&client)?.rows_written, 1);
//!
//! // PK 조회
//! let select = SelectExecutor::prepare(
//!     &config,
//!     Some("people"),
//!     vec![ColumnRole::Data.create("test", "people", "name", "name")],
//!     [Predicate::eq("PK", 1i64)],
//! )?;
//! let mut cursor = select.apply(&client)?;
//! assert!(cursor.next()?);
//! assert_eq!(cursor.get_string("name")?.as_deref(), Some("Adam"));
//! # Ok(())
//! # }
//! ```
//!
//! ## 실행 흐름
//!
//! ```text
//! Predicate → OperatorRegistry → QueryPlan (PointLookup | PushedFilter | FullScan)
//!          → StorageClient (1 round trip) → ResidualStream → RecordCursor
//! ```
//!
//! ## 모듈 구조
//!
//! - [`sql`] — 컬럼 모델, 메타데이터, 술어 분류, 쿼리 플랜
//! - [`cursor`] — 행 커서와 타입 변환
//! - [`discovery`] — 샘플링 기반 타입 추론
//! - [`exec`] — SELECT / DISTINCT / INSERT 실행기
//! - [`storage`] — 저장소 클라이언트 트레이트와 메모리/sled 구현
//! - [`config`] — 실행기 설정

pub mod config;
pub mod cursor;
pub mod discovery;
pub mod error;
pub mod exec;
pub mod sql;
pub mod storage;
pub mod value;

// Logging utilities
pub mod logging;

// Re-export commonly used types
pub use config::{ExecutorConfig, SpecialFields};
pub use cursor::RowCursor;
pub use error::{KvsqlError, KvsqlResult};
pub use exec::Executor;
pub use value::{Bins, Value, ValueKind};
