//! Statement executors.
//!
//! An executor is built from already-parsed statement parts and applied to a
//! connected [`StorageClient`]. Construction never touches storage, so
//! construction-time checks fail without side effects.

pub mod distinct;
pub mod insert;
pub mod select;

pub use distinct::DistinctExecutor;
pub use insert::{InsertExecutor, InsertMode, InsertOutcome};
pub use select::SelectExecutor;

use crate::config::ExecutorConfig;
use crate::cursor::RecordCursor;
use crate::discovery::{TypeDiscoverer, needs_sample};
use crate::error::KvsqlResult;
use crate::sql::column::Column;
use crate::sql::metadata::ResultMetadata;
use crate::storage::{RecordStream, StorageClient};
use std::sync::Arc;

/// Runs one statement against the store.
pub trait Executor {
    type Output;

    fn apply(&self, client: &Arc<dyn StorageClient>) -> KvsqlResult<Self::Output>;
}

/// Shared row-source setup of SELECT and DISTINCT.
///
/// The cursor always resolves labels against the projected `columns`, so a
/// wildcard keeps passing every field of the record through. Discovered
/// columns only shape the metadata. Without a discoverer, metadata is
/// sampled from the rows with the set's `any_record` as fallback.
pub(crate) fn record_cursor<F>(
    config: &ExecutorConfig,
    client: &Arc<dyn StorageClient>,
    discoverer: Option<&Arc<dyn TypeDiscoverer>>,
    (namespace, set): (&str, &str),
    columns: &[Column],
    open: F,
) -> KvsqlResult<RecordCursor>
where
    F: FnOnce() -> KvsqlResult<Box<dyn RecordStream>>,
{
    let discovered = match discoverer {
        Some(discoverer) if columns.iter().any(needs_sample) => {
            Some(discoverer.discover_type(columns)?)
        }
        _ => None,
    };

    let cursor = RecordCursor::new(namespace, set, columns.to_vec(), config, open()?);
    Ok(match discovered {
        Some(resolved) => {
            let metadata = if resolved.is_empty() {
                ResultMetadata::empty(namespace, set)
            } else {
                ResultMetadata::new(resolved)
            };
            cursor.with_metadata(metadata.discovered())
        }
        None => {
            let client = Arc::clone(client);
            let (namespace, set) = (namespace.to_string(), set.to_string());
            cursor.with_fallback(Box::new(move || client.any_record(&namespace, &set)))
        }
    })
}
