//! Server-side aggregation shared by the bundled store implementations.

use crate::storage::{Aggregation, KeyRecord};
use crate::value::{Bins, Value};
use ahash::AHashMap;

/// Group `records` per `aggregation`, keeping first-seen group order.
///
/// A bin missing from a record groups as `NULL` and is left out of the
/// output record, the same way the store never stores null bins.
pub fn aggregate<I>(records: I, aggregation: &Aggregation) -> Vec<KeyRecord>
where
    I: IntoIterator<Item = Bins>,
{
    let (group_by, alias) = match aggregation {
        Aggregation::Distinct(columns) => (columns, None),
        Aggregation::GroupCount { group_by, alias } => (group_by, Some(alias)),
    };

    let mut index: AHashMap<String, usize> = AHashMap::new();
    let mut groups: Vec<(Bins, i64)> = Vec::new();

    for bins in records {
        let values: Vec<&Value> = group_by
            .iter()
            .map(|c| bins.get(c).unwrap_or(&Value::Null))
            .collect();
        let group_key = format!("{values:?}");

        match index.get(&group_key) {
            Some(&slot) => groups[slot].1 += 1,
            None => {
                let group: Bins = group_by
                    .iter()
                    .zip(values)
                    .filter(|(_, v)| !v.is_null())
                    .map(|(c, v)| (c.clone(), v.clone()))
                    .collect();
                index.insert(group_key, groups.len());
                groups.push((group, 1));
            }
        }
    }

    groups
        .into_iter()
        .map(|(mut bins, count)| {
            if let Some(alias) = alias {
                bins.insert(alias.clone(), Value::Int64(count));
            }
            KeyRecord::keyless(bins)
        })
        .collect()
}
