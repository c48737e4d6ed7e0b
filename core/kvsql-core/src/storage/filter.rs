//! Secondary-index filters.
//!
//! The store evaluates at most one of these server-side per query. The same
//! type doubles as a client-side residual check via [`Filter::matches`].

use crate::value::{Bins, Value};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Literal of an equality filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterValue {
    Int(i64),
    Text(String),
}

/// One index-backed predicate on a single bin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Filter {
    /// `bin = value`
    Equal { bin: String, value: FilterValue },
    /// `begin <= bin <= end` on integer bins
    Range { bin: String, begin: i64, end: i64 },
}

impl Filter {
    pub fn equal_int(bin: impl Into<String>, value: i64) -> Self {
        Filter::Equal {
            bin: bin.into(),
            value: FilterValue::Int(value),
        }
    }

    pub fn equal_text(bin: impl Into<String>, value: impl Into<String>) -> Self {
        Filter::Equal {
            bin: bin.into(),
            value: FilterValue::Text(value.into()),
        }
    }

    pub fn range(bin: impl Into<String>, begin: i64, end: i64) -> Self {
        Filter::Range {
            bin: bin.into(),
            begin,
            end,
        }
    }

    pub fn bin(&self) -> &str {
        match self {
            Filter::Equal { bin, .. } | Filter::Range { bin, .. } => bin,
        }
    }

    /// Evaluate against fetched bins. Absent bins never match.
    pub fn matches(&self, bins: &Bins) -> bool {
        let Some(value) = bins.get(self.bin()) else {
            return false;
        };
        match (self, value) {
            (
                Filter::Equal {
                    value: FilterValue::Text(expected),
                    ..
                },
                Value::Text(actual),
            ) => expected == actual,
            (
                Filter::Equal {
                    value: FilterValue::Int(expected),
                    ..
                },
                actual,
            ) => actual.as_i64() == Some(*expected),
            (Filter::Range { begin, end, .. }, actual) => actual
                .as_i64()
                .is_some_and(|v| *begin <= v && v <= *end),
            _ => false,
        }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Filter::Equal {
                bin,
                value: FilterValue::Int(v),
            } => write!(f, "{bin} = {v}"),
            Filter::Equal {
                bin,
                value: FilterValue::Text(v),
            } => write!(f, "{bin} = '{v}'"),
            Filter::Range { bin, begin, end } => write!(f, "{bin} BETWEEN {begin} AND {end}"),
        }
    }
}
