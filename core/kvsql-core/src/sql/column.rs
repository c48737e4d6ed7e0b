//! Column model — identity, role and SQL type of a result column.

use crate::value::{Value, ValueKind};
use std::fmt;

/// Wildcard column name (`SELECT *`)
pub const WILDCARD: &str = "*";

/// SQL type of a column, with the numeric codes relational consumers expect.
///
/// `Unknown` (code 0) means the column has no declared type yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SqlType {
    #[default]
    Unknown,
    Boolean,
    TinyInt,
    SmallInt,
    Integer,
    BigInt,
    Real,
    Double,
    Varchar,
    Blob,
    Date,
    Time,
    Timestamp,
    Array,
    Object,
}

impl SqlType {
    pub fn code(&self) -> i32 {
        match self {
            SqlType::Unknown => 0,
            SqlType::Boolean => 16,
            SqlType::TinyInt => -6,
            SqlType::SmallInt => 5,
            SqlType::Integer => 4,
            SqlType::BigInt => -5,
            SqlType::Real => 7,
            SqlType::Double => 8,
            SqlType::Varchar => 12,
            SqlType::Blob => 2004,
            SqlType::Date => 91,
            SqlType::Time => 92,
            SqlType::Timestamp => 93,
            SqlType::Array => 2003,
            SqlType::Object => 2000,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        const ALL: [SqlType; 15] = [
            SqlType::Unknown,
            SqlType::Boolean,
            SqlType::TinyInt,
            SqlType::SmallInt,
            SqlType::Integer,
            SqlType::BigInt,
            SqlType::Real,
            SqlType::Double,
            SqlType::Varchar,
            SqlType::Blob,
            SqlType::Date,
            SqlType::Time,
            SqlType::Timestamp,
            SqlType::Array,
            SqlType::Object,
        ];
        ALL.into_iter().find(|t| t.code() == code)
    }

    pub fn name(&self) -> &'static str {
        match self {
            SqlType::Unknown => "NULL",
            SqlType::Boolean => "BOOLEAN",
            SqlType::TinyInt => "TINYINT",
            SqlType::SmallInt => "SMALLINT",
            SqlType::Integer => "INTEGER",
            SqlType::BigInt => "BIGINT",
            SqlType::Real => "REAL",
            SqlType::Double => "DOUBLE",
            SqlType::Varchar => "VARCHAR",
            SqlType::Blob => "BLOB",
            SqlType::Date => "DATE",
            SqlType::Time => "TIME",
            SqlType::Timestamp => "TIMESTAMP",
            SqlType::Array => "ARRAY",
            SqlType::Object => "OBJECT",
        }
    }

    pub fn is_declared(&self) -> bool {
        *self != SqlType::Unknown
    }

    /// SQL type of a runtime kind; `Null` has none.
    pub fn of_kind(kind: ValueKind) -> Self {
        match kind {
            ValueKind::Null => SqlType::Unknown,
            ValueKind::Bool => SqlType::Boolean,
            ValueKind::Int8 => SqlType::TinyInt,
            ValueKind::Int16 => SqlType::SmallInt,
            ValueKind::Int32 => SqlType::Integer,
            ValueKind::Int64 => SqlType::BigInt,
            ValueKind::Float32 => SqlType::Real,
            ValueKind::Float64 => SqlType::Double,
            ValueKind::Text => SqlType::Varchar,
            ValueKind::Bytes => SqlType::Blob,
            ValueKind::List => SqlType::Array,
            ValueKind::Map => SqlType::Object,
        }
    }

    pub fn of_value(value: &Value) -> Self {
        Self::of_kind(value.kind())
    }
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What a column stands for in a result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnRole {
    /// Stored bin
    Data,
    /// Primary-key pseudo-column
    PrimaryKey,
    /// Fetched but not projected, e.g. a join key
    Hidden,
    /// Computed from `expression`
    Expression,
}

impl ColumnRole {
    /// Shorthand for `Column::new(self, ...)`.
    pub fn create(
        self,
        schema: impl Into<String>,
        table: impl Into<String>,
        name: impl Into<String>,
        label: impl Into<String>,
    ) -> Column {
        Column::new(self, schema, table, name).with_label(label)
    }
}

/// One column of a result set.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Column {
    pub name: String,
    pub label: Option<String>,
    pub role: ColumnRole,
    pub sql_type: SqlType,
    pub schema: String,
    pub table: String,
    pub expression: Option<String>,
}

impl Column {
    pub fn new(
        role: ColumnRole,
        schema: impl Into<String>,
        table: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            label: None,
            role,
            sql_type: SqlType::Unknown,
            schema: schema.into(),
            table: table.into(),
            expression: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_type(mut self, sql_type: SqlType) -> Self {
        self.sql_type = sql_type;
        self
    }

    pub fn with_expression(mut self, expression: impl Into<String>) -> Self {
        self.expression = Some(expression.into());
        self
    }

    /// Label if set, name otherwise
    pub fn display_label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.name)
    }

    /// Expression text for EXPRESSION columns, name otherwise
    pub fn display_name(&self) -> &str {
        match (self.role, &self.expression) {
            (ColumnRole::Expression, Some(expr)) => expr,
            _ => &self.name,
        }
    }

    pub fn is_hidden(&self) -> bool {
        self.role == ColumnRole::Hidden
    }

    pub fn is_wildcard(&self) -> bool {
        self.name == WILDCARD
    }

    pub fn has_declared_type(&self) -> bool {
        self.sql_type.is_declared()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_codes_round_trip() {
        for code in [0, 4, -5, 12, 2003, 2004] {
            assert_eq!(SqlType::from_code(code).unwrap().code(), code);
        }
        assert_eq!(SqlType::from_code(12345), None);
    }

    #[test]
    fn test_type_of_value() {
        assert_eq!(SqlType::of_value(&Value::Text("x".into())), SqlType::Varchar);
        assert_eq!(SqlType::of_value(&Value::Int64(1)), SqlType::BigInt);
        assert_eq!(SqlType::of_value(&Value::Null), SqlType::Unknown);
        assert_eq!(SqlType::of_value(&Value::List(vec![])), SqlType::Array);
    }

    #[test]
    fn test_display_label_and_name() {
        let plain = ColumnRole::Data.create("test", "people", "first_name", "fname");
        assert_eq!(plain.display_label(), "fname");
        assert_eq!(plain.display_name(), "first_name");

        let expr = Column::new(ColumnRole::Expression, "test", "people", "c1")
            .with_expression("year_of_birth + 1");
        assert_eq!(expr.display_label(), "c1");
        assert_eq!(expr.display_name(), "year_of_birth + 1");
    }
}
