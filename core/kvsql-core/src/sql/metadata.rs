//! Result-set metadata built from a column list.
//!
//! Indexes are 0-based and count visible columns only: HIDDEN columns stay in
//! [`ResultMetadata::columns`] for internal lookups but are skipped by every
//! positional accessor.

use crate::error::{KvsqlError, KvsqlResult};
use crate::sql::column::{Column, SqlType};

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResultMetadata {
    schema: Option<String>,
    table: Option<String>,
    columns: Vec<Column>,
    discovered: bool,
}

impl ResultMetadata {
    pub fn new(columns: Vec<Column>) -> Self {
        Self {
            schema: None,
            table: None,
            columns,
            discovered: false,
        }
    }

    /// Metadata of a set with no known columns
    pub fn empty(schema: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            schema: Some(schema.into()),
            table: Some(table.into()),
            columns: Vec::new(),
            discovered: false,
        }
    }

    pub(crate) fn discovered(mut self) -> Self {
        self.discovered = true;
        self
    }

    /// True when the column set was inferred from sampled records
    pub fn is_discovered(&self) -> bool {
        self.discovered
    }

    /// All columns including hidden ones
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn visible_columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter().filter(|c| !c.is_hidden())
    }

    pub fn column_count(&self) -> usize {
        self.visible_columns().count()
    }

    fn visible(&self, index: usize) -> KvsqlResult<&Column> {
        self.visible_columns()
            .nth(index)
            .ok_or_else(|| KvsqlError::ColumnNotFound(format!("#{index}")))
    }

    pub fn column_label(&self, index: usize) -> KvsqlResult<&str> {
        Ok(self.visible(index)?.display_label())
    }

    pub fn column_name(&self, index: usize) -> KvsqlResult<&str> {
        Ok(self.visible(index)?.display_name())
    }

    pub fn column_type(&self, index: usize) -> KvsqlResult<SqlType> {
        Ok(self.visible(index)?.sql_type)
    }

    pub fn column_type_name(&self, index: usize) -> KvsqlResult<&'static str> {
        Ok(self.column_type(index)?.name())
    }

    pub fn schema_name(&self, index: usize) -> KvsqlResult<&str> {
        if self.columns.is_empty() {
            return Ok(self.schema.as_deref().unwrap_or_default());
        }
        Ok(&self.visible(index)?.schema)
    }

    pub fn table_name(&self, index: usize) -> KvsqlResult<&str> {
        if self.columns.is_empty() {
            return Ok(self.table.as_deref().unwrap_or_default());
        }
        Ok(&self.visible(index)?.table)
    }

    /// Labels of visible columns in order
    pub fn labels(&self) -> Vec<&str> {
        self.visible_columns().map(Column::display_label).collect()
    }

    /// Index of the visible column whose label or name is `label`.
    pub fn find_column(&self, label: &str) -> KvsqlResult<usize> {
        self.visible_columns()
            .position(|c| c.display_label() == label || c.name == label)
            .ok_or_else(|| KvsqlError::ColumnNotFound(label.to_string()))
    }

    /// Any column by name, hidden ones included.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::column::ColumnRole;

    fn people_metadata() -> ResultMetadata {
        ResultMetadata::new(vec![
            ColumnRole::Data
                .create("test", "people", "first_name", "name")
                .with_type(SqlType::Varchar),
            ColumnRole::Hidden
                .create("test", "people", "id", "id")
                .with_type(SqlType::BigInt),
            ColumnRole::Data
                .create("test", "people", "year_of_birth", "year_of_birth")
                .with_type(SqlType::BigInt),
        ])
    }

    #[test]
    fn test_hidden_columns_are_not_visible() {
        let md = people_metadata();
        assert_eq!(md.column_count(), 2);
        assert_eq!(md.labels(), vec!["name", "year_of_birth"]);
        assert_eq!(md.column_name(1).unwrap(), "year_of_birth");
        assert!(md.find_column("id").is_err());
        assert_eq!(md.column("id").unwrap().sql_type, SqlType::BigInt);
    }

    #[test]
    fn test_find_column_by_label_or_name() {
        let md = people_metadata();
        assert_eq!(md.find_column("name").unwrap(), 0);
        assert_eq!(md.find_column("first_name").unwrap(), 0);
        assert!(matches!(
            md.find_column("age"),
            Err(KvsqlError::ColumnNotFound(label)) if label == "age"
        ));
    }

    #[test]
    fn test_out_of_range_index() {
        let md = people_metadata();
        assert!(md.column_label(2).is_err());
        assert_eq!(md.column_type_name(0).unwrap(), "VARCHAR");
    }

    #[test]
    fn test_empty_metadata_reports_table() {
        let md = ResultMetadata::empty("test", "people");
        assert_eq!(md.column_count(), 0);
        assert_eq!(md.table_name(0).unwrap(), "people");
        assert_eq!(md.schema_name(0).unwrap(), "test");
    }
}
