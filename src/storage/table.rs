use crate::core::{DbError, Result, Row, Value};
use std::collections::BTreeMap;

/// Rows keyed by their first column.
#[derive(Debug, Clone)]
pub struct Table {
    name: String,
    columns: Vec<String>,
    rows: BTreeMap<Value, Row>,
}

impl Table {
    pub fn new(name: impl Into<String>, columns: Vec<String>) -> Result<Self> {
        let name = name.into();
        if columns.is_empty() {
            return Err(DbError::ExecutionError(format!(
                "Table '{}' needs at least one column",
                name
            )));
        }

        Ok(Self {
            name,
            columns,
            rows: BTreeMap::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn contains(&self, key: &Value) -> bool {
        self.rows.contains_key(key)
    }

    pub fn insert(&mut self, row: Row) -> Result<()> {
        self.validate_row(&row)?;

        let key = row[0].clone();
        if self.rows.contains_key(&key) {
            return Err(DbError::ConstraintViolation(format!(
                "duplicate primary key {} in table '{}'",
                key, self.name
            )));
        }

        self.rows.insert(key, row);
        Ok(())
    }

    pub fn delete(&mut self, key: &Value) -> bool {
        self.rows.remove(key).is_some()
    }

    /// Rows matching `column = value`, or every row when no column is given.
    pub fn select(&self, filter: Option<(&str, &Value)>) -> Result<Vec<Row>> {
        let Some((column, value)) = filter else {
            return Ok(self.rows.values().cloned().collect());
        };

        let index = self
            .columns
            .iter()
            .position(|c| c == column)
            .ok_or_else(|| DbError::ColumnNotFound(column.to_string(), self.name.clone()))?;

        Ok(self
            .rows
            .values()
            .filter(|row| &row[index] == value)
            .cloned()
            .collect())
    }

    fn validate_row(&self, row: &Row) -> Result<()> {
        if row.len() != self.columns.len() {
            return Err(DbError::ColumnCount {
                table: self.name.clone(),
                expected: self.columns.len(),
                actual: row.len(),
            });
        }

        if row[0].is_null() {
            return Err(DbError::ConstraintViolation(format!(
                "primary key '{}' cannot be NULL",
                self.columns[0]
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn users() -> Table {
        Table::new("users", vec!["id".into(), "name".into()]).unwrap()
    }

    #[test]
    fn test_insert_and_select() {
        let mut table = users();
        table.insert(vec![Value::from(1), Value::from("alice")]).unwrap();
        table.insert(vec![Value::from(2), Value::from("bob")]).unwrap();

        assert_eq!(table.len(), 2);
        let rows = table.select(Some(("name", &Value::from("bob")))).unwrap();
        assert_eq!(rows, vec![vec![Value::from(2), Value::from("bob")]]);
    }

    #[test]
    fn test_primary_key_constraints() {
        let mut table = users();
        table.insert(vec![Value::from(1), Value::from("alice")]).unwrap();

        let err = table.insert(vec![Value::from(1), Value::from("again")]).unwrap_err();
        assert!(matches!(err, DbError::ConstraintViolation(_)));

        let err = table.insert(vec![Value::Null, Value::from("nobody")]).unwrap_err();
        assert!(matches!(err, DbError::ConstraintViolation(_)));

        let err = table.insert(vec![Value::from(3)]).unwrap_err();
        assert!(matches!(err, DbError::ColumnCount { expected: 2, actual: 1, .. }));
    }

    #[test]
    fn test_unknown_filter_column() {
        let table = users();
        let err = table.select(Some(("email", &Value::Null))).unwrap_err();
        assert!(matches!(err, DbError::ColumnNotFound(..)));
    }
}
