use super::Table;
use crate::core::{DbError, Result, Row, Value};
use std::collections::HashMap;
use std::sync::RwLock;

/// A write buffered by a connection that is not in auto-commit mode.
#[derive(Debug, Clone, PartialEq)]
pub enum PendingWrite {
    Insert { table: String, row: Row },
    Delete { table: String, key: Value },
}

impl PendingWrite {
    pub fn table(&self) -> &str {
        match self {
            Self::Insert { table, .. } | Self::Delete { table, .. } => table,
        }
    }

    /// Applies the write, returning the number of rows it touched.
    pub fn apply_to(&self, table: &mut Table) -> Result<usize> {
        match self {
            Self::Insert { row, .. } => table.insert(row.clone()).map(|_| 1),
            Self::Delete { key, .. } => Ok(usize::from(table.delete(key))),
        }
    }
}

/// Committed state shared by every connection of a pool.
#[derive(Debug, Default)]
pub struct MemoryDatabase {
    tables: RwLock<HashMap<String, Table>>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_table(&self, name: &str, columns: Vec<String>) -> Result<()> {
        let mut tables = self.tables.write()?;
        if tables.contains_key(name) {
            return Err(DbError::TableExists(name.to_string()));
        }
        tables.insert(name.to_string(), Table::new(name, columns)?);
        Ok(())
    }

    pub fn drop_table(&self, name: &str) -> Result<()> {
        let mut tables = self.tables.write()?;
        tables
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| DbError::TableNotFound(name.to_string()))
    }

    pub fn table_names(&self) -> Result<Vec<String>> {
        let tables = self.tables.read()?;
        let mut names: Vec<String> = tables.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    /// Copy of the committed table.
    pub fn snapshot(&self, name: &str) -> Result<Table> {
        let tables = self.tables.read()?;
        tables
            .get(name)
            .cloned()
            .ok_or_else(|| DbError::TableNotFound(name.to_string()))
    }

    pub fn row_count(&self, name: &str) -> Result<usize> {
        let tables = self.tables.read()?;
        tables
            .get(name)
            .map(Table::len)
            .ok_or_else(|| DbError::TableNotFound(name.to_string()))
    }

    /// Applies a batch of writes atomically.
    ///
    /// Every write is validated against the committed state as it stands now;
    /// if any of them fails nothing is applied.
    pub fn apply(&self, writes: &[PendingWrite]) -> Result<usize> {
        let mut tables = self.tables.write()?;

        let mut staged: HashMap<&str, Table> = HashMap::new();
        let mut affected = 0;
        for write in writes {
            let name = write.table();
            if !staged.contains_key(name) {
                let table = tables
                    .get(name)
                    .cloned()
                    .ok_or_else(|| DbError::TableNotFound(name.to_string()))?;
                staged.insert(name, table);
            }
            if let Some(table) = staged.get_mut(name) {
                affected += write.apply_to(table)?;
            }
        }

        for (name, table) in staged {
            tables.insert(name.to_string(), table);
        }

        Ok(affected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn db_with_users() -> MemoryDatabase {
        let db = MemoryDatabase::new();
        db.create_table("users", vec!["id".into(), "name".into()])
            .unwrap();
        db
    }

    #[test]
    fn test_create_table_twice() {
        let db = db_with_users();
        let err = db.create_table("users", vec!["id".into()]).unwrap_err();
        assert!(matches!(err, DbError::TableExists(_)));
        assert_eq!(db.table_names().unwrap(), vec!["users".to_string()]);
    }

    #[test]
    fn test_apply_is_atomic() {
        let db = db_with_users();
        let writes = vec![
            PendingWrite::Insert {
                table: "users".into(),
                row: vec![Value::from(1), Value::from("alice")],
            },
            PendingWrite::Insert {
                table: "users".into(),
                row: vec![Value::from(1), Value::from("duplicate")],
            },
        ];

        let err = db.apply(&writes).unwrap_err();
        assert!(matches!(err, DbError::ConstraintViolation(_)));
        assert_eq!(db.row_count("users").unwrap(), 0);
    }

    #[test]
    fn test_apply_counts_deletes() {
        let db = db_with_users();
        db.apply(&[PendingWrite::Insert {
            table: "users".into(),
            row: vec![Value::from(1), Value::from("alice")],
        }])
        .unwrap();

        let affected = db
            .apply(&[
                PendingWrite::Delete {
                    table: "users".into(),
                    key: Value::from(1),
                },
                PendingWrite::Delete {
                    table: "users".into(),
                    key: Value::from(2),
                },
            ])
            .unwrap();

        assert_eq!(affected, 1);
        assert_eq!(db.row_count("users").unwrap(), 0);
    }
}
