use crate::core::{Row, Value};
use std::fmt;

/// Statements understood by [`Connection::execute`](super::Connection::execute).
///
/// The first column of every table is its primary key.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    CreateTable { table: String, columns: Vec<String> },
    DropTable { table: String },
    Insert { table: String, values: Row },
    Delete { table: String, key: Value },
    Select { table: String, filter: Option<Filter> },
}

/// Equality predicate on a single column.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub column: String,
    pub value: Value,
}

impl Statement {
    pub fn create_table(table: impl Into<String>, columns: &[&str]) -> Self {
        Self::CreateTable {
            table: table.into(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
        }
    }

    pub fn drop_table(table: impl Into<String>) -> Self {
        Self::DropTable {
            table: table.into(),
        }
    }

    pub fn insert(table: impl Into<String>, values: Row) -> Self {
        Self::Insert {
            table: table.into(),
            values,
        }
    }

    pub fn delete(table: impl Into<String>, key: impl Into<Value>) -> Self {
        Self::Delete {
            table: table.into(),
            key: key.into(),
        }
    }

    pub fn select_all(table: impl Into<String>) -> Self {
        Self::Select {
            table: table.into(),
            filter: None,
        }
    }

    pub fn select_where(
        table: impl Into<String>,
        column: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        Self::Select {
            table: table.into(),
            filter: Some(Filter {
                column: column.into(),
                value: value.into(),
            }),
        }
    }

    pub fn table(&self) -> &str {
        match self {
            Self::CreateTable { table, .. }
            | Self::DropTable { table }
            | Self::Insert { table, .. }
            | Self::Delete { table, .. }
            | Self::Select { table, .. } => table,
        }
    }

    pub fn is_write(&self) -> bool {
        matches!(self, Self::Insert { .. } | Self::Delete { .. })
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CreateTable { table, columns } => {
                write!(f, "CREATE TABLE {} ({})", table, columns.join(", "))
            }
            Self::DropTable { table } => write!(f, "DROP TABLE {}", table),
            Self::Insert { table, values } => {
                let values: Vec<String> = values.iter().map(|v| v.to_string()).collect();
                write!(f, "INSERT INTO {} VALUES ({})", table, values.join(", "))
            }
            Self::Delete { table, key } => write!(f, "DELETE FROM {} WHERE <pk> = {}", table, key),
            Self::Select {
                table,
                filter: None,
            } => write!(f, "SELECT * FROM {}", table),
            Self::Select {
                table,
                filter: Some(filter),
            } => write!(
                f,
                "SELECT * FROM {} WHERE {} = {}",
                table, filter.column, filter.value
            ),
        }
    }
}
