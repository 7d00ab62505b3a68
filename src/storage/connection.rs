use super::{MemoryDatabase, PendingWrite, Table};
use crate::connection::{Connection, Statement};
use crate::core::{DbError, Result};
use crate::result::QueryResult;
use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Connection to a [`MemoryDatabase`].
///
/// In auto-commit mode writes go straight to the shared database. Otherwise
/// they are buffered here, visible to this connection only, and applied in one
/// batch on commit. Table creation and removal always apply immediately.
pub struct MemoryConnection {
    id: u64,
    db: Arc<MemoryDatabase>,
    auto_commit: bool,
    pending: Vec<PendingWrite>,
    closed: bool,
}

impl MemoryConnection {
    pub fn new(db: Arc<MemoryDatabase>) -> Self {
        Self {
            id: NEXT_CONNECTION_ID.fetch_add(1, Ordering::SeqCst),
            db,
            auto_commit: true,
            pending: Vec::new(),
            closed: false,
        }
    }

    pub fn pending_writes(&self) -> usize {
        self.pending.len()
    }

    /// Close the connection, discarding uncommitted writes
    pub fn close(&mut self) {
        self.pending.clear();
        self.closed = true;
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(DbError::ConnectionClosed(self.id));
        }
        Ok(())
    }

    /// The committed table with this connection's pending writes laid over it.
    fn view(&self, name: &str) -> Result<Table> {
        let mut table = self.db.snapshot(name)?;
        for write in self.pending.iter().filter(|w| w.table() == name) {
            write.apply_to(&mut table)?;
        }
        Ok(table)
    }

    fn write(&mut self, write: PendingWrite) -> Result<QueryResult> {
        if self.auto_commit {
            let affected = self.db.apply(std::slice::from_ref(&write))?;
            return Ok(QueryResult::affected(affected));
        }

        // Validate against what this connection currently sees so constraint
        // violations surface at the statement, not at commit.
        let mut view = self.view(write.table())?;
        let affected = write.apply_to(&mut view)?;
        if affected > 0 {
            self.pending.push(write);
        }
        Ok(QueryResult::affected(affected))
    }
}

#[async_trait]
impl Connection for MemoryConnection {
    fn id(&self) -> u64 {
        self.id
    }

    fn auto_commit(&self) -> bool {
        self.auto_commit
    }

    async fn set_auto_commit(&mut self, enabled: bool) -> Result<()> {
        self.ensure_open()?;
        if enabled && !self.auto_commit {
            self.commit().await?;
        }
        self.auto_commit = enabled;
        Ok(())
    }

    async fn execute(&mut self, statement: &Statement) -> Result<QueryResult> {
        self.ensure_open()?;

        match statement {
            Statement::CreateTable { table, columns } => {
                self.db.create_table(table, columns.clone())?;
                Ok(QueryResult::empty())
            }
            Statement::DropTable { table } => {
                self.db.drop_table(table)?;
                self.pending.retain(|w| w.table() != table);
                Ok(QueryResult::empty())
            }
            Statement::Insert { table, values } => self.write(PendingWrite::Insert {
                table: table.clone(),
                row: values.clone(),
            }),
            Statement::Delete { table, key } => self.write(PendingWrite::Delete {
                table: table.clone(),
                key: key.clone(),
            }),
            Statement::Select { table, filter } => {
                let view = self.view(table)?;
                let rows = view.select(filter.as_ref().map(|f| (f.column.as_str(), &f.value)))?;
                Ok(QueryResult::new(view.columns().to_vec(), rows))
            }
        }
    }

    async fn commit(&mut self) -> Result<()> {
        self.ensure_open()?;
        if self.pending.is_empty() {
            return Ok(());
        }

        let writes = std::mem::take(&mut self.pending);
        self.db.apply(&writes)?;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.pending.clear();
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}
