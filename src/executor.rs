use crate::connection::{ConnectionLease, Statement};
use crate::core::{Result, Row};
use crate::result::QueryResult;
use crate::transaction::{ConnectionResolver, TransactionManager};
use std::sync::Arc;
use tracing::{trace, warn};

/// Runs single statements for data-access code.
///
/// Inside a transaction of its manager the statement goes through the
/// transaction's connection. Outside one it borrows a connection for just
/// that statement and relies on auto-commit.
#[derive(Clone, Debug)]
pub struct StatementExecutor {
    manager: Arc<TransactionManager>,
}

impl StatementExecutor {
    pub fn new(manager: Arc<TransactionManager>) -> Self {
        Self { manager }
    }

    pub fn manager(&self) -> &Arc<TransactionManager> {
        &self.manager
    }

    pub async fn execute(&self, statement: &Statement) -> Result<QueryResult> {
        if let Some(connection) = ConnectionResolver::current_connection_for(self.manager.name()) {
            trace!(
                transaction = %connection.transaction_id(),
                statement = %statement,
                "executing in transaction"
            );
            return connection.execute(statement).await;
        }

        trace!(statement = %statement, "executing with auto-commit");
        let mut lease = ConnectionLease::acquire(Arc::clone(self.manager.source())).await?;
        let result = lease.connection().execute(statement).await;
        if let Err(err) = lease.release().await {
            warn!(error = %err, "failed to release connection");
            if result.is_ok() {
                return Err(err);
            }
        }
        result
    }

    /// Rows returned by a `Select`.
    pub async fn query(&self, statement: &Statement) -> Result<Vec<Row>> {
        self.execute(statement).await.map(|r| r.rows)
    }

    /// Rows written by an `Insert` or `Delete`.
    pub async fn update(&self, statement: &Statement) -> Result<usize> {
        self.execute(statement).await.map(|r| r.affected)
    }
}
