use super::TransactionId;
use crate::connection::{ConnectionLease, Statement};
use crate::core::{DbError, Result};
use crate::result::QueryResult;
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Handle to the connection owned by an open transaction.
///
/// Clones share the same connection; statements issued through any of them
/// run one at a time. Once the transaction completes the handle refuses
/// further statements with [`DbError::TransactionCompleted`].
#[derive(Clone)]
pub struct TransactionConnection {
    transaction: TransactionId,
    connection_id: u64,
    lease: Arc<Mutex<Option<ConnectionLease>>>,
}

impl TransactionConnection {
    pub(crate) fn new(transaction: TransactionId, lease: ConnectionLease) -> Self {
        Self {
            transaction,
            connection_id: lease.id(),
            lease: Arc::new(Mutex::new(Some(lease))),
        }
    }

    /// Id of the underlying connection.
    pub fn id(&self) -> u64 {
        self.connection_id
    }

    pub fn transaction_id(&self) -> TransactionId {
        self.transaction
    }

    /// Whether both handles refer to the same borrowed connection.
    pub fn same_connection(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.lease, &other.lease)
    }

    pub async fn execute(&self, statement: &Statement) -> Result<QueryResult> {
        let mut guard = self.lease.lock().await;
        let lease = guard
            .as_mut()
            .ok_or(DbError::TransactionCompleted(self.transaction))?;
        lease.connection().execute(statement).await
    }

    pub(crate) async fn commit(&self) -> Result<()> {
        let mut guard = self.lease.lock().await;
        let lease = guard
            .as_mut()
            .ok_or(DbError::TransactionCompleted(self.transaction))?;
        lease.connection().commit().await
    }

    pub(crate) async fn rollback(&self) -> Result<()> {
        let mut guard = self.lease.lock().await;
        let lease = guard
            .as_mut()
            .ok_or(DbError::TransactionCompleted(self.transaction))?;
        lease.connection().rollback().await
    }

    /// Detaches the lease so it can be released; later statements fail.
    pub(crate) async fn take(&self) -> Option<ConnectionLease> {
        self.lease.lock().await.take()
    }
}

impl fmt::Debug for TransactionConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionConnection")
            .field("transaction", &self.transaction)
            .field("connection_id", &self.connection_id)
            .finish()
    }
}
