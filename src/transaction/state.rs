// ============================================================================
// Transaction State
// ============================================================================
//
// One open transaction: the borrowed connection and the auto-commit flag it
// had before the transaction started. Created by the outermost transactional
// call of a task and dropped when that call finishes.
//
// ============================================================================

use super::TransactionConnection;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Global transaction ID counter
static NEXT_TXN_ID: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransactionId(pub u64);

impl TransactionId {
    /// Generate a new unique transaction ID
    pub fn new() -> Self {
        TransactionId(NEXT_TXN_ID.fetch_add(1, Ordering::SeqCst))
    }

    /// Get the raw ID value
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for TransactionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TransactionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "txn_{}", self.0)
    }
}

#[derive(Debug)]
pub struct TransactionState {
    id: TransactionId,
    manager: String,
    connection: TransactionConnection,
    prior_auto_commit: bool,
    started_at: Instant,
}

impl TransactionState {
    pub fn new(manager: &str, connection: TransactionConnection, prior_auto_commit: bool) -> Self {
        Self {
            id: connection.transaction_id(),
            manager: manager.to_string(),
            connection,
            prior_auto_commit,
            started_at: Instant::now(),
        }
    }

    pub fn id(&self) -> TransactionId {
        self.id
    }

    /// Name of the transaction manager that opened this transaction.
    pub fn manager(&self) -> &str {
        &self.manager
    }

    pub fn connection(&self) -> &TransactionConnection {
        &self.connection
    }

    pub fn prior_auto_commit(&self) -> bool {
        self.prior_auto_commit
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }
}
