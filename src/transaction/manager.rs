// ============================================================================
// Transaction Manager
// ============================================================================

use crate::connection::{ConnectionLease, ConnectionSource};
use crate::core::{TxError, TxResult};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Name of the manager used by types that do not pick one.
pub const DEFAULT_MANAGER: &str = "default";

/// A named transaction manager wrapping one connection source.
pub struct TransactionManager {
    name: String,
    source: Arc<dyn ConnectionSource>,
    begun: AtomicU64,
    committed: AtomicU64,
    rolled_back: AtomicU64,
    joined: AtomicU64,
}

impl TransactionManager {
    pub fn new(name: &str, source: Arc<dyn ConnectionSource>) -> Self {
        Self {
            name: name.to_string(),
            source,
            begun: AtomicU64::new(0),
            committed: AtomicU64::new(0),
            rolled_back: AtomicU64::new(0),
            joined: AtomicU64::new(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &Arc<dyn ConnectionSource> {
        &self.source
    }

    /// Borrows a connection from the source.
    pub async fn lease(&self) -> TxResult<ConnectionLease> {
        ConnectionLease::acquire(Arc::clone(&self.source))
            .await
            .map_err(|source| TxError::ConnectionAcquisition {
                manager: self.name.clone(),
                source,
            })
    }

    pub fn stats(&self) -> ManagerStats {
        ManagerStats {
            begun: self.begun.load(Ordering::SeqCst),
            committed: self.committed.load(Ordering::SeqCst),
            rolled_back: self.rolled_back.load(Ordering::SeqCst),
            joined: self.joined.load(Ordering::SeqCst),
        }
    }

    pub(crate) fn record_begin(&self) {
        self.begun.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn record_commit(&self) {
        self.committed.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn record_rollback(&self) {
        self.rolled_back.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn record_join(&self) {
        self.joined.fetch_add(1, Ordering::SeqCst);
    }
}

impl fmt::Debug for TransactionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionManager")
            .field("name", &self.name)
            .field("stats", &self.stats())
            .finish()
    }
}

/// Counters of a [`TransactionManager`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ManagerStats {
    /// Outermost transactions opened
    pub begun: u64,
    pub committed: u64,
    /// Includes transactions whose commit failed
    pub rolled_back: u64,
    /// Calls that ran inside an already open transaction
    pub joined: u64,
}

impl fmt::Display for ManagerStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} begun, {} committed, {} rolled back, {} joined",
            self.begun, self.committed, self.rolled_back, self.joined
        )
    }
}
