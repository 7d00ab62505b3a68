use crate::transaction::TransactionId;
use std::error::Error as StdError;
use thiserror::Error;

/// Failures raised by connections, the pool and the in-memory database.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("Table '{0}' already exists")]
    TableExists(String),

    #[error("Table '{0}' not found")]
    TableNotFound(String),

    #[error("Column '{0}' not found in table '{1}'")]
    ColumnNotFound(String, String),

    #[error("Table '{table}' expects {expected} values, got {actual}")]
    ColumnCount {
        table: String,
        expected: usize,
        actual: usize,
    },

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Connection {0} is closed")]
    ConnectionClosed(u64),

    #[error("Connection pool timeout: no connections available after {0:?}")]
    PoolTimeout(std::time::Duration),

    #[error("Connection {0} does not belong to this pool or was already released")]
    UnknownConnection(u64),

    #[error("Transaction {0} has already completed")]
    TransactionCompleted(TransactionId),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Execution error: {0}")]
    ExecutionError(String),

    #[error("Lock error: {0}")]
    LockError(String),
}

pub type Result<T> = std::result::Result<T, DbError>;

impl<T> From<std::sync::PoisonError<T>> for DbError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::LockError(err.to_string())
    }
}

/// Failures of the transaction subsystem itself.
///
/// Business errors raised inside an outermost transactional call come back as
/// [`TxError::Transaction`], which keeps the original error as its `source`.
#[derive(Error, Debug)]
pub enum TxError {
    #[error("failed to acquire a connection from transaction manager '{manager}'")]
    ConnectionAcquisition {
        manager: String,
        #[source]
        source: DbError,
    },

    #[error("failed to begin transaction")]
    Begin {
        #[source]
        source: DbError,
    },

    #[error("transaction rolled back: {source}")]
    Transaction {
        source: Box<dyn StdError + Send + Sync + 'static>,
        rollback_failure: Option<DbError>,
    },

    #[error("failed to commit transaction")]
    Commit {
        #[source]
        source: DbError,
    },

    #[error("transaction {0} is already installed for this task")]
    Reentrancy(TransactionId),

    #[error("no transaction context is available for this task")]
    ContextUnavailable,

    #[error("transaction manager '{0}' is not registered")]
    UnknownManager(String),

    #[error("transaction manager '{0}' is already registered")]
    DuplicateManager(String),

    #[error("type '{0}' was not registered with the proxy factory")]
    NotRegistered(&'static str),

    #[error("configuration error: {0}")]
    Config(String),
}

pub type TxResult<T> = std::result::Result<T, TxError>;

impl TxError {
    /// Wraps a business failure together with the outcome of its rollback.
    pub fn rolled_back<E>(source: E, rollback_failure: Option<DbError>) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self::Transaction {
            source: Box::new(source),
            rollback_failure,
        }
    }

    /// The rollback failure recorded next to the primary cause, if any.
    pub fn suppressed(&self) -> Option<&DbError> {
        match self {
            Self::Transaction {
                rollback_failure, ..
            } => rollback_failure.as_ref(),
            _ => None,
        }
    }

    /// Downcasts the business failure that triggered the rollback.
    pub fn business_error<E>(&self) -> Option<&E>
    where
        E: StdError + 'static,
    {
        match self {
            Self::Transaction { source, .. } => source.downcast_ref::<E>(),
            _ => None,
        }
    }

    /// Last error in the `source` chain.
    pub fn root_cause(&self) -> &(dyn StdError + 'static) {
        let mut current: &(dyn StdError + 'static) = self;
        while let Some(next) = current.source() {
            current = next;
        }
        current
    }

    pub fn is_rollback(&self) -> bool {
        matches!(self, Self::Transaction { .. })
    }
}
