use super::{
    TransactionConnection, TransactionContext, TransactionId, TransactionManager, TransactionState,
};
use crate::core::TxError;
use std::error::Error as StdError;
use std::future::Future;
use std::sync::Arc;
use tracing::{Instrument, debug, error, info_span, warn};

/// Wraps calls in a transaction of one [`TransactionManager`].
///
/// The first intercepted call of a task opens the transaction and decides its
/// fate: commit when the call returns `Ok`, rollback when it returns `Err`.
/// Intercepted calls made while that transaction is open run as plain calls.
#[derive(Clone, Debug)]
pub struct TransactionInterceptor {
    manager: Arc<TransactionManager>,
}

impl TransactionInterceptor {
    pub fn new(manager: Arc<TransactionManager>) -> Self {
        Self { manager }
    }

    pub fn manager(&self) -> &Arc<TransactionManager> {
        &self.manager
    }

    /// Drives `call` inside a transaction, joining the task's open
    /// transaction if there is one.
    ///
    /// Errors returned by `call` in an outermost transaction come back as
    /// [`TxError::Transaction`] converted into `E`, with the original error
    /// as its source.
    pub async fn invoke<F, T, E>(&self, call: F) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>,
        E: From<TxError> + StdError + Send + Sync + 'static,
    {
        if let Some(state) = TransactionContext::get() {
            if state.manager() != self.manager.name() {
                warn!(
                    transaction = %state.id(),
                    active_manager = state.manager(),
                    manager = self.manager.name(),
                    "joining a transaction opened by another manager"
                );
            }
            self.manager.record_join();
            debug!(transaction = %state.id(), "joining active transaction");
            return call.await;
        }

        let id = TransactionId::new();
        let span = info_span!("transaction", manager = self.manager.name(), id = %id);
        TransactionContext::isolated(self.run_outermost(id, call))
            .instrument(span)
            .await
    }

    async fn run_outermost<F, T, E>(&self, id: TransactionId, call: F) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>,
        E: From<TxError> + StdError + Send + Sync + 'static,
    {
        let mut lease = self.manager.lease().await?;
        let prior_auto_commit = match lease.begin().await {
            Ok(prior) => prior,
            Err(source) => {
                if let Err(err) = lease.release().await {
                    warn!(error = %err, "failed to release connection after begin failure");
                }
                return Err(TxError::Begin { source }.into());
            }
        };

        let connection = TransactionConnection::new(id, lease);
        let state = Arc::new(TransactionState::new(
            self.manager.name(),
            connection.clone(),
            prior_auto_commit,
        ));
        TransactionContext::set(Arc::clone(&state))?;
        self.manager.record_begin();
        debug!(connection = connection.id(), "transaction started");

        let result = match call.await {
            Ok(value) => match connection.commit().await {
                Ok(()) => {
                    self.manager.record_commit();
                    let elapsed_ms = state.elapsed().as_millis() as u64;
                    debug!(elapsed_ms, "transaction committed");
                    Ok(value)
                }
                Err(source) => {
                    self.manager.record_rollback();
                    error!(error = %source, "commit failed");
                    // Discard whatever the failed commit left behind so
                    // restoring auto-commit cannot apply it.
                    if let Err(err) = connection.rollback().await {
                        warn!(error = %err, "rollback after failed commit failed");
                    }
                    Err(TxError::Commit { source }.into())
                }
            },
            Err(err) => {
                let rollback_failure = connection.rollback().await.err();
                self.manager.record_rollback();
                match &rollback_failure {
                    Some(failure) => error!(
                        error = %err,
                        rollback_error = %failure,
                        "rollback failed"
                    ),
                    None => debug!(error = %err, "transaction rolled back"),
                }
                Err(TxError::rolled_back(err, rollback_failure).into())
            }
        };

        TransactionContext::clear();
        drop(state);
        if let Some(lease) = connection.take().await {
            if let Err(err) = lease.release().await {
                warn!(error = %err, "failed to release connection");
            }
        }

        result
    }
}
