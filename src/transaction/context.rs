use super::TransactionState;
use crate::core::{TxError, TxResult};
use std::cell::RefCell;
use std::future::Future;
use std::sync::Arc;

// One slot per task. It survives suspension points and is never visible to
// other tasks, including tasks spawned from inside a transaction.
tokio::task_local! {
    static CURRENT: RefCell<Option<Arc<TransactionState>>>;
}

/// Execution-scoped slot holding the transaction of the current call chain.
pub struct TransactionContext;

impl TransactionContext {
    /// The active transaction of the calling task, if any.
    pub fn get() -> Option<Arc<TransactionState>> {
        CURRENT
            .try_with(|slot| slot.borrow().clone())
            .ok()
            .flatten()
    }

    /// Installs `state` for the calling task.
    ///
    /// Fails with [`TxError::Reentrancy`] when a transaction is already
    /// installed and with [`TxError::ContextUnavailable`] outside of
    /// [`TransactionContext::scope`].
    pub fn set(state: Arc<TransactionState>) -> TxResult<()> {
        CURRENT
            .try_with(|slot| {
                let mut slot = slot.borrow_mut();
                if let Some(existing) = slot.as_ref() {
                    return Err(TxError::Reentrancy(existing.id()));
                }
                *slot = Some(state);
                Ok(())
            })
            .map_err(|_| TxError::ContextUnavailable)?
    }

    /// Removes the installed transaction, returning it.
    pub fn clear() -> Option<Arc<TransactionState>> {
        CURRENT
            .try_with(|slot| slot.borrow_mut().take())
            .ok()
            .flatten()
    }

    /// Whether the calling task runs inside a context scope.
    pub fn in_scope() -> bool {
        CURRENT.try_with(|_| ()).is_ok()
    }

    /// Runs `future` with a slot available, reusing the caller's slot when
    /// there already is one.
    pub async fn scope<F>(future: F) -> F::Output
    where
        F: Future,
    {
        if Self::in_scope() {
            future.await
        } else {
            CURRENT.scope(RefCell::new(None), future).await
        }
    }

    /// Runs `future` in a slot of its own, even inside an existing scope.
    ///
    /// The slot is only visible while `future` is polled, so futures polled
    /// side by side on one task (`join!`, `select!`) never see each other's
    /// transaction.
    pub(crate) async fn isolated<F>(future: F) -> F::Output
    where
        F: Future,
    {
        CURRENT.scope(RefCell::new(None), future).await
    }
}
