use super::{TransactionConnection, TransactionContext, TransactionId};

/// Lets data-access code find the connection of the enclosing transaction.
///
/// `None` means no transaction is active for the calling task; the caller
/// should borrow its own connection and rely on auto-commit.
pub struct ConnectionResolver;

impl ConnectionResolver {
    pub fn current_connection() -> Option<TransactionConnection> {
        TransactionContext::get().map(|state| state.connection().clone())
    }

    /// Like [`ConnectionResolver::current_connection`], but only when the
    /// active transaction belongs to `manager`.
    pub fn current_connection_for(manager: &str) -> Option<TransactionConnection> {
        TransactionContext::get()
            .filter(|state| state.manager() == manager)
            .map(|state| state.connection().clone())
    }

    pub fn in_transaction() -> bool {
        TransactionContext::get().is_some()
    }

    pub fn current_transaction_id() -> Option<TransactionId> {
        TransactionContext::get().map(|state| state.id())
    }
}
