// ============================================================================
// Transaction Management Module
// ============================================================================
//
// Declarative transactions over pooled connections. The outermost
// transactional call of a task borrows a connection, switches auto-commit
// off and installs the transaction in a task-local slot; nested calls find
// the slot occupied and run inside the same transaction.
//
// ============================================================================

pub mod connection;
pub mod context;
pub mod interceptor;
pub mod manager;
pub mod registry;
pub mod resolver;
pub mod state;

pub use connection::TransactionConnection;
pub use context::TransactionContext;
pub use interceptor::TransactionInterceptor;
pub use manager::{DEFAULT_MANAGER, ManagerStats, TransactionManager};
pub use registry::ManagerRegistry;
pub use resolver::ConnectionResolver;
pub use state::{TransactionId, TransactionState};
