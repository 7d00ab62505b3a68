// ============================================================================
// memotx: declarative transactions over pooled connections
// ============================================================================
//
// A service type opts in with `#[derive(Transactional)]`, its capability trait
// with `#[transactional]`. Instances handed out by the `ProxyFactory` wrap every
// async method in begin/commit/rollback; nested calls on the same task join the
// open transaction and reach its connection through `ConnectionResolver`.
//
// ```ignore
// #[transactional]
// #[async_trait]
// pub trait Accounts: Send + Sync {
//     async fn open(&self, id: i64) -> Result<(), AppError>;
// }
//
// #[derive(Transactional)]
// struct AccountsImpl { executor: StatementExecutor }
//
// let factory = ProxyFactory::builder(registry).component::<AccountsImpl>().build()?;
// let accounts: Arc<dyn Accounts> = Arc::new(factory.create(AccountsImpl { .. })?);
// ```
//
// ============================================================================

extern crate self as memotx;

pub mod config;
pub mod connection;
pub mod core;
pub mod executor;
pub mod prelude;
pub mod proxy;
pub mod result;
pub mod storage;
pub mod transaction;

pub use async_trait::async_trait;
pub use memotx_derive::{Transactional, transactional};

pub use config::{ManagerConfig, TransactionConfig};
pub use connection::{
    Connection, ConnectionLease, ConnectionPool, ConnectionSource, Filter, PoolConfig, PoolStats,
    Statement,
};
pub use core::{DbError, Result, Row, TxError, TxResult, Value};
pub use executor::StatementExecutor;
pub use proxy::{ProxyFactory, ProxyFactoryBuilder, TransactionMarker, TransactionProxy};
pub use result::QueryResult;
pub use storage::{MemoryConnection, MemoryDatabase};
pub use transaction::{
    ConnectionResolver, DEFAULT_MANAGER, ManagerRegistry, ManagerStats, TransactionConnection,
    TransactionContext, TransactionId, TransactionInterceptor, TransactionManager,
    TransactionState,
};

// The derive macro and the trait share the name `Transactional`, like serde's
// `Serialize`.
pub use proxy::Transactional;
