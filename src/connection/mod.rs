pub mod config;
pub mod lease;
pub mod pool;
pub mod statement;

use crate::core::Result;
use crate::result::QueryResult;
use async_trait::async_trait;

pub use config::PoolConfig;
pub use lease::ConnectionLease;
pub use pool::{ConnectionPool, PoolStats};
pub use statement::{Filter, Statement};

/// One database session.
///
/// A connection starts in auto-commit mode, where every write is applied as
/// soon as it executes. With auto-commit off, writes are held until
/// [`Connection::commit`] or discarded by [`Connection::rollback`]. Switching
/// auto-commit back on commits anything still pending.
#[async_trait]
pub trait Connection: Send {
    /// Identifier, unique for the lifetime of the process.
    fn id(&self) -> u64;

    fn auto_commit(&self) -> bool;

    async fn set_auto_commit(&mut self, enabled: bool) -> Result<()>;

    async fn execute(&mut self, statement: &Statement) -> Result<QueryResult>;

    async fn commit(&mut self) -> Result<()>;

    async fn rollback(&mut self) -> Result<()>;

    fn is_closed(&self) -> bool {
        false
    }
}

/// Hands out connections and takes them back.
///
/// Implementations are shared between every call chain of the process and
/// must be safe to use concurrently. `release` must be called exactly once
/// per acquired connection.
#[async_trait]
pub trait ConnectionSource: Send + Sync {
    async fn acquire(&self) -> Result<Box<dyn Connection>>;

    async fn release(&self, connection: Box<dyn Connection>) -> Result<()>;
}
