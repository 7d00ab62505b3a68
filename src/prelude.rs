//! Everything a transactional service needs in scope.
//!
//! ```ignore
//! use memotx::prelude::*;
//! ```

pub use crate::{
    ConnectionResolver, DbError, ProxyFactory, Statement, StatementExecutor, TransactionProxy,
    Transactional, TxError, Value, async_trait, transactional,
};
