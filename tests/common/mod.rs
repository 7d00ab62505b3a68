#![allow(dead_code)]

use memotx::{
    Connection, ConnectionPool, ConnectionSource, DbError, ManagerRegistry, PoolConfig,
    QueryResult, Result, Statement, TransactionInterceptor, TransactionManager,
};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// What a [`ScriptedSource`] and its connections observed, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Acquire(u64),
    SetAutoCommit(u64, bool),
    Execute(u64),
    Commit(u64),
    Rollback(u64),
    Release(u64),
}

/// Operations a scripted connection should fail.
#[derive(Debug, Default, Clone, Copy)]
pub struct Faults {
    pub begin: bool,
    pub commit: bool,
    pub rollback: bool,
    pub acquire: bool,
    /// Fail switching auto-commit back on
    pub restore: bool,
}

/// Connection source that records every call instead of touching a database.
pub struct ScriptedSource {
    faults: Faults,
    next_id: AtomicU64,
    outstanding: AtomicUsize,
    events: Arc<Mutex<Vec<Event>>>,
}

impl ScriptedSource {
    pub fn new() -> Arc<Self> {
        Self::with_faults(Faults::default())
    }

    pub fn with_faults(faults: Faults) -> Arc<Self> {
        Arc::new(Self {
            faults,
            next_id: AtomicU64::new(1),
            outstanding: AtomicUsize::new(0),
            events: Arc::new(Mutex::new(Vec::new())),
        })
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, matches: impl Fn(&Event) -> bool) -> usize {
        self.events().iter().filter(|e| matches(e)).count()
    }

    /// Connections acquired and not yet released.
    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl ConnectionSource for ScriptedSource {
    async fn acquire(&self) -> Result<Box<dyn Connection>> {
        if self.faults.acquire {
            return Err(DbError::ExecutionError("source unavailable".into()));
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.outstanding.fetch_add(1, Ordering::SeqCst);
        self.events.lock().unwrap().push(Event::Acquire(id));
        Ok(Box::new(ScriptedConnection {
            id,
            auto_commit: true,
            faults: self.faults,
            events: Arc::clone(&self.events),
        }))
    }

    async fn release(&self, connection: Box<dyn Connection>) -> Result<()> {
        self.outstanding.fetch_sub(1, Ordering::SeqCst);
        self.events
            .lock()
            .unwrap()
            .push(Event::Release(connection.id()));
        Ok(())
    }
}

struct ScriptedConnection {
    id: u64,
    auto_commit: bool,
    faults: Faults,
    events: Arc<Mutex<Vec<Event>>>,
}

impl ScriptedConnection {
    fn record(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }
}

#[async_trait::async_trait]
impl Connection for ScriptedConnection {
    fn id(&self) -> u64 {
        self.id
    }

    fn auto_commit(&self) -> bool {
        self.auto_commit
    }

    async fn set_auto_commit(&mut self, enabled: bool) -> Result<()> {
        if !enabled && self.faults.begin {
            return Err(DbError::ExecutionError("cannot begin".into()));
        }
        if enabled && self.faults.restore {
            return Err(DbError::ExecutionError("cannot restore auto-commit".into()));
        }
        self.record(Event::SetAutoCommit(self.id, enabled));
        self.auto_commit = enabled;
        Ok(())
    }

    async fn execute(&mut self, _statement: &Statement) -> Result<QueryResult> {
        self.record(Event::Execute(self.id));
        Ok(QueryResult::affected(1))
    }

    async fn commit(&mut self) -> Result<()> {
        self.record(Event::Commit(self.id));
        if self.faults.commit {
            return Err(DbError::ExecutionError("commit refused".into()));
        }
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        self.record(Event::Rollback(self.id));
        if self.faults.rollback {
            return Err(DbError::ExecutionError("rollback refused".into()));
        }
        Ok(())
    }
}

pub fn interceptor(source: Arc<ScriptedSource>) -> TransactionInterceptor {
    TransactionInterceptor::new(Arc::new(TransactionManager::new("default", source)))
}

/// Error type of the services used across the integration tests.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Db(#[from] DbError),
    #[error(transparent)]
    Tx(#[from] memotx::TxError),
    #[error("{0}")]
    Rejected(String),
}

/// Pool over a fresh database with `users(id, name)` and
/// `profiles(user_id, bio)`, registered as the default manager.
pub async fn user_database(max_connections: usize) -> (Arc<ConnectionPool>, ManagerRegistry) {
    let pool = Arc::new(
        ConnectionPool::new(PoolConfig::new("users").max_connections(max_connections))
            .await
            .unwrap(),
    );
    pool.database()
        .create_table("users", vec!["id".into(), "name".into()])
        .unwrap();
    pool.database()
        .create_table("profiles", vec!["user_id".into(), "bio".into()])
        .unwrap();

    let source: Arc<dyn ConnectionSource> = pool.clone();
    let registry = ManagerRegistry::new()
        .with_manager(memotx::DEFAULT_MANAGER, source)
        .unwrap();
    (pool, registry)
}
