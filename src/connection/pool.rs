use super::{Connection, ConnectionSource, config::PoolConfig};
use crate::core::{DbError, Result};
use crate::storage::{MemoryConnection, MemoryDatabase};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Connection pool
///
/// Manages a bounded set of connections to one [`MemoryDatabase`]. Every
/// connection handed out is tracked until it comes back through
/// [`ConnectionSource::release`]; releasing a connection the pool does not
/// consider checked out is an error.
pub struct ConnectionPool {
    /// Pool configuration
    config: PoolConfig,
    /// Shared database instance
    db: Arc<MemoryDatabase>,
    inner: Mutex<PoolInner>,
    acquired: AtomicU64,
    released: AtomicU64,
}

struct PoolInner {
    /// Available connections
    available: VecDeque<PooledConnection>,
    /// Creation time of every connection currently handed out, by id
    checked_out: HashMap<u64, Instant>,
    /// Total number of live connections
    total: usize,
}

/// A connection resting in the pool
struct PooledConnection {
    connection: Box<dyn Connection>,
    created_at: Instant,
    last_used: Instant,
}

impl PooledConnection {
    fn new(connection: Box<dyn Connection>, created_at: Instant) -> Self {
        Self {
            connection,
            created_at,
            last_used: Instant::now(),
        }
    }

    fn is_expired(&self, max_lifetime: Option<Duration>) -> bool {
        if let Some(lifetime) = max_lifetime {
            self.created_at.elapsed() > lifetime
        } else {
            false
        }
    }

    fn is_idle_too_long(&self, idle_timeout: Option<Duration>) -> bool {
        if let Some(timeout) = idle_timeout {
            self.last_used.elapsed() > timeout
        } else {
            false
        }
    }
}

impl ConnectionPool {
    /// Create a new connection pool over a fresh database
    pub async fn new(config: PoolConfig) -> Result<Self> {
        Self::new_with_db(config, Arc::new(MemoryDatabase::new())).await
    }

    /// Create a new connection pool with a specific database instance
    pub async fn new_with_db(config: PoolConfig, db: Arc<MemoryDatabase>) -> Result<Self> {
        config.validate()?;

        let pool = Self {
            config,
            db,
            inner: Mutex::new(PoolInner {
                available: VecDeque::new(),
                checked_out: HashMap::new(),
                total: 0,
            }),
            acquired: AtomicU64::new(0),
            released: AtomicU64::new(0),
        };

        // Pre-create minimum connections
        pool.ensure_min_connections().await;

        Ok(pool)
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    pub fn database(&self) -> &Arc<MemoryDatabase> {
        &self.db
    }

    /// Get a connection from the pool, waiting up to `connect_timeout`
    pub async fn get_connection(&self) -> Result<Box<dyn Connection>> {
        let start = Instant::now();

        loop {
            if let Some(connection) = self.try_checkout().await {
                self.acquired.fetch_add(1, Ordering::SeqCst);
                debug!(
                    database = %self.config.database,
                    connection = connection.id(),
                    "connection acquired"
                );
                return Ok(connection);
            }

            // Check timeout
            if start.elapsed() > self.config.connect_timeout {
                return Err(DbError::PoolTimeout(self.config.connect_timeout));
            }

            // Wait a bit before retrying
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    /// Take an idle connection, or open a new one if under the limit
    async fn try_checkout(&self) -> Option<Box<dyn Connection>> {
        let mut inner = self.inner.lock().await;

        while let Some(pooled) = inner.available.pop_front() {
            if pooled.is_expired(self.config.max_lifetime)
                || pooled.is_idle_too_long(self.config.idle_timeout)
                || pooled.connection.is_closed()
            {
                inner.total -= 1;
                continue;
            }
            inner
                .checked_out
                .insert(pooled.connection.id(), pooled.created_at);
            return Some(pooled.connection);
        }

        if inner.total >= self.config.max_connections {
            return None;
        }

        let connection: Box<dyn Connection> =
            Box::new(MemoryConnection::new(Arc::clone(&self.db)));
        inner.total += 1;
        inner.checked_out.insert(connection.id(), Instant::now());
        Some(connection)
    }

    /// Return a connection, rolling back anything it left uncommitted
    pub async fn return_connection(&self, mut connection: Box<dyn Connection>) -> Result<()> {
        let id = connection.id();
        let created_at = {
            let mut inner = self.inner.lock().await;
            inner
                .checked_out
                .remove(&id)
                .ok_or(DbError::UnknownConnection(id))?
        };

        let mut reusable = !connection.is_closed();
        if reusable && !connection.auto_commit() {
            warn!(
                database = %self.config.database,
                connection = id,
                "connection returned inside a transaction; rolling back"
            );
            reusable = connection.rollback().await.is_ok()
                && connection.set_auto_commit(true).await.is_ok();
        }

        let mut inner = self.inner.lock().await;
        if reusable {
            inner
                .available
                .push_back(PooledConnection::new(connection, created_at));
        } else {
            inner.total -= 1;
        }
        self.released.fetch_add(1, Ordering::SeqCst);
        debug!(database = %self.config.database, connection = id, "connection released");

        Ok(())
    }

    /// Ensure minimum number of connections
    async fn ensure_min_connections(&self) {
        let mut inner = self.inner.lock().await;

        while inner.total < self.config.min_connections {
            let connection: Box<dyn Connection> =
                Box::new(MemoryConnection::new(Arc::clone(&self.db)));
            inner
                .available
                .push_back(PooledConnection::new(connection, Instant::now()));
            inner.total += 1;
        }
    }

    /// Get pool statistics
    pub async fn stats(&self) -> PoolStats {
        let inner = self.inner.lock().await;

        PoolStats {
            total_connections: inner.total,
            available_connections: inner.available.len(),
            active_connections: inner.checked_out.len(),
            max_connections: self.config.max_connections,
            acquired: self.acquired.load(Ordering::SeqCst),
            released: self.released.load(Ordering::SeqCst),
        }
    }
}

#[async_trait]
impl ConnectionSource for ConnectionPool {
    async fn acquire(&self) -> Result<Box<dyn Connection>> {
        self.get_connection().await
    }

    async fn release(&self, connection: Box<dyn Connection>) -> Result<()> {
        self.return_connection(connection).await
    }
}

/// Connection pool statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolStats {
    pub total_connections: usize,
    pub available_connections: usize,
    pub active_connections: usize,
    pub max_connections: usize,
    /// Connections handed out since the pool was created
    pub acquired: u64,
    /// Connections returned since the pool was created
    pub released: u64,
}

impl std::fmt::Display for PoolStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Pool Stats: {}/{} active, {} available, max {} ({} acquired, {} released)",
            self.active_connections,
            self.total_connections,
            self.available_connections,
            self.max_connections,
            self.acquired,
            self.released
        )
    }
}
