use crate::connection::{ConnectionPool, ConnectionSource, PoolConfig};
use crate::core::{TxError, TxResult};
use crate::transaction::{DEFAULT_MANAGER, ManagerRegistry};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

/// One transaction manager and the pool it draws connections from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManagerConfig {
    #[serde(default = "default_manager_name")]
    pub name: String,
    #[serde(default)]
    pub pool: PoolConfig,
}

fn default_manager_name() -> String {
    DEFAULT_MANAGER.to_string()
}

impl ManagerConfig {
    pub fn new(name: &str, pool: PoolConfig) -> Self {
        Self {
            name: name.to_string(),
            pool,
        }
    }
}

/// Startup configuration for the transaction managers of a process.
///
/// ```json
/// { "managers": [ { "name": "default", "pool": { "max_connections": 8 } } ] }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionConfig {
    pub managers: Vec<ManagerConfig>,
}

impl Default for TransactionConfig {
    fn default() -> Self {
        Self {
            managers: vec![ManagerConfig::new(DEFAULT_MANAGER, PoolConfig::default())],
        }
    }
}

impl TransactionConfig {
    pub fn from_json(json: &str) -> TxResult<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| TxError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> TxResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| TxError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&json)
    }

    pub fn validate(&self) -> TxResult<()> {
        if self.managers.is_empty() {
            return Err(TxError::Config("at least one manager is required".into()));
        }

        let mut seen = HashSet::new();
        for manager in &self.managers {
            if !seen.insert(manager.name.as_str()) {
                return Err(TxError::DuplicateManager(manager.name.clone()));
            }
            manager
                .pool
                .validate()
                .map_err(|e| TxError::Config(format!("manager '{}': {}", manager.name, e)))?;
        }

        Ok(())
    }

    /// Opens one pool per manager and registers them.
    ///
    /// The pools are returned next to the registry, in configuration order,
    /// so callers can inspect them.
    pub async fn open(&self) -> TxResult<(ManagerRegistry, Vec<Arc<ConnectionPool>>)> {
        self.validate()?;

        let mut registry = ManagerRegistry::new();
        let mut pools = Vec::with_capacity(self.managers.len());
        for manager in &self.managers {
            let pool = Arc::new(
                ConnectionPool::new(manager.pool.clone())
                    .await
                    .map_err(|e| TxError::Config(e.to_string()))?,
            );
            let source: Arc<dyn ConnectionSource> = pool.clone();
            registry.register(&manager.name, source)?;
            pools.push(pool);
        }

        Ok((registry, pools))
    }
}
