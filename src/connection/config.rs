use crate::core::{DbError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Connection pool configuration
///
/// Durations are (de)serialized as milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Database name, used in logs
    pub database: String,

    /// Maximum number of connections in pool
    pub max_connections: usize,

    /// Minimum number of connections in pool
    pub min_connections: usize,

    /// How long `acquire` waits for a free connection
    #[serde(rename = "connect_timeout_ms", with = "millis")]
    pub connect_timeout: Duration,

    /// Connection idle timeout
    #[serde(rename = "idle_timeout_ms", with = "opt_millis")]
    pub idle_timeout: Option<Duration>,

    /// Maximum connection lifetime
    #[serde(rename = "max_lifetime_ms", with = "opt_millis")]
    pub max_lifetime: Option<Duration>,
}

impl PoolConfig {
    pub fn new(database: &str) -> Self {
        Self {
            database: database.to_string(),
            connect_timeout: Duration::from_secs(30),
            max_connections: 10,
            min_connections: 1,
            idle_timeout: Some(Duration::from_secs(600)), // 10 minutes
            max_lifetime: Some(Duration::from_secs(1800)), // 30 minutes
        }
    }

    /// Set the database name
    pub fn database(mut self, database: &str) -> Self {
        self.database = database.to_string();
        self
    }

    /// Set connection timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set maximum connections
    pub fn max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Set minimum connections
    pub fn min_connections(mut self, min: usize) -> Self {
        self.min_connections = min;
        self
    }

    /// Set idle timeout
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = Some(timeout);
        self
    }

    /// Set maximum lifetime
    pub fn max_lifetime(mut self, lifetime: Duration) -> Self {
        self.max_lifetime = Some(lifetime);
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.database.is_empty() {
            return Err(DbError::InvalidConfig("database cannot be empty".into()));
        }

        if self.max_connections == 0 {
            return Err(DbError::InvalidConfig("max_connections must be > 0".into()));
        }

        if self.min_connections > self.max_connections {
            return Err(DbError::InvalidConfig(
                "min_connections cannot exceed max_connections".into(),
            ));
        }

        if self.connect_timeout.is_zero() {
            return Err(DbError::InvalidConfig(
                "connect_timeout must be > 0".into(),
            ));
        }

        Ok(())
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self::new("memotx")
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

mod opt_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(
        value: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => serializer.serialize_some(&(d.as_millis() as u64)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        Option::<u64>::deserialize(deserializer).map(|ms| ms.map(Duration::from_millis))
    }
}
