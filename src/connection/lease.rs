use super::{Connection, ConnectionSource};
use crate::core::Result;
use std::sync::Arc;
use tracing::{debug, warn};

/// A connection borrowed from a [`ConnectionSource`].
///
/// Call [`ConnectionLease::release`] to hand it back. A lease that is dropped
/// instead (for example because the future owning it was cancelled) rolls the
/// connection back, restores its auto-commit flag and releases it from a task
/// spawned on the current tokio runtime.
pub struct ConnectionLease {
    connection: Option<Box<dyn Connection>>,
    source: Arc<dyn ConnectionSource>,
    /// Auto-commit flag to put back on release, set once the lease is used
    /// for an explicit transaction.
    restore_auto_commit: Option<bool>,
}

impl ConnectionLease {
    pub async fn acquire(source: Arc<dyn ConnectionSource>) -> Result<Self> {
        let connection = source.acquire().await?;
        Ok(Self {
            connection: Some(connection),
            source,
            restore_auto_commit: None,
        })
    }

    pub fn id(&self) -> u64 {
        self.connection.as_ref().map(|c| c.id()).unwrap_or_default()
    }

    /// Get a reference to the connection
    pub fn connection(&mut self) -> &mut (dyn Connection + 'static) {
        self.connection
            .as_deref_mut()
            .expect("Connection already returned to its source")
    }

    /// Switches the connection into explicit-transaction mode.
    ///
    /// Returns the auto-commit flag the connection had before, which
    /// [`ConnectionLease::release`] restores.
    pub async fn begin(&mut self) -> Result<bool> {
        let connection = self.connection();
        let prior = connection.auto_commit();
        if prior {
            connection.set_auto_commit(false).await?;
        }
        self.restore_auto_commit = Some(prior);
        Ok(prior)
    }

    /// Restores the auto-commit flag and returns the connection to its source.
    ///
    /// A failure to restore the flag is logged and does not prevent the
    /// release.
    pub async fn release(mut self) -> Result<()> {
        let Some(mut connection) = self.connection.take() else {
            return Ok(());
        };

        if let Some(prior) = self.restore_auto_commit {
            if connection.auto_commit() != prior {
                if let Err(err) = connection.set_auto_commit(prior).await {
                    warn!(
                        connection = connection.id(),
                        error = %err,
                        "failed to restore auto-commit before release"
                    );
                }
            }
        }

        debug!(connection = connection.id(), "releasing connection");
        self.source.release(connection).await
    }
}

impl Drop for ConnectionLease {
    fn drop(&mut self) {
        let Some(mut connection) = self.connection.take() else {
            return;
        };

        let source = Arc::clone(&self.source);
        let restore = self.restore_auto_commit;

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                warn!(
                    connection = connection.id(),
                    "connection lease dropped without release; scheduling rollback"
                );
                handle.spawn(async move {
                    let id = connection.id();
                    if !connection.auto_commit() {
                        if let Err(err) = connection.rollback().await {
                            warn!(connection = id, error = %err, "rollback of abandoned connection failed");
                        }
                    }
                    if let Some(prior) = restore {
                        if connection.auto_commit() != prior {
                            if let Err(err) = connection.set_auto_commit(prior).await {
                                warn!(connection = id, error = %err, "failed to restore auto-commit of abandoned connection");
                            }
                        }
                    }
                    if let Err(err) = source.release(connection).await {
                        warn!(connection = id, error = %err, "release of abandoned connection failed");
                    }
                });
            }
            Err(_) => {
                warn!(
                    connection = connection.id(),
                    "connection lease dropped outside a tokio runtime; connection discarded"
                );
            }
        }
    }
}
