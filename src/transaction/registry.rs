use super::{DEFAULT_MANAGER, TransactionManager};
use crate::connection::ConnectionSource;
use crate::core::{TxError, TxResult};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

/// Transaction managers by name.
///
/// Filled once at startup and shared read-only afterwards.
#[derive(Clone, Default)]
pub struct ManagerRegistry {
    managers: HashMap<String, Arc<TransactionManager>>,
}

impl ManagerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        name: &str,
        source: Arc<dyn ConnectionSource>,
    ) -> TxResult<Arc<TransactionManager>> {
        if name.is_empty() {
            return Err(TxError::Config("manager name cannot be empty".into()));
        }
        if self.managers.contains_key(name) {
            return Err(TxError::DuplicateManager(name.to_string()));
        }

        let manager = Arc::new(TransactionManager::new(name, source));
        self.managers.insert(name.to_string(), Arc::clone(&manager));
        info!(manager = name, "transaction manager registered");
        Ok(manager)
    }

    /// Builder-style [`ManagerRegistry::register`].
    pub fn with_manager(mut self, name: &str, source: Arc<dyn ConnectionSource>) -> TxResult<Self> {
        self.register(name, source)?;
        Ok(self)
    }

    pub fn get(&self, name: &str) -> TxResult<Arc<TransactionManager>> {
        self.managers
            .get(name)
            .cloned()
            .ok_or_else(|| TxError::UnknownManager(name.to_string()))
    }

    pub fn default_manager(&self) -> TxResult<Arc<TransactionManager>> {
        self.get(DEFAULT_MANAGER)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.managers.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.managers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.managers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.managers.is_empty()
    }
}
