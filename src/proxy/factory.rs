use super::{TransactionMarker, TransactionProxy, Transactional};
use crate::core::{TxError, TxResult};
use crate::transaction::{ManagerRegistry, TransactionInterceptor};
use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

struct Binding {
    marker: TransactionMarker,
    interceptor: TransactionInterceptor,
}

/// Collects transactional types at startup.
pub struct ProxyFactoryBuilder {
    registry: ManagerRegistry,
    markers: Vec<TransactionMarker>,
}

impl ProxyFactoryBuilder {
    /// Registers `T` for proxying. Registering a type twice has no effect.
    pub fn component<T: Transactional>(self) -> Self {
        self.marker(T::marker())
    }

    pub fn marker(mut self, marker: TransactionMarker) -> Self {
        if self.markers.iter().any(|m| m.type_id() == marker.type_id()) {
            debug!(component = marker.type_name(), "component already registered");
        } else {
            self.markers.push(marker);
        }
        self
    }

    /// Binds every registered type to its transaction manager.
    ///
    /// Fails with [`TxError::UnknownManager`] if a type names a manager the
    /// registry does not hold.
    pub fn build(self) -> TxResult<ProxyFactory> {
        let mut bindings = HashMap::with_capacity(self.markers.len());

        for marker in self.markers {
            let manager = self.registry.get(marker.manager())?;
            info!(
                component = marker.type_name(),
                manager = marker.manager(),
                "transactional component registered"
            );
            bindings.insert(
                marker.type_id(),
                Binding {
                    marker,
                    interceptor: TransactionInterceptor::new(manager),
                },
            );
        }

        Ok(ProxyFactory {
            registry: self.registry,
            bindings,
        })
    }
}

/// Wraps instances of registered [`Transactional`] types in
/// [`TransactionProxy`]s. The set of registered types is fixed once built.
pub struct ProxyFactory {
    registry: ManagerRegistry,
    bindings: HashMap<TypeId, Binding>,
}

impl ProxyFactory {
    pub fn builder(registry: ManagerRegistry) -> ProxyFactoryBuilder {
        ProxyFactoryBuilder {
            registry,
            markers: Vec::new(),
        }
    }

    pub fn create<T: Transactional>(&self, target: T) -> TxResult<TransactionProxy<T>> {
        self.wrap(Arc::new(target))
    }

    pub fn wrap<T: Transactional>(&self, target: Arc<T>) -> TxResult<TransactionProxy<T>> {
        let binding = self
            .bindings
            .get(&TypeId::of::<T>())
            .ok_or(TxError::NotRegistered(std::any::type_name::<T>()))?;
        Ok(TransactionProxy::new(target, binding.interceptor.clone()))
    }

    pub fn is_registered<T: Transactional>(&self) -> bool {
        self.bindings.contains_key(&TypeId::of::<T>())
    }

    pub fn markers(&self) -> impl Iterator<Item = &TransactionMarker> {
        self.bindings.values().map(|b| &b.marker)
    }

    /// Interceptor for programmatic transactions on `manager`.
    pub fn interceptor(&self, manager: &str) -> TxResult<TransactionInterceptor> {
        self.registry.get(manager).map(TransactionInterceptor::new)
    }

    pub fn registry(&self) -> &ManagerRegistry {
        &self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::{ConnectionPool, ConnectionSource, PoolConfig};
    use crate::transaction::DEFAULT_MANAGER;

    struct Catalog;
    impl Transactional for Catalog {}

    struct Ledger;
    impl Transactional for Ledger {
        const MANAGER: &'static str = "ledger";
    }

    struct Unregistered;
    impl Transactional for Unregistered {}

    async fn registry(names: &[&str]) -> ManagerRegistry {
        let mut registry = ManagerRegistry::new();
        for name in names {
            let pool: Arc<dyn ConnectionSource> =
                Arc::new(ConnectionPool::new(PoolConfig::new(name)).await.unwrap());
            registry.register(name, pool).unwrap();
        }
        registry
    }

    #[tokio::test]
    async fn test_binds_each_type_to_its_manager() {
        let factory = ProxyFactory::builder(registry(&[DEFAULT_MANAGER, "ledger"]).await)
            .component::<Catalog>()
            .component::<Ledger>()
            .component::<Catalog>()
            .build()
            .unwrap();

        assert_eq!(factory.markers().count(), 2);
        assert_eq!(factory.create(Catalog).unwrap().manager_name(), DEFAULT_MANAGER);
        assert_eq!(factory.create(Ledger).unwrap().manager_name(), "ledger");
        assert!(factory.is_registered::<Ledger>());
        assert!(!factory.is_registered::<Unregistered>());
    }

    #[tokio::test]
    async fn test_unknown_manager_fails_build() {
        let result = ProxyFactory::builder(registry(&[DEFAULT_MANAGER]).await)
            .component::<Ledger>()
            .build();

        assert!(matches!(result, Err(TxError::UnknownManager(name)) if name == "ledger"));
    }

    #[tokio::test]
    async fn test_unregistered_type_is_rejected() {
        let factory = ProxyFactory::builder(registry(&[DEFAULT_MANAGER]).await)
            .build()
            .unwrap();

        let err = factory.create(Unregistered).unwrap_err();
        assert!(matches!(err, TxError::NotRegistered(name) if name.ends_with("Unregistered")));
        assert!(factory.interceptor(DEFAULT_MANAGER).is_ok());
        assert!(factory.interceptor("nope").is_err());
    }
}
