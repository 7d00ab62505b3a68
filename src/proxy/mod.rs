pub mod factory;
pub mod marker;

pub use factory::{ProxyFactory, ProxyFactoryBuilder};
pub use marker::{TransactionMarker, Transactional};

use crate::transaction::TransactionInterceptor;
use std::fmt;
use std::sync::Arc;

/// Stand-in for a transactional value.
///
/// `#[transactional]` on a trait implements that trait for
/// `TransactionProxy<T>` whenever `T` implements it, routing every `async`
/// method through [`TransactionInterceptor::invoke`]. Build proxies with
/// [`ProxyFactory`].
pub struct TransactionProxy<T: ?Sized> {
    target: Arc<T>,
    interceptor: TransactionInterceptor,
}

impl<T: ?Sized> TransactionProxy<T> {
    pub fn new(target: Arc<T>, interceptor: TransactionInterceptor) -> Self {
        Self {
            target,
            interceptor,
        }
    }

    /// The wrapped value. Calls made directly on it are not intercepted.
    pub fn target(&self) -> &T {
        &self.target
    }

    pub fn target_arc(&self) -> &Arc<T> {
        &self.target
    }

    pub fn interceptor(&self) -> &TransactionInterceptor {
        &self.interceptor
    }

    pub fn manager_name(&self) -> &str {
        self.interceptor.manager().name()
    }
}

impl<T: ?Sized> Clone for TransactionProxy<T> {
    fn clone(&self) -> Self {
        Self {
            target: Arc::clone(&self.target),
            interceptor: self.interceptor.clone(),
        }
    }
}

impl<T: ?Sized> fmt::Debug for TransactionProxy<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionProxy")
            .field("target", &std::any::type_name::<T>())
            .field("manager", &self.manager_name())
            .finish()
    }
}
