use crate::transaction::DEFAULT_MANAGER;
use std::any::{TypeId, type_name};

/// Opts a type into transactional proxying.
///
/// Usually derived:
///
/// ```ignore
/// #[derive(Transactional)]
/// #[transaction(manager = "audit")]
/// struct AuditLog { /* ... */ }
/// ```
pub trait Transactional: Send + Sync + 'static {
    /// Name of the transaction manager governing every instance.
    const MANAGER: &'static str = DEFAULT_MANAGER;

    fn marker() -> TransactionMarker
    where
        Self: Sized,
    {
        TransactionMarker::of::<Self>()
    }
}

/// Static metadata read from a [`Transactional`] type at registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionMarker {
    type_id: TypeId,
    type_name: &'static str,
    manager: &'static str,
}

impl TransactionMarker {
    pub fn of<T: Transactional>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: type_name::<T>(),
            manager: T::MANAGER,
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn manager(&self) -> &'static str {
        self.manager
    }
}
