use memotx::{
    DbError, Row, Statement, StatementExecutor, Transactional, TxError, Value, async_trait,
    transactional,
};
use std::sync::Arc;

pub const USERS: &str = "users";
pub const PROFILES: &str = "profiles";

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Db(#[from] DbError),
    #[error(transparent)]
    Tx(#[from] TxError),
}

#[transactional]
#[async_trait]
pub trait ProfileService: Send + Sync {
    async fn create_profile(&self, user_id: i64, bio: &str) -> Result<(), ServiceError>;
}

#[transactional]
#[async_trait]
pub trait UserService: Send + Sync {
    /// Inserts the user, then its profile.
    async fn register(&self, id: i64, name: &str, bio: &str) -> Result<(), ServiceError>;

    #[transactional(skip)]
    async fn find(&self, id: i64) -> Result<Option<Row>, ServiceError>;
}

#[derive(Transactional)]
pub struct ProfileRepository {
    executor: StatementExecutor,
}

impl ProfileRepository {
    pub fn new(executor: StatementExecutor) -> Self {
        Self { executor }
    }
}

#[async_trait]
impl ProfileService for ProfileRepository {
    async fn create_profile(&self, user_id: i64, bio: &str) -> Result<(), ServiceError> {
        self.executor
            .update(&Statement::insert(
                PROFILES,
                vec![Value::from(user_id), Value::from(bio)],
            ))
            .await?;
        Ok(())
    }
}

#[derive(Transactional)]
pub struct Registration {
    executor: StatementExecutor,
    profiles: Arc<dyn ProfileService>,
}

impl Registration {
    pub fn new(executor: StatementExecutor, profiles: Arc<dyn ProfileService>) -> Self {
        Self { executor, profiles }
    }
}

#[async_trait]
impl UserService for Registration {
    async fn register(&self, id: i64, name: &str, bio: &str) -> Result<(), ServiceError> {
        self.executor
            .update(&Statement::insert(USERS, vec![Value::from(id), Value::from(name)]))
            .await?;
        self.profiles.create_profile(id, bio).await
    }

    async fn find(&self, id: i64) -> Result<Option<Row>, ServiceError> {
        let rows = self
            .executor
            .query(&Statement::select_where(USERS, "id", Value::from(id)))
            .await?;
        Ok(rows.into_iter().next())
    }
}
