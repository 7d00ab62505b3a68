mod services;

use services::{PROFILES, ProfileRepository, ProfileService, Registration, USERS, UserService};

use anyhow::{Context, Result};
use futures::future::join_all;
use memotx::storage::PendingWrite;
use memotx::{
    ConnectionPool, DEFAULT_MANAGER, ManagerRegistry, MemoryDatabase, ProxyFactory,
    StatementExecutor, Value,
};
use std::sync::Arc;
use tracing::{info, warn};

/// Outcome of one demo run.
pub struct Report {
    pub committed: usize,
    pub rolled_back: usize,
    pub users: usize,
    pub profiles: usize,
}

pub fn create_schema(db: &MemoryDatabase) -> Result<()> {
    db.create_table(USERS, vec!["id".into(), "name".into()])?;
    db.create_table(PROFILES, vec!["user_id".into(), "bio".into()])?;
    Ok(())
}

/// Seeds a profile for every `fail_every`-th user so that registering that
/// user hits a primary-key violation on the second insert.
pub fn seed_conflicts(db: &MemoryDatabase, chains: usize, fail_every: usize) -> Result<usize> {
    let mut seeded = 0;
    for id in (1..=chains).filter(|id| id % fail_every == 0) {
        db.apply(&[PendingWrite::Insert {
            table: PROFILES.to_string(),
            row: vec![Value::from(id as i64), Value::from("taken")],
        }])?;
        seeded += 1;
    }
    Ok(seeded)
}

/// Runs `chains` concurrent registrations through transactional proxies.
pub async fn run(
    registry: ManagerRegistry,
    pool: Arc<ConnectionPool>,
    chains: usize,
) -> Result<Report> {
    let executor = StatementExecutor::new(registry.default_manager()?);
    let factory = ProxyFactory::builder(registry)
        .component::<ProfileRepository>()
        .component::<Registration>()
        .build()?;

    let profiles: Arc<dyn ProfileService> =
        Arc::new(factory.create(ProfileRepository::new(executor.clone()))?);
    let users: Arc<dyn UserService> =
        Arc::new(factory.create(Registration::new(executor, profiles))?);

    let handles = (1..=chains).map(|id| {
        let users = Arc::clone(&users);
        tokio::spawn(async move {
            let name = format!("user-{id}");
            let result = users.register(id as i64, &name, "hello").await;
            (id, result)
        })
    });

    let mut committed = 0;
    let mut rolled_back = 0;
    for joined in join_all(handles).await {
        let (id, result) = joined.context("registration task panicked")?;
        match result {
            Ok(()) => committed += 1,
            Err(err) => {
                rolled_back += 1;
                warn!(user = id, error = %err, "registration rolled back");
            }
        }
    }

    match users.find(1).await? {
        Some(row) => info!(user = ?row, "first user committed"),
        None => info!("first user was rolled back"),
    }

    let stats = factory.registry().get(DEFAULT_MANAGER)?.stats();
    info!(%stats, "manager statistics");
    info!(stats = %pool.stats().await, "pool statistics");

    Ok(Report {
        committed,
        rolled_back,
        users: pool.database().row_count(USERS)?,
        profiles: pool.database().row_count(PROFILES)?,
    })
}
