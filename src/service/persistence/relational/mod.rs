use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::pool::PoolConnection;
use sqlx::{PgConnection, PgPool, Postgres, Transaction};
use tokio::sync::{Mutex, MutexGuard};

use crate::errors::DeployError;
use crate::persistence::{Store, StoreTransaction};

mod config;
mod deployable;
mod deployment;
mod environment;
mod group;
mod vector;

enum RelationalHandle {
    Pool(Arc<PgPool>),
    Transaction(Mutex<Option<Transaction<'static, Postgres>>>),
}

/// Store backed by PostgreSQL. Handles returned by `begin` run every query
/// on the same transaction.
pub struct RelationalStore {
    handle: RelationalHandle,
}

impl fmt::Debug for RelationalStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.handle {
            RelationalHandle::Pool(_) => "pool",
            RelationalHandle::Transaction(_) => "transaction",
        };

        f.debug_struct("RelationalStore").field("handle", &kind).finish()
    }
}

pub(crate) enum Connection<'a> {
    Pooled(PoolConnection<Postgres>),
    Transaction(MutexGuard<'a, Option<Transaction<'static, Postgres>>>),
}

impl Connection<'_> {
    pub(crate) fn get(&mut self) -> anyhow::Result<&mut PgConnection> {
        match self {
            Connection::Pooled(conn) => Ok(&mut **conn),
            Connection::Transaction(guard) => match guard.as_mut() {
                Some(tx) => Ok(&mut **tx),
                None => Err(anyhow::anyhow!("transaction already finished")),
            },
        }
    }
}

impl RelationalStore {
    pub fn new(db: Arc<PgPool>) -> Self {
        RelationalStore {
            handle: RelationalHandle::Pool(db),
        }
    }

    pub(crate) async fn connection(&self) -> anyhow::Result<Connection<'_>> {
        match &self.handle {
            RelationalHandle::Pool(db) => Ok(Connection::Pooled(db.acquire().await?)),
            RelationalHandle::Transaction(tx) => Ok(Connection::Transaction(tx.lock().await)),
        }
    }

    async fn finish(&self) -> anyhow::Result<Option<Transaction<'static, Postgres>>> {
        match &self.handle {
            RelationalHandle::Pool(_) => Err(anyhow::anyhow!("not inside a transaction")),
            RelationalHandle::Transaction(tx) => Ok(tx.lock().await.take()),
        }
    }
}

/// Maps constraint violations to validation errors and wraps everything else
/// with `context`.
pub(crate) fn map_db_error(err: sqlx::Error, context: &str) -> anyhow::Error {
    if let sqlx::Error::Database(db_err) = &err {
        match db_err.code().as_deref() {
            // unique_violation, foreign_key_violation, check_violation
            Some("23505") | Some("23503") | Some("23514") => {
                return DeployError::validation(format!("{context}: {}", db_err.message()));
            }
            _ => {}
        }
    }

    anyhow::Error::new(err).context(context.to_string())
}

#[async_trait]
impl Store for RelationalStore {
    async fn begin(&self) -> anyhow::Result<Box<dyn StoreTransaction>> {
        match &self.handle {
            RelationalHandle::Pool(db) => {
                let tx = db.begin().await?;

                Ok(Box::new(RelationalStore {
                    handle: RelationalHandle::Transaction(Mutex::new(Some(tx))),
                }))
            }
            RelationalHandle::Transaction(_) => {
                Err(anyhow::anyhow!("nested transactions are not supported"))
            }
        }
    }
}

#[async_trait]
impl StoreTransaction for RelationalStore {
    fn as_store(&self) -> &dyn Store {
        self
    }

    async fn commit(self: Box<Self>) -> anyhow::Result<()> {
        if let Some(tx) = self.finish().await? {
            tx.commit().await?;
        }

        Ok(())
    }

    async fn rollback(self: Box<Self>) -> anyhow::Result<()> {
        if let Some(tx) = self.finish().await? {
            tx.rollback().await?;
        }

        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Arc;

    use shipyard_core::DeployableGroupId;
    use sqlx::postgres::PgPoolOptions;

    use super::RelationalStore;
    use crate::models::{Deployable, DeployableGroup, Environment};
    use crate::persistence::{DeployableGroupPersistence, DeployablePersistence, EnvironmentPersistence};

    /// Connects to the database named by `DATABASE_URL` in `.env.test`.
    pub(crate) async fn test_store() -> RelationalStore {
        dotenvy::from_filename(".env.test").ok();

        let database_url = std::env::var("DATABASE_URL").unwrap();
        let db = PgPoolOptions::new()
            .max_connections(5)
            .connect(&database_url)
            .await
            .unwrap();

        sqlx::migrate!().run(&db).await.unwrap();

        RelationalStore::new(Arc::new(db))
    }

    /// Inserts a uniquely named group holding one deployable and the named
    /// environments, so repeated runs against one database do not collide.
    pub(crate) async fn seed_deployable(
        store: &RelationalStore,
        environment_names: &[&str],
    ) -> (DeployableGroup, Deployable, Vec<Environment>) {
        let group = DeployableGroup::new(format!("group-{}", DeployableGroupId::new()), "fixture");
        store.insert_deployable_group(&group).await.unwrap();

        let deployable = Deployable::new(group.id, "api", "fixture", "");
        store.insert_deployable(&deployable).await.unwrap();

        let mut environments = Vec::new();
        for name in environment_names {
            let environment = Environment::new(group.id, *name, "fixture", false);
            store.insert_environment(&environment).await.unwrap();
            environments.push(environment);
        }

        (group, deployable, environments)
    }
}
