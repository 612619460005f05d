use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::models::{
    Deployable, DeployableConfig, DeployableConfigValue, DeployableGroup, DeployableVector,
    Deployment, Environment, EnvironmentConfig, EnvironmentConfigValue,
};
use crate::persistence::{Store, StoreTransaction};

mod config;
mod deployable;
mod deployment;
mod environment;
mod group;
mod vector;

// Rows are keyed by the numeric id. Ids are time ordered, so map order is
// insertion order.
#[derive(Clone, Debug, Default)]
pub(crate) struct MemoryState {
    groups: BTreeMap<u64, DeployableGroup>,
    environments: BTreeMap<u64, Environment>,
    deployables: BTreeMap<u64, Deployable>,
    environment_configs: BTreeMap<u64, EnvironmentConfig>,
    environment_config_values: Vec<EnvironmentConfigValue>,
    deployable_configs: BTreeMap<u64, DeployableConfig>,
    deployable_config_values: Vec<DeployableConfigValue>,
    vectors: BTreeMap<u64, DeployableVector>,
    deployments: BTreeMap<u64, Deployment>,
    last_deployment_number: u64,
}

struct StagedState {
    // held for the life of the transaction, so memory transactions are serial
    guard: OwnedMutexGuard<MemoryState>,
    staged: MemoryState,
}

enum MemoryHandle {
    Shared(Arc<AsyncMutex<MemoryState>>),
    Transaction(Mutex<Option<StagedState>>),
}

/// Store backed by process memory. A transaction works on a copy of the state
/// that replaces the shared state on commit.
pub struct MemoryStore {
    handle: MemoryHandle,
}

impl fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.handle {
            MemoryHandle::Shared(_) => "shared",
            MemoryHandle::Transaction(_) => "transaction",
        };

        f.debug_struct("MemoryStore").field("handle", &kind).finish()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        MemoryStore {
            handle: MemoryHandle::Shared(Arc::new(AsyncMutex::new(MemoryState::default()))),
        }
    }
}

impl MemoryStore {
    pub(crate) async fn with_state<R>(
        &self,
        f: impl FnOnce(&mut MemoryState) -> anyhow::Result<R> + Send,
    ) -> anyhow::Result<R> {
        match &self.handle {
            MemoryHandle::Shared(state) => {
                let mut state = state.lock().await;
                f(&mut state)
            }
            MemoryHandle::Transaction(staged) => {
                let mut staged = staged
                    .lock()
                    .map_err(|_| anyhow::anyhow!("memory transaction lock poisoned"))?;

                match staged.as_mut() {
                    Some(staged) => f(&mut staged.staged),
                    None => Err(anyhow::anyhow!("memory transaction already finished")),
                }
            }
        }
    }

    fn finish(&self) -> anyhow::Result<Option<StagedState>> {
        match &self.handle {
            MemoryHandle::Shared(_) => Err(anyhow::anyhow!("not inside a transaction")),
            MemoryHandle::Transaction(staged) => Ok(staged
                .lock()
                .map_err(|_| anyhow::anyhow!("memory transaction lock poisoned"))?
                .take()),
        }
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn begin(&self) -> anyhow::Result<Box<dyn StoreTransaction>> {
        match &self.handle {
            MemoryHandle::Shared(state) => {
                let guard = Arc::clone(state).lock_owned().await;
                let staged = guard.clone();

                Ok(Box::new(MemoryStore {
                    handle: MemoryHandle::Transaction(Mutex::new(Some(StagedState {
                        guard,
                        staged,
                    }))),
                }))
            }
            MemoryHandle::Transaction(_) => {
                Err(anyhow::anyhow!("nested transactions are not supported"))
            }
        }
    }
}

#[async_trait]
impl StoreTransaction for MemoryStore {
    fn as_store(&self) -> &dyn Store {
        self
    }

    async fn commit(self: Box<Self>) -> anyhow::Result<()> {
        if let Some(StagedState { mut guard, staged }) = self.finish()? {
            *guard = staged;
        }

        Ok(())
    }

    async fn rollback(self: Box<Self>) -> anyhow::Result<()> {
        self.finish()?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use futures::FutureExt;

    use super::*;
    use crate::errors::is_validation;
    use crate::models::DeployableGroupUpdate;
    use crate::persistence::{transact, DeployableGroupPersistence};

    #[tokio::test]
    async fn test_transaction_commit_and_rollback() {
        let store = MemoryStore::default();

        let committed = DeployableGroup::new("committed", "");
        let group = committed.clone();
        transact(&store, move |tx| {
            async move { tx.insert_deployable_group(&group).await }.boxed()
        })
        .await
        .unwrap();

        let rolled_back = DeployableGroup::new("rolled-back", "");
        let group = rolled_back.clone();
        let result: anyhow::Result<()> = transact(&store, move |tx| {
            async move {
                tx.insert_deployable_group(&group).await?;
                anyhow::bail!("abort")
            }
            .boxed()
        })
        .await;
        assert!(result.is_err());

        assert!(store.deployable_group(committed.id).await.unwrap().is_some());
        assert!(store.deployable_group(rolled_back.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_transaction_rolls_back_on_panic() {
        let store = MemoryStore::default();

        let group = DeployableGroup::new("panicking", "");
        let group_id = group.id;
        let result: anyhow::Result<()> = transact(&store, move |tx| {
            async move {
                tx.insert_deployable_group(&group).await?;
                if !group.name.is_empty() {
                    panic!("boom");
                }
                Ok(())
            }
            .boxed()
        })
        .await;

        let err = result.unwrap_err();
        assert!(err.to_string().contains("boom"));
        assert!(store.deployable_group(group_id).await.unwrap().is_none());

        // the store is usable again afterwards
        assert!(store.deployable_groups().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_update_is_a_noop() {
        let store = MemoryStore::default();

        let group = DeployableGroup::new("group", "first");
        store.insert_deployable_group(&group).await.unwrap();

        let affected = store
            .update_deployable_group(group.id, &DeployableGroupUpdate::default())
            .await
            .unwrap();
        assert_eq!(affected, 0);

        let fetched = store.deployable_group(group.id).await.unwrap().unwrap();
        assert_eq!(fetched, group);
    }

    #[tokio::test]
    async fn test_group_names_are_unique() {
        let store = MemoryStore::default();

        store
            .insert_deployable_group(&DeployableGroup::new("group", ""))
            .await
            .unwrap();

        let err = store
            .insert_deployable_group(&DeployableGroup::new("group", ""))
            .await
            .unwrap_err();

        assert!(is_validation(&err));
    }
}
