use std::fmt::Debug;
use std::panic::AssertUnwindSafe;

use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;
use shipyard_core::{
    DeployableConfigId, DeployableGroupId, DeployableId, DeployableVectorId, DeploymentId,
    EnvironmentConfigId, EnvironmentId,
};

use crate::errors::DeployError;
use crate::models::{
    ConfigStatus, Deployable, DeployableConfig, DeployableConfigUpdate, DeployableConfigValue,
    DeployableGroup, DeployableGroupUpdate, DeployableUpdate, DeployableVector, Deployment,
    DeploymentStatus, Environment, EnvironmentConfig, EnvironmentConfigUpdate,
    EnvironmentConfigValue, EnvironmentUpdate, VectorSourceType,
};

pub mod memory;
pub mod relational;

// Lookups return `Ok(None)` for a missing row. Updates and deletes return the
// number of rows affected; an empty update touches nothing and returns 0.

#[async_trait]
pub trait DeployableGroupPersistence: Send + Sync {
    async fn insert_deployable_group(&self, group: &DeployableGroup) -> anyhow::Result<DeployableGroupId>;
    async fn deployable_group(&self, id: DeployableGroupId) -> anyhow::Result<Option<DeployableGroup>>;
    async fn deployable_group_for_name(&self, name: &str) -> anyhow::Result<Option<DeployableGroup>>;
    async fn deployable_groups(&self) -> anyhow::Result<Vec<DeployableGroup>>;
    async fn update_deployable_group(
        &self,
        id: DeployableGroupId,
        update: &DeployableGroupUpdate,
    ) -> anyhow::Result<u64>;
    async fn delete_deployable_group(&self, id: DeployableGroupId) -> anyhow::Result<u64>;
}

#[async_trait]
pub trait EnvironmentPersistence: Send + Sync {
    async fn insert_environment(&self, environment: &Environment) -> anyhow::Result<EnvironmentId>;
    async fn environment(&self, id: EnvironmentId) -> anyhow::Result<Option<Environment>>;
    async fn environment_for_name_and_group(
        &self,
        name: &str,
        group_id: DeployableGroupId,
    ) -> anyhow::Result<Option<Environment>>;
    async fn environments_for_deployable_group(
        &self,
        group_id: DeployableGroupId,
    ) -> anyhow::Result<Vec<Environment>>;
    async fn update_environment(&self, id: EnvironmentId, update: &EnvironmentUpdate) -> anyhow::Result<u64>;
    async fn delete_environment(&self, id: EnvironmentId) -> anyhow::Result<u64>;
}

#[async_trait]
pub trait DeployablePersistence: Send + Sync {
    async fn insert_deployable(&self, deployable: &Deployable) -> anyhow::Result<DeployableId>;
    async fn deployable(&self, id: DeployableId) -> anyhow::Result<Option<Deployable>>;
    async fn deployable_for_name_and_group(
        &self,
        name: &str,
        group_id: DeployableGroupId,
    ) -> anyhow::Result<Option<Deployable>>;
    async fn deployables_for_deployable_group(
        &self,
        group_id: DeployableGroupId,
    ) -> anyhow::Result<Vec<Deployable>>;
    async fn update_deployable(&self, id: DeployableId, update: &DeployableUpdate) -> anyhow::Result<u64>;
    async fn delete_deployable(&self, id: DeployableId) -> anyhow::Result<u64>;
}

#[async_trait]
pub trait ConfigPersistence: Send + Sync {
    // config inserts are no-ops when a row with the same id already exists
    async fn insert_environment_config(&self, config: &EnvironmentConfig) -> anyhow::Result<EnvironmentConfigId>;
    async fn environment_config(&self, id: EnvironmentConfigId) -> anyhow::Result<Option<EnvironmentConfig>>;
    async fn environment_configs_for_status(
        &self,
        environment_id: EnvironmentId,
        status: ConfigStatus,
    ) -> anyhow::Result<Vec<EnvironmentConfig>>;
    async fn deprecate_active_environment_config(&self, environment_id: EnvironmentId) -> anyhow::Result<u64>;
    async fn update_environment_config(
        &self,
        id: EnvironmentConfigId,
        update: &EnvironmentConfigUpdate,
    ) -> anyhow::Result<u64>;
    async fn delete_environment_config(&self, id: EnvironmentConfigId) -> anyhow::Result<u64>;
    async fn insert_environment_config_value(&self, value: &EnvironmentConfigValue) -> anyhow::Result<()>;
    async fn insert_environment_config_values(&self, values: &[EnvironmentConfigValue]) -> anyhow::Result<()>;
    async fn environment_config_values(
        &self,
        id: EnvironmentConfigId,
    ) -> anyhow::Result<Vec<EnvironmentConfigValue>>;

    async fn insert_deployable_config(&self, config: &DeployableConfig) -> anyhow::Result<DeployableConfigId>;
    async fn deployable_config(&self, id: DeployableConfigId) -> anyhow::Result<Option<DeployableConfig>>;
    async fn deployable_configs_for_status(
        &self,
        deployable_id: DeployableId,
        environment_id: EnvironmentId,
        status: ConfigStatus,
    ) -> anyhow::Result<Vec<DeployableConfig>>;
    async fn deprecate_active_deployable_config(
        &self,
        deployable_id: DeployableId,
        environment_id: EnvironmentId,
    ) -> anyhow::Result<u64>;
    async fn update_deployable_config(
        &self,
        id: DeployableConfigId,
        update: &DeployableConfigUpdate,
    ) -> anyhow::Result<u64>;
    async fn delete_deployable_config(&self, id: DeployableConfigId) -> anyhow::Result<u64>;
    async fn insert_deployable_config_value(&self, value: &DeployableConfigValue) -> anyhow::Result<()>;
    async fn insert_deployable_config_values(&self, values: &[DeployableConfigValue]) -> anyhow::Result<()>;
    async fn deployable_config_values(
        &self,
        id: DeployableConfigId,
    ) -> anyhow::Result<Vec<DeployableConfigValue>>;
}

#[async_trait]
pub trait VectorPersistence: Send + Sync {
    async fn insert_deployable_vector(&self, vector: &DeployableVector) -> anyhow::Result<DeployableVectorId>;
    async fn deployable_vector(&self, id: DeployableVectorId) -> anyhow::Result<Option<DeployableVector>>;
    async fn deployable_vectors_for_deployable(
        &self,
        deployable_id: DeployableId,
    ) -> anyhow::Result<Vec<DeployableVector>>;
    async fn deployable_vectors_for_deployable_and_source(
        &self,
        deployable_id: DeployableId,
        source_type: VectorSourceType,
    ) -> anyhow::Result<Vec<DeployableVector>>;
    async fn deployable_vectors_for_deployable_and_source_environment(
        &self,
        deployable_id: DeployableId,
        source_environment_id: EnvironmentId,
    ) -> anyhow::Result<Vec<DeployableVector>>;
    async fn deployable_vector_for_deployable_source_target(
        &self,
        deployable_id: DeployableId,
        source_type: VectorSourceType,
        source_environment_id: Option<EnvironmentId>,
        target_environment_id: EnvironmentId,
    ) -> anyhow::Result<Option<DeployableVector>>;
    async fn delete_deployable_vector(&self, id: DeployableVectorId) -> anyhow::Result<u64>;
}

#[async_trait]
pub trait DeploymentPersistence: Send + Sync {
    /// Inserts the deployment and returns its id. The stored row receives the
    /// next deployment number.
    async fn insert_deployment(&self, deployment: &Deployment) -> anyhow::Result<DeploymentId>;
    async fn deployment(&self, id: DeploymentId) -> anyhow::Result<Option<Deployment>>;
    async fn deployments(&self, deployable_id: DeployableId) -> anyhow::Result<Vec<Deployment>>;
    async fn deployments_for_status(
        &self,
        deployable_id: DeployableId,
        status: DeploymentStatus,
    ) -> anyhow::Result<Vec<Deployment>>;
    async fn delete_deployment(&self, id: DeploymentId) -> anyhow::Result<u64>;

    /// The latest COMPLETE deployment of `build_number` into `environment_id`
    /// for every deployable in the group, at most one per deployable.
    async fn deployments_for_deployment_group(
        &self,
        group_id: DeployableGroupId,
        environment_id: EnvironmentId,
        build_number: &str,
    ) -> anyhow::Result<Vec<Deployment>>;

    /// The COMPLETE deployment with the highest deployment number.
    async fn active_deployment(
        &self,
        deployable_id: DeployableId,
        environment_id: EnvironmentId,
    ) -> anyhow::Result<Option<Deployment>>;

    /// The lowest-numbered PENDING deployment whose target has nothing in
    /// progress and no earlier pending deployment. Inside a transaction the
    /// returned row stays locked until commit.
    async fn next_pending_deployment(&self) -> anyhow::Result<Option<Deployment>>;

    async fn set_deployment_status(&self, id: DeploymentId, status: DeploymentStatus) -> anyhow::Result<u64>;
}

/// The full persistence surface. `begin` opens a transaction whose handle
/// exposes the same surface.
#[async_trait]
pub trait Store:
    DeployableGroupPersistence
    + EnvironmentPersistence
    + DeployablePersistence
    + ConfigPersistence
    + VectorPersistence
    + DeploymentPersistence
    + Debug
    + Send
    + Sync
{
    async fn begin(&self) -> anyhow::Result<Box<dyn StoreTransaction>>;
}

#[async_trait]
pub trait StoreTransaction: Store {
    fn as_store(&self) -> &dyn Store;
    async fn commit(self: Box<Self>) -> anyhow::Result<()>;
    async fn rollback(self: Box<Self>) -> anyhow::Result<()>;
}

/// Runs `f` inside a transaction. Commits when `f` succeeds; rolls back when
/// it returns an error or panics, in which case the panic is reported as an
/// internal error.
pub async fn transact<T, F>(store: &dyn Store, f: F) -> anyhow::Result<T>
where
    T: Send,
    F: for<'t> FnOnce(&'t dyn Store) -> BoxFuture<'t, anyhow::Result<T>> + Send,
{
    let tx = store.begin().await?;

    let outcome = AssertUnwindSafe(f(tx.as_store())).catch_unwind().await;

    match outcome {
        Ok(Ok(value)) => {
            tx.commit().await?;
            Ok(value)
        }
        Ok(Err(err)) => {
            if let Err(rollback_err) = tx.rollback().await {
                tracing::error!("rollback failed: {rollback_err:#}");
            }
            Err(err)
        }
        Err(panic) => {
            if let Err(rollback_err) = tx.rollback().await {
                tracing::error!("rollback failed: {rollback_err:#}");
            }

            let message = panic
                .downcast_ref::<&str>()
                .map(|message| message.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());

            tracing::error!("transaction panicked: {message}");

            Err(DeployError::internal(format!(
                "transaction panicked: {message}"
            )))
        }
    }
}
