use std::sync::Arc;

use shipyard_core::DeployableGroupId;

use crate::errors::DeployError;
use crate::models::DeployableGroup;
use crate::persistence::Store;

#[derive(Debug)]
pub struct DeployableGroupService {
    pub store: Arc<dyn Store>,
}

impl DeployableGroupService {
    #[tracing::instrument(name = "service::group::create", skip(self))]
    pub async fn create(&self, name: &str, description: &str) -> anyhow::Result<DeployableGroup> {
        if name.is_empty() {
            return Err(DeployError::validation("name cannot be empty"));
        }

        if self.store.deployable_group_for_name(name).await?.is_some() {
            return Err(DeployError::validation(format!(
                "deployable group name {name} is not available"
            )));
        }

        let group = DeployableGroup::new(name, description);
        self.store.insert_deployable_group(&group).await?;

        tracing::info!("deployable group created: {:?}", group);

        Ok(group)
    }

    #[tracing::instrument(name = "service::group::get_by_id", skip(self))]
    pub async fn get_by_id(&self, id: DeployableGroupId) -> anyhow::Result<DeployableGroup> {
        self.store
            .deployable_group(id)
            .await?
            .ok_or_else(|| DeployError::not_found(format!("DeployableGroup: {:?}", id.to_string())))
    }

    #[tracing::instrument(name = "service::group::list", skip(self))]
    pub async fn list(&self) -> anyhow::Result<Vec<DeployableGroup>> {
        self.store.deployable_groups().await
    }
}
