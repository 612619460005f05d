use std::sync::Arc;

use shipyard_core::{DeployableGroupId, DeployableId};

use super::DeployableGroupService;
use crate::errors::DeployError;
use crate::models::Deployable;
use crate::persistence::Store;

#[derive(Debug)]
pub struct DeployableService {
    pub store: Arc<dyn Store>,

    pub group_service: Arc<DeployableGroupService>,
}

impl DeployableService {
    #[tracing::instrument(name = "service::deployable::create", skip(self))]
    pub async fn create(
        &self,
        group_id: DeployableGroupId,
        name: &str,
        description: &str,
        git_url: &str,
    ) -> anyhow::Result<Deployable> {
        if name.is_empty() {
            return Err(DeployError::validation("name cannot be empty"));
        }

        let group = self.group_service.get_by_id(group_id).await?;

        if self
            .store
            .deployable_for_name_and_group(name, group.id)
            .await?
            .is_some()
        {
            return Err(DeployError::validation(format!(
                "name {name} is not available for this group"
            )));
        }

        let deployable = Deployable::new(group.id, name, description, git_url);
        self.store.insert_deployable(&deployable).await?;

        tracing::info!("deployable created: {:?}", deployable);

        Ok(deployable)
    }

    #[tracing::instrument(name = "service::deployable::get_by_id", skip(self))]
    pub async fn get_by_id(&self, id: DeployableId) -> anyhow::Result<Deployable> {
        self.store
            .deployable(id)
            .await?
            .ok_or_else(|| DeployError::not_found(format!("Deployable: {:?}", id.to_string())))
    }

    #[tracing::instrument(name = "service::deployable::list_for_group", skip(self))]
    pub async fn list_for_group(&self, group_id: DeployableGroupId) -> anyhow::Result<Vec<Deployable>> {
        let group = self.group_service.get_by_id(group_id).await?;

        self.store.deployables_for_deployable_group(group.id).await
    }
}
