use std::sync::Arc;

use shipyard_core::{DeployableGroupId, EnvironmentId};

use super::DeployableGroupService;
use crate::errors::DeployError;
use crate::models::Environment;
use crate::persistence::Store;

#[derive(Debug)]
pub struct EnvironmentService {
    pub store: Arc<dyn Store>,

    pub group_service: Arc<DeployableGroupService>,
}

impl EnvironmentService {
    #[tracing::instrument(name = "service::environment::create", skip(self))]
    pub async fn create(
        &self,
        group_id: DeployableGroupId,
        name: &str,
        description: &str,
        is_prod: bool,
    ) -> anyhow::Result<Environment> {
        if name.is_empty() {
            return Err(DeployError::validation("name cannot be empty"));
        }

        let group = self.group_service.get_by_id(group_id).await?;

        if self
            .store
            .environment_for_name_and_group(name, group.id)
            .await?
            .is_some()
        {
            return Err(DeployError::validation(format!(
                "name {name} is not available for this group"
            )));
        }

        let environment = Environment::new(group.id, name, description, is_prod);
        self.store.insert_environment(&environment).await?;

        tracing::info!("environment created: {:?}", environment);

        Ok(environment)
    }

    #[tracing::instrument(name = "service::environment::get_by_id", skip(self))]
    pub async fn get_by_id(&self, id: EnvironmentId) -> anyhow::Result<Environment> {
        self.store
            .environment(id)
            .await?
            .ok_or_else(|| DeployError::not_found(format!("Environment: {:?}", id.to_string())))
    }

    #[tracing::instrument(name = "service::environment::list_for_group", skip(self))]
    pub async fn list_for_group(&self, group_id: DeployableGroupId) -> anyhow::Result<Vec<Environment>> {
        let group = self.group_service.get_by_id(group_id).await?;

        self.store.environments_for_deployable_group(group.id).await
    }
}
