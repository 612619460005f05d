use async_trait::async_trait;
use chrono::Utc;
use shipyard_core::{DeployableGroupId, EnvironmentId};

use super::MemoryStore;
use crate::errors::DeployError;
use crate::models::{Environment, EnvironmentUpdate};
use crate::persistence::EnvironmentPersistence;

#[async_trait]
impl EnvironmentPersistence for MemoryStore {
    async fn insert_environment(&self, environment: &Environment) -> anyhow::Result<EnvironmentId> {
        let environment = environment.clone();

        self.with_state(move |state| {
            if state.environments.values().any(|existing| {
                existing.deployable_group_id == environment.deployable_group_id
                    && existing.name == environment.name
            }) {
                return Err(DeployError::validation(format!(
                    "name {} is not available for this group",
                    environment.name
                )));
            }

            let id = environment.id;
            state.environments.insert(id.value(), environment);

            Ok(id)
        })
        .await
    }

    async fn environment(&self, id: EnvironmentId) -> anyhow::Result<Option<Environment>> {
        self.with_state(move |state| Ok(state.environments.get(&id.value()).cloned()))
            .await
    }

    async fn environment_for_name_and_group(
        &self,
        name: &str,
        group_id: DeployableGroupId,
    ) -> anyhow::Result<Option<Environment>> {
        let name = name.to_string();

        self.with_state(move |state| {
            Ok(state
                .environments
                .values()
                .find(|environment| {
                    environment.deployable_group_id == group_id && environment.name == name
                })
                .cloned())
        })
        .await
    }

    async fn environments_for_deployable_group(
        &self,
        group_id: DeployableGroupId,
    ) -> anyhow::Result<Vec<Environment>> {
        self.with_state(move |state| {
            Ok(state
                .environments
                .values()
                .filter(|environment| environment.deployable_group_id == group_id)
                .cloned()
                .collect())
        })
        .await
    }

    async fn update_environment(&self, id: EnvironmentId, update: &EnvironmentUpdate) -> anyhow::Result<u64> {
        if update.is_empty() {
            return Ok(0);
        }

        let update = update.clone();
        self.with_state(move |state| {
            let Some(group_id) = state
                .environments
                .get(&id.value())
                .map(|environment| environment.deployable_group_id)
            else {
                return Ok(0);
            };

            if let Some(name) = &update.name {
                if state.environments.values().any(|existing| {
                    existing.id != id
                        && existing.deployable_group_id == group_id
                        && &existing.name == name
                }) {
                    return Err(DeployError::validation(format!(
                        "name {name} is not available for this group"
                    )));
                }
            }

            let Some(environment) = state.environments.get_mut(&id.value()) else {
                return Ok(0);
            };

            if let Some(name) = update.name {
                environment.name = name;
            }
            if let Some(description) = update.description {
                environment.description = description;
            }
            if let Some(is_prod) = update.is_prod {
                environment.is_prod = is_prod;
            }
            environment.modified = Utc::now();

            Ok(1)
        })
        .await
    }

    async fn delete_environment(&self, id: EnvironmentId) -> anyhow::Result<u64> {
        self.with_state(move |state| Ok(state.environments.remove(&id.value()).map_or(0, |_| 1)))
            .await
    }
}
