use async_trait::async_trait;
use chrono::Utc;
use shipyard_core::{DeployableGroupId, DeployableId};

use super::MemoryStore;
use crate::errors::DeployError;
use crate::models::{Deployable, DeployableUpdate};
use crate::persistence::DeployablePersistence;

#[async_trait]
impl DeployablePersistence for MemoryStore {
    async fn insert_deployable(&self, deployable: &Deployable) -> anyhow::Result<DeployableId> {
        let deployable = deployable.clone();

        self.with_state(move |state| {
            if state.deployables.values().any(|existing| {
                existing.deployable_group_id == deployable.deployable_group_id
                    && existing.name == deployable.name
            }) {
                return Err(DeployError::validation(format!(
                    "name {} is not available for this group",
                    deployable.name
                )));
            }

            let id = deployable.id;
            state.deployables.insert(id.value(), deployable);

            Ok(id)
        })
        .await
    }

    async fn deployable(&self, id: DeployableId) -> anyhow::Result<Option<Deployable>> {
        self.with_state(move |state| Ok(state.deployables.get(&id.value()).cloned()))
            .await
    }

    async fn deployable_for_name_and_group(
        &self,
        name: &str,
        group_id: DeployableGroupId,
    ) -> anyhow::Result<Option<Deployable>> {
        let name = name.to_string();

        self.with_state(move |state| {
            Ok(state
                .deployables
                .values()
                .find(|deployable| {
                    deployable.deployable_group_id == group_id && deployable.name == name
                })
                .cloned())
        })
        .await
    }

    async fn deployables_for_deployable_group(
        &self,
        group_id: DeployableGroupId,
    ) -> anyhow::Result<Vec<Deployable>> {
        self.with_state(move |state| {
            Ok(state
                .deployables
                .values()
                .filter(|deployable| deployable.deployable_group_id == group_id)
                .cloned()
                .collect())
        })
        .await
    }

    async fn update_deployable(&self, id: DeployableId, update: &DeployableUpdate) -> anyhow::Result<u64> {
        if update.is_empty() {
            return Ok(0);
        }

        let update = update.clone();
        self.with_state(move |state| {
            let Some(group_id) = state
                .deployables
                .get(&id.value())
                .map(|deployable| deployable.deployable_group_id)
            else {
                return Ok(0);
            };

            if let Some(name) = &update.name {
                if state.deployables.values().any(|existing| {
                    existing.id != id
                        && existing.deployable_group_id == group_id
                        && &existing.name == name
                }) {
                    return Err(DeployError::validation(format!(
                        "name {name} is not available for this group"
                    )));
                }
            }

            let Some(deployable) = state.deployables.get_mut(&id.value()) else {
                return Ok(0);
            };

            if let Some(name) = update.name {
                deployable.name = name;
            }
            if let Some(description) = update.description {
                deployable.description = description;
            }
            if let Some(git_url) = update.git_url {
                deployable.git_url = git_url;
            }
            deployable.modified = Utc::now();

            Ok(1)
        })
        .await
    }

    async fn delete_deployable(&self, id: DeployableId) -> anyhow::Result<u64> {
        self.with_state(move |state| Ok(state.deployables.remove(&id.value()).map_or(0, |_| 1)))
            .await
    }
}
