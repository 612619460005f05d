use async_trait::async_trait;
use chrono::Utc;
use shipyard_core::DeployableGroupId;

use super::MemoryStore;
use crate::errors::DeployError;
use crate::models::{DeployableGroup, DeployableGroupUpdate};
use crate::persistence::DeployableGroupPersistence;

#[async_trait]
impl DeployableGroupPersistence for MemoryStore {
    async fn insert_deployable_group(&self, group: &DeployableGroup) -> anyhow::Result<DeployableGroupId> {
        let group = group.clone();

        self.with_state(move |state| {
            if state.groups.values().any(|existing| existing.name == group.name) {
                return Err(DeployError::validation(format!(
                    "deployable group name {} is already taken",
                    group.name
                )));
            }

            let id = group.id;
            state.groups.insert(id.value(), group);

            Ok(id)
        })
        .await
    }

    async fn deployable_group(&self, id: DeployableGroupId) -> anyhow::Result<Option<DeployableGroup>> {
        self.with_state(move |state| Ok(state.groups.get(&id.value()).cloned()))
            .await
    }

    async fn deployable_group_for_name(&self, name: &str) -> anyhow::Result<Option<DeployableGroup>> {
        let name = name.to_string();

        self.with_state(move |state| {
            Ok(state
                .groups
                .values()
                .find(|group| group.name == name)
                .cloned())
        })
        .await
    }

    async fn deployable_groups(&self) -> anyhow::Result<Vec<DeployableGroup>> {
        self.with_state(|state| Ok(state.groups.values().cloned().collect()))
            .await
    }

    async fn update_deployable_group(
        &self,
        id: DeployableGroupId,
        update: &DeployableGroupUpdate,
    ) -> anyhow::Result<u64> {
        if update.is_empty() {
            return Ok(0);
        }

        let update = update.clone();
        self.with_state(move |state| {
            if let Some(name) = &update.name {
                if state
                    .groups
                    .values()
                    .any(|existing| existing.id != id && &existing.name == name)
                {
                    return Err(DeployError::validation(format!(
                        "deployable group name {name} is already taken"
                    )));
                }
            }

            let Some(group) = state.groups.get_mut(&id.value()) else {
                return Ok(0);
            };

            if let Some(name) = update.name {
                group.name = name;
            }
            if let Some(description) = update.description {
                group.description = description;
            }
            group.modified = Utc::now();

            Ok(1)
        })
        .await
    }

    async fn delete_deployable_group(&self, id: DeployableGroupId) -> anyhow::Result<u64> {
        self.with_state(move |state| Ok(state.groups.remove(&id.value()).map_or(0, |_| 1)))
            .await
    }
}
