use async_trait::async_trait;
use shipyard_core::{DeployableId, DeployableVectorId, EnvironmentId};

use super::MemoryStore;
use crate::errors::DeployError;
use crate::models::{DeployableVector, VectorSourceType};
use crate::persistence::VectorPersistence;

#[async_trait]
impl VectorPersistence for MemoryStore {
    async fn insert_deployable_vector(&self, vector: &DeployableVector) -> anyhow::Result<DeployableVectorId> {
        let vector = vector.clone();

        self.with_state(move |state| {
            let duplicate = state.vectors.values().any(|existing| {
                existing.deployable_id == vector.deployable_id
                    && existing.source_type == vector.source_type
                    && existing.source_environment_id == vector.source_environment_id
                    && existing.target_environment_id == vector.target_environment_id
            });

            if duplicate {
                return Err(DeployError::validation(format!(
                    "a {} vector into {} already exists for {}",
                    vector.source_type, vector.target_environment_id, vector.deployable_id
                )));
            }

            let id = vector.id;
            state.vectors.insert(id.value(), vector);

            Ok(id)
        })
        .await
    }

    async fn deployable_vector(&self, id: DeployableVectorId) -> anyhow::Result<Option<DeployableVector>> {
        self.with_state(move |state| Ok(state.vectors.get(&id.value()).cloned()))
            .await
    }

    async fn deployable_vectors_for_deployable(
        &self,
        deployable_id: DeployableId,
    ) -> anyhow::Result<Vec<DeployableVector>> {
        self.with_state(move |state| {
            Ok(state
                .vectors
                .values()
                .filter(|vector| vector.deployable_id == deployable_id)
                .cloned()
                .collect())
        })
        .await
    }

    async fn deployable_vectors_for_deployable_and_source(
        &self,
        deployable_id: DeployableId,
        source_type: VectorSourceType,
    ) -> anyhow::Result<Vec<DeployableVector>> {
        self.with_state(move |state| {
            Ok(state
                .vectors
                .values()
                .filter(|vector| vector.deployable_id == deployable_id && vector.source_type == source_type)
                .cloned()
                .collect())
        })
        .await
    }

    async fn deployable_vectors_for_deployable_and_source_environment(
        &self,
        deployable_id: DeployableId,
        source_environment_id: EnvironmentId,
    ) -> anyhow::Result<Vec<DeployableVector>> {
        self.with_state(move |state| {
            Ok(state
                .vectors
                .values()
                .filter(|vector| {
                    vector.deployable_id == deployable_id
                        && vector.source_type == VectorSourceType::EnvironmentId
                        && vector.source_environment_id == Some(source_environment_id)
                })
                .cloned()
                .collect())
        })
        .await
    }

    async fn deployable_vector_for_deployable_source_target(
        &self,
        deployable_id: DeployableId,
        source_type: VectorSourceType,
        source_environment_id: Option<EnvironmentId>,
        target_environment_id: EnvironmentId,
    ) -> anyhow::Result<Option<DeployableVector>> {
        self.with_state(move |state| {
            Ok(state
                .vectors
                .values()
                .find(|vector| {
                    vector.deployable_id == deployable_id
                        && vector.source_type == source_type
                        && vector.source_environment_id == source_environment_id
                        && vector.target_environment_id == target_environment_id
                })
                .cloned())
        })
        .await
    }

    async fn delete_deployable_vector(&self, id: DeployableVectorId) -> anyhow::Result<u64> {
        self.with_state(move |state| {
            let referenced = state
                .deployments
                .values()
                .any(|deployment| deployment.deployable_vector_id == id);

            if referenced {
                return Err(DeployError::validation(format!(
                    "deployable vector {id} is referenced by deployments"
                )));
            }

            Ok(state.vectors.remove(&id.value()).map_or(0, |_| 1))
        })
        .await
    }
}
