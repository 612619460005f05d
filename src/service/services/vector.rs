use std::sync::Arc;

use shipyard_core::{DeployableId, DeployableVectorId, EnvironmentId};

use super::{DeployableService, EnvironmentService};
use crate::errors::DeployError;
use crate::models::{Deployable, DeployableVector, VectorSourceType};
use crate::persistence::Store;

#[derive(Debug)]
pub struct VectorService {
    pub store: Arc<dyn Store>,

    pub deployable_service: Arc<DeployableService>,
    pub environment_service: Arc<EnvironmentService>,
}

impl VectorService {
    async fn check_environment_access(
        &self,
        deployable: &Deployable,
        environment_id: EnvironmentId,
    ) -> anyhow::Result<()> {
        let environment = self.environment_service.get_by_id(environment_id).await?;

        if environment.deployable_group_id != deployable.deployable_group_id {
            return Err(DeployError::validation(format!(
                "this deployable does not have access to environment {environment_id}"
            )));
        }

        Ok(())
    }

    #[tracing::instrument(name = "service::vector::create", skip(self))]
    pub async fn create(
        &self,
        deployable_id: DeployableId,
        source_type: VectorSourceType,
        source_environment_id: Option<EnvironmentId>,
        target_environment_id: EnvironmentId,
    ) -> anyhow::Result<DeployableVector> {
        let vector = match (source_type, source_environment_id) {
            (VectorSourceType::Build, None) => {
                DeployableVector::from_build(deployable_id, target_environment_id)
            }
            (VectorSourceType::Build, Some(_)) => {
                return Err(DeployError::validation(format!(
                    "source environment id must be empty for source type {source_type}"
                )));
            }
            (VectorSourceType::EnvironmentId, None) => {
                return Err(DeployError::validation(format!(
                    "source environment id cannot be empty for source type {source_type}"
                )));
            }
            (VectorSourceType::EnvironmentId, Some(source_environment_id)) => {
                if source_environment_id == target_environment_id {
                    return Err(DeployError::validation(
                        "source and target environment cannot be the same",
                    ));
                }
                DeployableVector::from_environment(
                    deployable_id,
                    source_environment_id,
                    target_environment_id,
                )
            }
        };

        let deployable = self.deployable_service.get_by_id(deployable_id).await?;
        self.check_environment_access(&deployable, target_environment_id)
            .await?;
        if let Some(source_environment_id) = source_environment_id {
            self.check_environment_access(&deployable, source_environment_id)
                .await?;
        }

        let existing = self
            .store
            .deployable_vector_for_deployable_source_target(
                deployable_id,
                source_type,
                source_environment_id,
                target_environment_id,
            )
            .await?;
        if existing.is_some() {
            return Err(DeployError::validation(format!(
                "deployable vector for deployable {deployable_id} source type {source_type} target env {target_environment_id} already exists"
            )));
        }

        self.store.insert_deployable_vector(&vector).await?;

        tracing::info!("deployable vector created: {:?}", vector);

        Ok(vector)
    }

    #[tracing::instrument(name = "service::vector::get_by_id", skip(self))]
    pub async fn get_by_id(&self, id: DeployableVectorId) -> anyhow::Result<DeployableVector> {
        self.store
            .deployable_vector(id)
            .await?
            .ok_or_else(|| DeployError::not_found(format!("Deployable Vector: {:?}", id.to_string())))
    }

    #[tracing::instrument(name = "service::vector::list", skip(self))]
    pub async fn list(&self, deployable_id: DeployableId) -> anyhow::Result<Vec<DeployableVector>> {
        let deployable = self.deployable_service.get_by_id(deployable_id).await?;

        self.store.deployable_vectors_for_deployable(deployable.id).await
    }

    /// Deletes the vector. A vector that already produced deployments is kept.
    #[tracing::instrument(name = "service::vector::delete", skip(self))]
    pub async fn delete(&self, id: DeployableVectorId) -> anyhow::Result<u64> {
        let vector = self.get_by_id(id).await?;

        let deleted = self.store.delete_deployable_vector(vector.id).await?;

        tracing::info!("deployable vector deleted: {}", vector.id);

        Ok(deleted)
    }
}
