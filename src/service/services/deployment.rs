use std::sync::Arc;

use shipyard_core::{DeployableId, DeploymentId};

use super::DeployableService;
use crate::errors::DeployError;
use crate::models::{Deployment, DeploymentStatus};
use crate::persistence::Store;

#[derive(Debug)]
pub struct DeploymentService {
    pub store: Arc<dyn Store>,

    pub deployable_service: Arc<DeployableService>,
}

impl DeploymentService {
    #[tracing::instrument(name = "service::deployment::get_by_id", skip(self))]
    pub async fn get_by_id(&self, id: DeploymentId) -> anyhow::Result<Deployment> {
        self.store
            .deployment(id)
            .await?
            .ok_or_else(|| DeployError::not_found(format!("Deployment: {:?}", id.to_string())))
    }

    /// Fetches deployments in the order of `ids`.
    #[tracing::instrument(name = "service::deployment::get_by_ids", skip(self))]
    pub async fn get_by_ids(&self, ids: &[DeploymentId]) -> anyhow::Result<Vec<Deployment>> {
        let mut deployments = Vec::with_capacity(ids.len());
        for id in ids {
            deployments.push(self.get_by_id(*id).await?);
        }

        Ok(deployments)
    }

    /// Deployments of the deployable ordered by deployment number. `None`
    /// returns every status.
    #[tracing::instrument(name = "service::deployment::list", skip(self))]
    pub async fn list(
        &self,
        deployable_id: DeployableId,
        status: Option<DeploymentStatus>,
    ) -> anyhow::Result<Vec<Deployment>> {
        let deployable = self.deployable_service.get_by_id(deployable_id).await?;

        match status {
            Some(status) => self.store.deployments_for_status(deployable.id, status).await,
            None => self.store.deployments(deployable.id).await,
        }
    }
}
