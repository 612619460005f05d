use std::collections::HashSet;

use async_trait::async_trait;
use shipyard_core::{DeployableGroupId, DeployableId, DeploymentId, EnvironmentId};

use super::{MemoryState, MemoryStore};
use crate::errors::DeployError;
use crate::models::{Deployment, DeploymentStatus};
use crate::persistence::DeploymentPersistence;

impl MemoryState {
    fn deployments_by_number(&self) -> Vec<&Deployment> {
        let mut deployments: Vec<&Deployment> = self.deployments.values().collect();
        deployments.sort_by_key(|deployment| deployment.deployment_number);

        deployments
    }
}

#[async_trait]
impl DeploymentPersistence for MemoryStore {
    async fn insert_deployment(&self, deployment: &Deployment) -> anyhow::Result<DeploymentId> {
        let mut deployment = deployment.clone();

        self.with_state(move |state| {
            let id = deployment.id;
            if state.deployments.contains_key(&id.value()) {
                return Err(DeployError::validation(format!(
                    "deployment {id} already exists"
                )));
            }

            state.last_deployment_number += 1;
            deployment.deployment_number = state.last_deployment_number;
            state.deployments.insert(id.value(), deployment);

            Ok(id)
        })
        .await
    }

    async fn deployment(&self, id: DeploymentId) -> anyhow::Result<Option<Deployment>> {
        self.with_state(move |state| Ok(state.deployments.get(&id.value()).cloned()))
            .await
    }

    async fn deployments(&self, deployable_id: DeployableId) -> anyhow::Result<Vec<Deployment>> {
        self.with_state(move |state| {
            Ok(state
                .deployments_by_number()
                .into_iter()
                .filter(|deployment| deployment.deployable_id == deployable_id)
                .cloned()
                .collect())
        })
        .await
    }

    async fn deployments_for_status(
        &self,
        deployable_id: DeployableId,
        status: DeploymentStatus,
    ) -> anyhow::Result<Vec<Deployment>> {
        self.with_state(move |state| {
            Ok(state
                .deployments_by_number()
                .into_iter()
                .filter(|deployment| deployment.deployable_id == deployable_id && deployment.status == status)
                .cloned()
                .collect())
        })
        .await
    }

    async fn delete_deployment(&self, id: DeploymentId) -> anyhow::Result<u64> {
        self.with_state(move |state| Ok(state.deployments.remove(&id.value()).map_or(0, |_| 1)))
            .await
    }

    async fn deployments_for_deployment_group(
        &self,
        group_id: DeployableGroupId,
        environment_id: EnvironmentId,
        build_number: &str,
    ) -> anyhow::Result<Vec<Deployment>> {
        let build_number = build_number.to_string();

        self.with_state(move |state| {
            let deployables: HashSet<DeployableId> = state
                .deployables
                .values()
                .filter(|deployable| deployable.deployable_group_id == group_id)
                .map(|deployable| deployable.id)
                .collect();

            // walk newest first so the first hit per deployable is its latest
            let mut seen = HashSet::new();
            let mut latest: Vec<Deployment> = state
                .deployments_by_number()
                .into_iter()
                .rev()
                .filter(|deployment| {
                    deployables.contains(&deployment.deployable_id)
                        && deployment.environment_id == environment_id
                        && deployment.build_number == build_number
                        && deployment.status == DeploymentStatus::Complete
                })
                .filter(|deployment| seen.insert(deployment.deployable_id))
                .cloned()
                .collect();
            latest.reverse();

            Ok(latest)
        })
        .await
    }

    async fn active_deployment(
        &self,
        deployable_id: DeployableId,
        environment_id: EnvironmentId,
    ) -> anyhow::Result<Option<Deployment>> {
        self.with_state(move |state| {
            Ok(state
                .deployments_by_number()
                .into_iter()
                .rev()
                .find(|deployment| {
                    deployment.deployable_id == deployable_id
                        && deployment.environment_id == environment_id
                        && deployment.status == DeploymentStatus::Complete
                })
                .cloned())
        })
        .await
    }

    async fn next_pending_deployment(&self) -> anyhow::Result<Option<Deployment>> {
        self.with_state(|state| {
            let busy: HashSet<(DeployableId, EnvironmentId)> = state
                .deployments
                .values()
                .filter(|deployment| deployment.status == DeploymentStatus::InProgress)
                .map(|deployment| (deployment.deployable_id, deployment.environment_id))
                .collect();

            // in number order, the first pending row seen for a target is that target's oldest
            Ok(state
                .deployments_by_number()
                .into_iter()
                .find(|deployment| {
                    deployment.status == DeploymentStatus::Pending
                        && !busy.contains(&(deployment.deployable_id, deployment.environment_id))
                })
                .cloned())
        })
        .await
    }

    async fn set_deployment_status(&self, id: DeploymentId, status: DeploymentStatus) -> anyhow::Result<u64> {
        self.with_state(move |state| match state.deployments.get_mut(&id.value()) {
            Some(deployment) => {
                deployment.status = status;
                Ok(1)
            }
            None => Ok(0),
        })
        .await
    }
}
