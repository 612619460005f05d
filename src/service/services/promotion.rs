use std::sync::Arc;

use futures::FutureExt;
use shipyard_core::{
    Artifact, BuildCompleteEvent, DeployableGroupId, DeployableId, DeploymentId, EnvironmentId,
    PromotionEvent,
};

use super::{ConfigService, DeployableGroupService, DeployableService, EnvironmentService};
use crate::errors::DeployError;
use crate::models::{Deployment, DeploymentData, DeploymentStatus, VectorSourceType};
use crate::persistence::{transact, Store};

/// Turns build and promotion events into PENDING deployments along the
/// deployable's vectors.
#[derive(Debug)]
pub struct PromotionService {
    pub store: Arc<dyn Store>,

    pub group_service: Arc<DeployableGroupService>,
    pub environment_service: Arc<EnvironmentService>,
    pub deployable_service: Arc<DeployableService>,
}

fn deployment_data(artifact: &Artifact) -> anyhow::Result<DeploymentData> {
    match artifact {
        Artifact::DockerImage { image } if image.is_empty() => Err(DeployError::validation(format!(
            "image cannot be empty for artifacts of type {}",
            Artifact::DOCKER_IMAGE
        ))),
        Artifact::DockerImage { image } => Ok(DeploymentData::ContainerTask {
            image: image.clone(),
        }),
    }
}

impl PromotionService {
    /// Creates one PENDING deployment per BUILD vector of the deployable. All
    /// of them are inserted in one transaction; a target without exactly one
    /// ACTIVE config aborts the whole event.
    #[tracing::instrument(name = "service::promotion::build_complete", skip(self))]
    pub async fn process_build_complete(&self, event: &BuildCompleteEvent) -> anyhow::Result<Vec<DeploymentId>> {
        if event.deployable_id.is_empty() {
            return Err(DeployError::validation("deployable id cannot be empty"));
        }
        let deployable_id: DeployableId = event.deployable_id.parse().map_err(|_| {
            DeployError::validation(format!("deployable id {:?} is invalid", event.deployable_id))
        })?;
        if event.build_number.is_empty() {
            return Err(DeployError::validation("build number cannot be empty"));
        }
        let data = deployment_data(&event.artifact)?;

        let deployable = self.deployable_service.get_by_id(deployable_id).await?;

        let build_number = event.build_number.clone();
        let git_hash = event.git_hash.clone();
        let ids = transact(&*self.store, move |tx| {
            async move {
                let vectors = tx
                    .deployable_vectors_for_deployable_and_source(deployable_id, VectorSourceType::Build)
                    .await?;

                let mut ids = Vec::with_capacity(vectors.len());
                for vector in &vectors {
                    let config =
                        ConfigService::active_deployable_config(tx, deployable_id, vector.target_environment_id)
                            .await?;

                    let deployment =
                        Deployment::pending(data.clone(), &build_number, &git_hash, vector, config.id);
                    ids.push(tx.insert_deployment(&deployment).await?);
                }

                Ok(ids)
            }
            .boxed()
        })
        .await?;

        if ids.is_empty() {
            tracing::info!("no build vectors for deployable {}, nothing to deploy", deployable.name);
        } else {
            tracing::info!(
                "build {} of {} produced {} deployments",
                event.build_number,
                deployable.name,
                ids.len()
            );
        }

        Ok(ids)
    }

    /// Promotes a COMPLETE deployment one hop along the ENVIRONMENT_ID vectors
    /// leaving its environment.
    #[tracing::instrument(name = "service::promotion::promote", skip(self))]
    pub async fn process_promotion(&self, event: &PromotionEvent) -> anyhow::Result<Vec<DeploymentId>> {
        if event.deployment_id.is_empty() {
            return Err(DeployError::validation("deployment id cannot be empty"));
        }
        let deployment_id: DeploymentId = event.deployment_id.parse().map_err(|_| {
            DeployError::validation(format!("deployment id {:?} is invalid", event.deployment_id))
        })?;

        let source = self.store.deployment(deployment_id).await?.ok_or_else(|| {
            DeployError::not_found(format!("Deployment: {:?}", deployment_id.to_string()))
        })?;

        if source.status != DeploymentStatus::Complete {
            return Err(DeployError::validation(format!(
                "deployment {} is {} and cannot be promoted, only {} deployments can",
                source.id,
                source.status,
                DeploymentStatus::Complete
            )));
        }

        let source_id = source.id;
        let ids = transact(&*self.store, move |tx| {
            async move {
                let vectors = tx
                    .deployable_vectors_for_deployable_and_source_environment(
                        source.deployable_id,
                        source.environment_id,
                    )
                    .await?;

                let mut ids = Vec::with_capacity(vectors.len());
                for vector in &vectors {
                    let config = ConfigService::active_deployable_config(
                        tx,
                        source.deployable_id,
                        vector.target_environment_id,
                    )
                    .await?;

                    let deployment = Deployment::pending(
                        source.data.clone(),
                        &source.build_number,
                        &source.git_hash,
                        vector,
                        config.id,
                    );
                    ids.push(tx.insert_deployment(&deployment).await?);
                }

                Ok(ids)
            }
            .boxed()
        })
        .await?;

        tracing::info!("deployment {} promoted into {} deployments", source_id, ids.len());

        Ok(ids)
    }

    /// Promotes the latest COMPLETE deployment of `build_number` in the
    /// environment for every deployable of the group.
    #[tracing::instrument(name = "service::promotion::promote_group", skip(self))]
    pub async fn promote_group(
        &self,
        group_id: DeployableGroupId,
        environment_id: EnvironmentId,
        build_number: &str,
    ) -> anyhow::Result<Vec<DeploymentId>> {
        if build_number.is_empty() {
            return Err(DeployError::validation("build number cannot be empty"));
        }
        if let Err(err) = build_number.parse::<i64>() {
            return Err(DeployError::validation(format!(
                "cannot parse build number {build_number}: {err}"
            )));
        }

        let group = self.group_service.get_by_id(group_id).await?;
        let environment = self.environment_service.get_by_id(environment_id).await?;

        let sources = self
            .store
            .deployments_for_deployment_group(group.id, environment.id, build_number)
            .await?;
        if sources.is_empty() {
            return Err(DeployError::failed_precondition(
                "No existing deployments matching the criteria were found",
            ));
        }

        let mut ids = vec![];
        for source in sources {
            let promoted = self
                .process_promotion(&PromotionEvent {
                    deployment_id: source.id.to_string(),
                })
                .await?;
            ids.extend(promoted);
        }

        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use shipyard_core::test::get_build_complete_fixture;

    use super::*;
    use crate::errors::{deploy_error, is_not_found, is_validation};
    use crate::test::{get_service_fixture, seed_build_vectors, seed_deployable_configs};

    #[tokio::test]
    async fn test_build_complete_fans_out_per_vector() {
        let fixture = get_service_fixture().await;
        let configs = seed_deployable_configs(&fixture, &[fixture.dev.id, fixture.staging.id]).await;
        let vectors = seed_build_vectors(&fixture, &[fixture.dev.id, fixture.staging.id]).await;

        let event = get_build_complete_fixture(&fixture.deployable.id.to_string(), None);
        let ids = fixture
            .promotion_service
            .process_build_complete(&event)
            .await
            .unwrap();
        assert_eq!(ids.len(), 2);

        let deployments = fixture.deployment_service.get_by_ids(&ids).await.unwrap();
        for ((deployment, config), vector) in deployments.iter().zip(&configs).zip(&vectors) {
            assert_eq!(deployment.status, DeploymentStatus::Pending);
            assert_eq!(deployment.environment_id, vector.target_environment_id);
            assert_eq!(deployment.deployable_config_id, config.id);
            assert_eq!(deployment.deployable_vector_id, vector.id);
            assert_eq!(deployment.build_number, "42");
            assert_eq!(deployment.git_hash, "abc");
            assert_eq!(
                deployment.data,
                DeploymentData::ContainerTask {
                    image: "r/svc-a:42".to_string()
                }
            );
        }
        assert!(deployments[0].deployment_number < deployments[1].deployment_number);
    }

    #[tokio::test]
    async fn test_build_complete_without_vectors_is_a_noop() {
        let fixture = get_service_fixture().await;

        let event = get_build_complete_fixture(&fixture.deployable.id.to_string(), None);
        let ids = fixture
            .promotion_service
            .process_build_complete(&event)
            .await
            .unwrap();

        assert!(ids.is_empty());
    }

    #[tokio::test]
    async fn test_build_complete_validates_event() {
        let fixture = get_service_fixture().await;
        let promotion_service = &fixture.promotion_service;

        let mut event = get_build_complete_fixture("deployable_nope", None);
        assert!(is_validation(&promotion_service.process_build_complete(&event).await.unwrap_err()));

        event.deployable_id = DeployableId::new().to_string();
        assert!(is_not_found(&promotion_service.process_build_complete(&event).await.unwrap_err()));

        event.deployable_id = fixture.deployable.id.to_string();
        event.build_number = String::new();
        assert!(is_validation(&promotion_service.process_build_complete(&event).await.unwrap_err()));

        event.build_number = "42".to_string();
        event.artifact = Artifact::docker_image("");
        assert!(is_validation(&promotion_service.process_build_complete(&event).await.unwrap_err()));
    }

    #[tokio::test]
    async fn test_promotion_walks_environment_vectors() {
        let fixture = get_service_fixture().await;
        seed_deployable_configs(&fixture, &[fixture.dev.id, fixture.staging.id]).await;
        seed_build_vectors(&fixture, &[fixture.dev.id]).await;
        let promotion_vector = fixture
            .vector_service
            .create(
                fixture.deployable.id,
                VectorSourceType::EnvironmentId,
                Some(fixture.dev.id),
                fixture.staging.id,
            )
            .await
            .unwrap();

        let event = get_build_complete_fixture(&fixture.deployable.id.to_string(), None);
        let ids = fixture
            .promotion_service
            .process_build_complete(&event)
            .await
            .unwrap();
        let dev_deployment = ids[0];

        let promotion = PromotionEvent {
            deployment_id: dev_deployment.to_string(),
        };
        let err = fixture
            .promotion_service
            .process_promotion(&promotion)
            .await
            .unwrap_err();
        assert!(is_validation(&err));

        fixture
            .store
            .set_deployment_status(dev_deployment, DeploymentStatus::Complete)
            .await
            .unwrap();

        let promoted = fixture
            .promotion_service
            .process_promotion(&promotion)
            .await
            .unwrap();
        assert_eq!(promoted.len(), 1);

        let deployment = fixture.deployment_service.get_by_id(promoted[0]).await.unwrap();
        assert_eq!(deployment.environment_id, fixture.staging.id);
        assert_eq!(deployment.deployable_vector_id, promotion_vector.id);
        assert_eq!(deployment.status, DeploymentStatus::Pending);
        assert_eq!(deployment.build_number, "42");
    }

    #[tokio::test]
    async fn test_promote_group() {
        let fixture = get_service_fixture().await;
        seed_deployable_configs(&fixture, &[fixture.dev.id, fixture.staging.id]).await;
        seed_build_vectors(&fixture, &[fixture.dev.id]).await;
        fixture
            .vector_service
            .create(
                fixture.deployable.id,
                VectorSourceType::EnvironmentId,
                Some(fixture.dev.id),
                fixture.staging.id,
            )
            .await
            .unwrap();

        let promotion_service = &fixture.promotion_service;

        let err = promotion_service
            .promote_group(fixture.group.id, fixture.dev.id, "42")
            .await
            .unwrap_err();
        assert!(matches!(
            deploy_error(&err),
            Some(DeployError::FailedPrecondition(_))
        ));

        let err = promotion_service
            .promote_group(fixture.group.id, fixture.dev.id, "forty-two")
            .await
            .unwrap_err();
        assert!(is_validation(&err));

        let event = get_build_complete_fixture(&fixture.deployable.id.to_string(), None);
        let ids = promotion_service.process_build_complete(&event).await.unwrap();
        fixture
            .store
            .set_deployment_status(ids[0], DeploymentStatus::Complete)
            .await
            .unwrap();

        let promoted = promotion_service
            .promote_group(fixture.group.id, fixture.dev.id, "42")
            .await
            .unwrap();
        assert_eq!(promoted.len(), 1);
    }
}
