use std::sync::Arc;

use shipyard_core::{
    Artifact, ArtifactType, BuildCompleteEvent, DeployableGroupId, DeployableId, DeploymentId,
    DeploymentStatusFilter, DeploymentTrait, EnvironmentId, ListDeploymentsRequest,
    ListDeploymentsResponse, PromoteGroupRequest, PromoteRequest, PromotionEvent,
    ReportBuildCompleteRequest,
};
use tonic::{Request, Response, Status};

use super::parse_id;
use crate::errors::status_from_error;
use crate::models::DeploymentStatus;
use crate::services::{DeploymentService, PromotionService};

#[derive(Debug)]
pub struct GrpcDeploymentService {
    service: Arc<DeploymentService>,
    promotion_service: Arc<PromotionService>,
}

impl GrpcDeploymentService {
    pub fn new(service: Arc<DeploymentService>, promotion_service: Arc<PromotionService>) -> Self {
        GrpcDeploymentService {
            service,
            promotion_service,
        }
    }

    async fn respond_with(&self, ids: &[DeploymentId]) -> Result<Response<ListDeploymentsResponse>, Status> {
        let deployments = self
            .service
            .get_by_ids(ids)
            .await
            .map_err(status_from_error)?;

        let response = ListDeploymentsResponse {
            deployments: deployments.into_iter().map(Into::into).collect(),
        };

        Ok(Response::new(response))
    }
}

fn status_filter(status: i32) -> Result<Option<DeploymentStatus>, Status> {
    let filter = DeploymentStatusFilter::from_i32(status)
        .ok_or_else(|| Status::invalid_argument(format!("unknown deployment status {status}")))?;

    Ok(match filter {
        DeploymentStatusFilter::Any => None,
        DeploymentStatusFilter::Pending => Some(DeploymentStatus::Pending),
        DeploymentStatusFilter::InProgress => Some(DeploymentStatus::InProgress),
        DeploymentStatusFilter::Complete => Some(DeploymentStatus::Complete),
        DeploymentStatusFilter::Failed => Some(DeploymentStatus::Failed),
    })
}

fn build_complete_event(request: ReportBuildCompleteRequest) -> Result<BuildCompleteEvent, Status> {
    if request.deployable_id.is_empty() {
        return Err(Status::invalid_argument("deployable id cannot be empty"));
    }
    if request.build_number.is_empty() {
        return Err(Status::invalid_argument("build number cannot be empty"));
    }
    if request.git_hash.is_empty() {
        return Err(Status::invalid_argument("git hash cannot be empty"));
    }

    let artifact = match ArtifactType::from_i32(request.artifact_type) {
        Some(ArtifactType::DockerImage) => {
            if request.docker_image.is_empty() {
                return Err(Status::invalid_argument(format!(
                    "image cannot be empty for artifacts of type {}",
                    Artifact::DOCKER_IMAGE
                )));
            }
            Artifact::docker_image(request.docker_image)
        }
        Some(ArtifactType::Unknown) | None => {
            return Err(Status::invalid_argument("unknown artifact type"));
        }
    };

    Ok(BuildCompleteEvent {
        deployable_id: request.deployable_id,
        build_number: request.build_number,
        git_hash: request.git_hash,
        artifact,
    })
}

#[tonic::async_trait]
impl DeploymentTrait for GrpcDeploymentService {
    #[tracing::instrument(name = "grpc::deployment::list")]
    async fn list(
        &self,
        request: Request<ListDeploymentsRequest>,
    ) -> Result<Response<ListDeploymentsResponse>, Status> {
        let request = request.into_inner();
        let deployable_id: DeployableId = parse_id("deployable_id", &request.deployable_id)?;
        let status = status_filter(request.status)?;

        let deployments = self
            .service
            .list(deployable_id, status)
            .await
            .map_err(status_from_error)?;

        let response = ListDeploymentsResponse {
            deployments: deployments.into_iter().map(Into::into).collect(),
        };

        Ok(Response::new(response))
    }

    #[tracing::instrument(name = "grpc::deployment::report_build_complete")]
    async fn report_build_complete(
        &self,
        request: Request<ReportBuildCompleteRequest>,
    ) -> Result<Response<ListDeploymentsResponse>, Status> {
        let event = build_complete_event(request.into_inner())?;

        let ids = self
            .promotion_service
            .process_build_complete(&event)
            .await
            .map_err(status_from_error)?;

        self.respond_with(&ids).await
    }

    #[tracing::instrument(name = "grpc::deployment::promote")]
    async fn promote(&self, request: Request<PromoteRequest>) -> Result<Response<ListDeploymentsResponse>, Status> {
        let deployment_id: DeploymentId = parse_id("deployment_id", &request.into_inner().deployment_id)?;

        let ids = self
            .promotion_service
            .process_promotion(&PromotionEvent {
                deployment_id: deployment_id.to_string(),
            })
            .await
            .map_err(status_from_error)?;

        self.respond_with(&ids).await
    }

    #[tracing::instrument(name = "grpc::deployment::promote_group")]
    async fn promote_group(
        &self,
        request: Request<PromoteGroupRequest>,
    ) -> Result<Response<ListDeploymentsResponse>, Status> {
        let request = request.into_inner();
        let group_id: DeployableGroupId = parse_id("deployable_group_id", &request.deployable_group_id)?;
        let environment_id: EnvironmentId = parse_id("environment_id", &request.environment_id)?;

        let ids = self
            .promotion_service
            .promote_group(group_id, environment_id, &request.build_number)
            .await
            .map_err(status_from_error)?;

        self.respond_with(&ids).await
    }
}
