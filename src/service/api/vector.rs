use std::sync::Arc;

use shipyard_core::{
    CreateDeployableVectorRequest, DeleteDeployableVectorResponse, DeployableId,
    DeployableVectorId, DeployableVectorIdRequest, DeployableVectorMessage, EnvironmentId,
    ListDeployableVectorsRequest, ListDeployableVectorsResponse,
    VectorSourceType as VectorSourceTypeMessage, VectorTrait,
};
use tonic::{Request, Response, Status};

use super::{parse_id, parse_optional_id};
use crate::errors::status_from_error;
use crate::models::VectorSourceType;
use crate::services::VectorService;

#[derive(Debug)]
pub struct GrpcVectorService {
    service: Arc<VectorService>,
}

impl GrpcVectorService {
    pub fn new(service: Arc<VectorService>) -> Self {
        GrpcVectorService { service }
    }
}

#[tonic::async_trait]
impl VectorTrait for GrpcVectorService {
    #[tracing::instrument(name = "grpc::vector::create")]
    async fn create(
        &self,
        request: Request<CreateDeployableVectorRequest>,
    ) -> Result<Response<DeployableVectorMessage>, Status> {
        let request = request.into_inner();
        let deployable_id: DeployableId = parse_id("deployable_id", &request.deployable_id)?;
        let target_environment_id: EnvironmentId =
            parse_id("target_environment_id", &request.target_environment_id)?;
        let source_environment_id: Option<EnvironmentId> =
            parse_optional_id("source_environment_id", &request.source_environment_id)?;

        let source_type: VectorSourceType = VectorSourceTypeMessage::from_i32(request.source_type)
            .ok_or_else(|| {
                Status::invalid_argument(format!("unknown vector source type {}", request.source_type))
            })?
            .into();

        let vector = self
            .service
            .create(deployable_id, source_type, source_environment_id, target_environment_id)
            .await
            .map_err(status_from_error)?;

        Ok(Response::new(vector.into()))
    }

    #[tracing::instrument(name = "grpc::vector::list")]
    async fn list(
        &self,
        request: Request<ListDeployableVectorsRequest>,
    ) -> Result<Response<ListDeployableVectorsResponse>, Status> {
        let deployable_id: DeployableId = parse_id("deployable_id", &request.into_inner().deployable_id)?;

        let vectors = self
            .service
            .list(deployable_id)
            .await
            .map_err(status_from_error)?;

        let response = ListDeployableVectorsResponse {
            vectors: vectors.into_iter().map(Into::into).collect(),
        };

        Ok(Response::new(response))
    }

    #[tracing::instrument(name = "grpc::vector::delete")]
    async fn delete(
        &self,
        request: Request<DeployableVectorIdRequest>,
    ) -> Result<Response<DeleteDeployableVectorResponse>, Status> {
        let vector_id: DeployableVectorId =
            parse_id("deployable_vector_id", &request.into_inner().deployable_vector_id)?;

        let deleted = self
            .service
            .delete(vector_id)
            .await
            .map_err(status_from_error)?;

        Ok(Response::new(DeleteDeployableVectorResponse { deleted }))
    }
}
