use std::sync::Arc;

use shipyard_core::{
    CreateDeployableRequest, DeployableGroupId, DeployableId, DeployableMessage, DeployableTrait,
    ListDeployablesBy, ListDeployablesRequest, ListDeployablesResponse,
};
use tonic::{Request, Response, Status};

use super::parse_id;
use crate::errors::status_from_error;
use crate::services::DeployableService;

#[derive(Debug)]
pub struct GrpcDeployableService {
    service: Arc<DeployableService>,
}

impl GrpcDeployableService {
    pub fn new(service: Arc<DeployableService>) -> Self {
        GrpcDeployableService { service }
    }
}

#[tonic::async_trait]
impl DeployableTrait for GrpcDeployableService {
    #[tracing::instrument(name = "grpc::deployable::create")]
    async fn create(
        &self,
        request: Request<CreateDeployableRequest>,
    ) -> Result<Response<DeployableMessage>, Status> {
        let request = request.into_inner();
        let group_id: DeployableGroupId = parse_id("deployable_group_id", &request.deployable_group_id)?;

        let deployable = self
            .service
            .create(group_id, &request.name, &request.description, &request.git_url)
            .await
            .map_err(status_from_error)?;

        Ok(Response::new(deployable.into()))
    }

    #[tracing::instrument(name = "grpc::deployable::list")]
    async fn list(
        &self,
        request: Request<ListDeployablesRequest>,
    ) -> Result<Response<ListDeployablesResponse>, Status> {
        let deployables = match request.into_inner().by {
            Some(ListDeployablesBy::DeployableId(deployable_id)) => {
                let deployable_id: DeployableId = parse_id("deployable_id", &deployable_id)?;
                let deployable = self
                    .service
                    .get_by_id(deployable_id)
                    .await
                    .map_err(status_from_error)?;

                vec![deployable]
            }
            Some(ListDeployablesBy::DeployableGroupId(group_id)) => {
                let group_id: DeployableGroupId = parse_id("deployable_group_id", &group_id)?;

                self.service
                    .list_for_group(group_id)
                    .await
                    .map_err(status_from_error)?
            }
            None => {
                return Err(Status::invalid_argument(
                    "either deployable_id or deployable_group_id is required",
                ))
            }
        };

        let response = ListDeployablesResponse {
            deployables: deployables.into_iter().map(Into::into).collect(),
        };

        Ok(Response::new(response))
    }
}
