use std::sync::Arc;

use shipyard_core::{
    CreateDeployableGroupRequest, DeployableGroupMessage, DeployableGroupTrait,
    ListDeployableGroupsRequest, ListDeployableGroupsResponse,
};
use tonic::{Request, Response, Status};

use crate::errors::status_from_error;
use crate::services::DeployableGroupService;

#[derive(Debug)]
pub struct GrpcDeployableGroupService {
    service: Arc<DeployableGroupService>,
}

impl GrpcDeployableGroupService {
    pub fn new(service: Arc<DeployableGroupService>) -> Self {
        GrpcDeployableGroupService { service }
    }
}

#[tonic::async_trait]
impl DeployableGroupTrait for GrpcDeployableGroupService {
    #[tracing::instrument(name = "grpc::group::create")]
    async fn create(
        &self,
        request: Request<CreateDeployableGroupRequest>,
    ) -> Result<Response<DeployableGroupMessage>, Status> {
        let request = request.into_inner();

        let group = self
            .service
            .create(&request.name, &request.description)
            .await
            .map_err(status_from_error)?;

        Ok(Response::new(group.into()))
    }

    #[tracing::instrument(name = "grpc::group::list")]
    async fn list(
        &self,
        _request: Request<ListDeployableGroupsRequest>,
    ) -> Result<Response<ListDeployableGroupsResponse>, Status> {
        let groups = self.service.list().await.map_err(status_from_error)?;

        let response = ListDeployableGroupsResponse {
            groups: groups.into_iter().map(Into::into).collect(),
        };

        Ok(Response::new(response))
    }
}

#[cfg(test)]
mod tests {
    use shipyard_core::{CreateDeployableGroupRequest, DeployableGroupTrait, ListDeployableGroupsRequest};
    use tonic::{Code, Request};

    use super::GrpcDeployableGroupService;
    use crate::test::get_service_fixture;

    #[tokio::test]
    async fn test_create_list_group() {
        let fixture = get_service_fixture().await;
        let group_grpc_service = GrpcDeployableGroupService::new(fixture.group_service.clone());

        let request = Request::new(CreateDeployableGroupRequest {
            name: "platform".to_string(),
            description: "platform services".to_string(),
        });
        let created = group_grpc_service.create(request).await.unwrap().into_inner();
        assert!(created.id.starts_with("deployableGroup_"));
        assert_eq!(created.name, "platform");

        let duplicate = Request::new(CreateDeployableGroupRequest {
            name: "platform".to_string(),
            description: String::new(),
        });
        let status = group_grpc_service.create(duplicate).await.unwrap_err();
        assert_eq!(status.code(), Code::InvalidArgument);

        let list_response = group_grpc_service
            .list(Request::new(ListDeployableGroupsRequest {}))
            .await
            .unwrap()
            .into_inner();

        // the fixture group plus the new one
        assert_eq!(list_response.groups.len(), 2);
    }
}
