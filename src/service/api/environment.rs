use std::sync::Arc;

use shipyard_core::{
    CreateEnvironmentRequest, DeployableGroupId, EnvironmentId, EnvironmentMessage,
    EnvironmentTrait, ListEnvironmentsBy, ListEnvironmentsRequest, ListEnvironmentsResponse,
};
use tonic::{Request, Response, Status};

use super::parse_id;
use crate::errors::status_from_error;
use crate::services::EnvironmentService;

#[derive(Debug)]
pub struct GrpcEnvironmentService {
    service: Arc<EnvironmentService>,
}

impl GrpcEnvironmentService {
    pub fn new(service: Arc<EnvironmentService>) -> Self {
        GrpcEnvironmentService { service }
    }
}

#[tonic::async_trait]
impl EnvironmentTrait for GrpcEnvironmentService {
    #[tracing::instrument(name = "grpc::environment::create")]
    async fn create(
        &self,
        request: Request<CreateEnvironmentRequest>,
    ) -> Result<Response<EnvironmentMessage>, Status> {
        let request = request.into_inner();
        let group_id: DeployableGroupId = parse_id("deployable_group_id", &request.deployable_group_id)?;

        let environment = self
            .service
            .create(group_id, &request.name, &request.description, request.is_prod)
            .await
            .map_err(status_from_error)?;

        Ok(Response::new(environment.into()))
    }

    #[tracing::instrument(name = "grpc::environment::list")]
    async fn list(
        &self,
        request: Request<ListEnvironmentsRequest>,
    ) -> Result<Response<ListEnvironmentsResponse>, Status> {
        let environments = match request.into_inner().by {
            Some(ListEnvironmentsBy::EnvironmentId(environment_id)) => {
                let environment_id: EnvironmentId = parse_id("environment_id", &environment_id)?;
                let environment = self
                    .service
                    .get_by_id(environment_id)
                    .await
                    .map_err(status_from_error)?;

                vec![environment]
            }
            Some(ListEnvironmentsBy::DeployableGroupId(group_id)) => {
                let group_id: DeployableGroupId = parse_id("deployable_group_id", &group_id)?;

                self.service
                    .list_for_group(group_id)
                    .await
                    .map_err(status_from_error)?
            }
            None => {
                return Err(Status::invalid_argument(
                    "either environment_id or deployable_group_id is required",
                ))
            }
        };

        let response = ListEnvironmentsResponse {
            environments: environments.into_iter().map(Into::into).collect(),
        };

        Ok(Response::new(response))
    }
}

#[cfg(test)]
mod tests {
    use shipyard_core::{
        CreateEnvironmentRequest, DeployableGroupId, EnvironmentTrait, ListEnvironmentsBy,
        ListEnvironmentsRequest,
    };
    use tonic::{Code, Request};

    use super::GrpcEnvironmentService;
    use crate::test::get_service_fixture;

    #[tokio::test]
    async fn test_create_list_environment() {
        let fixture = get_service_fixture().await;
        let environment_grpc_service = GrpcEnvironmentService::new(fixture.environment_service.clone());

        let request = Request::new(CreateEnvironmentRequest {
            deployable_group_id: fixture.group.id.to_string(),
            name: "prod".to_string(),
            description: "production".to_string(),
            is_prod: true,
        });
        let created = environment_grpc_service.create(request).await.unwrap().into_inner();
        assert!(created.is_prod);
        assert_eq!(created.deployable_group_id, fixture.group.id.to_string());

        let by_group = environment_grpc_service
            .list(Request::new(ListEnvironmentsRequest {
                by: Some(ListEnvironmentsBy::DeployableGroupId(fixture.group.id.to_string())),
            }))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(by_group.environments.len(), 3);

        let by_id = environment_grpc_service
            .list(Request::new(ListEnvironmentsRequest {
                by: Some(ListEnvironmentsBy::EnvironmentId(created.id.clone())),
            }))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(by_id.environments.len(), 1);
        assert_eq!(by_id.environments[0].name, "prod");
    }

    #[tokio::test]
    async fn test_create_environment_validation() {
        let fixture = get_service_fixture().await;
        let environment_grpc_service = GrpcEnvironmentService::new(fixture.environment_service.clone());

        let malformed = Request::new(CreateEnvironmentRequest {
            deployable_group_id: "group-1".to_string(),
            name: "qa".to_string(),
            ..Default::default()
        });
        let status = environment_grpc_service.create(malformed).await.unwrap_err();
        assert_eq!(status.code(), Code::InvalidArgument);

        let missing_group = Request::new(CreateEnvironmentRequest {
            deployable_group_id: DeployableGroupId::new().to_string(),
            name: "qa".to_string(),
            ..Default::default()
        });
        let status = environment_grpc_service.create(missing_group).await.unwrap_err();
        assert_eq!(status.code(), Code::NotFound);

        let duplicate = Request::new(CreateEnvironmentRequest {
            deployable_group_id: fixture.group.id.to_string(),
            name: "dev".to_string(),
            ..Default::default()
        });
        let status = environment_grpc_service.create(duplicate).await.unwrap_err();
        assert_eq!(status.code(), Code::InvalidArgument);

        let status = environment_grpc_service
            .list(Request::new(ListEnvironmentsRequest { by: None }))
            .await
            .unwrap_err();
        assert_eq!(status.code(), Code::InvalidArgument);
    }
}
