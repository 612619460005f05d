use std::sync::Arc;

use shipyard_core::{
    ConfigTrait, CreateDeployableConfigRequest, CreateEnvironmentConfigRequest, DeployableConfigId,
    DeployableConfigMessage, DeployableId, EnvironmentConfigId, EnvironmentConfigMessage,
    EnvironmentId, ListDeployableConfigsRequest, ListDeployableConfigsResponse,
    ListEnvironmentConfigsRequest, ListEnvironmentConfigsResponse,
};
use tonic::{Request, Response, Status};

use super::{parse_id, parse_optional_id};
use crate::errors::status_from_error;
use crate::models::ConfigStatus;
use crate::services::ConfigService;

#[derive(Debug)]
pub struct GrpcConfigService {
    service: Arc<ConfigService>,
}

impl GrpcConfigService {
    pub fn new(service: Arc<ConfigService>) -> Self {
        GrpcConfigService { service }
    }
}

// An empty status filter lists ACTIVE configs.
fn parse_status(status: &str) -> Result<ConfigStatus, Status> {
    if status.is_empty() {
        return Ok(ConfigStatus::Active);
    }

    status.parse().map_err(status_from_error)
}

#[tonic::async_trait]
impl ConfigTrait for GrpcConfigService {
    #[tracing::instrument(name = "grpc::config::create_deployable_config")]
    async fn create_deployable_config(
        &self,
        request: Request<CreateDeployableConfigRequest>,
    ) -> Result<Response<DeployableConfigMessage>, Status> {
        let request = request.into_inner();
        let deployable_id: DeployableId = parse_id("deployable_id", &request.deployable_id)?;
        let environment_id: EnvironmentId = parse_id("environment_id", &request.environment_id)?;
        let source_config_id: Option<DeployableConfigId> =
            parse_optional_id("source_config_id", &request.source_config_id)?;

        let (config, values) = self
            .service
            .create_deployable_config(
                deployable_id,
                environment_id,
                source_config_id,
                &request.omit_from_source,
                &request.values,
            )
            .await
            .map_err(status_from_error)?;

        Ok(Response::new(config.into_message(values)))
    }

    #[tracing::instrument(name = "grpc::config::create_environment_config")]
    async fn create_environment_config(
        &self,
        request: Request<CreateEnvironmentConfigRequest>,
    ) -> Result<Response<EnvironmentConfigMessage>, Status> {
        let request = request.into_inner();
        let environment_id: EnvironmentId = parse_id("environment_id", &request.environment_id)?;
        let source_config_id: Option<EnvironmentConfigId> =
            parse_optional_id("source_config_id", &request.source_config_id)?;

        let (config, values) = self
            .service
            .create_environment_config(
                environment_id,
                source_config_id,
                &request.omit_from_source,
                &request.values,
            )
            .await
            .map_err(status_from_error)?;

        Ok(Response::new(config.into_message(values)))
    }

    #[tracing::instrument(name = "grpc::config::list_deployable_configs")]
    async fn list_deployable_configs(
        &self,
        request: Request<ListDeployableConfigsRequest>,
    ) -> Result<Response<ListDeployableConfigsResponse>, Status> {
        let request = request.into_inner();
        let deployable_id: DeployableId = parse_id("deployable_id", &request.deployable_id)?;
        let environment_id: EnvironmentId = parse_id("environment_id", &request.environment_id)?;
        let status = parse_status(&request.status)?;

        let configs = self
            .service
            .list_deployable_configs(deployable_id, environment_id, status)
            .await
            .map_err(status_from_error)?;

        let response = ListDeployableConfigsResponse {
            configs: configs
                .into_iter()
                .map(|(config, values)| config.into_message(values))
                .collect(),
        };

        Ok(Response::new(response))
    }

    #[tracing::instrument(name = "grpc::config::list_environment_configs")]
    async fn list_environment_configs(
        &self,
        request: Request<ListEnvironmentConfigsRequest>,
    ) -> Result<Response<ListEnvironmentConfigsResponse>, Status> {
        let request = request.into_inner();
        let environment_id: EnvironmentId = parse_id("environment_id", &request.environment_id)?;
        let status = parse_status(&request.status)?;

        let configs = self
            .service
            .list_environment_configs(environment_id, status)
            .await
            .map_err(status_from_error)?;

        let response = ListEnvironmentConfigsResponse {
            configs: configs
                .into_iter()
                .map(|(config, values)| config.into_message(values))
                .collect(),
        };

        Ok(Response::new(response))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use shipyard_core::test::get_deployable_config_values_fixture;
    use shipyard_core::{
        ConfigTrait, CreateDeployableConfigRequest, CreateEnvironmentConfigRequest,
        ListDeployableConfigsRequest, ListEnvironmentConfigsRequest,
    };
    use tonic::{Code, Request};

    use super::GrpcConfigService;
    use crate::test::get_service_fixture;

    #[tokio::test]
    async fn test_deployable_config_versions() {
        let fixture = get_service_fixture().await;
        let config_grpc_service = GrpcConfigService::new(fixture.config_service.clone());

        let first = config_grpc_service
            .create_deployable_config(Request::new(CreateDeployableConfigRequest {
                deployable_id: fixture.deployable.id.to_string(),
                environment_id: fixture.dev.id.to_string(),
                values: get_deployable_config_values_fixture(),
                ..Default::default()
            }))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(first.status, "ACTIVE");

        let second = config_grpc_service
            .create_deployable_config(Request::new(CreateDeployableConfigRequest {
                deployable_id: fixture.deployable.id.to_string(),
                environment_id: fixture.dev.id.to_string(),
                source_config_id: first.id.clone(),
                omit_from_source: vec!["ECS_CONFIG_PORT_MAPPING_0".to_string()],
                values: HashMap::from([("LOG_LEVEL".to_string(), "debug".to_string())]),
            }))
            .await
            .unwrap()
            .into_inner();

        assert_eq!(second.values.len(), 3);
        assert_eq!(second.values["LOG_LEVEL"], "debug");
        assert_eq!(second.values["ECS_CONFIG_CPU"], "256");

        let active = config_grpc_service
            .list_deployable_configs(Request::new(ListDeployableConfigsRequest {
                deployable_id: fixture.deployable.id.to_string(),
                environment_id: fixture.dev.id.to_string(),
                status: String::new(),
            }))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(active.configs.len(), 1);
        assert_eq!(active.configs[0].id, second.id);

        let deprecated = config_grpc_service
            .list_deployable_configs(Request::new(ListDeployableConfigsRequest {
                deployable_id: fixture.deployable.id.to_string(),
                environment_id: fixture.dev.id.to_string(),
                status: "deprecated".to_string(),
            }))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(deprecated.configs.len(), 1);
        assert_eq!(deprecated.configs[0].id, first.id);

        let status = config_grpc_service
            .list_deployable_configs(Request::new(ListDeployableConfigsRequest {
                deployable_id: fixture.deployable.id.to_string(),
                environment_id: fixture.dev.id.to_string(),
                status: "RETIRED".to_string(),
            }))
            .await
            .unwrap_err();
        assert_eq!(status.code(), Code::InvalidArgument);
    }

    #[tokio::test]
    async fn test_environment_config_versions() {
        let fixture = get_service_fixture().await;
        let config_grpc_service = GrpcConfigService::new(fixture.config_service.clone());

        let first = config_grpc_service
            .create_environment_config(Request::new(CreateEnvironmentConfigRequest {
                environment_id: fixture.staging.id.to_string(),
                values: HashMap::from([("REGION".to_string(), "us-east-1".to_string())]),
                ..Default::default()
            }))
            .await
            .unwrap()
            .into_inner();

        config_grpc_service
            .create_environment_config(Request::new(CreateEnvironmentConfigRequest {
                environment_id: fixture.staging.id.to_string(),
                source_config_id: first.id.clone(),
                omit_from_source: vec![],
                values: HashMap::from([("TIER".to_string(), "2".to_string())]),
            }))
            .await
            .unwrap();

        let active = config_grpc_service
            .list_environment_configs(Request::new(ListEnvironmentConfigsRequest {
                environment_id: fixture.staging.id.to_string(),
                status: "ACTIVE".to_string(),
            }))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(active.configs.len(), 1);
        assert_eq!(active.configs[0].values.len(), 2);

        let status = config_grpc_service
            .create_environment_config(Request::new(CreateEnvironmentConfigRequest {
                environment_id: fixture.staging.id.to_string(),
                source_config_id: "environmentConfig_1".to_string(),
                ..Default::default()
            }))
            .await
            .unwrap_err();
        assert_eq!(status.code(), Code::NotFound);
    }
}
