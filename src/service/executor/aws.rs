use std::time::SystemTime;

use anyhow::Context;
use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_credential_types::Credentials;
use aws_sdk_ecs::types::{
    ContainerDefinition, KeyValuePair, LogConfiguration, LogDriver, PortMapping, TransportProtocol,
};

use super::ecs::{
    ContainerOrchestrator, EcsTaskDefinition, RoleAssumer, RoleCredentials, TaskDefinitionRevision,
};

const CREDENTIALS_PROVIDER_NAME: &str = "shipyard-deployment-role";

/// Assumes the deployment role through STS.
#[derive(Debug)]
pub struct AwsRoleAssumer {
    client: aws_sdk_sts::Client,
}

impl AwsRoleAssumer {
    pub fn new(sdk_config: &SdkConfig) -> Self {
        AwsRoleAssumer {
            client: aws_sdk_sts::Client::new(sdk_config),
        }
    }
}

#[async_trait]
impl RoleAssumer for AwsRoleAssumer {
    #[tracing::instrument(name = "aws::sts::assume_role", skip(self))]
    async fn assume_role(&self, role_arn: &str, session_name: &str) -> anyhow::Result<RoleCredentials> {
        let output = self
            .client
            .assume_role()
            .role_arn(role_arn)
            .role_session_name(session_name)
            .send()
            .await
            .with_context(|| format!("assuming role {role_arn}"))?;

        let credentials = output
            .credentials()
            .with_context(|| format!("assuming role {role_arn} returned no credentials"))?;

        Ok(RoleCredentials {
            access_key_id: credentials.access_key_id().to_string(),
            secret_access_key: credentials.secret_access_key().to_string(),
            session_token: Some(credentials.session_token().to_string()),
            expiration: SystemTime::try_from(*credentials.expiration()).ok(),
        })
    }
}

/// Talks to ECS with the credentials of the assumed deployment role.
#[derive(Debug)]
pub struct AwsContainerOrchestrator {
    sdk_config: SdkConfig,
}

impl AwsContainerOrchestrator {
    pub fn new(sdk_config: SdkConfig) -> Self {
        AwsContainerOrchestrator { sdk_config }
    }

    fn client(&self, credentials: &RoleCredentials) -> aws_sdk_ecs::Client {
        let credentials = Credentials::new(
            credentials.access_key_id.clone(),
            credentials.secret_access_key.clone(),
            credentials.session_token.clone(),
            credentials.expiration,
            CREDENTIALS_PROVIDER_NAME,
        );

        let config = aws_sdk_ecs::config::Builder::from(&self.sdk_config)
            .credentials_provider(credentials)
            .build();

        aws_sdk_ecs::Client::from_conf(config)
    }
}

fn container_definition(definition: &EcsTaskDefinition) -> anyhow::Result<ContainerDefinition> {
    let environment = definition
        .environment
        .iter()
        .map(|(name, value)| KeyValuePair::builder().name(name).value(value).build())
        .collect();

    let port_mappings = definition
        .port_mappings
        .iter()
        .map(|mapping| {
            PortMapping::builder()
                .container_port(mapping.container_port)
                .host_port(mapping.host_port)
                .protocol(TransportProtocol::from(mapping.protocol.as_str()))
                .build()
        })
        .collect();

    let log_configuration = LogConfiguration::builder()
        .log_driver(LogDriver::Awslogs)
        .options("awslogs-group", &definition.log_group)
        .options("awslogs-region", &definition.log_region)
        .options("awslogs-stream-prefix", &definition.log_stream_prefix)
        .build()
        .context("building log configuration")?;

    Ok(ContainerDefinition::builder()
        .name(&definition.container_name)
        .image(&definition.image)
        .cpu(definition.cpu)
        .memory(definition.memory)
        .essential(true)
        .set_environment(Some(environment))
        .set_port_mappings(Some(port_mappings))
        .log_configuration(log_configuration)
        .build())
}

#[async_trait]
impl ContainerOrchestrator for AwsContainerOrchestrator {
    #[tracing::instrument(name = "aws::ecs::register_task_definition", skip_all, fields(family = %definition.family))]
    async fn register_task_definition(
        &self,
        credentials: &RoleCredentials,
        definition: &EcsTaskDefinition,
    ) -> anyhow::Result<TaskDefinitionRevision> {
        // TODO: multi-container tasks need one container definition per
        // container config prefix.
        let output = self
            .client(credentials)
            .register_task_definition()
            .family(&definition.family)
            .container_definitions(container_definition(definition)?)
            .send()
            .await
            .with_context(|| format!("registering task definition {}", definition.family))?;

        let task_definition = output
            .task_definition()
            .with_context(|| format!("registering {} returned no task definition", definition.family))?;

        Ok(TaskDefinitionRevision {
            family: task_definition
                .family()
                .unwrap_or(&definition.family)
                .to_string(),
            revision: task_definition.revision(),
            arn: task_definition
                .task_definition_arn()
                .with_context(|| format!("task definition {} has no arn", definition.family))?
                .to_string(),
        })
    }

    #[tracing::instrument(name = "aws::ecs::update_service", skip(self, credentials))]
    async fn update_service(
        &self,
        credentials: &RoleCredentials,
        cluster: &str,
        service: &str,
        task_definition: &str,
    ) -> anyhow::Result<()> {
        self.client(credentials)
            .update_service()
            .cluster(cluster)
            .service(service)
            .task_definition(task_definition)
            .send()
            .await
            .with_context(|| format!("updating service {service} in cluster {cluster}"))?;

        Ok(())
    }
}
