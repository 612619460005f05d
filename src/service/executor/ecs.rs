use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;

use async_trait::async_trait;
use shipyard_core::{ContainerPortMapping, CONFIG_CPU, CONFIG_MEMORY, CONFIG_PORT_PREFIX};

use super::DeploymentExecutor;
use crate::errors::DeployError;
use crate::models::{Deployable, DeployableConfigValue, Deployment, DeploymentData, Environment};
use crate::persistence::Store;

/// Short-lived credentials for a single deployment.
#[derive(Clone)]
pub struct RoleCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
    pub expiration: Option<SystemTime>,
}

impl fmt::Debug for RoleCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RoleCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("expiration", &self.expiration)
            .finish_non_exhaustive()
    }
}

#[async_trait]
pub trait RoleAssumer: fmt::Debug + Send + Sync {
    async fn assume_role(&self, role_arn: &str, session_name: &str) -> anyhow::Result<RoleCredentials>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TaskDefinitionRevision {
    pub family: String,
    pub revision: i32,
    pub arn: String,
}

/// The external container orchestrator.
#[async_trait]
pub trait ContainerOrchestrator: fmt::Debug + Send + Sync {
    async fn register_task_definition(
        &self,
        credentials: &RoleCredentials,
        definition: &EcsTaskDefinition,
    ) -> anyhow::Result<TaskDefinitionRevision>;

    async fn update_service(
        &self,
        credentials: &RoleCredentials,
        cluster: &str,
        service: &str,
        task_definition: &str,
    ) -> anyhow::Result<()>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EcsSettings {
    pub role_arn: String,
    pub region: String,
    pub cluster_suffix: String,
    pub log_group_prefix: String,
}

impl EcsSettings {
    pub fn cluster_name(&self, environment: &Environment) -> String {
        format!("{}{}", environment.name, self.cluster_suffix)
    }

    pub fn log_group(&self, environment: &Environment, deployable: &Deployable) -> String {
        format!(
            "{}/{}/{}",
            self.log_group_prefix.trim_end_matches('/'),
            environment.name,
            deployable.name
        )
    }
}

/// A single-container task definition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EcsTaskDefinition {
    pub family: String,
    pub container_name: String,
    pub image: String,
    pub cpu: i32,
    pub memory: i32,
    pub environment: Vec<(String, String)>,
    pub port_mappings: Vec<ContainerPortMapping>,
    pub log_group: String,
    pub log_region: String,
    pub log_stream_prefix: String,
}

fn required_integer(values: &[DeployableConfigValue], name: &str) -> anyhow::Result<i32> {
    let value = values
        .iter()
        .find(|value| value.name == name)
        .ok_or_else(|| anyhow::anyhow!("config value {name} is required"))?;

    value
        .value
        .trim()
        .parse()
        .map_err(|_| anyhow::anyhow!("config value {name} must be an integer, got {:?}", value.value))
}

impl EcsTaskDefinition {
    /// Builds the task definition for `image` from a deployable config.
    /// `ECS_CONFIG_CPU` and `ECS_CONFIG_MEMORY` are required integers,
    /// `ECS_CONFIG_PORT_MAPPING*` values are port mappings and every other
    /// value becomes an upper-cased environment variable. When two names
    /// upper-case to the same variable the first one wins.
    pub fn from_config(
        deployable: &Deployable,
        environment: &Environment,
        image: &str,
        values: &[DeployableConfigValue],
        settings: &EcsSettings,
    ) -> anyhow::Result<Self> {
        let cpu = required_integer(values, CONFIG_CPU)?;
        let memory = required_integer(values, CONFIG_MEMORY)?;

        let mut port_mappings = vec![];
        let mut container_environment = BTreeMap::new();
        for value in values {
            if value.name == CONFIG_CPU || value.name == CONFIG_MEMORY {
                continue;
            }

            if value.name.starts_with(CONFIG_PORT_PREFIX) {
                let mapping: ContainerPortMapping = value
                    .value
                    .parse()
                    .map_err(|err| anyhow::anyhow!("config value {}: {err}", value.name))?;
                port_mappings.push(mapping);
                continue;
            }

            let name = value.name.to_uppercase();
            if container_environment.contains_key(&name) {
                tracing::warn!(
                    config_name = %value.name,
                    "skipping config value, {name} is already set for {}",
                    deployable.name
                );
                continue;
            }
            container_environment.insert(name, value.value.clone());
        }

        Ok(EcsTaskDefinition {
            family: format!("{}-{}", environment.name, deployable.name),
            container_name: deployable.name.clone(),
            image: image.to_string(),
            cpu,
            memory,
            environment: container_environment.into_iter().collect(),
            port_mappings,
            log_group: settings.log_group(environment, deployable),
            log_region: settings.region.clone(),
            log_stream_prefix: deployable.name.clone(),
        })
    }
}

/// Runs CONTAINER_TASK deployments: registers a new task definition revision
/// and points the deployable's service at it.
#[derive(Debug)]
pub struct EcsExecutor {
    pub store: Arc<dyn Store>,

    pub orchestrator: Arc<dyn ContainerOrchestrator>,
    pub role_assumer: Arc<dyn RoleAssumer>,

    pub settings: EcsSettings,
}

#[async_trait]
impl DeploymentExecutor for EcsExecutor {
    #[tracing::instrument(name = "executor::ecs::execute", skip_all, fields(deployment_id = %deployment.id))]
    async fn execute(&self, deployment: &Deployment) -> anyhow::Result<()> {
        let DeploymentData::ContainerTask { image } = &deployment.data;

        let deployable = self
            .store
            .deployable(deployment.deployable_id)
            .await?
            .ok_or_else(|| DeployError::not_found(format!("Deployable: {:?}", deployment.deployable_id.to_string())))?;
        let environment = self
            .store
            .environment(deployment.environment_id)
            .await?
            .ok_or_else(|| DeployError::not_found(format!("Environment: {:?}", deployment.environment_id.to_string())))?;

        let session_name = format!("deployment-{}", deployment.id);
        let credentials = self
            .role_assumer
            .assume_role(&self.settings.role_arn, &session_name)
            .await?;

        let values = self
            .store
            .deployable_config_values(deployment.deployable_config_id)
            .await?;
        let definition =
            EcsTaskDefinition::from_config(&deployable, &environment, image, &values, &self.settings)?;

        let revision = self
            .orchestrator
            .register_task_definition(&credentials, &definition)
            .await?;
        tracing::info!(
            deployment_id = %deployment.id,
            "registered task definition {}:{}",
            revision.family,
            revision.revision
        );

        let cluster = self.settings.cluster_name(&environment);
        self.orchestrator
            .update_service(&credentials, &cluster, &deployable.name, &revision.arn)
            .await?;

        tracing::info!(
            deployment_id = %deployment.id,
            "service {} in cluster {} now runs {}",
            deployable.name,
            cluster,
            revision.arn
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use shipyard_core::test::get_deployable_config_values_fixture;
    use shipyard_core::{DeployableConfigId, DeployableGroupId};

    use super::*;
    use crate::test::get_ecs_settings_fixture;

    fn config_values(pairs: &[(&str, &str)]) -> Vec<DeployableConfigValue> {
        let config_id = DeployableConfigId::new();
        pairs
            .iter()
            .map(|(name, value)| DeployableConfigValue::new(config_id, *name, *value))
            .collect()
    }

    fn fixture_targets() -> (Deployable, Environment) {
        let environment = Environment::new(DeployableGroupId::new(), "dev", "", false);
        let deployable = Deployable::new(environment.deployable_group_id, "svc-a", "", "");

        (deployable, environment)
    }

    #[test]
    fn test_task_definition_from_config() {
        let (deployable, environment) = fixture_targets();
        let fixture = get_deployable_config_values_fixture();
        let pairs: Vec<(&str, &str)> = fixture
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
            .chain([("feature_flag", "on")])
            .collect();

        let definition = EcsTaskDefinition::from_config(
            &deployable,
            &environment,
            "r/svc-a:42",
            &config_values(&pairs),
            &get_ecs_settings_fixture(),
        )
        .unwrap();

        assert_eq!(definition.cpu, 256);
        assert_eq!(definition.memory, 512);
        assert_eq!(definition.image, "r/svc-a:42");
        assert_eq!(definition.container_name, "svc-a");
        assert_eq!(definition.log_group, "/deploy/dev/svc-a");
        assert_eq!(
            definition.port_mappings,
            vec![ContainerPortMapping {
                container_port: 80,
                host_port: 0,
                protocol: "tcp".to_string(),
            }]
        );
        assert_eq!(
            definition.environment,
            vec![
                ("FEATURE_FLAG".to_string(), "on".to_string()),
                ("LOG_LEVEL".to_string(), "info".to_string()),
            ]
        );
    }

    #[test]
    fn test_task_definition_skips_names_that_collide_when_upper_cased() {
        let (deployable, environment) = fixture_targets();

        let values = config_values(&[
            ("ECS_CONFIG_CPU", "256"),
            ("ECS_CONFIG_MEMORY", "512"),
            ("LOG_LEVEL", "info"),
            ("log_level", "debug"),
            ("region", "us-east-1"),
        ]);
        let definition = EcsTaskDefinition::from_config(
            &deployable,
            &environment,
            "r/svc-a:42",
            &values,
            &get_ecs_settings_fixture(),
        )
        .unwrap();

        assert_eq!(
            definition.environment,
            vec![
                ("LOG_LEVEL".to_string(), "info".to_string()),
                ("REGION".to_string(), "us-east-1".to_string()),
            ]
        );
    }

    #[test]
    fn test_task_definition_requires_resources() {
        let (deployable, environment) = fixture_targets();
        let settings = get_ecs_settings_fixture();

        let missing_cpu = config_values(&[("ECS_CONFIG_MEMORY", "512")]);
        assert!(EcsTaskDefinition::from_config(&deployable, &environment, "i", &missing_cpu, &settings).is_err());

        let bad_memory = config_values(&[("ECS_CONFIG_CPU", "256"), ("ECS_CONFIG_MEMORY", "lots")]);
        assert!(EcsTaskDefinition::from_config(&deployable, &environment, "i", &bad_memory, &settings).is_err());

        let bad_port = config_values(&[
            ("ECS_CONFIG_CPU", "256"),
            ("ECS_CONFIG_MEMORY", "512"),
            ("ECS_CONFIG_PORT_MAPPING_0", "80:0:sctp"),
        ]);
        assert!(EcsTaskDefinition::from_config(&deployable, &environment, "i", &bad_port, &settings).is_err());
    }

    #[test]
    fn test_cluster_name() {
        let (_, environment) = fixture_targets();

        assert_eq!(get_ecs_settings_fixture().cluster_name(&environment), "dev-svc");
    }
}
