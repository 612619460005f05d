use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use futures::FutureExt;
use shipyard_core::{DeployableConfigId, DeployableId, EnvironmentConfigId, EnvironmentId};

use super::{DeployableService, EnvironmentService};
use crate::errors::DeployError;
use crate::models::{
    ConfigStatus, DeployableConfig, DeployableConfigValue, EnvironmentConfig,
    EnvironmentConfigValue,
};
use crate::persistence::{transact, Store};

/// Values for a new config version: the source values minus the omitted
/// keys, overlaid with the request values.
pub fn merge_config_values<'a>(
    source: impl IntoIterator<Item = (&'a str, &'a str)>,
    omit: &[String],
    overlay: &HashMap<String, String>,
) -> BTreeMap<String, String> {
    let omit: HashSet<&str> = omit.iter().map(String::as_str).collect();

    let mut values: BTreeMap<String, String> = source
        .into_iter()
        .filter(|(name, _)| !omit.contains(name))
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .collect();

    for (name, value) in overlay {
        values.insert(name.clone(), value.clone());
    }

    values
}

#[derive(Debug)]
pub struct ConfigService {
    pub store: Arc<dyn Store>,

    pub environment_service: Arc<EnvironmentService>,
    pub deployable_service: Arc<DeployableService>,
}

impl ConfigService {
    /// Creates a new ACTIVE config for the deployable in the environment and
    /// deprecates the previous one in the same transaction.
    #[tracing::instrument(name = "service::config::create_deployable_config", skip(self, values))]
    pub async fn create_deployable_config(
        &self,
        deployable_id: DeployableId,
        environment_id: EnvironmentId,
        source_config_id: Option<DeployableConfigId>,
        omit: &[String],
        values: &HashMap<String, String>,
    ) -> anyhow::Result<(DeployableConfig, Vec<DeployableConfigValue>)> {
        let deployable = self.deployable_service.get_by_id(deployable_id).await?;
        let environment = self.environment_service.get_by_id(environment_id).await?;

        let source_values = match source_config_id {
            Some(source_config_id) => {
                if self.store.deployable_config(source_config_id).await?.is_none() {
                    return Err(DeployError::not_found(format!(
                        "Deployable Config: {:?}",
                        source_config_id.to_string()
                    )));
                }
                self.store.deployable_config_values(source_config_id).await?
            }
            None => vec![],
        };

        let merged = merge_config_values(
            source_values
                .iter()
                .map(|value| (value.name.as_str(), value.value.as_str())),
            omit,
            values,
        );

        let config = DeployableConfig::new_active(deployable.id, environment.id);
        let config_values: Vec<DeployableConfigValue> = merged
            .into_iter()
            .map(|(name, value)| DeployableConfigValue::new(config.id, name, value))
            .collect();

        let (new_config, new_values) = (config.clone(), config_values.clone());
        transact(&*self.store, move |tx| {
            async move {
                tx.deprecate_active_deployable_config(new_config.deployable_id, new_config.environment_id)
                    .await?;
                tx.insert_deployable_config(&new_config).await?;
                tx.insert_deployable_config_values(&new_values).await?;

                Ok(())
            }
            .boxed()
        })
        .await?;

        tracing::info!(
            config_id = %config.id,
            "deployable config created for {} in {}",
            deployable.name,
            environment.name
        );

        Ok((config, config_values))
    }

    /// Creates a new ACTIVE config for the environment and deprecates the
    /// previous one in the same transaction.
    #[tracing::instrument(name = "service::config::create_environment_config", skip(self, values))]
    pub async fn create_environment_config(
        &self,
        environment_id: EnvironmentId,
        source_config_id: Option<EnvironmentConfigId>,
        omit: &[String],
        values: &HashMap<String, String>,
    ) -> anyhow::Result<(EnvironmentConfig, Vec<EnvironmentConfigValue>)> {
        let environment = self.environment_service.get_by_id(environment_id).await?;

        let source_values = match source_config_id {
            Some(source_config_id) => {
                if self.store.environment_config(source_config_id).await?.is_none() {
                    return Err(DeployError::not_found(format!(
                        "Environment Config: {:?}",
                        source_config_id.to_string()
                    )));
                }
                self.store.environment_config_values(source_config_id).await?
            }
            None => vec![],
        };

        let merged = merge_config_values(
            source_values
                .iter()
                .map(|value| (value.name.as_str(), value.value.as_str())),
            omit,
            values,
        );

        let config = EnvironmentConfig::new_active(environment.id);
        let config_values: Vec<EnvironmentConfigValue> = merged
            .into_iter()
            .map(|(name, value)| EnvironmentConfigValue::new(config.id, name, value))
            .collect();

        let (new_config, new_values) = (config.clone(), config_values.clone());
        transact(&*self.store, move |tx| {
            async move {
                tx.deprecate_active_environment_config(new_config.environment_id)
                    .await?;
                tx.insert_environment_config(&new_config).await?;
                tx.insert_environment_config_values(&new_values).await?;

                Ok(())
            }
            .boxed()
        })
        .await?;

        tracing::info!(config_id = %config.id, "environment config created for {}", environment.name);

        Ok((config, config_values))
    }

    #[tracing::instrument(name = "service::config::list_deployable_configs", skip(self))]
    pub async fn list_deployable_configs(
        &self,
        deployable_id: DeployableId,
        environment_id: EnvironmentId,
        status: ConfigStatus,
    ) -> anyhow::Result<Vec<(DeployableConfig, Vec<DeployableConfigValue>)>> {
        let deployable = self.deployable_service.get_by_id(deployable_id).await?;
        let environment = self.environment_service.get_by_id(environment_id).await?;

        let configs = self
            .store
            .deployable_configs_for_status(deployable.id, environment.id, status)
            .await?;

        let mut with_values = Vec::with_capacity(configs.len());
        for config in configs {
            let values = self.store.deployable_config_values(config.id).await?;
            with_values.push((config, values));
        }

        Ok(with_values)
    }

    #[tracing::instrument(name = "service::config::list_environment_configs", skip(self))]
    pub async fn list_environment_configs(
        &self,
        environment_id: EnvironmentId,
        status: ConfigStatus,
    ) -> anyhow::Result<Vec<(EnvironmentConfig, Vec<EnvironmentConfigValue>)>> {
        let environment = self.environment_service.get_by_id(environment_id).await?;

        let configs = self
            .store
            .environment_configs_for_status(environment.id, status)
            .await?;

        let mut with_values = Vec::with_capacity(configs.len());
        for config in configs {
            let values = self.store.environment_config_values(config.id).await?;
            with_values.push((config, values));
        }

        Ok(with_values)
    }

    /// The single ACTIVE config for the deployable in the environment.
    /// Anything other than exactly one is an internal error.
    #[tracing::instrument(name = "service::config::active_deployable_config", skip(store))]
    pub async fn active_deployable_config(
        store: &dyn Store,
        deployable_id: DeployableId,
        environment_id: EnvironmentId,
    ) -> anyhow::Result<DeployableConfig> {
        let mut configs = store
            .deployable_configs_for_status(deployable_id, environment_id, ConfigStatus::Active)
            .await?;

        match configs.len() {
            1 => Ok(configs.remove(0)),
            0 => Err(DeployError::internal(format!(
                "no active deployable config for deployable {deployable_id} in environment {environment_id}"
            ))),
            count => Err(DeployError::internal(format!(
                "{count} active deployable configs for deployable {deployable_id} in environment {environment_id}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use shipyard_core::test::get_deployable_config_values_fixture;

    use super::*;
    use crate::errors::{is_not_found, is_validation};
    use crate::persistence::relational::tests::test_store;
    use crate::test::{get_service_fixture, get_service_fixture_for_store};

    #[test]
    fn test_merge_config_values() {
        let source = [("A", "1"), ("B", "2"), ("C", "3")];
        let omit = vec!["B".to_string()];
        let overlay = HashMap::from([
            ("C".to_string(), "30".to_string()),
            ("D".to_string(), "4".to_string()),
        ]);

        let merged = merge_config_values(source, &omit, &overlay);

        assert_eq!(
            merged,
            BTreeMap::from([
                ("A".to_string(), "1".to_string()),
                ("C".to_string(), "30".to_string()),
                ("D".to_string(), "4".to_string()),
            ])
        );
    }

    #[tokio::test]
    async fn test_create_deployable_config_deprecates_previous() {
        let fixture = get_service_fixture().await;
        let config_service = &fixture.config_service;

        let (first, _) = config_service
            .create_deployable_config(
                fixture.deployable.id,
                fixture.dev.id,
                None,
                &[],
                &get_deployable_config_values_fixture(),
            )
            .await
            .unwrap();

        let (second, second_values) = config_service
            .create_deployable_config(
                fixture.deployable.id,
                fixture.dev.id,
                Some(first.id),
                &["LOG_LEVEL".to_string()],
                &HashMap::from([("ECS_CONFIG_CPU".to_string(), "512".to_string())]),
            )
            .await
            .unwrap();

        let values: BTreeMap<&str, &str> = second_values
            .iter()
            .map(|value| (value.name.as_str(), value.value.as_str()))
            .collect();
        assert_eq!(values.get("ECS_CONFIG_CPU"), Some(&"512"));
        assert_eq!(values.get("ECS_CONFIG_MEMORY"), Some(&"512"));
        assert!(!values.contains_key("LOG_LEVEL"));

        let active = config_service
            .list_deployable_configs(fixture.deployable.id, fixture.dev.id, ConfigStatus::Active)
            .await
            .unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].0.id, second.id);

        let deprecated = config_service
            .list_deployable_configs(fixture.deployable.id, fixture.dev.id, ConfigStatus::Deprecated)
            .await
            .unwrap();
        assert!(deprecated.iter().any(|(config, _)| config.id == first.id));
    }

    #[tokio::test]
    async fn test_create_deployable_config_with_missing_source() {
        let fixture = get_service_fixture().await;

        let err = fixture
            .config_service
            .create_deployable_config(
                fixture.deployable.id,
                fixture.dev.id,
                Some(DeployableConfigId::new()),
                &[],
                &HashMap::new(),
            )
            .await
            .unwrap_err();

        assert!(is_not_found(&err));
    }

    #[tokio::test]
    async fn test_create_environment_config_clones_source() {
        let fixture = get_service_fixture().await;
        let config_service = &fixture.config_service;

        let (first, _) = config_service
            .create_environment_config(
                fixture.dev.id,
                None,
                &[],
                &HashMap::from([
                    ("REGION".to_string(), "us-east-1".to_string()),
                    ("ACCOUNT".to_string(), "dev".to_string()),
                ]),
            )
            .await
            .unwrap();

        let (second, values) = config_service
            .create_environment_config(
                fixture.dev.id,
                Some(first.id),
                &["ACCOUNT".to_string()],
                &HashMap::new(),
            )
            .await
            .unwrap();

        assert_eq!(values.len(), 1);
        assert_eq!(values[0].name, "REGION");

        let active = config_service
            .list_environment_configs(fixture.dev.id, ConfigStatus::Active)
            .await
            .unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].0.id, second.id);
    }

    #[tokio::test]
    async fn test_active_deployable_config_requires_exactly_one() {
        let fixture = get_service_fixture().await;

        let err = ConfigService::active_deployable_config(
            &*fixture.store,
            fixture.deployable.id,
            fixture.staging.id,
        )
        .await
        .unwrap_err();

        assert!(!is_validation(&err));
        assert!(err.to_string().contains("no active deployable config"));
    }

    #[tokio::test]
    #[ignore = "needs a postgres database"]
    async fn test_concurrent_deployable_config_creates_all_succeed() {
        let fixture = get_service_fixture_for_store(Arc::new(test_store().await)).await;
        let config_service = &fixture.config_service;
        let values = get_deployable_config_values_fixture();

        config_service
            .create_deployable_config(fixture.deployable.id, fixture.dev.id, None, &[], &values)
            .await
            .unwrap();

        let creates = (0..8).map(|_| {
            config_service.create_deployable_config(fixture.deployable.id, fixture.dev.id, None, &[], &values)
        });
        for result in futures::future::join_all(creates).await {
            result.unwrap();
        }

        let active = config_service
            .list_deployable_configs(fixture.deployable.id, fixture.dev.id, ConfigStatus::Active)
            .await
            .unwrap();
        assert_eq!(active.len(), 1);

        let deprecated = config_service
            .list_deployable_configs(fixture.deployable.id, fixture.dev.id, ConfigStatus::Deprecated)
            .await
            .unwrap();
        assert_eq!(deprecated.len(), 8);
    }

    #[tokio::test]
    #[ignore = "needs a postgres database"]
    async fn test_concurrent_environment_config_creates_all_succeed() {
        let fixture = get_service_fixture_for_store(Arc::new(test_store().await)).await;
        let config_service = &fixture.config_service;
        let values = HashMap::from([("REGION".to_string(), "us-east-1".to_string())]);

        let creates =
            (0..8).map(|_| config_service.create_environment_config(fixture.staging.id, None, &[], &values));
        for result in futures::future::join_all(creates).await {
            result.unwrap();
        }

        let active = config_service
            .list_environment_configs(fixture.staging.id, ConfigStatus::Active)
            .await
            .unwrap();
        assert_eq!(active.len(), 1);

        let deprecated = config_service
            .list_environment_configs(fixture.staging.id, ConfigStatus::Deprecated)
            .await
            .unwrap();
        assert_eq!(deprecated.len(), 7);
    }
}
