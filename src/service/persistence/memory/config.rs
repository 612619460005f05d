use async_trait::async_trait;
use shipyard_core::{DeployableConfigId, DeployableId, EnvironmentConfigId, EnvironmentId};

use super::{MemoryState, MemoryStore};
use crate::errors::DeployError;
use crate::models::{
    ConfigStatus, DeployableConfig, DeployableConfigUpdate, DeployableConfigValue,
    EnvironmentConfig, EnvironmentConfigUpdate, EnvironmentConfigValue,
};
use crate::persistence::ConfigPersistence;

fn check_active_environment_config(state: &MemoryState, config: &EnvironmentConfig) -> anyhow::Result<()> {
    let conflict = config.status == ConfigStatus::Active
        && state.environment_configs.values().any(|existing| {
            existing.id != config.id
                && existing.environment_id == config.environment_id
                && existing.status == ConfigStatus::Active
        });

    if conflict {
        return Err(DeployError::validation(format!(
            "environment {} already has an active config",
            config.environment_id
        )));
    }

    Ok(())
}

fn check_active_deployable_config(state: &MemoryState, config: &DeployableConfig) -> anyhow::Result<()> {
    let conflict = config.status == ConfigStatus::Active
        && state.deployable_configs.values().any(|existing| {
            existing.id != config.id
                && existing.deployable_id == config.deployable_id
                && existing.environment_id == config.environment_id
                && existing.status == ConfigStatus::Active
        });

    if conflict {
        return Err(DeployError::validation(format!(
            "deployable {} already has an active config for environment {}",
            config.deployable_id, config.environment_id
        )));
    }

    Ok(())
}

fn push_environment_config_values(
    state: &mut MemoryState,
    values: Vec<EnvironmentConfigValue>,
) -> anyhow::Result<()> {
    for value in &values {
        let duplicate = state.environment_config_values.iter().any(|existing| {
            existing.environment_config_id == value.environment_config_id && existing.name == value.name
        });

        if duplicate {
            return Err(DeployError::validation(format!(
                "config value {} already set for {}",
                value.name, value.environment_config_id
            )));
        }
    }

    state.environment_config_values.extend(values);

    Ok(())
}

fn push_deployable_config_values(
    state: &mut MemoryState,
    values: Vec<DeployableConfigValue>,
) -> anyhow::Result<()> {
    for value in &values {
        let duplicate = state.deployable_config_values.iter().any(|existing| {
            existing.deployable_config_id == value.deployable_config_id && existing.name == value.name
        });

        if duplicate {
            return Err(DeployError::validation(format!(
                "config value {} already set for {}",
                value.name, value.deployable_config_id
            )));
        }
    }

    state.deployable_config_values.extend(values);

    Ok(())
}

#[async_trait]
impl ConfigPersistence for MemoryStore {
    async fn insert_environment_config(&self, config: &EnvironmentConfig) -> anyhow::Result<EnvironmentConfigId> {
        let config = config.clone();

        self.with_state(move |state| {
            let id = config.id;
            if state.environment_configs.contains_key(&id.value()) {
                return Ok(id);
            }

            check_active_environment_config(state, &config)?;
            state.environment_configs.insert(id.value(), config);

            Ok(id)
        })
        .await
    }

    async fn environment_config(&self, id: EnvironmentConfigId) -> anyhow::Result<Option<EnvironmentConfig>> {
        self.with_state(move |state| Ok(state.environment_configs.get(&id.value()).cloned()))
            .await
    }

    async fn environment_configs_for_status(
        &self,
        environment_id: EnvironmentId,
        status: ConfigStatus,
    ) -> anyhow::Result<Vec<EnvironmentConfig>> {
        self.with_state(move |state| {
            Ok(state
                .environment_configs
                .values()
                .filter(|config| config.environment_id == environment_id && config.status == status)
                .cloned()
                .collect())
        })
        .await
    }

    async fn deprecate_active_environment_config(&self, environment_id: EnvironmentId) -> anyhow::Result<u64> {
        self.with_state(move |state| {
            let mut affected = 0;
            for config in state.environment_configs.values_mut() {
                if config.environment_id == environment_id && config.status == ConfigStatus::Active {
                    config.status = ConfigStatus::Deprecated;
                    affected += 1;
                }
            }

            Ok(affected)
        })
        .await
    }

    async fn update_environment_config(
        &self,
        id: EnvironmentConfigId,
        update: &EnvironmentConfigUpdate,
    ) -> anyhow::Result<u64> {
        if update.is_empty() {
            return Ok(0);
        }

        let update = update.clone();
        self.with_state(move |state| {
            let Some(mut config) = state.environment_configs.get(&id.value()).cloned() else {
                return Ok(0);
            };

            if let Some(status) = update.status {
                config.status = status;
            }

            check_active_environment_config(state, &config)?;
            state.environment_configs.insert(id.value(), config);

            Ok(1)
        })
        .await
    }

    async fn delete_environment_config(&self, id: EnvironmentConfigId) -> anyhow::Result<u64> {
        self.with_state(move |state| {
            if state.environment_configs.remove(&id.value()).is_none() {
                return Ok(0);
            }

            state
                .environment_config_values
                .retain(|value| value.environment_config_id != id);

            Ok(1)
        })
        .await
    }

    async fn insert_environment_config_value(&self, value: &EnvironmentConfigValue) -> anyhow::Result<()> {
        self.insert_environment_config_values(std::slice::from_ref(value))
            .await
    }

    async fn insert_environment_config_values(&self, values: &[EnvironmentConfigValue]) -> anyhow::Result<()> {
        let values = values.to_vec();

        self.with_state(move |state| push_environment_config_values(state, values))
            .await
    }

    async fn environment_config_values(
        &self,
        id: EnvironmentConfigId,
    ) -> anyhow::Result<Vec<EnvironmentConfigValue>> {
        self.with_state(move |state| {
            let mut values: Vec<EnvironmentConfigValue> = state
                .environment_config_values
                .iter()
                .filter(|value| value.environment_config_id == id)
                .cloned()
                .collect();
            values.sort_by(|a, b| a.name.cmp(&b.name));

            Ok(values)
        })
        .await
    }

    async fn insert_deployable_config(&self, config: &DeployableConfig) -> anyhow::Result<DeployableConfigId> {
        let config = config.clone();

        self.with_state(move |state| {
            let id = config.id;
            if state.deployable_configs.contains_key(&id.value()) {
                return Ok(id);
            }

            check_active_deployable_config(state, &config)?;
            state.deployable_configs.insert(id.value(), config);

            Ok(id)
        })
        .await
    }

    async fn deployable_config(&self, id: DeployableConfigId) -> anyhow::Result<Option<DeployableConfig>> {
        self.with_state(move |state| Ok(state.deployable_configs.get(&id.value()).cloned()))
            .await
    }

    async fn deployable_configs_for_status(
        &self,
        deployable_id: DeployableId,
        environment_id: EnvironmentId,
        status: ConfigStatus,
    ) -> anyhow::Result<Vec<DeployableConfig>> {
        self.with_state(move |state| {
            Ok(state
                .deployable_configs
                .values()
                .filter(|config| {
                    config.deployable_id == deployable_id
                        && config.environment_id == environment_id
                        && config.status == status
                })
                .cloned()
                .collect())
        })
        .await
    }

    async fn deprecate_active_deployable_config(
        &self,
        deployable_id: DeployableId,
        environment_id: EnvironmentId,
    ) -> anyhow::Result<u64> {
        self.with_state(move |state| {
            let mut affected = 0;
            for config in state.deployable_configs.values_mut() {
                if config.deployable_id == deployable_id
                    && config.environment_id == environment_id
                    && config.status == ConfigStatus::Active
                {
                    config.status = ConfigStatus::Deprecated;
                    affected += 1;
                }
            }

            Ok(affected)
        })
        .await
    }

    async fn update_deployable_config(
        &self,
        id: DeployableConfigId,
        update: &DeployableConfigUpdate,
    ) -> anyhow::Result<u64> {
        if update.is_empty() {
            return Ok(0);
        }

        let update = update.clone();
        self.with_state(move |state| {
            let Some(mut config) = state.deployable_configs.get(&id.value()).cloned() else {
                return Ok(0);
            };

            if let Some(status) = update.status {
                config.status = status;
            }

            check_active_deployable_config(state, &config)?;
            state.deployable_configs.insert(id.value(), config);

            Ok(1)
        })
        .await
    }

    async fn delete_deployable_config(&self, id: DeployableConfigId) -> anyhow::Result<u64> {
        self.with_state(move |state| {
            if state.deployable_configs.remove(&id.value()).is_none() {
                return Ok(0);
            }

            state
                .deployable_config_values
                .retain(|value| value.deployable_config_id != id);

            Ok(1)
        })
        .await
    }

    async fn insert_deployable_config_value(&self, value: &DeployableConfigValue) -> anyhow::Result<()> {
        self.insert_deployable_config_values(std::slice::from_ref(value))
            .await
    }

    async fn insert_deployable_config_values(&self, values: &[DeployableConfigValue]) -> anyhow::Result<()> {
        let values = values.to_vec();

        self.with_state(move |state| push_deployable_config_values(state, values))
            .await
    }

    async fn deployable_config_values(
        &self,
        id: DeployableConfigId,
    ) -> anyhow::Result<Vec<DeployableConfigValue>> {
        self.with_state(move |state| {
            let mut values: Vec<DeployableConfigValue> = state
                .deployable_config_values
                .iter()
                .filter(|value| value.deployable_config_id == id)
                .cloned()
                .collect();
            values.sort_by(|a, b| a.name.cmp(&b.name));

            Ok(values)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::is_validation;

    #[tokio::test]
    async fn test_single_active_deployable_config() {
        let store = MemoryStore::default();
        let deployable_id = DeployableId::new();
        let environment_id = EnvironmentId::new();

        let first = DeployableConfig::new_active(deployable_id, environment_id);
        store.insert_deployable_config(&first).await.unwrap();

        let second = DeployableConfig::new_active(deployable_id, environment_id);
        let err = store.insert_deployable_config(&second).await.unwrap_err();
        assert!(is_validation(&err));

        let deprecated = store
            .deprecate_active_deployable_config(deployable_id, environment_id)
            .await
            .unwrap();
        assert_eq!(deprecated, 1);

        store.insert_deployable_config(&second).await.unwrap();

        let active = store
            .deployable_configs_for_status(deployable_id, environment_id, ConfigStatus::Active)
            .await
            .unwrap();
        assert_eq!(active, vec![second.clone()]);

        // re-inserting an existing config is ignored
        assert_eq!(store.insert_deployable_config(&second).await.unwrap(), second.id);
    }

    #[tokio::test]
    async fn test_config_values_round_trip() {
        let store = MemoryStore::default();

        let config = EnvironmentConfig::new_active(EnvironmentId::new());
        store.insert_environment_config(&config).await.unwrap();

        store
            .insert_environment_config_values(&[
                EnvironmentConfigValue::new(config.id, "REGION", "us-east-1"),
                EnvironmentConfigValue::new(config.id, "ACCOUNT", "prod"),
            ])
            .await
            .unwrap();

        let values = store.environment_config_values(config.id).await.unwrap();
        let names: Vec<&str> = values.iter().map(|value| value.name.as_str()).collect();
        assert_eq!(names, vec!["ACCOUNT", "REGION"]);

        let err = store
            .insert_environment_config_value(&EnvironmentConfigValue::new(config.id, "REGION", "eu-west-1"))
            .await
            .unwrap_err();
        assert!(is_validation(&err));

        // an empty batch does nothing
        store.insert_environment_config_values(&[]).await.unwrap();
        assert_eq!(store.environment_config_values(config.id).await.unwrap().len(), 2);
    }
}
