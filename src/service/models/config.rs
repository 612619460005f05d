use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use shipyard_core::{
    DeployableConfigId, DeployableConfigMessage, DeployableId, EnvironmentConfigId,
    EnvironmentConfigMessage, EnvironmentId,
};

use crate::errors::DeployError;

/// Lifecycle of both environment and deployable configs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ConfigStatus {
    Active,
    Deprecated,
}

impl ConfigStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigStatus::Active => "ACTIVE",
            ConfigStatus::Deprecated => "DEPRECATED",
        }
    }
}

impl fmt::Display for ConfigStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConfigStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "ACTIVE" => Ok(ConfigStatus::Active),
            "DEPRECATED" => Ok(ConfigStatus::Deprecated),
            _ => Err(DeployError::validation(format!(
                "unknown config status {s:?}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EnvironmentConfig {
    pub id: EnvironmentConfigId,
    pub environment_id: EnvironmentId,
    pub status: ConfigStatus,
    pub created: DateTime<Utc>,
}

impl EnvironmentConfig {
    pub fn new_active(environment_id: EnvironmentId) -> Self {
        EnvironmentConfig {
            id: EnvironmentConfigId::new(),
            environment_id,
            status: ConfigStatus::Active,
            created: Utc::now(),
        }
    }

    pub fn into_message(self, values: Vec<EnvironmentConfigValue>) -> EnvironmentConfigMessage {
        EnvironmentConfigMessage {
            id: self.id.to_string(),
            environment_id: self.environment_id.to_string(),
            status: self.status.to_string(),
            values: values
                .into_iter()
                .map(|value| (value.name, value.value))
                .collect(),
            created: self.created.timestamp(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EnvironmentConfigUpdate {
    pub status: Option<ConfigStatus>,
}

impl EnvironmentConfigUpdate {
    pub fn is_empty(&self) -> bool {
        self.status.is_none()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EnvironmentConfigValue {
    pub environment_config_id: EnvironmentConfigId,
    pub name: String,
    pub value: String,
    pub created: DateTime<Utc>,
}

impl EnvironmentConfigValue {
    pub fn new(
        environment_config_id: EnvironmentConfigId,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        EnvironmentConfigValue {
            environment_config_id,
            name: name.into(),
            value: value.into(),
            created: Utc::now(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeployableConfig {
    pub id: DeployableConfigId,
    pub deployable_id: DeployableId,
    pub environment_id: EnvironmentId,
    pub status: ConfigStatus,
    pub created: DateTime<Utc>,
}

impl DeployableConfig {
    pub fn new_active(deployable_id: DeployableId, environment_id: EnvironmentId) -> Self {
        DeployableConfig {
            id: DeployableConfigId::new(),
            deployable_id,
            environment_id,
            status: ConfigStatus::Active,
            created: Utc::now(),
        }
    }

    pub fn into_message(self, values: Vec<DeployableConfigValue>) -> DeployableConfigMessage {
        DeployableConfigMessage {
            id: self.id.to_string(),
            deployable_id: self.deployable_id.to_string(),
            environment_id: self.environment_id.to_string(),
            status: self.status.to_string(),
            values: values
                .into_iter()
                .map(|value| (value.name, value.value))
                .collect(),
            created: self.created.timestamp(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DeployableConfigUpdate {
    pub status: Option<ConfigStatus>,
}

impl DeployableConfigUpdate {
    pub fn is_empty(&self) -> bool {
        self.status.is_none()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeployableConfigValue {
    pub deployable_config_id: DeployableConfigId,
    pub name: String,
    pub value: String,
    pub created: DateTime<Utc>,
}

impl DeployableConfigValue {
    pub fn new(
        deployable_config_id: DeployableConfigId,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        DeployableConfigValue {
            deployable_config_id,
            name: name.into(),
            value: value.into(),
            created: Utc::now(),
        }
    }
}
