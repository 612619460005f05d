use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shipyard_core::{
    ContainerTaskDeployment, DeployableConfigId, DeployableId, DeployableVectorId,
    DeploymentId, DeploymentMessage, DeploymentMessageData, EnvironmentId,
};

use super::DeployableVector;
use crate::errors::DeployError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DeploymentStatus {
    Pending,
    InProgress,
    Complete,
    Failed,
}

impl DeploymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeploymentStatus::Pending => "PENDING",
            DeploymentStatus::InProgress => "IN_PROGRESS",
            DeploymentStatus::Complete => "COMPLETE",
            DeploymentStatus::Failed => "FAILED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, DeploymentStatus::Complete | DeploymentStatus::Failed)
    }
}

impl fmt::Display for DeploymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeploymentStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "PENDING" => Ok(DeploymentStatus::Pending),
            "IN_PROGRESS" => Ok(DeploymentStatus::InProgress),
            "COMPLETE" => Ok(DeploymentStatus::Complete),
            "FAILED" => Ok(DeploymentStatus::Failed),
            _ => Err(DeployError::validation(format!(
                "unknown deployment status {s:?}"
            ))),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DeploymentType {
    ContainerTask,
}

impl DeploymentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeploymentType::ContainerTask => "CONTAINER_TASK",
        }
    }
}

impl fmt::Display for DeploymentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeploymentType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "CONTAINER_TASK" => Ok(DeploymentType::ContainerTask),
            _ => Err(DeployError::validation(format!(
                "unknown deployment type {s:?}"
            ))),
        }
    }
}

/// Type-specific deployment payload, persisted as tagged JSON.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeploymentData {
    ContainerTask { image: String },
}

impl DeploymentData {
    pub fn deployment_type(&self) -> DeploymentType {
        match self {
            DeploymentData::ContainerTask { .. } => DeploymentType::ContainerTask,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Deployment {
    pub id: DeploymentId,

    // assigned by the store on insert
    pub deployment_number: u64,

    pub data: DeploymentData,
    pub status: DeploymentStatus,
    pub build_number: String,
    pub git_hash: String,
    pub deployable_id: DeployableId,
    pub environment_id: EnvironmentId,
    pub deployable_config_id: DeployableConfigId,
    pub deployable_vector_id: DeployableVectorId,
    pub created: DateTime<Utc>,
}

impl Deployment {
    /// A PENDING deployment of `data` along `vector`, pinned to `config_id`.
    pub fn pending(
        data: DeploymentData,
        build_number: &str,
        git_hash: &str,
        vector: &DeployableVector,
        config_id: DeployableConfigId,
    ) -> Self {
        Deployment {
            id: DeploymentId::new(),
            deployment_number: 0,
            data,
            status: DeploymentStatus::Pending,
            build_number: build_number.to_string(),
            git_hash: git_hash.to_string(),
            deployable_id: vector.deployable_id,
            environment_id: vector.target_environment_id,
            deployable_config_id: config_id,
            deployable_vector_id: vector.id,
            created: Utc::now(),
        }
    }

    pub fn deployment_type(&self) -> DeploymentType {
        self.data.deployment_type()
    }
}

impl From<Deployment> for DeploymentMessage {
    fn from(deployment: Deployment) -> Self {
        let deployment_type = deployment.deployment_type();
        let deployment_data = match deployment.data {
            DeploymentData::ContainerTask { image } => {
                DeploymentMessageData::ContainerTask(ContainerTaskDeployment { image })
            }
        };

        Self {
            id: deployment.id.to_string(),
            deployment_number: deployment.deployment_number,
            r#type: deployment_type.to_string(),
            status: deployment.status.to_string(),
            build_number: deployment.build_number,
            git_hash: deployment.git_hash,
            deployable_id: deployment.deployable_id.to_string(),
            environment_id: deployment.environment_id.to_string(),
            deployable_config_id: deployment.deployable_config_id.to_string(),
            deployable_vector_id: deployment.deployable_vector_id.to_string(),
            created: deployment.created.timestamp(),
            deployment_data: Some(deployment_data),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deployment_data_is_tagged() {
        let data = DeploymentData::ContainerTask {
            image: "r/svc-a:42".to_string(),
        };

        let json = serde_json::to_value(&data).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "type": "CONTAINER_TASK", "image": "r/svc-a:42" })
        );

        let decoded: DeploymentData = serde_json::from_value(json).unwrap();
        assert_eq!(decoded.deployment_type(), DeploymentType::ContainerTask);
    }

    #[test]
    fn test_status_parsing() {
        assert_eq!(
            "in_progress".parse::<DeploymentStatus>().unwrap(),
            DeploymentStatus::InProgress
        );
        assert!("ANY".parse::<DeploymentStatus>().is_err());
        assert!(DeploymentStatus::Failed.is_terminal());
        assert!(!DeploymentStatus::Pending.is_terminal());
    }
}
