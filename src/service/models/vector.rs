use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use shipyard_core::{
    DeployableId, DeployableVectorId, DeployableVectorMessage, EnvironmentId,
    VectorSourceType as VectorSourceTypeMessage,
};

use crate::errors::DeployError;

/// Where a vector's deployments come from. A `Build` vector has no source
/// environment; an `Environment` vector promotes out of one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VectorSourceType {
    Build,
    EnvironmentId,
}

impl VectorSourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            VectorSourceType::Build => "BUILD",
            VectorSourceType::EnvironmentId => "ENVIRONMENT_ID",
        }
    }
}

impl fmt::Display for VectorSourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VectorSourceType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "BUILD" => Ok(VectorSourceType::Build),
            "ENVIRONMENT_ID" => Ok(VectorSourceType::EnvironmentId),
            _ => Err(DeployError::validation(format!(
                "unknown vector source type {s:?}"
            ))),
        }
    }
}

impl From<VectorSourceTypeMessage> for VectorSourceType {
    fn from(source_type: VectorSourceTypeMessage) -> Self {
        match source_type {
            VectorSourceTypeMessage::Build => VectorSourceType::Build,
            VectorSourceTypeMessage::EnvironmentId => VectorSourceType::EnvironmentId,
        }
    }
}

impl From<VectorSourceType> for VectorSourceTypeMessage {
    fn from(source_type: VectorSourceType) -> Self {
        match source_type {
            VectorSourceType::Build => VectorSourceTypeMessage::Build,
            VectorSourceType::EnvironmentId => VectorSourceTypeMessage::EnvironmentId,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeployableVector {
    pub id: DeployableVectorId,
    pub deployable_id: DeployableId,
    pub source_type: VectorSourceType,
    pub source_environment_id: Option<EnvironmentId>,
    pub target_environment_id: EnvironmentId,
    pub created: DateTime<Utc>,
}

impl DeployableVector {
    pub fn from_build(deployable_id: DeployableId, target_environment_id: EnvironmentId) -> Self {
        DeployableVector {
            id: DeployableVectorId::new(),
            deployable_id,
            source_type: VectorSourceType::Build,
            source_environment_id: None,
            target_environment_id,
            created: Utc::now(),
        }
    }

    pub fn from_environment(
        deployable_id: DeployableId,
        source_environment_id: EnvironmentId,
        target_environment_id: EnvironmentId,
    ) -> Self {
        DeployableVector {
            id: DeployableVectorId::new(),
            deployable_id,
            source_type: VectorSourceType::EnvironmentId,
            source_environment_id: Some(source_environment_id),
            target_environment_id,
            created: Utc::now(),
        }
    }
}

impl From<DeployableVector> for DeployableVectorMessage {
    fn from(vector: DeployableVector) -> Self {
        Self {
            id: vector.id.to_string(),
            deployable_id: vector.deployable_id.to_string(),
            source_type: VectorSourceTypeMessage::from(vector.source_type) as i32,
            source_environment_id: vector
                .source_environment_id
                .map(|id| id.to_string())
                .unwrap_or_default(),
            target_environment_id: vector.target_environment_id.to_string(),
            created: vector.created.timestamp(),
        }
    }
}
