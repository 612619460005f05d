use std::fmt::Debug;

use async_trait::async_trait;

use crate::models::Deployment;

mod aws;
mod ecs;

pub use aws::{AwsContainerOrchestrator, AwsRoleAssumer};
pub use ecs::{
    ContainerOrchestrator, EcsExecutor, EcsSettings, EcsTaskDefinition, RoleAssumer,
    RoleCredentials, TaskDefinitionRevision,
};

/// Carries out a claimed deployment. `Ok` marks the deployment COMPLETE and
/// an error marks it FAILED.
#[async_trait]
pub trait DeploymentExecutor: Debug + Send + Sync {
    async fn execute(&self, deployment: &Deployment) -> anyhow::Result<()>;
}
