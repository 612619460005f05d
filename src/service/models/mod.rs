mod config;
mod deployable;
mod deployment;
mod environment;
mod group;
mod vector;

pub use config::{
    ConfigStatus, DeployableConfig, DeployableConfigUpdate, DeployableConfigValue,
    EnvironmentConfig, EnvironmentConfigUpdate, EnvironmentConfigValue,
};
pub use deployable::{Deployable, DeployableUpdate};
pub use deployment::{Deployment, DeploymentData, DeploymentStatus, DeploymentType};
pub use environment::{Environment, EnvironmentUpdate};
pub use group::{DeployableGroup, DeployableGroupUpdate};
pub use vector::{DeployableVector, VectorSourceType};
