mod config;
mod deployable;
mod deployment;
mod environment;
mod group;
mod promotion;
mod vector;

pub use config::{merge_config_values, ConfigService};
pub use deployable::DeployableService;
pub use deployment::DeploymentService;
pub use environment::EnvironmentService;
pub use group::DeployableGroupService;
pub use promotion::PromotionService;
pub use vector::VectorService;
