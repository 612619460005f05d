// deployable group protobufs

pub mod group {
    tonic::include_proto!("shipyard.group");
}

pub use group::deployable_group_client::DeployableGroupClient;
pub use group::deployable_group_server::{
    DeployableGroup as DeployableGroupTrait, DeployableGroupServer,
};
pub use group::{
    CreateDeployableGroupRequest, DeployableGroupMessage, ListDeployableGroupsRequest,
    ListDeployableGroupsResponse,
};

// environment protobufs

pub mod environment {
    tonic::include_proto!("shipyard.environment");
}

pub use environment::environment_client::EnvironmentClient;
pub use environment::environment_server::{Environment as EnvironmentTrait, EnvironmentServer};
pub use environment::list_environments_request::By as ListEnvironmentsBy;
pub use environment::{
    CreateEnvironmentRequest, EnvironmentMessage, ListEnvironmentsRequest,
    ListEnvironmentsResponse,
};

// deployable protobufs

pub mod deployable {
    tonic::include_proto!("shipyard.deployable");
}

pub use deployable::deployable_client::DeployableClient;
pub use deployable::deployable_server::{Deployable as DeployableTrait, DeployableServer};
pub use deployable::list_deployables_request::By as ListDeployablesBy;
pub use deployable::{
    CreateDeployableRequest, DeployableMessage, ListDeployablesRequest, ListDeployablesResponse,
};

// config protobufs

pub mod config {
    tonic::include_proto!("shipyard.config");
}

pub use config::config_client::ConfigClient;
pub use config::config_server::{Config as ConfigTrait, ConfigServer};
pub use config::{
    CreateDeployableConfigRequest, CreateEnvironmentConfigRequest, DeployableConfigMessage,
    EnvironmentConfigMessage, ListDeployableConfigsRequest, ListDeployableConfigsResponse,
    ListEnvironmentConfigsRequest, ListEnvironmentConfigsResponse,
};

// vector protobufs

pub mod vector {
    tonic::include_proto!("shipyard.vector");
}

pub use vector::vector_client::VectorClient;
pub use vector::vector_server::{Vector as VectorTrait, VectorServer};
pub use vector::{
    CreateDeployableVectorRequest, DeleteDeployableVectorResponse, DeployableVectorIdRequest,
    DeployableVectorMessage, ListDeployableVectorsRequest, ListDeployableVectorsResponse,
    VectorSourceType,
};

// deployment protobufs

pub mod deployment {
    tonic::include_proto!("shipyard.deployment");
}

pub use deployment::deployment_client::DeploymentClient;
pub use deployment::deployment_message::DeploymentData as DeploymentMessageData;
pub use deployment::deployment_server::{Deployment as DeploymentTrait, DeploymentServer};
pub use deployment::{
    ArtifactType, ContainerTaskDeployment, DeploymentMessage, DeploymentStatusFilter,
    ListDeploymentsRequest, ListDeploymentsResponse, PromoteGroupRequest, PromoteRequest,
    ReportBuildCompleteRequest,
};

// health protobufs

pub mod health {
    tonic::include_proto!("shipyard.health");
}

pub use health::health_client::HealthClient;
pub use health::health_server::{Health as HealthTrait, HealthServer};
pub use health::{HealthRequest, HealthResponse};
