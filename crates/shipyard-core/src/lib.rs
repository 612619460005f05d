mod client;
mod events;
mod ids;
mod protobufs;
mod queue;
mod task_definition;


pub use client::ClientInterceptor;
pub use events::{
    parse_queue_message, Artifact, BuildCompleteEvent, DomainEvent, IngestedEvent, PromotionEvent,
};
pub use ids::{
    new_id, DeployableConfigId, DeployableGroupId, DeployableId, DeployableVectorId,
    DeploymentId, EnvironmentConfigId, EnvironmentId, ParseIdError,
};
pub use queue::{MessageQueue, QueueMessage};
pub use task_definition::{
    task_definition_config_values, ContainerPortMapping, TaskDefinitionSnapshot, CONFIG_CPU,
    CONFIG_MEMORY, CONFIG_PORT_PREFIX,
};

pub use protobufs::*;
