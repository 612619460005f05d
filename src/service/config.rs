use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context;

use crate::executor::EcsSettings;

pub const MEMORY_DATABASE_URL: &str = "memory";

const DEFAULT_ENDPOINT: &str = "[::1]:50051";
const DEFAULT_REGION: &str = "us-east-1";
const DEFAULT_CLUSTER_NAME_SUFFIX: &str = "-svc";
const DEFAULT_LOG_GROUP_PREFIX: &str = "/deploy";
const DEFAULT_DISCOVERY_INTERVAL_SECS: u64 = 30;
const DEFAULT_QUEUE_VISIBILITY_TIMEOUT_SECS: i32 = 300;
const DEFAULT_QUEUE_WAIT_TIME_SECS: i32 = 20;

/// Settings of the api process, read from the environment (and `.env`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServiceConfig {
    pub database_url: String,
    pub endpoint: SocketAddr,
    pub api_token: Option<String>,

    pub deployment_queue_url: Option<String>,
    pub queue_visibility_timeout_secs: i32,
    pub queue_wait_time_secs: i32,

    pub discovery_interval: Duration,

    pub ecs: EcsSettings,
}

impl ServiceConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|name| dotenvy::var(name).ok())
    }

    /// Builds the config from any variable lookup. Empty values count as
    /// unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let var = |name: &str| lookup(name).filter(|value| !value.is_empty());

        let database_url = var("DATABASE_URL").context("DATABASE_URL must be set")?;

        let endpoint = var("ENDPOINT").unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());
        let endpoint = endpoint
            .parse()
            .with_context(|| format!("ENDPOINT {endpoint:?} is not a socket address"))?;

        let discovery_interval_secs = match var("DISCOVERY_INTERVAL_SECS") {
            Some(value) => value
                .parse::<u64>()
                .with_context(|| format!("DISCOVERY_INTERVAL_SECS {value:?} is not a number"))?,
            None => DEFAULT_DISCOVERY_INTERVAL_SECS,
        };
        if discovery_interval_secs == 0 {
            anyhow::bail!("DISCOVERY_INTERVAL_SECS must be greater than zero");
        }

        let queue_visibility_timeout_secs = match var("QUEUE_VISIBILITY_TIMEOUT_SECS") {
            Some(value) => value
                .parse()
                .with_context(|| format!("QUEUE_VISIBILITY_TIMEOUT_SECS {value:?} is not a number"))?,
            None => DEFAULT_QUEUE_VISIBILITY_TIMEOUT_SECS,
        };
        let queue_wait_time_secs = match var("QUEUE_WAIT_TIME_SECS") {
            Some(value) => value
                .parse()
                .with_context(|| format!("QUEUE_WAIT_TIME_SECS {value:?} is not a number"))?,
            None => DEFAULT_QUEUE_WAIT_TIME_SECS,
        };

        Ok(ServiceConfig {
            database_url,
            endpoint,
            api_token: var("API_TOKEN"),
            deployment_queue_url: var("DEPLOYMENT_QUEUE_URL"),
            queue_visibility_timeout_secs,
            queue_wait_time_secs,
            discovery_interval: Duration::from_secs(discovery_interval_secs),
            ecs: EcsSettings {
                role_arn: var("DEPLOYMENT_ROLE_ARN").unwrap_or_default(),
                region: var("AWS_REGION").unwrap_or_else(|| DEFAULT_REGION.to_string()),
                cluster_suffix: var("CLUSTER_NAME_SUFFIX")
                    .unwrap_or_else(|| DEFAULT_CLUSTER_NAME_SUFFIX.to_string()),
                log_group_prefix: var("LOG_GROUP_PREFIX")
                    .unwrap_or_else(|| DEFAULT_LOG_GROUP_PREFIX.to_string()),
            },
        })
    }

    pub fn uses_memory_store(&self) -> bool {
        self.database_url == MEMORY_DATABASE_URL
    }
}
