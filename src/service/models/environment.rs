use chrono::{DateTime, Utc};
use shipyard_core::{DeployableGroupId, EnvironmentId, EnvironmentMessage};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Environment {
    pub id: EnvironmentId,
    pub deployable_group_id: DeployableGroupId,
    pub name: String,
    pub description: String,
    pub is_prod: bool,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
}

impl Environment {
    pub fn new(
        deployable_group_id: DeployableGroupId,
        name: impl Into<String>,
        description: impl Into<String>,
        is_prod: bool,
    ) -> Self {
        let now = Utc::now();

        Environment {
            id: EnvironmentId::new(),
            deployable_group_id,
            name: name.into(),
            description: description.into(),
            is_prod,
            created: now,
            modified: now,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EnvironmentUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub is_prod: Option<bool>,
}

impl EnvironmentUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.description.is_none() && self.is_prod.is_none()
    }
}

impl From<Environment> for EnvironmentMessage {
    fn from(environment: Environment) -> Self {
        Self {
            id: environment.id.to_string(),
            deployable_group_id: environment.deployable_group_id.to_string(),
            name: environment.name,
            description: environment.description,
            is_prod: environment.is_prod,
            created: environment.created.timestamp(),
            modified: environment.modified.timestamp(),
        }
    }
}
