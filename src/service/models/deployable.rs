use chrono::{DateTime, Utc};
use shipyard_core::{DeployableGroupId, DeployableId, DeployableMessage};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Deployable {
    pub id: DeployableId,
    pub deployable_group_id: DeployableGroupId,
    pub name: String,
    pub description: String,
    pub git_url: String,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
}

impl Deployable {
    pub fn new(
        deployable_group_id: DeployableGroupId,
        name: impl Into<String>,
        description: impl Into<String>,
        git_url: impl Into<String>,
    ) -> Self {
        let now = Utc::now();

        Deployable {
            id: DeployableId::new(),
            deployable_group_id,
            name: name.into(),
            description: description.into(),
            git_url: git_url.into(),
            created: now,
            modified: now,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DeployableUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub git_url: Option<String>,
}

impl DeployableUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.description.is_none() && self.git_url.is_none()
    }
}

impl From<Deployable> for DeployableMessage {
    fn from(deployable: Deployable) -> Self {
        Self {
            id: deployable.id.to_string(),
            deployable_group_id: deployable.deployable_group_id.to_string(),
            name: deployable.name,
            description: deployable.description,
            git_url: deployable.git_url,
            created: deployable.created.timestamp(),
            modified: deployable.modified.timestamp(),
        }
    }
}
