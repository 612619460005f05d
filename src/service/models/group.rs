use chrono::{DateTime, Utc};
use shipyard_core::{DeployableGroupId, DeployableGroupMessage};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeployableGroup {
    pub id: DeployableGroupId,
    pub name: String,
    pub description: String,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
}

impl DeployableGroup {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        let now = Utc::now();

        DeployableGroup {
            id: DeployableGroupId::new(),
            name: name.into(),
            description: description.into(),
            created: now,
            modified: now,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DeployableGroupUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
}

impl DeployableGroupUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.description.is_none()
    }
}

impl From<DeployableGroup> for DeployableGroupMessage {
    fn from(group: DeployableGroup) -> Self {
        Self {
            id: group.id.to_string(),
            name: group.name,
            description: group.description,
            created: group.created.timestamp(),
            modified: group.modified.timestamp(),
        }
    }
}
