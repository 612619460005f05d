use serde::{Deserialize, Serialize};

/// A build artifact that can be deployed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawArtifact", into = "RawArtifact")]
pub enum Artifact {
    DockerImage { image: String },
}

impl Artifact {
    pub const DOCKER_IMAGE: &'static str = "DOCKER_IMAGE";

    pub fn docker_image(image: impl Into<String>) -> Self {
        Artifact::DockerImage {
            image: image.into(),
        }
    }

    pub fn image(&self) -> &str {
        match self {
            Artifact::DockerImage { image } => image,
        }
    }
}

// Wire shape of an artifact. A missing type means a docker image.
#[derive(Clone, Debug, Serialize, Deserialize)]
struct RawArtifact {
    #[serde(rename = "type", default = "default_artifact_type")]
    artifact_type: String,
    #[serde(default)]
    image: String,
}

fn default_artifact_type() -> String {
    Artifact::DOCKER_IMAGE.to_string()
}

impl TryFrom<RawArtifact> for Artifact {
    type Error = String;

    fn try_from(raw: RawArtifact) -> Result<Self, Self::Error> {
        if !raw.artifact_type.eq_ignore_ascii_case(Artifact::DOCKER_IMAGE) {
            return Err(format!("unknown artifact type {:?}", raw.artifact_type));
        }

        Ok(Artifact::DockerImage { image: raw.image })
    }
}

impl From<Artifact> for RawArtifact {
    fn from(artifact: Artifact) -> Self {
        match artifact {
            Artifact::DockerImage { image } => RawArtifact {
                artifact_type: Artifact::DOCKER_IMAGE.to_string(),
                image,
            },
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildCompleteEvent {
    pub deployable_id: String,
    pub build_number: String,
    #[serde(default)]
    pub git_hash: String,
    pub artifact: Artifact,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromotionEvent {
    pub deployment_id: String,
}

/// Events published onto the deployment queue, tagged by `type`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DomainEvent {
    BuildComplete(BuildCompleteEvent),
    Promotion(PromotionEvent),
    #[serde(other)]
    Unknown,
}

/// What a single queue message turned out to be.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IngestedEvent {
    BuildComplete(BuildCompleteEvent),
    Promotion(PromotionEvent),
    Unknown(String),
}

#[derive(Deserialize)]
struct NotificationEnvelope {
    #[serde(rename = "Message")]
    message: String,
}

#[derive(Deserialize)]
struct EventWrapper {
    event: DomainEvent,
}

/// Decodes a queue message body. Bodies are either a bare build-complete
/// record, or a pub/sub notification envelope whose `Message` field holds a
/// JSON `{"event": {...}}` document.
pub fn parse_queue_message(body: &str) -> anyhow::Result<IngestedEvent> {
    let document: serde_json::Value = serde_json::from_str(body)?;

    if document.get("Message").is_some() {
        let envelope: NotificationEnvelope = serde_json::from_value(document)?;
        let wrapper: EventWrapper = serde_json::from_str(&envelope.message)?;

        return Ok(match wrapper.event {
            DomainEvent::BuildComplete(event) => IngestedEvent::BuildComplete(event),
            DomainEvent::Promotion(event) => IngestedEvent::Promotion(event),
            DomainEvent::Unknown => IngestedEvent::Unknown(envelope.message),
        });
    }

    let event: BuildCompleteEvent = serde_json::from_value(document)?;

    Ok(IngestedEvent::BuildComplete(event))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_direct_build_complete() {
        let body = r#"{
            "deployable_id": "deployable_1",
            "build_number": "17",
            "git_hash": "abc123",
            "artifact": { "image": "registry/app:17" }
        }"#;

        let event = parse_queue_message(body).unwrap();

        assert_eq!(
            event,
            IngestedEvent::BuildComplete(BuildCompleteEvent {
                deployable_id: "deployable_1".to_string(),
                build_number: "17".to_string(),
                git_hash: "abc123".to_string(),
                artifact: Artifact::docker_image("registry/app:17"),
            })
        );
    }

    #[test]
    fn test_parse_envelope() {
        let inner = serde_json::json!({
            "event": {
                "type": "BUILD_COMPLETE",
                "deployable_id": "deployable_1",
                "build_number": "18",
                "git_hash": "def456",
                "artifact": { "type": "DOCKER_IMAGE", "image": "registry/app:18" }
            }
        });
        let body = serde_json::json!({
            "Type": "Notification",
            "MessageId": "0b3c",
            "Message": inner.to_string(),
        })
        .to_string();

        match parse_queue_message(&body).unwrap() {
            IngestedEvent::BuildComplete(event) => {
                assert_eq!(event.build_number, "18");
                assert_eq!(event.artifact.image(), "registry/app:18");
            }
            other => panic!("unexpected event {other:?}"),
        }

        let promotion = serde_json::json!({
            "Message": serde_json::json!({
                "event": { "type": "PROMOTION", "deployment_id": "deployment_9" }
            })
            .to_string()
        })
        .to_string();

        assert_eq!(
            parse_queue_message(&promotion).unwrap(),
            IngestedEvent::Promotion(PromotionEvent {
                deployment_id: "deployment_9".to_string()
            })
        );
    }

    #[test]
    fn test_unknown_event_type_is_reported() {
        let body = serde_json::json!({
            "Message": serde_json::json!({ "event": { "type": "ROLLBACK" } }).to_string()
        })
        .to_string();

        assert!(matches!(
            parse_queue_message(&body).unwrap(),
            IngestedEvent::Unknown(_)
        ));
    }

    #[test]
    fn test_malformed_bodies_fail() {
        assert!(parse_queue_message("not json").is_err());
        assert!(parse_queue_message(r#"{"deployable_id": "deployable_1"}"#).is_err());

        let unknown_artifact = r#"{
            "deployable_id": "deployable_1",
            "build_number": "17",
            "artifact": { "type": "TARBALL", "image": "x" }
        }"#;
        assert!(parse_queue_message(unknown_artifact).is_err());
    }
}
