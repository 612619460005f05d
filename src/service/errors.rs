use tonic::{Code, Status};

/// Failure classes surfaced to callers. Anything that is not one of these is
/// treated as internal.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum DeployError {
    #[error("{0}")]
    Validation(String),

    #[error("Not Found: {0}")]
    NotFound(String),

    #[error("{0}")]
    FailedPrecondition(String),

    #[error("{0}")]
    Internal(String),
}

impl DeployError {
    pub fn validation(message: impl Into<String>) -> anyhow::Error {
        DeployError::Validation(message.into()).into()
    }

    pub fn not_found(message: impl Into<String>) -> anyhow::Error {
        DeployError::NotFound(message.into()).into()
    }

    pub fn failed_precondition(message: impl Into<String>) -> anyhow::Error {
        DeployError::FailedPrecondition(message.into()).into()
    }

    pub fn internal(message: impl Into<String>) -> anyhow::Error {
        DeployError::Internal(message.into()).into()
    }
}

/// Finds the first `DeployError` in an error's chain.
pub fn deploy_error(error: &anyhow::Error) -> Option<&DeployError> {
    error
        .chain()
        .find_map(|cause| cause.downcast_ref::<DeployError>())
}

pub fn is_not_found(error: &anyhow::Error) -> bool {
    matches!(deploy_error(error), Some(DeployError::NotFound(_)))
}

pub fn is_validation(error: &anyhow::Error) -> bool {
    matches!(deploy_error(error), Some(DeployError::Validation(_)))
}

pub fn status_from_error(error: anyhow::Error) -> Status {
    let code = match deploy_error(&error) {
        Some(DeployError::Validation(_)) => Code::InvalidArgument,
        Some(DeployError::NotFound(_)) => Code::NotFound,
        Some(DeployError::FailedPrecondition(_)) => Code::FailedPrecondition,
        Some(DeployError::Internal(_)) | None => Code::Internal,
    };

    Status::new(code, format!("{error:#}"))
}
