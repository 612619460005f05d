use std::str::FromStr;

use shipyard_core::ParseIdError;
use tonic::Status;

mod config;
mod deployable;
mod deployment;
mod environment;
mod group;
mod health;
mod vector;

pub use config::GrpcConfigService;
pub use deployable::GrpcDeployableService;
pub use deployment::GrpcDeploymentService;
pub use environment::GrpcEnvironmentService;
pub use group::GrpcDeployableGroupService;
pub use health::GrpcHealthService;
pub use vector::GrpcVectorService;

/// Parses a required prefixed id from a request field.
pub(crate) fn parse_id<T>(field: &str, value: &str) -> Result<T, Status>
where
    T: FromStr<Err = ParseIdError>,
{
    if value.is_empty() {
        return Err(Status::invalid_argument(format!("{field} cannot be empty")));
    }

    value
        .parse()
        .map_err(|err: ParseIdError| Status::invalid_argument(format!("{field}: {err}")))
}

/// Like `parse_id`, with an empty field meaning absent.
pub(crate) fn parse_optional_id<T>(field: &str, value: &str) -> Result<Option<T>, Status>
where
    T: FromStr<Err = ParseIdError>,
{
    if value.is_empty() {
        return Ok(None);
    }

    parse_id(field, value).map(Some)
}

#[cfg(test)]
mod tests {
    use shipyard_core::DeployableId;
    use tonic::Code;

    use super::*;

    #[test]
    fn test_parse_id() {
        let id = DeployableId::new();
        assert_eq!(parse_id::<DeployableId>("deployable_id", &id.to_string()).unwrap(), id);

        let status = parse_id::<DeployableId>("deployable_id", "").unwrap_err();
        assert_eq!(status.code(), Code::InvalidArgument);
        assert_eq!(status.message(), "deployable_id cannot be empty");

        let status = parse_id::<DeployableId>("deployable_id", "environment_1").unwrap_err();
        assert_eq!(status.code(), Code::InvalidArgument);

        assert_eq!(parse_optional_id::<DeployableId>("deployable_id", "").unwrap(), None);
    }
}
