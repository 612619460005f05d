use tonic::metadata::MetadataMap;
use tonic::service::Interceptor;
use tonic::{Request, Status};

pub fn get_token_from_headers(metadata: &MetadataMap) -> Result<String, Status> {
    let auth_header = match metadata.get("authorization") {
        Some(auth_header) => auth_header,
        None => {
            return Err(Status::new(
                tonic::Code::Unauthenticated,
                "missing authorization header",
            ))
        }
    };

    let token = match auth_header.to_str() {
        Ok(token) => token,
        Err(_) => {
            return Err(Status::new(
                tonic::Code::InvalidArgument,
                "authorization header malformed",
            ))
        }
    };

    Ok(token.strip_prefix("Bearer ").unwrap_or(token).to_string())
}

/// Checks the `authorization` header against the configured API token, as a
/// raw token or `Bearer <token>`. Without a configured token every request is
/// let through.
#[derive(Clone, Default)]
pub struct Authorizer {
    token: Option<String>,
}

impl std::fmt::Debug for Authorizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authorizer")
            .field("enabled", &self.token.is_some())
            .finish()
    }
}

impl Authorizer {
    pub fn new(token: Option<String>) -> Self {
        Authorizer {
            token: token.filter(|token| !token.is_empty()),
        }
    }
}

impl Interceptor for Authorizer {
    #[tracing::instrument(name = "acl::authorize", skip_all)]
    fn call(&mut self, request: Request<()>) -> Result<Request<()>, Status> {
        let Some(expected) = &self.token else {
            return Ok(request);
        };

        let token = get_token_from_headers(request.metadata())?;
        if &token != expected {
            return Err(Status::new(tonic::Code::Unauthenticated, "invalid api token"));
        }

        Ok(request)
    }
}

#[cfg(test)]
mod tests {
    use tonic::metadata::MetadataValue;
    use tonic::Code;

    use super::*;

    fn request_with(header: Option<&'static str>) -> Request<()> {
        let mut request = Request::new(());
        if let Some(header) = header {
            request
                .metadata_mut()
                .insert("authorization", MetadataValue::from_static(header));
        }
        request
    }

    #[test]
    fn test_open_when_no_token_configured() {
        let mut authorizer = Authorizer::new(None);
        assert!(authorizer.call(request_with(None)).is_ok());

        let mut authorizer = Authorizer::new(Some(String::new()));
        assert!(authorizer.call(request_with(None)).is_ok());
    }

    #[test]
    fn test_token_required() {
        let mut authorizer = Authorizer::new(Some("s3cret".to_string()));

        let status = authorizer.call(request_with(None)).unwrap_err();
        assert_eq!(status.code(), Code::Unauthenticated);

        let status = authorizer.call(request_with(Some("wrong"))).unwrap_err();
        assert_eq!(status.code(), Code::Unauthenticated);

        assert!(authorizer.call(request_with(Some("s3cret"))).is_ok());
        assert!(authorizer.call(request_with(Some("Bearer s3cret"))).is_ok());
    }
}
