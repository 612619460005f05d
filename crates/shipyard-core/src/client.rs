use tonic::{
    metadata::{Ascii, MetadataValue},
    service::Interceptor,
    Status,
};

/// Attaches the profile's API token to every outgoing request.
#[derive(Clone, Debug, Default)]
pub struct ClientInterceptor {
    pub token: Option<MetadataValue<Ascii>>,
}

impl Interceptor for ClientInterceptor {
    fn call(&mut self, mut request: tonic::Request<()>) -> Result<tonic::Request<()>, Status> {
        if let Some(token) = &self.token {
            request
                .metadata_mut()
                .insert("authorization", token.clone());
        }

        Ok(request)
    }
}
