use std::sync::Arc;

use shipyard_core::{HealthRequest, HealthResponse, HealthTrait};
use tonic::{Request, Response, Status};

use crate::persistence::Store;

/// Reports ok when the store can open and abandon a transaction.
#[derive(Debug)]
pub struct GrpcHealthService {
    store: Arc<dyn Store>,
}

impl GrpcHealthService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        GrpcHealthService { store }
    }

    async fn store_reachable(&self) -> anyhow::Result<()> {
        self.store.begin().await?.rollback().await
    }
}

#[tonic::async_trait]
impl HealthTrait for GrpcHealthService {
    #[tracing::instrument(name = "grpc::health::health", skip_all)]
    async fn health(&self, _request: Request<HealthRequest>) -> Result<Response<HealthResponse>, Status> {
        let ok = match self.store_reachable().await {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!("store unreachable: {err:#}");
                false
            }
        };

        Ok(Response::new(HealthResponse { ok }))
    }
}

#[cfg(test)]
mod tests {
    use shipyard_core::{HealthRequest, HealthTrait};
    use tonic::Request;

    use super::GrpcHealthService;
    use crate::test::get_service_fixture;

    #[tokio::test]
    async fn test_health() {
        let fixture = get_service_fixture().await;
        let health_grpc_service = GrpcHealthService::new(fixture.store.clone());

        let response = health_grpc_service
            .health(Request::new(HealthRequest {}))
            .await
            .unwrap()
            .into_inner();

        assert!(response.ok);

        // a second check must not be blocked by the first one's transaction
        let response = health_grpc_service
            .health(Request::new(HealthRequest {}))
            .await
            .unwrap()
            .into_inner();

        assert!(response.ok);
    }
}
