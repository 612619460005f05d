use http::Request;
use hyper::Body;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tonic::codegen::http;
use tonic::transport::Server;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use shipyard::acl::Authorizer;
use shipyard::api::{
    GrpcConfigService, GrpcDeployableGroupService, GrpcDeployableService, GrpcDeploymentService,
    GrpcEnvironmentService, GrpcHealthService, GrpcVectorService,
};
use shipyard::config::ServiceConfig;
use shipyard::executor::{AwsContainerOrchestrator, AwsRoleAssumer, EcsExecutor};
use shipyard::models::DeploymentType;
use shipyard::persistence::memory::MemoryStore;
use shipyard::persistence::relational::RelationalStore;
use shipyard::persistence::Store;
use shipyard::processor::{DeploymentWorker, EventIngestor};
use shipyard::services::{
    ConfigService, DeployableGroupService, DeployableService, DeploymentService,
    EnvironmentService, PromotionService, VectorService,
};
use shipyard_core::{
    ConfigServer, DeployableGroupServer, DeployableServer, DeploymentServer, EnvironmentServer,
    HealthServer, MessageQueue, VectorServer,
};
use shipyard_sqs_queue::{SqsMessageQueue, SqsQueueSettings};

const DEFAULT_SERVICE_CONSUMER_ID: &str = "shipyard";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let tracer = opentelemetry_jaeger::new_agent_pipeline()
        .with_service_name(DEFAULT_SERVICE_CONSUMER_ID)
        .install_simple()?;

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_opentelemetry::layer().with_tracer(tracer))
        .with(tracing_subscriber::fmt::layer())
        .try_init()?;

    let config = ServiceConfig::from_env()?;

    let store: Arc<dyn Store> = if config.uses_memory_store() {
        tracing::warn!("using the in-memory store, nothing will be persisted");
        Arc::new(MemoryStore::default())
    } else {
        let db = Arc::new(
            PgPoolOptions::new()
                .max_connections(20)
                .connect(&config.database_url)
                .await?,
        );

        sqlx::migrate!().run(&*db).await?;

        Arc::new(RelationalStore::new(db))
    };

    let group_service = Arc::new(DeployableGroupService {
        store: Arc::clone(&store),
    });

    let environment_service = Arc::new(EnvironmentService {
        store: Arc::clone(&store),

        group_service: Arc::clone(&group_service),
    });

    let deployable_service = Arc::new(DeployableService {
        store: Arc::clone(&store),

        group_service: Arc::clone(&group_service),
    });

    let config_service = Arc::new(ConfigService {
        store: Arc::clone(&store),

        environment_service: Arc::clone(&environment_service),
        deployable_service: Arc::clone(&deployable_service),
    });

    let vector_service = Arc::new(VectorService {
        store: Arc::clone(&store),

        deployable_service: Arc::clone(&deployable_service),
        environment_service: Arc::clone(&environment_service),
    });

    let deployment_service = Arc::new(DeploymentService {
        store: Arc::clone(&store),

        deployable_service: Arc::clone(&deployable_service),
    });

    let promotion_service = Arc::new(PromotionService {
        store: Arc::clone(&store),

        group_service: Arc::clone(&group_service),
        environment_service: Arc::clone(&environment_service),
        deployable_service: Arc::clone(&deployable_service),
    });

    let sdk_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(aws_config::Region::new(config.ecs.region.clone()))
        .load()
        .await;

    let ecs_executor = Arc::new(EcsExecutor {
        store: Arc::clone(&store),

        orchestrator: Arc::new(AwsContainerOrchestrator::new(sdk_config.clone())),
        role_assumer: Arc::new(AwsRoleAssumer::new(&sdk_config)),

        settings: config.ecs.clone(),
    });

    let worker = Arc::new(
        DeploymentWorker::new(Arc::clone(&store), config.discovery_interval)
            .with_executor(DeploymentType::ContainerTask, ecs_executor),
    );
    worker.start()?;

    let ingestor = match &config.deployment_queue_url {
        Some(queue_url) => {
            let settings = SqsQueueSettings {
                visibility_timeout_secs: config.queue_visibility_timeout_secs,
                wait_time_secs: config.queue_wait_time_secs,
                ..SqsQueueSettings::new(queue_url)
            };
            let queue: Arc<dyn MessageQueue> = Arc::new(SqsMessageQueue::new(&sdk_config, settings));

            let ingestor = Arc::new(EventIngestor::new(queue, Arc::clone(&promotion_service)));
            ingestor.start()?;

            Some(ingestor)
        }
        None => {
            tracing::info!("DEPLOYMENT_QUEUE_URL not set, not ingesting queue events");
            None
        }
    };

    let authorizer = Authorizer::new(config.api_token.clone());

    let group_grpc_service = DeployableGroupServer::with_interceptor(
        GrpcDeployableGroupService::new(Arc::clone(&group_service)),
        authorizer.clone(),
    );

    let environment_grpc_service = EnvironmentServer::with_interceptor(
        GrpcEnvironmentService::new(Arc::clone(&environment_service)),
        authorizer.clone(),
    );

    let deployable_grpc_service = DeployableServer::with_interceptor(
        GrpcDeployableService::new(Arc::clone(&deployable_service)),
        authorizer.clone(),
    );

    let config_grpc_service = ConfigServer::with_interceptor(
        GrpcConfigService::new(Arc::clone(&config_service)),
        authorizer.clone(),
    );

    let vector_grpc_service = VectorServer::with_interceptor(
        GrpcVectorService::new(Arc::clone(&vector_service)),
        authorizer.clone(),
    );

    let deployment_grpc_service = DeploymentServer::with_interceptor(
        GrpcDeploymentService::new(Arc::clone(&deployment_service), Arc::clone(&promotion_service)),
        authorizer.clone(),
    );

    let health_grpc_service = HealthServer::with_interceptor(GrpcHealthService::new(Arc::clone(&store)), authorizer);

    tracing::info!("grpc services listening on {}", config.endpoint);

    let tracing_layer = ServiceBuilder::new().layer(TraceLayer::new_for_grpc().make_span_with(
        |request: &Request<Body>| {
            tracing::info_span!(
                "gRPC",
                http.method = %request.method(),
                http.url = %request.uri(),
                http.status_code = tracing::field::Empty,
                otel.name = %format!("gRPC {}", request.method()),
                otel.kind = "client",
                otel.status_code = tracing::field::Empty,
            )
        },
    ));

    let served = Server::builder()
        .accept_http1(true)
        .layer(tracing_layer)
        .add_service(tonic_web::enable(group_grpc_service))
        .add_service(tonic_web::enable(environment_grpc_service))
        .add_service(tonic_web::enable(deployable_grpc_service))
        .add_service(tonic_web::enable(config_grpc_service))
        .add_service(tonic_web::enable(vector_grpc_service))
        .add_service(tonic_web::enable(deployment_grpc_service))
        .add_service(tonic_web::enable(health_grpc_service))
        .serve_with_shutdown(config.endpoint, async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::error!("failed to listen for shutdown signal: {err}");
            }
            tracing::info!("shutdown signal received");
        })
        .await;

    worker.stop().await?;
    if let Some(ingestor) = ingestor {
        ingestor.stop().await?;
    }

    opentelemetry::global::shutdown_tracer_provider();

    served?;

    Ok(())
}
