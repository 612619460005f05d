use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use shipyard_core::test::get_deployable_config_values_fixture;
use shipyard_core::{DeployableGroupId, EnvironmentId};

use crate::executor::{
    ContainerOrchestrator, EcsExecutor, EcsSettings, EcsTaskDefinition, RoleAssumer,
    RoleCredentials, TaskDefinitionRevision,
};
use crate::models::{
    Deployable, DeployableConfig, DeployableGroup, DeployableVector, Environment, VectorSourceType,
};
use crate::persistence::memory::MemoryStore;
use crate::persistence::Store;
use crate::services::{
    ConfigService, DeployableGroupService, DeployableService, DeploymentService,
    EnvironmentService, PromotionService, VectorService,
};

/// Every service wired over one store, plus a uniquely named group with the
/// `dev` and `staging` environments and the `svc-a` deployable.
pub struct ServiceFixture {
    pub store: Arc<dyn Store>,

    pub group_service: Arc<DeployableGroupService>,
    pub environment_service: Arc<EnvironmentService>,
    pub deployable_service: Arc<DeployableService>,
    pub config_service: Arc<ConfigService>,
    pub vector_service: Arc<VectorService>,
    pub deployment_service: Arc<DeploymentService>,
    pub promotion_service: Arc<PromotionService>,

    pub group: DeployableGroup,
    pub dev: Environment,
    pub staging: Environment,
    pub deployable: Deployable,
}

pub async fn get_service_fixture() -> ServiceFixture {
    get_service_fixture_for_store(Arc::new(MemoryStore::default())).await
}

pub async fn get_service_fixture_for_store(store: Arc<dyn Store>) -> ServiceFixture {
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

    let group = group_service
        .create(&format!("g-{}", DeployableGroupId::new()), "fixture group")
        .await
        .unwrap();
    let dev = environment_service
        .create(group.id, "dev", "development", false)
        .await
        .unwrap();
    let staging = environment_service
        .create(group.id, "staging", "pre-production", false)
        .await
        .unwrap();
    let deployable = deployable_service
        .create(group.id, "svc-a", "service a", "git@example.com:org/svc-a.git")
        .await
        .unwrap();

    ServiceFixture {
        store,
        group_service,
        environment_service,
        deployable_service,
        config_service,
        vector_service,
        deployment_service,
        promotion_service,
        group,
        dev,
        staging,
        deployable,
    }
}

/// Creates an ACTIVE config for `svc-a` in each environment, in order.
pub async fn seed_deployable_configs(
    fixture: &ServiceFixture,
    environment_ids: &[EnvironmentId],
) -> Vec<DeployableConfig> {
    let mut configs = vec![];
    for environment_id in environment_ids {
        let (config, _) = fixture
            .config_service
            .create_deployable_config(
                fixture.deployable.id,
                *environment_id,
                None,
                &[],
                &get_deployable_config_values_fixture(),
            )
            .await
            .unwrap();
        configs.push(config);
    }

    configs
}

/// Creates a BUILD vector for `svc-a` into each environment, in order.
pub async fn seed_build_vectors(
    fixture: &ServiceFixture,
    environment_ids: &[EnvironmentId],
) -> Vec<DeployableVector> {
    let mut vectors = vec![];
    for environment_id in environment_ids {
        let vector = fixture
            .vector_service
            .create(fixture.deployable.id, VectorSourceType::Build, None, *environment_id)
            .await
            .unwrap();
        vectors.push(vector);
    }

    vectors
}

pub fn get_ecs_settings_fixture() -> EcsSettings {
    EcsSettings {
        role_arn: "arn:aws:iam::000000000000:role/deploy".to_string(),
        region: "us-east-1".to_string(),
        cluster_suffix: "-svc".to_string(),
        log_group_prefix: "/deploy".to_string(),
    }
}

/// Records the session names it was asked for.
#[derive(Debug, Default)]
pub struct MockRoleAssumer {
    pub sessions: Mutex<Vec<String>>,
}

#[async_trait]
impl RoleAssumer for MockRoleAssumer {
    async fn assume_role(&self, _role_arn: &str, session_name: &str) -> anyhow::Result<RoleCredentials> {
        self.sessions.lock().unwrap().push(session_name.to_string());

        Ok(RoleCredentials {
            access_key_id: "AKIDEXAMPLE".to_string(),
            secret_access_key: "secret".to_string(),
            session_token: None,
            expiration: None,
        })
    }
}

/// Records registered task definitions and service updates. With `fail` set
/// every registration is rejected.
#[derive(Debug, Default)]
pub struct MockOrchestrator {
    pub fail: bool,
    pub definitions: Mutex<Vec<EcsTaskDefinition>>,
    pub updates: Mutex<Vec<(String, String, String)>>,
}

#[async_trait]
impl ContainerOrchestrator for MockOrchestrator {
    async fn register_task_definition(
        &self,
        _credentials: &RoleCredentials,
        definition: &EcsTaskDefinition,
    ) -> anyhow::Result<TaskDefinitionRevision> {
        if self.fail {
            anyhow::bail!("orchestrator unavailable");
        }

        let mut definitions = self.definitions.lock().unwrap();
        definitions.push(definition.clone());
        let revision = definitions.len() as i32;

        Ok(TaskDefinitionRevision {
            family: definition.family.clone(),
            revision,
            arn: format!(
                "arn:aws:ecs:us-east-1:000000000000:task-definition/{}:{revision}",
                definition.family
            ),
        })
    }

    async fn update_service(
        &self,
        _credentials: &RoleCredentials,
        cluster: &str,
        service: &str,
        task_definition: &str,
    ) -> anyhow::Result<()> {
        self.updates.lock().unwrap().push((
            cluster.to_string(),
            service.to_string(),
            task_definition.to_string(),
        ));

        Ok(())
    }
}

/// An ECS executor over the fixture store backed by the mocks.
pub fn get_ecs_executor_fixture(
    fixture: &ServiceFixture,
    orchestrator: Arc<MockOrchestrator>,
    role_assumer: Arc<MockRoleAssumer>,
) -> Arc<EcsExecutor> {
    Arc::new(EcsExecutor {
        store: Arc::clone(&fixture.store),
        orchestrator,
        role_assumer,
        settings: get_ecs_settings_fixture(),
    })
}
