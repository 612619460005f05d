use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{Interval, MissedTickBehavior};

use super::Lifecycle;
use crate::executor::DeploymentExecutor;
use crate::models::{Deployment, DeploymentStatus, DeploymentType};
use crate::persistence::{transact, Store};

/// Claims PENDING deployments one per tick and hands each to the executor
/// registered for its type.
#[derive(Debug)]
pub struct DeploymentWorker {
    store: Arc<dyn Store>,
    executors: HashMap<DeploymentType, Arc<dyn DeploymentExecutor>>,
    interval: Duration,

    lifecycle: Lifecycle,
}

impl DeploymentWorker {
    pub fn new(store: Arc<dyn Store>, interval: Duration) -> Self {
        DeploymentWorker {
            store,
            executors: HashMap::new(),
            interval,
            lifecycle: Lifecycle::new("deployment worker"),
        }
    }

    pub fn with_executor(mut self, deployment_type: DeploymentType, executor: Arc<dyn DeploymentExecutor>) -> Self {
        self.executors.insert(deployment_type, executor);
        self
    }

    /// Moves the next eligible PENDING deployment to IN_PROGRESS. The claim
    /// commits before anything runs, so a deployment is claimed exactly once.
    #[tracing::instrument(name = "processor::worker::claim_next", skip(self))]
    pub async fn claim_next(&self) -> anyhow::Result<Option<Deployment>> {
        transact(&*self.store, |tx| {
            async move {
                let Some(mut deployment) = tx.next_pending_deployment().await? else {
                    return Ok(None);
                };

                tx.set_deployment_status(deployment.id, DeploymentStatus::InProgress)
                    .await?;
                deployment.status = DeploymentStatus::InProgress;

                Ok(Some(deployment))
            }
            .boxed()
        })
        .await
    }

    /// One discovery iteration: claims at most one deployment and spawns its
    /// execution. The returned handle resolves once the terminal status is
    /// written.
    pub async fn tick(&self) -> anyhow::Result<Option<JoinHandle<()>>> {
        let Some(deployment) = self.claim_next().await? else {
            return Ok(None);
        };

        tracing::info!(deployment_id = %deployment.id, "claimed deployment {}", deployment.deployment_number);

        let executor = self.executors.get(&deployment.deployment_type()).cloned();
        let store = Arc::clone(&self.store);

        Ok(Some(tokio::spawn(run_deployment(store, executor, deployment))))
    }

    pub fn start(self: &Arc<Self>) -> anyhow::Result<()> {
        let worker = Arc::clone(self);

        self.lifecycle.spawn(move |shutdown| worker.run(shutdown))
    }

    pub async fn stop(&self) -> anyhow::Result<()> {
        self.lifecycle.stop().await
    }

    async fn run(self: Arc<Self>, mut shutdown: broadcast::Receiver<()>) {
        let mut interval = discovery_interval(self.interval);

        loop {
            tokio::select! {
                _ = shutdown.recv() => break,
                _ = interval.tick() => {}
            }

            if let Err(err) = self.tick().await {
                tracing::error!("deployment discovery failed: {err:#}");
            }
        }
    }
}

/// Ticks every `period`. A tick missed during a slow iteration is delayed
/// rather than replayed in a burst.
fn discovery_interval(period: Duration) -> Interval {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

async fn run_deployment(
    store: Arc<dyn Store>,
    executor: Option<Arc<dyn DeploymentExecutor>>,
    deployment: Deployment,
) {
    let status = match executor {
        None => {
            tracing::error!(
                deployment_id = %deployment.id,
                "no executor for deployment type {}",
                deployment.deployment_type()
            );
            DeploymentStatus::Failed
        }
        Some(executor) => match AssertUnwindSafe(executor.execute(&deployment))
            .catch_unwind()
            .await
        {
            Ok(Ok(())) => DeploymentStatus::Complete,
            Ok(Err(err)) => {
                tracing::error!(deployment_id = %deployment.id, "deployment failed: {err:#}");
                DeploymentStatus::Failed
            }
            Err(_) => {
                tracing::error!(deployment_id = %deployment.id, "deployment executor panicked");
                DeploymentStatus::Failed
            }
        },
    };

    match store.set_deployment_status(deployment.id, status).await {
        Ok(_) => tracing::info!(deployment_id = %deployment.id, "deployment {}", status),
        Err(err) => tracing::error!(
            deployment_id = %deployment.id,
            "failed to mark deployment {status}: {err:#}"
        ),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use shipyard_core::test::get_build_complete_fixture;

    use super::*;
    use crate::test::{
        get_ecs_executor_fixture, get_service_fixture, seed_build_vectors, seed_deployable_configs,
        MockOrchestrator, MockRoleAssumer, ServiceFixture,
    };

    #[derive(Debug, Default)]
    struct CountingExecutor {
        fail: bool,
        executed: AtomicUsize,
    }

    #[async_trait]
    impl DeploymentExecutor for CountingExecutor {
        async fn execute(&self, _deployment: &Deployment) -> anyhow::Result<()> {
            self.executed.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                anyhow::bail!("orchestrator rejected the task");
            }
            Ok(())
        }
    }

    async fn pending_fixture() -> ServiceFixture {
        let fixture = get_service_fixture().await;
        seed_deployable_configs(&fixture, &[fixture.dev.id, fixture.staging.id]).await;
        seed_build_vectors(&fixture, &[fixture.dev.id, fixture.staging.id]).await;

        let event = get_build_complete_fixture(&fixture.deployable.id.to_string(), None);
        fixture
            .promotion_service
            .process_build_complete(&event)
            .await
            .unwrap();

        fixture
    }

    #[tokio::test]
    async fn test_tick_completes_deployment() {
        let fixture = pending_fixture().await;
        let executor = Arc::new(CountingExecutor::default());
        let worker = DeploymentWorker::new(Arc::clone(&fixture.store), Duration::from_secs(30))
            .with_executor(DeploymentType::ContainerTask, executor.clone());

        let handle = worker.tick().await.unwrap().unwrap();
        handle.await.unwrap();

        let deployments = fixture
            .deployment_service
            .list(fixture.deployable.id, None)
            .await
            .unwrap();
        assert_eq!(deployments[0].status, DeploymentStatus::Complete);
        assert_eq!(deployments[1].status, DeploymentStatus::Pending);
        assert_eq!(executor.executed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_execution_marks_failed() {
        let fixture = pending_fixture().await;
        let executor = Arc::new(CountingExecutor {
            fail: true,
            ..Default::default()
        });
        let worker = DeploymentWorker::new(Arc::clone(&fixture.store), Duration::from_secs(30))
            .with_executor(DeploymentType::ContainerTask, executor);

        worker.tick().await.unwrap().unwrap().await.unwrap();

        let failed = fixture
            .deployment_service
            .list(fixture.deployable.id, Some(DeploymentStatus::Failed))
            .await
            .unwrap();
        assert_eq!(failed.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_executor_marks_failed() {
        let fixture = pending_fixture().await;
        let worker = DeploymentWorker::new(Arc::clone(&fixture.store), Duration::from_secs(30));

        worker.tick().await.unwrap().unwrap().await.unwrap();

        let failed = fixture
            .deployment_service
            .list(fixture.deployable.id, Some(DeploymentStatus::Failed))
            .await
            .unwrap();
        assert_eq!(failed.len(), 1);
    }

    #[tokio::test]
    async fn test_claims_are_single_flight() {
        let fixture = pending_fixture().await;
        let worker = Arc::new(DeploymentWorker::new(Arc::clone(&fixture.store), Duration::from_secs(30)));

        let mut claims = vec![];
        for _ in 0..8 {
            let worker = Arc::clone(&worker);
            claims.push(tokio::spawn(async move { worker.claim_next().await.unwrap() }));
        }

        let mut claimed = vec![];
        for claim in claims {
            if let Some(deployment) = claim.await.unwrap() {
                claimed.push(deployment.id);
            }
        }

        assert_eq!(claimed.len(), 2);
        claimed.sort();
        claimed.dedup();
        assert_eq!(claimed.len(), 2);

        assert!(worker.claim_next().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_ecs_executor_runs_container_task() {
        let fixture = pending_fixture().await;
        let orchestrator = Arc::new(MockOrchestrator::default());
        let role_assumer = Arc::new(MockRoleAssumer::default());
        let executor = get_ecs_executor_fixture(&fixture, orchestrator.clone(), role_assumer.clone());
        let worker = DeploymentWorker::new(Arc::clone(&fixture.store), Duration::from_secs(30))
            .with_executor(DeploymentType::ContainerTask, executor);

        worker.tick().await.unwrap().unwrap().await.unwrap();

        let completed = fixture
            .deployment_service
            .list(fixture.deployable.id, Some(DeploymentStatus::Complete))
            .await
            .unwrap();
        assert_eq!(completed.len(), 1);

        let updates = orchestrator.updates.lock().unwrap().clone();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].0, "dev-svc");
        assert_eq!(updates[0].1, "svc-a");

        let definitions = orchestrator.definitions.lock().unwrap().clone();
        assert_eq!(definitions[0].image, "r/svc-a:42");
        assert_eq!(definitions[0].environment, vec![("LOG_LEVEL".to_string(), "info".to_string())]);

        let sessions = role_assumer.sessions.lock().unwrap().clone();
        assert_eq!(sessions, vec![format!("deployment-{}", completed[0].id)]);
    }

    #[tokio::test]
    async fn test_orchestrator_failure_marks_failed() {
        let fixture = pending_fixture().await;
        let orchestrator = Arc::new(MockOrchestrator {
            fail: true,
            ..Default::default()
        });
        let executor = get_ecs_executor_fixture(&fixture, orchestrator, Arc::new(MockRoleAssumer::default()));
        let worker = DeploymentWorker::new(Arc::clone(&fixture.store), Duration::from_secs(30))
            .with_executor(DeploymentType::ContainerTask, executor);

        worker.tick().await.unwrap().unwrap().await.unwrap();

        let failed = fixture
            .deployment_service
            .list(fixture.deployable.id, Some(DeploymentStatus::Failed))
            .await
            .unwrap();
        assert_eq!(failed.len(), 1);
    }

    #[tokio::test]
    async fn test_start_and_stop() {
        let fixture = pending_fixture().await;
        let worker = Arc::new(
            DeploymentWorker::new(Arc::clone(&fixture.store), Duration::from_millis(10))
                .with_executor(DeploymentType::ContainerTask, Arc::new(CountingExecutor::default())),
        );

        worker.start().unwrap();
        assert!(worker.start().is_err());

        tokio::time::sleep(Duration::from_millis(200)).await;
        worker.stop().await.unwrap();

        let pending = fixture
            .deployment_service
            .list(fixture.deployable.id, Some(DeploymentStatus::Pending))
            .await
            .unwrap();
        assert!(pending.is_empty());
    }

    #[tokio::test]
    async fn test_discovery_interval_delays_missed_ticks() {
        let interval = discovery_interval(Duration::from_millis(50));

        assert_eq!(interval.period(), Duration::from_millis(50));
        assert_eq!(interval.missed_tick_behavior(), MissedTickBehavior::Delay);
    }
}
