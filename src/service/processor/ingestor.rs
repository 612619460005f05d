use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use shipyard_core::{parse_queue_message, IngestedEvent, MessageQueue, QueueMessage};
use tokio::sync::broadcast;

use super::Lifecycle;
use crate::services::PromotionService;

const RECEIVE_RETRY_DELAY: Duration = Duration::from_secs(5);
const EMPTY_RECEIVE_DELAY: Duration = Duration::from_millis(250);

/// Pulls build and promotion events off the queue and feeds them to the
/// promotion service. Every received message is deleted once handled,
/// whether or not handling succeeded.
pub struct EventIngestor {
    queue: Arc<dyn MessageQueue>,
    promotion_service: Arc<PromotionService>,

    lifecycle: Lifecycle,
}

impl fmt::Debug for EventIngestor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventIngestor")
            .field("promotion_service", &self.promotion_service)
            .finish_non_exhaustive()
    }
}

impl EventIngestor {
    pub fn new(queue: Arc<dyn MessageQueue>, promotion_service: Arc<PromotionService>) -> Self {
        EventIngestor {
            queue,
            promotion_service,
            lifecycle: Lifecycle::new("event ingestor"),
        }
    }

    /// Receives one batch and handles it. Returns the number of messages
    /// received.
    pub async fn poll_once(&self) -> anyhow::Result<usize> {
        let messages = self.queue.receive().await?;

        self.handle_batch(&messages).await;

        Ok(messages.len())
    }

    async fn handle_batch(&self, messages: &[QueueMessage]) {
        for message in messages {
            self.handle_message(message).await;

            if let Err(err) = self.queue.delete(message).await {
                tracing::error!(message_id = %message.id, "failed to delete message: {err:#}");
            }
        }
    }

    #[tracing::instrument(name = "processor::ingestor::handle_message", skip_all, fields(message_id = %message.id))]
    async fn handle_message(&self, message: &QueueMessage) {
        let event = match parse_queue_message(&message.body) {
            Ok(event) => event,
            Err(err) => {
                tracing::warn!("dropping malformed message: {err:#}");
                return;
            }
        };

        let result = match event {
            IngestedEvent::BuildComplete(event) => {
                self.promotion_service.process_build_complete(&event).await
            }
            IngestedEvent::Promotion(event) => self.promotion_service.process_promotion(&event).await,
            IngestedEvent::Unknown(body) => {
                tracing::warn!("dropping event of unknown type: {body}");
                return;
            }
        };

        match result {
            Ok(ids) => tracing::info!("event created {} deployments", ids.len()),
            Err(err) => tracing::error!("failed to process event: {err:#}"),
        }
    }

    pub fn start(self: &Arc<Self>) -> anyhow::Result<()> {
        let ingestor = Arc::clone(self);

        self.lifecycle.spawn(move |shutdown| ingestor.run(shutdown))
    }

    pub async fn stop(&self) -> anyhow::Result<()> {
        self.lifecycle.stop().await
    }

    // Shutdown only interrupts waiting, never a batch in progress.
    async fn run(self: Arc<Self>, mut shutdown: broadcast::Receiver<()>) {
        loop {
            let received = tokio::select! {
                _ = shutdown.recv() => break,
                received = self.queue.receive() => received,
            };

            let delay = match received {
                Ok(messages) if messages.is_empty() => EMPTY_RECEIVE_DELAY,
                Ok(messages) => {
                    self.handle_batch(&messages).await;
                    continue;
                }
                Err(err) => {
                    tracing::error!("failed to receive messages: {err:#}");
                    RECEIVE_RETRY_DELAY
                }
            };

            tokio::select! {
                _ = shutdown.recv() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use shipyard_core::test::{get_build_complete_fixture, get_notification_envelope_fixture};
    use shipyard_memory_queue::MemoryMessageQueue;

    use super::*;
    use crate::models::DeploymentStatus;
    use crate::test::{get_service_fixture, seed_build_vectors, seed_deployable_configs, ServiceFixture};

    async fn ingestor_fixture() -> (ServiceFixture, Arc<MemoryMessageQueue>, Arc<EventIngestor>) {
        let fixture = get_service_fixture().await;
        seed_deployable_configs(&fixture, &[fixture.dev.id]).await;
        seed_build_vectors(&fixture, &[fixture.dev.id]).await;

        let queue = Arc::new(MemoryMessageQueue::with_settings(Duration::from_secs(300), 10).unwrap());
        let ingestor = Arc::new(EventIngestor::new(
            queue.clone(),
            Arc::clone(&fixture.promotion_service),
        ));

        (fixture, queue, ingestor)
    }

    #[tokio::test]
    async fn test_build_complete_message_creates_deployments() {
        let (fixture, queue, ingestor) = ingestor_fixture().await;

        let event = get_build_complete_fixture(&fixture.deployable.id.to_string(), None);
        queue.send(&get_notification_envelope_fixture(&event)).await.unwrap();
        queue.send(&serde_json::to_string(&event).unwrap()).await.unwrap();

        assert_eq!(ingestor.poll_once().await.unwrap(), 2);
        assert!(queue.is_empty().unwrap());

        let pending = fixture
            .deployment_service
            .list(fixture.deployable.id, Some(DeploymentStatus::Pending))
            .await
            .unwrap();
        assert_eq!(pending.len(), 2);
    }

    #[tokio::test]
    async fn test_bad_messages_are_dropped() {
        let (fixture, queue, ingestor) = ingestor_fixture().await;

        queue.send("not json").await.unwrap();
        queue
            .send(&serde_json::json!({"Message": r#"{"event":{"type":"ROLLBACK"}}"#}).to_string())
            .await
            .unwrap();
        let missing_deployable = get_build_complete_fixture("deployable_1", None);
        queue
            .send(&serde_json::to_string(&missing_deployable).unwrap())
            .await
            .unwrap();

        assert_eq!(ingestor.poll_once().await.unwrap(), 3);
        assert!(queue.is_empty().unwrap());

        let deployments = fixture
            .deployment_service
            .list(fixture.deployable.id, None)
            .await
            .unwrap();
        assert!(deployments.is_empty());
    }

    #[tokio::test]
    async fn test_start_and_stop() {
        let (fixture, queue, ingestor) = ingestor_fixture().await;

        ingestor.start().unwrap();

        let event = get_build_complete_fixture(&fixture.deployable.id.to_string(), Some("7"));
        queue.send(&serde_json::to_string(&event).unwrap()).await.unwrap();

        let mut attempts = 0;
        while !queue.is_empty().unwrap() && attempts < 300 {
            tokio::time::sleep(Duration::from_millis(10)).await;
            attempts += 1;
        }

        ingestor.stop().await.unwrap();

        let deployments = fixture
            .deployment_service
            .list(fixture.deployable.id, None)
            .await
            .unwrap();
        assert_eq!(deployments.len(), 1);
        assert_eq!(deployments[0].build_number, "7");
    }
}
