use async_trait::async_trait;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueueMessage {
    pub id: String,
    pub receipt_handle: String,
    pub body: String,
}

/// An at-least-once message queue: received messages reappear unless deleted.
#[async_trait]
pub trait MessageQueue: Send + Sync {
    async fn send(&self, body: &str) -> anyhow::Result<()>;
    async fn receive(&self) -> anyhow::Result<Vec<QueueMessage>>;
    async fn delete(&self, message: &QueueMessage) -> anyhow::Result<()>;
}
