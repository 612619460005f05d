use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};
use std::{collections::VecDeque, sync::Mutex};

use shipyard_core::{new_id, MessageQueue, QueueMessage};

#[derive(Debug)]
struct StoredMessage {
    message: QueueMessage,
    invisible_until: Option<Instant>,
}

/// In-process queue with the same visibility semantics as a hosted queue:
/// a received message stays hidden until it is deleted or its visibility
/// timeout lapses.
#[derive(Debug)]
pub struct MemoryMessageQueue {
    messages: Arc<Mutex<VecDeque<StoredMessage>>>,
    visibility_timeout: Duration,
    max_messages: usize,
}

impl MemoryMessageQueue {
    pub fn new() -> anyhow::Result<Self> {
        Self::with_settings(Duration::from_secs(300), 1)
    }

    pub fn with_settings(visibility_timeout: Duration, max_messages: usize) -> anyhow::Result<Self> {
        Ok(MemoryMessageQueue {
            messages: Arc::new(Mutex::new(VecDeque::new())),
            visibility_timeout,
            max_messages,
        })
    }

    pub fn len(&self) -> anyhow::Result<usize> {
        Ok(self.lock()?.len())
    }

    pub fn is_empty(&self) -> anyhow::Result<bool> {
        Ok(self.len()? == 0)
    }

    fn lock(&self) -> anyhow::Result<std::sync::MutexGuard<'_, VecDeque<StoredMessage>>> {
        self.messages
            .lock()
            .map_err(|_| anyhow::anyhow!("memory queue lock poisoned"))
    }
}

#[async_trait]
impl MessageQueue for MemoryMessageQueue {
    async fn send(&self, body: &str) -> anyhow::Result<()> {
        let mut messages = self.lock()?;

        let id = new_id().to_string();
        messages.push_back(StoredMessage {
            message: QueueMessage {
                id,
                receipt_handle: String::new(),
                body: body.to_string(),
            },
            invisible_until: None,
        });

        Ok(())
    }

    async fn receive(&self) -> anyhow::Result<Vec<QueueMessage>> {
        let mut messages = self.lock()?;
        let now = Instant::now();

        let mut received = Vec::new();
        for stored in messages.iter_mut() {
            if received.len() >= self.max_messages {
                break;
            }

            if matches!(stored.invisible_until, Some(until) if until > now) {
                continue;
            }

            stored.invisible_until = Some(now + self.visibility_timeout);
            stored.message.receipt_handle = format!("{}-{}", stored.message.id, new_id());
            received.push(stored.message.clone());
        }

        Ok(received)
    }

    async fn delete(&self, message: &QueueMessage) -> anyhow::Result<()> {
        let mut messages = self.lock()?;

        messages.retain(|stored| stored.message.receipt_handle != message.receipt_handle);

        Ok(())
    }
}
