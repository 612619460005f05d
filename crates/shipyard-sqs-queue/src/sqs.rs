use anyhow::Context;
use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_sqs::Client;

use shipyard_core::{MessageQueue, QueueMessage};

#[derive(Clone, Debug)]
pub struct SqsQueueSettings {
    pub queue_url: String,
    pub visibility_timeout_secs: i32,
    pub wait_time_secs: i32,
    pub max_messages: i32,
}

impl SqsQueueSettings {
    pub fn new(queue_url: impl Into<String>) -> Self {
        SqsQueueSettings {
            queue_url: queue_url.into(),
            visibility_timeout_secs: 300,
            wait_time_secs: 20,
            max_messages: 1,
        }
    }
}

#[derive(Debug)]
pub struct SqsMessageQueue {
    client: Client,
    settings: SqsQueueSettings,
}

impl SqsMessageQueue {
    pub fn new(sdk_config: &SdkConfig, settings: SqsQueueSettings) -> Self {
        SqsMessageQueue {
            client: Client::new(sdk_config),
            settings,
        }
    }
}

#[async_trait]
impl MessageQueue for SqsMessageQueue {
    #[tracing::instrument(name = "sqs::send", skip_all)]
    async fn send(&self, body: &str) -> anyhow::Result<()> {
        self.client
            .send_message()
            .queue_url(&self.settings.queue_url)
            .message_body(body)
            .send()
            .await
            .context("sending queue message")?;

        Ok(())
    }

    #[tracing::instrument(name = "sqs::receive", skip_all)]
    async fn receive(&self) -> anyhow::Result<Vec<QueueMessage>> {
        let output = self
            .client
            .receive_message()
            .queue_url(&self.settings.queue_url)
            .max_number_of_messages(self.settings.max_messages)
            .wait_time_seconds(self.settings.wait_time_secs)
            .visibility_timeout(self.settings.visibility_timeout_secs)
            .send()
            .await
            .context("receiving queue messages")?;

        let messages = output
            .messages
            .unwrap_or_default()
            .into_iter()
            .filter_map(|message| {
                let receipt_handle = message.receipt_handle()?.to_string();

                Some(QueueMessage {
                    id: message.message_id().unwrap_or_default().to_string(),
                    receipt_handle,
                    body: message.body().unwrap_or_default().to_string(),
                })
            })
            .collect();

        Ok(messages)
    }

    #[tracing::instrument(name = "sqs::delete", skip_all, fields(message_id = %message.id))]
    async fn delete(&self, message: &QueueMessage) -> anyhow::Result<()> {
        self.client
            .delete_message()
            .queue_url(&self.settings.queue_url)
            .receipt_handle(&message.receipt_handle)
            .send()
            .await
            .context("deleting queue message")?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = SqsQueueSettings::new("https://sqs.us-east-1.amazonaws.com/1/deploy");

        assert_eq!(settings.visibility_timeout_secs, 300);
        assert_eq!(settings.wait_time_secs, 20);
        assert_eq!(settings.max_messages, 1);
    }
}
