//! SQS job queue.
//!
//! Received messages stay invisible for the queue's visibility timeout
//! and reappear unless [`SqsJobQueue::delete`] acknowledges them, which
//! gives at-least-once delivery.

use std::time::Duration;

use aws_config::SdkConfig;
use aws_sdk_sqs::error::DisplayErrorContext;
use aws_sdk_sqs::Client;

use crate::error::QueueError;

/// SQS accepts between 1 and 10 messages per receive call.
pub const MAX_BATCH_SIZE: i32 = 10;

/// SQS long polling waits at most 20 seconds.
pub const MAX_WAIT_SECS: u64 = 20;

/// One received queue message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedMessage {
    pub message_id: Option<String>,
    /// JSON job descriptor.
    pub body: String,
    /// Receipt handle used to acknowledge the message.
    pub delivery_token: String,
}

/// Consumer for one SQS queue.
#[derive(Clone)]
pub struct SqsJobQueue {
    client: Client,
    queue_url: String,
    wait_time: Duration,
}

impl SqsJobQueue {
    pub fn new(sdk_config: &SdkConfig, queue_url: String) -> Self {
        Self {
            client: Client::new(sdk_config),
            queue_url,
            wait_time: Duration::ZERO,
        }
    }

    /// Long-poll for up to `wait_time` (capped at [`MAX_WAIT_SECS`]).
    pub fn with_wait_time(mut self, wait_time: Duration) -> Self {
        self.wait_time = wait_time.min(Duration::from_secs(MAX_WAIT_SECS));
        self
    }

    pub fn queue_url(&self) -> &str {
        &self.queue_url
    }

    /// Receive up to `max_messages` messages (clamped to SQS limits).
    ///
    /// Messages missing a body or receipt handle are skipped.
    pub async fn receive(&self, max_messages: i32) -> Result<Vec<QueuedMessage>, QueueError> {
        let output = self
            .client
            .receive_message()
            .queue_url(&self.queue_url)
            .max_number_of_messages(max_messages.clamp(1, MAX_BATCH_SIZE))
            .wait_time_seconds(self.wait_time.as_secs() as i32)
            .send()
            .await
            .map_err(|e| QueueError::ReceiveFailed(DisplayErrorContext(&e).to_string()))?;

        let messages = output
            .messages()
            .iter()
            .filter_map(|m| {
                match (m.body(), m.receipt_handle()) {
                    (Some(body), Some(handle)) => Some(QueuedMessage {
                        message_id: m.message_id().map(String::from),
                        body: body.to_string(),
                        delivery_token: handle.to_string(),
                    }),
                    _ => {
                        tracing::warn!(
                            message_id = ?m.message_id(),
                            "Skipping queue message without body or receipt handle",
                        );
                        None
                    }
                }
            })
            .collect();

        Ok(messages)
    }

    /// Acknowledge a message so it is not redelivered.
    pub async fn delete(&self, delivery_token: &str) -> Result<(), QueueError> {
        self.client
            .delete_message()
            .queue_url(&self.queue_url)
            .receipt_handle(delivery_token)
            .send()
            .await
            .map_err(|e| QueueError::DeleteFailed(DisplayErrorContext(&e).to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use aws_config::{BehaviorVersion, Region};

    use super::*;

    fn sdk_config() -> SdkConfig {
        SdkConfig::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new("us-east-1"))
            .build()
    }

    #[test]
    fn wait_time_defaults_to_short_polling() {
        let queue = SqsJobQueue::new(&sdk_config(), "https://sqs.example/q".into());
        assert_eq!(queue.wait_time, Duration::ZERO);
        assert_eq!(queue.queue_url(), "https://sqs.example/q");
    }

    #[test]
    fn wait_time_is_capped_at_sqs_maximum() {
        let queue = SqsJobQueue::new(&sdk_config(), "q".into())
            .with_wait_time(Duration::from_secs(60));
        assert_eq!(queue.wait_time, Duration::from_secs(MAX_WAIT_SECS));
    }
}
