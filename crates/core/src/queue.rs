//! Managed queue access.
//!
//! Workers consume from a queue subscribed to a notification topic. Each queued message body is
//! a JSON notification whose `Message` field carries the base64-encoded binary event:
//!
//! ```text
//! { "Message": "<base64(binary-encoded event)>" }
//! ```
//!
//! [`Queue`] abstracts the three operations the harness needs: receive with a visibility
//! window, delete on success, and change visibility to schedule a delayed redelivery.

use crate::constants::{RECEIVE_MAX_MESSAGES, RECEIVE_VISIBILITY_TIMEOUT, RECEIVE_WAIT_TIME};
use crate::error::{EnvelopeError, QueueError};
use async_trait::async_trait;
use aws_sdk_sqs::error::DisplayErrorContext;
use base64::{engine::general_purpose, Engine as _};
use serde::Deserialize;
use std::time::Duration;

/// Parameters for one receive call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReceiveParams {
    pub max_messages: i32,
    pub visibility_timeout: Duration,
    pub wait_time: Duration,
}

impl Default for ReceiveParams {
    fn default() -> Self {
        Self {
            max_messages: RECEIVE_MAX_MESSAGES,
            visibility_timeout: RECEIVE_VISIBILITY_TIMEOUT,
            wait_time: RECEIVE_WAIT_TIME,
        }
    }
}

/// A received message: the raw body plus the handle used to acknowledge it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueueMessage {
    pub receipt_handle: String,
    pub body: String,
}

#[async_trait]
pub trait Queue: Send + Sync {
    /// Queue URL, used for logging.
    fn url(&self) -> &str;

    async fn receive(&self, params: &ReceiveParams) -> Result<Vec<QueueMessage>, QueueError>;

    async fn delete(&self, receipt_handle: &str) -> Result<(), QueueError>;

    /// Hides the message for `timeout` from now, so it is redelivered after that delay.
    async fn change_visibility(
        &self,
        receipt_handle: &str,
        timeout: Duration,
    ) -> Result<(), QueueError>;
}

#[derive(Deserialize)]
struct Notification {
    #[serde(rename = "Message")]
    message: String,
}

/// Unwraps a notification body into the binary event it carries.
///
/// # Errors
///
/// Returns [`EnvelopeError::Json`] if the body is not a notification object and
/// [`EnvelopeError::Base64`] if its `Message` is not valid base64.
pub fn decode_notification(body: &str) -> Result<Vec<u8>, EnvelopeError> {
    let notification: Notification = serde_json::from_str(body)?;
    Ok(general_purpose::STANDARD.decode(notification.message.trim())?)
}

/// Wraps an encoded event the way the notification topic delivers it.
pub fn encode_notification(event: &[u8]) -> String {
    serde_json::json!({ "Message": general_purpose::STANDARD.encode(event) }).to_string()
}

fn seconds(duration: Duration) -> i32 {
    i32::try_from(duration.as_secs()).unwrap_or(i32::MAX)
}

/// [`Queue`] backed by Amazon SQS.
#[derive(Clone, Debug)]
pub struct SqsQueue {
    client: aws_sdk_sqs::Client,
    url: String,
}

impl SqsQueue {
    pub fn new(client: aws_sdk_sqs::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl Queue for SqsQueue {
    fn url(&self) -> &str {
        &self.url
    }

    async fn receive(&self, params: &ReceiveParams) -> Result<Vec<QueueMessage>, QueueError> {
        let output = self
            .client
            .receive_message()
            .queue_url(&self.url)
            .max_number_of_messages(params.max_messages)
            .visibility_timeout(seconds(params.visibility_timeout))
            .wait_time_seconds(seconds(params.wait_time))
            .send()
            .await
            .map_err(|e| QueueError::Receive {
                url: self.url.clone(),
                message: DisplayErrorContext(&e).to_string(),
            })?;

        let messages = output
            .messages
            .unwrap_or_default()
            .into_iter()
            .filter_map(|m| {
                let receipt_handle = m.receipt_handle()?.to_string();
                Some(QueueMessage {
                    receipt_handle,
                    body: m.body().unwrap_or_default().to_string(),
                })
            })
            .collect();

        Ok(messages)
    }

    async fn delete(&self, receipt_handle: &str) -> Result<(), QueueError> {
        self.client
            .delete_message()
            .queue_url(&self.url)
            .receipt_handle(receipt_handle)
            .send()
            .await
            .map_err(|e| QueueError::Delete {
                url: self.url.clone(),
                message: DisplayErrorContext(&e).to_string(),
            })?;
        Ok(())
    }

    async fn change_visibility(
        &self,
        receipt_handle: &str,
        timeout: Duration,
    ) -> Result<(), QueueError> {
        self.client
            .change_message_visibility()
            .queue_url(&self.url)
            .receipt_handle(receipt_handle)
            .visibility_timeout(seconds(timeout))
            .send()
            .await
            .map_err(|e| QueueError::ChangeVisibility {
                url: self.url.clone(),
                message: DisplayErrorContext(&e).to_string(),
            })?;
        Ok(())
    }
}
