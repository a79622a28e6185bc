//! Control Channel
//!
//! Page-to-worker commands, sent out of band from request interception.
//! The wire form is a JSON object with a `type` field:
//!
//! ```json
//! { "type": "SKIP_WAITING" }
//! { "type": "CLEAR_CACHE" }
//! ```
//!
//! Messages are fire-and-forget: the sender gets no acknowledgment.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::ControlError;
use crate::host::WorkerHost;

/// A page-to-worker command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControlMessage {
    /// Activate a waiting worker now.
    SkipWaiting,
    /// Delete every bucket.
    ClearCache,
}

impl ControlMessage {
    /// Parse the JSON wire form.
    pub fn from_json(payload: &str) -> Result<Self, ControlError> {
        Ok(serde_json::from_str(payload)?)
    }

    /// Encode to the JSON wire form.
    pub fn to_json(&self) -> Result<String, ControlError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Sending half held by the page.
#[derive(Debug, Clone)]
pub struct ControlSender {
    tx: mpsc::UnboundedSender<String>,
}

impl ControlSender {
    /// Post a raw JSON payload. Delivery failures are only logged.
    pub fn post(&self, payload: impl Into<String>) {
        if self.tx.send(payload.into()).is_err() {
            log::debug!("[SW Control] Worker gone, message dropped");
        }
    }

    /// Post a typed command. Failures are only logged.
    pub fn send(&self, message: ControlMessage) {
        if let Err(e) = self.try_send(message) {
            log::debug!("[SW Control] {:?} dropped: {}", message, e);
        }
    }

    /// Post a typed command, reporting encoding failures and a closed
    /// channel.
    pub fn try_send(&self, message: ControlMessage) -> Result<(), ControlError> {
        self.tx
            .send(message.to_json()?)
            .map_err(|_| ControlError::Closed)
    }
}

/// Worker side of the channel.
pub struct ControlChannel;

impl ControlChannel {
    /// Spawn the task that drains page messages into `host`.
    ///
    /// The task ends once every [`ControlSender`] is dropped.
    pub fn spawn(host: Arc<WorkerHost>) -> (ControlSender, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        let handle = tokio::spawn(async move {
            while let Some(payload) = rx.recv().await {
                if let Err(e) = host.post_message(&payload).await {
                    log::warn!("[SW Control] Message {} failed: {}", payload, e);
                }
            }
            log::debug!("[SW Control] Channel closed");
        });
        (ControlSender { tx }, handle)
    }
}
