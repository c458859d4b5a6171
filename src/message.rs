use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::TransitionError;

/// Current wall-clock time as unix milliseconds.
pub(crate) fn unix_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Lifecycle state of an envelope. Only the transitions encoded in
/// [`MessageStatus::can_advance_to`] are legal; everything else is a
/// [`TransitionError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    /// Queued, not yet picked up by a consumer.
    Waiting,
    /// Popped by a consumer, handler running.
    Processing,
    /// Handler succeeded. Terminal — absence from the store IS this state.
    Processed,
    /// Handler failed; the retry coordinator decides what happens next.
    Failed,
    /// Failed but within the retry budget; transitions back to Waiting on push.
    Requeued,
    /// Retry budget exhausted, parked in the dead-letter queue.
    DeadLettered,
    /// Failed with no dead-letter queue configured. Terminal, logged.
    Dropped,
}

impl MessageStatus {
    fn can_advance_to(self, to: MessageStatus) -> bool {
        use MessageStatus::*;
        matches!(
            (self, to),
            (Waiting, Processing)
                | (Processing, Processed)
                | (Processing, Failed)
                | (Failed, Requeued)
                | (Failed, DeadLettered)
                | (Failed, Dropped)
                | (Requeued, Waiting)
                // Operator-driven replay out of the DLQ.
                | (DeadLettered, Waiting)
        )
    }
}

/// Per-message delivery options, recorded on the envelope.
///
/// `retries` is the resolved retry budget: the caller-supplied value, or the
/// queue's `max_retries` default at publish time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryOptions {
    pub priority: u32,
    pub retries: u32,
}

/// Caller-facing publish options. Unset fields take queue defaults.
#[derive(Debug, Clone, Copy, Default)]
pub struct PublishOptions {
    pub priority: Option<u32>,
    pub retries: Option<u32>,
}

impl PublishOptions {
    /// Smaller numbers dequeue first. Values above
    /// [`MAX_PRIORITY`](crate::scheduler::MAX_PRIORITY) all land in the
    /// least-urgent tier.
    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = Some(retries);
        self
    }
}

/// The serializable unit of work: payload plus queue metadata and lifecycle
/// state. Exclusively owned by whichever component currently holds it; a new
/// logical copy is made whenever control passes between components.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "message_id")]
    pub id: Uuid,
    pub queue_name: String,
    #[serde(rename = "message")]
    pub payload: serde_json::Value,
    pub status: MessageStatus,
    pub timestamp_created: u64,
    pub timestamp_updated: u64,
    pub options: DeliveryOptions,
    pub retries_made: u32,
    /// Last handler error, recorded on requeue and dead-letter placement.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Set once, when the envelope is parked in the dead-letter queue.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_at: Option<u64>,
}

impl Envelope {
    /// Build a fresh `Waiting` envelope with a new UUIDv7 id.
    pub fn new(queue_name: &str, payload: serde_json::Value, options: DeliveryOptions) -> Self {
        let now = unix_ms();
        Self {
            id: Uuid::now_v7(),
            queue_name: queue_name.to_string(),
            payload,
            status: MessageStatus::Waiting,
            timestamp_created: now,
            timestamp_updated: now,
            options,
            retries_made: 0,
            error: None,
            failed_at: None,
        }
    }

    /// Advance the lifecycle state, bumping `timestamp_updated`.
    /// Rejects transitions outside the state machine.
    pub fn advance(&mut self, to: MessageStatus) -> Result<(), TransitionError> {
        if !self.status.can_advance_to(to) {
            return Err(TransitionError {
                from: self.status,
                to,
            });
        }
        self.status = to;
        self.timestamp_updated = unix_ms();
        Ok(())
    }
}
