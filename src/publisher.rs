use std::sync::Arc;

use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{PublishError, StoreError};
use crate::message::{Envelope, PublishOptions};
use crate::registry::QueueRegistry;
use crate::scheduler::PriorityScheduler;
use crate::store::{keys, Store};

/// Validates queue existence, builds envelopes, pushes them through the
/// scheduler, and signals a best-effort notification.
#[derive(Clone)]
pub struct Publisher {
    store: Arc<dyn Store>,
    registry: QueueRegistry,
    scheduler: PriorityScheduler,
}

impl Publisher {
    pub fn new(
        store: Arc<dyn Store>,
        registry: QueueRegistry,
        scheduler: PriorityScheduler,
    ) -> Self {
        Self {
            store,
            registry,
            scheduler,
        }
    }

    /// Publish a payload to a queue, returning the generated message id.
    ///
    /// Fails with `QueueNotFound` when the queue's metadata is absent.
    /// Priority defaults to 0; the retry budget defaults to the queue's
    /// `max_retries` unless the caller supplies one.
    pub async fn publish(
        &self,
        queue: &str,
        payload: serde_json::Value,
        options: PublishOptions,
    ) -> Result<Uuid, PublishError> {
        let meta = self.registry.metadata(queue).await?;
        let envelope = Envelope::new(
            queue,
            payload,
            crate::message::DeliveryOptions {
                priority: options.priority.unwrap_or(0),
                retries: options.retries.unwrap_or(meta.max_retries),
            },
        );
        self.publish_envelope(queue, &envelope).await?;
        Ok(envelope.id)
    }

    /// Push a pre-built envelope through the same path as `publish`:
    /// one store write, then a fire-and-forget notification carrying the id.
    /// Dead-letter placement and replay reuse this, so DLQs are ordered by
    /// the same scoring rule as every other queue.
    ///
    /// Queue existence is the caller's concern; `publish` resolves it while
    /// reading the metadata, so no second lookup happens here.
    pub async fn publish_envelope(
        &self,
        queue: &str,
        envelope: &Envelope,
    ) -> Result<(), StoreError> {
        self.scheduler.push(queue, envelope).await?;
        debug!(%queue, id = %envelope.id, priority = envelope.options.priority, "message published");

        // Best-effort: correctness never depends on the notification
        // arriving — the consumer's fallback drain picks up missed entries.
        if let Err(e) = self
            .store
            .publish(&keys::notify_channel(queue), &envelope.id.to_string())
            .await
        {
            warn!(%queue, id = %envelope.id, error = %e, "notification publish failed");
        }
        Ok(())
    }
}
