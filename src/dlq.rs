use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::{DeadLetterError, LookupError, StoreError};
use crate::message::{unix_ms, Envelope, MessageStatus};
use crate::publisher::Publisher;
use crate::registry::QueueRegistry;
use crate::scheduler::PriorityScheduler;
use crate::store::keys;

/// Decides retry vs. dead-letter placement for failed envelopes and manages
/// the DLQ as a queue-of-queues: `<queue>_dlq` is a first-class queue fed
/// through the regular publish path, so it orders by the same scoring rule.
#[derive(Clone)]
pub struct RetryCoordinator {
    registry: QueueRegistry,
    scheduler: PriorityScheduler,
    publisher: Publisher,
}

impl RetryCoordinator {
    pub fn new(
        registry: QueueRegistry,
        scheduler: PriorityScheduler,
        publisher: Publisher,
    ) -> Self {
        Self {
            registry,
            scheduler,
            publisher,
        }
    }

    /// Route a failed envelope: requeue while the retry budget lasts,
    /// dead-letter once it is exhausted, drop when no DLQ is configured.
    ///
    /// The envelope must be in the `Failed` state. Only store errors
    /// propagate; every routing outcome is a state transition plus a log
    /// line.
    pub async fn handle_failure(&self, envelope: Envelope, failure: &str) -> Result<(), StoreError> {
        let queue = envelope.queue_name.clone();
        let meta = match self.registry.metadata(&queue).await {
            Ok(meta) => meta,
            Err(LookupError::QueueNotFound(_)) => {
                // Queue metadata vanished mid-flight; nowhere to route
                warn!(%queue, id = %envelope.id, "queue metadata missing, dropping failed message");
                return Ok(());
            }
            Err(LookupError::Store(e)) => return Err(e),
        };

        if !meta.dead_letter_enabled {
            return self.drop_message(envelope, failure);
        }

        if envelope.retries_made < envelope.options.retries {
            self.requeue(envelope, failure).await
        } else {
            self.move_to_dead_letter(envelope, failure).await
        }
    }

    fn drop_message(&self, mut envelope: Envelope, failure: &str) -> Result<(), StoreError> {
        if let Err(e) = envelope.advance(MessageStatus::Dropped) {
            error!(id = %envelope.id, %e, "refusing drop from unexpected state");
            return Ok(());
        }
        warn!(
            queue = %envelope.queue_name,
            id = %envelope.id,
            error = %failure,
            "no dead-letter queue configured, message dropped"
        );
        Ok(())
    }

    /// Increment the retry count, record the error, and push the envelope
    /// back into its queue. Same priority, new timestamp — a retried message
    /// keeps its tier but sorts after that tier's current entries.
    async fn requeue(&self, mut envelope: Envelope, failure: &str) -> Result<(), StoreError> {
        envelope.retries_made += 1;
        envelope.error = Some(failure.to_string());
        if let Err(e) = envelope
            .advance(MessageStatus::Requeued)
            .and_then(|_| envelope.advance(MessageStatus::Waiting))
        {
            error!(id = %envelope.id, %e, "refusing requeue from unexpected state");
            return Ok(());
        }

        let queue = envelope.queue_name.clone();
        self.scheduler.push(&queue, &envelope).await?;
        info!(
            %queue,
            id = %envelope.id,
            retries_made = envelope.retries_made,
            retry_budget = envelope.options.retries,
            "message requeued for retry"
        );
        Ok(())
    }

    /// Park an exhausted envelope in `<queue>_dlq`, attaching the error and
    /// the failure time.
    async fn move_to_dead_letter(
        &self,
        mut envelope: Envelope,
        failure: &str,
    ) -> Result<(), StoreError> {
        let queue = envelope.queue_name.clone();
        let dlq = keys::dlq_name(&queue);

        envelope.error = Some(failure.to_string());
        envelope.failed_at = Some(unix_ms());
        if let Err(e) = envelope.advance(MessageStatus::DeadLettered) {
            error!(id = %envelope.id, %e, "refusing dead-letter from unexpected state");
            return Ok(());
        }
        envelope.queue_name = dlq.clone();

        // DLQ metadata deleted out-of-band: nothing left to hold the
        // message, drop it with a trace.
        if !self.registry.exists(&dlq).await? {
            warn!(%queue, %dlq, id = %envelope.id, "dead-letter queue missing, message dropped");
            return Ok(());
        }

        self.publisher.publish_envelope(&dlq, &envelope).await?;
        info!(
            %queue,
            %dlq,
            id = %envelope.id,
            retries_made = envelope.retries_made,
            "message moved to dead-letter queue"
        );
        Ok(())
    }

    /// Read-only view over a queue's DLQ, bounded by `limit`.
    /// Fails with `QueueNotFound` when no DLQ metadata exists.
    pub async fn list_dead_letters(
        &self,
        queue: &str,
        limit: usize,
    ) -> Result<Vec<Envelope>, DeadLetterError> {
        let dlq = keys::dlq_name(queue);
        if !self.registry.exists(&dlq).await? {
            return Err(DeadLetterError::QueueNotFound(dlq));
        }
        let entries = self.scheduler.scan(&dlq, Some(limit)).await?;
        Ok(entries.into_iter().map(|(_, envelope)| envelope).collect())
    }

    /// Replay one dead-lettered message into its original queue, resetting
    /// its retry count. Returns whether a matching entry was found and
    /// removed by this caller.
    ///
    /// The linear scan is fine here: DLQ traffic is low-volume and
    /// operator-triggered.
    pub async fn replay_dead_letter(
        &self,
        queue: &str,
        message_id: Uuid,
    ) -> Result<bool, DeadLetterError> {
        let dlq = keys::dlq_name(queue);
        if !self.registry.exists(&dlq).await? {
            return Err(DeadLetterError::QueueNotFound(dlq));
        }

        let entries = self.scheduler.scan(&dlq, None).await?;
        let Some((member, mut envelope)) =
            entries.into_iter().find(|(_, env)| env.id == message_id)
        else {
            debug!(%queue, id = %message_id, "no matching dead-letter entry");
            return Ok(false);
        };

        // Exact-member conditional removal: under a concurrent replay of the
        // same id, only one caller wins and proceeds to re-publish.
        if !self.scheduler.remove_exact(&dlq, &member).await? {
            return Ok(false);
        }

        envelope.retries_made = 0;
        envelope.error = None;
        envelope.failed_at = None;
        envelope.queue_name = queue.to_string();
        if let Err(e) = envelope.advance(MessageStatus::Waiting) {
            error!(id = %envelope.id, %e, "dead-letter entry in unexpected state, dropped");
            return Ok(false);
        }

        if !self.registry.exists(queue).await? {
            return Err(DeadLetterError::QueueNotFound(queue.to_string()));
        }
        self.publisher.publish_envelope(queue, &envelope).await?;
        info!(%queue, id = %message_id, "dead-letter message replayed");
        Ok(true)
    }
}
