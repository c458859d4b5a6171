use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::dlq::RetryCoordinator;
use crate::error::StoreError;
use crate::message::{Envelope, MessageStatus};
use crate::scheduler::PriorityScheduler;
use crate::store::NotificationStream;

/// Outcome of a caller-supplied handler invocation.
pub type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// Boxed handler invoked once per dequeued envelope with its payload.
pub(crate) type Handler =
    Arc<dyn Fn(serde_json::Value) -> BoxFuture<'static, HandlerResult> + Send + Sync>;

/// Cancellation handle for a running consumer.
///
/// Cancelling stops the fallback timer and the notification subscription at
/// the loop's next suspension point; an in-flight handler invocation always
/// runs to completion first. No timeout is imposed on the handler — a hung
/// handler blocks its consumer loop indefinitely.
pub struct ConsumerHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl ConsumerHandle {
    /// Request the loop to stop. Returns immediately.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Cancel and wait for the loop to release its resources.
    pub async fn stop(self) {
        self.cancel.cancel();
        let _ = self.task.await;
    }
}

/// Long-lived per-queue consumption loop merging push notifications and
/// periodic polling into a single dequeue stream.
///
/// Multiple loops may run against the same queue with no coordination
/// between them: the scheduler's atomic pop guarantees each envelope reaches
/// exactly one of them, and racing pops that find the queue empty are valid
/// no-ops.
pub(crate) struct ConsumerLoop {
    pub(crate) queue: String,
    pub(crate) scheduler: PriorityScheduler,
    pub(crate) coordinator: RetryCoordinator,
    pub(crate) handler: Handler,
    pub(crate) poll_interval: Duration,
}

impl ConsumerLoop {
    pub(crate) fn spawn(self, notifications: NotificationStream) -> ConsumerHandle {
        let cancel = CancellationToken::new();
        let task = tokio::spawn(self.run(notifications, cancel.clone()));
        ConsumerHandle { cancel, task }
    }

    async fn run(self, mut notifications: NotificationStream, cancel: CancellationToken) {
        info!(queue = %self.queue, "consumer started");

        // Work queued before this consumer existed
        self.drain().await;

        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // An interval's first tick fires immediately; the startup drain
        // already covered it.
        ticker.reset();

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                note = notifications.next() => match note {
                    // A notification is a hint, not a delivery: the entry may
                    // already be gone, or belong to another racing consumer.
                    Some(id) => {
                        debug!(queue = %self.queue, %id, "notification received");
                        self.pop_one().await;
                    }
                    None => {
                        warn!(queue = %self.queue, "notification stream closed, polling only");
                        notifications = Box::pin(futures::stream::pending());
                    }
                },
                // Fallback: recovers missed or lost notifications,
                // connectivity gaps, and crashed publishers.
                _ = ticker.tick() => self.drain().await,
            }
        }

        info!(queue = %self.queue, "consumer stopped");
    }

    async fn drain(&self) {
        while self.pop_one().await {}
    }

    /// One atomic pop. Returns whether draining should continue.
    async fn pop_one(&self) -> bool {
        match self.scheduler.pop_min(&self.queue).await {
            Ok(Some(envelope)) => {
                self.process(envelope).await;
                true
            }
            Ok(None) => false,
            Err(StoreError::Serialization(e)) => {
                // The entry was already removed by the pop; without a parsed
                // envelope it cannot be retried, so it is dropped.
                warn!(queue = %self.queue, error = %e, "dropping unparsable entry");
                true
            }
            Err(e) => {
                // Abandon this iteration; the next notification or fallback
                // tick retries naturally.
                warn!(queue = %self.queue, error = %e, "store error during pop");
                false
            }
        }
    }

    async fn process(&self, mut envelope: Envelope) {
        let id = envelope.id;
        if let Err(e) = envelope.advance(MessageStatus::Processing) {
            error!(queue = %self.queue, %id, %e, "dropping entry with corrupt lifecycle state");
            return;
        }

        match (self.handler)(envelope.payload.clone()).await {
            Ok(()) => {
                // Terminal: the entry is not re-stored — absence from the
                // store is the processed state.
                if let Err(e) = envelope.advance(MessageStatus::Processed) {
                    error!(queue = %self.queue, %id, %e, "unreachable transition after success");
                    return;
                }
                debug!(queue = %self.queue, %id, "message processed");
            }
            Err(handler_err) => {
                let failure = handler_err.to_string();
                if let Err(e) = envelope.advance(MessageStatus::Failed) {
                    error!(queue = %self.queue, %id, %e, "unreachable transition after failure");
                    return;
                }
                debug!(queue = %self.queue, %id, error = %failure, "handler failed, routing to retry coordinator");
                if let Err(e) = self.coordinator.handle_failure(envelope, &failure).await {
                    warn!(queue = %self.queue, %id, error = %e, "failure routing hit store error");
                }
            }
        }
    }
}
