use std::future::Future;
use std::sync::Arc;

use uuid::Uuid;

use crate::config::ConsumerConfig;
use crate::consumer::{ConsumerHandle, ConsumerLoop, Handler, HandlerResult};
use crate::dlq::RetryCoordinator;
use crate::error::{ConnectError, DeadLetterError, PublishError, StoreError};
use crate::message::{Envelope, PublishOptions};
use crate::publisher::Publisher;
use crate::queue::QueueOptions;
use crate::registry::QueueRegistry;
use crate::scheduler::PriorityScheduler;
use crate::store::{keys, RedisStore, Store};

/// Default bound for [`OrdenaClient::dead_letter_messages`].
const DEFAULT_DEAD_LETTER_LIMIT: usize = 100;

/// Priority message queue client.
///
/// Owns one logical store handle and passes it to every component; the
/// client is `Clone`, `Send`, and `Sync` and can be shared across tasks.
///
/// ```no_run
/// # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
/// use ordena::{OrdenaClient, PublishOptions, QueueOptions};
///
/// ordena::telemetry::init_tracing();
/// let client = OrdenaClient::connect("redis://localhost:6379").await?;
/// client
///     .create_queue(
///         "orders",
///         QueueOptions {
///             dead_letter_queue: true,
///             max_retries: 2,
///         },
///     )
///     .await?;
///
/// client
///     .publish(
///         "orders",
///         serde_json::json!({"order": 42}),
///         PublishOptions::default().with_priority(0),
///     )
///     .await?;
///
/// let consumer = client
///     .consume("orders", |payload| async move {
///         println!("processing {payload}");
///         Ok(())
///     })
///     .await?;
/// # consumer.stop().await;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct OrdenaClient {
    store: Arc<dyn Store>,
    registry: QueueRegistry,
    publisher: Publisher,
    scheduler: PriorityScheduler,
    coordinator: RetryCoordinator,
    consumer_config: ConsumerConfig,
}

impl OrdenaClient {
    /// Connect to a Redis-backed store. A missing or unparsable URL fails
    /// with a configuration error.
    pub async fn connect(url: &str) -> Result<Self, ConnectError> {
        let store = RedisStore::connect(url).await?;
        Ok(Self::with_store(Arc::new(store)))
    }

    /// Build a client over any store implementation.
    pub fn with_store(store: Arc<dyn Store>) -> Self {
        Self::with_store_and_config(store, ConsumerConfig::default())
    }

    pub fn with_store_and_config(store: Arc<dyn Store>, consumer_config: ConsumerConfig) -> Self {
        let registry = QueueRegistry::new(store.clone());
        let scheduler = PriorityScheduler::new(store.clone());
        let publisher = Publisher::new(store.clone(), registry.clone(), scheduler.clone());
        let coordinator =
            RetryCoordinator::new(registry.clone(), scheduler.clone(), publisher.clone());
        Self {
            store,
            registry,
            publisher,
            scheduler,
            coordinator,
            consumer_config,
        }
    }

    /// Create a queue. Idempotent; creating an existing queue is a logged
    /// no-op.
    pub async fn create_queue(&self, name: &str, options: QueueOptions) -> Result<(), StoreError> {
        self.registry.create_queue(name, &options).await
    }

    /// Publish a payload, returning the generated message id.
    pub async fn publish(
        &self,
        queue: &str,
        payload: serde_json::Value,
        options: PublishOptions,
    ) -> Result<Uuid, PublishError> {
        self.publisher.publish(queue, payload, options).await
    }

    /// Start a consumer loop on a queue. Handler errors are caught by the
    /// loop and routed through the retry pipeline, never propagated here.
    ///
    /// The returned handle stops the loop cooperatively; dropping it without
    /// calling [`ConsumerHandle::stop`] leaves the loop running detached.
    pub async fn consume<F, Fut>(
        &self,
        queue: &str,
        handler: F,
    ) -> Result<ConsumerHandle, StoreError>
    where
        F: Fn(serde_json::Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        let notifications = self.store.subscribe(&keys::notify_channel(queue)).await?;
        let handler: Handler = Arc::new(move |payload| Box::pin(handler(payload)));
        let consumer = ConsumerLoop {
            queue: queue.to_string(),
            scheduler: self.scheduler.clone(),
            coordinator: self.coordinator.clone(),
            handler,
            poll_interval: self.consumer_config.poll_interval(),
        };
        Ok(consumer.spawn(notifications))
    }

    /// List envelopes parked in a queue's dead-letter queue, in dequeue
    /// order. `limit` defaults to 100.
    pub async fn dead_letter_messages(
        &self,
        queue: &str,
        limit: Option<usize>,
    ) -> Result<Vec<Envelope>, DeadLetterError> {
        self.coordinator
            .list_dead_letters(queue, limit.unwrap_or(DEFAULT_DEAD_LETTER_LIMIT))
            .await
    }

    /// Replay one dead-lettered message into its original queue. Returns
    /// whether a matching entry was found and replayed.
    pub async fn replay_dead_letter(
        &self,
        queue: &str,
        message_id: Uuid,
    ) -> Result<bool, DeadLetterError> {
        self.coordinator.replay_dead_letter(queue, message_id).await
    }
}
