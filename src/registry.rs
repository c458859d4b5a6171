use std::sync::Arc;

use tracing::{debug, info};

use crate::error::{LookupError, StoreError};
use crate::queue::{QueueMeta, QueueOptions};
use crate::store::{keys, Store};

/// Creates and looks up queue metadata. A queue's identity is its name;
/// uniqueness is enforced here before any metadata write.
#[derive(Clone)]
pub struct QueueRegistry {
    store: Arc<dyn Store>,
}

impl QueueRegistry {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Create a queue. Idempotent — if metadata for `name` already exists
    /// this is a logged no-op, not an error.
    ///
    /// When `dead_letter_queue` is set, also idempotently creates the
    /// `<name>_dlq` metadata record with `parent_queue = name`.
    pub async fn create_queue(&self, name: &str, options: &QueueOptions) -> Result<(), StoreError> {
        let meta_key = keys::queue_meta_key(name);
        if self.store.meta_exists(&meta_key).await? {
            info!(queue = %name, "queue already exists, skipping create");
            return Ok(());
        }

        let meta = QueueMeta::new(name, options);
        self.store.meta_write(&meta_key, meta.to_fields()).await?;
        info!(queue = %name, dead_letter = options.dead_letter_queue, "queue created");

        if options.dead_letter_queue {
            let dlq = keys::dlq_name(name);
            let dlq_meta_key = keys::queue_meta_key(&dlq);
            if !self.store.meta_exists(&dlq_meta_key).await? {
                let dlq_meta = QueueMeta::dead_letter(&dlq, name, options.max_retries);
                self.store
                    .meta_write(&dlq_meta_key, dlq_meta.to_fields())
                    .await?;
                debug!(queue = %name, dlq = %dlq, "dead-letter queue created");
            }
        }

        Ok(())
    }

    /// Whether metadata exists for `name`.
    pub async fn exists(&self, name: &str) -> Result<bool, StoreError> {
        self.store.meta_exists(&keys::queue_meta_key(name)).await
    }

    /// Read a queue's metadata, failing when the queue does not exist.
    pub async fn metadata(&self, name: &str) -> Result<QueueMeta, LookupError> {
        let fields = self
            .store
            .meta_read(&keys::queue_meta_key(name))
            .await?
            .ok_or_else(|| LookupError::QueueNotFound(name.to_string()))?;
        Ok(QueueMeta::from_fields(name, &fields)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn registry() -> QueueRegistry {
        QueueRegistry::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn create_then_lookup() {
        let registry = registry();
        registry
            .create_queue("orders", &QueueOptions::default())
            .await
            .unwrap();

        assert!(registry.exists("orders").await.unwrap());
        let meta = registry.metadata("orders").await.unwrap();
        assert_eq!(meta.name, "orders");
        assert!(!meta.dead_letter_enabled);
        assert_eq!(meta.max_retries, QueueOptions::DEFAULT_MAX_RETRIES);
    }

    #[tokio::test]
    async fn create_is_idempotent() {
        let registry = registry();
        let options = QueueOptions {
            dead_letter_queue: false,
            max_retries: 7,
        };
        registry.create_queue("orders", &options).await.unwrap();

        // Second create with different options must not overwrite
        let other = QueueOptions {
            dead_letter_queue: true,
            max_retries: 1,
        };
        registry.create_queue("orders", &other).await.unwrap();

        let meta = registry.metadata("orders").await.unwrap();
        assert_eq!(meta.max_retries, 7);
        assert!(!meta.dead_letter_enabled);
        assert!(!registry.exists("orders_dlq").await.unwrap());
    }

    #[tokio::test]
    async fn dead_letter_queue_is_created_alongside() {
        let registry = registry();
        let options = QueueOptions {
            dead_letter_queue: true,
            max_retries: 2,
        };
        registry.create_queue("orders", &options).await.unwrap();

        let dlq_meta = registry.metadata("orders_dlq").await.unwrap();
        assert_eq!(dlq_meta.parent_queue.as_deref(), Some("orders"));
        assert!(
            !dlq_meta.dead_letter_enabled,
            "a DLQ must not get its own DLQ"
        );
    }

    #[tokio::test]
    async fn metadata_of_missing_queue_fails() {
        let registry = registry();
        let err = registry.metadata("ghost").await.unwrap_err();
        assert!(matches!(err, LookupError::QueueNotFound(name) if name == "ghost"));
    }
}
