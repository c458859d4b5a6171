use std::sync::Arc;

use tracing::warn;

use crate::error::StoreResult;
use crate::message::{unix_ms, Envelope};
use crate::store::{keys, Store};

/// Score stride between priority tiers.
///
/// `score = priority * PRIORITY_STRIDE + enqueue_ms`. The stride comfortably
/// exceeds any realistic millisecond timestamp, so no timestamp range can
/// cross a priority tier: a smaller priority number always yields a smaller
/// score and dequeues first; within a tier, earlier enqueue wins.
pub const PRIORITY_STRIDE: u64 = 10_000_000_000;

/// Largest distinct priority tier. Stores that hold scores as f64 (Redis
/// does) stay exact below 2^53, which caps the composite score; anything
/// above this collapses into the least-urgent tier rather than wrapping
/// around to the front of the queue.
pub const MAX_PRIORITY: u32 = 900_000;

/// Compute the ordering score for a priority at an enqueue timestamp.
pub fn score(priority: u32, enqueue_ms: u64) -> u64 {
    u64::from(priority.min(MAX_PRIORITY)) * PRIORITY_STRIDE + enqueue_ms
}

/// Priority-ordered access to a queue's ordered store. All cross-consumer
/// safety lives in [`pop_min`](PriorityScheduler::pop_min) — the single
/// serialization point for concurrent consumers.
#[derive(Clone)]
pub struct PriorityScheduler {
    store: Arc<dyn Store>,
}

impl PriorityScheduler {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Insert an envelope, scored from its priority and the current time.
    /// One atomic store operation.
    pub async fn push(&self, queue: &str, envelope: &Envelope) -> StoreResult<()> {
        let member = serde_json::to_string(envelope)?;
        let score = score(envelope.options.priority, unix_ms());
        self.store
            .ordered_insert(&keys::queue_key(queue), score, &member)
            .await
    }

    /// Atomically remove and return the lowest-scoring envelope, or `None`
    /// when the queue is empty. At most one caller ever receives a given
    /// entry.
    ///
    /// A member that fails to parse surfaces as
    /// [`StoreError::Serialization`]; the entry is already removed from the
    /// store at that point, so the caller logs and drops it.
    pub async fn pop_min(&self, queue: &str) -> StoreResult<Option<Envelope>> {
        match self.store.ordered_pop_min(&keys::queue_key(queue)).await? {
            Some(entry) => Ok(Some(serde_json::from_str(&entry.member)?)),
            None => Ok(None),
        }
    }

    /// Read up to `limit` envelopes in dequeue order without removing them.
    /// Returns each with its exact serialized member for later conditional
    /// removal. Unparsable members are logged and skipped.
    pub async fn scan(
        &self,
        queue: &str,
        limit: Option<usize>,
    ) -> StoreResult<Vec<(String, Envelope)>> {
        let entries = self
            .store
            .ordered_range(&keys::queue_key(queue), limit)
            .await?;
        let mut parsed = Vec::with_capacity(entries.len());
        for entry in entries {
            match serde_json::from_str::<Envelope>(&entry.member) {
                Ok(envelope) => parsed.push((entry.member, envelope)),
                Err(e) => {
                    warn!(%queue, error = %e, "skipping unparsable entry during scan");
                }
            }
        }
        Ok(parsed)
    }

    /// Conditionally remove an entry by its exact serialized member.
    /// Returns whether this caller removed it.
    pub async fn remove_exact(&self, queue: &str, member: &str) -> StoreResult<bool> {
        self.store
            .ordered_remove(&keys::queue_key(queue), member)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{DeliveryOptions, MessageStatus};
    use crate::error::StoreError;
    use crate::store::MemoryStore;

    fn scheduler() -> PriorityScheduler {
        PriorityScheduler::new(Arc::new(MemoryStore::new()))
    }

    fn envelope(priority: u32) -> Envelope {
        Envelope::new(
            "q1",
            serde_json::json!({"p": priority}),
            DeliveryOptions {
                priority,
                retries: 3,
            },
        )
    }

    #[test]
    fn lower_priority_number_scores_lower() {
        let now = unix_ms();
        assert!(score(0, now) < score(1, now));
        assert!(score(1, now) < score(2, now));
    }

    #[test]
    fn timestamps_never_cross_priority_tiers() {
        // A century from the epoch stays well inside one stride
        let far_future_ms = 200 * 365 * 24 * 3600 * 1000u64;
        assert!(score(1, 0) > score(0, far_future_ms));
    }

    #[test]
    fn earlier_enqueue_wins_within_a_tier() {
        assert!(score(5, 1_000) < score(5, 1_001));
    }

    #[test]
    fn extreme_priorities_clamp_into_the_last_tier() {
        let now = unix_ms();
        // Must not overflow, and must still sort as least urgent
        let extreme = score(u32::MAX, now);
        assert_eq!(extreme, score(MAX_PRIORITY, now));
        assert!(extreme > score(MAX_PRIORITY - 1, now));
        assert!(extreme < 1 << 53);
    }

    #[tokio::test]
    async fn pop_returns_highest_priority_first() {
        let scheduler = scheduler();
        // Published low-priority first; dequeue order must ignore that
        for priority in [2u32, 0, 1] {
            scheduler.push("q1", &envelope(priority)).await.unwrap();
        }

        for expected in 0u32..3 {
            let popped = scheduler.pop_min("q1").await.unwrap().unwrap();
            assert_eq!(popped.options.priority, expected);
        }
        assert!(scheduler.pop_min("q1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn fifo_within_equal_priority() {
        let scheduler = scheduler();
        let first = envelope(1);
        let second = envelope(1);
        scheduler.push("q1", &first).await.unwrap();
        // Separate the enqueue timestamps by at least one millisecond
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        scheduler.push("q1", &second).await.unwrap();

        assert_eq!(scheduler.pop_min("q1").await.unwrap().unwrap().id, first.id);
        assert_eq!(scheduler.pop_min("q1").await.unwrap().unwrap().id, second.id);
    }

    #[tokio::test]
    async fn push_pop_round_trip_preserves_payload() {
        let scheduler = scheduler();
        let env = Envelope::new(
            "q1",
            serde_json::json!({"to": "user@example.com", "attempts": [1, 2]}),
            DeliveryOptions {
                priority: 4,
                retries: 9,
            },
        );
        scheduler.push("q1", &env).await.unwrap();

        let popped = scheduler.pop_min("q1").await.unwrap().unwrap();
        assert_eq!(popped.payload, env.payload);
        assert_eq!(popped.options, env.options);
        assert_eq!(popped.status, MessageStatus::Waiting);
    }

    #[tokio::test]
    async fn pop_of_corrupt_member_is_serialization_error() {
        let store = Arc::new(MemoryStore::new());
        store
            .ordered_insert("queue:q1", 1, "not json")
            .await
            .unwrap();
        let scheduler = PriorityScheduler::new(store.clone());

        let err = scheduler.pop_min("q1").await.unwrap_err();
        assert!(matches!(err, StoreError::Serialization(_)));
        // The corrupt entry is gone — dropped, not retried
        assert!(scheduler.pop_min("q1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn scan_skips_corrupt_members_and_keeps_raw_form() {
        let store = Arc::new(MemoryStore::new());
        let scheduler = PriorityScheduler::new(store.clone());
        let env = envelope(0);
        scheduler.push("q1", &env).await.unwrap();
        store
            .ordered_insert("queue:q1", 2, "garbage")
            .await
            .unwrap();

        let scanned = scheduler.scan("q1", None).await.unwrap();
        assert_eq!(scanned.len(), 1);
        assert_eq!(scanned[0].1.id, env.id);

        // The raw member removes the exact entry
        assert!(scheduler.remove_exact("q1", &scanned[0].0).await.unwrap());
        assert!(!scheduler.remove_exact("q1", &scanned[0].0).await.unwrap());
    }
}
