pub(crate) mod keys;
mod memory;
mod redis;

use std::collections::HashMap;
use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::error::StoreResult;

pub use memory::MemoryStore;
pub use self::redis::RedisStore;

/// One member of an ordered set together with its score.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoredMember {
    pub member: String,
    pub score: u64,
}

/// Stream of notification payloads delivered on a pub/sub channel.
/// Best-effort: entries may be missed or duplicated; consumers treat each
/// item as a hint, never as a delivery.
pub type NotificationStream = Pin<Box<dyn Stream<Item = String> + Send>>;

/// Interface to the shared backing store: hash-record metadata, an ordered
/// set keyed by a numeric score, and pub/sub channels. Every mutation is a
/// single atomic store operation — the core takes no locks of its own.
/// Implementations must be thread-safe.
#[async_trait]
pub trait Store: Send + Sync {
    // --- Metadata records ---

    /// Atomically write the given fields of a hash record.
    async fn meta_write(&self, key: &str, fields: Vec<(String, String)>) -> StoreResult<()>;

    /// Read all fields of a hash record. Absent record => `None`.
    async fn meta_read(&self, key: &str) -> StoreResult<Option<HashMap<String, String>>>;

    /// Whether a hash record exists.
    async fn meta_exists(&self, key: &str) -> StoreResult<bool>;

    // --- Ordered set ---

    /// Atomically insert a member with the given score.
    async fn ordered_insert(&self, key: &str, score: u64, member: &str) -> StoreResult<()>;

    /// Atomically identify **and** remove the lowest-scoring member.
    /// At most one caller ever receives a given member; an empty set is a
    /// valid outcome, not an error.
    async fn ordered_pop_min(&self, key: &str) -> StoreResult<Option<ScoredMember>>;

    /// Read members in ascending score order, bounded by `limit` when given.
    async fn ordered_range(&self, key: &str, limit: Option<usize>)
        -> StoreResult<Vec<ScoredMember>>;

    /// Conditionally delete a member, guarded by its exact serialized form.
    /// Returns whether this caller removed it — under concurrent calls only
    /// one caller sees `true`.
    async fn ordered_remove(&self, key: &str, member: &str) -> StoreResult<bool>;

    // --- Pub/sub ---

    /// Fire-and-forget publish on a channel. Delivery is not guaranteed.
    async fn publish(&self, channel: &str, payload: &str) -> StoreResult<()>;

    /// Subscribe to a channel, returning the stream of payloads.
    async fn subscribe(&self, channel: &str) -> StoreResult<NotificationStream>;
}
