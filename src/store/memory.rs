use std::collections::{BTreeSet, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;
use futures::StreamExt;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

use crate::error::StoreResult;
use crate::store::{NotificationStream, ScoredMember, Store};

/// Per-channel fan-out buffer. Overruns drop notifications, which the
/// consumption protocol tolerates: notifications are hints and the fallback
/// drain recovers anything missed.
const CHANNEL_CAPACITY: usize = 256;

#[derive(Default)]
struct Inner {
    meta: HashMap<String, HashMap<String, String>>,
    // (score, member) tuple ordering gives min-score-first; ties break on the
    // serialized member, matching the backing store's lexicographic tie rule.
    ordered: HashMap<String, BTreeSet<(u64, String)>>,
    channels: HashMap<String, broadcast::Sender<String>>,
}

/// In-process store implementation. Used by the test suite and for embedding
/// the queue without an external store; all operations uphold the same
/// atomicity contract as the networked backend, serialized by one mutex.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // Lock poisoning only happens if a holder panicked; the data is
        // plain collections, safe to keep using.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn meta_write(&self, key: &str, fields: Vec<(String, String)>) -> StoreResult<()> {
        let mut inner = self.lock();
        let record = inner.meta.entry(key.to_string()).or_default();
        for (field, value) in fields {
            record.insert(field, value);
        }
        Ok(())
    }

    async fn meta_read(&self, key: &str) -> StoreResult<Option<HashMap<String, String>>> {
        Ok(self.lock().meta.get(key).cloned())
    }

    async fn meta_exists(&self, key: &str) -> StoreResult<bool> {
        Ok(self.lock().meta.contains_key(key))
    }

    async fn ordered_insert(&self, key: &str, score: u64, member: &str) -> StoreResult<()> {
        self.lock()
            .ordered
            .entry(key.to_string())
            .or_default()
            .insert((score, member.to_string()));
        Ok(())
    }

    async fn ordered_pop_min(&self, key: &str) -> StoreResult<Option<ScoredMember>> {
        let mut inner = self.lock();
        let Some(set) = inner.ordered.get_mut(key) else {
            return Ok(None);
        };
        Ok(set.pop_first().map(|(score, member)| ScoredMember {
            member,
            score,
        }))
    }

    async fn ordered_range(
        &self,
        key: &str,
        limit: Option<usize>,
    ) -> StoreResult<Vec<ScoredMember>> {
        let inner = self.lock();
        let Some(set) = inner.ordered.get(key) else {
            return Ok(Vec::new());
        };
        Ok(set
            .iter()
            .take(limit.unwrap_or(usize::MAX))
            .map(|(score, member)| ScoredMember {
                member: member.clone(),
                score: *score,
            })
            .collect())
    }

    async fn ordered_remove(&self, key: &str, member: &str) -> StoreResult<bool> {
        let mut inner = self.lock();
        let Some(set) = inner.ordered.get_mut(key) else {
            return Ok(false);
        };
        let found = set.iter().find(|(_, m)| m.as_str() == member).cloned();
        match found {
            Some(entry) => Ok(set.remove(&entry)),
            None => Ok(false),
        }
    }

    async fn publish(&self, channel: &str, payload: &str) -> StoreResult<()> {
        let inner = self.lock();
        if let Some(tx) = inner.channels.get(channel) {
            // No subscribers => the notification is dropped, by contract.
            let _ = tx.send(payload.to_string());
        }
        Ok(())
    }

    async fn subscribe(&self, channel: &str) -> StoreResult<NotificationStream> {
        let mut inner = self.lock();
        let tx = inner
            .channels
            .entry(channel.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0);
        let stream = BroadcastStream::new(tx.subscribe())
            // Lagged receivers skip ahead; a dropped notification is
            // recovered by the fallback drain.
            .filter_map(|item| async move { item.ok() });
        Ok(Box::pin(stream))
    }
}
