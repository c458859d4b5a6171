use std::collections::HashMap;

use async_trait::async_trait;
use futures::StreamExt;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};

use crate::error::{ConfigError, ConnectError, StoreError, StoreResult};
use crate::store::{NotificationStream, ScoredMember, Store};

/// Redis-backed store implementation.
///
/// Commands run over a shared [`ConnectionManager`] (auto-reconnecting,
/// cheaply cloneable). Each subscription gets its own dedicated pub/sub
/// connection, since a subscribed connection cannot issue regular commands.
///
/// Atomicity mapping: `ordered_pop_min` is `ZPOPMIN` — identification and
/// removal of the minimum in one server-side command, so two concurrent
/// consumers can never receive the same member. `ordered_remove` is `ZREM`
/// guarded by the exact serialized member.
pub struct RedisStore {
    client: Client,
    con: ConnectionManager,
}

impl RedisStore {
    /// Connect to the store at the given URL, e.g. `redis://localhost:6379`.
    ///
    /// A missing or unparsable URL is a configuration error, fatal at
    /// construction; connectivity failures surface as store errors.
    pub async fn connect(url: &str) -> Result<Self, ConnectError> {
        if url.trim().is_empty() {
            return Err(ConfigError::MissingUrl.into());
        }
        let client =
            Client::open(url).map_err(|e| ConfigError::InvalidUrl(e.to_string()))?;
        let con = client
            .get_connection_manager()
            .await
            .map_err(StoreError::from)?;
        Ok(Self { client, con })
    }
}

#[async_trait]
impl Store for RedisStore {
    async fn meta_write(&self, key: &str, fields: Vec<(String, String)>) -> StoreResult<()> {
        let mut con = self.con.clone();
        let _: () = con.hset_multiple(key, &fields).await?;
        Ok(())
    }

    async fn meta_read(&self, key: &str) -> StoreResult<Option<HashMap<String, String>>> {
        let mut con = self.con.clone();
        let record: HashMap<String, String> = con.hgetall(key).await?;
        // HGETALL returns an empty map for a missing key
        Ok(if record.is_empty() { None } else { Some(record) })
    }

    async fn meta_exists(&self, key: &str) -> StoreResult<bool> {
        let mut con = self.con.clone();
        let exists: bool = con.exists(key).await?;
        Ok(exists)
    }

    async fn ordered_insert(&self, key: &str, score: u64, member: &str) -> StoreResult<()> {
        let mut con = self.con.clone();
        let _: () = con.zadd(key, member, score).await?;
        Ok(())
    }

    async fn ordered_pop_min(&self, key: &str) -> StoreResult<Option<ScoredMember>> {
        let mut con = self.con.clone();
        let popped: Vec<(String, f64)> = con.zpopmin(key, 1).await?;
        Ok(popped.into_iter().next().map(|(member, score)| ScoredMember {
            member,
            score: score as u64,
        }))
    }

    async fn ordered_range(
        &self,
        key: &str,
        limit: Option<usize>,
    ) -> StoreResult<Vec<ScoredMember>> {
        if limit == Some(0) {
            return Ok(Vec::new());
        }
        let stop = match limit {
            Some(n) => n as isize - 1,
            None => -1,
        };
        let mut con = self.con.clone();
        let entries: Vec<(String, f64)> = con.zrange_withscores(key, 0, stop).await?;
        Ok(entries
            .into_iter()
            .map(|(member, score)| ScoredMember {
                member,
                score: score as u64,
            })
            .collect())
    }

    async fn ordered_remove(&self, key: &str, member: &str) -> StoreResult<bool> {
        let mut con = self.con.clone();
        let removed: u32 = con.zrem(key, member).await?;
        Ok(removed > 0)
    }

    async fn publish(&self, channel: &str, payload: &str) -> StoreResult<()> {
        let mut con = self.con.clone();
        let _: () = con.publish(channel, payload).await?;
        Ok(())
    }

    async fn subscribe(&self, channel: &str) -> StoreResult<NotificationStream> {
        let mut pubsub = self.client.get_async_pubsub().await?;
        pubsub.subscribe(channel).await?;
        let stream = pubsub
            .into_on_message()
            .filter_map(|msg| async move { msg.get_payload::<String>().ok() });
        Ok(Box::pin(stream))
    }
}
