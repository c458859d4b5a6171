use serde::Deserialize;

/// Top-level client configuration, deserializable from TOML.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Backing store connection URL, e.g. `redis://localhost:6379`.
    pub store_url: String,
    pub consumer: ConsumerConfig,
}

/// Consumer loop configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ConsumerConfig {
    /// Fallback drain interval (ms). The periodic drain recovers messages
    /// whose notifications were missed or lost.
    pub poll_interval_ms: u64,
}

impl ConsumerConfig {
    /// Default fallback interval: 5 seconds.
    pub const DEFAULT_POLL_INTERVAL_MS: u64 = 5_000;

    pub fn poll_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: Self::DEFAULT_POLL_INTERVAL_MS,
        }
    }
}
