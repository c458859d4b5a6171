use crate::message::MessageStatus;

/// Low-level backing store errors (connectivity, serialization).
/// This is the error type for the `Store` trait — store operations can only
/// fail with infrastructure errors, never domain errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("corrupt stored data: {0}")]
    Corrupt(String),
}

impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        StoreError::Connection(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Invalid store connection target. Fatal at client construction.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("store URL is required")]
    MissingUrl,

    #[error("invalid store URL: {0}")]
    InvalidUrl(String),
}

// --- Per-operation error types ---

#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Registry metadata lookup failure; embedded by the per-operation types.
#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    #[error("queue not found: {0}")]
    QueueNotFound(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("queue not found: {0}")]
    QueueNotFound(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<LookupError> for PublishError {
    fn from(err: LookupError) -> Self {
        match err {
            LookupError::QueueNotFound(name) => PublishError::QueueNotFound(name),
            LookupError::Store(e) => PublishError::Store(e),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DeadLetterError {
    #[error("queue not found: {0}")]
    QueueNotFound(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<LookupError> for DeadLetterError {
    fn from(err: LookupError) -> Self {
        match err {
            LookupError::QueueNotFound(name) => DeadLetterError::QueueNotFound(name),
            LookupError::Store(e) => DeadLetterError::Store(e),
        }
    }
}

/// A lifecycle transition outside the defined state machine.
/// Always rejected — a corrupt-state envelope is logged and dropped,
/// never silently advanced.
#[derive(Debug, thiserror::Error)]
#[error("invalid status transition: {from:?} -> {to:?}")]
pub struct TransitionError {
    pub from: MessageStatus,
    pub to: MessageStatus,
}
