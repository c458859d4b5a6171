pub mod client;
pub mod config;
pub mod consumer;
pub mod dlq;
pub mod error;
pub mod message;
pub mod publisher;
pub mod queue;
pub mod registry;
pub mod scheduler;
pub mod store;
pub mod telemetry;

pub use client::OrdenaClient;
pub use config::{Config, ConsumerConfig};
pub use consumer::{ConsumerHandle, HandlerResult};
pub use error::{
    ConfigError, ConnectError, DeadLetterError, LookupError, PublishError, StoreError,
    StoreResult, TransitionError,
};
pub use message::{DeliveryOptions, Envelope, MessageStatus, PublishOptions};
pub use queue::{QueueMeta, QueueOptions};
pub use store::{MemoryStore, NotificationStream, RedisStore, ScoredMember, Store};
