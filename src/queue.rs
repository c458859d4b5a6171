use std::collections::HashMap;

use crate::error::StoreError;
use crate::message::unix_ms;

/// Queue metadata stored as a string-field hash record at `queue_meta:<name>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueMeta {
    pub name: String,
    pub created_at: u64,
    pub dead_letter_enabled: bool,
    pub max_retries: u32,
    /// Set only on dead-letter queue records, pointing at the queue they
    /// collect failures for.
    pub parent_queue: Option<String>,
}

impl QueueMeta {
    pub fn new(name: &str, options: &QueueOptions) -> Self {
        Self {
            name: name.to_string(),
            created_at: unix_ms(),
            dead_letter_enabled: options.dead_letter_queue,
            max_retries: options.max_retries,
            parent_queue: None,
        }
    }

    /// Metadata record for `<parent>_dlq`. The DLQ is a first-class queue;
    /// it never gets a DLQ of its own.
    pub fn dead_letter(name: &str, parent: &str, max_retries: u32) -> Self {
        Self {
            name: name.to_string(),
            created_at: unix_ms(),
            dead_letter_enabled: false,
            max_retries,
            parent_queue: Some(parent.to_string()),
        }
    }

    pub fn to_fields(&self) -> Vec<(String, String)> {
        let mut fields = vec![
            ("created_at".to_string(), self.created_at.to_string()),
            (
                "dead_letter_queue".to_string(),
                self.dead_letter_enabled.to_string(),
            ),
            ("max_retries".to_string(), self.max_retries.to_string()),
        ];
        if let Some(ref parent) = self.parent_queue {
            fields.push(("parent_queue".to_string(), parent.clone()));
        }
        fields
    }

    pub fn from_fields(name: &str, fields: &HashMap<String, String>) -> Result<Self, StoreError> {
        let parse_u64 = |field: &str| -> Result<u64, StoreError> {
            fields
                .get(field)
                .ok_or_else(|| corrupt(name, field, "missing"))?
                .parse()
                .map_err(|_| corrupt(name, field, "not an integer"))
        };
        let created_at = parse_u64("created_at")?;
        let max_retries = parse_u64("max_retries")? as u32;
        let dead_letter_enabled = fields
            .get("dead_letter_queue")
            .map(|v| v == "true")
            .unwrap_or(false);
        Ok(Self {
            name: name.to_string(),
            created_at,
            dead_letter_enabled,
            max_retries,
            parent_queue: fields.get("parent_queue").cloned(),
        })
    }
}

fn corrupt(queue: &str, field: &str, reason: &str) -> StoreError {
    StoreError::Corrupt(format!("queue_meta:{queue} field {field}: {reason}"))
}

/// Options for `create_queue`. Immutable after creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueOptions {
    pub dead_letter_queue: bool,
    pub max_retries: u32,
}

impl QueueOptions {
    /// Default retry budget before a failed message is dead-lettered.
    pub const DEFAULT_MAX_RETRIES: u32 = 3;
}

impl Default for QueueOptions {
    fn default() -> Self {
        Self {
            dead_letter_queue: false,
            max_retries: Self::DEFAULT_MAX_RETRIES,
        }
    }
}
