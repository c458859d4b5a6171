//! Key naming for the backing store.
//!
//! Per queue `name`: a metadata hash record at `queue_meta:<name>`, an
//! ordered set of serialized envelopes at `queue:<name>`, and a notification
//! channel addressed as `queue:<name>`.

/// Metadata record key for a queue.
pub fn queue_meta_key(name: &str) -> String {
    format!("queue_meta:{name}")
}

/// Ordered store key for a queue.
pub fn queue_key(name: &str) -> String {
    format!("queue:{name}")
}

/// Notification channel for a queue. Shares the ordered store's address.
pub fn notify_channel(name: &str) -> String {
    queue_key(name)
}

/// Name of a queue's dead-letter queue.
pub fn dlq_name(name: &str) -> String {
    format!("{name}_dlq")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_layout() {
        assert_eq!(queue_meta_key("orders"), "queue_meta:orders");
        assert_eq!(queue_key("orders"), "queue:orders");
        assert_eq!(notify_channel("orders"), "queue:orders");
        assert_eq!(dlq_name("orders"), "orders_dlq");
    }
}
