//! Push-channel collaborator seam.
//!
//! The pub/sub transport itself is opaque; a channel implementation feeds
//! `ChannelEvent`s into an mpsc queue that the listener task drains. Topics
//! are hierarchical routing keys of the form `root/namespace/transaction_id`,
//! scoped per worker namespace so one worker's completions do not storm every
//! other worker's subscription.

use serde_json::Value as JsonValue;

use crate::types::ExecutionStatus;

/// Connectivity and message events emitted by a push-channel implementation.
#[derive(Debug, Clone)]
pub enum ChannelEvent {
    /// The channel (re)connected. Missed messages are not replayed.
    Connected,
    /// The channel went offline.
    Disconnected,
    /// An inbound notification. `topic` is the full routing key.
    Message { topic: String, payload: JsonValue },
}

/// Routing key for a single transaction's completion notifications.
pub fn topic_for(root: &str, namespace: &str, transaction_id: &str) -> String {
    format!("{}/{}/{}", root, namespace, transaction_id)
}

/// Wildcard filter a worker subscribes with: everything under its namespace.
pub fn subscription_filter(root: &str, namespace: &str) -> String {
    format!("{}/{}/#", root, namespace)
}

/// The transaction id is the final segment of the routing key.
pub fn transaction_from_topic(topic: &str) -> Option<&str> {
    match topic.rsplit('/').next() {
        Some(segment) if !segment.is_empty() => Some(segment),
        _ => None,
    }
}

/// Pull the status token out of a notification payload, if present.
pub fn status_from_payload(payload: &JsonValue) -> Option<ExecutionStatus> {
    payload
        .get("status")
        .and_then(|s| s.as_str())
        .map(ExecutionStatus::from_token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transaction_is_last_topic_segment() {
        let topic = topic_for("syncgate", "worker-a", "txn-123");
        assert_eq!(topic, "syncgate/worker-a/txn-123");
        assert_eq!(transaction_from_topic(&topic), Some("txn-123"));
    }

    #[test]
    fn bare_segment_is_accepted() {
        assert_eq!(transaction_from_topic("txn-9"), Some("txn-9"));
    }

    #[test]
    fn empty_trailing_segment_is_rejected() {
        assert_eq!(transaction_from_topic("syncgate/worker-a/"), None);
        assert_eq!(transaction_from_topic(""), None);
    }

    #[test]
    fn subscription_filter_covers_namespace() {
        assert_eq!(
            subscription_filter("syncgate", "worker-a"),
            "syncgate/worker-a/#"
        );
    }

    #[test]
    fn status_is_read_from_payload() {
        let payload = serde_json::json!({"status": "SUCCEEDED"});
        assert_eq!(
            status_from_payload(&payload),
            Some(ExecutionStatus::Succeeded)
        );
        assert_eq!(status_from_payload(&serde_json::json!({})), None);
    }
}
