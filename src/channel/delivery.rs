//! Delivery stage: self-echo suppression.
//!
//! The sender of a message already shows an optimistic local copy, so
//! the broker's echo of it must not reach the consumer a second time.
//! The filter is a sender-id equality test, not content dedup: any
//! message whose sender is in the self set is dropped, including ones
//! sent from another device under the same account. Messages that pass
//! are forwarded untouched and in arrival order.

use std::collections::HashSet;

use super::ChatMessage;

/// Decides whether an inbound message is forwarded to the consumer.
#[derive(Debug, Clone)]
pub struct DeliveryFilter {
    self_ids: HashSet<String>,
}

impl DeliveryFilter {
    /// Build a filter from the sender ids considered "self".
    ///
    /// The set is fixed for the life of the session.
    pub fn new<I, S>(self_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            self_ids: self_ids.into_iter().map(Into::into).collect(),
        }
    }

    /// True if the message should be delivered, false if it is a
    /// self-echo to drop.
    #[must_use]
    pub fn admit(&self, message: &ChatMessage) -> bool {
        !self.self_ids.contains(&message.sender_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(id: &str, sender: &str) -> ChatMessage {
        ChatMessage {
            id: id.to_string(),
            sender_id: sender.to_string(),
            sender_name: None,
            text: "hi".to_string(),
            is_read: false,
            timestamp: "2026-08-30T12:00:00".to_string(),
        }
    }

    #[test]
    fn test_admits_other_senders() {
        let filter = DeliveryFilter::new(["user-1"]);
        assert!(filter.admit(&msg("m-1", "user-2")));
    }

    #[test]
    fn test_drops_self_sender() {
        let filter = DeliveryFilter::new(["user-1"]);
        assert!(!filter.admit(&msg("m-1", "user-1")));
    }

    #[test]
    fn test_multiple_self_ids() {
        let filter = DeliveryFilter::new(["user-1", "device-a"]);
        assert!(!filter.admit(&msg("m-1", "device-a")));
        assert!(filter.admit(&msg("m-2", "user-3")));
    }

    #[test]
    fn test_order_preserved_for_admitted() {
        let filter = DeliveryFilter::new(["self"]);
        let inbound = vec![
            msg("m-1", "a"),
            msg("m-2", "self"),
            msg("m-3", "b"),
            msg("m-4", "a"),
        ];
        let delivered: Vec<&str> = inbound
            .iter()
            .filter(|m| filter.admit(m))
            .map(|m| m.id.as_str())
            .collect();
        assert_eq!(delivered, vec!["m-1", "m-3", "m-4"]);
    }
}
