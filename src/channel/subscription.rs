//! Topic subscription bound to one conversation.
//!
//! Every connection attempt gets a fresh generation number, and the
//! subscription/receipt ids carry it. MESSAGE frames whose
//! `subscription` header belongs to an older generation are discarded,
//! which is what makes close/reattach effective immediately even if
//! frames for the previous subscription are still in flight.

/// A single logical subscription: one conversation topic, one generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    conversation_id: String,
    generation: u64,
}

impl Subscription {
    /// Bind a conversation id to a connection-attempt generation.
    #[must_use]
    pub fn new(conversation_id: impl Into<String>, generation: u64) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            generation,
        }
    }

    /// The conversation this subscription is bound to.
    #[must_use]
    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    /// Broker destination for the conversation topic.
    #[must_use]
    pub fn topic(&self) -> String {
        format!("/topic/chat/{}", self.conversation_id)
    }

    /// Client-chosen subscription id sent in the SUBSCRIBE frame.
    #[must_use]
    pub fn id(&self) -> String {
        format!("sub-{}", self.generation)
    }

    /// Receipt id requested on the SUBSCRIBE frame.
    #[must_use]
    pub fn receipt_id(&self) -> String {
        format!("rcpt-{}", self.generation)
    }

    /// Whether a MESSAGE frame's `subscription` header belongs to this
    /// generation.
    #[must_use]
    pub fn owns(&self, subscription_header: &str) -> bool {
        subscription_header == self.id()
    }

    /// Whether a RECEIPT frame confirms this subscription.
    #[must_use]
    pub fn confirmed_by(&self, receipt_id: &str) -> bool {
        receipt_id == self.receipt_id()
    }
}
