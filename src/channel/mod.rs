//! Conversation channel engine.
//!
//! This module keeps one conversation topic synchronized with the STOMP
//! broker. The pieces, leaves first:
//!
//! ```text
//! ChannelManager (facade: attach/detach/reconnect)
//!     └── Session (lifecycle, heartbeats, reconnect backoff)
//!         ├── ws transport (tokio-tungstenite, via crate::ws)
//!         ├── frame codec (STOMP 1.2, total decode)
//!         ├── Subscription (one topic, generation-tagged ids)
//!         └── DeliveryFilter (self-echo suppression)
//! ```
//!
//! Failures below the session never escape as errors: they surface as
//! [`ConnectionState`] transitions on the event stream, and the session
//! retries on its own backoff schedule. `Ready` is the only state in
//! which messages are delivered.

pub mod delivery;
pub mod frame;
pub mod manager;
pub mod session;
pub mod subscription;

use serde::Deserialize;

/// Connection state for a channel, owned and mutated only by the session.
///
/// Transitions move forward through
/// `Disconnected → Connecting → Connected → Subscribing → Ready`; any
/// state can fall back to `Disconnected` (clean close or retryable
/// failure) or `Failed` (terminal until an explicit reconnect).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// Not connected. Also the resting state between reconnect attempts.
    #[default]
    Disconnected,
    /// WebSocket + STOMP CONNECT handshake in progress.
    Connecting,
    /// Broker acknowledged the connect frame.
    Connected,
    /// Subscribe request sent, awaiting broker confirmation.
    Subscribing,
    /// Subscribed; messages flow to the consumer.
    Ready,
    /// Non-retryable setup error; stays until `reconnect()` is called.
    Failed(String),
}

/// A message delivered from the conversation topic.
///
/// Constructed by decoding a MESSAGE frame body, immutable afterward.
/// The engine holds no history; each record is handed to the consumer
/// once and forgotten.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    /// Message identifier, unique within the conversation.
    pub id: String,
    /// Sender's user identifier.
    pub sender_id: String,
    /// Sender's display name, when the broker includes it.
    #[serde(default)]
    pub sender_name: Option<String>,
    /// Message body text.
    pub text: String,
    /// Whether the recipient has read the message.
    pub is_read: bool,
    /// Delivery timestamp as sent by the broker (ISO-8601, opaque here).
    pub timestamp: String,
}

/// Event emitted to the consumer, in the order it occurred.
///
/// One ordered stream carries both state transitions and messages, which
/// preserves transition order and broker delivery order by construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    /// The connection state changed.
    State(ConnectionState),
    /// A non-self message arrived on the subscribed topic.
    Message(ChatMessage),
}

/// Errors classified by the channel engine.
///
/// These drive logging and retry policy inside the session; apart from
/// auth rejection (which pings the credential provider) they are never
/// surfaced to the consumer as errors, only as state transitions.
#[derive(Debug)]
pub enum ChannelError {
    /// Socket-level failure (connect, read, or write).
    Transport(String),
    /// Malformed or unexpected frame from the broker.
    Protocol(String),
    /// Broker refused the connect frame.
    AuthRejected(String),
    /// Broker refused or failed to acknowledge a subscribe request.
    SubscriptionFailed(String),
    /// A single message payload could not be parsed; the frame is
    /// dropped and the stream continues.
    Decode(String),
    /// The channel was shut down by the caller.
    Closed,
}

impl std::fmt::Display for ChannelError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transport(msg) => write!(f, "Transport error: {msg}"),
            Self::Protocol(msg) => write!(f, "Protocol error: {msg}"),
            Self::AuthRejected(msg) => write!(f, "Authentication rejected: {msg}"),
            Self::SubscriptionFailed(msg) => write!(f, "Subscription failed: {msg}"),
            Self::Decode(msg) => write!(f, "Payload decode error: {msg}"),
            Self::Closed => write!(f, "Channel closed"),
        }
    }
}

impl std::error::Error for ChannelError {}

// Re-exports
pub use delivery::DeliveryFilter;
pub use frame::{Frame, HeartBeat, ServerFrame};
pub use manager::{ChannelManager, ConversationHandle};
pub use subscription::Subscription;
