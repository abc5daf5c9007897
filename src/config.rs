//! Channel configuration.

use std::time::Duration;

use crate::constants;

/// Configuration for attaching to a conversation channel.
///
/// Timing fields default to the values in [`crate::constants`]; tests
/// shrink them to keep scenarios fast.
#[derive(Clone, Debug)]
pub struct ChannelConfig {
    /// Broker endpoint URL. `http(s)` schemes are converted to `ws(s)`.
    pub endpoint: String,
    /// Stable external key of the conversation to subscribe to.
    pub conversation_id: String,
    /// Sender identifiers considered "self" for echo suppression.
    ///
    /// Usually a single entry (the authenticated user id). Multiple
    /// entries are accepted for deployments with per-device ids.
    pub self_ids: Vec<String>,
    /// Heart-beat interval offered for the outgoing direction.
    pub heartbeat_send: Duration,
    /// Heart-beat interval requested for the incoming direction.
    pub heartbeat_recv: Duration,
    /// Bound on the WebSocket + STOMP connect handshake.
    pub connect_timeout: Duration,
    /// First automatic reconnect delay.
    pub initial_backoff: Duration,
    /// Cap on the exponential reconnect delay.
    pub max_backoff: Duration,
}

impl ChannelConfig {
    /// Config for one conversation with default timing.
    pub fn new(
        endpoint: impl Into<String>,
        conversation_id: impl Into<String>,
        self_id: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            conversation_id: conversation_id.into(),
            self_ids: vec![self_id.into()],
            heartbeat_send: constants::HEARTBEAT_SEND_INTERVAL,
            heartbeat_recv: constants::HEARTBEAT_RECV_INTERVAL,
            connect_timeout: constants::CONNECT_TIMEOUT,
            initial_backoff: constants::INITIAL_BACKOFF,
            max_backoff: constants::MAX_BACKOFF,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_uses_default_timing() {
        let cfg = ChannelConfig::new("wss://broker.example/ws", "match-1", "user-1");
        assert_eq!(cfg.heartbeat_send, constants::HEARTBEAT_SEND_INTERVAL);
        assert_eq!(cfg.initial_backoff, constants::INITIAL_BACKOFF);
        assert_eq!(cfg.self_ids, vec!["user-1".to_string()]);
    }
}
