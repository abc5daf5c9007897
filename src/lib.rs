//! Chatlink - real-time conversation channel engine.
//!
//! This crate keeps a chat view synchronized with a remote STOMP message
//! broker over a persistent WebSocket: it connects, authenticates with a
//! bearer token, subscribes to exactly one conversation topic at a time,
//! suppresses self-echo, and recovers from failures without duplicating
//! or reordering delivery to the consumer.
//!
//! # Architecture
//!
//! The crate follows a single-owner session pattern:
//!
//! - **ChannelManager** - Public facade, owns at most one live session
//! - **Session** - Connection lifecycle, heartbeats, reconnect backoff
//! - **Subscription** - One conversation topic, generation-tagged
//! - **DeliveryFilter** - Drops self-originated echoes, preserves order
//! - **Frame codec** - STOMP 1.2 encode/decode, total on malformed input
//!
//! # Modules
//!
//! - [`channel`] - The session/subscription/delivery engine
//! - [`ws`] - WebSocket transport wrapper
//! - [`auth`] - Credential provider seam
//! - [`config`] - Channel configuration

// Library modules
pub mod auth;
pub mod channel;
pub mod config;
pub mod constants;
pub mod ws;

// Re-export commonly used types
pub use auth::{CredentialProvider, StaticToken};
pub use channel::{
    ChannelError, ChannelEvent, ChannelManager, ChatMessage, ConnectionState, ConversationHandle,
};
pub use config::ChannelConfig;
