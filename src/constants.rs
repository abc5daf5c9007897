//! Application-wide timing constants for chatlink.
//!
//! This module centralizes the protocol timing knobs so the defaults
//! used by [`crate::config::ChannelConfig`] are documented in one place.
//!
//! # Categories
//!
//! - **Heartbeats**: STOMP heart-beat intervals and staleness policy
//! - **Timeouts**: Connection handshake bounds
//! - **Backoff**: Automatic reconnection pacing

use std::time::Duration;

// ============================================================================
// Heartbeats
// ============================================================================

/// Interval at which the session offers to send heart-beat frames.
///
/// Advertised in the CONNECT `heart-beat` header; the effective outgoing
/// interval is negotiated upward if the broker wants slower beats.
/// 4 seconds matches what the production broker negotiates.
pub const HEARTBEAT_SEND_INTERVAL: Duration = Duration::from_secs(4);

/// Interval at which the session expects broker heart-beats.
///
/// Also advertised in the CONNECT `heart-beat` header. Any inbound frame
/// counts as activity, not just heart-beats.
pub const HEARTBEAT_RECV_INTERVAL: Duration = Duration::from_secs(4);

/// Multiple of the negotiated incoming interval after which a silent
/// connection is treated as dead and torn down for reconnection.
///
/// 3x gives the broker two missed beats of slack before we give up,
/// which avoids flapping on a single delayed frame.
pub const STALENESS_MULTIPLIER: u32 = 3;

// ============================================================================
// Timeouts
// ============================================================================

/// Time allowed for the full connect handshake: WebSocket upgrade plus
/// the STOMP CONNECT → CONNECTED exchange.
///
/// A broker that cannot acknowledge within 10 seconds is treated the
/// same as an unreachable one.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

// ============================================================================
// Backoff
// ============================================================================

/// First automatic reconnect delay after a failure.
pub const INITIAL_BACKOFF: Duration = Duration::from_secs(1);

/// Upper bound for the exponential reconnect delay.
///
/// The delay doubles per failed attempt up to this cap, with up to one
/// second of random jitter added so a fleet of clients does not
/// reconnect in lockstep.
pub const MAX_BACKOFF: Duration = Duration::from_secs(30);
