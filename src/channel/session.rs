//! Session lifecycle: connect, authenticate, subscribe, deliver, recover.
//!
//! One session task per attached conversation. The task owns the socket
//! exclusively and is the only mutator of the connection state; every
//! outcome reaches the consumer as an ordered [`ChannelEvent`]. The
//! reconnect loop runs until shut down: failed attempts back off
//! exponentially with jitter, a caller-initiated shutdown always wins
//! over a scheduled retry, and a reconnect command resets the backoff.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;

use super::frame::{self, Frame, HeartBeat, ServerFrame, HEARTBEAT_FRAME};
use super::{
    ChannelError, ChannelEvent, ChatMessage, ConnectionState, DeliveryFilter, Subscription,
};
use crate::auth::CredentialProvider;
use crate::config::ChannelConfig;
use crate::constants::STALENESS_MULTIPLIER;
use crate::ws::{self, WsMessage, WsReader, WsWriter};

/// Maximum random jitter added to each reconnect delay.
const BACKOFF_JITTER_MS: u64 = 1000;

/// Caller commands delivered to the session task.
#[derive(Debug)]
pub(crate) enum SessionCommand {
    /// Tear down cleanly and exit; always wins over a pending retry.
    Shutdown,
    /// Reset the attempt counter and retry immediately.
    Reconnect,
}

/// Why a connection attempt ended.
enum Attempt {
    /// Shutdown requested; teardown already done.
    Shutdown,
    /// Reconnect requested by the caller.
    Reconnect,
    /// Attempt failed or the connection was lost; retry on backoff.
    Lost(ChannelError),
}

/// Drive the session until shutdown. Spawned by the manager.
pub(crate) async fn run(
    config: ChannelConfig,
    provider: Arc<dyn CredentialProvider>,
    events: mpsc::UnboundedSender<ChannelEvent>,
    mut commands: mpsc::UnboundedReceiver<SessionCommand>,
) {
    let endpoint = ws::http_to_ws_scheme(&config.endpoint);
    let filter = DeliveryFilter::new(config.self_ids.iter().cloned());

    // A URL that cannot form a WebSocket request will never succeed;
    // park in Failed until the caller shuts down or retries anyway.
    while let Err(e) = ws::validate_url(&endpoint) {
        log::error!("Endpoint rejected: {e:#}");
        if !emit(&events, ChannelEvent::State(ConnectionState::Failed(format!("{e:#}")))) {
            return;
        }
        match commands.recv().await {
            Some(SessionCommand::Reconnect) => continue,
            Some(SessionCommand::Shutdown) | None => {
                let _ = emit(&events, ChannelEvent::State(ConnectionState::Disconnected));
                return;
            }
        }
    }

    let mut backoff = config.initial_backoff;
    let mut generation: u64 = 0;

    loop {
        generation += 1;
        let subscription = Subscription::new(&config.conversation_id, generation);

        let (outcome, reached_ready) = run_attempt(
            &config,
            &endpoint,
            provider.as_ref(),
            &subscription,
            &filter,
            &events,
            &mut commands,
        )
        .await;

        if reached_ready {
            backoff = config.initial_backoff;
        }

        if !emit(&events, ChannelEvent::State(ConnectionState::Disconnected)) {
            return;
        }

        match outcome {
            Attempt::Shutdown => return,
            Attempt::Reconnect => {
                backoff = config.initial_backoff;
                continue;
            }
            Attempt::Lost(reason) => {
                log::warn!(
                    "Connection attempt {generation} for {} ended: {reason}",
                    subscription.conversation_id()
                );
                if let ChannelError::AuthRejected(_) = reason {
                    // Let the provider refresh before the retry fetches
                    // its token.
                    provider.auth_rejected().await;
                }
            }
        }

        let wait = backoff + Duration::from_millis(rand::random::<u64>() % BACKOFF_JITTER_MS);
        log::info!(
            "Reconnecting to {} in {:.1}s",
            subscription.conversation_id(),
            wait.as_secs_f32()
        );

        tokio::select! {
            _ = tokio::time::sleep(wait) => {}
            cmd = commands.recv() => match cmd {
                Some(SessionCommand::Reconnect) => {
                    backoff = config.initial_backoff;
                    continue;
                }
                // Already settled at Disconnected above.
                Some(SessionCommand::Shutdown) | None => return,
            }
        }

        backoff = (backoff * 2).min(config.max_backoff);
    }
}

/// One full connection attempt: handshake, subscribe, then the message
/// loop. Returns the outcome plus whether Ready was reached (which
/// resets the backoff).
async fn run_attempt(
    config: &ChannelConfig,
    endpoint: &str,
    provider: &dyn CredentialProvider,
    subscription: &Subscription,
    filter: &DeliveryFilter,
    events: &mpsc::UnboundedSender<ChannelEvent>,
    commands: &mut mpsc::UnboundedReceiver<SessionCommand>,
) -> (Attempt, bool) {
    if !emit(events, ChannelEvent::State(ConnectionState::Connecting)) {
        return (Attempt::Shutdown, false);
    }

    // Fresh token once per attempt; the provider owns caching/refresh.
    let token = match provider.bearer_token().await {
        Ok(t) => t,
        Err(e) => {
            return (
                Attempt::Lost(ChannelError::Transport(format!("credential provider: {e:#}"))),
                false,
            )
        }
    };

    let offer = HeartBeat::from_durations(config.heartbeat_send, config.heartbeat_recv);

    // The handshake races the command channel so close() stays
    // responsive while we wait on the broker.
    let handshake = tokio::time::timeout(config.connect_timeout, async {
        let (mut writer, mut reader) = ws::connect(endpoint)
            .await
            .map_err(|e| ChannelError::Transport(format!("{e:#}")))?;
        writer
            .send_text(&Frame::connect(&token, offer).encode())
            .await
            .map_err(|e| ChannelError::Transport(format!("{e:#}")))?;
        let heart_beat = await_connected(&mut reader).await?;
        Ok::<_, ChannelError>((writer, reader, heart_beat))
    });

    let (mut writer, mut reader, server_heart_beat) = tokio::select! {
        result = handshake => match result {
            Ok(Ok(parts)) => parts,
            Ok(Err(e)) => return (Attempt::Lost(e), false),
            Err(_) => {
                return (
                    Attempt::Lost(ChannelError::Transport("connect handshake timed out".into())),
                    false,
                )
            }
        },
        cmd = commands.recv() => match cmd {
            Some(SessionCommand::Reconnect) => return (Attempt::Reconnect, false),
            Some(SessionCommand::Shutdown) | None => return (Attempt::Shutdown, false),
        },
    };

    if !emit(events, ChannelEvent::State(ConnectionState::Connected)) {
        return (Attempt::Shutdown, false);
    }

    let negotiated = offer.negotiate(server_heart_beat);
    log::debug!(
        "Connected to {endpoint}; heart-beat out={:?} in={:?}",
        negotiated.outgoing,
        negotiated.incoming
    );

    let subscribe = Frame::subscribe(
        &subscription.id(),
        &subscription.topic(),
        &subscription.receipt_id(),
    );
    if let Err(e) = writer.send_text(&subscribe.encode()).await {
        return (Attempt::Lost(ChannelError::Transport(format!("{e:#}"))), false);
    }
    if !emit(events, ChannelEvent::State(ConnectionState::Subscribing)) {
        return (Attempt::Shutdown, false);
    }

    message_loop(
        subscription,
        filter,
        negotiated.outgoing,
        negotiated.incoming.map(|d| d * STALENESS_MULTIPLIER),
        &mut writer,
        &mut reader,
        events,
        commands,
    )
    .await
}

/// Wait for the broker's answer to CONNECT. An ERROR here is an
/// authentication rejection; anything else unexpected is a protocol
/// error.
async fn await_connected(reader: &mut WsReader) -> Result<Option<HeartBeat>, ChannelError> {
    loop {
        match reader.recv().await {
            Some(Ok(WsMessage::Text(text))) => match frame::parse(&text) {
                ServerFrame::Connected { heart_beat } => return Ok(heart_beat),
                ServerFrame::HeartBeat => continue,
                ServerFrame::Error { message } => return Err(ChannelError::AuthRejected(message)),
                ServerFrame::Malformed(reason) => return Err(ChannelError::Protocol(reason)),
                other => {
                    return Err(ChannelError::Protocol(format!(
                        "expected CONNECTED, got {other:?}"
                    )))
                }
            },
            Some(Ok(WsMessage::Ping(_))) => continue,
            Some(Ok(WsMessage::Close { code, reason })) => {
                return Err(ChannelError::Transport(format!(
                    "closed during handshake ({code}): {reason}"
                )))
            }
            Some(Err(e)) => return Err(ChannelError::Transport(format!("{e:#}"))),
            None => return Err(ChannelError::Transport("stream ended during handshake".into())),
        }
    }
}

/// Steady-state loop: deliver messages, exchange heart-beats, watch for
/// staleness, obey commands.
#[allow(clippy::too_many_arguments)]
async fn message_loop(
    subscription: &Subscription,
    filter: &DeliveryFilter,
    heartbeat_out: Option<Duration>,
    stale_after: Option<Duration>,
    writer: &mut WsWriter,
    reader: &mut WsReader,
    events: &mpsc::UnboundedSender<ChannelEvent>,
    commands: &mut mpsc::UnboundedReceiver<SessionCommand>,
) -> (Attempt, bool) {
    // Inactive timers still need an interval for select!; park them on
    // an hour so they effectively never fire.
    const PARKED: Duration = Duration::from_secs(3600);

    let mut reached_ready = false;
    let mut last_activity = Instant::now();

    let mut beat_tick = tokio::time::interval(heartbeat_out.unwrap_or(PARKED));
    beat_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    beat_tick.reset();

    let stale_check = stale_after.map_or(PARKED, |d| d / STALENESS_MULTIPLIER);
    let mut stale_tick = tokio::time::interval(stale_check);
    stale_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    stale_tick.reset();

    loop {
        tokio::select! {
            cmd = commands.recv() => match cmd {
                Some(SessionCommand::Reconnect) => {
                    return (Attempt::Reconnect, reached_ready);
                }
                Some(SessionCommand::Shutdown) | None => {
                    // Best effort: the broker forgets us either way when
                    // the socket drops.
                    let _ = writer.send_text(&Frame::unsubscribe(&subscription.id()).encode()).await;
                    let _ = writer.send_text(&Frame::disconnect().encode()).await;
                    let _ = writer.close().await;
                    return (Attempt::Shutdown, reached_ready);
                }
            },

            inbound = reader.recv() => match inbound {
                Some(Ok(WsMessage::Text(text))) => {
                    last_activity = Instant::now();
                    match handle_frame(&text, subscription, filter, events, &mut reached_ready) {
                        Ok(()) => {}
                        Err(e) => return (Attempt::Lost(e), reached_ready),
                    }
                }
                Some(Ok(WsMessage::Ping(data))) => {
                    last_activity = Instant::now();
                    if let Err(e) = writer.send_pong(data).await {
                        return (Attempt::Lost(ChannelError::Transport(format!("{e:#}"))), reached_ready);
                    }
                }
                Some(Ok(WsMessage::Close { code, reason })) => {
                    return (
                        Attempt::Lost(ChannelError::Transport(format!("closed by broker ({code}): {reason}"))),
                        reached_ready,
                    );
                }
                Some(Err(e)) => {
                    return (Attempt::Lost(ChannelError::Transport(format!("{e:#}"))), reached_ready);
                }
                None => {
                    return (Attempt::Lost(ChannelError::Transport("stream ended".into())), reached_ready);
                }
            },

            _ = beat_tick.tick(), if heartbeat_out.is_some() => {
                if let Err(e) = writer.send_text(HEARTBEAT_FRAME).await {
                    return (Attempt::Lost(ChannelError::Transport(format!("{e:#}"))), reached_ready);
                }
            }

            _ = stale_tick.tick(), if stale_after.is_some() => {
                if let Some(limit) = stale_after {
                    if last_activity.elapsed() > limit {
                        return (
                            Attempt::Lost(ChannelError::Transport(format!(
                                "no broker activity for {:?}", last_activity.elapsed()
                            ))),
                            reached_ready,
                        );
                    }
                }
            }
        }
    }
}

/// Classify and act on one decoded broker frame. `Err` means the
/// connection must be abandoned; local recoveries (stale generations,
/// undecodable payloads, self-echo) return `Ok`.
fn handle_frame(
    text: &str,
    subscription: &Subscription,
    filter: &DeliveryFilter,
    events: &mpsc::UnboundedSender<ChannelEvent>,
    reached_ready: &mut bool,
) -> Result<(), ChannelError> {
    match frame::parse(text) {
        ServerFrame::HeartBeat => Ok(()),
        ServerFrame::Receipt { receipt_id } => {
            if subscription.confirmed_by(&receipt_id) {
                *reached_ready = true;
                if !emit(events, ChannelEvent::State(ConnectionState::Ready)) {
                    return Err(ChannelError::Closed);
                }
            } else {
                log::debug!("Ignoring receipt {receipt_id} for a previous generation");
            }
            Ok(())
        }
        ServerFrame::Message { subscription: sub_id, body, .. } => {
            if !subscription.owns(&sub_id) {
                log::debug!("Discarding frame for stale subscription {sub_id}");
                return Ok(());
            }
            match serde_json::from_str::<ChatMessage>(&body) {
                Ok(message) => {
                    if filter.admit(&message) {
                        if !emit(events, ChannelEvent::Message(message)) {
                            return Err(ChannelError::Closed);
                        }
                    } else {
                        log::debug!("Dropping self-echo {}", message.id);
                    }
                    Ok(())
                }
                Err(e) => {
                    // One bad payload must not take the stream down.
                    log::warn!("{}", ChannelError::Decode(e.to_string()));
                    Ok(())
                }
            }
        }
        ServerFrame::Error { message } => Err(ChannelError::Protocol(message)),
        ServerFrame::Malformed(reason) => Err(ChannelError::Protocol(reason)),
        ServerFrame::Connected { .. } => {
            Err(ChannelError::Protocol("unexpected CONNECTED frame".into()))
        }
    }
}

/// Send an event; false means the consumer is gone and the session
/// should wind down.
fn emit(events: &mpsc::UnboundedSender<ChannelEvent>, event: ChannelEvent) -> bool {
    events.send(event).is_ok()
}
