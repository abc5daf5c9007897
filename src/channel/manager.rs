//! Channel manager facade.
//!
//! Public entry point for the UI layer. Owns at most one live session
//! at a time: attaching to a conversation while another is active tears
//! the old one down completely before the new attempt begins, so no
//! event for the old conversation can surface after `attach` returns.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::session::{self, SessionCommand};
use super::ChannelEvent;
use crate::auth::CredentialProvider;
use crate::config::ChannelConfig;

/// Handle to an attached conversation, yielding its event stream.
///
/// Events arrive in occurrence order: state transitions exactly as they
/// happen, messages exactly as the broker delivered them (minus
/// self-echo). Dropping the handle ends delivery; the session notices
/// and winds down on its own.
#[derive(Debug)]
pub struct ConversationHandle {
    id: u64,
    conversation_id: String,
    events: mpsc::UnboundedReceiver<ChannelEvent>,
}

impl ConversationHandle {
    /// The conversation this handle is attached to.
    #[must_use]
    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    /// Receive the next event, or `None` once the session has exited.
    pub async fn recv(&mut self) -> Option<ChannelEvent> {
        self.events.recv().await
    }

    /// Non-blocking receive for UI polling loops.
    pub fn try_recv(&mut self) -> Option<ChannelEvent> {
        self.events.try_recv().ok()
    }
}

/// Owns the one active session and its teardown.
#[derive(Debug)]
struct ActiveSession {
    handle_id: u64,
    commands: mpsc::UnboundedSender<SessionCommand>,
    task: JoinHandle<()>,
}

/// Facade over the session engine: attach, detach, reconnect.
#[derive(Debug, Default)]
pub struct ChannelManager {
    next_handle_id: u64,
    active: Option<ActiveSession>,
}

impl ChannelManager {
    /// New manager with no active conversation.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach to a conversation, tearing down any previous one first.
    ///
    /// Returns immediately; connection progress arrives on the handle's
    /// event stream. By the time this returns, no event for a
    /// previously attached conversation will be emitted again.
    pub async fn attach(
        &mut self,
        config: ChannelConfig,
        provider: Arc<dyn CredentialProvider>,
    ) -> ConversationHandle {
        self.teardown_active().await;

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();

        let conversation_id = config.conversation_id.clone();
        let task = tokio::spawn(session::run(config, provider, events_tx, commands_rx));

        self.next_handle_id += 1;
        let id = self.next_handle_id;
        self.active = Some(ActiveSession {
            handle_id: id,
            commands: commands_tx,
            task,
        });

        log::info!("Attached to conversation {conversation_id}");
        ConversationHandle {
            id,
            conversation_id,
            events: events_rx,
        }
    }

    /// Detach a conversation, shutting its session down cleanly.
    ///
    /// After this returns no further event for the handle's
    /// conversation is delivered anywhere. Stale handles from an
    /// earlier attach are ignored.
    pub async fn detach(&mut self, handle: ConversationHandle) {
        let matches = self
            .active
            .as_ref()
            .is_some_and(|a| a.handle_id == handle.id);
        if matches {
            self.teardown_active().await;
            log::info!("Detached from conversation {}", handle.conversation_id);
        }
        // Handle (and its event receiver) drops here either way.
    }

    /// Ask the active session to retry now, resetting its backoff.
    ///
    /// Returns false if nothing is attached.
    pub fn reconnect(&self) -> bool {
        match &self.active {
            Some(active) => active.commands.send(SessionCommand::Reconnect).is_ok(),
            None => false,
        }
    }

    /// Whether a conversation is currently attached.
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.active.is_some()
    }

    /// Shut down the active session and wait for its task to finish.
    async fn teardown_active(&mut self) {
        let Some(active) = self.active.take() else {
            return;
        };
        // Send may fail if the session already exited; awaiting the
        // task is what guarantees no further events.
        let _ = active.commands.send(SessionCommand::Shutdown);
        if let Err(e) = active.task.await {
            log::warn!("Session task ended abnormally: {e}");
        }
    }
}

impl Drop for ChannelManager {
    fn drop(&mut self) {
        if let Some(active) = self.active.take() {
            let _ = active.commands.send(SessionCommand::Shutdown);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::StaticToken;
    use crate::channel::ConnectionState;
    use std::time::Duration;

    fn test_config(endpoint: &str) -> ChannelConfig {
        let mut cfg = ChannelConfig::new(endpoint, "match-1", "user-1");
        cfg.connect_timeout = Duration::from_millis(500);
        cfg.initial_backoff = Duration::from_millis(50);
        cfg.max_backoff = Duration::from_millis(200);
        cfg
    }

    #[tokio::test]
    async fn test_attach_reports_connecting_first() {
        let mut manager = ChannelManager::new();
        let mut handle = manager
            .attach(test_config("ws://127.0.0.1:1/ws"), Arc::new(StaticToken::new("t")))
            .await;

        let first = tokio::time::timeout(Duration::from_secs(1), handle.recv())
            .await
            .expect("timed out")
            .expect("stream ended");
        assert_eq!(first, ChannelEvent::State(ConnectionState::Connecting));

        manager.detach(handle).await;
        assert!(!manager.is_attached());
    }

    #[tokio::test]
    async fn test_invalid_endpoint_fails_terminally() {
        let mut manager = ChannelManager::new();
        let mut handle = manager
            .attach(test_config("not a url"), Arc::new(StaticToken::new("t")))
            .await;

        let first = tokio::time::timeout(Duration::from_secs(1), handle.recv())
            .await
            .expect("timed out")
            .expect("stream ended");
        assert!(matches!(first, ChannelEvent::State(ConnectionState::Failed(_))));

        manager.detach(handle).await;
    }

    #[tokio::test]
    async fn test_detach_ignores_stale_handle() {
        let mut manager = ChannelManager::new();
        let stale = manager
            .attach(test_config("ws://127.0.0.1:1/ws"), Arc::new(StaticToken::new("t")))
            .await;
        let live = manager
            .attach(test_config("ws://127.0.0.1:1/ws"), Arc::new(StaticToken::new("t")))
            .await;

        // Stale handle must not tear down the live session.
        manager.detach(stale).await;
        assert!(manager.is_attached());

        manager.detach(live).await;
        assert!(!manager.is_attached());
    }

    #[tokio::test]
    async fn test_reconnect_without_attachment() {
        let manager = ChannelManager::new();
        assert!(!manager.reconnect());
    }
}
