//! WebSocket transport for the channel engine.
//!
//! Thin wrapper around `tokio-tungstenite` providing type-isolated
//! reader/writer halves. The session drives this module and never
//! touches tungstenite types directly, so transport concerns (TLS
//! config, proxies, timeouts) stay in one place.
//!
//! Authentication does not happen here: the bearer credential rides in
//! the STOMP CONNECT frame, which is what the broker's auth interceptor
//! inspects.

use anyhow::{Context, Result};
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite;

/// Concrete WebSocket stream type (avoids repeating the generic everywhere).
type WsStream = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

/// Received WebSocket message, reduced to what the session cares about.
#[derive(Debug)]
pub enum WsMessage {
    /// UTF-8 text frame (STOMP frames and heart-beats arrive as text).
    Text(String),
    /// Ping frame with payload; the session answers with a pong.
    Ping(Vec<u8>),
    /// Close frame with status code and reason.
    Close {
        /// WebSocket close code (1000 = normal, 1005 = no code).
        code: u16,
        /// Human-readable close reason.
        reason: String,
    },
}

/// Write half of a WebSocket connection.
#[derive(Debug)]
pub struct WsWriter {
    sink: futures_util::stream::SplitSink<WsStream, tungstenite::Message>,
}

impl WsWriter {
    /// Send a UTF-8 text frame.
    ///
    /// # Errors
    ///
    /// Returns an error if the send fails (connection closed, I/O error).
    pub async fn send_text(&mut self, text: &str) -> Result<()> {
        self.sink
            .send(tungstenite::Message::Text(text.to_string()))
            .await
            .context("WebSocket send_text failed")
    }

    /// Send a pong frame in response to a ping.
    ///
    /// # Errors
    ///
    /// Returns an error if the send fails.
    pub async fn send_pong(&mut self, data: Vec<u8>) -> Result<()> {
        self.sink
            .send(tungstenite::Message::Pong(data))
            .await
            .context("WebSocket send_pong failed")
    }

    /// Flush pending writes and close the sink.
    ///
    /// # Errors
    ///
    /// Returns an error if closing fails.
    pub async fn close(&mut self) -> Result<()> {
        self.sink.close().await.context("WebSocket close failed")
    }
}

/// Read half of a WebSocket connection.
#[derive(Debug)]
pub struct WsReader {
    stream: futures_util::stream::SplitStream<WsStream>,
}

impl WsReader {
    /// Receive the next message, returning `None` when the stream ends.
    ///
    /// Binary, pong, and raw frame variants are skipped internally; the
    /// broker only ever sends text.
    pub async fn recv(&mut self) -> Option<Result<WsMessage>> {
        loop {
            match self.stream.next().await {
                Some(Ok(tungstenite::Message::Text(text))) => {
                    return Some(Ok(WsMessage::Text(text.to_string())));
                }
                Some(Ok(tungstenite::Message::Ping(data))) => {
                    return Some(Ok(WsMessage::Ping(data.to_vec())));
                }
                Some(Ok(tungstenite::Message::Close(close_frame))) => {
                    let (code, reason) = close_frame
                        .map(|cf| (cf.code.into(), cf.reason.to_string()))
                        .unwrap_or((1005, String::new()));
                    return Some(Ok(WsMessage::Close { code, reason }));
                }
                Some(Ok(_)) => {
                    // Binary / pong / raw frames — skip
                    continue;
                }
                Some(Err(e)) => {
                    return Some(Err(anyhow::anyhow!("WebSocket read error: {e}")));
                }
                None => return None,
            }
        }
    }
}

/// Connect to a broker WebSocket URL.
///
/// Performs the upgrade handshake and returns split (writer, reader)
/// halves for independent use in `tokio::select!` loops.
///
/// # Errors
///
/// Returns an error if the URL is invalid or the handshake fails.
pub async fn connect(url: &str) -> Result<(WsWriter, WsReader)> {
    use tungstenite::client::IntoClientRequest;

    let request = url
        .into_client_request()
        .with_context(|| format!("invalid WebSocket URL: {url}"))?;

    let (ws_stream, _response) = tokio_tungstenite::connect_async(request)
        .await
        .context("WebSocket connect failed")?;

    let (sink, stream) = ws_stream.split();

    Ok((WsWriter { sink }, WsReader { stream }))
}

/// Check that a URL can form a WebSocket client request at all.
///
/// Used to distinguish a hopeless endpoint (terminal failure) from a
/// transient connect error (retryable).
///
/// # Errors
///
/// Returns an error if the URL cannot be turned into a handshake request.
pub fn validate_url(url: &str) -> Result<()> {
    use tungstenite::client::IntoClientRequest;

    url.into_client_request()
        .map(|_| ())
        .with_context(|| format!("invalid WebSocket URL: {url}"))
}

/// Convert an HTTP(S) endpoint URL to WS(S) scheme.
///
/// Passes `ws://` and `wss://` through unchanged; the app config stores
/// the broker endpoint as an `http(s)` URL.
#[must_use]
pub fn http_to_ws_scheme(url: &str) -> String {
    if url.starts_with("wss://") || url.starts_with("ws://") {
        url.to_string()
    } else {
        url.replace("https://", "wss://")
            .replace("http://", "ws://")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_to_ws_scheme_https() {
        assert_eq!(http_to_ws_scheme("https://broker.example"), "wss://broker.example");
    }

    #[test]
    fn test_http_to_ws_scheme_http() {
        assert_eq!(http_to_ws_scheme("http://localhost:8080/ws"), "ws://localhost:8080/ws");
    }

    #[test]
    fn test_http_to_ws_scheme_ws_passthrough() {
        assert_eq!(http_to_ws_scheme("ws://localhost:8080/ws"), "ws://localhost:8080/ws");
    }

    #[test]
    fn test_http_to_ws_scheme_wss_passthrough() {
        assert_eq!(http_to_ws_scheme("wss://broker.example/ws"), "wss://broker.example/ws");
    }

    #[test]
    fn test_validate_url() {
        assert!(validate_url("ws://localhost:8080/ws").is_ok());
        assert!(validate_url("not-a-url").is_err());
    }

    #[tokio::test]
    async fn test_connect_invalid_url_returns_error() {
        let result = connect("not-a-url").await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_connect_unreachable_host_returns_error() {
        let result = connect("ws://127.0.0.1:1/ws").await;
        assert!(result.is_err());
    }
}
