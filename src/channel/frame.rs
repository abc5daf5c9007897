//! STOMP 1.2 frame codec.
//!
//! Wire format:
//!
//! ```text
//! COMMAND\n
//! header:value\n
//! ...\n
//! \n
//! body\0
//! ```
//!
//! Heart-beats are a bare EOL instead of a frame. Header values are
//! escaped (`\n` → `\\n`, `:` → `\\c`, `\\` → `\\\\`) on every command
//! except CONNECT/CONNECTED, per the STOMP 1.2 rules.
//!
//! Decoding is total: [`parse`] never panics and never returns a Rust
//! error. Input that is not a well-formed STOMP frame yields
//! [`ServerFrame::Malformed`], so one corrupt frame cannot kill the
//! session's read loop.

use std::time::Duration;

/// A client-to-broker frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// STOMP command (CONNECT, SUBSCRIBE, ...).
    pub command: &'static str,
    /// Header name/value pairs in send order.
    pub headers: Vec<(String, String)>,
    /// Frame body; empty for every frame this client sends.
    pub body: String,
}

impl Frame {
    /// CONNECT frame carrying the bearer credential and heart-beat offer.
    ///
    /// The broker's auth interceptor reads the `Authorization` native
    /// header off this frame, so the token goes here rather than on the
    /// HTTP upgrade.
    pub fn connect(token: &str, heartbeat: HeartBeat) -> Self {
        Self {
            command: "CONNECT",
            headers: vec![
                ("accept-version".into(), "1.2".into()),
                ("heart-beat".into(), heartbeat.header_value()),
                ("Authorization".into(), format!("Bearer {token}")),
            ],
            body: String::new(),
        }
    }

    /// SUBSCRIBE frame with a receipt request.
    ///
    /// The `receipt` header obliges the broker to answer with RECEIPT,
    /// which is what moves the session from Subscribing to Ready.
    pub fn subscribe(id: &str, destination: &str, receipt: &str) -> Self {
        Self {
            command: "SUBSCRIBE",
            headers: vec![
                ("id".into(), id.into()),
                ("destination".into(), destination.into()),
                ("receipt".into(), receipt.into()),
                ("ack".into(), "auto".into()),
            ],
            body: String::new(),
        }
    }

    /// UNSUBSCRIBE frame for a subscription id.
    pub fn unsubscribe(id: &str) -> Self {
        Self {
            command: "UNSUBSCRIBE",
            headers: vec![("id".into(), id.into())],
            body: String::new(),
        }
    }

    /// DISCONNECT frame for a clean close.
    pub fn disconnect() -> Self {
        Self {
            command: "DISCONNECT",
            headers: Vec::new(),
            body: String::new(),
        }
    }

    /// Encode to the wire representation, NUL-terminated.
    #[must_use]
    pub fn encode(&self) -> String {
        // CONNECT headers travel unescaped per STOMP 1.2.
        let escape_headers = self.command != "CONNECT";
        let mut out = String::with_capacity(64 + self.body.len());
        out.push_str(self.command);
        out.push('\n');
        for (name, value) in &self.headers {
            if escape_headers {
                out.push_str(&escape(name));
                out.push(':');
                out.push_str(&escape(value));
            } else {
                out.push_str(name);
                out.push(':');
                out.push_str(value);
            }
            out.push('\n');
        }
        out.push('\n');
        out.push_str(&self.body);
        out.push('\0');
        out
    }
}

/// The single-EOL heart-beat frame.
pub const HEARTBEAT_FRAME: &str = "\n";

/// Heart-beat intervals one side offers: what it can send and what it
/// wants to receive, in that order (the `heart-beat` header layout).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeartBeat {
    /// Smallest interval this side can guarantee between its beats (ms).
    /// Zero means it will not send beats.
    pub send_ms: u64,
    /// Desired interval for the other side's beats (ms). Zero means
    /// beats are not wanted.
    pub recv_ms: u64,
}

/// Effective heart-beat timing after exchanging offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NegotiatedHeartBeat {
    /// Interval at which we must send beats, if any.
    pub outgoing: Option<Duration>,
    /// Interval at which the broker promises beats, if any. Staleness
    /// detection keys off a multiple of this.
    pub incoming: Option<Duration>,
}

impl HeartBeat {
    /// Build an offer from configured durations.
    #[must_use]
    pub fn from_durations(send: Duration, recv: Duration) -> Self {
        Self {
            send_ms: send.as_millis() as u64,
            recv_ms: recv.as_millis() as u64,
        }
    }

    /// Render as a `heart-beat` header value.
    #[must_use]
    pub fn header_value(&self) -> String {
        format!("{},{}", self.send_ms, self.recv_ms)
    }

    /// Apply the STOMP negotiation rules against the broker's offer.
    ///
    /// Each direction is active only if both sides enable it, at the
    /// slower of the two intervals. A missing server header disables
    /// heart-beats entirely (treated as `0,0`).
    #[must_use]
    pub fn negotiate(&self, server: Option<HeartBeat>) -> NegotiatedHeartBeat {
        let server = server.unwrap_or(HeartBeat { send_ms: 0, recv_ms: 0 });
        let outgoing = if self.send_ms > 0 && server.recv_ms > 0 {
            Some(Duration::from_millis(self.send_ms.max(server.recv_ms)))
        } else {
            None
        };
        let incoming = if self.recv_ms > 0 && server.send_ms > 0 {
            Some(Duration::from_millis(self.recv_ms.max(server.send_ms)))
        } else {
            None
        };
        NegotiatedHeartBeat { outgoing, incoming }
    }

    fn parse_header(value: &str) -> Option<Self> {
        let (sx, sy) = value.split_once(',')?;
        Some(Self {
            send_ms: sx.trim().parse().ok()?,
            recv_ms: sy.trim().parse().ok()?,
        })
    }
}

/// A broker-to-client frame, decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerFrame {
    /// Connect acknowledgement, with the broker's heart-beat offer.
    Connected {
        /// Broker's `heart-beat` header, if present.
        heart_beat: Option<HeartBeat>,
    },
    /// Message delivery on a subscription.
    Message {
        /// `subscription` header: the client-chosen subscription id.
        subscription: String,
        /// `destination` header: the topic the message was published to.
        destination: String,
        /// Raw body (JSON payload).
        body: String,
    },
    /// Receipt for a client frame that requested one.
    Receipt {
        /// `receipt-id` header, echoing the client's `receipt` value.
        receipt_id: String,
    },
    /// Broker-reported error; the connection is dead after this.
    Error {
        /// `message` header when present, otherwise the body.
        message: String,
    },
    /// Bare EOL keep-alive.
    HeartBeat,
    /// Input that is not a well-formed STOMP frame. Carries a reason
    /// for logging; the session decides whether to drop or reconnect.
    Malformed(String),
}

/// Decode one inbound text frame. Total: malformed input becomes
/// [`ServerFrame::Malformed`], never a panic or error.
#[must_use]
pub fn parse(text: &str) -> ServerFrame {
    // Heart-beats are EOL-only frames.
    if text.is_empty() || text == "\n" || text == "\r\n" {
        return ServerFrame::HeartBeat;
    }

    // Strip the NUL terminator (and any trailing EOLs some brokers add).
    let text = text.trim_end_matches(['\n', '\r']);
    let text = text.strip_suffix('\0').unwrap_or(text);

    let mut lines = text.split('\n');
    let command = match lines.next() {
        Some(c) => c.trim_end_matches('\r'),
        None => return ServerFrame::Malformed("empty frame".into()),
    };

    let unescape_headers = command != "CONNECTED";
    let mut headers: Vec<(String, String)> = Vec::new();
    let mut saw_blank = false;
    let mut body = String::new();
    let mut rest: Vec<&str> = Vec::new();
    for line in lines.by_ref() {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if line.is_empty() {
            saw_blank = true;
            break;
        }
        let Some((name, value)) = line.split_once(':') else {
            return ServerFrame::Malformed(format!("header without colon: {line:?}"));
        };
        // First occurrence of a repeated header wins, per STOMP.
        if headers.iter().any(|(n, _)| n == name) {
            continue;
        }
        if unescape_headers {
            let (Some(name), Some(value)) = (unescape(name), unescape(value)) else {
                return ServerFrame::Malformed(format!("bad header escape: {line:?}"));
            };
            headers.push((name, value));
        } else {
            headers.push((name.to_string(), value.to_string()));
        }
    }
    if !saw_blank {
        return ServerFrame::Malformed(format!("{command} frame missing header terminator"));
    }
    for line in lines {
        rest.push(line);
    }
    if !rest.is_empty() {
        body = rest.join("\n");
        if let Some(stripped) = body.split_once('\0') {
            body = stripped.0.to_string();
        }
    }

    let header = |name: &str| {
        headers
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.clone())
    };

    match command {
        "CONNECTED" => ServerFrame::Connected {
            heart_beat: header("heart-beat").and_then(|v| HeartBeat::parse_header(&v)),
        },
        "MESSAGE" => {
            let Some(subscription) = header("subscription") else {
                return ServerFrame::Malformed("MESSAGE missing subscription header".into());
            };
            let Some(destination) = header("destination") else {
                return ServerFrame::Malformed("MESSAGE missing destination header".into());
            };
            ServerFrame::Message {
                subscription,
                destination,
                body,
            }
        }
        "RECEIPT" => match header("receipt-id") {
            Some(receipt_id) => ServerFrame::Receipt { receipt_id },
            None => ServerFrame::Malformed("RECEIPT missing receipt-id header".into()),
        },
        "ERROR" => ServerFrame::Error {
            message: header("message").unwrap_or(body),
        },
        other => ServerFrame::Malformed(format!("unknown command: {other:?}")),
    }
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            ':' => out.push_str("\\c"),
            _ => out.push(c),
        }
    }
    out
}

fn unescape(s: &str) -> Option<String> {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('c') => out.push(':'),
            // Undefined escape sequences are fatal per STOMP 1.2.
            _ => return None,
        }
    }
    Some(out)
}
