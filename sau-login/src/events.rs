//! Progress events and the per-run event channel
//!
//! Each login run owns exactly one [`EventSender`]; the HTTP handler owns the
//! matching [`EventReceiver`]. The sender can only emit a terminal event by
//! being consumed ([`EventSender::finish`]), and emits a failure terminal on
//! drop if the run never finished, so every stream ends with exactly one
//! terminal event.

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::debug;

/// What a finished run amounts to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    Success,
    /// Browser login worked but the account name was already registered
    AlreadyExists,
    Launch,
    Navigation,
    QrNotFound,
    QrCapture,
    ScanTimeout,
    Verification,
    Persistence,
    Storage,
    Cancelled,
    Browser,
    Internal,
}

impl OutcomeKind {
    /// Terminal code sent as the last stream payload
    pub fn code(self) -> TerminalCode {
        match self {
            OutcomeKind::Success => TerminalCode::Success,
            OutcomeKind::AlreadyExists => TerminalCode::AlreadyExists,
            _ => TerminalCode::Failure,
        }
    }
}

/// Final status code of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalCode {
    Success,
    Failure,
    AlreadyExists,
}

impl TerminalCode {
    pub fn as_str(self) -> &'static str {
        match self {
            TerminalCode::Success => "200",
            TerminalCode::Failure => "500",
            TerminalCode::AlreadyExists => "409",
        }
    }
}

impl Serialize for TerminalCode {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Structured result carried by the terminal event
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Outcome {
    pub code: TerminalCode,
    pub kind: OutcomeKind,
    pub message: String,
}

impl Outcome {
    pub fn new(kind: OutcomeKind, message: impl Into<String>) -> Self {
        Self {
            code: kind.code(),
            kind,
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.kind == OutcomeKind::Success
    }
}

/// One unit pushed through the event channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    /// Human-readable status line
    Message(String),
    /// QR code screenshot, base64-encoded PNG
    QrImage(String),
    /// Last event of every run
    Terminal(Outcome),
}

impl ProgressEvent {
    /// Text sent as the `data:` field of the server-sent event
    pub fn payload(&self) -> String {
        match self {
            ProgressEvent::Message(text) => text.clone(),
            ProgressEvent::QrImage(png_base64) => format!("data:image/png;base64,{}", png_base64),
            ProgressEvent::Terminal(outcome) => outcome.code.as_str().to_string(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ProgressEvent::Terminal(_))
    }
}

/// Create the channel for one run
pub fn channel() -> (EventSender, EventReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (EventSender { tx: Some(tx) }, EventReceiver { rx })
}

/// Producer half, owned by the login run
pub struct EventSender {
    tx: Option<mpsc::UnboundedSender<ProgressEvent>>,
}

impl EventSender {
    pub fn message(&self, text: impl Into<String>) {
        self.send(ProgressEvent::Message(text.into()));
    }

    pub fn qr_image(&self, png_base64: String) {
        self.send(ProgressEvent::QrImage(png_base64));
    }

    /// Emit the terminal event; nothing can be sent afterwards
    pub fn finish(mut self, outcome: Outcome) {
        if let Some(tx) = self.tx.take() {
            if tx.send(ProgressEvent::Terminal(outcome)).is_err() {
                debug!("Event consumer gone before terminal event");
            }
        }
    }

    /// True once the consumer has dropped its receiver
    pub fn is_closed(&self) -> bool {
        self.tx.as_ref().map_or(true, |tx| tx.is_closed())
    }

    fn send(&self, event: ProgressEvent) {
        if let Some(tx) = &self.tx {
            if tx.send(event).is_err() {
                debug!("Event consumer gone, dropping progress event");
            }
        }
    }
}

impl Drop for EventSender {
    fn drop(&mut self) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(ProgressEvent::Terminal(Outcome::new(
                OutcomeKind::Internal,
                "Login run ended unexpectedly",
            )));
        }
    }
}

/// Consumer half, owned by the streaming response
pub struct EventReceiver {
    rx: mpsc::UnboundedReceiver<ProgressEvent>,
}

impl EventReceiver {
    /// Next event; `None` once the run is over and everything was drained
    pub async fn recv(&mut self) -> Option<ProgressEvent> {
        self.rx.recv().await
    }

    /// Drain everything up to and including the terminal event
    pub async fn collect(mut self) -> Vec<ProgressEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.rx.recv().await {
            let terminal = event.is_terminal();
            events.push(event);
            if terminal {
                break;
            }
        }
        events
    }
}
