//! Cross-context message protocol.
//!
//! Content, overlay and background contexts share no memory; they exchange the
//! messages defined here. [`Message`] is a closed union: every variant has an
//! explicit direction and an explicit authentication rule in [`InboundGate`],
//! and unknown `type` tags fail to decode.

use crate::error::ErrorReport;
use crate::replace::ConfirmationRequest;
use crate::session::{FrameMetrics, SessionToken, validate};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity of one messaging endpoint (a window or frame).
///
/// Compared by exact value, the way a message source is compared by reference
/// rather than by origin string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EndpointId(Uuid);

impl EndpointId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EndpointId {
    fn default() -> Self {
        Self::new()
    }
}

/// A rewrite that came back from the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImproveResult {
    pub text: String,
    pub latency_ms: u64,
    #[serde(default)]
    pub cached: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Error,
}

/// Transient message shown by the overlay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

/// User actions the overlay asks the content context to perform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum OverlayAction {
    Replace { text: String },
    ReplaceConfirmed { text: String },
    Undo,
    Close,
    Position { left: i32, top: i32 },
    Resize { width: i32, height: i32 },
    Regenerate,
}

/// Protocol envelope between the content context and the overlay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Message {
    /// Handshake (overlay -> content) and its acknowledgement (content -> overlay).
    OverlayInit {
        token: SessionToken,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        frame: Option<FrameMetrics>,
    },
    SelectionText {
        token: SessionToken,
        text: String,
    },
    ImproveResponse {
        token: SessionToken,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        result: Option<ImproveResult>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<ErrorReport>,
    },
    OverlayFrame {
        token: SessionToken,
        frame: FrameMetrics,
    },
    /// A large replacement is waiting for explicit confirmation.
    OverlayConfirm {
        token: SessionToken,
        request: ConfirmationRequest,
    },
    OverlayNotice {
        token: SessionToken,
        notice: Notice,
    },
    OverlayAction {
        token: SessionToken,
        #[serde(flatten)]
        action: OverlayAction,
    },
}

/// Which context sent a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sender {
    Content,
    Overlay,
}

impl Message {
    pub fn token(&self) -> &SessionToken {
        match self {
            Message::OverlayInit { token, .. }
            | Message::SelectionText { token, .. }
            | Message::ImproveResponse { token, .. }
            | Message::OverlayFrame { token, .. }
            | Message::OverlayConfirm { token, .. }
            | Message::OverlayNotice { token, .. }
            | Message::OverlayAction { token, .. } => token,
        }
    }

    pub fn is_handshake(&self) -> bool {
        matches!(self, Message::OverlayInit { .. })
    }

    /// Whether `sender` is allowed to emit this message type.
    pub fn may_be_sent_by(&self, sender: Sender) -> bool {
        match self {
            Message::OverlayInit { .. } => true,
            Message::SelectionText { .. }
            | Message::ImproveResponse { .. }
            | Message::OverlayFrame { .. }
            | Message::OverlayConfirm { .. }
            | Message::OverlayNotice { .. } => sender == Sender::Content,
            Message::OverlayAction { .. } => sender == Sender::Overlay,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Message::OverlayInit { .. } => "OVERLAY_INIT",
            Message::SelectionText { .. } => "SELECTION_TEXT",
            Message::ImproveResponse { .. } => "IMPROVE_RESPONSE",
            Message::OverlayFrame { .. } => "OVERLAY_FRAME",
            Message::OverlayConfirm { .. } => "OVERLAY_CONFIRM",
            Message::OverlayNotice { .. } => "OVERLAY_NOTICE",
            Message::OverlayAction { .. } => "OVERLAY_ACTION",
        }
    }
}

/// A delivered message as observed by the receiver.
#[derive(Debug, Clone)]
pub struct Envelope {
    pub source: EndpointId,
    pub origin: String,
    pub data: serde_json::Value,
}

/// Why an inbound message was dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    WrongSource,
    WrongOrigin,
    Malformed(String),
    UnexpectedSender(&'static str),
    DuplicateHandshake,
    NoToken,
    TokenMismatch(&'static str),
}

/// Inbound validation for one side of the content/overlay channel.
///
/// Order: source and origin first, then the one-time handshake, then the
/// token for everything else. A rejected message leaves the gate unchanged.
#[derive(Debug)]
pub struct InboundGate {
    receiver: Sender,
    expected_source: EndpointId,
    own_origin: String,
    token: Option<SessionToken>,
    adopt_handshake_token: bool,
    handshake_seen: bool,
}

impl InboundGate {
    /// Gate for the content context; the token is minted before the overlay exists.
    pub fn for_content(
        expected_overlay: EndpointId,
        own_origin: impl Into<String>,
        token: SessionToken,
    ) -> Self {
        Self {
            receiver: Sender::Content,
            expected_source: expected_overlay,
            own_origin: own_origin.into(),
            token: Some(token),
            adopt_handshake_token: false,
            handshake_seen: false,
        }
    }

    /// Gate for the overlay; the token is established by the handshake ack.
    pub fn for_overlay(expected_parent: EndpointId, own_origin: impl Into<String>) -> Self {
        Self {
            receiver: Sender::Overlay,
            expected_source: expected_parent,
            own_origin: own_origin.into(),
            token: None,
            adopt_handshake_token: true,
            handshake_seen: false,
        }
    }

    pub fn token(&self) -> Option<&SessionToken> {
        self.token.as_ref()
    }

    pub fn handshake_seen(&self) -> bool {
        self.handshake_seen
    }

    pub fn admit(&mut self, envelope: &Envelope) -> Result<Message, Rejection> {
        if envelope.source != self.expected_source {
            return Err(Rejection::WrongSource);
        }
        if envelope.origin != self.own_origin {
            return Err(Rejection::WrongOrigin);
        }

        let message: Message = serde_json::from_value(envelope.data.clone())
            .map_err(|err| Rejection::Malformed(err.to_string()))?;

        let counterpart = match self.receiver {
            Sender::Content => Sender::Overlay,
            Sender::Overlay => Sender::Content,
        };
        if !message.may_be_sent_by(counterpart) {
            return Err(Rejection::UnexpectedSender(message.kind()));
        }

        if message.is_handshake() {
            if self.handshake_seen {
                return Err(Rejection::DuplicateHandshake);
            }
            self.handshake_seen = true;
            if self.adopt_handshake_token {
                self.token = Some(message.token().clone());
            }
            return Ok(message);
        }

        if self.token.is_none() {
            return Err(Rejection::NoToken);
        }
        if !validate(message.token(), self.token.as_ref()) {
            return Err(Rejection::TokenMismatch(message.kind()));
        }
        Ok(message)
    }
}

/// Content -> background request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImproveRequest {
    pub token: SessionToken,
    /// Sequence number within the session; a newer one supersedes older ones.
    pub request_id: u64,
    pub text: String,
    /// Set by regenerate: bypass the response cache.
    #[serde(default)]
    pub fresh: bool,
}

/// Background -> content reply, tagged with the request's token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImproveReply {
    pub token: SessionToken,
    pub request_id: u64,
    pub outcome: Result<ImproveResult, ErrorReport>,
}
