// Match Room WebSocket Protocol
//
// Every text frame in either direction is `{"event": <name>, "data": <payload>}`.
//
// Protocol flow:
// 1. Client connects and sends "joinMatch" with its match and user ids
// 2. Server replies "joined" and tells the room the new user count
// 3. Client chats ("sendMessage") and signals "typing" within its room
// 4. Server pushes "matchUpdated" / "newEvent" as the simulation advances

use chrono::{DateTime, Utc};
use matchcast_core::{Match, MatchEvent};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};
use std::fmt;

/// Raw inbound frame before the payload is validated
#[derive(Debug, Clone, Deserialize)]
struct ClientFrame {
    event: String,
    #[serde(default)]
    data: JsonValue,
}

/// Room addressed by a join or leave request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomRequest {
    pub match_id: String,
    pub user_id: String,
}

/// Validated message from a viewer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    JoinMatch(RoomRequest),
    LeaveMatch(RoomRequest),
    SendMessage { message: String },
    Typing { is_typing: bool },
}

impl ClientMessage {
    pub const JOIN_MATCH: &'static str = "joinMatch";
    pub const LEAVE_MATCH: &'static str = "leaveMatch";
    pub const SEND_MESSAGE: &'static str = "sendMessage";
    pub const TYPING: &'static str = "typing";

    /// Parse and validate one inbound text frame.
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        let frame: ClientFrame = serde_json::from_str(text).map_err(|e| {
            ProtocolError::invalid_request(format!("Malformed message frame: {}", e))
        })?;
        let data = normalize_payload(frame.data);

        match frame.event.as_str() {
            Self::JOIN_MATCH => room_request(&data)
                .map(Self::JoinMatch)
                .ok_or_else(|| missing_room_fields(data)),
            Self::LEAVE_MATCH => room_request(&data)
                .map(Self::LeaveMatch)
                .ok_or_else(|| missing_room_fields(data)),
            Self::SEND_MESSAGE => match data.get("message").and_then(JsonValue::as_str) {
                Some(message) => Ok(Self::SendMessage {
                    message: message.to_string(),
                }),
                None => Err(ProtocolError::invalid_request("message is required")
                    .with_details(json!({ "received": data }))),
            },
            Self::TYPING => match data.get("isTyping").and_then(JsonValue::as_bool) {
                Some(is_typing) => Ok(Self::Typing { is_typing }),
                None => Err(ProtocolError::invalid_request("isTyping is required")
                    .with_details(json!({ "received": data }))),
            },
            other => Err(ProtocolError::invalid_request(format!(
                "Unknown event: {}",
                other
            ))),
        }
    }
}

/// Payloads sent as JSON-encoded strings are decoded first; a string that is
/// not JSON is kept as-is and fails field validation.
fn normalize_payload(data: JsonValue) -> JsonValue {
    match data {
        JsonValue::String(raw) => match serde_json::from_str::<JsonValue>(&raw) {
            Ok(parsed) => parsed,
            Err(_) => {
                tracing::warn!("Failed to parse string payload: {}", raw);
                JsonValue::String(raw)
            }
        },
        other => other,
    }
}

fn non_empty_str<'a>(data: &'a JsonValue, field: &str) -> Option<&'a str> {
    data.get(field)
        .and_then(JsonValue::as_str)
        .filter(|value| !value.is_empty())
}

fn room_request(data: &JsonValue) -> Option<RoomRequest> {
    Some(RoomRequest {
        match_id: non_empty_str(data, "matchId")?.to_string(),
        user_id: non_empty_str(data, "userId")?.to_string(),
    })
}

fn missing_room_fields(data: JsonValue) -> ProtocolError {
    ProtocolError::invalid_request("matchId and userId are required")
        .with_details(json!({ "received": data }))
}

/// Message pushed to a viewer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerMessage {
    /// Reply to the joining session only
    #[serde(rename_all = "camelCase")]
    Joined {
        match_id: String,
        user_id: String,
        count: usize,
    },

    #[serde(rename_all = "camelCase")]
    UserCountUpdate { match_id: String, count: usize },

    #[serde(rename_all = "camelCase")]
    UserJoined { user_id: String },

    #[serde(rename_all = "camelCase")]
    UserLeft { user_id: String },

    #[serde(rename_all = "camelCase")]
    ChatMessage {
        user_id: String,
        message: String,
        timestamp: DateTime<Utc>,
    },

    /// Sent to everyone in the room except the session that changed its flag
    #[serde(rename_all = "camelCase")]
    TypingUpdate { match_id: String, users: Vec<String> },

    MatchUpdated(Match),

    NewEvent(MatchEvent),

    Error(ProtocolError),
}

impl ServerMessage {
    pub fn to_text(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn event_name(&self) -> &'static str {
        match self {
            ServerMessage::Joined { .. } => "joined",
            ServerMessage::UserCountUpdate { .. } => "userCountUpdate",
            ServerMessage::UserJoined { .. } => "userJoined",
            ServerMessage::UserLeft { .. } => "userLeft",
            ServerMessage::ChatMessage { .. } => "chatMessage",
            ServerMessage::TypingUpdate { .. } => "typingUpdate",
            ServerMessage::MatchUpdated(_) => "matchUpdated",
            ServerMessage::NewEvent(_) => "newEvent",
            ServerMessage::Error(_) => "error",
        }
    }
}

/// Protocol error type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtocolError {
    /// Error code
    pub code: String,

    /// Human-readable error message
    pub message: String,

    /// Additional error details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<JsonValue>,
}

impl ProtocolError {
    // Standard error codes
    pub const INVALID_REQUEST: &'static str = "INVALID_REQUEST";
    pub const INTERNAL_ERROR: &'static str = "INTERNAL_ERROR";

    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(Self::INVALID_REQUEST, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(Self::INTERNAL_ERROR, message)
    }

    pub fn with_details(mut self, details: JsonValue) -> Self {
        self.details = Some(details);
        self
    }
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for ProtocolError {}
