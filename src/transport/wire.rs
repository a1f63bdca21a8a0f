//! JSON shapes exchanged with the chat service
//!
//! Messages use one canonical shape, `{id, message_text, is_user, timestamp}`.
//! History may arrive bare or wrapped in `{messages: [...]}`.

use crate::error::ChatError;
use crate::model::{Message, MessageId, Sender, Session, SessionId};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

#[derive(Debug, Serialize)]
pub(super) struct ChatRequest<'a> {
    pub message: &'a str,
}

#[derive(Debug, Deserialize)]
pub(super) struct ChatResponse {
    pub response: String,
    #[serde(default)]
    pub session_id: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct StatusResponse {
    #[serde(default)]
    pub model_loaded: bool,
}

#[derive(Debug, Deserialize)]
pub(super) struct ErrorBody {
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct SessionWire {
    session_id: String,
    #[serde(default)]
    session_name: String,
    #[serde(default)]
    last_message_preview: Option<String>,
    #[serde(default)]
    is_current: bool,
    #[serde(default)]
    message_count: Option<u32>,
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    last_activity: Option<DateTime<Utc>>,
}

impl From<SessionWire> for Session {
    fn from(wire: SessionWire) -> Self {
        Session {
            session_id: SessionId::new(wire.session_id),
            display_name: wire.session_name,
            last_message_preview: wire.last_message_preview.unwrap_or_default(),
            is_current: wire.is_current,
            message_count: wire.message_count,
            last_activity: wire.last_activity,
        }
    }
}

/// Response to `POST /api/sessions`: either a bare session or
/// `{success, session_id, session}`
#[derive(Debug, Deserialize)]
pub(super) struct CreatedSession {
    #[serde(default)]
    session_id: Option<String>,
    #[serde(default)]
    session_name: Option<String>,
    #[serde(default)]
    session: Option<SessionWire>,
}

impl CreatedSession {
    pub fn into_session(self) -> Result<Session, ChatError> {
        let session = match (self.session, self.session_id) {
            (Some(nested), _) => Session::from(nested),
            (None, Some(id)) => Session::new(id, self.session_name.unwrap_or_default()),
            (None, None) => {
                return Err(ChatError::service("Service created a session without an id"))
            }
        };
        if session.session_id.is_empty() {
            return Err(ChatError::service("Service created a session without an id"));
        }
        // The service switches to a session as it creates it
        Ok(session.with_current(true))
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct MessageWire {
    #[serde(default, deserialize_with = "deserialize_opaque_id")]
    id: Option<String>,
    message_text: String,
    is_user: bool,
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    timestamp: Option<DateTime<Utc>>,
}

impl MessageWire {
    fn into_message(self, received_at: DateTime<Utc>) -> Message {
        let sender = if self.is_user {
            Sender::User
        } else {
            Sender::Assistant
        };
        Message::from_history(
            self.id.map(MessageId::new),
            &self.message_text,
            sender,
            self.timestamp.unwrap_or(received_at),
        )
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(super) enum HistoryResponse {
    Bare(Vec<MessageWire>),
    Envelope { messages: Vec<MessageWire> },
}

impl HistoryResponse {
    pub fn into_messages(self, received_at: DateTime<Utc>) -> Vec<Message> {
        let (HistoryResponse::Bare(wire) | HistoryResponse::Envelope { messages: wire }) = self;
        wire.into_iter()
            .map(|m| m.into_message(received_at))
            .collect()
    }
}

/// Parse RFC 3339, falling back to naive ISO-8601 read as UTC
pub(super) fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|naive| naive.and_utc())
        })
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(parse_timestamp))
}

fn deserialize_opaque_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}
