//! Chat message types

use chrono::{DateTime, Utc};
use std::fmt;
use uuid::Uuid;

/// Server-assigned message identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MessageId(String);

impl MessageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Client-side handle for a message, valid before the server assigns an id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LocalRef(Uuid);

impl LocalRef {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for LocalRef {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for LocalRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Who authored a message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sender {
    User,
    Assistant,
    /// Client-authored notices, e.g. a failed send
    System,
}

/// Optimistic lifecycle of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageStatus {
    Pending,
    Confirmed,
    Failed,
}

/// A single entry in the conversation log
///
/// `text` is HTML-escaped at construction and is safe to insert into markup
/// verbatim.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub id: Option<MessageId>,
    pub local_ref: LocalRef,
    pub text: String,
    pub sender: Sender,
    pub timestamp: DateTime<Utc>,
    pub status: MessageStatus,
}

impl Message {
    fn new(raw: &str, sender: Sender, timestamp: DateTime<Utc>, status: MessageStatus) -> Self {
        Self {
            id: None,
            local_ref: LocalRef::new(),
            text: escape_html(raw),
            sender,
            timestamp,
            status,
        }
    }

    /// Optimistic user message shown before the service answers
    pub fn pending_user(raw: &str, local_ref: LocalRef, sent_at: DateTime<Utc>) -> Self {
        Self {
            local_ref,
            ..Self::new(raw, Sender::User, sent_at, MessageStatus::Pending)
        }
    }

    pub fn assistant(raw: &str, timestamp: DateTime<Utc>) -> Self {
        Self::new(raw, Sender::Assistant, timestamp, MessageStatus::Confirmed)
    }

    pub fn system_error(raw: &str, timestamp: DateTime<Utc>) -> Self {
        Self::new(raw, Sender::System, timestamp, MessageStatus::Confirmed)
    }

    /// Message replayed from server history; always confirmed
    pub fn from_history(
        id: Option<MessageId>,
        raw: &str,
        sender: Sender,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            ..Self::new(raw, sender, timestamp, MessageStatus::Confirmed)
        }
    }

    pub fn is_user(&self) -> bool {
        self.sender == Sender::User
    }
}

/// Escape text so it renders literally inside HTML
pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Reverse of [`escape_html`], for front ends that print plain text
pub fn unescape_html(escaped: &str) -> String {
    // `&amp;` last so "&amp;lt;" comes back as "&lt;"
    escaped
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}
