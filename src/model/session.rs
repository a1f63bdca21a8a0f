//! Chat session types

use chrono::{DateTime, Utc};
use std::fmt;

/// Opaque server-assigned session identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for SessionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A server-tracked conversation thread
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub session_id: SessionId,
    pub display_name: String,
    pub last_message_preview: String,
    /// Mirrors the server; the registry normalises this so exactly one is set
    pub is_current: bool,
    pub message_count: Option<u32>,
    pub last_activity: Option<DateTime<Utc>>,
}

impl Session {
    pub fn new(session_id: impl Into<SessionId>, display_name: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            display_name: display_name.into(),
            last_message_preview: String::new(),
            is_current: false,
            message_count: None,
            last_activity: None,
        }
    }

    pub fn with_current(mut self, is_current: bool) -> Self {
        self.is_current = is_current;
        self
    }

    pub fn with_preview(mut self, preview: impl Into<String>) -> Self {
        self.last_message_preview = preview.into();
        self
    }
}
