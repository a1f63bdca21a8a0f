//! Transport to the remote chat service
//!
//! One method per intent, one HTTP call per method. No retries: every
//! failure is handed back to the caller unmodified.

mod http;
mod wire;

pub use http::HttpTransport;

use crate::error::ChatError;
use crate::model::{Message, Session, SessionId};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;

/// Successful reply to a sent message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatReply {
    pub response_text: String,
    pub session_id: SessionId,
}

/// Availability of the service's model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceStatus {
    pub model_loaded: bool,
}

/// Calls against the remote chat service
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn list_sessions(&self) -> Result<Vec<Session>, ChatError>;

    async fn create_session(&self) -> Result<Session, ChatError>;

    async fn switch_session(&self, id: &SessionId) -> Result<(), ChatError>;

    async fn delete_session(&self, id: &SessionId) -> Result<(), ChatError>;

    async fn delete_all_sessions(&self) -> Result<(), ChatError>;

    /// History of the service's current session, oldest first
    async fn fetch_history(&self) -> Result<Vec<Message>, ChatError>;

    async fn send_message(&self, text: &str) -> Result<ChatReply, ChatError>;

    async fn clear_history(&self) -> Result<(), ChatError>;

    async fn service_status(&self) -> Result<ServiceStatus, ChatError>;
}

#[async_trait]
impl<T: ChatTransport + ?Sized> ChatTransport for Arc<T> {
    async fn list_sessions(&self) -> Result<Vec<Session>, ChatError> {
        (**self).list_sessions().await
    }

    async fn create_session(&self) -> Result<Session, ChatError> {
        (**self).create_session().await
    }

    async fn switch_session(&self, id: &SessionId) -> Result<(), ChatError> {
        (**self).switch_session(id).await
    }

    async fn delete_session(&self, id: &SessionId) -> Result<(), ChatError> {
        (**self).delete_session(id).await
    }

    async fn delete_all_sessions(&self) -> Result<(), ChatError> {
        (**self).delete_all_sessions().await
    }

    async fn fetch_history(&self) -> Result<Vec<Message>, ChatError> {
        (**self).fetch_history().await
    }

    async fn send_message(&self, text: &str) -> Result<ChatReply, ChatError> {
        (**self).send_message(text).await
    }

    async fn clear_history(&self) -> Result<(), ChatError> {
        (**self).clear_history().await
    }

    async fn service_status(&self) -> Result<ServiceStatus, ChatError> {
        (**self).service_status().await
    }
}

/// Logging wrapper for chat transports
pub struct LoggingTransport<T> {
    inner: T,
}

impl<T: ChatTransport> LoggingTransport<T> {
    pub fn new(inner: T) -> Self {
        Self { inner }
    }

    fn record<V>(operation: &'static str, start: Instant, result: &Result<V, ChatError>) {
        let duration_ms = start.elapsed().as_millis();
        match result {
            Ok(_) => {
                tracing::debug!(operation, duration_ms = %duration_ms, "Chat request completed");
            }
            Err(e) => {
                tracing::warn!(
                    operation,
                    duration_ms = %duration_ms,
                    kind = e.kind.as_str(),
                    status = ?e.status,
                    error = %e.message,
                    "Chat request failed"
                );
            }
        }
    }
}

#[async_trait]
impl<T: ChatTransport> ChatTransport for LoggingTransport<T> {
    async fn list_sessions(&self) -> Result<Vec<Session>, ChatError> {
        let start = Instant::now();
        let result = self.inner.list_sessions().await;
        Self::record("list_sessions", start, &result);
        result
    }

    async fn create_session(&self) -> Result<Session, ChatError> {
        let start = Instant::now();
        let result = self.inner.create_session().await;
        Self::record("create_session", start, &result);
        result
    }

    async fn switch_session(&self, id: &SessionId) -> Result<(), ChatError> {
        let start = Instant::now();
        let result = self.inner.switch_session(id).await;
        Self::record("switch_session", start, &result);
        result
    }

    async fn delete_session(&self, id: &SessionId) -> Result<(), ChatError> {
        let start = Instant::now();
        let result = self.inner.delete_session(id).await;
        Self::record("delete_session", start, &result);
        result
    }

    async fn delete_all_sessions(&self) -> Result<(), ChatError> {
        let start = Instant::now();
        let result = self.inner.delete_all_sessions().await;
        Self::record("delete_all_sessions", start, &result);
        result
    }

    async fn fetch_history(&self) -> Result<Vec<Message>, ChatError> {
        let start = Instant::now();
        let result = self.inner.fetch_history().await;
        Self::record("fetch_history", start, &result);
        result
    }

    async fn send_message(&self, text: &str) -> Result<ChatReply, ChatError> {
        let start = Instant::now();
        let result = self.inner.send_message(text).await;
        Self::record("send_message", start, &result);
        result
    }

    async fn clear_history(&self) -> Result<(), ChatError> {
        let start = Instant::now();
        let result = self.inner.clear_history().await;
        Self::record("clear_history", start, &result);
        result
    }

    async fn service_status(&self) -> Result<ServiceStatus, ChatError> {
        let start = Instant::now();
        let result = self.inner.service_status().await;
        Self::record("service_status", start, &result);
        result
    }
}
