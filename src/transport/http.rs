//! HTTP implementation of the chat transport

use super::wire::{
    ChatRequest, ChatResponse, CreatedSession, ErrorBody, HistoryResponse, SessionWire,
    StatusResponse,
};
use super::{ChatReply, ChatTransport, ServiceStatus};
use crate::config::ClientConfig;
use crate::error::ChatError;
use crate::model::{Message, Session, SessionId};
use async_trait::async_trait;
use chrono::Utc;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;

/// Everything outside the RFC 3986 unreserved set gets escaped in ids
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Talks to the chat service's JSON API
///
/// The service tracks the current session in a cookie, so the client keeps a
/// cookie store for its lifetime.
pub struct HttpTransport {
    client: Client,
    base_url: String,
}

impl HttpTransport {
    /// # Errors
    ///
    /// Fails when the HTTP client cannot be constructed (e.g. TLS backend
    /// initialisation).
    pub fn new(config: &ClientConfig) -> Result<Self, ChatError> {
        let mut builder = Client::builder().cookie_store(true);
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| ChatError::network(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client.request(method, format!("{}{path}", self.base_url))
    }

    fn session_path(id: &SessionId, suffix: &str) -> String {
        format!(
            "/api/sessions/{}{suffix}",
            utf8_percent_encode(id.as_str(), PATH_SEGMENT)
        )
    }

    /// Send a request and return the body of a successful response
    async fn execute(&self, request: RequestBuilder) -> Result<String, ChatError> {
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                ChatError::network(format!("Request timeout: {e}"))
            } else if e.is_connect() {
                ChatError::network(format!("Connection failed: {e}"))
            } else {
                ChatError::network(format!("Request failed: {e}"))
            }
        })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ChatError::network(format!("Failed to read response: {e}")))?;

        if !status.is_success() {
            return Err(classify_error(status, &body));
        }
        Ok(body)
    }

    async fn execute_json<V: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<V, ChatError> {
        let body = self.execute(request).await?;
        serde_json::from_str(&body)
            .map_err(|e| ChatError::service(format!("Failed to parse response: {e} - body: {body}")))
    }
}

fn classify_error(status: StatusCode, body: &str) -> ChatError {
    let message = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.error)
        .unwrap_or_else(|| format!("HTTP {status}"));

    let error = if status == StatusCode::NOT_FOUND {
        ChatError::not_found(message)
    } else {
        ChatError::service(message)
    };
    error.with_status(status.as_u16())
}

#[async_trait]
impl ChatTransport for HttpTransport {
    async fn list_sessions(&self) -> Result<Vec<Session>, ChatError> {
        let sessions: Vec<SessionWire> = self
            .execute_json(self.request(Method::GET, "/api/sessions"))
            .await?;
        Ok(sessions.into_iter().map(Session::from).collect())
    }

    async fn create_session(&self) -> Result<Session, ChatError> {
        let created: CreatedSession = self
            .execute_json(
                self.request(Method::POST, "/api/sessions")
                    .json(&serde_json::json!({})),
            )
            .await?;
        created.into_session()
    }

    async fn switch_session(&self, id: &SessionId) -> Result<(), ChatError> {
        self.execute(self.request(Method::POST, &Self::session_path(id, "/switch")))
            .await
            .map(drop)
    }

    async fn delete_session(&self, id: &SessionId) -> Result<(), ChatError> {
        self.execute(self.request(Method::DELETE, &Self::session_path(id, "")))
            .await
            .map(drop)
    }

    async fn delete_all_sessions(&self) -> Result<(), ChatError> {
        self.execute(self.request(Method::DELETE, "/api/sessions/all"))
            .await
            .map(drop)
    }

    async fn fetch_history(&self) -> Result<Vec<Message>, ChatError> {
        let history: HistoryResponse = self
            .execute_json(self.request(Method::GET, "/api/history"))
            .await?;
        Ok(history.into_messages(Utc::now()))
    }

    async fn send_message(&self, text: &str) -> Result<ChatReply, ChatError> {
        let reply: ChatResponse = self
            .execute_json(
                self.request(Method::POST, "/api/chat")
                    .json(&ChatRequest { message: text }),
            )
            .await?;
        Ok(ChatReply {
            response_text: reply.response,
            session_id: SessionId::new(reply.session_id),
        })
    }

    async fn clear_history(&self) -> Result<(), ChatError> {
        self.execute(self.request(Method::POST, "/api/clear-history"))
            .await
            .map(drop)
    }

    async fn service_status(&self) -> Result<ServiceStatus, ChatError> {
        let status: StatusResponse = self
            .execute_json(self.request(Method::GET, "/api/status"))
            .await?;
        Ok(ServiceStatus {
            model_loaded: status.model_loaded,
        })
    }
}
