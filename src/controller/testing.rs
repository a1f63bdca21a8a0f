//! In-memory service and renderer for controller tests

use super::Renderer;
use crate::error::ChatError;
use crate::model::{Message, MessageId, Sender, Session, SessionId};
use crate::state_machine::ControllerState;
use crate::transport::{ChatReply, ChatTransport, ServiceStatus};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

// ============================================================================
// Mock Transport
// ============================================================================

#[derive(Debug, Default)]
struct ServiceState {
    /// Listing order
    sessions: Vec<Session>,
    current: Option<SessionId>,
    histories: HashMap<SessionId, Vec<Message>>,
    next_id: u32,
}

/// Fake chat service with a call log and per-operation failure injection
///
/// Every call yields once before doing its work, so concurrent intents
/// interleave the way they would against a real network.
#[derive(Default)]
pub struct MockTransport {
    service: Mutex<ServiceState>,
    failures: Mutex<HashMap<&'static str, VecDeque<ChatError>>>,
    /// Whether listings flag the service's current session
    flag_current: Mutex<bool>,
    /// Create succeeds but answers with an empty session id
    blank_create: Mutex<bool>,
    /// Listings always come back empty, even after a create
    always_empty: Mutex<bool>,
    /// Extra scheduler yields per operation, to hold a call in flight
    delays: Mutex<HashMap<&'static str, usize>>,
    calls: Mutex<Vec<String>>,
}

#[allow(dead_code)]
impl MockTransport {
    pub fn new() -> Self {
        let mock = Self::default();
        *mock.flag_current.lock().unwrap() = true;
        mock
    }

    /// Service holding the given sessions, the first one current
    pub fn with_sessions(ids: &[&str]) -> Self {
        let mock = Self::new();
        {
            let mut service = mock.service.lock().unwrap();
            for id in ids {
                service
                    .sessions
                    .push(Session::new(*id, format!("Chat {id}")));
            }
            service.current = ids.first().map(|id| SessionId::new(*id));
        }
        mock
    }

    pub fn set_history(&self, id: &str, texts: &[(&str, bool)]) {
        let messages = texts
            .iter()
            .enumerate()
            .map(|(i, (text, is_user))| {
                let sender = if *is_user { Sender::User } else { Sender::Assistant };
                Message::from_history(Some(MessageId::new(format!("{id}-{i}"))), text, sender, Utc::now())
            })
            .collect();
        self.service
            .lock()
            .unwrap()
            .histories
            .insert(SessionId::new(id), messages);
    }

    pub fn fail_next(&self, operation: &'static str, error: ChatError) {
        self.failures
            .lock()
            .unwrap()
            .entry(operation)
            .or_default()
            .push_back(error);
    }

    pub fn set_flag_current(&self, flag: bool) {
        *self.flag_current.lock().unwrap() = flag;
    }

    pub fn set_blank_create(&self, blank: bool) {
        *self.blank_create.lock().unwrap() = blank;
    }

    pub fn set_always_empty(&self, empty: bool) {
        *self.always_empty.lock().unwrap() = empty;
    }

    /// Change the service's current session behind the client's back
    pub fn set_service_current(&self, id: &str) {
        self.service.lock().unwrap().current = Some(SessionId::new(id));
    }

    pub fn set_delay(&self, operation: &'static str, yields: usize) {
        self.delays.lock().unwrap().insert(operation, yields);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, operation: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| c.split('(').next() == Some(operation))
            .count()
    }

    pub fn service_current(&self) -> Option<SessionId> {
        self.service.lock().unwrap().current.clone()
    }

    pub fn session_ids(&self) -> Vec<String> {
        self.service
            .lock()
            .unwrap()
            .sessions
            .iter()
            .map(|s| s.session_id.to_string())
            .collect()
    }

    async fn enter(&self, call: String, operation: &'static str) -> Result<(), ChatError> {
        self.calls.lock().unwrap().push(call);
        let yields = 1 + self.delays.lock().unwrap().get(operation).copied().unwrap_or(0);
        for _ in 0..yields {
            tokio::task::yield_now().await;
        }
        match self
            .failures
            .lock()
            .unwrap()
            .get_mut(operation)
            .and_then(VecDeque::pop_front)
        {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ChatTransport for MockTransport {
    async fn list_sessions(&self) -> Result<Vec<Session>, ChatError> {
        self.enter("list_sessions".into(), "list_sessions").await?;
        if *self.always_empty.lock().unwrap() {
            return Ok(vec![]);
        }
        let flag = *self.flag_current.lock().unwrap();
        let service = self.service.lock().unwrap();
        Ok(service
            .sessions
            .iter()
            .map(|s| {
                let is_current = flag && service.current.as_ref() == Some(&s.session_id);
                s.clone().with_current(is_current)
            })
            .collect())
    }

    async fn create_session(&self) -> Result<Session, ChatError> {
        self.enter("create_session".into(), "create_session").await?;
        if *self.blank_create.lock().unwrap() {
            return Ok(Session::new("", "New Chat"));
        }
        let mut service = self.service.lock().unwrap();
        service.next_id += 1;
        let id = SessionId::new(format!("new-{}", service.next_id));
        let session = Session::new(id.clone(), "New Chat");
        service.sessions.insert(0, session.clone());
        service.current = Some(id);
        Ok(session.with_current(true))
    }

    async fn switch_session(&self, id: &SessionId) -> Result<(), ChatError> {
        self.enter(format!("switch_session({id})"), "switch_session")
            .await?;
        let mut service = self.service.lock().unwrap();
        if !service.sessions.iter().any(|s| &s.session_id == id) {
            return Err(ChatError::not_found("Session not found").with_status(404));
        }
        service.current = Some(id.clone());
        Ok(())
    }

    async fn delete_session(&self, id: &SessionId) -> Result<(), ChatError> {
        self.enter(format!("delete_session({id})"), "delete_session")
            .await?;
        let mut service = self.service.lock().unwrap();
        if !service.sessions.iter().any(|s| &s.session_id == id) {
            return Err(ChatError::not_found("Session not found").with_status(404));
        }
        service.sessions.retain(|s| &s.session_id != id);
        service.histories.remove(id);
        if service.current.as_ref() == Some(id) {
            service.current = service.sessions.first().map(|s| s.session_id.clone());
        }
        Ok(())
    }

    async fn delete_all_sessions(&self) -> Result<(), ChatError> {
        self.enter("delete_all_sessions".into(), "delete_all_sessions")
            .await?;
        let mut service = self.service.lock().unwrap();
        service.sessions.clear();
        service.histories.clear();
        service.current = None;
        Ok(())
    }

    async fn fetch_history(&self) -> Result<Vec<Message>, ChatError> {
        self.enter("fetch_history".into(), "fetch_history").await?;
        let service = self.service.lock().unwrap();
        Ok(service
            .current
            .as_ref()
            .and_then(|id| service.histories.get(id))
            .cloned()
            .unwrap_or_default())
    }

    async fn send_message(&self, text: &str) -> Result<ChatReply, ChatError> {
        self.enter(format!("send_message({text})"), "send_message")
            .await?;
        let mut service = self.service.lock().unwrap();
        let Some(current) = service.current.clone() else {
            return Err(ChatError::service("No current session").with_status(400));
        };
        let reply = format!("echo: {text}");
        let history = service.histories.entry(current.clone()).or_default();
        history.push(Message::from_history(None, text, Sender::User, Utc::now()));
        history.push(Message::from_history(None, &reply, Sender::Assistant, Utc::now()));
        Ok(ChatReply {
            response_text: reply,
            session_id: current,
        })
    }

    async fn clear_history(&self) -> Result<(), ChatError> {
        self.enter("clear_history".into(), "clear_history").await?;
        let mut service = self.service.lock().unwrap();
        if let Some(current) = service.current.clone() {
            service.histories.remove(&current);
        }
        Ok(())
    }

    async fn service_status(&self) -> Result<ServiceStatus, ChatError> {
        self.enter("service_status".into(), "service_status").await?;
        Ok(ServiceStatus { model_loaded: true })
    }
}

// ============================================================================
// Recording Renderer
// ============================================================================

/// Renderer that keeps every notification it receives
#[derive(Default)]
pub struct RecordingRenderer {
    pub sessions: Mutex<Vec<Vec<Session>>>,
    pub messages: Mutex<Vec<Vec<Message>>>,
    pub states: Mutex<Vec<ControllerState>>,
    pub errors: Mutex<Vec<ChatError>>,
}

#[allow(dead_code)]
impl RecordingRenderer {
    pub fn errors(&self) -> Vec<ChatError> {
        self.errors.lock().unwrap().clone()
    }

    pub fn last_messages(&self) -> Option<Vec<Message>> {
        self.messages.lock().unwrap().last().cloned()
    }

    pub fn last_sessions(&self) -> Option<Vec<Session>> {
        self.sessions.lock().unwrap().last().cloned()
    }

    pub fn states(&self) -> Vec<ControllerState> {
        self.states.lock().unwrap().clone()
    }
}

impl Renderer for RecordingRenderer {
    fn on_sessions_changed(&self, sessions: &[Session]) {
        self.sessions.lock().unwrap().push(sessions.to_vec());
    }

    fn on_messages_changed(&self, messages: &[Message]) {
        self.messages.lock().unwrap().push(messages.to_vec());
    }

    fn on_state_changed(&self, state: &ControllerState) {
        self.states.lock().unwrap().push(state.clone());
    }

    fn on_error(&self, error: &ChatError) {
        self.errors.lock().unwrap().push(error.clone());
    }
}
