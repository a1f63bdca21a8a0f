//! Conversation controller
//!
//! Owns the message store and session registry, runs the pure state machine,
//! and executes the service calls its transitions ask for. Every entry point
//! takes `&self`; the state lock is never held across an await, so a second
//! intent arriving while a send or switch is in flight sees the busy state
//! and is turned away.

mod renderer;

#[cfg(test)]
mod testing;

pub use renderer::{NullRenderer, Renderer};

use crate::error::ChatError;
use crate::model::{LocalRef, Message, Session, SessionId};
use crate::registry::SessionRegistry;
use crate::state_machine::{
    transition, ControllerContext, ControllerState, Effect, Event, TransitionError,
};
use crate::store::MessageStore;
use crate::transport::{ChatTransport, ServiceStatus};
use chrono::Utc;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// A user intent, for callers that route input through one entry point
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    Send(String),
    Switch(SessionId),
    Create,
    Delete(SessionId),
    DeleteAll,
    Clear,
}

/// What became of a send request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// The service replied and the message is confirmed
    Delivered,
    /// The service call failed; the log shows the failed message and a notice
    Failed,
    /// Another operation was in flight; nothing happened
    Ignored,
}

/// What became of a session-management request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Applied,
    /// Another operation was in flight; nothing happened
    Ignored,
}

struct Inner {
    state: ControllerState,
    store: MessageStore,
    registry: SessionRegistry,
}

impl Inner {
    fn context(&self) -> ControllerContext {
        ControllerContext::new(self.registry.current().cloned(), self.store.generation())
    }

    fn apply_local(&mut self, effect: Effect, changes: &mut Changes) {
        changes.messages |= effect.touches_messages();
        match effect {
            Effect::AppendMessage(message) => self.store.append(message),
            Effect::MarkStatus { local_ref, status } => {
                if !self.store.mark_status(local_ref, status) {
                    tracing::debug!(%local_ref, ?status, "Message no longer in the log, status dropped");
                }
            }
            Effect::ClearMessages => self.store.clear(),
            Effect::ReplaceMessages(messages) => self.store.replace(messages),
            Effect::SetCurrent(id) => {
                self.registry.set_current(Some(id));
                changes.sessions = true;
            }
            Effect::UpsertSession(session) => {
                self.registry.upsert_local(session);
                changes.sessions = true;
            }
            Effect::RemoveSession(id) => {
                self.registry.remove(&id);
                changes.sessions = true;
            }
            Effect::ClearSessions => {
                self.registry.clear();
                changes.sessions = true;
            }
            other => tracing::error!(effect = ?other, "Service effect routed to local handler"),
        }
    }

    fn snapshot(&self, changes: &Changes) -> Snapshot {
        Snapshot {
            state: changes.state.then(|| self.state.clone()),
            messages: changes.messages.then(|| self.store.messages().to_vec()),
            sessions: changes.sessions.then(|| self.registry.sessions().to_vec()),
        }
    }
}

/// Which parts of the controller a step touched
#[derive(Debug, Default)]
struct Changes {
    state: bool,
    messages: bool,
    sessions: bool,
}

/// Copies handed to the renderer once the lock is released
struct Snapshot {
    state: Option<ControllerState>,
    messages: Option<Vec<Message>>,
    sessions: Option<Vec<Session>>,
}

/// Failures collected while driving one intent to completion
#[derive(Debug, Default)]
struct DriveReport {
    /// The intent's own service call failed
    failure: Option<ChatError>,
    /// A follow-up session refresh failed
    refresh_failure: Option<ChatError>,
}

/// Coordinates the store, the registry and the service for one client
pub struct ConversationController<T: ChatTransport, R: Renderer> {
    transport: T,
    renderer: R,
    inner: Mutex<Inner>,
}

impl<T: ChatTransport, R: Renderer> ConversationController<T, R> {
    pub fn new(transport: T, renderer: R) -> Self {
        Self {
            transport,
            renderer,
            inner: Mutex::new(Inner {
                state: ControllerState::Idle,
                store: MessageStore::new(),
                registry: SessionRegistry::new(),
            }),
        }
    }

    // ========================================================================
    // Snapshots
    // ========================================================================

    pub fn messages(&self) -> Vec<Message> {
        self.lock().store.messages().to_vec()
    }

    pub fn sessions(&self) -> Vec<Session> {
        self.lock().registry.sessions().to_vec()
    }

    pub fn current_session_id(&self) -> Option<SessionId> {
        self.lock().registry.current().cloned()
    }

    pub fn state(&self) -> ControllerState {
        self.lock().state.clone()
    }

    // ========================================================================
    // Intents
    // ========================================================================

    /// Initial population: session list, selection and its history
    pub async fn load(&self) -> Result<(), ChatError> {
        tracing::info!("Loading sessions");
        self.refresh_sessions(false).await.map_err(|e| self.surface(e))
    }

    /// Send one message
    ///
    /// Blank text is rejected with a validation error before anything else
    /// happens. Service failures do not produce an `Err`: they end up in the
    /// message log as a failed message followed by a system notice.
    pub async fn send_message(&self, text: &str) -> Result<SendOutcome, ChatError> {
        let event = Event::SendRequested {
            text: text.to_string(),
            local_ref: LocalRef::new(),
            sent_at: Utc::now(),
        };
        match self.drive(event).await {
            Ok(report) => {
                if let Some(error) = report.refresh_failure {
                    self.surface(error);
                }
                Ok(if report.failure.is_some() {
                    SendOutcome::Failed
                } else {
                    SendOutcome::Delivered
                })
            }
            Err(TransitionError::EmptyMessage) => {
                Err(ChatError::validation(TransitionError::EmptyMessage.to_string()))
            }
            Err(TransitionError::Busy(state)) => {
                tracing::debug!(state, "Send ignored while busy");
                Ok(SendOutcome::Ignored)
            }
            Err(e @ TransitionError::InvalidTransition(_)) => {
                tracing::error!(error = %e, "Send rejected");
                Ok(SendOutcome::Ignored)
            }
        }
    }

    pub async fn switch_session(&self, session_id: SessionId) -> Result<Outcome, ChatError> {
        self.run_intent(Event::SwitchRequested { session_id }).await
    }

    /// Ask the service for a new session and make it current
    pub async fn create_session(&self) -> Result<Outcome, ChatError> {
        self.run_intent(Event::CreateRequested).await
    }

    pub async fn delete_session(&self, session_id: SessionId) -> Result<Outcome, ChatError> {
        self.run_intent(Event::DeleteRequested { session_id }).await
    }

    pub async fn delete_all_sessions(&self) -> Result<Outcome, ChatError> {
        self.run_intent(Event::DeleteAllRequested).await
    }

    /// Empty the current session's history on the service and locally
    pub async fn clear_history(&self) -> Result<Outcome, ChatError> {
        self.run_intent(Event::ClearRequested).await
    }

    pub async fn check_status(&self) -> Result<ServiceStatus, ChatError> {
        self.transport
            .service_status()
            .await
            .map_err(|e| self.surface(e))
    }

    pub async fn dispatch(&self, intent: Intent) -> Result<(), ChatError> {
        match intent {
            Intent::Send(text) => self.send_message(&text).await.map(drop),
            Intent::Switch(id) => self.switch_session(id).await.map(drop),
            Intent::Create => self.create_session().await.map(drop),
            Intent::Delete(id) => self.delete_session(id).await.map(drop),
            Intent::DeleteAll => self.delete_all_sessions().await.map(drop),
            Intent::Clear => self.clear_history().await.map(drop),
        }
    }

    // ========================================================================
    // Driver
    // ========================================================================

    async fn run_intent(&self, event: Event) -> Result<Outcome, ChatError> {
        match self.drive(event).await {
            Ok(report) => match report.failure.or(report.refresh_failure) {
                Some(error) => Err(self.surface(error)),
                None => Ok(Outcome::Applied),
            },
            Err(TransitionError::Busy(state)) => {
                tracing::debug!(state, "Intent ignored while busy");
                Ok(Outcome::Ignored)
            }
            Err(e) => Err(self.surface(ChatError::validation(e.to_string()))),
        }
    }

    /// Feed an intent through the state machine and execute effects until
    /// no more events are produced
    async fn drive(&self, event: Event) -> Result<DriveReport, TransitionError> {
        let mut report = DriveReport::default();
        let mut pending: VecDeque<Effect> = self.apply(event)?.into();

        while let Some(effect) = pending.pop_front() {
            let Some(next) = self.execute(effect, &mut report).await else {
                continue;
            };
            if let Some(error) = next.error() {
                report.failure.get_or_insert_with(|| error.clone());
            }
            match self.apply(next) {
                Ok(effects) => pending.extend(effects),
                Err(e) => tracing::error!(error = %e, "Service outcome rejected by state machine"),
            }
        }

        Ok(report)
    }

    /// Run one transition under the lock, apply its local effects, and hand
    /// back the service calls still to be made
    fn apply(&self, event: Event) -> Result<Vec<Effect>, TransitionError> {
        let (service_calls, snapshot) = {
            let mut inner = self.lock();
            let context = inner.context();
            let result = transition(&inner.state, &context, event)?;

            let mut changes = Changes {
                state: result.new_state != inner.state,
                ..Changes::default()
            };
            if changes.state {
                tracing::debug!(
                    from = inner.state.name(),
                    to = result.new_state.name(),
                    "Controller state changed"
                );
            }
            inner.state = result.new_state;

            let mut service_calls = Vec::new();
            for effect in result.effects {
                if effect.is_local() {
                    inner.apply_local(effect, &mut changes);
                } else {
                    service_calls.push(effect);
                }
            }
            (service_calls, inner.snapshot(&changes))
        };

        self.publish(snapshot);
        Ok(service_calls)
    }

    async fn execute(&self, effect: Effect, report: &mut DriveReport) -> Option<Event> {
        match effect {
            Effect::DeliverMessage { text } => {
                let event = match self.transport.send_message(&text).await {
                    Ok(reply) => Event::ReplyReceived {
                        reply,
                        received_at: Utc::now(),
                    },
                    Err(error) => Event::SendFailed {
                        error,
                        failed_at: Utc::now(),
                    },
                };
                Some(event)
            }
            Effect::RequestSwitch { session_id } => {
                let event = match self.transport.switch_session(&session_id).await {
                    Ok(()) => Event::SwitchAcknowledged,
                    Err(error) => Event::SwitchFailed { error },
                };
                Some(event)
            }
            Effect::RequestCreate => {
                let event = match self.create_checked().await {
                    Ok(session) => Event::SessionCreated { session },
                    Err(error) => Event::SwitchFailed { error },
                };
                Some(event)
            }
            Effect::FetchHistory => {
                let event = match self.transport.fetch_history().await {
                    Ok(messages) => Event::HistoryLoaded { messages },
                    Err(error) => Event::HistoryFailed { error },
                };
                Some(event)
            }
            Effect::RequestDelete { session_id } => {
                let event = match self.transport.delete_session(&session_id).await {
                    Ok(()) => Event::SessionDeleted { session_id },
                    Err(error) => Event::MutationFailed { error },
                };
                Some(event)
            }
            Effect::RequestDeleteAll => {
                let event = match self.transport.delete_all_sessions().await {
                    Ok(()) => Event::AllSessionsDeleted,
                    Err(error) => Event::MutationFailed { error },
                };
                Some(event)
            }
            Effect::RequestClear => {
                let event = match self.transport.clear_history().await {
                    Ok(()) => Event::HistoryCleared,
                    Err(error) => Event::MutationFailed { error },
                };
                Some(event)
            }
            Effect::RefreshSessions {
                settle,
                reload_history,
            } => {
                if let Err(error) = self.refresh_sessions(reload_history).await {
                    report.refresh_failure.get_or_insert(error);
                }
                settle.then_some(Event::Reconciled)
            }
            local => {
                tracing::error!(effect = ?local, "Local effect reached the service executor");
                None
            }
        }
    }

    // ========================================================================
    // Session list refresh
    // ========================================================================

    /// Reload the session list from the service and fold it into the registry
    ///
    /// An empty list triggers exactly one create; if the service still lists
    /// nothing afterwards the refresh fails instead of trying again. When the
    /// selection moves, or `reload_history` is set, the current session's
    /// history is loaded.
    async fn refresh_sessions(&self, reload_history: bool) -> Result<(), ChatError> {
        let mut sessions = self.transport.list_sessions().await?;
        let created = sessions.is_empty();

        if created {
            tracing::info!("Service lists no sessions, creating one");
            let created = self.create_checked().await?;
            let id = created.session_id.clone();
            self.mutate(|inner, changes| {
                inner.registry.upsert_local(created.with_current(true));
                inner.registry.set_current(Some(id));
                inner.store.clear();
                changes.sessions = true;
                changes.messages = true;
            });

            sessions = self.transport.list_sessions().await?;
            if sessions.is_empty() {
                return Err(ChatError::service(
                    "Service listed no sessions after creating one",
                ));
            }
        }

        let reconciliation = self.mutate(|inner, changes| {
            changes.sessions = true;
            inner.registry.reconcile(sessions)
        });

        // A freshly created session has no history to fetch
        let stale_log = reconciliation.selection_changed() || (reload_history && !created);
        match reconciliation.current {
            Some(current) if stale_log => self.load_history_for(&current).await,
            _ => Ok(()),
        }
    }

    async fn load_history_for(&self, session_id: &SessionId) -> Result<(), ChatError> {
        tracing::debug!(session_id = %session_id, "Loading history for selected session");
        let messages = self.transport.fetch_history().await?;
        self.mutate(|inner, changes| {
            if inner.registry.is_current(session_id) {
                inner.store.replace(messages);
                changes.messages = true;
            } else {
                tracing::debug!(session_id = %session_id, "Selection moved on, history dropped");
            }
        });
        Ok(())
    }

    async fn create_checked(&self) -> Result<Session, ChatError> {
        let session = self.transport.create_session().await?;
        if session.session_id.is_empty() {
            return Err(ChatError::service("Service created a session without an id"));
        }
        Ok(session)
    }

    // ========================================================================
    // Plumbing
    // ========================================================================

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Change store or registry outside a transition, then notify
    fn mutate<V>(&self, f: impl FnOnce(&mut Inner, &mut Changes) -> V) -> V {
        let (value, snapshot) = {
            let mut inner = self.lock();
            let mut changes = Changes::default();
            let value = f(&mut inner, &mut changes);
            (value, inner.snapshot(&changes))
        };
        self.publish(snapshot);
        value
    }

    fn publish(&self, snapshot: Snapshot) {
        if let Some(state) = &snapshot.state {
            self.renderer.on_state_changed(state);
        }
        if let Some(sessions) = &snapshot.sessions {
            self.renderer.on_sessions_changed(sessions);
        }
        if let Some(messages) = &snapshot.messages {
            self.renderer.on_messages_changed(messages);
        }
    }

    fn surface(&self, error: ChatError) -> ChatError {
        tracing::warn!(
            kind = error.kind.as_str(),
            status = ?error.status,
            error = %error,
            "Chat operation failed"
        );
        self.renderer.on_error(&error);
        error
    }
}
