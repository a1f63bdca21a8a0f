//! Boundary between the controller and whatever draws the conversation

use crate::error::ChatError;
use crate::model::{Message, Session};
use crate::state_machine::ControllerState;
use std::sync::Arc;

/// Receives state-change notifications from the controller
///
/// Callbacks run synchronously on the controller's task with a snapshot of
/// the changed state; implementations should copy what they need and return.
pub trait Renderer: Send + Sync {
    fn on_sessions_changed(&self, sessions: &[Session]);

    fn on_messages_changed(&self, messages: &[Message]);

    /// Typing indicator, disabled send button and the like
    fn on_state_changed(&self, _state: &ControllerState) {}

    /// Session-management failures meant for a toast or modal
    fn on_error(&self, _error: &ChatError) {}
}

impl<T: Renderer + ?Sized> Renderer for Arc<T> {
    fn on_sessions_changed(&self, sessions: &[Session]) {
        (**self).on_sessions_changed(sessions);
    }

    fn on_messages_changed(&self, messages: &[Message]) {
        (**self).on_messages_changed(messages);
    }

    fn on_state_changed(&self, state: &ControllerState) {
        (**self).on_state_changed(state);
    }

    fn on_error(&self, error: &ChatError) {
        (**self).on_error(error);
    }
}

/// Renderer that ignores every notification
#[derive(Debug, Default, Clone, Copy)]
pub struct NullRenderer;

impl Renderer for NullRenderer {
    fn on_sessions_changed(&self, _sessions: &[Session]) {}

    fn on_messages_changed(&self, _messages: &[Message]) {}
}
