//! Controller state types

use crate::model::{LocalRef, SessionId};

/// Progress of an exclusive operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Waiting on the primary service call (chat, switch, create)
    AwaitingService,
    /// Switch acknowledged, history for the new session in flight
    LoadingHistory,
    /// Local state applied, waiting for the session list refresh
    Reconciling,
}

/// Which session a switch is heading for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwitchTarget {
    Existing(SessionId),
    /// A session the service is about to create
    Fresh,
}

/// Controller state
///
/// `Sending` and `Switching` are exclusive: while either is active no other
/// intent that mutates service state is accepted.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ControllerState {
    #[default]
    Idle,

    Sending {
        /// The optimistic user message awaiting confirmation
        pending: LocalRef,
        /// Store generation when the message was appended
        generation: u64,
        phase: Phase,
    },

    Switching {
        target: SwitchTarget,
        phase: Phase,
    },
}

impl ControllerState {
    pub fn is_busy(&self) -> bool {
        !matches!(self, ControllerState::Idle)
    }

    pub fn name(&self) -> &'static str {
        match self {
            ControllerState::Idle => "idle",
            ControllerState::Sending { .. } => "sending",
            ControllerState::Switching { .. } => "switching",
        }
    }
}

/// Store and registry facts a transition depends on, captured atomically
/// with the state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ControllerContext {
    pub current_session: Option<SessionId>,
    pub generation: u64,
}

impl ControllerContext {
    pub fn new(current_session: Option<SessionId>, generation: u64) -> Self {
        Self {
            current_session,
            generation,
        }
    }
}
