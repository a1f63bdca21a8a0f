//! Events that drive the controller state machine

use crate::error::ChatError;
use crate::model::{LocalRef, Message, Session, SessionId};
use crate::transport::ChatReply;
use chrono::{DateTime, Utc};

/// Events that trigger state transitions
#[derive(Debug, Clone)]
pub enum Event {
    // User intents
    SendRequested {
        text: String,
        local_ref: LocalRef,
        sent_at: DateTime<Utc>,
    },
    SwitchRequested {
        session_id: SessionId,
    },
    CreateRequested,
    DeleteRequested {
        session_id: SessionId,
    },
    DeleteAllRequested,
    ClearRequested,

    // Service outcomes
    ReplyReceived {
        reply: ChatReply,
        received_at: DateTime<Utc>,
    },
    SendFailed {
        error: ChatError,
        failed_at: DateTime<Utc>,
    },
    SwitchAcknowledged,
    SessionCreated {
        session: Session,
    },
    /// The switch or create call itself failed
    SwitchFailed {
        error: ChatError,
    },
    HistoryLoaded {
        messages: Vec<Message>,
    },
    HistoryFailed {
        error: ChatError,
    },
    SessionDeleted {
        session_id: SessionId,
    },
    AllSessionsDeleted,
    HistoryCleared,
    /// A delete or clear call failed; nothing local changes
    MutationFailed {
        error: ChatError,
    },
    /// The refresh that closes an exclusive operation finished
    Reconciled,
}

impl Event {
    /// Service error carried by a failure event
    pub fn error(&self) -> Option<&ChatError> {
        match self {
            Event::SendFailed { error, .. }
            | Event::SwitchFailed { error }
            | Event::HistoryFailed { error }
            | Event::MutationFailed { error } => Some(error),
            _ => None,
        }
    }
}
