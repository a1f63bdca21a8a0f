//! Effects produced by state transitions

use crate::model::{LocalRef, Message, MessageStatus, Session, SessionId};

/// Effects to be executed after a state transition
///
/// Local effects touch the message store or session registry and are applied
/// together with the transition. The rest are service calls.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    AppendMessage(Message),
    MarkStatus {
        local_ref: LocalRef,
        status: MessageStatus,
    },
    ClearMessages,
    ReplaceMessages(Vec<Message>),
    SetCurrent(SessionId),
    UpsertSession(Session),
    /// Drop a session from the cache, reselecting locally if it was current
    RemoveSession(SessionId),
    ClearSessions,

    DeliverMessage {
        text: String,
    },
    RequestSwitch {
        session_id: SessionId,
    },
    RequestCreate,
    FetchHistory,
    RequestDelete {
        session_id: SessionId,
    },
    RequestDeleteAll,
    RequestClear,
    /// Reload the session list; `settle` reports `Event::Reconciled` when
    /// done, `reload_history` fetches history even if the selection holds
    RefreshSessions {
        settle: bool,
        reload_history: bool,
    },
}

impl Effect {
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            Effect::AppendMessage(_)
                | Effect::MarkStatus { .. }
                | Effect::ClearMessages
                | Effect::ReplaceMessages(_)
                | Effect::SetCurrent(_)
                | Effect::UpsertSession(_)
                | Effect::RemoveSession(_)
                | Effect::ClearSessions
        )
    }

    /// Whether this effect changes what the message list shows
    pub fn touches_messages(&self) -> bool {
        matches!(
            self,
            Effect::AppendMessage(_)
                | Effect::MarkStatus { .. }
                | Effect::ClearMessages
                | Effect::ReplaceMessages(_)
        )
    }

    pub fn settle_refresh() -> Self {
        Effect::RefreshSessions {
            settle: true,
            reload_history: false,
        }
    }

    pub fn background_refresh() -> Self {
        Effect::RefreshSessions {
            settle: false,
            reload_history: false,
        }
    }

    /// Background refresh after the displayed session went away locally
    pub fn reselect_refresh() -> Self {
        Effect::RefreshSessions {
            settle: false,
            reload_history: true,
        }
    }
}
