//! Pure state transition function

use super::{ControllerContext, ControllerState, Effect, Event, Phase, SwitchTarget};
use crate::error::{ChatError, ErrorKind};
use crate::model::{Message, MessageStatus};
use thiserror::Error;

const CONNECTION_NOTICE: &str = "I'm sorry, I'm having trouble connecting. Please try again.";
const SERVICE_NOTICE: &str = "I'm sorry, I encountered an issue. Please try again.";

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: ControllerState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: ControllerState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    #[must_use]
    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    #[must_use]
    pub fn with_effects(mut self, effects: impl IntoIterator<Item = Effect>) -> Self {
        self.effects.extend(effects);
        self
    }
}

/// Errors that can occur during transition
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("Message text is empty")]
    EmptyMessage,
    #[error("Controller is {0}, intent not accepted")]
    Busy(&'static str),
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
}

/// Pure transition function
///
/// Given the same inputs it always produces the same outputs; all I/O is
/// expressed as effects.
pub fn transition(
    state: &ControllerState,
    context: &ControllerContext,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    match (state, event) {
        // ============================================================
        // Sending
        // ============================================================

        // Validation comes before the busy guard
        (_, Event::SendRequested { text, .. }) if text.trim().is_empty() => {
            Err(TransitionError::EmptyMessage)
        }

        (
            ControllerState::Idle,
            Event::SendRequested {
                text,
                local_ref,
                sent_at,
            },
        ) => {
            let text = text.trim().to_string();
            Ok(TransitionResult::new(ControllerState::Sending {
                pending: local_ref,
                generation: context.generation,
                phase: Phase::AwaitingService,
            })
            .with_effect(Effect::AppendMessage(Message::pending_user(
                &text, local_ref, sent_at,
            )))
            .with_effect(Effect::DeliverMessage { text }))
        }

        (
            ControllerState::Sending {
                pending,
                generation,
                phase: Phase::AwaitingService,
            },
            Event::ReplyReceived { reply, received_at },
        ) => {
            let next = ControllerState::Sending {
                pending: *pending,
                generation: *generation,
                phase: Phase::Reconciling,
            };
            if *generation == context.generation {
                let result = TransitionResult::new(next)
                    .with_effect(Effect::AppendMessage(Message::assistant(
                        &reply.response_text,
                        received_at,
                    )))
                    .with_effect(Effect::MarkStatus {
                        local_ref: *pending,
                        status: MessageStatus::Confirmed,
                    });
                // The service names the session the message landed in; the
                // log belongs to that session
                let result = if !reply.session_id.is_empty()
                    && context.current_session.as_ref() != Some(&reply.session_id)
                {
                    result.with_effect(Effect::SetCurrent(reply.session_id))
                } else {
                    result
                };
                Ok(result.with_effect(Effect::settle_refresh()))
            } else {
                // The log was reset while the reply was in flight; it belongs
                // to a conversation that is no longer displayed
                Ok(TransitionResult::new(next).with_effect(Effect::settle_refresh()))
            }
        }

        (
            ControllerState::Sending {
                pending,
                generation,
                phase: Phase::AwaitingService,
            },
            Event::SendFailed { error, failed_at },
        ) => {
            let result = TransitionResult::new(ControllerState::Idle);
            if *generation == context.generation {
                Ok(result
                    .with_effect(Effect::MarkStatus {
                        local_ref: *pending,
                        status: MessageStatus::Failed,
                    })
                    .with_effect(Effect::AppendMessage(Message::system_error(
                        failure_notice(&error),
                        failed_at,
                    ))))
            } else {
                Ok(result)
            }
        }

        // ============================================================
        // Switching
        // ============================================================
        (ControllerState::Idle, Event::SwitchRequested { session_id }) => Ok(
            TransitionResult::new(ControllerState::Switching {
                target: SwitchTarget::Existing(session_id.clone()),
                phase: Phase::AwaitingService,
            })
            .with_effect(Effect::RequestSwitch { session_id }),
        ),

        (ControllerState::Idle, Event::CreateRequested) => Ok(TransitionResult::new(
            ControllerState::Switching {
                target: SwitchTarget::Fresh,
                phase: Phase::AwaitingService,
            },
        )
        .with_effect(Effect::RequestCreate)),

        (
            ControllerState::Switching {
                target: SwitchTarget::Existing(session_id),
                phase: Phase::AwaitingService,
            },
            Event::SwitchAcknowledged,
        ) => Ok(TransitionResult::new(ControllerState::Switching {
            target: SwitchTarget::Existing(session_id.clone()),
            phase: Phase::LoadingHistory,
        })
        .with_effects([
            Effect::SetCurrent(session_id.clone()),
            Effect::ClearMessages,
            Effect::FetchHistory,
        ])),

        (
            ControllerState::Switching {
                target: SwitchTarget::Fresh,
                phase: Phase::AwaitingService,
            },
            Event::SessionCreated { session },
        ) => {
            let session_id = session.session_id.clone();
            Ok(TransitionResult::new(ControllerState::Switching {
                target: SwitchTarget::Existing(session_id.clone()),
                phase: Phase::Reconciling,
            })
            .with_effects([
                Effect::UpsertSession(session.with_current(true)),
                Effect::SetCurrent(session_id),
                Effect::ClearMessages,
                Effect::settle_refresh(),
            ]))
        }

        // Registry and store stay as they were
        (
            ControllerState::Switching {
                phase: Phase::AwaitingService,
                ..
            },
            Event::SwitchFailed { .. },
        ) => Ok(TransitionResult::new(ControllerState::Idle)),

        (
            ControllerState::Switching {
                target: SwitchTarget::Existing(session_id),
                phase: Phase::LoadingHistory,
            },
            Event::HistoryLoaded { messages },
        ) => Ok(TransitionResult::new(ControllerState::Switching {
            target: SwitchTarget::Existing(session_id.clone()),
            phase: Phase::Reconciling,
        })
        .with_effects([Effect::ReplaceMessages(messages), Effect::settle_refresh()])),

        // The switch itself went through; show an empty log and carry on
        (
            ControllerState::Switching {
                target,
                phase: Phase::LoadingHistory,
            },
            Event::HistoryFailed { .. },
        ) => Ok(TransitionResult::new(ControllerState::Switching {
            target: target.clone(),
            phase: Phase::Reconciling,
        })
        .with_effect(Effect::settle_refresh())),

        (
            ControllerState::Sending {
                phase: Phase::Reconciling,
                ..
            }
            | ControllerState::Switching {
                phase: Phase::Reconciling,
                ..
            },
            Event::Reconciled,
        ) => Ok(TransitionResult::new(ControllerState::Idle)),

        // ============================================================
        // Non-exclusive mutations
        // ============================================================
        (ControllerState::Idle, Event::DeleteRequested { session_id }) => {
            Ok(TransitionResult::new(ControllerState::Idle)
                .with_effect(Effect::RequestDelete { session_id }))
        }

        (ControllerState::Idle, Event::DeleteAllRequested) => {
            Ok(TransitionResult::new(ControllerState::Idle).with_effect(Effect::RequestDeleteAll))
        }

        (ControllerState::Idle, Event::ClearRequested) => {
            Ok(TransitionResult::new(ControllerState::Idle).with_effect(Effect::RequestClear))
        }

        // Completions of non-exclusive calls may land in any state
        (state, Event::SessionDeleted { session_id }) => {
            let was_current = context.current_session.as_ref() == Some(&session_id);
            let result =
                TransitionResult::new(state.clone()).with_effect(Effect::RemoveSession(session_id));
            if was_current {
                Ok(result.with_effects([Effect::ClearMessages, Effect::reselect_refresh()]))
            } else {
                Ok(result.with_effect(Effect::background_refresh()))
            }
        }

        (state, Event::AllSessionsDeleted) => Ok(TransitionResult::new(state.clone())
            .with_effects([
                Effect::ClearSessions,
                Effect::ClearMessages,
                Effect::background_refresh(),
            ])),

        (state, Event::HistoryCleared) => Ok(TransitionResult::new(state.clone())
            .with_effects([Effect::ClearMessages, Effect::background_refresh()])),

        (state, Event::MutationFailed { .. }) => Ok(TransitionResult::new(state.clone())),

        // ============================================================
        // Guard
        // ============================================================
        (
            ControllerState::Sending { .. } | ControllerState::Switching { .. },
            Event::SendRequested { .. }
            | Event::SwitchRequested { .. }
            | Event::CreateRequested
            | Event::DeleteRequested { .. }
            | Event::DeleteAllRequested
            | Event::ClearRequested,
        ) => Err(TransitionError::Busy(state.name())),

        (state, event) => Err(TransitionError::InvalidTransition(format!(
            "{event:?} in state {}",
            state.name()
        ))),
    }
}

/// Text of the system message appended after a failed send
fn failure_notice(error: &ChatError) -> &'static str {
    match error.kind {
        ErrorKind::NetworkUnavailable => CONNECTION_NOTICE,
        ErrorKind::ServiceError | ErrorKind::NotFound | ErrorKind::Validation => SERVICE_NOTICE,
    }
}
