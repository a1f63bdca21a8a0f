//! Property-based tests for the state machine
//!
//! These tests verify key invariants hold across all possible inputs.

use super::transition::*;
use super::*;
use crate::error::ChatError;
use crate::model::{LocalRef, MessageStatus, Sender, Session, SessionId};
use crate::transport::ChatReply;
use chrono::Utc;
use proptest::prelude::*;

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_session_id() -> impl Strategy<Value = SessionId> {
    "[a-d]".prop_map(SessionId::new)
}

fn arb_context() -> impl Strategy<Value = ControllerContext> {
    (proptest::option::of(arb_session_id()), 0u64..3)
        .prop_map(|(current, generation)| ControllerContext::new(current, generation))
}

fn arb_phase() -> impl Strategy<Value = Phase> {
    prop_oneof![
        Just(Phase::AwaitingService),
        Just(Phase::LoadingHistory),
        Just(Phase::Reconciling),
    ]
}

fn arb_busy_state() -> impl Strategy<Value = ControllerState> {
    prop_oneof![
        (0u64..3, arb_phase()).prop_map(|(generation, phase)| ControllerState::Sending {
            pending: LocalRef::new(),
            generation,
            phase,
        }),
        (proptest::option::of(arb_session_id()), arb_phase()).prop_map(|(target, phase)| {
            ControllerState::Switching {
                target: target.map_or(SwitchTarget::Fresh, SwitchTarget::Existing),
                phase,
            }
        }),
    ]
}

fn arb_state() -> impl Strategy<Value = ControllerState> {
    prop_oneof![Just(ControllerState::Idle), arb_busy_state()]
}

fn arb_error() -> impl Strategy<Value = ChatError> {
    prop_oneof![
        Just(ChatError::network("offline")),
        Just(ChatError::service("boom").with_status(500)),
        Just(ChatError::not_found("Session not found").with_status(404)),
    ]
}

fn arb_text() -> impl Strategy<Value = String> {
    prop_oneof!["[a-zA-Z ]{1,20}", "[ \t\n]{0,4}"]
}

fn arb_intent() -> impl Strategy<Value = Event> {
    prop_oneof![
        "[a-zA-Z]{1,20}".prop_map(|text| Event::SendRequested {
            text,
            local_ref: LocalRef::new(),
            sent_at: Utc::now(),
        }),
        arb_session_id().prop_map(|session_id| Event::SwitchRequested { session_id }),
        Just(Event::CreateRequested),
        arb_session_id().prop_map(|session_id| Event::DeleteRequested { session_id }),
        Just(Event::DeleteAllRequested),
        Just(Event::ClearRequested),
    ]
}

fn arb_outcome() -> impl Strategy<Value = Event> {
    prop_oneof![
        "[a-z ]{0,20}".prop_map(|text| Event::ReplyReceived {
            reply: ChatReply {
                response_text: text,
                session_id: SessionId::new("a"),
            },
            received_at: Utc::now(),
        }),
        arb_error().prop_map(|error| Event::SendFailed {
            error,
            failed_at: Utc::now(),
        }),
        Just(Event::SwitchAcknowledged),
        arb_session_id().prop_map(|id| Event::SessionCreated {
            session: Session::new(id, "New Chat"),
        }),
        arb_error().prop_map(|error| Event::SwitchFailed { error }),
        Just(Event::HistoryLoaded { messages: vec![] }),
        arb_error().prop_map(|error| Event::HistoryFailed { error }),
        arb_session_id().prop_map(|session_id| Event::SessionDeleted { session_id }),
        Just(Event::AllSessionsDeleted),
        Just(Event::HistoryCleared),
        arb_error().prop_map(|error| Event::MutationFailed { error }),
        Just(Event::Reconciled),
    ]
}

fn arb_event() -> impl Strategy<Value = Event> {
    prop_oneof![arb_intent(), arb_outcome()]
}

// ============================================================================
// Effect Checkers
// ============================================================================

fn service_calls(effects: &[Effect]) -> usize {
    effects.iter().filter(|e| !e.is_local()).count()
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    // Blank text never reaches the service, whatever the state
    #[test]
    fn prop_blank_text_never_sent(state in arb_state(), ctx in arb_context(), text in "[ \t\n]{0,6}") {
        let event = Event::SendRequested { text, local_ref: LocalRef::new(), sent_at: Utc::now() };
        prop_assert_eq!(transition(&state, &ctx, event).unwrap_err(), TransitionError::EmptyMessage);
    }

    // Busy states accept no new intents
    #[test]
    fn prop_busy_rejects_intents(state in arb_busy_state(), ctx in arb_context(), event in arb_intent()) {
        let result = transition(&state, &ctx, event);
        prop_assert!(
            matches!(result, Err(TransitionError::Busy(_))),
            "Busy state should reject intents, got {:?}",
            result
        );
    }

    // Idle accepts every valid intent and issues exactly one service call
    #[test]
    fn prop_idle_accepts_intents(ctx in arb_context(), event in arb_intent()) {
        let result = transition(&ControllerState::Idle, &ctx, event);
        prop_assert!(result.is_ok(), "Idle should accept intents: {:?}", result);
        prop_assert_eq!(service_calls(&result.unwrap().effects), 1);
    }

    // A successful reply for the displayed log is appended before the
    // pending message is confirmed
    #[test]
    fn prop_reply_ordering(ctx in arb_context(), text in "[a-z ]{0,20}") {
        let pending = LocalRef::new();
        let state = ControllerState::Sending { pending, generation: ctx.generation, phase: Phase::AwaitingService };
        let event = Event::ReplyReceived {
            reply: ChatReply { response_text: text, session_id: SessionId::new("a") },
            received_at: Utc::now(),
        };
        let result = transition(&state, &ctx, event).unwrap();

        let append = result.effects.iter().position(|e| matches!(e, Effect::AppendMessage(m) if m.sender == Sender::Assistant));
        let confirm = result.effects.iter().position(|e| matches!(
            e,
            Effect::MarkStatus { local_ref, status: MessageStatus::Confirmed } if *local_ref == pending
        ));
        prop_assert!(append.is_some() && confirm.is_some());
        prop_assert!(append < confirm);
    }

    // A failed send marks the pending message failed and appends exactly one
    // system notice; nothing is removed
    #[test]
    fn prop_failed_send_appends_one_notice(ctx in arb_context(), error in arb_error()) {
        let pending = LocalRef::new();
        let state = ControllerState::Sending { pending, generation: ctx.generation, phase: Phase::AwaitingService };
        let result = transition(&state, &ctx, Event::SendFailed { error, failed_at: Utc::now() }).unwrap();

        prop_assert_eq!(result.new_state, ControllerState::Idle);
        let notices = result.effects.iter().filter(|e| matches!(e, Effect::AppendMessage(m) if m.sender == Sender::System)).count();
        prop_assert_eq!(notices, 1);
        prop_assert!(!result.effects.iter().any(|e| matches!(e, Effect::ClearMessages | Effect::ReplaceMessages(_))));
        let marked_failed = Effect::MarkStatus { local_ref: pending, status: MessageStatus::Failed };
        prop_assert!(result.effects.contains(&marked_failed));
    }

    // History is only ever replaced after the log was cleared for the new
    // session in an earlier step of the same switch
    #[test]
    fn prop_switch_clears_before_replacing(events in proptest::collection::vec(arb_event(), 0..25), ctx in arb_context()) {
        let mut state = ControllerState::Idle;
        let mut cleared_since_switch = false;

        for event in events {
            if let Ok(result) = transition(&state, &ctx, event) {
                for effect in &result.effects {
                    match effect {
                        Effect::ClearMessages => cleared_since_switch = true,
                        Effect::ReplaceMessages(_) => prop_assert!(cleared_since_switch),
                        Effect::RequestSwitch { .. } => cleared_since_switch = false,
                        _ => {}
                    }
                }
                state = result.new_state;
            }
        }
    }

    // Exclusive operations always have a way back to Idle
    #[test]
    fn prop_busy_states_settle(events in proptest::collection::vec(arb_event(), 0..25), ctx in arb_context()) {
        let mut state = ControllerState::Idle;
        for event in events {
            if let Ok(result) = transition(&state, &ctx, event) {
                state = result.new_state;
            }
        }
        // Drive to completion with the happy-path outcomes
        for event in [
            Event::SwitchAcknowledged,
            Event::HistoryLoaded { messages: vec![] },
            Event::ReplyReceived {
                reply: ChatReply { response_text: "ok".into(), session_id: SessionId::new("a") },
                received_at: Utc::now(),
            },
            Event::SessionCreated { session: Session::new("z", "New Chat") },
            Event::Reconciled,
        ] {
            if let Ok(result) = transition(&state, &ctx, event) {
                state = result.new_state;
            }
            if state == ControllerState::Idle {
                break;
            }
        }
        prop_assert_eq!(state, ControllerState::Idle);
    }

    // Random text inputs: accepted iff they contain a visible character
    #[test]
    fn prop_idle_send_acceptance(ctx in arb_context(), text in arb_text()) {
        let accepted = !text.trim().is_empty();
        let event = Event::SendRequested { text, local_ref: LocalRef::new(), sent_at: Utc::now() };
        prop_assert_eq!(transition(&ControllerState::Idle, &ctx, event).is_ok(), accepted);
    }
}
