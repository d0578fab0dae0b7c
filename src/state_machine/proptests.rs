//! Property-based tests for the state machine
//!
//! These tests verify key invariants hold across all possible inputs.

use super::state::*;
use super::transition::*;
use super::*;
use crate::assembler::{Role, Transcript, END_OF_ERROR_RESPONSE, END_OF_RESPONSE};
use proptest::prelude::*;
use std::time::Duration;

// ============================================================================
// Test Helpers
// ============================================================================

fn test_context() -> SessionContext {
    SessionContext::new(
        "test-session",
        RecoveryPolicy::AutoReset {
            delay: Duration::from_secs(5),
        },
    )
}

/// Apply the transcript-affecting effects the way the runtime does
fn apply(
    state: &SessionState,
    transcript: &mut Transcript,
    event: Event,
) -> (SessionState, Vec<Effect>) {
    match transition(state, &test_context(), event) {
        Ok(result) => {
            for effect in &result.effects {
                match effect {
                    Effect::AppendUserMessage { text } => transcript.push_user(text.clone()),
                    Effect::AppendFragment { text } => transcript.append_fragment(text),
                    Effect::ClearHistory => transcript.clear(),
                    _ => {}
                }
            }
            (result.new_state, result.effects)
        }
        Err(_) => (state.clone(), vec![]),
    }
}

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_content_fragment() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 .,!\\[\\]_]{0,24}"
        .prop_filter("sentinels are not content", |s| {
            s != END_OF_RESPONSE && s != END_OF_ERROR_RESPONSE
        })
}

fn arb_error_kind() -> impl Strategy<Value = ErrorKind> {
    prop_oneof![Just(ErrorKind::Protocol), Just(ErrorKind::Transport)]
}

fn arb_phase() -> impl Strategy<Value = Phase> {
    prop_oneof![
        Just(Phase::Idle),
        Just(Phase::Pending),
        Just(Phase::Streaming),
        ("[a-zA-Z ]{1,30}", arb_error_kind())
            .prop_map(|(message, kind)| Phase::Error { message, kind }),
    ]
}

fn arb_link() -> impl Strategy<Value = LinkState> {
    prop_oneof![
        Just(LinkState::Connecting),
        Just(LinkState::Open),
        Just(LinkState::Closed),
    ]
}

fn arb_state() -> impl Strategy<Value = SessionState> {
    (arb_phase(), arb_link()).prop_map(|(phase, link)| SessionState::new(phase, link))
}

fn arb_event() -> impl Strategy<Value = Event> {
    prop_oneof![
        3 => "[a-z ]{0,12}".prop_map(Event::submit),
        6 => arb_content_fragment().prop_map(Event::fragment),
        2 => Just(Event::fragment(END_OF_RESPONSE)),
        1 => Just(Event::fragment(END_OF_ERROR_RESPONSE)),
        2 => Just(Event::Opened),
        1 => proptest::option::of("[a-z ]{1,12}").prop_map(|reason| Event::Closed { reason }),
        1 => Just(Event::Clear),
        1 => Just(Event::Reset),
        1 => Just(Event::Reconnect),
        1 => Just(Event::RecoveryTimeout),
    ]
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #[test]
    fn prop_reply_is_concatenation_of_fragments(
        fragments in proptest::collection::vec(arb_content_fragment(), 1..20)
    ) {
        let mut transcript = Transcript::new();
        let mut state = SessionState::new(Phase::Idle, LinkState::Open);

        (state, _) = apply(&state, &mut transcript, Event::submit("question"));
        for fragment in &fragments {
            (state, _) = apply(&state, &mut transcript, Event::fragment(fragment.clone()));
            prop_assert_eq!(&state.phase, &Phase::Streaming);
        }
        let before = transcript.clone();
        (state, _) = apply(&state, &mut transcript, Event::fragment(END_OF_RESPONSE));

        prop_assert_eq!(&state.phase, &Phase::Idle);
        prop_assert_eq!(&transcript, &before);
        prop_assert_eq!(transcript.len(), 2);
        let reply = transcript.last().unwrap();
        prop_assert_eq!(reply.role, Role::Assistant);
        prop_assert_eq!(&reply.content, &fragments.concat());
    }

    #[test]
    fn prop_blank_submit_never_changes_anything(
        state in arb_state(),
        blank in "[ \t\n]{0,8}"
    ) {
        let result = transition(&state, &test_context(), Event::submit(blank)).unwrap();
        prop_assert_eq!(result.new_state, state);
        prop_assert!(result.effects.is_empty());
    }

    #[test]
    fn prop_clear_always_yields_idle_and_empty_history(
        events in proptest::collection::vec(arb_event(), 0..30)
    ) {
        let mut transcript = Transcript::new();
        let mut state = SessionState::new(Phase::Idle, LinkState::Open);
        for event in events {
            (state, _) = apply(&state, &mut transcript, event);
        }

        (state, _) = apply(&state, &mut transcript, Event::Clear);
        prop_assert_eq!(&state.phase, &Phase::Idle);
        prop_assert!(transcript.is_empty());
    }

    #[test]
    fn prop_submit_refused_while_reply_outstanding(
        phase in prop_oneof![Just(Phase::Pending), Just(Phase::Streaming)],
        link in arb_link(),
        text in "[a-z]{1,12}"
    ) {
        let state = SessionState::new(phase, link);
        let result = transition(&state, &test_context(), Event::submit(text));
        prop_assert_eq!(result.unwrap_err(), TransitionError::Busy);
    }

    #[test]
    fn prop_error_sentinel_closes_exactly_once(
        prefix in proptest::collection::vec(arb_content_fragment(), 0..5),
        suffix in proptest::collection::vec(arb_event(), 0..10)
    ) {
        let mut transcript = Transcript::new();
        let mut state = SessionState::new(Phase::Idle, LinkState::Open);
        (state, _) = apply(&state, &mut transcript, Event::submit("x"));
        for fragment in prefix {
            (state, _) = apply(&state, &mut transcript, Event::fragment(fragment));
        }

        let effects;
        (state, effects) = apply(&state, &mut transcript, Event::fragment(END_OF_ERROR_RESPONSE));
        let failed = matches!(state.phase, Phase::Error { kind: ErrorKind::Protocol, .. });
        prop_assert!(failed, "expected protocol error, got {:?}", state.phase);
        prop_assert!(!state.phase.error_message().unwrap_or_default().is_empty());
        let closes = effects.iter().filter(|e| **e == Effect::CloseConnection).count();
        prop_assert_eq!(closes, 1);

        // Nothing short of a reset or clear may close the dead channel again
        for event in suffix {
            if matches!(event, Event::Reset | Event::RecoveryTimeout | Event::Clear | Event::Opened) {
                break;
            }
            let effects;
            (state, effects) = apply(&state, &mut transcript, event);
            prop_assert!(!effects.contains(&Effect::CloseConnection));
        }
    }

    #[test]
    fn prop_transcript_tail_tracks_phase(
        events in proptest::collection::vec(arb_event(), 0..40)
    ) {
        let mut transcript = Transcript::new();
        let mut state = SessionState::new(Phase::Idle, LinkState::Open);
        for event in events {
            (state, _) = apply(&state, &mut transcript, event);

            match state.phase {
                Phase::Pending => prop_assert_eq!(transcript.last().map(|m| m.role), Some(Role::User)),
                Phase::Streaming => prop_assert_eq!(transcript.last().map(|m| m.role), Some(Role::Assistant)),
                Phase::Error { ref message, .. } => prop_assert!(!message.is_empty()),
                Phase::Idle => {}
            }
            prop_assert!(transcript
                .messages()
                .iter()
                .filter(|m| m.role == Role::User)
                .all(|m| !m.content.trim().is_empty()));
        }
    }
}
