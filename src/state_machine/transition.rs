//! Pure state transition function

use super::state::{ErrorKind, LinkState, Phase, RecoveryPolicy, SessionContext, SessionState};
use super::{Effect, Event};
use crate::assembler::{classify, Inbound};
use thiserror::Error;

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: SessionState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: SessionState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    pub fn with_effects(mut self, effects: impl IntoIterator<Item = Effect>) -> Self {
        self.effects.extend(effects);
        self
    }
}

/// Errors that can occur during transition
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("A reply is still streaming, wait for it to finish")]
    Busy,
    #[error("Not connected to the server")]
    NotConnected,
    #[error("The session failed and must be reset before sending")]
    SessionFailed,
    #[error("Content fragment received while {0}")]
    UnexpectedFragment(&'static str),
}

impl TransitionError {
    /// Refusals of user commands are shown to the user; protocol noise is only logged
    pub fn is_user_facing(&self) -> bool {
        !matches!(self, TransitionError::UnexpectedFragment(_))
    }
}

/// Pure transition function
///
/// Given the same inputs it always produces the same outputs; all I/O is
/// described by the returned effects.
pub fn transition(
    state: &SessionState,
    context: &SessionContext,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    match event {
        Event::Submit { text } => submit(state, text),
        Event::Fragment { text } => fragment(state, context, &text),

        Event::Opened => {
            let phase = match &state.phase {
                Phase::Error {
                    kind: ErrorKind::Transport,
                    ..
                } => Phase::Idle,
                other => other.clone(),
            };
            Ok(TransitionResult::new(SessionState::new(phase, LinkState::Open)))
        }

        Event::Closed { reason } => {
            let closed = state.with_link(LinkState::Closed);
            if state.phase.is_pending() {
                let message = match reason {
                    Some(reason) => format!("Connection lost before the reply completed: {reason}"),
                    None => "Connection lost before the reply completed".to_string(),
                };
                Ok(TransitionResult::new(closed.with_phase(Phase::Error {
                    message,
                    kind: ErrorKind::Transport,
                })))
            } else {
                Ok(TransitionResult::new(closed))
            }
        }

        // An in-flight reply is abandoned by dropping its connection, so late
        // fragments cannot leak into the next exchange
        Event::Clear if state.phase.is_pending() => Ok(TransitionResult::new(SessionState::new(
            Phase::Idle,
            LinkState::Closed,
        ))
        .with_effects([Effect::ClearHistory, Effect::CloseConnection])),

        Event::Clear => Ok(TransitionResult::new(state.with_phase(Phase::Idle))
            .with_effect(Effect::ClearHistory)),

        Event::Reset => Ok(reset(state)),

        Event::Reconnect => reconnect(state),

        // The runtime drops timers superseded by a newer connection, so a
        // timer that fires on a closed idle session was outlived by a clear
        Event::RecoveryTimeout => match (&state.phase, state.link) {
            (
                Phase::Error {
                    kind: ErrorKind::Protocol,
                    ..
                },
                _,
            )
            | (Phase::Idle, LinkState::Closed) => Ok(reset(state)),
            // Stale timer: the user already recovered the session
            _ => Ok(TransitionResult::new(state.clone())),
        },
    }
}

fn reconnect(state: &SessionState) -> Result<TransitionResult, TransitionError> {
    match &state.phase {
        Phase::Pending | Phase::Streaming => Err(TransitionError::Busy),
        Phase::Error {
            kind: ErrorKind::Protocol,
            ..
        } => Err(TransitionError::SessionFailed),
        Phase::Idle | Phase::Error { .. } => match state.link {
            LinkState::Closed => Ok(TransitionResult::new(state.with_link(LinkState::Connecting))
                .with_effect(Effect::OpenConnection)),
            // Already connected or on the way
            LinkState::Open | LinkState::Connecting => Ok(TransitionResult::new(state.clone())),
        },
    }
}

fn submit(state: &SessionState, text: String) -> Result<TransitionResult, TransitionError> {
    if text.trim().is_empty() {
        return Ok(TransitionResult::new(state.clone()));
    }

    match (&state.phase, state.link) {
        (Phase::Pending | Phase::Streaming, _) => Err(TransitionError::Busy),
        (
            Phase::Error {
                kind: ErrorKind::Protocol,
                ..
            },
            _,
        ) => Err(TransitionError::SessionFailed),
        (Phase::Idle, LinkState::Open) => Ok(TransitionResult::new(state.with_phase(Phase::Pending))
            .with_effects([
                Effect::AppendUserMessage { text: text.clone() },
                Effect::SendText { text },
            ])),
        _ => Err(TransitionError::NotConnected),
    }
}

fn fragment(
    state: &SessionState,
    context: &SessionContext,
    text: &str,
) -> Result<TransitionResult, TransitionError> {
    match (classify(text), &state.phase) {
        (Inbound::EndOfResponse, Phase::Pending | Phase::Streaming) => {
            Ok(TransitionResult::new(state.with_phase(Phase::Idle)))
        }
        // Nothing outstanding: a late terminator has nothing to terminate
        (Inbound::EndOfResponse, _) => Ok(TransitionResult::new(state.clone())),

        (Inbound::EndOfError, Phase::Error { .. }) => Ok(TransitionResult::new(state.clone())),
        (Inbound::EndOfError, _) => Ok(fail(context)),

        (Inbound::Content(content), Phase::Pending | Phase::Streaming) => {
            Ok(TransitionResult::new(state.with_phase(Phase::Streaming))
                .with_effect(Effect::AppendFragment {
                    text: content.to_string(),
                }))
        }
        (Inbound::Content(_), phase) => Err(TransitionError::UnexpectedFragment(phase.name())),
    }
}

/// The server aborted: close the channel and hold the session in `Error`
fn fail(context: &SessionContext) -> TransitionResult {
    let result = TransitionResult::new(SessionState::new(
        Phase::Error {
            message: context.protocol_error_message(),
            kind: ErrorKind::Protocol,
        },
        LinkState::Closed,
    ))
    .with_effect(Effect::CloseConnection);

    match context.recovery {
        RecoveryPolicy::AutoReset { delay } => {
            result.with_effect(Effect::ScheduleRecovery { delay })
        }
        RecoveryPolicy::Manual => result,
    }
}

fn reset(state: &SessionState) -> TransitionResult {
    let close = (state.link != LinkState::Closed).then_some(Effect::CloseConnection);
    TransitionResult::new(SessionState::new(Phase::Idle, LinkState::Connecting)).with_effects(
        close
            .into_iter()
            .chain([Effect::ClearHistory, Effect::OpenConnection]),
    )
}
