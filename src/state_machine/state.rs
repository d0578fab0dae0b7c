//! Session state types

use serde::Serialize;
use std::time::Duration;

/// Where the current request/response cycle stands
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Phase {
    /// Ready for user input, no reply outstanding
    #[default]
    Idle,

    /// User text sent, no reply fragment seen yet
    Pending,

    /// At least one content fragment of the reply has arrived
    Streaming,

    /// The session cannot send until it is reset (or reconnected, for
    /// transport failures)
    Error { message: String, kind: ErrorKind },
}

impl Phase {
    /// A send is outstanding and no terminal sentinel has arrived
    pub fn is_pending(&self) -> bool {
        matches!(self, Phase::Pending | Phase::Streaming)
    }

    pub fn is_streaming(&self) -> bool {
        matches!(self, Phase::Streaming)
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            Phase::Error { message, .. } => Some(message),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Pending => "pending",
            Phase::Streaming => "streaming",
            Phase::Error { .. } => "error",
        }
    }
}

/// Why the session entered `Phase::Error`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Server sent the error sentinel; fatal until a full reset
    Protocol,
    /// Channel dropped while a reply was outstanding
    Transport,
}

/// Mirror of the connection status as last reported by the connection manager
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LinkState {
    #[default]
    Connecting,
    Open,
    Closed,
}

/// Full session state fed to the transition function
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SessionState {
    pub phase: Phase,
    pub link: LinkState,
}

impl SessionState {
    pub fn new(phase: Phase, link: LinkState) -> Self {
        Self { phase, link }
    }

    pub fn with_phase(&self, phase: Phase) -> Self {
        Self {
            phase,
            link: self.link,
        }
    }

    pub fn with_link(&self, link: LinkState) -> Self {
        Self {
            phase: self.phase.clone(),
            link,
        }
    }
}

/// What happens after the error sentinel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryPolicy {
    /// Reset the session automatically after `delay`
    AutoReset { delay: Duration },
    /// Wait for the user to request a reset
    Manual,
}

impl Default for RecoveryPolicy {
    fn default() -> Self {
        RecoveryPolicy::AutoReset {
            delay: Duration::from_secs(5),
        }
    }
}

/// Immutable configuration for a session
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub session_id: String,
    pub recovery: RecoveryPolicy,
}

impl SessionContext {
    pub fn new(session_id: impl Into<String>, recovery: RecoveryPolicy) -> Self {
        Self {
            session_id: session_id.into(),
            recovery,
        }
    }

    /// Banner text shown when the server aborts a reply
    pub fn protocol_error_message(&self) -> String {
        match self.recovery {
            RecoveryPolicy::AutoReset { delay } => format!(
                "An error occurred with the Assistant. Please try again. The session will reset in {} seconds.",
                delay.as_secs()
            ),
            RecoveryPolicy::Manual => {
                "An error occurred with the Assistant. Reset the session to try again.".to_string()
            }
        }
    }
}
