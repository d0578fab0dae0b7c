//! Effects produced by state transitions

use std::time::Duration;

/// Effects to be executed after state transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Append the submitted text to the transcript as a user message
    AppendUserMessage { text: String },

    /// Feed a content fragment to the transcript
    AppendFragment { text: String },

    /// Wipe the transcript
    ClearHistory,

    /// Write the text to the open connection
    SendText { text: String },

    /// Close the active connection
    CloseConnection,

    /// Replace the connection with a freshly opened one
    OpenConnection,

    /// Fire `Event::RecoveryTimeout` after `delay`
    ScheduleRecovery { delay: Duration },
}
