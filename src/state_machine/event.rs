//! Events that can occur in a session

/// Events that trigger state transitions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    // User commands
    Submit { text: String },
    Clear,
    Reset,
    /// Reopen a dropped connection, keeping history
    Reconnect,

    // Connection events
    Opened,
    Fragment { text: String },
    Closed { reason: Option<String> },

    // Timers
    RecoveryTimeout,
}

#[allow(dead_code)] // Used by tests
impl Event {
    pub fn submit(text: impl Into<String>) -> Self {
        Event::Submit { text: text.into() }
    }

    pub fn fragment(text: impl Into<String>) -> Self {
        Event::Fragment { text: text.into() }
    }
}
