//! Stream assembly
//!
//! Classifies inbound fragments against the protocol sentinels and grows the
//! conversation transcript one fragment at a time.

use serde::Serialize;

/// Sent by the server after the last content fragment of a reply
pub const END_OF_RESPONSE: &str = "[END_OF_RESPONSE]";

/// Sent by the server when it aborted the reply; the connection is dead after it
pub const END_OF_ERROR_RESPONSE: &str = "[END_OF_ERROR_RESPONSE]";

/// What a single inbound fragment means to the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inbound<'a> {
    EndOfResponse,
    EndOfError,
    Content(&'a str),
}

/// Classify one fragment.
///
/// Matching is exact. A sentinel embedded in a larger fragment, or split
/// across two fragments, is ordinary content: the transport gives no framing
/// guarantee and nothing here reassembles across fragment boundaries.
pub fn classify(fragment: &str) -> Inbound<'_> {
    match fragment {
        END_OF_RESPONSE => Inbound::EndOfResponse,
        END_OF_ERROR_RESPONSE => Inbound::EndOfError,
        text => Inbound::Content(text),
    }
}

/// Author of a transcript message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

/// One entry of the conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Ordered conversation history.
///
/// Append-only, except that the trailing assistant message grows in place
/// while its reply streams in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transcript {
    messages: Vec<Message>,
    /// Bumped on every clear
    generation: u64,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_user(&mut self, text: impl Into<String>) {
        self.messages.push(Message::user(text));
    }

    /// Apply a content fragment: extend the trailing assistant message, or
    /// open a new one when the reply has not produced any text yet.
    pub fn append_fragment(&mut self, fragment: &str) {
        match self.messages.last_mut() {
            Some(last) if last.role == Role::Assistant => last.content.push_str(fragment),
            _ => self.messages.push(Message::assistant(fragment)),
        }
    }

    pub fn clear(&mut self) {
        self.messages.clear();
        self.generation += 1;
    }

    /// Changes whenever the history is wiped, even if it was already empty
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    #[allow(dead_code)] // Used by tests
    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    #[allow(dead_code)] // Used by tests
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    #[allow(dead_code)] // Used by tests
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
