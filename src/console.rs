//! Terminal rendering of session updates
//!
//! Snapshots carry the whole transcript; the console keeps track of what it
//! has already printed and only writes the new tail.

use crate::assembler::Role;
use crate::runtime::{SessionSnapshot, SessionUpdate};
use crate::state_machine::{ErrorKind, LinkState, Phase};
use std::io::{self, Write};

pub const PROMPT: &str = "> ";

pub struct Console<W: Write> {
    out: W,
    /// Messages printed so far
    shown: usize,
    /// Bytes of the last printed message already on screen
    shown_len: usize,
    /// History generation the counters above refer to
    generation: u64,
    phase: Phase,
    link: LinkState,
}

impl<W: Write> Console<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            shown: 0,
            shown_len: 0,
            generation: 0,
            phase: Phase::Idle,
            link: LinkState::Connecting,
        }
    }

    pub fn render(&mut self, update: &SessionUpdate) -> io::Result<()> {
        match update {
            SessionUpdate::Snapshot(snapshot) => self.snapshot(snapshot)?,
            SessionUpdate::Notice { message } => writeln!(self.out, "! {message}")?,
            SessionUpdate::Disposed => writeln!(self.out, "(session closed)")?,
        }
        self.out.flush()
    }

    fn snapshot(&mut self, snapshot: &SessionSnapshot) -> io::Result<()> {
        let messages = &snapshot.messages;

        // Snapshots may be skipped, so a clear is detected by generation
        if snapshot.generation != self.generation {
            writeln!(self.out, "(conversation cleared)")?;
            self.generation = snapshot.generation;
            self.shown = 0;
            self.shown_len = 0;
        }

        // Continue the reply that is still growing
        if let Some(last) = self.shown.checked_sub(1).and_then(|i| messages.get(i)) {
            if let Some(tail) = last.content.get(self.shown_len..) {
                if !tail.is_empty() && last.role == Role::Assistant {
                    write!(self.out, "{tail}")?;
                }
            }
            self.shown_len = last.content.len();
        }

        for message in messages.iter().skip(self.shown) {
            // The user's own lines are already on screen
            if message.role == Role::Assistant {
                write!(self.out, "assistant> {}", message.content)?;
            }
            self.shown_len = message.content.len();
        }
        self.shown = messages.len();

        if snapshot.phase != self.phase {
            match &snapshot.phase {
                Phase::Idle if self.phase.is_streaming() => writeln!(self.out)?,
                Phase::Error { message, kind } => {
                    if self.phase.is_streaming() {
                        writeln!(self.out)?;
                    }
                    writeln!(self.out, "[error] {message}")?;
                    if *kind == ErrorKind::Transport {
                        writeln!(self.out, "(type /reconnect to resume the conversation)")?;
                    }
                }
                _ => {}
            }
            self.phase = snapshot.phase.clone();
        }

        if snapshot.link != self.link {
            match snapshot.link {
                LinkState::Open => writeln!(self.out, "(connected)")?,
                LinkState::Closed if snapshot.phase == Phase::Idle => {
                    writeln!(self.out, "(disconnected, type /reconnect to reconnect)")?;
                }
                _ => {}
            }
            self.link = snapshot.link;
        }

        if snapshot.accepts_input() {
            write!(self.out, "{PROMPT}")?;
        }
        Ok(())
    }
}
