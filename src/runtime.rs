//! Runtime for a chat session
//!
//! One task owns the session: it subscribes once to the connection's events,
//! runs every event through the state machine and executes the effects.
//! Presentation only ever sees snapshots.

mod executor;


pub use executor::SessionRuntime;

use crate::assembler::Message;
use crate::connection::Transport;
use crate::state_machine::{Event, LinkState, Phase, SessionContext};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;

/// Commands accepted from presentation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Submit(String),
    Clear,
    Reset,
    Reconnect,
    Dispose,
}

impl Command {
    fn into_event(self) -> Option<Event> {
        match self {
            Command::Submit(text) => Some(Event::Submit { text }),
            Command::Clear => Some(Event::Clear),
            Command::Reset => Some(Event::Reset),
            Command::Reconnect => Some(Event::Reconnect),
            Command::Dispose => None,
        }
    }
}

/// Read-only copy of the session for rendering
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
pub struct SessionSnapshot {
    pub phase: Phase,
    pub link: LinkState,
    pub messages: Vec<Message>,
    /// Changes every time the history is wiped
    pub generation: u64,
}

#[allow(dead_code)] // Used by tests
impl SessionSnapshot {
    /// A send is outstanding
    pub fn pending(&self) -> bool {
        self.phase.is_pending()
    }

    /// Reply text is arriving
    pub fn streaming(&self) -> bool {
        self.phase.is_streaming()
    }

    pub fn error(&self) -> Option<&str> {
        self.phase.error_message()
    }

    /// New input may be offered to the session
    pub fn accepts_input(&self) -> bool {
        self.phase == Phase::Idle && self.link == LinkState::Open
    }
}

/// Updates pushed to presentation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionUpdate {
    Snapshot(SessionSnapshot),
    /// A command was refused or an action failed without changing state
    Notice { message: String },
    Disposed,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Session has been disposed")]
pub struct SessionDisposed;

/// Handle to a running session
pub struct SessionHandle {
    commands: mpsc::Sender<Command>,
    updates: broadcast::Sender<SessionUpdate>,
    snapshot: watch::Receiver<SessionSnapshot>,
    task: JoinHandle<()>,
}

impl SessionHandle {
    /// Create the session and start connecting to `url`
    pub fn create<T: Transport>(
        transport: T,
        url: impl Into<String>,
        context: SessionContext,
    ) -> Self {
        let (command_tx, command_rx) = mpsc::channel(32);
        let (updates_tx, _) = broadcast::channel(256);
        let (snapshot_tx, snapshot_rx) = watch::channel(SessionSnapshot::default());

        let session_id = context.session_id.clone();
        let runtime = SessionRuntime::new(
            context,
            transport,
            url,
            command_rx,
            updates_tx.clone(),
            snapshot_tx,
        );

        let task = tokio::spawn(async move {
            runtime.run().await;
            tracing::info!(session_id = %session_id, "Session runtime finished");
        });

        Self {
            commands: command_tx,
            updates: updates_tx,
            snapshot: snapshot_rx,
            task,
        }
    }

    pub async fn submit(&self, text: impl Into<String>) -> Result<(), SessionDisposed> {
        self.send(Command::Submit(text.into())).await
    }

    pub async fn clear(&self) -> Result<(), SessionDisposed> {
        self.send(Command::Clear).await
    }

    /// Drop the conversation, clear any error and reconnect
    pub async fn reset(&self) -> Result<(), SessionDisposed> {
        self.send(Command::Reset).await
    }

    /// Reopen a dropped connection without touching the conversation
    pub async fn reconnect(&self) -> Result<(), SessionDisposed> {
        self.send(Command::Reconnect).await
    }

    async fn send(&self, command: Command) -> Result<(), SessionDisposed> {
        self.commands.send(command).await.map_err(|_| SessionDisposed)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionUpdate> {
        self.updates.subscribe()
    }

    /// Latest snapshot; `changed()` on the receiver wakes on every update
    #[allow(dead_code)] // Used by tests
    pub fn snapshots(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot.clone()
    }

    #[allow(dead_code)] // Used by tests
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Close the connection and stop the session
    pub async fn dispose(self) {
        if self.commands.send(Command::Dispose).await.is_err() {
            tracing::debug!("Session already stopped");
        }
        if let Err(e) = self.task.await {
            tracing::error!(error = %e, "Session runtime panicked");
        }
    }
}
