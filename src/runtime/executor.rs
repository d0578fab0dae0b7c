//! Session runtime executor

use super::{Command, SessionSnapshot, SessionUpdate};
use crate::assembler::Transcript;
use crate::connection::{ConnectionManager, LinkEvent, LinkEventKind, Transport};
use crate::state_machine::{
    transition, Effect, Event, LinkState, Phase, SessionContext, SessionState,
};
use tokio::sync::{broadcast, mpsc, watch};

/// Generic session runtime that works with any transport
pub struct SessionRuntime<T: Transport> {
    context: SessionContext,
    state: SessionState,
    transcript: Transcript,
    connection: ConnectionManager<T>,
    commands: mpsc::Receiver<Command>,
    link_events: mpsc::Receiver<LinkEvent>,
    /// Recovery timers report back with the generation they were armed for
    timer_tx: mpsc::Sender<u64>,
    timer_rx: mpsc::Receiver<u64>,
    recovery_generation: u64,
    updates: broadcast::Sender<SessionUpdate>,
    snapshot: watch::Sender<SessionSnapshot>,
}

impl<T: Transport> SessionRuntime<T> {
    pub fn new(
        context: SessionContext,
        transport: T,
        url: impl Into<String>,
        commands: mpsc::Receiver<Command>,
        updates: broadcast::Sender<SessionUpdate>,
        snapshot: watch::Sender<SessionSnapshot>,
    ) -> Self {
        let (link_tx, link_rx) = mpsc::channel(64);
        let (timer_tx, timer_rx) = mpsc::channel(4);

        Self {
            context,
            state: SessionState::new(Phase::Idle, LinkState::Closed),
            transcript: Transcript::new(),
            connection: ConnectionManager::new(transport, url, link_tx),
            commands,
            link_events: link_rx,
            timer_tx,
            timer_rx,
            recovery_generation: 0,
            updates,
            snapshot,
        }
    }

    pub async fn run(mut self) {
        tracing::info!(session_id = %self.context.session_id, "Starting session runtime");

        self.execute_effect(Effect::OpenConnection);
        self.state = self.state.with_link(LinkState::Connecting);
        self.publish();

        // Events are applied one at a time, in arrival order per source
        loop {
            tokio::select! {
                command = self.commands.recv() => {
                    match command.and_then(Command::into_event) {
                        Some(event) => self.process_event(event),
                        None => break,
                    }
                }
                Some(link_event) = self.link_events.recv() => self.handle_link_event(link_event),
                Some(generation) = self.timer_rx.recv() => {
                    if generation == self.recovery_generation {
                        self.process_event(Event::RecoveryTimeout);
                    } else {
                        tracing::debug!(generation, "Ignoring superseded recovery timer");
                    }
                }
            }
        }

        self.connection.close();
        let _ = self.updates.send(SessionUpdate::Disposed);
        tracing::info!(session_id = %self.context.session_id, "Session runtime stopped");
    }

    fn handle_link_event(&mut self, link_event: LinkEvent) {
        if !self.connection.observe(&link_event) {
            tracing::debug!(epoch = link_event.epoch, "Ignoring event from stale connection");
            return;
        }
        self.process_event(link_event_to_event(link_event.kind));
    }

    fn process_event(&mut self, event: Event) {
        let result = match transition(&self.state, &self.context, event) {
            Ok(r) => r,
            Err(e) if e.is_user_facing() => {
                tracing::info!(error = %e, "Command refused");
                self.notice(e.to_string());
                return;
            }
            Err(e) => {
                tracing::warn!(error = %e, phase = self.state.phase.name(), "Ignoring event");
                return;
            }
        };

        let changed = result.new_state != self.state || !result.effects.is_empty();
        if result.new_state.phase.name() != self.state.phase.name() {
            tracing::debug!(
                from = self.state.phase.name(),
                to = result.new_state.phase.name(),
                "Session phase change"
            );
        }
        self.state = result.new_state;

        for effect in result.effects {
            self.execute_effect(effect);
        }

        if changed {
            self.publish();
        }
    }

    fn execute_effect(&mut self, effect: Effect) {
        match effect {
            Effect::AppendUserMessage { text } => self.transcript.push_user(text),
            Effect::AppendFragment { text } => self.transcript.append_fragment(&text),
            Effect::ClearHistory => self.transcript.clear(),
            Effect::SendText { text } => {
                if let Err(e) = self.connection.send(text) {
                    // The channel died under us; its Closed event is on the way
                    tracing::error!(error = %e, "Failed to send message");
                    self.notice(format!("Message could not be sent: {e}"));
                }
            }
            Effect::CloseConnection => self.connection.close(),
            Effect::OpenConnection => {
                // A fresh connection supersedes any pending recovery
                self.recovery_generation += 1;
                self.connection.open();
            }
            Effect::ScheduleRecovery { delay } => {
                self.recovery_generation += 1;
                let generation = self.recovery_generation;
                let timer_tx = self.timer_tx.clone();
                tracing::info!(delay_ms = delay.as_millis(), "Scheduling session reset");
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    let _ = timer_tx.send(generation).await;
                });
            }
        }
    }

    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            phase: self.state.phase.clone(),
            link: self.state.link,
            messages: self.transcript.messages().to_vec(),
            generation: self.transcript.generation(),
        }
    }

    fn publish(&self) {
        let snapshot = self.snapshot();
        self.snapshot.send_replace(snapshot.clone());
        // No subscribers is fine
        let _ = self.updates.send(SessionUpdate::Snapshot(snapshot));
    }

    fn notice(&self, message: String) {
        let _ = self.updates.send(SessionUpdate::Notice { message });
    }
}

fn link_event_to_event(kind: LinkEventKind) -> Event {
    match kind {
        LinkEventKind::Opened => Event::Opened,
        LinkEventKind::Fragment(text) => Event::Fragment { text },
        LinkEventKind::Closed(reason) => Event::Closed { reason },
    }
}
