//! Connection manager
//!
//! Owns the one duplex text channel to the chat server. The channel is driven
//! by a background task that forwards everything it observes as [`LinkEvent`]s;
//! the session never touches the transport directly.

mod websocket;

pub use websocket::WebSocketTransport;

use crate::state_machine::LinkState;
use async_trait::async_trait;
use futures::{Sink, SinkExt, Stream, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Errors raised at the transport boundary
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    #[error("Failed to connect: {0}")]
    Connect(String),
    #[error("Connection is not open")]
    NotOpen,
    #[error("Failed to send: {0}")]
    Send(String),
    #[error("Failed to receive: {0}")]
    Receive(String),
}

pub type FragmentSink = Pin<Box<dyn Sink<String, Error = ConnectionError> + Send>>;
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String, ConnectionError>> + Send>>;

/// Both halves of an established channel
pub struct Channel {
    pub sink: FragmentSink,
    pub stream: FragmentStream,
}

/// Something that can establish a duplex text channel
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn connect(&self, url: &str) -> Result<Channel, ConnectionError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn connect(&self, url: &str) -> Result<Channel, ConnectionError> {
        (**self).connect(url).await
    }
}

/// What a connection reported, tagged with the epoch of the connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkEvent {
    pub epoch: u64,
    pub kind: LinkEventKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEventKind {
    Opened,
    /// One inbound unit of text, exactly as the transport delivered it
    Fragment(String),
    /// The channel went away without being asked to (connect failure, drop, I/O error)
    Closed(Option<String>),
}

struct ActiveConnection {
    epoch: u64,
    outbound: mpsc::UnboundedSender<String>,
    cancel: CancellationToken,
}

/// Lifecycle of the single connection
pub struct ConnectionManager<T: Transport> {
    transport: Arc<T>,
    url: String,
    events: mpsc::Sender<LinkEvent>,
    next_epoch: u64,
    active: Option<ActiveConnection>,
    state: LinkState,
    closes: u64,
}

impl<T: Transport> ConnectionManager<T> {
    pub fn new(transport: T, url: impl Into<String>, events: mpsc::Sender<LinkEvent>) -> Self {
        Self {
            transport: Arc::new(transport),
            url: url.into(),
            events,
            next_epoch: 1,
            active: None,
            state: LinkState::Closed,
            closes: 0,
        }
    }

    #[allow(dead_code)] // Used by tests
    pub fn state(&self) -> LinkState {
        self.state
    }

    /// Number of times a live connection was closed from this side
    #[allow(dead_code)] // Used by tests
    pub fn close_count(&self) -> u64 {
        self.closes
    }

    /// Start connecting. Any existing connection is closed first.
    ///
    /// Returns immediately; the outcome arrives as `Opened` or `Closed`.
    pub fn open(&mut self) {
        self.close();

        let epoch = self.next_epoch;
        self.next_epoch += 1;

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        tracing::info!(epoch, url = %self.url, "Opening connection");
        tokio::spawn(drive_connection(
            self.transport.clone(),
            self.url.clone(),
            epoch,
            outbound_rx,
            self.events.clone(),
            cancel.clone(),
        ));

        self.active = Some(ActiveConnection {
            epoch,
            outbound: outbound_tx,
            cancel,
        });
        self.state = LinkState::Connecting;
    }

    /// Queue one text payload on the open channel.
    ///
    /// Sends are rejected unless the channel is open.
    pub fn send(&self, text: String) -> Result<(), ConnectionError> {
        match (&self.active, self.state) {
            (Some(active), LinkState::Open) => active
                .outbound
                .send(text)
                .map_err(|_| ConnectionError::NotOpen),
            _ => Err(ConnectionError::NotOpen),
        }
    }

    /// Close the live connection, if any. Idempotent.
    pub fn close(&mut self) {
        if let Some(active) = self.active.take() {
            tracing::info!(epoch = active.epoch, "Closing connection");
            active.cancel.cancel();
            self.closes += 1;
        }
        self.state = LinkState::Closed;
    }

    /// Filter an event against the live connection and track its status.
    ///
    /// Returns `false` for events from a connection that was already closed
    /// or replaced; those must be ignored.
    pub fn observe(&mut self, event: &LinkEvent) -> bool {
        let current = self
            .active
            .as_ref()
            .is_some_and(|active| active.epoch == event.epoch);
        if !current {
            return false;
        }

        match event.kind {
            LinkEventKind::Opened => self.state = LinkState::Open,
            LinkEventKind::Fragment(_) => {}
            LinkEventKind::Closed(_) => {
                // The task is already gone; nothing left to close
                self.active = None;
                self.state = LinkState::Closed;
            }
        }
        true
    }
}

impl<T: Transport> Drop for ConnectionManager<T> {
    fn drop(&mut self) {
        self.close();
    }
}

/// Connection task: connect, then pump outbound text and inbound fragments
/// until cancelled or the channel fails.
async fn drive_connection<T: Transport>(
    transport: Arc<T>,
    url: String,
    epoch: u64,
    mut outbound: mpsc::UnboundedReceiver<String>,
    events: mpsc::Sender<LinkEvent>,
    cancel: CancellationToken,
) {
    let report = |kind: LinkEventKind| {
        let events = events.clone();
        async move {
            // Receiver gone means the session was disposed
            let _ = events.send(LinkEvent { epoch, kind }).await;
        }
    };

    let connected = tokio::select! {
        () = cancel.cancelled() => return,
        result = transport.connect(&url) => result,
    };

    let Channel {
        mut sink,
        mut stream,
    } = match connected {
        Ok(channel) => channel,
        Err(e) => {
            tracing::warn!(epoch, error = %e, "Connection failed");
            report(LinkEventKind::Closed(Some(e.to_string()))).await;
            return;
        }
    };

    tracing::info!(epoch, "Connection open");
    report(LinkEventKind::Opened).await;

    let reason = loop {
        tokio::select! {
            () = cancel.cancelled() => {
                if let Err(e) = sink.close().await {
                    tracing::debug!(epoch, error = %e, "Error while closing connection");
                }
                tracing::debug!(epoch, "Connection closed locally");
                return;
            }
            Some(text) = outbound.recv() => {
                tracing::debug!(epoch, bytes = text.len(), "Sending message");
                if let Err(e) = sink.send(text).await {
                    tracing::error!(epoch, error = %e, "Send failed");
                    break Some(e.to_string());
                }
            }
            inbound = stream.next() => match inbound {
                Some(Ok(text)) => report(LinkEventKind::Fragment(text)).await,
                Some(Err(e)) => {
                    tracing::error!(epoch, error = %e, "Receive failed");
                    break Some(e.to_string());
                }
                None => break None,
            },
        }
    };

    tracing::warn!(epoch, reason = ?reason, "Connection closed by peer");
    report(LinkEventKind::Closed(reason)).await;
}
