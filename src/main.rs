//! Flight Insight chat client
//!
//! Terminal client for a streaming chat assistant. Replies arrive over a
//! WebSocket as text fragments and are assembled into a transcript by a
//! session state machine.

mod assembler;
mod catalog;
mod config;
mod connection;
mod console;
mod runtime;
mod state_machine;
mod typewriter;

use config::ClientConfig;
use connection::WebSocketTransport;
use console::Console;
use runtime::{SessionHandle, SessionUpdate};
use state_machine::SessionContext;
use std::io::{IsTerminal, Write};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use typewriter::{Typewriter, TypewriterTimings};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging; stdout belongs to the conversation
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "flight_insight_chat=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let config = ClientConfig::from_env()?;
    tracing::info!(ws_url = %config.ws_url, api_url = %config.api_url, "Starting chat client");

    if config.intro && std::io::stdout().is_terminal() {
        let airlines = catalog::load_supported_airlines(&config.api_url).await;
        play_intro(airlines, config.typewriter).await?;
    }

    let context = SessionContext::new(uuid::Uuid::new_v4().to_string(), config.recovery);
    let session = SessionHandle::create(WebSocketTransport, config.ws_url.clone(), context);
    let render = tokio::spawn(render_updates(session.subscribe()));

    println!("Commands: /clear, /reset, /reconnect, /quit");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else { break };

        let result = match line.trim() {
            "/quit" => break,
            "/clear" => session.clear().await,
            "/reset" => session.reset().await,
            "/reconnect" => session.reconnect().await,
            _ => session.submit(line).await,
        };
        if result.is_err() {
            tracing::warn!("Session stopped unexpectedly");
            break;
        }
    }

    session.dispose().await;
    if let Err(e) = render.await {
        tracing::error!(error = %e, "Renderer panicked");
    }
    Ok(())
}

async fn render_updates(mut updates: broadcast::Receiver<SessionUpdate>) {
    let mut console = Console::new(std::io::stdout());
    loop {
        match updates.recv().await {
            Ok(update) => {
                let disposed = update == SessionUpdate::Disposed;
                if let Err(e) = console.render(&update) {
                    tracing::error!(error = %e, "Failed to write to terminal");
                    return;
                }
                if disposed {
                    return;
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                // Snapshots are complete, the next one catches up
                tracing::debug!(skipped, "Renderer lagged");
            }
            Err(broadcast::error::RecvError::Closed) => return,
        }
    }
}

/// Type out each supported airline once on the current line
async fn play_intro(airlines: Vec<String>, timings: TypewriterTimings) -> std::io::Result<()> {
    let typewriter = Typewriter::new(airlines, timings);
    let frames = typewriter.cycle_len();
    let mut stdout = std::io::stdout();

    for frame in typewriter.take(frames) {
        write!(stdout, "\r\x1b[2KAsk me about {}", frame.text)?;
        stdout.flush()?;
        tokio::time::sleep(frame.hold).await;
    }
    write!(stdout, "\r\x1b[2K")?;
    stdout.flush()
}
