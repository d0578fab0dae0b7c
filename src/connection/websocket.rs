//! WebSocket transport

use super::{Channel, ConnectionError, Transport};
use async_trait::async_trait;
use futures::{future, SinkExt, StreamExt};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;

/// Text frames over a WebSocket; each frame is one fragment
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketTransport;

#[async_trait]
impl Transport for WebSocketTransport {
    async fn connect(&self, url: &str) -> Result<Channel, ConnectionError> {
        let (ws_stream, response) = connect_async(url)
            .await
            .map_err(|e| ConnectionError::Connect(e.to_string()))?;
        tracing::debug!(status = %response.status(), "WebSocket handshake complete");

        let (write, read) = ws_stream.split();

        let sink = write
            .sink_map_err(|e| ConnectionError::Send(e.to_string()))
            .with(|text: String| future::ready(Ok::<_, ConnectionError>(WsMessage::Text(text))));

        let stream = read.filter_map(|frame| future::ready(frame_to_fragment(frame)));

        Ok(Channel {
            sink: Box::pin(sink),
            stream: Box::pin(stream),
        })
    }
}

/// Map one WebSocket frame to an inbound fragment, skipping control frames
fn frame_to_fragment(
    frame: Result<WsMessage, tokio_tungstenite::tungstenite::Error>,
) -> Option<Result<String, ConnectionError>> {
    match frame {
        Ok(WsMessage::Text(text)) => Some(Ok(text)),
        Ok(WsMessage::Binary(data)) => match String::from_utf8(data) {
            Ok(text) => Some(Ok(text)),
            Err(e) => {
                tracing::warn!(error = %e, "Dropping non-UTF-8 binary frame");
                None
            }
        },
        Ok(WsMessage::Close(frame)) => {
            tracing::debug!(frame = ?frame, "WebSocket closed by server");
            None
        }
        // Ping/pong are answered by tungstenite itself
        Ok(WsMessage::Ping(_) | WsMessage::Pong(_) | WsMessage::Frame(_)) => None,
        Err(e) => Some(Err(ConnectionError::Receive(e.to_string()))),
    }
}
