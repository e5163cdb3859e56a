//! WebSocket transport layer.
//!
//! The worker talks to the network through the [`Transport`] trait so the
//! integration suite can drive it against an in-process server and so the
//! socket library stays confined to this module. Only text frames carry
//! protocol data; the WebSocket layer owns ping/pong and close framing.

use crate::error::TransportError;
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, trace};

/// A connected, bidirectional text-frame channel.
#[async_trait]
pub trait Transport: Send {
    /// Send one text frame.
    async fn send_text(&mut self, text: String) -> Result<(), TransportError>;

    /// Receive the next text frame. `Ok(None)` means the peer closed the
    /// connection cleanly; an error means it dropped uncleanly.
    async fn next_text(&mut self) -> Result<Option<String>, TransportError>;

    /// Close the connection. Best effort; errors are swallowed.
    async fn close(&mut self);
}

/// Dials a transport. One implementation per socket flavor.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, url: &str) -> Result<Box<dyn Transport>, TransportError>;
}

/// Production connector over `tokio-tungstenite`.
#[derive(Debug, Default, Clone, Copy)]
pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, url: &str) -> Result<Box<dyn Transport>, TransportError> {
        let (stream, response) = connect_async(url)
            .await
            .map_err(TransportError::Connect)?;
        debug!(%url, status = %response.status(), "websocket established");
        Ok(Box::new(WsTransport { stream }))
    }
}

/// A live WebSocket connection.
pub struct WsTransport {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl Transport for WsTransport {
    async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        self.stream.send(Message::Text(text)).await?;
        Ok(())
    }

    async fn next_text(&mut self) -> Result<Option<String>, TransportError> {
        while let Some(frame) = self.stream.next().await {
            match frame? {
                Message::Text(text) => return Ok(Some(text)),
                Message::Close(_) => return Ok(None),
                // tungstenite queues the pong reply itself; nothing to do
                Message::Ping(_) | Message::Pong(_) => trace!("control frame"),
                Message::Binary(_) => debug!("ignoring binary frame"),
                Message::Frame(_) => {}
            }
        }
        Ok(None)
    }

    async fn close(&mut self) {
        let _ = self.stream.close(None).await;
    }
}
