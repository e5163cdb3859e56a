//! Mock chat server.
//!
//! Listens on an ephemeral port and hands each accepted WebSocket back to
//! the test, which scripts the server side of the conversation frame by
//! frame.

use chatlink_proto::{decode, encode, Envelope};
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

/// A listening mock server.
pub struct MockServer {
    listener: TcpListener,
    url: String,
}

impl MockServer {
    /// Bind on an ephemeral loopback port.
    pub async fn bind() -> anyhow::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let url = format!("ws://{}", listener.local_addr()?);
        Ok(Self { listener, url })
    }

    /// The ws:// URL clients should dial.
    pub fn url(&self) -> String {
        self.url.clone()
    }

    /// Accept and upgrade the next connection, failing after 5 seconds.
    pub async fn accept(&self) -> anyhow::Result<ServerConn> {
        let (stream, _) = timeout(Duration::from_secs(5), self.listener.accept())
            .await
            .map_err(|_| anyhow::anyhow!("timed out waiting for a connection"))??;
        let ws = tokio_tungstenite::accept_async(stream).await?;
        Ok(ServerConn { ws })
    }

    /// Accept the next TCP connection without performing the WebSocket
    /// upgrade. Holding the returned stream simulates an endpoint that
    /// answers the dial but never finishes the handshake.
    #[allow(dead_code)]
    pub async fn accept_raw(&self) -> anyhow::Result<TcpStream> {
        let (stream, _) = timeout(Duration::from_secs(5), self.listener.accept())
            .await
            .map_err(|_| anyhow::anyhow!("timed out waiting for a connection"))??;
        Ok(stream)
    }
}

/// One accepted server-side connection.
pub struct ServerConn {
    ws: WebSocketStream<TcpStream>,
}

impl ServerConn {
    /// Send an envelope to the client.
    pub async fn send(&mut self, envelope: &Envelope) -> anyhow::Result<()> {
        self.send_raw(&encode(envelope)?).await
    }

    /// Send a raw text frame, valid JSON or not.
    pub async fn send_raw(&mut self, frame: &str) -> anyhow::Result<()> {
        self.ws.send(Message::Text(frame.to_string())).await?;
        Ok(())
    }

    /// Receive the next envelope from the client, failing after 5 seconds.
    pub async fn recv(&mut self) -> anyhow::Result<Envelope> {
        loop {
            let frame = timeout(Duration::from_secs(5), self.ws.next())
                .await
                .map_err(|_| anyhow::anyhow!("timed out waiting for a frame"))?
                .ok_or_else(|| anyhow::anyhow!("client closed the connection"))??;
            match frame {
                Message::Text(text) => return Ok(decode(&text)?),
                Message::Close(_) => anyhow::bail!("client closed the connection"),
                _ => continue,
            }
        }
    }

    /// Receive envelopes until the predicate matches, returning the match.
    #[allow(dead_code)]
    pub async fn recv_until<F>(&mut self, mut predicate: F) -> anyhow::Result<Envelope>
    where
        F: FnMut(&Envelope) -> bool,
    {
        loop {
            let envelope = self.recv().await?;
            if predicate(&envelope) {
                return Ok(envelope);
            }
        }
    }

    /// Run the server side of a successful auth handshake.
    #[allow(dead_code)]
    pub async fn accept_auth(&mut self) -> anyhow::Result<()> {
        match self.recv().await? {
            Envelope::Authenticate { .. } => {}
            other => anyhow::bail!("expected authenticate, got {other:?}"),
        }
        self.send(&Envelope::Authenticated {}).await
    }

    /// Close the connection from the server side.
    #[allow(dead_code)]
    pub async fn close(&mut self) -> anyhow::Result<()> {
        self.ws.close(None).await?;
        Ok(())
    }
}
