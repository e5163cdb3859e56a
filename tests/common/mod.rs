//! Integration test common infrastructure.
//!
//! Provides a mock chat server speaking the wire protocol over real
//! WebSocket connections, plus helpers for collecting client events.

pub mod server;

#[allow(unused_imports)]
pub use server::{MockServer, ServerConn};

use chatlink::{ChatClient, ClientConfig, ClientEvent, ConnectionState, Credentials, EventKind};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;

/// A config tuned so reconnect and timeout paths run in milliseconds.
#[allow(dead_code)]
pub fn fast_config(url: String) -> ClientConfig {
    let mut config = ClientConfig::new(url);
    config.connect_timeout_ms = 500;
    config.auth_timeout_ms = 500;
    config.backoff.base_ms = 20;
    config.backoff.factor = 2.0;
    config.backoff.cap_ms = 80;
    config
}

/// Standard test credentials.
#[allow(dead_code)]
pub fn credentials() -> Credentials {
    Credentials {
        token: "tok-123".into(),
        user_id: "u1".into(),
        username: "ada".into(),
    }
}

/// Subscribe to the given event kinds, forwarding into a channel.
#[allow(dead_code)]
pub fn collect_events(
    client: &ChatClient,
    kinds: &[EventKind],
) -> mpsc::UnboundedReceiver<ClientEvent> {
    let (tx, rx) = mpsc::unbounded_channel();
    for &kind in kinds {
        let tx = tx.clone();
        client.on(kind, move |event| {
            let _ = tx.send(event.clone());
        });
    }
    rx
}

/// Block until the client reaches the given state, failing after 5 seconds.
#[allow(dead_code)]
pub async fn wait_for_state(client: &ChatClient, want: ConnectionState) -> anyhow::Result<()> {
    let mut rx = client.state_changes();
    timeout(Duration::from_secs(5), rx.wait_for(|state| *state == want))
        .await
        .map_err(|_| anyhow::anyhow!("timed out waiting for state {want}"))??;
    Ok(())
}

/// Receive the next collected event, failing after 5 seconds.
#[allow(dead_code)]
pub async fn next_event(rx: &mut mpsc::UnboundedReceiver<ClientEvent>) -> anyhow::Result<ClientEvent> {
    timeout(Duration::from_secs(5), rx.recv())
        .await
        .map_err(|_| anyhow::anyhow!("timed out waiting for event"))?
        .ok_or_else(|| anyhow::anyhow!("event channel closed"))
}
