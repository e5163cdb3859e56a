//! chatlink-probe - manual diagnostic client.
//!
//! Connects to a chat backend, joins a room, prints the event stream, and
//! relays stdin lines as messages. For poking at a live server; not part
//! of the library surface.
//!
//! Usage: chatlink-probe <url> <token> <user_id> <username> [room]

use chatlink::{ChatClient, ClientConfig, ClientError, Credentials, EventKind};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    let mut args = std::env::args().skip(1);
    let (Some(url), Some(token), Some(user_id), Some(username)) =
        (args.next(), args.next(), args.next(), args.next())
    else {
        anyhow::bail!("usage: chatlink-probe <url> <token> <user_id> <username> [room]");
    };
    let room = args.next().unwrap_or_else(|| "global".to_string());

    let client = ChatClient::new(ClientConfig::new(url))?;

    for kind in [
        EventKind::Authenticated,
        EventKind::AuthenticationFailed,
        EventKind::Message,
        EventKind::UserJoined,
        EventKind::UserLeft,
        EventKind::RoomJoined,
        EventKind::ConnectionError,
        EventKind::Disconnected,
        EventKind::Error,
    ] {
        client.on(kind, |event| info!(?event, "event"));
    }

    client.connect(Credentials {
        token,
        user_id,
        username,
    })?;
    client.join(room.clone())?;

    info!(%room, "relaying stdin; ctrl-d to quit");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.is_empty() {
            continue;
        }
        match client.send_message(room.clone(), line) {
            Ok(()) => {}
            Err(err @ ClientError::NotConnected) => warn!(%err, "message dropped"),
            Err(err) => return Err(err.into()),
        }
    }

    client.disconnect()?;
    Ok(())
}
