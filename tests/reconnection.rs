//! Reconnection, backoff cancellation, and rejoin replay.

mod common;

use chatlink::{ChatClient, ClientEvent, ConnectionState, EventKind};
use chatlink_proto::Envelope;
use common::{collect_events, credentials, fast_config, next_event, wait_for_state, MockServer};

#[tokio::test]
async fn drop_triggers_reconnect_and_rejoin() -> anyhow::Result<()> {
    let server = MockServer::bind().await?;
    let client = ChatClient::new(fast_config(server.url()))?;
    let mut events = collect_events(
        &client,
        &[
            EventKind::Disconnected,
            EventKind::Authenticated,
            EventKind::RoomJoined,
        ],
    );

    client.connect(credentials())?;
    let mut conn = server.accept().await?;
    conn.accept_auth().await?;
    wait_for_state(&client, ConnectionState::Connected).await?;

    for room_id in ["global", "team9"] {
        client.join(room_id)?;
        conn.recv().await?;
        conn.send(&Envelope::RoomJoined {
            room_id: room_id.into(),
        })
        .await?;
    }

    match next_event(&mut events).await? {
        ClientEvent::Authenticated { .. } => {}
        other => panic!("expected authenticated event, got {other:?}"),
    }
    for expected in ["global", "team9"] {
        match next_event(&mut events).await? {
            ClientEvent::RoomJoined { room_id } => assert_eq!(room_id, expected),
            other => panic!("expected room_joined event, got {other:?}"),
        }
    }

    conn.close().await?;
    match next_event(&mut events).await? {
        ClientEvent::Disconnected { .. } => {}
        other => panic!("expected disconnected event, got {other:?}"),
    }

    // The client redials on its own, re-authenticates, and replays both joins
    let mut conn = server.accept().await?;
    conn.accept_auth().await?;
    match next_event(&mut events).await? {
        ClientEvent::Authenticated { .. } => {}
        other => panic!("expected authenticated event, got {other:?}"),
    }
    for expected in ["global", "team9"] {
        match conn.recv().await? {
            Envelope::JoinRoom { room_id } => assert_eq!(room_id, expected),
            other => panic!("expected join_room, got {other:?}"),
        }
        conn.send(&Envelope::RoomJoined {
            room_id: expected.into(),
        })
        .await?;
    }
    for expected in ["global", "team9"] {
        match next_event(&mut events).await? {
            ClientEvent::RoomJoined { room_id } => assert_eq!(room_id, expected),
            other => panic!("expected room_joined event, got {other:?}"),
        }
    }
    wait_for_state(&client, ConnectionState::Connected).await?;

    let active: Vec<String> = client
        .active_rooms()
        .into_iter()
        .map(|room| room.room_id)
        .collect();
    assert_eq!(active, vec!["global".to_string(), "team9".to_string()]);
    Ok(())
}

#[tokio::test]
async fn hung_dial_times_out_and_retries() -> anyhow::Result<()> {
    let server = MockServer::bind().await?;
    let client = ChatClient::new(fast_config(server.url()))?;
    let mut events = collect_events(&client, &[EventKind::ConnectionError]);

    client.connect(credentials())?;
    // First connection: TCP accepted, WebSocket upgrade never answered
    let _stream = server.accept_raw().await?;

    match next_event(&mut events).await? {
        ClientEvent::ConnectionError { reason } => {
            assert!(reason.contains("connect timed out"), "reason: {reason}");
        }
        other => panic!("expected connection error event, got {other:?}"),
    }

    // The next attempt reaches a responsive endpoint and completes
    let mut conn = server.accept().await?;
    conn.accept_auth().await?;
    wait_for_state(&client, ConnectionState::Connected).await?;
    drop(conn);
    Ok(())
}

#[tokio::test]
async fn explicit_reconnect_redials() -> anyhow::Result<()> {
    let server = MockServer::bind().await?;
    let client = ChatClient::new(fast_config(server.url()))?;

    client.connect(credentials())?;
    let mut conn = server.accept().await?;
    conn.accept_auth().await?;
    wait_for_state(&client, ConnectionState::Connected).await?;

    client.reconnect()?;
    let mut conn = server.accept().await?;
    conn.accept_auth().await?;
    wait_for_state(&client, ConnectionState::Connected).await?;
    drop(conn);
    Ok(())
}

#[tokio::test]
async fn disconnect_during_backoff_cancels_retry() -> anyhow::Result<()> {
    let server = MockServer::bind().await?;
    // Slow backoff so the test can reliably land inside the wait
    let mut config = fast_config(server.url());
    config.backoff.base_ms = 2_000;
    config.backoff.cap_ms = 4_000;
    let client = ChatClient::new(config)?;
    let mut events = collect_events(&client, &[EventKind::Disconnected]);

    client.connect(credentials())?;
    let mut conn = server.accept().await?;
    conn.accept_auth().await?;
    wait_for_state(&client, ConnectionState::Connected).await?;

    client.join("global")?;
    conn.recv().await?;
    conn.send(&Envelope::RoomJoined {
        room_id: "global".into(),
    })
    .await?;

    conn.close().await?;
    match next_event(&mut events).await? {
        ClientEvent::Disconnected { .. } => {}
        other => panic!("expected disconnected event, got {other:?}"),
    }
    wait_for_state(&client, ConnectionState::Reconnecting).await?;

    client.disconnect()?;
    wait_for_state(&client, ConnectionState::Disconnected).await?;

    // A later connect resumes with the registry intact
    client.connect(credentials())?;
    let mut conn = server.accept().await?;
    conn.accept_auth().await?;
    match conn.recv().await? {
        Envelope::JoinRoom { room_id } => assert_eq!(room_id, "global"),
        other => panic!("expected join_room, got {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn connect_while_connected_is_a_noop() -> anyhow::Result<()> {
    let server = MockServer::bind().await?;
    let client = ChatClient::new(fast_config(server.url()))?;

    client.connect(credentials())?;
    let mut conn = server.accept().await?;
    conn.accept_auth().await?;
    wait_for_state(&client, ConnectionState::Connected).await?;

    client.connect(credentials())?;
    // Still the same connection: a fence message proves the session lived
    client.send_message("global", "fence")?;
    match conn.recv().await? {
        Envelope::Message(msg) => assert_eq!(msg.message, "fence"),
        other => panic!("expected message, got {other:?}"),
    }
    Ok(())
}
