//! Client handle and connection worker.
//!
//! [`ChatClient`] is a cheap cloneable handle; all real work happens in a
//! single spawned [`ClientWorker`] task that owns the socket, the session,
//! the room registry, and the dedup ledger. Every state mutation flows
//! through that one task, so no locking is needed around connection state
//! and event ordering matches arrival order.

use crate::backoff::BackoffPolicy;
use crate::config::{ClientConfig, ConfigError};
use crate::dedup::DedupLedger;
use crate::error::{ClientError, ClientResult, TransportError};
use crate::events::{ClientEvent, EventDispatcher, EventKind, HandlerId};
use crate::rooms::{Room, RoomRegistry};
use crate::session::{ConnectionState, Credentials, Session};
use crate::transport::{Connector, Transport, WsConnector};
use chatlink_proto::{ChatMessage, Envelope};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

// ============================================================================
// Public handle
// ============================================================================

/// Handle to a running chat client.
///
/// All methods are synchronous and non-blocking: they enqueue work for the
/// worker task and return immediately. Results arrive through the event
/// stream. Must be created inside a tokio runtime.
#[derive(Clone)]
pub struct ChatClient {
    cmd_tx: mpsc::UnboundedSender<Command>,
    state_rx: watch::Receiver<ConnectionState>,
    rooms_rx: watch::Receiver<Vec<Room>>,
    dispatcher: EventDispatcher,
    max_message_len: usize,
}

impl ChatClient {
    /// Spawn a client worker using the production WebSocket connector.
    pub fn new(config: ClientConfig) -> Result<Self, ConfigError> {
        Self::with_connector(config, Box::new(WsConnector))
    }

    /// Spawn a client worker with a custom connector. Used by the test
    /// suite to dial in-process servers.
    pub fn with_connector(
        config: ClientConfig,
        connector: Box<dyn Connector>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        let (rooms_tx, rooms_rx) = watch::channel(Vec::new());
        let dispatcher = EventDispatcher::new();
        let max_message_len = config.max_message_len;

        let worker = ClientWorker {
            backoff: BackoffPolicy::new(&config.backoff),
            dedup: DedupLedger::new(&config.dedup),
            rooms: RoomRegistry::new(),
            credentials: None,
            session: None,
            dispatcher: dispatcher.clone(),
            connector,
            config,
            cmd_rx,
            state_tx,
            rooms_tx,
        };
        tokio::spawn(worker.run());

        Ok(Self {
            cmd_tx,
            state_rx,
            rooms_rx,
            dispatcher,
            max_message_len,
        })
    }

    /// Start connecting with the given credentials.
    ///
    /// A no-op if a connection attempt or live session already exists.
    pub fn connect(&self, credentials: Credentials) -> ClientResult<()> {
        self.send_cmd(Command::Connect(credentials))
    }

    /// Tear down the current connection (or pending retry) and redial.
    pub fn reconnect(&self) -> ClientResult<()> {
        self.send_cmd(Command::Reconnect)
    }

    /// Disconnect and stay down. Cancels any pending retry.
    pub fn disconnect(&self) -> ClientResult<()> {
        self.send_cmd(Command::Disconnect)
    }

    /// Join a room. While disconnected this records intent; the join is
    /// sent once a session is established.
    pub fn join(&self, room_id: impl Into<String>) -> ClientResult<()> {
        self.send_cmd(Command::Join {
            room_id: room_id.into(),
        })
    }

    /// Leave a room.
    pub fn leave(&self, room_id: impl Into<String>) -> ClientResult<()> {
        self.send_cmd(Command::Leave {
            room_id: room_id.into(),
        })
    }

    /// Send a chat message to a room.
    ///
    /// Fails fast while not connected; messages are never queued for a
    /// future session.
    pub fn send_message(&self, room_id: impl Into<String>, text: impl Into<String>) -> ClientResult<()> {
        if !self.state().is_connected() {
            return Err(ClientError::NotConnected);
        }
        let text = text.into();
        let actual = text.chars().count();
        if actual > self.max_message_len {
            return Err(ClientError::MessageTooLong {
                actual,
                limit: self.max_message_len,
            });
        }
        self.send_cmd(Command::Send {
            room_id: room_id.into(),
            text,
        })
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }

    /// A watch channel for observing state transitions.
    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    /// Rooms the server currently confirms membership in, sorted by id.
    ///
    /// A snapshot maintained by the worker; it updates when joins are
    /// confirmed and when rooms are left.
    pub fn active_rooms(&self) -> Vec<Room> {
        self.rooms_rx.borrow().clone()
    }

    /// Register an event handler.
    pub fn on<F>(&self, kind: EventKind, handler: F) -> HandlerId
    where
        F: Fn(&ClientEvent) + Send + Sync + 'static,
    {
        self.dispatcher.on(kind, handler)
    }

    /// Unregister an event handler.
    pub fn off(&self, id: HandlerId) -> bool {
        self.dispatcher.off(id)
    }

    fn send_cmd(&self, cmd: Command) -> ClientResult<()> {
        self.cmd_tx.send(cmd).map_err(|_| ClientError::Closed)
    }
}

// ============================================================================
// Worker
// ============================================================================

#[derive(Debug)]
enum Command {
    Connect(Credentials),
    Reconnect,
    Disconnect,
    Join { room_id: String },
    Leave { room_id: String },
    Send { room_id: String, text: String },
}

/// How a whole session (including retries) ended.
enum SessionEnd {
    /// Back to the idle loop, waiting for a new connect
    Idle,
    /// All handles dropped, worker exits
    Shutdown,
}

/// How one live connection ended.
enum ConnectedEnd {
    RemoteClosed(String),
    UserDisconnect,
    ReconnectRequested,
    Shutdown,
}

/// Why a single connection attempt did not reach the connected state.
enum AttemptError {
    /// The attempt failed; [`ClientError::is_retryable`] decides whether
    /// the controller schedules another one.
    Failed(ClientError),
    /// The user disconnected mid-attempt.
    Aborted,
    /// All handles dropped mid-attempt.
    Shutdown,
}

enum BackoffWait {
    Proceed,
    Cancelled,
    Shutdown,
}

enum DialSelect {
    Done(Result<Box<dyn Transport>, TransportError>),
    TimedOut,
    Command(Option<Command>),
}

enum HandshakeSelect {
    Deadline,
    Frame(Result<Option<String>, TransportError>),
    Command(Option<Command>),
}

enum LiveSelect {
    Inbound(Result<Option<String>, TransportError>),
    Command(Option<Command>),
}

struct ClientWorker {
    config: ClientConfig,
    connector: Box<dyn Connector>,
    cmd_rx: mpsc::UnboundedReceiver<Command>,
    state_tx: watch::Sender<ConnectionState>,
    rooms_tx: watch::Sender<Vec<Room>>,
    dispatcher: EventDispatcher,
    backoff: BackoffPolicy,
    rooms: RoomRegistry,
    dedup: DedupLedger,
    credentials: Option<Credentials>,
    session: Option<Session>,
}

impl ClientWorker {
    async fn run(mut self) {
        // Idle loop: no socket, no retry pending
        while let Some(cmd) = self.cmd_rx.recv().await {
            match cmd {
                Command::Connect(credentials) => {
                    self.credentials = Some(credentials);
                    match self.run_session().await {
                        SessionEnd::Idle => {}
                        SessionEnd::Shutdown => return,
                    }
                }
                Command::Reconnect => {
                    if self.credentials.is_some() {
                        match self.run_session().await {
                            SessionEnd::Idle => {}
                            SessionEnd::Shutdown => return,
                        }
                    } else {
                        debug!("reconnect requested before any connect; ignoring");
                    }
                }
                Command::Join { room_id } => {
                    // Intent only; sent when a session comes up
                    self.rooms.request_join(&room_id);
                }
                Command::Leave { room_id } => {
                    self.rooms.remove(&room_id);
                    self.dedup.forget_room(&room_id);
                    self.publish_rooms();
                }
                Command::Disconnect => {}
                Command::Send { room_id, .. } => {
                    // The handle gates on state; this is a benign race
                    debug!(%room_id, "dropping send while disconnected");
                }
            }
        }
    }

    /// Drive one session: connect, authenticate, stay connected, and keep
    /// retrying transport-class failures until told to stop.
    async fn run_session(&mut self) -> SessionEnd {
        let mut attempt: u32 = 0;
        loop {
            if attempt > 0 {
                self.set_state(ConnectionState::Reconnecting);
                let delay = self.backoff.next_delay(attempt - 1);
                info!(attempt, delay_ms = delay.as_millis() as u64, "waiting before reconnect");
                match self.wait_backoff(delay).await {
                    BackoffWait::Proceed => {}
                    BackoffWait::Cancelled => {
                        self.set_state(ConnectionState::Disconnected);
                        return SessionEnd::Idle;
                    }
                    BackoffWait::Shutdown => return SessionEnd::Shutdown,
                }
            }

            self.set_state(ConnectionState::Connecting);
            match self.connect_and_authenticate().await {
                Ok(mut transport) => {
                    attempt = 0;
                    self.set_state(ConnectionState::Connected);
                    let end = self.run_connected(transport.as_mut()).await;
                    transport.close().await;
                    self.session = None;
                    match end {
                        ConnectedEnd::UserDisconnect => {
                            self.set_state(ConnectionState::Disconnected);
                            self.emit(ClientEvent::Disconnected {
                                reason: "disconnect requested".into(),
                            });
                            return SessionEnd::Idle;
                        }
                        ConnectedEnd::Shutdown => return SessionEnd::Shutdown,
                        ConnectedEnd::RemoteClosed(reason) => {
                            info!(%reason, "connection lost; will reconnect");
                            self.emit(ClientEvent::Disconnected { reason });
                            attempt = 1;
                        }
                        ConnectedEnd::ReconnectRequested => {
                            self.emit(ClientEvent::Disconnected {
                                reason: "reconnect requested".into(),
                            });
                            attempt = 1;
                        }
                    }
                }
                Err(AttemptError::Failed(err)) => {
                    if err.is_retryable() {
                        warn!(error = %err, code = err.error_code(), "connection attempt failed");
                        self.emit(ClientEvent::ConnectionError {
                            reason: err.to_string(),
                        });
                        attempt += 1;
                    } else {
                        warn!(error = %err, code = err.error_code(), "attempt failed terminally; giving up");
                        match err {
                            ClientError::AuthRejected(reason) => {
                                self.emit(ClientEvent::AuthenticationFailed { reason });
                            }
                            other => {
                                self.emit(ClientEvent::ConnectionError {
                                    reason: other.to_string(),
                                });
                            }
                        }
                        self.set_state(ConnectionState::Failed);
                        return SessionEnd::Idle;
                    }
                }
                Err(AttemptError::Aborted) => {
                    debug!("connection attempt aborted by disconnect");
                    self.set_state(ConnectionState::Disconnected);
                    return SessionEnd::Idle;
                }
                Err(AttemptError::Shutdown) => return SessionEnd::Shutdown,
            }
        }
    }

    /// Dial the endpoint, run the auth handshake, and replay room joins.
    ///
    /// Both phases keep draining commands so a disconnect aborts the
    /// attempt immediately instead of queuing behind a hung endpoint.
    async fn connect_and_authenticate(&mut self) -> Result<Box<dyn Transport>, AttemptError> {
        let mut transport = self.dial().await?;

        let credentials = match &self.credentials {
            Some(c) => c.clone(),
            // run_session is only entered with credentials set
            None => {
                transport.close().await;
                return Err(AttemptError::Failed(ClientError::AuthRejected(
                    "no credentials".into(),
                )));
            }
        };

        self.set_state(ConnectionState::Authenticating);
        self.send_envelope(
            transport.as_mut(),
            &Envelope::Authenticate {
                token: credentials.token.clone(),
                user_id: credentials.user_id.clone(),
                username: credentials.username.clone(),
            },
        )
        .await?;

        let timeout = self.config.auth_timeout();
        let deadline = tokio::time::sleep(timeout);
        tokio::pin!(deadline);

        loop {
            let select_result = tokio::select! {
                _ = &mut deadline => HandshakeSelect::Deadline,
                frame = transport.next_text() => HandshakeSelect::Frame(frame),
                cmd = self.cmd_rx.recv() => HandshakeSelect::Command(cmd),
            };

            match select_result {
                HandshakeSelect::Deadline => {
                    transport.close().await;
                    return Err(AttemptError::Failed(ClientError::AuthTimeout(timeout)));
                }
                HandshakeSelect::Command(None) => {
                    transport.close().await;
                    return Err(AttemptError::Shutdown);
                }
                HandshakeSelect::Command(Some(cmd)) => match cmd {
                    Command::Disconnect => {
                        transport.close().await;
                        return Err(AttemptError::Aborted);
                    }
                    Command::Connect(credentials) => {
                        // Takes effect on the next attempt; this handshake
                        // already presented the previous credentials
                        self.credentials = Some(credentials);
                    }
                    Command::Reconnect => {
                        debug!("reconnect during handshake; attempt already underway");
                    }
                    Command::Join { room_id } => {
                        self.rooms.request_join(&room_id);
                    }
                    Command::Leave { room_id } => {
                        self.rooms.remove(&room_id);
                        self.dedup.forget_room(&room_id);
                        self.publish_rooms();
                    }
                    Command::Send { room_id, .. } => {
                        debug!(%room_id, "dropping send during handshake");
                    }
                },
                HandshakeSelect::Frame(Ok(Some(text))) => match chatlink_proto::decode(&text) {
                    Ok(Envelope::Authenticated {}) => {
                        let session = Session::establish(&credentials);
                        info!(user_id = %session.user_id, "authenticated");
                        self.session = Some(session.clone());
                        self.emit(ClientEvent::Authenticated { session });
                        self.replay_joins(transport.as_mut()).await?;
                        return Ok(transport);
                    }
                    Ok(Envelope::AuthenticationFailed { reason }) => {
                        transport.close().await;
                        let reason =
                            reason.unwrap_or_else(|| "authentication failed".to_string());
                        return Err(AttemptError::Failed(ClientError::AuthRejected(reason)));
                    }
                    Ok(other) => {
                        debug!(envelope = ?other, "frame before auth verdict; ignoring");
                    }
                    Err(err) => {
                        warn!(error = %err, "dropping malformed frame during handshake");
                    }
                },
                HandshakeSelect::Frame(Ok(None)) => {
                    return Err(AttemptError::Failed(ClientError::Transport(
                        TransportError::Closed,
                    )));
                }
                HandshakeSelect::Frame(Err(err)) => {
                    return Err(AttemptError::Failed(ClientError::Transport(err)));
                }
            }
        }
    }

    /// Dial with a deadline, still honoring commands while the socket
    /// comes up. A slow endpoint must never make disconnect wait.
    async fn dial(&mut self) -> Result<Box<dyn Transport>, AttemptError> {
        let timeout = self.config.connect_timeout();
        let url = self.config.url.clone();
        let dial = self.connector.connect(&url);
        tokio::pin!(dial);
        let deadline = tokio::time::sleep(timeout);
        tokio::pin!(deadline);

        loop {
            let select_result = tokio::select! {
                result = &mut dial => DialSelect::Done(result),
                _ = &mut deadline => DialSelect::TimedOut,
                cmd = self.cmd_rx.recv() => DialSelect::Command(cmd),
            };

            match select_result {
                DialSelect::Done(Ok(transport)) => return Ok(transport),
                DialSelect::Done(Err(err)) => {
                    return Err(AttemptError::Failed(ClientError::Transport(err)));
                }
                DialSelect::TimedOut => {
                    return Err(AttemptError::Failed(ClientError::ConnectTimeout(timeout)));
                }
                DialSelect::Command(None) => return Err(AttemptError::Shutdown),
                DialSelect::Command(Some(cmd)) => match cmd {
                    Command::Disconnect => return Err(AttemptError::Aborted),
                    Command::Connect(credentials) => {
                        self.credentials = Some(credentials);
                    }
                    Command::Reconnect => {
                        debug!("reconnect while dialing; attempt already underway");
                    }
                    Command::Join { room_id } => {
                        self.rooms.request_join(&room_id);
                    }
                    Command::Leave { room_id } => {
                        self.rooms.remove(&room_id);
                        self.dedup.forget_room(&room_id);
                        self.publish_rooms();
                    }
                    Command::Send { room_id, .. } => {
                        debug!(%room_id, "dropping send while dialing");
                    }
                },
            }
        }
    }

    /// Re-send join requests for every membership and pending intent.
    async fn replay_joins(&mut self, transport: &mut dyn Transport) -> Result<(), AttemptError> {
        let targets = self.rooms.rejoin_targets();
        // Memberships are unconfirmed again until the server answers
        self.publish_rooms();
        for room_id in targets {
            debug!(%room_id, "requesting room join");
            self.send_envelope(transport, &Envelope::JoinRoom { room_id })
                .await?;
        }
        Ok(())
    }

    /// The live-session loop: inbound frames and user commands, one at a
    /// time, until something ends the connection.
    async fn run_connected(&mut self, transport: &mut dyn Transport) -> ConnectedEnd {
        loop {
            let select_result = tokio::select! {
                frame = transport.next_text() => LiveSelect::Inbound(frame),
                cmd = self.cmd_rx.recv() => LiveSelect::Command(cmd),
            };

            match select_result {
                LiveSelect::Inbound(Ok(Some(text))) => match chatlink_proto::decode(&text) {
                    Ok(envelope) => self.handle_envelope(envelope),
                    // Malformed frames never tear the connection down
                    Err(err) => warn!(error = %err, "dropping malformed frame"),
                },
                LiveSelect::Inbound(Ok(None)) => {
                    return ConnectedEnd::RemoteClosed("connection closed by server".into());
                }
                LiveSelect::Inbound(Err(err)) => {
                    return ConnectedEnd::RemoteClosed(err.to_string());
                }
                LiveSelect::Command(None) => return ConnectedEnd::Shutdown,
                LiveSelect::Command(Some(cmd)) => match cmd {
                    Command::Disconnect => return ConnectedEnd::UserDisconnect,
                    Command::Reconnect => return ConnectedEnd::ReconnectRequested,
                    Command::Connect(_) => {
                        debug!("connect while already connected; ignoring");
                    }
                    Command::Join { room_id } => {
                        if self.rooms.request_join(&room_id) {
                            if let Err(end) = self
                                .send_or_drop(transport, Envelope::JoinRoom { room_id })
                                .await
                            {
                                return end;
                            }
                        } else {
                            debug!(%room_id, "join already active or pending");
                        }
                    }
                    Command::Leave { room_id } => {
                        self.dedup.forget_room(&room_id);
                        if self.rooms.remove(&room_id) {
                            self.publish_rooms();
                            if let Err(end) = self
                                .send_or_drop(transport, Envelope::LeaveRoom { room_id })
                                .await
                            {
                                return end;
                            }
                        }
                    }
                    Command::Send { room_id, text } => {
                        let Some(session) = &self.session else {
                            warn!(%room_id, "no session for outbound message; dropping");
                            continue;
                        };
                        let envelope = Envelope::Message(ChatMessage {
                            id: None,
                            room_id,
                            user_id: session.user_id.clone(),
                            username: session.username.clone(),
                            message: text,
                            timestamp: chrono::Utc::now().timestamp_millis(),
                        });
                        if let Err(end) = self.send_or_drop(transport, envelope).await {
                            return end;
                        }
                    }
                },
            }
        }
    }

    /// Apply one inbound envelope to client state and emit events.
    fn handle_envelope(&mut self, envelope: Envelope) {
        match envelope {
            Envelope::Message(message) => {
                if self.dedup.observe(&message) {
                    self.emit(ClientEvent::Message { message });
                } else {
                    debug!(
                        room_id = %message.room_id,
                        id = ?message.id,
                        "duplicate message suppressed"
                    );
                }
            }
            Envelope::RoomJoined { room_id } => {
                self.rooms.confirm_join(&room_id);
                // Publish before the event so handlers observe the new room
                self.publish_rooms();
                info!(%room_id, "room joined");
                self.emit(ClientEvent::RoomJoined { room_id });
            }
            Envelope::Error { room_id, reason } => {
                if let Some(room) = &room_id {
                    self.rooms.fail_join(room);
                }
                warn!(room_id = ?room_id, reason = ?reason, "server error");
                self.emit(ClientEvent::Error { room_id, reason });
            }
            Envelope::UserJoined {
                room_id,
                user_id,
                username,
            } => {
                self.emit(ClientEvent::UserJoined {
                    room_id,
                    user_id,
                    username,
                });
            }
            Envelope::UserLeft {
                room_id,
                user_id,
                username,
            } => {
                self.emit(ClientEvent::UserLeft {
                    room_id,
                    user_id,
                    username,
                });
            }
            Envelope::AuthenticationFailed { reason } => {
                warn!(reason = ?reason, "auth failure after handshake; ignoring");
            }
            other => {
                debug!(envelope = ?other, "unexpected inbound envelope; ignoring");
            }
        }
    }

    /// Sleep out a backoff delay while still honoring commands.
    async fn wait_backoff(&mut self, delay: Duration) -> BackoffWait {
        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);
        loop {
            let cmd = tokio::select! {
                _ = &mut sleep => return BackoffWait::Proceed,
                cmd = self.cmd_rx.recv() => cmd,
            };
            match cmd {
                None => return BackoffWait::Shutdown,
                Some(Command::Disconnect) => return BackoffWait::Cancelled,
                // Both cut the wait short and retry immediately
                Some(Command::Reconnect) => return BackoffWait::Proceed,
                Some(Command::Connect(credentials)) => {
                    self.credentials = Some(credentials);
                    return BackoffWait::Proceed;
                }
                Some(Command::Join { room_id }) => {
                    self.rooms.request_join(&room_id);
                }
                Some(Command::Leave { room_id }) => {
                    self.rooms.remove(&room_id);
                    self.dedup.forget_room(&room_id);
                    self.publish_rooms();
                }
                Some(Command::Send { room_id, .. }) => {
                    debug!(%room_id, "dropping send during backoff");
                }
            }
        }
    }

    /// Encode and send during the handshake, mapping failures to attempt
    /// errors for the retry classifier.
    async fn send_envelope(
        &self,
        transport: &mut dyn Transport,
        envelope: &Envelope,
    ) -> Result<(), AttemptError> {
        let frame = chatlink_proto::encode(envelope)
            .map_err(|e| AttemptError::Failed(ClientError::Protocol(e)))?;
        transport
            .send_text(frame)
            .await
            .map_err(|e| AttemptError::Failed(ClientError::Transport(e)))
    }

    /// Encode and send on a live connection; a transport failure ends it.
    async fn send_or_drop(
        &self,
        transport: &mut dyn Transport,
        envelope: Envelope,
    ) -> Result<(), ConnectedEnd> {
        let frame = match chatlink_proto::encode(&envelope) {
            Ok(frame) => frame,
            Err(err) => {
                warn!(error = %err, "failed to encode outbound envelope");
                return Ok(());
            }
        };
        transport
            .send_text(frame)
            .await
            .map_err(|err| ConnectedEnd::RemoteClosed(err.to_string()))
    }

    fn set_state(&self, state: ConnectionState) {
        debug!(%state, "connection state");
        self.state_tx.send_replace(state);
    }

    fn publish_rooms(&self) {
        self.rooms_tx.send_replace(self.rooms.active_rooms());
    }

    fn emit(&self, event: ClientEvent) {
        self.dispatcher.emit(&event);
    }
}
