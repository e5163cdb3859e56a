//! Typed client events and the handler dispatcher.
//!
//! Applications subscribe per event kind; the worker emits. Handlers run
//! synchronously on the emitting task in registration order. A panicking
//! handler is isolated and logged so one bad subscriber cannot take down
//! the event loop or starve later subscribers.

use crate::session::Session;
use chatlink_proto::ChatMessage;
use parking_lot::Mutex;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::error;

/// Everything the client reports to the application.
#[derive(Debug, Clone)]
pub enum ClientEvent {
    /// Auth handshake succeeded; the session is live.
    Authenticated {
        session: Session,
    },
    /// The server rejected the credentials. Terminal for this connect.
    AuthenticationFailed {
        reason: String,
    },
    /// A new (non-duplicate) chat message arrived.
    Message {
        message: ChatMessage,
    },
    /// A user entered a room the client is in.
    UserJoined {
        room_id: String,
        user_id: String,
        username: String,
    },
    /// A user left a room the client is in.
    UserLeft {
        room_id: String,
        user_id: String,
        username: String,
    },
    /// The server confirmed a join.
    RoomJoined {
        room_id: String,
    },
    /// A transport-class failure; reconnection may follow.
    ConnectionError {
        reason: String,
    },
    /// The connection dropped, whether by the server or by request.
    Disconnected {
        reason: String,
    },
    /// A server-reported error, optionally scoped to a room.
    Error {
        room_id: Option<String>,
        reason: Option<String>,
    },
}

/// Subscription key: which events a handler wants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Authenticated,
    AuthenticationFailed,
    Message,
    UserJoined,
    UserLeft,
    RoomJoined,
    ConnectionError,
    Disconnected,
    Error,
}

impl ClientEvent {
    /// The kind this event dispatches under.
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Authenticated { .. } => EventKind::Authenticated,
            Self::AuthenticationFailed { .. } => EventKind::AuthenticationFailed,
            Self::Message { .. } => EventKind::Message,
            Self::UserJoined { .. } => EventKind::UserJoined,
            Self::UserLeft { .. } => EventKind::UserLeft,
            Self::RoomJoined { .. } => EventKind::RoomJoined,
            Self::ConnectionError { .. } => EventKind::ConnectionError,
            Self::Disconnected { .. } => EventKind::Disconnected,
            Self::Error { .. } => EventKind::Error,
        }
    }
}

/// Opaque handle returned by [`EventDispatcher::on`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandlerId(u64);

type Handler = dyn Fn(&ClientEvent) + Send + Sync + 'static;

#[derive(Default)]
struct Registry {
    // Registration order is dispatch order
    handlers: Vec<(HandlerId, EventKind, Arc<Handler>)>,
}

/// Thread-safe handler registry shared by the handle and the worker.
#[derive(Clone, Default)]
pub struct EventDispatcher {
    registry: Arc<Mutex<Registry>>,
    next_id: Arc<AtomicU64>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for one event kind.
    pub fn on<F>(&self, kind: EventKind, handler: F) -> HandlerId
    where
        F: Fn(&ClientEvent) + Send + Sync + 'static,
    {
        let id = HandlerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.registry
            .lock()
            .handlers
            .push((id, kind, Arc::new(handler)));
        id
    }

    /// Unregister a handler. Returns false if the id was already gone.
    pub fn off(&self, id: HandlerId) -> bool {
        let mut registry = self.registry.lock();
        let before = registry.handlers.len();
        registry.handlers.retain(|(hid, _, _)| *hid != id);
        registry.handlers.len() != before
    }

    /// Deliver an event to every matching handler, in registration order.
    ///
    /// Handlers are cloned out of the lock before invocation so a handler
    /// that registers or unregisters from inside its own callback does not
    /// deadlock.
    pub fn emit(&self, event: &ClientEvent) {
        let kind = event.kind();
        let matching: Vec<Arc<Handler>> = self
            .registry
            .lock()
            .handlers
            .iter()
            .filter(|(_, k, _)| *k == kind)
            .map(|(_, _, h)| Arc::clone(h))
            .collect();

        for handler in matching {
            if catch_unwind(AssertUnwindSafe(|| handler(event))).is_err() {
                error!(event_kind = ?kind, "event handler panicked; continuing");
            }
        }
    }
}
