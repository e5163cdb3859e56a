//! Duplicate suppression for inbound chat messages.
//!
//! Reconnects and server-side retries can redeliver messages. Each room
//! keeps a bounded window of recently seen keys; a message whose key is
//! already in the window is dropped before it reaches the application.
//! The window is bounded both by age and by entry count so memory stays
//! flat during long sessions.

use crate::config::DedupConfig;
use chatlink_proto::ChatMessage;
use std::collections::{HashMap, HashSet, VecDeque};
use std::time::{Duration, Instant};

/// Identity of a message for dedup purposes.
///
/// Prefer the server-assigned id; fall back to sender + text + timestamp
/// when the server did not assign one.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum MessageKey {
    Id(String),
    Composite {
        user_id: String,
        text: String,
        timestamp: i64,
    },
}

impl MessageKey {
    fn of(msg: &ChatMessage) -> Self {
        match &msg.id {
            Some(id) => MessageKey::Id(id.clone()),
            None => MessageKey::Composite {
                user_id: msg.user_id.clone(),
                text: msg.message.clone(),
                timestamp: msg.timestamp,
            },
        }
    }
}

#[derive(Debug, Default)]
struct RoomWindow {
    // Arrival order for eviction; `seen` mirrors it for O(1) lookups.
    order: VecDeque<(MessageKey, Instant)>,
    seen: HashSet<MessageKey>,
}

/// Per-room duplicate ledger.
#[derive(Debug)]
pub struct DedupLedger {
    window: Duration,
    max_entries: usize,
    rooms: HashMap<String, RoomWindow>,
}

impl DedupLedger {
    pub fn new(config: &DedupConfig) -> Self {
        Self {
            window: Duration::from_secs(config.window_secs),
            max_entries: config.max_entries,
            rooms: HashMap::new(),
        }
    }

    /// Record a message arrival. Returns true if the message is new and
    /// should be delivered, false if it is a duplicate to drop.
    pub fn observe(&mut self, msg: &ChatMessage) -> bool {
        self.observe_at(msg, Instant::now())
    }

    /// As [`observe`](Self::observe), with an injected clock for tests.
    pub fn observe_at(&mut self, msg: &ChatMessage, now: Instant) -> bool {
        let room = self.rooms.entry(msg.room_id.clone()).or_default();

        // Age out expired entries first so a stale key does not suppress
        // a legitimate redelivery outside the window.
        while let Some((key, seen_at)) = room.order.front() {
            if now.duration_since(*seen_at) < self.window {
                break;
            }
            room.seen.remove(key);
            room.order.pop_front();
        }

        let key = MessageKey::of(msg);
        if room.seen.contains(&key) {
            return false;
        }

        if room.order.len() >= self.max_entries {
            if let Some((oldest, _)) = room.order.pop_front() {
                room.seen.remove(&oldest);
            }
        }
        room.seen.insert(key.clone());
        room.order.push_back((key, now));
        true
    }

    /// Drop all state for a room the user left.
    pub fn forget_room(&mut self, room_id: &str) {
        self.rooms.remove(room_id);
    }
}
