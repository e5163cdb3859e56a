//! Room membership registry.
//!
//! Tracks which rooms the user is in (server-confirmed) and which joins
//! are still in flight. A room appears here iff the user is a confirmed
//! member or has an outstanding join intent; nothing else. The registry
//! survives reconnects so memberships can be replayed.

use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};

/// A confirmed room membership.
#[derive(Debug, Clone)]
pub struct Room {
    /// Room identifier.
    pub room_id: String,
    /// When the server confirmed the join.
    pub joined_at: DateTime<Utc>,
}

/// Membership state across connections.
#[derive(Debug, Default)]
pub struct RoomRegistry {
    active: HashMap<String, Room>,
    pending: HashSet<String>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record join intent. Returns false if the room is already active
    /// or already pending, in which case no envelope should be sent.
    pub fn request_join(&mut self, room_id: &str) -> bool {
        if self.active.contains_key(room_id) || self.pending.contains(room_id) {
            return false;
        }
        self.pending.insert(room_id.to_string());
        true
    }

    /// Server confirmed a join. A confirmation we never asked for is
    /// tolerated and recorded anyway; the server wins.
    pub fn confirm_join(&mut self, room_id: &str) -> Room {
        self.pending.remove(room_id);
        let room = Room {
            room_id: room_id.to_string(),
            joined_at: Utc::now(),
        };
        self.active.insert(room_id.to_string(), room.clone());
        room
    }

    /// A join was rejected; drop the intent, leave memberships untouched.
    pub fn fail_join(&mut self, room_id: &str) {
        self.pending.remove(room_id);
    }

    /// The user left a room (or the leave was requested locally).
    pub fn remove(&mut self, room_id: &str) -> bool {
        self.pending.remove(room_id);
        self.active.remove(room_id).is_some()
    }

    /// Confirmed memberships, sorted by room id for stable snapshots.
    pub fn active_rooms(&self) -> Vec<Room> {
        let mut rooms: Vec<Room> = self.active.values().cloned().collect();
        rooms.sort_by(|a, b| a.room_id.cmp(&b.room_id));
        rooms
    }

    /// Rooms to (re)join on a fresh connection: every confirmed membership
    /// plus every recorded intent. Active entries move back to pending
    /// since the new connection has not confirmed them yet.
    pub fn rejoin_targets(&mut self) -> Vec<String> {
        let mut targets: Vec<String> = self.active.keys().cloned().collect();
        targets.sort();
        for room_id in &targets {
            self.pending.insert(room_id.clone());
        }
        self.active.clear();
        let mut pending: Vec<String> = self.pending.iter().cloned().collect();
        pending.sort();
        pending
    }
}
