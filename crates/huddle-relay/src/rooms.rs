//! Room membership and connection bookkeeping for the relay.
//!
//! Each participant has at most one live connection. A reconnect under the
//! same ID replaces the previous one; every registration gets a generation
//! number so cleanup of the replaced connection cannot evict its successor.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use huddle_common::{ParticipantId, RoomId};
use tokio::sync::{mpsc, RwLock};

/// Outbound frames for one connection, already serialized.
pub type FrameSender = mpsc::Sender<String>;

struct Connection {
    generation: u64,
    tx: FrameSender,
}

#[derive(Default)]
struct State {
    next_generation: u64,
    connections: HashMap<ParticipantId, Connection>,
    rooms: HashMap<RoomId, BTreeSet<ParticipantId>>,
}

/// Shared registry of connections and rooms.
#[derive(Clone, Default)]
pub struct RoomRegistry {
    state: Arc<RwLock<State>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection. Returns its generation and whether it
    /// replaced an existing one.
    pub async fn connect(&self, participant: &ParticipantId, tx: FrameSender) -> (u64, bool) {
        let mut state = self.state.write().await;
        state.next_generation += 1;
        let generation = state.next_generation;
        let replaced = state
            .connections
            .insert(participant.clone(), Connection { generation, tx })
            .is_some();
        (generation, replaced)
    }

    /// Whether `generation` is still the live connection for `participant`.
    pub async fn is_current(&self, participant: &ParticipantId, generation: u64) -> bool {
        self.state
            .read()
            .await
            .connections
            .get(participant)
            .is_some_and(|c| c.generation == generation)
    }

    /// Drop a connection and its room memberships, but only if it is still
    /// the current one. Returns the rooms it was removed from.
    pub async fn disconnect(&self, participant: &ParticipantId, generation: u64) -> Vec<RoomId> {
        let mut state = self.state.write().await;
        match state.connections.get(participant) {
            Some(c) if c.generation == generation => {}
            _ => return Vec::new(),
        }
        state.connections.remove(participant);

        let mut left = Vec::new();
        state.rooms.retain(|room, members| {
            if members.remove(participant) {
                left.push(room.clone());
            }
            !members.is_empty()
        });
        left
    }

    /// Add `participant` to `room` and return the other members.
    pub async fn join(&self, room: &RoomId, participant: &ParticipantId) -> Vec<ParticipantId> {
        let mut state = self.state.write().await;
        let members = state.rooms.entry(room.clone()).or_default();
        members.insert(participant.clone());
        members.iter().filter(|m| *m != participant).cloned().collect()
    }

    /// Remove `participant` from `room`. Returns false if it was not a member.
    pub async fn leave(&self, room: &RoomId, participant: &ParticipantId) -> bool {
        let mut state = self.state.write().await;
        let Some(members) = state.rooms.get_mut(room) else {
            return false;
        };
        let removed = members.remove(participant);
        if members.is_empty() {
            state.rooms.remove(room);
        }
        removed
    }

    /// Sender for one participant's live connection.
    pub async fn sender(&self, participant: &ParticipantId) -> Option<FrameSender> {
        self.state
            .read()
            .await
            .connections
            .get(participant)
            .map(|c| c.tx.clone())
    }

    /// Senders for every connected member of `room` except `exclude`.
    pub async fn room_senders(&self, room: &RoomId, exclude: &ParticipantId) -> Vec<FrameSender> {
        let state = self.state.read().await;
        let Some(members) = state.rooms.get(room) else {
            return Vec::new();
        };
        members
            .iter()
            .filter(|m| *m != exclude)
            .filter_map(|m| state.connections.get(m))
            .map(|c| c.tx.clone())
            .collect()
    }

    /// Rooms `participant` currently belongs to.
    pub async fn rooms_of(&self, participant: &ParticipantId) -> Vec<RoomId> {
        self.state
            .read()
            .await
            .rooms
            .iter()
            .filter(|(_, members)| members.contains(participant))
            .map(|(room, _)| room.clone())
            .collect()
    }

    pub async fn members(&self, room: &RoomId) -> Vec<ParticipantId> {
        self.state
            .read()
            .await
            .rooms
            .get(room)
            .map(|m| m.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of live connections.
    pub async fn connection_count(&self) -> usize {
        self.state.read().await.connections.len()
    }
}
