use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use scrawl_core::phase::GamePhase;

use crate::room::Room;

/// Process-wide set of rooms, behind its own lock. Lock order is always
/// registry → room → player connection; the registry lock is never held
/// while waiting on a room lock taken elsewhere.
///
/// Constructed at startup and drained at shutdown. Tests instantiate their
/// own; nothing here is a true singleton.
pub struct Registry {
    rooms: RwLock<HashMap<String, Arc<Room>>>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
        }
    }

    /// Fetch a room, creating it in the lobby phase if absent.
    pub async fn get_or_create(&self, id: &str, max_rounds: u32) -> Arc<Room> {
        {
            let rooms = self.rooms.read().await;
            if let Some(room) = rooms.get(id) {
                return Arc::clone(room);
            }
        }
        let mut rooms = self.rooms.write().await;
        let room = rooms
            .entry(id.to_string())
            .or_insert_with(|| {
                tracing::info!(room = %id, "Created room");
                Arc::new(Room::new(id.to_string(), max_rounds))
            });
        Arc::clone(room)
    }

    pub async fn get(&self, id: &str) -> Option<Arc<Room>> {
        self.rooms.read().await.get(id).cloned()
    }

    /// Id of any room still in the lobby with a free slot.
    pub async fn joinable_room(&self, max_players: usize) -> Option<String> {
        let rooms = self.rooms.read().await;
        for room in rooms.values() {
            let st = room.state.read().await;
            if st.phase == GamePhase::Lobby && st.players.len() < max_players {
                return Some(room.id.clone());
            }
        }
        None
    }

    pub async fn remove(&self, id: &str) -> Option<Arc<Room>> {
        self.rooms.write().await.remove(id)
    }

    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }

    /// Drain every room: cancel timers, close connections, clear the map.
    pub async fn shutdown(&self) {
        let rooms: Vec<Arc<Room>> = {
            let mut map = self.rooms.write().await;
            map.drain().map(|(_, room)| room).collect()
        };
        for room in rooms {
            let conns = {
                let mut st = room.state.write().await;
                if let Some(timer) = st.timer.take() {
                    timer.cancel.cancel();
                }
                st.players
                    .drain()
                    .map(|(_, p)| p.conn)
                    .collect::<Vec<_>>()
            };
            for conn in conns {
                conn.close().await;
            }
            tracing::info!(room = %room.id, "Room drained at shutdown");
        }
    }
}
