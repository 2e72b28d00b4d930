use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::ws::{Message, Utf8Bytes, WebSocket};
use futures::SinkExt;
use futures::stream::SplitSink;
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;

use scrawl_core::canvas::PixelMessage;
use scrawl_core::net::messages::{GameStateData, ServerMessage};
use scrawl_core::net::protocol::encode_server_message;
use scrawl_core::phase::GamePhase;
use scrawl_core::player::{PlayerGuess, PublicPlayer, RoundStats};
use scrawl_core::words::mask_word;

use crate::state::AppState;

pub type PlayerId = String;

/// Write half of a player's WebSocket. The mutex is the per-connection write
/// lock: concurrent broadcasters are serialized here, so at most one outbound
/// frame is in flight per connection. Never acquired while holding a room
/// lock.
pub struct PlayerConn {
    writer: Mutex<Option<SplitSink<WebSocket, Message>>>,
}

impl PlayerConn {
    pub fn new(sink: SplitSink<WebSocket, Message>) -> Self {
        Self {
            writer: Mutex::new(Some(sink)),
        }
    }

    /// A handle with no socket behind it; every send fails. Used by tests.
    pub fn detached() -> Self {
        Self {
            writer: Mutex::new(None),
        }
    }

    pub async fn send_text(&self, text: Utf8Bytes) -> Result<(), axum::Error> {
        let mut writer = self.writer.lock().await;
        match writer.as_mut() {
            Some(sink) => sink.send(Message::Text(text)).await,
            None => Err(axum::Error::new("connection closed")),
        }
    }

    /// Close the socket. Safe to call more than once.
    pub async fn close(&self) {
        if let Some(mut sink) = self.writer.lock().await.take() {
            let _ = sink.close().await;
        }
    }
}

/// A connected player and their per-round state. Lives inside `RoomState`,
/// mutated only under the room's write lock; the conn handle is `Arc`-shared
/// so sends happen after that lock is released.
pub struct Player {
    pub id: PlayerId,
    pub username: String,
    pub conn: Arc<PlayerConn>,
    pub score: i32,
    pub canvas_width: i32,
    pub canvas_height: i32,
    pub is_ready: bool,
    pub has_guessed: bool,
    pub can_draw: bool,
    pub is_connected: bool,
    pub joined_at_ms: u64,
    /// Monotonic join sequence within the room; fixes the drawing rotation.
    pub seat: u64,
    pub total_guesses: u32,
    pub correct_guesses: u32,
    pub times_drawn: u32,
}

impl Player {
    pub fn public(&self) -> PublicPlayer {
        PublicPlayer {
            id: self.id.clone(),
            username: self.username.clone(),
            score: self.score,
            is_ready: self.is_ready,
            has_guessed: self.has_guessed,
            is_connected: self.is_connected,
            can_draw: self.can_draw,
            total_guesses: self.total_guesses,
            correct_guesses: self.correct_guesses,
            times_drawn: self.times_drawn,
            joined_at_ms: self.joined_at_ms,
        }
    }

    pub fn reset_round_state(&mut self) {
        self.has_guessed = false;
        self.can_draw = false;
    }
}

/// The active phase timer. `remaining()` is always derived from the start
/// instant; the stored duration is never counted down.
pub struct PhaseTimer {
    /// Identity of this timer; a stale timer task must not deactivate a
    /// newer one.
    pub generation: u64,
    pub started_at: Instant,
    pub duration: Duration,
    pub active: bool,
    pub cancel: CancellationToken,
}

impl PhaseTimer {
    pub fn remaining(&self) -> Duration {
        self.duration.saturating_sub(self.started_at.elapsed())
    }
}

/// Everything behind the room's single read/write lock.
pub struct RoomState {
    pub phase: GamePhase,
    pub players: HashMap<PlayerId, Player>,
    /// Drawing rotation.
    pub order: Vec<PlayerId>,
    pub current_index: usize,
    pub current_drawer: Option<PlayerId>,
    pub word: String,
    /// Non-empty only during selection; visible only to the drawer.
    pub word_choices: Vec<String>,
    pub round_number: u32,
    pub max_rounds: u32,
    pub correct_guessers: Vec<PlayerGuess>,
    pub round_stats: Vec<RoundStats>,
    pub canvas_state: Vec<PixelMessage>,
    pub timer: Option<PhaseTimer>,
    pub ready: HashMap<PlayerId, bool>,
    pub has_game_started: bool,
    /// Millisecond timestamp of the current drawing phase start.
    pub round_started_ms: u64,
    timer_generations: u64,
    join_seq: u64,
}

impl RoomState {
    fn new(max_rounds: u32) -> Self {
        Self {
            phase: GamePhase::Lobby,
            players: HashMap::new(),
            order: Vec::new(),
            current_index: 0,
            current_drawer: None,
            word: String::new(),
            word_choices: Vec::new(),
            round_number: 1,
            max_rounds,
            correct_guessers: Vec::new(),
            round_stats: Vec::new(),
            canvas_state: Vec::new(),
            timer: None,
            ready: HashMap::new(),
            has_game_started: false,
            round_started_ms: 0,
            timer_generations: 0,
            join_seq: 0,
        }
    }

    pub fn next_timer_generation(&mut self) -> u64 {
        self.timer_generations += 1;
        self.timer_generations
    }

    pub fn next_seat(&mut self) -> u64 {
        self.join_seq += 1;
        self.join_seq
    }

    pub fn connected_count(&self) -> usize {
        self.players.values().filter(|p| p.is_connected).count()
    }

    pub fn all_ready(&self) -> bool {
        self.players
            .values()
            .filter(|p| p.is_connected)
            .all(|p| p.is_ready)
    }

    pub fn drawer(&self) -> Option<&Player> {
        self.current_drawer
            .as_ref()
            .and_then(|id| self.players.get(id))
    }

    /// True once every connected non-drawer has guessed correctly.
    pub fn everyone_guessed(&self) -> bool {
        self.players
            .values()
            .filter(|p| p.is_connected && Some(&p.id) != self.current_drawer.as_ref())
            .all(|p| p.has_guessed)
    }

    /// Players as wire snapshots, in seat order.
    pub fn public_players(&self) -> Vec<PublicPlayer> {
        let mut players: Vec<&Player> = self.players.values().collect();
        players.sort_by_key(|p| p.seat);
        players.iter().map(|p| p.public()).collect()
    }

    pub fn timer_remaining_ms(&self) -> u64 {
        self.timer
            .as_ref()
            .filter(|t| t.active)
            .map(|t| t.remaining().as_millis() as u64)
            .unwrap_or(0)
    }

    /// Snapshot for `welcome_msg` / `game_state_update`. The drawer's copy
    /// carries the full word; everyone else sees the mask.
    pub fn game_state(&self, include_full_word: bool) -> GameStateData {
        let word = if self.phase.has_word() {
            if include_full_word {
                self.word.clone()
            } else {
                mask_word(&self.word)
            }
        } else {
            String::new()
        };
        GameStateData {
            phase: self.phase,
            round_number: self.round_number,
            max_rounds: self.max_rounds,
            current_drawer: self.drawer().map(Player::public),
            time_remaining_ms: self.timer_remaining_ms(),
            players: self.public_players(),
            correct_guessers: self.correct_guessers.clone(),
            word,
        }
    }

    /// Defensive consistency check; callers log and skip a broadcast on
    /// failure rather than tearing the room down.
    pub fn validate(&self) -> bool {
        if !self.order.is_empty() && self.current_index >= self.order.len() {
            tracing::warn!(
                index = self.current_index,
                order_len = self.order.len(),
                "current_index out of range"
            );
            return false;
        }
        if let Some(ref drawer_id) = self.current_drawer {
            if !self.players.contains_key(drawer_id) {
                tracing::warn!(drawer = %drawer_id, "current drawer missing from player map");
                return false;
            }
            if !self.order.is_empty() && &self.order[self.current_index] != drawer_id {
                tracing::warn!(
                    drawer = %drawer_id,
                    index = self.current_index,
                    "current drawer does not match rotation index"
                );
                return false;
            }
        }
        if self.phase == GamePhase::Drawing {
            let drawers: Vec<&PlayerId> = self
                .players
                .values()
                .filter(|p| p.can_draw)
                .map(|p| &p.id)
                .collect();
            if drawers.len() != 1 || Some(drawers[0]) != self.current_drawer.as_ref() {
                tracing::warn!(?drawers, "drawing phase without exactly one permitted drawer");
                return false;
            }
        }
        true
    }
}

/// An isolated game instance. The registry owns the map of rooms; sessions
/// and timer tasks share it through `Arc`.
pub struct Room {
    pub id: String,
    pub state: RwLock<RoomState>,
}

impl Room {
    pub fn new(id: String, max_rounds: u32) -> Self {
        Self {
            id,
            state: RwLock::new(RoomState::new(max_rounds)),
        }
    }
}

fn encode(msg: &ServerMessage) -> Option<Utf8Bytes> {
    match encode_server_message(msg) {
        Ok(text) => Some(Utf8Bytes::from(text)),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode server message");
            None
        },
    }
}

async fn snapshot_conns(room: &Room, exclude: Option<&str>) -> Vec<(PlayerId, Arc<PlayerConn>)> {
    let st = room.state.read().await;
    st.players
        .values()
        .filter(|p| p.is_connected && Some(p.id.as_str()) != exclude)
        .map(|p| (p.id.clone(), Arc::clone(&p.conn)))
        .collect()
}

/// Send to one connection; a failed write means the peer is gone, so its
/// removal is scheduled in a fresh task rather than re-entering the room
/// lock from the broadcast site.
async fn deliver(
    state: &AppState,
    room: &Arc<Room>,
    player_id: &str,
    conn: &Arc<PlayerConn>,
    text: Utf8Bytes,
) {
    if let Err(e) = conn.send_text(text).await {
        tracing::debug!(
            room = %room.id,
            player_id = %player_id,
            error = %e,
            "Write failed; scheduling player removal"
        );
        let state = state.clone();
        let room = Arc::clone(room);
        let player_id = player_id.to_string();
        tokio::spawn(async move {
            crate::ws::remove_player(&state, &room, &player_id).await;
        });
    }
}

/// Broadcast a message to every connected player in the room.
///
/// The payload is encoded once, the connection list is snapshotted under the
/// read lock, and all sends happen with no room lock held.
pub async fn broadcast(state: &AppState, room: &Arc<Room>, msg: &ServerMessage) {
    let Some(text) = encode(msg) else { return };
    for (player_id, conn) in snapshot_conns(room, None).await {
        deliver(state, room, &player_id, &conn, text.clone()).await;
    }
}

/// Broadcast to everyone except one player (typically the sender).
pub async fn broadcast_except(
    state: &AppState,
    room: &Arc<Room>,
    msg: &ServerMessage,
    exclude: &str,
) {
    let Some(text) = encode(msg) else { return };
    for (player_id, conn) in snapshot_conns(room, Some(exclude)).await {
        deliver(state, room, &player_id, &conn, text.clone()).await;
    }
}

/// Send a message privately over one connection.
pub async fn send_to_conn(conn: &PlayerConn, msg: &ServerMessage) -> Result<(), axum::Error> {
    let text = encode(msg).ok_or_else(|| axum::Error::new("encode failed"))?;
    conn.send_text(text).await
}

/// Push the current game state to everyone: the drawer's copy carries the
/// full word, all others get the masked form. Skipped (logged) when the
/// state fails validation.
pub async fn broadcast_game_state(state: &AppState, room: &Arc<Room>) {
    let (drawer, guesser_view, drawer_view) = {
        let st = room.state.read().await;
        if !st.validate() {
            tracing::warn!(room = %room.id, "Invalid game state, skipping broadcast");
            return;
        }
        let drawer = st
            .drawer()
            .filter(|p| p.is_connected)
            .map(|p| (p.id.clone(), Arc::clone(&p.conn)));
        (drawer, st.game_state(false), st.game_state(true))
    };

    if let Some((drawer_id, conn)) = drawer {
        let Some(text) = encode(&ServerMessage::GameStateUpdate(drawer_view)) else {
            return;
        };
        deliver(state, room, &drawer_id, &conn, text).await;
        broadcast_except(state, room, &ServerMessage::GameStateUpdate(guesser_view), &drawer_id)
            .await;
    } else {
        broadcast(state, room, &ServerMessage::GameStateUpdate(guesser_view)).await;
    }
}
