use std::sync::Arc;

use scrawl_core::net::messages::{
    GameStartedData, LobbyResetData, LobbyUpdateData, ServerMessage,
};
use scrawl_core::phase::GamePhase;
use scrawl_core::time::now_ms;

use crate::room::{Room, broadcast};
use crate::state::AppState;
use crate::{game_flow, timer};

/// Toggle a player's ready flag. Ignored outside the lobby. When everyone
/// connected is ready and enough players are present, the game starts.
pub async fn handle_player_ready(
    state: &AppState,
    room: &Arc<Room>,
    player_id: &str,
    ready: bool,
) {
    let (update, all_ready, enough_players) = {
        let mut st = room.state.write().await;
        if st.phase != GamePhase::Lobby {
            tracing::debug!(room = %room.id, player_id = %player_id, phase = ?st.phase, "Ready outside lobby ignored");
            return;
        }
        let Some(player) = st.players.get_mut(player_id) else {
            return;
        };
        player.is_ready = ready;
        let username = player.username.clone();
        st.ready.insert(player_id.to_string(), ready);

        let update = LobbyUpdateData {
            player_id: player_id.to_string(),
            username,
            is_ready: ready,
            ready_count: st.players.values().filter(|p| p.is_ready).count(),
            total_players: st.players.len(),
        };
        (
            update,
            st.all_ready(),
            st.connected_count() >= state.config.game.min_players,
        )
    };

    broadcast(state, room, &ServerMessage::LobbyUpdate(update)).await;

    if all_ready && enough_players {
        start_game(state, room).await;
    }
}

/// Explicit `start_game` request. Conditions are re-checked under the lock
/// inside `start_game`.
pub async fn handle_start_game(state: &AppState, room: &Arc<Room>) {
    start_game(state, room).await;
}

/// Move the room from lobby into the first waiting phase. Safe to call from
/// concurrent triggers; only one caller observes the lobby phase and wins.
pub async fn start_game(state: &AppState, room: &Arc<Room>) {
    let started = {
        let mut st = room.state.write().await;
        if st.phase != GamePhase::Lobby {
            return;
        }
        if st.connected_count() < state.config.game.min_players {
            tracing::debug!(
                room = %room.id,
                players = st.connected_count(),
                "Not enough players to start"
            );
            return;
        }
        if !st.all_ready() {
            tracing::debug!(room = %room.id, "Not all players ready");
            return;
        }

        // Leave the lobby phase inside this critical section so a second
        // concurrent trigger cannot start the game twice.
        st.phase = GamePhase::Waiting;
        st.has_game_started = true;
        st.round_number = 1;
        st.current_index = 0;
        st.round_stats.clear();
        st.correct_guessers.clear();
        for p in st.players.values_mut() {
            p.reset_round_state();
        }

        // Rotation follows join order.
        let mut seats: Vec<(u64, String)> = st
            .players
            .values()
            .filter(|p| p.is_connected && p.is_ready)
            .map(|p| (p.seat, p.id.clone()))
            .collect();
        seats.sort();
        st.order = seats.into_iter().map(|(_, id)| id).collect();

        GameStartedData {
            room_id: room.id.clone(),
            message: "Game has started!".to_string(),
            player_count: st.order.len(),
            players: st.public_players(),
        }
    };

    tracing::info!(room = %room.id, players = started.player_count, "Game started");
    broadcast(state, room, &ServerMessage::GameStarted(started)).await;
    game_flow::start_waiting_phase(state, room).await;
}

/// Return the room to the waiting-for-players state: cancel the timer, wipe
/// all game state, zero scores, un-ready everyone.
pub async fn reset_to_lobby(state: &AppState, room: &Arc<Room>) {
    timer::cancel(state, room).await;

    let reset = {
        let mut st = room.state.write().await;
        st.phase = GamePhase::Lobby;
        st.has_game_started = false;
        st.word.clear();
        st.word_choices.clear();
        st.current_drawer = None;
        st.current_index = 0;
        st.order.clear();
        st.correct_guessers.clear();
        st.round_stats.clear();
        st.canvas_state.clear();
        st.round_number = 1;
        st.ready.clear();
        for p in st.players.values_mut() {
            p.is_ready = false;
            p.score = 0;
            p.reset_round_state();
        }

        LobbyResetData {
            room_id: room.id.clone(),
            message: format!("Lobby {} has been reset for a new game", room.id),
            timestamp: now_ms(),
            phase: st.phase,
            round_number: st.round_number,
            max_rounds: st.max_rounds,
            players: st.public_players(),
        }
    };

    tracing::info!(room = %room.id, "Room reset to lobby");
    broadcast(state, room, &ServerMessage::LobbyReset(reset)).await;
}
