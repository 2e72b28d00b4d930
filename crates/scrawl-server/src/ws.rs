use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Path, Query, State, WebSocketUpgrade};
use axum::response::Response;
use futures::StreamExt;
use futures::stream::SplitStream;
use rand::Rng;
use serde::Deserialize;

use scrawl_core::net::messages::{
    ClientMessage, PlayerJoinedData, PlayerLeftData, ServerMessage, WelcomeData,
};
use scrawl_core::net::protocol::{MAX_MESSAGE_SIZE, ProtocolError, decode_client_message};
use scrawl_core::phase::GamePhase;
use scrawl_core::time::now_ms;

use crate::error::BadRequest;
use crate::room::{Player, PlayerConn, Room, broadcast, broadcast_except, broadcast_game_state, send_to_conn};
use crate::state::AppState;
use crate::{draw, game_flow, guess, lobby, timer};

const MAX_USERNAME_LEN: usize = 32;

#[derive(Debug, Deserialize)]
pub struct JoinParams {
    pub username: Option<String>,
    pub w: Option<i32>,
    pub h: Option<i32>,
}

/// Upgrade handler for `/ws/{room_id}`. The client's canvas dimensions are
/// required up front; a connection without them is refused before any player
/// record exists.
pub async fn ws_handler(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    Query(params): Query<JoinParams>,
    ws: WebSocketUpgrade,
) -> Result<Response, BadRequest> {
    let (Some(w), Some(h)) = (params.w, params.h) else {
        return Err(BadRequest::new("canvas dimensions w and h are required"));
    };
    if w <= 0 || h <= 0 {
        return Err(BadRequest::new("canvas dimensions must be positive"));
    }

    let mut username = params
        .username
        .as_deref()
        .map(str::trim)
        .unwrap_or("")
        .to_string();
    if username.is_empty() {
        username = "Anonymous".to_string();
    }
    if username.chars().count() > MAX_USERNAME_LEN {
        username = username.chars().take(MAX_USERNAME_LEN).collect();
    }

    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, room_id, username, w, h)))
}

async fn handle_socket(
    socket: WebSocket,
    state: AppState,
    room_id: String,
    username: String,
    w: i32,
    h: i32,
) {
    let (sink, mut receiver) = socket.split();
    let conn = Arc::new(PlayerConn::new(sink));
    let player_id = generate_player_id();

    let room = state
        .registry
        .get_or_create(&room_id, state.config.game.max_rounds)
        .await;

    let (joined, welcome) = match join_room(&state, &room, &player_id, &username, w, h, &conn).await
    {
        Ok(messages) => messages,
        Err(reason) => {
            tracing::warn!(room = %room_id, username = %username, reason = %reason, "Join rejected");
            conn.close().await;
            return;
        },
    };
    tracing::info!(room = %room_id, player_id = %player_id, username = %username, "Player joined");

    broadcast_except(&state, &room, &ServerMessage::PlayerJoined(joined), &player_id).await;

    if let Err(e) = send_to_conn(&conn, &ServerMessage::WelcomeMsg(welcome)).await {
        tracing::warn!(room = %room_id, player_id = %player_id, error = %e, "Failed to send welcome");
        conn.close().await;
        remove_player(&state, &room, &player_id).await;
        return;
    }

    read_loop(&mut receiver, &state, &room, &player_id).await;

    conn.close().await;
    remove_player(&state, &room, &player_id).await;
    tracing::info!(room = %room_id, player_id = %player_id, "Player disconnected");
}

/// Insert the player into the room under its write lock. Capacity is
/// enforced here so a full room rejects the join with no side effects.
async fn join_room(
    state: &AppState,
    room: &Arc<Room>,
    player_id: &str,
    username: &str,
    w: i32,
    h: i32,
    conn: &Arc<PlayerConn>,
) -> Result<(PlayerJoinedData, WelcomeData), String> {
    let mut st = room.state.write().await;
    if st.players.len() >= state.config.game.max_players {
        return Err("room is full".to_string());
    }

    let seat = st.next_seat();
    let player = Player {
        id: player_id.to_string(),
        username: username.to_string(),
        conn: Arc::clone(conn),
        score: 0,
        canvas_width: w,
        canvas_height: h,
        is_ready: false,
        has_guessed: false,
        can_draw: false,
        is_connected: true,
        joined_at_ms: now_ms(),
        seat,
        total_guesses: 0,
        correct_guesses: 0,
        times_drawn: 0,
    };
    let public = player.public();
    st.players.insert(player_id.to_string(), player);

    let joined = PlayerJoinedData {
        player: public,
        player_count: st.players.len(),
        can_start: st.connected_count() >= state.config.game.min_players,
    };
    let welcome = WelcomeData {
        game_state: st.game_state(false),
        canvas_state: st.canvas_state.clone(),
    };
    Ok((joined, welcome))
}

async fn read_loop(
    receiver: &mut SplitStream<WebSocket>,
    state: &AppState,
    room: &Arc<Room>,
    player_id: &str,
) {
    while let Some(Ok(msg)) = receiver.next().await {
        let text = match msg {
            Message::Text(t) => t,
            Message::Close(_) => break,
            _ => continue,
        };
        if text.len() > MAX_MESSAGE_SIZE {
            tracing::warn!(room = %room.id, player_id = %player_id, len = text.len(), "Oversized frame dropped");
            continue;
        }

        match decode_client_message(text.as_str()) {
            Ok(ClientMessage::PlayerReady(ready)) => {
                lobby::handle_player_ready(state, room, player_id, ready).await;
            },
            Ok(ClientMessage::WordSelection(word)) => {
                game_flow::handle_word_selection(state, room, player_id, word).await;
            },
            Ok(ClientMessage::GuessMessage(guess)) => {
                guess::handle_guess(state, room, player_id, guess).await;
            },
            Ok(ClientMessage::PixelDraw(op)) => {
                draw::handle_pixel_draw(state, room, player_id, op).await;
            },
            Ok(ClientMessage::ClearCanvas) => {
                draw::clear_canvas(state, room, player_id).await;
            },
            Ok(ClientMessage::StartGame) => {
                lobby::handle_start_game(state, room).await;
            },
            Err(ProtocolError::UnknownMessageType(t)) => {
                tracing::debug!(room = %room.id, player_id = %player_id, msg_type = %t, "Unknown message type ignored");
            },
            Err(e) => {
                tracing::debug!(room = %room.id, player_id = %player_id, error = %e, "Malformed message dropped");
            },
        }
    }
}

/// Remove a player and drive the phase machine accordingly: the room is
/// destroyed when it empties, a drawing round is cut short when its drawer
/// leaves, and a started game falling below the minimum resets to lobby.
///
/// Safe under concurrent teardown: the second caller finds the player gone
/// and returns.
pub fn remove_player<'a>(
    state: &'a AppState,
    room: &'a Arc<Room>,
    player_id: &'a str,
) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
  Box::pin(async move {
    let (username, conn, was_drawer, phase, remaining, has_started) = {
        let mut st = room.state.write().await;
        let Some(player) = st.players.remove(player_id) else {
            return;
        };
        st.ready.remove(player_id);
        st.order.retain(|id| id != player_id);
        let was_drawer = st.current_drawer.as_deref() == Some(player_id);
        if was_drawer {
            st.current_drawer = None;
        }
        (
            player.username,
            player.conn,
            was_drawer,
            st.phase,
            st.players.len(),
            st.has_game_started,
        )
    };
    conn.close().await;

    tracing::info!(
        room = %room.id,
        player_id = %player_id,
        username = %username,
        remaining,
        "Player removed"
    );

    if remaining == 0 {
        cleanup_room(state, room).await;
        return;
    }

    broadcast(
        state,
        room,
        &ServerMessage::PlayerLeft(PlayerLeftData {
            player_id: player_id.to_string(),
            username,
            players_remaining: remaining,
            new_drawer: None,
        }),
    )
    .await;

    let min_players = state.config.game.min_players;
    if was_drawer && phase == GamePhase::Drawing {
        timer::cancel(state, room).await;
        if remaining >= min_players {
            game_flow::next_round(state, room).await;
        } else {
            lobby::reset_to_lobby(state, room).await;
        }
    } else if has_started && remaining < min_players && phase != GamePhase::Lobby {
        lobby::reset_to_lobby(state, room).await;
    } else {
        broadcast_game_state(state, room).await;
    }
  })
}

/// Destroy an empty room: cancel its timer, close any straggler connections,
/// and drop it from the registry.
pub async fn cleanup_room(state: &AppState, room: &Arc<Room>) {
    let conns = {
        let mut st = room.state.write().await;
        if let Some(timer) = st.timer.take() {
            timer.cancel.cancel();
        }
        st.ready.clear();
        st.order.clear();
        st.players.drain().map(|(_, p)| p.conn).collect::<Vec<_>>()
    };
    for conn in conns {
        conn.close().await;
    }
    state.registry.remove(&room.id).await;
    tracing::info!(room = %room.id, "Room cleaned up");
}

/// 8-character alphanumeric player id.
fn generate_player_id() -> String {
    let mut rng = rand::rng();
    (0..8)
        .map(|_| rng.sample(rand::distr::Alphanumeric) as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn player_ids_are_eight_alphanumeric_chars() {
        for _ in 0..100 {
            let id = generate_player_id();
            assert_eq!(id.len(), 8);
            assert!(id.chars().all(|c| c.is_ascii_alphanumeric()));
        }
    }
}
