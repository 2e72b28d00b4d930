use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use scrawl_core::net::messages::{
    DrawerInfo, DrawingPhaseData, RoundEndData, ServerMessage, WaitingForWordData,
    WaitingPhaseData, WordSelectionData,
};
use scrawl_core::phase::GamePhase;
use scrawl_core::player::RoundStats;
use scrawl_core::scoring;
use scrawl_core::time::now_ms;
use scrawl_core::words::mask_word;

use crate::room::{Room, broadcast, broadcast_except, send_to_conn};
use crate::state::AppState;
use crate::{draw, lobby, timer};

/// Boxed future used for the mutually-recursive phase-transition functions
/// below: without an explicit boxed return type, rustc cannot resolve the
/// cyclic opaque `impl Future` types these produce when they call each
/// other (and are called via `tokio::spawn`/`timer::start`, which require
/// `Send`).
type BoxFut<'a> = Pin<Box<dyn Future<Output = ()> + Send + 'a>>;

/// Enter the waiting phase: announce the next drawer, reset per-round player
/// state, clear the canvas, and give the room a short countdown before word
/// selection.
pub fn start_waiting_phase<'a>(state: &'a AppState, room: &'a Arc<Room>) -> BoxFut<'a> {
  Box::pin(async move {
    let announcement = {
        let mut st = room.state.write().await;
        st.phase = GamePhase::Waiting;
        st.word.clear();
        st.word_choices.clear();

        if st.order.is_empty() {
            tracing::warn!(room = %room.id, "Waiting phase with empty rotation, aborting");
            return;
        }
        if st.current_index >= st.order.len() {
            st.current_index = 0;
        }
        let drawer_id = st.order[st.current_index].clone();
        let Some(drawer) = st.players.get(&drawer_id) else {
            tracing::warn!(room = %room.id, drawer = %drawer_id, "Rotation points at missing player");
            return;
        };
        let drawer_name = drawer.username.clone();
        st.current_drawer = Some(drawer_id.clone());

        for p in st.players.values_mut() {
            p.reset_round_state();
        }
        st.correct_guessers.clear();
        st.canvas_state.clear();

        WaitingPhaseData {
            room_id: room.id.clone(),
            message: format!("{drawer_name} will draw next, selecting word..."),
            current_drawer: DrawerInfo {
                id: drawer_id,
                username: drawer_name,
            },
            phase: GamePhase::Waiting,
            time_remaining_secs: state.config.game.waiting_secs,
            round_number: st.round_number,
        }
    };

    tracing::info!(
        room = %room.id,
        drawer = %announcement.current_drawer.id,
        round = announcement.round_number,
        "Entering waiting phase"
    );
    broadcast(state, room, &ServerMessage::WaitingPhase(announcement)).await;

    let expire_state = state.clone();
    let expire_room = Arc::clone(room);
    timer::start(state, room, state.config.game.waiting(), move || async move {
        start_word_selection(&expire_state, &expire_room).await;
    })
    .await;
  })
}

/// Offer three word choices privately to the drawer and tell everyone else
/// to hold on. If the drawer can't be reached, the first choice is taken
/// immediately.
pub fn start_word_selection<'a>(state: &'a AppState, room: &'a Arc<Room>) -> BoxFut<'a> {
  Box::pin(async move {
    let (drawer_id, drawer_name, conn, choices) = {
        let mut st = room.state.write().await;
        let Some(drawer_id) = st.current_drawer.clone() else {
            tracing::warn!(room = %room.id, "Word selection with no drawer, aborting");
            return;
        };
        let Some(drawer) = st.players.get(&drawer_id) else {
            return;
        };
        let conn = Arc::clone(&drawer.conn);
        let drawer_name = drawer.username.clone();

        st.phase = GamePhase::Selection;
        let choices = state.words.generate_choices();
        st.word_choices = choices.clone();
        (drawer_id, drawer_name, conn, choices)
    };

    tracing::info!(room = %room.id, drawer = %drawer_id, ?choices, "Word selection");

    let offer = ServerMessage::WordSelection(WordSelectionData {
        room_id: room.id.clone(),
        message: "Please select a word to draw".to_string(),
        choices: choices.clone(),
        time_limit_secs: state.config.game.selection_secs,
    });
    if let Err(e) = send_to_conn(&conn, &offer).await {
        // Drawer unreachable: fall back to the first choice right away.
        tracing::warn!(room = %room.id, drawer = %drawer_id, error = %e, "Failed to send word choices, auto-selecting");
        let state = state.clone();
        let room = Arc::clone(room);
        let first = choices[0].clone();
        tokio::spawn(async move {
            handle_word_selection(&state, &room, &drawer_id, first).await;
        });
        return;
    }

    broadcast_except(
        state,
        room,
        &ServerMessage::WaitingForWord(WaitingForWordData {
            message: format!("Waiting for {drawer_name} to select a word..."),
            current_drawer: drawer_name.clone(),
            time_remaining_secs: state.config.game.selection_secs,
        }),
        &drawer_id,
    )
    .await;

    let expire_state = state.clone();
    let expire_room = Arc::clone(room);
    timer::start(state, room, state.config.game.selection(), move || async move {
        // Auto-select is idempotent: skip when a word was already chosen.
        let (already_chosen, drawer_id, first) = {
            let st = expire_room.state.read().await;
            (
                !st.word.is_empty(),
                st.current_drawer.clone(),
                st.word_choices.first().cloned(),
            )
        };
        if already_chosen {
            return;
        }
        let (Some(drawer_id), Some(first)) = (drawer_id, first) else {
            return;
        };
        tracing::info!(room = %expire_room.id, word = %first, "Auto-selecting word after timeout");
        handle_word_selection(&expire_state, &expire_room, &drawer_id, first).await;
    })
    .await;
  })
}

/// Process the drawer's word choice. Only the first valid selection takes
/// effect; anything after `word` is set (including the auto-select timer) is
/// a no-op.
pub fn handle_word_selection<'a>(
    state: &'a AppState,
    room: &'a Arc<Room>,
    player_id: &'a str,
    selected: String,
) -> BoxFut<'a> {
  Box::pin(async move {
    {
        let mut st = room.state.write().await;
        if st.current_drawer.as_deref() != Some(player_id) {
            tracing::debug!(room = %room.id, player_id = %player_id, "Word selection from non-drawer ignored");
            return;
        }
        if !st.word.is_empty() {
            tracing::debug!(room = %room.id, "Word already chosen, ignoring selection");
            return;
        }
        if !st.word_choices.iter().any(|w| w == &selected) {
            tracing::debug!(room = %room.id, word = %selected, "Selection not among the offered choices");
            return;
        }
        st.word = selected;
        st.word_choices.clear();
        tracing::info!(room = %room.id, drawer = %player_id, word = %st.word, "Word selected");
    }

    timer::cancel(state, room).await;
    start_drawing_phase(state, room).await;
  })
}

/// Begin the drawing phase: grant the drawer permission, send the full word
/// privately and the mask to everyone else, and arm the round timer.
pub fn start_drawing_phase<'a>(state: &'a AppState, room: &'a Arc<Room>) -> BoxFut<'a> {
  Box::pin(async move {
    let (drawer_id, drawer_name, conn, word, masked) = {
        let mut st = room.state.write().await;
        let Some(drawer_id) = st.current_drawer.clone() else {
            tracing::warn!(room = %room.id, "Drawing phase with no drawer, aborting");
            return;
        };
        if st.word.is_empty() {
            tracing::warn!(room = %room.id, "Drawing phase with no word, aborting");
            return;
        }

        st.phase = GamePhase::Drawing;
        st.round_started_ms = now_ms();
        st.correct_guessers.clear();
        for p in st.players.values_mut() {
            p.has_guessed = false;
            p.can_draw = false;
        }
        let word = st.word.clone();
        let masked = mask_word(&word);
        let Some(drawer) = st.players.get_mut(&drawer_id) else {
            return;
        };
        drawer.can_draw = true;
        drawer.times_drawn += 1;
        (
            drawer_id,
            drawer.username.clone(),
            Arc::clone(&drawer.conn),
            word,
            masked,
        )
    };

    tracing::info!(room = %room.id, drawer = %drawer_id, mask = %masked, "Entering drawing phase");

    let expire_state = state.clone();
    let expire_room = Arc::clone(room);
    timer::start(state, room, state.config.game.drawing(), move || async move {
        let all_guessed = expire_room.state.read().await.everyone_guessed();
        if all_guessed {
            start_revealing_phase(&expire_state, &expire_room).await;
        } else {
            next_round(&expire_state, &expire_room).await;
        }
    })
    .await;

    let drawer_info = DrawerInfo {
        id: drawer_id.clone(),
        username: drawer_name,
    };
    broadcast_except(
        state,
        room,
        &ServerMessage::DrawingPhase(DrawingPhaseData {
            room_id: room.id.clone(),
            word: None,
            masked_word: Some(masked),
            current_drawer: drawer_info.clone(),
            phase: GamePhase::Drawing,
            time_remaining_secs: state.config.game.drawing_secs,
        }),
        &drawer_id,
    )
    .await;

    let private = ServerMessage::DrawingPhase(DrawingPhaseData {
        room_id: room.id.clone(),
        word: Some(word),
        masked_word: None,
        current_drawer: drawer_info,
        phase: GamePhase::Drawing,
        time_remaining_secs: state.config.game.drawing_secs,
    });
    if let Err(e) = send_to_conn(&conn, &private).await {
        // Disconnection is handled by the drawer's own session teardown.
        tracing::warn!(room = %room.id, drawer = %drawer_id, error = %e, "Failed to send word to drawer");
    }

    draw::update_drawing_permissions(state, room).await;
  })
}

/// Reveal the word and the round results. Re-entrant triggers (last guess
/// vs. timer expiry) are serialized by the phase check under the lock: only
/// the caller that still sees `drawing` proceeds.
pub fn start_revealing_phase<'a>(state: &'a AppState, room: &'a Arc<Room>) -> BoxFut<'a> {
  Box::pin(async move {
    timer::cancel(state, room).await;

    let round_end = {
        let mut st = room.state.write().await;
        if st.phase != GamePhase::Drawing {
            tracing::debug!(room = %room.id, phase = ?st.phase, "Revealing already handled");
            return;
        }
        st.phase = GamePhase::Revealing;
        for p in st.players.values_mut() {
            p.can_draw = false;
        }

        let drawer_id = st.current_drawer.clone().unwrap_or_default();
        let drawer_name = st
            .players
            .get(&drawer_id)
            .map(|p| p.username.clone())
            .unwrap_or_default();

        let stats = RoundStats {
            round_number: st.round_number,
            drawer_id: drawer_id.clone(),
            word: st.word.clone(),
            correct_guessers: st.correct_guessers.clone(),
            total_guesses: st.correct_guessers.len() as u32,
            started_at_ms: st.round_started_ms,
            ended_at_ms: now_ms(),
        };
        st.round_stats.push(stats);

        let next_drawer = if st.order.is_empty() {
            None
        } else {
            let next_index = (st.current_index + 1) % st.order.len();
            st.players.get(&st.order[next_index]).map(|p| p.public())
        };

        let is_game_ended = st.round_number > st.max_rounds
            || (st.round_number == st.max_rounds
                && !st.order.is_empty()
                && st.current_index == st.order.len() - 1);

        RoundEndData {
            word: st.word.clone(),
            drawer_id,
            drawer_username: drawer_name,
            correct_guessers: st.correct_guessers.clone(),
            next_drawer,
            final_scores: st.public_players(),
            round_number: st.round_number,
            is_game_ended,
        }
    };

    tracing::info!(
        room = %room.id,
        round = round_end.round_number,
        word = %round_end.word,
        correct = round_end.correct_guessers.len(),
        game_ended = round_end.is_game_ended,
        "Entering revealing phase"
    );
    broadcast(state, room, &ServerMessage::RoundEnd(round_end)).await;

    let expire_state = state.clone();
    let expire_room = Arc::clone(room);
    timer::start(state, room, state.config.game.revealing(), move || async move {
        // Re-check the end condition at expiry; the room may have changed.
        let should_end = {
            let st = expire_room.state.read().await;
            st.round_number > st.max_rounds
                || (st.round_number == st.max_rounds
                    && !st.order.is_empty()
                    && st.current_index == st.order.len() - 1)
        };
        if should_end {
            end_game(&expire_state, &expire_room).await;
        } else {
            next_round(&expire_state, &expire_room).await;
        }
    })
    .await;
  })
}

enum Advance {
    Waiting,
    End,
}

/// Advance the rotation to the next drawer, bumping the round on wraparound
/// and ending the game once the final round has been played out.
pub fn next_round<'a>(state: &'a AppState, room: &'a Arc<Room>) -> BoxFut<'a> {
  Box::pin(async move {
    let advance = {
        let mut st = room.state.write().await;

        // Rebuild the rotation stably: survivors keep their relative order,
        // newly connected players are appended in join order.
        let mut order: Vec<String> = st
            .order
            .iter()
            .filter(|id| st.players.get(*id).is_some_and(|p| p.is_connected))
            .cloned()
            .collect();
        let mut newcomers: Vec<(u64, String)> = st
            .players
            .values()
            .filter(|p| p.is_connected && !order.contains(&p.id))
            .map(|p| (p.seat, p.id.clone()))
            .collect();
        newcomers.sort();
        order.extend(newcomers.into_iter().map(|(_, id)| id));
        st.order = order;

        if st.order.is_empty() {
            Advance::End
        } else {
            // Realign the index to the surviving rotation: the drawer may
            // have shifted position, or (when the drawer itself left) the
            // stored index may now be past the end.
            match st.current_drawer.clone() {
                Some(drawer_id) => match st.order.iter().position(|id| *id == drawer_id) {
                    Some(pos) => st.current_index = pos,
                    None => {
                        st.current_drawer = None;
                        st.current_index = 0;
                    },
                },
                None => {
                    if st.current_index >= st.order.len() {
                        st.current_index = 0;
                    }
                },
            }

            st.current_index = (st.current_index + 1) % st.order.len();
            st.word.clear();
            let wrapped = st.current_index == 0;
            if wrapped {
                st.round_number += 1;
                tracing::info!(room = %room.id, round = st.round_number, "Round advanced");
            }
            if wrapped && st.round_number > st.max_rounds {
                Advance::End
            } else {
                st.current_drawer = Some(st.order[st.current_index].clone());
                Advance::Waiting
            }
        }
    };

    match advance {
        Advance::End => end_game(state, room).await,
        Advance::Waiting => start_waiting_phase(state, room).await,
    }
  })
}

/// Finish the game: publish the leaderboard and schedule the reset to lobby.
pub fn end_game<'a>(state: &'a AppState, room: &'a Arc<Room>) -> BoxFut<'a> {
  Box::pin(async move {
    timer::cancel(state, room).await;

    let results = {
        let mut st = room.state.write().await;
        st.phase = GamePhase::Ended;
        st.word.clear();
        st.word_choices.clear();
        let rounds_played = st.round_number.min(st.max_rounds);
        scoring::final_results(&st.public_players(), &st.round_stats, rounds_played)
    };

    tracing::info!(room = %room.id, players = results.total_players, "Game ended");
    broadcast(state, room, &ServerMessage::GameEnded(results)).await;

    let expire_state = state.clone();
    let expire_room = Arc::clone(room);
    timer::start(state, room, state.config.game.reset(), move || async move {
        lobby::reset_to_lobby(&expire_state, &expire_room).await;
    })
    .await;
  })
}
