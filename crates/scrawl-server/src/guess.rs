use std::sync::Arc;
use std::time::Duration;

use scrawl_core::net::messages::{GuessBroadcastData, GuessResultData, ServerMessage};
use scrawl_core::phase::GamePhase;
use scrawl_core::player::PlayerGuess;
use scrawl_core::scoring::{self, Difficulty};
use scrawl_core::time::now_ms;

use crate::room::{Room, broadcast};
use crate::state::AppState;
use crate::{game_flow, timer};

enum Outcome {
    Incorrect(GuessBroadcastData),
    Correct {
        result: GuessResultData,
        all_guessed: bool,
    },
}

/// Process a guess during the drawing phase.
///
/// The drawer and players who already guessed are ignored. Misses are
/// broadcast so the room sees them in chat; hits award the guesser by speed
/// and arrival rank, give the drawer a flat bonus, and end the round early
/// once every guesser has it.
pub async fn handle_guess(state: &AppState, room: &Arc<Room>, player_id: &str, guess: String) {
    let cleaned = guess.trim().to_lowercase();

    let outcome = {
        let mut st = room.state.write().await;
        if st.phase != GamePhase::Drawing {
            tracing::debug!(room = %room.id, player_id = %player_id, phase = ?st.phase, "Guess outside drawing phase ignored");
            return;
        }
        if st.current_drawer.as_deref() == Some(player_id) {
            tracing::debug!(room = %room.id, player_id = %player_id, "Drawer guess ignored");
            return;
        }
        let target = st.word.trim().to_lowercase();
        let elapsed = st
            .timer
            .as_ref()
            .map(|t| t.started_at.elapsed())
            .unwrap_or(Duration::ZERO);
        let position = st.correct_guessers.len() + 1;
        let difficulty = Difficulty::for_word(&st.word);

        let Some(player) = st.players.get_mut(player_id) else {
            return;
        };
        if player.has_guessed {
            tracing::debug!(room = %room.id, player_id = %player_id, "Repeat guess ignored");
            return;
        }

        if target.is_empty() || target != cleaned {
            player.total_guesses += 1;
            Outcome::Incorrect(GuessBroadcastData {
                player_guess: PlayerGuess {
                    player_id: player.id.clone(),
                    username: player.username.clone(),
                    guess_time_ms: now_ms(),
                    is_correct: false,
                },
                guessed_word: guess,
            })
        } else {
            let points = scoring::guess_points(elapsed, position, difficulty);
            let elapsed_ms = elapsed.as_millis() as u64;

            player.total_guesses += 1;
            player.correct_guesses += 1;
            player.has_guessed = true;
            player.score += points;
            let entry = PlayerGuess {
                player_id: player.id.clone(),
                username: player.username.clone(),
                guess_time_ms: elapsed_ms,
                is_correct: true,
            };
            let result = GuessResultData {
                player_id: player.id.clone(),
                username: player.username.clone(),
                is_correct: true,
                points,
                position,
                time_to_guess_ms: elapsed_ms,
            };
            st.correct_guessers.push(entry);

            if let Some(drawer_id) = st.current_drawer.clone()
                && let Some(drawer) = st.players.get_mut(&drawer_id)
            {
                drawer.score += scoring::DRAWER_BONUS;
            }

            Outcome::Correct {
                result,
                all_guessed: st.everyone_guessed(),
            }
        }
    };

    match outcome {
        Outcome::Incorrect(miss) => {
            broadcast(state, room, &ServerMessage::GuessMessage(miss)).await;
        },
        Outcome::Correct { result, all_guessed } => {
            tracing::info!(
                room = %room.id,
                player_id = %player_id,
                points = result.points,
                position = result.position,
                "Correct guess"
            );
            broadcast(state, room, &ServerMessage::GuessResult(result)).await;

            if all_guessed {
                tracing::info!(room = %room.id, "Everyone guessed, ending round early");
                timer::cancel(state, room).await;
                game_flow::start_revealing_phase(state, room).await;
            }
        },
    }
}
