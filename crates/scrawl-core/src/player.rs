use serde::{Deserialize, Serialize};

/// A player snapshot safe to put on the wire: no connection handle, no room
/// reference.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicPlayer {
    pub id: String,
    pub username: String,
    pub score: i32,
    pub is_ready: bool,
    pub has_guessed: bool,
    pub is_connected: bool,
    pub can_draw: bool,
    pub total_guesses: u32,
    pub correct_guesses: u32,
    pub times_drawn: u32,
    pub joined_at_ms: u64,
}

/// One guess attempt recorded against the current round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerGuess {
    pub player_id: String,
    pub username: String,
    /// Elapsed time into the drawing phase, in milliseconds.
    pub guess_time_ms: u64,
    pub is_correct: bool,
}

/// Per-round record accumulated for end-of-game awards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundStats {
    pub round_number: u32,
    pub drawer_id: String,
    pub word: String,
    pub correct_guessers: Vec<PlayerGuess>,
    pub total_guesses: u32,
    pub started_at_ms: u64,
    pub ended_at_ms: u64,
}
