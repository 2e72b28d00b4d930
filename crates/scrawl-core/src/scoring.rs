use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::player::{PlayerGuess, PublicPlayer, RoundStats};

/// Points the drawer earns for every correct guess against their drawing.
pub const DRAWER_BONUS: i32 = 50;

/// Word difficulty, derived from word length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    /// Length buckets: up to 5 chars easy (short words included), 6-8 medium,
    /// longer hard.
    pub fn for_word(word: &str) -> Self {
        match word.chars().count() {
            0..=5 => Difficulty::Easy,
            6..=8 => Difficulty::Medium,
            _ => Difficulty::Hard,
        }
    }

    pub fn base_points(self) -> i32 {
        match self {
            Difficulty::Easy => 100,
            Difficulty::Medium => 150,
            Difficulty::Hard => 200,
        }
    }
}

/// Points for a correct guess: base by difficulty, scaled by how fast the
/// guess landed and by arrival rank among correct guessers (1-based).
pub fn guess_points(elapsed: Duration, position: usize, difficulty: Difficulty) -> i32 {
    let secs = elapsed.as_secs_f64();
    let speed = if secs < 10.0 {
        1.5
    } else if secs < 30.0 {
        1.25
    } else if secs < 60.0 {
        1.0
    } else {
        0.75
    };
    let rank = match position {
        0 | 1 => 1.0,
        2 => 0.8,
        3 => 0.6,
        _ => 0.4,
    };
    (f64::from(difficulty.base_points()) * speed * rank).floor() as i32
}

/// One row of the final leaderboard.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameResultData {
    pub player_id: String,
    pub username: String,
    pub score: i32,
    /// 1-based leaderboard position.
    pub position: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_to_guess_ms: Option<u64>,
}

/// End-of-game payload: leaderboard plus awards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalResults {
    pub leaderboard: Vec<GameResultData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mvp: Option<GameResultData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fastest_guess: Option<GameResultData>,
    pub rounds_played: u32,
    pub total_players: usize,
}

/// Compile the leaderboard and awards from a finished game.
pub fn final_results(
    players: &[PublicPlayer],
    round_stats: &[RoundStats],
    rounds_played: u32,
) -> FinalResults {
    let mut leaderboard: Vec<GameResultData> = players
        .iter()
        .map(|p| GameResultData {
            player_id: p.id.clone(),
            username: p.username.clone(),
            score: p.score,
            position: 0,
            time_to_guess_ms: None,
        })
        .collect();
    leaderboard.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.username.cmp(&b.username)));
    for (idx, entry) in leaderboard.iter_mut().enumerate() {
        entry.position = idx + 1;
    }

    let mvp = leaderboard.first().cloned();

    let fastest = round_stats
        .iter()
        .flat_map(|rs| rs.correct_guessers.iter())
        .filter(|g| g.is_correct)
        .min_by_key(|g| g.guess_time_ms)
        .map(|g: &PlayerGuess| GameResultData {
            player_id: g.player_id.clone(),
            username: g.username.clone(),
            score: 0,
            position: 0,
            time_to_guess_ms: Some(g.guess_time_ms),
        });

    FinalResults {
        leaderboard,
        mvp,
        fastest_guess: fastest,
        rounds_played,
        total_players: players.len(),
    }
}
