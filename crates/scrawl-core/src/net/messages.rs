use serde::{Deserialize, Serialize};

use crate::canvas::PixelMessage;
use crate::phase::GamePhase;
use crate::player::{PlayerGuess, PublicPlayer};
use crate::scoring::FinalResults;

/// Messages clients may send. The envelope `type` is the snake_case variant
/// name; `data` is the payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ClientMessage {
    PlayerReady(bool),
    WordSelection(String),
    GuessMessage(String),
    PixelDraw(PixelMessage),
    ClearCanvas,
    StartGame,
}

impl ClientMessage {
    pub fn message_type(&self) -> &'static str {
        match self {
            Self::PlayerReady(_) => "player_ready",
            Self::WordSelection(_) => "word_selection",
            Self::GuessMessage(_) => "guess_message",
            Self::PixelDraw(_) => "pixel_draw",
            Self::ClearCanvas => "clear_canvas",
            Self::StartGame => "start_game",
        }
    }
}

/// Messages the server sends. Exhaustive: every outbound envelope type is a
/// variant here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ServerMessage {
    PlayerJoined(PlayerJoinedData),
    PlayerLeft(PlayerLeftData),
    WelcomeMsg(WelcomeData),
    LobbyUpdate(LobbyUpdateData),
    LobbyReset(LobbyResetData),
    GameStarted(GameStartedData),
    WaitingPhase(WaitingPhaseData),
    WordSelection(WordSelectionData),
    WaitingForWord(WaitingForWordData),
    DrawingPhase(DrawingPhaseData),
    Pixel(PixelMessage),
    Erase(PixelMessage),
    BatchPlace(PixelMessage),
    BatchErase(PixelMessage),
    CanvasCleared(CanvasClearedData),
    DrawingPermissionUpdated(DrawingPermissionData),
    TimerUpdate(TimerUpdateData),
    GuessMessage(GuessBroadcastData),
    GuessResult(GuessResultData),
    RoundEnd(RoundEndData),
    GameEnded(FinalResults),
    GameStateUpdate(GameStateData),
}

/// Minimal drawer identity used inside phase announcements.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrawerInfo {
    pub id: String,
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerJoinedData {
    pub player: PublicPlayer,
    pub player_count: usize,
    pub can_start: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerLeftData {
    pub player_id: String,
    pub username: String,
    pub players_remaining: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_drawer: Option<PublicPlayer>,
}

/// Full state pushed to a joining player so it can render immediately.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WelcomeData {
    pub game_state: GameStateData,
    pub canvas_state: Vec<PixelMessage>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LobbyUpdateData {
    pub player_id: String,
    pub username: String,
    pub is_ready: bool,
    pub ready_count: usize,
    pub total_players: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LobbyResetData {
    pub room_id: String,
    pub message: String,
    pub timestamp: u64,
    pub phase: GamePhase,
    pub round_number: u32,
    pub max_rounds: u32,
    pub players: Vec<PublicPlayer>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameStartedData {
    pub room_id: String,
    pub message: String,
    pub player_count: usize,
    pub players: Vec<PublicPlayer>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaitingPhaseData {
    pub room_id: String,
    pub message: String,
    pub current_drawer: DrawerInfo,
    pub phase: GamePhase,
    pub time_remaining_secs: u64,
    pub round_number: u32,
}

/// Word choices, sent privately to the drawer only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordSelectionData {
    pub room_id: String,
    pub message: String,
    pub choices: Vec<String>,
    pub time_limit_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaitingForWordData {
    pub message: String,
    pub current_drawer: String,
    pub time_remaining_secs: u64,
}

/// Drawing-phase announcement. The drawer's copy carries `word`; everyone
/// else's carries `masked_word`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrawingPhaseData {
    pub room_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub word: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub masked_word: Option<String>,
    pub current_drawer: DrawerInfo,
    pub phase: GamePhase,
    pub time_remaining_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanvasClearedData {
    pub room_id: String,
    pub player_id: String,
    pub timestamp: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrawingPermissionData {
    pub room_id: String,
    pub player_id: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimerUpdateData {
    pub time_remaining_ms: u64,
    pub phase: GamePhase,
    pub is_active: bool,
}

/// Broadcast of an incorrect guess, so the room sees the miss in chat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuessBroadcastData {
    pub player_guess: PlayerGuess,
    pub guessed_word: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuessResultData {
    pub player_id: String,
    pub username: String,
    pub is_correct: bool,
    pub points: i32,
    /// 1-based arrival rank among correct guessers.
    pub position: usize,
    pub time_to_guess_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundEndData {
    pub word: String,
    pub drawer_id: String,
    pub drawer_username: String,
    pub correct_guessers: Vec<PlayerGuess>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_drawer: Option<PublicPlayer>,
    pub final_scores: Vec<PublicPlayer>,
    pub round_number: u32,
    pub is_game_ended: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GameStateData {
    pub phase: GamePhase,
    pub round_number: u32,
    pub max_rounds: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_drawer: Option<PublicPlayer>,
    pub time_remaining_ms: u64,
    pub players: Vec<PublicPlayer>,
    pub correct_guessers: Vec<PlayerGuess>,
    /// Masked for guessers, full for the drawer, empty outside word phases.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub word: String,
}
