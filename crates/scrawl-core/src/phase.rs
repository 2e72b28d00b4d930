use serde::{Deserialize, Serialize};

/// Phase of a room's game loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GamePhase {
    #[default]
    Lobby,
    Waiting,
    Selection,
    Drawing,
    Revealing,
    Ended,
}

impl GamePhase {
    /// Phases during which the round word is set.
    pub fn has_word(self) -> bool {
        matches!(self, GamePhase::Drawing | GamePhase::Revealing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_serializes_snake_case() {
        assert_eq!(serde_json::to_string(&GamePhase::Lobby).unwrap(), "\"lobby\"");
        assert_eq!(
            serde_json::to_string(&GamePhase::Revealing).unwrap(),
            "\"revealing\""
        );
        let p: GamePhase = serde_json::from_str("\"selection\"").unwrap();
        assert_eq!(p, GamePhase::Selection);
    }

    #[test]
    fn word_phases() {
        assert!(GamePhase::Drawing.has_word());
        assert!(GamePhase::Revealing.has_word());
        assert!(!GamePhase::Lobby.has_word());
        assert!(!GamePhase::Waiting.has_word());
        assert!(!GamePhase::Selection.has_word());
        assert!(!GamePhase::Ended.has_word());
    }
}
