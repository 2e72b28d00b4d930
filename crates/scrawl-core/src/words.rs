use std::collections::HashSet;
use std::path::Path;

use rand::Rng;
use rand::seq::{IndexedRandom, SliceRandom};
use serde::{Deserialize, Serialize};

use crate::scoring::Difficulty;

/// Default path for the word bank file.
const DEFAULT_WORD_FILE: &str = "words.toml";

/// Environment variable that overrides the word file path.
const ENV_VAR: &str = "SCRAWL_WORD_FILE";

/// Number of choices offered to the drawer.
pub const CHOICE_COUNT: usize = 3;

/// Word corpus bucketed by difficulty, loaded from TOML at startup.
///
/// When the file is missing or unparseable (or a bucket comes back empty)
/// the built-in corpus is used instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WordBank {
    pub easy: Vec<String>,
    pub medium: Vec<String>,
    pub hard: Vec<String>,
}

impl Default for WordBank {
    fn default() -> Self {
        let bucket = |words: &[&str]| words.iter().map(|w| w.to_string()).collect();
        Self {
            easy: bucket(&[
                "cat", "dog", "sun", "car", "tree", "fish", "moon", "house", "apple", "star",
            ]),
            medium: bucket(&[
                "elephant", "bicycle", "guitar", "castle", "penguin", "volcano", "rainbow",
                "tornado", "sailboat", "campfire",
            ]),
            hard: bucket(&[
                "algorithm",
                "philosophy",
                "metamorphosis",
                "constellation",
                "archaeology",
                "lighthouse keeper",
                "photosynthesis",
                "procrastination",
            ]),
        }
    }
}

impl WordBank {
    /// Load the word bank from disk or environment.
    ///
    /// Resolution order: `SCRAWL_WORD_FILE`, then `words.toml`, then the
    /// built-in corpus.
    pub fn load() -> Self {
        let path = std::env::var(ENV_VAR).unwrap_or_else(|_| DEFAULT_WORD_FILE.to_string());
        Self::load_from_path(&path)
    }

    /// Load from a specific file path, falling back to the built-in corpus
    /// on any error.
    pub fn load_from_path(path: &str) -> Self {
        let p = Path::new(path);
        if !p.exists() {
            return Self::default();
        }
        let bank = match std::fs::read_to_string(p) {
            Ok(contents) => match toml::from_str::<WordBank>(&contents) {
                Ok(bank) => bank,
                Err(e) => {
                    tracing::warn!(path = %path, error = %e, "Failed to parse word file; using built-in words");
                    Self::default()
                },
            },
            Err(e) => {
                tracing::warn!(path = %path, error = %e, "Failed to read word file; using built-in words");
                Self::default()
            },
        };
        if bank.easy.is_empty() || bank.medium.is_empty() || bank.hard.is_empty() {
            tracing::warn!(path = %path, "Word file has an empty difficulty bucket; using built-in words");
            return Self::default();
        }
        bank
    }

    fn bucket(&self, difficulty: Difficulty) -> &[String] {
        match difficulty {
            Difficulty::Easy => &self.easy,
            Difficulty::Medium => &self.medium,
            Difficulty::Hard => &self.hard,
        }
    }

    /// Produce three choices: one per difficulty, deduplicated, shuffled.
    ///
    /// A degenerate bank (duplicate words across buckets) is topped up from
    /// random buckets; the loop is bounded so a near-empty bank cannot hang
    /// the caller.
    pub fn generate_choices(&self) -> Vec<String> {
        let mut rng = rand::rng();
        let mut seen = HashSet::new();
        let mut choices = Vec::with_capacity(CHOICE_COUNT);

        for difficulty in [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard] {
            if let Some(word) = self.bucket(difficulty).choose(&mut rng)
                && seen.insert(word.clone())
            {
                choices.push(word.clone());
            }
        }

        let mut attempts = 0;
        while choices.len() < CHOICE_COUNT && attempts < 16 {
            attempts += 1;
            let difficulty = match rng.random_range(0..3) {
                0 => Difficulty::Easy,
                1 => Difficulty::Medium,
                _ => Difficulty::Hard,
            };
            if let Some(word) = self.bucket(difficulty).choose(&mut rng)
                && seen.insert(word.clone())
            {
                choices.push(word.clone());
            }
        }

        choices.shuffle(&mut rng);
        choices
    }
}

/// Mask a word for guessers: every non-space character becomes `_`, spaces
/// are preserved, pieces joined by single spaces (`"cat"` → `"_ _ _"`).
pub fn mask_word(word: &str) -> String {
    word.chars()
        .map(|c| if c == ' ' { " " } else { "_" })
        .collect::<Vec<_>>()
        .join(" ")
}
