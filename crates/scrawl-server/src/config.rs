use std::time::Duration;

use serde::Deserialize;

/// Top-level server configuration, loaded from `scrawl.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
    /// Path of the word bank file handed to the word source at startup.
    pub word_file: String,
    pub game: GameConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".to_string(),
            word_file: "words.toml".to_string(),
            game: GameConfig::default(),
        }
    }
}

/// Game pacing and limits, the `[game]` section of the config file.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub max_players: usize,
    pub min_players: usize,
    pub max_rounds: u32,
    pub waiting_secs: u64,
    pub selection_secs: u64,
    pub drawing_secs: u64,
    pub revealing_secs: u64,
    pub reset_secs: u64,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            max_players: 8,
            min_players: 2,
            max_rounds: 3,
            waiting_secs: 15,
            selection_secs: 15,
            drawing_secs: 90,
            revealing_secs: 8,
            reset_secs: 30,
        }
    }
}

impl GameConfig {
    pub fn waiting(&self) -> Duration {
        Duration::from_secs(self.waiting_secs)
    }

    pub fn selection(&self) -> Duration {
        Duration::from_secs(self.selection_secs)
    }

    pub fn drawing(&self) -> Duration {
        Duration::from_secs(self.drawing_secs)
    }

    pub fn revealing(&self) -> Duration {
        Duration::from_secs(self.revealing_secs)
    }

    pub fn reset(&self) -> Duration {
        Duration::from_secs(self.reset_secs)
    }
}

impl ServerConfig {
    /// Validate configuration, exiting on unrecoverable issues.
    pub fn validate(&self) {
        if self.listen_addr.parse::<std::net::SocketAddr>().is_err() {
            tracing::error!(
                addr = %self.listen_addr,
                "listen_addr is not a valid socket address"
            );
            std::process::exit(1);
        }
        if self.game.min_players < 2 {
            tracing::error!(
                min_players = self.game.min_players,
                "min_players must be at least 2"
            );
            std::process::exit(1);
        }
        if self.game.max_players < self.game.min_players {
            tracing::error!(
                max_players = self.game.max_players,
                min_players = self.game.min_players,
                "max_players must be >= min_players"
            );
            std::process::exit(1);
        }
        if self.game.max_rounds == 0 || self.game.drawing_secs == 0 {
            tracing::error!("max_rounds and drawing_secs must be > 0");
            std::process::exit(1);
        }
    }

    /// Load config from `scrawl.toml` if it exists, then apply env var overrides.
    pub fn load() -> Self {
        let mut config = match std::fs::read_to_string("scrawl.toml") {
            Ok(content) => match toml::from_str::<ServerConfig>(&content) {
                Ok(cfg) => {
                    tracing::info!("Loaded configuration from scrawl.toml");
                    cfg
                },
                Err(e) => {
                    tracing::warn!("Failed to parse scrawl.toml: {e}, using defaults");
                    ServerConfig::default()
                },
            },
            Err(_) => {
                tracing::info!("No scrawl.toml found, using defaults");
                ServerConfig::default()
            },
        };

        if let Ok(addr) = std::env::var("SCRAWL_LISTEN_ADDR")
            && !addr.is_empty()
        {
            config.listen_addr = addr;
        }
        if let Ok(path) = std::env::var("SCRAWL_WORD_FILE")
            && !path.is_empty()
        {
            config.word_file = path;
        }

        config
    }
}
