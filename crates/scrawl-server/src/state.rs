use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use scrawl_core::words::WordBank;

use crate::config::ServerConfig;
use crate::registry::Registry;

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<Registry>,
    pub words: Arc<WordBank>,
    pub config: Arc<ServerConfig>,
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        let words = WordBank::load_from_path(&config.word_file);
        Self {
            registry: Arc::new(Registry::new()),
            words: Arc::new(words),
            config: Arc::new(config),
            shutdown: CancellationToken::new(),
        }
    }
}
