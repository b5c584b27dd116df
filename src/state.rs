//! Application state shared by every connection: the validated config and the
//! frozen question bank. Game state itself is per connection (see `routes::ws`).

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use tracing::{info, instrument};

use crate::bank::QuestionBank;
use crate::config::GameConfig;
use crate::error::ConfigError;

pub struct AppState {
    pub config: GameConfig,
    pub bank: Arc<QuestionBank>,
    live_games: AtomicUsize,
}

impl AppState {
    /// Validate the config and build the bank. Fails before any session starts.
    #[instrument(level = "info", skip_all)]
    pub fn new(config: GameConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let bank = Arc::new(config.build_bank()?);
        info!(
            target: "reef_quiz",
            batch_size = config.batch_size,
            initial_lives = config.initial_lives,
            reward = config.reward,
            regen_delay_ms = config.regen_delay_ms,
            questions = bank.len(),
            "Game settings ready"
        );
        Ok(Self { config, bank, live_games: AtomicUsize::new(0) })
    }

    /// Count a connected game; returns the new total.
    pub fn game_opened(&self) -> usize {
        self.live_games.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn game_closed(&self) -> usize {
        self.live_games.fetch_sub(1, Ordering::Relaxed).saturating_sub(1)
    }

    pub fn live_games(&self) -> usize {
        self.live_games.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_config_is_rejected_up_front() {
        let config = GameConfig { batch_size: 0, ..GameConfig::default() };
        assert!(matches!(AppState::new(config), Err(ConfigError::ZeroBatch)));
    }

    #[test]
    fn live_game_counter_tracks_connections() {
        let state = AppState::new(GameConfig::default()).unwrap();
        assert_eq!(state.game_opened(), 1);
        assert_eq!(state.game_opened(), 2);
        assert_eq!(state.game_closed(), 1);
        assert_eq!(state.live_games(), 1);
    }
}
