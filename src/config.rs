//! Loading game configuration (pacing, scoring, layout and an optional
//! question bank) from TOML.
//!
//! See `GameConfig` for the expected schema. Every field has a default, so an
//! empty file (or no file at all) yields the stock game.

use std::time::Duration;

use serde::Deserialize;
use tracing::{error, info};

use crate::bank::QuestionBank;
use crate::domain::{Position, Question};
use crate::error::ConfigError;
use crate::lifecycle::LifecycleParams;
use crate::registry::RowLayout;
use crate::seeds::seed_questions;

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub batch_size: usize,
    pub initial_lives: u32,
    pub reward: u32,
    pub regen_delay_ms: u64,
    pub tick_ms: u64,
    pub show_main_menu: bool,
    /// Fixed seed for reproducible question draws; entropy when absent.
    pub rng_seed: Option<u64>,
    pub layout: LayoutCfg,
    /// Replaces the built-in bank when non-empty.
    pub questions: Vec<QuestionCfg>,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            batch_size: 5,
            initial_lives: 3,
            reward: 10,
            regen_delay_ms: 1500,
            tick_ms: 50,
            show_main_menu: false,
            rng_seed: None,
            layout: LayoutCfg::default(),
            questions: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct LayoutCfg {
    pub origin_x: f32,
    pub origin_y: f32,
    pub step_x: f32,
}

impl Default for LayoutCfg {
    fn default() -> Self {
        let row = RowLayout::default();
        Self { origin_x: row.origin.x, origin_y: row.origin.y, step_x: row.step_x }
    }
}

/// Question entry accepted in TOML configuration.
#[derive(Clone, Debug, Deserialize)]
pub struct QuestionCfg {
    pub id: String,
    pub prompt: String,
    pub answers: Vec<String>,
    pub correct: String,
}

impl From<QuestionCfg> for Question {
    fn from(q: QuestionCfg) -> Self {
        Question { id: q.id, prompt: q.prompt, candidate_answers: q.answers, correct_answer: q.correct }
    }
}

impl GameConfig {
    /// Reject configurations that could never start a session.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 { return Err(ConfigError::ZeroBatch); }
        if self.initial_lives == 0 { return Err(ConfigError::ZeroLives); }
        Ok(())
    }

    /// Bank from config when provided, otherwise the built-in seeds.
    pub fn build_bank(&self) -> Result<QuestionBank, ConfigError> {
        if self.questions.is_empty() {
            QuestionBank::new(seed_questions())
        } else {
            QuestionBank::new(self.questions.iter().cloned().map(Question::from).collect())
        }
    }

    pub fn lifecycle_params(&self) -> LifecycleParams {
        LifecycleParams { batch_size: self.batch_size, initial_lives: self.initial_lives, reward: self.reward }
    }

    pub fn row_layout(&self) -> RowLayout {
        RowLayout { origin: Position::new(self.layout.origin_x, self.layout.origin_y), step_x: self.layout.step_x }
    }

    pub fn regen_delay(&self) -> Duration { Duration::from_millis(self.regen_delay_ms) }

    pub fn tick(&self) -> Duration { Duration::from_millis(self.tick_ms.max(1)) }
}

/// Parse a TOML document into a `GameConfig`.
pub fn parse_game_config(s: &str) -> Result<GameConfig, toml::de::Error> {
    toml::from_str::<GameConfig>(s)
}

/// Load `GameConfig` from GAME_CONFIG_PATH. On any read/parse error, returns defaults.
pub fn load_game_config_from_env() -> GameConfig {
    let Ok(path) = std::env::var("GAME_CONFIG_PATH") else {
        info!(target: "reef_quiz", "GAME_CONFIG_PATH not set; using default game config");
        return GameConfig::default();
    };
    match std::fs::read_to_string(&path) {
        Ok(s) => match parse_game_config(&s) {
            Ok(cfg) => {
                info!(target: "reef_quiz", %path, questions = cfg.questions.len(), "Loaded game config (TOML)");
                cfg
            }
            Err(e) => {
                error!(target: "reef_quiz", %path, error = %e, "Failed to parse TOML config; using defaults");
                GameConfig::default()
            }
        },
        Err(e) => {
            error!(target: "reef_quiz", %path, error = %e, "Failed to read TOML config file; using defaults");
            GameConfig::default()
        }
    }
}
