//! Error types raised before a session starts (configuration) and by the
//! scene controller (illegal phase transitions).

use thiserror::Error;

use crate::scene::PhaseKind;

/// Rejected configuration. Raised at construction time, never mid-session.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("question bank is empty")]
    EmptyBank,

    #[error("batch size must be at least 1")]
    ZeroBatch,

    #[error("initial lives must be at least 1")]
    ZeroLives,

    #[error("question {id}: {reason}")]
    InvalidQuestion { id: String, reason: String },

    #[error("duplicate question id: {0}")]
    DuplicateQuestion(String),
}

/// Phase changes the controller refused.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SceneError {
    #[error("illegal phase transition {from:?} -> {to:?}")]
    IllegalTransition { from: PhaseKind, to: PhaseKind },

    #[error("session {0} already reached its terminal phase")]
    AlreadyTerminal(u64),
}
