//! Domain models: questions, challenge objects placed in the world, and the
//! answer regions shown when one of them is activated.

use std::{fmt, sync::Arc};

use serde::{Deserialize, Serialize};

/// One multiple-choice question. Immutable once the bank is built.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    pub prompt: String,
    pub candidate_answers: Vec<String>,
    pub correct_answer: String,
}

/// Process-unique identifier of a challenge object. Never reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChallengeId(pub u64);

impl fmt::Display for ChallengeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "box-{}", self.0)
    }
}

/// World coordinates. Owned by the physics side; the core only reads them.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    pub const fn new(x: f32, y: f32) -> Self { Self { x, y } }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChallengeState {
    Idle,
    Active,
    Resolved,
}

/// A world-placed trigger that poses its question when reached.
#[derive(Clone, Debug)]
pub struct ChallengeObject {
    pub id: ChallengeId,
    pub position: Position,
    pub question: Arc<Question>,
    pub state: ChallengeState,
}

/// Identifies one selectable answer: the owning object plus the candidate index.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RegionId {
    pub object: ChallengeId,
    pub index: usize,
}

/// One selectable answer, tagged with its own text and the expected answer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AnswerRegion {
    pub id: RegionId,
    pub question_id: String,
    pub answer_text: String,
    pub correct_answer: String,
}

impl AnswerRegion {
    pub fn is_correct(&self) -> bool { self.answer_text == self.correct_answer }
}

/// Movement intent forwarded untouched to the movement controller.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Left,
    Right,
    Up,
    Down,
    Stop,
}
