//! Outbound seam to the presentation side (rendering, physics bodies, sound).
//!
//! The core only tells the presenter *what* happened. `RecordingPresenter`
//! buffers those calls as serializable commands so the host adapter can
//! forward them to a remote client, and so tests can assert on them.

use serde::Serialize;

use crate::domain::{AnswerRegion, ChallengeId, ChallengeObject, Direction, Position, RegionId};

/// Transient, visual-only reactions to an answer.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Feedback {
    Scored { amount: u32, score: u32, at: Position },
    Damaged { lives: u32, at: Position },
}

pub trait Presenter: Send {
    fn spawn_objects(&mut self, objects: &[ChallengeObject]);
    fn despawn_objects(&mut self, objects: &[ChallengeObject]);
    fn show_question(&mut self, object: &ChallengeObject, regions: &[AnswerRegion]);
    fn clear_overlay(&mut self);
    fn remove_object(&mut self, id: ChallengeId);
    fn feedback(&mut self, feedback: Feedback);
    fn hud(&mut self, score: u32, lives: u32);

    /// Movement input is forwarded here untouched; it is not core state.
    fn steer(&mut self, _direction: Direction) {}
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ObjectOut {
    pub id: ChallengeId,
    pub position: Position,
    pub question_id: String,
}

/// Answer text only. The expected answer never leaves the core.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RegionOut {
    pub id: RegionId,
    pub text: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum PresentationCommand {
    SpawnObjects { objects: Vec<ObjectOut> },
    DespawnObjects { ids: Vec<ChallengeId> },
    ShowQuestion {
        object: ChallengeId,
        prompt: String,
        anchor: Position,
        regions: Vec<RegionOut>,
    },
    ClearOverlay,
    RemoveObject { id: ChallengeId },
    Feedback { feedback: Feedback },
    Hud { score: u32, lives: u32 },
    Steer { direction: Direction },
}

#[derive(Debug, Default)]
pub struct RecordingPresenter {
    commands: Vec<PresentationCommand>,
}

impl RecordingPresenter {
    #[cfg(test)]
    pub fn commands(&self) -> &[PresentationCommand] {
        &self.commands
    }

    pub fn drain(&mut self) -> Vec<PresentationCommand> {
        std::mem::take(&mut self.commands)
    }
}

impl Presenter for RecordingPresenter {
    fn spawn_objects(&mut self, objects: &[ChallengeObject]) {
        let objects = objects
            .iter()
            .map(|o| ObjectOut {
                id: o.id,
                position: o.position,
                question_id: o.question.id.clone(),
            })
            .collect();
        self.commands.push(PresentationCommand::SpawnObjects { objects });
    }

    fn despawn_objects(&mut self, objects: &[ChallengeObject]) {
        let ids = objects.iter().map(|o| o.id).collect();
        self.commands.push(PresentationCommand::DespawnObjects { ids });
    }

    fn show_question(&mut self, object: &ChallengeObject, regions: &[AnswerRegion]) {
        self.commands.push(PresentationCommand::ShowQuestion {
            object: object.id,
            prompt: object.question.prompt.clone(),
            anchor: object.position,
            regions: regions
                .iter()
                .map(|r| RegionOut { id: r.id, text: r.answer_text.clone() })
                .collect(),
        });
    }

    fn clear_overlay(&mut self) {
        self.commands.push(PresentationCommand::ClearOverlay);
    }

    fn remove_object(&mut self, id: ChallengeId) {
        self.commands.push(PresentationCommand::RemoveObject { id });
    }

    fn feedback(&mut self, feedback: Feedback) {
        self.commands.push(PresentationCommand::Feedback { feedback });
    }

    fn hud(&mut self, score: u32, lives: u32) {
        self.commands.push(PresentationCommand::Hud { score, lives });
    }

    fn steer(&mut self, direction: Direction) {
        self.commands.push(PresentationCommand::Steer { direction });
    }
}
