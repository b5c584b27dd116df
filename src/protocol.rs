//! Public protocol structs for WebSocket and HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.

use serde::{Deserialize, Serialize};

use crate::bank::QuestionBank;
use crate::domain::{ChallengeId, Direction, RegionId};
use crate::game::Snapshot;
use crate::presenter::PresentationCommand;
use crate::scene::PhaseHandle;

/// Messages the client can send over WebSocket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientWsMessage {
    Ping,
    /// The character reached a challenge object.
    Proximity {
        #[serde(rename = "objectId")]
        object_id: ChallengeId,
    },
    /// The character reached (or the player picked) an answer region.
    SelectAnswer {
        #[serde(rename = "regionId")]
        region_id: RegionId,
    },
    Move {
        direction: Direction,
    },
    RequestOverlay,
    Start,
    Abandon,
    Restart,
    Snapshot,
}

/// Messages the server sends back over WebSocket.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerWsMessage {
    Pong,
    PhaseReady {
        handle: PhaseHandle,
    },
    OverlayRequested,
    Present {
        commands: Vec<PresentationCommand>,
    },
    Snapshot {
        snapshot: Snapshot,
    },
    Error {
        message: String,
    },
}

//
// HTTP request/response DTOs
//

#[derive(Serialize)]
pub struct HealthOut {
    pub ok: bool,
    pub live_games: usize,
}

/// Question as exposed over HTTP. The expected answer stays server-side.
#[derive(Debug, Serialize)]
pub struct QuestionOut {
    pub id: String,
    pub prompt: String,
    pub answers: Vec<String>,
}

pub fn questions_out(bank: &QuestionBank) -> Vec<QuestionOut> {
    bank.iter()
        .map(|q| QuestionOut {
            id: q.id.clone(),
            prompt: q.prompt.clone(),
            answers: q.candidate_answers.clone(),
        })
        .collect()
}
