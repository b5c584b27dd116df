//! Scene transition controller: the coarse game phases and the handoff of the
//! final score into the terminal phase.
//!
//! Phase graph:
//!
//! ```text
//! Boot -> Preload -> (MainMenu) -> Playing -> Terminal
//!                                     ^          |
//!                                     +- restart +
//! ```
//!
//! Every phase entry runs the registered handlers and publishes
//! [`PHASE_READY`] on the bus.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::bus::{BusPayload, EventBus, PHASE_READY};
use crate::error::SceneError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "name", rename_all = "snake_case")]
pub enum Phase {
    Boot,
    Preload,
    MainMenu,
    Playing,
    /// Carries the final score of the session that just ended.
    Terminal { score: u32 },
}

/// Phase without payload, used for handler registration and errors.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseKind {
    Boot,
    Preload,
    MainMenu,
    Playing,
    Terminal,
}

impl Phase {
    pub fn kind(&self) -> PhaseKind {
        match self {
            Phase::Boot => PhaseKind::Boot,
            Phase::Preload => PhaseKind::Preload,
            Phase::MainMenu => PhaseKind::MainMenu,
            Phase::Playing => PhaseKind::Playing,
            Phase::Terminal { .. } => PhaseKind::Terminal,
        }
    }
}

/// Opaque handle to the active phase, published with `phase-ready`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct PhaseHandle {
    pub phase: Phase,
    /// Play-through counter. 0 until `Playing` is first entered.
    pub session: u64,
}

/// Why a session ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    LivesExhausted,
    Abandoned,
}

/// Per-phase hooks. Both default to doing nothing.
pub trait PhaseHandler: Send {
    fn on_enter(&mut self, _handle: &PhaseHandle) {}
    fn on_exit(&mut self, _handle: &PhaseHandle) {}
}

/// A handler shared with its owner, so the owner can read what it recorded.
impl<H: PhaseHandler> PhaseHandler for Arc<Mutex<H>> {
    fn on_enter(&mut self, handle: &PhaseHandle) {
        self.lock().unwrap_or_else(PoisonError::into_inner).on_enter(handle);
    }
    fn on_exit(&mut self, handle: &PhaseHandle) {
        self.lock().unwrap_or_else(PoisonError::into_inner).on_exit(handle);
    }
}

/// Terminal screen: shows the carried score and offers a restart.
#[derive(Debug, Default)]
pub struct GameOverScreen {
    last_score: Option<u32>,
    games_over: u32,
}

impl GameOverScreen {
    pub fn last_score(&self) -> Option<u32> {
        self.last_score
    }

    pub fn games_over(&self) -> u32 {
        self.games_over
    }
}

impl PhaseHandler for GameOverScreen {
    fn on_enter(&mut self, handle: &PhaseHandle) {
        if let Phase::Terminal { score } = handle.phase {
            self.last_score = Some(score);
            self.games_over += 1;
            info!(target: "reef_quiz", session = handle.session, score, "Game over; restart available");
        }
    }
}

pub struct SceneController {
    phase: Phase,
    session: u64,
    booted: bool,
    bus: EventBus,
    handlers: HashMap<PhaseKind, Vec<Box<dyn PhaseHandler>>>,
}

impl SceneController {
    pub fn new(bus: EventBus) -> Self {
        Self {
            phase: Phase::Boot,
            session: 0,
            booted: false,
            bus,
            handlers: HashMap::new(),
        }
    }

    pub fn register_handler(&mut self, kind: PhaseKind, handler: Box<dyn PhaseHandler>) {
        self.handlers.entry(kind).or_default().push(handler);
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn session(&self) -> u64 {
        self.session
    }

    pub fn handle(&self) -> PhaseHandle {
        PhaseHandle { phase: self.phase, session: self.session }
    }

    pub fn is_playing(&self) -> bool {
        self.phase == Phase::Playing
    }

    /// Enter `Boot`. Only once per controller.
    pub fn boot(&mut self) -> Result<PhaseHandle, SceneError> {
        if self.booted {
            return Err(SceneError::IllegalTransition {
                from: self.phase.kind(),
                to: PhaseKind::Boot,
            });
        }
        self.booted = true;
        self.phase = Phase::Boot;
        Ok(self.announce())
    }

    pub fn preload(&mut self) -> Result<PhaseHandle, SceneError> {
        self.transition(Phase::Preload)
    }

    pub fn main_menu(&mut self) -> Result<PhaseHandle, SceneError> {
        self.transition(Phase::MainMenu)
    }

    /// Enter `Playing` from `Preload` or `MainMenu`. Starts a new session.
    pub fn play(&mut self) -> Result<PhaseHandle, SceneError> {
        match self.phase {
            Phase::Preload | Phase::MainMenu => self.transition(Phase::Playing),
            other => Err(SceneError::IllegalTransition {
                from: other.kind(),
                to: PhaseKind::Playing,
            }),
        }
    }

    /// `Playing -> Terminal`, at most once per session.
    pub fn finish(&mut self, score: u32, reason: FinishReason) -> Result<PhaseHandle, SceneError> {
        match self.phase {
            Phase::Playing => {
                info!(target: "reef_quiz", session = self.session, score, ?reason, "Session finished");
                self.transition(Phase::Terminal { score })
            }
            Phase::Terminal { .. } => Err(SceneError::AlreadyTerminal(self.session)),
            other => Err(SceneError::IllegalTransition {
                from: other.kind(),
                to: PhaseKind::Terminal,
            }),
        }
    }

    /// `Terminal -> Playing` with a fresh session number.
    pub fn restart(&mut self) -> Result<PhaseHandle, SceneError> {
        match self.phase {
            Phase::Terminal { .. } => self.transition(Phase::Playing),
            other => Err(SceneError::IllegalTransition {
                from: other.kind(),
                to: PhaseKind::Playing,
            }),
        }
    }

    fn transition(&mut self, next: Phase) -> Result<PhaseHandle, SceneError> {
        let from = self.phase.kind();
        let to = next.kind();
        if !self.booted || !allowed(from, to) {
            warn!(target: "reef_quiz", ?from, ?to, "Rejected phase transition");
            return Err(SceneError::IllegalTransition { from, to });
        }

        let leaving = self.handle();
        if let Some(handlers) = self.handlers.get_mut(&from) {
            for handler in handlers.iter_mut() {
                handler.on_exit(&leaving);
            }
        }

        if to == PhaseKind::Playing {
            self.session += 1;
        }
        self.phase = next;
        debug!(target: "reef_quiz", ?from, ?to, session = self.session, "Phase changed");
        Ok(self.announce())
    }

    fn announce(&mut self) -> PhaseHandle {
        let handle = self.handle();
        if let Some(handlers) = self.handlers.get_mut(&handle.phase.kind()) {
            for handler in handlers.iter_mut() {
                handler.on_enter(&handle);
            }
        }
        self.bus.publish(PHASE_READY, BusPayload::Phase(handle));
        handle
    }
}

fn allowed(from: PhaseKind, to: PhaseKind) -> bool {
    use PhaseKind::*;
    matches!(
        (from, to),
        (Boot, Preload)
            | (Preload, MainMenu)
            | (Preload, Playing)
            | (MainMenu, Playing)
            | (Playing, Terminal)
            | (Terminal, Playing)
    )
}
