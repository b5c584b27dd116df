//! One player's game: phases, the challenge lifecycle for the current
//! session, and the frame clock that drives deferred work.
//!
//! All inbound notifications and `update` calls are expected one at a time
//! from a single owner; nothing here is shared across threads.

use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use rand::{rngs::StdRng, SeedableRng};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::bank::QuestionBank;
use crate::bus::{BusPayload, EventBus, OVERLAY_REQUESTED};
use crate::config::GameConfig;
use crate::error::ConfigError;
use crate::domain::{ChallengeId, ChallengeState, Direction, Position, RegionId};
use crate::lifecycle::{Activation, ChallengeLifecycle, LifecycleParams, Resolution};
use crate::presenter::Presenter;
use crate::registry::Layout;
use crate::scene::{FinishReason, GameOverScreen, Phase, PhaseKind, SceneController};

/// Work scheduled on the frame clock. Cancel-free: stale entries are
/// discarded when they come due.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Deferred {
    due: Duration,
    session: u64,
    task: DeferredTask,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum DeferredTask {
    RegenerateBatch,
}

#[derive(Clone, Debug, Serialize)]
pub struct ObjectSnapshot {
    pub id: ChallengeId,
    pub position: Position,
    pub state: ChallengeState,
    pub question_id: String,
}

/// The open question as the host may see it: answer texts, no expected answer.
#[derive(Clone, Debug, Serialize)]
pub struct OverlaySnapshot {
    pub object: ChallengeId,
    pub prompt: String,
    pub anchor: Position,
    pub answers: Vec<String>,
}

/// Read-only view of the game, for the host and for tests.
#[derive(Clone, Debug, Serialize)]
pub struct Snapshot {
    pub phase: Phase,
    pub session: u64,
    pub score: u32,
    pub lives: u32,
    pub active: Option<ChallengeId>,
    pub overlay: Option<OverlaySnapshot>,
    pub remaining: usize,
    pub objects: Vec<ObjectSnapshot>,
    pub solved: BTreeMap<String, bool>,
    pub regeneration_pending: bool,
    /// Score carried into the most recent Terminal phase, if any.
    pub last_score: Option<u32>,
    pub games_over: u32,
}

pub struct Game<P: Presenter> {
    bank: Arc<QuestionBank>,
    layout: Arc<dyn Layout + Send + Sync>,
    params: LifecycleParams,
    regen_delay: Duration,
    show_main_menu: bool,
    rng_seed: Option<u64>,
    bus: EventBus,
    scene: SceneController,
    game_over: Arc<Mutex<GameOverScreen>>,
    lifecycle: Option<ChallengeLifecycle>,
    presenter: P,
    clock: Duration,
    deferred: Vec<Deferred>,
}

impl<P: Presenter> Game<P> {
    /// Fails if `config` could never start a session.
    pub fn new(
        config: &GameConfig,
        bank: Arc<QuestionBank>,
        bus: EventBus,
        presenter: P,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let game_over = Arc::new(Mutex::new(GameOverScreen::default()));
        let mut scene = SceneController::new(bus.clone());
        scene.register_handler(PhaseKind::Terminal, Box::new(Arc::clone(&game_over)));
        Ok(Self {
            bank,
            layout: Arc::new(config.row_layout()),
            params: config.lifecycle_params(),
            regen_delay: config.regen_delay(),
            show_main_menu: config.show_main_menu,
            rng_seed: config.rng_seed,
            bus,
            scene,
            game_over,
            lifecycle: None,
            presenter,
            clock: Duration::ZERO,
            deferred: Vec::new(),
        })
    }

    /// Swap the placement function used for every future batch.
    #[cfg(test)]
    pub fn with_layout(mut self, layout: Arc<dyn Layout + Send + Sync>) -> Self {
        self.layout = layout;
        self
    }

    /// Boot -> Preload -> (MainMenu | Playing).
    #[instrument(level = "info", skip(self))]
    pub fn boot(&mut self) {
        if let Err(e) = self.scene.boot().and_then(|_| self.scene.preload()) {
            warn!(target: "reef_quiz", error = %e, "Boot ignored");
            return;
        }
        if self.show_main_menu {
            if let Err(e) = self.scene.main_menu() {
                warn!(target: "reef_quiz", error = %e, "Main menu unavailable");
            }
        } else {
            self.start();
        }
    }

    /// Leave Preload or MainMenu and begin the first session.
    pub fn start(&mut self) {
        match self.scene.play() {
            Ok(_) => self.begin_session(),
            Err(e) => debug!(target: "reef_quiz", error = %e, "Start ignored"),
        }
    }

    /// Terminal -> Playing with fresh score, lives and solved set.
    #[instrument(level = "info", skip(self))]
    pub fn restart(&mut self) {
        match self.scene.restart() {
            Ok(_) => self.begin_session(),
            Err(e) => debug!(target: "reef_quiz", error = %e, "Restart ignored"),
        }
    }

    /// External request to end the current session.
    pub fn abandon(&mut self) {
        let score = self.score();
        if let Err(e) = self.scene.finish(score, FinishReason::Abandoned) {
            debug!(target: "reef_quiz", error = %e, "Abandon ignored");
        }
    }

    pub fn on_proximity(&mut self, id: ChallengeId) -> Option<Activation> {
        if !self.scene.is_playing() {
            debug!(target: "challenge", object = %id, "Proximity outside Playing ignored");
            return None;
        }
        let lifecycle = self.lifecycle.as_mut()?;
        Some(lifecycle.on_proximity(id, &mut self.presenter))
    }

    pub fn on_answer_selected(&mut self, region: RegionId) -> Option<Resolution> {
        if !self.scene.is_playing() {
            debug!(target: "challenge", object = %region.object, "Selection outside Playing ignored");
            return None;
        }
        let lifecycle = self.lifecycle.as_mut()?;
        let resolution = lifecycle.on_answer_selected(region, &mut self.presenter);

        match resolution {
            Resolution::LivesExhausted { score } => {
                if let Err(e) = self.scene.finish(score, FinishReason::LivesExhausted) {
                    warn!(target: "reef_quiz", error = %e, "Terminal handoff refused");
                }
            }
            r if r.batch_exhausted() => self.schedule(DeferredTask::RegenerateBatch),
            _ => {}
        }
        Some(resolution)
    }

    /// Forwarded to the movement controller; not part of game state.
    pub fn on_movement_input(&mut self, direction: Direction) {
        if self.scene.is_playing() {
            self.presenter.steer(direction);
        }
    }

    /// Ask the host to surface a UI affordance outside the game canvas.
    pub fn request_overlay(&mut self) -> usize {
        self.bus.publish(OVERLAY_REQUESTED, BusPayload::None)
    }

    /// Per-frame pass: advance the clock and run due deferred work.
    pub fn update(&mut self, elapsed: Duration) {
        self.clock += elapsed;
        let now = self.clock;
        let (due, pending): (Vec<Deferred>, Vec<Deferred>) =
            self.deferred.drain(..).partition(|d| d.due <= now);
        self.deferred = pending;

        for job in due {
            self.run(job);
        }
    }

    fn schedule(&mut self, task: DeferredTask) {
        let job = Deferred {
            due: self.clock + self.regen_delay,
            session: self.scene.session(),
            task,
        };
        debug!(target: "challenge", ?task, due_ms = job.due.as_millis() as u64, "Deferred task scheduled");
        self.deferred.push(job);
    }

    fn run(&mut self, job: Deferred) {
        if !self.scene.is_playing() || job.session != self.scene.session() {
            debug!(target: "challenge", ?job, "Deferred task dropped: session no longer playing");
            return;
        }
        match job.task {
            DeferredTask::RegenerateBatch => {
                if let Some(lifecycle) = self.lifecycle.as_mut() {
                    lifecycle.regenerate(&mut self.presenter);
                }
            }
        }
    }

    fn begin_session(&mut self) {
        let session = self.scene.session();
        if let Some(mut previous) = self.lifecycle.take() {
            previous.teardown(&mut self.presenter);
        }
        self.deferred.retain(|job| job.session == session);
        let rng = match self.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(session)),
            None => StdRng::from_entropy(),
        };
        let mut lifecycle = ChallengeLifecycle::new(
            Arc::clone(&self.bank),
            Arc::clone(&self.layout),
            self.params,
            rng,
        );
        lifecycle.begin(&mut self.presenter);
        self.lifecycle = Some(lifecycle);
        info!(target: "reef_quiz", session, batch = self.params.batch_size, "Session started");
    }

    pub fn phase(&self) -> Phase {
        self.scene.phase()
    }

    pub fn session(&self) -> u64 {
        self.scene.session()
    }

    pub fn score(&self) -> u32 {
        self.lifecycle.as_ref().map_or(0, |l| l.progress().score())
    }

    #[cfg(test)]
    pub fn lifecycle(&self) -> Option<&ChallengeLifecycle> {
        self.lifecycle.as_ref()
    }

    #[cfg(test)]
    pub fn presenter(&self) -> &P {
        &self.presenter
    }

    pub fn presenter_mut(&mut self) -> &mut P {
        &mut self.presenter
    }

    #[cfg(test)]
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    fn regeneration_pending(&self) -> bool {
        let session = self.scene.session();
        self.scene.is_playing() && self.deferred.iter().any(|job| job.session == session)
    }

    pub fn snapshot(&self) -> Snapshot {
        let lifecycle = self.lifecycle.as_ref();
        let game_over = self.game_over.lock().unwrap_or_else(PoisonError::into_inner);
        Snapshot {
            phase: self.scene.phase(),
            session: self.scene.session(),
            score: self.score(),
            lives: lifecycle.map_or(self.params.initial_lives, |l| l.progress().lives()),
            active: lifecycle.and_then(|l| l.active()),
            overlay: lifecycle.and_then(|l| l.overlay()).map(|o| OverlaySnapshot {
                object: o.object,
                prompt: o.prompt.clone(),
                anchor: o.anchor,
                answers: o.regions.iter().map(|r| r.answer_text.clone()).collect(),
            }),
            remaining: lifecycle.map_or(0, |l| l.registry().count_remaining()),
            objects: lifecycle
                .map(|l| {
                    l.registry()
                        .iter()
                        .map(|o| ObjectSnapshot {
                            id: o.id,
                            position: o.position,
                            state: o.state,
                            question_id: o.question.id.clone(),
                        })
                        .collect()
                })
                .unwrap_or_default(),
            solved: lifecycle
                .map(|l| l.solved().iter().map(|(k, v)| (k.clone(), *v)).collect())
                .unwrap_or_default(),
            regeneration_pending: self.regeneration_pending(),
            last_score: game_over.last_score(),
            games_over: game_over.games_over(),
        }
    }
}
