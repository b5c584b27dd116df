//! Challenge lifecycle state machine.
//!
//! Per object: `Idle -> Active -> Resolved`. Per session: at most one object
//! is `Active`, and `active` here always names it. Every inbound notification
//! is total: stale or malformed input is logged and ignored, never an error.
//!
//! Resolution order is fixed: clear the active reference, destroy the
//! overlay, then remove the object.

use std::{collections::HashMap, sync::Arc};

use rand::rngs::StdRng;
use tracing::{debug, info, instrument};

use crate::bank::QuestionBank;
use crate::domain::{AnswerRegion, ChallengeId, ChallengeState, Position, RegionId};
use crate::presenter::{Feedback, Presenter};
use crate::progress::{LifeLoss, Progress};
use crate::registry::{ChallengeRegistry, Layout};

/// Batch and scoring parameters, fixed for a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LifecycleParams {
    pub batch_size: usize,
    pub initial_lives: u32,
    pub reward: u32,
}

impl Default for LifecycleParams {
    fn default() -> Self {
        Self { batch_size: 5, initial_lives: 3, reward: 10 }
    }
}

/// The question currently on screen.
#[derive(Clone, Debug, PartialEq)]
pub struct Overlay {
    pub object: ChallengeId,
    pub prompt: String,
    pub anchor: Position,
    pub regions: Vec<AnswerRegion>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Ignored {
    AlreadyActive(ChallengeId),
    UnknownObject,
    NotIdle,
    NoActiveChallenge,
    NotActiveChallenge,
    RegionOutOfRange,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Activation {
    Activated(ChallengeId),
    Ignored(Ignored),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Resolution {
    Ignored(Ignored),
    Correct { score: u32, batch_exhausted: bool },
    Incorrect { lives: u32, batch_exhausted: bool },
    /// Wrong answer on the last life. Nothing was mutated; the session must end.
    LivesExhausted { score: u32 },
}

impl Resolution {
    pub fn batch_exhausted(&self) -> bool {
        matches!(
            self,
            Resolution::Correct { batch_exhausted: true, .. }
                | Resolution::Incorrect { batch_exhausted: true, .. }
        )
    }
}

pub struct ChallengeLifecycle {
    bank: Arc<QuestionBank>,
    layout: Arc<dyn Layout + Send + Sync>,
    params: LifecycleParams,
    rng: StdRng,
    registry: ChallengeRegistry,
    progress: Progress,
    active: Option<ChallengeId>,
    overlay: Option<Overlay>,
    solved: HashMap<String, bool>,
}

impl ChallengeLifecycle {
    pub fn new(
        bank: Arc<QuestionBank>,
        layout: Arc<dyn Layout + Send + Sync>,
        params: LifecycleParams,
        rng: StdRng,
    ) -> Self {
        Self {
            bank,
            layout,
            params,
            rng,
            registry: ChallengeRegistry::new(),
            progress: Progress::new(params.initial_lives),
            active: None,
            overlay: None,
            solved: HashMap::new(),
        }
    }

    /// Spawn the first batch and show the initial HUD.
    pub fn begin(&mut self, presenter: &mut dyn Presenter) {
        self.spawn(presenter);
        presenter.hud(self.progress.score(), self.progress.lives());
    }

    /// `Idle -> Active` on a proximity notification.
    #[instrument(level = "debug", skip(self, presenter), fields(object = %id))]
    pub fn on_proximity(&mut self, id: ChallengeId, presenter: &mut dyn Presenter) -> Activation {
        if let Some(active) = self.active {
            debug!(target: "challenge", %active, "Proximity ignored: a challenge is already active");
            return Activation::Ignored(Ignored::AlreadyActive(active));
        }

        let Some(object) = self.registry.get_mut(id) else {
            debug!(target: "challenge", "Proximity ignored: unknown object");
            return Activation::Ignored(Ignored::UnknownObject);
        };
        if object.state != ChallengeState::Idle {
            debug!(target: "challenge", state = ?object.state, "Proximity ignored: object not idle");
            return Activation::Ignored(Ignored::NotIdle);
        }

        object.state = ChallengeState::Active;
        self.active = Some(id);

        // A stale overlay may survive if an earlier resolution raced.
        if self.overlay.take().is_some() {
            presenter.clear_overlay();
        }

        let question = Arc::clone(&object.question);
        let regions: Vec<AnswerRegion> = question
            .candidate_answers
            .iter()
            .enumerate()
            .map(|(index, text)| AnswerRegion {
                id: RegionId { object: id, index },
                question_id: question.id.clone(),
                answer_text: text.clone(),
                correct_answer: question.correct_answer.clone(),
            })
            .collect();

        presenter.show_question(object, &regions);
        self.overlay = Some(Overlay {
            object: id,
            prompt: question.prompt.clone(),
            anchor: object.position,
            regions,
        });

        info!(target: "challenge", question = %question.id, "Challenge activated");
        self.debug_check_invariants();
        Activation::Activated(id)
    }

    /// `Active -> Resolved` on an answer selection.
    #[instrument(level = "debug", skip(self, presenter), fields(object = %region.object, index = region.index))]
    pub fn on_answer_selected(&mut self, region: RegionId, presenter: &mut dyn Presenter) -> Resolution {
        let Some(active) = self.active else {
            debug!(target: "challenge", "Selection ignored: no active challenge");
            return Resolution::Ignored(Ignored::NoActiveChallenge);
        };
        if region.object != active {
            debug!(target: "challenge", %active, "Selection ignored: stale region");
            return Resolution::Ignored(Ignored::NotActiveChallenge);
        }
        let Some(selected) = self
            .overlay
            .as_ref()
            .filter(|o| o.object == active)
            .and_then(|o| o.regions.get(region.index))
            .cloned()
        else {
            debug!(target: "challenge", "Selection ignored: region out of range");
            return Resolution::Ignored(Ignored::RegionOutOfRange);
        };
        let at = self
            .registry
            .get(active)
            .map(|o| o.position)
            .unwrap_or_default();

        let outcome = if selected.is_correct() {
            self.solved.insert(selected.question_id.clone(), true);
            let score = self.progress.award(self.params.reward);
            presenter.feedback(Feedback::Scored { amount: self.params.reward, score, at });
            info!(target: "challenge", question = %selected.question_id, score, "Correct answer");
            Resolution::Correct { score, batch_exhausted: false }
        } else {
            match self.progress.lose_life() {
                LifeLoss::Exhausted => {
                    info!(target: "challenge", question = %selected.question_id, "Wrong answer on the last life");
                    return Resolution::LivesExhausted { score: self.progress.score() };
                }
                LifeLoss::Lost { remaining } => {
                    presenter.feedback(Feedback::Damaged { lives: remaining, at });
                    info!(target: "challenge", question = %selected.question_id, lives = remaining, "Wrong answer");
                    Resolution::Incorrect { lives: remaining, batch_exhausted: false }
                }
            }
        };
        presenter.hud(self.progress.score(), self.progress.lives());

        self.active = None;
        self.overlay = None;
        presenter.clear_overlay();
        if let Some(object) = self.registry.get_mut(active) {
            object.state = ChallengeState::Resolved;
        }
        presenter.remove_object(active);

        let exhausted = self.registry.count_remaining() == 0;
        if exhausted {
            info!(target: "challenge", "Batch exhausted; regeneration due");
        }
        self.debug_check_invariants();

        match outcome {
            Resolution::Correct { score, .. } => Resolution::Correct { score, batch_exhausted: exhausted },
            Resolution::Incorrect { lives, .. } => Resolution::Incorrect { lives, batch_exhausted: exhausted },
            other => other,
        }
    }

    /// Replace the whole batch with freshly drawn questions.
    pub fn regenerate(&mut self, presenter: &mut dyn Presenter) {
        self.teardown(presenter);
        self.spawn(presenter);
        info!(target: "challenge", spawned = self.registry.len(), "Batch regenerated");
    }

    /// Take everything this lifecycle put on screen back off it: the whole
    /// batch, and the overlay if one is still up. Progress is untouched.
    pub fn teardown(&mut self, presenter: &mut dyn Presenter) {
        let destroyed = self.registry.destroy_batch();
        presenter.despawn_objects(&destroyed);
        let had_active = self.active.take().is_some();
        let had_overlay = self.overlay.take().is_some();
        if had_active || had_overlay {
            presenter.clear_overlay();
        }
        debug!(target: "challenge", despawned = destroyed.len(), had_overlay, "Lifecycle torn down");
        self.debug_check_invariants();
    }

    fn spawn(&mut self, presenter: &mut dyn Presenter) {
        let spawned = self.registry.spawn_batch(
            self.params.batch_size,
            self.layout.as_ref(),
            &self.bank,
            &mut self.rng,
        );
        for object in spawned {
            self.solved.entry(object.question.id.clone()).or_insert(false);
        }
        presenter.spawn_objects(spawned);
    }

    pub fn progress(&self) -> &Progress {
        &self.progress
    }

    pub fn active(&self) -> Option<ChallengeId> {
        self.active
    }

    pub fn overlay(&self) -> Option<&Overlay> {
        self.overlay.as_ref()
    }

    pub fn registry(&self) -> &ChallengeRegistry {
        &self.registry
    }

    /// Question id -> answered correctly at least once this session.
    pub fn solved(&self) -> &HashMap<String, bool> {
        &self.solved
    }

    /// True when `active` and the registry's `Active` objects agree.
    pub fn invariants_hold(&self) -> bool {
        let tagged = self.registry.active_ids();
        match self.active {
            Some(id) => tagged == [id],
            None => tagged.is_empty(),
        }
    }

    fn debug_check_invariants(&self) {
        debug_assert!(
            self.invariants_hold(),
            "active reference {:?} disagrees with registry {:?}",
            self.active,
            self.registry.active_ids()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Question;
    use crate::presenter::{PresentationCommand, RecordingPresenter};
    use crate::registry::RowLayout;
    use rand::SeedableRng;

    fn bank() -> Arc<QuestionBank> {
        Arc::new(
            QuestionBank::new(vec![
                Question {
                    id: "meow".into(),
                    prompt: "Which animal says \"meow\"?".into(),
                    candidate_answers: vec!["cat".into(), "dog".into(), "mouse".into(), "rat".into()],
                    correct_answer: "cat".into(),
                },
                Question {
                    id: "be".into(),
                    prompt: "I ... happy today.".into(),
                    candidate_answers: vec!["am".into(), "is".into(), "was".into(), "are".into()],
                    correct_answer: "am".into(),
                },
            ])
            .unwrap(),
        )
    }

    fn lifecycle(batch_size: usize, initial_lives: u32) -> (ChallengeLifecycle, RecordingPresenter) {
        let params = LifecycleParams { batch_size, initial_lives, reward: 10 };
        let mut lc = ChallengeLifecycle::new(
            bank(),
            Arc::new(RowLayout::default()),
            params,
            StdRng::seed_from_u64(3),
        );
        let mut presenter = RecordingPresenter::default();
        lc.begin(&mut presenter);
        (lc, presenter)
    }

    fn ids(lc: &ChallengeLifecycle) -> Vec<ChallengeId> {
        lc.registry().iter().map(|o| o.id).collect()
    }

    fn region(lc: &ChallengeLifecycle, correct: bool) -> RegionId {
        lc.overlay()
            .unwrap()
            .regions
            .iter()
            .find(|r| r.is_correct() == correct)
            .unwrap()
            .id
    }

    #[test]
    fn begin_spawns_a_batch_and_marks_questions_unsolved() {
        let (lc, presenter) = lifecycle(3, 3);
        assert_eq!(lc.registry().count_remaining(), 3);
        assert!(lc.solved().values().all(|solved| !solved));
        assert!(matches!(presenter.commands()[0], PresentationCommand::SpawnObjects { ref objects } if objects.len() == 3));
        assert_eq!(presenter.commands()[1], PresentationCommand::Hud { score: 0, lives: 3 });
    }

    #[test]
    fn proximity_presents_answers_in_candidate_order() {
        let (mut lc, mut presenter) = lifecycle(1, 3);
        let id = ids(&lc)[0];

        assert_eq!(lc.on_proximity(id, &mut presenter), Activation::Activated(id));

        let overlay = lc.overlay().unwrap();
        let object = lc.registry().get(id).unwrap();
        let texts: Vec<&str> = overlay.regions.iter().map(|r| r.answer_text.as_str()).collect();
        let expected: Vec<&str> = object.question.candidate_answers.iter().map(String::as_str).collect();
        assert_eq!(texts, expected);
        assert!(overlay.regions.iter().enumerate().all(|(i, r)| r.id == RegionId { object: id, index: i }));
        assert_eq!(overlay.anchor, object.position);
        assert_eq!(object.state, ChallengeState::Active);
    }

    #[test]
    fn retrigger_of_the_active_object_is_idempotent() {
        let (mut lc, mut presenter) = lifecycle(2, 3);
        let a = ids(&lc)[0];
        lc.on_proximity(a, &mut presenter);
        let before = (lc.active(), *lc.progress(), lc.overlay().cloned());
        let commands = presenter.commands().len();

        assert_eq!(
            lc.on_proximity(a, &mut presenter),
            Activation::Ignored(Ignored::AlreadyActive(a))
        );
        assert_eq!((lc.active(), *lc.progress(), lc.overlay().cloned()), before);
        assert_eq!(presenter.commands().len(), commands);
    }

    #[test]
    fn second_object_is_ignored_while_one_is_active() {
        let (mut lc, mut presenter) = lifecycle(2, 3);
        let all = ids(&lc);
        let (a, b) = (all[0], all[1]);

        lc.on_proximity(a, &mut presenter);
        assert_eq!(
            lc.on_proximity(b, &mut presenter),
            Activation::Ignored(Ignored::AlreadyActive(a))
        );
        assert_eq!(lc.active(), Some(a));
        assert_eq!(lc.registry().get(b).unwrap().state, ChallengeState::Idle);
        assert_eq!(lc.registry().active_ids(), vec![a]);
    }

    #[test]
    fn unknown_and_resolved_objects_cannot_activate() {
        let (mut lc, mut presenter) = lifecycle(2, 3);
        let a = ids(&lc)[0];
        assert_eq!(
            lc.on_proximity(ChallengeId(u64::MAX), &mut presenter),
            Activation::Ignored(Ignored::UnknownObject)
        );

        lc.on_proximity(a, &mut presenter);
        let pick = region(&lc, true);
        lc.on_answer_selected(pick, &mut presenter);
        assert_eq!(lc.on_proximity(a, &mut presenter), Activation::Ignored(Ignored::NotIdle));
        assert_eq!(lc.active(), None);
    }

    #[test]
    fn stale_selection_never_touches_score_or_lives() {
        let (mut lc, mut presenter) = lifecycle(2, 3);
        let all = ids(&lc);
        let (a, b) = (all[0], all[1]);
        let before = *lc.progress();

        let nothing_active = RegionId { object: a, index: 0 };
        assert_eq!(
            lc.on_answer_selected(nothing_active, &mut presenter),
            Resolution::Ignored(Ignored::NoActiveChallenge)
        );

        lc.on_proximity(a, &mut presenter);
        for index in 0..4 {
            assert_eq!(
                lc.on_answer_selected(RegionId { object: b, index }, &mut presenter),
                Resolution::Ignored(Ignored::NotActiveChallenge)
            );
        }
        assert_eq!(
            lc.on_answer_selected(RegionId { object: a, index: 17 }, &mut presenter),
            Resolution::Ignored(Ignored::RegionOutOfRange)
        );
        assert_eq!(*lc.progress(), before);
        assert_eq!(lc.active(), Some(a));
    }

    #[test]
    fn correct_answer_scores_and_resolves_in_order() {
        let (mut lc, mut presenter) = lifecycle(2, 3);
        let a = ids(&lc)[0];
        lc.on_proximity(a, &mut presenter);
        let question_id = lc.overlay().unwrap().regions[0].question_id.clone();
        presenter.drain();

        let pick = region(&lc, true);
        assert_eq!(
            lc.on_answer_selected(pick, &mut presenter),
            Resolution::Correct { score: 10, batch_exhausted: false }
        );
        assert_eq!(lc.solved().get(&question_id), Some(&true));
        assert_eq!(lc.registry().get(a).unwrap().state, ChallengeState::Resolved);
        assert!(lc.overlay().is_none());

        let commands = presenter.drain();
        let tail: Vec<&PresentationCommand> = commands.iter().skip(2).collect();
        assert!(matches!(commands[0], PresentationCommand::Feedback { feedback: Feedback::Scored { amount: 10, score: 10, .. } }));
        assert_eq!(commands[1], PresentationCommand::Hud { score: 10, lives: 3 });
        assert_eq!(tail, vec![&PresentationCommand::ClearOverlay, &PresentationCommand::RemoveObject { id: a }]);
    }

    #[test]
    fn wrong_answer_costs_a_life() {
        let (mut lc, mut presenter) = lifecycle(2, 3);
        let a = ids(&lc)[0];
        lc.on_proximity(a, &mut presenter);
        let pick = region(&lc, false);

        assert_eq!(
            lc.on_answer_selected(pick, &mut presenter),
            Resolution::Incorrect { lives: 2, batch_exhausted: false }
        );
        assert_eq!(lc.progress().score(), 0);
        assert!(presenter
            .commands()
            .iter()
            .any(|c| matches!(c, PresentationCommand::Feedback { feedback: Feedback::Damaged { lives: 2, .. } })));
    }

    #[test]
    fn wrong_answer_on_last_life_mutates_nothing() {
        let (mut lc, mut presenter) = lifecycle(1, 1);
        let a = ids(&lc)[0];
        lc.on_proximity(a, &mut presenter);
        presenter.drain();

        let pick = region(&lc, false);
        assert_eq!(
            lc.on_answer_selected(pick, &mut presenter),
            Resolution::LivesExhausted { score: 0 }
        );
        assert_eq!(lc.progress().lives(), 1);
        assert_eq!(lc.active(), Some(a));
        assert!(lc.overlay().is_some());
        assert!(presenter.commands().is_empty());
    }

    #[test]
    fn teardown_after_last_life_clears_the_lingering_overlay() {
        let (mut lc, mut presenter) = lifecycle(2, 1);
        let all = ids(&lc);
        lc.on_proximity(all[0], &mut presenter);
        let pick = region(&lc, false);
        lc.on_answer_selected(pick, &mut presenter);
        presenter.drain();

        lc.teardown(&mut presenter);
        assert_eq!(
            presenter.drain(),
            vec![PresentationCommand::DespawnObjects { ids: all }, PresentationCommand::ClearOverlay]
        );
        assert_eq!(lc.active(), None);
        assert!(lc.overlay().is_none());
        assert_eq!(lc.registry().len(), 0);
        assert!(lc.invariants_hold());
    }

    #[test]
    fn teardown_without_overlay_only_despawns() {
        let (mut lc, mut presenter) = lifecycle(2, 3);
        presenter.drain();

        lc.teardown(&mut presenter);
        let commands = presenter.drain();
        assert!(matches!(commands.as_slice(), [PresentationCommand::DespawnObjects { ids }] if ids.len() == 2));
    }

    #[test]
    fn resolving_the_last_object_reports_exhaustion() {
        let (mut lc, mut presenter) = lifecycle(1, 3);
        let a = ids(&lc)[0];
        lc.on_proximity(a, &mut presenter);
        let pick = region(&lc, false);

        let resolution = lc.on_answer_selected(pick, &mut presenter);
        assert!(resolution.batch_exhausted());
        assert_eq!(lc.registry().count_remaining(), 0);
    }

    #[test]
    fn regenerate_replaces_the_batch_with_fresh_ids() {
        let (mut lc, mut presenter) = lifecycle(3, 3);
        let old = ids(&lc);
        for id in &old {
            lc.on_proximity(*id, &mut presenter);
            let pick = region(&lc, true);
            lc.on_answer_selected(pick, &mut presenter);
        }
        assert_eq!(lc.registry().count_remaining(), 0);

        lc.regenerate(&mut presenter);
        let new = ids(&lc);
        assert_eq!(lc.registry().count_remaining(), 3);
        assert!(new.iter().all(|id| !old.contains(id)));
        assert_eq!(lc.progress().score(), 30);
    }

    #[test]
    fn single_active_invariant_holds_under_random_traffic() {
        use rand::Rng;
        let (mut lc, mut presenter) = lifecycle(4, 50);
        let mut rng = StdRng::seed_from_u64(11);

        for _ in 0..500 {
            let pool = ids(&lc);
            if rng.gen_bool(0.6) {
                let target = pool[rng.gen_range(0..pool.len())];
                lc.on_proximity(target, &mut presenter);
            } else {
                let object = pool[rng.gen_range(0..pool.len())];
                let index = rng.gen_range(0..5);
                let before = lc.progress().score();
                let resolution = lc.on_answer_selected(RegionId { object, index }, &mut presenter);
                assert!(lc.progress().score() >= before);
                if matches!(resolution, Resolution::LivesExhausted { .. }) {
                    break;
                }
            }
            assert!(lc.invariants_hold());
            assert!(lc.registry().active_ids().len() <= 1);
            if lc.registry().count_remaining() == 0 {
                lc.regenerate(&mut presenter);
            }
        }
    }
}
