//! Challenge object registry: the pool of world-placed boxes for the current
//! batch and their per-object metadata.
//!
//! Identifiers come from a process-wide counter, so an id handed out before a
//! `destroy_batch` (or before a restart) can never name a later object.

use std::sync::atomic::{AtomicU64, Ordering};

use rand::Rng;
use tracing::debug;

use crate::bank::QuestionBank;
use crate::domain::{ChallengeId, ChallengeObject, ChallengeState, Position};

/// Placement function for a batch. Geometry beyond "non-overlapping and
/// reachable" is the layout's business.
pub trait Layout {
    fn place(&self, index: usize, count: usize) -> Position;
}

impl<F> Layout for F
where
    F: Fn(usize, usize) -> Position,
{
    fn place(&self, index: usize, count: usize) -> Position {
        self(index, count)
    }
}

/// Boxes in a single horizontal row.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RowLayout {
    pub origin: Position,
    pub step_x: f32,
}

impl Default for RowLayout {
    fn default() -> Self {
        Self {
            origin: Position::new(300.0, 500.0),
            step_x: 400.0,
        }
    }
}

impl Layout for RowLayout {
    fn place(&self, index: usize, _count: usize) -> Position {
        Position::new(self.origin.x + self.step_x * index as f32, self.origin.y)
    }
}

static NEXT_OBJECT_ID: AtomicU64 = AtomicU64::new(1);

fn next_object_id() -> ChallengeId {
    ChallengeId(NEXT_OBJECT_ID.fetch_add(1, Ordering::Relaxed))
}

#[derive(Debug, Default)]
pub struct ChallengeRegistry {
    objects: Vec<ChallengeObject>,
}

impl ChallengeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create `count` idle objects, each with a freshly drawn question.
    pub fn spawn_batch<L, R>(
        &mut self,
        count: usize,
        layout: &L,
        bank: &QuestionBank,
        rng: &mut R,
    ) -> &[ChallengeObject]
    where
        L: Layout + ?Sized,
        R: Rng,
    {
        let start = self.objects.len();
        for index in 0..count {
            let object = ChallengeObject {
                id: next_object_id(),
                position: layout.place(index, count),
                question: bank.pick(rng),
                state: ChallengeState::Idle,
            };
            debug!(target: "challenge", id = %object.id, question = %object.question.id, "Spawned challenge object");
            self.objects.push(object);
        }
        &self.objects[start..]
    }

    /// Remove every object regardless of state and hand them back for cleanup.
    pub fn destroy_batch(&mut self) -> Vec<ChallengeObject> {
        debug!(target: "challenge", destroyed = self.objects.len(), "Destroying challenge batch");
        std::mem::take(&mut self.objects)
    }

    /// Objects that are not yet resolved.
    pub fn count_remaining(&self) -> usize {
        self.objects
            .iter()
            .filter(|o| o.state != ChallengeState::Resolved)
            .count()
    }

    pub fn get(&self, id: ChallengeId) -> Option<&ChallengeObject> {
        self.objects.iter().find(|o| o.id == id)
    }

    pub fn get_mut(&mut self, id: ChallengeId) -> Option<&mut ChallengeObject> {
        self.objects.iter_mut().find(|o| o.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChallengeObject> {
        self.objects.iter()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Ids of every object currently tagged `Active`.
    pub fn active_ids(&self) -> Vec<ChallengeId> {
        self.objects
            .iter()
            .filter(|o| o.state == ChallengeState::Active)
            .map(|o| o.id)
            .collect()
    }
}
