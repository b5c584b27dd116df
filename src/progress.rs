//! Player progress: score and lives. Only the lifecycle state machine holds a
//! mutable handle to it.

use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Progress {
    score: u32,
    lives: u32,
}

/// Outcome of a wrong answer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LifeLoss {
    Lost { remaining: u32 },
    /// The last life was at stake. Nothing was decremented.
    Exhausted,
}

impl Progress {
    pub fn new(lives: u32) -> Self {
        debug_assert!(lives > 0, "a session starts with at least one life");
        Self { score: 0, lives }
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn lives(&self) -> u32 {
        self.lives
    }

    pub(crate) fn award(&mut self, amount: u32) -> u32 {
        self.score = self.score.saturating_add(amount);
        self.score
    }

    pub(crate) fn lose_life(&mut self) -> LifeLoss {
        if self.lives <= 1 {
            return LifeLoss::Exhausted;
        }
        self.lives -= 1;
        LifeLoss::Lost { remaining: self.lives }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn award_accumulates() {
        let mut progress = Progress::new(3);
        assert_eq!(progress.award(10), 10);
        assert_eq!(progress.award(10), 20);
        assert_eq!(progress.lives(), 3);
    }

    #[test]
    fn award_saturates_instead_of_wrapping() {
        let mut progress = Progress::new(1);
        progress.award(u32::MAX);
        assert_eq!(progress.award(10), u32::MAX);
    }

    #[test]
    fn last_life_is_never_decremented() {
        let mut progress = Progress::new(2);
        assert_eq!(progress.lose_life(), LifeLoss::Lost { remaining: 1 });
        assert_eq!(progress.lose_life(), LifeLoss::Exhausted);
        assert_eq!(progress.lose_life(), LifeLoss::Exhausted);
        assert_eq!(progress.lives(), 1);
    }
}
