//! Question bank: a fixed, insertion-ordered set of questions validated once
//! at construction. Picking draws uniformly with replacement.

use std::{collections::HashSet, sync::Arc};

use rand::Rng;
use tracing::info;

use crate::domain::Question;
use crate::error::ConfigError;

#[derive(Clone, Debug)]
pub struct QuestionBank {
    questions: Vec<Arc<Question>>,
}

impl QuestionBank {
    /// Validate and freeze the bank. Rejects empty banks and malformed entries.
    pub fn new(questions: Vec<Question>) -> Result<Self, ConfigError> {
        if questions.is_empty() {
            return Err(ConfigError::EmptyBank);
        }

        let mut seen = HashSet::new();
        for question in &questions {
            validate_question(question)?;
            if !seen.insert(question.id.as_str()) {
                return Err(ConfigError::DuplicateQuestion(question.id.clone()));
            }
        }

        info!(target: "challenge", questions = questions.len(), "Question bank loaded");
        Ok(Self {
            questions: questions.into_iter().map(Arc::new).collect(),
        })
    }

    /// Uniform draw with replacement.
    pub fn pick<R: Rng>(&self, rng: &mut R) -> Arc<Question> {
        // Non-empty by construction, so the range is never empty.
        let index = rng.gen_range(0..self.questions.len());
        Arc::clone(&self.questions[index])
    }

    #[cfg(test)]
    pub fn get(&self, id: &str) -> Option<Arc<Question>> {
        self.questions.iter().find(|q| q.id == id).cloned()
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Question>> {
        self.questions.iter()
    }
}

fn validate_question(q: &Question) -> Result<(), ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidQuestion {
        id: q.id.clone(),
        reason: reason.to_string(),
    };

    if q.id.trim().is_empty() {
        return Err(invalid("missing id"));
    }
    if q.prompt.trim().is_empty() {
        return Err(invalid("empty prompt"));
    }
    if q.candidate_answers.len() < 2 {
        return Err(invalid("needs at least two candidate answers"));
    }
    if !q.candidate_answers.contains(&q.correct_answer) {
        return Err(invalid("correct answer is not one of the candidates"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seeds::seed_questions;
    use rand::{rngs::StdRng, SeedableRng};

    fn question(id: &str, answers: &[&str], correct: &str) -> Question {
        Question {
            id: id.into(),
            prompt: "pick one".into(),
            candidate_answers: answers.iter().map(|a| a.to_string()).collect(),
            correct_answer: correct.into(),
        }
    }

    #[test]
    fn empty_bank_is_rejected() {
        assert_eq!(QuestionBank::new(vec![]).unwrap_err(), ConfigError::EmptyBank);
    }

    #[test]
    fn correct_answer_must_be_a_candidate() {
        let err = QuestionBank::new(vec![question("q", &["a", "b"], "c")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidQuestion { ref id, .. } if id == "q"));
    }

    #[test]
    fn single_candidate_is_rejected() {
        let err = QuestionBank::new(vec![question("q", &["a"], "a")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidQuestion { .. }));
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let err = QuestionBank::new(vec![
            question("q", &["a", "b"], "a"),
            question("q", &["c", "d"], "d"),
        ])
        .unwrap_err();
        assert_eq!(err, ConfigError::DuplicateQuestion("q".into()));
    }

    #[test]
    fn pick_only_returns_bank_members() {
        let bank = QuestionBank::new(seed_questions()).unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..100 {
            let picked = bank.pick(&mut rng);
            assert!(bank.get(&picked.id).is_some());
        }
    }

    #[test]
    fn pick_covers_the_whole_bank() {
        let bank = QuestionBank::new(seed_questions()).unwrap();
        let mut rng = StdRng::seed_from_u64(42);
        let seen: HashSet<String> = (0..500).map(|_| bank.pick(&mut rng).id.clone()).collect();
        assert_eq!(seen.len(), bank.len());
    }

    #[test]
    fn bank_preserves_insertion_order() {
        let bank = QuestionBank::new(seed_questions()).unwrap();
        let ids: Vec<&str> = bank.iter().map(|q| q.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "3", "4", "5"]);
    }
}
