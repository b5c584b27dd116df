//! Built-in question bank used when no TOML config supplies one.

use crate::domain::Question;

fn q(id: &str, prompt: &str, answers: [&str; 4], correct: &str) -> Question {
    Question {
        id: id.into(),
        prompt: prompt.into(),
        candidate_answers: answers.iter().map(|a| a.to_string()).collect(),
        correct_answer: correct.into(),
    }
}

/// Minimal set of questions that keeps the game playable without config.
pub fn seed_questions() -> Vec<Question> {
    vec![
        q("1", "Which animal says \"meow\"?", ["cat", "dog", "mouse", "rat"], "cat"),
        q("2", "I ... happy today.", ["am", "is", "was", "are"], "am"),
        q("3", "She ... to school every day.", ["go", "goes", "going", "gone"], "goes"),
        q("4", "Which one lives in the sea?", ["camel", "eagle", "octopus", "lion"], "octopus"),
        q("5", "They ... playing football now.", ["is", "am", "be", "are"], "are"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeds_are_well_formed() {
        for question in seed_questions() {
            assert!(question.candidate_answers.len() >= 2, "{}", question.id);
            assert!(question.candidate_answers.contains(&question.correct_answer), "{}", question.id);
        }
    }
}
