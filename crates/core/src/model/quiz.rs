use chrono::{DateTime, Utc};
use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

use crate::model::level::ProficiencyLevel;

/// Separator placed between answer transcripts sent for proficiency analysis.
pub const TRANSCRIPT_SEPARATOR: &str = "\n---\n";

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuizQuestionError {
    #[error("question text cannot be blank")]
    BlankQuestion,

    #[error("a question needs at least two options, got {0}")]
    TooFewOptions(usize),

    #[error("option is blank")]
    BlankOption,

    #[error("duplicate option: {0}")]
    DuplicateOption(String),

    #[error("answer {0:?} is not one of the options")]
    AnswerNotInOptions(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ProficiencyResultError {
    #[error("reasoning cannot be blank")]
    BlankReasoning,
}

//
// ─── QUIZ QUESTION ─────────────────────────────────────────────────────────────
//

/// A multiple-choice question whose answer is guaranteed to be one of its options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuizQuestion {
    question: String,
    answer: String,
    options: Vec<String>,
    feedback: String,
}

impl QuizQuestion {
    /// Build a validated question.
    ///
    /// # Errors
    ///
    /// Returns `QuizQuestionError` if the question is blank, options are fewer than
    /// two, blank or duplicated, or the answer is not among the options.
    pub fn new(
        question: impl Into<String>,
        answer: impl Into<String>,
        options: Vec<String>,
        feedback: impl Into<String>,
    ) -> Result<Self, QuizQuestionError> {
        let question = question.into();
        let answer = answer.into();

        if question.trim().is_empty() {
            return Err(QuizQuestionError::BlankQuestion);
        }
        if options.len() < 2 {
            return Err(QuizQuestionError::TooFewOptions(options.len()));
        }

        let mut seen = HashSet::with_capacity(options.len());
        for option in &options {
            if option.trim().is_empty() {
                return Err(QuizQuestionError::BlankOption);
            }
            if !seen.insert(option.as_str()) {
                return Err(QuizQuestionError::DuplicateOption(option.clone()));
            }
        }

        if !seen.contains(answer.as_str()) {
            return Err(QuizQuestionError::AnswerNotInOptions(answer));
        }

        Ok(Self {
            question,
            answer,
            options,
            feedback: feedback.into(),
        })
    }

    #[must_use]
    pub fn question(&self) -> &str {
        &self.question
    }

    #[must_use]
    pub fn answer(&self) -> &str {
        &self.answer
    }

    #[must_use]
    pub fn options(&self) -> &[String] {
        &self.options
    }

    #[must_use]
    pub fn feedback(&self) -> &str {
        &self.feedback
    }

    #[must_use]
    pub fn has_option(&self, candidate: &str) -> bool {
        self.options.iter().any(|o| o == candidate)
    }

    /// Shuffle the display order of the options. The option set is unchanged.
    pub fn shuffle_options<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.options.shuffle(rng);
    }
}

//
// ─── USER ANSWER ───────────────────────────────────────────────────────────────
//

/// One recorded answer. Only constructible through [`UserAnswer::record`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserAnswer {
    question: String,
    options: Vec<String>,
    selected_answer: String,
    correct_answer: String,
    is_correct: bool,
    feedback: String,
}

impl UserAnswer {
    /// Record `selected` against `question`. Correctness is exact string equality.
    #[must_use]
    pub fn record(question: &QuizQuestion, selected: impl Into<String>) -> Self {
        let selected_answer = selected.into();
        let is_correct = selected_answer == question.answer;
        Self {
            question: question.question.clone(),
            options: question.options.clone(),
            selected_answer,
            correct_answer: question.answer.clone(),
            is_correct,
            feedback: question.feedback.clone(),
        }
    }

    #[must_use]
    pub fn question(&self) -> &str {
        &self.question
    }

    #[must_use]
    pub fn options(&self) -> &[String] {
        &self.options
    }

    #[must_use]
    pub fn selected_answer(&self) -> &str {
        &self.selected_answer
    }

    #[must_use]
    pub fn correct_answer(&self) -> &str {
        &self.correct_answer
    }

    #[must_use]
    pub fn is_correct(&self) -> bool {
        self.is_correct
    }

    #[must_use]
    pub fn feedback(&self) -> &str {
        &self.feedback
    }

    /// `Q: ...\nA: ...` line pair used in the analysis transcript.
    #[must_use]
    pub fn transcript_entry(&self) -> String {
        format!("Q: {}\nA: {}", self.question, self.selected_answer)
    }
}

/// Join answers into the transcript sent for proficiency analysis, in submission order.
#[must_use]
pub fn answers_transcript(answers: &[UserAnswer]) -> String {
    answers
        .iter()
        .map(UserAnswer::transcript_entry)
        .collect::<Vec<_>>()
        .join(TRANSCRIPT_SEPARATOR)
}

//
// ─── RESULTS ───────────────────────────────────────────────────────────────────
//

/// Assessed level with the model's justification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProficiencyResult {
    level: ProficiencyLevel,
    reasoning: String,
}

impl ProficiencyResult {
    /// # Errors
    ///
    /// Returns `ProficiencyResultError::BlankReasoning` for blank reasoning.
    pub fn new(
        level: ProficiencyLevel,
        reasoning: impl Into<String>,
    ) -> Result<Self, ProficiencyResultError> {
        let reasoning = reasoning.into();
        if reasoning.trim().is_empty() {
            return Err(ProficiencyResultError::BlankReasoning);
        }
        Ok(Self { level, reasoning })
    }

    #[must_use]
    pub fn level(&self) -> ProficiencyLevel {
        self.level
    }

    #[must_use]
    pub fn reasoning(&self) -> &str {
        &self.reasoning
    }

    /// Replace the level, keeping the reasoning.
    #[must_use]
    pub fn with_level(mut self, level: ProficiencyLevel) -> Self {
        self.level = level;
        self
    }
}

/// One completed placement quiz, as stored in a user's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizHistoryEntry {
    pub level: ProficiencyLevel,
    pub reasoning: String,
    pub responses: String,
    pub completed_at: DateTime<Utc>,
}

impl QuizHistoryEntry {
    #[must_use]
    pub fn new(
        result: &ProficiencyResult,
        responses: impl Into<String>,
        completed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            level: result.level(),
            reasoning: result.reasoning().to_owned(),
            responses: responses.into(),
            completed_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| (*s).to_owned()).collect()
    }

    fn sample_question() -> QuizQuestion {
        QuizQuestion::new(
            "¿Cómo se dice 'hello'?",
            "Hola",
            options(&["Adiós", "Hola", "Gracias"]),
            "¡Muy bien!",
        )
        .unwrap()
    }

    #[test]
    fn question_requires_answer_in_options() {
        let err = QuizQuestion::new("Q", "C", options(&["A", "B"]), "").unwrap_err();
        assert_eq!(err, QuizQuestionError::AnswerNotInOptions("C".into()));
    }

    #[test]
    fn question_rejects_duplicates_and_short_option_lists() {
        assert_eq!(
            QuizQuestion::new("Q", "A", options(&["A", "A"]), "").unwrap_err(),
            QuizQuestionError::DuplicateOption("A".into())
        );
        assert_eq!(
            QuizQuestion::new("Q", "A", options(&["A"]), "").unwrap_err(),
            QuizQuestionError::TooFewOptions(1)
        );
        assert_eq!(
            QuizQuestion::new("  ", "A", options(&["A", "B"]), "").unwrap_err(),
            QuizQuestionError::BlankQuestion
        );
    }

    #[test]
    fn record_uses_exact_string_equality() {
        let question = sample_question();

        let right = UserAnswer::record(&question, "Hola");
        assert!(right.is_correct());
        assert_eq!(right.correct_answer(), "Hola");

        let wrong_case = UserAnswer::record(&question, "hola");
        assert!(!wrong_case.is_correct());
        assert_eq!(
            wrong_case.is_correct(),
            wrong_case.selected_answer() == wrong_case.correct_answer()
        );
    }

    #[test]
    fn transcript_joins_in_submission_order() {
        let question = sample_question();
        let answers = vec![
            UserAnswer::record(&question, "Hola"),
            UserAnswer::record(&question, "Adiós"),
        ];
        let transcript = answers_transcript(&answers);
        assert_eq!(
            transcript,
            "Q: ¿Cómo se dice 'hello'?\nA: Hola\n---\nQ: ¿Cómo se dice 'hello'?\nA: Adiós"
        );
    }

    #[test]
    fn shuffle_keeps_option_set() {
        use rand::SeedableRng;
        use rand::rngs::StdRng;

        let original = sample_question();
        let mut expected = original.options().to_vec();
        expected.sort();

        for seed in 0..8 {
            let mut question = original.clone();
            question.shuffle_options(&mut StdRng::seed_from_u64(seed));
            let mut shuffled = question.options().to_vec();
            shuffled.sort();
            assert_eq!(shuffled, expected);
            assert!(question.has_option(question.answer()));
        }
    }

    #[test]
    fn result_rejects_blank_reasoning() {
        assert_eq!(
            ProficiencyResult::new(ProficiencyLevel::B1, " ").unwrap_err(),
            ProficiencyResultError::BlankReasoning
        );
    }
}
