use profe_core::model::{ProficiencyResult, QuizQuestion, UserAnswer};

use crate::error::QuizSessionError;

//
// ─── PHASES ────────────────────────────────────────────────────────────────────
//

/// Lifecycle of a placement quiz.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QuizPhase {
    #[default]
    Loading,
    Ongoing,
    Finished,
}

/// Status of the current question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AnswerStatus {
    #[default]
    Unanswered,
    Correct,
    Incorrect,
}

/// Snapshot of how far the learner is through the quiz.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuizProgress {
    pub total: usize,
    pub answered: usize,
    pub remaining: usize,
}

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

/// State holder for one quiz run.
///
/// Starts in `Loading`; questions arrive through [`QuizSession::start`]. Answers
/// are kept in submission order and never rewritten.
#[derive(Debug, Clone, Default)]
pub struct QuizSession {
    phase: QuizPhase,
    questions: Vec<QuizQuestion>,
    current: usize,
    status: AnswerStatus,
    answers: Vec<UserAnswer>,
    result: Option<ProficiencyResult>,
    persisted: bool,
    last_error: Option<String>,
}

impl QuizSession {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn phase(&self) -> QuizPhase {
        self.phase
    }

    #[must_use]
    pub fn questions(&self) -> &[QuizQuestion] {
        &self.questions
    }

    #[must_use]
    pub fn current_index(&self) -> usize {
        self.current
    }

    #[must_use]
    pub fn current_question(&self) -> Option<&QuizQuestion> {
        match self.phase {
            QuizPhase::Ongoing => self.questions.get(self.current),
            _ => None,
        }
    }

    #[must_use]
    pub fn status(&self) -> AnswerStatus {
        self.status
    }

    #[must_use]
    pub fn answers(&self) -> &[UserAnswer] {
        &self.answers
    }

    #[must_use]
    pub fn result(&self) -> Option<&ProficiencyResult> {
        self.result.as_ref()
    }

    /// Whether the result has been written to the learner's progress. A quiz
    /// taken without a signed-in user counts as persisted once it has a result.
    #[must_use]
    pub fn is_persisted(&self) -> bool {
        self.persisted
    }

    /// Message of the most recent failed step, cleared by the next success.
    #[must_use]
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.phase == QuizPhase::Finished
    }

    #[must_use]
    pub fn progress(&self) -> QuizProgress {
        QuizProgress {
            total: self.questions.len(),
            answered: self.answers.len(),
            remaining: self.questions.len().saturating_sub(self.answers.len()),
        }
    }

    /// Move from `Loading` to `Ongoing` with the given questions.
    ///
    /// # Errors
    ///
    /// Returns `QuizSessionError::Finished` if the quiz already ran, or
    /// `QuizSessionError::NotStarted` when `questions` is empty.
    pub fn start(&mut self, questions: Vec<QuizQuestion>) -> Result<(), QuizSessionError> {
        if self.phase != QuizPhase::Loading {
            return Err(QuizSessionError::Finished);
        }
        if questions.is_empty() {
            return Err(QuizSessionError::NotStarted);
        }
        self.questions = questions;
        self.current = 0;
        self.status = AnswerStatus::Unanswered;
        self.phase = QuizPhase::Ongoing;
        self.last_error = None;
        Ok(())
    }

    pub(crate) fn record_error(&mut self, message: impl Into<String>) {
        self.last_error = Some(message.into());
    }

    /// Record an answer for the current question.
    ///
    /// # Errors
    ///
    /// Returns `QuizSessionError` when the quiz is not ongoing, the question was
    /// already answered, or `selected` is not one of its options.
    pub fn submit(&mut self, selected: &str) -> Result<&UserAnswer, QuizSessionError> {
        let question = match self.phase {
            QuizPhase::Loading => return Err(QuizSessionError::NotStarted),
            QuizPhase::Finished => return Err(QuizSessionError::Finished),
            QuizPhase::Ongoing => self
                .questions
                .get(self.current)
                .ok_or(QuizSessionError::Finished)?,
        };
        if self.status != AnswerStatus::Unanswered {
            return Err(QuizSessionError::AlreadyAnswered);
        }
        if !question.has_option(selected) {
            return Err(QuizSessionError::UnknownOption(selected.to_owned()));
        }

        let answer = UserAnswer::record(question, selected);
        self.status = if answer.is_correct() {
            AnswerStatus::Correct
        } else {
            AnswerStatus::Incorrect
        };
        self.answers.push(answer);
        Ok(&self.answers[self.answers.len() - 1])
    }

    /// Move to the next question, or to `Finished` after the last one.
    ///
    /// # Errors
    ///
    /// Returns `QuizSessionError::Unanswered` if the current question has no
    /// answer yet, or a phase error outside `Ongoing`.
    pub fn advance(&mut self) -> Result<QuizPhase, QuizSessionError> {
        match self.phase {
            QuizPhase::Loading => return Err(QuizSessionError::NotStarted),
            QuizPhase::Finished => return Err(QuizSessionError::Finished),
            QuizPhase::Ongoing => {}
        }
        if self.status == AnswerStatus::Unanswered {
            return Err(QuizSessionError::Unanswered);
        }

        if self.current + 1 < self.questions.len() {
            self.current += 1;
            self.status = AnswerStatus::Unanswered;
        } else {
            self.phase = QuizPhase::Finished;
        }
        Ok(self.phase)
    }

    pub(crate) fn set_result(&mut self, result: ProficiencyResult) {
        self.result = Some(result);
        self.persisted = false;
        self.last_error = None;
    }

    pub(crate) fn mark_persisted(&mut self) {
        self.persisted = true;
        self.last_error = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use profe_core::model::ProficiencyLevel;

    fn question(text: &str) -> QuizQuestion {
        QuizQuestion::new(
            text,
            "es",
            vec!["es".into(), "está".into(), "hay".into()],
            "Ser para identidad.",
        )
        .unwrap()
    }

    fn started(count: usize) -> QuizSession {
        let mut session = QuizSession::new();
        session
            .start((0..count).map(|i| question(&format!("Pregunta {i}"))).collect())
            .unwrap();
        session
    }

    #[test]
    fn new_session_is_loading() {
        let mut session = QuizSession::new();
        assert_eq!(session.phase(), QuizPhase::Loading);
        assert!(session.current_question().is_none());
        assert_eq!(session.submit("es"), Err(QuizSessionError::NotStarted));
        assert_eq!(session.advance(), Err(QuizSessionError::NotStarted));
        assert_eq!(session.start(Vec::new()), Err(QuizSessionError::NotStarted));
    }

    #[test]
    fn submit_marks_status_by_exact_match() {
        let mut session = started(2);
        let answer = session.submit("está").unwrap();
        assert!(!answer.is_correct());
        assert_eq!(session.status(), AnswerStatus::Incorrect);

        assert_eq!(session.submit("es"), Err(QuizSessionError::AlreadyAnswered));
        assert_eq!(session.advance(), Ok(QuizPhase::Ongoing));

        assert_eq!(
            session.submit("Es"),
            Err(QuizSessionError::UnknownOption("Es".into()))
        );
        assert!(session.submit("es").unwrap().is_correct());
        assert_eq!(session.status(), AnswerStatus::Correct);
    }

    #[test]
    fn advance_requires_an_answer_and_finishes_after_last() {
        let mut session = started(1);
        assert_eq!(session.advance(), Err(QuizSessionError::Unanswered));

        session.submit("es").unwrap();
        assert_eq!(session.advance(), Ok(QuizPhase::Finished));
        assert!(session.is_finished());
        assert!(session.current_question().is_none());
        assert_eq!(session.answers().len(), 1);
        assert_eq!(session.submit("es"), Err(QuizSessionError::Finished));
        assert_eq!(session.start(vec![question("otra")]), Err(QuizSessionError::Finished));
    }

    #[test]
    fn progress_tracks_answers() {
        let mut session = started(3);
        session.submit("hay").unwrap();
        assert_eq!(
            session.progress(),
            QuizProgress {
                total: 3,
                answered: 1,
                remaining: 2
            }
        );
    }

    #[test]
    fn new_result_is_unsaved_until_marked() {
        let mut session = started(1);
        session.submit("es").unwrap();
        session.advance().unwrap();
        assert!(!session.is_persisted());

        session.set_result(ProficiencyResult::new(ProficiencyLevel::A1, "Básico").unwrap());
        assert!(!session.is_persisted());
        session.record_error("offline");

        session.mark_persisted();
        assert!(session.is_persisted());
        assert!(session.last_error().is_none());
    }
}
