use std::sync::Arc;

use rand::rng;

use profe_core::model::{ProficiencyResult, UserAnswer, UserId};

use super::session::{QuizPhase, QuizSession};
use crate::ai::{ProficiencyInput, PromptFlows, QuizRequest};
use crate::error::{QuizError, QuizSessionError};
use crate::progress::ProgressService;

/// What happened after advancing past an answered question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdvanceOutcome {
    NextQuestion,
    Finished(ProficiencyResult),
}

/// Drives a [`QuizSession`] through the generation and analysis flows.
#[derive(Clone)]
pub struct QuizService {
    flows: PromptFlows,
    progress: Arc<ProgressService>,
    request: QuizRequest,
    shuffle_options: bool,
}

impl QuizService {
    #[must_use]
    pub fn new(flows: PromptFlows, progress: Arc<ProgressService>) -> Self {
        Self {
            flows,
            progress,
            request: QuizRequest::default(),
            shuffle_options: false,
        }
    }

    #[must_use]
    pub fn with_request(mut self, request: QuizRequest) -> Self {
        self.request = request;
        self
    }

    #[must_use]
    pub fn with_shuffle_options(mut self, shuffle_options: bool) -> Self {
        self.shuffle_options = shuffle_options;
        self
    }

    #[must_use]
    pub fn request(&self) -> &QuizRequest {
        &self.request
    }

    /// Generate questions and move the session to `Ongoing`.
    ///
    /// On failure the session stays `Loading` with the error recorded.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::Generation` when the flow fails, or
    /// `QuizError::Session` if the session already started.
    pub async fn load_questions(&self, session: &mut QuizSession) -> Result<(), QuizError> {
        if session.phase() != QuizPhase::Loading {
            return Err(QuizSessionError::Finished.into());
        }

        let mut questions = match self.flows.generate_quiz_questions(&self.request).await {
            Ok(questions) => questions,
            Err(e) => {
                session.record_error(e.to_string());
                return Err(e.into());
            }
        };

        if self.shuffle_options {
            let mut rng = rng();
            for question in &mut questions {
                question.shuffle_options(&mut rng);
            }
        }

        tracing::info!(count = questions.len(), range = %self.request.range, "quiz loaded");
        session.start(questions)?;
        Ok(())
    }

    /// Record `selected` for the current question.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::Session` for answers out of turn or unknown options.
    pub fn answer(&self, session: &mut QuizSession, selected: &str) -> Result<UserAnswer, QuizError> {
        Ok(session.submit(selected)?.clone())
    }

    /// Advance; after the last question, analyze the answers and persist the
    /// result for `user` when one is signed in.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::Session` when the current question is unanswered,
    /// `QuizError::Generation` when analysis fails (the session stays finished
    /// without a result), or `QuizError::Store` when persisting fails (the
    /// result is kept on the session).
    pub async fn advance(
        &self,
        session: &mut QuizSession,
        user: Option<&UserId>,
    ) -> Result<AdvanceOutcome, QuizError> {
        match session.advance()? {
            QuizPhase::Finished => self.analyze(session, user).await.map(AdvanceOutcome::Finished),
            _ => Ok(AdvanceOutcome::NextQuestion),
        }
    }

    /// Re-run the analysis of a finished quiz that has no result yet, or save a
    /// result whose earlier save failed. A result that is already saved is
    /// returned as is.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::Session` unless the quiz is finished, and the same
    /// analysis and persistence errors as [`QuizService::advance`].
    pub async fn retry_analysis(
        &self,
        session: &mut QuizSession,
        user: Option<&UserId>,
    ) -> Result<ProficiencyResult, QuizError> {
        if !session.is_finished() {
            return Err(QuizSessionError::NotStarted.into());
        }
        match session.result().cloned() {
            Some(result) if session.is_persisted() => Ok(result),
            Some(result) => {
                self.persist(session, user, &result).await?;
                Ok(result)
            }
            None => self.analyze(session, user).await,
        }
    }

    async fn analyze(
        &self,
        session: &mut QuizSession,
        user: Option<&UserId>,
    ) -> Result<ProficiencyResult, QuizError> {
        if session.answers().is_empty() {
            return Err(QuizSessionError::NoAnswers.into());
        }

        let input = ProficiencyInput::from_answers(session.answers());
        let result = match self.flows.analyze_proficiency(&input).await {
            Ok(result) => result,
            Err(e) => {
                session.record_error(e.to_string());
                return Err(e.into());
            }
        };
        session.set_result(result.clone());
        self.persist(session, user, &result).await?;
        Ok(result)
    }

    async fn persist(
        &self,
        session: &mut QuizSession,
        user: Option<&UserId>,
        result: &ProficiencyResult,
    ) -> Result<(), QuizError> {
        if let Some(uid) = user {
            let responses = ProficiencyInput::from_answers(session.answers()).quiz_responses;
            if let Err(e) = self.progress.record_quiz_result(uid, result, &responses).await {
                tracing::warn!(uid = %uid, error = %e, "quiz result not saved");
                session.record_error(e.to_string());
                return Err(e.into());
            }
        }
        session.mark_persisted();
        Ok(())
    }
}
