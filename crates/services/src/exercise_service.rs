use std::sync::Arc;

use profe_core::model::{
    Exercise, ExerciseStatus, ProficiencyLevel, Scenario, UserId, UserProfile, catalog_status,
    find_exercise,
};

use crate::ai::{FeedbackRequest, FeedbackResult, PromptFlows};
use crate::error::ExerciseError;
use crate::progress::ProgressService;

/// Graded response to one exercise scenario.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExerciseCheck {
    pub feedback: String,
    pub is_correct: bool,
    pub corrected: Option<String>,
}

/// Grades scenario responses and tracks exercise completion.
#[derive(Clone)]
pub struct ExerciseService {
    flows: PromptFlows,
    progress: Arc<ProgressService>,
}

impl ExerciseService {
    #[must_use]
    pub fn new(flows: PromptFlows, progress: Arc<ProgressService>) -> Self {
        Self { flows, progress }
    }

    /// Look up a catalog entry.
    ///
    /// # Errors
    ///
    /// Returns `ExerciseError::UnknownExercise` for ids outside the catalog.
    pub fn find(&self, id: &str) -> Result<&'static Exercise, ExerciseError> {
        find_exercise(id.trim()).ok_or_else(|| ExerciseError::UnknownExercise(id.to_owned()))
    }

    /// Every catalog entry with completion and lock flags for `profile`.
    #[must_use]
    pub fn catalog_view(&self, profile: Option<&UserProfile>) -> Vec<ExerciseStatus> {
        catalog_status(profile)
    }

    /// Grade a written response to `scenario`.
    ///
    /// A response is correct when the tutor proposes no correction.
    ///
    /// # Errors
    ///
    /// Returns `ExerciseError::EmptyResponse` for blank input, or
    /// `ExerciseError::Generation` if the feedback flow fails.
    pub async fn check_response(
        &self,
        scenario: &Scenario,
        response: &str,
        level: ProficiencyLevel,
    ) -> Result<ExerciseCheck, ExerciseError> {
        if response.trim().is_empty() {
            return Err(ExerciseError::EmptyResponse);
        }

        let request = FeedbackRequest::Grammar {
            question: format!("{}\n{}", scenario.situation, scenario.question),
            answer: response.trim().to_owned(),
            level,
        };
        match self.flows.provide_feedback(&request).await? {
            FeedbackResult::GrammarFeedback {
                feedback,
                corrected_answer,
            } => Ok(ExerciseCheck {
                feedback,
                is_correct: corrected_answer.is_none(),
                corrected: corrected_answer,
            }),
            FeedbackResult::ConversationalReply { .. } => Err(ExerciseError::UnexpectedReply),
        }
    }

    /// Look up an exercise `uid` may work on now. Call before presenting any
    /// scenario.
    ///
    /// # Errors
    ///
    /// Returns `ExerciseError::UnknownExercise`, `ExerciseError::Locked` when its
    /// predecessor is not completed yet, or `ExerciseError::Store`.
    pub async fn open(&self, uid: &UserId, id: &str) -> Result<&'static Exercise, ExerciseError> {
        let exercise = self.find(id)?;
        let profile = self.progress.profile(uid).await?;

        let locked = catalog_status(Some(&profile))
            .iter()
            .any(|status| status.exercise.id == exercise.id && status.locked);
        if locked {
            return Err(ExerciseError::Locked(exercise.id.to_owned()));
        }
        Ok(exercise)
    }

    /// Mark an exercise as completed for `uid`.
    ///
    /// Returns `false` if it was already completed.
    ///
    /// # Errors
    ///
    /// Same as [`ExerciseService::open`].
    pub async fn complete(&self, uid: &UserId, id: &str) -> Result<bool, ExerciseError> {
        let exercise = self.open(uid, id).await?;
        Ok(self
            .progress
            .mark_exercise_complete(uid, &exercise.exercise_id())
            .await?)
    }
}
