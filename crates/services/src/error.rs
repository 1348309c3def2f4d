//! Shared error types for the services crate.

use std::time::Duration;

use thiserror::Error;

use profe_core::model::{
    IdError, LevelParseError, ProficiencyResultError, QuizQuestionError,
};
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors emitted by prompt flows and the model clients behind them.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum GenerationError {
    #[error("the language model is not configured")]
    Disabled,
    #[error("invalid flow input: {0}")]
    InvalidInput(String),
    #[error("prompt template is missing variable `{0}`")]
    MissingVariable(String),
    #[error("the language model returned an empty response")]
    EmptyResponse,
    #[error("model request failed with status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("model reply is not valid JSON: {0}")]
    MalformedReply(#[from] serde_json::Error),
    #[error("model reply violates the expected shape: {0}")]
    InvalidReply(String),
    #[error("flow `{flow}` timed out after {after:?}")]
    Timeout { flow: &'static str, after: Duration },
    #[error(transparent)]
    Question(#[from] QuizQuestionError),
    #[error(transparent)]
    Result(#[from] ProficiencyResultError),
    #[error(transparent)]
    Level(#[from] LevelParseError),
}

/// Errors emitted by the identity gateway.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AuthError {
    #[error("identity service is not configured")]
    Disabled,
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("an account with this email already exists")]
    DuplicateAccount,
    #[error("password is too weak: {0}")]
    WeakPassword(String),
    #[error("session expired, sign in again")]
    SessionExpired,
    #[error("no user is signed in")]
    NotSignedIn,
    #[error("identity provider rejected the request: {0}")]
    Provider(String),
    #[error("identity request failed with status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error(transparent)]
    Id(#[from] IdError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Errors emitted by `ProgressService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StoreError {
    #[error("no profile stored for user {0}")]
    ProfileNotFound(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors raised by the quiz state holder itself.
#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuizSessionError {
    #[error("quiz questions are still loading")]
    NotStarted,
    #[error("quiz already finished")]
    Finished,
    #[error("current question was already answered")]
    AlreadyAnswered,
    #[error("current question has not been answered yet")]
    Unanswered,
    #[error("`{0}` is not one of the options")]
    UnknownOption(String),
    #[error("quiz has no recorded answers")]
    NoAnswers,
}

/// Errors emitted by `QuizService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum QuizError {
    #[error(transparent)]
    Session(#[from] QuizSessionError),
    #[error(transparent)]
    Generation(#[from] GenerationError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Errors emitted by `TutorService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TutorError {
    #[error("still waiting for the previous reply")]
    Busy,
    #[error("message is empty")]
    EmptyMessage,
    #[error("no such message in this conversation")]
    UnknownMessage,
    #[error("only tutor messages can be spoken")]
    NotSpeakable,
    #[error(transparent)]
    Generation(#[from] GenerationError),
}

/// Errors emitted by `ExerciseService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ExerciseError {
    #[error("unknown exercise `{0}`")]
    UnknownExercise(String),
    #[error("exercise `{0}` is locked")]
    Locked(String),
    #[error("response is empty")]
    EmptyResponse,
    #[error("exercise flow returned a conversational reply")]
    UnexpectedReply,
    #[error(transparent)]
    Generation(#[from] GenerationError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Errors raised while reading configuration.
#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("`{name}` has an invalid value: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}
