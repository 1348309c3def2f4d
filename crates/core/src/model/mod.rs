mod chat;
pub mod exercise;
mod ids;
mod level;
mod profile;
mod quiz;

pub use chat::{AudioState, ChatMessage, ChatRole};
pub use exercise::{CATALOG, Exercise, ExerciseStatus, Scenario, catalog_status, find_exercise};
pub use ids::{AudioRef, ExerciseId, IdError, MessageId, UserId};
pub use level::{LevelParseError, LevelRange, ProficiencyLevel};
pub use profile::{ProfileSeed, UserProfile};
pub use quiz::{
    ProficiencyResult, ProficiencyResultError, QuizHistoryEntry, QuizQuestion, QuizQuestionError,
    TRANSCRIPT_SEPARATOR, UserAnswer, answers_transcript,
};
