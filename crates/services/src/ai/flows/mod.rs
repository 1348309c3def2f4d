mod correction;
mod feedback;
mod proficiency;
mod quiz;
mod speech;

pub use correction::Correction;
pub use feedback::{FeedbackRequest, FeedbackResult, OPEN_CONVERSATION};
pub use proficiency::ProficiencyInput;
pub use quiz::{DEFAULT_QUESTION_COUNT, DEFAULT_QUIZ_TOPIC, QUESTION_COUNT_RANGE, QuizRequest};
pub use speech::SpeechRequest;
