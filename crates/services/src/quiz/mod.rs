mod service;
mod session;

// Public API of the quiz subsystem.
pub use crate::error::{QuizError, QuizSessionError};
pub use service::{AdvanceOutcome, QuizService};
pub use session::{AnswerStatus, QuizPhase, QuizProgress, QuizSession};
