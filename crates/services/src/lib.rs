#![forbid(unsafe_code)]

pub mod ai;
pub mod app_services;
pub mod config;
pub mod error;
pub mod exercise_service;
pub mod identity;
pub mod progress;
pub mod quiz;
pub mod tutor;

pub use profe_core::Clock;

pub use ai::{
    AudioPayload, CompletionRequest, FeedbackRequest, FeedbackResult, LlmClient, OpenAiClient,
    PromptFlows, QuizRequest, SpeechSynthesizer,
};
pub use app_services::AppServices;
pub use config::{AiConfig, AppConfig, FirebaseConfig, FlowConfig};
pub use error::{
    AppServicesError, AuthError, ConfigError, ExerciseError, GenerationError, QuizError,
    QuizSessionError, StoreError, TutorError,
};
pub use exercise_service::{ExerciseCheck, ExerciseService};
pub use identity::{AuthChange, AuthSession, AuthSnapshot, AuthUser, IdentityProvider};
pub use progress::ProgressService;
pub use quiz::{AdvanceOutcome, QuizPhase, QuizService, QuizSession};
pub use tutor::{TutorPhase, TutorService, TutorSession};
