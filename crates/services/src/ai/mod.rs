//! Prompt flows and the model clients behind them.

mod client;
mod flow;
pub mod flows;
mod prompt;

pub use client::{AudioPayload, CompletionRequest, LlmClient, OpenAiClient, SpeechSynthesizer};
pub use flow::PromptFlows;
pub use flows::{
    Correction, FeedbackRequest, FeedbackResult, ProficiencyInput, QuizRequest, SpeechRequest,
};
pub use prompt::{PromptTemplate, parse_reply, strip_code_fences};
