use serde::Deserialize;

use profe_core::model::ProficiencyLevel;

use crate::ai::client::CompletionRequest;
use crate::ai::flow::{PromptFlows, require_text};
use crate::ai::prompt::{PromptTemplate, parse_reply};
use crate::error::GenerationError;

const FLOW: &str = "provide-automated-feedback";

/// Question text legacy callers send to request conversation mode.
pub const OPEN_CONVERSATION: &str = "Conversación abierta";
const OPEN_CONVERSATION_EN: &str = "open conversation";

const GRAMMAR_TEMPLATE: PromptTemplate = PromptTemplate::new(
    "feedback-grammar",
    "You are a language tutor. Your response MUST be in {{language}}.
You are giving feedback to a student at level {{level}}.

Question: {{question}}
Answer: {{answer}}

Give extensive and detailed feedback, highlighting any errors and suggesting improvements. If \
the answer contains errors, also give a corrected answer. Be encouraging but thorough. Speak \
directly to the student. Do not refer to yourself as an AI.

Reply with a JSON object: {\"feedback\": \"...\", \"correctedAnswer\": \"...\"}. Omit \
\"correctedAnswer\" or leave it empty when the answer has no errors.",
);

const CONVERSATION_TEMPLATE: PromptTemplate = PromptTemplate::new(
    "feedback-conversation",
    "You are a friendly conversation partner. The learner, at level {{level}}, wants to practice \
{{language}}. Keep a natural conversation going, in {{language}}, adapted to their level.

Learner's message: {{message}}

Reply with a JSON object: {\"reply\": \"...\"} containing only the text that continues the \
conversation.",
);

/// Input of the feedback flow. The caller picks the mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedbackRequest {
    Grammar {
        question: String,
        answer: String,
        level: ProficiencyLevel,
    },
    Conversation {
        message: String,
        level: ProficiencyLevel,
    },
}

impl FeedbackRequest {
    /// Build a request from a raw question, honouring the open-conversation marker.
    #[must_use]
    pub fn classify(
        question: impl Into<String>,
        answer: impl Into<String>,
        level: ProficiencyLevel,
    ) -> Self {
        let question = question.into();
        if is_open_conversation(&question) {
            Self::Conversation {
                message: answer.into(),
                level,
            }
        } else {
            Self::Grammar {
                question,
                answer: answer.into(),
                level,
            }
        }
    }

    #[must_use]
    pub fn level(&self) -> ProficiencyLevel {
        match self {
            Self::Grammar { level, .. } | Self::Conversation { level, .. } => *level,
        }
    }
}

fn is_open_conversation(question: &str) -> bool {
    let q = question.trim().to_lowercase();
    q == OPEN_CONVERSATION.to_lowercase() || q == OPEN_CONVERSATION_EN
}

/// Output of the feedback flow, tagged by mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedbackResult {
    GrammarFeedback {
        feedback: String,
        corrected_answer: Option<String>,
    },
    ConversationalReply {
        text: String,
    },
}

impl FeedbackResult {
    /// Text to show the learner in either mode.
    #[must_use]
    pub fn text(&self) -> &str {
        match self {
            Self::GrammarFeedback { feedback, .. } => feedback,
            Self::ConversationalReply { text } => text,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GrammarReply {
    feedback: String,
    #[serde(default)]
    corrected_answer: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ConversationReply {
    #[serde(alias = "feedback")]
    reply: String,
}

impl PromptFlows {
    /// Grade an answer or continue a conversation, depending on the request mode.
    ///
    /// # Errors
    ///
    /// Returns `GenerationError` for blank input, model failures or an empty reply.
    pub async fn provide_feedback(
        &self,
        request: &FeedbackRequest,
    ) -> Result<FeedbackResult, GenerationError> {
        match request {
            FeedbackRequest::Grammar {
                question,
                answer,
                level,
            } => {
                require_text("question", question)?;
                require_text("answer", answer)?;
                self.run(FLOW, self.grammar_feedback(question, answer, *level))
                    .await
            }
            FeedbackRequest::Conversation { message, level } => {
                require_text("message", message)?;
                self.run(FLOW, self.conversation_reply(message, *level)).await
            }
        }
    }

    async fn grammar_feedback(
        &self,
        question: &str,
        answer: &str,
        level: ProficiencyLevel,
    ) -> Result<FeedbackResult, GenerationError> {
        let prompt = GRAMMAR_TEMPLATE.render(&[
            ("language", self.language()),
            ("level", level.as_str()),
            ("question", question.trim()),
            ("answer", answer.trim()),
        ])?;
        let reply = self.llm.complete(&CompletionRequest::json(FLOW, prompt)).await?;
        let parsed: GrammarReply = parse_reply(&reply)?;

        let feedback = parsed.feedback.trim();
        if feedback.is_empty() {
            return Err(GenerationError::InvalidReply("feedback is empty".into()));
        }
        Ok(FeedbackResult::GrammarFeedback {
            feedback: feedback.to_owned(),
            corrected_answer: normalize_correction(parsed.corrected_answer, answer),
        })
    }

    async fn conversation_reply(
        &self,
        message: &str,
        level: ProficiencyLevel,
    ) -> Result<FeedbackResult, GenerationError> {
        let prompt = CONVERSATION_TEMPLATE.render(&[
            ("language", self.language()),
            ("level", level.as_str()),
            ("message", message.trim()),
        ])?;
        let request = CompletionRequest::json(FLOW, prompt).with_temperature(0.8);
        let reply = self.llm.complete(&request).await?;
        let parsed: ConversationReply = parse_reply(&reply)?;

        let text = parsed.reply.trim();
        if text.is_empty() {
            return Err(GenerationError::InvalidReply("conversation reply is empty".into()));
        }
        Ok(FeedbackResult::ConversationalReply {
            text: text.to_owned(),
        })
    }
}

/// A blank correction, or one equal to the submitted answer, is no correction.
fn normalize_correction(corrected: Option<String>, submitted: &str) -> Option<String> {
    corrected
        .map(|c| c.trim().to_owned())
        .filter(|c| !c.is_empty() && c != submitted.trim())
}
