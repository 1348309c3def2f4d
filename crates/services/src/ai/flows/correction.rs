use serde::Deserialize;

use crate::ai::client::CompletionRequest;
use crate::ai::flow::{PromptFlows, require_text};
use crate::ai::prompt::{PromptTemplate, parse_reply};
use crate::error::GenerationError;

const FLOW: &str = "correct-user-text";

const TEMPLATE: PromptTemplate = PromptTemplate::new(
    FLOW,
    "You are a grammar and style correction tool for learners of {{language}}. Correct the \
following text and give feedback in {{language}}.

The feedback must explain why each change was made, not only what changed. If the text is \
already correct, return it unchanged and say so.

Text: {{text}}

Reply with a JSON object: {\"correctedText\": \"...\", \"feedback\": \"...\"}",
);

/// Output of the text correction flow.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Correction {
    pub corrected_text: String,
    pub feedback: String,
}

impl PromptFlows {
    /// Correct free text and explain the changes.
    ///
    /// # Errors
    ///
    /// Returns `GenerationError` for blank input, model failures or a reply with
    /// empty fields.
    pub async fn correct_text(&self, text: &str) -> Result<Correction, GenerationError> {
        require_text("text", text)?;

        self.run(FLOW, async {
            let prompt = TEMPLATE.render(&[("language", self.language()), ("text", text.trim())])?;
            let reply = self.llm.complete(&CompletionRequest::json(FLOW, prompt)).await?;
            let parsed: Correction = parse_reply(&reply)?;

            if parsed.corrected_text.trim().is_empty() || parsed.feedback.trim().is_empty() {
                return Err(GenerationError::InvalidReply(
                    "correction reply has empty fields".into(),
                ));
            }
            Ok(Correction {
                corrected_text: parsed.corrected_text.trim().to_owned(),
                feedback: parsed.feedback.trim().to_owned(),
            })
        })
        .await
    }
}
