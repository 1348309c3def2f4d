use serde::Deserialize;

use profe_core::model::{
    LevelParseError, ProficiencyLevel, ProficiencyResult, UserAnswer, answers_transcript,
};

use crate::ai::client::CompletionRequest;
use crate::ai::flow::{PromptFlows, require_text};
use crate::ai::prompt::{PromptTemplate, parse_reply};
use crate::error::GenerationError;

const FLOW: &str = "analyze-proficiency-level";

const TEMPLATE: PromptTemplate = PromptTemplate::new(
    FLOW,
    "You are an expert language proficiency assessor. Your response MUST be in {{language}}.

Analyze the learner's quiz responses to determine their proficiency level according to the \
Common European Framework of Reference for Languages (CEFR). The levels are A1, A2, B1, B2, C1 \
and C2.

Consider grammar, vocabulary and comprehension. Based on their performance, determine the most \
appropriate level. A learner who answers everything correctly must be rated C2.

Provide a detailed, extensive and clear explanation for your assessment, written in {{language}}.

Quiz Responses:
{{responses}}

Reply with a JSON object: {\"proficiencyLevel\": \"A1|A2|B1|B2|C1|C2\", \"reasoning\": \"...\"}",
);

/// Input of the proficiency analysis flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProficiencyInput {
    /// Question/answer transcript in submission order.
    pub quiz_responses: String,
    pub perfect_score: bool,
}

impl ProficiencyInput {
    /// Build the input from recorded answers, in the order given.
    #[must_use]
    pub fn from_answers(answers: &[UserAnswer]) -> Self {
        Self {
            quiz_responses: answers_transcript(answers),
            perfect_score: !answers.is_empty() && answers.iter().all(UserAnswer::is_correct),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProficiencyReply {
    proficiency_level: String,
    reasoning: String,
}

impl PromptFlows {
    /// Assess a CEFR level from a quiz transcript.
    ///
    /// A perfect score is always reported as the highest level, whatever the
    /// model replied.
    ///
    /// # Errors
    ///
    /// Returns `GenerationError` for a blank transcript, model failures, or a reply
    /// without a recognizable level or reasoning.
    pub async fn analyze_proficiency(
        &self,
        input: &ProficiencyInput,
    ) -> Result<ProficiencyResult, GenerationError> {
        require_text("quiz_responses", &input.quiz_responses)?;

        self.run(FLOW, async {
            let prompt = TEMPLATE.render(&[
                ("language", self.language()),
                ("responses", input.quiz_responses.as_str()),
            ])?;
            let reply = self.llm.complete(&CompletionRequest::json(FLOW, prompt)).await?;
            let parsed: ProficiencyReply = parse_reply(&reply)?;

            let level = extract_level(&parsed.proficiency_level)?;
            let result = ProficiencyResult::new(level, parsed.reasoning.trim())?;

            if input.perfect_score && result.level() != ProficiencyLevel::highest() {
                tracing::info!(flow = FLOW, reported = %result.level(), "perfect score, raising level");
                return Ok(result.with_level(ProficiencyLevel::highest()));
            }
            Ok(result)
        })
        .await
    }
}

/// Accept `"B2"` as well as decorated replies such as `"Nivel B2 (intermedio)"`.
fn extract_level(raw: &str) -> Result<ProficiencyLevel, LevelParseError> {
    if let Ok(level) = raw.parse() {
        return Ok(level);
    }
    raw.split(|c: char| !c.is_ascii_alphanumeric())
        .find_map(|token| token.parse().ok())
        .ok_or_else(|| {
            if raw.trim().is_empty() {
                LevelParseError::Blank
            } else {
                LevelParseError::Unknown(raw.trim().to_owned())
            }
        })
}
