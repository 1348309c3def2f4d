use std::collections::HashSet;
use std::ops::RangeInclusive;

use serde::Deserialize;

use profe_core::model::{LevelRange, QuizQuestion};

use crate::ai::client::CompletionRequest;
use crate::ai::flow::{PromptFlows, require_text};
use crate::ai::prompt::{PromptTemplate, parse_reply};
use crate::error::GenerationError;

pub const DEFAULT_QUESTION_COUNT: usize = 15;
pub const QUESTION_COUNT_RANGE: RangeInclusive<usize> = 1..=30;
pub const DEFAULT_QUIZ_TOPIC: &str = "general spanish proficiency";

const FLOW: &str = "generate-quiz-questions";

const TEMPLATE: PromptTemplate = PromptTemplate::new(
    FLOW,
    "You are a quiz generator specializing in {{language}} language learning. Create a set of \
multiple-choice questions to assess a learner's proficiency. The questions should cover a wide \
range of difficulties across the target proficiency range to accurately determine their level.

Test various aspects of the language: grammar (verb tenses, prepositions, moods), advanced \
vocabulary and reading comprehension of complex texts. Mix easy questions with very \
challenging ones.

Topic: {{topic}}
Target Proficiency Range: {{range}}
Number of Questions: {{count}}

For each question provide:
1. The question text.
2. The correct answer, copied exactly from the options.
3. Plausible incorrect options.
4. Brief, encouraging feedback for when a learner selects an answer.

All output text, including questions, answers, options and feedback, MUST be in {{language}}.

Reply with a JSON object of the form:
{\"questions\": [{\"question\": \"...\", \"answer\": \"...\", \"options\": [\"...\"], \"feedback\": \"...\"}]}",
);

/// Input of the quiz generation flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizRequest {
    pub topic: String,
    pub range: LevelRange,
    pub number_of_questions: usize,
}

impl Default for QuizRequest {
    fn default() -> Self {
        Self {
            topic: DEFAULT_QUIZ_TOPIC.into(),
            range: LevelRange::full(),
            number_of_questions: DEFAULT_QUESTION_COUNT,
        }
    }
}

impl QuizRequest {
    #[must_use]
    pub fn with_question_count(mut self, count: usize) -> Self {
        self.number_of_questions = count;
        self
    }

    fn validate(&self) -> Result<(), GenerationError> {
        require_text("topic", &self.topic)?;
        if !QUESTION_COUNT_RANGE.contains(&self.number_of_questions) {
            return Err(GenerationError::InvalidInput(format!(
                "number_of_questions must be within {}..={}, got {}",
                QUESTION_COUNT_RANGE.start(),
                QUESTION_COUNT_RANGE.end(),
                self.number_of_questions
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct QuizReply {
    questions: Vec<RawQuestion>,
}

#[derive(Debug, Deserialize)]
struct RawQuestion {
    question: String,
    answer: String,
    options: Vec<String>,
    #[serde(default)]
    feedback: String,
}

impl PromptFlows {
    /// Generate validated multiple-choice questions.
    ///
    /// # Errors
    ///
    /// Returns `GenerationError` for invalid input, model failures, malformed
    /// replies, or when no generated question survives validation.
    pub async fn generate_quiz_questions(
        &self,
        request: &QuizRequest,
    ) -> Result<Vec<QuizQuestion>, GenerationError> {
        request.validate()?;

        self.run(FLOW, async {
            let count = request.number_of_questions.to_string();
            let range = request.range.to_string();
            let prompt = TEMPLATE.render(&[
                ("language", self.language()),
                ("topic", request.topic.trim()),
                ("range", range.as_str()),
                ("count", count.as_str()),
            ])?;

            let reply = self
                .llm
                .complete(&CompletionRequest::json(FLOW, prompt).with_temperature(0.7))
                .await?;
            let parsed: QuizReply = parse_reply(&reply)?;
            accept_questions(parsed.questions, request.number_of_questions)
        })
        .await
    }
}

fn accept_questions(
    raw: Vec<RawQuestion>,
    requested: usize,
) -> Result<Vec<QuizQuestion>, GenerationError> {
    let received = raw.len();
    let mut accepted = Vec::with_capacity(requested.min(received));

    for (index, item) in raw.into_iter().enumerate() {
        let options = dedupe_options(item.options);
        match QuizQuestion::new(item.question.trim(), item.answer.trim(), options, item.feedback) {
            Ok(question) => accepted.push(question),
            Err(e) => tracing::warn!(flow = FLOW, index, error = %e, "dropping invalid question"),
        }
    }

    if accepted.is_empty() {
        return Err(GenerationError::InvalidReply(format!(
            "none of the {received} generated questions was usable"
        )));
    }
    if accepted.len() > requested {
        tracing::debug!(flow = FLOW, surplus = accepted.len() - requested, "truncating questions");
        accepted.truncate(requested);
    }
    Ok(accepted)
}

/// Trim options and drop blanks and repeats, keeping first occurrences in order.
fn dedupe_options(options: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::with_capacity(options.len());
    options
        .into_iter()
        .map(|option| option.trim().to_owned())
        .filter(|option| !option.is_empty() && seen.insert(option.clone()))
        .collect()
}
