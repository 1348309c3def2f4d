use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::AiConfig;
use crate::error::GenerationError;

/// One prompt sent to a language model.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    /// Flow name, used for logging only.
    pub flow: &'static str,
    pub prompt: String,
    pub temperature: f32,
    /// Ask the model for a single JSON object.
    pub json_reply: bool,
}

impl CompletionRequest {
    #[must_use]
    pub fn json(flow: &'static str, prompt: impl Into<String>) -> Self {
        Self {
            flow,
            prompt: prompt.into(),
            temperature: 0.2,
            json_reply: true,
        }
    }

    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

/// Text generation boundary.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Send `request` and return the raw reply text.
    ///
    /// # Errors
    ///
    /// Returns `GenerationError` on transport failures, non-success statuses
    /// or an empty reply.
    async fn complete(&self, request: &CompletionRequest) -> Result<String, GenerationError>;
}

/// Encoded audio returned by a speech synthesizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioPayload {
    pub mime_type: String,
    pub data: Vec<u8>,
}

/// Text-to-speech boundary.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Render `text` as audio, using `voice` when given.
    ///
    /// # Errors
    ///
    /// Returns `GenerationError` on transport failures or an empty payload.
    async fn synthesize(
        &self,
        text: &str,
        voice: Option<&str>,
    ) -> Result<AudioPayload, GenerationError>;
}

/// Client for OpenAI-compatible `/chat/completions` and `/audio/speech` endpoints.
#[derive(Clone)]
pub struct OpenAiClient {
    client: Client,
    config: Option<AiConfig>,
}

impl OpenAiClient {
    #[must_use]
    pub fn from_env() -> Self {
        Self::new(AiConfig::from_env())
    }

    #[must_use]
    pub fn new(config: Option<AiConfig>) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    #[must_use]
    pub fn enabled(&self) -> bool {
        self.config.is_some()
    }

    fn endpoint(config: &AiConfig, path: &str) -> String {
        format!("{}/{path}", config.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, GenerationError> {
        let config = self.config.as_ref().ok_or(GenerationError::Disabled)?;

        let messages = vec![ChatMessage {
            role: "user",
            content: request.prompt.clone(),
        }];

        let payload = ChatRequest {
            model: config.model.clone(),
            messages,
            temperature: request.temperature,
            response_format: request.json_reply.then_some(ResponseFormat {
                kind: "json_object",
            }),
        };

        tracing::debug!(flow = request.flow, model = %config.model, "sending completion request");
        let response = self
            .client
            .post(Self::endpoint(config, "chat/completions"))
            .bearer_auth(&config.api_key)
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            tracing::warn!(flow = request.flow, status = %response.status(), "completion request failed");
            return Err(GenerationError::HttpStatus(response.status()));
        }

        let body: ChatResponse = response.json().await?;
        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(GenerationError::EmptyResponse)?;

        Ok(content.trim().to_string())
    }
}

#[async_trait]
impl SpeechSynthesizer for OpenAiClient {
    async fn synthesize(
        &self,
        text: &str,
        voice: Option<&str>,
    ) -> Result<AudioPayload, GenerationError> {
        let config = self.config.as_ref().ok_or(GenerationError::Disabled)?;

        let payload = SpeechRequest {
            model: &config.tts_model,
            input: text,
            voice: voice.unwrap_or(&config.tts_voice),
            response_format: "mp3",
        };

        let response = self
            .client
            .post(Self::endpoint(config, "audio/speech"))
            .bearer_auth(&config.api_key)
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(GenerationError::HttpStatus(response.status()));
        }

        let mime_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("audio/mpeg")
            .to_owned();
        let data = response.bytes().await?.to_vec();
        if data.is_empty() {
            return Err(GenerationError::EmptyResponse);
        }

        Ok(AudioPayload { mime_type, data })
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct SpeechRequest<'a> {
    model: &'a str,
    input: &'a str,
    voice: &'a str,
    response_format: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Debug, Deserialize)]
struct ChatMessageResponse {
    content: Option<String>,
}
