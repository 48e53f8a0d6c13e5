//! Gemini-backed translation gateway.

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use voice_canvas_core::{
    CommandContext, GatewayError, Translation, TranslationGateway, TranslationInput,
};

use crate::{parse, prompt};

/// Default model name.
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash-exp";

/// Public Generative Language API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

const AUDIO_MIME_TYPE: &str = "audio/wav";

/// Gemini connection settings.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
}

impl GeminiConfig {
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_owned(),
            base_url: DEFAULT_BASE_URL.to_owned(),
        }
    }

    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

/// Error talking to the model.
#[derive(Debug, thiserror::Error)]
pub enum GeminiError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("API returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("response contained no text")]
    EmptyResponse,
    #[error("invalid audio data: {0}")]
    InvalidAudio(#[from] base64::DecodeError),
    #[error(transparent)]
    Parse(#[from] parse::ParseError),
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: [Content<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part<'a> {
    Text {
        text: &'a str,
    },
    #[serde(rename_all = "camelCase")]
    InlineData {
        inline_data: InlineData<'a>,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData<'a> {
    mime_type: &'a str,
    data: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Value>,
}

impl GenerateResponse {
    fn text(&self) -> Option<String> {
        let parts = &self.candidates.first()?.content.as_ref()?.parts;
        let text: String = parts
            .iter()
            .filter_map(|p| p.get("text").and_then(Value::as_str))
            .collect();
        (!text.is_empty()).then_some(text)
    }
}

/// Translation gateway backed by the Gemini `generateContent` API.
pub struct GeminiGateway {
    http: Client,
    config: GeminiConfig,
}

impl GeminiGateway {
    #[must_use]
    pub fn new(config: GeminiConfig) -> Self {
        Self::with_client(config, Client::new())
    }

    /// Create a gateway sharing an existing HTTP client.
    #[must_use]
    pub const fn with_client(config: GeminiConfig, http: Client) -> Self {
        Self { http, config }
    }

    /// Model in use.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.config.model
    }

    async fn generate(&self, parts: Vec<Part<'_>>) -> Result<String, GeminiError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        );
        let body = GenerateRequest {
            contents: [Content { parts }],
        };

        let response = self
            .http
            .post(url)
            .query(&[("key", self.config.api_key.as_str())])
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GeminiError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let reply: GenerateResponse = response.json().await?;
        reply.text().ok_or(GeminiError::EmptyResponse)
    }

    async fn translate_text(
        &self,
        text: &str,
        context: Option<&CommandContext>,
    ) -> Result<Translation, GeminiError> {
        let prompt = prompt::text_prompt(text, context);
        let reply = self.generate(vec![Part::Text { text: &prompt }]).await?;
        tracing::debug!(model = %self.config.model, "text command reply: {reply}");
        Ok(parse::parse_translation(&reply, Some(text))?)
    }

    async fn translate_audio(
        &self,
        audio: &str,
        context: Option<&CommandContext>,
    ) -> Result<Translation, GeminiError> {
        BASE64.decode(audio)?;

        let prompt = prompt::voice_prompt(context);
        let parts = vec![
            Part::Text { text: &prompt },
            Part::InlineData {
                inline_data: InlineData {
                    mime_type: AUDIO_MIME_TYPE,
                    data: audio,
                },
            },
        ];
        let reply = self.generate(parts).await?;
        tracing::debug!(model = %self.config.model, "voice command reply: {reply}");
        Ok(parse::parse_translation(&reply, None)?)
    }
}

#[async_trait]
impl TranslationGateway for GeminiGateway {
    async fn translate(
        &self,
        input: TranslationInput,
        context: Option<&CommandContext>,
    ) -> Result<Translation, GatewayError> {
        match input {
            TranslationInput::Text(text) => self
                .translate_text(&text, context)
                .await
                .map_err(|e| GatewayError::Text(e.to_string())),
            TranslationInput::Audio(audio) => self
                .translate_audio(&audio, context)
                .await
                .map_err(|e| GatewayError::Voice(e.to_string())),
        }
    }

    async fn suggestions(&self, state: &Value) -> Vec<String> {
        let prompt = prompt::suggestions_prompt(state);
        let reply = match self.generate(vec![Part::Text { text: &prompt }]).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::error!("Error getting suggestions: {e}");
                return Vec::new();
            }
        };

        parse::parse_suggestions(&reply).unwrap_or_else(|| {
            tracing::warn!("Suggestions reply is not a JSON array");
            Vec::new()
        })
    }
}
