//! Google Gemini chat session
//!
//! SECURITY: the API key is only ever sent to the configured Gemini
//! endpoint, in the `x-goog-api-key` header, never in the URL.

use super::{ChatSession, LlmError, ModelReply, Part, SessionConnector, SessionSettings, TokenUsage};
use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::env;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Official Google Gemini API endpoint
pub const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Default name of the environment variable holding the API key
pub const DEFAULT_API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Builds [`GeminiChat`] sessions, reading the API key at connect time
#[derive(Debug, Clone)]
pub struct GeminiConnector {
    api_key_env: String,
    base_url: String,
}

impl Default for GeminiConnector {
    fn default() -> Self {
        Self::new(DEFAULT_API_KEY_ENV)
    }
}

impl GeminiConnector {
    pub fn new(api_key_env: impl Into<String>) -> Self {
        Self {
            api_key_env: api_key_env.into(),
            base_url: GEMINI_API_BASE.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn api_key_env(&self) -> &str {
        &self.api_key_env
    }

    fn read_api_key(&self) -> Result<String, LlmError> {
        match env::var(&self.api_key_env) {
            Ok(key) if !key.trim().is_empty() => Ok(key.trim().to_string()),
            _ => Err(LlmError::MissingCredential(self.api_key_env.clone())),
        }
    }
}

#[async_trait]
impl SessionConnector for GeminiConnector {
    async fn connect(&self, settings: &SessionSettings) -> Result<Arc<dyn ChatSession>, LlmError> {
        let api_key = self.read_api_key()?;
        let client = reqwest::Client::builder()
            .build()
            .context("Failed to build HTTP client")?;

        tracing::info!(model = %settings.model, "Created Gemini chat session");
        Ok(Arc::new(GeminiChat {
            client,
            api_key,
            base_url: self.base_url.clone(),
            settings: settings.clone(),
            history: Mutex::new(Vec::new()),
        }))
    }
}

/// A chat session against one Gemini model
///
/// Holds the exchange history so callers only ever send the new turn.
pub struct GeminiChat {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    settings: SessionSettings,
    history: Mutex<Vec<GeminiContent>>,
}

impl GeminiChat {
    fn endpoint(&self) -> String {
        format!("{}/{}:generateContent", self.base_url, self.settings.model)
    }

    fn build_request(&self, history: &[GeminiContent], message: GeminiContent) -> GeminiRequest {
        let mut contents = history.to_vec();
        contents.push(message);

        GeminiRequest {
            contents,
            system_instruction: Some(GeminiSystemInstruction {
                parts: vec![GeminiPart::Text {
                    text: self.settings.system_instruction.clone(),
                }],
            }),
            generation_config: Some(GeminiGenerationConfig {
                temperature: Some(self.settings.temperature),
                max_output_tokens: self.settings.max_output_tokens,
            }),
        }
    }

    async fn send_request(&self, request: &GeminiRequest) -> Result<GeminiResponse, LlmError> {
        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(request)
            .send()
            .await
            .map_err(LlmError::from_network_error)?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(LlmError::from_http_status(status, error_text));
        }

        let body = response.text().await.map_err(LlmError::from_network_error)?;
        serde_json::from_str::<GeminiResponse>(&body)
            .map_err(|e| LlmError::InvalidResponse(format!("Failed to parse Gemini response: {}", e)))
    }
}

#[async_trait]
impl ChatSession for GeminiChat {
    async fn send_message(&self, parts: &[Part]) -> Result<ModelReply, LlmError> {
        let message = GeminiContent::user(parts);

        // Held across the request: one exchange at a time per session
        let mut history = self.history.lock().await;
        let request = self.build_request(&history, message.clone());
        let response = self.send_request(&request).await?;

        let usage = response.usage();
        if let Some(usage) = usage {
            tracing::debug!(
                input_tokens = usage.input_tokens,
                output_tokens = usage.output_tokens,
                "Gemini token usage"
            );
        }

        let text = response.text();
        if let Some(text) = &text {
            history.push(message);
            history.push(GeminiContent::model(text));
        } else {
            tracing::warn!(
                finish_reason = response.finish_reason().unwrap_or("unknown"),
                "Gemini returned no text; exchange not added to history"
            );
        }

        Ok(ModelReply { text, usage })
    }
}

// Gemini API types

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiSystemInstruction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GeminiGenerationConfig>,
}

#[derive(Debug, Serialize)]
struct GeminiSystemInstruction {
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(default)]
    role: String,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

impl GeminiContent {
    fn user(parts: &[Part]) -> Self {
        Self {
            role: "user".to_string(),
            parts: parts.iter().map(GeminiPart::from).collect(),
        }
    }

    fn model(text: &str) -> Self {
        Self {
            role: "model".to_string(),
            parts: vec![GeminiPart::Text {
                text: text.to_string(),
            }],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum GeminiPart {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: GeminiInlineData,
    },
    /// Function calls, thoughts and other part kinds this client never sends
    Unsupported(serde_json::Value),
}

impl From<&Part> for GeminiPart {
    fn from(part: &Part) -> Self {
        match part {
            Part::Text(text) => GeminiPart::Text { text: text.clone() },
            Part::InlineData { mime_type, data } => GeminiPart::InlineData {
                inline_data: GeminiInlineData {
                    mime_type: mime_type.clone(),
                    data: data.clone(),
                },
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiInlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    usage_metadata: Option<GeminiUsageMetadata>,
}

impl GeminiResponse {
    /// Text parts of the first candidate, concatenated; `None` when blank
    fn text(&self) -> Option<String> {
        let candidate = self.candidates.first()?;
        let content = candidate.content.as_ref()?;
        let texts: Vec<&str> = content
            .parts
            .iter()
            .filter_map(|p| match p {
                GeminiPart::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect();

        let text = texts.concat();
        if text.trim().is_empty() {
            None
        } else {
            Some(text)
        }
    }

    fn finish_reason(&self) -> Option<&str> {
        self.candidates.first()?.finish_reason.as_deref()
    }

    fn usage(&self) -> Option<TokenUsage> {
        self.usage_metadata.as_ref().map(|u| TokenUsage {
            input_tokens: u.prompt_token_count,
            output_tokens: u.candidates_token_count,
            total_tokens: u.total_token_count,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    content: Option<GeminiContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiUsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
    #[serde(default)]
    total_token_count: u32,
}
