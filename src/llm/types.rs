//! Shared types for the chat session layer

use super::prompt::{MODEL_NAME, SYSTEM_INSTRUCTION};

/// One part of a multi-part user message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Part {
    /// Plain text
    Text(String),
    /// Base64 payload sent inline, tagged with its MIME type
    InlineData { mime_type: String, data: String },
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Part::Text(text.into())
    }

    pub fn inline_data(mime_type: impl Into<String>, data: impl Into<String>) -> Self {
        Part::InlineData {
            mime_type: mime_type.into(),
            data: data.into(),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Part::Text(text) => Some(text),
            Part::InlineData { .. } => None,
        }
    }

    pub fn mime_type(&self) -> Option<&str> {
        match self {
            Part::Text(_) => None,
            Part::InlineData { mime_type, .. } => Some(mime_type),
        }
    }
}

/// Token usage statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub total_tokens: u32,
}

/// What the provider returned for one message
///
/// `text` is `None` when the response carried no text parts at all
/// (e.g. blocked by a safety filter).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelReply {
    pub text: Option<String>,
    pub usage: Option<TokenUsage>,
}

impl ModelReply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            usage: None,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }
}

/// Parameters a session is bound to when it is created
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSettings {
    pub model: String,
    pub system_instruction: String,
    pub temperature: f32,
    pub max_output_tokens: Option<u32>,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            model: MODEL_NAME.to_string(),
            system_instruction: SYSTEM_INSTRUCTION.to_string(),
            // Low temperature keeps explanations literal rather than creative
            temperature: 0.4,
            max_output_tokens: None,
        }
    }
}

impl From<&crate::config::LlmConfig> for SessionSettings {
    fn from(config: &crate::config::LlmConfig) -> Self {
        Self {
            model: config.model.clone(),
            system_instruction: SYSTEM_INSTRUCTION.to_string(),
            temperature: config.temperature,
            max_output_tokens: config.max_output_tokens,
        }
    }
}
