//! Gemini chat sessions and the seams the session client depends on

mod error;
pub mod gemini;
pub mod prompt;
pub mod retry;
mod types;

pub use error::LlmError;
pub use gemini::{GeminiChat, GeminiConnector};
pub use retry::{Backoff, RetryOn, RetryPolicy};
pub use types::*;

use async_trait::async_trait;
use std::sync::Arc;

/// A live conversational context on the provider side
///
/// The session retains prior exchanges; callers send only the new turn.
/// Implementations are not required to support interleaved sends.
#[async_trait]
pub trait ChatSession: Send + Sync {
    /// Send one user message and wait for the complete reply
    async fn send_message(&self, parts: &[Part]) -> Result<ModelReply, LlmError>;
}

/// Creates sessions bound to fixed settings
///
/// Credential lookup happens here, so a missing key surfaces before any
/// message is sent.
#[async_trait]
pub trait SessionConnector: Send + Sync {
    async fn connect(&self, settings: &SessionSettings) -> Result<Arc<dyn ChatSession>, LlmError>;
}
