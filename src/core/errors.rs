//! Domain error types
//!
//! These errors represent business logic failures, distinct from the
//! provider-level [`LlmError`] classification they may wrap.

use crate::llm::LlmError;
use thiserror::Error;

/// Errors from the session client
#[derive(Debug, Error)]
pub enum SessionError {
    /// The session could not be created (missing credential, client setup).
    /// Never retried.
    #[error("Chat session initialization failed: {0}")]
    Initialization(#[source] LlmError),

    /// Another submission is still in flight on this client
    #[error("A request is already in progress")]
    Busy,

    /// The send failed, after any retries the policy allowed
    #[error("Failed to send message: {0}")]
    Send(#[source] LlmError),
}

impl SessionError {
    pub fn is_initialization(&self) -> bool {
        matches!(self, SessionError::Initialization(_))
    }

    /// The provider error underneath, if any
    pub fn llm_error(&self) -> Option<&LlmError> {
        match self {
            SessionError::Initialization(e) | SessionError::Send(e) => Some(e),
            SessionError::Busy => None,
        }
    }
}

/// Errors raised while turning files into attachments
#[derive(Debug, Error)]
pub enum AttachmentError {
    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("File \"{name}\" exceeds the {} limit ({})", format_size(*.max), format_size(*.size))]
    FileTooLarge { name: String, size: u64, max: u64 },

    #[error("You can only attach up to {max} files ({count} requested)")]
    TooManyAttachments { count: usize, max: usize },

    #[error("Unsupported file type: {0}")]
    UnsupportedFileType(String),

    /// The file or recording is empty, so there is nothing to send
    #[error("Attachment \"{0}\" has no data")]
    MissingData(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from the conversation log
#[derive(Debug, Error)]
pub enum ConversationError {
    #[error("Nothing to send: enter a message or attach a file")]
    EmptyTurn,
}

/// Format a size in bytes to a human-readable string
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1}GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1}MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1}KB", bytes as f64 / KB as f64)
    } else {
        format!("{}B", bytes)
    }
}
