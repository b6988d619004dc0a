//! Core domain modules
//!
//! Attachment ingestion, the conversation log, and the domain errors shared
//! by the session client and the terminal front-end.

pub mod attachments;
pub mod conversation;
pub mod errors;

pub use attachments::{
    Attachment, AttachmentConfig, AttachmentTray, ImagePreview, IngestReport, MediaKind,
};
pub use conversation::{Conversation, Exchange, Speaker, Turn, FAILURE_APOLOGY};
pub use errors::{AttachmentError, ConversationError, SessionError};
