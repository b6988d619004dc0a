//! Conversation log - append-only turns and the loading flag
//!
//! Handles:
//! - Turn construction and validation
//! - The submit flow: user turn in, model turn (or flagged failure) out
//! - Loading state while a reply is pending

use super::attachments::Attachment;
use super::errors::{ConversationError, SessionError};
use crate::agent::ChatClient;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Shown in place of a reply when the send fails
pub const FAILURE_APOLOGY: &str = "I'm sorry, I encountered an error while processing your request. Please check your internet connection or try a different file.";

/// Who authored a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Speaker {
    User,
    Model,
}

impl Speaker {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Model => "model",
        }
    }
}

/// One message in the conversation; immutable once created
#[derive(Debug, Clone)]
pub struct Turn {
    pub id: Uuid,
    pub speaker: Speaker,
    pub body: Option<String>,
    /// Only ever non-empty on user turns
    pub attachments: Vec<Attachment>,
    pub created_at: DateTime<Utc>,
    /// Set on model turns synthesized from an error
    pub failed: bool,
}

impl Turn {
    /// A user turn; needs text or at least one attachment
    pub fn user(
        text: impl Into<String>,
        attachments: Vec<Attachment>,
    ) -> Result<Self, ConversationError> {
        let text = text.into();
        if text.trim().is_empty() && attachments.is_empty() {
            return Err(ConversationError::EmptyTurn);
        }

        Ok(Self {
            id: Uuid::new_v4(),
            speaker: Speaker::User,
            body: if text.is_empty() { None } else { Some(text) },
            attachments,
            created_at: Utc::now(),
            failed: false,
        })
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            speaker: Speaker::Model,
            body: Some(text.into()),
            attachments: Vec::new(),
            created_at: Utc::now(),
            failed: false,
        }
    }

    /// A model turn standing in for a reply that never came
    pub fn failure() -> Self {
        Self {
            failed: true,
            ..Self::model(FAILURE_APOLOGY)
        }
    }

    pub fn text(&self) -> &str {
        self.body.as_deref().unwrap_or("")
    }
}

/// How a submission ended, once the model turn is in the log
#[derive(Debug)]
pub enum Exchange {
    Answered,
    Failed(SessionError),
}

impl Exchange {
    /// True when the session could not even be created; further
    /// submissions will fail the same way
    pub fn is_fatal(&self) -> bool {
        matches!(self, Exchange::Failed(e) if e.is_initialization())
    }

    pub fn error(&self) -> Option<&SessionError> {
        match self {
            Exchange::Answered => None,
            Exchange::Failed(e) => Some(e),
        }
    }
}

/// Append-only conversation log
#[derive(Debug, Default)]
pub struct Conversation {
    turns: Vec<Turn>,
    loading: bool,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn append(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    /// Run one exchange against `client`
    ///
    /// Appends the user turn, waits for the reply, then appends either the
    /// model turn or a failed turn carrying [`FAILURE_APOLOGY`]. Validation
    /// errors are returned before anything is appended. Taking `&mut self`
    /// keeps one submission in flight per conversation; if a submission is
    /// dropped mid-flight the next one proceeds normally.
    pub async fn submit(
        &mut self,
        client: &ChatClient,
        text: &str,
        attachments: Vec<Attachment>,
    ) -> Result<Exchange, ConversationError> {
        let user_turn = Turn::user(text, attachments)?;
        self.append(user_turn);
        self.loading = true;

        let attachments = self
            .turns
            .last()
            .map(|t| t.attachments.as_slice())
            .unwrap_or_default();
        let result = client.submit_turn(text, attachments).await;

        let exchange = match result {
            Ok(reply) => {
                self.append(Turn::model(reply));
                Exchange::Answered
            }
            Err(e) => {
                tracing::error!("Error processing message: {}", e);
                self.append(Turn::failure());
                Exchange::Failed(e)
            }
        };
        self.loading = false;

        Ok(exchange)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_turn_requires_content() {
        assert!(matches!(
            Turn::user("", Vec::new()),
            Err(ConversationError::EmptyTurn)
        ));
        assert!(matches!(
            Turn::user("  \n", Vec::new()),
            Err(ConversationError::EmptyTurn)
        ));

        let turn = Turn::user("What is this?", Vec::new()).unwrap();
        assert_eq!(turn.speaker, Speaker::User);
        assert_eq!(turn.text(), "What is this?");
        assert!(!turn.failed);
    }

    #[test]
    fn test_user_turn_with_only_attachment() {
        let img = Attachment::from_bytes("a.png", "image/png", b"png");
        let turn = Turn::user("", vec![img]).unwrap();
        assert!(turn.body.is_none());
        assert_eq!(turn.attachments.len(), 1);
    }

    #[test]
    fn test_model_and_failure_turns() {
        let reply = Turn::model("## 1. Document Type");
        assert_eq!(reply.speaker, Speaker::Model);
        assert!(!reply.failed);

        let failed = Turn::failure();
        assert_eq!(failed.speaker, Speaker::Model);
        assert!(failed.failed);
        assert_eq!(failed.text(), FAILURE_APOLOGY);
    }

    #[test]
    fn test_turn_ids_are_unique() {
        let a = Turn::model("a");
        let b = Turn::model("a");
        assert_ne!(a.id, b.id);
        assert!(b.created_at >= a.created_at);
    }

    #[test]
    fn test_append_only_log() {
        let mut conversation = Conversation::new();
        assert!(conversation.is_empty());
        assert!(!conversation.is_loading());

        conversation.append(Turn::user("hi", Vec::new()).unwrap());
        conversation.append(Turn::model("hello"));

        assert_eq!(conversation.len(), 2);
        assert_eq!(conversation.turns()[0].speaker, Speaker::User);
        assert_eq!(conversation.last().unwrap().text(), "hello");
    }

    #[test]
    fn test_exchange_fatality() {
        use crate::llm::LlmError;

        let init = Exchange::Failed(SessionError::Initialization(
            LlmError::MissingCredential("K".to_string()),
        ));
        assert!(init.is_fatal());

        let send = Exchange::Failed(SessionError::Send(LlmError::Network("x".to_string())));
        assert!(!send.is_fatal());
        assert!(send.error().is_some());

        assert!(!Exchange::Answered.is_fatal());
        assert!(Exchange::Answered.error().is_none());
    }
}
