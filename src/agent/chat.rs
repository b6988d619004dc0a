//! Session client: one lazily created chat session, one turn at a time

use crate::core::attachments::Attachment;
use crate::core::errors::SessionError;
use crate::llm::prompt::{EMPTY_REPLY_PLACEHOLDER, FALLBACK_PROMPT};
use crate::llm::{ChatSession, Part, RetryPolicy, SessionConnector, SessionSettings};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::OnceCell;

/// Lifecycle of the client's session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No session yet; the next submission creates one
    Uninitialized,
    /// Session exists and nothing is in flight
    Ready,
    /// A submission is awaiting the provider
    Busy,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uninitialized => "Uninitialized",
            Self::Ready => "Ready",
            Self::Busy => "Busy",
        }
    }
}

/// Build the parts of one user message
///
/// Attachments come first in the order given, then the text if it has any
/// non-whitespace content. A message with neither gets the fallback prompt
/// so that an empty request is never sent.
pub fn assemble_parts(text: &str, attachments: &[Attachment]) -> Vec<Part> {
    let mut parts = Vec::with_capacity(attachments.len() + 1);

    for attachment in attachments {
        if !attachment.has_data() {
            tracing::warn!(file = %attachment.filename, "Skipping attachment without data");
            continue;
        }
        parts.push(Part::inline_data(
            attachment.mime_type.clone(),
            attachment.encoded_data.clone(),
        ));
    }

    if !text.trim().is_empty() {
        parts.push(Part::text(text));
    } else if parts.is_empty() {
        parts.push(Part::text(FALLBACK_PROMPT));
    }

    parts
}

/// Client for a single explanation session
///
/// Built once by the composition root and shared by reference. The session
/// is created on first use; only one submission may be in flight, and a
/// concurrent call is rejected with [`SessionError::Busy`].
pub struct ChatClient {
    connector: Arc<dyn SessionConnector>,
    settings: SessionSettings,
    retry: RetryPolicy,
    session: OnceCell<Arc<dyn ChatSession>>,
    busy: AtomicBool,
}

/// Clears the busy flag however the submission ends
struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl ChatClient {
    pub fn new(
        connector: Arc<dyn SessionConnector>,
        settings: SessionSettings,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            connector,
            settings,
            retry,
            session: OnceCell::new(),
            busy: AtomicBool::new(false),
        }
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    pub fn state(&self) -> SessionState {
        if self.busy.load(Ordering::Acquire) {
            SessionState::Busy
        } else if self.session.initialized() {
            SessionState::Ready
        } else {
            SessionState::Uninitialized
        }
    }

    /// Create the session if it does not exist yet
    ///
    /// A failed attempt leaves the client uninitialized, so a later call
    /// tries again.
    pub async fn ensure_session(&self) -> Result<Arc<dyn ChatSession>, SessionError> {
        let session = self
            .session
            .get_or_try_init(|| async {
                tracing::debug!(model = %self.settings.model, "Initializing chat session");
                self.connector.connect(&self.settings).await
            })
            .await
            .map_err(|e| {
                tracing::error!("Chat session initialization failed: {}", e);
                SessionError::Initialization(e)
            })?;
        Ok(Arc::clone(session))
    }

    /// Send one user turn and return the model's reply text
    ///
    /// The reply is never empty: a response without text is replaced by a
    /// fixed placeholder. Failures are returned after the retry policy is
    /// exhausted; the client stays usable either way.
    pub async fn submit_turn(
        &self,
        text: &str,
        attachments: &[Attachment],
    ) -> Result<String, SessionError> {
        let session = self.ensure_session().await?;
        tracing::debug!(state = self.state().as_str(), "Submitting turn");

        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::warn!("Rejected submission while another is in flight");
            return Err(SessionError::Busy);
        }
        let _guard = BusyGuard(&self.busy);

        let parts = assemble_parts(text, attachments);
        tracing::info!(
            parts = parts.len(),
            attachments = attachments.len(),
            "Sending message to Gemini"
        );

        let reply = self
            .retry
            .run(|| session.send_message(&parts))
            .await
            .map_err(|e| {
                tracing::error!("Gemini API error: {}", e);
                SessionError::Send(e)
            })?;

        match reply.text {
            Some(text) if !text.trim().is_empty() => Ok(text),
            _ => {
                tracing::warn!("Gemini reply had no text, substituting placeholder");
                Ok(EMPTY_REPLY_PLACEHOLDER.to_string())
            }
        }
    }
}
