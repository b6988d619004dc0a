//! Integration tests for the session client and conversation flow
//!
//! The provider is replaced by a scripted session so retries, failures and
//! concurrency can be driven deterministically.

use async_trait::async_trait;
use lifelens::core::{Attachment, Conversation, Exchange, Speaker, FAILURE_APOLOGY};
use lifelens::llm::prompt::{EMPTY_REPLY_PLACEHOLDER, FALLBACK_PROMPT};
use lifelens::llm::{
    ChatSession, GeminiConnector, LlmError, ModelReply, Part, RetryOn, RetryPolicy,
    SessionConnector, SessionSettings,
};
use lifelens::{
    agent::SessionState,
    core::{ConversationError, SessionError},
    ChatClient,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

/// Replays a fixed list of outcomes, recording every message it receives
#[derive(Default)]
struct ScriptedSession {
    script: Mutex<VecDeque<Result<ModelReply, LlmError>>>,
    sent: Mutex<Vec<Vec<Part>>>,
    /// When set, each send waits for a permit before answering
    gate: Option<Arc<Notify>>,
    entered: Arc<Notify>,
}

impl ScriptedSession {
    fn new(script: Vec<Result<ModelReply, LlmError>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            ..Default::default()
        })
    }

    fn gated(script: Vec<Result<ModelReply, LlmError>>, gate: Arc<Notify>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            gate: Some(gate),
            ..Default::default()
        })
    }

    fn calls(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    fn sent(&self) -> Vec<Vec<Part>> {
        self.sent.lock().unwrap().clone()
    }

    fn remaining(&self) -> usize {
        self.script.lock().unwrap().len()
    }
}

#[async_trait]
impl ChatSession for ScriptedSession {
    async fn send_message(&self, parts: &[Part]) -> Result<ModelReply, LlmError> {
        self.sent.lock().unwrap().push(parts.to_vec());
        self.entered.notify_one();

        if let Some(gate) = &self.gate {
            gate.notified().await;
        }

        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::InvalidResponse("script exhausted".to_string())))
    }
}

/// Hands out the same scripted session, or fails the first `failures` connects
struct ScriptedConnector {
    session: Arc<ScriptedSession>,
    failures: AtomicUsize,
    connects: AtomicUsize,
}

impl ScriptedConnector {
    fn new(session: Arc<ScriptedSession>) -> Arc<Self> {
        Self::failing(session, 0)
    }

    fn failing(session: Arc<ScriptedSession>, failures: usize) -> Arc<Self> {
        Arc::new(Self {
            session,
            failures: AtomicUsize::new(failures),
            connects: AtomicUsize::new(0),
        })
    }

    fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionConnector for ScriptedConnector {
    async fn connect(&self, _settings: &SessionSettings) -> Result<Arc<dyn ChatSession>, LlmError> {
        self.connects.fetch_add(1, Ordering::SeqCst);

        let pending = self.failures.load(Ordering::SeqCst);
        if pending > 0 {
            self.failures.store(pending - 1, Ordering::SeqCst);
            return Err(LlmError::MissingCredential("GEMINI_API_KEY".to_string()));
        }

        Ok(self.session.clone())
    }
}

fn client(connector: Arc<ScriptedConnector>) -> ChatClient {
    ChatClient::new(connector, SessionSettings::default(), RetryPolicy::immediate(2))
}

fn network_error() -> LlmError {
    LlmError::Network("connection reset".to_string())
}

#[tokio::test]
async fn test_attachments_precede_text_on_the_wire() {
    let session = ScriptedSession::new(vec![Ok(ModelReply::text("## 1. Document Type"))]);
    let client = client(ScriptedConnector::new(session.clone()));

    let scan = Attachment::from_bytes("lease.pdf", "application/pdf", b"%PDF-1.7");
    let photo = Attachment::from_bytes("label.jpg", "image/jpeg", b"\xff\xd8\xff");

    client
        .submit_turn("What am I signing?", &[scan.clone(), photo.clone()])
        .await
        .unwrap();

    assert_eq!(
        session.sent(),
        vec![vec![
            Part::inline_data("application/pdf", scan.encoded_data),
            Part::inline_data("image/jpeg", photo.encoded_data),
            Part::text("What am I signing?"),
        ]]
    );
}

#[tokio::test]
async fn test_empty_submission_sends_fallback() {
    let session = ScriptedSession::new(vec![Ok(ModelReply::text("ok"))]);
    let client = client(ScriptedConnector::new(session.clone()));

    client.submit_turn("", &[]).await.unwrap();

    assert_eq!(session.sent(), vec![vec![Part::text(FALLBACK_PROMPT)]]);
}

#[tokio::test]
async fn test_retry_then_succeed() {
    let session = ScriptedSession::new(vec![
        Err(network_error()),
        Ok(ModelReply::text("second attempt")),
        Ok(ModelReply::text("never sent")),
    ]);
    let client = client(ScriptedConnector::new(session.clone()));

    let reply = client.submit_turn("hello", &[]).await.unwrap();

    assert_eq!(reply, "second attempt");
    assert_eq!(session.calls(), 2);
    assert_eq!(session.remaining(), 1);
    // Both attempts carry the same message
    assert_eq!(session.sent()[0], session.sent()[1]);
}

#[tokio::test]
async fn test_retry_then_fail_leaves_session_usable() {
    let session = ScriptedSession::new(vec![
        Err(network_error()),
        Err(LlmError::ServiceError("503".to_string())),
        Ok(ModelReply::text("recovered")),
    ]);
    let connector = ScriptedConnector::new(session.clone());
    let client = client(connector.clone());

    let err = client.submit_turn("hello", &[]).await.unwrap_err();
    assert!(matches!(err, SessionError::Send(LlmError::ServiceError(_))));
    assert_eq!(session.calls(), 2);
    assert_eq!(client.state(), SessionState::Ready);

    let reply = client.submit_turn("again", &[]).await.unwrap();
    assert_eq!(reply, "recovered");
    assert_eq!(connector.connects(), 1);
}

#[tokio::test]
async fn test_permanent_errors_are_not_retried() {
    let session = ScriptedSession::new(vec![
        Err(LlmError::BadRequest("unsupported mime type".to_string())),
        Ok(ModelReply::text("unused")),
    ]);
    let client = ChatClient::new(
        ScriptedConnector::new(session.clone()),
        SessionSettings::default(),
        RetryPolicy::immediate(2).with_retry_on(RetryOn::Transient),
    );

    let err = client.submit_turn("hello", &[]).await.unwrap_err();
    assert!(matches!(err, SessionError::Send(LlmError::BadRequest(_))));
    assert_eq!(session.calls(), 1);
}

#[tokio::test]
async fn test_blank_reply_becomes_placeholder() {
    let session = ScriptedSession::new(vec![
        Ok(ModelReply::empty()),
        Ok(ModelReply::text("  \n")),
    ]);
    let client = client(ScriptedConnector::new(session.clone()));

    for _ in 0..2 {
        let reply = client.submit_turn("hello", &[]).await.unwrap();
        assert!(!reply.is_empty());
        assert_eq!(reply, EMPTY_REPLY_PLACEHOLDER);
    }
    assert_eq!(session.calls(), 2);
}

#[tokio::test]
async fn test_initialization_failure_is_not_retried() {
    let session = ScriptedSession::new(vec![Ok(ModelReply::text("hi"))]);
    let connector = ScriptedConnector::failing(session.clone(), 1);
    let client = client(connector.clone());

    let err = client.submit_turn("hello", &[]).await.unwrap_err();
    assert!(err.is_initialization());
    assert_eq!(connector.connects(), 1);
    assert_eq!(session.calls(), 0);
    assert_eq!(client.state(), SessionState::Uninitialized);

    // A later submission tries to connect again
    let reply = client.submit_turn("hello", &[]).await.unwrap();
    assert_eq!(reply, "hi");
    assert_eq!(connector.connects(), 2);
}

#[tokio::test]
async fn test_missing_api_key_fails_before_sending() {
    let connector = GeminiConnector::new("LIFELENS_TEST_UNSET_CHAT_CLIENT_KEY");
    let client = ChatClient::new(
        Arc::new(connector),
        SessionSettings::default(),
        RetryPolicy::immediate(3),
    );

    let err = client.submit_turn("hello", &[]).await.unwrap_err();
    match err {
        SessionError::Initialization(LlmError::MissingCredential(var)) => {
            assert_eq!(var, "LIFELENS_TEST_UNSET_CHAT_CLIENT_KEY")
        }
        other => panic!("expected initialization error, got {:?}", other),
    }
    assert_eq!(client.state(), SessionState::Uninitialized);
}

#[tokio::test]
async fn test_session_is_created_once() {
    let session = ScriptedSession::new(vec![
        Ok(ModelReply::text("first")),
        Ok(ModelReply::text("second")),
    ]);
    let connector = ScriptedConnector::new(session.clone());
    let client = client(connector.clone());

    assert_eq!(client.state(), SessionState::Uninitialized);
    assert_eq!(client.submit_turn("one", &[]).await.unwrap(), "first");
    assert_eq!(client.state(), SessionState::Ready);
    assert_eq!(client.submit_turn("two", &[]).await.unwrap(), "second");

    assert_eq!(connector.connects(), 1);
    // Only the new turn goes out; the session keeps the history
    assert_eq!(session.sent()[1], vec![Part::text("two")]);
}

#[tokio::test]
async fn test_concurrent_submission_is_rejected() {
    let gate = Arc::new(Notify::new());
    let session = ScriptedSession::gated(vec![Ok(ModelReply::text("done"))], gate.clone());
    let client = Arc::new(client(ScriptedConnector::new(session.clone())));

    let first = tokio::spawn({
        let client = client.clone();
        async move { client.submit_turn("first", &[]).await }
    });

    session.entered.notified().await;
    assert_eq!(client.state(), SessionState::Busy);

    let err = client.submit_turn("second", &[]).await.unwrap_err();
    assert!(matches!(err, SessionError::Busy));

    gate.notify_one();
    assert_eq!(first.await.unwrap().unwrap(), "done");
    assert_eq!(client.state(), SessionState::Ready);
    assert_eq!(session.calls(), 1);
}

#[tokio::test]
async fn test_conversation_records_exchange() {
    let session = ScriptedSession::new(vec![Ok(ModelReply::text("## 1. Document Type"))]);
    let client = client(ScriptedConnector::new(session));
    let mut conversation = Conversation::new();

    let bill = Attachment::from_bytes("bill.pdf", "application/pdf", b"%PDF");
    let exchange = conversation
        .submit(&client, "Is this right?", vec![bill])
        .await
        .unwrap();

    assert!(matches!(exchange, Exchange::Answered));
    assert!(!conversation.is_loading());
    assert_eq!(conversation.len(), 2);

    let turns = conversation.turns();
    assert_eq!(turns[0].speaker, Speaker::User);
    assert_eq!(turns[0].attachments.len(), 1);
    assert_eq!(turns[1].speaker, Speaker::Model);
    assert_eq!(turns[1].text(), "## 1. Document Type");
    assert!(!turns[1].failed);
}

#[tokio::test]
async fn test_conversation_flags_failed_turn() {
    let session = ScriptedSession::new(vec![Err(network_error()), Err(network_error())]);
    let client = client(ScriptedConnector::new(session));
    let mut conversation = Conversation::new();

    let exchange = conversation.submit(&client, "hello", Vec::new()).await.unwrap();

    assert!(matches!(exchange, Exchange::Failed(SessionError::Send(_))));
    assert!(!exchange.is_fatal());
    assert!(!conversation.is_loading());

    let last = conversation.last().unwrap();
    assert!(last.failed);
    assert_eq!(last.text(), FAILURE_APOLOGY);
}

#[tokio::test]
async fn test_conversation_initialization_failure_is_fatal() {
    let session = ScriptedSession::new(Vec::new());
    let client = client(ScriptedConnector::failing(session, 1));
    let mut conversation = Conversation::new();

    let exchange = conversation.submit(&client, "hello", Vec::new()).await.unwrap();

    assert!(exchange.is_fatal());
    assert_eq!(conversation.len(), 2);
    assert!(conversation.last().unwrap().failed);
}

#[tokio::test]
async fn test_conversation_rejects_empty_turn() {
    let session = ScriptedSession::new(Vec::new());
    let client = client(ScriptedConnector::new(session.clone()));
    let mut conversation = Conversation::new();

    let err = conversation.submit(&client, "   ", Vec::new()).await.unwrap_err();

    assert!(matches!(err, ConversationError::EmptyTurn));
    assert!(conversation.is_empty());
    assert_eq!(session.calls(), 0);
}

#[tokio::test]
async fn test_abandoned_submission_does_not_block_the_next() {
    let gate = Arc::new(Notify::new());
    let session = ScriptedSession::gated(vec![Ok(ModelReply::text("answered"))], gate.clone());
    let client = client(ScriptedConnector::new(session.clone()));
    let mut conversation = Conversation::new();

    {
        let pending = conversation.submit(&client, "first", Vec::new());
        tokio::pin!(pending);
        tokio::select! {
            _ = &mut pending => panic!("gated send should not complete"),
            _ = session.entered.notified() => {}
        }
    }
    assert_eq!(client.state(), SessionState::Ready);

    gate.notify_one();
    let exchange = conversation.submit(&client, "second", Vec::new()).await.unwrap();

    assert!(matches!(exchange, Exchange::Answered));
    assert!(!conversation.is_loading());
    assert_eq!(conversation.last().unwrap().text(), "answered");
    assert_eq!(session.calls(), 2);
}
