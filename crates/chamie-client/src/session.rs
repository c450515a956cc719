//! Chat session: submission, stream consumption, and the user-gated
//! continue-generation flow.
//!
//! A session owns one [`Conversation`] and drives exactly one generation at
//! a time over a [`ChatTransport`]. Exclusivity is structural — consuming a
//! stream holds `&mut self` — and the session additionally rejects any
//! overlapping submit or continue it can observe, so nothing is ever
//! processed concurrently or queued.
//!
//! Per assistant message the states are: complete, flagged (the truncation
//! heuristic fired after a clean stream end), and continuing (a follow-up
//! generation is appending onto it). Flagged to continuing is always
//! user-gated; the session never continues on its own.

use std::collections::HashSet;

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::BoxStream;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use chamie_protocol::{ChatMessage, ChatRequest, StreamEvent};

use crate::conversation::Conversation;
use crate::error::ClientError;
use crate::file_context::FileContext;
use crate::truncation::{TruncationPolicy, is_likely_truncated};

/// Fixed synthetic user turn sent when continuing a truncated answer.
pub const CONTINUE_INSTRUCTION: &str =
    "Continue the previous answer from exactly where it stopped, preserving context.";

/// Decoded event stream handed back by a transport.
pub type EventStream = BoxStream<'static, Result<StreamEvent, ClientError>>;

/// Seam between the session and the wire.
///
/// The HTTP implementation lives in [`crate::transport`]; tests substitute
/// scripted streams.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Open a generation stream for the given request.
    async fn stream_chat(&self, request: ChatRequest) -> Result<EventStream, ClientError>;
}

/// Lifecycle state of an assistant message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageState {
    Complete,
    /// Heuristic says the answer probably got cut off.
    Flagged,
    /// A continue-generation stream is appending onto it right now.
    Continuing,
}

/// Result of one consumed generation stream.
#[derive(Debug, Clone)]
pub struct StreamOutcome {
    pub message_id: String,
    /// Full message content after the stream closed (partial on abort or
    /// mid-stream error; nothing is rolled back).
    pub content: String,
    /// Heuristic verdict. Only evaluated after a clean completion.
    pub truncated: bool,
    /// Stream was stopped by the user.
    pub aborted: bool,
    /// Terminal upstream error delivered mid-stream, if any.
    pub error: Option<String>,
}

/// One conversation plus the machinery to grow it.
pub struct ChatSession<T: ChatTransport> {
    transport: T,
    conversation: Conversation,
    file: Option<FileContext>,
    flagged: HashSet<String>,
    continuing: Option<String>,
    policy: TruncationPolicy,
    /// Invoked after every appended fragment so a frontend can re-render.
    /// Must be a full re-render from current state, cheap enough to run at
    /// fragment granularity.
    fragment_hook: Option<Box<dyn Fn(&str) + Send + Sync>>,
}

impl<T: ChatTransport> ChatSession<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            conversation: Conversation::new(),
            file: None,
            flagged: HashSet::new(),
            continuing: None,
            policy: TruncationPolicy::default(),
            fragment_hook: None,
        }
    }

    pub fn with_policy(mut self, policy: TruncationPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Install a callback fired after each fragment lands in the transcript.
    pub fn set_fragment_hook(&mut self, hook: impl Fn(&str) + Send + Sync + 'static) {
        self.fragment_hook = Some(Box::new(hook));
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn file(&self) -> Option<&FileContext> {
        self.file.as_ref()
    }

    /// Replace (not merge) the active grounding file.
    pub fn upload_file(
        &mut self,
        name: impl Into<String>,
        raw_text: impl Into<String>,
    ) -> Result<(), ClientError> {
        self.file = Some(FileContext::from_upload(name, raw_text)?);
        Ok(())
    }

    pub fn remove_file(&mut self) {
        self.file = None;
    }

    pub fn is_flagged(&self, id: &str) -> bool {
        self.flagged.contains(id)
    }

    pub fn state_of(&self, id: &str) -> MessageState {
        if self.continuing.as_deref() == Some(id) {
            MessageState::Continuing
        } else if self.flagged.contains(id) {
            MessageState::Flagged
        } else {
            MessageState::Complete
        }
    }

    /// Submit a user message and stream the answer to completion.
    pub async fn send(&mut self, text: &str) -> Result<StreamOutcome, ClientError> {
        self.send_with_abort(text, CancellationToken::new()).await
    }

    /// Submit with an externally held abort token. Cancelling the token
    /// stops the stream: no fragment is appended after the cancellation is
    /// observed, and the in-flight message closes exactly once with its
    /// partial content intact.
    pub async fn send_with_abort(
        &mut self,
        text: &str,
        abort: CancellationToken,
    ) -> Result<StreamOutcome, ClientError> {
        if self.conversation.streaming_id().is_some() || self.continuing.is_some() {
            return Err(ClientError::InFlight);
        }
        let text = text.trim();
        if text.is_empty() {
            return Err(ClientError::EmptyMessage);
        }

        self.conversation.push_user(text);
        let request = self.build_request(self.conversation.history());
        let stream = self.transport.stream_chat(request).await?;

        let message_id = self
            .conversation
            .begin_assistant()
            .ok_or(ClientError::InFlight)?;
        self.consume(message_id, stream, abort).await
    }

    /// Continue a flagged message. User-gated: callers invoke this off an
    /// explicit action, never automatically, and there is no retry cap —
    /// a still-flagged result may be continued again.
    pub async fn continue_message(&mut self, id: &str) -> Result<StreamOutcome, ClientError> {
        self.continue_with_abort(id, CancellationToken::new())
            .await
    }

    pub async fn continue_with_abort(
        &mut self,
        id: &str,
        abort: CancellationToken,
    ) -> Result<StreamOutcome, ClientError> {
        if self.conversation.streaming_id().is_some() || self.continuing.is_some() {
            return Err(ClientError::InFlight);
        }
        if self.conversation.get(id).is_none() {
            return Err(ClientError::UnknownMessage(id.to_string()));
        }
        if !self.flagged.contains(id) {
            return Err(ClientError::NotFlagged(id.to_string()));
        }

        let mut history = self.conversation.history();
        history.push(ChatMessage::user(CONTINUE_INSTRUCTION));
        let request = self.build_request(history);
        let stream = self.transport.stream_chat(request).await?;

        if !self.conversation.reopen(id) {
            return Err(ClientError::InFlight);
        }
        self.continuing = Some(id.to_string());
        let outcome = self.consume(id.to_string(), stream, abort).await;
        self.continuing = None;
        outcome
    }

    fn build_request(&self, messages: Vec<ChatMessage>) -> ChatRequest {
        ChatRequest::Conversation {
            messages,
            file_context: self.file.as_ref().map(|f| f.derived_text.clone()),
            require_file_context: self.file.is_some(),
        }
    }

    /// Drain one generation stream into the open message.
    ///
    /// Fragments append strictly in arrival order. The loop ends on the
    /// `[DONE]` sentinel, transport EOF, a terminal error frame, or abort;
    /// whichever way it ends, the message closes once and keeps whatever
    /// already arrived. The truncation heuristic runs only after a clean
    /// end, exactly once.
    async fn consume(
        &mut self,
        message_id: String,
        mut stream: EventStream,
        abort: CancellationToken,
    ) -> Result<StreamOutcome, ClientError> {
        let mut error = None;
        let mut aborted = false;

        loop {
            tokio::select! {
                biased;
                _ = abort.cancelled() => {
                    debug!(message_id = %message_id, "stream aborted by user");
                    aborted = true;
                    break;
                }
                next = stream.next() => {
                    match next {
                        Some(Ok(StreamEvent::Content(fragment))) => {
                            self.conversation.append_fragment(&fragment);
                            if let Some(hook) = &self.fragment_hook {
                                hook(&fragment);
                            }
                        }
                        Some(Ok(StreamEvent::Error(message))) => {
                            error = Some(message);
                            break;
                        }
                        Some(Ok(StreamEvent::Done)) | None => break,
                        Some(Err(err)) => {
                            error = Some(err.to_string());
                            break;
                        }
                    }
                }
            }
        }

        self.conversation.finish_streaming();
        let content = self
            .conversation
            .get(&message_id)
            .map(|m| m.content.clone())
            .unwrap_or_default();

        let mut truncated = false;
        if error.is_none() && !aborted {
            truncated = is_likely_truncated(&content, self.policy);
            if truncated {
                self.flagged.insert(message_id.clone());
            } else {
                self.flagged.remove(&message_id);
            }
        }

        Ok(StreamOutcome {
            message_id,
            content,
            truncated,
            aborted,
            error,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use tokio::sync::mpsc;
    use tokio_stream::wrappers::UnboundedReceiverStream;

    fn content(s: &str) -> Result<StreamEvent, ClientError> {
        Ok(StreamEvent::Content(s.to_string()))
    }

    fn done() -> Result<StreamEvent, ClientError> {
        Ok(StreamEvent::Done)
    }

    /// Scripted transport: each `stream_chat` call pops the next canned
    /// stream and records the request it was given.
    #[derive(Default)]
    struct MockTransport {
        streams: Mutex<VecDeque<EventStream>>,
        requests: Mutex<Vec<ChatRequest>>,
    }

    impl MockTransport {
        fn scripted(scripts: Vec<Vec<Result<StreamEvent, ClientError>>>) -> Self {
            let transport = Self::default();
            for script in scripts {
                transport
                    .streams
                    .lock()
                    .unwrap()
                    .push_back(futures::stream::iter(script).boxed());
            }
            transport
        }

        fn push_channel(&self, rx: mpsc::UnboundedReceiver<Result<StreamEvent, ClientError>>) {
            self.streams
                .lock()
                .unwrap()
                .push_back(UnboundedReceiverStream::new(rx).boxed());
        }

        fn recorded_requests(&self) -> Vec<ChatRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ChatTransport for MockTransport {
        async fn stream_chat(&self, request: ChatRequest) -> Result<EventStream, ClientError> {
            self.requests.lock().unwrap().push(request);
            self.streams
                .lock()
                .unwrap()
                .pop_front()
                .ok_or(ClientError::Api {
                    status: 500,
                    message: "no scripted stream".to_string(),
                })
        }
    }

    #[tokio::test]
    async fn test_send_reconstructs_fragments_in_order() {
        let transport =
            MockTransport::scripted(vec![vec![content("Hel"), content("lo."), done()]]);
        let mut session = ChatSession::new(transport);

        let outcome = session.send("hi").await.unwrap();
        assert_eq!(outcome.content, "Hello.");
        assert!(!outcome.truncated);
        assert!(!outcome.aborted);
        assert!(outcome.error.is_none());
        assert_eq!(session.state_of(&outcome.message_id), MessageState::Complete);
    }

    #[tokio::test]
    async fn test_fragment_hook_sees_every_fragment_in_order() {
        use std::sync::Arc;

        let transport =
            MockTransport::scripted(vec![vec![content("a"), content("b"), content("c."), done()]]);
        let mut session = ChatSession::new(transport);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        session.set_fragment_hook(move |fragment| {
            sink.lock().unwrap().push(fragment.to_string());
        });

        session.send("hi").await.unwrap();
        assert_eq!(*seen.lock().unwrap(), vec!["a", "b", "c."]);
    }

    #[tokio::test]
    async fn test_empty_submit_rejected() {
        let transport = MockTransport::scripted(vec![]);
        let mut session = ChatSession::new(transport);
        assert!(matches!(
            session.send("   ").await,
            Err(ClientError::EmptyMessage)
        ));
    }

    #[tokio::test]
    async fn test_truncated_answer_gets_flagged() {
        let transport = MockTransport::scripted(vec![vec![
            content("```js\nconsole.log("),
            done(),
        ]]);
        let mut session = ChatSession::new(transport);

        let outcome = session.send("write code").await.unwrap();
        assert!(outcome.truncated);
        assert_eq!(session.state_of(&outcome.message_id), MessageState::Flagged);
    }

    #[tokio::test]
    async fn test_continue_appends_exact_concatenation() {
        let transport = MockTransport::scripted(vec![
            vec![content("Step 1: foo"), content("```x"), done()],
            vec![content("bar"), content("baz\n```\nDone."), done()],
        ]);
        let mut session = ChatSession::new(transport);

        let first = session.send("explain").await.unwrap();
        assert!(first.truncated);

        let second = session.continue_message(&first.message_id).await.unwrap();
        assert_eq!(second.message_id, first.message_id);
        assert_eq!(second.content, "Step 1: foo```xbarbaz\n```\nDone.");
        assert!(!second.truncated);
        assert_eq!(session.state_of(&first.message_id), MessageState::Complete);
    }

    #[tokio::test]
    async fn test_continue_request_carries_synthetic_instruction() {
        let transport = MockTransport::scripted(vec![
            vec![content("```\nunfinished"), done()],
            vec![content("\n```\nok."), done()],
        ]);
        let mut session = ChatSession::new(transport);

        let first = session.send("go").await.unwrap();
        session.continue_message(&first.message_id).await.unwrap();

        let requests = session.transport.recorded_requests();
        assert_eq!(requests.len(), 2);
        let parts = requests[1].clone().into_parts();
        let last = parts.messages.last().unwrap();
        assert_eq!(last.content, CONTINUE_INSTRUCTION);
        // History before the instruction includes the truncated answer.
        let prior = &parts.messages[parts.messages.len() - 2];
        assert_eq!(prior.content, "```\nunfinished");
    }

    #[tokio::test]
    async fn test_continue_rejected_when_not_flagged() {
        let transport = MockTransport::scripted(vec![vec![content("All done."), done()]]);
        let mut session = ChatSession::new(transport);

        let outcome = session.send("hi").await.unwrap();
        assert!(matches!(
            session.continue_message(&outcome.message_id).await,
            Err(ClientError::NotFlagged(_))
        ));
        assert!(matches!(
            session.continue_message("missing-id").await,
            Err(ClientError::UnknownMessage(_))
        ));
    }

    #[tokio::test]
    async fn test_file_context_rides_along_verbatim() {
        let transport = MockTransport::scripted(vec![vec![content("Grounded."), done()]]);
        let mut session = ChatSession::new(transport);
        session.upload_file("notes.txt", "Topics:\n1. streams").unwrap();
        let derived = session.file().unwrap().derived_text.clone();

        session.send("what are the topics?").await.unwrap();

        let requests = session.transport.recorded_requests();
        let parts = requests[0].clone().into_parts();
        assert_eq!(parts.file_context.as_deref(), Some(derived.as_str()));
        assert!(parts.require_file_context);
    }

    #[tokio::test]
    async fn test_replacing_file_drops_previous_context() {
        let transport = MockTransport::scripted(vec![]);
        let mut session = ChatSession::new(transport);
        session.upload_file("a.txt", "first").unwrap();
        session.upload_file("b.txt", "second").unwrap();
        assert_eq!(session.file().unwrap().name, "b.txt");
        session.remove_file();
        assert!(session.file().is_none());
    }

    #[tokio::test]
    async fn test_midstream_error_keeps_partial_content() {
        let transport = MockTransport::scripted(vec![vec![
            content("partial "),
            Ok(StreamEvent::Error("upstream failed".to_string())),
            content("after error"),
        ]]);
        let mut session = ChatSession::new(transport);

        let outcome = session.send("hi").await.unwrap();
        assert_eq!(outcome.content, "partial ");
        assert_eq!(outcome.error.as_deref(), Some("upstream failed"));
        // Error endings skip the heuristic; nothing gets flagged.
        assert!(!outcome.truncated);
        assert_eq!(session.state_of(&outcome.message_id), MessageState::Complete);
    }

    #[tokio::test]
    async fn test_abort_ignores_late_fragments() {
        let (tx, rx) = mpsc::unbounded_channel();
        let transport = MockTransport::default();
        transport.push_channel(rx);
        let mut session = ChatSession::new(transport);
        let abort = CancellationToken::new();

        let driver = async {
            tx.send(content("Step 1: foo")).unwrap();
            tokio::task::yield_now().await;
            abort.cancel();
            // The stream keeps emitting after the abort; nothing below may
            // reach the message.
            tx.send(content("LATE")).unwrap();
            tx.send(done()).unwrap();
        };

        let (outcome, ()) = futures::join!(session.send_with_abort("hi", abort.clone()), driver);
        let outcome = outcome.unwrap();
        assert!(outcome.aborted);
        assert_eq!(outcome.content, "Step 1: foo");
        assert_eq!(
            session.conversation().get(&outcome.message_id).unwrap().content,
            "Step 1: foo"
        );
        // Aborts close the message without running the heuristic.
        assert!(!outcome.truncated);
        assert!(session.conversation().streaming_id().is_none());
    }
}
