//! Conversation state.
//!
//! An ordered, append-only list of messages. The only in-place mutation is
//! the content of the single message currently being streamed; once a
//! message stops streaming its content is frozen (until a continue cycle
//! explicitly reopens it).

use chamie_protocol::{ChatMessage, Role};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// One message in the transcript.
#[derive(Debug, Clone)]
pub struct Message {
    /// Unique within the conversation.
    pub id: String,
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
    /// Content is mutable only while this is true.
    pub streaming: bool,
}

/// Ordered transcript with the single-streaming-message invariant.
#[derive(Debug, Default)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    /// Id of the message currently streaming, if any.
    pub fn streaming_id(&self) -> Option<&str> {
        self.messages
            .iter()
            .find(|m| m.streaming)
            .map(|m| m.id.as_str())
    }

    /// Append a completed user turn. Returns the new message id.
    pub fn push_user(&mut self, content: impl Into<String>) -> String {
        let id = Uuid::new_v4().to_string();
        // User turns arrive whole; they are never left open.
        self.messages.push(Message {
            id: id.clone(),
            role: Role::User,
            content: content.into(),
            created_at: Utc::now(),
            streaming: false,
        });
        id
    }

    /// Open an empty assistant message to receive streamed fragments.
    ///
    /// Returns `None` when another message is already streaming; callers
    /// gate submissions on that.
    pub fn begin_assistant(&mut self) -> Option<String> {
        if self.streaming_id().is_some() {
            return None;
        }
        let id = Uuid::new_v4().to_string();
        self.messages.push(Message {
            id: id.clone(),
            role: Role::Assistant,
            content: String::new(),
            created_at: Utc::now(),
            streaming: true,
        });
        Some(id)
    }

    /// Reopen a completed assistant message for a continue-generation cycle.
    ///
    /// Fails (returns `false`) when the id is unknown, not an assistant
    /// message, or another message is already streaming.
    pub fn reopen(&mut self, id: &str) -> bool {
        if self.streaming_id().is_some() {
            return false;
        }
        match self
            .messages
            .iter_mut()
            .find(|m| m.id == id && m.role == Role::Assistant)
        {
            Some(message) => {
                message.streaming = true;
                true
            }
            None => false,
        }
    }

    /// Append a fragment to the streaming message, in arrival order.
    ///
    /// A fragment arriving with no message open (e.g. after an abort) is
    /// dropped, which is exactly the post-abort contract.
    pub fn append_fragment(&mut self, fragment: &str) {
        if let Some(message) = self.messages.iter_mut().find(|m| m.streaming) {
            message.content.push_str(fragment);
        }
    }

    /// Close the streaming message, freezing its content.
    ///
    /// Returns the closed message's id and final content, or `None` when
    /// nothing was streaming — a second call is therefore a no-op, which
    /// gives the close-exactly-once behavior.
    pub fn finish_streaming(&mut self) -> Option<(String, String)> {
        let message = self.messages.iter_mut().find(|m| m.streaming)?;
        message.streaming = false;
        Some((message.id.clone(), message.content.clone()))
    }

    /// The wire-shaped history: every closed turn, in order.
    pub fn history(&self) -> Vec<ChatMessage> {
        self.messages
            .iter()
            .filter(|m| !m.streaming)
            .map(|m| ChatMessage {
                role: m.role,
                content: m.content.clone(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fragments_concatenate_in_order() {
        let mut conv = Conversation::new();
        conv.push_user("hi");
        conv.begin_assistant().unwrap();
        for fragment in ["Step ", "1: ", "foo"] {
            conv.append_fragment(fragment);
        }
        let (_, content) = conv.finish_streaming().unwrap();
        assert_eq!(content, "Step 1: foo");
    }

    #[test]
    fn test_single_streaming_message_invariant() {
        let mut conv = Conversation::new();
        let first = conv.begin_assistant();
        assert!(first.is_some());
        assert!(conv.begin_assistant().is_none());
        conv.finish_streaming();
        assert!(conv.begin_assistant().is_some());
    }

    #[test]
    fn test_finish_is_exactly_once() {
        let mut conv = Conversation::new();
        conv.begin_assistant().unwrap();
        conv.append_fragment("partial");
        assert!(conv.finish_streaming().is_some());
        assert!(conv.finish_streaming().is_none());
    }

    #[test]
    fn test_fragment_after_finish_is_dropped() {
        let mut conv = Conversation::new();
        let id = conv.begin_assistant().unwrap();
        conv.append_fragment("kept");
        conv.finish_streaming();
        conv.append_fragment("late");
        assert_eq!(conv.get(&id).unwrap().content, "kept");
    }

    #[test]
    fn test_reopen_appends_to_existing_content() {
        let mut conv = Conversation::new();
        let id = conv.begin_assistant().unwrap();
        conv.append_fragment("Step 1: foo");
        conv.finish_streaming();

        assert!(conv.reopen(&id));
        conv.append_fragment("bar");
        conv.append_fragment("baz");
        let (finished_id, content) = conv.finish_streaming().unwrap();
        assert_eq!(finished_id, id);
        assert_eq!(content, "Step 1: foobarbaz");
    }

    #[test]
    fn test_reopen_refuses_user_messages_and_unknown_ids() {
        let mut conv = Conversation::new();
        let user_id = conv.push_user("hi");
        assert!(!conv.reopen(&user_id));
        assert!(!conv.reopen("nope"));
    }

    #[test]
    fn test_history_excludes_open_message() {
        let mut conv = Conversation::new();
        conv.push_user("question");
        conv.begin_assistant().unwrap();
        conv.append_fragment("in flight");
        let history = conv.history();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].content, "question");
    }
}
