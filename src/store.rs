use chrono::Local;
use thiserror::Error;

use crate::completion::{CompletionClient, CompletionError, CompletionRequest};
use crate::message::{Attachment, ChatMessage, MessageId, Sender};

pub const ERROR_REPLY: &str = "Sorry, I encountered an issue processing your request. Please try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SendRejected {
    #[error("nothing to send")]
    Empty,
    #[error("still waiting for the previous reply")]
    Busy,
}

/// Request data for a turn whose user message is already in the history.
#[derive(Debug, Clone)]
pub struct PendingTurn {
    epoch: u64,
    pub request: CompletionRequest,
}

/// Ordered chat history plus the busy flag for one widget instance.
#[derive(Debug)]
pub struct MessageStore {
    greeting: String,
    messages: Vec<ChatMessage>,
    next_id: u64,
    epoch: u64,
    waiting: bool,
}

impl MessageStore {
    pub fn new(greeting: impl Into<String>) -> Self {
        let mut store = MessageStore {
            greeting: greeting.into(),
            messages: Vec::new(),
            next_id: 1,
            epoch: 0,
            waiting: false,
        };
        store.push_greeting();
        store
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn is_waiting_for_reply(&self) -> bool {
        self.waiting
    }

    /// Records the user message and marks the store busy.
    pub fn begin_turn(&mut self, text: &str, attachments: Vec<Attachment>) -> Result<PendingTurn, SendRejected> {
        if self.waiting {
            return Err(SendRejected::Busy);
        }
        if text.trim().is_empty() && attachments.is_empty() {
            return Err(SendRejected::Empty);
        }

        self.push(Sender::User, text.to_string(), attachments.clone());
        self.waiting = true;

        Ok(PendingTurn {
            epoch: self.epoch,
            request: CompletionRequest {
                text: text.to_string(),
                attachments,
            },
        })
    }

    /// Appends the reply (or the error text) and clears the busy flag.
    ///
    /// A turn that started before the last [`reset`](Self::reset) only clears the flag.
    pub fn finish_turn(&mut self, turn: PendingTurn, result: Result<String, CompletionError>) {
        self.waiting = false;

        if turn.epoch != self.epoch {
            tracing::debug!("dropping reply for a turn started before reset");
            return;
        }

        let content = match result {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!("failed to get assistant reply: {e}");
                ERROR_REPLY.to_string()
            }
        };
        self.push(Sender::Assistant, content, Vec::new());
    }

    /// Full turn against `client`: optimistic user echo, one request, reply appended.
    pub async fn append_user_message(
        &mut self,
        client: &dyn CompletionClient,
        text: &str,
        attachments: Vec<Attachment>,
    ) -> Result<(), SendRejected> {
        let turn = self.begin_turn(text, attachments)?;
        let result = client.complete(&turn.request).await;
        self.finish_turn(turn, result);
        Ok(())
    }

    pub fn reset(&mut self) {
        self.messages.clear();
        self.epoch += 1;
        self.push_greeting();
    }

    fn push_greeting(&mut self) {
        let greeting = self.greeting.clone();
        self.push(Sender::Assistant, greeting, Vec::new());
    }

    fn push(&mut self, sender: Sender, content: String, attachments: Vec<Attachment>) {
        let id = MessageId(self.next_id);
        self.next_id += 1;
        self.messages.push(ChatMessage {
            id,
            content,
            sender,
            timestamp: Local::now(),
            attachments,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::future::BoxFuture;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const GREETING: &str = "Hello! How can I help you today?";

    struct Scripted {
        reply: Option<&'static str>,
        calls: AtomicUsize,
    }

    impl Scripted {
        fn ok(reply: &'static str) -> Self {
            Scripted { reply: Some(reply), calls: AtomicUsize::new(0) }
        }

        fn failing() -> Self {
            Scripted { reply: None, calls: AtomicUsize::new(0) }
        }
    }

    impl CompletionClient for Scripted {
        fn complete<'a>(&'a self, _request: &'a CompletionRequest) -> BoxFuture<'a, Result<String, CompletionError>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let result = match self.reply {
                Some(reply) => Ok(reply.to_string()),
                None => Err(CompletionError::Status { code: 500, body: "boom".to_string() }),
            };
            Box::pin(async move { result })
        }
    }

    fn contents(store: &MessageStore) -> Vec<(Sender, &str)> {
        store.messages().iter().map(|m| (m.sender, m.content.as_str())).collect()
    }

    #[tokio::test]
    async fn test_successful_turn() {
        let client = Scripted::ok("hello");
        let mut store = MessageStore::new(GREETING);

        store.append_user_message(&client, "hi", Vec::new()).await.unwrap();

        assert_eq!(
            contents(&store),
            vec![(Sender::Assistant, GREETING), (Sender::User, "hi"), (Sender::Assistant, "hello")]
        );
        assert!(!store.is_waiting_for_reply());
    }

    #[tokio::test]
    async fn test_failed_turn_appends_error_text() {
        let client = Scripted::failing();
        let mut store = MessageStore::new(GREETING);

        store.append_user_message(&client, "hi", Vec::new()).await.unwrap();

        assert_eq!(
            contents(&store),
            vec![(Sender::Assistant, GREETING), (Sender::User, "hi"), (Sender::Assistant, ERROR_REPLY)]
        );
        assert!(!store.is_waiting_for_reply());
    }

    #[tokio::test]
    async fn test_blank_input_is_a_no_op() {
        let client = Scripted::ok("unused");
        let mut store = MessageStore::new(GREETING);

        for text in ["", "   ", "\n\t"] {
            let result = store.append_user_message(&client, text, Vec::new()).await;
            assert_eq!(result, Err(SendRejected::Empty));
        }

        assert_eq!(store.messages().len(), 1);
        assert_eq!(client.calls.load(Ordering::SeqCst), 0);
        assert!(!store.is_waiting_for_reply());
    }

    #[test]
    fn test_attachments_alone_can_be_sent() {
        let mut store = MessageStore::new(GREETING);
        let file = Attachment::from_bytes("a.txt", b"abc".to_vec());

        let turn = store.begin_turn("", vec![file]).unwrap();
        assert_eq!(turn.request.attachments.len(), 1);
        assert_eq!(store.messages()[1].attachments.len(), 1);
    }

    #[test]
    fn test_second_send_while_waiting_is_rejected() {
        let mut store = MessageStore::new(GREETING);

        let turn = store.begin_turn("first", Vec::new()).unwrap();
        assert!(store.is_waiting_for_reply());
        assert_eq!(store.begin_turn("second", Vec::new()).unwrap_err(), SendRejected::Busy);
        assert_eq!(store.messages().len(), 2);

        store.finish_turn(turn, Ok("done".to_string()));
        assert!(store.begin_turn("third", Vec::new()).is_ok());
    }

    #[test]
    fn test_user_message_visible_before_reply() {
        let mut store = MessageStore::new(GREETING);
        let _turn = store.begin_turn("echo me", Vec::new()).unwrap();

        let last = store.messages().last().unwrap();
        assert!(last.is_user());
        assert_eq!(last.content, "echo me");
    }

    #[tokio::test]
    async fn test_history_is_append_only_and_ordered() {
        let client = Scripted::ok("ok");
        let mut store = MessageStore::new(GREETING);
        let mut seen = store.messages().to_vec();

        for text in ["one", "two", "", "three"] {
            let _ = store.append_user_message(&client, text, Vec::new()).await;
            let now = store.messages();
            assert!(now.len() >= seen.len());
            for (before, after) in seen.iter().zip(now) {
                assert_eq!(before.id, after.id);
                assert_eq!(before.content, after.content);
            }
            seen = now.to_vec();
        }

        let ids: Vec<MessageId> = store.messages().iter().map(|m| m.id).collect();
        assert!(ids.windows(2).all(|w| w[0] < w[1]));
        assert!(store.messages().windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
        assert_eq!(store.messages().len(), 7);
    }

    #[tokio::test]
    async fn test_reset_restores_greeting() {
        let client = Scripted::ok("reply");
        let mut store = MessageStore::new(GREETING);
        for text in ["a", "b", "c"] {
            store.append_user_message(&client, text, Vec::new()).await.unwrap();
        }

        store.reset();

        assert_eq!(contents(&store), vec![(Sender::Assistant, GREETING)]);
    }

    #[test]
    fn test_reply_after_reset_is_dropped() {
        let mut store = MessageStore::new(GREETING);
        let turn = store.begin_turn("slow question", Vec::new()).unwrap();

        store.reset();
        store.finish_turn(turn, Ok("late answer".to_string()));

        assert_eq!(contents(&store), vec![(Sender::Assistant, GREETING)]);
        assert!(!store.is_waiting_for_reply());
    }
}
