//! Ordered, append-only message log
//!
//! The only in-place mutation is replacing the content of the final entry,
//! which is how a streaming assistant reply grows. Every mutation is
//! published to subscribers in the order it happened.

use thiserror::Error;
use tokio::sync::mpsc;

use crate::state::Message;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TranscriptError {
    #[error("transcript is empty, there is no last message to replace")]
    Empty,
}

/// Change notification sent to transcript subscribers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranscriptEvent {
    Appended { index: usize, message: Message },
    LastReplaced { index: usize, content: String },
    Reset,
}

#[derive(Debug, Default)]
pub struct Transcript {
    messages: Vec<Message>,
    subscribers: Vec<mpsc::UnboundedSender<TranscriptEvent>>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, message: Message) {
        let index = self.messages.len();
        self.messages.push(message.clone());
        self.publish(TranscriptEvent::Appended { index, message });
    }

    pub fn replace_last(&mut self, content: impl Into<String>) -> Result<(), TranscriptError> {
        let index = self.messages.len().checked_sub(1).ok_or(TranscriptError::Empty)?;
        let content = content.into();
        self.messages[index].content = content.clone();
        self.publish(TranscriptEvent::LastReplaced { index, content });
        Ok(())
    }

    pub fn snapshot(&self) -> Vec<Message> {
        self.messages.clone()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Drop every entry (logout). Not part of the chat flow itself.
    pub fn reset(&mut self) {
        self.messages.clear();
        self.publish(TranscriptEvent::Reset);
    }

    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<TranscriptEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.push(tx);
        rx
    }

    fn publish(&mut self, event: TranscriptEvent) {
        // Receivers that went away are pruned on the next publish
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Role;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_append_preserves_order() {
        let mut t = Transcript::new();
        t.append(Message::user("one"));
        t.append(Message::assistant("two"));
        t.append(Message::system("three"));

        let roles: Vec<Role> = t.snapshot().iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant, Role::System]);
    }

    #[test]
    fn test_replace_last_only_touches_final_entry() {
        let mut t = Transcript::new();
        t.append(Message::user("question"));
        t.append(Message::assistant(""));
        t.replace_last("answer").unwrap();

        assert_eq!(
            t.snapshot(),
            vec![Message::user("question"), Message::assistant("answer")]
        );
    }

    #[test]
    fn test_replace_last_on_empty_is_error() {
        let mut t = Transcript::new();
        assert_eq!(t.replace_last("x"), Err(TranscriptError::Empty));
        assert!(t.is_empty());
    }

    #[test]
    fn test_subscribers_see_mutations_in_order() {
        let mut t = Transcript::new();
        let mut rx = t.subscribe();

        t.append(Message::assistant(""));
        t.replace_last("Hel").unwrap();
        t.replace_last("Hello").unwrap();
        t.reset();

        assert_eq!(
            rx.try_recv().unwrap(),
            TranscriptEvent::Appended { index: 0, message: Message::assistant("") }
        );
        assert_eq!(
            rx.try_recv().unwrap(),
            TranscriptEvent::LastReplaced { index: 0, content: "Hel".to_string() }
        );
        assert_eq!(
            rx.try_recv().unwrap(),
            TranscriptEvent::LastReplaced { index: 0, content: "Hello".to_string() }
        );
        assert_eq!(rx.try_recv().unwrap(), TranscriptEvent::Reset);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_dropped_subscriber_is_pruned() {
        let mut t = Transcript::new();
        let rx = t.subscribe();
        drop(rx);

        t.append(Message::user("hi"));
        assert!(t.subscribers.is_empty());
        assert_eq!(t.len(), 1);
    }
}
