//! Plain-text rendering of transcript events for a terminal
//!
//! The assistant reply arrives as a sequence of whole-content replacements;
//! the view prints only what is new since the last update. When a reply is
//! rewritten rather than extended (the apology after a failure), the new
//! content is printed on its own line.

use crate::format::with_breaks;
use crate::state::Role;
use crate::transcript::TranscriptEvent;

#[derive(Debug, Default)]
pub struct TranscriptView {
    shown: String,
}

impl TranscriptView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Text to write for one event. Empty when nothing changes on screen.
    pub fn render(&mut self, event: &TranscriptEvent) -> String {
        match event {
            TranscriptEvent::Appended { message, .. } => {
                self.shown.clear();
                match message.role {
                    // Already on screen as typed input
                    Role::User => String::new(),
                    Role::System => format!("{}\n", message.content),
                    Role::Assistant => {
                        self.shown = with_breaks(&message.content);
                        format!("AI: {}", self.shown)
                    }
                }
            }
            TranscriptEvent::LastReplaced { content, .. } => {
                let formatted = with_breaks(content);
                let out = match formatted.strip_prefix(self.shown.as_str()) {
                    Some(delta) => delta.to_string(),
                    None => format!("\n{}", formatted),
                };
                self.shown = formatted;
                out
            }
            TranscriptEvent::Reset => {
                self.shown.clear();
                String::new()
            }
        }
    }
}
