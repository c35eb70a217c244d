//! Conversation context window
//!
//! The chat transcript itself lives with an external collaborator; the core
//! only reads the most recent turns to derive a bounded prompt context and
//! the first-interaction flag.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

/// Who produced a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Bot,
}

/// One turn of the conversation, keyed by timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub text: String,
    pub sender: Sender,
    pub timestamp: DateTime<Utc>,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            sender: Sender::User,
            timestamp: Utc::now(),
        }
    }

    pub fn bot(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            sender: Sender::Bot,
            timestamp: Utc::now(),
        }
    }
}

/// Read interface over the durable transcript: the last `n` turns in
/// chronological order.
pub trait Transcript: Send + Sync {
    fn recent(&self, n: usize) -> Vec<Turn>;
}

/// In-memory transcript, used by the CLI session and tests.
#[derive(Default)]
pub struct MemoryTranscript {
    turns: Mutex<Vec<Turn>>,
}

impl MemoryTranscript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, turn: Turn) {
        self.turns.lock().unwrap().push(turn);
    }
}

impl Transcript for MemoryTranscript {
    fn recent(&self, n: usize) -> Vec<Turn> {
        let turns = self.turns.lock().unwrap();
        let start = turns.len().saturating_sub(n);
        turns[start..].to_vec()
    }
}

/// The window derived from recent turns.
#[derive(Debug, Clone)]
pub struct Conversation {
    /// Turns included in the generation prompt, chronological.
    pub prompt_turns: Vec<Turn>,
    /// True iff no bot turn appears in the inspected window.
    pub is_first_interaction: bool,
}

/// Derives a bounded conversation context from the transcript.
#[derive(Debug, Clone)]
pub struct ContextWindow {
    /// Turns inspected for the first-interaction check.
    pub max_total: usize,
    /// Turns actually forwarded into the prompt.
    pub max_in_prompt: usize,
}

impl Default for ContextWindow {
    fn default() -> Self {
        Self {
            max_total: 10,
            max_in_prompt: 6,
        }
    }
}

impl ContextWindow {
    pub fn new(max_total: usize, max_in_prompt: usize) -> Self {
        Self {
            max_total,
            max_in_prompt,
        }
    }

    /// Derive the prompt window and first-interaction flag.
    ///
    /// The flag is a window-local approximation: it only inspects the last
    /// `max_total` turns, so after a conversation longer than the retained
    /// window the bot may introduce itself again. Known boundary behavior,
    /// kept as-is.
    pub fn window(&self, turns: &[Turn]) -> Conversation {
        let start = turns.len().saturating_sub(self.max_total);
        let retained = &turns[start..];

        let is_first_interaction = !retained.iter().any(|t| t.sender == Sender::Bot);

        let prompt_start = retained.len().saturating_sub(self.max_in_prompt);
        Conversation {
            prompt_turns: retained[prompt_start..].to_vec(),
            is_first_interaction,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn turns(pattern: &[Sender]) -> Vec<Turn> {
        pattern
            .iter()
            .enumerate()
            .map(|(i, s)| Turn {
                text: format!("turn {}", i),
                sender: *s,
                timestamp: Utc::now(),
            })
            .collect()
    }

    #[test]
    fn test_first_interaction_with_no_bot_turns() {
        let window = ContextWindow::default();
        let convo = window.window(&turns(&[Sender::User, Sender::User]));
        assert!(convo.is_first_interaction);
    }

    #[test]
    fn test_not_first_interaction_with_bot_turn() {
        let window = ContextWindow::default();
        let convo = window.window(&turns(&[Sender::User, Sender::Bot, Sender::User]));
        assert!(!convo.is_first_interaction);
    }

    #[test]
    fn test_empty_history_is_first_interaction() {
        let window = ContextWindow::default();
        let convo = window.window(&[]);
        assert!(convo.is_first_interaction);
        assert!(convo.prompt_turns.is_empty());
    }

    #[test]
    fn test_flag_is_window_local() {
        // A bot turn that has rolled out of the inspected window no longer
        // counts: the bot will re-introduce itself.
        let window = ContextWindow::new(3, 2);
        let mut history = turns(&[Sender::Bot]);
        history.extend(turns(&[Sender::User, Sender::User, Sender::User]));

        let convo = window.window(&history);
        assert!(convo.is_first_interaction);
    }

    #[test]
    fn test_prompt_window_is_bounded() {
        let window = ContextWindow::new(10, 6);
        let history = turns(&[Sender::User; 20]);

        let convo = window.window(&history);
        assert_eq!(convo.prompt_turns.len(), 6);
        // The prompt gets the most recent turns.
        assert_eq!(convo.prompt_turns.last().unwrap().text, "turn 19");
    }

    #[test]
    fn test_memory_transcript_chronological() {
        let transcript = MemoryTranscript::new();
        transcript.push(Turn::user("first"));
        transcript.push(Turn::bot("second"));
        transcript.push(Turn::user("third"));

        let recent = transcript.recent(2);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].text, "second");
        assert_eq!(recent[1].text, "third");
    }
}
