//! Per-session conversation transcripts.
//!
//! Keeps the last few turns of each session so the model sees the recent
//! exchange. Only completed turns are recorded, and the assistant side holds
//! the guarded message rather than the raw model output.

use std::collections::VecDeque;

use dashmap::DashMap;

use crate::backend::Message;

/// Default number of turns kept per session.
pub const DEFAULT_TRANSCRIPT_TURNS: usize = 6;

/// Bounded transcripts keyed by session id.
pub struct TranscriptStore {
    /// Turns kept per session; each turn is two messages
    max_turns: usize,
    transcripts: DashMap<String, VecDeque<Message>>,
}

impl TranscriptStore {
    pub fn new(max_turns: usize) -> Self {
        Self {
            max_turns,
            transcripts: DashMap::new(),
        }
    }

    /// Prior messages for a session, oldest first.
    pub fn history(&self, session_id: &str) -> Vec<Message> {
        self.transcripts
            .get(session_id)
            .map(|t| t.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Record a completed turn.
    pub fn record_turn(&self, session_id: &str, user_message: &str, assistant_message: &str) {
        if self.max_turns == 0 {
            return;
        }
        let mut transcript = self.transcripts.entry(session_id.to_string()).or_default();
        transcript.push_back(Message::user(user_message));
        transcript.push_back(Message::assistant(assistant_message));
        while transcript.len() > self.max_turns * 2 {
            transcript.pop_front();
        }
    }

    /// Drop transcripts whose session is gone.
    pub fn retain(&self, mut keep: impl FnMut(&str) -> bool) -> usize {
        let before = self.transcripts.len();
        self.transcripts.retain(|id, _| keep(id.as_str()));
        before.saturating_sub(self.transcripts.len())
    }

    pub fn remove(&self, session_id: &str) {
        self.transcripts.remove(session_id);
    }

    pub fn len(&self) -> usize {
        self.transcripts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transcripts.is_empty()
    }
}

impl Default for TranscriptStore {
    fn default() -> Self {
        Self::new(DEFAULT_TRANSCRIPT_TURNS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MessageRole;

    #[test]
    fn test_records_turns_in_order() {
        let store = TranscriptStore::default();
        store.record_turn("s-1", "hola", "Buenos días.");
        store.record_turn("s-1", "¿y ahora?", "Ejecute el análisis.");

        let history = store.history("s-1");
        assert_eq!(history.len(), 4);
        assert_eq!(history[0], Message::user("hola"));
        assert_eq!(history[1].role, MessageRole::Assistant);
        assert_eq!(history[3].content, "Ejecute el análisis.");
        assert!(store.history("other").is_empty());
    }

    #[test]
    fn test_bounded_by_turns() {
        let store = TranscriptStore::new(2);
        for i in 0..5 {
            store.record_turn("s-1", &format!("q{i}"), &format!("a{i}"));
        }
        let history = store.history("s-1");
        assert_eq!(history.len(), 4);
        assert_eq!(history[0].content, "q3");
    }

    #[test]
    fn test_retain_drops_dead_sessions() {
        let store = TranscriptStore::default();
        store.record_turn("alive", "q", "a");
        store.record_turn("dead", "q", "a");

        assert_eq!(store.retain(|id| id == "alive"), 1);
        assert_eq!(store.len(), 1);
        assert!(store.history("dead").is_empty());
    }

    #[test]
    fn test_zero_turns_disables_transcripts() {
        let store = TranscriptStore::new(0);
        store.record_turn("s-1", "q", "a");
        assert!(store.is_empty());
    }
}
