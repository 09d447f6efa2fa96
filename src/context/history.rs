//! Bounded conversation history

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

/// Most recent conversation lines, oldest first
///
/// The lock is only held for in-memory copies, never across an await.
#[derive(Debug)]
pub struct ConversationHistory {
    lines: Mutex<VecDeque<String>>,
    capacity: usize,
}

impl ConversationHistory {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            lines: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity: capacity.max(1),
        }
    }

    /// Record something the user said
    pub fn push_user(&self, text: &str) {
        self.push(format!("User: {text}"));
    }

    /// Record an assistant reply
    pub fn push_assistant(&self, name: &str, text: &str) {
        self.push(format!("{name}: {text}"));
    }

    fn push(&self, line: String) {
        let mut lines = self.lines.lock().unwrap_or_else(PoisonError::into_inner);
        lines.push_back(line);
        while lines.len() > self.capacity {
            lines.pop_front();
        }
    }

    /// Copy of the retained lines
    #[must_use]
    pub fn recent(&self) -> Vec<String> {
        let lines = self.lines.lock().unwrap_or_else(PoisonError::into_inner);
        lines.iter().cloned().collect()
    }

    /// Retained lines joined with newlines
    #[must_use]
    pub fn render(&self) -> String {
        self.recent().join("\n")
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.lines.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }
}
