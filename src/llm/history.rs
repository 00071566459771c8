use std::collections::VecDeque;

use super::ChatMessage;

/// Sliding window of the last `capacity` user/assistant exchanges.
///
/// Pushing past capacity evicts the oldest exchange. The system prompt is not
/// part of the window; [`LlmAgent`](super::LlmAgent) prepends it on every call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct History {
    turns: VecDeque<(String, String)>,
    capacity: usize,
}

impl History {
    pub fn new(capacity: usize) -> Self {
        Self {
            turns: VecDeque::new(),
            capacity,
        }
    }

    pub fn push(&mut self, user: impl Into<String>, assistant: impl Into<String>) {
        if self.capacity == 0 {
            return;
        }
        self.turns.push_back((user.into(), assistant.into()));
        while self.turns.len() > self.capacity {
            self.turns.pop_front();
        }
    }

    /// Retained exchanges as alternating user/assistant messages, oldest first.
    pub fn messages(&self) -> impl Iterator<Item = ChatMessage> + '_ {
        self.turns.iter().flat_map(|(user, assistant)| {
            [ChatMessage::user(user.as_str()), ChatMessage::assistant(assistant.as_str())]
        })
    }

    /// Number of retained exchanges.
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
