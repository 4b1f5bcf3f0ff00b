//! Context window assembly.
//!
//! Turns a resolved branch history into the bounded message list handed to
//! a model: every system message, then the most recent `window` others, in
//! history order. Older messages are dropped, not summarized.

use std::sync::Arc;

use erdtree_types::{Node, Role};

/// Rough token count for `text`: one token per four characters, rounded up.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(4)
}

/// Result of [`ContextAssembler::assemble`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextWindow {
    /// Kept messages, oldest first.
    pub messages: Vec<Arc<Node>>,
    /// How many non-system messages fell outside the window.
    pub dropped: usize,
    pub estimated_tokens: usize,
}

impl ContextWindow {
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// Keeps system messages plus the last `window` other messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextAssembler {
    window: usize,
}

impl ContextAssembler {
    pub fn new(window: usize) -> Self {
        Self { window }
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn assemble(&self, history: &[Arc<Node>]) -> ContextWindow {
        let conversational = history.iter().filter(|n| n.role != Role::System).count();
        let dropped = conversational.saturating_sub(self.window);

        let mut skipped = 0;
        let messages: Vec<Arc<Node>> = history
            .iter()
            .filter(|n| {
                if n.role == Role::System {
                    return true;
                }
                if skipped < dropped {
                    skipped += 1;
                    return false;
                }
                true
            })
            .cloned()
            .collect();

        let estimated_tokens = messages
            .iter()
            .map(|n| estimate_tokens(n.content.as_str()))
            .sum();

        tracing::trace!(kept = messages.len(), dropped, estimated_tokens, "context assembled");
        ContextWindow {
            messages,
            dropped,
            estimated_tokens,
        }
    }
}
