//! Bounded history of recently emitted tokens.

use std::collections::VecDeque;
use steadymark_core::Token;

/// Ring of the most recent tokens, oldest first.
#[derive(Debug, Clone)]
pub struct TokenHistory {
    tokens: VecDeque<Token>,
    capacity: usize,
}

impl TokenHistory {
    /// Create a history keeping at most `capacity` tokens.
    pub fn new(capacity: usize) -> Self {
        Self {
            tokens: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Record a token, evicting the oldest when full.
    pub fn push(&mut self, token: Token) {
        if self.capacity == 0 {
            return;
        }
        if self.tokens.len() == self.capacity {
            self.tokens.pop_front();
        }
        self.tokens.push_back(token);
    }

    /// Whether a token starting at `position` is still retained.
    pub fn contains_position(&self, position: usize) -> bool {
        self.tokens.iter().any(|t| t.position == position)
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Retained tokens, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &Token> {
        self.tokens.iter()
    }

    /// Copy of the retained tokens, oldest first.
    pub fn to_vec(&self) -> Vec<Token> {
        self.tokens.iter().cloned().collect()
    }

    pub fn clear(&mut self) {
        self.tokens.clear();
    }
}

impl Default for TokenHistory {
    fn default() -> Self {
        Self::new(20)
    }
}
