//! Steadymark Parser
//!
//! A character-at-a-time speculative tokenizer for streaming markdown.
//!
//! # Overview
//!
//! The [`MarkerStateMachine`] never looks ahead. On an opening marker it
//! immediately emits its best guess and, if the next character disagrees,
//! relabels the guess with a correction token. Open constructs live on a
//! [`ContextStack`] and the most recent tokens are kept in a bounded
//! [`TokenHistory`].
//!
//! # Example
//!
//! ```
//! use steadymark_parser::{MachineState, MarkerStateMachine};
//! use steadymark_core::TokenKind;
//!
//! let mut machine = MarkerStateMachine::new();
//! let tokens = machine.process_str("Hello *world");
//! assert!(tokens.iter().any(|t| t.kind == TokenKind::ItalicStart));
//! assert_eq!(machine.state(), MachineState::InEmphasis);
//!
//! // End of stream closes what is still open.
//! let closing = machine.end();
//! assert_eq!(closing[0].kind, TokenKind::ItalicEnd);
//! assert!(closing[0].correction);
//! ```

pub mod context;
pub mod history;
pub mod machine;

pub use context::{ContextStack, ParserContext};
pub use history::TokenHistory;
pub use machine::{DEFAULT_HISTORY_SIZE, DEFAULT_PENDING_CEILING, MarkerStateMachine};

/// Conceptual state of the machine, derived from its pending guess and
/// innermost context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MachineState {
    /// Plain text or block content
    Normal,
    /// A single `*`/`_` was seen; the next character decides
    AwaitingSecondMarker,
    /// Inside emphasis
    InEmphasis,
    /// Inside strong emphasis
    InStrong,
    /// One character of a strong closer was seen
    ClosingStrong,
    /// Inside a code span
    InCode,
    /// Inside a fenced code block
    InCodeBlock,
    /// Inside link or image text
    InLinkText,
    /// Inside link or image URL
    InLinkUrl,
}

impl std::fmt::Display for MachineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            MachineState::Normal => "NORMAL",
            MachineState::AwaitingSecondMarker => "AWAITING_SECOND_MARKER",
            MachineState::InEmphasis => "IN_EMPHASIS",
            MachineState::InStrong => "IN_STRONG",
            MachineState::ClosingStrong => "CLOSING_STRONG",
            MachineState::InCode => "IN_CODE",
            MachineState::InCodeBlock => "IN_CODE_BLOCK",
            MachineState::InLinkText => "IN_LINK_TEXT",
            MachineState::InLinkUrl => "IN_LINK_URL",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_display() {
        assert_eq!(MachineState::Normal.to_string(), "NORMAL");
        assert_eq!(
            MachineState::AwaitingSecondMarker.to_string(),
            "AWAITING_SECOND_MARKER"
        );
        assert_eq!(MachineState::InLinkUrl.to_string(), "IN_LINK_URL");
    }
}
