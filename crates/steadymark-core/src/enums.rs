//! Core enums for steadymark tokenizing and resolution.
//!
//! These enums describe how sure the tokenizer is about a token, which
//! construct a parser context represents, and which boundary strategy a
//! session runs with.

use serde::{Deserialize, Serialize};

/// How certain the tokenizer is about an emitted token.
///
/// Speculative tokens start as `Potential` and may later be relabelled by a
/// correction token; they are never retracted silently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Confidence {
    /// Best guess made on a single marker character
    Potential,
    /// Guess upgraded by a second character but not yet closed
    Likely,
    /// No further input can change this token
    Confirmed,
}

impl std::fmt::Display for Confidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Confidence::Potential => write!(f, "potential"),
            Confidence::Likely => write!(f, "likely"),
            Confidence::Confirmed => write!(f, "confirmed"),
        }
    }
}

/// The construct a parser context on the context stack represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContextType {
    /// Sentinel at the bottom of every stack
    Root,
    /// Running paragraph text
    Paragraph,
    /// Single-marker emphasis (`*x*`, `_x_`)
    Emphasis,
    /// Double-marker strong emphasis (`**x**`, `__x__`)
    Strong,
    /// Inline code span
    Code,
    /// Fenced code block
    CodeBlock,
    /// Link text or URL
    Link,
    /// Image alt text or URL
    Image,
    /// Block quote (`>` prefix)
    Blockquote,
    /// List item
    ListItem,
}

impl ContextType {
    /// Whether this context is an inline span that a paragraph break closes.
    pub fn is_inline(&self) -> bool {
        matches!(
            self,
            ContextType::Emphasis
                | ContextType::Strong
                | ContextType::Code
                | ContextType::Link
                | ContextType::Image
        )
    }
}

impl std::fmt::Display for ContextType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContextType::Root => write!(f, "root"),
            ContextType::Paragraph => write!(f, "paragraph"),
            ContextType::Emphasis => write!(f, "emphasis"),
            ContextType::Strong => write!(f, "strong"),
            ContextType::Code => write!(f, "code"),
            ContextType::CodeBlock => write!(f, "code_block"),
            ContextType::Link => write!(f, "link"),
            ContextType::Image => write!(f, "image"),
            ContextType::Blockquote => write!(f, "blockquote"),
            ContextType::ListItem => write!(f, "list_item"),
        }
    }
}

/// Represents the type of list an item belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ListType {
    /// Unordered list with bullets (*, -, +)
    Bullet,
    /// Ordered list with numbers (1., 2), etc.)
    Ordered,
}

impl std::fmt::Display for ListType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ListType::Bullet => write!(f, "bullet"),
            ListType::Ordered => write!(f, "ordered"),
        }
    }
}

/// Built-in boundary resolution strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    /// Optimistic: synthesize closings for open inline constructs
    #[default]
    Standard,
    /// Wait for certainty: never render a guess
    Conservative,
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StrategyKind::Standard => write!(f, "standard"),
            StrategyKind::Conservative => write!(f, "conservative"),
        }
    }
}

impl std::str::FromStr for StrategyKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "standard" => Ok(StrategyKind::Standard),
            "conservative" => Ok(StrategyKind::Conservative),
            other => Err(format!("unknown strategy: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confidence_display() {
        assert_eq!(Confidence::Potential.to_string(), "potential");
        assert_eq!(Confidence::Likely.to_string(), "likely");
        assert_eq!(Confidence::Confirmed.to_string(), "confirmed");
    }

    #[test]
    fn test_context_type_display() {
        assert_eq!(ContextType::Root.to_string(), "root");
        assert_eq!(ContextType::CodeBlock.to_string(), "code_block");
        assert_eq!(ContextType::ListItem.to_string(), "list_item");
    }

    #[test]
    fn test_context_type_is_inline() {
        assert!(ContextType::Emphasis.is_inline());
        assert!(ContextType::Link.is_inline());
        assert!(!ContextType::CodeBlock.is_inline());
        assert!(!ContextType::Paragraph.is_inline());
        assert!(!ContextType::Root.is_inline());
    }

    #[test]
    fn test_list_type_display() {
        assert_eq!(ListType::Bullet.to_string(), "bullet");
        assert_eq!(ListType::Ordered.to_string(), "ordered");
    }

    #[test]
    fn test_strategy_parse() {
        assert_eq!("standard".parse(), Ok(StrategyKind::Standard));
        assert_eq!(" Conservative ".parse(), Ok(StrategyKind::Conservative));
        assert!("eager".parse::<StrategyKind>().is_err());
        assert_eq!(StrategyKind::default(), StrategyKind::Standard);
    }
}
