//! Token types emitted by the streaming tokenizer.

use crate::enums::{Confidence, ListType};
use serde::{Deserialize, Serialize};

/// The kind of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenKind {
    /// Literal text
    Text,
    /// Line break
    Newline,
    /// Opening emphasis marker
    ItalicStart,
    /// Closing emphasis marker
    ItalicEnd,
    /// Opening strong marker
    BoldStart,
    /// Closing strong marker (one token per consumed marker character)
    BoldEnd,
    /// Opening code span backticks
    CodeStart,
    /// Closing code span backticks
    CodeEnd,
    /// Opening code fence
    CodeBlockStart,
    /// Closing code fence
    CodeBlockEnd,
    /// `[`
    LinkStart,
    /// `![`
    ImageStart,
    /// `](`
    LinkTextEnd,
    /// `)` closing a link or image URL
    LinkEnd,
    /// ATX heading marker
    HeadingStart,
    /// Block quote marker
    BlockquoteStart,
    /// List item marker
    ListItemStart,
    /// Relabels an earlier italic start as a bold start
    CorrectionToBoldStart,
    /// Relabels an earlier speculative close as an italic start
    CorrectionToItalicStart,
    /// Reverts an earlier marker to literal text
    CorrectionToText,
}

impl TokenKind {
    /// Whether this token relabels an earlier one.
    pub fn is_correction(&self) -> bool {
        matches!(
            self,
            TokenKind::CorrectionToBoldStart
                | TokenKind::CorrectionToItalicStart
                | TokenKind::CorrectionToText
        )
    }

    /// Whether this token closes an inline or block construct.
    pub fn is_close(&self) -> bool {
        matches!(
            self,
            TokenKind::ItalicEnd
                | TokenKind::BoldEnd
                | TokenKind::CodeEnd
                | TokenKind::CodeBlockEnd
                | TokenKind::LinkEnd
        )
    }
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TokenKind::Text => "TEXT",
            TokenKind::Newline => "NEWLINE",
            TokenKind::ItalicStart => "ITALIC_START",
            TokenKind::ItalicEnd => "ITALIC_END",
            TokenKind::BoldStart => "BOLD_START",
            TokenKind::BoldEnd => "BOLD_END",
            TokenKind::CodeStart => "CODE_START",
            TokenKind::CodeEnd => "CODE_END",
            TokenKind::CodeBlockStart => "CODE_BLOCK_START",
            TokenKind::CodeBlockEnd => "CODE_BLOCK_END",
            TokenKind::LinkStart => "LINK_START",
            TokenKind::ImageStart => "IMAGE_START",
            TokenKind::LinkTextEnd => "LINK_TEXT_END",
            TokenKind::LinkEnd => "LINK_END",
            TokenKind::HeadingStart => "HEADING_START",
            TokenKind::BlockquoteStart => "BLOCKQUOTE_START",
            TokenKind::ListItemStart => "LIST_ITEM_START",
            TokenKind::CorrectionToBoldStart => "CORRECTION_TO_BOLD_START",
            TokenKind::CorrectionToItalicStart => "CORRECTION_TO_ITALIC_START",
            TokenKind::CorrectionToText => "CORRECTION_TO_TEXT",
        };
        f.write_str(name)
    }
}

/// Per-kind token metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenMeta {
    /// No metadata
    #[default]
    None,
    /// Heading level (1-6)
    Heading { level: u8 },
    /// List item kind
    List { list_type: ListType },
    /// Code fence info string language
    Code { language: Option<String> },
    /// Identifier shared by an opening marker and its close
    Pair { id: usize },
    /// Close of pair `id`; `index` is which marker character was consumed
    Closing { id: usize, index: u8 },
    /// Position of the token this correction relabels
    Correction { target: usize },
}

/// A token emitted by the streaming tokenizer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    /// Token kind
    pub kind: TokenKind,
    /// Source text the token covers
    pub content: String,
    /// Byte offset of the token in the stream
    pub position: usize,
    /// Byte length of the token
    pub length: usize,
    /// How certain the tokenizer is
    pub confidence: Confidence,
    /// Per-kind metadata
    pub meta: TokenMeta,
    /// True when the token was forced by end-of-stream or a paragraph break
    pub correction: bool,
}

impl Token {
    /// Create a confirmed token covering `content` at `position`.
    ///
    /// # Example
    ///
    /// ```
    /// use steadymark_core::{Confidence, Token, TokenKind};
    /// let token = Token::new(TokenKind::Text, "a", 3);
    /// assert_eq!(token.length, 1);
    /// assert_eq!(token.confidence, Confidence::Confirmed);
    /// ```
    pub fn new(kind: TokenKind, content: impl Into<String>, position: usize) -> Self {
        let content = content.into();
        Self {
            kind,
            length: content.len(),
            content,
            position,
            confidence: Confidence::Confirmed,
            meta: TokenMeta::None,
            correction: false,
        }
    }

    /// Set the confidence.
    pub fn with_confidence(mut self, confidence: Confidence) -> Self {
        self.confidence = confidence;
        self
    }

    /// Set the metadata.
    pub fn with_meta(mut self, meta: TokenMeta) -> Self {
        self.meta = meta;
        self
    }

    /// Mark as a forced close.
    pub fn forced(mut self) -> Self {
        self.correction = true;
        self
    }

    /// Position of the token a correction refers to, if any.
    pub fn correction_target(&self) -> Option<usize> {
        match self.meta {
            TokenMeta::Correction { target } => Some(target),
            _ => None,
        }
    }
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{} {:?}", self.kind, self.position, self.content)?;
        if self.confidence != Confidence::Confirmed {
            write!(f, " {}", self.confidence)?;
        }
        if self.correction {
            write!(f, " forced")?;
        }
        Ok(())
    }
}
