//! The speculative marker state machine.
//!
//! Characters are processed one at a time with no lookahead. An opening
//! marker is reported immediately as a best guess; when the following
//! character disagrees with the guess a correction token relabels it.
//! Already emitted tokens are never withdrawn.

use crate::context::{ContextStack, ParserContext};
use crate::history::TokenHistory;
use crate::MachineState;
use log::{debug, warn};
use steadymark_core::{
    Confidence, ContextType, ListType, SteadymarkError, Token, TokenKind, TokenMeta,
};

/// Default number of tokens kept in the history.
pub const DEFAULT_HISTORY_SIZE: usize = 20;

/// Default ceiling for pending marker runs and inline nesting.
pub const DEFAULT_PENDING_CEILING: usize = 32;

/// A guess waiting for the next character.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Pending {
    /// `*`/`_` opener; `run` is 1 (emphasis) or 2 (strong)
    Open {
        marker: char,
        position: usize,
        run: usize,
        block_start: bool,
    },
    /// First character of a strong closer
    Close {
        marker: char,
        position: usize,
        id: usize,
    },
    /// Backtick run outside a code block
    Backticks {
        position: usize,
        run: usize,
        block_start: bool,
    },
    /// Backtick run at line start inside a code block
    FenceClose { position: usize, run: usize },
    /// `#` run at block start
    Heading { position: usize, level: u8 },
    /// `-` or `+` at block start
    Bullet { marker: char, position: usize },
    /// Digits, then optionally `.` or `)`, at block start
    Ordered {
        position: usize,
        raw: String,
        delimited: bool,
    },
    /// `!` that may start an image
    Bang { position: usize },
    /// `]` inside link text
    LinkClose { position: usize },
}

/// Opening fence whose info string is still being read.
#[derive(Debug, Clone)]
struct FenceOpen {
    position: usize,
    run: usize,
    info: String,
}

/// Character-at-a-time markdown tokenizer.
///
/// # Example
///
/// ```
/// use steadymark_parser::MarkerStateMachine;
/// use steadymark_core::TokenKind;
///
/// let mut machine = MarkerStateMachine::new();
/// let tokens = machine.process_char('*');
/// assert_eq!(tokens[0].kind, TokenKind::ItalicStart);
///
/// // A second marker relabels the guess instead of retracting it.
/// let tokens = machine.process_char('*');
/// assert_eq!(tokens[0].kind, TokenKind::CorrectionToBoldStart);
/// ```
#[derive(Debug, Clone)]
pub struct MarkerStateMachine {
    contexts: ContextStack,
    pending: Option<Pending>,
    fence: Option<FenceOpen>,
    history: TokenHistory,
    diagnostics: Vec<String>,
    /// Byte offset of the next character
    offset: usize,
    prev: Option<char>,
    at_block_start: bool,
    line_empty: bool,
    /// Block markers seen on the current line
    line_blocks: usize,
    in_heading: bool,
    escaped: bool,
    next_pair_id: usize,
    max_pending: usize,
    ended: bool,
}

impl Default for MarkerStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl MarkerStateMachine {
    /// Create a machine with default limits.
    pub fn new() -> Self {
        Self::with_limits(DEFAULT_HISTORY_SIZE, DEFAULT_PENDING_CEILING)
    }

    /// Create a machine with a token history size and a pending-run ceiling.
    pub fn with_limits(history_size: usize, max_pending: usize) -> Self {
        Self {
            contexts: ContextStack::new(),
            pending: None,
            fence: None,
            history: TokenHistory::new(history_size),
            diagnostics: Vec::new(),
            offset: 0,
            prev: None,
            at_block_start: true,
            line_empty: true,
            line_blocks: 0,
            in_heading: false,
            escaped: false,
            next_pair_id: 0,
            max_pending: max_pending.max(1),
            ended: false,
        }
    }

    /// Return to the initial state, keeping the configured limits.
    pub fn reset(&mut self) {
        *self = Self::with_limits(self.history.capacity(), self.max_pending);
    }

    /// Current conceptual state.
    pub fn state(&self) -> MachineState {
        match &self.pending {
            Some(Pending::Open { run: 1, .. }) => return MachineState::AwaitingSecondMarker,
            Some(Pending::Close { .. }) => return MachineState::ClosingStrong,
            _ => {}
        }
        if self.fence.is_some() {
            return MachineState::InCodeBlock;
        }
        let top = self.contexts.top();
        match top.kind {
            ContextType::Emphasis => MachineState::InEmphasis,
            ContextType::Strong => MachineState::InStrong,
            ContextType::Code => MachineState::InCode,
            ContextType::CodeBlock => MachineState::InCodeBlock,
            ContextType::Link | ContextType::Image if top.in_url => MachineState::InLinkUrl,
            ContextType::Link | ContextType::Image => MachineState::InLinkText,
            _ => MachineState::Normal,
        }
    }

    /// Open contexts.
    pub fn contexts(&self) -> &ContextStack {
        &self.contexts
    }

    /// Recently emitted tokens, oldest first.
    pub fn recent_tokens(&self) -> Vec<Token> {
        self.history.to_vec()
    }

    /// Drain diagnostics recorded since the last call.
    pub fn take_diagnostics(&mut self) -> Vec<String> {
        std::mem::take(&mut self.diagnostics)
    }

    /// Byte offset of the next character.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Whether `end` has run with no input since.
    pub fn is_ended(&self) -> bool {
        self.ended
    }

    /// Feed a whole string, returning every token it produced.
    pub fn process_str(&mut self, text: &str) -> Vec<Token> {
        text.chars().flat_map(|c| self.process_char(c)).collect()
    }

    /// Feed one character.
    pub fn process_char(&mut self, c: char) -> Vec<Token> {
        self.ended = false;
        let mut out = Vec::new();

        if !c.is_whitespace() {
            self.line_empty = false;
        }

        let consumed = match self.pending.take() {
            Some(pending) => self.resolve_pending(pending, c, &mut out),
            None => false,
        };

        if !consumed {
            let block_start = self.at_block_start;
            if !c.is_whitespace() {
                self.at_block_start = false;
            }
            self.dispatch(c, block_start, &mut out);
        }

        self.offset += c.len_utf8();
        self.prev = Some(c);
        self.record(&out);
        out
    }

    /// Flush pending markers and force-close every open context.
    ///
    /// Idempotent until more input arrives.
    pub fn end(&mut self) -> Vec<Token> {
        if self.ended {
            return Vec::new();
        }
        self.ended = true;

        let mut out = Vec::new();
        if let Some(pending) = self.pending.take() {
            self.flush_pending(pending, &mut out);
        }
        if let Some(fence) = self.fence.take() {
            self.open_fence(fence, &mut out);
        }
        self.close_all(self.offset, &mut out);

        self.record(&out);
        out
    }

    // =========================================================================
    // Dispatch
    // =========================================================================

    fn dispatch(&mut self, c: char, block_start: bool, out: &mut Vec<Token>) {
        let position = self.offset;

        if self.fence.is_some() {
            self.fence_info(c, out);
            return;
        }

        match self.contexts.top_kind() {
            ContextType::CodeBlock => return self.in_code_block(c, block_start, out),
            ContextType::Code => return self.in_code_span(c, out),
            ContextType::Link | ContextType::Image if self.contexts.top().in_url => {
                return self.in_link_url(c, out);
            }
            _ => {}
        }

        if self.escaped {
            self.escaped = false;
            if c != '\n' {
                self.push_text(c.to_string(), position, out);
                return;
            }
        }

        match c {
            '\n' => self.newline(out),
            '\\' => {
                self.escaped = true;
                self.push_text("\\".to_string(), position, out);
            }
            '*' | '_' => self.emphasis_marker(c, block_start, out),
            '`' => {
                self.pending = Some(Pending::Backticks {
                    position,
                    run: 1,
                    block_start,
                })
            }
            '[' => self.open_link(ContextType::Link, position, "[", out),
            '!' => self.pending = Some(Pending::Bang { position }),
            ']' if self.in_link_text() => self.pending = Some(Pending::LinkClose { position }),
            '#' if block_start => self.pending = Some(Pending::Heading { position, level: 1 }),
            '>' if block_start => self.blockquote(position, out),
            '-' | '+' if block_start => self.pending = Some(Pending::Bullet { marker: c, position }),
            d if block_start && d.is_ascii_digit() => {
                self.pending = Some(Pending::Ordered {
                    position,
                    raw: d.to_string(),
                    delimited: false,
                })
            }
            _ => self.push_text(c.to_string(), position, out),
        }
    }

    fn in_code_block(&mut self, c: char, block_start: bool, out: &mut Vec<Token>) {
        match c {
            '`' if block_start => {
                self.pending = Some(Pending::FenceClose {
                    position: self.offset,
                    run: 1,
                })
            }
            '\n' => {
                out.push(Token::new(TokenKind::Newline, "\n", self.offset));
                self.end_line();
            }
            _ => out.push(Token::new(TokenKind::Text, c.to_string(), self.offset)),
        }
    }

    fn in_code_span(&mut self, c: char, out: &mut Vec<Token>) {
        match c {
            '`' => {
                self.pending = Some(Pending::Backticks {
                    position: self.offset,
                    run: 1,
                    block_start: false,
                })
            }
            '\n' => self.newline(out),
            _ => out.push(Token::new(TokenKind::Text, c.to_string(), self.offset)),
        }
    }

    fn in_link_url(&mut self, c: char, out: &mut Vec<Token>) {
        match c {
            ')' => {
                let kind = self.contexts.top_kind();
                if let Some(ctx) = self.pop_context(kind) {
                    out.push(
                        Token::new(TokenKind::LinkEnd, ")", self.offset).with_meta(
                            TokenMeta::Closing {
                                id: ctx.pair_id.unwrap_or_default(),
                                index: 0,
                            },
                        ),
                    );
                }
            }
            '\n' => {
                let kind = self.contexts.top_kind();
                self.retract_top(kind, out);
                self.newline(out);
            }
            _ => out.push(Token::new(TokenKind::Text, c.to_string(), self.offset)),
        }
    }

    fn fence_info(&mut self, c: char, out: &mut Vec<Token>) {
        if c != '\n' {
            if let Some(fence) = self.fence.as_mut() {
                fence.info.push(c);
            }
            return;
        }
        if let Some(fence) = self.fence.take() {
            self.open_fence(fence, out);
        }
        out.push(Token::new(TokenKind::Newline, "\n", self.offset));
        self.end_line();
    }

    fn newline(&mut self, out: &mut Vec<Token>) {
        let position = self.offset;
        if self.line_empty {
            // Paragraph break: nothing inline survives it.
            self.close_inline(position, out);
            self.contexts.reset();
        } else if self.in_heading {
            self.close_inline(position, out);
        }
        out.push(Token::new(TokenKind::Newline, "\n", position));
        self.in_heading = false;
        self.end_line();
    }

    fn end_line(&mut self) {
        self.line_empty = true;
        self.at_block_start = true;
        self.line_blocks = 0;
        self.escaped = false;
    }

    // =========================================================================
    // Markers
    // =========================================================================

    fn emphasis_marker(&mut self, c: char, block_start: bool, out: &mut Vec<Token>) {
        let position = self.offset;

        if self.can_close(c) {
            let top = self.contexts.top().clone();
            let id = top.pair_id.unwrap_or_default();
            match top.kind {
                ContextType::Emphasis => {
                    if self.pop_context(ContextType::Emphasis).is_some() {
                        out.push(
                            Token::new(TokenKind::ItalicEnd, c.to_string(), position)
                                .with_confidence(Confidence::Potential)
                                .with_meta(TokenMeta::Closing { id, index: 0 }),
                        );
                    }
                }
                _ => {
                    out.push(
                        Token::new(TokenKind::BoldEnd, c.to_string(), position)
                            .with_confidence(Confidence::Potential)
                            .with_meta(TokenMeta::Closing { id, index: 0 }),
                    );
                    self.pending = Some(Pending::Close {
                        marker: c,
                        position,
                        id,
                    });
                }
            }
            return;
        }

        // Intraword underscores are literal.
        if c == '_' && self.prev.is_some_and(|p| p.is_alphanumeric()) {
            self.push_text(c.to_string(), position, out);
            return;
        }
        if self.contexts.inline_depth() >= self.max_pending {
            self.push_text(c.to_string(), position, out);
            return;
        }

        self.ensure_paragraph(position);
        let id = self.next_id();
        out.push(
            Token::new(TokenKind::ItalicStart, c.to_string(), position)
                .with_confidence(Confidence::Potential)
                .with_meta(TokenMeta::Pair { id }),
        );
        self.contexts
            .push(ParserContext::new(ContextType::Emphasis, position, c.to_string()).with_pair(id));
        self.pending = Some(Pending::Open {
            marker: c,
            position,
            run: 1,
            block_start,
        });
    }

    fn can_close(&self, c: char) -> bool {
        let top = self.contexts.top();
        matches!(top.kind, ContextType::Emphasis | ContextType::Strong)
            && top.marker_char() == Some(c)
            && self.prev.is_some_and(|p| !p.is_whitespace())
            && self.offset > top.content_start()
    }

    fn open_link(&mut self, kind: ContextType, position: usize, marker: &str, out: &mut Vec<Token>) {
        if self.contexts.inline_depth() >= self.max_pending {
            self.push_text(marker.to_string(), position, out);
            return;
        }
        self.ensure_paragraph(position);
        let id = self.next_id();
        let token_kind = if kind == ContextType::Image {
            TokenKind::ImageStart
        } else {
            TokenKind::LinkStart
        };
        out.push(
            Token::new(token_kind, marker, position)
                .with_confidence(Confidence::Potential)
                .with_meta(TokenMeta::Pair { id }),
        );
        self.contexts
            .push(ParserContext::new(kind, position, marker).with_pair(id));
    }

    fn open_code_span(&mut self, position: usize, marker: String, out: &mut Vec<Token>) {
        if self.contexts.inline_depth() >= self.max_pending {
            self.push_text(marker, position, out);
            return;
        }
        self.ensure_paragraph(position);
        let id = self.next_id();
        out.push(
            Token::new(TokenKind::CodeStart, marker.clone(), position)
                .with_confidence(Confidence::Potential)
                .with_meta(TokenMeta::Pair { id }),
        );
        self.contexts
            .push(ParserContext::new(ContextType::Code, position, marker).with_pair(id));
    }

    fn open_fence(&mut self, fence: FenceOpen, out: &mut Vec<Token>) {
        let marker = "`".repeat(fence.run);
        let language = fence.info.split_whitespace().next().map(str::to_string);
        out.push(
            Token::new(
                TokenKind::CodeBlockStart,
                format!("{}{}", marker, fence.info),
                fence.position,
            )
            .with_meta(TokenMeta::Code { language }),
        );
        self.contexts
            .push(ParserContext::new(ContextType::CodeBlock, fence.position, marker));
    }

    fn blockquote(&mut self, position: usize, out: &mut Vec<Token>) {
        self.start_block(position, out);
        out.push(Token::new(TokenKind::BlockquoteStart, ">", position));
        self.contexts
            .push(ParserContext::new(ContextType::Blockquote, position, ">"));
        self.at_block_start = true;
    }

    fn start_list_item(
        &mut self,
        position: usize,
        content: String,
        list_type: ListType,
        out: &mut Vec<Token>,
    ) {
        self.start_block(position, out);
        let marker = content.trim_end().to_string();
        out.push(
            Token::new(TokenKind::ListItemStart, content, position)
                .with_meta(TokenMeta::List { list_type }),
        );
        self.contexts
            .push(ParserContext::new(ContextType::ListItem, position, marker));
        self.at_block_start = true;
    }

    fn start_heading(&mut self, position: usize, level: u8, out: &mut Vec<Token>) {
        self.start_block(position, out);
        out.push(
            Token::new(TokenKind::HeadingStart, "#".repeat(level as usize), position)
                .with_meta(TokenMeta::Heading { level }),
        );
        self.in_heading = true;
    }

    /// The first block marker on a line ends whatever the previous line left
    /// open.
    fn start_block(&mut self, position: usize, out: &mut Vec<Token>) {
        if self.line_blocks == 0 {
            self.close_inline(position, out);
            self.contexts.reset();
        }
        self.line_blocks += 1;
    }

    // =========================================================================
    // Pending resolution
    // =========================================================================

    /// Resolve a pending guess against the next character. Returns true when
    /// the character was consumed.
    fn resolve_pending(&mut self, pending: Pending, c: char, out: &mut Vec<Token>) -> bool {
        match pending {
            Pending::Open {
                marker,
                position,
                run,
                block_start,
            } => self.resolve_open(marker, position, run, block_start, c, out),
            Pending::Close {
                marker,
                position,
                id,
            } => self.resolve_close(marker, position, id, c, out),
            Pending::Backticks {
                position,
                run,
                block_start,
            } => {
                if c == '`' {
                    let next = Pending::Backticks {
                        position,
                        run: run + 1,
                        block_start,
                    };
                    self.extend_run(next, position, run + 1, out);
                    return true;
                }
                self.finish_backticks(position, run, block_start, out);
                false
            }
            Pending::FenceClose { position, run } => {
                if c == '`' {
                    let next = Pending::FenceClose {
                        position,
                        run: run + 1,
                    };
                    self.extend_run(next, position, run + 1, out);
                    return true;
                }
                if c == '\n' {
                    self.finish_fence_close(position, run, out);
                } else {
                    out.push(Token::new(TokenKind::Text, "`".repeat(run), position));
                }
                false
            }
            Pending::Heading { position, level } => match c {
                '#' if level < 6 => {
                    self.pending = Some(Pending::Heading {
                        position,
                        level: level + 1,
                    });
                    true
                }
                ' ' | '\t' | '\n' => {
                    self.start_heading(position, level, out);
                    false
                }
                _ => {
                    self.push_text("#".repeat(level as usize), position, out);
                    false
                }
            },
            Pending::Bullet { marker, position } => match c {
                ' ' | '\t' => {
                    self.start_list_item(position, format!("{}{}", marker, c), ListType::Bullet, out);
                    true
                }
                '\n' => {
                    self.start_list_item(position, marker.to_string(), ListType::Bullet, out);
                    false
                }
                _ => {
                    self.push_text(marker.to_string(), position, out);
                    false
                }
            },
            Pending::Ordered {
                position,
                mut raw,
                delimited,
            } => match c {
                d if d.is_ascii_digit() && !delimited && raw.len() < 9 => {
                    raw.push(d);
                    self.pending = Some(Pending::Ordered {
                        position,
                        raw,
                        delimited,
                    });
                    true
                }
                '.' | ')' if !delimited => {
                    raw.push(c);
                    self.pending = Some(Pending::Ordered {
                        position,
                        raw,
                        delimited: true,
                    });
                    true
                }
                ' ' | '\t' if delimited => {
                    raw.push(c);
                    self.start_list_item(position, raw, ListType::Ordered, out);
                    true
                }
                '\n' if delimited => {
                    self.start_list_item(position, raw, ListType::Ordered, out);
                    false
                }
                _ => {
                    self.push_text(raw, position, out);
                    false
                }
            },
            Pending::Bang { position } => {
                if c == '[' {
                    self.open_link(ContextType::Image, position, "![", out);
                    true
                } else {
                    self.push_text("!".to_string(), position, out);
                    false
                }
            }
            Pending::LinkClose { position } => {
                if c == '(' {
                    out.push(Token::new(TokenKind::LinkTextEnd, "](", position));
                    self.contexts.top_mut().in_url = true;
                    true
                } else {
                    let kind = self.contexts.top_kind();
                    self.retract_top(kind, out);
                    self.push_text("]".to_string(), position, out);
                    false
                }
            }
        }
    }

    fn resolve_open(
        &mut self,
        marker: char,
        position: usize,
        run: usize,
        block_start: bool,
        c: char,
        out: &mut Vec<Token>,
    ) -> bool {
        if c == marker && run == 1 {
            let top = self.contexts.top();
            if top.kind != ContextType::Emphasis || top.start_position != position {
                self.corrupted(SteadymarkError::StateCorruption(format!(
                    "emphasis opened at {} is not the innermost context",
                    position
                )));
                return false;
            }
            let top = self.contexts.top_mut();
            top.kind = ContextType::Strong;
            top.start_marker.push(marker);
            let doubled = top.start_marker.clone();
            out.push(
                Token::new(TokenKind::CorrectionToBoldStart, doubled, position)
                    .with_confidence(Confidence::Likely)
                    .with_meta(TokenMeta::Correction { target: position }),
            );
            self.pending = Some(Pending::Open {
                marker,
                position,
                run: 2,
                block_start,
            });
            return true;
        }

        if c.is_whitespace() {
            let kind = if run == 1 {
                ContextType::Emphasis
            } else {
                ContextType::Strong
            };
            self.retract_top(kind, out);
            if run == 1 && marker == '*' && block_start && (c == ' ' || c == '\t') {
                self.start_list_item(position, format!("*{}", c), ListType::Bullet, out);
                return true;
            }
        }

        // Anything else confirms the guess implicitly; a third marker falls
        // through and opens a nested emphasis.
        false
    }

    fn resolve_close(
        &mut self,
        marker: char,
        position: usize,
        id: usize,
        c: char,
        out: &mut Vec<Token>,
    ) -> bool {
        if c == marker {
            if self.pop_context(ContextType::Strong).is_some() {
                out.push(
                    Token::new(TokenKind::BoldEnd, c.to_string(), self.offset)
                        .with_meta(TokenMeta::Closing { id, index: 1 }),
                );
            }
            return true;
        }

        if c.is_whitespace() {
            out.push(
                Token::new(TokenKind::CorrectionToText, marker.to_string(), position)
                    .with_meta(TokenMeta::Correction { target: position }),
            );
        } else {
            // A lone marker inside strong text opens a nested emphasis.
            let id = self.next_id();
            out.push(
                Token::new(TokenKind::CorrectionToItalicStart, marker.to_string(), position)
                    .with_confidence(Confidence::Potential)
                    .with_meta(TokenMeta::Correction { target: position }),
            );
            self.contexts.push(
                ParserContext::new(ContextType::Emphasis, position, marker.to_string())
                    .with_pair(id),
            );
        }
        false
    }

    /// Grow a backtick run, flushing it as text past the ceiling.
    fn extend_run(&mut self, next: Pending, position: usize, run: usize, out: &mut Vec<Token>) {
        if run > self.max_pending {
            debug!("backtick run at {} exceeds ceiling, flushing as text", position);
            out.push(Token::new(TokenKind::Text, "`".repeat(run), position));
        } else {
            self.pending = Some(next);
        }
    }

    fn finish_backticks(
        &mut self,
        position: usize,
        run: usize,
        block_start: bool,
        out: &mut Vec<Token>,
    ) {
        let marker = "`".repeat(run);
        if self.contexts.top_kind() == ContextType::Code {
            if self.contexts.top().start_marker.len() == run {
                if let Some(ctx) = self.pop_context(ContextType::Code) {
                    out.push(
                        Token::new(TokenKind::CodeEnd, marker, position).with_meta(
                            TokenMeta::Closing {
                                id: ctx.pair_id.unwrap_or_default(),
                                index: 0,
                            },
                        ),
                    );
                }
            } else {
                out.push(Token::new(TokenKind::Text, marker, position));
            }
        } else if block_start && run >= 3 {
            self.start_block(position, out);
            self.fence = Some(FenceOpen {
                position,
                run,
                info: String::new(),
            });
        } else {
            self.open_code_span(position, marker, out);
        }
    }

    fn finish_fence_close(&mut self, position: usize, run: usize, out: &mut Vec<Token>) {
        let top = self.contexts.top();
        if top.kind == ContextType::CodeBlock && run >= top.start_marker.len() {
            if self.pop_context(ContextType::CodeBlock).is_some() {
                out.push(Token::new(TokenKind::CodeBlockEnd, "`".repeat(run), position));
            }
        } else {
            out.push(Token::new(TokenKind::Text, "`".repeat(run), position));
        }
    }

    /// Settle a pending guess when no further input will come.
    fn flush_pending(&mut self, pending: Pending, out: &mut Vec<Token>) {
        match pending {
            Pending::Open {
                marker,
                position,
                run,
                block_start,
            } => {
                let kind = if run == 1 {
                    ContextType::Emphasis
                } else {
                    ContextType::Strong
                };
                if let Some(ctx) = self.pop_context(kind) {
                    out.push(
                        Token::new(TokenKind::CorrectionToText, ctx.start_marker, position)
                            .with_meta(TokenMeta::Correction { target: position })
                            .forced(),
                    );
                }
                if run == 1 && marker == '*' && block_start {
                    self.start_list_item(position, "*".to_string(), ListType::Bullet, out);
                }
            }
            Pending::Close {
                marker, position, ..
            } => {
                out.push(
                    Token::new(TokenKind::CorrectionToText, marker.to_string(), position)
                        .with_meta(TokenMeta::Correction { target: position })
                        .forced(),
                );
            }
            Pending::Backticks {
                position,
                run,
                block_start,
            } => {
                let in_code = self.contexts.top_kind() == ContextType::Code;
                if in_code || (block_start && run >= 3) {
                    self.finish_backticks(position, run, block_start, out);
                } else {
                    self.push_text("`".repeat(run), position, out);
                }
            }
            Pending::FenceClose { position, run } => self.finish_fence_close(position, run, out),
            Pending::Heading { position, level } => self.start_heading(position, level, out),
            Pending::Bullet { marker, position } => {
                self.start_list_item(position, marker.to_string(), ListType::Bullet, out)
            }
            Pending::Ordered {
                position,
                raw,
                delimited,
            } => {
                if delimited {
                    self.start_list_item(position, raw, ListType::Ordered, out);
                } else {
                    self.push_text(raw, position, out);
                }
            }
            Pending::Bang { position } => self.push_text("!".to_string(), position, out),
            Pending::LinkClose { position } => {
                let kind = self.contexts.top_kind();
                self.retract_top(kind, out);
                self.push_text("]".to_string(), position, out);
            }
        }
    }

    // =========================================================================
    // Context helpers
    // =========================================================================

    fn in_link_text(&self) -> bool {
        let top = self.contexts.top();
        matches!(top.kind, ContextType::Link | ContextType::Image) && !top.in_url
    }

    fn ensure_paragraph(&mut self, position: usize) {
        if self.in_heading {
            return;
        }
        if matches!(
            self.contexts.top_kind(),
            ContextType::Root | ContextType::Blockquote | ContextType::ListItem
        ) {
            self.contexts
                .push(ParserContext::new(ContextType::Paragraph, position, ""));
        }
    }

    fn push_text(&mut self, content: String, position: usize, out: &mut Vec<Token>) {
        if content.chars().any(|c| !c.is_whitespace()) {
            self.ensure_paragraph(position);
        }
        out.push(Token::new(TokenKind::Text, content, position));
    }

    fn next_id(&mut self) -> usize {
        let id = self.next_pair_id;
        self.next_pair_id += 1;
        id
    }

    /// Pop the innermost context and revert its opening marker to text.
    fn retract_top(&mut self, kind: ContextType, out: &mut Vec<Token>) {
        if let Some(ctx) = self.pop_context(kind) {
            out.push(
                Token::new(TokenKind::CorrectionToText, ctx.start_marker, ctx.start_position)
                    .with_meta(TokenMeta::Correction {
                        target: ctx.start_position,
                    }),
            );
        }
    }

    fn pop_context(&mut self, kind: ContextType) -> Option<ParserContext> {
        match self.contexts.pop_expected(kind) {
            Ok(ctx) => Some(ctx),
            Err(err) => {
                self.corrupted(err);
                None
            }
        }
    }

    fn corrupted(&mut self, err: SteadymarkError) {
        warn!("{}; resetting to root context", err);
        self.diagnostics.push(err.to_string());
        self.contexts.reset();
        self.pending = None;
    }

    /// Force-close inline contexts at `position`.
    fn close_inline(&mut self, position: usize, out: &mut Vec<Token>) {
        while self.contexts.top_kind().is_inline() {
            let Ok(ctx) = self.contexts.pop() else { break };
            out.extend(forced_close(&ctx, position));
        }
    }

    fn close_all(&mut self, position: usize, out: &mut Vec<Token>) {
        while self.contexts.depth() > 1 {
            let Ok(ctx) = self.contexts.pop() else { break };
            out.extend(forced_close(&ctx, position));
        }
        self.in_heading = false;
    }

    fn record(&mut self, tokens: &[Token]) {
        for token in tokens {
            if let Some(target) = token.correction_target() {
                if !self.history.contains_position(target) {
                    debug!(
                        "{} refers to token at {} outside the history window",
                        token.kind, target
                    );
                }
            }
            self.history.push(token.clone());
        }
    }
}

/// The zero-length token that force-closes `ctx`, if it has one.
fn forced_close(ctx: &ParserContext, position: usize) -> Option<Token> {
    let closing = TokenMeta::Closing {
        id: ctx.pair_id.unwrap_or_default(),
        index: 0,
    };
    let token = match ctx.kind {
        ContextType::Emphasis => Token::new(TokenKind::ItalicEnd, "", position).with_meta(closing),
        ContextType::Strong => Token::new(TokenKind::BoldEnd, "", position).with_meta(closing),
        ContextType::Code => Token::new(TokenKind::CodeEnd, "", position).with_meta(closing),
        ContextType::CodeBlock => Token::new(TokenKind::CodeBlockEnd, "", position),
        ContextType::Link | ContextType::Image if ctx.in_url => {
            Token::new(TokenKind::LinkEnd, "", position).with_meta(closing)
        }
        // Link text without a URL is not a link.
        ContextType::Link | ContextType::Image => Token::new(
            TokenKind::CorrectionToText,
            ctx.start_marker.clone(),
            ctx.start_position,
        )
        .with_meta(TokenMeta::Correction {
            target: ctx.start_position,
        }),
        _ => return None,
    };
    Some(token.forced())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Non-text tokens as `(kind, position)` pairs.
    fn markers(tokens: &[Token]) -> Vec<(TokenKind, usize)> {
        tokens
            .iter()
            .filter(|t| !matches!(t.kind, TokenKind::Text | TokenKind::Newline))
            .map(|t| (t.kind, t.position))
            .collect()
    }

    fn run(text: &str) -> Vec<Token> {
        MarkerStateMachine::new().process_str(text)
    }

    #[test]
    fn test_plain_text() {
        let tokens = run("hello");
        assert_eq!(tokens.len(), 5);
        assert!(tokens.iter().all(|t| t.kind == TokenKind::Text));
    }

    #[test]
    fn test_italic_guess_is_immediate() {
        let mut machine = MarkerStateMachine::new();
        let tokens = machine.process_char('*');
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].kind, TokenKind::ItalicStart);
        assert_eq!(tokens[0].confidence, Confidence::Potential);
        assert_eq!(machine.state(), MachineState::AwaitingSecondMarker);
    }

    #[test]
    fn test_italic_pair() {
        let tokens = run("*a*");
        assert_eq!(
            markers(&tokens),
            vec![(TokenKind::ItalicStart, 0), (TokenKind::ItalicEnd, 2)]
        );
    }

    #[test]
    fn test_bold_upgrade_and_close() {
        let tokens = run("**b**");
        assert_eq!(
            markers(&tokens),
            vec![
                (TokenKind::ItalicStart, 0),
                (TokenKind::CorrectionToBoldStart, 0),
                (TokenKind::BoldEnd, 3),
                (TokenKind::BoldEnd, 4),
            ]
        );
        let ends: Vec<&TokenMeta> = tokens
            .iter()
            .filter(|t| t.kind == TokenKind::BoldEnd)
            .map(|t| &t.meta)
            .collect();
        assert_eq!(ends[0], &TokenMeta::Closing { id: 0, index: 0 });
        assert_eq!(ends[1], &TokenMeta::Closing { id: 0, index: 1 });
    }

    #[test]
    fn test_whitespace_retracts_opener() {
        let mut machine = MarkerStateMachine::new();
        let tokens = machine.process_str("a * b");
        assert_eq!(
            markers(&tokens),
            vec![(TokenKind::ItalicStart, 2), (TokenKind::CorrectionToText, 2)]
        );
        assert_eq!(tokens[3].correction_target(), Some(2));
        assert_eq!(machine.state(), MachineState::Normal);
    }

    #[test]
    fn test_star_list_item() {
        let tokens = run("* item");
        assert_eq!(
            markers(&tokens),
            vec![
                (TokenKind::ItalicStart, 0),
                (TokenKind::CorrectionToText, 0),
                (TokenKind::ListItemStart, 0),
            ]
        );
    }

    #[test]
    fn test_intraword_underscore() {
        assert!(markers(&run("snake_case_name")).is_empty());
    }

    #[test]
    fn test_nested_markers_by_char() {
        let tokens = run("**bold _it_ x**");
        assert_eq!(
            markers(&tokens),
            vec![
                (TokenKind::ItalicStart, 0),
                (TokenKind::CorrectionToBoldStart, 0),
                (TokenKind::ItalicStart, 7),
                (TokenKind::ItalicEnd, 10),
                (TokenKind::BoldEnd, 13),
                (TokenKind::BoldEnd, 14),
            ]
        );
    }

    #[test]
    fn test_underscore_cannot_close_star() {
        let mut machine = MarkerStateMachine::new();
        machine.process_str("*a_ ");
        assert_eq!(machine.state(), MachineState::InEmphasis);
    }

    #[test]
    fn test_strong_close_becomes_italic() {
        let mut machine = MarkerStateMachine::new();
        let tokens = machine.process_str("**a*b");
        assert_eq!(
            markers(&tokens).last(),
            Some(&(TokenKind::CorrectionToItalicStart, 3))
        );
        assert_eq!(machine.state(), MachineState::InEmphasis);
    }

    #[test]
    fn test_strong_close_then_space() {
        let mut machine = MarkerStateMachine::new();
        let tokens = machine.process_str("**a* b");
        assert_eq!(
            markers(&tokens).last(),
            Some(&(TokenKind::CorrectionToText, 3))
        );
        assert_eq!(machine.state(), MachineState::InStrong);
    }

    #[test]
    fn test_closing_strong_state() {
        let mut machine = MarkerStateMachine::new();
        machine.process_str("**a*");
        assert_eq!(machine.state(), MachineState::ClosingStrong);
    }

    #[test]
    fn test_code_span() {
        let tokens = run("`code` ");
        assert_eq!(
            markers(&tokens),
            vec![(TokenKind::CodeStart, 0), (TokenKind::CodeEnd, 5)]
        );
    }

    #[test]
    fn test_code_span_ignores_markers() {
        let mut machine = MarkerStateMachine::new();
        let tokens = machine.process_str("`*a*");
        assert_eq!(markers(&tokens), vec![(TokenKind::CodeStart, 0)]);
        assert_eq!(machine.state(), MachineState::InCode);
    }

    #[test]
    fn test_code_block() {
        let mut machine = MarkerStateMachine::new();
        let tokens = machine.process_str("```rust\nfn x\n```\n");
        assert_eq!(
            markers(&tokens),
            vec![(TokenKind::CodeBlockStart, 0), (TokenKind::CodeBlockEnd, 13)]
        );
        assert_eq!(
            tokens[0].meta,
            TokenMeta::Code {
                language: Some("rust".to_string())
            }
        );
        assert_eq!(machine.state(), MachineState::Normal);
    }

    #[test]
    fn test_code_block_keeps_blank_lines() {
        let mut machine = MarkerStateMachine::new();
        machine.process_str("```\na\n\n*b");
        assert_eq!(machine.state(), MachineState::InCodeBlock);
    }

    #[test]
    fn test_link() {
        let tokens = run("[a](b)");
        assert_eq!(
            markers(&tokens),
            vec![
                (TokenKind::LinkStart, 0),
                (TokenKind::LinkTextEnd, 2),
                (TokenKind::LinkEnd, 5),
            ]
        );
    }

    #[test]
    fn test_link_states() {
        let mut machine = MarkerStateMachine::new();
        machine.process_str("[a");
        assert_eq!(machine.state(), MachineState::InLinkText);
        machine.process_str("](");
        assert_eq!(machine.state(), MachineState::InLinkUrl);
    }

    #[test]
    fn test_bracket_without_url_retracts() {
        let tokens = run("[a] b");
        assert_eq!(
            markers(&tokens),
            vec![(TokenKind::LinkStart, 0), (TokenKind::CorrectionToText, 0)]
        );
    }

    #[test]
    fn test_image() {
        let tokens = run("![alt](u)");
        assert_eq!(
            markers(&tokens),
            vec![
                (TokenKind::ImageStart, 0),
                (TokenKind::LinkTextEnd, 5),
                (TokenKind::LinkEnd, 8),
            ]
        );
    }

    #[test]
    fn test_bang_alone_is_text() {
        assert!(markers(&run("wow! ")).is_empty());
    }

    #[test]
    fn test_heading() {
        let tokens = run("## Title\n");
        assert_eq!(markers(&tokens), vec![(TokenKind::HeadingStart, 0)]);
        assert_eq!(tokens[0].meta, TokenMeta::Heading { level: 2 });
    }

    #[test]
    fn test_hash_without_space_is_text() {
        assert!(markers(&run("#tag")).is_empty());
    }

    #[test]
    fn test_heading_line_end_forces_close() {
        let tokens = run("# *a\n");
        let end = tokens
            .iter()
            .find(|t| t.kind == TokenKind::ItalicEnd)
            .unwrap();
        assert_eq!(end.position, 4);
        assert!(end.correction);
        assert!(end.content.is_empty());
    }

    #[test]
    fn test_blockquote() {
        assert_eq!(
            markers(&run("> quote")),
            vec![(TokenKind::BlockquoteStart, 0)]
        );
    }

    #[test]
    fn test_ordered_list_item() {
        let tokens = run("12. twelve");
        assert_eq!(markers(&tokens), vec![(TokenKind::ListItemStart, 0)]);
        assert_eq!(tokens[0].content, "12. ");
        assert_eq!(
            tokens[0].meta,
            TokenMeta::List {
                list_type: ListType::Ordered
            }
        );
    }

    #[test]
    fn test_dash_list_item() {
        let tokens = run("- item");
        assert_eq!(markers(&tokens), vec![(TokenKind::ListItemStart, 0)]);
        assert_eq!(tokens[0].content, "- ");
    }

    #[test]
    fn test_lone_dash_is_empty_item() {
        let mut machine = MarkerStateMachine::new();
        machine.process_char('-');
        let tokens = machine.end();
        assert_eq!(markers(&tokens), vec![(TokenKind::ListItemStart, 0)]);
    }

    #[test]
    fn test_dash_mid_line_is_text() {
        assert!(markers(&run("a - b")).is_empty());
    }

    #[test]
    fn test_blank_line_forces_close() {
        let tokens = run("a *b\n\nc");
        let end = tokens
            .iter()
            .find(|t| t.kind == TokenKind::ItalicEnd)
            .unwrap();
        assert_eq!(end.position, 5);
        assert!(end.correction);
    }

    #[test]
    fn test_escape() {
        assert!(markers(&run("\\*a")).is_empty());
    }

    #[test]
    fn test_end_forces_close() {
        let mut machine = MarkerStateMachine::new();
        machine.process_str("**bold");
        let tokens = machine.end();
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].kind, TokenKind::BoldEnd);
        assert_eq!(tokens[0].position, 6);
        assert!(tokens[0].correction);
    }

    #[test]
    fn test_end_idempotent() {
        let mut machine = MarkerStateMachine::new();
        machine.process_str("*a");
        assert!(!machine.end().is_empty());
        assert!(machine.end().is_empty());
        assert!(machine.is_ended());

        machine.process_char(' ');
        assert!(!machine.is_ended());
    }

    #[test]
    fn test_end_retracts_bare_opener() {
        let mut machine = MarkerStateMachine::new();
        machine.process_str("x *");
        let tokens = machine.end();
        assert_eq!(markers(&tokens), vec![(TokenKind::CorrectionToText, 2)]);
        assert!(tokens[0].correction);
    }

    #[test]
    fn test_end_link_text_retracts() {
        let mut machine = MarkerStateMachine::new();
        machine.process_str("see [docs");
        let tokens = machine.end();
        assert_eq!(markers(&tokens), vec![(TokenKind::CorrectionToText, 4)]);
    }

    #[test]
    fn test_end_closes_code_block() {
        let mut machine = MarkerStateMachine::new();
        machine.process_str("```\ncode");
        let tokens = machine.end();
        assert_eq!(tokens[0].kind, TokenKind::CodeBlockEnd);
        assert!(tokens[0].correction);
    }

    #[test]
    fn test_backtick_ceiling() {
        let mut machine = MarkerStateMachine::with_limits(20, 4);
        let tokens = machine.process_str("`````a");
        assert!(
            tokens
                .iter()
                .any(|t| t.kind == TokenKind::Text && t.content == "`````")
        );
        assert!(markers(&tokens).is_empty());
    }

    #[test]
    fn test_nesting_ceiling() {
        let mut machine = MarkerStateMachine::with_limits(20, 2);
        let tokens = machine.process_str("[a [b [c");
        assert_eq!(
            markers(&tokens),
            vec![(TokenKind::LinkStart, 0), (TokenKind::LinkStart, 3)]
        );
    }

    #[test]
    fn test_multibyte_positions() {
        let tokens = run("é*x*");
        assert_eq!(
            markers(&tokens),
            vec![(TokenKind::ItalicStart, 2), (TokenKind::ItalicEnd, 4)]
        );
    }

    #[test]
    fn test_history_bounded() {
        let mut machine = MarkerStateMachine::with_limits(3, 32);
        machine.process_str("abcdef");
        let recent = machine.recent_tokens();
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].content, "d");
    }

    #[test]
    fn test_reset() {
        let mut machine = MarkerStateMachine::with_limits(5, 8);
        machine.process_str("**a");
        machine.reset();
        assert_eq!(machine.state(), MachineState::Normal);
        assert_eq!(machine.offset(), 0);
        assert_eq!(machine.contexts().depth(), 1);
        assert!(machine.recent_tokens().is_empty());
    }

    #[test]
    fn test_no_diagnostics_on_normal_input() {
        let mut machine = MarkerStateMachine::new();
        machine.process_str("# T\n\n- *a* **b** `c` [d](e)\n\n> q");
        machine.end();
        assert!(machine.take_diagnostics().is_empty());
        assert_eq!(machine.contexts().depth(), 1);
    }
}
