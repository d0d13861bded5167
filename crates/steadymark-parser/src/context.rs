//! Context stack for the marker state machine.
//!
//! Each open construct is a [`ParserContext`] on the [`ContextStack`]. A root
//! sentinel sits at the bottom and is never popped.

use steadymark_core::{ContextType, Result, SteadymarkError};

/// An open construct awaiting its close.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParserContext {
    /// Construct kind
    pub kind: ContextType,
    /// Byte offset of the opening marker
    pub start_position: usize,
    /// Exact opening marker text (`*`, `__`, "```", `![`, ...)
    pub start_marker: String,
    /// Pair id shared with the opening token, if any
    pub pair_id: Option<usize>,
    /// For links and images: the `](` has been seen
    pub in_url: bool,
}

impl ParserContext {
    /// Create a context opened by `marker` at `position`.
    pub fn new(kind: ContextType, position: usize, marker: impl Into<String>) -> Self {
        Self {
            kind,
            start_position: position,
            start_marker: marker.into(),
            pair_id: None,
            in_url: false,
        }
    }

    /// The root sentinel.
    pub fn root() -> Self {
        Self::new(ContextType::Root, 0, "")
    }

    /// Attach a pair id.
    pub fn with_pair(mut self, id: usize) -> Self {
        self.pair_id = Some(id);
        self
    }

    /// First character of the opening marker.
    pub fn marker_char(&self) -> Option<char> {
        self.start_marker.chars().next()
    }

    /// Byte offset just past the opening marker.
    pub fn content_start(&self) -> usize {
        self.start_position + self.start_marker.len()
    }
}

/// Stack of open contexts with a permanent root.
#[derive(Debug, Clone)]
pub struct ContextStack {
    stack: Vec<ParserContext>,
}

impl Default for ContextStack {
    fn default() -> Self {
        Self::new()
    }
}

impl ContextStack {
    /// Create a stack holding only the root.
    pub fn new() -> Self {
        Self {
            stack: vec![ParserContext::root()],
        }
    }

    /// Innermost open context.
    pub fn top(&self) -> &ParserContext {
        &self.stack[self.stack.len() - 1]
    }

    /// Mutable access to the innermost context.
    pub fn top_mut(&mut self) -> &mut ParserContext {
        let last = self.stack.len() - 1;
        &mut self.stack[last]
    }

    /// Kind of the innermost context.
    pub fn top_kind(&self) -> ContextType {
        self.top().kind
    }

    /// Push a context.
    pub fn push(&mut self, context: ParserContext) {
        self.stack.push(context);
    }

    /// Pop the innermost context.
    ///
    /// Popping the root is an internal inconsistency and returns
    /// [`SteadymarkError::StateCorruption`]; the stack is left unchanged.
    pub fn pop(&mut self) -> Result<ParserContext> {
        if self.stack.len() <= 1 {
            return Err(SteadymarkError::StateCorruption(
                "attempted to pop the root context".to_string(),
            ));
        }
        self.stack
            .pop()
            .ok_or_else(|| SteadymarkError::StateCorruption("empty context stack".to_string()))
    }

    /// Pop the innermost context, requiring it to be of `kind`.
    pub fn pop_expected(&mut self, kind: ContextType) -> Result<ParserContext> {
        let top = self.top_kind();
        if top != kind {
            return Err(SteadymarkError::StateCorruption(format!(
                "expected {} on top of the context stack, found {}",
                kind, top
            )));
        }
        self.pop()
    }

    /// Number of contexts including the root.
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Number of open inline contexts.
    pub fn inline_depth(&self) -> usize {
        self.stack.iter().filter(|c| c.kind.is_inline()).count()
    }

    /// Whether any open context is of `kind`.
    pub fn contains(&self, kind: ContextType) -> bool {
        self.stack.iter().any(|c| c.kind == kind)
    }

    /// Contexts from root to innermost.
    pub fn iter(&self) -> impl Iterator<Item = &ParserContext> {
        self.stack.iter()
    }

    /// Drop everything but the root.
    pub fn reset(&mut self) {
        self.stack.truncate(1);
    }
}
