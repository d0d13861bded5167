//! Optimistic boundary resolution.

use crate::scan::{floor_boundary, line_start, scan};
use crate::transform::{Completion, TransformFallback};
use crate::{BoundaryResolver, SafeResult};
use log::{debug, trace};
use regex::Regex;
use std::sync::LazyLock;

/// A list marker with nothing after it yet.
static LIST_MARKER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s{0,3}([-+*]|\d{1,9}[.)])[ \t]+$").unwrap());

/// Commits everything that is settled and synthesizes closings for what
/// is still open.
///
/// # Example
///
/// ```
/// use steadymark_resolver::{BoundaryResolver, SafeResult, StandardResolver};
///
/// let resolver = StandardResolver::default();
/// assert_eq!(resolver.resolve("Hello *", 0), SafeResult::Index(6));
/// assert_eq!(
///     resolver.resolve("Hello *world", 6),
///     SafeResult::Optimistic("Hello *world*".to_string())
/// );
/// ```
#[derive(Debug, Clone, Default)]
pub struct StandardResolver {
    fallback: TransformFallback,
}

impl StandardResolver {
    pub fn new(fallback: TransformFallback) -> Self {
        Self { fallback }
    }

    pub fn fallback(&self) -> &TransformFallback {
        &self.fallback
    }

    /// Pull a candidate boundary back to the start of its line when the
    /// text before it on that line is still ambiguous.
    fn hold_ambiguous_line(&self, text: &str, committed: usize, index: usize, in_fence: bool) -> usize {
        if in_fence {
            return index;
        }
        let start = line_start(text, index);
        let line = &text[start..index];
        if LIST_MARKER_RE.is_match(line)
            || (index == text.len() && is_setext_underline(text, start, line))
        {
            trace!("holding ambiguous line at {}", start);
            return start.max(committed);
        }
        index
    }
}

/// A short `-`/`=` run under a paragraph line may still become a setext
/// underline or a list item.
fn is_setext_underline(text: &str, start: usize, line: &str) -> bool {
    if start == 0 || !matches!(line.trim(), "-" | "--" | "=" | "==") {
        return false;
    }
    let prev_end = start - 1;
    let prev = &text[line_start(text, prev_end)..prev_end];
    !prev.trim().is_empty()
}

impl BoundaryResolver for StandardResolver {
    fn resolve(&self, text: &str, committed: usize) -> SafeResult {
        let committed = floor_boundary(text, committed);
        if committed == text.len() {
            return SafeResult::Index(committed);
        }

        let result = scan(text, committed);
        let first = result.openers.first().map(|o| o.position);
        let limit = match (first, result.tentative) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        let Some(limit) = limit else {
            let in_fence = result.open_fence.is_some();
            return SafeResult::Index(self.hold_ambiguous_line(text, committed, text.len(), in_fence));
        };

        if limit > committed {
            let index = self.hold_ambiguous_line(text, committed, limit, false);
            if index > committed {
                debug!("committing settled prefix up to {}", index);
                return SafeResult::Index(index);
            }
        }

        if result.openers.is_empty() {
            // Closed, but the closing run may still change.
            trace!("tentative pair at {}", limit);
            return SafeResult::Optimistic(text.to_string());
        }

        match self.fallback.close_for_stream(text, &result.openers) {
            Completion::Closed(optimistic) => {
                debug!("optimistic completion of {} opener(s)", result.openers.len());
                SafeResult::Optimistic(optimistic)
            }
            Completion::Hold(index) => {
                let index = result.tentative.map_or(index, |t| index.min(t));
                SafeResult::Index(self.hold_ambiguous_line(
                    text,
                    committed,
                    index.max(committed),
                    false,
                ))
            }
        }
    }

    fn finalize(&self, text: &str) -> String {
        self.fallback.complete(text)
    }

    fn name(&self) -> &str {
        "standard"
    }
}
