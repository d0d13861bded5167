//! Regex-based closing of unmatched inline openers.

use crate::scan::{scan, Opener, OpenerKind};
use regex::Regex;
use std::sync::LazyLock;

static LINK_TEXT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)^(!?)\[(.*?)\]?$").unwrap());
static LINK_URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)^(!?)\[(.*?)\]\((.*)$").unwrap());

/// URL used for links whose URL has not arrived yet.
pub const DEFAULT_INCOMPLETE_LINK_URL: &str = "#";

/// Result of completing the openers of a streaming text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    /// At least one opener was closed; the synthesized text
    Closed(String),
    /// Every opener had to be cut; hold at this offset
    Hold(usize),
}

/// Stateless patcher that appends plausible closings to open constructs.
///
/// # Example
///
/// ```
/// use steadymark_resolver::TransformFallback;
///
/// let fallback = TransformFallback::default();
/// assert_eq!(fallback.complete("*ital"), "*ital*");
/// assert_eq!(fallback.complete("see [docs](http://x"), "see [docs](http://x)");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformFallback {
    incomplete_link_url: String,
}

impl Default for TransformFallback {
    fn default() -> Self {
        Self::new(DEFAULT_INCOMPLETE_LINK_URL)
    }
}

impl TransformFallback {
    /// Create a fallback using `incomplete_link_url` for links without a URL.
    pub fn new(incomplete_link_url: impl Into<String>) -> Self {
        Self {
            incomplete_link_url: incomplete_link_url.into(),
        }
    }

    pub fn incomplete_link_url(&self) -> &str {
        &self.incomplete_link_url
    }

    /// Close the segment that starts at `opener` and runs to the end of
    /// the text.
    ///
    /// Returns `None` when the opener cannot be closed sensibly: images,
    /// a bare `!`, or a marker with nothing after it.
    pub fn close_segment(&self, opener: &Opener, segment: &str) -> Option<String> {
        let trimmed = segment.trim_end();
        if trimmed.len() <= opener.len || trimmed[opener.len..].trim().is_empty() {
            return None;
        }

        match opener.kind {
            OpenerKind::Emphasis(_) | OpenerKind::Strikethrough => {
                Some(format!("{}{}", trimmed, opener.marker()))
            }
            OpenerKind::Code => {
                let pad = if trimmed.ends_with('`') { " " } else { "" };
                Some(format!("{}{}{}", trimmed, pad, opener.marker()))
            }
            OpenerKind::LinkText => {
                let caps = LINK_TEXT_RE.captures(trimmed)?;
                if !caps[1].is_empty() {
                    return None;
                }
                Some(format!("[{}]({})", &caps[2], self.incomplete_link_url))
            }
            OpenerKind::LinkUrl => {
                let caps = LINK_URL_RE.captures(trimmed)?;
                if !caps[1].is_empty() {
                    return None;
                }
                let url = caps[3].trim();
                let url = if url.is_empty() {
                    self.incomplete_link_url.as_str()
                } else {
                    url
                };
                Some(format!("[{}]({})", &caps[2], url))
            }
            OpenerKind::ImageText | OpenerKind::ImageUrl | OpenerKind::Bang => None,
        }
    }

    /// Complete `openers` of a streaming `text`, innermost first.
    ///
    /// An opener with nothing after it, an image, or a bare `!` is cut at
    /// its position; everything else is closed with
    /// [`TransformFallback::close_segment`]. Cutting an outer opener also
    /// discards the closings synthesized inside it.
    pub fn close_for_stream(&self, text: &str, openers: &[Opener]) -> Completion {
        let mut work = text.trim_end().to_string();
        let mut closed = false;

        for opener in openers.iter().rev() {
            if opener.position >= work.len() {
                work.truncate(opener.position.min(work.len()));
                closed = false;
                continue;
            }
            let start = opener.content_start().min(work.len());
            let hold = opener.kind.is_image()
                || opener.kind == OpenerKind::Bang
                || work[start..].trim().is_empty();
            if !hold {
                if let Some(segment) = self.close_segment(opener, &work[opener.position..]) {
                    work.truncate(opener.position);
                    work.push_str(&segment);
                    closed = true;
                    continue;
                }
            }
            work.truncate(opener.position);
            closed = false;
        }

        if closed {
            Completion::Closed(work)
        } else {
            Completion::Hold(work.len())
        }
    }

    /// Close every closable unmatched opener of a finished text.
    ///
    /// Content-less trailing delimiter runs are dropped only when an outer
    /// opener gets closed over them; otherwise they stay literal. Link text
    /// without a URL and images are left as written.
    ///
    /// # Example
    ///
    /// ```
    /// use steadymark_resolver::TransformFallback;
    ///
    /// let fallback = TransformFallback::default();
    /// assert_eq!(fallback.complete("**bold"), "**bold**");
    /// assert_eq!(fallback.complete("*a *"), "*a*");
    /// assert_eq!(fallback.complete("trailing *"), "trailing *");
    /// assert_eq!(fallback.complete("see [1]"), "see [1]");
    /// ```
    pub fn complete(&self, text: &str) -> String {
        let result = scan(text, 0);
        if result.openers.is_empty() {
            return text.to_string();
        }

        let mut work = text.to_string();
        let mut bare_from: Option<usize> = None;

        for opener in result.openers.iter().rev() {
            if matches!(
                opener.kind,
                OpenerKind::LinkText | OpenerKind::ImageText | OpenerKind::ImageUrl | OpenerKind::Bang
            ) {
                continue;
            }

            let limit = bare_from.unwrap_or(work.len());
            let start = opener.content_start().min(limit);
            if work[start..limit].trim().is_empty() {
                bare_from = Some(opener.position);
                continue;
            }

            if let Some(cut) = bare_from.take() {
                work.truncate(cut);
            }
            if let Some(segment) = self.close_segment(opener, &work[opener.position..]) {
                work.truncate(opener.position);
                work.push_str(&segment);
            }
        }
        work
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opener(kind: OpenerKind, len: usize) -> Opener {
        Opener {
            kind,
            position: 0,
            len,
        }
    }

    #[test]
    fn test_close_emphasis() {
        let fallback = TransformFallback::default();
        let star = opener(OpenerKind::Emphasis('*'), 1);
        assert_eq!(fallback.close_segment(&star, "*ital"), Some("*ital*".into()));
        assert_eq!(fallback.close_segment(&star, "*ital  "), Some("*ital*".into()));
        assert_eq!(fallback.close_segment(&star, "*"), None);
        assert_eq!(fallback.close_segment(&star, "*  "), None);

        let strong = opener(OpenerKind::Emphasis('_'), 2);
        assert_eq!(fallback.close_segment(&strong, "__b"), Some("__b__".into()));
    }

    #[test]
    fn test_close_strike_and_code() {
        let fallback = TransformFallback::default();
        let strike = opener(OpenerKind::Strikethrough, 2);
        assert_eq!(fallback.close_segment(&strike, "~~old"), Some("~~old~~".into()));

        let code = opener(OpenerKind::Code, 2);
        assert_eq!(fallback.close_segment(&code, "``a`"), Some("``a` ``".into()));
        let code = opener(OpenerKind::Code, 1);
        assert_eq!(fallback.close_segment(&code, "`x"), Some("`x`".into()));
    }

    #[test]
    fn test_close_links() {
        let fallback = TransformFallback::new("about:blank");
        let text = opener(OpenerKind::LinkText, 1);
        assert_eq!(
            fallback.close_segment(&text, "[docs"),
            Some("[docs](about:blank)".into())
        );
        assert_eq!(
            fallback.close_segment(&text, "[docs]"),
            Some("[docs](about:blank)".into())
        );

        let url = opener(OpenerKind::LinkUrl, 1);
        assert_eq!(
            fallback.close_segment(&url, "[docs](http://x"),
            Some("[docs](http://x)".into())
        );
        assert_eq!(
            fallback.close_segment(&url, "[docs]("),
            Some("[docs](about:blank)".into())
        );
    }

    #[test]
    fn test_images_not_closed() {
        let fallback = TransformFallback::default();
        assert_eq!(
            fallback.close_segment(&opener(OpenerKind::ImageText, 2), "![alt"),
            None
        );
        assert_eq!(
            fallback.close_segment(&opener(OpenerKind::ImageUrl, 2), "![alt](a.p"),
            None
        );
    }

    #[test]
    fn test_close_for_stream() {
        let fallback = TransformFallback::default();
        let run = |text: &str| fallback.close_for_stream(text, &scan(text, 0).openers);

        assert_eq!(run("*ital"), Completion::Closed("*ital*".into()));
        assert_eq!(run("**a *"), Completion::Closed("**a**".into()));
        assert_eq!(run("[*a"), Completion::Closed("[*a*](#)".into()));
        assert_eq!(run("*"), Completion::Hold(0));
        assert_eq!(run("![alt *b"), Completion::Hold(0));
    }

    #[test]
    fn test_complete_leaves_closed_text() {
        let fallback = TransformFallback::default();
        assert_eq!(fallback.complete("*a* b"), "*a* b");
        assert_eq!(fallback.complete("wow!"), "wow!");
        assert_eq!(fallback.complete("`code"), "`code`");
        assert_eq!(fallback.complete("*_"), "*_");
    }
}
