//! Inline delimiter scanner.
//!
//! Walks a text from the start of the line holding a given offset and
//! reports which inline openers are still unmatched at the end. Fence
//! state is computed over the preceding lines first, so an offset inside a
//! fenced block is recognised as such.

use regex::Regex;
use std::sync::LazyLock;

static FENCE_OPEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^ {0,3}(`{3,}|~{3,})(.*)$").unwrap());
static FENCE_CLOSE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^ {0,3}(`{3,}|~{3,})[ \t]*$").unwrap());
static HEADING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^ {0,3}#{1,6}(?:[ \t]|$)").unwrap());

/// What an unmatched opener would start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpenerKind {
    /// `*` or `_` run
    Emphasis(char),
    /// `~~`, or a lone trailing `~`
    Strikethrough,
    /// Backtick run without a matching close
    Code,
    /// `[` awaiting `](`
    LinkText,
    /// `![` awaiting `](`
    ImageText,
    /// `[text](` awaiting `)`
    LinkUrl,
    /// `![alt](` awaiting `)`
    ImageUrl,
    /// `!` at the very end of the text
    Bang,
}

impl OpenerKind {
    /// Whether this opener belongs to an image.
    pub fn is_image(&self) -> bool {
        matches!(self, OpenerKind::ImageText | OpenerKind::ImageUrl)
    }
}

/// An unmatched opening marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Opener {
    pub kind: OpenerKind,
    /// Byte offset of the marker
    pub position: usize,
    /// Marker length in bytes still unmatched
    pub len: usize,
}

impl Opener {
    /// Byte offset just past the marker.
    pub fn content_start(&self) -> usize {
        self.position + self.len
    }

    /// Closing marker text for delimiter runs.
    pub fn marker(&self) -> String {
        match self.kind {
            OpenerKind::Emphasis(c) => c.to_string().repeat(self.len),
            OpenerKind::Strikethrough => "~".repeat(self.len),
            OpenerKind::Code => "`".repeat(self.len),
            _ => String::new(),
        }
    }
}

/// Outcome of a scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scan {
    /// Unmatched openers at or after the scan offset, in text order
    pub openers: Vec<Opener>,
    /// Offset of a fence still open at the end of the text
    pub open_fence: Option<usize>,
    /// Opener of a pair whose closing run ends the text, where the next
    /// character may still undo the pairing (`_a_` before `b`, `` `a` ``
    /// before another backtick)
    pub tentative: Option<usize>,
}

impl Scan {
    /// Nothing is left open.
    pub fn is_resolved(&self) -> bool {
        self.openers.is_empty() && self.open_fence.is_none() && self.tentative.is_none()
    }
}

/// Scan `text` and report openers still unmatched at or after `from`.
///
/// # Example
///
/// ```
/// use steadymark_resolver::scan::{scan, OpenerKind};
///
/// let result = scan("Hello *world", 0);
/// assert_eq!(result.openers.len(), 1);
/// assert_eq!(result.openers[0].kind, OpenerKind::Emphasis('*'));
/// assert_eq!(result.openers[0].position, 6);
///
/// assert!(scan("Hello *world*", 0).is_resolved());
/// ```
pub fn scan(text: &str, from: usize) -> Scan {
    let from = floor_boundary(text, from);
    let start = line_start(text, from);
    let mut scanner = Scanner {
        text,
        bytes: text.as_bytes(),
        stack: Vec::new(),
        fence: fence_before(text, start),
        tentative: None,
    };
    scanner.run(start);

    Scan {
        openers: scanner
            .stack
            .into_iter()
            .filter(|o| o.position >= from)
            .collect(),
        open_fence: scanner.fence.map(|f| f.position),
        tentative: scanner.tentative.filter(|&p| p >= from),
    }
}

/// Byte offset of the start of the line containing `index`.
pub fn line_start(text: &str, index: usize) -> usize {
    text[..index].rfind('\n').map_or(0, |n| n + 1)
}

/// Largest char boundary of `text` not after `index`.
pub(crate) fn floor_boundary(text: &str, index: usize) -> usize {
    let mut index = index.min(text.len());
    while !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}

// ============================================================================
// Fences
// ============================================================================

#[derive(Debug, Clone, Copy)]
struct Fence {
    ch: u8,
    len: usize,
    position: usize,
}

fn fence_opens(line: &str, line_offset: usize) -> Option<Fence> {
    let caps = FENCE_OPEN_RE.captures(line)?;
    let run = caps.get(1)?;
    let ch = run.as_str().as_bytes()[0];
    if ch == b'`' && caps.get(2).is_some_and(|info| info.as_str().contains('`')) {
        return None;
    }
    Some(Fence {
        ch,
        len: run.len(),
        position: line_offset + run.start(),
    })
}

fn fence_closes(fence: &Fence, line: &str) -> bool {
    FENCE_CLOSE_RE
        .captures(line)
        .and_then(|caps| caps.get(1))
        .is_some_and(|run| run.as_str().as_bytes()[0] == fence.ch && run.len() >= fence.len)
}

/// Fence left open by the complete lines before `end`.
fn fence_before(text: &str, end: usize) -> Option<Fence> {
    let mut fence = None;
    let mut offset = 0;
    for line in text[..end].split_inclusive('\n') {
        let body = line.trim_end_matches(['\n', '\r']);
        fence = match fence {
            Some(f) if fence_closes(&f, body) => None,
            Some(f) => Some(f),
            None => fence_opens(body, offset),
        };
        offset += line.len();
    }
    fence
}

// ============================================================================
// Scanner
// ============================================================================

struct Scanner<'a> {
    text: &'a str,
    bytes: &'a [u8],
    stack: Vec<Opener>,
    fence: Option<Fence>,
    tentative: Option<usize>,
}

impl Scanner<'_> {
    fn run(&mut self, start: usize) {
        let len = self.bytes.len();
        let mut pos = start;

        while pos < len {
            let line_end = self.text[pos..].find('\n').map_or(len, |n| pos + n);
            let terminated = line_end < len;
            let line = &self.text[pos..line_end];
            let next = if terminated { line_end + 1 } else { len };

            if let Some(fence) = self.fence {
                if fence_closes(&fence, line) {
                    self.fence = None;
                }
                pos = next;
                continue;
            }
            if let Some(fence) = fence_opens(line, pos) {
                self.fence = Some(fence);
                self.stack.clear();
                pos = next;
                continue;
            }
            if line.trim().is_empty() {
                if terminated {
                    self.stack.clear();
                }
                pos = next;
                continue;
            }

            let heading = HEADING_RE.is_match(line);
            let Some(resume) = self.scan_inline(pos, heading) else {
                return;
            };
            if heading && self.bytes[resume - 1] == b'\n' {
                self.stack.clear();
            }
            pos = resume;
        }
    }

    /// Scan inline content up to and including the next newline.
    ///
    /// Returns the offset to resume at, or `None` when an opener swallows
    /// the rest of the text.
    fn scan_inline(&mut self, start: usize, heading: bool) -> Option<usize> {
        let len = self.bytes.len();
        let mut i = start;

        while i < len {
            match self.bytes[i] {
                b'\n' => return Some(i + 1),
                b'\\' => {
                    i += 1;
                    if i < len && self.bytes[i] != b'\n' {
                        i += self.char_len(i);
                    }
                }
                b'`' => {
                    let run = self.run_length(i, b'`');
                    let limit = if heading {
                        self.text[i..].find('\n').map_or(len, |n| i + n)
                    } else {
                        self.paragraph_end(i)
                    };
                    match self.find_code_close(i + run, limit, run) {
                        Some(close) => {
                            if close + run == len {
                                // Another backtick would lengthen the closing run.
                                self.mark_tentative(i);
                            }
                            i = close + run;
                        }
                        None if limit < len => i += run,
                        None => {
                            self.stack.push(Opener {
                                kind: OpenerKind::Code,
                                position: i,
                                len: run,
                            });
                            return None;
                        }
                    }
                }
                b'*' | b'_' => i = self.delimiter_run(i),
                b'~' => {
                    let run = self.run_length(i, b'~');
                    if run == 2 {
                        i = self.delimiter_run(i);
                    } else {
                        if run == 1 && i + 1 == len {
                            self.stack.push(Opener {
                                kind: OpenerKind::Strikethrough,
                                position: i,
                                len: 1,
                            });
                        }
                        i += run;
                    }
                }
                b'!' => {
                    if i + 1 < len && self.bytes[i + 1] == b'[' {
                        self.stack.push(Opener {
                            kind: OpenerKind::ImageText,
                            position: i,
                            len: 2,
                        });
                        i += 2;
                    } else {
                        if i + 1 == len {
                            self.stack.push(Opener {
                                kind: OpenerKind::Bang,
                                position: i,
                                len: 1,
                            });
                        }
                        i += 1;
                    }
                }
                b'[' => {
                    self.stack.push(Opener {
                        kind: OpenerKind::LinkText,
                        position: i,
                        len: 1,
                    });
                    i += 1;
                }
                b']' => i = self.close_bracket(i)?,
                _ => i += self.char_len(i),
            }
        }
        Some(len)
    }

    /// Pair or push a `*`, `_` or `~~` run.
    fn delimiter_run(&mut self, i: usize) -> usize {
        let ch = self.bytes[i];
        let run = self.run_length(i, ch);
        let end = i + run;
        let at_end = end == self.bytes.len();

        let before = self.text[..i].chars().next_back();
        let after = self.text[end..].chars().next();
        let left = after.is_some_and(|c| !c.is_whitespace());
        let right = before.is_some_and(|c| !c.is_whitespace());

        let (can_open, can_close) = if ch == b'_' {
            (
                (left || at_end) && !before.is_some_and(char::is_alphanumeric),
                right && !after.is_some_and(char::is_alphanumeric),
            )
        } else {
            (left || at_end, right)
        };

        let kind = if ch == b'~' {
            OpenerKind::Strikethrough
        } else {
            OpenerKind::Emphasis(ch as char)
        };

        // An intraword character or a third `~` may still follow.
        let undoable = at_end && ch != b'*';

        let mut remaining = run;
        if can_close {
            while remaining > 0 {
                let Some(k) = self.stack.iter().rposition(|o| o.kind == kind) else {
                    break;
                };
                if undoable {
                    let position = self.stack[k].position;
                    self.mark_tentative(position);
                }
                // Openers nested inside the closed pair stay literal.
                self.stack.truncate(k + 1);
                let opener = &mut self.stack[k];
                let used = opener.len.min(remaining);
                opener.len -= used;
                remaining -= used;
                if opener.len == 0 {
                    self.stack.pop();
                }
            }
        }

        if remaining > 0 && can_open {
            self.stack.push(Opener {
                kind,
                position: end - remaining,
                len: remaining,
            });
        }
        end
    }

    fn mark_tentative(&mut self, position: usize) {
        self.tentative = Some(self.tentative.map_or(position, |t| t.min(position)));
    }

    /// Handle `]`, returning `None` when an unterminated URL ends the text.
    fn close_bracket(&mut self, i: usize) -> Option<usize> {
        let len = self.bytes.len();
        let Some(k) = self
            .stack
            .iter()
            .rposition(|o| matches!(o.kind, OpenerKind::LinkText | OpenerKind::ImageText))
        else {
            return Some(i + 1);
        };

        if i + 1 == len {
            // A `(` may still follow.
            return Some(i + 1);
        }
        if self.bytes[i + 1] != b'(' {
            self.stack.remove(k);
            return Some(i + 1);
        }

        let line_end = self.text[i..].find('\n').map_or(len, |n| i + n);
        match self.text[i + 2..line_end].find(')') {
            Some(n) => {
                self.stack.truncate(k);
                Some(i + 2 + n + 1)
            }
            None if line_end == len => {
                let opener = &mut self.stack[k];
                opener.kind = if opener.kind == OpenerKind::ImageText {
                    OpenerKind::ImageUrl
                } else {
                    OpenerKind::LinkUrl
                };
                self.stack.truncate(k + 1);
                None
            }
            None => {
                self.stack.remove(k);
                Some(i + 1)
            }
        }
    }

    /// Start of a backtick run of exactly `run` in `from..limit`.
    fn find_code_close(&self, from: usize, limit: usize, run: usize) -> Option<usize> {
        let mut j = from;
        while j < limit {
            if self.bytes[j] == b'`' {
                let candidate = self.run_length(j, b'`');
                if candidate == run {
                    return Some(j);
                }
                j += candidate;
            } else {
                j += 1;
            }
        }
        None
    }

    /// Start of the first terminated blank line after the line holding `i`.
    fn paragraph_end(&self, i: usize) -> usize {
        let len = self.bytes.len();
        let mut pos = match self.text[i..].find('\n') {
            Some(n) => i + n + 1,
            None => return len,
        };
        while pos < len {
            let end = self.text[pos..].find('\n').map_or(len, |n| pos + n);
            if end < len && self.text[pos..end].trim().is_empty() {
                return pos;
            }
            pos = end + 1;
        }
        len
    }

    fn run_length(&self, i: usize, ch: u8) -> usize {
        self.bytes[i..].iter().take_while(|&&b| b == ch).count()
    }

    fn char_len(&self, i: usize) -> usize {
        self.text[i..].chars().next().map_or(1, char::len_utf8)
    }
}
