//! Wait-for-certainty boundary resolution.

use crate::scan::{floor_boundary, line_start, scan};
use crate::{BoundaryResolver, SafeResult};
use log::trace;

/// Characters that may start a construct whose role is not yet known.
const SPECIAL_CHARS: &[char] = &['*', '_', '`', '[', ']', '!', '#', '>', '~', '-'];

/// Characters that, alone on a line, may still grow into a block marker.
const BLOCK_PREFIX_CHARS: &str = "-=*_+#`~>.)0123456789";

/// Never renders a guess.
///
/// Text without markup characters commits immediately, and so does fully
/// closed markup whose last line cannot still become a block marker.
/// Otherwise the boundary only moves to a line end: the last one before the
/// first markup character, or the last one overall once everything up to it
/// is closed.
///
/// # Example
///
/// ```
/// use steadymark_resolver::{BoundaryResolver, ConservativeResolver, SafeResult};
///
/// let resolver = ConservativeResolver;
/// assert_eq!(resolver.resolve("plain", 0), SafeResult::Index(5));
/// assert_eq!(resolver.resolve("a\nb *c", 0), SafeResult::Index(2));
/// assert_eq!(resolver.resolve("*a*\n", 0), SafeResult::Index(4));
/// assert_eq!(resolver.resolve("*a* b", 0), SafeResult::Index(5));
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct ConservativeResolver;

impl BoundaryResolver for ConservativeResolver {
    fn resolve(&self, text: &str, committed: usize) -> SafeResult {
        let committed = floor_boundary(text, committed);
        let unparsed = &text[committed..];
        if unparsed.is_empty() {
            return SafeResult::Index(committed);
        }

        let Some(first_special) = unparsed.find(SPECIAL_CHARS) else {
            return SafeResult::Index(text.len());
        };

        if scan(text, committed).is_resolved() && last_line_settled(text) {
            return SafeResult::Index(text.len());
        }

        if let Some(last_newline) = unparsed.rfind('\n') {
            let end = committed + last_newline + 1;
            if scan(&text[..end], committed).is_resolved() {
                trace!("conservative: lines up to {} are settled", end);
                return SafeResult::Index(end);
            }
        }

        let index = unparsed[..first_special]
            .rfind('\n')
            .map_or(committed, |n| committed + n + 1);
        SafeResult::Index(index)
    }

    fn name(&self) -> &str {
        "conservative"
    }
}

/// Whether the final line is blank or has content beyond marker characters.
fn last_line_settled(text: &str) -> bool {
    let line = text[line_start(text, text.len())..].trim();
    line.is_empty() || !line.chars().all(|c| BLOCK_PREFIX_CHARS.contains(c))
}
