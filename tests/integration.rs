//! Integration tests for steadymark.
//!
//! These tests drive a whole session the way a caller would: chunks in,
//! `ContentParsed` events out, checked against the renderer run once on
//! the finished text.

use steadymark_config::Config;
use steadymark_core::{RingBuffer, StrategyKind, SteadymarkError};
use steadymark_render::{CommonMarkRenderer, DocumentRenderer};
use steadymark_resolver::{resolver_for, BoundaryResolver, SafeResult};
use steadymark_stream::{StreamEvent, StreamSession};

fn session() -> StreamSession {
    StreamSession::new(&Config::default())
}

fn render(text: &str) -> String {
    CommonMarkRenderer::default().render(text).unwrap()
}

/// Contents of the `ContentParsed` events, in order.
fn contents(events: &[StreamEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| e.content().map(str::to_string))
        .collect()
}

/// Feed `text` in pieces of `size` characters, then end the stream.
fn stream(session: &mut StreamSession, text: &str, size: usize) -> Vec<StreamEvent> {
    let chars: Vec<char> = text.chars().collect();
    let mut events = Vec::new();
    for piece in chars.chunks(size.max(1)) {
        let piece: String = piece.iter().collect();
        events.extend(session.write(&piece));
    }
    events.extend(session.end());
    events
}

// =============================================================================
// Reference Scenarios
// =============================================================================

#[test]
fn test_boundary_holds_before_marker() {
    let mut s = session();
    let events = s.write("Hello *");

    assert_eq!(contents(&events), vec!["Hello "]);
    assert_eq!(s.html(), render("Hello "));
    // pulldown-cmark drops the trailing space of the paragraph.
    assert_eq!(s.html(), "<p>Hello</p>\n");
    assert_eq!(s.committed_index(), 6);
}

#[test]
fn test_closing_marker_commits_emphasis() {
    let mut s = session();
    s.write("Hello *");
    let events = s.write("world*");

    let parsed: Vec<&StreamEvent> = events.iter().filter(|e| e.is_content()).collect();
    assert_eq!(parsed.len(), 1);
    match parsed[0] {
        StreamEvent::ContentParsed {
            delta,
            html,
            committed,
            optimistic,
            ..
        } => {
            assert_eq!(delta, "*world*");
            assert!(html.contains("<em>world</em>"));
            assert_eq!(*committed, 13);
            assert!(!optimistic);
        }
        other => panic!("unexpected event {:?}", other),
    }
}

#[test]
fn test_lone_dash_is_list() {
    let mut s = session();
    s.write("-");
    assert_eq!(s.content(), "-");
    assert!(s.html().contains("<li>"));
}

#[test]
fn test_dash_space_stalls() {
    let mut s = session();
    let events = s.write("- ");
    assert!(events.is_empty());
    assert_eq!(s.committed_index(), 0);
    assert_eq!(s.content(), "");
}

#[test]
fn test_optimistic_strong_then_end() {
    let mut s = session();
    s.write("**bold");
    assert_eq!(s.html(), "<p><strong>bold</strong></p>\n");
    assert!(s.is_optimistic());

    let events = s.end();
    assert!(events.iter().all(|e| !e.is_content()));
    assert_eq!(s.html(), "<p><strong>bold</strong></p>\n");
}

#[test]
fn test_ring_buffer_evicts_oldest() {
    let mut ring = RingBuffer::new(10);
    assert_eq!(ring.write("1234567890"), 10);
    assert_eq!(ring.write("abc"), 3);
    assert_eq!(ring.read(None), "4567890abc");
    assert!(ring.is_empty());
}

// =============================================================================
// Convergence
// =============================================================================

const DOCUMENT: &str = "# Release notes\n\
\n\
Some **bold** text, some *emphasis* and `inline code`.\n\
\n\
- first item\n\
- second item with [a link](https://example.com)\n\
\n\
```rust\n\
fn main() {}\n\
```\n\
\n\
> quoted ~~old~~ text\n";

#[test]
fn test_convergence_for_any_chunk_size() {
    let expected = render(DOCUMENT);
    for size in [1, 2, 3, 5, 8, 13, 64, DOCUMENT.len()] {
        let mut s = session();
        stream(&mut s, DOCUMENT, size);
        assert_eq!(s.html(), expected, "chunk size {}", size);
        assert_eq!(s.committed_index(), DOCUMENT.len());
    }
}

#[test]
fn test_conservative_convergence() {
    let mut config = Config::default();
    config.stream.strategy = StrategyKind::Conservative;
    let expected = render(DOCUMENT);
    for size in [1, 4, 32] {
        let mut s = StreamSession::new(&config);
        stream(&mut s, DOCUMENT, size);
        assert_eq!(s.html(), expected, "chunk size {}", size);
    }
}

#[test]
fn test_unfinished_input_is_closed_at_end() {
    let mut s = session();
    stream(&mut s, "an *unfinished thought", 3);
    assert_eq!(s.content(), "an *unfinished thought*");
    assert_eq!(s.html(), "<p>an <em>unfinished thought</em></p>\n");
}

// =============================================================================
// Monotonic Output
// =============================================================================

#[test]
fn test_committed_text_is_never_retracted() {
    let mut s = session();
    let mut last = 0;
    for c in DOCUMENT.chars() {
        for event in s.write(&c.to_string()) {
            if let StreamEvent::ContentParsed {
                content, committed, ..
            } = &event
            {
                assert!(*committed >= last);
                assert!(content.starts_with(&s.text()[..*committed]));
                last = *committed;
            }
        }
    }
}

// =============================================================================
// Speculation
// =============================================================================

#[test]
fn test_link_completion() {
    let mut s = session();
    s.write("see [docs](http://x");
    assert_eq!(s.committed_index(), 4);
    assert_eq!(s.content(), "see [docs](http://x)");
    assert_eq!(s.html(), "<p>see <a href=\"http://x\">docs</a></p>\n");

    s.write(")");
    assert!(!s.is_optimistic());
    assert_eq!(s.content(), "see [docs](http://x)");
}

#[test]
fn test_code_span_completion() {
    let mut s = session();
    s.write("a `b");
    assert_eq!(s.content(), "a `b`");
    assert_eq!(s.html(), "<p>a <code>b</code></p>\n");
}

#[test]
fn test_completed_prefix_commits_before_speculation() {
    let mut s = session();
    s.write("`a` *b");
    assert_eq!(s.committed_index(), 4);
    assert_eq!(s.content(), "`a` *b*");
}

#[test]
fn test_underscore_closer_waits_for_next_char() {
    let mut s = session();
    s.write("x _a_");
    assert_eq!(s.committed_index(), 2);
    assert!(s.is_optimistic());
    assert_eq!(s.html(), "<p>x <em>a</em></p>\n");

    // An intraword character undoes the pair; the emphasis was never committed.
    s.write("b");
    assert_eq!(s.committed_index(), 2);
    assert!(s.is_optimistic());
    assert_eq!(s.content(), "x _a_b_");

    s.write(" c");
    s.end();
    assert_eq!(s.html(), render("x _a_b c_"));
}

#[test]
fn test_code_closer_waits_for_next_char() {
    let mut s = session();
    s.write("x `a`");
    assert_eq!(s.committed_index(), 2);
    assert!(s.is_optimistic());
    assert_eq!(s.html(), "<p>x <code>a</code></p>\n");

    s.write("`");
    assert_eq!(s.committed_index(), 2);
    assert!(s.is_optimistic());

    s.write("b` ");
    assert_eq!(s.committed_index(), 9);
    assert!(!s.is_optimistic());
    assert!(s.html().contains("<code>a``b</code>"));
}

#[test]
fn test_committed_formatting_is_never_revoked() {
    for input in ["x _a_b *c* done", "x `a``b` `c` done", "~~a~~~ _b_ c"] {
        let mut s = session();
        let mut shown: Vec<usize> = vec![0; 3];
        for c in input.chars() {
            for event in s.write(&c.to_string()) {
                if let StreamEvent::ContentParsed { html, optimistic, .. } = &event {
                    let counts: Vec<usize> = ["<em>", "<code>", "<del>"]
                        .iter()
                        .map(|tag| html.matches(tag).count())
                        .collect();
                    for (count, committed) in counts.iter().zip(&shown) {
                        assert!(count >= committed, "{input:?}: {html:?}");
                    }
                    if !optimistic {
                        shown = counts;
                    }
                }
            }
        }
    }
}

#[test]
fn test_emphasis_closes_over_the_whole_segment() {
    let mut s = session();
    s.write("*hello world");
    assert_eq!(s.content(), "*hello world*");
    assert_eq!(s.html(), "<p><em>hello world</em></p>\n");
}

#[test]
fn test_wrong_guess_is_revised() {
    let mut s = session();
    s.write("2 *");
    assert_eq!(s.content(), "2 ");
    s.write(" 3");
    assert_eq!(s.content(), "2 * 3");
    assert!(!s.is_optimistic());
}

// =============================================================================
// Collaborators
// =============================================================================

#[test]
fn test_failing_renderer_degrades_to_escaped_text() {
    let mut s = session().with_renderer(|_: &str| -> steadymark_core::Result<String> {
        Err(SteadymarkError::Render("offline".into()))
    });
    let events = s.write("a<b");
    assert_eq!(s.html(), "<p>a&lt;b</p>\n");
    assert!(events.iter().any(|e| matches!(
        e,
        StreamEvent::Diagnostic { message, .. } if message.contains("offline")
    )));
}

#[test]
fn test_panicking_renderer_does_not_stall() {
    let mut s = session().with_renderer(|md: &str| -> steadymark_core::Result<String> {
        if md.contains('*') {
            panic!("renderer bug");
        }
        Ok(format!("<p>{}</p>\n", md))
    });
    s.write("fine *x");
    assert!(s.html().contains("fine"));
    s.write("*");
    assert!(s.html().contains("*x*"));
}

#[test]
fn test_custom_resolver_plugs_in() {
    struct LineAtATime;
    impl BoundaryResolver for LineAtATime {
        fn resolve(&self, text: &str, committed: usize) -> SafeResult {
            SafeResult::Index(text.rfind('\n').map_or(committed, |i| i + 1))
        }
        fn name(&self) -> &str {
            "lines"
        }
    }

    let mut s = session().with_resolver(Box::new(LineAtATime));
    assert_eq!(s.strategy_name(), "lines");
    assert!(s.write("*a").is_empty());
    s.write("\nb");
    assert_eq!(s.content(), "*a\n");
    s.end();
    assert_eq!(s.content(), "*a\nb");
}

#[test]
fn test_resolver_for_matches_session() {
    let resolver = resolver_for(StrategyKind::Standard, "#");
    assert_eq!(resolver.resolve("Hello *", 0), SafeResult::Index(6));
    assert_eq!(
        resolver.resolve("see [docs](", 4),
        SafeResult::Optimistic("see [docs](#)".to_string())
    );
}

#[test]
fn test_config_override_changes_session() {
    let config = Config::parse_override("[stream]\nStrategy = \"conservative\"\n").unwrap();
    let s = StreamSession::new(&config);
    assert_eq!(s.strategy_name(), "conservative");
}

#[test]
fn test_independent_sessions() {
    let mut a = session();
    let mut b = session();
    a.write("*one");
    b.write("two");
    assert_eq!(a.content(), "*one*");
    assert_eq!(b.content(), "two");
}
