//! Degraded rendering when the document renderer fails.

use crate::DocumentRenderer;
use log::warn;
use std::panic::{catch_unwind, AssertUnwindSafe};
use steadymark_core::{Result, SteadymarkError};

/// HTML produced for one render request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderOutcome {
    /// Rendered markup
    pub html: String,
    /// Why the output is degraded, if it is
    pub degraded: Option<String>,
}

impl RenderOutcome {
    pub fn is_degraded(&self) -> bool {
        self.degraded.is_some()
    }
}

/// Wrap text in a paragraph with HTML special characters escaped.
///
/// # Example
///
/// ```
/// use steadymark_render::escape_paragraph;
/// assert_eq!(escape_paragraph("a < b"), "<p>a &lt; b</p>\n");
/// assert_eq!(escape_paragraph("   "), "");
/// ```
pub fn escape_paragraph(text: &str) -> String {
    if text.trim().is_empty() {
        return String::new();
    }
    format!("<p>{}</p>\n", html_escape::encode_text(text))
}

/// Render `content`, never failing.
///
/// If the renderer errors or panics, the first `safe_len` bytes are
/// rendered on their own (or escaped if that fails too) and the rest is
/// appended as an escaped literal paragraph.
pub fn render_with_fallback(
    renderer: &dyn DocumentRenderer,
    content: &str,
    safe_len: usize,
) -> RenderOutcome {
    let error = match guarded_render(renderer, content) {
        Ok(html) => {
            return RenderOutcome {
                html,
                degraded: None,
            }
        }
        Err(e) => e,
    };
    warn!("render failed, falling back to escaped text: {}", error);

    let mut split = safe_len.min(content.len());
    while !content.is_char_boundary(split) {
        split -= 1;
    }
    let (prefix, suffix) = content.split_at(split);

    let mut html = if prefix.is_empty() {
        String::new()
    } else {
        guarded_render(renderer, prefix).unwrap_or_else(|_| escape_paragraph(prefix))
    };
    html.push_str(&escape_paragraph(suffix));

    RenderOutcome {
        html,
        degraded: Some(error.to_string()),
    }
}

fn guarded_render(renderer: &dyn DocumentRenderer, content: &str) -> Result<String> {
    match catch_unwind(AssertUnwindSafe(|| renderer.render(content))) {
        Ok(result) => result,
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "renderer panicked".to_string());
            Err(SteadymarkError::Render(message))
        }
    }
}
