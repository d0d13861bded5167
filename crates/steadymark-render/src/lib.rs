//! Steadymark Render
//!
//! Batch markdown to HTML conversion used by a streaming session.
//!
//! # Overview
//!
//! - [`DocumentRenderer`] - anything that turns a markdown document into
//!   HTML; closures qualify
//! - [`CommonMarkRenderer`] - pulldown-cmark with extensions taken from
//!   [`RenderConfig`]
//! - [`render_with_fallback`] - never fails; degrades to escaped text when
//!   the renderer errors or panics
//!
//! # Example
//!
//! ```
//! use steadymark_render::{CommonMarkRenderer, DocumentRenderer};
//!
//! let renderer = CommonMarkRenderer::default();
//! let html = renderer.render("**bold**").unwrap();
//! assert_eq!(html, "<p><strong>bold</strong></p>\n");
//! ```

pub mod fallback;

pub use fallback::{escape_paragraph, render_with_fallback, RenderOutcome};

use pulldown_cmark::{html, Options, Parser};
use steadymark_config::RenderConfig;
use steadymark_core::Result;

/// A pure markdown to HTML function.
pub trait DocumentRenderer {
    /// Render a complete markdown document.
    fn render(&self, markdown: &str) -> Result<String>;
}

impl<F> DocumentRenderer for F
where
    F: Fn(&str) -> Result<String>,
{
    fn render(&self, markdown: &str) -> Result<String> {
        self(markdown)
    }
}

/// CommonMark renderer backed by pulldown-cmark.
#[derive(Debug, Clone)]
pub struct CommonMarkRenderer {
    options: Options,
}

impl Default for CommonMarkRenderer {
    fn default() -> Self {
        Self::new(&RenderConfig::default())
    }
}

impl CommonMarkRenderer {
    /// Create a renderer with the extensions enabled in `config`.
    pub fn new(config: &RenderConfig) -> Self {
        Self {
            options: options_from(config),
        }
    }

    /// Parser options in use.
    pub fn options(&self) -> Options {
        self.options
    }
}

impl DocumentRenderer for CommonMarkRenderer {
    fn render(&self, markdown: &str) -> Result<String> {
        let parser = Parser::new_ext(markdown, self.options);
        let mut out = String::with_capacity(markdown.len() * 3 / 2);
        html::push_html(&mut out, parser);
        Ok(out)
    }
}

fn options_from(config: &RenderConfig) -> Options {
    let mut options = Options::empty();
    if config.tables {
        options.insert(Options::ENABLE_TABLES);
    }
    if config.strikethrough {
        options.insert(Options::ENABLE_STRIKETHROUGH);
    }
    if config.tasklists {
        options.insert(Options::ENABLE_TASKLISTS);
    }
    if config.footnotes {
        options.insert(Options::ENABLE_FOOTNOTES);
    }
    if config.smart_punctuation {
        options.insert(Options::ENABLE_SMART_PUNCTUATION);
    }
    options
}
