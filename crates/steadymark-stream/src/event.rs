//! Events returned by a streaming session.

use serde::Serialize;
use std::time::{SystemTime, UNIX_EPOCH};
use steadymark_core::Token;

/// Something a session wants its caller to know.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum StreamEvent {
    /// New text was handed to the renderer.
    ContentParsed {
        /// Exact text rendered, committed or optimistically completed
        content: String,
        /// Renderer output for `content`
        html: String,
        /// Text newly committed by this step
        delta: String,
        /// Committed byte offset after this step
        committed: usize,
        /// Whether `content` carries synthesized closings
        optimistic: bool,
        timestamp: u64,
    },
    /// A token from the tokenizer.
    TokenGenerated { token: Token, timestamp: u64 },
    /// Recovered internal inconsistency or degraded render.
    Diagnostic { message: String, timestamp: u64 },
}

impl StreamEvent {
    /// Milliseconds since the Unix epoch when the event was created.
    pub fn timestamp(&self) -> u64 {
        match self {
            StreamEvent::ContentParsed { timestamp, .. }
            | StreamEvent::TokenGenerated { timestamp, .. }
            | StreamEvent::Diagnostic { timestamp, .. } => *timestamp,
        }
    }

    /// Html of a `ContentParsed` event.
    pub fn html(&self) -> Option<&str> {
        match self {
            StreamEvent::ContentParsed { html, .. } => Some(html),
            _ => None,
        }
    }

    /// Content of a `ContentParsed` event.
    pub fn content(&self) -> Option<&str> {
        match self {
            StreamEvent::ContentParsed { content, .. } => Some(content),
            _ => None,
        }
    }

    pub fn is_content(&self) -> bool {
        matches!(self, StreamEvent::ContentParsed { .. })
    }
}

/// Current time in milliseconds since the Unix epoch.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis() as u64)
}
