//! Steadymark Stream
//!
//! A [`StreamSession`] accepts markdown a few characters at a time and,
//! after every write, hands the renderer only text that will not need to
//! be visually retracted later.
//!
//! # Example
//!
//! ```
//! use steadymark_config::Config;
//! use steadymark_stream::{StreamEvent, StreamSession};
//!
//! let mut session = StreamSession::new(&Config::default());
//!
//! session.write("Hello *");
//! assert_eq!(session.content(), "Hello ");
//!
//! let events = session.write("world*");
//! assert!(matches!(
//!     &events[0],
//!     StreamEvent::ContentParsed { delta, .. } if delta == "*world*"
//! ));
//! assert!(session.html().contains("<em>world</em>"));
//!
//! session.end();
//! ```

pub mod event;

pub use event::{now_millis, StreamEvent};

use log::{debug, warn};
use steadymark_config::{Config, StreamConfig};
use steadymark_core::{Result, RingBuffer, StreamBuffer, Token};
use steadymark_parser::{MachineState, MarkerStateMachine};
use steadymark_render::{render_with_fallback, CommonMarkRenderer, DocumentRenderer};
use steadymark_resolver::{resolver_for, BoundaryResolver, SafeResult};

/// Upper bound on resolution steps per write.
const MAX_RESOLVE_STEPS: usize = 64;

/// One streaming document.
pub struct StreamSession {
    config: StreamConfig,
    buffer: StreamBuffer,
    ring: RingBuffer,
    machine: MarkerStateMachine,
    resolver: Box<dyn BoundaryResolver>,
    renderer: Box<dyn DocumentRenderer>,
    /// Last content handed to the renderer
    content: String,
    html: String,
    optimistic: bool,
    ended: bool,
    events: Vec<StreamEvent>,
}

impl StreamSession {
    /// Create a session using the built-in strategy and renderer selected
    /// by `config`.
    pub fn new(config: &Config) -> Self {
        let stream = &config.stream;
        Self {
            config: stream.clone(),
            buffer: StreamBuffer::new(),
            ring: RingBuffer::new(stream.ring_buffer_capacity),
            machine: MarkerStateMachine::with_limits(
                stream.token_history_size,
                stream.pending_marker_ceiling,
            ),
            resolver: resolver_for(stream.strategy, &stream.incomplete_link_url),
            renderer: Box::new(CommonMarkRenderer::new(&config.render)),
            content: String::new(),
            html: String::new(),
            optimistic: false,
            ended: false,
            events: Vec::new(),
        }
    }

    /// Replace the boundary strategy.
    pub fn with_resolver(mut self, resolver: Box<dyn BoundaryResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    /// Replace the document renderer.
    pub fn with_renderer(mut self, renderer: impl DocumentRenderer + 'static) -> Self {
        self.renderer = Box::new(renderer);
        self
    }

    // ========================================================================
    // Input
    // ========================================================================

    /// Append a chunk and return the events it produced.
    pub fn write(&mut self, chunk: &str) -> Vec<StreamEvent> {
        if chunk.is_empty() {
            return Vec::new();
        }
        self.ended = false;
        self.buffer.append(chunk);
        self.tokenize(chunk);
        self.resolve();
        std::mem::take(&mut self.events)
    }

    /// Finish the stream: close open constructs and render the final text.
    ///
    /// A second call without new input returns nothing.
    pub fn end(&mut self) -> Vec<StreamEvent> {
        if self.ended {
            return Vec::new();
        }
        self.ended = true;

        let tokens = self.machine.end();
        self.emit_tokens(tokens);
        self.emit_diagnostics();

        let before = self.buffer.committed_index();
        let finalized = self.resolver.finalize(self.buffer.as_str());
        self.buffer.set_committed_index(self.buffer.len());
        debug!(
            "{} stream ended at {} bytes",
            self.resolver.name(),
            self.buffer.len()
        );

        if finalized != self.content {
            let delta = self.buffer.slice(before, self.buffer.len()).to_string();
            self.publish(finalized, delta, before, false);
        }
        std::mem::take(&mut self.events)
    }

    /// Drop all input and state.
    pub fn reset(&mut self) {
        self.buffer.reset();
        self.ring.clear();
        self.machine.reset();
        self.content.clear();
        self.html.clear();
        self.optimistic = false;
        self.ended = false;
        self.events.clear();
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Text most recently handed to the renderer.
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Renderer output for [`StreamSession::content`].
    pub fn html(&self) -> &str {
        &self.html
    }

    /// Whether the current content carries synthesized closings.
    pub fn is_optimistic(&self) -> bool {
        self.optimistic
    }

    /// Committed byte offset into [`StreamSession::text`].
    pub fn committed_index(&self) -> usize {
        self.buffer.committed_index()
    }

    /// Everything written so far.
    pub fn text(&self) -> &str {
        self.buffer.as_str()
    }

    /// Whether `end` ran with no input since.
    pub fn is_ended(&self) -> bool {
        self.ended
    }

    /// The last `n` characters fed to the tokenizer.
    ///
    /// Fails with `BacktrackOutOfRange` when `n` exceeds the configured
    /// maximum; otherwise the result is clamped to what the staging ring
    /// still holds.
    pub fn recent_input(&mut self, n: usize) -> Result<String> {
        let moved = self
            .ring
            .checked_backtrack(n, self.config.max_backtrack_distance)?;
        let text = self.ring.peek(0, moved);
        self.ring.read(Some(moved));
        Ok(text)
    }

    /// Recently emitted tokens, oldest first.
    pub fn recent_tokens(&self) -> Vec<Token> {
        self.machine.recent_tokens()
    }

    /// Tokenizer state.
    pub fn state(&self) -> MachineState {
        self.machine.state()
    }

    /// Name of the boundary strategy in use.
    pub fn strategy_name(&self) -> &str {
        self.resolver.name()
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    // ========================================================================
    // Internals
    // ========================================================================

    /// Stage `chunk` through the ring in pieces that fit and feed it to the
    /// tokenizer.
    fn tokenize(&mut self, chunk: &str) {
        let mut rest = chunk;
        while !rest.is_empty() {
            let room = self.ring.free().max(1);
            let split = rest.char_indices().nth(room).map_or(rest.len(), |(i, _)| i);
            let (piece, tail) = rest.split_at(split);
            rest = tail;

            self.ring.write(piece);
            let staged = self.ring.read(None);
            for c in staged.chars() {
                let tokens = self.machine.process_char(c);
                self.emit_tokens(tokens);
            }
        }
        self.emit_diagnostics();
    }

    fn emit_tokens(&mut self, tokens: Vec<Token>) {
        if !self.config.token_events {
            return;
        }
        let timestamp = now_millis();
        self.events.extend(
            tokens
                .into_iter()
                .map(|token| StreamEvent::TokenGenerated { token, timestamp }),
        );
    }

    fn emit_diagnostics(&mut self) {
        for message in self.machine.take_diagnostics() {
            self.diagnostic(message);
        }
    }

    fn diagnostic(&mut self, message: String) {
        warn!("{}", message);
        self.events.push(StreamEvent::Diagnostic {
            message,
            timestamp: now_millis(),
        });
    }

    /// Advance the committed boundary as far as the strategy allows and
    /// publish the result if it changed.
    fn resolve(&mut self) {
        let before = self.buffer.committed_index();
        let mut optimistic = None;

        for _ in 0..MAX_RESOLVE_STEPS {
            let committed = self.buffer.committed_index();
            match self.resolver.resolve(self.buffer.as_str(), committed) {
                SafeResult::Index(index) if index > committed => {
                    self.buffer.set_committed_index(index);
                    if self.buffer.committed_index() == committed {
                        break;
                    }
                }
                SafeResult::Index(index) => {
                    if index < committed {
                        warn!(
                            "{} resolver moved the boundary back from {} to {}, ignored",
                            self.resolver.name(),
                            committed,
                            index
                        );
                    }
                    break;
                }
                SafeResult::Optimistic(text) => {
                    optimistic = Some(text);
                    break;
                }
            }
        }

        let committed = self.buffer.committed_index();
        let delta = self.buffer.slice(before, committed).to_string();
        let (content, is_optimistic) = match optimistic {
            Some(text) => (text, true),
            None => (self.buffer.parsed().to_string(), false),
        };

        if content != self.content {
            self.publish(content, delta, committed, is_optimistic);
        } else {
            self.optimistic = is_optimistic;
        }
    }

    fn publish(&mut self, content: String, delta: String, safe_len: usize, optimistic: bool) {
        let outcome = render_with_fallback(self.renderer.as_ref(), &content, safe_len);
        if let Some(reason) = outcome.degraded {
            self.diagnostic(format!("render degraded: {}", reason));
        }

        self.html = outcome.html;
        self.content = content;
        self.optimistic = optimistic;
        self.events.push(StreamEvent::ContentParsed {
            content: self.content.clone(),
            html: self.html.clone(),
            delta,
            committed: self.buffer.committed_index(),
            optimistic,
            timestamp: now_millis(),
        });
    }
}

impl std::fmt::Debug for StreamSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamSession")
            .field("strategy", &self.resolver.name())
            .field("committed", &self.buffer.committed_index())
            .field("len", &self.buffer.len())
            .field("optimistic", &self.optimistic)
            .field("ended", &self.ended)
            .finish()
    }
}
