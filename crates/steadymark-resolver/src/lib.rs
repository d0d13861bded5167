//! Steadymark Resolver
//!
//! Decides how much of a growing markdown text can be rendered without
//! later being retracted.
//!
//! # Strategies
//!
//! - [`StandardResolver`] commits every settled prefix and synthesizes
//!   closings for open inline constructs so formatting shows early
//! - [`ConservativeResolver`] only moves the boundary to line ends that are
//!   known to be settled and never renders a guess
//!
//! Any other [`BoundaryResolver`] implementation can be handed to a
//! session as a custom strategy.
//!
//! # Example
//!
//! ```
//! use steadymark_core::StrategyKind;
//! use steadymark_resolver::{resolver_for, SafeResult};
//!
//! let resolver = resolver_for(StrategyKind::Standard, "#");
//! assert_eq!(resolver.resolve("Hello *", 0), SafeResult::Index(6));
//! assert_eq!(resolver.finalize("**bold"), "**bold**");
//! ```

pub mod conservative;
pub mod scan;
pub mod standard;
pub mod transform;

pub use conservative::ConservativeResolver;
pub use standard::StandardResolver;
pub use transform::{Completion, TransformFallback, DEFAULT_INCOMPLETE_LINK_URL};

use steadymark_core::StrategyKind;

/// Outcome of a resolution step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SafeResult {
    /// Text before this byte offset is safe to render as is
    Index(usize),
    /// Render this synthesized text in place of the buffer
    Optimistic(String),
}

/// Strategy deciding the safe boundary of a growing text.
pub trait BoundaryResolver {
    /// Resolve `text` given the current committed boundary.
    ///
    /// An [`SafeResult::Index`] below `committed` is never meaningful.
    fn resolve(&self, text: &str, committed: usize) -> SafeResult;

    /// Text to render once the stream has ended.
    fn finalize(&self, text: &str) -> String {
        text.to_string()
    }

    /// Strategy name for logging.
    fn name(&self) -> &str;
}

/// Build a built-in strategy.
pub fn resolver_for(kind: StrategyKind, incomplete_link_url: &str) -> Box<dyn BoundaryResolver> {
    match kind {
        StrategyKind::Standard => Box::new(StandardResolver::new(TransformFallback::new(
            incomplete_link_url,
        ))),
        StrategyKind::Conservative => Box::new(ConservativeResolver),
    }
}
