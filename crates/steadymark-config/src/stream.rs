//! Stream session configuration.
//!
//! This module contains the `StreamConfig` struct which holds
//! the resolution strategy and the buffer and history limits.

use serde::{Deserialize, Serialize};
use steadymark_core::StrategyKind;

/// Streaming behaviour configuration.
///
/// Controls how a session buffers, tokenizes, and resolves input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StreamConfig {
    /// Boundary resolution strategy.
    /// Default: standard
    #[serde(default)]
    pub strategy: StrategyKind,

    /// Largest backtrack distance a caller may request.
    /// Default: 100
    #[serde(default = "default_max_backtrack_distance")]
    pub max_backtrack_distance: usize,

    /// Number of recent tokens kept for diagnostics.
    /// Default: 20
    #[serde(default = "default_token_history_size")]
    pub token_history_size: usize,

    /// Capacity of the input staging ring buffer, in characters.
    /// Default: 8192
    #[serde(default = "default_ring_buffer_capacity")]
    pub ring_buffer_capacity: usize,

    /// Longest marker run held pending before it is flushed as text.
    /// Default: 32
    #[serde(default = "default_pending_marker_ceiling")]
    pub pending_marker_ceiling: usize,

    /// Emit a `TokenGenerated` event for every token.
    /// Default: false
    #[serde(default)]
    pub token_events: bool,

    /// URL used when closing a link whose URL has not arrived yet.
    /// Default: "#"
    #[serde(default = "default_incomplete_link_url")]
    pub incomplete_link_url: String,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            strategy: StrategyKind::Standard,
            max_backtrack_distance: default_max_backtrack_distance(),
            token_history_size: default_token_history_size(),
            ring_buffer_capacity: default_ring_buffer_capacity(),
            pending_marker_ceiling: default_pending_marker_ceiling(),
            token_events: false,
            incomplete_link_url: default_incomplete_link_url(),
        }
    }
}

impl StreamConfig {
    /// Merge another StreamConfig into this one.
    ///
    /// All fields are copied from `other`; an override file only needs the
    /// keys it changes because missing keys deserialize to their defaults.
    pub fn merge(&mut self, other: &StreamConfig) {
        self.strategy = other.strategy;
        self.max_backtrack_distance = other.max_backtrack_distance;
        self.token_history_size = other.token_history_size;
        self.ring_buffer_capacity = other.ring_buffer_capacity;
        self.pending_marker_ceiling = other.pending_marker_ceiling;
        self.token_events = other.token_events;
        self.incomplete_link_url = other.incomplete_link_url.clone();
    }

    /// Configuration for callers whose renderer cannot tolerate guesses.
    pub fn conservative() -> Self {
        Self {
            strategy: StrategyKind::Conservative,
            ..Self::default()
        }
    }
}

fn default_max_backtrack_distance() -> usize {
    100
}

fn default_token_history_size() -> usize {
    20
}

fn default_ring_buffer_capacity() -> usize {
    8192
}

fn default_pending_marker_ceiling() -> usize {
    32
}

fn default_incomplete_link_url() -> String {
    "#".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default() {
        let stream = StreamConfig::default();
        assert_eq!(stream.strategy, StrategyKind::Standard);
        assert_eq!(stream.max_backtrack_distance, 100);
        assert_eq!(stream.token_history_size, 20);
        assert_eq!(stream.ring_buffer_capacity, 8192);
        assert_eq!(stream.pending_marker_ceiling, 32);
        assert!(!stream.token_events);
        assert_eq!(stream.incomplete_link_url, "#");
    }

    #[test]
    fn test_serde_pascal_case() {
        let toml_str = r#"
            Strategy = "conservative"
            MaxBacktrackDistance = 50
            TokenHistorySize = 5
            RingBufferCapacity = 64
            PendingMarkerCeiling = 8
            TokenEvents = true
            IncompleteLinkUrl = "about:blank"
        "#;

        let stream: StreamConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(stream.strategy, StrategyKind::Conservative);
        assert_eq!(stream.max_backtrack_distance, 50);
        assert_eq!(stream.token_history_size, 5);
        assert_eq!(stream.ring_buffer_capacity, 64);
        assert_eq!(stream.pending_marker_ceiling, 8);
        assert!(stream.token_events);
        assert_eq!(stream.incomplete_link_url, "about:blank");
    }

    #[test]
    fn test_partial_uses_defaults() {
        let stream: StreamConfig = toml::from_str("TokenEvents = true").unwrap();
        assert!(stream.token_events);
        assert_eq!(stream.ring_buffer_capacity, 8192);
    }

    #[test]
    fn test_conservative() {
        let stream = StreamConfig::conservative();
        assert_eq!(stream.strategy, StrategyKind::Conservative);
        assert_eq!(stream.token_history_size, 20);
    }
}
