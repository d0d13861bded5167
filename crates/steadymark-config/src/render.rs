//! Renderer configuration.
//!
//! Extension switches handed to the batch markdown renderer.

use serde::{Deserialize, Serialize};

/// Markdown extensions enabled in the batch renderer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RenderConfig {
    /// GFM tables.
    /// Default: true
    #[serde(default = "default_true")]
    pub tables: bool,

    /// `~~strikethrough~~`.
    /// Default: true
    #[serde(default = "default_true")]
    pub strikethrough: bool,

    /// `- [ ]` task list items.
    /// Default: true
    #[serde(default = "default_true")]
    pub tasklists: bool,

    /// `[^1]` footnotes.
    /// Default: false
    #[serde(default)]
    pub footnotes: bool,

    /// Curly quotes and dashes.
    /// Default: false
    #[serde(default)]
    pub smart_punctuation: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            tables: true,
            strikethrough: true,
            tasklists: true,
            footnotes: false,
            smart_punctuation: false,
        }
    }
}

impl RenderConfig {
    /// Merge another RenderConfig into this one.
    pub fn merge(&mut self, other: &RenderConfig) {
        self.tables = other.tables;
        self.strikethrough = other.strikethrough;
        self.tasklists = other.tasklists;
        self.footnotes = other.footnotes;
        self.smart_punctuation = other.smart_punctuation;
    }

    /// Plain CommonMark with every extension disabled.
    pub fn commonmark() -> Self {
        Self {
            tables: false,
            strikethrough: false,
            tasklists: false,
            footnotes: false,
            smart_punctuation: false,
        }
    }
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default() {
        let render = RenderConfig::default();
        assert!(render.tables);
        assert!(render.strikethrough);
        assert!(render.tasklists);
        assert!(!render.footnotes);
        assert!(!render.smart_punctuation);
    }

    #[test]
    fn test_commonmark() {
        let render = RenderConfig::commonmark();
        assert!(!render.tables);
        assert!(!render.strikethrough);
    }

    #[test]
    fn test_serde_pascal_case() {
        let render: RenderConfig = toml::from_str(
            r#"
            Tables = false
            SmartPunctuation = true
        "#,
        )
        .unwrap();
        assert!(!render.tables);
        assert!(render.smart_punctuation);
        assert!(render.strikethrough);
    }
}
