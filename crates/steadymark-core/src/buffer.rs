//! Append-only stream buffer with a committed boundary.
//!
//! The [`StreamBuffer`] accumulates all text written to a session and
//! tracks how much of it has been committed as safe to render.

/// Unbounded, append-only text accumulator.
///
/// The committed index is a byte offset that only the owner moves; it is
/// always clamped to the content length and to a char boundary.
///
/// # Example
///
/// ```
/// use steadymark_core::StreamBuffer;
///
/// let mut buffer = StreamBuffer::new();
/// buffer.append("Hello *");
/// buffer.set_committed_index(6);
/// assert_eq!(buffer.parsed(), "Hello ");
/// assert_eq!(buffer.unparsed(), "*");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamBuffer {
    content: String,
    committed_index: usize,
}

impl StreamBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk of text.
    pub fn append(&mut self, chunk: &str) {
        self.content.push_str(chunk);
    }

    /// Full buffered text.
    pub fn as_str(&self) -> &str {
        &self.content
    }

    /// Length of the buffered text in bytes.
    pub fn len(&self) -> usize {
        self.content.len()
    }

    /// Whether nothing has been buffered.
    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    /// Slice of the buffer between two byte offsets.
    ///
    /// Offsets are clamped to the content and moved down to the nearest
    /// char boundary, so this never panics.
    ///
    /// # Example
    ///
    /// ```
    /// use steadymark_core::StreamBuffer;
    /// let mut buffer = StreamBuffer::new();
    /// buffer.append("abcdef");
    /// assert_eq!(buffer.slice(2, 4), "cd");
    /// assert_eq!(buffer.slice(4, 100), "ef");
    /// assert_eq!(buffer.slice(5, 2), "");
    /// ```
    pub fn slice(&self, from: usize, to: usize) -> &str {
        let to = self.floor_boundary(to);
        let from = self.floor_boundary(from).min(to);
        &self.content[from..to]
    }

    /// Current committed boundary.
    pub fn committed_index(&self) -> usize {
        self.committed_index
    }

    /// Move the committed boundary.
    ///
    /// The index is clamped to the content length and to a char boundary.
    pub fn set_committed_index(&mut self, index: usize) {
        self.committed_index = self.floor_boundary(index);
    }

    /// Text before the committed boundary.
    pub fn parsed(&self) -> &str {
        &self.content[..self.committed_index]
    }

    /// Text after the committed boundary.
    pub fn unparsed(&self) -> &str {
        &self.content[self.committed_index..]
    }

    /// Clear all content and the boundary.
    pub fn reset(&mut self) {
        self.content.clear();
        self.committed_index = 0;
    }

    fn floor_boundary(&self, index: usize) -> usize {
        let mut index = index.min(self.content.len());
        while !self.content.is_char_boundary(index) {
            index -= 1;
        }
        index
    }
}
