//! Fixed-capacity circular character store.
//!
//! The [`RingBuffer`] stages incoming text for the tokenizer with bounded
//! memory. Writes past capacity evict the oldest unread characters; no log
//! of evicted data is kept, so backtracking across an eviction is clamped.

use crate::error::{Result, SteadymarkError};

/// Circular buffer of characters with read, peek, and backtrack.
///
/// Positions are absolute counters; a slot is `pos % capacity`.
///
/// # Example
///
/// ```
/// use steadymark_core::RingBuffer;
///
/// let mut ring = RingBuffer::new(10);
/// ring.write("1234567890");
/// ring.write("abc");
/// assert_eq!(ring.read(None), "4567890abc");
/// ```
#[derive(Debug, Clone)]
pub struct RingBuffer {
    slots: Vec<char>,
    capacity: usize,
    read_pos: usize,
    write_pos: usize,
    total_processed: usize,
}

impl RingBuffer {
    /// Create a ring buffer holding at most `capacity` characters.
    ///
    /// A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            slots: vec!['\0'; capacity],
            capacity,
            read_pos: 0,
            write_pos: 0,
            total_processed: 0,
        }
    }

    /// Maximum number of characters held.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of unread characters.
    pub fn available(&self) -> usize {
        self.write_pos - self.read_pos
    }

    /// Free space before a write starts evicting.
    pub fn free(&self) -> usize {
        self.capacity - self.available()
    }

    /// Whether there is nothing left to read.
    pub fn is_empty(&self) -> bool {
        self.available() == 0
    }

    /// Total number of characters consumed by `read`.
    pub fn total_processed(&self) -> usize {
        self.total_processed
    }

    /// Write a chunk, returning the number of characters written.
    ///
    /// If the chunk does not fit, the oldest unread characters are
    /// overwritten and the read cursor advances past them.
    pub fn write(&mut self, chunk: &str) -> usize {
        let mut count = 0;
        for c in chunk.chars() {
            let slot = self.write_pos % self.capacity;
            self.slots[slot] = c;
            self.write_pos += 1;
            count += 1;
        }
        if self.available() > self.capacity {
            self.read_pos = self.write_pos - self.capacity;
        }
        count
    }

    /// Consume up to `n` characters, or everything available for `None`.
    pub fn read(&mut self, n: Option<usize>) -> String {
        let count = n.unwrap_or(usize::MAX).min(self.available());
        let out = self.collect(self.read_pos, count);
        self.read_pos += count;
        self.total_processed += count;
        out
    }

    /// Look at `len` unread characters starting `offset` past the read
    /// cursor without consuming them.
    ///
    /// # Example
    ///
    /// ```
    /// use steadymark_core::RingBuffer;
    /// let mut ring = RingBuffer::new(8);
    /// ring.write("abcdef");
    /// assert_eq!(ring.peek(2, 3), "cde");
    /// assert_eq!(ring.available(), 6);
    /// ```
    pub fn peek(&self, offset: usize, len: usize) -> String {
        let available = self.available();
        if offset >= available {
            return String::new();
        }
        let count = len.min(available - offset);
        self.collect(self.read_pos + offset, count)
    }

    /// Move the read cursor back over already-read characters.
    ///
    /// Returns the distance actually moved, capped at
    /// `min(n, total_processed, capacity - available)`.
    pub fn backtrack(&mut self, n: usize) -> usize {
        let actual = n.min(self.total_processed).min(self.free());
        self.read_pos -= actual;
        self.total_processed -= actual;
        actual
    }

    /// Backtrack, refusing requests longer than `max_distance`.
    ///
    /// Requests within the limit behave like [`RingBuffer::backtrack`] and
    /// may still be clamped by the available history.
    pub fn checked_backtrack(&mut self, n: usize, max_distance: usize) -> Result<usize> {
        if n > max_distance {
            return Err(SteadymarkError::BacktrackOutOfRange {
                requested: n,
                limit: max_distance,
            });
        }
        Ok(self.backtrack(n))
    }

    /// Drop all content and reset the counters.
    pub fn clear(&mut self) {
        self.read_pos = 0;
        self.write_pos = 0;
        self.total_processed = 0;
    }

    fn collect(&self, from: usize, count: usize) -> String {
        (from..from + count)
            .map(|pos| self.slots[pos % self.capacity])
            .collect()
    }
}

impl Default for RingBuffer {
    fn default() -> Self {
        Self::new(8192)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_and_read() {
        let mut ring = RingBuffer::new(16);
        assert_eq!(ring.write("hello"), 5);
        assert_eq!(ring.available(), 5);
        assert_eq!(ring.read(Some(2)), "he");
        assert_eq!(ring.read(None), "llo");
        assert!(ring.is_empty());
        assert_eq!(ring.total_processed(), 5);
    }

    #[test]
    fn test_overflow_evicts_oldest() {
        let mut ring = RingBuffer::new(10);
        ring.write("1234567890");
        ring.write("abc");
        assert_eq!(ring.available(), 10);
        assert_eq!(ring.read(None), "4567890abc");
    }

    #[test]
    fn test_wraparound() {
        let mut ring = RingBuffer::new(4);
        ring.write("ab");
        assert_eq!(ring.read(None), "ab");
        ring.write("cdef");
        assert_eq!(ring.read(None), "cdef");
    }

    #[test]
    fn test_peek_does_not_consume() {
        let mut ring = RingBuffer::new(8);
        ring.write("stream");
        assert_eq!(ring.peek(0, 3), "str");
        assert_eq!(ring.peek(4, 10), "am");
        assert_eq!(ring.peek(6, 1), "");
        assert_eq!(ring.read(None), "stream");
    }

    #[test]
    fn test_multibyte_chars() {
        let mut ring = RingBuffer::new(4);
        assert_eq!(ring.write("héllo"), 5);
        assert_eq!(ring.read(None), "éllo");
    }

    #[test]
    fn test_backtrack() {
        let mut ring = RingBuffer::new(10);
        ring.write("abcdef");
        ring.read(Some(4));
        assert_eq!(ring.backtrack(2), 2);
        assert_eq!(ring.read(None), "cdef");
    }

    #[test]
    fn test_backtrack_clamped_to_processed() {
        let mut ring = RingBuffer::new(10);
        ring.write("abc");
        ring.read(Some(1));
        assert_eq!(ring.backtrack(5), 1);
        assert_eq!(ring.read(None), "abc");
    }

    #[test]
    fn test_backtrack_clamped_by_eviction() {
        let mut ring = RingBuffer::new(4);
        ring.write("abcd");
        ring.read(Some(3));
        ring.write("ef");
        // slots now hold e f c d, with "def" unread; only 'c' is recoverable
        assert_eq!(ring.available(), 3);
        assert_eq!(ring.backtrack(3), 1);
        assert_eq!(ring.read(None), "cdef");
    }

    #[test]
    fn test_checked_backtrack() {
        let mut ring = RingBuffer::new(10);
        ring.write("abcdef");
        ring.read(None);

        let err = ring.checked_backtrack(5, 3).unwrap_err();
        assert!(matches!(
            err,
            SteadymarkError::BacktrackOutOfRange {
                requested: 5,
                limit: 3
            }
        ));
        assert!(ring.is_empty());

        assert_eq!(ring.checked_backtrack(3, 3).unwrap(), 3);
        assert_eq!(ring.read(None), "def");
    }

    #[test]
    fn test_clear() {
        let mut ring = RingBuffer::new(4);
        ring.write("abc");
        ring.read(Some(1));
        ring.clear();
        assert!(ring.is_empty());
        assert_eq!(ring.total_processed(), 0);
        assert_eq!(ring.backtrack(1), 0);
    }

    #[test]
    fn test_zero_capacity_raised() {
        let mut ring = RingBuffer::new(0);
        assert_eq!(ring.capacity(), 1);
        ring.write("xy");
        assert_eq!(ring.read(None), "y");
    }
}
