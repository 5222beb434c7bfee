use std::collections::VecDeque;

/// Maximum number of lines kept for the live log panel.
pub const LOG_BUFFER_LIMIT: usize = 500;

/// Identifies one scheduled flush; a token invalidated by [`LogBuffer::clear`]
/// never flushes.
pub type FlushToken = u64;

/// Bounded, ordered log lines with at-most-one pending flush to the view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogBuffer {
    lines: VecDeque<String>,
    capacity: usize,
    pending_flush: Option<FlushToken>,
    last_token: FlushToken,
    appended: u64,
}

impl Default for LogBuffer {
    fn default() -> Self {
        Self::with_capacity(LOG_BUFFER_LIMIT)
    }
}

impl LogBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            lines: VecDeque::with_capacity(capacity.min(LOG_BUFFER_LIMIT)),
            capacity: capacity.max(1),
            pending_flush: None,
            last_token: 0,
            appended: 0,
        }
    }

    /// Appends `line`, evicting the oldest lines beyond capacity.
    ///
    /// Returns a token only when this append scheduled a new flush.
    pub fn append(&mut self, line: impl Into<String>) -> Option<FlushToken> {
        self.lines.push_back(line.into());
        self.appended += 1;
        while self.lines.len() > self.capacity {
            self.lines.pop_front();
        }
        if self.pending_flush.is_some() {
            return None;
        }
        self.last_token += 1;
        self.pending_flush = Some(self.last_token);
        self.pending_flush
    }

    /// Consumes the pending flush if `token` is still current.
    pub fn take_flush(&mut self, token: FlushToken) -> bool {
        if self.pending_flush == Some(token) {
            self.pending_flush = None;
            true
        } else {
            false
        }
    }

    /// Empties the buffer and cancels any pending flush.
    pub fn clear(&mut self) {
        self.lines.clear();
        self.pending_flush = None;
        self.appended = 0;
    }

    /// Lines appended since the last clear, including evicted ones.
    pub fn appended(&self) -> u64 {
        self.appended
    }

    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(String::as_str)
    }

    pub fn snapshot(&self) -> Vec<String> {
        self.lines.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn has_pending_flush(&self) -> bool {
        self.pending_flush.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_most_recent_lines_in_order() {
        let mut buffer = LogBuffer::new();
        for i in 0..1234 {
            buffer.append(format!("line {i}"));
            assert!(buffer.len() <= LOG_BUFFER_LIMIT);
        }
        let lines = buffer.snapshot();
        assert_eq!(lines.len(), LOG_BUFFER_LIMIT);
        assert_eq!(lines.first().map(String::as_str), Some("line 734"));
        assert_eq!(lines.last().map(String::as_str), Some("line 1233"));
    }

    #[test]
    fn short_sequences_are_kept_whole() {
        let mut buffer = LogBuffer::with_capacity(3);
        buffer.append("a");
        buffer.append("b");
        assert_eq!(buffer.lines().collect::<Vec<_>>(), vec!["a", "b"]);
        buffer.append("c");
        buffer.append("d");
        assert_eq!(buffer.lines().collect::<Vec<_>>(), vec!["b", "c", "d"]);
    }

    #[test]
    fn appended_count_survives_eviction() {
        let mut buffer = LogBuffer::with_capacity(2);
        for _ in 0..5 {
            buffer.append("same");
        }
        assert_eq!(buffer.len(), 2);
        assert_eq!(buffer.appended(), 5);
        buffer.clear();
        assert_eq!(buffer.appended(), 0);
    }

    #[test]
    fn appends_coalesce_into_one_flush() {
        let mut buffer = LogBuffer::new();
        let token = buffer.append("a").expect("first append schedules");
        assert_eq!(buffer.append("b"), None);
        assert_eq!(buffer.append("c"), None);
        assert!(buffer.take_flush(token));
        assert!(!buffer.take_flush(token));
        let next = buffer.append("d").expect("reschedules after flush");
        assert_ne!(next, token);
    }

    #[test]
    fn clear_cancels_pending_flush() {
        let mut buffer = LogBuffer::new();
        let stale = buffer.append("old task").unwrap();
        buffer.clear();
        assert!(buffer.is_empty());
        assert!(!buffer.has_pending_flush());
        let fresh = buffer.append("new task").unwrap();
        assert!(!buffer.take_flush(stale));
        assert!(buffer.take_flush(fresh));
    }
}
