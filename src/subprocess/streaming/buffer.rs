//! Shared buffer of raw console lines awaiting delivery

use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Mutex;

/// FIFO of raw console lines
///
/// Stream readers append; an external consumer drains either in
/// size-limited chunks or all at once. Clones share the same storage.
#[derive(Debug, Clone, Default)]
pub struct LineBuffer {
    lines: Arc<Mutex<VecDeque<String>>>,
}

impl LineBuffer {
    /// Create an empty line buffer
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn append(&self, line: impl Into<String>) {
        self.lines.lock().await.push_back(line.into());
    }

    /// Remove the oldest lines that fit in `limit` characters, newline-joined
    ///
    /// A line longer than `limit` on its own is dropped without being
    /// returned. Returns `None` when no line could be taken.
    pub async fn take_chunk(&self, limit: usize) -> Option<String> {
        let mut lines = self.lines.lock().await;
        let mut chunk = String::new();
        let mut chunk_len = 0;
        let mut taken = 0;

        while let Some(front) = lines.front() {
            let line_len = front.chars().count();
            if line_len > limit {
                tracing::trace!(line_len, limit, "Dropping oversized console line");
                lines.pop_front();
                continue;
            }

            let separator = usize::from(taken > 0);
            if chunk_len + separator + line_len > limit {
                break;
            }

            let Some(line) = lines.pop_front() else { break };
            if taken > 0 {
                chunk.push('\n');
            }
            chunk.push_str(&line);
            chunk_len += separator + line_len;
            taken += 1;
        }

        (taken > 0).then_some(chunk)
    }

    /// Remove every buffered line, newline-joined
    pub async fn take_all(&self) -> Option<String> {
        let mut lines = self.lines.lock().await;
        if lines.is_empty() {
            return None;
        }
        let drained: Vec<String> = lines.drain(..).collect();
        Some(drained.join("\n"))
    }

    /// Get current buffer size in lines
    pub async fn len(&self) -> usize {
        self.lines.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.lines.lock().await.is_empty()
    }
}
