//! Periodic delivery of buffered console output

use std::time::Duration;

use tokio::sync::oneshot;
use tracing::{debug, trace};

use crate::subprocess::LineBuffer;

/// What happens to buffered console text on each flush
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayMode {
    /// Print chunks of at most `chunk_limit` characters to stdout
    Print,
    /// Drop the text; events are reported some other way
    Discard,
}

/// Drains the console [`LineBuffer`] so it never grows without bound
pub struct ConsoleRelay {
    buffer: LineBuffer,
    chunk_limit: usize,
    mode: RelayMode,
}

impl ConsoleRelay {
    pub fn new(buffer: LineBuffer, chunk_limit: usize, mode: RelayMode) -> Self {
        Self {
            buffer,
            chunk_limit,
            mode,
        }
    }

    /// Empty the buffer once, returning the number of chunks printed
    pub async fn flush(&self) -> usize {
        match self.mode {
            RelayMode::Print => {
                let mut printed = 0;
                while let Some(chunk) = self.buffer.take_chunk(self.chunk_limit).await {
                    println!("{chunk}");
                    printed += 1;
                }
                printed
            }
            RelayMode::Discard => {
                if let Some(text) = self.buffer.take_all().await {
                    trace!(lines = text.lines().count(), "Discarded console output");
                }
                0
            }
        }
    }

    /// Flush every `period` until `stop` fires, then flush what is left
    ///
    /// A flush in progress always completes before the stop is honoured.
    pub async fn run(self, period: Duration, mut stop: oneshot::Receiver<()>) {
        let mut ticker = tokio::time::interval(period);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.flush().await;
                }
                _ = &mut stop => break,
            }
        }

        let printed = self.flush().await;
        debug!(mode = ?self.mode, printed, "Console relay stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn filled_buffer() -> LineBuffer {
        let buffer = LineBuffer::new();
        for line in ["alpha", "bravo", "charlie"] {
            buffer.append(line).await;
        }
        buffer
    }

    #[tokio::test]
    async fn test_discard_mode_empties_buffer() {
        let buffer = filled_buffer().await;
        let relay = ConsoleRelay::new(buffer.clone(), 2000, RelayMode::Discard);

        assert_eq!(relay.flush().await, 0);
        assert!(buffer.is_empty().await);
    }

    #[tokio::test]
    async fn test_print_mode_respects_chunk_limit() {
        let buffer = filled_buffer().await;
        let relay = ConsoleRelay::new(buffer.clone(), 11, RelayMode::Print);

        // "alpha\nbravo" fits in 11 characters, "charlie" goes alone
        assert_eq!(relay.flush().await, 2);
        assert!(buffer.is_empty().await);
        assert_eq!(relay.flush().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_drains_periodically_and_on_stop() {
        let buffer = filled_buffer().await;
        let relay = ConsoleRelay::new(buffer.clone(), 2000, RelayMode::Discard);
        let (stop_tx, stop_rx) = oneshot::channel();
        let task = tokio::spawn(relay.run(Duration::from_secs(1), stop_rx));

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(buffer.is_empty().await);

        buffer.append("late line").await;
        stop_tx.send(()).unwrap();
        task.await.unwrap();
        assert!(buffer.is_empty().await);
    }
}
