//! Per-stream console reader

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tracing::{debug, trace, warn};

use super::buffer::LineBuffer;
use super::types::{ListState, StreamSource};
use crate::events::{parse_legacy_player_names, LineClassifier, ServerEvent};
use crate::subprocess::dispatch::Dispatcher;

/// Reads one console stream line by line, buffering and classifying each line
pub struct StreamReader {
    source: StreamSource,
    buffer: LineBuffer,
    classifier: Arc<LineClassifier>,
    dispatcher: Dispatcher,
    list_state: ListState,
}

impl StreamReader {
    pub fn new(
        source: StreamSource,
        buffer: LineBuffer,
        classifier: Arc<LineClassifier>,
        dispatcher: Dispatcher,
    ) -> Self {
        Self {
            source,
            buffer,
            classifier,
            dispatcher,
            list_state: ListState::Idle,
        }
    }

    pub fn list_state(&self) -> ListState {
        self.list_state
    }

    /// Read until end of stream, returning the number of lines consumed
    ///
    /// A read error ends the stream the same way EOF does.
    pub async fn run(mut self, stream: impl AsyncRead + Unpin) -> usize {
        let mut reader = BufReader::new(stream);
        let mut raw = Vec::new();
        let mut count = 0;

        loop {
            raw.clear();
            match reader.read_until(b'\n', &mut raw).await {
                Ok(0) => {
                    debug!(source = %self.source, lines = count, "Console stream closed");
                    break;
                }
                Ok(_) => {
                    let line = normalize_line(&raw);
                    self.process_line(line).await;
                    count += 1;
                }
                Err(e) => {
                    warn!(source = %self.source, error = %e, "Console stream read failed");
                    break;
                }
            }
        }

        count
    }

    /// Buffer, classify and dispatch a single line
    pub async fn process_line(&mut self, line: String) {
        trace!(source = %self.source, line = %line, "Console line");
        self.buffer.append(line.clone()).await;

        let event = match self.list_state {
            ListState::AwaitingLegacyList => {
                self.list_state = ListState::Idle;
                Some(parse_legacy_player_names(&line))
            }
            ListState::Idle => self.classifier.classify(&line),
        };

        self.dispatcher.dispatch(ServerEvent::RawLine { text: line });

        match event {
            Some(ServerEvent::LegacyListIndicator) => {
                self.list_state = ListState::AwaitingLegacyList;
            }
            Some(event) => {
                debug!(source = %self.source, kind = %event.kind(), "Classified console line");
                self.dispatcher.dispatch(event);
            }
            None => {}
        }
    }
}

/// Decode a raw line lossily and strip the line terminator
fn normalize_line(raw: &[u8]) -> String {
    let mut line = String::from_utf8_lossy(raw).into_owned();
    if line.ends_with('\n') {
        line.pop();
        if line.ends_with('\r') {
            line.pop();
        }
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subprocess::dispatch::EventHandler;
    use anyhow::Result;
    use async_trait::async_trait;
    use tokio::sync::mpsc;

    struct Recorder {
        tx: mpsc::UnboundedSender<ServerEvent>,
    }

    #[async_trait]
    impl EventHandler for Recorder {
        async fn handle(&self, event: ServerEvent) -> Result<()> {
            self.tx.send(event)?;
            Ok(())
        }
    }

    fn reader() -> (
        StreamReader,
        LineBuffer,
        Dispatcher,
        mpsc::UnboundedReceiver<ServerEvent>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        let buffer = LineBuffer::new();
        let dispatcher = Dispatcher::new(Arc::new(Recorder { tx }));
        let reader = StreamReader::new(
            StreamSource::Stdout,
            buffer.clone(),
            Arc::new(LineClassifier::default()),
            dispatcher.clone(),
        );
        (reader, buffer, dispatcher, rx)
    }

    async fn semantic_events(
        dispatcher: &Dispatcher,
        rx: &mut mpsc::UnboundedReceiver<ServerEvent>,
    ) -> Vec<ServerEvent> {
        dispatcher.wait_idle().await;
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if !matches!(event, ServerEvent::RawLine { .. }) {
                events.push(event);
            }
        }
        events
    }

    #[test]
    fn test_normalize_line() {
        assert_eq!(normalize_line(b"hello\n"), "hello");
        assert_eq!(normalize_line(b"hello\r\n"), "hello");
        assert_eq!(normalize_line(b"no newline"), "no newline");
        assert_eq!(normalize_line(b"bad \xFF\n"), "bad \u{FFFD}");
    }

    #[tokio::test]
    async fn test_legacy_list_spans_two_lines() {
        let (reader, _buffer, dispatcher, mut rx) = reader();
        let input: &[u8] = b"[12:00:00] [Server thread/INFO]: There are 1/20 players online:\ngoose, duck\n";

        let count = reader.run(input).await;
        assert_eq!(count, 2);

        let events = semantic_events(&dispatcher, &mut rx).await;
        assert_eq!(
            events,
            vec![ServerEvent::PlayerList {
                players: vec!["goose".to_string(), "duck".to_string()]
            }]
        );
    }

    #[tokio::test]
    async fn test_legacy_state_resets_after_one_line() {
        let (mut reader, _buffer, dispatcher, mut rx) = reader();

        reader
            .process_line("[12:00:00] [Server thread/INFO]: There are 0/20 players online:".into())
            .await;
        assert_eq!(reader.list_state(), ListState::AwaitingLegacyList);

        // names line that would otherwise look like a join message
        reader
            .process_line("[12:00:00] [Server thread/INFO]: Steve joined the game".into())
            .await;
        assert_eq!(reader.list_state(), ListState::Idle);

        reader
            .process_line("[12:00:01] [Server thread/INFO]: Alex joined the game".into())
            .await;

        // handlers run concurrently, so completion order is not asserted
        let events = semantic_events(&dispatcher, &mut rx).await;
        assert_eq!(events.len(), 2);
        assert!(events.contains(&ServerEvent::PlayerList {
            players: vec!["Steve joined the game".to_string()]
        }));
        assert!(events.contains(&ServerEvent::PlayerJoined {
            username: "Alex".to_string()
        }));
    }

    #[tokio::test]
    async fn test_every_line_is_buffered_and_raw_dispatched() {
        let (reader, buffer, dispatcher, mut rx) = reader();
        let input: &[u8] = b"first\r\n\nthird";

        assert_eq!(reader.run(input).await, 3);
        assert_eq!(buffer.take_all().await.as_deref(), Some("first\n\nthird"));

        dispatcher.wait_idle().await;
        let mut raw_lines = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let ServerEvent::RawLine { text } = event {
                raw_lines.push(text);
            }
        }
        raw_lines.sort();
        assert_eq!(raw_lines, vec!["", "first", "third"]);
    }

    #[tokio::test]
    async fn test_indicator_is_never_surfaced() {
        let (reader, _buffer, dispatcher, mut rx) = reader();
        let input: &[u8] = b"[12:00:00] [Server thread/INFO]: There are 0/20 players online:\n";

        reader.run(input).await;

        dispatcher.wait_idle().await;
        while let Ok(event) = rx.try_recv() {
            assert!(matches!(event, ServerEvent::RawLine { .. }));
        }
    }
}
