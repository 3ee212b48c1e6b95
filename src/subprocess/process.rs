//! Server process lifecycle
//!
//! [`ServerProcess`] spawns the server, runs one [`StreamReader`] per output
//! stream, and accepts console commands on stdin while the server runs.

use std::process::ExitStatus;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use tokio::io::AsyncWriteExt;
use tokio::process::ChildStdin;
use tracing::{debug, info, warn};

use super::builder::ServerCommand;
use super::dispatch::{Dispatcher, EventHandler};
use super::error::ProcessError;
use super::streaming::{LineBuffer, StreamReader, StreamSource};
use crate::events::LineClassifier;

/// Lifecycle of the supervised process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    Unstarted,
    Running { pid: Option<u32> },
    Exited { code: Option<i32> },
}

/// Supervisor for one server process
pub struct ServerProcess {
    command: ServerCommand,
    classifier: Arc<LineClassifier>,
    buffer: LineBuffer,
    dispatcher: Dispatcher,
    started: AtomicBool,
    state: Mutex<ProcessState>,
    stdin: tokio::sync::Mutex<Option<ChildStdin>>,
}

impl ServerProcess {
    pub fn new(
        command: ServerCommand,
        classifier: LineClassifier,
        handler: Arc<dyn EventHandler>,
    ) -> Self {
        Self {
            command,
            classifier: Arc::new(classifier),
            buffer: LineBuffer::new(),
            dispatcher: Dispatcher::new(handler),
            started: AtomicBool::new(false),
            state: Mutex::new(ProcessState::Unstarted),
            stdin: tokio::sync::Mutex::new(None),
        }
    }

    pub fn command(&self) -> &ServerCommand {
        &self.command
    }

    pub fn state(&self) -> ProcessState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state(), ProcessState::Running { .. })
    }

    /// Handle to the console line buffer
    pub fn buffer(&self) -> LineBuffer {
        self.buffer.clone()
    }

    /// Take buffered console output, at most `limit` characters
    pub async fn take_chunk(&self, limit: usize) -> Option<String> {
        self.buffer.take_chunk(limit).await
    }

    /// Take all buffered console output
    pub async fn take_all(&self) -> Option<String> {
        self.buffer.take_all().await
    }

    /// Run the server until it exits
    ///
    /// Spawns the process, reads stdout and stderr concurrently until both
    /// close, then waits for the exit status. Handler tasks may still be
    /// running when this returns.
    pub async fn poll(&self) -> Result<ExitStatus, ProcessError> {
        if self.started.swap(true, Ordering::AcqRel) {
            return Err(ProcessError::AlreadyStarted);
        }

        let start = Instant::now();
        let mut child = match self.command.to_piped_command().spawn() {
            Ok(child) => child,
            Err(source) => {
                self.started.store(false, Ordering::Release);
                return Err(ProcessError::Spawn {
                    command: self.command.display(),
                    source,
                });
            }
        };
        let pid = child.id();

        let stdout = child.stdout.take().ok_or(ProcessError::MissingPipe("stdout"));
        let stderr = child.stderr.take().ok_or(ProcessError::MissingPipe("stderr"));
        let (stdout, stderr) = match (stdout, stderr) {
            (Ok(stdout), Ok(stderr)) => (stdout, stderr),
            (Err(e), _) | (_, Err(e)) => {
                let _ = child.kill().await;
                self.set_state(ProcessState::Exited { code: None });
                return Err(e);
            }
        };

        // writers take the stdin lock first, so they never see Running without a pipe
        {
            let mut stdin = self.stdin.lock().await;
            *stdin = child.stdin.take();
            self.set_state(ProcessState::Running { pid });
        }

        info!(
            command = %self.command.display(),
            pid = ?pid,
            "Server process started"
        );

        let stdout_reader = self.reader(StreamSource::Stdout);
        let stderr_reader = self.reader(StreamSource::Stderr);
        let (stdout_lines, stderr_lines) =
            tokio::join!(stdout_reader.run(stdout), stderr_reader.run(stderr));
        debug!(stdout_lines, stderr_lines, "Server output streams closed");

        let waited = child.wait().await;
        {
            let mut stdin = self.stdin.lock().await;
            stdin.take();
            self.set_state(ProcessState::Exited {
                code: waited.as_ref().ok().and_then(ExitStatus::code),
            });
        }

        let status = waited.map_err(ProcessError::Wait)?;
        if status.success() {
            info!(elapsed = ?start.elapsed(), "Server process exited");
        } else {
            warn!(code = ?status.code(), elapsed = ?start.elapsed(), "Server process exited with failure");
        }
        Ok(status)
    }

    /// Send one console command to the server
    ///
    /// Succeeds exactly while the state is `Running`. Trailing newlines are
    /// normalised to exactly one.
    pub async fn write(&self, command: &str) -> Result<(), ProcessError> {
        let line = format!("{}\n", command.trim_end_matches(['\r', '\n']));

        let mut stdin = self.stdin.lock().await;
        let pipe = stdin.as_mut().ok_or(ProcessError::NotRunning)?;
        pipe.write_all(line.as_bytes())
            .await
            .map_err(ProcessError::Write)?;
        pipe.flush().await.map_err(ProcessError::Write)?;

        debug!(command = %line.trim_end(), "Wrote server command");
        Ok(())
    }

    /// Number of event handler tasks still running
    pub fn handlers_in_flight(&self) -> usize {
        self.dispatcher.in_flight()
    }

    /// Wait for every dispatched event to be handled
    pub async fn wait_for_handlers(&self) {
        self.dispatcher.wait_idle().await;
    }

    /// Cancel event handlers that are still running
    pub async fn shutdown(&self) {
        self.dispatcher.shutdown().await;
    }

    fn reader(&self, source: StreamSource) -> StreamReader {
        StreamReader::new(
            source,
            self.buffer.clone(),
            Arc::clone(&self.classifier),
            self.dispatcher.clone(),
        )
    }

    fn set_state(&self, new_state: ProcessState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = new_state;
    }
}
