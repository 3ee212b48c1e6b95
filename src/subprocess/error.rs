use std::io;

#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("No server process running")]
    NotRunning,

    #[error("Server process was already started")]
    AlreadyStarted,

    #[error("Failed to spawn '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("Failed to capture {0} of the server process")]
    MissingPipe(&'static str),

    #[error("Failed to write to server stdin: {0}")]
    Write(#[source] io::Error),

    #[error("Failed to wait for server process: {0}")]
    Wait(#[source] io::Error),

    #[error("Invalid launch command: {0}")]
    InvalidCommand(String),
}
