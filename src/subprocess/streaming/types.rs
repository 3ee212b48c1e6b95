//! Core types for the console streams

use std::fmt;

/// Stream source identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamSource {
    Stdout,
    Stderr,
}

impl fmt::Display for StreamSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamSource::Stdout => f.write_str("stdout"),
            StreamSource::Stderr => f.write_str("stderr"),
        }
    }
}

/// Per-stream state of the legacy two-line `list` grammar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListState {
    #[default]
    Idle,
    /// The previous line announced a legacy player list; the next line holds the names.
    AwaitingLegacyList,
}
