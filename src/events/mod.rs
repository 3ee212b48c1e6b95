//! Typed server events and the line classifiers that produce them
//!
//! Every console line becomes a [`ServerEvent::RawLine`]. On top of that, a
//! line may match at most one semantic event, chosen by the ordered
//! [`LineClassifier`] registry.

pub mod classifier;
mod patterns;


pub use classifier::{
    parse_ai_question, parse_chat_message, parse_legacy_player_names, parse_player_joined,
    parse_player_left, parse_player_list, parse_legacy_list_indicator, parse_scoreboard_trigger,
    parse_server_ready, parse_server_stopping, parse_whitelist_added, parse_whitelist_removed,
    LineClassifier, DEFAULT_TRIGGER_WORD,
};

use serde::Serialize;

/// Event extracted from the server console
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Any line read from stdout or stderr.
    RawLine { text: String },
    /// Server finished starting; `elapsed` is the duration token as printed.
    ServerReady { elapsed: String },
    /// In-game chat.
    ChatMessage { username: String, text: String },
    PlayerJoined { username: String },
    PlayerLeft { username: String },
    /// Shutdown sequence detected.
    ServerStopping,
    /// Result of a `list` command, from either the modern or legacy grammar.
    PlayerList { players: Vec<String> },
    /// Announces that the next line holds the player names. Never reaches a handler.
    LegacyListIndicator,
    /// Scoreboard objective activated through `/trigger`.
    ScoreboardTrigger {
        username: String,
        objective: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        delta: Option<i64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        absolute: Option<i64>,
    },
    /// `None` means the player was already whitelisted.
    WhitelistAdded { username: Option<String> },
    /// `None` means the player was not whitelisted.
    WhitelistRemoved { username: Option<String> },
    /// Chat message addressed to the trigger word and ending in `?`.
    AiQuestion { username: String, question: String },
}

/// Tag identifying a [`ServerEvent`] variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    RawLine,
    ServerReady,
    ChatMessage,
    PlayerJoined,
    PlayerLeft,
    ServerStopping,
    PlayerList,
    LegacyListIndicator,
    ScoreboardTrigger,
    WhitelistAdded,
    WhitelistRemoved,
    AiQuestion,
}

impl ServerEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            ServerEvent::RawLine { .. } => EventKind::RawLine,
            ServerEvent::ServerReady { .. } => EventKind::ServerReady,
            ServerEvent::ChatMessage { .. } => EventKind::ChatMessage,
            ServerEvent::PlayerJoined { .. } => EventKind::PlayerJoined,
            ServerEvent::PlayerLeft { .. } => EventKind::PlayerLeft,
            ServerEvent::ServerStopping => EventKind::ServerStopping,
            ServerEvent::PlayerList { .. } => EventKind::PlayerList,
            ServerEvent::LegacyListIndicator => EventKind::LegacyListIndicator,
            ServerEvent::ScoreboardTrigger { .. } => EventKind::ScoreboardTrigger,
            ServerEvent::WhitelistAdded { .. } => EventKind::WhitelistAdded,
            ServerEvent::WhitelistRemoved { .. } => EventKind::WhitelistRemoved,
            ServerEvent::AiQuestion { .. } => EventKind::AiQuestion,
        }
    }

    /// Effective value of a scoreboard trigger: the delta if present, else the absolute value
    pub fn trigger_value(&self) -> Option<i64> {
        match self {
            ServerEvent::ScoreboardTrigger {
                delta, absolute, ..
            } => delta.or(*absolute),
            _ => None,
        }
    }

    /// Whether the event stays inside the stream reader
    pub fn is_internal(&self) -> bool {
        matches!(self, ServerEvent::LegacyListIndicator)
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            EventKind::RawLine => "raw_line",
            EventKind::ServerReady => "server_ready",
            EventKind::ChatMessage => "chat_message",
            EventKind::PlayerJoined => "player_joined",
            EventKind::PlayerLeft => "player_left",
            EventKind::ServerStopping => "server_stopping",
            EventKind::PlayerList => "player_list",
            EventKind::LegacyListIndicator => "legacy_list_indicator",
            EventKind::ScoreboardTrigger => "scoreboard_trigger",
            EventKind::WhitelistAdded => "whitelist_added",
            EventKind::WhitelistRemoved => "whitelist_removed",
            EventKind::AiQuestion => "ai_question",
        };
        f.write_str(name)
    }
}
