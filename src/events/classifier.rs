//! Line classifiers
//!
//! Each `parse_*` function is pure: it looks at one trimmed console line and
//! either returns a fully populated [`ServerEvent`] or `None`. The
//! [`LineClassifier`] registry runs them in a fixed order and keeps the first
//! match.

use regex::Captures;
use tracing::trace;

use super::patterns;
use super::{EventKind, ServerEvent};

/// Default keyword that turns a chat question into an [`ServerEvent::AiQuestion`]
pub const DEFAULT_TRIGGER_WORD: &str = "God";

/// Marker carried by every line the main server thread logs at info level
const SERVER_THREAD_MARKER: &str = "[Server thread/INFO]";

/// Evaluation order of the registry. Chat comes last since its grammar is the loosest.
const DEFAULT_ORDER: [EventKind; 11] = [
    EventKind::ServerReady,
    EventKind::ServerStopping,
    EventKind::PlayerJoined,
    EventKind::PlayerLeft,
    EventKind::PlayerList,
    EventKind::LegacyListIndicator,
    EventKind::ScoreboardTrigger,
    EventKind::WhitelistAdded,
    EventKind::WhitelistRemoved,
    EventKind::AiQuestion,
    EventKind::ChatMessage,
];

/// Ordered registry of event classifiers
#[derive(Debug, Clone)]
pub struct LineClassifier {
    kinds: Vec<EventKind>,
    trigger_word: String,
}

impl Default for LineClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_TRIGGER_WORD)
    }
}

impl LineClassifier {
    /// Create a registry with every classifier enabled
    pub fn new(trigger_word: impl Into<String>) -> Self {
        Self {
            kinds: DEFAULT_ORDER.to_vec(),
            trigger_word: trigger_word.into(),
        }
    }

    /// Restrict the registry to the given kinds. Evaluation order stays fixed.
    pub fn with_kinds(mut self, kinds: impl IntoIterator<Item = EventKind>) -> Self {
        let wanted: Vec<EventKind> = kinds.into_iter().collect();
        self.kinds = DEFAULT_ORDER
            .iter()
            .copied()
            .filter(|kind| wanted.contains(kind))
            .collect();
        self
    }

    pub fn kinds(&self) -> &[EventKind] {
        &self.kinds
    }

    pub fn trigger_word(&self) -> &str {
        &self.trigger_word
    }

    /// Classify a line, returning the first semantic match
    ///
    /// `RawLine` is never returned here; the stream reader emits it for every
    /// line on its own.
    pub fn classify(&self, line: &str) -> Option<ServerEvent> {
        let line = line.trim();
        self.kinds
            .iter()
            .find_map(|kind| self.classify_as(*kind, line))
    }

    /// Run a single classifier against a trimmed line
    pub fn classify_as(&self, kind: EventKind, line: &str) -> Option<ServerEvent> {
        match kind {
            EventKind::RawLine => None,
            EventKind::ServerReady => parse_server_ready(line),
            EventKind::ServerStopping => parse_server_stopping(line),
            EventKind::PlayerJoined => parse_player_joined(line),
            EventKind::PlayerLeft => parse_player_left(line),
            EventKind::PlayerList => parse_player_list(line),
            EventKind::LegacyListIndicator => parse_legacy_list_indicator(line),
            EventKind::ScoreboardTrigger => parse_scoreboard_trigger(line),
            EventKind::WhitelistAdded => parse_whitelist_added(line),
            EventKind::WhitelistRemoved => parse_whitelist_removed(line),
            EventKind::AiQuestion => parse_ai_question(line, &self.trigger_word),
            EventKind::ChatMessage => parse_chat_message(line),
        }
    }
}

fn capture(caps: &Captures, index: usize) -> Option<String> {
    caps.get(index).map(|m| m.as_str().to_string())
}

/// Optional numeric group: `Some(None)` when absent, `None` when out of range
fn capture_number(caps: &Captures, index: usize) -> Option<Option<i64>> {
    let Some(m) = caps.get(index) else {
        return Some(None);
    };
    match m.as_str().parse() {
        Ok(value) => Some(Some(value)),
        Err(e) => {
            trace!(value = m.as_str(), error = %e, "Rejecting out-of-range trigger value");
            None
        }
    }
}

/// Split a comma-separated name list, trimming names and dropping empties
fn split_names(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(String::from)
        .collect()
}

/// Locate the `<name> message` part of a chat line
fn split_chat(line: &str) -> Option<(&str, &str)> {
    if !line.contains(SERVER_THREAD_MARKER) {
        return None;
    }

    let name_start = line.find(": <")? + 3;
    let name_len = line[name_start..].find('>')?;
    let username = &line[name_start..name_start + name_len];
    let text = line[name_start + name_len + 1..].trim();

    if username.trim().is_empty() || text.is_empty() {
        return None;
    }
    Some((username, text))
}

pub fn parse_chat_message(line: &str) -> Option<ServerEvent> {
    let (username, text) = split_chat(line)?;
    Some(ServerEvent::ChatMessage {
        username: username.to_string(),
        text: text.to_string(),
    })
}

/// Chat message that starts with `trigger_word` (any case) and ends with `?`
pub fn parse_ai_question(line: &str, trigger_word: &str) -> Option<ServerEvent> {
    let (username, text) = split_chat(line)?;
    if !text.ends_with('?') || !text.to_lowercase().starts_with(&trigger_word.to_lowercase()) {
        return None;
    }
    Some(ServerEvent::AiQuestion {
        username: username.to_string(),
        question: text.to_string(),
    })
}

pub fn parse_server_ready(line: &str) -> Option<ServerEvent> {
    let caps = patterns::SERVER_READY.captures(line)?;
    Some(ServerEvent::ServerReady {
        elapsed: capture(&caps, 1)?,
    })
}

pub fn parse_server_stopping(line: &str) -> Option<ServerEvent> {
    patterns::SERVER_STOPPING
        .is_match(line)
        .then_some(ServerEvent::ServerStopping)
}

pub fn parse_player_joined(line: &str) -> Option<ServerEvent> {
    let caps = patterns::PLAYER_JOINED.captures(line)?;
    Some(ServerEvent::PlayerJoined {
        username: capture(&caps, 1)?,
    })
}

pub fn parse_player_left(line: &str) -> Option<ServerEvent> {
    let caps = patterns::PLAYER_LEFT.captures(line)?;
    Some(ServerEvent::PlayerLeft {
        username: capture(&caps, 1)?,
    })
}

/// Modern single-line `list` output
pub fn parse_player_list(line: &str) -> Option<ServerEvent> {
    let caps = patterns::PLAYER_LIST.captures(line)?;
    let names = caps.get(3).map_or("", |m| m.as_str());
    Some(ServerEvent::PlayerList {
        players: split_names(names),
    })
}

/// Header line of the legacy two-line `list` output
pub fn parse_legacy_list_indicator(line: &str) -> Option<ServerEvent> {
    patterns::LEGACY_LIST_INDICATOR
        .is_match(line)
        .then_some(ServerEvent::LegacyListIndicator)
}

/// Second line of the legacy `list` output. Always succeeds.
pub fn parse_legacy_player_names(line: &str) -> ServerEvent {
    let line = line.trim();
    let names = match patterns::LEGACY_LIST_PREFIX.find(line) {
        Some(prefix) => &line[prefix.end()..],
        None => line,
    };
    ServerEvent::PlayerList {
        players: split_names(names),
    }
}

pub fn parse_scoreboard_trigger(line: &str) -> Option<ServerEvent> {
    let caps = patterns::SCOREBOARD_TRIGGER.captures(line)?;
    Some(ServerEvent::ScoreboardTrigger {
        username: capture(&caps, 1)?,
        objective: capture(&caps, 2)?,
        delta: capture_number(&caps, 3)?,
        absolute: capture_number(&caps, 4)?,
    })
}

pub fn parse_whitelist_added(line: &str) -> Option<ServerEvent> {
    let caps = patterns::WHITELIST_ADDED.captures(line)?;
    Some(ServerEvent::WhitelistAdded {
        username: capture(&caps, 1),
    })
}

pub fn parse_whitelist_removed(line: &str) -> Option<ServerEvent> {
    let caps = patterns::WHITELIST_REMOVED.captures(line)?;
    Some(ServerEvent::WhitelistRemoved {
        username: capture(&caps, 1),
    })
}
