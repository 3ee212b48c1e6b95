//! Compiled console grammars
//!
//! A preamble is everything before the first `": "` of the payload. It may not
//! contain angle brackets, which keeps chat lines (`<name> ...`) from being
//! mistaken for server messages.

use once_cell::sync::Lazy;
use regex::Regex;

/// Player name: 2-16 word characters
const USERNAME: &str = r"[A-Za-z0-9_]{2,16}";

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("Valid regex pattern")
}

pub(super) static SERVER_READY: Lazy<Regex> =
    Lazy::new(|| compile(r#"^[^<>]*: Done \(([^)]+)\)! For help, type "help""#));

pub(super) static SERVER_STOPPING: Lazy<Regex> =
    Lazy::new(|| compile(r"^[^<>]*: (?:All dimensions are saved|Stopping server)"));

// Join/leave lines additionally exclude `*` so `/me` emotes cannot forge them.
pub(super) static PLAYER_JOINED: Lazy<Regex> =
    Lazy::new(|| compile(&format!(r"^[^<>*]*: ({USERNAME}) joined the game")));

pub(super) static PLAYER_LEFT: Lazy<Regex> =
    Lazy::new(|| compile(&format!(r"^[^<>*]*: ({USERNAME}) left the game")));

pub(super) static PLAYER_LIST: Lazy<Regex> = Lazy::new(|| {
    compile(r"^[^<>]*: There are (\d+) of a max of (\d+) players online:(.*)$")
});

pub(super) static LEGACY_LIST_INDICATOR: Lazy<Regex> =
    Lazy::new(|| compile(r"^[^<>]*: There are (\d+)/(\d+) players online:"));

/// Bracketed log prefix on the continuation line of a legacy list
pub(super) static LEGACY_LIST_PREFIX: Lazy<Regex> =
    Lazy::new(|| compile(r"^(?:\[[^\]]*\]\s*)+:\s?"));

pub(super) static SCOREBOARD_TRIGGER: Lazy<Regex> = Lazy::new(|| {
    compile(&format!(
        r"^[^<>]*: \[({USERNAME}): Triggered \[([A-Za-z0-9_]+)\](?: \((?:added (-?\d+) to value|set value to (-?\d+))\))?\]"
    ))
});

pub(super) static WHITELIST_ADDED: Lazy<Regex> = Lazy::new(|| {
    compile(&format!(
        r"^[^<>]*: (?:Added ({USERNAME}) to the whitelist|Player is already whitelisted)"
    ))
});

pub(super) static WHITELIST_REMOVED: Lazy<Regex> = Lazy::new(|| {
    compile(&format!(
        r"^[^<>]*: (?:Removed ({USERNAME}) from the whitelist|Player is not whitelisted)"
    ))
});
