//! # mcsync
//!
//! Supervises a Minecraft server process, turns its console output into typed
//! events and accepts console commands while it runs.
//!
//! ## Usage
//!
//! ```bash
//! mcsync --config mcsync.toml
//! mcsync -- java -Xmx4G -jar server.jar nogui
//! ```
//!
//! ## Modules
//!
//! - `events` - Typed server events and the ordered line classifier registry
//! - `subprocess` - Process lifecycle, stream readers, line buffer and handler dispatch
//! - `config` - Settings file for the command-line front end
//! - `handler` - Event handler that logs events and tracks player activity
//! - `monitor` - Idle-shutdown heartbeat driven by `list` polling
//! - `relay` - Periodic draining of buffered console output
pub mod config;
pub mod events;
pub mod handler;
pub mod monitor;
pub mod relay;
pub mod subprocess;

pub use events::{EventKind, LineClassifier, ServerEvent};
pub use subprocess::{EventHandler, ProcessError, ServerCommand, ServerProcess};
