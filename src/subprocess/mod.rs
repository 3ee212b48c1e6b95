//! Server process supervision
//!
//! - `builder` - launch command description
//! - `dispatch` - handler trait and task supervision
//! - `process` - spawn, stdin writes and exit
//! - `streaming` - per-stream readers and the shared line buffer

pub mod builder;
pub mod dispatch;
pub mod error;
pub mod process;
pub mod streaming;


pub use builder::{ServerCommand, ServerCommandBuilder};
pub use dispatch::{Dispatcher, EventHandler};
pub use error::ProcessError;
pub use process::{ProcessState, ServerProcess};
pub use streaming::{LineBuffer, ListState, StreamReader, StreamSource};
