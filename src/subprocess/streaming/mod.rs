//! Console stream infrastructure
//!
//! Each of the server's output streams gets its own [`StreamReader`]. Readers
//! share one [`LineBuffer`] and one dispatcher, and keep the legacy
//! player-list state to themselves.

pub mod buffer;
pub mod reader;
pub mod types;

pub use buffer::LineBuffer;
pub use reader::StreamReader;
pub use types::{ListState, StreamSource};
