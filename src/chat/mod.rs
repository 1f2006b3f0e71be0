//! Chat-protocol collaborator boundary.
//!
//! Traits and typed events for the wire client, the `vote` command parser,
//! the announcement/notice text rendering, a recording mock for tests, and
//! a console adapter for local operation.

pub mod command;
pub mod console;
pub mod format;
pub mod mock;
pub mod traits;

pub use command::VoteCommand;
pub use console::ConsoleChat;
pub use mock::MockChatClient;
pub use traits::{ChatClient, ChatError, ChatEvent, ChatResult};
