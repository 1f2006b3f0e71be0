//! Chat client trait abstractions.
//!
//! The wire-level chat protocol (connection, authentication, channel
//! membership, delivery) lives behind [`ChatClient`]. The engine only sees
//! typed events and issues typed replies, which is what makes the whole
//! lifecycle testable against [`super::mock::MockChatClient`].

use async_trait::async_trait;

/// Result type for chat operations.
pub type ChatResult<T> = Result<T, ChatError>;

/// Chat client errors.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("network error: {0}")]
    Network(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    /// The event source has ended; the engine should flush and stop.
    #[error("connection closed")]
    Closed,
}

/// One inbound event from the chat or directory collaborators.
///
/// Flag events originate from the directory service; a wire adapter is
/// expected to translate whatever the service emits into these structured
/// deltas before they reach the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    /// A message from an identified member. Channel messages count toward
    /// activity stats; commands are accepted from channel and private
    /// messages alike.
    Message {
        sender: String,
        in_channel: bool,
        text: String,
    },
    /// Flags added to and removed from one member's directory entry.
    FlagChange {
        member: String,
        added: String,
        removed: String,
    },
    /// Full flag listing for one member, from the initial directory sync.
    FlagSnapshot { member: String, flags: String },
}

/// Chat protocol abstraction.
#[async_trait]
pub trait ChatClient: Clone + Send + Sync + 'static {
    /// Channel-wide announcement.
    async fn announce(&self, text: &str) -> ChatResult<()>;

    /// Private notice to one member.
    async fn notice(&self, member: &str, text: &str) -> ChatResult<()>;

    /// Change the channel topic.
    async fn set_topic(&self, text: &str) -> ChatResult<()>;

    /// Next batch of inbound events. Pends until something arrives;
    /// returns [`ChatError::Closed`] when the source is gone.
    async fn next_events(&self) -> ChatResult<Vec<ChatEvent>>;
}
