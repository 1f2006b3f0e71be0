//! Directory-service collaborator boundary.
//!
//! The access-control-list directory is the authority on who holds which
//! privilege flag. The engine only issues grant/revoke requests through
//! [`DirectoryClient`] and consumes the structured flag-change notifications
//! that arrive on the inbound event stream. There is deliberately no
//! synchronous confirmation: the membership cache updates when the
//! notification comes back, not when the request is sent.

pub mod mock;

pub use mock::MockDirectory;

use async_trait::async_trait;

/// Result type for directory operations.
pub type DirectoryResult<T> = Result<T, DirectoryError>;

/// Directory client errors.
#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("unknown member: {0}")]
    UnknownMember(String),
}

/// Outbound requests to the ACL directory.
#[async_trait]
pub trait DirectoryClient: Clone + Send + Sync + 'static {
    /// Ask the directory to add `flags` to the member's entry.
    async fn grant(&self, member: &str, flags: &str) -> DirectoryResult<()>;

    /// Ask the directory to remove `flags` from the member's entry.
    async fn revoke(&self, member: &str, flags: &str) -> DirectoryResult<()>;
}

/// Directory client that only logs its requests. Used by the console runner,
/// where there is no real directory service to talk to.
#[derive(Debug, Clone, Default)]
pub struct LoggingDirectory;

#[async_trait]
impl DirectoryClient for LoggingDirectory {
    async fn grant(&self, member: &str, flags: &str) -> DirectoryResult<()> {
        tracing::info!(member, flags, "directory grant requested");
        Ok(())
    }

    async fn revoke(&self, member: &str, flags: &str) -> DirectoryResult<()> {
        tracing::info!(member, flags, "directory revoke requested");
        Ok(())
    }
}
