//! Recording directory client for tests.

use super::{DirectoryClient, DirectoryResult};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

/// One recorded grant or revoke request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlagRequest {
    pub member: String,
    pub flags: String,
    pub grant: bool,
}

/// In-memory [`DirectoryClient`] that records every request.
#[derive(Clone, Default)]
pub struct MockDirectory {
    requests: Arc<Mutex<Vec<FlagRequest>>>,
}

impl MockDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn requests(&self) -> Vec<FlagRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn grants_for(&self, member: &str) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.grant && r.member == member)
            .map(|r| r.flags.clone())
            .collect()
    }

    pub fn revokes_for(&self, member: &str) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| !r.grant && r.member == member)
            .map(|r| r.flags.clone())
            .collect()
    }
}

#[async_trait]
impl DirectoryClient for MockDirectory {
    async fn grant(&self, member: &str, flags: &str) -> DirectoryResult<()> {
        self.requests.lock().unwrap().push(FlagRequest {
            member: member.to_string(),
            flags: flags.to_string(),
            grant: true,
        });
        Ok(())
    }

    async fn revoke(&self, member: &str, flags: &str) -> DirectoryResult<()> {
        self.requests.lock().unwrap().push(FlagRequest {
            member: member.to_string(),
            flags: flags.to_string(),
            grant: false,
        });
        Ok(())
    }
}
