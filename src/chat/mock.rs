//! Recording chat client for tests.

use super::traits::{ChatClient, ChatEvent, ChatResult};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// In-memory [`ChatClient`] that records everything sent through it and
/// serves queued events. `next_events` pends forever once the queue is
/// drained, so tests drive the engine's handlers directly.
#[derive(Clone, Default)]
pub struct MockChatClient {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Default)]
struct Inner {
    announcements: Vec<String>,
    notices: Vec<(String, String)>,
    topics: Vec<String>,
    queue: VecDeque<ChatEvent>,
}

impl MockChatClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_event(&self, event: ChatEvent) {
        self.inner.lock().unwrap().queue.push_back(event);
    }

    pub fn announcements(&self) -> Vec<String> {
        self.inner.lock().unwrap().announcements.clone()
    }

    pub fn notices(&self) -> Vec<(String, String)> {
        self.inner.lock().unwrap().notices.clone()
    }

    /// Notices delivered to one member.
    pub fn notices_for(&self, member: &str) -> Vec<String> {
        self.inner
            .lock()
            .unwrap()
            .notices
            .iter()
            .filter(|(to, _)| to == member)
            .map(|(_, text)| text.clone())
            .collect()
    }

    pub fn topics(&self) -> Vec<String> {
        self.inner.lock().unwrap().topics.clone()
    }
}

#[async_trait]
impl ChatClient for MockChatClient {
    async fn announce(&self, text: &str) -> ChatResult<()> {
        self.inner.lock().unwrap().announcements.push(text.to_string());
        Ok(())
    }

    async fn notice(&self, member: &str, text: &str) -> ChatResult<()> {
        self.inner
            .lock()
            .unwrap()
            .notices
            .push((member.to_string(), text.to_string()));
        Ok(())
    }

    async fn set_topic(&self, text: &str) -> ChatResult<()> {
        self.inner.lock().unwrap().topics.push(text.to_string());
        Ok(())
    }

    async fn next_events(&self) -> ChatResult<Vec<ChatEvent>> {
        let drained: Vec<ChatEvent> = {
            let mut inner = self.inner.lock().unwrap();
            inner.queue.drain(..).collect()
        };
        if drained.is_empty() {
            futures::future::pending::<()>().await;
        }
        Ok(drained)
    }
}
