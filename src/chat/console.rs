//! Console chat adapter.
//!
//! Stands in for a wire protocol during local operation: stdin lines become
//! channel messages from the configured operator nick, and announcements,
//! notices, and topic changes print to stdout. The first event batch seeds
//! the operator with voting and staff flags so the command surface is usable
//! without a directory service.

use super::traits::{ChatClient, ChatError, ChatEvent, ChatResult};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::Mutex;

#[derive(Clone)]
pub struct ConsoleChat {
    nick: String,
    state: Arc<Mutex<ConsoleState>>,
}

struct ConsoleState {
    lines: Lines<BufReader<Stdin>>,
    seeded: bool,
}

impl ConsoleChat {
    pub fn new(nick: &str) -> Self {
        Self {
            nick: nick.to_string(),
            state: Arc::new(Mutex::new(ConsoleState {
                lines: BufReader::new(tokio::io::stdin()).lines(),
                seeded: false,
            })),
        }
    }
}

#[async_trait]
impl ChatClient for ConsoleChat {
    async fn announce(&self, text: &str) -> ChatResult<()> {
        println!("[channel] {text}");
        Ok(())
    }

    async fn notice(&self, member: &str, text: &str) -> ChatResult<()> {
        println!("[notice -> {member}] {text}");
        Ok(())
    }

    async fn set_topic(&self, text: &str) -> ChatResult<()> {
        println!("[topic] {text}");
        Ok(())
    }

    async fn next_events(&self) -> ChatResult<Vec<ChatEvent>> {
        let mut state = self.state.lock().await;
        if !state.seeded {
            state.seeded = true;
            return Ok(vec![ChatEvent::FlagSnapshot {
                member: self.nick.clone(),
                flags: "VO".to_string(),
            }]);
        }
        match state.lines.next_line().await {
            Ok(Some(line)) => Ok(vec![ChatEvent::Message {
                sender: self.nick.clone(),
                in_channel: true,
                text: line,
            }]),
            Ok(None) => Err(ChatError::Closed),
            Err(e) => Err(ChatError::Network(e.to_string())),
        }
    }
}
