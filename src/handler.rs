//! Console-side event handler used by the `mcsync` binary

use std::sync::Arc;
use tokio::time::Instant;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::{info, trace};

use crate::events::ServerEvent;
use crate::monitor::PlayerActivity;
use crate::subprocess::EventHandler;

/// Logs events and keeps player activity current for the idle monitor
pub struct ConsoleHandler {
    activity: Arc<PlayerActivity>,
    json: bool,
}

impl ConsoleHandler {
    /// With `json` set, every non-raw event is also printed to stdout as one JSON line.
    pub fn new(activity: Arc<PlayerActivity>, json: bool) -> Self {
        Self { activity, json }
    }
}

#[async_trait]
impl EventHandler for ConsoleHandler {
    async fn handle(&self, event: ServerEvent) -> Result<()> {
        self.activity.record(&event, Instant::now());

        if self.json && !matches!(event, ServerEvent::RawLine { .. }) {
            let line = serde_json::to_string(&event).context("Failed to serialize event")?;
            println!("{line}");
        }

        match &event {
            ServerEvent::RawLine { text } => trace!(line = %text, "Server output"),
            ServerEvent::ServerReady { elapsed } => info!(%elapsed, "Server ready"),
            ServerEvent::ChatMessage { username, text } => info!(%username, %text, "Chat"),
            ServerEvent::PlayerJoined { username } => info!(%username, "Player joined"),
            ServerEvent::PlayerLeft { username } => info!(%username, "Player left"),
            ServerEvent::ServerStopping => info!("Server stopping"),
            ServerEvent::PlayerList { players } => {
                info!(count = players.len(), players = ?players, "Players online")
            }
            ServerEvent::ScoreboardTrigger {
                username,
                objective,
                ..
            } => info!(
                %username,
                %objective,
                value = ?event.trigger_value(),
                "Scoreboard trigger"
            ),
            ServerEvent::WhitelistAdded { username } => match username {
                Some(username) => info!(%username, "Whitelist entry added"),
                None => info!("Player was already whitelisted"),
            },
            ServerEvent::WhitelistRemoved { username } => match username {
                Some(username) => info!(%username, "Whitelist entry removed"),
                None => info!("Player was not whitelisted"),
            },
            ServerEvent::AiQuestion { username, question } => {
                info!(%username, %question, "Question for the trigger word")
            }
            ServerEvent::LegacyListIndicator => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_handler_updates_activity() {
        let activity = Arc::new(PlayerActivity::new(Instant::now()));
        let handler = ConsoleHandler::new(Arc::clone(&activity), false);

        handler
            .handle(ServerEvent::PlayerJoined {
                username: "Steve".to_string(),
            })
            .await
            .unwrap();
        handler
            .handle(ServerEvent::RawLine {
                text: "noise".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(activity.online(), vec!["Steve".to_string()]);
    }
}
