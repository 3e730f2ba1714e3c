//! Telegram command surface
//!
//! Long-polls `getUpdates` and answers the handful of slash commands the bot
//! understands. The first chat that writes to the bot becomes the
//! notification target when none is configured.

use crate::api::AppState;
use crate::db::ListingStore;
use crate::error::CheckError;
use crate::message::{self, StatusView};
use crate::types::Trigger;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Server-side long-poll window
const POLL_TIMEOUT_SECS: u64 = 30;

/// Pause after a failed poll before trying again
const ERROR_BACKOFF: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Help,
    Status,
    Check,
    Test,
}

impl Command {
    /// Parse the first word of a message. Accepts `/cmd` and `/cmd@botname`.
    pub fn parse(text: &str) -> Option<Self> {
        let word = text.split_whitespace().next()?;
        let name = word.strip_prefix('/')?;
        let name = name.split('@').next().unwrap_or(name);

        match name.to_ascii_lowercase().as_str() {
            "start" => Some(Self::Start),
            "help" => Some(Self::Help),
            "status" => Some(Self::Status),
            "check" => Some(Self::Check),
            "test" => Some(Self::Test),
            _ => None,
        }
    }
}

pub struct CommandBot {
    state: AppState,
    offset: i64,
}

impl CommandBot {
    pub fn new(state: AppState) -> Self {
        Self { state, offset: 0 }
    }

    /// Poll forever
    pub async fn run(mut self) {
        info!("Telegram command listener started");

        loop {
            match self
                .state
                .telegram
                .get_updates(self.offset, POLL_TIMEOUT_SECS)
                .await
            {
                Ok(updates) => {
                    for update in updates {
                        self.offset = self.offset.max(update.update_id + 1);

                        let Some(msg) = update.message else {
                            continue;
                        };
                        self.handle_message(msg.chat.id, msg.text.as_deref().unwrap_or(""))
                            .await;
                    }
                }
                Err(e) => {
                    warn!("Telegram polling error: {}", e);
                    tokio::time::sleep(ERROR_BACKOFF).await;
                }
            }
        }
    }

    async fn handle_message(&self, chat_id: i64, text: &str) {
        if self.state.target.set_if_absent(chat_id).await {
            info!("Chat ID set to: {}", chat_id);
        }

        let Some(command) = Command::parse(text) else {
            debug!("Ignoring non-command message from chat {}", chat_id);
            return;
        };

        info!("Received {:?} command from chat {}", command, chat_id);
        self.state.metrics.inc_commands_handled();

        match command {
            Command::Start | Command::Help => {
                let text = message::welcome(self.state.config.check_interval_minutes);
                self.reply(chat_id, &text).await;
            }
            Command::Status => {
                let text = self.status_text().await;
                self.reply(chat_id, &text).await;
            }
            Command::Test => {
                self.reply(chat_id, &message::test_notification()).await;
            }
            Command::Check => self.spawn_check(chat_id).await,
        }
    }

    async fn status_text(&self) -> String {
        let seen_listings = match self.state.db.count_seen().await {
            Ok(n) => Some(n),
            Err(e) => {
                error!("Failed to count seen listings: {}", e);
                None
            }
        };
        let last_cycle = self.state.checker.last_report().await;

        message::status(&StatusView {
            seen_listings,
            interval_minutes: self.state.config.check_interval_minutes,
            chat_id: self.state.target.get().await,
            cycle_running: self.state.checker.is_running(),
            last_cycle: last_cycle.as_ref(),
        })
    }

    /// Manual checks run off the polling loop so commands keep flowing
    async fn spawn_check(&self, chat_id: i64) {
        if self.state.checker.is_running() {
            self.reply(chat_id, &message::check_in_progress()).await;
            return;
        }

        self.reply(chat_id, &message::checking()).await;

        let state = self.state.clone();
        tokio::spawn(async move {
            let text = match state.checker.check_now(Trigger::Manual).await {
                Ok(report) => message::check_result(report.new_listings),
                Err(CheckError::AlreadyRunning) => message::check_in_progress(),
            };
            if let Err(e) = state.telegram.send_message(chat_id, &text).await {
                error!("Failed to send check result: {}", e);
            }
        });
    }

    async fn reply(&self, chat_id: i64, text: &str) {
        if let Err(e) = self.state.telegram.send_message(chat_id, text).await {
            error!("Failed to reply to chat {}: {}", chat_id, e);
        }
    }
}
