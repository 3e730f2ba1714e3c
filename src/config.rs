//! Configuration management for the wantlist monitor

use crate::error::ConfigError;
use std::env;
use std::time::Duration;

/// Longest accepted check interval (one week)
pub const MAX_CHECK_INTERVAL_MINUTES: u64 = 7 * 24 * 60;

/// Bot configuration loaded from environment
#[derive(Debug, Clone)]
pub struct Config {
    /// Discogs personal access token
    pub discogs_token: String,

    /// Discogs user whose wantlist is monitored
    pub discogs_username: String,

    /// Telegram bot token from BotFather
    pub telegram_bot_token: String,

    /// Chat to notify. When unset, the first chat that talks to the bot is used.
    pub telegram_chat_id: Option<i64>,

    /// Minutes between scheduled wantlist checks
    pub check_interval_minutes: u64,

    /// Delay before the first check after startup
    pub initial_check_delay_seconds: u64,

    /// Path to SQLite database
    pub database_path: String,

    /// Port for the keep-alive HTTP server
    pub keep_alive_port: u16,

    /// Per-request timeout for Discogs and Telegram calls
    pub http_timeout_seconds: u64,

    /// Discogs request budget (authenticated limit is 60/min)
    pub discogs_requests_per_minute: u32,

    /// Telegram send budget for a single chat
    pub telegram_messages_per_second: u32,

    pub discogs_api_url: String,
    pub telegram_api_url: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present
        dotenvy::dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|s| !s.trim().is_empty());

        let mut missing = Vec::new();
        let mut required = |key: &str| {
            var(key).unwrap_or_else(|| {
                missing.push(key.to_string());
                String::new()
            })
        };

        let discogs_token = required("DISCOGS_TOKEN");
        let telegram_bot_token = required("TELEGRAM_BOT_TOKEN");
        let discogs_username = required("DISCOGS_USERNAME");

        if !missing.is_empty() {
            return Err(ConfigError::Missing(missing));
        }

        let telegram_chat_id = match var("TELEGRAM_CHAT_ID") {
            Some(raw) => Some(raw.trim().parse::<i64>().map_err(|_| ConfigError::Invalid {
                key: "TELEGRAM_CHAT_ID".to_string(),
                value: raw.clone(),
            })?),
            None => None,
        };

        let check_interval_minutes = var("CHECK_INTERVAL_MINUTES")
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(30);

        let initial_check_delay_seconds = var("INITIAL_CHECK_DELAY_SECONDS")
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(5);

        let database_path = var("DATABASE_PATH").unwrap_or_else(|| "discoger.db".to_string());

        let keep_alive_port = var("KEEP_ALIVE_PORT")
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(3000);

        let http_timeout_seconds = var("HTTP_TIMEOUT_SECONDS")
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(15);

        let discogs_requests_per_minute = var("DISCOGS_REQUESTS_PER_MINUTE")
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(30);

        let telegram_messages_per_second = var("TELEGRAM_MESSAGES_PER_SECOND")
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(1);

        let discogs_api_url = var("DISCOGS_API_URL")
            .unwrap_or_else(|| DiscogsApi::BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        let telegram_api_url = var("TELEGRAM_API_URL")
            .unwrap_or_else(|| "https://api.telegram.org".to_string())
            .trim_end_matches('/')
            .to_string();

        // Zero would make the ticker or the rate limiters spin
        for (key, value) in [
            ("CHECK_INTERVAL_MINUTES", check_interval_minutes),
            ("HTTP_TIMEOUT_SECONDS", http_timeout_seconds),
            ("DISCOGS_REQUESTS_PER_MINUTE", discogs_requests_per_minute as u64),
            ("TELEGRAM_MESSAGES_PER_SECOND", telegram_messages_per_second as u64),
        ] {
            if value == 0 {
                return Err(ConfigError::Invalid {
                    key: key.to_string(),
                    value: "0".to_string(),
                });
            }
        }

        if check_interval_minutes > MAX_CHECK_INTERVAL_MINUTES {
            return Err(ConfigError::Invalid {
                key: "CHECK_INTERVAL_MINUTES".to_string(),
                value: check_interval_minutes.to_string(),
            });
        }

        Ok(Self {
            discogs_token,
            discogs_username,
            telegram_bot_token,
            telegram_chat_id,
            check_interval_minutes,
            initial_check_delay_seconds,
            database_path,
            keep_alive_port,
            http_timeout_seconds,
            discogs_requests_per_minute,
            telegram_messages_per_second,
            discogs_api_url,
            telegram_api_url,
        })
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_minutes * 60)
    }

    pub fn initial_check_delay(&self) -> Duration {
        Duration::from_secs(self.initial_check_delay_seconds)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_seconds)
    }
}

/// Discogs API configuration
pub struct DiscogsApi;

impl DiscogsApi {
    pub const BASE_URL: &'static str = "https://api.discogs.com";
    pub const WEB_URL: &'static str = "https://www.discogs.com";
    pub const USER_AGENT: &'static str = "DiscogerBot/1.0";

    pub fn release_url(release_id: &str) -> String {
        format!("{}/release/{}", Self::WEB_URL, release_id)
    }

    pub fn listing_url(listing_id: &str) -> String {
        format!("{}/sell/item/{}", Self::WEB_URL, listing_id)
    }
}
