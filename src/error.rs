//! Error types for the wantlist monitor
//!
//! Every recoverable failure is classified here so the check cycle can
//! pattern-match on it and keep going. Only `ConfigError` is fatal.

use thiserror::Error;

/// Failure talking to the Discogs API
#[derive(Debug, Error)]
pub enum FetchError {
    /// Discogs answered 429
    #[error("Discogs rate limit hit")]
    RateLimited,
    /// Token rejected (401/403)
    #[error("Discogs rejected the access token (status {0})")]
    Unauthorized(u16),
    /// Any other non-success status
    #[error("Discogs API error {status}: {body}")]
    Status { status: u16, body: String },
    /// Network/connection error (timeout, DNS, etc.)
    #[error("request to Discogs failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Body did not match the expected shape
    #[error("failed to decode Discogs response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl FetchError {
    /// Classify a non-success Discogs response
    pub fn from_response(status: u16, body: &str) -> Self {
        let body_lower = body.to_lowercase();

        if status == 429 || body_lower.contains("too many requests") {
            return FetchError::RateLimited;
        }

        if status == 401 || status == 403 {
            return FetchError::Unauthorized(status);
        }

        let body: String = body.chars().take(200).collect();
        FetchError::Status { status, body }
    }
}

/// Failure reading or writing the SQLite store
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Failure delivering a Telegram message
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// No chat id configured and nobody has talked to the bot yet
    #[error("no Telegram chat id resolved yet")]
    NoTarget,
    #[error("Telegram rejected the request ({status}): {description}")]
    Rejected { status: u16, description: String },
    #[error("request to Telegram failed: {0}")]
    Http(reqwest::Error),
}

impl From<reqwest::Error> for DeliveryError {
    fn from(err: reqwest::Error) -> Self {
        // The request URL embeds the bot token
        DeliveryError::Http(err.without_url())
    }
}

/// Invalid or incomplete configuration, fatal at startup
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variables: {}", .0.join(", "))]
    Missing(Vec<String>),
    #[error("Invalid value for {key}: {value:?}")]
    Invalid { key: String, value: String },
}

/// Returned when a check cannot start
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum CheckError {
    #[error("a wantlist check is already in progress")]
    AlreadyRunning,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limited() {
        let err = FetchError::from_response(429, "");
        assert!(matches!(err, FetchError::RateLimited));
    }

    #[test]
    fn test_unauthorized() {
        let err = FetchError::from_response(401, r#"{"message": "You must authenticate to access this resource."}"#);
        assert!(matches!(err, FetchError::Unauthorized(401)));
    }

    #[test]
    fn test_status_body_is_trimmed() {
        let body = "x".repeat(1000);
        match FetchError::from_response(500, &body) {
            FetchError::Status { status, body } => {
                assert_eq!(status, 500);
                assert_eq!(body.len(), 200);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_missing_config_lists_every_variable() {
        let err = ConfigError::Missing(vec!["DISCOGS_TOKEN".into(), "DISCOGS_USERNAME".into()]);
        assert_eq!(
            err.to_string(),
            "Missing required environment variables: DISCOGS_TOKEN, DISCOGS_USERNAME"
        );
    }
}
