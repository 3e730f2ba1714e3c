//! Telegram Bot API client and listing notifier

use crate::config::Config;
use crate::error::DeliveryError;
use crate::services::RateLimiter;
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

/// Outbound channel for formatted notifications
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, text: &str) -> Result<(), DeliveryError>;
}

/// Chat that receives notifications.
///
/// Seeded from configuration; otherwise the first chat that talks to the bot
/// claims it.
#[derive(Debug, Clone, Default)]
pub struct ChatTarget {
    inner: Arc<RwLock<Option<i64>>>,
}

impl ChatTarget {
    pub fn new(chat_id: Option<i64>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(chat_id)),
        }
    }

    pub async fn get(&self) -> Option<i64> {
        *self.inner.read().await
    }

    /// Set the chat id unless one is already resolved. Returns true if it was set.
    pub async fn set_if_absent(&self, chat_id: i64) -> bool {
        let mut guard = self.inner.write().await;
        if guard.is_some() {
            return false;
        }
        *guard = Some(chat_id);
        true
    }
}

/// Envelope of every Bot API response
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    #[serde(default)]
    error_code: Option<u16>,
    #[serde(default)]
    description: Option<String>,
}

/// Incoming update from `getUpdates`
#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<IncomingMessage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IncomingMessage {
    pub chat: Chat,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

/// HTTP client for the Telegram Bot API
#[derive(Clone)]
pub struct TelegramClient {
    client: Client,
    /// `{api}/bot{token}`; never log this
    endpoint: String,
    limiter: RateLimiter,
}

impl TelegramClient {
    pub fn new(config: &Config) -> Result<Self, DeliveryError> {
        let client = Client::builder().timeout(config.http_timeout()).build()?;

        Ok(Self {
            client,
            endpoint: format!("{}/bot{}", config.telegram_api_url, config.telegram_bot_token),
            limiter: RateLimiter::per_second("telegram", config.telegram_messages_per_second),
        })
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        payload: serde_json::Value,
        timeout: Option<Duration>,
    ) -> Result<T, DeliveryError> {
        let mut request = self
            .client
            .post(format!("{}/{}", self.endpoint, method))
            .json(&payload);
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let body: ApiResponse<T> = response.json().await?;

        match (body.ok, body.result) {
            (true, Some(result)) => Ok(result),
            _ => Err(DeliveryError::Rejected {
                status: body.error_code.unwrap_or(status),
                description: body.description.unwrap_or_else(|| "no description".to_string()),
            }),
        }
    }

    /// Send a MarkdownV2 message to a chat
    pub async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), DeliveryError> {
        self.limiter.acquire().await;

        let payload = json!({
            "chat_id": chat_id,
            "text": text,
            "parse_mode": "MarkdownV2",
            "disable_web_page_preview": false,
        });

        self.call::<serde_json::Value>("sendMessage", payload, None)
            .await
            .map(|_| ())
    }

    /// Long-poll for updates after `offset`
    pub async fn get_updates(
        &self,
        offset: i64,
        poll_seconds: u64,
    ) -> Result<Vec<Update>, DeliveryError> {
        let payload = json!({
            "offset": offset,
            "timeout": poll_seconds,
            "allowed_updates": ["message"],
        });

        // The request must outlive the server-side poll window
        let timeout = Duration::from_secs(poll_seconds + 15);
        self.call("getUpdates", payload, Some(timeout)).await
    }
}

/// Delivers listing notifications to the resolved chat
pub struct TelegramNotifier {
    client: TelegramClient,
    target: ChatTarget,
}

impl TelegramNotifier {
    pub fn new(client: TelegramClient, target: ChatTarget) -> Self {
        Self { client, target }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn notify(&self, text: &str) -> Result<(), DeliveryError> {
        let Some(chat_id) = self.target.get().await else {
            warn!("No chat ID set. Cannot send notification.");
            return Err(DeliveryError::NoTarget);
        };

        match self.client.send_message(chat_id, text).await {
            Ok(()) => {
                info!("Notification sent to chat {}", chat_id);
                Ok(())
            }
            Err(e) => {
                error!("Error sending notification: {}", e);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_chat_target_set_once() {
        let target = ChatTarget::new(None);
        assert_eq!(target.get().await, None);

        assert!(target.set_if_absent(42).await);
        assert!(!target.set_if_absent(7).await);
        assert_eq!(target.get().await, Some(42));
    }

    #[tokio::test]
    async fn test_configured_chat_target_is_not_replaced() {
        let target = ChatTarget::new(Some(-100123));
        assert!(!target.set_if_absent(42).await);
        assert_eq!(target.get().await, Some(-100123));
    }

    #[tokio::test]
    async fn test_notify_without_target_is_noop() {
        let config = Config::from_lookup(|key| match key {
            "DISCOGS_TOKEN" => Some("d".to_string()),
            "DISCOGS_USERNAME" => Some("u".to_string()),
            "TELEGRAM_BOT_TOKEN" => Some("t".to_string()),
            // Unroutable, the request must never be attempted
            "TELEGRAM_API_URL" => Some("http://127.0.0.1:9".to_string()),
            _ => None,
        })
        .unwrap();

        let notifier = TelegramNotifier::new(TelegramClient::new(&config).unwrap(), ChatTarget::new(None));
        assert!(matches!(notifier.notify("hi").await, Err(DeliveryError::NoTarget)));
    }

    /// Bot API stand-in: chat 1 accepts messages, any other chat is rejected
    async fn spawn_bot_api() -> TelegramClient {
        use axum::{routing::post, Json, Router};
        use serde_json::Value;

        async fn send_message(Json(body): Json<Value>) -> Json<Value> {
            if body["chat_id"] == 1 && body["parse_mode"] == "MarkdownV2" {
                Json(json!({"ok": true, "result": {"message_id": 7}}))
            } else {
                Json(json!({"ok": false, "error_code": 400, "description": "Bad Request: chat not found"}))
            }
        }

        async fn get_updates(Json(body): Json<Value>) -> Json<Value> {
            let offset = body["offset"].as_i64().unwrap_or(0);
            Json(json!({
                "ok": true,
                "result": [{"update_id": offset + 1, "message": {"chat": {"id": 1}, "text": "/start"}}]
            }))
        }

        let app = Router::new()
            .route("/bottoken/sendMessage", post(send_message))
            .route("/bottoken/getUpdates", post(get_updates));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let config = Config::from_lookup(|key| match key {
            "DISCOGS_TOKEN" => Some("d".to_string()),
            "DISCOGS_USERNAME" => Some("u".to_string()),
            "TELEGRAM_BOT_TOKEN" => Some("token".to_string()),
            "TELEGRAM_MESSAGES_PER_SECOND" => Some("1000".to_string()),
            "TELEGRAM_API_URL" => Some(format!("http://{}", addr)),
            _ => None,
        })
        .unwrap();
        TelegramClient::new(&config).unwrap()
    }

    #[tokio::test]
    async fn test_send_message_envelope() {
        let client = spawn_bot_api().await;

        client.send_message(1, "hello").await.unwrap();

        match client.send_message(2, "hello").await {
            Err(DeliveryError::Rejected { status, description }) => {
                assert_eq!(status, 400);
                assert_eq!(description, "Bad Request: chat not found");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_get_updates_over_http() {
        let client = spawn_bot_api().await;

        let updates = client.get_updates(41, 0).await.unwrap();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].update_id, 42);
        assert_eq!(updates[0].message.as_ref().unwrap().text.as_deref(), Some("/start"));
    }

    #[tokio::test]
    async fn test_notifier_delivers_to_target() {
        let client = spawn_bot_api().await;

        let notifier = TelegramNotifier::new(client.clone(), ChatTarget::new(Some(1)));
        notifier.notify("new listing").await.unwrap();

        let stranger = TelegramNotifier::new(client, ChatTarget::new(Some(2)));
        assert!(matches!(
            stranger.notify("new listing").await,
            Err(DeliveryError::Rejected { status: 400, .. })
        ));
    }

    #[test]
    fn test_parse_updates() {
        let body = r#"{
            "ok": true,
            "result": [
                {"update_id": 10, "message": {"message_id": 1, "chat": {"id": 555, "type": "private"}, "text": "/status"}},
                {"update_id": 11, "edited_message": {"message_id": 1, "chat": {"id": 555}}}
            ]
        }"#;
        let parsed: ApiResponse<Vec<Update>> = serde_json::from_str(body).unwrap();
        let updates = parsed.result.unwrap();
        assert_eq!(updates.len(), 2);
        assert_eq!(updates[0].message.as_ref().unwrap().chat.id, 555);
        assert_eq!(updates[0].message.as_ref().unwrap().text.as_deref(), Some("/status"));
        assert!(updates[1].message.is_none());
    }

    #[test]
    fn test_parse_error_response() {
        let body = r#"{"ok": false, "error_code": 400, "description": "Bad Request: can't parse entities"}"#;
        let parsed: ApiResponse<serde_json::Value> = serde_json::from_str(body).unwrap();
        assert!(!parsed.ok);
        assert_eq!(parsed.error_code, Some(400));
        assert!(parsed.result.is_none());
    }
}
