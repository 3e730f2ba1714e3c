//! Axum server setup and shared application state

use crate::checker::WantlistChecker;
use crate::db::ListingStore;
use crate::discogs::DiscogsClient;
use crate::services::{Metrics, MetricsSnapshot};
use crate::telegram::{ChatTarget, TelegramClient, TelegramNotifier};
use crate::types::CycleReport;
use crate::{Config, Database};
use anyhow::Result;
use axum::{extract::State, response::Html, routing::get, Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::error;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub config: Arc<Config>,
    pub checker: Arc<WantlistChecker>,
    /// Used directly by the command loop for replies
    pub telegram: TelegramClient,
    pub target: ChatTarget,
    pub metrics: Metrics,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub async fn new(config: Config) -> Result<Self> {
        let db = Database::new(&config.database_path).await?;
        Self::with_database(config, db)
    }

    /// Wire clients, notifier and checker around an open database
    pub fn with_database(config: Config, db: Database) -> Result<Self> {
        let db = Arc::new(db);
        let metrics = Metrics::new();
        let target = ChatTarget::new(config.telegram_chat_id);

        let marketplace = DiscogsClient::new(&config)?;
        let telegram = TelegramClient::new(&config)?;
        let notifier = TelegramNotifier::new(telegram.clone(), target.clone());

        let checker = WantlistChecker::new(
            db.clone(),
            Arc::new(marketplace),
            Arc::new(notifier),
            metrics.clone(),
        );

        Ok(Self {
            db,
            config: Arc::new(config),
            checker: Arc::new(checker),
            telegram,
            target,
            metrics,
            started_at: Utc::now(),
        })
    }

    pub async fn status(&self) -> StatusReport {
        let seen_listings = match self.db.count_seen().await {
            Ok(n) => Some(n),
            Err(e) => {
                error!("Failed to count seen listings: {}", e);
                None
            }
        };

        StatusReport {
            status: "running",
            started_at: self.started_at,
            check_interval_minutes: self.config.check_interval_minutes,
            chat_id_set: self.target.get().await.is_some(),
            seen_listings,
            cycle_running: self.checker.is_running(),
            last_cycle: self.checker.last_report().await,
            metrics: self.metrics.snapshot(),
        }
    }
}

/// JSON body of `GET /status`
#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub status: &'static str,
    pub started_at: DateTime<Utc>,
    pub check_interval_minutes: u64,
    pub chat_id_set: bool,
    pub seen_listings: Option<i64>,
    pub cycle_running: bool,
    pub last_cycle: Option<CycleReport>,
    pub metrics: MetricsSnapshot,
}

/// Create the Axum application with all routes
pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health_check))
        .route("/status", get(status))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn index() -> Html<&'static str> {
    Html(
        "<!DOCTYPE html>\
         <html><head><title>Discogs Wantlist Bot</title></head>\
         <body><h1>Discogs Wantlist Bot is running</h1>\
         <p>New marketplace listings from the wantlist are sent to Telegram.</p>\
         </body></html>",
    )
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}

async fn status(State(state): State<AppState>) -> Json<StatusReport> {
    Json(state.status().await)
}
