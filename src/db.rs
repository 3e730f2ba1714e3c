//! SQLite database for seen listings and the wantlist metadata cache

use crate::error::StorageError;
use crate::types::{CachedItem, Listing, TrackedItem};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::str::FromStr;
use tracing::{debug, info};

/// Persistent dedup state used by the check cycle
#[async_trait]
pub trait ListingStore: Send + Sync {
    /// Whether this (release, listing) pair was already notified
    async fn record_exists(&self, item_id: &str, listing_id: &str) -> Result<bool, StorageError>;

    /// Mark a listing as notified. Returns false if it was already recorded.
    async fn record_seen(&self, listing: &Listing) -> Result<bool, StorageError>;

    async fn count_seen(&self) -> Result<i64, StorageError>;

    /// Upsert wantlist metadata, overwriting any previous fetch
    async fn cache_item(&self, item: &TrackedItem) -> Result<(), StorageError>;

    async fn get_cached_item(&self, item_id: &str) -> Result<Option<CachedItem>, StorageError>;
}

/// Database connection pool
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (or create) the database file
    pub async fn new(path: &str) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to open database at {}", path))?;

        let db = Self { pool };
        db.initialize().await?;

        Ok(db)
    }

    /// Private in-memory database, mostly for tests and dry runs
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;

        // Every connection would get its own empty database, so pin a single one
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .context("Failed to open in-memory database")?;

        let db = Self { pool };
        db.initialize().await?;

        Ok(db)
    }

    /// Initialize database schema
    async fn initialize(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS seen_listings (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                release_id TEXT NOT NULL,
                listing_id TEXT NOT NULL,
                price TEXT,
                condition TEXT,
                seller_username TEXT,
                listing_url TEXT,
                seen_at TEXT NOT NULL,
                UNIQUE(release_id, listing_id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS wantlist_cache (
                release_id TEXT PRIMARY KEY,
                artist TEXT NOT NULL,
                title TEXT NOT NULL,
                year INTEGER,
                release_url TEXT NOT NULL,
                last_checked TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        info!("Database initialized");
        Ok(())
    }

    /// All cached wantlist entries, most recently checked first
    pub async fn get_cached_items(&self) -> Result<Vec<CachedItem>, StorageError> {
        let rows = sqlx::query("SELECT * FROM wantlist_cache ORDER BY last_checked DESC, release_id")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().filter_map(|row| row_to_cached_item(row).ok()).collect())
    }

    /// Seen-listing count per release, for status output
    pub async fn count_seen_by_item(&self) -> Result<Vec<(String, i64)>, StorageError> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            "SELECT release_id, COUNT(*) FROM seen_listings GROUP BY release_id ORDER BY COUNT(*) DESC, release_id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

#[async_trait]
impl ListingStore for Database {
    async fn record_exists(&self, item_id: &str, listing_id: &str) -> Result<bool, StorageError> {
        let row: Option<(i64,)> =
            sqlx::query_as("SELECT 1 FROM seen_listings WHERE release_id = ? AND listing_id = ?")
                .bind(item_id)
                .bind(listing_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.is_some())
    }

    async fn record_seen(&self, listing: &Listing) -> Result<bool, StorageError> {
        let now = Utc::now().to_rfc3339();
        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO seen_listings
                (release_id, listing_id, price, condition, seller_username, listing_url, seen_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&listing.item_id)
        .bind(&listing.id)
        .bind(listing.price.to_string())
        .bind(&listing.condition)
        .bind(&listing.seller_name)
        .bind(&listing.url)
        .bind(now)
        .execute(&self.pool)
        .await?;

        let inserted = result.rows_affected() > 0;
        debug!(
            "Marked listing {} for release {} as seen (new: {})",
            listing.id, listing.item_id, inserted
        );
        Ok(inserted)
    }

    async fn count_seen(&self) -> Result<i64, StorageError> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM seen_listings")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.0)
    }

    async fn cache_item(&self, item: &TrackedItem) -> Result<(), StorageError> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO wantlist_cache (release_id, artist, title, year, release_url, last_checked)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&item.id)
        .bind(&item.artist)
        .bind(&item.title)
        .bind(item.year.map(i64::from))
        .bind(&item.detail_url)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_cached_item(&self, item_id: &str) -> Result<Option<CachedItem>, StorageError> {
        let row = sqlx::query("SELECT * FROM wantlist_cache WHERE release_id = ?")
            .bind(item_id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(r) => Ok(Some(row_to_cached_item(&r)?)),
            None => Ok(None),
        }
    }
}

fn row_to_cached_item(row: &sqlx::sqlite::SqliteRow) -> Result<CachedItem, StorageError> {
    let year: Option<i64> = row.try_get("year")?;
    let last_checked: String = row.try_get("last_checked")?;

    Ok(CachedItem {
        item: TrackedItem {
            id: row.try_get("release_id")?,
            artist: row.try_get("artist")?,
            title: row.try_get("title")?,
            year: year.and_then(|y| u32::try_from(y).ok()),
            detail_url: row.try_get("release_url")?,
        },
        last_checked: DateTime::parse_from_rfc3339(&last_checked)
            .map(|d| d.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
    })
}
