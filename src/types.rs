//! Core types for the wantlist monitor

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A release on the user's Discogs wantlist
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedItem {
    /// Discogs release id
    pub id: String,
    pub artist: String,
    pub title: String,
    /// None when Discogs reports year 0 (unknown)
    pub year: Option<u32>,
    pub detail_url: String,
}

impl TrackedItem {
    pub fn year_display(&self) -> String {
        self.year
            .map(|y| y.to_string())
            .unwrap_or_else(|| "N/A".to_string())
    }
}

/// Asking price of a listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Price {
    pub value: Decimal,
    /// ISO 4217 code as reported by Discogs
    pub currency: String,
}

impl Price {
    fn symbol(&self) -> Option<&'static str> {
        match self.currency.to_uppercase().as_str() {
            "USD" => Some("$"),
            "EUR" => Some("€"),
            "GBP" => Some("£"),
            "JPY" => Some("¥"),
            "CAD" => Some("CA$"),
            "AUD" => Some("A$"),
            _ => None,
        }
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = self.value.round_dp(2);
        match self.symbol() {
            Some(symbol) => write!(f, "{}{:.2}", symbol, value),
            None => write!(f, "{:.2} {}", value, self.currency),
        }
    }
}

/// A for-sale instance of a tracked release
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    pub id: String,
    /// Release id this listing belongs to
    pub item_id: String,
    pub price: Price,
    pub condition: String,
    pub sleeve_condition: Option<String>,
    pub seller_name: String,
    /// Seller feedback percentage, as reported
    pub seller_rating: Option<String>,
    pub ships_from: Option<String>,
    pub comments: Option<String>,
    pub url: String,
    pub posted_at: Option<DateTime<Utc>>,
}

/// Wantlist entry as persisted in the metadata cache
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CachedItem {
    pub item: TrackedItem,
    pub last_checked: DateTime<Utc>,
}

/// What started a check cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Trigger {
    Startup,
    Interval,
    Manual,
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trigger::Startup => write!(f, "startup"),
            Trigger::Interval => write!(f, "interval"),
            Trigger::Manual => write!(f, "manual"),
        }
    }
}

/// Outcome of one pass over the wantlist
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleReport {
    pub trigger: Trigger,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Items returned by the wantlist fetch
    pub items_total: usize,
    /// Items whose listings were fetched successfully
    pub items_checked: usize,
    pub items_failed: usize,
    /// Listings notified (and recorded) for the first time
    pub new_listings: usize,
    pub delivery_failures: usize,
    pub storage_errors: usize,
}

impl CycleReport {
    pub fn new(trigger: Trigger) -> Self {
        let now = Utc::now();
        Self {
            trigger,
            started_at: now,
            finished_at: now,
            items_total: 0,
            items_checked: 0,
            items_failed: 0,
            new_listings: 0,
            delivery_failures: 0,
            storage_errors: 0,
        }
    }

    pub fn duration_secs(&self) -> f64 {
        (self.finished_at - self.started_at).num_milliseconds() as f64 / 1000.0
    }
}
