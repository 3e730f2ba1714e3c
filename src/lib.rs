//! Discogs Wantlist Monitor Library
//!
//! Polls the Discogs marketplace for every release on a user's wantlist and
//! pushes listings it has not seen before to a Telegram chat.
//!
//! 1. **Checker**: fetches the wantlist, diffs live listings against the
//!    seen-listings store and notifies each new one exactly once.
//!
//! 2. **Scheduler and bot**: trigger checks on an interval or on `/check`,
//!    never more than one at a time.

pub mod api;
pub mod bot;
pub mod checker;
pub mod config;
pub mod db;
pub mod discogs;
pub mod error;
pub mod message;
pub mod services;
pub mod telegram;
pub mod types;

pub use checker::WantlistChecker;
pub use config::Config;
pub use db::{Database, ListingStore};
pub use discogs::{DiscogsClient, Marketplace};
pub use error::{CheckError, ConfigError, DeliveryError, FetchError, StorageError};
pub use telegram::{ChatTarget, Notifier, TelegramClient, TelegramNotifier};
pub use types::{CachedItem, CycleReport, Listing, Price, TrackedItem, Trigger};
