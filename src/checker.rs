//! Wantlist checker: the poll-diff-notify cycle
//!
//! One cycle fetches the wantlist, and for every release compares the live
//! marketplace listings against the seen-listings store. Unseen listings are
//! notified and then recorded, so each (release, listing) pair produces at
//! most one message. Every per-item failure is logged and the cycle moves on.

use crate::db::ListingStore;
use crate::discogs::Marketplace;
use crate::error::{CheckError, DeliveryError};
use crate::message;
use crate::services::Metrics;
use crate::telegram::Notifier;
use crate::types::{CycleReport, Listing, TrackedItem, Trigger};
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

/// Runs check cycles, one at a time
pub struct WantlistChecker {
    store: Arc<dyn ListingStore>,
    marketplace: Arc<dyn Marketplace>,
    notifier: Arc<dyn Notifier>,
    metrics: Metrics,
    /// Held for the duration of a cycle
    cycle_lock: Mutex<()>,
    last_report: RwLock<Option<CycleReport>>,
}

impl WantlistChecker {
    pub fn new(
        store: Arc<dyn ListingStore>,
        marketplace: Arc<dyn Marketplace>,
        notifier: Arc<dyn Notifier>,
        metrics: Metrics,
    ) -> Self {
        Self {
            store,
            marketplace,
            notifier,
            metrics,
            cycle_lock: Mutex::new(()),
            last_report: RwLock::new(None),
        }
    }

    /// Run one cycle unless another one is in flight
    pub async fn check_now(&self, trigger: Trigger) -> Result<CycleReport, CheckError> {
        let Ok(_guard) = self.cycle_lock.try_lock() else {
            self.metrics.inc_cycles_skipped();
            return Err(CheckError::AlreadyRunning);
        };

        info!("Starting wantlist check ({})...", trigger);
        let report = self.run_cycle(trigger).await;

        info!(
            "Wantlist check complete. Found {} new listings ({} of {} items checked, {:.1}s).",
            report.new_listings,
            report.items_checked,
            report.items_total,
            report.duration_secs()
        );

        self.metrics.inc_cycles_completed();
        *self.last_report.write().await = Some(report.clone());
        Ok(report)
    }

    pub fn is_running(&self) -> bool {
        self.cycle_lock.try_lock().is_err()
    }

    pub async fn last_report(&self) -> Option<CycleReport> {
        self.last_report.read().await.clone()
    }

    async fn run_cycle(&self, trigger: Trigger) -> CycleReport {
        let mut report = CycleReport::new(trigger);

        let items = match self.marketplace.fetch_tracked_items().await {
            Ok(items) => items,
            Err(e) => {
                warn!("Failed to fetch wantlist: {}", e);
                self.metrics.inc_fetch_errors();
                report.finished_at = Utc::now();
                return report;
            }
        };

        if items.is_empty() {
            warn!("Wantlist is empty");
            report.finished_at = Utc::now();
            return report;
        }

        report.items_total = items.len();
        info!("Checking {} items in wantlist...", items.len());

        for item in &items {
            self.check_item(item, &mut report).await;
        }

        report.finished_at = Utc::now();
        report
    }

    async fn check_item(&self, item: &TrackedItem, report: &mut CycleReport) {
        if let Err(e) = self.store.cache_item(item).await {
            error!("Error caching wantlist item {}: {}", item.id, e);
            self.metrics.inc_storage_errors();
            report.storage_errors += 1;
        }

        let listings = match self.marketplace.fetch_listings(&item.id).await {
            Ok(listings) => listings,
            Err(e) => {
                warn!(
                    "Failed to fetch listings for {} - {} ({}): {}",
                    item.artist, item.title, item.id, e
                );
                self.metrics.inc_fetch_errors();
                report.items_failed += 1;
                return;
            }
        };

        report.items_checked += 1;

        for listing in &listings {
            match self.store.record_exists(&item.id, &listing.id).await {
                Ok(true) => continue,
                Ok(false) => {}
                Err(e) => {
                    // Unknown state: skip rather than risk a duplicate, retry next cycle
                    error!(
                        "Error checking listing {} for release {}: {}",
                        listing.id, item.id, e
                    );
                    self.metrics.inc_storage_errors();
                    report.storage_errors += 1;
                    continue;
                }
            }

            self.deliver(item, listing, report).await;

            if let Err(e) = self.store.record_seen(listing).await {
                error!("Error marking listing {} as seen: {}", listing.id, e);
                self.metrics.inc_storage_errors();
                report.storage_errors += 1;
            }

            report.new_listings += 1;
            self.metrics.inc_listings_notified();
        }
    }

    async fn deliver(&self, item: &TrackedItem, listing: &Listing, report: &mut CycleReport) {
        let text = message::format_listing(item, listing);

        match self.notifier.notify(&text).await {
            Ok(()) => {
                debug!("Notified listing {} for release {}", listing.id, item.id);
            }
            Err(DeliveryError::NoTarget) => {
                warn!(
                    "Listing {} for release {} recorded without notification: no chat yet",
                    listing.id, item.id
                );
                self.metrics.inc_deliveries_failed();
                report.delivery_failures += 1;
            }
            Err(e) => {
                error!("Failed to deliver listing {}: {}", listing.id, e);
                self.metrics.inc_deliveries_failed();
                report.delivery_failures += 1;
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use crate::db::Database;
    use tokio::sync::Notify;

    async fn checker(
        marketplace: Arc<FakeMarketplace>,
        notifier: Arc<RecordingNotifier>,
    ) -> (WantlistChecker, Arc<Database>) {
        let db = Arc::new(Database::in_memory().await.unwrap());
        let checker = WantlistChecker::new(db.clone(), marketplace, notifier, Metrics::new());
        (checker, db)
    }

    #[tokio::test]
    async fn test_new_listing_end_to_end() {
        let marketplace = Arc::new(FakeMarketplace::with(
            vec![item("100", "Artist", "Title")],
            vec![listing("100", "L1", 10)],
        ));
        let notifier = Arc::new(RecordingNotifier::default());
        let (checker, db) = checker(marketplace, notifier.clone()).await;

        assert!(!db.record_exists("100", "L1").await.unwrap());

        let report = checker.check_now(Trigger::Manual).await.unwrap();
        assert_eq!(report.new_listings, 1);
        assert_eq!(report.items_checked, 1);

        let messages = notifier.messages();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].contains("Artist"));
        assert!(messages[0].contains("$10"));

        assert!(db.record_exists("100", "L1").await.unwrap());
        assert!(db.get_cached_item("100").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_second_cycle_finds_nothing_new() {
        let marketplace = Arc::new(FakeMarketplace::with(
            vec![item("1", "A", "One"), item("2", "B", "Two")],
            vec![listing("1", "L1", 5), listing("1", "L2", 6), listing("2", "L3", 7)],
        ));
        let notifier = Arc::new(RecordingNotifier::default());
        let (checker, db) = checker(marketplace, notifier.clone()).await;

        let first = checker.check_now(Trigger::Startup).await.unwrap();
        assert_eq!(first.new_listings, 3);

        let second = checker.check_now(Trigger::Interval).await.unwrap();
        assert_eq!(second.new_listings, 0);
        assert_eq!(notifier.messages().len(), 3);
        assert_eq!(db.count_seen().await.unwrap(), 3);
        assert_eq!(checker.last_report().await.unwrap().trigger, Trigger::Interval);
    }

    #[tokio::test]
    async fn test_only_new_listings_are_notified() {
        let marketplace = Arc::new(FakeMarketplace::with(
            vec![item("1", "A", "One")],
            vec![listing("1", "L1", 5)],
        ));
        let notifier = Arc::new(RecordingNotifier::default());
        let (checker, _db) = checker(marketplace.clone(), notifier.clone()).await;

        checker.check_now(Trigger::Startup).await.unwrap();

        marketplace
            .listings
            .lock()
            .unwrap()
            .get_mut("1")
            .unwrap()
            .push(listing("1", "L9", 99));

        let report = checker.check_now(Trigger::Interval).await.unwrap();
        assert_eq!(report.new_listings, 1);
        let messages = notifier.messages();
        assert_eq!(messages.len(), 2);
        assert!(messages[1].contains("$99"));
    }

    #[tokio::test]
    async fn test_empty_wantlist_does_nothing() {
        let marketplace = Arc::new(FakeMarketplace::with(vec![], vec![]));
        let notifier = Arc::new(RecordingNotifier::default());
        let (checker, db) = checker(marketplace, notifier.clone()).await;

        let report = checker.check_now(Trigger::Manual).await.unwrap();
        assert_eq!(report.new_listings, 0);
        assert_eq!(report.items_total, 0);
        assert!(notifier.messages().is_empty());
        assert_eq!(db.count_seen().await.unwrap(), 0);
        assert!(db.get_cached_items().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_wantlist_fetch_error_is_treated_as_empty() {
        let marketplace = Arc::new(FakeMarketplace {
            wantlist_fails: true,
            ..Default::default()
        });
        let notifier = Arc::new(RecordingNotifier::default());
        let metrics = Metrics::new();
        let db = Arc::new(Database::in_memory().await.unwrap());
        let checker = WantlistChecker::new(
            db.clone(),
            marketplace.clone(),
            notifier.clone(),
            metrics.clone(),
        );

        let report = checker.check_now(Trigger::Interval).await.unwrap();
        assert_eq!(report.new_listings, 0);
        assert_eq!(report.items_total, 0);
        assert_eq!(marketplace.calls(), 1);
        assert!(notifier.messages().is_empty());
        assert!(db.get_cached_items().await.unwrap().is_empty());

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.fetch_errors, 1);
        assert_eq!(snapshot.cycles_completed, 1);
    }

    #[tokio::test]
    async fn test_failed_item_does_not_abort_cycle() {
        let marketplace = Arc::new(FakeMarketplace::with(
            vec![item("A", "a", "a"), item("B", "b", "b"), item("C", "c", "c")],
            vec![listing("A", "LA", 1), listing("B", "LB", 2), listing("C", "LC", 3)],
        ));
        marketplace.fail_item("B");
        let notifier = Arc::new(RecordingNotifier::default());
        let (checker, db) = checker(marketplace, notifier.clone()).await;

        let report = checker.check_now(Trigger::Manual).await.unwrap();
        assert_eq!(report.new_listings, 2);
        assert_eq!(report.items_checked, 2);
        assert_eq!(report.items_failed, 1);
        assert!(db.record_exists("A", "LA").await.unwrap());
        assert!(!db.record_exists("B", "LB").await.unwrap());
        assert!(db.record_exists("C", "LC").await.unwrap());
    }

    #[tokio::test]
    async fn test_delivery_failure_still_marks_seen() {
        let marketplace = Arc::new(FakeMarketplace::with(
            vec![item("100", "Artist", "Title")],
            vec![listing("100", "L1", 10)],
        ));
        let notifier = Arc::new(RecordingNotifier {
            fail: true,
            ..Default::default()
        });
        let (checker, db) = checker(marketplace, notifier.clone()).await;

        let report = checker.check_now(Trigger::Manual).await.unwrap();
        assert_eq!(report.new_listings, 1);
        assert_eq!(report.delivery_failures, 1);
        assert!(db.record_exists("100", "L1").await.unwrap());

        // No retry on the next cycle
        checker.check_now(Trigger::Interval).await.unwrap();
        assert_eq!(notifier.messages().len(), 1);
    }

    #[tokio::test]
    async fn test_storage_failures_are_swallowed() {
        let marketplace = Arc::new(FakeMarketplace::with(
            vec![item("1", "A", "One"), item("2", "B", "Two")],
            vec![listing("1", "L1", 5), listing("2", "L2", 6)],
        ));
        let notifier = Arc::new(RecordingNotifier::default());
        let store = Arc::new(ReadOnlyStore::default());
        let checker = WantlistChecker::new(store.clone(), marketplace, notifier.clone(), Metrics::new());

        let report = checker.check_now(Trigger::Manual).await.unwrap();
        assert_eq!(report.new_listings, 2);
        assert_eq!(report.storage_errors, 4);
        assert_eq!(store.writes_attempted.load(std::sync::atomic::Ordering::SeqCst), 4);
        assert_eq!(notifier.messages().len(), 2);
    }

    #[tokio::test]
    async fn test_overlapping_check_is_rejected() {
        let gate = Arc::new(Notify::new());
        let marketplace = Arc::new(FakeMarketplace {
            gate: Some(gate.clone()),
            ..FakeMarketplace::with(vec![item("1", "A", "One")], vec![listing("1", "L1", 5)])
        });
        let notifier = Arc::new(RecordingNotifier::default());
        let (checker, _db) = checker(marketplace.clone(), notifier.clone()).await;
        let checker = Arc::new(checker);

        let running = {
            let checker = checker.clone();
            tokio::spawn(async move { checker.check_now(Trigger::Interval).await })
        };

        while marketplace.calls() == 0 {
            tokio::task::yield_now().await;
        }
        assert!(checker.is_running());
        assert_eq!(
            checker.check_now(Trigger::Manual).await,
            Err(CheckError::AlreadyRunning)
        );

        gate.notify_one();
        let report = running.await.unwrap().unwrap();
        assert_eq!(report.new_listings, 1);
        assert!(!checker.is_running());
        assert_eq!(notifier.messages().len(), 1);
    }
}
