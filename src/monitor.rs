use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::Instrument;
use uuid::Uuid;

use crate::listing_extractor::ListingExtractor;
use crate::models::{partition_rules, ExtractionRule, Listing};
use crate::novelty::detect_new;
use crate::plugins::{DispatchReport, NotificationDispatcher, NotificationEvent};
use crate::storage::{RuleSource, SnapshotStore};

#[derive(Debug, Clone, Serialize)]
pub struct StoreOutcome {
    pub store_name: String,
    pub listings_found: usize,
    pub error: Option<String>,
}

impl StoreOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub cycle_id: Uuid,
    pub stores: Vec<StoreOutcome>,
    pub rejected_rules: usize,
    pub listings_seen: usize,
    pub new_listings: Vec<Listing>,
    pub dispatch: Option<DispatchReport>,
    pub snapshot_persisted: bool,
    pub total_time_ms: u64,
}

impl CycleReport {
    pub fn failed_stores(&self) -> Vec<&StoreOutcome> {
        self.stores.iter().filter(|s| !s.is_success()).collect()
    }
}

/// Runs one scrape → diff → notify → persist pass over every configured store.
pub struct ListingMonitor {
    rules: Arc<dyn RuleSource>,
    snapshot: Arc<dyn SnapshotStore>,
    extractor: ListingExtractor,
    dispatcher: NotificationDispatcher,
    max_concurrent_stores: usize,
}

impl ListingMonitor {
    pub fn new(
        rules: Arc<dyn RuleSource>,
        snapshot: Arc<dyn SnapshotStore>,
        extractor: ListingExtractor,
        dispatcher: NotificationDispatcher,
    ) -> Self {
        Self {
            rules,
            snapshot,
            extractor,
            dispatcher,
            max_concurrent_stores: 1,
        }
    }

    pub fn with_max_concurrent_stores(mut self, max: usize) -> Self {
        self.max_concurrent_stores = max.max(1);
        self
    }

    pub async fn run_cycle(&self) -> CycleReport {
        let cycle_id = Uuid::new_v4();
        let span = tracing::info_span!("cycle", %cycle_id);
        self.run_cycle_inner(cycle_id).instrument(span).await
    }

    async fn run_cycle_inner(&self, cycle_id: Uuid) -> CycleReport {
        let start_time = Instant::now();
        metrics::counter!("shopwatch_cycles_total").increment(1);
        tracing::info!("Checking all stores for new listings");

        let rules = self.load_rules();
        let (rules, rejected) = partition_rules(rules);
        for rule in &rejected {
            tracing::error!(store = %rule.store_name, "Skipping invalid extraction rule: {}", rule.reason);
        }

        let snapshot = self.load_snapshot();

        let results: Vec<(StoreOutcome, Vec<Listing>)> = stream::iter(rules.iter())
            .map(|rule| self.extract_store(rule))
            .buffered(self.max_concurrent_stores)
            .collect()
            .await;

        let mut stores = Vec::with_capacity(results.len());
        let mut current = Vec::new();
        for (outcome, listings) in results {
            stores.push(outcome);
            current.extend(listings);
        }

        let new_listings = detect_new(&current, &snapshot);
        let mut report = CycleReport {
            cycle_id,
            stores,
            rejected_rules: rejected.len(),
            listings_seen: current.len(),
            new_listings: new_listings.clone(),
            dispatch: None,
            snapshot_persisted: false,
            total_time_ms: 0,
        };

        if new_listings.is_empty() {
            tracing::info!(listings = current.len(), "No new listings");
        } else {
            tracing::info!(new = new_listings.len(), listings = current.len(), "New listings found");
            metrics::counter!("shopwatch_listings_new_total").increment(new_listings.len() as u64);

            let event = NotificationEvent::new(cycle_id, new_listings);
            if self.dispatcher.is_empty() {
                tracing::warn!("No notification channels enabled");
            }
            report.dispatch = Some(self.dispatcher.dispatch(&event).await);

            match self.snapshot.save(&current) {
                Ok(()) => report.snapshot_persisted = true,
                Err(e) => tracing::error!("Failed to persist snapshot: {}", e),
            }
        }

        report.total_time_ms = start_time.elapsed().as_millis() as u64;
        report
    }

    async fn extract_store(&self, rule: &ExtractionRule) -> (StoreOutcome, Vec<Listing>) {
        tracing::info!(store = %rule.store_name, "Scraping store");

        match self.extractor.extract(rule).await {
            Ok(listings) => (
                StoreOutcome {
                    store_name: rule.store_name.clone(),
                    listings_found: listings.len(),
                    error: None,
                },
                listings,
            ),
            Err(e) => {
                tracing::error!(store = %rule.store_name, "Extraction failed: {}", e);
                metrics::counter!("shopwatch_store_failures_total", "store" => rule.store_name.clone()).increment(1);
                (
                    StoreOutcome {
                        store_name: rule.store_name.clone(),
                        listings_found: 0,
                        error: Some(e.to_string()),
                    },
                    Vec::new(),
                )
            }
        }
    }

    fn load_rules(&self) -> Vec<ExtractionRule> {
        self.rules.load_rules().unwrap_or_else(|e| {
            tracing::warn!("Failed to load extraction rules, treating as empty: {}", e);
            Vec::new()
        })
    }

    fn load_snapshot(&self) -> Vec<Listing> {
        self.snapshot.load().unwrap_or_else(|e| {
            tracing::warn!("Failed to load snapshot, treating as empty: {}", e);
            Vec::new()
        })
    }
}
