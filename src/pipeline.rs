//! One tick of fetch → deduplicate → persist, and the loop that repeats it.
//!
//! A tick never fails because of the endpoint: fetch errors become
//! [`TickOutcome::FetchFailed`]. Only a failed write comes back as `Err`,
//! since a collection that was not saved must not be reported as stored.
//!
//! The repeating loop checks for shutdown between ticks only. A signal that
//! arrives mid-tick is picked up as soon as that tick has finished.

use crate::config::RunMode;
use crate::errors::{FetchError, StoreError};
use crate::fetcher::{HttpFetcher, ItemFetcher, RetryFetch};
use crate::models::{FetchedItem, Record};
use crate::store::Store;
use crate::utils::preview;
use tokio::sync::Notify;
use tokio::time::sleep;
use tracing::{error, info, instrument, warn};

/// Where a tick's item comes from.
pub enum ItemSource {
    Http(RetryFetch<HttpFetcher>),
    /// Same item every tick, no network.
    Fixed(FetchedItem),
}

impl ItemFetcher for ItemSource {
    async fn fetch(&self) -> Result<FetchedItem, FetchError> {
        match self {
            ItemSource::Http(fetcher) => fetcher.fetch().await,
            ItemSource::Fixed(item) => Ok(item.clone()),
        }
    }
}

#[derive(Debug)]
pub enum TickOutcome {
    /// New item, appended and saved.
    Added(Record),
    /// Already collected; holds the unsaved candidate.
    Duplicate(Record),
    FetchFailed(FetchError),
}

/// Counters over a whole run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub ticks: u64,
    pub added: u64,
    pub duplicates: u64,
    /// Fetch failures plus failed writes.
    pub failures: u64,
}

impl RunSummary {
    fn record(&mut self, outcome: &Result<TickOutcome, StoreError>) {
        self.ticks += 1;
        match outcome {
            Ok(TickOutcome::Added(_)) => self.added += 1,
            Ok(TickOutcome::Duplicate(_)) => self.duplicates += 1,
            Ok(TickOutcome::FetchFailed(_)) | Err(_) => self.failures += 1,
        }
    }
}

pub struct Collector<F> {
    fetcher: F,
    store: Store,
}

impl<F> Collector<F>
where
    F: ItemFetcher,
{
    pub fn new(fetcher: F, store: Store) -> Self {
        Self { fetcher, store }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Fetch one item and add it to the store if it is new.
    #[instrument(level = "info", skip_all, fields(path = %self.store.path().display()))]
    pub async fn tick(&self) -> Result<TickOutcome, StoreError> {
        let item = match self.fetcher.fetch().await {
            Ok(item) => item,
            Err(e) => return Ok(TickOutcome::FetchFailed(e)),
        };

        let (added, record) = self
            .store
            .add_if_unique(&item.text, item.source.as_deref())
            .await?;

        if added {
            Ok(TickOutcome::Added(record))
        } else {
            Ok(TickOutcome::Duplicate(record))
        }
    }

    /// Run ticks according to `mode` until done or `shutdown` is notified.
    ///
    /// Failed ticks are logged and counted; they never stop a repeating run.
    pub async fn run(&self, mode: &RunMode, shutdown: &Notify) -> RunSummary {
        let mut summary = RunSummary::default();

        match mode {
            RunMode::Once => {
                let outcome = self.tick().await;
                report(&outcome);
                summary.record(&outcome);
            }
            RunMode::Repeat {
                interval,
                max_ticks,
            } => loop {
                let outcome = self.tick().await;
                report(&outcome);
                summary.record(&outcome);

                if max_ticks.is_some_and(|max| summary.ticks >= max) {
                    info!(ticks = summary.ticks, "Reached tick limit");
                    break;
                }

                tokio::select! {
                    biased;
                    _ = shutdown.notified() => {
                        info!(ticks = summary.ticks, "Shutdown requested; stopping");
                        break;
                    }
                    _ = sleep(*interval) => {}
                }
            },
        }

        summary
    }
}

/// Log what a tick did.
fn report(outcome: &Result<TickOutcome, StoreError>) {
    match outcome {
        Ok(TickOutcome::Added(record)) => info!(
            text = %preview(&record.text, 120),
            source = record.source.as_deref().unwrap_or("-"),
            added_at = %record.added_at,
            "New item collected"
        ),
        Ok(TickOutcome::Duplicate(record)) => info!(
            text = %preview(&record.text, 120),
            source = record.source.as_deref().unwrap_or("-"),
            "Duplicate item; skipped"
        ),
        Ok(TickOutcome::FetchFailed(e)) => {
            warn!(error = %e, "Could not fetch an item; nothing stored this tick")
        }
        Err(StoreError::BlankText) => {
            warn!("Item text is blank after normalization; nothing stored this tick")
        }
        Err(e) => error!(error = %e, "Failed to persist collection"),
    }
}
