//! Confirmation poller.
//!
//! [`ConfirmationPoller`] runs as a background task. Each tick lists the
//! pending notes, looks their transactions up concurrently, and moves the
//! ones found on chain to `confirmed`. Lookups are read-only and commute;
//! the status writes are applied one at a time and are conditional on the
//! note still being pending with the same hash, so a racing re-attach is
//! never overwritten.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use quicknotes_cardano::{ChainIndexer, IndexerError, TxLookup};
use quicknotes_core::types::DbId;
use quicknotes_db::{NoteStore, StoreError};
use tokio_util::sync::CancellationToken;

/// Default period between ticks.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);

/// Shortest accepted period; `tokio::time::interval` panics on zero.
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Upper bound on lookups in flight at once.
const MAX_CONCURRENT_LOOKUPS: usize = 8;

/// Counts from a single tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollSummary {
    pub checked: usize,
    pub confirmed: usize,
    pub still_pending: usize,
    pub failed: usize,
}

pub struct ConfirmationPoller {
    store: Arc<dyn NoteStore>,
    indexer: Arc<dyn ChainIndexer>,
    interval: Duration,
}

impl ConfirmationPoller {
    pub fn new(store: Arc<dyn NoteStore>, indexer: Arc<dyn ChainIndexer>) -> Self {
        Self {
            store,
            indexer,
            interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval.max(MIN_POLL_INTERVAL);
        self
    }

    /// Run the poller loop until `cancel` is triggered.
    ///
    /// Errors are logged and the loop carries on with the next tick.
    pub async fn run(&self, cancel: CancellationToken) {
        tracing::info!(
            interval_secs = self.interval.as_secs(),
            "Confirmation poller started"
        );

        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Confirmation poller stopping");
                    break;
                }
                _ = interval.tick() => {
                    match self.tick().await {
                        Ok(summary) if summary.confirmed > 0 || summary.failed > 0 => {
                            tracing::info!(
                                checked = summary.checked,
                                confirmed = summary.confirmed,
                                failed = summary.failed,
                                "Confirmation poll finished"
                            );
                        }
                        Ok(summary) => {
                            tracing::debug!(checked = summary.checked, "Confirmation poll finished");
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "Confirmation poll failed to list pending notes");
                        }
                    }
                }
            }
        }
    }

    /// Check every pending note once.
    ///
    /// Only listing the pending notes can fail the tick; per-note lookup and
    /// write failures are counted and logged.
    pub async fn tick(&self) -> Result<PollSummary, StoreError> {
        let pending: Vec<(DbId, String)> = self
            .store
            .list_pending()
            .await?
            .into_iter()
            .filter_map(|note| note.tx_hash.map(|hash| (note.id, hash)))
            .collect();

        let mut summary = PollSummary {
            checked: pending.len(),
            ..PollSummary::default()
        };
        if pending.is_empty() {
            return Ok(summary);
        }

        let indexer = &self.indexer;
        let lookups: Vec<(DbId, String, Result<TxLookup, IndexerError>)> = stream::iter(pending)
            .map(|(id, hash)| async move {
                let lookup = indexer.transaction(&hash).await;
                (id, hash, lookup)
            })
            .buffer_unordered(MAX_CONCURRENT_LOOKUPS)
            .collect()
            .await;

        for (id, hash, lookup) in lookups {
            match lookup {
                Ok(TxLookup::Found { block_height }) => {
                    match self.store.mark_confirmed(id, &hash).await {
                        Ok(true) => {
                            summary.confirmed += 1;
                            tracing::info!(
                                note_id = id,
                                tx_hash = %hash,
                                block_height = ?block_height,
                                "Note proof confirmed"
                            );
                        }
                        // Re-attached or already confirmed since the listing.
                        Ok(false) => {
                            summary.still_pending += 1;
                        }
                        Err(e) => {
                            summary.failed += 1;
                            tracing::error!(note_id = id, tx_hash = %hash, error = %e, "Failed to mark note confirmed");
                        }
                    }
                }
                Ok(TxLookup::NotFound) => {
                    summary.still_pending += 1;
                    tracing::debug!(note_id = id, tx_hash = %hash, "Transaction not on chain yet");
                }
                Err(e) => {
                    summary.failed += 1;
                    tracing::warn!(note_id = id, tx_hash = %hash, error = %e, "Transaction lookup failed");
                }
            }
        }

        Ok(summary)
    }
}
