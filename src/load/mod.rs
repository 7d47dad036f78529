use std::time::Duration;

use log::{debug, warn};
use rand::Rng;

use crate::errors::LoadError;
use crate::store::StoreClient;
use crate::Record;

/// The store's hard upper bound on items per batch-write call.
pub const MAX_BATCH_ITEMS: usize = 25;

const MAX_COMMIT_ATTEMPTS: u32 = 10;
const BACKOFF_BASE_MS: u64 = 100;
const BACKOFF_CAP_MS: u64 = 5_000;

/// Exponential backoff with +/-50% jitter so parallel workers do not
/// retry in lockstep.
fn backoff_delay(attempt: u32) -> Duration {
    let base = BACKOFF_BASE_MS
        .saturating_mul(2u64.saturating_pow(attempt.saturating_sub(1)))
        .min(BACKOFF_CAP_MS);
    let jittered = rand::thread_rng().gen_range(base / 2..=base + base / 2);
    Duration::from_millis(jittered)
}

/// Buffers records into store-sized write batches and commits them.
///
/// [`BatchPutManager::put`] flushes automatically when the buffer reaches
/// the batch limit; the owning worker must await a final
/// [`BatchPutManager::commit`] once its input is done. A commit resubmits
/// exactly the items the store reports as unprocessed until none remain,
/// up to a bounded number of attempts. Hard store failures are not
/// retried.
pub struct BatchPutManager<C> {
    store: C,
    table: String,
    items: Vec<Record>,
}

impl<C: StoreClient> BatchPutManager<C> {
    pub fn new(store: C, table: impl Into<String>) -> Self {
        Self {
            store,
            table: table.into(),
            items: Vec::with_capacity(MAX_BATCH_ITEMS),
        }
    }

    pub fn pending(&self) -> usize {
        self.items.len()
    }

    pub async fn put(&mut self, item: Record) -> Result<(), LoadError> {
        self.items.push(item);
        if self.items.len() >= MAX_BATCH_ITEMS {
            self.commit().await?;
        }
        Ok(())
    }

    pub async fn commit(&mut self) -> Result<(), LoadError> {
        if self.items.is_empty() {
            return Ok(());
        }

        let mut pending = std::mem::take(&mut self.items);
        let mut attempt = 0u32;

        loop {
            let unprocessed = self.store.batch_put(&self.table, pending).await?;
            if unprocessed.is_empty() {
                return Ok(());
            }

            attempt += 1;
            if attempt >= MAX_COMMIT_ATTEMPTS {
                return Err(LoadError::UnprocessedRetriesExhausted {
                    attempts: attempt,
                    remaining: unprocessed.len(),
                });
            }

            debug!(
                "batch write for table '{}' left {} unprocessed items, retrying",
                self.table,
                unprocessed.len()
            );
            tokio::time::sleep(backoff_delay(attempt)).await;
            pending = unprocessed;
        }
    }
}

impl<C> Drop for BatchPutManager<C> {
    fn drop(&mut self) {
        if !self.items.is_empty() {
            warn!(
                "batch writer for table '{}' dropped with {} unflushed items",
                self.table,
                self.items.len()
            );
        }
    }
}
