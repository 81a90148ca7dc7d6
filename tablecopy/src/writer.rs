//! Rate-limited, batching write stage with retry-until-accepted semantics.

use std::time::Duration;

use futures::{Stream, StreamExt};
use rand::Rng;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::bail;
use crate::clients::TableDestination;
use crate::concurrency::rate_limit::RateLimitStream;
use crate::concurrency::stream::BatchStream;
use crate::error::{CopyResult, ErrorKind};
use crate::types::{Batch, Item, WriteEnvelope};

/// Upper bound on simultaneously in-flight batch writes.
pub const MAX_CONCURRENT_BATCH_WRITES: usize = 100;

/// Deterministic backoff base for a batch's first retry.
const BACKOFF_BASE_MS: u64 = 100;

/// Upper bound of the uniform jitter added to every backoff.
const BACKOFF_JITTER_MS: u64 = 100;

/// Stream-transforming write stage: items in, accepted batches out.
///
/// Each element is admitted through a token bucket at the configured rate,
/// grouped into batches of up to [`Batch::MAX_SIZE`], and written with at most
/// [`MAX_CONCURRENT_BATCH_WRITES`] batches in flight. A batch is emitted
/// downstream only once the destination has accepted every item in it; the
/// completion order of batches is not the submission order.
#[derive(Debug)]
pub struct BatchWriter<D> {
    destination: D,
    table: String,
    rate_per_second: u32,
}

impl<D> BatchWriter<D>
where
    D: TableDestination + Clone + Send + Sync + 'static,
{
    /// Creates a write stage against `table`. A rate of zero is a
    /// configuration error.
    pub fn new(
        destination: D,
        table: impl Into<String>,
        rate_per_second: u32,
    ) -> CopyResult<Self> {
        if rate_per_second == 0 {
            bail!(
                ErrorKind::ConfigError,
                "Write rate must be at least one item per second"
            );
        }

        Ok(Self {
            destination,
            table: table.into(),
            rate_per_second,
        })
    }

    /// Transforms a stream of items into a stream of accepted batches.
    ///
    /// The first fatal error from upstream or from the destination is
    /// surfaced as an element of the output stream; abandoning the output
    /// stream at that point drops all in-flight work.
    pub fn write_stream<S>(self, items: S) -> impl Stream<Item = CopyResult<Batch>> + Send
    where
        S: Stream<Item = CopyResult<Item>> + Send + 'static,
    {
        let Self {
            destination,
            table,
            rate_per_second,
        } = self;

        let limited = RateLimitStream::wrap(items, rate_per_second);
        let batched = BatchStream::wrap(limited, Batch::MAX_SIZE);

        batched
            .map(move |group| {
                let destination = destination.clone();
                let table = table.clone();

                async move {
                    // A scan error travels through the limiter and batcher as
                    // an element; it fails its batch here and thereby the run.
                    let items = group.into_iter().collect::<CopyResult<Vec<_>>>()?;
                    let batch = Batch::new(items)?;
                    deliver_batch(&destination, &table, batch).await
                }
            })
            .buffer_unordered(MAX_CONCURRENT_BATCH_WRITES)
    }
}

/// Writes one batch until the destination has accepted every item.
///
/// Retryable call failures leave the whole pending set unprocessed; a
/// non-retryable failure aborts immediately. There is deliberately no attempt
/// ceiling: a batch keeps retrying until it is accepted or fatally rejected.
async fn deliver_batch<D: TableDestination>(
    destination: &D,
    table: &str,
    batch: Batch,
) -> CopyResult<Batch> {
    let batch_id = batch.id();
    let mut attempt: u32 = 0;
    let mut pending = batch.write_requests();

    loop {
        let outcome = destination
            .write_batch(WriteEnvelope::new(table, pending.clone()))
            .await;

        let unprocessed = match outcome {
            Ok(unprocessed) => unprocessed,
            Err(err) if err.is_retryable() => {
                warn!(
                    batch = %batch_id,
                    attempt,
                    error = %err,
                    "batch write call failed, keeping the whole batch unprocessed"
                );
                pending.clone()
            }
            Err(err) => return Err(err),
        };

        if unprocessed.is_empty() {
            debug!(
                batch = %batch_id,
                items = batch.len(),
                attempts = attempt + 1,
                "batch fully accepted"
            );
            return Ok(batch);
        }

        let backoff = backoff_delay(attempt);
        warn!(
            batch = %batch_id,
            attempt,
            unprocessed = unprocessed.len(),
            backoff_ms = backoff.as_millis() as u64,
            "destination left items unprocessed, backing off"
        );

        pending = unprocessed;
        attempt += 1;
        sleep(backoff).await;
    }
}

/// Deterministic component of the backoff for the given attempt.
fn base_backoff_ms(attempt: u32) -> u64 {
    BACKOFF_BASE_MS.saturating_mul(2u64.saturating_pow(attempt))
}

/// Full backoff: exponential base plus uniform jitter.
fn backoff_delay(attempt: u32) -> Duration {
    let jitter = rand::thread_rng().gen_range(0..=BACKOFF_JITTER_MS);
    Duration::from_millis(base_backoff_ms(attempt).saturating_add(jitter))
}
