//! Fault-injecting destination wrapper for tests.

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::clients::TableDestination;
use crate::copy_error;
use crate::error::{CopyResult, ErrorKind};
use crate::types::{WriteEnvelope, WriteRequest};

/// Scripted outcome for one batch-write call.
#[derive(Debug, Clone, Copy)]
pub enum WriteOutcome {
    /// Accept every request in the call.
    Accept,
    /// Accept all but the last `n` requests and report those unprocessed.
    Unprocessed(usize),
    /// Fail the call with a retryable (throttling) error.
    RetryableError,
    /// Fail the call with a non-retryable error.
    FatalError,
}

#[derive(Debug, Default)]
struct State {
    script: VecDeque<WriteOutcome>,
    write_calls: u64,
    items_written: u64,
}

/// Wraps a [`TableDestination`], recording every write call and optionally
/// replaying a script of failure outcomes before delegating to the wrapped
/// destination. Calls beyond the script accept normally.
///
/// The unprocessed subset it fabricates preserves the submitted relative
/// order, like the real service.
#[derive(Debug, Clone)]
pub struct FlakyDestination<D> {
    destination: D,
    state: Arc<Mutex<State>>,
}

impl<D> FlakyDestination<D> {
    /// Wraps a destination with an empty script.
    pub fn wrap(destination: D) -> Self {
        Self {
            destination,
            state: Arc::new(Mutex::new(State::default())),
        }
    }

    /// Returns the wrapped destination.
    pub fn destination(&self) -> &D {
        &self.destination
    }

    /// Appends outcomes to the script, consumed one per write call.
    pub async fn script(&self, outcomes: impl IntoIterator<Item = WriteOutcome>) {
        let mut state = self.state.lock().await;
        state.script.extend(outcomes);
    }

    /// Returns how many write calls were received.
    pub async fn write_calls(&self) -> u64 {
        self.state.lock().await.write_calls
    }

    /// Returns how many items were handed to the wrapped destination.
    pub async fn items_written(&self) -> u64 {
        self.state.lock().await.items_written
    }
}

impl<D> TableDestination for FlakyDestination<D>
where
    D: TableDestination + Send + Sync,
{
    async fn write_batch(&self, envelope: WriteEnvelope) -> CopyResult<Vec<WriteRequest>> {
        let outcome = {
            let mut state = self.state.lock().await;
            state.write_calls += 1;
            state.script.pop_front().unwrap_or(WriteOutcome::Accept)
        };

        match outcome {
            WriteOutcome::Accept => {
                let submitted = envelope.len() as u64;
                let unprocessed = self.destination.write_batch(envelope).await?;

                let mut state = self.state.lock().await;
                state.items_written += submitted - unprocessed.len() as u64;

                Ok(unprocessed)
            }
            WriteOutcome::Unprocessed(rejected_count) => {
                let table = envelope.table().to_string();
                let mut accepted = envelope.into_requests();
                let keep = accepted.len().saturating_sub(rejected_count);
                let rejected = accepted.split_off(keep);

                if !accepted.is_empty() {
                    let count = accepted.len() as u64;
                    self.destination
                        .write_batch(WriteEnvelope::new(&table, accepted))
                        .await?;

                    let mut state = self.state.lock().await;
                    state.items_written += count;
                }

                Ok(rejected)
            }
            WriteOutcome::RetryableError => Err(copy_error!(
                ErrorKind::Throttled,
                "Injected throttling error"
            )),
            WriteOutcome::FatalError => Err(copy_error!(
                ErrorKind::DestinationWriteFailed,
                "Injected write failure"
            )),
        }
    }
}
