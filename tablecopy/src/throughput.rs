//! Passive throughput accounting for a pipeline stage.
//!
//! [`ThroughputStream`] forwards every element unchanged and, once per second,
//! logs how many successful elements passed through, an exponential moving
//! average of that per-interval count, and the all-time average. One final
//! report is emitted when the stream terminates, on both the clean and the
//! error path, so the tail of a run is never lost.

use core::pin::Pin;
use core::task::{Context, Poll};
use std::time::Duration;

use futures::Stream;
use pin_project_lite::pin_project;
use tokio::time::{Instant, Interval, interval_at};
use tracing::info;

/// How often a throughput line is emitted.
const REPORT_INTERVAL: Duration = Duration::from_secs(1);

/// Smoothing factor of the per-interval exponential moving average.
const EMA_ALPHA: f64 = 0.5;

/// Accumulates element counts for one observed stage.
///
/// `total`, `ema` and `ticks` persist for the life of the reporter; only the
/// per-interval counter resets after each report.
#[derive(Debug)]
pub struct ThroughputReporter {
    label: String,
    total: u64,
    window: u64,
    ema: f64,
    ticks: u64,
}

impl ThroughputReporter {
    /// Creates a reporter identified by `label` in its log lines.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            total: 0,
            window: 0,
            ema: 0.0,
            ticks: 0,
        }
    }

    /// Counts one element.
    pub fn record(&mut self) {
        self.window += 1;
        self.total += 1;
    }

    /// Emits one report line and resets the per-interval counter.
    pub fn report(&mut self) {
        self.ticks += 1;
        self.ema = EMA_ALPHA * self.window as f64 + (1.0 - EMA_ALPHA) * self.ema;
        let avg = self.total as f64 / self.ticks as f64;

        info!(
            stage = %self.label,
            rate = self.window,
            total = self.total,
            ema = self.ema,
            avg,
            "throughput"
        );

        self.window = 0;
    }

    /// Returns the all-time element count.
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Returns the current exponential moving average of per-interval counts.
    pub fn ema(&self) -> f64 {
        self.ema
    }

    /// Returns how many reports have been emitted.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }
}

pin_project! {
    /// Transparent pass-through stage counting successful elements.
    ///
    /// The report timer is owned by the stage: it ticks while the stage is
    /// polled and dies with it, so neither a dangling timer nor a lost final
    /// measurement is possible.
    #[must_use = "streams do nothing unless polled"]
    #[derive(Debug)]
    pub struct ThroughputStream<S> {
        #[pin]
        stream: S,
        reporter: ThroughputReporter,
        timer: Interval,
        finished: bool,
    }
}

impl<S> ThroughputStream<S> {
    /// Wraps `stream`, reporting under `label`.
    pub fn wrap(stream: S, label: impl Into<String>) -> Self {
        let now = Instant::now();

        Self {
            stream,
            reporter: ThroughputReporter::new(label),
            timer: interval_at(now + REPORT_INTERVAL, REPORT_INTERVAL),
            finished: false,
        }
    }

    /// Returns the underlying accumulator, mostly for inspection in tests.
    pub fn reporter(&self) -> &ThroughputReporter {
        &self.reporter
    }
}

impl<T, E, S> Stream for ThroughputStream<S>
where
    S: Stream<Item = Result<T, E>>,
{
    type Item = Result<T, E>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();

        if !*this.finished {
            while this.timer.poll_tick(cx).is_ready() {
                this.reporter.report();
            }
        }

        match this.stream.poll_next(cx) {
            Poll::Ready(Some(Ok(element))) => {
                if !*this.finished {
                    this.reporter.record();
                }
                Poll::Ready(Some(Ok(element)))
            }
            Poll::Ready(Some(Err(err))) => {
                if !*this.finished {
                    this.reporter.report();
                    *this.finished = true;
                }
                Poll::Ready(Some(Err(err)))
            }
            Poll::Ready(None) => {
                if !*this.finished {
                    this.reporter.report();
                    *this.finished = true;
                }
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CopyError;
    use futures::{StreamExt, stream};
    use std::pin::pin;

    #[tokio::test]
    async fn forwards_all_elements_unchanged() {
        let source = stream::iter((0..5).map(Ok::<_, CopyError>));
        let mut observed = pin!(ThroughputStream::wrap(source, "test"));

        let mut seen = Vec::new();
        while let Some(element) = observed.next().await {
            seen.push(element.unwrap());
        }

        assert_eq!(seen, vec![0, 1, 2, 3, 4]);
        assert_eq!(observed.reporter().total(), 5);
        // Final report only, since no full interval elapsed.
        assert_eq!(observed.reporter().ticks(), 1);
        assert!((observed.reporter().ema() - 2.5).abs() < f64::EPSILON);
    }

    #[tokio::test(start_paused = true)]
    async fn reports_each_interval_and_once_at_the_end() {
        let source = stream::iter(0..3).then(|i| async move {
            tokio::time::sleep(Duration::from_millis(600)).await;
            Ok::<_, CopyError>(i)
        });
        let mut observed = pin!(ThroughputStream::wrap(source, "test"));

        while let Some(element) = observed.next().await {
            element.unwrap();
        }

        // One periodic report at the one-second mark plus the final one.
        assert_eq!(observed.reporter().ticks(), 2);
        assert_eq!(observed.reporter().total(), 3);
    }

    #[tokio::test]
    async fn error_triggers_the_final_report_and_is_forwarded() {
        let source = stream::iter(vec![
            Ok(1),
            Err(CopyError::from((
                crate::error::ErrorKind::SourceScanFailed,
                "scan failed",
            ))),
        ]);
        let mut observed = pin!(ThroughputStream::wrap(source, "test"));

        assert!(observed.next().await.unwrap().is_ok());
        assert!(observed.next().await.unwrap().is_err());

        assert_eq!(observed.reporter().ticks(), 1);
        assert_eq!(observed.reporter().total(), 1);
    }
}
