//! Stream adapters for the copy pipeline.

use core::pin::Pin;
use core::task::{Context, Poll};

use futures::Stream;
use pin_project_lite::pin_project;

pin_project! {
    /// A stream adapter that groups consecutive elements into fixed-size
    /// batches.
    ///
    /// A batch is emitted as soon as it reaches `max_size`; when the inner
    /// stream ends, any buffered remainder is emitted as a final short batch.
    /// There is no time-based flushing: the downstream writer drains whatever
    /// the rate limiter lets through, so a partially-filled batch only ever
    /// waits on upstream progress.
    #[must_use = "streams do nothing unless polled"]
    #[derive(Debug)]
    pub struct BatchStream<B, S: Stream<Item = B>> {
        #[pin]
        stream: S,
        items: Vec<B>,
        max_size: usize,
        inner_stream_ended: bool,
    }
}

impl<B, S: Stream<Item = B>> BatchStream<B, S> {
    /// Creates a new [`BatchStream`] emitting batches of up to `max_size`
    /// elements.
    pub fn wrap(stream: S, max_size: usize) -> Self {
        Self {
            stream,
            items: Vec::new(),
            max_size: max_size.max(1),
            inner_stream_ended: false,
        }
    }
}

impl<B, S: Stream<Item = B>> Stream for BatchStream<B, S> {
    type Item = Vec<B>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();

        if *this.inner_stream_ended {
            return Poll::Ready(None);
        }

        loop {
            match this.stream.as_mut().poll_next(cx) {
                Poll::Ready(Some(item)) => {
                    if this.items.is_empty() {
                        this.items.reserve_exact(*this.max_size);
                    }
                    this.items.push(item);

                    if this.items.len() >= *this.max_size {
                        return Poll::Ready(Some(std::mem::take(this.items)));
                    }
                }
                Poll::Ready(None) => {
                    *this.inner_stream_ended = true;

                    return if this.items.is_empty() {
                        Poll::Ready(None)
                    } else {
                        Poll::Ready(Some(std::mem::take(this.items)))
                    };
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use futures::stream;
    use std::pin::pin;

    #[tokio::test]
    async fn groups_elements_into_full_batches_with_a_short_tail() {
        let mut batches = pin!(BatchStream::wrap(stream::iter(0..7), 3));

        assert_eq!(batches.next().await, Some(vec![0, 1, 2]));
        assert_eq!(batches.next().await, Some(vec![3, 4, 5]));
        assert_eq!(batches.next().await, Some(vec![6]));
        assert_eq!(batches.next().await, None);
    }

    #[tokio::test]
    async fn exact_multiple_emits_no_empty_tail() {
        let mut batches = pin!(BatchStream::wrap(stream::iter(0..6), 3));

        assert_eq!(batches.next().await, Some(vec![0, 1, 2]));
        assert_eq!(batches.next().await, Some(vec![3, 4, 5]));
        assert_eq!(batches.next().await, None);
    }

    #[tokio::test]
    async fn empty_stream_yields_no_batches() {
        let mut batches = pin!(BatchStream::wrap(stream::iter(Vec::<u8>::new()), 3));
        assert_eq!(batches.next().await, None);
    }
}
