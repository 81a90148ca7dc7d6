//! Lazy segmented scan of one source-table partition.

use futures::Stream;
use futures::stream::{self, TryStreamExt};
use tracing::debug;

use crate::clients::TableSource;
use crate::error::{CopyError, CopyResult};
use crate::types::{Item, SegmentDescriptor};

struct ScanState<S> {
    source: S,
    table: String,
    segment: SegmentDescriptor,
    exhausted: bool,
}

/// Produces a finite, non-restartable lazy stream of the items in one segment.
///
/// Pages are fetched back to back with no delay at this layer; flow control
/// happens downstream at the writer. The segment descriptor's cursor is
/// updated in place after every page; an absent cursor in a response ends the
/// stream cleanly after its items are emitted, and a read error is surfaced
/// once, after which no further pages are requested. A segment with zero items
/// yields an empty stream.
pub fn scan_segment<S>(
    source: S,
    table: impl Into<String>,
    segment: SegmentDescriptor,
) -> impl Stream<Item = CopyResult<Item>> + Send
where
    S: TableSource + Send + Sync + 'static,
{
    let state = ScanState {
        source,
        table: table.into(),
        segment,
        exhausted: false,
    };

    stream::try_unfold(state, |mut state| async move {
        if state.exhausted {
            return Ok::<_, CopyError>(None);
        }

        let page = state.source.scan_page(&state.table, &state.segment).await?;
        state.segment.advance(page.cursor);

        if state.segment.cursor().is_none() {
            state.exhausted = true;
            debug!(
                table = %state.table,
                segment = state.segment.index(),
                "segment exhausted"
            );
        }

        let items = stream::iter(page.items.into_iter().map(Ok::<_, CopyError>));
        Ok(Some((items, state)))
    })
    .try_flatten()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::{ScanPage, memory::MemoryTable};
    use crate::error::ErrorKind;
    use crate::test_utils::{numbered_items, seeded_memory_table};
    use futures::StreamExt;
    use std::collections::VecDeque;
    use std::pin::pin;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    /// Source stub replaying a fixed sequence of pages.
    #[derive(Debug, Clone)]
    struct ScriptedSource {
        pages: Arc<Mutex<VecDeque<ScanPage>>>,
    }

    impl ScriptedSource {
        fn new(pages: impl IntoIterator<Item = ScanPage>) -> Self {
            Self {
                pages: Arc::new(Mutex::new(pages.into_iter().collect())),
            }
        }
    }

    impl TableSource for ScriptedSource {
        async fn scan_page(
            &self,
            _table: &str,
            _segment: &SegmentDescriptor,
        ) -> CopyResult<ScanPage> {
            let mut pages = self.pages.lock().await;
            Ok(pages.pop_front().unwrap_or(ScanPage {
                items: Vec::new(),
                cursor: None,
            }))
        }
    }

    #[tokio::test]
    async fn emits_every_item_across_pages() {
        let service = seeded_memory_table("source", numbered_items(9)).await;
        let service = service.with_page_size(2);
        let segment = SegmentDescriptor::new(0, 1).unwrap();

        let items: Vec<Item> = scan_segment(service, "source", segment)
            .try_collect()
            .await
            .unwrap();

        assert_eq!(items.len(), 9);
    }

    #[tokio::test]
    async fn empty_segment_terminates_cleanly() {
        let service = seeded_memory_table("source", Vec::new()).await;
        let segment = SegmentDescriptor::new(0, 1).unwrap();

        let items: Vec<Item> = scan_segment(service, "source", segment)
            .try_collect()
            .await
            .unwrap();

        assert!(items.is_empty());
    }

    #[tokio::test]
    async fn read_error_is_surfaced_once_and_ends_the_stream() {
        let service = MemoryTable::new("pk");
        let segment = SegmentDescriptor::new(0, 1).unwrap();

        let mut scan = pin!(scan_segment(service, "missing", segment));

        let err = scan.next().await.unwrap().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SourceTableMissing);
        assert!(scan.next().await.is_none());
    }

    #[tokio::test]
    async fn trailing_cursor_with_empty_final_page_still_terminates() {
        let pages = [
            ScanPage {
                items: numbered_items(2),
                cursor: Some(crate::test_utils::keyed_item("1")),
            },
            ScanPage {
                items: Vec::new(),
                cursor: None,
            },
        ];
        let segment = SegmentDescriptor::new(0, 1).unwrap();

        let items: Vec<Item> = scan_segment(ScriptedSource::new(pages), "source", segment)
            .try_collect()
            .await
            .unwrap();

        assert_eq!(items.len(), 2);
    }
}
