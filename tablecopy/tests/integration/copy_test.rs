use std::collections::BTreeSet;

use futures::TryStreamExt;
use tablecopy::clients::memory::MemoryTable;
use tablecopy::error::ErrorKind;
use tablecopy::pipeline::{CopyConfig, CopyPipeline};
use tablecopy::scanner::scan_segment;
use tablecopy::test_utils::faulty::{FlakyDestination, WriteOutcome};
use tablecopy::test_utils::{init_test_tracing, numbered_items, seeded_memory_table};
use tablecopy::types::{Item, SegmentDescriptor};

fn config(rate_per_second: u32, parallelism: u32) -> CopyConfig {
    CopyConfig {
        source_table: "source".to_string(),
        target_table: "target".to_string(),
        rate_per_second,
        parallelism,
    }
}

async fn empty_target() -> MemoryTable {
    let service = MemoryTable::new("pk");
    service.create_table("target").await;
    service
}

fn key_set(items: &[Item]) -> BTreeSet<String> {
    items
        .iter()
        .map(|item| item.key_string("pk").expect("items carry the pk attribute"))
        .collect()
}

#[tokio::test(start_paused = true)]
async fn copies_every_item_exactly_once_across_segments() {
    init_test_tracing();

    let source = seeded_memory_table("source", numbered_items(10)).await;
    let target = FlakyDestination::wrap(empty_target().await);

    let pipeline = CopyPipeline::new(config(10, 4), source.clone(), target.clone()).unwrap();
    let stats = pipeline.copy().await.unwrap();

    assert_eq!(stats.items_copied, 10);

    // Set equality between source and target; cross-segment order is
    // unspecified by design.
    let source_items = source.items("source").await.unwrap();
    let target_items = target.destination().items("target").await.unwrap();
    assert_eq!(key_set(&source_items), key_set(&target_items));

    // Each item was handed to the destination exactly once.
    assert_eq!(target.items_written().await, 10);
}

#[tokio::test(start_paused = true)]
async fn copied_corpus_round_trips_through_the_scanner() {
    init_test_tracing();

    let source = seeded_memory_table("source", numbered_items(37)).await;
    let target = empty_target().await;

    let pipeline = CopyPipeline::new(config(100, 3), source.clone(), target.clone()).unwrap();
    pipeline.copy().await.unwrap();

    // Read the target back through the same segmented scanner the copy uses.
    let mut read_back = Vec::new();
    for index in 0..3 {
        let segment = SegmentDescriptor::new(index, 3).unwrap();
        let items: Vec<Item> = scan_segment(target.clone().with_page_size(4), "target", segment)
            .try_collect()
            .await
            .unwrap();
        read_back.extend(items);
    }

    let source_items = source.items("source").await.unwrap();
    assert_eq!(key_set(&source_items), key_set(&read_back));
}

#[tokio::test(start_paused = true)]
async fn empty_source_table_completes_with_no_writes() {
    init_test_tracing();

    let source = seeded_memory_table("source", Vec::new()).await;
    let target = FlakyDestination::wrap(empty_target().await);

    let pipeline = CopyPipeline::new(config(10, 4), source, target.clone()).unwrap();
    let stats = pipeline.copy().await.unwrap();

    assert_eq!(stats.items_copied, 0);
    assert_eq!(stats.batches_written, 0);
    assert_eq!(target.write_calls().await, 0);
}

#[tokio::test(start_paused = true)]
async fn partially_failed_batch_is_retried_to_completion() {
    init_test_tracing();

    let source = seeded_memory_table("source", numbered_items(25)).await;
    let target = FlakyDestination::wrap(empty_target().await);
    target
        .script([WriteOutcome::Unprocessed(2), WriteOutcome::Accept])
        .await;

    let pipeline = CopyPipeline::new(config(1_000, 1), source, target.clone()).unwrap();
    let stats = pipeline.copy().await.unwrap();

    assert_eq!(stats.items_copied, 25);
    assert_eq!(stats.batches_written, 1);
    assert_eq!(target.write_calls().await, 2);
    assert_eq!(target.items_written().await, 25);
}

#[tokio::test(start_paused = true)]
async fn non_retryable_write_error_fails_the_copy() {
    init_test_tracing();

    let source = seeded_memory_table("source", numbered_items(200)).await;
    let target = FlakyDestination::wrap(empty_target().await);
    target.script([WriteOutcome::FatalError]).await;

    let pipeline = CopyPipeline::new(config(10_000, 4), source, target.clone()).unwrap();
    let err = pipeline.copy().await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::DestinationWriteFailed);
}

#[tokio::test(start_paused = true)]
async fn scan_error_fails_the_whole_copy() {
    init_test_tracing();

    // Source service without the table: every segment scan fails.
    let source = MemoryTable::new("pk");
    let target = empty_target().await;

    let pipeline = CopyPipeline::new(config(10, 4), source, target).unwrap();
    let err = pipeline.copy().await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::SourceTableMissing);
}

#[tokio::test(start_paused = true)]
async fn throttled_calls_delay_but_do_not_fail_the_copy() {
    init_test_tracing();

    let source = seeded_memory_table("source", numbered_items(5)).await;
    let target = FlakyDestination::wrap(empty_target().await);
    target
        .script([WriteOutcome::RetryableError, WriteOutcome::RetryableError])
        .await;

    let pipeline = CopyPipeline::new(config(1_000, 2), source, target.clone()).unwrap();
    let stats = pipeline.copy().await.unwrap();

    assert_eq!(stats.items_copied, 5);
    assert_eq!(target.items_written().await, 5);
    assert!(target.write_calls().await >= 3);
}
