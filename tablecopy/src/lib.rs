//! Rate-controlled streaming copy of one key-value table into another.
//!
//! The crate is organized around a single data path: N segmented scanners read
//! disjoint partitions of the source table in parallel, their outputs are
//! merged into one stream, and that stream is observed, throttled, batched and
//! written to the target table with bounded concurrency and per-batch retries.
//!
//! The remote table service is abstracted behind the [`clients::TableSource`]
//! and [`clients::TableDestination`] traits; [`clients::memory::MemoryTable`]
//! provides an in-process implementation for tests and development, and the
//! `dynamodb` feature enables a DynamoDB-backed one.

pub mod clients;
pub mod concurrency;
pub mod error;
mod macros;
pub mod pipeline;
pub mod scanner;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod throughput;
pub mod types;
pub mod writer;
