//! Trait seams for the remote table service.
//!
//! The pipeline only ever talks to the service through [`TableSource`] and
//! [`TableDestination`]. Implementations classify their own errors into
//! [`crate::error::ErrorKind`]s; the write-retry loop trusts that
//! classification verbatim.

use std::future::Future;

use crate::error::CopyResult;
use crate::types::{Item, SegmentDescriptor, WriteEnvelope, WriteRequest};

#[cfg(feature = "dynamodb")]
pub mod dynamodb;
pub mod memory;

/// One page of a segmented scan.
///
/// An absent cursor signals that the segment is exhausted after the page's
/// items have been emitted.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanPage {
    /// Items in the page, in the service's return order.
    pub items: Vec<Item>,
    /// Continuation cursor for the next page, if the segment has more data.
    pub cursor: Option<Item>,
}

/// A table service that can be read through parallel segmented scans.
pub trait TableSource {
    /// Fetches the next page of the given segment, resuming from the
    /// descriptor's cursor (absent on the first call).
    fn scan_page(
        &self,
        table: &str,
        segment: &SegmentDescriptor,
    ) -> impl Future<Output = CopyResult<ScanPage>> + Send;
}

/// A table service that accepts batched writes.
pub trait TableDestination {
    /// Submits a batch of put requests and returns the subset the service did
    /// not durably persist, preserving the submitted relative order. An empty
    /// return means full acceptance.
    fn write_batch(
        &self,
        envelope: WriteEnvelope,
    ) -> impl Future<Output = CopyResult<Vec<WriteRequest>>> + Send;
}
