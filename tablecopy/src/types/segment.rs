use crate::bail;
use crate::error::{CopyResult, ErrorKind};
use crate::types::Item;

/// Identifies one disjoint partition of the source table assigned to a single
/// scan worker.
///
/// The cursor is absent when the segment has not been read yet and becomes
/// absent again exactly when the segment is exhausted; in between it carries
/// the opaque continuation key returned by the last page read.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentDescriptor {
    index: u32,
    total_segments: u32,
    cursor: Option<Item>,
}

impl SegmentDescriptor {
    /// Creates a descriptor for segment `index` out of `total_segments`.
    pub fn new(index: u32, total_segments: u32) -> CopyResult<Self> {
        if total_segments == 0 {
            bail!(
                ErrorKind::ConfigError,
                "Total segments must be at least one"
            );
        }
        if index >= total_segments {
            bail!(
                ErrorKind::ConfigError,
                "Segment index out of range",
                format!("index {index} with {total_segments} total segments")
            );
        }

        Ok(Self {
            index,
            total_segments,
            cursor: None,
        })
    }

    /// Returns the zero-based index of this segment.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Returns the total number of segments the table is partitioned into.
    pub fn total_segments(&self) -> u32 {
        self.total_segments
    }

    /// Returns the continuation cursor for the next page read, if any.
    pub fn cursor(&self) -> Option<&Item> {
        self.cursor.as_ref()
    }

    /// Records the continuation cursor returned by a page read. An absent
    /// cursor marks the segment as exhausted.
    pub fn advance(&mut self, cursor: Option<Item>) {
        self.cursor = cursor;
    }
}
