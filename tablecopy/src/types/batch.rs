use std::fmt;

use uuid::Uuid;

use crate::bail;
use crate::error::{CopyResult, ErrorKind};
use crate::types::{Item, WriteRequest};

/// Correlation identifier attached to a batch for the lifetime of its write
/// attempts. Only used in diagnostics.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct BatchId(Uuid);

impl BatchId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

/// An ordered group of items submitted together to the write API.
///
/// A batch is never empty and never exceeds [`Batch::MAX_SIZE`] items, the
/// safe ceiling mirroring the backend's batch-write limit.
#[derive(Debug, Clone)]
pub struct Batch {
    id: BatchId,
    items: Vec<Item>,
}

impl Batch {
    /// Maximum number of items a single batch may carry.
    pub const MAX_SIZE: usize = 25;

    /// Creates a batch from a non-empty group of at most [`Batch::MAX_SIZE`] items.
    pub fn new(items: Vec<Item>) -> CopyResult<Self> {
        if items.is_empty() {
            bail!(ErrorKind::ValidationError, "Batch must not be empty");
        }
        if items.len() > Self::MAX_SIZE {
            bail!(
                ErrorKind::ValidationError,
                "Batch exceeds maximum size",
                format!("{} items, maximum is {}", items.len(), Self::MAX_SIZE)
            );
        }

        Ok(Self {
            id: BatchId::new(),
            items,
        })
    }

    /// Returns the correlation id of this batch.
    pub fn id(&self) -> BatchId {
        self.id
    }

    /// Returns the number of items in this batch.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// A batch is constructed non-empty, so this is always false; provided for
    /// API completeness.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Returns the items in this batch, in submission order.
    pub fn items(&self) -> &[Item] {
        &self.items
    }

    /// Consumes the batch, returning its items.
    pub fn into_items(self) -> Vec<Item> {
        self.items
    }

    /// Builds the put-request set for this batch, preserving item order.
    pub fn write_requests(&self) -> Vec<WriteRequest> {
        self.items.iter().cloned().map(WriteRequest::put).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AttributeValue;

    fn item(key: &str) -> Item {
        Item::new().with_attribute("pk", AttributeValue::string(key))
    }

    #[test]
    fn rejects_empty_batches() {
        let err = Batch::new(Vec::new()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationError);
    }

    #[test]
    fn rejects_oversized_batches() {
        let items = (0..=Batch::MAX_SIZE).map(|i| item(&i.to_string())).collect();
        let err = Batch::new(items).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationError);
    }

    #[test]
    fn preserves_item_order_in_write_requests() {
        let items: Vec<_> = (0..3).map(|i| item(&i.to_string())).collect();
        let batch = Batch::new(items.clone()).unwrap();

        let requests = batch.write_requests();
        assert_eq!(requests.len(), 3);
        for (request, original) in requests.iter().zip(&items) {
            assert_eq!(request.item(), original);
        }
    }
}
