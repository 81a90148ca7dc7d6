use crate::types::Item;

/// A single put request against the target table.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteRequest {
    item: Item,
}

impl WriteRequest {
    /// Creates a put request for the given item.
    pub fn put(item: Item) -> Self {
        Self { item }
    }

    /// Returns the item to be written.
    pub fn item(&self) -> &Item {
        &self.item
    }

    /// Consumes the request, returning the item.
    pub fn into_item(self) -> Item {
        self.item
    }
}

/// Associates a group of write requests with the target table they are
/// submitted to.
#[derive(Debug, Clone)]
pub struct WriteEnvelope {
    table: String,
    requests: Vec<WriteRequest>,
}

impl WriteEnvelope {
    /// Creates an envelope for the given table and requests.
    pub fn new(table: impl Into<String>, requests: Vec<WriteRequest>) -> Self {
        Self {
            table: table.into(),
            requests,
        }
    }

    /// Returns the target table name.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Returns the write requests, in submission order.
    pub fn requests(&self) -> &[WriteRequest] {
        &self.requests
    }

    /// Returns the number of write requests.
    pub fn len(&self) -> usize {
        self.requests.len()
    }

    /// Returns whether the envelope carries no requests.
    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    /// Consumes the envelope, returning its requests.
    pub fn into_requests(self) -> Vec<WriteRequest> {
        self.requests
    }
}
