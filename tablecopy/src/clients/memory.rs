//! In-memory table service for testing and development.

use std::collections::{BTreeMap, HashMap};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::debug;

use crate::bail;
use crate::clients::{ScanPage, TableDestination, TableSource};
use crate::error::{CopyResult, ErrorKind};
use crate::types::{Batch, Item, SegmentDescriptor, WriteEnvelope, WriteRequest};

/// Default number of items returned per scan page.
const DEFAULT_PAGE_SIZE: usize = 100;

#[derive(Debug, Default)]
struct Inner {
    tables: HashMap<String, BTreeMap<String, Item>>,
}

/// In-memory named-table service implementing both [`TableSource`] and
/// [`TableDestination`].
///
/// Items are stored per table, keyed by the configured primary key attribute.
/// Scans partition the key space deterministically by key hash and paginate
/// with a continuation cursor carrying the last returned key, so the full
/// segmented-scan protocol is exercised without a remote service. All data is
/// lost when the last clone is dropped.
#[derive(Debug, Clone)]
pub struct MemoryTable {
    inner: Arc<Mutex<Inner>>,
    key_attribute: String,
    page_size: usize,
}

impl MemoryTable {
    /// Creates an empty service whose tables are keyed by `key_attribute`.
    pub fn new(key_attribute: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner::default())),
            key_attribute: key_attribute.into(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Overrides the scan page size. Small pages force multi-page scans and
    /// cursor handling in tests.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Creates a table. Creating an existing table is a no-op.
    pub async fn create_table(&self, table: impl Into<String>) {
        let mut inner = self.inner.lock().await;
        inner.tables.entry(table.into()).or_default();
    }

    /// Puts a single item, replacing any previous item under the same key.
    pub async fn put_item(&self, table: &str, item: Item) -> CopyResult<()> {
        let key = self.item_key(&item)?;

        let mut inner = self.inner.lock().await;
        let Some(rows) = inner.tables.get_mut(table) else {
            bail!(
                ErrorKind::DestinationTableMissing,
                "Table does not exist",
                table.to_string()
            );
        };
        rows.insert(key, item);

        Ok(())
    }

    /// Returns a copy of all items in a table, useful for test assertions.
    pub async fn items(&self, table: &str) -> CopyResult<Vec<Item>> {
        let inner = self.inner.lock().await;
        let Some(rows) = inner.tables.get(table) else {
            bail!(
                ErrorKind::SourceTableMissing,
                "Table does not exist",
                table.to_string()
            );
        };

        Ok(rows.values().cloned().collect())
    }

    /// Returns the number of items in a table.
    pub async fn len(&self, table: &str) -> CopyResult<usize> {
        let inner = self.inner.lock().await;
        let Some(rows) = inner.tables.get(table) else {
            bail!(
                ErrorKind::SourceTableMissing,
                "Table does not exist",
                table.to_string()
            );
        };

        Ok(rows.len())
    }

    fn item_key(&self, item: &Item) -> CopyResult<String> {
        let Some(key) = item.key_string(&self.key_attribute) else {
            bail!(
                ErrorKind::ValidationError,
                "Item is missing the primary key attribute",
                self.key_attribute.clone()
            );
        };

        Ok(key)
    }

    fn segment_of(key: &str, total_segments: u32) -> u32 {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() % u64::from(total_segments)) as u32
    }
}

impl TableSource for MemoryTable {
    async fn scan_page(
        &self,
        table: &str,
        segment: &SegmentDescriptor,
    ) -> CopyResult<ScanPage> {
        let resume_after = match segment.cursor() {
            Some(cursor) => Some(self.item_key(cursor)?),
            None => None,
        };

        let inner = self.inner.lock().await;
        let Some(rows) = inner.tables.get(table) else {
            bail!(
                ErrorKind::SourceTableMissing,
                "Table does not exist",
                table.to_string()
            );
        };

        let remaining = rows
            .iter()
            .filter(|(key, _)| {
                Self::segment_of(key, segment.total_segments()) == segment.index()
            })
            .skip_while(|(key, _)| match resume_after.as_deref() {
                Some(resume) => key.as_str() <= resume,
                None => false,
            });

        let mut items = Vec::new();
        let mut more = false;
        for (_, item) in remaining {
            if items.len() == self.page_size {
                more = true;
                break;
            }
            items.push(item.clone());
        }

        // A continuation key is only handed back when rows remain past this
        // page, so an exactly-full final page still terminates the segment.
        let cursor = if more {
            items.last().map(|item| key_item(&self.key_attribute, item))
        } else {
            None
        };

        debug!(
            table,
            segment = segment.index(),
            items = items.len(),
            has_cursor = cursor.is_some(),
            "served scan page"
        );

        Ok(ScanPage { items, cursor })
    }
}

impl TableDestination for MemoryTable {
    async fn write_batch(&self, envelope: WriteEnvelope) -> CopyResult<Vec<WriteRequest>> {
        if envelope.is_empty() {
            bail!(
                ErrorKind::ValidationError,
                "Batch write request must not be empty"
            );
        }
        if envelope.len() > Batch::MAX_SIZE {
            bail!(
                ErrorKind::ValidationError,
                "Batch write request exceeds maximum size",
                format!("{} requests, maximum is {}", envelope.len(), Batch::MAX_SIZE)
            );
        }

        let table = envelope.table().to_string();
        for request in envelope.into_requests() {
            self.put_item(&table, request.into_item()).await?;
        }

        Ok(Vec::new())
    }
}

/// Builds the cursor item carrying only the primary key of `item`.
fn key_item(key_attribute: &str, item: &Item) -> Item {
    let mut key = Item::new();
    if let Some(value) = item.get(key_attribute) {
        key.insert(key_attribute, value.clone());
    }
    key
}
