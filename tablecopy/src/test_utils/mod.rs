//! Shared helpers for unit and integration tests.

pub mod faulty;

use std::sync::Once;

use crate::clients::memory::MemoryTable;
use crate::types::{AttributeValue, Item};

static TRACING_INIT: Once = Once::new();

/// Initializes test tracing once per process. Honors `RUST_LOG` when set.
pub fn init_test_tracing() {
    TRACING_INIT.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "tablecopy=debug".into());
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

/// Builds an item carrying only a `pk` string attribute.
pub fn keyed_item(key: &str) -> Item {
    Item::new().with_attribute("pk", AttributeValue::string(key))
}

/// Builds `count` items with keys `"0"` through `count - 1`.
pub fn numbered_items(count: usize) -> Vec<Item> {
    (0..count).map(|i| keyed_item(&i.to_string())).collect()
}

/// Creates a `pk`-keyed in-memory service holding `items` in `table`.
pub async fn seeded_memory_table(table: &str, items: Vec<Item>) -> MemoryTable {
    let service = MemoryTable::new("pk");
    service.create_table(table).await;
    for item in items {
        service
            .put_item(table, item)
            .await
            .expect("seed item carries the key attribute");
    }
    service
}
