//! Storage module
//!
//! Key-value persistence contract plus the background writer that
//! pushes full-collection snapshots to it.

pub mod memory_store;
pub mod snapshot_writer;

pub use memory_store::MemoryStore;
pub use snapshot_writer::SnapshotWriter;

use crate::error::Result;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Durable storage of string-keyed JSON values
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Fetch a value, `None` when the key was never written
    async fn get(&self, key: &str) -> Result<Option<Value>>;

    /// Insert or replace a value
    async fn set(&self, key: &str, value: &Value) -> Result<()>;

    /// Remove a key. Removing a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;
}

/// Read and decode a stored value.
///
/// Read failures and malformed documents are logged and reported as absent,
/// so a damaged snapshot falls back to defaults instead of blocking startup.
pub async fn load_json<T: DeserializeOwned>(store: &dyn KeyValueStore, key: &str) -> Option<T> {
    let value = match store.get(key).await {
        Ok(Some(value)) => value,
        Ok(None) => return None,
        Err(e) => {
            tracing::error!("Failed to read '{}' from storage: {}", key, e);
            return None;
        }
    };

    match serde_json::from_value(value) {
        Ok(decoded) => Some(decoded),
        Err(e) => {
            tracing::error!("Stored value for '{}' is malformed: {}", key, e);
            None
        }
    }
}
