//! Snapshot writer
//!
//! Stores apply mutations in memory first and hand the resulting full
//! collection to this writer. A single background task drains the queue in
//! order, so durable writes never overtake each other and callers never
//! wait on disk I/O.

use super::KeyValueStore;
use crate::error::AppError;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

enum WriteCommand {
    Set { key: String, value: Value },
    Delete { key: String },
    Flush(oneshot::Sender<()>),
}

/// Handle to the background persistence task. Cheap to clone.
#[derive(Clone)]
pub struct SnapshotWriter {
    tx: mpsc::UnboundedSender<WriteCommand>,
}

impl SnapshotWriter {
    /// Spawn the writer task. Must be called from within a tokio runtime.
    pub fn spawn(store: Arc<dyn KeyValueStore>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<WriteCommand>();

        tokio::spawn(async move {
            tracing::debug!("Snapshot writer started");

            while let Some(command) = rx.recv().await {
                match command {
                    WriteCommand::Set { key, value } => {
                        if let Err(e) = store.set(&key, &value).await {
                            let err = AppError::PersistenceWrite(format!("{}: {}", key, e));
                            tracing::error!("{}", err);
                        } else {
                            tracing::debug!("Persisted snapshot '{}'", key);
                        }
                    }
                    WriteCommand::Delete { key } => {
                        if let Err(e) = store.delete(&key).await {
                            let err = AppError::PersistenceWrite(format!("{}: {}", key, e));
                            tracing::error!("{}", err);
                        }
                    }
                    WriteCommand::Flush(ack) => {
                        let _ = ack.send(());
                    }
                }
            }

            tracing::debug!("Snapshot writer stopped");
        });

        Self { tx }
    }

    /// Queue a full snapshot of `value` under `key`
    pub fn persist<T: Serialize + ?Sized>(&self, key: &str, value: &T) {
        match serde_json::to_value(value) {
            Ok(value) => self.enqueue(WriteCommand::Set {
                key: key.to_string(),
                value,
            }),
            Err(e) => tracing::error!("Failed to serialize snapshot '{}': {}", key, e),
        }
    }

    /// Queue removal of `key`
    pub fn remove(&self, key: &str) {
        self.enqueue(WriteCommand::Delete {
            key: key.to_string(),
        });
    }

    /// Wait until every write queued before this call has been attempted
    pub async fn flush(&self) {
        let (ack, done) = oneshot::channel();
        if self.tx.send(WriteCommand::Flush(ack)).is_err() {
            tracing::warn!("Snapshot writer is gone, nothing to flush");
            return;
        }
        let _ = done.await;
    }

    fn enqueue(&self, command: WriteCommand) {
        if self.tx.send(command).is_err() {
            tracing::error!("Snapshot writer is gone, dropping write");
        }
    }
}
