//! Folders service
//!
//! Owns the folder collection and the currently selected folder.
//! Folder titles are unique (case-sensitive) and ids are handed out as
//! `max + 1`, never reusing an id seen earlier in the process.

use crate::config::{
    ALL_FOLDER_ID, ALL_FOLDER_TITLE, FOLDERS_KEY, RESERVED_FOLDER_IDS, SELECTED_FOLDER_KEY,
    UNCATEGORIZED_FOLDER_ID, UNCATEGORIZED_FOLDER_TITLE,
};
use crate::database::{Folder, FolderId};
use crate::error::{AppError, Result};
use crate::storage::{load_json, KeyValueStore, SnapshotWriter};
use std::sync::Arc;
use tokio::sync::RwLock;

struct FolderState {
    folders: Vec<Folder>,
    selected: FolderId,
    /// Largest id ever held, so deleting the newest folder does not free its id
    high_water: FolderId,
}

impl FolderState {
    fn next_id(&self) -> FolderId {
        let max = self.folders.iter().map(|f| f.id).max().unwrap_or(0);
        max.max(self.high_water) + 1
    }

    fn exists(&self, title: &str, excluding: Option<FolderId>) -> bool {
        self.folders
            .iter()
            .any(|f| f.title == title && Some(f.id) != excluding)
    }
}

/// The two folders every store starts with
pub fn default_folders() -> Vec<Folder> {
    vec![
        Folder {
            id: ALL_FOLDER_ID,
            title: ALL_FOLDER_TITLE.to_string(),
        },
        Folder {
            id: UNCATEGORIZED_FOLDER_ID,
            title: UNCATEGORIZED_FOLDER_TITLE.to_string(),
        },
    ]
}

/// Service for managing folders
#[derive(Clone)]
pub struct FolderStore {
    state: Arc<RwLock<FolderState>>,
    writer: SnapshotWriter,
}

impl FolderStore {
    pub fn new(folders: Vec<Folder>, selected: FolderId, writer: SnapshotWriter) -> Self {
        let high_water = folders.iter().map(|f| f.id).max().unwrap_or(0);
        Self {
            state: Arc::new(RwLock::new(FolderState {
                folders,
                selected,
                high_water,
            })),
            writer,
        }
    }

    /// Load folders and selection, seeding the reserved folders on first run
    pub async fn load(store: &dyn KeyValueStore, writer: SnapshotWriter) -> Self {
        let folders = match load_json::<Vec<Folder>>(store, FOLDERS_KEY).await {
            Some(folders) => folders,
            None => {
                tracing::info!("No folders stored, seeding defaults");
                let defaults = default_folders();
                writer.persist(FOLDERS_KEY, &defaults);
                defaults
            }
        };

        let selected = match load_json::<FolderId>(store, SELECTED_FOLDER_KEY).await {
            Some(id) => id,
            None => {
                writer.persist(SELECTED_FOLDER_KEY, &ALL_FOLDER_ID);
                ALL_FOLDER_ID
            }
        };

        tracing::info!("Loaded {} folders, selected folder {}", folders.len(), selected);

        Self::new(folders, selected, writer)
    }

    /// All folders in insertion order
    pub async fn list(&self) -> Vec<Folder> {
        self.state.read().await.folders.clone()
    }

    pub async fn get(&self, id: FolderId) -> Result<Folder> {
        self.state
            .read()
            .await
            .folders
            .iter()
            .find(|f| f.id == id)
            .cloned()
            .ok_or(AppError::FolderNotFound(id))
    }

    pub async fn contains(&self, id: FolderId) -> bool {
        self.state.read().await.folders.iter().any(|f| f.id == id)
    }

    pub async fn title_by_id(&self, id: FolderId) -> Option<String> {
        self.get(id).await.ok().map(|f| f.title)
    }

    /// Exact, case-sensitive title match against every folder except `excluding`
    pub async fn exists(&self, title: &str, excluding: Option<FolderId>) -> bool {
        self.state.read().await.exists(title, excluding)
    }

    pub async fn next_id(&self) -> FolderId {
        self.state.read().await.next_id()
    }

    /// Create a folder with the next free id
    pub async fn add(&self, title: &str) -> Result<Folder> {
        validate_title(title)?;

        let mut state = self.state.write().await;

        if state.exists(title, None) {
            return Err(AppError::DuplicateName(title.to_string()));
        }

        let folder = Folder {
            id: state.next_id(),
            title: title.to_string(),
        };
        state.high_water = folder.id;
        state.folders.push(folder.clone());

        self.writer.persist(FOLDERS_KEY, &state.folders);
        tracing::info!("Folder created: {} ({})", folder.title, folder.id);

        Ok(folder)
    }

    /// Change a folder's title
    pub async fn rename(&self, id: FolderId, title: &str) -> Result<()> {
        validate_title(title)?;

        let mut state = self.state.write().await;

        if state.exists(title, Some(id)) {
            return Err(AppError::DuplicateName(title.to_string()));
        }

        let Some(folder) = state.folders.iter_mut().find(|f| f.id == id) else {
            tracing::warn!("Rename of unknown folder {} ignored", id);
            return Ok(());
        };
        folder.title = title.to_string();

        self.writer.persist(FOLDERS_KEY, &state.folders);
        tracing::info!("Folder {} renamed to {}", id, title);

        Ok(())
    }

    /// Remove folders, skipping the reserved ones. Returns the ids actually removed.
    ///
    /// Notes inside the removed folders are not touched here; see
    /// `AppState::delete_folders` for the cascading pipeline.
    pub async fn delete(&self, ids: &[FolderId]) -> Vec<FolderId> {
        let mut state = self.state.write().await;

        let removed: Vec<FolderId> = state
            .folders
            .iter()
            .map(|f| f.id)
            .filter(|id| ids.contains(id))
            .filter(|id| {
                let reserved = RESERVED_FOLDER_IDS.contains(id);
                if reserved {
                    tracing::warn!("Folder {} is reserved and cannot be deleted", id);
                }
                !reserved
            })
            .collect();

        if removed.is_empty() {
            return removed;
        }

        state.folders.retain(|f| !removed.contains(&f.id));

        self.writer.persist(FOLDERS_KEY, &state.folders);
        tracing::info!("Deleted folders: {:?}", removed);

        removed
    }

    /// Point the selection at `id`. The id is not validated.
    pub async fn select(&self, id: FolderId) {
        let mut state = self.state.write().await;
        state.selected = id;
        self.writer.persist(SELECTED_FOLDER_KEY, &id);
        tracing::debug!("Selected folder {}", id);
    }

    pub async fn selected(&self) -> FolderId {
        self.state.read().await.selected
    }
}

fn validate_title(title: &str) -> Result<()> {
    if title.trim().is_empty() {
        return Err(AppError::Validation(
            "Folder title cannot be empty".to_string(),
        ));
    }
    Ok(())
}
