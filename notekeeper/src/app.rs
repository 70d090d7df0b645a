//! Application state and initialization
//!
//! `AppState` is the single store object built at startup and passed to
//! every caller. It owns the folder, note and settings stores and runs the
//! multi-step pipelines that touch more than one of them.

use crate::config::{ALL_FOLDER_ID, DATABASE_FILE_NAME, RESERVED_FOLDER_IDS, UNCATEGORIZED_FOLDER_ID};
use crate::database::{self, Folder, FolderId, NewNote, Note, NoteContent, NoteId, NoteMode, NotePatch, Repository};
use crate::error::{AppError, Result};
use crate::services::{FolderStore, NoteStore, ReminderScheduler, RemindersService, SettingsStore};
use crate::storage::{KeyValueStore, SnapshotWriter};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Result of a blur-save
#[derive(Debug, Clone, PartialEq)]
pub enum SaveOutcome {
    Created(Note),
    Updated(Note),
    /// Content matched what is stored, nothing written
    Unchanged,
    /// Both fields were emptied, the note was removed
    Deleted(NoteId),
    /// A new note without content, nothing created
    Discarded,
}

/// Editor contents submitted when the user leaves a note
#[derive(Debug, Clone, Default)]
pub struct SaveNoteRequest {
    /// `None` for a note that has not been created yet
    pub note_id: Option<NoteId>,
    pub content: NoteContent,
    pub folder: Option<FolderId>,
    pub mode: NoteMode,
}

/// Ids removed by `delete_folders`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FolderDeletion {
    pub folders: Vec<FolderId>,
    pub notes: Vec<NoteId>,
}

/// Central application state holding all stores
#[derive(Clone)]
pub struct AppState {
    pub folders: FolderStore,
    pub notes: NoteStore,
    pub settings: SettingsStore,
    pub reminders: RemindersService,
    writer: SnapshotWriter,
    scheduler: Arc<dyn ReminderScheduler>,
    /// Serializes pipelines so cascades never interleave
    pipeline: Arc<Mutex<()>>,
}

impl AppState {
    /// Open (or create) the on-disk store inside `data_dir`
    pub async fn initialize(data_dir: &Path, scheduler: Arc<dyn ReminderScheduler>) -> Result<Self> {
        tracing::info!("Initializing store in {:?}", data_dir);

        std::fs::create_dir_all(data_dir)?;

        let pool = database::create_pool(&data_dir.join(DATABASE_FILE_NAME)).await?;
        let repo = Repository::new(pool);

        Self::with_store(Arc::new(repo), scheduler).await
    }

    /// Build the state over any key-value store, seeding defaults on first run
    pub async fn with_store(
        store: Arc<dyn KeyValueStore>,
        scheduler: Arc<dyn ReminderScheduler>,
    ) -> Result<Self> {
        let writer = SnapshotWriter::spawn(Arc::clone(&store));

        let settings = SettingsStore::load(store.as_ref(), writer.clone()).await;
        let notes = NoteStore::load(store.as_ref(), writer.clone(), Arc::clone(&scheduler)).await;
        let folders = FolderStore::load(store.as_ref(), writer.clone()).await;
        let reminders = RemindersService::new(notes.clone(), Arc::clone(&scheduler));

        tracing::info!("Store initialized successfully");

        Ok(Self {
            folders,
            notes,
            settings,
            reminders,
            writer,
            scheduler,
            pipeline: Arc::new(Mutex::new(())),
        })
    }

    /// Wait for pending writes and stop the scheduler
    pub async fn shutdown(&self) -> Result<()> {
        tracing::info!("Shutting down store");
        self.writer.flush().await;
        self.scheduler.shutdown().await
    }

    /// Wait until every queued snapshot has been written
    pub async fn flush(&self) {
        self.writer.flush().await;
    }

    pub async fn create_folder(&self, title: &str) -> Result<Folder> {
        let _guard = self.pipeline.lock().await;
        self.folders.add(title).await
    }

    pub async fn rename_folder(&self, id: FolderId, title: &str) -> Result<()> {
        let _guard = self.pipeline.lock().await;
        self.folders.rename(id, title).await
    }

    /// Point the selection at an existing folder
    pub async fn select_folder(&self, id: FolderId) -> Result<()> {
        let _guard = self.pipeline.lock().await;

        if !self.folders.contains(id).await {
            return Err(AppError::FolderNotFound(id));
        }
        self.folders.select(id).await;
        Ok(())
    }

    /// Delete folders together with every note filed in them.
    ///
    /// Notes go first so no note ever points at a missing folder. Reserved and
    /// unknown ids are skipped. The selection falls back to the All folder if
    /// it pointed at a removed folder.
    pub async fn delete_folders(&self, ids: &[FolderId]) -> FolderDeletion {
        let _guard = self.pipeline.lock().await;

        let mut removable = Vec::new();
        for id in ids {
            if !RESERVED_FOLDER_IDS.contains(id) && self.folders.contains(*id).await {
                removable.push(*id);
            }
        }

        if removable.is_empty() {
            return FolderDeletion::default();
        }

        if removable.contains(&self.folders.selected().await) {
            self.folders.select(ALL_FOLDER_ID).await;
        }

        let notes = self.notes.delete_by_folder(&removable).await;
        let folders = self.folders.delete(&removable).await;

        tracing::info!(
            "Deleted {} folders and {} notes",
            folders.len(),
            notes.len()
        );

        FolderDeletion { folders, notes }
    }

    /// Create a note in `folder`, or in the selected folder when `None`
    pub async fn create_note(
        &self,
        content: NoteContent,
        folder: Option<FolderId>,
        mode: NoteMode,
    ) -> Result<Note> {
        let _guard = self.pipeline.lock().await;
        self.create_note_locked(content, folder, mode).await
    }

    async fn create_note_locked(
        &self,
        content: NoteContent,
        folder: Option<FolderId>,
        mode: NoteMode,
    ) -> Result<Note> {
        let folder = self.resolve_folder(folder).await?;
        let id = self.notes.next_id().await;

        let draft = NewNote {
            title: content.title,
            description: content.description,
            folder: Some(folder),
            mode,
            ..NewNote::new(id)
        };
        self.notes.add(draft, folder).await;

        self.notes.get_by_id(id).await
    }

    /// Save editor contents when the user leaves a note
    pub async fn save_note(&self, request: SaveNoteRequest) -> Result<SaveOutcome> {
        let _guard = self.pipeline.lock().await;

        let Some(id) = request.note_id else {
            if request.content.is_empty() {
                return Ok(SaveOutcome::Discarded);
            }
            let note = self
                .create_note_locked(request.content, request.folder, request.mode)
                .await?;
            return Ok(SaveOutcome::Created(note));
        };

        self.notes.get_by_id(id).await?;

        if request.content.is_empty() {
            self.notes.delete(&[id]).await;
            return Ok(SaveOutcome::Deleted(id));
        }

        if self.notes.equals(id, &request.content).await {
            return Ok(SaveOutcome::Unchanged);
        }

        self.notes
            .update(
                id,
                NotePatch {
                    title: Some(request.content.title.unwrap_or_default()),
                    description: Some(request.content.description.unwrap_or_default()),
                    ..NotePatch::default()
                },
            )
            .await;

        Ok(SaveOutcome::Updated(self.notes.get_by_id(id).await?))
    }

    /// Pin or unpin several notes at once
    pub async fn set_pinned(&self, ids: &[NoteId], pinned: bool) -> usize {
        let _guard = self.pipeline.lock().await;

        let changed: Vec<Note> = self
            .notes
            .list()
            .await
            .into_iter()
            .filter(|n| ids.contains(&n.id))
            .map(|mut n| {
                n.fixed = pinned;
                n
            })
            .collect();

        self.notes.update_all(&changed).await
    }

    /// Move notes into an existing real folder
    pub async fn move_notes(&self, ids: &[NoteId], folder: FolderId) -> Result<usize> {
        let _guard = self.pipeline.lock().await;

        if !self.folders.contains(folder).await {
            return Err(AppError::FolderNotFound(folder));
        }
        self.notes.move_to_folder(ids, folder).await
    }

    pub async fn delete_notes(&self, ids: &[NoteId]) -> Vec<NoteId> {
        let _guard = self.pipeline.lock().await;
        self.notes.delete(ids).await
    }

    /// Notes of the selected folder, searched and sorted per user settings
    pub async fn visible_notes(&self, search_text: &str) -> Vec<Note> {
        let folder = self.folders.selected().await;
        let sort_order = self.settings.sort_order().await;
        self.notes.query(folder, search_text, sort_order).await
    }

    /// Pick the folder a new note lands in
    async fn resolve_folder(&self, folder: Option<FolderId>) -> Result<FolderId> {
        let folder = match folder {
            Some(id) => id,
            None => self.folders.selected().await,
        };

        let folder = if folder == ALL_FOLDER_ID {
            UNCATEGORIZED_FOLDER_ID
        } else {
            folder
        };

        if !self.folders.contains(folder).await {
            return Err(AppError::Validation(format!(
                "Folder {} does not exist",
                folder
            )));
        }

        Ok(folder)
    }
}
