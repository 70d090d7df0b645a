//! Notes service
//!
//! Owns the note collection. Every mutation updates the in-memory
//! collection first and then queues a full snapshot for persistence.
//! Queries are recomputed from memory on every call.

use crate::config::{
    ALL_FOLDER_ID, MISSING_NOTE_PLACEHOLDER, NOTES_KEY, UNCATEGORIZED_FOLDER_ID,
    UNTITLED_NOTE_PLACEHOLDER,
};
use crate::database::{FolderId, NewNote, Note, NoteContent, NoteField, NoteId, NotePatch};
use crate::error::{AppError, Result};
use crate::services::scheduler::{cancel_reminders_for, ReminderScheduler};
use crate::services::settings::SortOrder;
use crate::storage::{load_json, KeyValueStore, SnapshotWriter};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::RwLock;

struct NoteState {
    notes: Vec<Note>,
    high_water: NoteId,
}

impl NoteState {
    fn next_id(&self) -> NoteId {
        let max = self.notes.iter().map(|n| n.id).max().unwrap_or(0);
        max.max(self.high_water) + 1
    }

    fn find_mut(&mut self, id: NoteId) -> Option<&mut Note> {
        self.notes.iter_mut().find(|n| n.id == id)
    }

    fn find(&self, id: NoteId) -> Option<&Note> {
        self.notes.iter().find(|n| n.id == id)
    }
}

/// Service for managing notes
#[derive(Clone)]
pub struct NoteStore {
    state: Arc<RwLock<NoteState>>,
    writer: SnapshotWriter,
    scheduler: Arc<dyn ReminderScheduler>,
}

impl NoteStore {
    pub fn new(
        notes: Vec<Note>,
        writer: SnapshotWriter,
        scheduler: Arc<dyn ReminderScheduler>,
    ) -> Self {
        let high_water = notes.iter().map(|n| n.id).max().unwrap_or(0);
        Self {
            state: Arc::new(RwLock::new(NoteState { notes, high_water })),
            writer,
            scheduler,
        }
    }

    /// Load the notes snapshot, starting empty when nothing is stored
    pub async fn load(
        store: &dyn KeyValueStore,
        writer: SnapshotWriter,
        scheduler: Arc<dyn ReminderScheduler>,
    ) -> Self {
        let notes = load_json::<Vec<Note>>(store, NOTES_KEY)
            .await
            .unwrap_or_default();

        tracing::info!("Loaded {} notes", notes.len());

        Self::new(notes, writer, scheduler)
    }

    /// All notes in insertion order
    pub async fn list(&self) -> Vec<Note> {
        self.state.read().await.notes.clone()
    }

    pub async fn next_id(&self) -> NoteId {
        self.state.read().await.next_id()
    }

    /// Add a note, filing it under `fallback_folder` when it names none.
    ///
    /// Returns `false` without touching anything when a note with the same id
    /// already exists, which absorbs replayed submissions.
    pub async fn add(&self, note: NewNote, fallback_folder: FolderId) -> bool {
        let mut state = self.state.write().await;

        if state.find(note.id).is_some() {
            tracing::debug!("Note {} already exists, ignoring add", note.id);
            return false;
        }

        let mut folder = note.folder.unwrap_or(fallback_folder);
        if folder == ALL_FOLDER_ID {
            folder = UNCATEGORIZED_FOLDER_ID;
        }

        let note = note.into_note(folder);
        let id = note.id;
        state.high_water = state.high_water.max(id);
        state.notes.push(note);

        self.writer.persist(NOTES_KEY, &state.notes);
        tracing::info!("Note created: {} in folder {}", id, folder);

        true
    }

    /// Shallow-merge `patch` into a note. Unknown ids are ignored.
    ///
    /// The modification date is bumped to now unless the patch carries one.
    pub async fn update(&self, id: NoteId, mut patch: NotePatch) -> bool {
        let mut state = self.state.write().await;

        let Some(note) = state.find_mut(id) else {
            tracing::debug!("Update of unknown note {} ignored", id);
            return false;
        };

        patch.modification_date.get_or_insert_with(Utc::now);
        patch.apply(note);

        self.writer.persist(NOTES_KEY, &state.notes);
        tracing::debug!("Note updated: {}", id);

        true
    }

    /// Replace every stored note whose id appears in `notes`.
    /// Returns how many notes were replaced.
    pub async fn update_all(&self, notes: &[Note]) -> usize {
        let mut state = self.state.write().await;
        let mut replaced = 0;

        for stored in state.notes.iter_mut() {
            if let Some(updated) = notes.iter().find(|n| n.id == stored.id) {
                *stored = updated.clone();
                replaced += 1;
            }
        }

        if replaced > 0 {
            self.writer.persist(NOTES_KEY, &state.notes);
            tracing::debug!("Batch updated {} notes", replaced);
        }

        replaced
    }

    /// Clear optional fields of a note without touching anything else
    pub async fn remove_fields(&self, id: NoteId, fields: &[NoteField]) -> bool {
        let mut state = self.state.write().await;

        let Some(note) = state.find_mut(id) else {
            return false;
        };

        for field in fields {
            match field {
                NoteField::Title => note.title = None,
                NoteField::Description => note.description = None,
                NoteField::ReminderDate => note.reminder_date = None,
            }
        }

        self.writer.persist(NOTES_KEY, &state.notes);
        tracing::debug!("Removed {:?} from note {}", fields, id);

        true
    }

    /// Reassign notes to another real folder
    pub async fn move_to_folder(&self, ids: &[NoteId], folder: FolderId) -> Result<usize> {
        if folder == ALL_FOLDER_ID {
            return Err(AppError::Validation(
                "Notes cannot be moved into the All folder".to_string(),
            ));
        }

        let mut state = self.state.write().await;
        let mut moved = 0;

        for note in state.notes.iter_mut().filter(|n| ids.contains(&n.id)) {
            note.folder = folder;
            moved += 1;
        }

        if moved > 0 {
            self.writer.persist(NOTES_KEY, &state.notes);
            tracing::info!("Moved {} notes to folder {}", moved, folder);
        }

        Ok(moved)
    }

    /// Remove notes and cancel their outstanding reminders.
    ///
    /// Removal is committed before cancellation starts; cancellation failures
    /// are logged and never undo the delete. Returns the removed ids.
    pub async fn delete(&self, ids: &[NoteId]) -> Vec<NoteId> {
        let removed = {
            let mut state = self.state.write().await;

            let removed: Vec<NoteId> = state
                .notes
                .iter()
                .map(|n| n.id)
                .filter(|id| ids.contains(id))
                .collect();

            if removed.is_empty() {
                return removed;
            }

            state.notes.retain(|n| !removed.contains(&n.id));
            self.writer.persist(NOTES_KEY, &state.notes);
            removed
        };

        tracing::info!("Deleted notes: {:?}", removed);

        if let Err(e) = cancel_reminders_for(self.scheduler.as_ref(), &removed).await {
            tracing::error!("Reminder cleanup after deleting notes failed: {}", e);
        }

        removed
    }

    /// Delete every note filed under one of `folder_ids`
    pub async fn delete_by_folder(&self, folder_ids: &[FolderId]) -> Vec<NoteId> {
        let ids: Vec<NoteId> = self
            .state
            .read()
            .await
            .notes
            .iter()
            .filter(|n| folder_ids.contains(&n.folder))
            .map(|n| n.id)
            .collect();

        self.delete(&ids).await
    }

    /// Notes visible in `folder_id`, filtered by `search_text` and sorted.
    ///
    /// Pinned notes come first; inside each group notes are ordered newest
    /// first by `sort_order`. Ties keep their stored order.
    pub async fn query(
        &self,
        folder_id: FolderId,
        search_text: &str,
        sort_order: SortOrder,
    ) -> Vec<Note> {
        let state = self.state.read().await;
        let needle = search_text.trim().to_lowercase();

        let mut notes: Vec<Note> = state
            .notes
            .iter()
            .filter(|n| folder_id == ALL_FOLDER_ID || n.folder == folder_id)
            .filter(|n| needle.is_empty() || n.matches(&needle))
            .cloned()
            .collect();

        notes.sort_by(|a, b| {
            b.fixed.cmp(&a.fixed).then_with(|| match sort_order {
                SortOrder::ModificationDate => b.modification_date.cmp(&a.modification_date),
                SortOrder::CreationDate => b.creation_date.cmp(&a.creation_date),
            })
        });

        notes
    }

    pub async fn get_by_id(&self, id: NoteId) -> Result<Note> {
        self.state
            .read()
            .await
            .find(id)
            .cloned()
            .ok_or(AppError::NoteNotFound(id))
    }

    /// Number of notes in a folder, or every note for the All folder
    pub async fn total_by_folder(&self, folder_id: FolderId) -> usize {
        let state = self.state.read().await;
        if folder_id == ALL_FOLDER_ID {
            return state.notes.len();
        }
        state.notes.iter().filter(|n| n.folder == folder_id).count()
    }

    /// Text used as notification body: title, description or a placeholder
    pub async fn title_or_fallback(&self, id: NoteId) -> String {
        let state = self.state.read().await;
        match state.find(id) {
            Some(note) => note
                .display_text()
                .unwrap_or(UNTITLED_NOTE_PLACEHOLDER)
                .to_string(),
            None => MISSING_NOTE_PLACEHOLDER.to_string(),
        }
    }

    /// Reminder date, only while it is still in the future
    pub async fn active_reminder(&self, id: NoteId) -> Option<DateTime<Utc>> {
        self.active_reminder_at(id, Utc::now()).await
    }

    pub(crate) async fn active_reminder_at(
        &self,
        id: NoteId,
        now: DateTime<Utc>,
    ) -> Option<DateTime<Utc>> {
        self.state
            .read()
            .await
            .find(id)
            .and_then(|n| n.reminder_date)
            .filter(|at| *at > now)
    }

    /// Whether the stored title and description match `candidate` exactly.
    /// A missing field is intentionally treated as equal to an empty string.
    pub async fn equals(&self, id: NoteId, candidate: &NoteContent) -> bool {
        let state = self.state.read().await;
        let Some(note) = state.find(id) else {
            return false;
        };

        note.title.as_deref().unwrap_or("") == candidate.title.as_deref().unwrap_or("")
            && note.description.as_deref().unwrap_or("")
                == candidate.description.as_deref().unwrap_or("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::scheduler::testing::RecordingScheduler;
    use crate::services::scheduler::ReminderPayload;
    use crate::storage::MemoryStore;
    use chrono::{Duration, TimeZone};

    struct Fixture {
        notes: NoteStore,
        store: MemoryStore,
        writer: SnapshotWriter,
        scheduler: Arc<RecordingScheduler>,
    }

    async fn create_test_store() -> Fixture {
        let store = MemoryStore::new();
        let writer = SnapshotWriter::spawn(Arc::new(store.clone()));
        let scheduler = RecordingScheduler::new();
        let notes = NoteStore::load(&store, writer.clone(), scheduler.clone()).await;
        Fixture {
            notes,
            store,
            writer,
            scheduler,
        }
    }

    fn date(year: i32, month: u32, day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(year, month, day, 12, 0, 0).unwrap()
    }

    fn draft(id: NoteId, title: &str, folder: Option<FolderId>) -> NewNote {
        NewNote {
            title: Some(title.to_string()),
            folder,
            ..NewNote::new(id)
        }
    }

    #[tokio::test]
    async fn test_add_uses_fallback_folder() {
        let f = create_test_store().await;

        assert!(f.notes.add(draft(1, "Explicit", Some(5)), 2).await);
        assert!(f.notes.add(draft(2, "Fallback", None), 7).await);
        assert!(f.notes.add(draft(3, "Aggregate", None), ALL_FOLDER_ID).await);

        assert_eq!(f.notes.get_by_id(1).await.unwrap().folder, 5);
        assert_eq!(f.notes.get_by_id(2).await.unwrap().folder, 7);
        assert_eq!(
            f.notes.get_by_id(3).await.unwrap().folder,
            UNCATEGORIZED_FOLDER_ID
        );
    }

    #[tokio::test]
    async fn test_add_twice_keeps_one_note() {
        let f = create_test_store().await;

        assert!(f.notes.add(draft(4, "Once", None), 2).await);
        assert!(!f.notes.add(draft(4, "Twice", None), 2).await);
        f.writer.flush().await;

        let list = f.notes.list().await;
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].title.as_deref(), Some("Once"));

        let stored: Vec<Note> =
            serde_json::from_value(f.store.get(NOTES_KEY).await.unwrap().unwrap()).unwrap();
        assert_eq!(stored.len(), 1);
    }

    #[tokio::test]
    async fn test_next_id_is_monotonic() {
        let f = create_test_store().await;
        assert_eq!(f.notes.next_id().await, 1);

        f.notes.add(draft(1, "a", None), 2).await;
        f.notes.add(draft(2, "b", None), 2).await;
        assert_eq!(f.notes.next_id().await, 3);

        f.notes.delete(&[2]).await;
        assert_eq!(f.notes.next_id().await, 3);
    }

    #[tokio::test]
    async fn test_update_merges_and_bumps_modification_date() {
        let f = create_test_store().await;
        let mut note = draft(1, "Title", None);
        note.description = Some("Body".to_string());
        note.modification_date = date(2024, 1, 1);
        f.notes.add(note, 2).await;

        let updated = f
            .notes
            .update(
                1,
                NotePatch {
                    title: Some("New title".to_string()),
                    ..NotePatch::default()
                },
            )
            .await;
        assert!(updated);

        let note = f.notes.get_by_id(1).await.unwrap();
        assert_eq!(note.title.as_deref(), Some("New title"));
        assert_eq!(note.description.as_deref(), Some("Body"));
        assert!(note.modification_date > date(2024, 1, 1));
    }

    #[tokio::test]
    async fn test_update_unknown_note_is_noop() {
        let f = create_test_store().await;
        f.notes.add(draft(1, "Title", None), 2).await;
        f.writer.flush().await;
        let before = f.store.get(NOTES_KEY).await.unwrap();

        assert!(!f.notes.update(99, NotePatch::default()).await);
        f.writer.flush().await;

        assert_eq!(f.store.get(NOTES_KEY).await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_update_all_replaces_only_matching() {
        let f = create_test_store().await;
        f.notes.add(draft(1, "One", None), 2).await;
        f.notes.add(draft(2, "Two", None), 2).await;

        let mut pinned = f.notes.get_by_id(2).await.unwrap();
        pinned.fixed = true;
        let mut ghost = pinned.clone();
        ghost.id = 50;

        let replaced = f.notes.update_all(&[pinned, ghost]).await;

        assert_eq!(replaced, 1);
        assert!(!f.notes.get_by_id(1).await.unwrap().fixed);
        assert!(f.notes.get_by_id(2).await.unwrap().fixed);
        assert_eq!(f.notes.list().await.len(), 2);
    }

    #[tokio::test]
    async fn test_remove_fields_clears_only_named_fields() {
        let f = create_test_store().await;
        f.notes.add(draft(1, "Title", None), 2).await;
        f.notes
            .update(
                1,
                NotePatch {
                    reminder_date: Some(Utc::now() + Duration::hours(1)),
                    ..NotePatch::default()
                },
            )
            .await;

        assert!(f.notes.remove_fields(1, &[NoteField::ReminderDate]).await);

        let note = f.notes.get_by_id(1).await.unwrap();
        assert!(note.reminder_date.is_none());
        assert_eq!(note.title.as_deref(), Some("Title"));
    }

    #[tokio::test]
    async fn test_move_to_folder() {
        let f = create_test_store().await;
        f.notes.add(draft(1, "a", None), 2).await;
        f.notes.add(draft(2, "b", None), 2).await;

        assert_eq!(f.notes.move_to_folder(&[1], 6).await.unwrap(), 1);
        assert_eq!(f.notes.get_by_id(1).await.unwrap().folder, 6);
        assert_eq!(f.notes.get_by_id(2).await.unwrap().folder, 2);

        let result = f.notes.move_to_folder(&[2], ALL_FOLDER_ID).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_delete_cancels_reminders() {
        let f = create_test_store().await;
        f.notes.add(draft(1, "a", None), 2).await;
        f.notes.add(draft(2, "b", None), 2).await;

        let at = Utc::now() + Duration::hours(2);
        for note_id in [1, 2] {
            f.scheduler
                .schedule(
                    ReminderPayload {
                        note_id,
                        title: "Note Reminder".to_string(),
                        body: "x".to_string(),
                    },
                    at,
                )
                .await
                .unwrap();
        }

        let removed = f.notes.delete(&[1]).await;

        assert_eq!(removed, vec![1]);
        assert!(f.scheduler.outstanding_for(1).await.is_empty());
        assert_eq!(f.scheduler.outstanding_for(2).await.len(), 1);
    }

    #[tokio::test]
    async fn test_delete_survives_cancel_failure() {
        let f = create_test_store().await;
        f.notes.add(draft(1, "a", None), 2).await;
        f.scheduler
            .schedule(
                ReminderPayload {
                    note_id: 1,
                    title: "Note Reminder".to_string(),
                    body: "a".to_string(),
                },
                Utc::now() + Duration::hours(1),
            )
            .await
            .unwrap();
        RecordingScheduler::set(&f.scheduler.fail_cancel, true);

        let removed = f.notes.delete(&[1]).await;

        assert_eq!(removed, vec![1]);
        assert!(f.notes.list().await.is_empty());
    }

    #[tokio::test]
    async fn test_delete_missing_id_leaves_snapshot_unchanged() {
        let f = create_test_store().await;
        f.notes.add(draft(1, "a", None), 2).await;
        f.writer.flush().await;
        let before = f.store.get(NOTES_KEY).await.unwrap();

        let removed = f.notes.delete(&[999]).await;
        f.writer.flush().await;

        assert!(removed.is_empty());
        assert_eq!(f.store.get(NOTES_KEY).await.unwrap(), before);
        assert_eq!(f.notes.list().await.len(), 1);
    }

    #[tokio::test]
    async fn test_delete_by_folder() {
        let f = create_test_store().await;
        f.notes.add(draft(1, "a", Some(3)), 2).await;
        f.notes.add(draft(2, "b", Some(4)), 2).await;
        f.notes.add(draft(3, "c", Some(3)), 2).await;

        let mut removed = f.notes.delete_by_folder(&[3]).await;
        removed.sort();

        assert_eq!(removed, vec![1, 3]);
        assert_eq!(f.notes.total_by_folder(3).await, 0);
        assert_eq!(f.notes.total_by_folder(4).await, 1);
    }

    #[tokio::test]
    async fn test_query_pinned_first_then_newest() {
        let f = create_test_store().await;

        let mut a = draft(1, "A", None);
        a.fixed = true;
        a.modification_date = date(2024, 1, 1);
        let mut b = draft(2, "B", None);
        b.modification_date = date(2024, 6, 1);
        let mut c = draft(3, "C", None);
        c.fixed = true;
        c.modification_date = date(2024, 3, 1);

        for note in [a, b, c] {
            f.notes.add(note, 2).await;
        }

        let ids: Vec<NoteId> = f
            .notes
            .query(ALL_FOLDER_ID, "", SortOrder::ModificationDate)
            .await
            .iter()
            .map(|n| n.id)
            .collect();

        assert_eq!(ids, vec![3, 1, 2]);
    }

    #[tokio::test]
    async fn test_query_by_creation_date_and_stable_ties() {
        let f = create_test_store().await;

        let mut first = draft(1, "first", None);
        first.creation_date = date(2024, 2, 1);
        let mut second = draft(2, "second", None);
        second.creation_date = date(2024, 2, 1);
        let mut newest = draft(3, "newest", None);
        newest.creation_date = date(2024, 5, 1);

        for note in [first, second, newest] {
            f.notes.add(note, 2).await;
        }

        let ids: Vec<NoteId> = f
            .notes
            .query(2, "", SortOrder::CreationDate)
            .await
            .iter()
            .map(|n| n.id)
            .collect();

        assert_eq!(ids, vec![3, 1, 2]);
    }

    #[tokio::test]
    async fn test_query_search_is_case_insensitive() {
        let f = create_test_store().await;

        f.notes.add(draft(1, "Say Hello", None), 2).await;
        let mut described = NewNote::new(2);
        described.description = Some("no match".to_string());
        f.notes.add(described, 2).await;
        let mut body = NewNote::new(3);
        body.description = Some("well HELLO there".to_string());
        f.notes.add(body, 5).await;

        let mut ids: Vec<NoteId> = f
            .notes
            .query(ALL_FOLDER_ID, "  hello ", SortOrder::ModificationDate)
            .await
            .iter()
            .map(|n| n.id)
            .collect();
        ids.sort();

        assert_eq!(ids, vec![1, 3]);
    }

    #[tokio::test]
    async fn test_query_filters_by_folder() {
        let f = create_test_store().await;
        f.notes.add(draft(1, "a", Some(3)), 2).await;
        f.notes.add(draft(2, "b", Some(4)), 2).await;

        let in_three = f.notes.query(3, "", SortOrder::ModificationDate).await;
        assert_eq!(in_three.len(), 1);
        assert_eq!(in_three[0].id, 1);

        assert_eq!(f.notes.total_by_folder(ALL_FOLDER_ID).await, 2);
    }

    #[tokio::test]
    async fn test_title_or_fallback() {
        let f = create_test_store().await;
        f.notes.add(draft(1, "Title", None), 2).await;
        let mut described = NewNote::new(2);
        described.description = Some("Only body".to_string());
        f.notes.add(described, 2).await;
        f.notes.add(NewNote::new(3), 2).await;

        assert_eq!(f.notes.title_or_fallback(1).await, "Title");
        assert_eq!(f.notes.title_or_fallback(2).await, "Only body");
        assert_eq!(f.notes.title_or_fallback(3).await, UNTITLED_NOTE_PLACEHOLDER);
        assert_eq!(f.notes.title_or_fallback(4).await, MISSING_NOTE_PLACEHOLDER);
    }

    #[tokio::test]
    async fn test_active_reminder_ignores_past_dates() {
        let f = create_test_store().await;
        f.notes.add(draft(1, "a", None), 2).await;
        let at = date(2030, 1, 1);
        f.notes
            .update(
                1,
                NotePatch {
                    reminder_date: Some(at),
                    ..NotePatch::default()
                },
            )
            .await;

        assert_eq!(f.notes.active_reminder_at(1, date(2029, 12, 31)).await, Some(at));
        assert_eq!(f.notes.active_reminder_at(1, at).await, None);
        assert_eq!(f.notes.active_reminder_at(1, date(2030, 2, 1)).await, None);
        assert_eq!(f.notes.active_reminder(42).await, None);
    }

    #[tokio::test]
    async fn test_equals() {
        let f = create_test_store().await;
        f.notes.add(draft(1, "Title", None), 2).await;

        assert!(f.notes.equals(1, &NoteContent::new("Title", "")).await);
        assert!(
            f.notes
                .equals(
                    1,
                    &NoteContent {
                        title: Some("Title".to_string()),
                        description: None,
                    }
                )
                .await
        );
        assert!(!f.notes.equals(1, &NoteContent::new("Title", "changed")).await);
        assert!(!f.notes.equals(2, &NoteContent::default()).await);
    }

    #[tokio::test]
    async fn test_get_by_id_not_found() {
        let f = create_test_store().await;
        assert!(matches!(
            f.notes.get_by_id(7).await,
            Err(AppError::NoteNotFound(7))
        ));
    }
}
