//! Database models
//!
//! Rust structs representing the persisted entities.
//! Notes and folders are stored as JSON snapshots, so field names follow
//! the camelCase layout of the stored documents.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

pub type NoteId = u64;
pub type FolderId = u64;

/// A named container for notes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Folder {
    pub id: FolderId,
    pub title: String,
}

/// Colour theme tag carried by a note. Purely presentational.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoteMode {
    #[default]
    Default,
    Blue,
    Blue2,
    Blue3,
    Green,
    Green2,
    Orange,
    Orange2,
    Pink,
    Pink2,
    Red,
    Red2,
    Violet,
    Yellow,
}

/// A note as stored in the notes snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: NoteId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub folder: FolderId,
    pub creation_date: DateTime<Utc>,
    pub modification_date: DateTime<Utc>,
    /// Pinned notes sort ahead of everything else
    #[serde(default)]
    pub fixed: bool,
    #[serde(default)]
    pub mode: NoteMode,
    /// Present only while a scheduler handle is outstanding
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reminder_date: Option<DateTime<Utc>>,
}

impl Note {
    /// Title, else description, else `None` when both are blank.
    pub fn display_text(&self) -> Option<&str> {
        [self.title.as_deref(), self.description.as_deref()]
            .into_iter()
            .flatten()
            .find(|text| !text.is_empty())
    }

    /// Case-insensitive substring match against title or description.
    /// `needle` must already be lowercase.
    pub fn matches(&self, needle: &str) -> bool {
        [self.title.as_deref(), self.description.as_deref()]
            .into_iter()
            .flatten()
            .any(|text| text.to_lowercase().contains(needle))
    }
}

/// Note submitted for creation. The folder may be left unset and resolved
/// against the caller's fallback.
#[derive(Debug, Clone)]
pub struct NewNote {
    pub id: NoteId,
    pub title: Option<String>,
    pub description: Option<String>,
    pub folder: Option<FolderId>,
    pub creation_date: DateTime<Utc>,
    pub modification_date: DateTime<Utc>,
    pub fixed: bool,
    pub mode: NoteMode,
}

impl NewNote {
    /// Empty draft stamped with the current time
    pub fn new(id: NoteId) -> Self {
        let now = Utc::now();
        Self {
            id,
            title: None,
            description: None,
            folder: None,
            creation_date: now,
            modification_date: now,
            fixed: false,
            mode: NoteMode::Default,
        }
    }

    pub(crate) fn into_note(self, folder: FolderId) -> Note {
        Note {
            id: self.id,
            title: self.title,
            description: self.description,
            folder,
            creation_date: self.creation_date,
            modification_date: self.modification_date,
            fixed: self.fixed,
            mode: self.mode,
            reminder_date: None,
        }
    }
}

/// Shallow patch merged into an existing note. Unset fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NotePatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub folder: Option<FolderId>,
    pub creation_date: Option<DateTime<Utc>>,
    pub modification_date: Option<DateTime<Utc>>,
    pub fixed: Option<bool>,
    pub mode: Option<NoteMode>,
    pub reminder_date: Option<DateTime<Utc>>,
}

impl NotePatch {
    pub(crate) fn apply(self, note: &mut Note) {
        if let Some(title) = self.title {
            note.title = Some(title);
        }
        if let Some(description) = self.description {
            note.description = Some(description);
        }
        if let Some(folder) = self.folder {
            note.folder = folder;
        }
        if let Some(creation_date) = self.creation_date {
            note.creation_date = creation_date;
        }
        if let Some(modification_date) = self.modification_date {
            note.modification_date = modification_date;
        }
        if let Some(fixed) = self.fixed {
            note.fixed = fixed;
        }
        if let Some(mode) = self.mode {
            note.mode = mode;
        }
        if let Some(reminder_date) = self.reminder_date {
            note.reminder_date = Some(reminder_date);
        }
    }
}

/// Optional note fields that can be cleared with `NoteStore::remove_fields`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NoteField {
    Title,
    Description,
    ReminderDate,
}

/// Editable text of a note, compared by `NoteStore::equals`
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct NoteContent {
    pub title: Option<String>,
    pub description: Option<String>,
}

impl NoteContent {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            description: Some(description.into()),
        }
    }

    /// Both fields blank: the note is logically deleted
    pub fn is_empty(&self) -> bool {
        self.title.as_deref().unwrap_or("").is_empty()
            && self.description.as_deref().unwrap_or("").is_empty()
    }
}

/// Raw row of the durable key-value table
#[derive(Debug, Clone, FromRow)]
pub struct KvEntry {
    pub key: String,
    /// JSON-encoded value
    pub value: String,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_note_snapshot_uses_camel_case() {
        let mut draft = NewNote::new(7);
        draft.title = Some("Groceries".to_string());
        let note = draft.into_note(2);

        let json = serde_json::to_value(&note).unwrap();
        assert_eq!(json["id"], 7);
        assert_eq!(json["folder"], 2);
        assert_eq!(json["mode"], "default");
        assert!(json.get("creationDate").is_some());
        assert!(json.get("modificationDate").is_some());
        assert!(json.get("reminderDate").is_none());
        assert!(json.get("description").is_none());
    }

    #[test]
    fn test_note_deserializes_with_missing_optional_fields() {
        let json = serde_json::json!({
            "id": 3,
            "folder": 2,
            "creationDate": "2024-01-01T10:00:00Z",
            "modificationDate": "2024-01-02T10:00:00Z",
            "mode": "pink2"
        });

        let note: Note = serde_json::from_value(json).unwrap();
        assert_eq!(note.mode, NoteMode::Pink2);
        assert!(!note.fixed);
        assert!(note.title.is_none());
        assert!(note.reminder_date.is_none());
    }

    #[test]
    fn test_display_text_skips_blank_title() {
        let mut draft = NewNote::new(1);
        draft.title = Some(String::new());
        draft.description = Some("body".to_string());
        let note = draft.into_note(2);

        assert_eq!(note.display_text(), Some("body"));
    }

    #[test]
    fn test_patch_leaves_unset_fields() {
        let mut draft = NewNote::new(1);
        draft.title = Some("Keep".to_string());
        let mut note = draft.into_note(2);

        NotePatch {
            fixed: Some(true),
            ..NotePatch::default()
        }
        .apply(&mut note);

        assert!(note.fixed);
        assert_eq!(note.title.as_deref(), Some("Keep"));
        assert_eq!(note.folder, 2);
    }

    #[test]
    fn test_note_content_emptiness() {
        assert!(NoteContent::default().is_empty());
        assert!(NoteContent::new("", "").is_empty());
        assert!(!NoteContent::new("", "x").is_empty());
    }
}
