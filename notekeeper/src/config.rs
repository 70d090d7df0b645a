//! Application configuration constants
//!
//! Central location for storage keys, reserved identifiers, display
//! placeholders and limits used throughout the store.

use crate::database::FolderId;

// ===== Storage Keys =====

/// Key holding the full folders snapshot
pub const FOLDERS_KEY: &str = "allFolders";
/// Key holding the full notes snapshot
pub const NOTES_KEY: &str = "allNotes";
/// Key holding the id of the currently selected folder
pub const SELECTED_FOLDER_KEY: &str = "folderSelected";
/// Key holding user settings (sort order, layout, font size)
pub const USER_SETTINGS_KEY: &str = "userSettings";
/// Key holding the theme preference
pub const THEME_KEY: &str = "theme";

// ===== Reserved Folders =====

/// Virtual aggregate folder listing every note. Not a real container.
pub const ALL_FOLDER_ID: FolderId = 1;
/// Default destination for notes created without an explicit folder.
pub const UNCATEGORIZED_FOLDER_ID: FolderId = 2;

pub const ALL_FOLDER_TITLE: &str = "All";
pub const UNCATEGORIZED_FOLDER_TITLE: &str = "Uncategorized";

/// Folders that can never be deleted
pub const RESERVED_FOLDER_IDS: [FolderId; 2] = [ALL_FOLDER_ID, UNCATEGORIZED_FOLDER_ID];

// ===== Display Placeholders =====

/// Shown when a note has neither title nor description
pub const UNTITLED_NOTE_PLACEHOLDER: &str = "Untitled Note";
/// Shown when a note id no longer resolves
pub const MISSING_NOTE_PLACEHOLDER: &str = "Note Not Found";

// ===== Reminders =====

/// Title used for every reminder notification payload
pub const REMINDER_NOTIFICATION_TITLE: &str = "Note Reminder";

/// Buffered fired-reminder events per subscriber before lagging ones drop events
pub const REMINDER_EVENT_CAPACITY: usize = 64;

// ===== Database =====

/// SQLite file created inside the application data directory
pub const DATABASE_FILE_NAME: &str = "notekeeper.db";

/// Default tracing filter when RUST_LOG is not set
pub const DEFAULT_LOG_FILTER: &str = "notekeeper=debug,info";
