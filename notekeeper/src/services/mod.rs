//! Services module
//!
//! Stores and business logic that sit between callers and persistence.

pub mod folders;
pub mod notes;
pub mod reminders;
pub mod scheduler;
pub mod settings;

pub use folders::FolderStore;
pub use notes::NoteStore;
pub use reminders::{ReminderState, RemindersService};
pub use scheduler::{
    CronReminderScheduler, ReminderFired, ReminderHandle, ReminderPayload, ReminderScheduler,
    ScheduledReminder,
};
pub use settings::{SettingsStore, SortOrder, UserSettings};
