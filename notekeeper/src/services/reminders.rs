//! Reminders service
//!
//! Couples scheduler handles with the `reminderDate` stored on notes.
//! A note has at most one outstanding handle: scheduling always cancels the
//! previous one first, and the note is only updated once the scheduler has
//! accepted the new request.

use crate::config::REMINDER_NOTIFICATION_TITLE;
use crate::database::{NoteField, NoteId, NotePatch};
use crate::error::{AppError, Result};
use crate::services::notes::NoteStore;
use crate::services::scheduler::{
    cancel_reminders_for, ReminderHandle, ReminderPayload, ReminderScheduler, ScheduledReminder,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Reminder state of a single note as seen by the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReminderState {
    NoReminder,
    Scheduled(DateTime<Utc>),
    /// The stored date has passed; treated the same as no reminder
    Elapsed(DateTime<Utc>),
}

/// Reminders service
#[derive(Clone)]
pub struct RemindersService {
    notes: NoteStore,
    scheduler: Arc<dyn ReminderScheduler>,
    /// Held across each cancel/schedule/stamp sequence
    lock: Arc<Mutex<()>>,
}

impl RemindersService {
    pub fn new(notes: NoteStore, scheduler: Arc<dyn ReminderScheduler>) -> Self {
        Self {
            notes,
            scheduler,
            lock: Arc::new(Mutex::new(())),
        }
    }

    /// Schedule (or reschedule) the reminder for a note
    pub async fn schedule(&self, note_id: NoteId, fire_at: DateTime<Utc>) -> Result<ReminderHandle> {
        self.schedule_at(note_id, fire_at, Utc::now()).await
    }

    async fn schedule_at(
        &self,
        note_id: NoteId,
        fire_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<ReminderHandle> {
        if fire_at <= now {
            return Err(AppError::Validation(
                "Reminder time must be later than the current time".to_string(),
            ));
        }

        let _guard = self.lock.lock().await;

        // Fails with NoteNotFound before any scheduler interaction
        self.notes.get_by_id(note_id).await?;

        tracing::info!("Scheduling reminder for note {} at {}", note_id, fire_at);

        self.scheduler.request_permission().await?;
        cancel_reminders_for(self.scheduler.as_ref(), &[note_id]).await?;

        let payload = ReminderPayload {
            note_id,
            title: REMINDER_NOTIFICATION_TITLE.to_string(),
            body: self.notes.title_or_fallback(note_id).await,
        };
        let handle = self.scheduler.schedule(payload, fire_at).await?;

        let updated = self
            .notes
            .update(
                note_id,
                NotePatch {
                    reminder_date: Some(fire_at),
                    modification_date: Some(now),
                    ..NotePatch::default()
                },
            )
            .await;

        if !updated {
            // Note vanished while we were talking to the scheduler
            if let Err(e) = self.scheduler.cancel(handle).await {
                tracing::error!("Failed to cancel orphaned reminder {}: {}", handle, e);
            }
            return Err(AppError::NoteNotFound(note_id));
        }

        Ok(handle)
    }

    /// Remove the reminder from a note. Cancellation is best effort; the
    /// stored date is cleared regardless.
    pub async fn clear(&self, note_id: NoteId) -> Result<()> {
        let _guard = self.lock.lock().await;

        self.notes.get_by_id(note_id).await?;

        match cancel_reminders_for(self.scheduler.as_ref(), &[note_id]).await {
            Ok(cancelled) => {
                tracing::info!("Cleared reminder for note {} ({} handles)", note_id, cancelled)
            }
            Err(e) => tracing::error!("Failed to cancel reminder for note {}: {}", note_id, e),
        }

        self.notes
            .remove_fields(note_id, &[NoteField::ReminderDate])
            .await;

        Ok(())
    }

    pub async fn active_reminder(&self, note_id: NoteId) -> Option<DateTime<Utc>> {
        self.notes.active_reminder(note_id).await
    }

    pub async fn state(&self, note_id: NoteId) -> Result<ReminderState> {
        let note = self.notes.get_by_id(note_id).await?;
        Ok(match note.reminder_date {
            None => ReminderState::NoReminder,
            Some(at) if at > Utc::now() => ReminderState::Scheduled(at),
            Some(at) => ReminderState::Elapsed(at),
        })
    }

    /// Outstanding scheduler handles for a note
    pub async fn outstanding(&self, note_id: NoteId) -> Result<Vec<ScheduledReminder>> {
        let scheduled = self.scheduler.list_scheduled().await?;
        Ok(scheduled
            .into_iter()
            .filter(|r| r.payload.note_id == note_id)
            .collect())
    }
}
