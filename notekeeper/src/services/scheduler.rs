//! Reminder scheduler
//!
//! Contract with the one-shot notification scheduler plus a
//! tokio-cron-scheduler backed implementation. Delivery of the notification
//! itself is left to whoever subscribes to fired events.

use crate::config::REMINDER_EVENT_CAPACITY;
use crate::database::NoteId;
use crate::error::{AppError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tokio_cron_scheduler::{Job, JobScheduler};
use uuid::Uuid;

/// Opaque id of an outstanding scheduled reminder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReminderHandle(pub Uuid);

impl fmt::Display for ReminderHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// What the notification shows, and which note it belongs to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReminderPayload {
    pub note_id: NoteId,
    pub title: String,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledReminder {
    pub handle: ReminderHandle,
    pub payload: ReminderPayload,
    pub fire_at: DateTime<Utc>,
}

/// Emitted when a reminder's fire time is reached
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReminderFired {
    pub handle: ReminderHandle,
    pub payload: ReminderPayload,
    pub fired_at: DateTime<Utc>,
}

/// One-shot reminder scheduler. Never schedules repeating reminders.
#[async_trait]
pub trait ReminderScheduler: Send + Sync {
    /// Ask the platform for permission to deliver notifications
    async fn request_permission(&self) -> Result<()> {
        Ok(())
    }

    async fn schedule(
        &self,
        payload: ReminderPayload,
        fire_at: DateTime<Utc>,
    ) -> Result<ReminderHandle>;

    async fn list_scheduled(&self) -> Result<Vec<ScheduledReminder>>;

    /// Cancel an outstanding reminder. Unknown handles are ignored.
    async fn cancel(&self, handle: ReminderHandle) -> Result<()>;

    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }
}

/// Cancel every outstanding reminder whose payload references one of `note_ids`.
///
/// All matching handles are attempted even if some fail; the first failure is
/// returned afterwards. Returns the number of cancelled handles.
pub async fn cancel_reminders_for(
    scheduler: &dyn ReminderScheduler,
    note_ids: &[NoteId],
) -> Result<usize> {
    if note_ids.is_empty() {
        return Ok(0);
    }

    let scheduled = scheduler.list_scheduled().await?;
    let mut cancelled = 0;
    let mut first_error = None;

    for reminder in scheduled
        .into_iter()
        .filter(|r| note_ids.contains(&r.payload.note_id))
    {
        match scheduler.cancel(reminder.handle).await {
            Ok(()) => {
                cancelled += 1;
                tracing::debug!(
                    "Cancelled reminder {} for note {}",
                    reminder.handle,
                    reminder.payload.note_id
                );
            }
            Err(e) => {
                tracing::error!("Failed to cancel reminder {}: {}", reminder.handle, e);
                first_error.get_or_insert(e);
            }
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(cancelled),
    }
}

/// Scheduler backed by tokio-cron-scheduler one-shot jobs
pub struct CronReminderScheduler {
    scheduler: Arc<RwLock<JobScheduler>>,
    outstanding: Arc<RwLock<HashMap<ReminderHandle, ScheduledReminder>>>,
    events: broadcast::Sender<ReminderFired>,
}

impl CronReminderScheduler {
    /// Create and start the scheduler
    pub async fn new() -> Result<Self> {
        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| AppError::Scheduling(format!("Failed to create scheduler: {}", e)))?;

        scheduler
            .start()
            .await
            .map_err(|e| AppError::Scheduling(format!("Failed to start scheduler: {}", e)))?;

        let (events, _) = broadcast::channel(REMINDER_EVENT_CAPACITY);

        tracing::info!("Reminder scheduler started");

        Ok(Self {
            scheduler: Arc::new(RwLock::new(scheduler)),
            outstanding: Arc::new(RwLock::new(HashMap::new())),
            events,
        })
    }

    /// Receive an event every time a reminder fires
    pub fn subscribe(&self) -> broadcast::Receiver<ReminderFired> {
        self.events.subscribe()
    }
}

#[async_trait]
impl ReminderScheduler for CronReminderScheduler {
    async fn schedule(
        &self,
        payload: ReminderPayload,
        fire_at: DateTime<Utc>,
    ) -> Result<ReminderHandle> {
        let delay = (fire_at - Utc::now()).to_std().map_err(|_| {
            AppError::Validation("Reminder time must be in the future".to_string())
        })?;

        let outstanding = Arc::clone(&self.outstanding);
        let events = self.events.clone();

        let job = Job::new_one_shot_async(delay, move |job_id, _l| {
            let outstanding = Arc::clone(&outstanding);
            let events = events.clone();
            Box::pin(async move {
                let handle = ReminderHandle(job_id);
                let Some(reminder) = outstanding.write().await.remove(&handle) else {
                    return;
                };

                tracing::info!(
                    "Reminder {} fired for note {}",
                    handle,
                    reminder.payload.note_id
                );

                // No subscribers is fine, the reminder still counts as fired
                let _ = events.send(ReminderFired {
                    handle,
                    payload: reminder.payload,
                    fired_at: Utc::now(),
                });
            })
        })
        .map_err(|e| AppError::Scheduling(format!("Failed to create reminder job: {}", e)))?;

        let handle = ReminderHandle(job.guid());
        let note_id = payload.note_id;

        self.outstanding.write().await.insert(
            handle,
            ScheduledReminder {
                handle,
                payload,
                fire_at,
            },
        );

        let added = self.scheduler.read().await.add(job).await;
        if let Err(e) = added {
            self.outstanding.write().await.remove(&handle);
            return Err(AppError::Scheduling(format!(
                "Failed to schedule reminder: {}",
                e
            )));
        }

        tracing::info!("Reminder {} scheduled for note {} at {}", handle, note_id, fire_at);
        Ok(handle)
    }

    async fn list_scheduled(&self) -> Result<Vec<ScheduledReminder>> {
        let mut scheduled: Vec<ScheduledReminder> =
            self.outstanding.read().await.values().cloned().collect();
        scheduled.sort_by_key(|r| r.fire_at);
        Ok(scheduled)
    }

    async fn cancel(&self, handle: ReminderHandle) -> Result<()> {
        if self.outstanding.write().await.remove(&handle).is_none() {
            return Ok(());
        }

        self.scheduler
            .read()
            .await
            .remove(&handle.0)
            .await
            .map_err(|e| AppError::Scheduling(format!("Failed to cancel reminder: {}", e)))?;

        tracing::info!("Reminder {} cancelled", handle);
        Ok(())
    }

    async fn shutdown(&self) -> Result<()> {
        let mut scheduler = self.scheduler.write().await;
        scheduler
            .shutdown()
            .await
            .map_err(|e| AppError::Scheduling(format!("Failed to shutdown scheduler: {}", e)))?;
        tracing::info!("Reminder scheduler shutdown");
        Ok(())
    }
}
