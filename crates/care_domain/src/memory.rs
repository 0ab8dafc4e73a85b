use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::NaiveDateTime;
use parking_lot::{Mutex, RwLock};

use crate::completion;
use crate::error::{RepositoryError, SchedulerError};
use crate::model::{Pet, Reminder, VetVisit};
use crate::notify::{
    AlarmBackend, AlarmContent, AlarmSchedule, Channel, RepeatRule, ScheduledAlarm,
};
use crate::preferences::{NotificationPreferences, PreferencesStore};
use crate::repository::{PetRepository, ReminderPatch, ReminderRepository, VisitRepository};

/// In-process backing store implementing all three repositories. Used by the
/// demo front end and by integration tests.
#[derive(Default)]
pub struct InMemoryStore {
    reminders: RwLock<Vec<Reminder>>,
    visits: Vec<VetVisit>,
    pets: Vec<Pet>,
}

impl InMemoryStore {
    pub fn new(reminders: Vec<Reminder>, visits: Vec<VetVisit>, pets: Vec<Pet>) -> Self {
        Self {
            reminders: RwLock::new(reminders),
            visits,
            pets,
        }
    }

    pub fn reminders(&self) -> Vec<Reminder> {
        self.reminders.read().clone()
    }
}

#[async_trait]
impl ReminderRepository for InMemoryStore {
    async fn list_reminders(&self, _user_id: &str) -> Result<Vec<Reminder>, RepositoryError> {
        Ok(self.reminders.read().clone())
    }

    async fn patch_reminder(
        &self,
        _user_id: &str,
        reminder_id: &str,
        patch: ReminderPatch,
    ) -> Result<(), RepositoryError> {
        let mut reminders = self.reminders.write();
        let reminder = reminders
            .iter_mut()
            .find(|reminder| reminder.id == reminder_id)
            .ok_or_else(|| RepositoryError::NotFound(reminder_id.to_string()))?;
        completion::apply(reminder, &patch.completion);
        Ok(())
    }
}

#[async_trait]
impl VisitRepository for InMemoryStore {
    async fn list_visits(&self, _user_id: &str) -> Result<Vec<VetVisit>, RepositoryError> {
        Ok(self.visits.clone())
    }
}

#[async_trait]
impl PetRepository for InMemoryStore {
    async fn list_pets(&self, _user_id: &str) -> Result<Vec<Pet>, RepositoryError> {
        Ok(self.pets.clone())
    }
}

/// Alarm backend keeping scheduled alarms in a map, with monotonically
/// increasing identifiers.
#[derive(Default)]
pub struct InMemoryAlarmBackend {
    alarms: Mutex<HashMap<String, ScheduledAlarm>>,
    next_id: AtomicU64,
}

impl InMemoryAlarmBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current alarms, ordered by identifier for deterministic assertions.
    pub fn snapshot(&self) -> Vec<ScheduledAlarm> {
        let mut alarms: Vec<ScheduledAlarm> = self.alarms.lock().values().cloned().collect();
        alarms.sort_by(|a, b| a.id.cmp(&b.id));
        alarms
    }

    pub fn clear(&self) {
        self.alarms.lock().clear();
    }

    fn insert(&self, schedule: AlarmSchedule, content: AlarmContent, channel: Channel) -> String {
        let id = format!("alarm-{}", self.next_id.fetch_add(1, Ordering::Relaxed));
        self.alarms.lock().insert(
            id.clone(),
            ScheduledAlarm {
                id: id.clone(),
                schedule,
                content,
                channel,
            },
        );
        id
    }
}

#[async_trait]
impl AlarmBackend for InMemoryAlarmBackend {
    async fn schedule_one_shot(
        &self,
        fire_at: NaiveDateTime,
        content: AlarmContent,
        channel: Channel,
    ) -> Result<String, SchedulerError> {
        Ok(self.insert(AlarmSchedule::OneShot(fire_at), content, channel))
    }

    async fn schedule_repeating(
        &self,
        rule: RepeatRule,
        content: AlarmContent,
        channel: Channel,
    ) -> Result<String, SchedulerError> {
        Ok(self.insert(AlarmSchedule::Repeating(rule), content, channel))
    }

    async fn cancel(&self, alarm_id: &str) -> Result<(), SchedulerError> {
        self.alarms.lock().remove(alarm_id);
        Ok(())
    }

    async fn list_scheduled(&self) -> Result<Vec<ScheduledAlarm>, SchedulerError> {
        Ok(self.snapshot())
    }
}

/// Fixed preferences snapshot, replaceable at runtime.
pub struct StaticPreferences {
    prefs: RwLock<NotificationPreferences>,
}

impl StaticPreferences {
    pub fn new(prefs: NotificationPreferences) -> Self {
        Self {
            prefs: RwLock::new(prefs),
        }
    }

    pub fn replace(&self, prefs: NotificationPreferences) {
        *self.prefs.write() = prefs;
    }
}

impl Default for StaticPreferences {
    fn default() -> Self {
        Self::new(NotificationPreferences::default())
    }
}

impl PreferencesStore for StaticPreferences {
    fn get(&self) -> NotificationPreferences {
        self.prefs.read().clone()
    }
}
