use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Datelike, Duration, NaiveDateTime, Timelike, Weekday};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex as AsyncMutex;

use crate::error::SchedulerError;
use crate::model::{Frequency, Reminder, ReminderType};
use crate::preferences::NotificationPreferences;

/// Repeat rule the platform scheduler supports natively.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum RepeatRule {
    Daily { hour: u32, minute: u32 },
    Weekly { weekday: Weekday, hour: u32, minute: u32 },
    Monthly { day: u32, hour: u32, minute: u32 },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum AlarmSchedule {
    OneShot(NaiveDateTime),
    Repeating(RepeatRule),
}

/// Delivery channel, keyed by reminder type. Presentation only; has no
/// bearing on scheduling correctness.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Channel {
    Medication,
    VetVisits,
    Vaccines,
    General,
}

pub fn channel_for(kind: ReminderType) -> Channel {
    match kind {
        ReminderType::Medication | ReminderType::Antiparasitic => Channel::Medication,
        ReminderType::VetAppointment => Channel::VetVisits,
        ReminderType::Vaccine => Channel::Vaccines,
        _ => Channel::General,
    }
}

/// Opaque data carried by an alarm. The interval fields are only set for
/// frequencies without a native repeat rule, and mark the alarm as one link
/// of a self-rescheduling chain.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AlarmPayload {
    pub reminder_id: String,
    pub reminder_type: ReminderType,
    pub frequency: Option<Frequency>,
    #[serde(default)]
    pub interval_hours: Option<u32>,
    #[serde(default)]
    pub interval_days: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AlarmContent {
    pub title: String,
    pub body: String,
    pub payload: AlarmPayload,
}

/// One pending trigger registered with the platform backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScheduledAlarm {
    pub id: String,
    pub schedule: AlarmSchedule,
    pub content: AlarmContent,
    pub channel: Channel,
}

/// Platform notification backend: one-shot and natively repeating alarms.
#[async_trait]
pub trait AlarmBackend: Send + Sync {
    async fn schedule_one_shot(
        &self,
        fire_at: NaiveDateTime,
        content: AlarmContent,
        channel: Channel,
    ) -> Result<String, SchedulerError>;

    async fn schedule_repeating(
        &self,
        rule: RepeatRule,
        content: AlarmContent,
        channel: Channel,
    ) -> Result<String, SchedulerError>;

    async fn cancel(&self, alarm_id: &str) -> Result<(), SchedulerError>;

    async fn list_scheduled(&self) -> Result<Vec<ScheduledAlarm>, SchedulerError>;
}

fn body_for(kind: ReminderType) -> &'static str {
    match kind {
        ReminderType::Medication => "Medication is due",
        ReminderType::VetAppointment => "Vet appointment coming up",
        ReminderType::Vaccine => "Vaccine is due",
        ReminderType::Antiparasitic => "Antiparasitic treatment is due",
        ReminderType::Food => "Feeding time",
        ReminderType::Walk => "Time for a walk",
        _ => "Care reminder",
    }
}

/// Translates reminders into alarms on the external backend and keeps the
/// self-rescheduling chain alive for frequencies the platform cannot repeat
/// natively. `refresh_all` and `on_delivered` serialize through one async
/// mutex so the two mutating entry points never interleave.
pub struct NotificationEngine {
    backend: Arc<dyn AlarmBackend>,
    mutation: AsyncMutex<()>,
    in_flight: Mutex<HashSet<String>>,
}

impl NotificationEngine {
    pub fn new(backend: Arc<dyn AlarmBackend>) -> Self {
        Self {
            backend,
            mutation: AsyncMutex::new(()),
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    pub fn backend(&self) -> &Arc<dyn AlarmBackend> {
        &self.backend
    }

    /// Ensure the next alarm for `reminder` exists. Returns `Ok(None)` when
    /// preferences or timing rule the reminder out; that is not an error.
    pub async fn schedule(
        &self,
        reminder: &Reminder,
        prefs: &NotificationPreferences,
        now: NaiveDateTime,
    ) -> Result<Option<String>, SchedulerError> {
        let _guard = self.mutation.lock().await;
        self.schedule_locked(reminder, prefs, now).await
    }

    async fn schedule_locked(
        &self,
        reminder: &Reminder,
        prefs: &NotificationPreferences,
        now: NaiveDateTime,
    ) -> Result<Option<String>, SchedulerError> {
        if !prefs.enabled {
            return Ok(None);
        }
        let type_pref = prefs.type_pref(reminder.kind);
        if !type_pref.enabled {
            return Ok(None);
        }
        let frequency = reminder.frequency.unwrap_or(Frequency::Once);
        if !frequency.is_recurring() && reminder.completed {
            return Ok(None);
        }
        if let Some(end) = reminder.end_date {
            if now.date() > end {
                return Ok(None);
            }
        }

        let advance = Duration::minutes(type_pref.advance_minutes);
        let channel = channel_for(reminder.kind);
        let content = |interval_hours: Option<u32>, interval_days: Option<i64>| AlarmContent {
            title: reminder.title.clone(),
            body: body_for(reminder.kind).to_string(),
            payload: AlarmPayload {
                reminder_id: reminder.id.clone(),
                reminder_type: reminder.kind,
                frequency: Some(frequency),
                interval_hours,
                interval_days,
            },
        };

        match frequency {
            Frequency::Once => {
                let fire_at = reminder.scheduled_at - advance;
                if fire_at <= now {
                    return Ok(None);
                }
                let id = self
                    .backend
                    .schedule_one_shot(fire_at, content(None, None), channel)
                    .await?;
                Ok(Some(id))
            }
            Frequency::Daily | Frequency::Weekly | Frequency::Monthly => {
                // The advance offset shifts the repeat template, which may
                // move it across midnight and change the weekday/day.
                let template = reminder.scheduled_at - advance;
                let rule = match frequency {
                    Frequency::Daily => RepeatRule::Daily {
                        hour: template.hour(),
                        minute: template.minute(),
                    },
                    Frequency::Weekly => RepeatRule::Weekly {
                        weekday: template.weekday(),
                        hour: template.hour(),
                        minute: template.minute(),
                    },
                    _ => RepeatRule::Monthly {
                        day: template.day(),
                        hour: template.hour(),
                        minute: template.minute(),
                    },
                };
                let id = self
                    .backend
                    .schedule_repeating(rule, content(None, None), channel)
                    .await?;
                Ok(Some(id))
            }
            Frequency::EveryTwoDays | Frequency::EveryThreeDays => {
                let days = frequency.interval_days().unwrap_or(1);
                let mut occurrence = now.date().and_time(reminder.scheduled_at.time());
                if occurrence - advance <= now {
                    occurrence += Duration::days(days);
                }
                let fire_at = occurrence - advance;
                if fire_at <= now {
                    return Ok(None);
                }
                let id = self
                    .backend
                    .schedule_one_shot(fire_at, content(None, Some(days)), channel)
                    .await?;
                Ok(Some(id))
            }
            Frequency::Every8Hours | Frequency::Every12Hours => {
                let hours = frequency.interval_hours().unwrap_or(24);
                let mut occurrence = now.date().and_time(reminder.scheduled_at.time());
                if occurrence - advance <= now {
                    occurrence += Duration::hours(i64::from(hours));
                }
                let fire_at = occurrence - advance;
                if fire_at <= now {
                    return Ok(None);
                }
                let id = self
                    .backend
                    .schedule_one_shot(fire_at, content(Some(hours), None), channel)
                    .await?;
                Ok(Some(id))
            }
        }
    }

    /// Delivery hook for chained one-shot alarms: schedules exactly one
    /// successor when the payload carries an interval. Re-entrant calls for
    /// the same alarm id are dropped.
    pub async fn on_delivered(
        &self,
        alarm: &ScheduledAlarm,
        now: NaiveDateTime,
    ) -> Result<Option<String>, SchedulerError> {
        let payload = &alarm.content.payload;
        if payload.interval_hours.is_none() && payload.interval_days.is_none() {
            return Ok(None);
        }

        {
            let mut in_flight = self.in_flight.lock();
            if !in_flight.insert(alarm.id.clone()) {
                tracing::debug!(alarm = %alarm.id, "delivery already being handled");
                return Ok(None);
            }
        }
        let result = self.reschedule(alarm, now).await;
        self.in_flight.lock().remove(&alarm.id);
        result
    }

    async fn reschedule(
        &self,
        alarm: &ScheduledAlarm,
        now: NaiveDateTime,
    ) -> Result<Option<String>, SchedulerError> {
        let _guard = self.mutation.lock().await;
        let payload = &alarm.content.payload;

        let next = if let Some(hours) = payload.interval_hours {
            now + Duration::hours(i64::from(hours))
        } else {
            let days = payload.interval_days.unwrap_or(1);
            // Day-interval chains keep the delivered alarm's time-of-day.
            let time = match alarm.schedule {
                AlarmSchedule::OneShot(fire_at) => fire_at.time(),
                AlarmSchedule::Repeating(_) => now.time(),
            };
            (now + Duration::days(days)).date().and_time(time)
        };

        let id = self
            .backend
            .schedule_one_shot(next, alarm.content.clone(), alarm.channel)
            .await?;
        tracing::debug!(alarm = %alarm.id, successor = %id, %next, "rescheduled chained alarm");
        Ok(Some(id))
    }

    /// Cancel every alarm whose payload references `reminder_id`.
    /// Best-effort: individual failures are logged and skipped.
    pub async fn cancel_for_reminder(&self, reminder_id: &str) -> usize {
        let alarms = match self.backend.list_scheduled().await {
            Ok(alarms) => alarms,
            Err(err) => {
                tracing::warn!(%err, "could not enumerate alarms for cancellation");
                return 0;
            }
        };
        let mut cancelled = 0;
        for alarm in alarms {
            if alarm.content.payload.reminder_id != reminder_id {
                continue;
            }
            match self.backend.cancel(&alarm.id).await {
                Ok(()) => cancelled += 1,
                Err(err) => tracing::warn!(alarm = %alarm.id, %err, "failed to cancel alarm"),
            }
        }
        cancelled
    }

    /// Drop every scheduled alarm and rebuild the set from `reminders`.
    /// One failing reminder never blocks the rest of the batch.
    pub async fn refresh_all(
        &self,
        reminders: &[Reminder],
        prefs: &NotificationPreferences,
        now: NaiveDateTime,
    ) -> usize {
        let _guard = self.mutation.lock().await;

        match self.backend.list_scheduled().await {
            Ok(alarms) => {
                for alarm in alarms {
                    if let Err(err) = self.backend.cancel(&alarm.id).await {
                        tracing::warn!(alarm = %alarm.id, %err, "failed to cancel stale alarm");
                    }
                }
            }
            Err(err) => tracing::warn!(%err, "could not enumerate alarms before refresh"),
        }

        let mut scheduled = 0;
        for reminder in reminders {
            match self.schedule_locked(reminder, prefs, now).await {
                Ok(Some(_)) => scheduled += 1,
                Ok(None) => {}
                Err(err) => {
                    tracing::warn!(reminder = %reminder.id, %err, "failed to schedule reminder");
                }
            }
        }
        scheduled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryAlarmBackend;
    use crate::preferences::TypePreference;

    fn reminder(frequency: Frequency, scheduled_at: &str) -> Reminder {
        Reminder {
            id: "r1".into(),
            title: "Heartworm pill".into(),
            kind: ReminderType::Medication,
            scheduled_at: scheduled_at.parse().unwrap(),
            frequency: Some(frequency),
            end_date: None,
            pet_id: None,
            completed: false,
            completed_dates: Default::default(),
        }
    }

    fn engine() -> (NotificationEngine, Arc<InMemoryAlarmBackend>) {
        let backend = Arc::new(InMemoryAlarmBackend::new());
        (NotificationEngine::new(backend.clone()), backend)
    }

    fn at(text: &str) -> NaiveDateTime {
        text.parse().unwrap()
    }

    #[tokio::test]
    async fn disabled_type_schedules_nothing() {
        let (engine, backend) = engine();
        let mut prefs = NotificationPreferences::default();
        prefs.per_type.insert(
            ReminderType::Medication,
            TypePreference {
                enabled: false,
                advance_minutes: 0,
            },
        );
        let r = reminder(Frequency::Daily, "2024-01-01T09:00:00");
        let id = engine
            .schedule(&r, &prefs, at("2024-01-01T00:00:00"))
            .await
            .unwrap();
        assert!(id.is_none());
        assert!(backend.snapshot().is_empty());
    }

    #[tokio::test]
    async fn globally_disabled_schedules_nothing() {
        let (engine, backend) = engine();
        let prefs = NotificationPreferences {
            enabled: false,
            ..Default::default()
        };
        let r = reminder(Frequency::Daily, "2024-01-01T09:00:00");
        let id = engine
            .schedule(&r, &prefs, at("2024-01-01T00:00:00"))
            .await
            .unwrap();
        assert!(id.is_none());
        assert!(backend.snapshot().is_empty());
    }

    #[tokio::test]
    async fn once_in_the_past_is_skipped() {
        let (engine, _backend) = engine();
        let r = reminder(Frequency::Once, "2024-01-01T09:00:00");
        let id = engine
            .schedule(&r, &NotificationPreferences::default(), at("2024-01-02T00:00:00"))
            .await
            .unwrap();
        assert!(id.is_none());
    }

    #[tokio::test]
    async fn daily_becomes_a_native_repeating_alarm() {
        let (engine, backend) = engine();
        let r = reminder(Frequency::Daily, "2024-01-01T09:30:00");
        let id = engine
            .schedule(&r, &NotificationPreferences::default(), at("2024-03-01T00:00:00"))
            .await
            .unwrap()
            .expect("alarm scheduled");
        let alarms = backend.snapshot();
        assert_eq!(alarms.len(), 1);
        assert_eq!(alarms[0].id, id);
        assert_eq!(
            alarms[0].schedule,
            AlarmSchedule::Repeating(RepeatRule::Daily { hour: 9, minute: 30 })
        );
        assert_eq!(alarms[0].channel, Channel::Medication);
        assert!(alarms[0].content.payload.interval_hours.is_none());
    }

    #[tokio::test]
    async fn advance_minutes_shift_the_repeat_template() {
        let (engine, backend) = engine();
        let mut prefs = NotificationPreferences::default();
        prefs.per_type.insert(
            ReminderType::Medication,
            TypePreference {
                enabled: true,
                advance_minutes: 45,
            },
        );
        let r = reminder(Frequency::Daily, "2024-01-01T09:30:00");
        engine
            .schedule(&r, &prefs, at("2024-01-01T00:00:00"))
            .await
            .unwrap();
        let alarms = backend.snapshot();
        assert_eq!(
            alarms[0].schedule,
            AlarmSchedule::Repeating(RepeatRule::Daily { hour: 8, minute: 45 })
        );
    }

    #[tokio::test]
    async fn weekly_rule_carries_the_anchor_weekday() {
        let (engine, backend) = engine();
        // 2024-01-01 is a Monday.
        let r = reminder(Frequency::Weekly, "2024-01-01T10:00:00");
        engine
            .schedule(&r, &NotificationPreferences::default(), at("2024-01-01T00:00:00"))
            .await
            .unwrap();
        let alarms = backend.snapshot();
        assert_eq!(
            alarms[0].schedule,
            AlarmSchedule::Repeating(RepeatRule::Weekly {
                weekday: Weekday::Mon,
                hour: 10,
                minute: 0
            })
        );
    }

    #[tokio::test]
    async fn every_two_days_schedules_only_the_next_one_shot() {
        let (engine, backend) = engine();
        let r = reminder(Frequency::EveryTwoDays, "2024-01-01T09:00:00");

        // Anchor time still ahead today: fire today.
        let id = engine
            .schedule(&r, &NotificationPreferences::default(), at("2024-01-05T08:00:00"))
            .await
            .unwrap();
        assert!(id.is_some());
        let alarms = backend.snapshot();
        assert_eq!(alarms.len(), 1);
        assert_eq!(alarms[0].schedule, AlarmSchedule::OneShot(at("2024-01-05T09:00:00")));
        assert_eq!(alarms[0].content.payload.interval_days, Some(2));

        // Anchor time already past today: advance one interval.
        backend.clear();
        engine
            .schedule(&r, &NotificationPreferences::default(), at("2024-01-05T10:00:00"))
            .await
            .unwrap();
        let alarms = backend.snapshot();
        assert_eq!(alarms[0].schedule, AlarmSchedule::OneShot(at("2024-01-07T09:00:00")));
    }

    #[tokio::test]
    async fn sub_daily_advances_by_its_hour_interval() {
        let (engine, backend) = engine();
        let r = reminder(Frequency::Every8Hours, "2024-01-01T08:00:00");
        engine
            .schedule(&r, &NotificationPreferences::default(), at("2024-01-03T09:00:00"))
            .await
            .unwrap();
        let alarms = backend.snapshot();
        assert_eq!(alarms[0].schedule, AlarmSchedule::OneShot(at("2024-01-03T16:00:00")));
        assert_eq!(alarms[0].content.payload.interval_hours, Some(8));
    }

    #[tokio::test]
    async fn delivery_of_a_chained_alarm_produces_one_successor() {
        let (engine, backend) = engine();
        let r = reminder(Frequency::EveryThreeDays, "2024-01-01T09:00:00");
        engine
            .schedule(&r, &NotificationPreferences::default(), at("2024-01-04T08:00:00"))
            .await
            .unwrap();
        let delivered = backend.snapshot().remove(0);

        let successor = engine
            .on_delivered(&delivered, at("2024-01-04T09:00:05"))
            .await
            .unwrap()
            .expect("successor scheduled");
        let alarms = backend.snapshot();
        let next = alarms.iter().find(|a| a.id == successor).expect("present");
        // Three days out, at the delivered alarm's time-of-day.
        assert_eq!(next.schedule, AlarmSchedule::OneShot(at("2024-01-07T09:00:00")));
        assert_eq!(next.content.payload, delivered.content.payload);
    }

    #[tokio::test]
    async fn delivery_without_interval_payload_is_a_no_op() {
        let (engine, backend) = engine();
        let r = reminder(Frequency::Daily, "2024-01-01T09:00:00");
        engine
            .schedule(&r, &NotificationPreferences::default(), at("2024-01-01T00:00:00"))
            .await
            .unwrap();
        let alarm = backend.snapshot().remove(0);
        let successor = engine
            .on_delivered(&alarm, at("2024-01-02T09:00:00"))
            .await
            .unwrap();
        assert!(successor.is_none());
        assert_eq!(backend.snapshot().len(), 1);
    }

    #[tokio::test]
    async fn cancel_for_reminder_leaves_other_alarms_alone() {
        let (engine, backend) = engine();
        let prefs = NotificationPreferences::default();
        let now = at("2024-01-01T00:00:00");
        let r1 = reminder(Frequency::Daily, "2024-01-01T09:00:00");
        let mut r2 = reminder(Frequency::Weekly, "2024-01-01T10:00:00");
        r2.id = "r2".into();
        engine.schedule(&r1, &prefs, now).await.unwrap();
        engine.schedule(&r2, &prefs, now).await.unwrap();

        let cancelled = engine.cancel_for_reminder("r1").await;
        assert_eq!(cancelled, 1);
        let remaining = backend.snapshot();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].content.payload.reminder_id, "r2");
    }

    #[tokio::test]
    async fn refresh_all_replaces_the_whole_generation() {
        let (engine, backend) = engine();
        let prefs = NotificationPreferences::default();
        let now = at("2024-01-01T00:00:00");
        let stale = reminder(Frequency::Daily, "2024-01-01T07:00:00");
        engine.schedule(&stale, &prefs, now).await.unwrap();
        let before: Vec<String> = backend.snapshot().iter().map(|a| a.id.clone()).collect();

        let mut current = reminder(Frequency::Weekly, "2024-01-01T10:00:00");
        current.id = "r9".into();
        let scheduled = engine.refresh_all(&[current], &prefs, now).await;

        assert_eq!(scheduled, 1);
        let after = backend.snapshot();
        assert_eq!(after.len(), 1);
        assert_eq!(after[0].content.payload.reminder_id, "r9");
        assert!(!before.contains(&after[0].id));
    }
}
