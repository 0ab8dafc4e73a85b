use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use parking_lot::RwLock;

use crate::agenda::{self, AgendaItem, AgendaSource};
use crate::completion;
use crate::delivery::{self, Presentation};
use crate::error::CareError;
use crate::model::Reminder;
use crate::notify::{AlarmBackend, AlarmPayload, NotificationEngine, ScheduledAlarm};
use crate::preferences::PreferencesStore;
use crate::repository::{PetRepository, ReminderPatch, ReminderRepository, VisitRepository};

/// Agenda state is keyed by item id; the order vector preserves the
/// chronological sort. Toggles and rollbacks address items by id only, so a
/// concurrent refresh can never corrupt a neighboring slot.
#[derive(Default)]
struct AgendaState {
    items: HashMap<String, AgendaItem>,
    order: Vec<String>,
    installed_seq: u64,
}

impl AgendaState {
    fn snapshot(&self) -> Vec<AgendaItem> {
        self.order
            .iter()
            .filter_map(|id| self.items.get(id).cloned())
            .collect()
    }

    fn install(&mut self, items: Vec<AgendaItem>, seq: u64) {
        self.items.clear();
        self.order.clear();
        for item in items {
            self.order.push(item.id.clone());
            self.items.insert(item.id.clone(), item);
        }
        self.installed_seq = seq;
    }
}

pub struct CareService {
    user_id: String,
    reminders: Arc<dyn ReminderRepository>,
    visits: Arc<dyn VisitRepository>,
    pets: Arc<dyn PetRepository>,
    preferences: Arc<dyn PreferencesStore>,
    engine: Option<NotificationEngine>,
    state: RwLock<AgendaState>,
    build_seq: AtomicU64,
}

pub struct CareServiceBuilder {
    user_id: String,
    reminders: Option<Arc<dyn ReminderRepository>>,
    visits: Option<Arc<dyn VisitRepository>>,
    pets: Option<Arc<dyn PetRepository>>,
    preferences: Option<Arc<dyn PreferencesStore>>,
    backend: Option<Arc<dyn AlarmBackend>>,
}

impl CareServiceBuilder {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            reminders: None,
            visits: None,
            pets: None,
            preferences: None,
            backend: None,
        }
    }

    /// Wire all three repositories to one store implementing them.
    pub fn with_repositories<T>(mut self, store: Arc<T>) -> Self
    where
        T: ReminderRepository + VisitRepository + PetRepository + 'static,
    {
        self.reminders = Some(store.clone());
        self.visits = Some(store.clone());
        self.pets = Some(store);
        self
    }

    pub fn with_reminder_repository(mut self, repo: Arc<dyn ReminderRepository>) -> Self {
        self.reminders = Some(repo);
        self
    }

    pub fn with_visit_repository(mut self, repo: Arc<dyn VisitRepository>) -> Self {
        self.visits = Some(repo);
        self
    }

    pub fn with_pet_repository(mut self, repo: Arc<dyn PetRepository>) -> Self {
        self.pets = Some(repo);
        self
    }

    pub fn with_preferences(mut self, store: Arc<dyn PreferencesStore>) -> Self {
        self.preferences = Some(store);
        self
    }

    pub fn with_alarm_backend(mut self, backend: Arc<dyn AlarmBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn build(self) -> Result<CareService, CareError> {
        if self.user_id.trim().is_empty() {
            return Err(CareError::Validation("missing user id".into()));
        }
        let missing = |what: &str| CareError::Validation(format!("missing {what} repository"));
        Ok(CareService {
            user_id: self.user_id,
            reminders: self.reminders.ok_or_else(|| missing("reminder"))?,
            visits: self.visits.ok_or_else(|| missing("visit"))?,
            pets: self.pets.ok_or_else(|| missing("pet"))?,
            preferences: self
                .preferences
                .ok_or_else(|| CareError::Validation("missing preferences store".into()))?,
            engine: self.backend.map(NotificationEngine::new),
            state: RwLock::new(AgendaState::default()),
            build_seq: AtomicU64::new(0),
        })
    }
}

impl CareService {
    pub fn builder(user_id: impl Into<String>) -> CareServiceBuilder {
        CareServiceBuilder::new(user_id)
    }

    /// Rebuild the agenda for `today` from the repositories.
    ///
    /// Each invocation gets a monotonically increasing token; a build that
    /// resolves after a newer build has already installed its result is
    /// discarded (latest wins). Repository failures leave the previous
    /// agenda untouched.
    pub async fn refresh_agenda(&self, today: NaiveDate) -> Result<Vec<AgendaItem>, CareError> {
        let token = self.build_seq.fetch_add(1, Ordering::SeqCst) + 1;

        let (reminders, visits, pets) = tokio::try_join!(
            self.reminders.list_reminders(&self.user_id),
            self.visits.list_visits(&self.user_id),
            self.pets.list_pets(&self.user_id),
        )?;

        let items = agenda::build_agenda(&reminders, &visits, &pets, today);

        let mut state = self.state.write();
        if token <= state.installed_seq {
            tracing::debug!(token, installed = state.installed_seq, "discarding stale agenda build");
            return Ok(state.snapshot());
        }
        state.install(items, token);
        Ok(state.snapshot())
    }

    /// Current agenda, in chronological order.
    pub fn agenda(&self) -> Vec<AgendaItem> {
        self.state.read().snapshot()
    }

    /// Toggle completion of one agenda item.
    ///
    /// The item is updated optimistically, then the mutation is persisted;
    /// if persistence fails only that item is rolled back, by id. Returns
    /// the new completion state.
    pub async fn toggle_item(&self, item_id: &str) -> Result<bool, CareError> {
        let (previous, reminder_id, update) = {
            let mut state = self.state.write();
            let item = state
                .items
                .get_mut(item_id)
                .ok_or_else(|| CareError::Validation(format!("unknown agenda item: {item_id}")))?;
            let previous = item.clone();
            let AgendaSource::Reminder {
                reminder,
                date,
                instance_key,
            } = &mut item.source
            else {
                return Err(CareError::Validation(format!(
                    "agenda item is not a reminder: {item_id}"
                )));
            };

            let update = completion::toggle(reminder, *date, instance_key);
            let reminder_id = reminder.id.clone();
            completion::apply(reminder, &update.change);
            item.completed = Some(update.now_completed);
            (previous, reminder_id, update)
        };

        let patch = ReminderPatch {
            completion: update.change.clone(),
        };
        if let Err(err) = self
            .reminders
            .patch_reminder(&self.user_id, &reminder_id, patch)
            .await
        {
            let mut state = self.state.write();
            if let Some(slot) = state.items.get_mut(item_id) {
                *slot = previous;
            }
            tracing::warn!(item = item_id, %err, "completion patch failed, rolled back");
            return Err(err.into());
        }
        Ok(update.now_completed)
    }

    /// Schedule the next alarm for a single reminder, if a backend is wired.
    pub async fn schedule_reminder(
        &self,
        reminder: &Reminder,
        now: NaiveDateTime,
    ) -> Result<Option<String>, CareError> {
        let Some(engine) = &self.engine else {
            return Ok(None);
        };
        let prefs = self.preferences.get();
        Ok(engine.schedule(reminder, &prefs, now).await?)
    }

    /// Best-effort cancellation of every alarm belonging to a reminder.
    pub async fn cancel_reminder_alarms(&self, reminder_id: &str) -> usize {
        match &self.engine {
            Some(engine) => engine.cancel_for_reminder(reminder_id).await,
            None => 0,
        }
    }

    /// Rebuild the whole alarm set from current reminders and preferences.
    /// Wire this to preference-change notifications from the host.
    pub async fn refresh_notifications(&self, now: NaiveDateTime) -> Result<usize, CareError> {
        let Some(engine) = &self.engine else {
            return Ok(0);
        };
        let reminders = self.reminders.list_reminders(&self.user_id).await?;
        let prefs = self.preferences.get();
        Ok(engine.refresh_all(&reminders, &prefs, now).await)
    }

    /// Delivery callback from the backend; keeps one-shot chains alive.
    pub async fn handle_delivery(
        &self,
        alarm: &ScheduledAlarm,
        now: NaiveDateTime,
    ) -> Result<Option<String>, CareError> {
        let Some(engine) = &self.engine else {
            return Ok(None);
        };
        Ok(engine.on_delivered(alarm, now).await?)
    }

    /// Presentation decision for a notification about to be shown.
    pub fn presentation(&self, now: NaiveDateTime, payload: &AlarmPayload) -> Presentation {
        delivery::should_present(&self.preferences.get(), now, payload)
    }
}
