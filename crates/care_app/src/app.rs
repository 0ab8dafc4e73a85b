use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use care_domain::memory::{InMemoryAlarmBackend, InMemoryStore, StaticPreferences};
use care_domain::model::{Frequency, Pet, Reminder, ReminderType, VetVisit};
use care_domain::notify::AlarmSchedule;
use care_domain::CareService;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub user: String,
    pub data_file: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            user: "local".to_string(),
            data_file: None,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        if let Ok(user) = std::env::var("TAILKEEP_USER") {
            anyhow::ensure!(!user.trim().is_empty(), "TAILKEEP_USER is empty");
            config.user = user;
        }
        if let Ok(path) = std::env::var("TAILKEEP_DATA") {
            config.data_file = Some(PathBuf::from(path));
        }
        Ok(config)
    }
}

/// Data loaded into the in-memory repositories at startup.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SeedData {
    #[serde(default)]
    pub reminders: Vec<Reminder>,
    #[serde(default)]
    pub visits: Vec<VetVisit>,
    #[serde(default)]
    pub pets: Vec<Pet>,
}

pub fn load_seed(path: &PathBuf) -> Result<SeedData> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read seed data from {}", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("failed to parse seed data in {}", path.display()))
}

fn sample_seed() -> SeedData {
    let today = chrono::Local::now().date_naive();
    let anchor = |h: u32, m: u32| today.and_hms_opt(h, m, 0).expect("valid time");
    SeedData {
        reminders: vec![
            Reminder {
                id: "heartworm".into(),
                title: "Heartworm pill".into(),
                kind: ReminderType::Medication,
                scheduled_at: anchor(9, 0),
                frequency: Some(Frequency::Monthly),
                end_date: None,
                pet_id: Some("mila".into()),
                completed: false,
                completed_dates: Default::default(),
            },
            Reminder {
                id: "antibiotic".into(),
                title: "Antibiotic dose".into(),
                kind: ReminderType::Medication,
                scheduled_at: anchor(8, 0),
                frequency: Some(Frequency::Every8Hours),
                end_date: Some(today + chrono::Duration::days(7)),
                pet_id: Some("mila".into()),
                completed: false,
                completed_dates: Default::default(),
            },
            Reminder {
                id: "walk".into(),
                title: "Evening walk".into(),
                kind: ReminderType::Walk,
                scheduled_at: anchor(18, 30),
                frequency: Some(Frequency::Daily),
                end_date: None,
                pet_id: Some("rex".into()),
                completed: false,
                completed_dates: Default::default(),
            },
        ],
        visits: vec![VetVisit {
            id: "checkup".into(),
            pet_id: "rex".into(),
            date: anchor(11, 0),
            reason: "Annual checkup".into(),
        }],
        pets: vec![
            Pet {
                id: "mila".into(),
                name: "Mila".into(),
            },
            Pet {
                id: "rex".into(),
                name: "Rex".into(),
            },
        ],
    }
}

pub async fn run(config: AppConfig) -> Result<()> {
    let seed = match &config.data_file {
        Some(path) => load_seed(path)?,
        None => sample_seed(),
    };
    tracing::info!(
        reminders = seed.reminders.len(),
        visits = seed.visits.len(),
        pets = seed.pets.len(),
        "seeded repositories"
    );

    let store = Arc::new(InMemoryStore::new(seed.reminders, seed.visits, seed.pets));
    let backend = Arc::new(InMemoryAlarmBackend::new());
    let service = CareService::builder(config.user.clone())
        .with_repositories(store)
        .with_preferences(Arc::new(StaticPreferences::default()))
        .with_alarm_backend(backend.clone())
        .build()?;

    let now = chrono::Local::now().naive_local();
    let today = now.date();

    let items = service.refresh_agenda(today).await?;
    println!("Agenda for {today}:");
    if items.is_empty() {
        println!("  (nothing due)");
    }
    for item in &items {
        let state = match item.completed {
            Some(true) => "[x]",
            Some(false) => "[ ]",
            None => "   ",
        };
        let subtitle = item.subtitle.as_deref().unwrap_or("-");
        println!("  {} {} {} ({subtitle})", item.time.format("%H:%M"), state, item.title);
    }

    let scheduled = service.refresh_notifications(now).await?;
    println!("\nScheduled {scheduled} alarm(s):");
    for alarm in backend.snapshot() {
        match alarm.schedule {
            AlarmSchedule::OneShot(fire_at) => {
                println!("  {} one-shot at {}", alarm.content.title, fire_at);
            }
            AlarmSchedule::Repeating(rule) => {
                println!("  {} repeating {:?}", alarm.content.title, rule);
            }
        }
    }
    Ok(())
}
