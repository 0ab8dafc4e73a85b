use std::collections::BTreeSet;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Category of a care task. Drives notification channel routing and the
/// per-type preference lookup.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReminderType {
    Medication,
    VetAppointment,
    Vaccine,
    Antiparasitic,
    Hygiene,
    Grooming,
    Food,
    Walk,
    Training,
    Other,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Frequency {
    Once,
    #[serde(rename = "EVERY_8_HOURS")]
    Every8Hours,
    #[serde(rename = "EVERY_12_HOURS")]
    Every12Hours,
    Daily,
    EveryTwoDays,
    EveryThreeDays,
    Weekly,
    Monthly,
}

impl Frequency {
    /// Hours between firings for sub-daily frequencies.
    pub fn interval_hours(self) -> Option<u32> {
        match self {
            Frequency::Every8Hours => Some(8),
            Frequency::Every12Hours => Some(12),
            _ => None,
        }
    }

    /// Days between firings for the frequencies the platform scheduler
    /// cannot repeat natively.
    pub fn interval_days(self) -> Option<i64> {
        match self {
            Frequency::EveryTwoDays => Some(2),
            Frequency::EveryThreeDays => Some(3),
            _ => None,
        }
    }

    pub fn is_recurring(self) -> bool {
        !matches!(self, Frequency::Once)
    }
}

/// A recurring or one-off care task. `scheduled_at` is the anchor: the first
/// occurrence, whose time-of-day is the template for all later ones.
///
/// Completion has exactly one authoritative source: the `completed` flag for
/// one-off reminders, the `completed_dates` key set for recurring ones.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Reminder {
    pub id: String,
    pub title: String,
    #[serde(rename = "type")]
    pub kind: ReminderType,
    pub scheduled_at: NaiveDateTime,
    #[serde(default)]
    pub frequency: Option<Frequency>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub pet_id: Option<String>,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub completed_dates: BTreeSet<String>,
}

impl Reminder {
    /// Whether completion is tracked per occurrence rather than as a single
    /// flag. Absent frequency is treated as once.
    pub fn is_recurring(&self) -> bool {
        self.frequency.map(Frequency::is_recurring).unwrap_or(false)
    }

    pub fn anchor_day(&self) -> NaiveDate {
        self.scheduled_at.date()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Pet {
    pub id: String,
    pub name: String,
}

/// Scheduled vet visit, read-only to the core.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VetVisit {
    pub id: String,
    pub pet_id: String,
    pub date: NaiveDateTime,
    pub reason: String,
}
