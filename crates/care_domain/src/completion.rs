use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::model::Reminder;

/// Identity of one occurrence for completion tracking: the calendar day plus
/// the sub-daily instance suffix, e.g. `2024-01-05` or `2024-01-05-16:00`.
pub fn occurrence_key(day: NaiveDate, instance_key: &str) -> String {
    format!("{}{}", day.format("%Y-%m-%d"), instance_key)
}

/// Persistable completion mutation computed by [`toggle`]. The caller applies
/// it through the reminder repository; nothing here performs I/O.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CompletionUpdate {
    pub now_completed: bool,
    pub change: CompletionChange,
}

/// Single-key delta rather than a whole-set replacement: a toggle computed
/// from a stale copy of the reminder can never erase completions persisted
/// for other occurrences in the meantime.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum CompletionChange {
    /// New value of the `completed` flag (one-off reminders).
    Flag(bool),
    /// Mark one occurrence key completed (recurring reminders).
    AddDate(String),
    /// Clear one occurrence key (recurring reminders).
    RemoveDate(String),
}

pub fn is_completed(reminder: &Reminder, day: NaiveDate, instance_key: &str) -> bool {
    if reminder.is_recurring() {
        reminder
            .completed_dates
            .contains(&occurrence_key(day, instance_key))
    } else {
        reminder.completed
    }
}

/// Flip the completion state of one occurrence. Set semantics make a double
/// toggle restore the original state exactly.
pub fn toggle(reminder: &Reminder, day: NaiveDate, instance_key: &str) -> CompletionUpdate {
    if reminder.is_recurring() {
        let key = occurrence_key(day, instance_key);
        if reminder.completed_dates.contains(&key) {
            CompletionUpdate {
                now_completed: false,
                change: CompletionChange::RemoveDate(key),
            }
        } else {
            CompletionUpdate {
                now_completed: true,
                change: CompletionChange::AddDate(key),
            }
        }
    } else {
        let now_completed = !reminder.completed;
        CompletionUpdate {
            now_completed,
            change: CompletionChange::Flag(now_completed),
        }
    }
}

/// Apply a previously computed change to an in-memory reminder. Used for the
/// optimistic agenda update and by the in-memory repository.
pub fn apply(reminder: &mut Reminder, change: &CompletionChange) {
    match change {
        CompletionChange::Flag(value) => reminder.completed = *value,
        CompletionChange::AddDate(key) => {
            reminder.completed_dates.insert(key.clone());
        }
        CompletionChange::RemoveDate(key) => {
            reminder.completed_dates.remove(key);
        }
    }
}
