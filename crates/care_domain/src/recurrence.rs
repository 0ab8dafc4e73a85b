use chrono::{Datelike, NaiveDate, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::model::{Frequency, Reminder};

/// One concrete due instance of a reminder on a specific day, derived on
/// demand and never stored. `instance_key` is empty except for sub-daily
/// reminders, where it disambiguates same-day firings (e.g. `"-16:00"`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Occurrence {
    pub time: NaiveTime,
    pub instance_key: String,
}

/// Whether `reminder` is due at some point on `day`.
///
/// The anchor day always applies, whatever the frequency. After the end
/// date (inclusive) nothing applies. Unknown or absent frequencies degrade
/// to "does not apply" so partially migrated data cannot break the agenda.
pub fn applies_on(reminder: &Reminder, day: NaiveDate) -> bool {
    if let Some(end) = reminder.end_date {
        if day > end {
            return false;
        }
    }

    let anchor = reminder.anchor_day();
    if day == anchor {
        return true;
    }

    let Some(frequency) = reminder.frequency else {
        return false;
    };
    if frequency == Frequency::Once {
        return false;
    }
    if day < anchor {
        return false;
    }

    let diff_days = (day - anchor).num_days();
    match frequency {
        Frequency::Every8Hours | Frequency::Every12Hours | Frequency::Daily => true,
        Frequency::EveryTwoDays => diff_days % 2 == 0,
        Frequency::EveryThreeDays => diff_days % 3 == 0,
        Frequency::Weekly => diff_days % 7 == 0,
        // Raw day-of-month match: an anchor on the 31st skips short months.
        Frequency::Monthly => day.day() == anchor.day(),
        Frequency::Once => false,
    }
}

/// Time-of-day occurrences of `reminder` on `day`, ascending.
///
/// Non-sub-daily reminders yield a single occurrence at the anchor time.
/// Sub-daily ones yield `24 / interval` slots anchored to the first dose's
/// clock time, wrapping past midnight; the anchor day never re-shows a slot
/// earlier than the anchor timestamp itself.
pub fn occurrences_on(reminder: &Reminder, day: NaiveDate) -> Vec<Occurrence> {
    let anchor_time = reminder.scheduled_at.time();
    let interval = reminder.frequency.and_then(Frequency::interval_hours);

    let Some(interval) = interval else {
        return vec![Occurrence {
            time: anchor_time,
            instance_key: String::new(),
        }];
    };

    if day < reminder.anchor_day() {
        return Vec::new();
    }

    let slots = 24 / interval;
    let mut occurrences = Vec::with_capacity(slots as usize);
    for i in 0..slots {
        let hour = (anchor_time.hour() + i * interval) % 24;
        let Some(time) = NaiveTime::from_hms_opt(hour, anchor_time.minute(), 0) else {
            continue;
        };
        if day.and_time(time) < reminder.scheduled_at {
            continue;
        }
        occurrences.push(Occurrence {
            time,
            instance_key: format!("-{:02}:{:02}", hour, anchor_time.minute()),
        });
    }
    occurrences.sort_by_key(|occurrence| occurrence.time);
    occurrences
}
