use std::collections::HashMap;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::completion;
use crate::model::{Pet, Reminder, VetVisit};
use crate::recurrence;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum AgendaKind {
    Reminder,
    Visit,
}

/// Back-reference from an agenda item to the entity it was built from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum AgendaSource {
    Reminder {
        reminder: Reminder,
        date: NaiveDate,
        instance_key: String,
    },
    Visit(VetVisit),
}

/// One row of the "today" view: a reminder occurrence or a vet visit. Built
/// fresh on every agenda pass, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AgendaItem {
    pub id: String,
    pub kind: AgendaKind,
    pub time: NaiveDateTime,
    pub title: String,
    pub subtitle: Option<String>,
    pub completed: Option<bool>,
    pub source: AgendaSource,
}

/// Merge the reminders due on `today` with same-day vet visits into one
/// chronologically ordered list. Ties keep insertion order: reminders first,
/// then visits, each in source order.
pub fn build_agenda(
    reminders: &[Reminder],
    visits: &[VetVisit],
    pets: &[Pet],
    today: NaiveDate,
) -> Vec<AgendaItem> {
    let pet_names: HashMap<&str, &str> = pets
        .iter()
        .map(|pet| (pet.id.as_str(), pet.name.as_str()))
        .collect();

    let mut items = Vec::new();

    for reminder in reminders {
        if !recurrence::applies_on(reminder, today) {
            continue;
        }
        let subtitle = reminder
            .pet_id
            .as_deref()
            .and_then(|id| pet_names.get(id))
            .map(|name| name.to_string());
        for occurrence in recurrence::occurrences_on(reminder, today) {
            items.push(AgendaItem {
                id: format!("{}{}", reminder.id, occurrence.instance_key),
                kind: AgendaKind::Reminder,
                time: today.and_time(occurrence.time),
                title: reminder.title.clone(),
                subtitle: subtitle.clone(),
                completed: Some(completion::is_completed(
                    reminder,
                    today,
                    &occurrence.instance_key,
                )),
                source: AgendaSource::Reminder {
                    reminder: reminder.clone(),
                    date: today,
                    instance_key: occurrence.instance_key,
                },
            });
        }
    }

    let day_start = today.and_hms_opt(0, 0, 0).expect("midnight is valid");
    let day_end = day_start + chrono::Duration::days(1);
    for visit in visits {
        if visit.date < day_start || visit.date >= day_end {
            continue;
        }
        let subtitle = pet_names.get(visit.pet_id.as_str()).map(|name| name.to_string());
        items.push(AgendaItem {
            id: visit.id.clone(),
            kind: AgendaKind::Visit,
            time: visit.date,
            title: visit.reason.clone(),
            subtitle,
            completed: None,
            source: AgendaSource::Visit(visit.clone()),
        });
    }

    // Vec::sort_by is stable, so equal times preserve insertion order.
    items.sort_by(|a, b| a.time.cmp(&b.time));
    items
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Frequency, ReminderType};

    fn reminder(id: &str, frequency: Option<Frequency>, scheduled_at: &str) -> Reminder {
        Reminder {
            id: id.into(),
            title: format!("task {id}"),
            kind: ReminderType::Medication,
            scheduled_at: scheduled_at.parse().unwrap(),
            frequency,
            end_date: None,
            pet_id: Some("p1".into()),
            completed: false,
            completed_dates: Default::default(),
        }
    }

    fn visit(id: &str, date: &str) -> VetVisit {
        VetVisit {
            id: id.into(),
            pet_id: "p1".into(),
            date: date.parse().unwrap(),
            reason: "Checkup".into(),
        }
    }

    fn pets() -> Vec<Pet> {
        vec![Pet {
            id: "p1".into(),
            name: "Mila".into(),
        }]
    }

    fn day(text: &str) -> NaiveDate {
        text.parse().unwrap()
    }

    #[test]
    fn orders_reminders_and_visits_by_time() {
        let reminders = vec![reminder("r1", Some(Frequency::Daily), "2024-01-01T09:00:00")];
        let visits = vec![visit("v1", "2024-01-05T10:00:00")];
        let agenda = build_agenda(&reminders, &visits, &pets(), day("2024-01-05"));

        assert_eq!(agenda.len(), 2);
        assert_eq!(agenda[0].id, "r1");
        assert_eq!(agenda[0].kind, AgendaKind::Reminder);
        assert_eq!(agenda[1].id, "v1");
        assert_eq!(agenda[1].kind, AgendaKind::Visit);
    }

    #[test]
    fn filters_visits_outside_the_day_window() {
        let visits = vec![
            visit("v1", "2024-01-04T23:59:00"),
            visit("v2", "2024-01-05T00:00:00"),
            visit("v3", "2024-01-06T00:00:00"),
        ];
        let agenda = build_agenda(&[], &visits, &pets(), day("2024-01-05"));
        assert_eq!(agenda.len(), 1);
        assert_eq!(agenda[0].id, "v2");
    }

    #[test]
    fn sub_daily_reminders_get_unique_item_ids() {
        let reminders = vec![reminder("r1", Some(Frequency::Every12Hours), "2024-01-01T07:30:00")];
        let agenda = build_agenda(&reminders, &[], &pets(), day("2024-01-03"));
        let ids: Vec<&str> = agenda.iter().map(|item| item.id.as_str()).collect();
        assert_eq!(ids, vec!["r1-07:30", "r1-19:30"]);
    }

    #[test]
    fn resolves_pet_name_as_subtitle() {
        let reminders = vec![reminder("r1", Some(Frequency::Daily), "2024-01-01T09:00:00")];
        let agenda = build_agenda(&reminders, &[], &pets(), day("2024-01-02"));
        assert_eq!(agenda[0].subtitle.as_deref(), Some("Mila"));
    }

    #[test]
    fn reflects_per_occurrence_completion() {
        let mut r = reminder("r1", Some(Frequency::Daily), "2024-01-01T09:00:00");
        r.completed_dates.insert("2024-01-02".into());
        let agenda = build_agenda(&[r], &[], &pets(), day("2024-01-02"));
        assert_eq!(agenda[0].completed, Some(true));
    }

    #[test]
    fn equal_times_keep_reminders_before_visits() {
        let reminders = vec![reminder("r1", Some(Frequency::Daily), "2024-01-01T10:00:00")];
        let visits = vec![visit("v1", "2024-01-05T10:00:00")];
        let agenda = build_agenda(&reminders, &visits, &pets(), day("2024-01-05"));
        assert_eq!(agenda[0].id, "r1");
        assert_eq!(agenda[1].id, "v1");
    }
}
