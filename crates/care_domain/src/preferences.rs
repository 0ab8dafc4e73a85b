use std::collections::HashMap;

use chrono::{NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::model::ReminderType;

/// User-configured window during which alerts are silenced but still badge.
/// The window may wrap past midnight (22 -> 7). `start_hour == end_hour`
/// means the window is empty.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuietHours {
    pub start_hour: u32,
    pub end_hour: u32,
}

impl QuietHours {
    pub fn contains(&self, time: NaiveTime) -> bool {
        let hour = time.hour();
        if self.start_hour == self.end_hour {
            false
        } else if self.start_hour < self.end_hour {
            hour >= self.start_hour && hour < self.end_hour
        } else {
            hour >= self.start_hour || hour < self.end_hour
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TypePreference {
    pub enabled: bool,
    pub advance_minutes: i64,
}

impl Default for TypePreference {
    fn default() -> Self {
        Self {
            enabled: true,
            advance_minutes: 0,
        }
    }
}

/// Snapshot of the user's notification preferences. Always passed explicitly
/// into scheduling and delivery decisions; nothing reads ambient state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationPreferences {
    pub enabled: bool,
    pub sound: bool,
    #[serde(default)]
    pub per_type: HashMap<ReminderType, TypePreference>,
    #[serde(default)]
    pub quiet_hours: Option<QuietHours>,
}

impl Default for NotificationPreferences {
    fn default() -> Self {
        Self {
            enabled: true,
            sound: true,
            per_type: HashMap::new(),
            quiet_hours: None,
        }
    }
}

impl NotificationPreferences {
    /// Per-type settings, defaulting to enabled with no advance offset for
    /// types the user never touched.
    pub fn type_pref(&self, kind: ReminderType) -> TypePreference {
        self.per_type.get(&kind).copied().unwrap_or_default()
    }

    pub fn is_quiet(&self, time: NaiveTime) -> bool {
        self.quiet_hours
            .map(|window| window.contains(time))
            .unwrap_or(false)
    }
}

/// External preference source. Change notifications on the host side should
/// be wired to `CareService::refresh_notifications`.
pub trait PreferencesStore: Send + Sync {
    fn get(&self) -> NotificationPreferences;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn time(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn quiet_hours_wrap_past_midnight() {
        let window = QuietHours {
            start_hour: 22,
            end_hour: 7,
        };
        assert!(window.contains(time(23, 0)));
        assert!(window.contains(time(3, 0)));
        assert!(window.contains(time(22, 0)));
        assert!(!window.contains(time(12, 0)));
        assert!(!window.contains(time(7, 0)));
    }

    #[test]
    fn non_wrapping_window_is_half_open() {
        let window = QuietHours {
            start_hour: 13,
            end_hour: 15,
        };
        assert!(window.contains(time(13, 0)));
        assert!(window.contains(time(14, 59)));
        assert!(!window.contains(time(15, 0)));
        assert!(!window.contains(time(12, 59)));
    }

    #[test]
    fn equal_start_and_end_is_an_empty_window() {
        let window = QuietHours {
            start_hour: 8,
            end_hour: 8,
        };
        assert!(!window.contains(time(8, 0)));
        assert!(!window.contains(time(20, 0)));
    }

    #[test]
    fn untouched_types_default_to_enabled() {
        let prefs = NotificationPreferences::default();
        let pref = prefs.type_pref(ReminderType::Grooming);
        assert!(pref.enabled);
        assert_eq!(pref.advance_minutes, 0);
    }
}
