use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::notify::AlarmPayload;
use crate::preferences::NotificationPreferences;

/// How a notification about to be shown should present itself.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Presentation {
    pub show_alert: bool,
    pub play_sound: bool,
    pub set_badge: bool,
}

impl Presentation {
    pub const SUPPRESSED: Presentation = Presentation {
        show_alert: false,
        play_sound: false,
        set_badge: false,
    };
}

/// Pure delivery gate, evaluated by the OS notification host at delivery
/// time. Depends on nothing but its three inputs. Quiet hours silence the
/// alert but keep the badge so the user still sees an unread count.
pub fn should_present(
    prefs: &NotificationPreferences,
    now: NaiveDateTime,
    payload: &AlarmPayload,
) -> Presentation {
    if !prefs.enabled {
        return Presentation::SUPPRESSED;
    }
    if prefs.is_quiet(now.time()) {
        return Presentation {
            show_alert: false,
            play_sound: false,
            set_badge: true,
        };
    }
    if !prefs.type_pref(payload.reminder_type).enabled {
        return Presentation::SUPPRESSED;
    }
    Presentation {
        show_alert: true,
        play_sound: prefs.sound,
        set_badge: true,
    }
}
