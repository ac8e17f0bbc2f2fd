//! Local-time resolution for per-user check-in schedules.

use chrono::{DateTime, NaiveDate, NaiveTime, Timelike, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::error::{Error, Result};

/// Zone used when neither the stored name nor the configured default parses.
pub const FALLBACK_TIMEZONE: Tz = chrono_tz::America::Los_Angeles;

/// Per-user notification preferences.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Preferences {
    pub tz: String,
    pub checkin_time: String,
    #[serde(default)]
    pub channels: BTreeSet<String>,
}

impl Preferences {
    /// Validate a preferences update. The timezone is kept as given even when
    /// unknown; resolution falls back at fire time.
    pub fn validate(&self) -> Result<()> {
        if parse_checkin_time(&self.checkin_time).is_none() {
            return Err(Error::Validation(format!(
                "checkin_time '{}' must be HH:MM (24h)",
                self.checkin_time
            )));
        }
        Ok(())
    }

    pub fn timezone(&self, fallback: Tz) -> Tz {
        resolve_timezone(&self.tz, fallback)
    }

    pub fn local_now(&self, now: DateTime<Utc>, fallback: Tz) -> DateTime<Tz> {
        now.with_timezone(&self.timezone(fallback))
    }

    pub fn local_today(&self, now: DateTime<Utc>, fallback: Tz) -> NaiveDate {
        self.local_now(now, fallback).date_naive()
    }
}

/// Parse "HH:MM" 24h into (hour, minute).
pub fn parse_checkin_time(value: &str) -> Option<(u32, u32)> {
    let time = NaiveTime::parse_from_str(value.trim(), "%H:%M").ok()?;
    Some((time.hour(), time.minute()))
}

pub fn resolve_timezone(name: &str, fallback: Tz) -> Tz {
    name.trim().parse::<Tz>().unwrap_or_else(|_| {
        tracing::warn!(tz = name, "Unknown timezone, using {}", fallback);
        fallback
    })
}

/// If `now` falls in the preferred check-in minute, return the user's local date.
pub fn due_date(prefs: &Preferences, now: DateTime<Utc>, fallback: Tz) -> Option<NaiveDate> {
    let (hour, minute) = parse_checkin_time(&prefs.checkin_time)?;
    let local = prefs.local_now(now, fallback);
    (local.hour() == hour && local.minute() == minute).then(|| local.date_naive())
}
