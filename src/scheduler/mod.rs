//! Proactive check-in scheduling.

pub mod clock;
pub mod daemon;

pub use clock::{due_date, parse_checkin_time, resolve_timezone, Preferences, FALLBACK_TIMEZONE};
pub use daemon::{run_scheduler, CheckinScheduler, TickReport};
