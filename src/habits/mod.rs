//! Habit catalog, per-user progress and the check-in state machine.

pub mod catalog;
pub mod engine;
pub mod progress;

pub use engine::{
    apply_checkin, daily_notification, monthly_report, CheckinOutcome, CheckinRecord,
    CheckinStatus, DailyNotification, MonthlyReport,
};
pub use progress::{generate_plan, PlanSummary, Report, UserProgress};
