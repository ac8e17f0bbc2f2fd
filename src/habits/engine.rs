//! Check-in state machine.
//!
//! A "done" or "miss" event moves a user's `(focus_area, difficulty, task)` triple:
//! - every third completed day promotes difficulty, or advances to the next focus
//!   area once difficulty 3 is reached (wrapping to the first area)
//! - other completed days rotate through the focus area's task list
//! - a miss resets the streak and eases difficulty by one tier

use chrono::{DateTime, NaiveDate, Utc};
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use super::catalog;
use super::progress::{Report, UserProgress, MAX_DIFFICULTY, MIN_DIFFICULTY};

/// Days between regenerated reports.
pub const REPORT_PERIOD_DAYS: u32 = 30;

/// Completed days between promotions.
pub const PROMOTION_EVERY: u32 = 3;

/// Check-in status.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CheckinStatus {
    Done,
    Miss,
    Unknown,
}

impl CheckinStatus {
    pub fn parse(s: &str) -> Self {
        match s {
            "done" => CheckinStatus::Done,
            "miss" => CheckinStatus::Miss,
            _ => CheckinStatus::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CheckinStatus::Done => "done",
            CheckinStatus::Miss => "miss",
            CheckinStatus::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for CheckinStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One logical check-in per user per local calendar day.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct CheckinRecord {
    pub date: NaiveDate,
    pub status: CheckinStatus,
    pub focus_area: String,
    pub task: String,
    pub difficulty: u8,
    pub created_at: DateTime<Utc>,
}

/// Result of applying a check-in.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct CheckinOutcome {
    pub consecutive_days: u32,
    pub current_task: String,
    pub difficulty: u8,
    pub current_focus_area: String,
    pub message: String,
    pub daily_tip: String,
    pub monthly_report: Option<Report>,
    pub total_days_completed: u32,
    pub best_gapless_streak: u32,
    pub missed_days_in_row: u32,
}

/// Apply one check-in event to `progress`.
///
/// Returns the outcome for the caller plus the record to upsert for `today`.
pub fn apply_checkin(
    progress: &mut UserProgress,
    status: CheckinStatus,
    today: NaiveDate,
    now: DateTime<Utc>,
) -> (CheckinOutcome, CheckinRecord) {
    progress.days_elapsed += 1;

    let message = match status {
        CheckinStatus::Done => complete_day(progress),
        CheckinStatus::Miss => miss_day(progress),
        CheckinStatus::Unknown => {
            progress.consecutive_days = 0;
            progress.missed_days_in_row += 1;
            String::new()
        }
    };

    let monthly_report = refresh_report(progress);
    let daily_tip = catalog::random_tip(&progress.current_focus_area);

    tracing::debug!(
        status = %status,
        focus_area = %progress.current_focus_area,
        difficulty = progress.difficulty,
        streak = progress.consecutive_days,
        "Applied check-in"
    );

    let record = CheckinRecord {
        date: today,
        status,
        focus_area: progress.current_focus_area.clone(),
        task: progress.current_task.clone(),
        difficulty: progress.difficulty,
        created_at: now,
    };

    let outcome = CheckinOutcome {
        consecutive_days: progress.consecutive_days,
        current_task: progress.current_task.clone(),
        difficulty: progress.difficulty,
        current_focus_area: progress.current_focus_area.clone(),
        message,
        daily_tip,
        monthly_report,
        total_days_completed: progress.total_days_completed,
        best_gapless_streak: progress.best_gapless_streak,
        missed_days_in_row: progress.missed_days_in_row,
    };

    (outcome, record)
}

fn complete_day(progress: &mut UserProgress) -> String {
    progress.total_days_completed += 1;
    progress.consecutive_days += 1;
    progress.best_gapless_streak = progress.best_gapless_streak.max(progress.consecutive_days);
    progress.missed_days_in_row = 0;

    if progress.total_days_completed % PROMOTION_EVERY == 0 {
        if progress.difficulty < MAX_DIFFICULTY {
            promote_difficulty(progress)
        } else {
            advance_focus_area(progress)
        }
    } else {
        rotate_task(progress);
        String::new()
    }
}

fn promote_difficulty(progress: &mut UserProgress) -> String {
    progress.difficulty += 1;
    let area = progress.current_focus_area.clone();
    progress.current_task = match catalog::task_at(&area, progress.difficulty) {
        Some(task) => task.to_string(),
        None => catalog::get_next_task(&progress.current_task, &area, progress.difficulty),
    };
    format!(
        "You've advanced to difficulty level {} in {}: {}",
        progress.difficulty, area, progress.current_task
    )
}

fn advance_focus_area(progress: &mut UserProgress) -> String {
    let position = progress
        .focus_areas_ordered
        .iter()
        .position(|a| *a == progress.current_focus_area);

    let (next_area, headline) = match position {
        Some(i) if i + 1 < progress.focus_areas_ordered.len() => (
            progress.focus_areas_ordered[i + 1].clone(),
            "Great job! Moving on to next focus area",
        ),
        Some(_) => (
            progress.focus_areas_ordered[0].clone(),
            "You've mastered all focus areas! Restarting with",
        ),
        None => (
            progress
                .focus_areas_ordered
                .first()
                .cloned()
                .unwrap_or_else(|| progress.current_focus_area.clone()),
            "Resetting focus area to",
        ),
    };

    progress.current_focus_area = next_area;
    progress.difficulty = MIN_DIFFICULTY;
    if let Some(task) = catalog::first_task(&progress.current_focus_area) {
        progress.current_task = task.to_string();
    }
    format!(
        "{}: {} - {}",
        headline, progress.current_focus_area, progress.current_task
    )
}

fn rotate_task(progress: &mut UserProgress) {
    let area = progress.current_focus_area.clone();
    let options = catalog::tasks_for(&area);
    let tier_index = usize::from(progress.difficulty).saturating_sub(1);

    if tier_index < options.len() {
        if options.len() > 1 {
            let next = match options.iter().position(|t| *t == progress.current_task) {
                Some(i) => (i + 1) % options.len(),
                None => 0,
            };
            progress.current_task = options[next].to_string();
        } else {
            progress.current_task = options[tier_index].to_string();
        }
    } else {
        progress.current_task =
            catalog::get_next_task(&progress.current_task, &area, progress.difficulty);
    }
}

fn miss_day(progress: &mut UserProgress) -> String {
    progress.consecutive_days = 0;
    progress.missed_days_in_row += 1;
    if progress.difficulty > MIN_DIFFICULTY {
        progress.difficulty -= 1;
    }

    let options = catalog::tasks_for(&progress.current_focus_area);
    if let Some(task) = catalog::task_at(&progress.current_focus_area, progress.difficulty) {
        progress.current_task = task.to_string();
    } else if let Some(task) = options.choose(&mut rand::thread_rng()) {
        progress.current_task = task.to_string();
    }

    "You skipped today. Your streak has been reset.".to_string()
}

fn refresh_report(progress: &mut UserProgress) -> Option<Report> {
    if progress.days_elapsed % REPORT_PERIOD_DAYS == 0 {
        let report = progress.build_report();
        progress.last_report_day = Some(progress.days_elapsed);
        progress.last_report_content = Some(report.clone());
        Some(report)
    } else {
        progress.last_report_content.clone()
    }
}

/// Response for an explicit report request.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(untagged)]
pub enum MonthlyReport {
    Ready(Report),
    NotReady { message: String },
}

pub fn monthly_report(progress: &UserProgress) -> MonthlyReport {
    if progress.days_elapsed < REPORT_PERIOD_DAYS {
        return MonthlyReport::NotReady {
            message: format!(
                "Monthly report not available yet. You've only logged {} days.",
                progress.days_elapsed
            ),
        };
    }
    MonthlyReport::Ready(progress.build_report())
}

/// Reminder for the current task with a contextual tip.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct DailyNotification {
    pub reminder: String,
    pub extra_tip: String,
}

pub fn daily_notification(progress: &UserProgress) -> DailyNotification {
    DailyNotification {
        reminder: format!(
            "Don't forget to complete your task today: {}",
            progress.current_task
        ),
        extra_tip: format!(
            "Health Boost: {}",
            catalog::random_tip(&progress.current_focus_area)
        ),
    }
}
