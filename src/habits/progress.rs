//! Per-user habit progress and plan generation.

use serde::{Deserialize, Serialize};

use super::catalog::{self, DEFAULT_SCORES, FOCUS_AREAS};

pub const MIN_DIFFICULTY: u8 = 1;
pub const MAX_DIFFICULTY: u8 = 3;

/// Task shown before any plan has been generated.
pub const UNASSIGNED_TASK: &str = "No task assigned.";

/// Periodic progress report.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Report {
    pub message: String,
    pub best_gapless_streak: u32,
    pub motivation: String,
}

/// Mutable progression record, one per user.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct UserProgress {
    pub consecutive_days: u32,
    pub total_days_completed: u32,
    pub best_gapless_streak: u32,
    pub missed_days_in_row: u32,
    pub current_focus_area: String,
    pub current_task: String,
    pub difficulty: u8,
    pub focus_areas_ordered: Vec<String>,
    pub days_elapsed: u32,
    pub last_report_day: Option<u32>,
    pub last_report_content: Option<Report>,
}

impl UserProgress {
    /// Fresh progress starting at tier 1 of the first focus area.
    pub fn new(focus_areas_ordered: Vec<String>) -> Self {
        let focus_areas_ordered = if focus_areas_ordered.is_empty() {
            FOCUS_AREAS.iter().map(|a| a.to_string()).collect()
        } else {
            focus_areas_ordered
        };
        let current_focus_area = focus_areas_ordered[0].clone();
        let current_task = catalog::first_task(&current_focus_area)
            .unwrap_or(UNASSIGNED_TASK)
            .to_string();

        Self {
            consecutive_days: 0,
            total_days_completed: 0,
            best_gapless_streak: 0,
            missed_days_in_row: 0,
            current_focus_area,
            current_task,
            difficulty: MIN_DIFFICULTY,
            focus_areas_ordered,
            days_elapsed: 0,
            last_report_day: None,
            last_report_content: None,
        }
    }

    /// Progress ordered by the default score table.
    pub fn with_default_plan() -> Self {
        Self::new(order_focus_areas(&default_scores()))
    }

    /// Build the report for the current state.
    pub fn build_report(&self) -> Report {
        Report {
            message: format!(
                "This past month, you tackled {} and reached difficulty level {}!",
                self.current_focus_area, self.difficulty
            ),
            best_gapless_streak: self.best_gapless_streak,
            motivation: format!(
                "You've completed {} health improvement days! Your best streak without skipping is {} days. Keep it up!",
                self.total_days_completed, self.best_gapless_streak
            ),
        }
    }
}

/// Result of generating a plan.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct PlanSummary {
    pub estimated_timeline_weeks: u32,
    pub focus_areas: Vec<String>,
    pub suggested_habits: Vec<String>,
    pub assigned_task: String,
    pub current_focus_area: String,
    pub difficulty: u8,
    pub consecutive_days: u32,
    pub missed_days_in_row: u32,
}

pub fn default_scores() -> Vec<(String, i32)> {
    DEFAULT_SCORES
        .iter()
        .map(|(area, score)| (area.to_string(), *score))
        .collect()
}

/// Order known focus areas weakest-first. Ties keep their input order.
pub fn order_focus_areas(scores: &[(String, i32)]) -> Vec<String> {
    let mut known: Vec<&(String, i32)> = scores
        .iter()
        .filter(|(area, _)| !catalog::tasks_for(area).is_empty())
        .collect();
    known.sort_by_key(|(_, score)| *score);

    if known.is_empty() {
        return FOCUS_AREAS.iter().map(|a| a.to_string()).collect();
    }
    known.into_iter().map(|(area, _)| area.clone()).collect()
}

/// (Re)initialise a user's plan.
///
/// Streak counters and the current task are reset. `days_elapsed`, the miss run
/// and the cached report carry over from `existing`.
pub fn generate_plan(
    existing: Option<&UserProgress>,
    scores: &[(String, i32)],
) -> (UserProgress, PlanSummary) {
    let ordered = order_focus_areas(scores);
    let mut progress = UserProgress::new(ordered.clone());
    if let Some(prev) = existing {
        progress.days_elapsed = prev.days_elapsed;
        progress.missed_days_in_row = prev.missed_days_in_row;
        progress.last_report_day = prev.last_report_day;
        progress.last_report_content = prev.last_report_content.clone();
    }

    let focus_areas: Vec<String> = ordered.iter().take(3).cloned().collect();
    let suggested_habits = focus_areas
        .iter()
        .map(|area| {
            catalog::first_task(area)
                .unwrap_or("Stretch every morning")
                .to_string()
        })
        .collect();

    let summary = PlanSummary {
        estimated_timeline_weeks: 6,
        focus_areas,
        suggested_habits,
        assigned_task: progress.current_task.clone(),
        current_focus_area: progress.current_focus_area.clone(),
        difficulty: progress.difficulty,
        consecutive_days: progress.consecutive_days,
        missed_days_in_row: progress.missed_days_in_row,
    };

    (progress, summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_order_is_weakest_first() {
        let ordered = order_focus_areas(&default_scores());
        assert_eq!(
            ordered,
            vec![
                "Habits",
                "Social Connection",
                "Physical Health",
                "Nutrition",
                "Sleep & Recovery",
                "Emotional Health",
                "Medical History",
            ]
        );
    }

    #[test]
    fn test_unknown_areas_are_dropped() {
        let scores = vec![("Karaoke".to_string(), 1), ("Nutrition".to_string(), 2)];
        assert_eq!(order_focus_areas(&scores), vec!["Nutrition"]);
        assert_eq!(
            order_focus_areas(&[("Karaoke".to_string(), 1)]).len(),
            FOCUS_AREAS.len()
        );
    }

    #[test]
    fn test_generate_plan_resets_streaks_but_keeps_elapsed_and_misses() {
        let mut old = UserProgress::with_default_plan();
        old.consecutive_days = 4;
        old.total_days_completed = 9;
        old.difficulty = 3;
        old.days_elapsed = 12;
        old.missed_days_in_row = 4;

        let (progress, summary) = generate_plan(Some(&old), &default_scores());
        assert_eq!(progress.missed_days_in_row, 4);
        assert_eq!(summary.missed_days_in_row, 4);
        assert_eq!(progress.consecutive_days, 0);
        assert_eq!(progress.total_days_completed, 0);
        assert_eq!(progress.difficulty, 1);
        assert_eq!(progress.days_elapsed, 12);
        assert_eq!(progress.current_focus_area, "Habits");
        assert_eq!(progress.current_task, "Use a habit tracker daily");
        assert_eq!(summary.focus_areas.len(), 3);
        assert_eq!(
            summary.suggested_habits,
            vec![
                "Use a habit tracker daily",
                "Message one friend",
                "Stretch every morning"
            ]
        );
    }
}
