//! Multi-goal check-in conversation state.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::goals::GoalSummary;
use crate::habits::CheckinStatus;

/// Which single goal a reply is currently expected for.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct AwaitingCheckin {
    pub title: String,
    pub date: NaiveDate,
}

/// Answer given for one goal in a session.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct GoalAnswer {
    pub title: String,
    pub status: CheckinStatus,
}

/// Sequential check-in over the day's active goals.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct CheckinSession {
    pub goals: Vec<GoalSummary>,
    pub current_index: usize,
    pub date: NaiveDate,
    #[serde(default)]
    pub answers: Vec<GoalAnswer>,
}

impl CheckinSession {
    pub fn new(goals: Vec<GoalSummary>, date: NaiveDate) -> Self {
        Self {
            goals,
            current_index: 0,
            date,
            answers: Vec::new(),
        }
    }

    pub fn current(&self) -> Option<&GoalSummary> {
        self.goals.get(self.current_index)
    }

    /// Record an answer for the current goal and move on.
    ///
    /// Returns the next goal, or `None` when the session is finished.
    pub fn answer(&mut self, status: CheckinStatus) -> Option<&GoalSummary> {
        if let Some(goal) = self.goals.get(self.current_index) {
            self.answers.push(GoalAnswer {
                title: goal.title.clone(),
                status,
            });
            self.current_index += 1;
        }
        self.current()
    }

    pub fn is_finished(&self) -> bool {
        self.current_index >= self.goals.len()
    }

    pub fn awaiting(&self) -> Option<AwaitingCheckin> {
        self.current().map(|goal| AwaitingCheckin {
            title: goal.title.clone(),
            date: self.date,
        })
    }

    /// Closing message once every goal has been answered.
    pub fn summary(&self) -> String {
        let done = self
            .answers
            .iter()
            .filter(|a| a.status == CheckinStatus::Done)
            .count();
        let total = self.answers.len();

        let closing = if total > 0 && done == total {
            "Amazing, a clean sweep today!"
        } else if done == 0 {
            "Tomorrow is a fresh start. Small steps count."
        } else {
            "Solid effort. Keep stacking those wins."
        };
        format!(
            "That's everything for today: {} of {} goals done. {} I'll check in again tomorrow.",
            done, total, closing
        )
    }
}

pub fn opening_prompt(goal: &GoalSummary) -> String {
    format!(
        "Hi! Time for your daily check-in. Did you complete \"{}\" today? Reply yes/done or no/missed.",
        goal.title
    )
}

pub fn next_prompt(goal: &GoalSummary) -> String {
    format!("Next up: did you complete \"{}\" today?", goal.title)
}

pub fn acknowledgment(title: &str, status: CheckinStatus) -> String {
    match status {
        CheckinStatus::Done => format!("Nice work on \"{}\"!", title),
        _ => format!("No worries about \"{}\", tomorrow is another chance.", title),
    }
}

pub fn clarification_prompt(title: &str) -> String {
    format!(
        "Sorry, I didn't catch that. Did you complete \"{}\" today? You can reply \"yes\", \"done\", \"no\" or \"missed\".",
        title
    )
}
