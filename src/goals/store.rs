//! Per-user goal collection.
//!
//! Titles are unique among active goals after normalization (trimmed, lowercased,
//! inner whitespace collapsed). Creating a goal whose title matches an active one
//! returns the existing goal.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::{Error, Result};

/// How often a goal is expected to be checked.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Cadence {
    #[default]
    Daily,
    Weekdays,
    Weekly,
    Monthly,
}

impl FromStr for Cadence {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "daily" => Ok(Cadence::Daily),
            "weekdays" => Ok(Cadence::Weekdays),
            "weekly" => Ok(Cadence::Weekly),
            "monthly" => Ok(Cadence::Monthly),
            other => Err(Error::Validation(format!("Unknown cadence: {}", other))),
        }
    }
}

impl std::fmt::Display for Cadence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Cadence::Daily => write!(f, "daily"),
            Cadence::Weekdays => write!(f, "weekdays"),
            Cadence::Weekly => write!(f, "weekly"),
            Cadence::Monthly => write!(f, "monthly"),
        }
    }
}

/// A user-defined goal.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Goal {
    pub id: String,
    pub title: String,
    pub category: String,
    pub cadence: Cadence,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Denormalized view of an active goal, read by the scheduler.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct GoalSummary {
    pub title: String,
    pub category: String,
    pub cadence: Cadence,
}

impl From<&Goal> for GoalSummary {
    fn from(goal: &Goal) -> Self {
        Self {
            title: goal.title.clone(),
            category: goal.category.clone(),
            cadence: goal.cadence,
        }
    }
}

/// Create goal input.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct NewGoal {
    pub title: String,
    pub category: Option<String>,
    pub cadence: Option<Cadence>,
}

/// Partial goal update.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct GoalPatch {
    pub title: Option<String>,
    pub category: Option<String>,
    pub cadence: Option<Cadence>,
    pub active: Option<bool>,
}

pub const DEFAULT_CATEGORY: &str = "general";

/// Normalize a title for uniqueness comparisons.
pub fn normalize_title(title: &str) -> String {
    title
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct GoalStore {
    goals: Vec<Goal>,
}

impl GoalStore {
    pub fn new() -> Self {
        Self { goals: Vec::new() }
    }

    /// Rebuild from persisted goals.
    pub fn from_goals(goals: Vec<Goal>) -> Self {
        Self { goals }
    }

    pub fn list(&self) -> &[Goal] {
        &self.goals
    }

    pub fn get(&self, id: &str) -> Option<&Goal> {
        self.goals.iter().find(|g| g.id == id)
    }

    pub fn find_active_by_title(&self, title: &str) -> Option<&Goal> {
        let wanted = normalize_title(title);
        self.goals
            .iter()
            .find(|g| g.active && normalize_title(&g.title) == wanted)
    }

    /// Create a goal, or return the active goal that already has this title.
    ///
    /// The boolean is `true` when a new goal was created.
    pub fn create(&mut self, new: NewGoal, now: DateTime<Utc>) -> Result<(Goal, bool)> {
        let title = new.title.trim();
        if title.is_empty() {
            return Err(Error::Validation("Goal title is required".to_string()));
        }

        if let Some(existing) = self.find_active_by_title(title) {
            return Ok((existing.clone(), false));
        }

        let category = new
            .category
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| DEFAULT_CATEGORY.to_string());

        let goal = Goal {
            id: uuid::Uuid::new_v4().to_string(),
            title: title.to_string(),
            category,
            cadence: new.cadence.unwrap_or_default(),
            active: true,
            created_at: now,
            updated_at: None,
        };
        self.goals.push(goal.clone());
        Ok((goal, true))
    }

    /// Apply a partial update and stamp `updated_at`.
    pub fn patch(&mut self, id: &str, patch: GoalPatch, now: DateTime<Utc>) -> Result<Goal> {
        let index = self
            .goals
            .iter()
            .position(|g| g.id == id)
            .ok_or_else(|| Error::NotFound(format!("Goal {} not found", id)))?;

        let title = match &patch.title {
            Some(t) if t.trim().is_empty() => {
                return Err(Error::Validation("Goal title cannot be empty".to_string()))
            }
            Some(t) => t.trim().to_string(),
            None => self.goals[index].title.clone(),
        };
        let active = patch.active.unwrap_or(self.goals[index].active);

        if active {
            let wanted = normalize_title(&title);
            let clash = self
                .goals
                .iter()
                .any(|g| g.id != id && g.active && normalize_title(&g.title) == wanted);
            if clash {
                return Err(Error::Validation(format!(
                    "An active goal titled '{}' already exists",
                    title
                )));
            }
        }

        let goal = &mut self.goals[index];
        goal.title = title;
        goal.active = active;
        if let Some(category) = patch.category {
            goal.category = category.trim().to_string();
        }
        if let Some(cadence) = patch.cadence {
            goal.cadence = cadence;
        }
        goal.updated_at = Some(now);
        Ok(goal.clone())
    }

    /// Hard delete by id. Returns the number removed.
    pub fn delete(&mut self, id: &str) -> usize {
        let before = self.goals.len();
        self.goals.retain(|g| g.id != id);
        before - self.goals.len()
    }

    /// Hard delete every goal with a matching normalized title.
    pub fn delete_by_title(&mut self, title: &str) -> usize {
        let wanted = normalize_title(title);
        let before = self.goals.len();
        self.goals.retain(|g| normalize_title(&g.title) != wanted);
        before - self.goals.len()
    }

    /// Active goals in creation order.
    pub fn active_snapshot(&self) -> Vec<GoalSummary> {
        self.goals
            .iter()
            .filter(|g| g.active)
            .map(GoalSummary::from)
            .collect()
    }
}
