//! User goals.

pub mod store;

pub use store::{normalize_title, Cadence, Goal, GoalPatch, GoalStore, GoalSummary, NewGoal};
