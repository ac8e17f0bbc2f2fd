//! Per-user state aggregate.
//!
//! Goals and their active snapshot only change together; progress only changes
//! through the check-in engine.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::checkin::session::{self, AwaitingCheckin, CheckinSession};
use crate::checkin::normalize_checkin_status;
use crate::error::{Error, Result};
use crate::goals::{Goal, GoalPatch, GoalStore, GoalSummary, NewGoal};
use crate::habits::{self, CheckinOutcome, CheckinRecord, CheckinStatus, UserProgress};
use crate::scheduler::Preferences;

/// Goal seeded when a check-in fires with nothing to ask about.
pub const DEFAULT_GOAL_TITLE: &str = "Daily health check-in";

/// Something the user told the coach about themselves.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Fact {
    pub topic: String,
    pub fact: String,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub confidence: Option<f32>,
}

/// Result of feeding a free-text reply into an open check-in.
#[derive(Debug, Clone)]
pub enum ReplyHandling {
    /// No check-in is waiting for this user today.
    NotAwaiting,
    /// The reply could not be read; nothing was changed.
    Clarify { message: String },
    /// The reply was applied to the awaited goal.
    Answered {
        message: String,
        outcome: Box<CheckinOutcome>,
        record: CheckinRecord,
        finished: bool,
    },
}

/// Opened check-in, returned so the caller can deliver and persist it.
#[derive(Debug, Clone)]
pub struct OpenedCheckin {
    pub prompt: String,
    pub seeded_goal: Option<Goal>,
}

#[derive(Debug, Default)]
pub struct UserState {
    pub progress: Option<UserProgress>,
    goals: GoalStore,
    snapshot: Vec<GoalSummary>,
    pub prefs: Option<Preferences>,
    pub session: Option<CheckinSession>,
    pub awaiting: Option<AwaitingCheckin>,
    pub last_fired_at: Option<DateTime<Utc>>,
    pub last_fired_date: Option<NaiveDate>,
    pub checkins: BTreeMap<NaiveDate, CheckinRecord>,
    pub facts: Vec<Fact>,
}

impl UserState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_goals(goals: Vec<Goal>) -> Self {
        let mut state = Self {
            goals: GoalStore::from_goals(goals),
            ..Self::default()
        };
        state.resync_snapshot();
        state
    }

    fn resync_snapshot(&mut self) {
        self.snapshot = self.goals.active_snapshot();
    }

    pub fn goals(&self) -> &[Goal] {
        self.goals.list()
    }

    pub fn snapshot(&self) -> &[GoalSummary] {
        &self.snapshot
    }

    pub fn create_goal(&mut self, new: NewGoal, now: DateTime<Utc>) -> Result<(Goal, bool)> {
        let created = self.goals.create(new, now)?;
        self.resync_snapshot();
        Ok(created)
    }

    pub fn update_goal(&mut self, id: &str, patch: GoalPatch, now: DateTime<Utc>) -> Result<Goal> {
        let goal = self.goals.patch(id, patch, now)?;
        self.resync_snapshot();
        Ok(goal)
    }

    pub fn delete_goal(&mut self, id: &str) -> usize {
        let removed = self.goals.delete(id);
        self.resync_snapshot();
        removed
    }

    /// Delete by title; returns the ids removed.
    pub fn delete_goal_by_title(&mut self, title: &str) -> Vec<String> {
        let wanted = crate::goals::normalize_title(title);
        let ids: Vec<String> = self
            .goals
            .list()
            .iter()
            .filter(|g| crate::goals::normalize_title(&g.title) == wanted)
            .map(|g| g.id.clone())
            .collect();
        self.goals.delete_by_title(title);
        self.resync_snapshot();
        ids
    }

    pub fn add_fact(&mut self, fact: Fact) -> Result<()> {
        if fact.topic.trim().is_empty() {
            return Err(Error::Validation("Fact topic is required".to_string()));
        }
        self.facts.push(fact);
        Ok(())
    }

    pub fn delete_facts(&mut self, topic: &str) -> usize {
        let before = self.facts.len();
        self.facts.retain(|f| f.topic != topic);
        before - self.facts.len()
    }

    /// Apply a check-in through the engine; unknown users are an error.
    pub fn record_checkin(
        &mut self,
        status: CheckinStatus,
        today: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<(CheckinOutcome, CheckinRecord)> {
        let progress = self
            .progress
            .as_mut()
            .ok_or_else(|| Error::NotFound("User not found".to_string()))?;
        let (outcome, record) = habits::apply_checkin(progress, status, today, now);
        self.checkins.insert(today, record.clone());
        Ok((outcome, record))
    }

    fn record_checkin_lazily(
        &mut self,
        status: CheckinStatus,
        today: NaiveDate,
        now: DateTime<Utc>,
    ) -> (CheckinOutcome, CheckinRecord) {
        let progress = self
            .progress
            .get_or_insert_with(UserProgress::with_default_plan);
        let (outcome, record) = habits::apply_checkin(progress, status, today, now);
        self.checkins.insert(today, record.clone());
        (outcome, record)
    }

    /// Drop session state left over from a previous day.
    pub fn discard_stale(&mut self, today: NaiveDate) {
        if self.session.as_ref().is_some_and(|s| s.date != today) {
            tracing::debug!("Discarding stale check-in session");
            self.session = None;
        }
        if self.awaiting.as_ref().is_some_and(|a| a.date != today) {
            self.awaiting = None;
        }
    }

    /// True once today's scheduler check-in has fired or is in progress.
    pub fn checkin_started(&self, today: NaiveDate) -> bool {
        self.last_fired_date == Some(today)
            || self.session.as_ref().is_some_and(|s| s.date == today)
            || self.awaiting.as_ref().is_some_and(|a| a.date == today)
    }

    /// Forget today's check-in so it can fire again.
    pub fn clear_checkin_guards(&mut self) {
        self.session = None;
        self.awaiting = None;
        self.last_fired_date = None;
    }

    /// Open today's session over the active goals and return the first prompt.
    pub fn open_checkin(&mut self, today: NaiveDate, now: DateTime<Utc>) -> Result<OpenedCheckin> {
        let mut seeded_goal = None;
        let mut goals = self.snapshot.clone();
        if goals.is_empty() {
            goals = self
                .goals
                .list()
                .iter()
                .filter(|g| g.active)
                .map(GoalSummary::from)
                .collect();
        }
        if goals.is_empty() {
            let (goal, _) = self.create_goal(
                NewGoal {
                    title: DEFAULT_GOAL_TITLE.to_string(),
                    category: Some("general".to_string()),
                    cadence: None,
                },
                now,
            )?;
            goals = vec![GoalSummary::from(&goal)];
            seeded_goal = Some(goal);
        }

        let session = CheckinSession::new(goals, today);
        let first = session
            .current()
            .ok_or_else(|| Error::Other("check-in session has no goals".to_string()))?;
        let prompt = session::opening_prompt(first);

        self.awaiting = session.awaiting();
        self.session = Some(session);
        self.last_fired_at = Some(now);
        self.last_fired_date = Some(today);

        Ok(OpenedCheckin {
            prompt,
            seeded_goal,
        })
    }

    /// Feed a free-text reply into today's check-in, if one is waiting.
    pub fn handle_reply(&mut self, text: &str, today: NaiveDate, now: DateTime<Utc>) -> ReplyHandling {
        self.discard_stale(today);
        let Some(awaiting) = self.awaiting.clone() else {
            return ReplyHandling::NotAwaiting;
        };

        let status = match normalize_checkin_status(text).to_checkin() {
            Some(status) => status,
            None => {
                return ReplyHandling::Clarify {
                    message: session::clarification_prompt(&awaiting.title),
                }
            }
        };

        let (outcome, record) = self.record_checkin_lazily(status, today, now);
        let mut message = session::acknowledgment(&awaiting.title, status);

        let next = self.session.as_mut().and_then(|s| s.answer(status).cloned());
        let finished = match next {
            Some(goal) => {
                message.push(' ');
                message.push_str(&session::next_prompt(&goal));
                self.awaiting = Some(AwaitingCheckin {
                    title: goal.title,
                    date: today,
                });
                false
            }
            None => {
                if let Some(done) = self.session.take() {
                    message.push(' ');
                    message.push_str(&done.summary());
                }
                self.awaiting = None;
                true
            }
        };

        ReplyHandling::Answered {
            message,
            outcome: Box::new(outcome),
            record,
            finished,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 2).unwrap()
    }

    fn goal(title: &str) -> NewGoal {
        NewGoal {
            title: title.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_snapshot_tracks_every_mutation() {
        let mut state = UserState::new();
        let (walk, _) = state.create_goal(goal("Walk"), Utc::now()).unwrap();
        state.create_goal(goal("Read"), Utc::now()).unwrap();
        assert_eq!(state.snapshot().len(), 2);

        state
            .update_goal(
                &walk.id,
                GoalPatch {
                    active: Some(false),
                    ..Default::default()
                },
                Utc::now(),
            )
            .unwrap();
        assert_eq!(state.snapshot().len(), 1);
        assert_eq!(state.snapshot()[0].title, "Read");

        assert_eq!(state.delete_goal_by_title("read").len(), 1);
        assert!(state.snapshot().is_empty());
        assert_eq!(state.goals().len(), 1);
    }

    #[test]
    fn test_record_checkin_requires_progress() {
        let mut state = UserState::new();
        let err = state
            .record_checkin(CheckinStatus::Done, today(), Utc::now())
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn test_same_day_checkin_overwrites_record() {
        let mut state = UserState::new();
        state.progress = Some(UserProgress::with_default_plan());
        state.record_checkin(CheckinStatus::Done, today(), Utc::now()).unwrap();
        state.record_checkin(CheckinStatus::Miss, today(), Utc::now()).unwrap();

        assert_eq!(state.checkins.len(), 1);
        assert_eq!(state.checkins[&today()].status, CheckinStatus::Miss);
    }

    #[test]
    fn test_open_checkin_seeds_default_goal() {
        let mut state = UserState::new();
        let opened = state.open_checkin(today(), Utc::now()).unwrap();
        assert!(opened.prompt.contains(DEFAULT_GOAL_TITLE));
        assert_eq!(opened.seeded_goal.unwrap().title, DEFAULT_GOAL_TITLE);
        assert_eq!(state.snapshot().len(), 1);
        assert!(state.checkin_started(today()));
    }

    #[test]
    fn test_reply_flow_across_two_goals() {
        let mut state = UserState::new();
        state.create_goal(goal("Walk"), Utc::now()).unwrap();
        state.create_goal(goal("Meditate"), Utc::now()).unwrap();
        state.open_checkin(today(), Utc::now()).unwrap();
        assert_eq!(state.awaiting.as_ref().unwrap().title, "Walk");

        match state.handle_reply("hmm, maybe", today(), Utc::now()) {
            ReplyHandling::Clarify { message } => assert!(message.contains("Walk")),
            other => panic!("expected clarification, got {:?}", other),
        }
        assert!(state.progress.is_none());

        match state.handle_reply("done", today(), Utc::now()) {
            ReplyHandling::Answered {
                message, finished, ..
            } => {
                assert!(!finished);
                assert!(message.contains("Walk"));
                assert!(message.contains("Meditate"));
            }
            other => panic!("expected answer, got {:?}", other),
        }
        assert_eq!(state.awaiting.as_ref().unwrap().title, "Meditate");

        match state.handle_reply("nope", today(), Utc::now()) {
            ReplyHandling::Answered {
                message, finished, ..
            } => {
                assert!(finished);
                assert!(message.contains("1 of 2 goals done"));
            }
            other => panic!("expected answer, got {:?}", other),
        }
        assert!(state.session.is_none());
        assert!(state.awaiting.is_none());
        assert!(state.checkin_started(today()));

        let progress = state.progress.as_ref().unwrap();
        assert_eq!(progress.total_days_completed, 1);
        assert_eq!(progress.consecutive_days, 0);
    }

    #[test]
    fn test_reply_without_checkin_is_not_consumed() {
        let mut state = UserState::new();
        assert!(matches!(
            state.handle_reply("yes", today(), Utc::now()),
            ReplyHandling::NotAwaiting
        ));
    }

    #[test]
    fn test_stale_session_is_discarded() {
        let mut state = UserState::new();
        state.create_goal(goal("Walk"), Utc::now()).unwrap();
        state.open_checkin(today(), Utc::now()).unwrap();

        let tomorrow = today().succ_opt().unwrap();
        assert!(matches!(
            state.handle_reply("yes", tomorrow, Utc::now()),
            ReplyHandling::NotAwaiting
        ));
        assert!(state.session.is_none());
        assert!(!state.checkin_started(tomorrow));
    }

    #[test]
    fn test_fact_requires_topic() {
        let mut state = UserState::new();
        let fact = Fact {
            topic: " ".to_string(),
            fact: "Eats takeout daily".to_string(),
            value: None,
            confidence: None,
        };
        assert!(state.add_fact(fact.clone()).is_err());
        state
            .add_fact(Fact {
                topic: "diet".to_string(),
                ..fact
            })
            .unwrap();
        assert_eq!(state.delete_facts("diet"), 1);
    }
}
