//! Coaching service.
//!
//! Owns every user's [`UserState`] behind its own async mutex, so a scheduler fire
//! and a concurrent reply for the same user never interleave. In-memory state is
//! authoritative; SQLite writes follow each mutation and failures are only logged.

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

pub mod chat;
pub mod state;

pub use state::{Fact, OpenedCheckin, ReplyHandling, UserState, DEFAULT_GOAL_TITLE};

use crate::checkin::{AwaitingCheckin, CheckinSession};
use crate::config::Settings;
use crate::error::{Error, Result};
use crate::goals::{Goal, GoalPatch, NewGoal};
use crate::habits::{
    self, catalog, CheckinOutcome, CheckinStatus, DailyNotification, MonthlyReport, PlanSummary,
};
use crate::outbox::{MessageKind, OutboundMessage, Outbox};
use crate::scheduler::{self, Preferences};
use crate::storage::SqliteStore;

type SharedUser = Arc<Mutex<UserState>>;

/// Scheduler view of one user, for debugging.
#[derive(Serialize, Debug, Clone)]
pub struct SchedulerState {
    pub user_id: String,
    pub prefs: Option<Preferences>,
    pub timezone: String,
    pub local_time: String,
    pub local_date: NaiveDate,
    pub due_now: bool,
    pub last_fired_at: Option<DateTime<Utc>>,
    pub last_fired_date: Option<NaiveDate>,
    pub session: Option<CheckinSession>,
    pub awaiting: Option<AwaitingCheckin>,
    pub pending_messages: usize,
}

pub struct Coach {
    users: RwLock<HashMap<String, SharedUser>>,
    outbox: Arc<Outbox>,
    store: Option<Arc<SqliteStore>>,
    default_tz: Tz,
    default_checkin_time: String,
}

impl Coach {
    pub fn new(
        outbox: Arc<Outbox>,
        store: Option<Arc<SqliteStore>>,
        default_tz: Tz,
        default_checkin_time: impl Into<String>,
    ) -> Self {
        Self {
            users: RwLock::new(HashMap::new()),
            outbox,
            store,
            default_tz,
            default_checkin_time: default_checkin_time.into(),
        }
    }

    pub fn from_settings(settings: &Settings, store: Option<Arc<SqliteStore>>) -> Self {
        let tz = scheduler::resolve_timezone(
            &settings.scheduler.default_timezone,
            scheduler::FALLBACK_TIMEZONE,
        );
        Self::new(
            Arc::new(Outbox::new(settings.outbox.capacity)),
            store,
            tz,
            settings.scheduler.default_checkin_time.clone(),
        )
    }

    pub fn outbox(&self) -> &Arc<Outbox> {
        &self.outbox
    }

    pub fn default_timezone(&self) -> Tz {
        self.default_tz
    }

    async fn user(&self, user_id: &str) -> SharedUser {
        if let Some(user) = self.users.read().await.get(user_id) {
            return user.clone();
        }
        self.users
            .write()
            .await
            .entry(user_id.to_string())
            .or_default()
            .clone()
    }

    async fn existing_user(&self, user_id: &str) -> Option<SharedUser> {
        self.users.read().await.get(user_id).cloned()
    }

    pub async fn user_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.users.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    fn persist<F>(&self, what: &str, user_id: &str, write: F)
    where
        F: FnOnce(&SqliteStore) -> Result<()>,
    {
        if let Some(store) = &self.store {
            if let Err(e) = write(store) {
                tracing::warn!(user_id, "Failed to persist {}: {}", what, e);
            }
        }
    }

    fn local_today(&self, state: &UserState, now: DateTime<Utc>) -> NaiveDate {
        match &state.prefs {
            Some(prefs) => prefs.local_today(now, self.default_tz),
            None => now.with_timezone(&self.default_tz).date_naive(),
        }
    }

    pub fn deliver(&self, user_id: &str, text: &str, kind: MessageKind) {
        self.outbox.push(user_id, OutboundMessage::assistant(text, kind));
    }

    /// Load goals, preferences, progress and check-in history written by a
    /// previous run.
    pub async fn hydrate(&self) -> Result<usize> {
        let Some(store) = &self.store else {
            return Ok(0);
        };
        let mut goals = store.load_goals()?;
        let mut prefs = store.load_prefs()?;
        let mut progress = store.load_progress()?;
        let mut checkins = store.load_checkins()?;

        let mut ids: BTreeSet<String> = goals.keys().cloned().collect();
        ids.extend(prefs.keys().cloned());
        ids.extend(progress.keys().cloned());
        ids.extend(checkins.keys().cloned());

        let mut users = self.users.write().await;
        for id in &ids {
            let mut state = UserState::with_goals(goals.remove(id).unwrap_or_default());
            state.prefs = prefs.remove(id);
            state.progress = progress.remove(id);
            state.checkins = checkins.remove(id).unwrap_or_default();
            users.insert(id.clone(), Arc::new(Mutex::new(state)));
        }
        tracing::info!(users = ids.len(), "Hydrated user state from storage");
        Ok(ids.len())
    }

    // Goals

    pub async fn create_goal(
        &self,
        user_id: &str,
        new: NewGoal,
        now: DateTime<Utc>,
    ) -> Result<(Goal, bool)> {
        let user = self.user(user_id).await;
        let mut state = user.lock().await;
        let (goal, created) = state.create_goal(new, now)?;
        if created {
            tracing::debug!(user_id, goal_id = %goal.id, "Goal created");
            self.persist("goal", user_id, |s| s.upsert_goal(user_id, &goal));
        }
        Ok((goal, created))
    }

    pub async fn list_goals(&self, user_id: &str) -> Vec<Goal> {
        match self.existing_user(user_id).await {
            Some(user) => user.lock().await.goals().to_vec(),
            None => Vec::new(),
        }
    }

    pub async fn update_goal(
        &self,
        user_id: &str,
        goal_id: &str,
        patch: GoalPatch,
        now: DateTime<Utc>,
    ) -> Result<Goal> {
        let user = self
            .existing_user(user_id)
            .await
            .ok_or_else(|| Error::NotFound("Goal not found".to_string()))?;
        let mut state = user.lock().await;
        let goal = state.update_goal(goal_id, patch, now)?;
        self.persist("goal", user_id, |s| s.upsert_goal(user_id, &goal));
        Ok(goal)
    }

    pub async fn delete_goal(&self, user_id: &str, goal_id: &str) -> usize {
        let Some(user) = self.existing_user(user_id).await else {
            return 0;
        };
        let mut state = user.lock().await;
        let removed = state.delete_goal(goal_id);
        if removed > 0 {
            self.persist("goal deletion", user_id, |s| {
                s.delete_goal(user_id, goal_id).map(|_| ())
            });
        }
        removed
    }

    pub async fn delete_goal_by_title(&self, user_id: &str, title: &str) -> usize {
        let Some(user) = self.existing_user(user_id).await else {
            return 0;
        };
        let mut state = user.lock().await;
        let ids = state.delete_goal_by_title(title);
        for id in &ids {
            self.persist("goal deletion", user_id, |s| {
                s.delete_goal(user_id, id).map(|_| ())
            });
        }
        ids.len()
    }

    // Progress

    pub async fn generate_plan(
        &self,
        user_id: &str,
        scores: Option<Vec<(String, i32)>>,
    ) -> PlanSummary {
        let scores = scores.unwrap_or_else(habits::progress::default_scores);
        let user = self.user(user_id).await;
        let mut state = user.lock().await;
        let (progress, summary) = habits::generate_plan(state.progress.as_ref(), &scores);
        self.persist("progress", user_id, |s| s.upsert_progress(user_id, &progress));
        state.progress = Some(progress);
        tracing::info!(user_id, focus = %summary.current_focus_area, "Plan generated");
        summary
    }

    pub async fn checkin(
        &self,
        user_id: &str,
        status: CheckinStatus,
        now: DateTime<Utc>,
    ) -> Result<CheckinOutcome> {
        let user = self
            .existing_user(user_id)
            .await
            .ok_or_else(|| Error::NotFound("User not found".to_string()))?;
        let mut state = user.lock().await;
        let today = self.local_today(&state, now);
        let (outcome, record) = state.record_checkin(status, today, now)?;
        self.persist("check-in", user_id, |s| s.upsert_checkin(user_id, &record));
        if let Some(progress) = &state.progress {
            self.persist("progress", user_id, |s| s.upsert_progress(user_id, progress));
        }
        tracing::info!(user_id, %today, status = %status, "Check-in recorded");
        Ok(outcome)
    }

    pub async fn monthly_report(&self, user_id: &str) -> Result<MonthlyReport> {
        self.with_progress(user_id, habits::monthly_report).await
    }

    pub async fn daily_notification(&self, user_id: &str) -> Result<DailyNotification> {
        self.with_progress(user_id, habits::daily_notification).await
    }

    async fn with_progress<T>(
        &self,
        user_id: &str,
        f: impl FnOnce(&habits::UserProgress) -> T,
    ) -> Result<T> {
        let user = self
            .existing_user(user_id)
            .await
            .ok_or_else(|| Error::NotFound("User not found".to_string()))?;
        let state = user.lock().await;
        state
            .progress
            .as_ref()
            .map(f)
            .ok_or_else(|| Error::NotFound("User not found".to_string()))
    }

    pub fn new_daily_task(previous_task: &str) -> String {
        catalog::new_daily_task(previous_task)
    }

    pub async fn checkin_record(&self, user_id: &str, date: NaiveDate) -> Option<habits::CheckinRecord> {
        let user = self.existing_user(user_id).await?;
        let state = user.lock().await;
        state.checkins.get(&date).cloned()
    }

    // Preferences

    pub async fn preferences(&self, user_id: &str) -> Preferences {
        let stored = match self.existing_user(user_id).await {
            Some(user) => user.lock().await.prefs.clone(),
            None => None,
        };
        stored.unwrap_or_else(|| Preferences {
            tz: self.default_tz.name().to_string(),
            checkin_time: self.default_checkin_time.clone(),
            channels: BTreeSet::new(),
        })
    }

    /// Replace a user's preferences. Today's check-in guards are cleared so a new
    /// time can be tried the same day.
    pub async fn set_preferences(&self, user_id: &str, prefs: Preferences) -> Result<Preferences> {
        prefs.validate()?;
        let user = self.user(user_id).await;
        let mut state = user.lock().await;
        state.prefs = Some(prefs.clone());
        state.clear_checkin_guards();
        self.persist("preferences", user_id, |s| s.upsert_prefs(user_id, &prefs));
        tracing::info!(user_id, tz = %prefs.tz, time = %prefs.checkin_time, "Preferences updated");
        Ok(prefs)
    }

    // Facts

    pub async fn add_fact(&self, user_id: &str, fact: Fact) -> Result<Vec<Fact>> {
        let user = self.user(user_id).await;
        let mut state = user.lock().await;
        state.add_fact(fact)?;
        Ok(state.facts.clone())
    }

    pub async fn facts(&self, user_id: &str) -> Vec<Fact> {
        match self.existing_user(user_id).await {
            Some(user) => user.lock().await.facts.clone(),
            None => Vec::new(),
        }
    }

    pub async fn delete_facts(&self, user_id: &str, topic: &str) -> usize {
        match self.existing_user(user_id).await {
            Some(user) => user.lock().await.delete_facts(topic),
            None => 0,
        }
    }

    // Scheduled check-ins

    /// Fire today's check-in if `now` is the user's check-in minute and nothing has
    /// fired yet. Returns whether a check-in was opened.
    pub async fn scheduled_checkin(&self, user_id: &str, now: DateTime<Utc>) -> Result<bool> {
        let Some(user) = self.existing_user(user_id).await else {
            return Ok(false);
        };
        let mut state = user.lock().await;
        let Some(prefs) = state.prefs.clone() else {
            return Ok(false);
        };
        let Some(today) = scheduler::due_date(&prefs, now, self.default_tz) else {
            return Ok(false);
        };

        state.discard_stale(today);
        if state.checkin_started(today) {
            return Ok(false);
        }

        self.open_checkin(user_id, &mut state, today, now)?;
        Ok(true)
    }

    /// Clear today's guards and fire immediately, regardless of the configured time.
    pub async fn trigger_checkin_now(&self, user_id: &str, now: DateTime<Utc>) -> Result<()> {
        let user = self.user(user_id).await;
        let mut state = user.lock().await;
        let today = self.local_today(&state, now);
        state.clear_checkin_guards();
        self.open_checkin(user_id, &mut state, today, now)
    }

    fn open_checkin(
        &self,
        user_id: &str,
        state: &mut UserState,
        today: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let opened = state.open_checkin(today, now)?;
        if let Some(goal) = &opened.seeded_goal {
            tracing::info!(user_id, "No active goals, seeded default goal");
            self.persist("goal", user_id, |s| s.upsert_goal(user_id, goal));
        }
        self.deliver(user_id, &opened.prompt, MessageKind::Checkin);
        tracing::info!(
            user_id,
            %today,
            goals = state.snapshot().len(),
            "Check-in opened"
        );
        Ok(())
    }

    /// Route a free-text reply into today's check-in.
    ///
    /// Returns the message delivered to the user, or `None` when no check-in is
    /// awaiting a reply.
    pub async fn handle_reply(
        &self,
        user_id: &str,
        text: &str,
        now: DateTime<Utc>,
    ) -> Option<String> {
        let user = self.existing_user(user_id).await?;
        let mut state = user.lock().await;
        let today = self.local_today(&state, now);

        match state.handle_reply(text, today, now) {
            ReplyHandling::NotAwaiting => None,
            ReplyHandling::Clarify { message } => {
                self.deliver(user_id, &message, MessageKind::Checkin);
                Some(message)
            }
            ReplyHandling::Answered {
                message,
                record,
                finished,
                ..
            } => {
                self.persist("check-in", user_id, |s| s.upsert_checkin(user_id, &record));
                if let Some(progress) = &state.progress {
                    self.persist("progress", user_id, |s| s.upsert_progress(user_id, progress));
                }
                self.deliver(user_id, &message, MessageKind::Checkin);
                tracing::info!(user_id, status = %record.status, finished, "Check-in reply applied");
                Some(message)
            }
        }
    }

    pub async fn awaiting_checkin(&self, user_id: &str, now: DateTime<Utc>) -> bool {
        let Some(user) = self.existing_user(user_id).await else {
            return false;
        };
        let state = user.lock().await;
        let today = self.local_today(&state, now);
        state.awaiting.as_ref().is_some_and(|a| a.date == today)
    }

    /// Users with preferences registered, i.e. the ones the scheduler visits.
    pub async fn scheduled_users(&self) -> Vec<String> {
        let users: Vec<(String, SharedUser)> = self
            .users
            .read()
            .await
            .iter()
            .map(|(id, user)| (id.clone(), user.clone()))
            .collect();

        let mut ids = Vec::new();
        for (id, user) in users {
            if user.lock().await.prefs.is_some() {
                ids.push(id);
            }
        }
        ids.sort();
        ids
    }

    pub async fn scheduler_state(&self, user_id: &str, now: DateTime<Utc>) -> SchedulerState {
        let user = self.existing_user(user_id).await;
        let guard = match &user {
            Some(user) => Some(user.lock().await),
            None => None,
        };
        let state = guard.as_deref();

        let prefs = state.and_then(|s| s.prefs.clone());
        let tz = prefs
            .as_ref()
            .map(|p| p.timezone(self.default_tz))
            .unwrap_or(self.default_tz);
        let local = now.with_timezone(&tz);

        SchedulerState {
            user_id: user_id.to_string(),
            due_now: prefs
                .as_ref()
                .and_then(|p| scheduler::due_date(p, now, self.default_tz))
                .is_some(),
            prefs,
            timezone: tz.name().to_string(),
            local_time: local.format("%Y-%m-%d %H:%M:%S").to_string(),
            local_date: local.date_naive(),
            last_fired_at: state.and_then(|s| s.last_fired_at),
            last_fired_date: state.and_then(|s| s.last_fired_date),
            session: state.and_then(|s| s.session.clone()),
            awaiting: state.and_then(|s| s.awaiting.clone()),
            pending_messages: self.outbox.len(user_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn coach() -> Coach {
        Coach::new(
            Arc::new(Outbox::new(100)),
            Some(Arc::new(SqliteStore::open_in_memory().unwrap())),
            scheduler::FALLBACK_TIMEZONE,
            "09:00",
        )
    }

    fn goal(title: &str) -> NewGoal {
        NewGoal {
            title: title.to_string(),
            ..Default::default()
        }
    }

    fn la_prefs() -> Preferences {
        Preferences {
            tz: "America/Los_Angeles".to_string(),
            checkin_time: "09:00".to_string(),
            channels: BTreeSet::new(),
        }
    }

    // 2025-06-02 09:00 in Los Angeles (PDT, UTC-7).
    fn at_nine() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 2, 16, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_checkin_unknown_user_not_found() {
        let coach = coach();
        let err = coach
            .checkin("ghost", CheckinStatus::Done, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
        assert!(coach.monthly_report("ghost").await.is_err());
    }

    #[tokio::test]
    async fn test_checkin_after_plan_persists_record() {
        let coach = coach();
        coach.generate_plan("u1", None).await;
        let outcome = coach
            .checkin("u1", CheckinStatus::Done, at_nine())
            .await
            .unwrap();
        assert_eq!(outcome.consecutive_days, 1);

        let today = NaiveDate::from_ymd_opt(2025, 6, 2).unwrap();
        let store = coach.store.as_ref().unwrap();
        assert!(store.get_checkin("u1", today).unwrap().is_some());
        assert!(coach.checkin_record("u1", today).await.is_some());
    }

    #[tokio::test]
    async fn test_idempotent_goal_create() {
        let coach = coach();
        let (first, created) = coach.create_goal("u1", goal("Walk"), Utc::now()).await.unwrap();
        assert!(created);
        let (again, created) = coach
            .create_goal("u1", goal("  walk "), Utc::now())
            .await
            .unwrap();
        assert!(!created);
        assert_eq!(first.id, again.id);
        assert_eq!(coach.list_goals("u1").await.len(), 1);
    }

    #[tokio::test]
    async fn test_scheduled_checkin_fires_once() {
        let coach = coach();
        coach.set_preferences("u1", la_prefs()).await.unwrap();
        coach.create_goal("u1", goal("Walk"), Utc::now()).await.unwrap();

        assert!(coach.scheduled_checkin("u1", at_nine()).await.unwrap());
        for secs in (5..60).step_by(5) {
            let tick = at_nine() + chrono::Duration::seconds(secs);
            assert!(!coach.scheduled_checkin("u1", tick).await.unwrap());
        }
        assert_eq!(coach.outbox().len("u1"), 1);
    }

    #[tokio::test]
    async fn test_not_due_outside_minute() {
        let coach = coach();
        coach.set_preferences("u1", la_prefs()).await.unwrap();
        let early = at_nine() - chrono::Duration::seconds(1);
        assert!(!coach.scheduled_checkin("u1", early).await.unwrap());
        assert!(coach.outbox().is_empty("u1"));
    }

    #[tokio::test]
    async fn test_prefs_update_allows_refire() {
        let coach = coach();
        coach.set_preferences("u1", la_prefs()).await.unwrap();
        assert!(coach.scheduled_checkin("u1", at_nine()).await.unwrap());

        coach.set_preferences("u1", la_prefs()).await.unwrap();
        assert!(coach.scheduled_checkin("u1", at_nine()).await.unwrap());
    }

    #[tokio::test]
    async fn test_invalid_prefs_rejected() {
        let coach = coach();
        let prefs = Preferences {
            checkin_time: "9am".to_string(),
            ..la_prefs()
        };
        assert!(matches!(
            coach.set_preferences("u1", prefs).await,
            Err(Error::Validation(_))
        ));
        assert!(coach.scheduled_users().await.is_empty());
    }

    #[tokio::test]
    async fn test_trigger_now_seeds_default_goal() {
        let coach = coach();
        coach.trigger_checkin_now("u1", Utc::now()).await.unwrap();

        let goals = coach.list_goals("u1").await;
        assert_eq!(goals.len(), 1);
        assert_eq!(goals[0].title, DEFAULT_GOAL_TITLE);
        assert!(coach.awaiting_checkin("u1", Utc::now()).await);
    }

    #[tokio::test]
    async fn test_reply_without_session_is_ignored() {
        let coach = coach();
        coach.create_goal("u1", goal("Walk"), Utc::now()).await.unwrap();
        assert!(coach.handle_reply("u1", "done", Utc::now()).await.is_none());
        assert!(coach.handle_reply("nobody", "done", Utc::now()).await.is_none());
    }

    #[tokio::test]
    async fn test_hydrate_restores_state() {
        crate::logging::init_test();
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let first = Coach::new(
            Arc::new(Outbox::new(10)),
            Some(store.clone()),
            scheduler::FALLBACK_TIMEZONE,
            "09:00",
        );
        first.create_goal("u1", goal("Walk"), Utc::now()).await.unwrap();
        first.set_preferences("u1", la_prefs()).await.unwrap();
        first.generate_plan("u2", None).await;
        first
            .checkin("u2", CheckinStatus::Done, at_nine())
            .await
            .unwrap();
        let checked_on = at_nine()
            .with_timezone(&scheduler::FALLBACK_TIMEZONE)
            .date_naive();

        let second = Coach::new(
            Arc::new(Outbox::new(10)),
            Some(store),
            scheduler::FALLBACK_TIMEZONE,
            "09:00",
        );
        assert_eq!(second.hydrate().await.unwrap(), 2);
        assert_eq!(second.list_goals("u1").await.len(), 1);
        assert_eq!(second.scheduled_users().await, vec!["u1".to_string()]);
        assert!(second.daily_notification("u2").await.is_ok());
        let record = second.checkin_record("u2", checked_on).await.unwrap();
        assert_eq!(record.status, CheckinStatus::Done);
    }

    #[tokio::test]
    async fn test_reads_do_not_register_users() {
        let coach = coach();
        assert!(coach.list_goals("ghost").await.is_empty());
        assert!(coach.facts("ghost").await.is_empty());
        assert_eq!(coach.preferences("ghost").await.checkin_time, "09:00");
        assert_eq!(coach.delete_facts("ghost", "sleep").await, 0);
        assert!(!coach.awaiting_checkin("ghost", at_nine()).await);
        assert!(!coach.scheduled_checkin("ghost", at_nine()).await.unwrap());
        coach.scheduler_state("ghost", at_nine()).await;

        assert!(coach.user_ids().await.is_empty());
        assert_eq!(coach.outbox().user_count(), 0);
    }

    #[tokio::test]
    async fn test_scheduler_state_reports_guards() {
        let coach = coach();
        coach.set_preferences("u1", la_prefs()).await.unwrap();
        coach.scheduled_checkin("u1", at_nine()).await.unwrap();

        let state = coach.scheduler_state("u1", at_nine()).await;
        assert!(state.due_now);
        assert_eq!(state.timezone, "America/Los_Angeles");
        assert_eq!(state.local_time, "2025-06-02 09:00:00");
        assert!(state.session.is_some());
        assert_eq!(state.pending_messages, 1);
    }
}
