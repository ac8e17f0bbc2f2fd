//! Background loop that opens each user's daily check-in at their local time.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::sleep;

use crate::coach::Coach;
use crate::config::Settings;
use crate::error::Error;

/// What a single tick did.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct TickReport {
    pub checked: usize,
    pub fired: Vec<String>,
    pub failed: Vec<String>,
}

/// Check-in scheduler.
pub struct CheckinScheduler {
    coach: Arc<Coach>,
    tick: Duration,
    running: Arc<RwLock<bool>>,
}

impl CheckinScheduler {
    pub fn new(coach: Arc<Coach>, tick: Duration) -> Self {
        Self {
            coach,
            tick,
            running: Arc::new(RwLock::new(false)),
        }
    }

    /// Visit every user with preferences once. A failing user is logged and skipped.
    pub async fn tick_at(coach: &Coach, now: DateTime<Utc>) -> TickReport {
        let mut report = TickReport::default();

        for user_id in coach.scheduled_users().await {
            report.checked += 1;
            match coach.scheduled_checkin(&user_id, now).await {
                Ok(true) => report.fired.push(user_id),
                Ok(false) => {}
                Err(e) => {
                    tracing::error!(user_id = %user_id, "Scheduled check-in failed: {}", e);
                    report.failed.push(user_id);
                }
            }
        }

        report
    }

    /// Run until stopped.
    pub async fn start(&self) -> Result<(), Error> {
        {
            let mut running = self.running.write().await;
            if *running {
                return Err(Error::Other("Scheduler already running".to_string()));
            }
            *running = true;
        }

        tracing::info!(tick_seconds = self.tick.as_secs(), "Check-in scheduler started");

        loop {
            if !*self.running.read().await {
                tracing::info!("Check-in scheduler stopping");
                break;
            }

            // Run the tick in its own task so a panic is contained to this tick.
            let coach = self.coach.clone();
            match tokio::spawn(async move { Self::tick_at(&coach, Utc::now()).await }).await {
                Ok(report) if !report.fired.is_empty() => {
                    tracing::info!(fired = ?report.fired, checked = report.checked, "Check-ins fired");
                }
                Ok(_) => {}
                Err(e) => tracing::error!("Scheduler tick aborted: {}", e),
            }

            sleep(self.tick).await;
        }

        Ok(())
    }

    pub async fn stop(&self) {
        *self.running.write().await = false;
    }

    pub fn running_flag(&self) -> Arc<RwLock<bool>> {
        self.running.clone()
    }
}

/// Spawn the scheduler for the lifetime of the process.
pub fn run_scheduler(coach: Arc<Coach>, settings: &Settings) -> JoinHandle<()> {
    let scheduler = CheckinScheduler::new(
        coach,
        Duration::from_secs(settings.scheduler.tick_seconds.max(1)),
    );
    tokio::spawn(async move {
        if let Err(e) = scheduler.start().await {
            tracing::error!("Check-in scheduler exited: {}", e);
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::goals::NewGoal;
    use crate::outbox::Outbox;
    use crate::scheduler::{Preferences, FALLBACK_TIMEZONE};
    use chrono::TimeZone;
    use std::collections::BTreeSet;

    fn coach() -> Arc<Coach> {
        Arc::new(Coach::new(
            Arc::new(Outbox::new(50)),
            None,
            FALLBACK_TIMEZONE,
            "09:00",
        ))
    }

    fn prefs(tz: &str, time: &str) -> Preferences {
        Preferences {
            tz: tz.to_string(),
            checkin_time: time.to_string(),
            channels: BTreeSet::new(),
        }
    }

    async fn add_goal(coach: &Coach, user_id: &str, title: &str) {
        coach
            .create_goal(
                user_id,
                NewGoal {
                    title: title.to_string(),
                    ..Default::default()
                },
                Utc::now(),
            )
            .await
            .unwrap();
    }

    // 09:00:00 on 2025-06-02 in Los Angeles.
    fn la_nine() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 2, 16, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_fires_once_during_matching_minute() {
        let coach = coach();
        coach
            .set_preferences("u1", prefs("America/Los_Angeles", "09:00"))
            .await
            .unwrap();
        add_goal(&coach, "u1", "Walk").await;

        let mut fired = 0;
        for i in 0..12 {
            let now = la_nine() + chrono::Duration::seconds(i * 5);
            fired += CheckinScheduler::tick_at(&coach, now).await.fired.len();
        }
        assert_eq!(fired, 1);
        assert_eq!(coach.outbox().len("u1"), 1);
    }

    #[tokio::test]
    async fn test_users_without_prefs_are_skipped() {
        let coach = coach();
        add_goal(&coach, "u1", "Walk").await;
        let report = CheckinScheduler::tick_at(&coach, la_nine()).await;
        assert_eq!(report.checked, 0);
    }

    #[tokio::test]
    async fn test_invalid_timezone_uses_fallback() {
        let coach = coach();
        coach
            .set_preferences("u1", prefs("Mars/Olympus_Mons", "09:00"))
            .await
            .unwrap();
        let report = CheckinScheduler::tick_at(&coach, la_nine()).await;
        assert_eq!(report.fired, vec!["u1".to_string()]);
    }

    #[tokio::test]
    async fn test_end_to_end_two_goal_session() {
        crate::logging::init_test();
        let coach = coach();
        coach
            .set_preferences("u1", prefs("America/Los_Angeles", "09:00"))
            .await
            .unwrap();
        add_goal(&coach, "u1", "Walk").await;
        add_goal(&coach, "u1", "Meditate").await;

        let report = CheckinScheduler::tick_at(&coach, la_nine()).await;
        assert_eq!(report.fired, vec!["u1".to_string()]);
        let prompt = coach.outbox().drain("u1");
        assert_eq!(prompt.len(), 1);
        assert!(prompt[0].text.contains("\"Walk\""));

        let now = la_nine() + chrono::Duration::seconds(20);
        let reply = coach.handle_reply("u1", "done", now).await.unwrap();
        assert!(reply.contains("Walk"));
        assert!(reply.contains("\"Meditate\""));
        assert_eq!(coach.outbox().drain("u1").len(), 1);

        let now = la_nine() + chrono::Duration::seconds(40);
        let summary = coach.handle_reply("u1", "miss", now).await.unwrap();
        assert!(summary.contains("1 of 2 goals done"));
        assert_eq!(coach.outbox().drain("u1").len(), 1);

        for i in 9..12 {
            let now = la_nine() + chrono::Duration::seconds(i * 5);
            assert!(CheckinScheduler::tick_at(&coach, now).await.fired.is_empty());
        }
        assert!(coach.outbox().is_empty("u1"));
        let later = la_nine() + chrono::Duration::seconds(50);
        assert!(coach.handle_reply("u1", "done", later).await.is_none());
    }

    #[tokio::test]
    async fn test_next_day_fires_again() {
        let coach = coach();
        coach
            .set_preferences("u1", prefs("America/Los_Angeles", "09:00"))
            .await
            .unwrap();
        assert_eq!(CheckinScheduler::tick_at(&coach, la_nine()).await.fired.len(), 1);

        let tomorrow = la_nine() + chrono::Duration::days(1);
        assert_eq!(CheckinScheduler::tick_at(&coach, tomorrow).await.fired.len(), 1);
    }

    #[tokio::test]
    async fn test_stop_ends_loop() {
        let scheduler = Arc::new(CheckinScheduler::new(coach(), Duration::from_millis(10)));
        let runner = scheduler.clone();
        let handle = tokio::spawn(async move { runner.start().await });

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(*scheduler.running_flag().read().await);
        scheduler.stop().await;

        let result = tokio::time::timeout(Duration::from_secs(1), handle).await;
        assert!(result.is_ok());
    }
}
