//! Route definitions for web server.

use axum::{
    routing::{delete, get, patch, post},
    Router,
};

use super::{api, AppState};

/// Goal CRUD under `/api`.
pub fn create_api_router() -> Router<AppState> {
    Router::new()
        .route(
            "/goals",
            get(api::list_goals)
                .post(api::create_goal)
                .delete(api::delete_goals_by_title),
        )
        .route(
            "/goals/:id",
            patch(api::update_goal).delete(api::delete_goal),
        )
        .route("/new-daily-task", post(api::new_daily_task))
}

/// Create the full app router.
pub fn create_app_router(state: AppState) -> Router {
    Router::new()
        .nest("/api", create_api_router())
        // Progress
        .route("/generate-plan", post(api::generate_plan))
        .route("/check-in", post(api::check_in))
        .route("/monthly-report", post(api::monthly_report))
        .route("/daily-notification", post(api::daily_notification))
        // Preferences
        .route("/prefs", get(api::get_prefs).post(api::set_prefs))
        // Facts
        .route("/facts", post(api::add_fact))
        .route("/facts/:user_id", get(api::list_facts))
        .route("/facts/:user_id/:topic", delete(api::delete_fact))
        // Delivery and chat
        .route(
            "/pending/:user_id",
            get(api::drain_pending).post(api::enqueue_pending),
        )
        .route("/stream/:user_id", get(api::stream_messages))
        .route("/chat", post(api::chat))
        .route("/generate-line", post(api::chat))
        .route("/reset-thread/:user_id", post(api::reset_thread))
        // Debug
        .route("/debug/scheduler-state", get(api::scheduler_state))
        .route("/debug/trigger-checkin-now", post(api::trigger_checkin_now))
        .route("/debug/seed-goal", post(api::seed_goal))
        .route("/health", get(health_check))
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coach::Coach;
    use crate::config::Settings;
    use crate::outbox::Outbox;
    use crate::providers::thread::tests::ScriptedProvider;
    use crate::providers::ThreadRegistry;
    use crate::scheduler::FALLBACK_TIMEZONE;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    fn app() -> (Router, AppState) {
        let coach = Arc::new(Coach::new(
            Arc::new(Outbox::new(50)),
            None,
            FALLBACK_TIMEZONE,
            "09:00",
        ));
        let threads = Arc::new(ThreadRegistry::new(
            Arc::new(ScriptedProvider::replying(
                r#"{"main": "Hydrate well.", "question": "How much water today?"}"#,
            )),
            Duration::from_secs(1),
        ));
        let state = AppState::new(coach, threads, Settings::default());
        (create_app_router(state.clone()), state)
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _) = app();
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_goal_crud() {
        let (app, _) = app();

        let (status, created) = send(
            &app,
            "POST",
            "/api/goals",
            Some(json!({"user_id": "u1", "title": "Walk", "cadence": "daily"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let id = created["id"].as_str().unwrap().to_string();

        let (status, again) = send(
            &app,
            "POST",
            "/api/goals",
            Some(json!({"user_id": "u1", "title": "WALK "})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(again["id"], created["id"]);

        let (status, updated) = send(
            &app,
            "PATCH",
            &format!("/api/goals/{}", id),
            Some(json!({"user_id": "u1", "active": false})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["active"], false);
        assert!(updated["updatedAt"].is_string());

        let (_, list) = send(&app, "GET", "/api/goals?user_id=u1", None).await;
        assert_eq!(list.as_array().unwrap().len(), 1);

        let (status, deleted) =
            send(&app, "DELETE", &format!("/api/goals/{}?user_id=u1", id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(deleted["deleted"], 1);
    }

    #[tokio::test]
    async fn test_goal_validation() {
        let (app, _) = app();
        let (status, body) = send(
            &app,
            "POST",
            "/api/goals",
            Some(json!({"user_id": "u1", "title": "   "})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "VALIDATION_ERROR");

        let (status, _) = send(
            &app,
            "POST",
            "/api/goals",
            Some(json!({"user_id": "u1", "title": "Walk", "cadence": "hourly"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_checkin_unknown_user_is_404() {
        let (app, _) = app();
        let (status, body) = send(
            &app,
            "POST",
            "/check-in",
            Some(json!({"user_id": "ghost", "status": "done"})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "User not found");
    }

    #[tokio::test]
    async fn test_plan_then_checkin() {
        let (app, _) = app();
        let (status, plan) = send(
            &app,
            "POST",
            "/generate-plan",
            Some(json!({"user_id": "u1"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(plan["current_focus_area"], "Habits");
        assert_eq!(plan["focus_areas"].as_array().unwrap().len(), 3);

        let (status, outcome) = send(
            &app,
            "POST",
            "/check-in",
            Some(json!({"user_id": "u1", "status": "done"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(outcome["consecutive_days"], 1);
        assert!(outcome["daily_tip"].is_string());

        let (_, report) = send(
            &app,
            "POST",
            "/monthly-report",
            Some(json!({"user_id": "u1"})),
        )
        .await;
        assert!(report["message"]
            .as_str()
            .unwrap()
            .contains("not available yet"));
    }

    #[tokio::test]
    async fn test_prefs_round_trip() {
        let (app, _) = app();
        let (_, defaults) = send(&app, "GET", "/prefs?user_id=u1", None).await;
        assert_eq!(defaults["checkin_time"], "09:00");

        let (status, saved) = send(
            &app,
            "POST",
            "/prefs",
            Some(json!({"user_id": "u1", "tz": "Europe/Paris", "checkin_time": "07:30", "channels": ["in_app"]})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(saved["prefs"]["tz"], "Europe/Paris");

        let (status, _) = send(
            &app,
            "POST",
            "/prefs",
            Some(json!({"user_id": "u1", "checkin_time": "25:00"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_trigger_and_reply_through_chat() {
        let (app, state) = app();
        send(
            &app,
            "POST",
            "/debug/seed-goal",
            Some(json!({"user_id": "u1", "title": "Walk"})),
        )
        .await;
        let (status, _) = send(
            &app,
            "POST",
            "/debug/trigger-checkin-now",
            Some(json!({"user_id": "u1"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (_, pending) = send(&app, "GET", "/pending/u1", None).await;
        let pending = pending.as_array().unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0]["kind"], "checkin");

        let (_, reply) = send(
            &app,
            "POST",
            "/chat",
            Some(json!({"user_id": "u1", "query": "yep, did it"})),
        )
        .await;
        assert_eq!(reply["route"], "checkin");
        assert!(state.coach.outbox().len("u1") == 1);

        let (_, sched) = send(&app, "GET", "/debug/scheduler-state?user_id=u1", None).await;
        assert!(sched["session"].is_null());
        assert!(sched["last_fired_date"].is_string());
    }

    #[tokio::test]
    async fn test_chat_enqueues_split_reply() {
        let (app, _) = app();
        let (status, reply) = send(
            &app,
            "POST",
            "/chat",
            Some(json!({"user_id": "u1", "query": "Tips for energy?"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(reply["route"], "assistant");
        assert_eq!(reply["question"], "How much water today?");

        let (_, pending) = send(&app, "GET", "/pending/u1", None).await;
        assert_eq!(pending.as_array().unwrap().len(), 2);
        let (_, empty) = send(&app, "GET", "/pending/u1", None).await;
        assert!(empty.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_enqueue_and_facts() {
        let (app, _) = app();
        let (status, _) = send(
            &app,
            "POST",
            "/pending/u1",
            Some(json!({"text": "Reminder", "kind": "system"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = send(
            &app,
            "POST",
            "/facts",
            Some(json!({"user_id": "u1", "fact": {"fact": "no topic"}})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        send(
            &app,
            "POST",
            "/facts",
            Some(json!({"user_id": "u1", "fact": {"topic": "sleep", "fact": "Sleeps 6h"}})),
        )
        .await;
        let (_, facts) = send(&app, "GET", "/facts/u1", None).await;
        assert_eq!(facts[0]["topic"], "sleep");

        let (_, deleted) = send(&app, "DELETE", "/facts/u1/sleep", None).await;
        assert_eq!(deleted["deleted"], 1);
    }

    #[tokio::test]
    async fn test_new_daily_task_differs() {
        let (app, _) = app();
        let (_, body) = send(
            &app,
            "POST",
            "/api/new-daily-task",
            Some(json!({"previousTask": "Sleep 8+ hours"})),
        )
        .await;
        let task = body["newTask"].as_str().unwrap();
        assert!(!task.is_empty());
        assert_ne!(task, "Sleep 8+ hours");
    }
}
