//! API endpoints for habit progress.

use axum::{extract::State, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{require_user_id, UserRequest};
use crate::coach::Coach;
use crate::error::{Error, Result};
use crate::habits::{CheckinOutcome, CheckinStatus, DailyNotification, MonthlyReport, PlanSummary};
use crate::web::AppState;

#[derive(Deserialize)]
pub struct CheckinRequest {
    pub user_id: Option<String>,
    pub status: Option<String>,
}

#[derive(Deserialize)]
pub struct PlanRequest {
    pub user_id: Option<String>,
    /// Self-assessed score per focus area; lower means weaker.
    pub scores: Option<BTreeMap<String, i32>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTaskRequest {
    #[serde(default)]
    pub previous_task: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTaskResponse {
    pub new_task: String,
}

/// Record today's done/miss for a user.
pub async fn check_in(
    State(state): State<AppState>,
    Json(payload): Json<CheckinRequest>,
) -> Result<Json<CheckinOutcome>> {
    let user_id = require_user_id(payload.user_id)?;
    let status = payload
        .status
        .map(|s| CheckinStatus::parse(&s))
        .ok_or_else(|| Error::Validation("status is required".to_string()))?;

    let outcome = state.coach.checkin(&user_id, status, Utc::now()).await?;
    Ok(Json(outcome))
}

pub async fn generate_plan(
    State(state): State<AppState>,
    Json(payload): Json<PlanRequest>,
) -> Result<Json<PlanSummary>> {
    let user_id = require_user_id(payload.user_id)?;
    let scores = payload
        .scores
        .map(|scores| scores.into_iter().collect::<Vec<_>>());
    Ok(Json(state.coach.generate_plan(&user_id, scores).await))
}

pub async fn monthly_report(
    State(state): State<AppState>,
    Json(payload): Json<UserRequest>,
) -> Result<Json<MonthlyReport>> {
    let user_id = require_user_id(payload.user_id)?;
    Ok(Json(state.coach.monthly_report(&user_id).await?))
}

pub async fn daily_notification(
    State(state): State<AppState>,
    Json(payload): Json<UserRequest>,
) -> Result<Json<DailyNotification>> {
    let user_id = require_user_id(payload.user_id)?;
    Ok(Json(state.coach.daily_notification(&user_id).await?))
}

/// Swap the day's task for a different one.
pub async fn new_daily_task(Json(payload): Json<NewTaskRequest>) -> Json<NewTaskResponse> {
    Json(NewTaskResponse {
        new_task: Coach::new_daily_task(&payload.previous_task),
    })
}
