//! Debug hooks for exercising the scheduler by hand.

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::Utc;
use serde::Deserialize;

use super::{require_user_id, SuccessResponse, UserRequest};
use crate::coach::{SchedulerState, DEFAULT_GOAL_TITLE};
use crate::error::Result;
use crate::goals::{Goal, NewGoal};
use crate::web::AppState;

#[derive(Deserialize)]
pub struct SeedGoalRequest {
    pub user_id: Option<String>,
    pub title: Option<String>,
    pub category: Option<String>,
}

pub async fn scheduler_state(
    State(state): State<AppState>,
    Query(query): Query<UserRequest>,
) -> Result<Json<SchedulerState>> {
    let user_id = require_user_id(query.user_id)?;
    Ok(Json(state.coach.scheduler_state(&user_id, Utc::now()).await))
}

/// Forget today's check-in and open a new one immediately.
pub async fn trigger_checkin_now(
    State(state): State<AppState>,
    Json(payload): Json<UserRequest>,
) -> Result<Json<SuccessResponse>> {
    let user_id = require_user_id(payload.user_id)?;
    state.coach.trigger_checkin_now(&user_id, Utc::now()).await?;
    Ok(Json(SuccessResponse::ok()))
}

pub async fn seed_goal(
    State(state): State<AppState>,
    Json(payload): Json<SeedGoalRequest>,
) -> Result<Json<Goal>> {
    let user_id = require_user_id(payload.user_id)?;
    let new = NewGoal {
        title: payload
            .title
            .unwrap_or_else(|| DEFAULT_GOAL_TITLE.to_string()),
        category: payload.category,
        cadence: None,
    };
    let (goal, _) = state.coach.create_goal(&user_id, new, Utc::now()).await?;
    Ok(Json(goal))
}
