//! API endpoints for goals.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::{require_user_id, UserRequest};
use crate::error::{Error, Result};
use crate::goals::{Cadence, Goal, GoalPatch, NewGoal};
use crate::web::AppState;

#[derive(Deserialize)]
pub struct GoalQuery {
    pub user_id: Option<String>,
    pub title: Option<String>,
}

#[derive(Deserialize)]
pub struct CreateGoalRequest {
    pub user_id: Option<String>,
    #[serde(default)]
    pub title: String,
    pub category: Option<String>,
    pub cadence: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateGoalRequest {
    pub user_id: Option<String>,
    pub title: Option<String>,
    pub category: Option<String>,
    pub cadence: Option<String>,
    pub active: Option<bool>,
}

#[derive(Serialize)]
pub struct DeleteResponse {
    pub success: bool,
    pub deleted: usize,
}

fn parse_cadence(value: Option<String>) -> Result<Option<Cadence>> {
    value.map(|c| c.parse::<Cadence>()).transpose()
}

/// List a user's goals.
pub async fn list_goals(
    State(state): State<AppState>,
    Query(query): Query<GoalQuery>,
) -> Result<Json<Vec<Goal>>> {
    let user_id = require_user_id(query.user_id)?;
    Ok(Json(state.coach.list_goals(&user_id).await))
}

/// Create a goal, or return the active goal that already has this title.
pub async fn create_goal(
    State(state): State<AppState>,
    Json(payload): Json<CreateGoalRequest>,
) -> Result<(StatusCode, Json<Goal>)> {
    let user_id = require_user_id(payload.user_id)?;
    let new = NewGoal {
        title: payload.title,
        category: payload.category,
        cadence: parse_cadence(payload.cadence)?,
    };

    let (goal, created) = state.coach.create_goal(&user_id, new, Utc::now()).await?;
    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(goal)))
}

/// Partially update a goal.
pub async fn update_goal(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<UpdateGoalRequest>,
) -> Result<Json<Goal>> {
    let user_id = require_user_id(payload.user_id)?;
    let patch = GoalPatch {
        title: payload.title,
        category: payload.category,
        cadence: parse_cadence(payload.cadence)?,
        active: payload.active,
    };
    let goal = state
        .coach
        .update_goal(&user_id, &id, patch, Utc::now())
        .await?;
    Ok(Json(goal))
}

/// Hard-delete a goal. The user id may come from the query string or the body.
pub async fn delete_goal(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<GoalQuery>,
    body: Option<Json<UserRequest>>,
) -> Result<Json<DeleteResponse>> {
    let user_id = require_user_id(query.user_id.or(body.and_then(|Json(b)| b.user_id)))?;
    let deleted = state.coach.delete_goal(&user_id, &id).await;
    if deleted == 0 {
        return Err(Error::NotFound("Goal not found".to_string()));
    }
    Ok(Json(DeleteResponse {
        success: true,
        deleted,
    }))
}

/// Hard-delete every goal with the given title.
pub async fn delete_goals_by_title(
    State(state): State<AppState>,
    Query(query): Query<GoalQuery>,
) -> Result<Json<DeleteResponse>> {
    let user_id = require_user_id(query.user_id)?;
    let title = query
        .title
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| Error::Validation("title is required".to_string()))?;
    let deleted = state.coach.delete_goal_by_title(&user_id, &title).await;
    Ok(Json(DeleteResponse {
        success: true,
        deleted,
    }))
}
