//! API endpoints for user facts.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};

use super::{require_user_id, SuccessResponse};
use crate::coach::Fact;
use crate::error::{Error, Result};
use crate::web::AppState;

#[derive(Deserialize, Default)]
pub struct FactInput {
    pub topic: Option<String>,
    #[serde(default)]
    pub fact: String,
    pub value: Option<String>,
    pub confidence: Option<f32>,
}

#[derive(Deserialize)]
pub struct AddFactRequest {
    pub user_id: Option<String>,
    pub fact: Option<FactInput>,
}

#[derive(Serialize)]
pub struct DeleteFactResponse {
    pub success: bool,
    pub deleted: usize,
}

pub async fn list_facts(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Json<Vec<Fact>> {
    Json(state.coach.facts(&user_id).await)
}

pub async fn add_fact(
    State(state): State<AppState>,
    Json(payload): Json<AddFactRequest>,
) -> Result<Json<SuccessResponse>> {
    let user_id = require_user_id(payload.user_id)?;
    let input = payload
        .fact
        .ok_or_else(|| Error::Validation("Must provide user_id and fact with topic".to_string()))?;
    let topic = input
        .topic
        .ok_or_else(|| Error::Validation("Must provide user_id and fact with topic".to_string()))?;

    state
        .coach
        .add_fact(
            &user_id,
            Fact {
                topic,
                fact: input.fact,
                value: input.value,
                confidence: input.confidence,
            },
        )
        .await?;
    Ok(Json(SuccessResponse::ok()))
}

pub async fn delete_fact(
    State(state): State<AppState>,
    Path((user_id, topic)): Path<(String, String)>,
) -> Json<DeleteFactResponse> {
    let deleted = state.coach.delete_facts(&user_id, &topic).await;
    Json(DeleteFactResponse {
        success: true,
        deleted,
    })
}
