//! API endpoints for check-in preferences.

use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::{require_user_id, UserRequest};
use crate::error::Result;
use crate::scheduler::Preferences;
use crate::web::AppState;

#[derive(Deserialize)]
pub struct PrefsRequest {
    pub user_id: Option<String>,
    pub tz: Option<String>,
    pub checkin_time: Option<String>,
    pub channels: Option<BTreeSet<String>>,
}

#[derive(Serialize)]
pub struct PrefsResponse {
    pub success: bool,
    pub prefs: Preferences,
}

/// Current preferences, or the configured defaults when none are stored.
pub async fn get_prefs(
    State(state): State<AppState>,
    Query(query): Query<UserRequest>,
) -> Result<Json<Preferences>> {
    let user_id = require_user_id(query.user_id)?;
    Ok(Json(state.coach.preferences(&user_id).await))
}

/// Replace preferences. Omitted fields take the configured defaults.
pub async fn set_prefs(
    State(state): State<AppState>,
    Json(payload): Json<PrefsRequest>,
) -> Result<Json<PrefsResponse>> {
    let user_id = require_user_id(payload.user_id)?;
    let defaults = &state.settings.scheduler;
    let prefs = Preferences {
        tz: payload
            .tz
            .unwrap_or_else(|| defaults.default_timezone.clone()),
        checkin_time: payload
            .checkin_time
            .unwrap_or_else(|| defaults.default_checkin_time.clone()),
        channels: payload.channels.unwrap_or_default(),
    };

    let prefs = state.coach.set_preferences(&user_id, prefs).await?;
    Ok(Json(PrefsResponse {
        success: true,
        prefs,
    }))
}
