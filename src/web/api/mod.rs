//! API endpoints module.

pub mod debug;
pub mod facts;
pub mod goals;
pub mod messages;
pub mod prefs;
pub mod progress;

pub use debug::{scheduler_state, seed_goal, trigger_checkin_now};
pub use facts::{add_fact, delete_fact, list_facts};
pub use goals::{create_goal, delete_goal, delete_goals_by_title, list_goals, update_goal};
pub use messages::{chat, drain_pending, enqueue_pending, reset_thread, stream_messages};
pub use prefs::{get_prefs, set_prefs};
pub use progress::{check_in, daily_notification, generate_plan, monthly_report, new_daily_task};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Body or query carrying only a user id.
#[derive(Deserialize, Default)]
pub struct UserRequest {
    pub user_id: Option<String>,
}

#[derive(Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

impl SuccessResponse {
    pub fn ok() -> Self {
        Self { success: true }
    }
}

pub(crate) fn require_user_id(user_id: Option<String>) -> Result<String> {
    user_id
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .ok_or_else(|| Error::Validation("user_id is required".to_string()))
}
