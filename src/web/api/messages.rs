//! Outbound message delivery and free-form chat.

use axum::{
    extract::{Path, Query, State},
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use chrono::Utc;
use futures::stream::{self, Stream};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

use super::{require_user_id, SuccessResponse};
use crate::coach::chat::{self, ChatResponse};
use crate::error::{Error, Result};
use crate::outbox::{MessageKind, OutboundMessage, Outbox};
use crate::web::AppState;

#[derive(Deserialize, Default)]
pub struct PendingQuery {
    #[serde(default)]
    pub wait: bool,
}

#[derive(Deserialize)]
pub struct EnqueueRequest {
    #[serde(default)]
    pub text: String,
    pub role: Option<String>,
    pub kind: Option<MessageKind>,
}

#[derive(Deserialize)]
pub struct ChatRequest {
    pub user_id: Option<String>,
    #[serde(default)]
    pub query: String,
    pub health_data: Option<serde_json::Value>,
}

/// Drain queued messages. With `wait=true`, hold the request open until a message
/// arrives or the long-poll window closes.
pub async fn drain_pending(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(query): Query<PendingQuery>,
) -> Json<Vec<OutboundMessage>> {
    let outbox = state.coach.outbox();
    let messages = if query.wait {
        let window = Duration::from_secs(state.settings.outbox.long_poll_seconds);
        outbox.wait_drain(&user_id, window).await
    } else {
        outbox.drain(&user_id)
    };
    Json(messages)
}

pub async fn enqueue_pending(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(payload): Json<EnqueueRequest>,
) -> Result<Json<SuccessResponse>> {
    if payload.text.trim().is_empty() {
        return Err(Error::Validation("text is required".to_string()));
    }
    let message = OutboundMessage::new(
        payload.role.as_deref().unwrap_or("assistant"),
        &payload.text,
        payload.kind.unwrap_or_default(),
    );
    state.coach.outbox().push(&user_id, message);
    Ok(Json(SuccessResponse::ok()))
}

fn message_stream(
    outbox: Arc<Outbox>,
    user_id: String,
    poll: Duration,
) -> impl Stream<Item = std::result::Result<Event, axum::Error>> {
    stream::unfold((outbox, user_id), move |(outbox, user_id)| async move {
        loop {
            if let Some(message) = outbox.next(&user_id, poll).await {
                let event = Event::default()
                    .event(match message.kind {
                        MessageKind::Checkin => "checkin",
                        MessageKind::Chat => "chat",
                        MessageKind::System => "system",
                    })
                    .id(message.id.clone())
                    .json_data(&message);
                return Some((event, (outbox, user_id)));
            }
        }
    })
}

/// Server-Sent Events feed of a user's messages. Messages stay queued while no
/// client is connected.
pub async fn stream_messages(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Sse<impl Stream<Item = std::result::Result<Event, axum::Error>>> {
    tracing::debug!(user_id = %user_id, "Message stream opened");
    let poll = Duration::from_millis(state.settings.outbox.poll_interval_ms.max(100));
    Sse::new(message_stream(state.coach.outbox().clone(), user_id, poll)).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("heartbeat"),
    )
}

/// Chat with the coach. Replies to an open check-in are handled without the AI.
pub async fn chat(
    State(state): State<AppState>,
    Json(payload): Json<ChatRequest>,
) -> Result<Json<ChatResponse>> {
    let user_id = require_user_id(payload.user_id)?;
    if payload.query.trim().is_empty() {
        return Err(Error::Validation("query is required".to_string()));
    }

    let response = chat::converse(
        &state.coach,
        &state.threads,
        &user_id,
        &payload.query,
        payload.health_data.as_ref(),
        Utc::now(),
    )
    .await;
    Ok(Json(response))
}

pub async fn reset_thread(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Json<SuccessResponse> {
    if state.threads.reset(&user_id).await {
        tracing::info!(user_id = %user_id, "Conversation thread reset");
    }
    Json(SuccessResponse::ok())
}
