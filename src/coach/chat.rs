//! Free-form chat.
//!
//! A message goes to today's check-in when one is waiting for a reply; otherwise it
//! is asked on the user's conversation thread. The AI call never runs under the
//! user's state lock, so the scheduler is not held up by a slow provider.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{Coach, Fact};
use crate::outbox::MessageKind;
use crate::providers::{self, split_reply, ThreadRegistry};

pub const FALLBACK_REPLY: &str =
    "Sorry, I'm having trouble answering right now. Let's pick this up again in a moment.";

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "route", rename_all = "snake_case")]
pub enum ChatResponse {
    Checkin {
        message: String,
    },
    Assistant {
        main: String,
        question: String,
        fallback: bool,
    },
}

pub async fn converse(
    coach: &Coach,
    threads: &ThreadRegistry,
    user_id: &str,
    query: &str,
    health_data: Option<&serde_json::Value>,
    now: DateTime<Utc>,
) -> ChatResponse {
    if let Some(message) = coach.handle_reply(user_id, query, now).await {
        return ChatResponse::Checkin { message };
    }

    match ask(coach, threads, user_id, query, health_data).await {
        Ok(full) => {
            let reply = split_reply(&full);
            if !reply.main.is_empty() {
                coach.deliver(user_id, &reply.main, MessageKind::Chat);
            }
            if !reply.question.is_empty() {
                coach.deliver(user_id, &reply.question, MessageKind::Chat);
            }
            ChatResponse::Assistant {
                main: reply.main,
                question: reply.question,
                fallback: false,
            }
        }
        Err(e) => {
            tracing::warn!(user_id, "Chat completion failed: {}", e);
            coach.deliver(user_id, FALLBACK_REPLY, MessageKind::Chat);
            ChatResponse::Assistant {
                main: FALLBACK_REPLY.to_string(),
                question: String::new(),
                fallback: true,
            }
        }
    }
}

async fn ask(
    coach: &Coach,
    threads: &ThreadRegistry,
    user_id: &str,
    query: &str,
    health_data: Option<&serde_json::Value>,
) -> providers::Result<String> {
    let thread = threads.get_or_create(user_id).await;
    let mut thread = thread.lock().await;

    if thread.ensure().await? {
        let facts = coach.facts(user_id).await;
        if !facts.is_empty() {
            thread.append_context(&facts_context(&facts)).await?;
        }
    }

    let prompt = match health_data {
        Some(data) if !data.is_null() => format!("{}\n\nMy health data: {}", query, data),
        _ => query.to_string(),
    };
    thread.ask(&prompt).await
}

fn facts_context(facts: &[Fact]) -> String {
    let lines: Vec<String> = facts
        .iter()
        .map(|f| match &f.value {
            Some(value) => format!("- {}: {} ({})", f.topic, f.fact, value),
            None => format!("- {}: {}", f.topic, f.fact),
        })
        .collect();
    format!("Known facts about me:\n{}", lines.join("\n"))
}
