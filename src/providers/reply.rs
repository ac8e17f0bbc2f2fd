//! Split assistant replies into a main answer and a follow-up question.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
pub struct ChatReply {
    pub main: String,
    pub question: String,
}

fn fenced_json() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"```(?:json)?\s*(\{[\s\S]*?\})\s*```").expect("valid fenced json regex")
    })
}

fn trailing_question() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"([^\n?]+\?)\s*$").expect("valid question regex"))
}

fn json_candidate(text: &str) -> Option<&str> {
    if let Some(caps) = fenced_json().captures(text) {
        return caps.get(1).map(|m| m.as_str());
    }
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

#[derive(Deserialize)]
struct Payload {
    main: Option<String>,
    question: Option<String>,
}

/// Parse `{"main", "question"}` JSON (fenced or inline); otherwise split off a
/// trailing question sentence.
pub fn split_reply(full: &str) -> ChatReply {
    let text = full.trim();

    if let Some(candidate) = json_candidate(text) {
        if let Ok(payload) = serde_json::from_str::<Payload>(candidate) {
            let narrative = text
                .find(candidate)
                .map(|i| {
                    text[..i]
                        .trim_end()
                        .trim_end_matches("```json")
                        .trim_end_matches("```")
                        .trim()
                })
                .unwrap_or_default();
            return ChatReply {
                main: payload
                    .main
                    .map(|m| m.trim().to_string())
                    .unwrap_or_else(|| narrative.to_string()),
                question: payload.question.unwrap_or_default().trim().to_string(),
            };
        }
    }

    match trailing_question().captures(text).and_then(|c| c.get(1)) {
        Some(m) => ChatReply {
            main: text[..m.start()].trim().to_string(),
            question: m.as_str().trim().to_string(),
        },
        None => ChatReply {
            main: text.to_string(),
            question: String::new(),
        },
    }
}
