//! Free-text reply normalization for check-in conversations.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::habits::CheckinStatus;

/// Canonical reading of a free-text check-in reply.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReplyStatus {
    Done,
    Miss,
    Unclear,
}

impl ReplyStatus {
    /// Engine status for a clear reply.
    pub fn to_checkin(self) -> Option<CheckinStatus> {
        match self {
            ReplyStatus::Done => Some(CheckinStatus::Done),
            ReplyStatus::Miss => Some(CheckinStatus::Miss),
            ReplyStatus::Unclear => None,
        }
    }
}

const YES_WORDS: &[&str] = &[
    "yes", "y", "yeah", "yea", "yep", "yup", "done", "did", "completed", "complete",
    "finished", "sure", "ok", "okay", "absolutely", "definitely", "totally", "accomplished",
];

const NO_WORDS: &[&str] = &[
    "no", "n", "nope", "nah", "not", "cannot", "miss", "missed", "skip", "skipped", "failed",
    "forgot", "never",
];

/// Auxiliaries whose `n't` (or apostrophe-less `nt`) form negates the reply.
/// "can't" and "won't" contract to "ca" and "wo".
const NEGATED_AUXILIARIES: &[&str] = &[
    "did", "do", "does", "have", "has", "had", "could", "ca", "can", "was", "were", "wo",
    "would", "should", "is", "are",
];

/// Multi-word or symbolic patterns, matched as substrings.
const YES_PHRASES: &[&str] = &["got it done", "did it", "i did", "✅", "👍", "💪", "✔"];

const NO_PHRASES: &[&str] = &["did not", "not today", "no luck", "❌", "👎", "✖"];

fn token_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[a-z0-9]+(?:['’][a-z]+)?").expect("valid token regex"))
}

fn is_negated_auxiliary(word: &str) -> bool {
    word.strip_suffix("n't")
        .or_else(|| word.strip_suffix("nt"))
        .is_some_and(|stem| NEGATED_AUXILIARIES.contains(&stem))
}

fn tokens(lowered: &str) -> Vec<String> {
    token_pattern()
        .find_iter(lowered)
        .map(|m| m.as_str().replace('’', "'"))
        .collect()
}

/// Map a reply to done, miss or unclear.
///
/// Words are matched as whole tokens so "knowledge" never reads as "no".
/// Negative patterns are checked first: "i did not" is a miss.
pub fn normalize_checkin_status(text: &str) -> ReplyStatus {
    let lowered = text.trim().to_lowercase();
    match lowered.as_str() {
        "done" => return ReplyStatus::Done,
        "miss" => return ReplyStatus::Miss,
        _ => {}
    }

    if NO_PHRASES.iter().any(|p| lowered.contains(p)) {
        return ReplyStatus::Miss;
    }

    let words = tokens(&lowered);
    let has = |set: &[&str]| words.iter().any(|w| set.contains(&w.as_str()));

    if has(NO_WORDS) || words.iter().any(|w| is_negated_auxiliary(w)) {
        return ReplyStatus::Miss;
    }
    if has(YES_WORDS) || YES_PHRASES.iter().any(|p| lowered.contains(p)) {
        return ReplyStatus::Done;
    }
    ReplyStatus::Unclear
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literals_short_circuit() {
        assert_eq!(normalize_checkin_status("done"), ReplyStatus::Done);
        assert_eq!(normalize_checkin_status("miss"), ReplyStatus::Miss);
        assert_eq!(normalize_checkin_status("  DONE "), ReplyStatus::Done);
    }

    #[test]
    fn test_yes_forms() {
        for reply in ["Yes!", "yep, finished it", "I did it", "👍", "ok", "Completed ✅"] {
            assert_eq!(normalize_checkin_status(reply), ReplyStatus::Done, "{}", reply);
        }
    }

    #[test]
    fn test_no_forms() {
        for reply in ["didn't", "I didn’t get to it", "no thanks", "Nope", "not today 👎", "I did not"] {
            assert_eq!(normalize_checkin_status(reply), ReplyStatus::Miss, "{}", reply);
        }
    }

    #[test]
    fn test_negated_completion_is_a_miss() {
        for reply in [
            "I haven't done it",
            "I couldn't complete it",
            "I haven't finished yet",
            "I don't think so",
            "wasn't able to, done for today",
            "can't, sorry",
            "I won't get it done",
            "hasnt happened",
            "I cannot finish it",
        ] {
            assert_eq!(normalize_checkin_status(reply), ReplyStatus::Miss, "{}", reply);
        }
    }

    #[test]
    fn test_words_ending_in_nt_are_not_negations() {
        for reply in ["I went for it, done", "want more, completed", "yes, meant it"] {
            assert_eq!(normalize_checkin_status(reply), ReplyStatus::Done, "{}", reply);
        }
    }

    #[test]
    fn test_no_substring_false_positives() {
        for reply in ["knowledge", "question", "nothing comes to mind", "I'm thinking", "snow"] {
            assert_eq!(normalize_checkin_status(reply), ReplyStatus::Unclear, "{}", reply);
        }
    }

    #[test]
    fn test_embedded_yes_words_do_not_match() {
        // "did" inside "candidate", "ok" inside "token", "done" inside "abandoned".
        assert_eq!(
            normalize_checkin_status("candidate token abandoned"),
            ReplyStatus::Unclear
        );
    }

    #[test]
    fn test_to_checkin() {
        assert_eq!(ReplyStatus::Done.to_checkin(), Some(CheckinStatus::Done));
        assert_eq!(ReplyStatus::Unclear.to_checkin(), None);
    }
}
