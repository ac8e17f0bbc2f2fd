//! Static habit catalog: focus areas, task tiers, progression chains and tips.

use rand::seq::SliceRandom;

/// Focus areas in their canonical order.
pub const FOCUS_AREAS: [&str; 7] = [
    "Physical Health",
    "Nutrition",
    "Sleep & Recovery",
    "Emotional Health",
    "Social Connection",
    "Habits",
    "Medical History",
];

/// Tier lists per focus area. Index 0 is difficulty 1.
const HABIT_MAP: &[(&str, [&str; 3])] = &[
    (
        "Physical Health",
        [
            "Stretch every morning",
            "Stretch every morning and walk 5 minutes",
            "Morning yoga session (10 min)",
        ],
    ),
    (
        "Nutrition",
        [
            "Eat one extra vegetable",
            "Eat two extra vegetables",
            "One plant-based meal per day",
        ],
    ),
    (
        "Sleep & Recovery",
        [
            "Sleep 7+ hours",
            "Sleep 8+ hours",
            "No screens 1 hour before bed",
        ],
    ),
    (
        "Emotional Health",
        [
            "Meditate 5 minutes",
            "Meditate 10 minutes",
            "Gratitude journaling + 10 min meditation",
        ],
    ),
    (
        "Social Connection",
        [
            "Message one friend",
            "Plan a social outing",
            "Attend a group event or meetup",
        ],
    ),
    (
        "Habits",
        [
            "Use a habit tracker daily",
            "Set visual cues for habits",
            "Maintain a daily consistency journal",
        ],
    ),
    (
        "Medical History",
        [
            "Daily health logging",
            "Monitor vitals weekly",
            "Consult a professional for screening",
        ],
    ),
];

/// Progression chains keyed by task identity. A task graduates through its own variants.
pub const PROGRESSIONS: &[(&str, [&str; 3])] = &[
    (
        "Stretch every morning",
        [
            "Stretch every morning for 5 minutes",
            "Stretch every morning and do 5 pushups",
            "Stretch and short walk every morning",
        ],
    ),
    (
        "Eat one extra vegetable",
        [
            "Eat two extra vegetables",
            "Eat one salad per day",
            "Eat plant-based for one meal per day",
        ],
    ),
    (
        "Sleep 7+ hours",
        [
            "Sleep 8+ hours",
            "Sleep 8 hours and wake up consistently",
            "No screens 1 hour before bed",
        ],
    ),
];

const TIPS: &[(&str, [&str; 2])] = &[
    (
        "Physical Health",
        ["Do 10 jumping jacks right now", "Stretch your shoulders while standing"],
    ),
    (
        "Nutrition",
        ["Add a fruit to one meal today", "Drink water before meals"],
    ),
    (
        "Sleep & Recovery",
        ["Turn off screens 30 minutes earlier", "Dim the lights after sunset"],
    ),
    (
        "Emotional Health",
        ["Take 5 slow breaths now", "Write one thing you're grateful for"],
    ),
    (
        "Social Connection",
        [
            "Text someone you haven't talked to in a while",
            "Invite someone to a quick chat",
        ],
    ),
    (
        "Habits",
        ["Use a reminder app today", "Visualize yourself succeeding tonight"],
    ),
    (
        "Medical History",
        ["Check your posture for 30 seconds", "Note any symptoms in your log"],
    ),
];

const FALLBACK_TIP: &str = "Do one thing today that aligns with your goals";

/// Default self-assessment scores; lower means weaker and is coached first.
pub const DEFAULT_SCORES: [(&str, i32); 7] = [
    ("Physical Health", 5),
    ("Nutrition", 7),
    ("Sleep & Recovery", 8),
    ("Emotional Health", 9),
    ("Social Connection", 4),
    ("Habits", 3),
    ("Medical History", 10),
];

/// Tier list for a focus area, or an empty slice for unknown areas.
pub fn tasks_for(focus_area: &str) -> &'static [&'static str] {
    HABIT_MAP
        .iter()
        .find(|(area, _)| *area == focus_area)
        .map(|(_, tasks)| tasks.as_slice())
        .unwrap_or(&[])
}

/// Task at a 1-based difficulty tier.
pub fn task_at(focus_area: &str, difficulty: u8) -> Option<&'static str> {
    let index = usize::from(difficulty).checked_sub(1)?;
    tasks_for(focus_area).get(index).copied()
}

/// First-tier task of a focus area.
pub fn first_task(focus_area: &str) -> Option<&'static str> {
    tasks_for(focus_area).first().copied()
}

/// A task's own progression chain, if it has one.
pub fn progression_for(task: &str) -> Option<&'static [&'static str]> {
    PROGRESSIONS
        .iter()
        .find(|(base, _)| *base == task)
        .map(|(_, chain)| chain.as_slice())
}

/// Next task in `current_task`'s own progression chain.
///
/// Falls back to the focus area's first tier when the task has no chain, and to
/// `current_task` itself when the focus area is unknown. Never fails.
pub fn get_next_task(current_task: &str, focus_area: &str, _difficulty: u8) -> String {
    let fallback = || {
        first_task(focus_area)
            .unwrap_or(current_task)
            .to_string()
    };

    let Some(options) = progression_for(current_task).filter(|o| !o.is_empty()) else {
        return fallback();
    };

    let next_index = match options.iter().position(|t| *t == current_task) {
        Some(i) => (i + 1) % options.len(),
        None => 0,
    };
    options[next_index].to_string()
}

/// Every task reachable through a progression chain, deduplicated.
pub fn all_progression_tasks() -> Vec<&'static str> {
    let mut tasks: Vec<&'static str> = PROGRESSIONS
        .iter()
        .flat_map(|(_, chain)| chain.iter().copied())
        .collect();
    tasks.sort_unstable();
    tasks.dedup();
    tasks
}

/// Pick a replacement daily task different from `previous_task` when possible.
pub fn new_daily_task(previous_task: &str) -> String {
    let candidates: Vec<&str> = all_progression_tasks()
        .into_iter()
        .filter(|t| *t != previous_task)
        .collect();

    candidates
        .choose(&mut rand::thread_rng())
        .map(|t| t.to_string())
        .unwrap_or_else(|| previous_task.to_string())
}

/// Tip set for a focus area.
pub fn tips_for(focus_area: &str) -> &'static [&'static str] {
    TIPS.iter()
        .find(|(area, _)| *area == focus_area)
        .map(|(_, tips)| tips.as_slice())
        .unwrap_or(&[FALLBACK_TIP])
}

/// Random contextual tip for a focus area.
pub fn random_tip(focus_area: &str) -> String {
    tips_for(focus_area)
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(FALLBACK_TIP)
        .to_string()
}
