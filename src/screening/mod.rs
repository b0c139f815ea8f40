//! Per-message safety screening
//!
//! Two deliberately independent policies:
//! - Crisis keyword detection runs on every inbound message before any model
//!   call and short-circuits the chat turn with a fixed supportive response.
//! - The numeric alert policy runs when a session's mood analysis is saved
//!   and flags sustained distress from the raw sub-scores.
//!
//! Neither policy shares thresholds with the dashboard aggregator's
//! model-derived concern level; the fast deterministic guard always runs first.

use crate::store::MoodAnalysis;

/// Case-insensitive substring matches that trigger the crisis short-circuit.
const CRISIS_KEYWORDS: &[&str] = &[
    "kill myself",
    "want to die",
    "end my life",
    "hurt myself",
    "hurting myself",
    "suicide",
    "suicidal",
    "cutting myself",
    "better off dead",
    "no reason to live",
    "someone is hurting me",
    "someone touched me",
    "they hit me",
];

/// Phrases that mark a saved session as concerning even when scores are mild.
const CONCERNING_PHRASES: &[&str] = &[
    "nobody likes me",
    "i hate myself",
    "everyone hates me",
    "i can't do anything right",
    "i'm so scared",
    "i don't want to go home",
    "i can't sleep",
    "nothing matters",
];

/// Phrases that escalate a session alert to high on their own.
const SEVERE_PHRASES: &[&str] = &["hurt myself", "run away from home", "stop eating", "hate my life"];

/// Fixed supportive response returned on a crisis match. The general chat
/// model is never called for that turn.
pub const CRISIS_RESPONSE: &str = "I'm really glad you told me how you're feeling. \
What you're going through sounds really hard, and you deserve support from a \
grown-up you trust right away. Please talk to your parent, a teacher, or another \
trusted adult about this. If you ever feel unsafe, you can call or text 988 \
(the Suicide & Crisis Lifeline) any time. I care about you, and you are not alone.";

/// Severity of a saved-session alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertLevel {
    Medium,
    High,
}

impl AlertLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertLevel::Medium => "medium",
            AlertLevel::High => "high",
        }
    }
}

/// True when the message contains crisis language and must bypass the model.
pub fn detect_crisis(message: &str) -> bool {
    let lower = message.to_lowercase();
    CRISIS_KEYWORDS.iter().any(|kw| lower.contains(kw))
}

/// Numeric alert policy for a saved session.
///
/// An alert fires when anxiety, stress, or sadness reaches 7, when both
/// happiness and confidence collapse to 2 or below, or when the session text
/// matches a concerning phrase. Level is high when any sub-score reaches 8,
/// happiness or confidence drops to 1 or below, or a severe phrase matches;
/// otherwise medium.
pub fn evaluate_session(mood: &MoodAnalysis, session_text: &str) -> Option<AlertLevel> {
    let lower = session_text.to_lowercase();

    let score_alert = mood.anxiety >= 7
        || mood.stress >= 7
        || mood.sadness >= 7
        || (mood.happiness <= 2 && mood.confidence <= 2);
    let phrase_alert = CONCERNING_PHRASES.iter().any(|p| lower.contains(p));

    if !score_alert && !phrase_alert {
        return None;
    }

    let severe_score = [mood.happiness, mood.anxiety, mood.sadness, mood.stress, mood.confidence]
        .iter()
        .any(|&s| s >= 8);
    let severe = severe_score
        || mood.happiness <= 1
        || mood.confidence <= 1
        || SEVERE_PHRASES.iter().any(|p| lower.contains(p));

    if severe {
        Some(AlertLevel::High)
    } else {
        Some(AlertLevel::Medium)
    }
}
