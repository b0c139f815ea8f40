//! Latest-mood derivation
//!
//! A pure function of the latest session's five sub-scores. Thresholds are
//! checked in a fixed priority order and the first match wins; a session with
//! no saved analysis is treated as all fives.

use super::LatestMood;
use crate::store::MoodAnalysis;

pub const STATUS_HAPPY: &str = "Happy";
pub const STATUS_ANXIOUS: &str = "Anxious";
pub const STATUS_SAD: &str = "Sad";
pub const STATUS_STRESSED: &str = "Stressed";
pub const STATUS_CONFIDENT: &str = "Confident";
pub const STATUS_STABLE: &str = "Stable";

pub const TREND_IMPROVING: &str = "Improving";
pub const TREND_NEEDS_ATTENTION: &str = "Needs attention";
pub const TREND_STABLE: &str = "Stable";

/// Priority order: happiness, anxiety, sadness, stress, confidence.
pub fn derive_latest_mood(mood: Option<&MoodAnalysis>) -> LatestMood {
    let neutral = MoodAnalysis::neutral();
    let m = mood.unwrap_or(&neutral);

    let status = if m.happiness > 7 {
        STATUS_HAPPY
    } else if m.anxiety > 7 {
        STATUS_ANXIOUS
    } else if m.sadness > 7 {
        STATUS_SAD
    } else if m.stress > 7 {
        STATUS_STRESSED
    } else if m.confidence > 7 {
        STATUS_CONFIDENT
    } else {
        STATUS_STABLE
    };

    let trend = if m.happiness > 7 {
        TREND_IMPROVING
    } else if m.anxiety > 7 || m.sadness > 7 || m.stress > 7 {
        TREND_NEEDS_ATTENTION
    } else {
        TREND_STABLE
    };

    LatestMood {
        status: status.to_string(),
        trend: trend.to_string(),
    }
}
