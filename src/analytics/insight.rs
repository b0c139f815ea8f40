//! Narrative insight synthesis
//!
//! The qualitative half of the dashboard: the bounded recent-session sample is
//! reduced to digests, submitted in a fixed-schema JSON-mode prompt, and the
//! response is parsed into strict types. Malformed payloads are rejected here,
//! at the boundary, instead of being defaulted deep in the assembly code.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::llm::{ChatMessage, ChatOptions, LanguageModel};
use crate::store::{MoodAnalysis, SessionRow};

/// The three fixed goal categories, in presentation order.
pub const GOAL_TYPES: [&str; 3] = ["This Week", "Ongoing", "If Needed"];

/// Sampling temperature for the analysis call. Kept low for determinism.
const INSIGHT_TEMPERATURE: f32 = 0.2;

const INSIGHT_PROMPT: &str = r#"You are a child-therapy analyst reviewing recent AI companion sessions for a parent dashboard. The user message contains a JSON array of recent sessions (newest first), each with date, duration, mood scores (0-10), topics, and message text.

Respond with a single JSON object with exactly these fields:
- "emotional_trend": {"direction": "improving"|"declining"|"stable", "needs_attention": boolean, "key_factors": [strings]}
- "active_concerns": {"count": integer, "level": "low"|"moderate"|"high_priority", "concerns": [strings]}
- "communication_insights": array of {"topic": string, "confidence_score": integer 0-100, "observation": string}
- "growth_development_insights": [strings]
- "family_communication_summary": string
- "conversation_organization": string summarizing how conversations are structured by theme
- "family_wellness_tips": [strings]
- "family_communication_goals": exactly three objects {"goal_type": string, "description": string} with goal_type values "This Week", "Ongoing", "If Needed" in that order

Write for a caring parent, never alarmist, and ground every observation in the provided sessions."#;

/// Reduced per-session payload sent to the model.
#[derive(Debug, Serialize)]
struct SessionDigest<'a> {
    date: String,
    duration_seconds: i64,
    mood_analysis: Option<&'a MoodAnalysis>,
    topics: &'a [String],
    child_message: &'a str,
    companion_response: &'a str,
}

// ============================================
// RESPONSE SCHEMA
// ============================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionInsights {
    pub emotional_trend: EmotionalTrend,
    pub active_concerns: ActiveConcerns,
    pub communication_insights: Vec<CommunicationInsight>,
    pub growth_development_insights: Vec<String>,
    pub family_communication_summary: String,
    pub conversation_organization: String,
    pub family_wellness_tips: Vec<String>,
    pub family_communication_goals: Vec<FamilyGoal>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmotionalTrend {
    pub direction: TrendDirection,
    pub needs_attention: bool,
    pub key_factors: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Improving,
    Declining,
    Stable,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActiveConcerns {
    pub count: i64,
    pub level: ConcernLevel,
    pub concerns: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConcernLevel {
    Low,
    Moderate,
    HighPriority,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommunicationInsight {
    pub topic: String,
    pub confidence_score: u8,
    pub observation: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FamilyGoal {
    pub goal_type: String,
    pub description: String,
}

// ============================================
// CALL + VALIDATION
// ============================================

/// Submit the recent-session sample and parse the structured response.
pub async fn request_insights(
    model: &dyn LanguageModel,
    recent_sessions: &[SessionRow],
) -> Result<SessionInsights> {
    let digests: Vec<SessionDigest> = recent_sessions
        .iter()
        .map(|s| SessionDigest {
            date: s.created_at.to_rfc3339(),
            duration_seconds: s.session_duration,
            mood_analysis: s.mood_analysis.as_ref(),
            topics: &s.topics,
            child_message: &s.user_message,
            companion_response: &s.ai_response,
        })
        .collect();

    let payload = serde_json::to_string(&digests).context("serializing session digests")?;
    let messages = [
        ChatMessage::system(INSIGHT_PROMPT),
        ChatMessage::user(payload),
    ];

    let raw = model
        .chat(
            &messages,
            ChatOptions {
                temperature: Some(INSIGHT_TEMPERATURE),
                json: true,
            },
        )
        .await
        .context("insight synthesis call failed")?;

    parse_insights(&raw)
}

/// Parse and validate a raw insight payload.
pub fn parse_insights(raw: &str) -> Result<SessionInsights> {
    let insights: SessionInsights =
        serde_json::from_str(raw).context("malformed insight payload")?;

    if insights.family_communication_goals.len() != GOAL_TYPES.len() {
        bail!(
            "insight payload returned {} communication goals, expected {}",
            insights.family_communication_goals.len(),
            GOAL_TYPES.len()
        );
    }
    for (goal, expected) in insights.family_communication_goals.iter().zip(GOAL_TYPES) {
        if goal.goal_type != expected {
            bail!(
                "insight payload goal_type '{}' where '{}' was expected",
                goal.goal_type,
                expected
            );
        }
    }

    for insight in &insights.communication_insights {
        if insight.confidence_score > 100 {
            bail!(
                "insight payload confidence_score {} out of range",
                insight.confidence_score
            );
        }
    }

    Ok(insights)
}
