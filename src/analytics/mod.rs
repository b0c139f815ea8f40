//! Dashboard analytics aggregation
//!
//! Rebuilds the single denormalized per-child dashboard row: exact statistics
//! are counted fresh from the store, narrative insights come from one
//! JSON-mode model call over the bounded recent-session sample, and the
//! latest-mood label is a pure function of the newest session's scores.
//!
//! The statistics/narrative split is deliberate: weekly and total counts are
//! uncapped COUNT queries, while average duration and everything qualitative
//! only see the most recent ten sessions (bounded prompt size and cost).
//! Any failure aborts the whole recalculation; there is no partial write and
//! no retry. Concurrent refreshes for the same child are last-write-wins.

pub mod insight;
pub mod mood;

use anyhow::{bail, Result};
use chrono::{DateTime, Datelike, Duration, Local, LocalResult, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::llm::LanguageModel;
use crate::store::{SessionRow, SqliteStore};

pub use insight::{
    ActiveConcerns, CommunicationInsight, ConcernLevel, EmotionalTrend, FamilyGoal,
    SessionInsights, TrendDirection,
};

/// Sessions fed to the narrative-analysis call. Older history is invisible to
/// the qualitative model once it falls outside this window.
pub const NARRATIVE_SAMPLE_SIZE: usize = 10;

// ============================================
// RECORD TYPES
// ============================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LatestMood {
    pub status: String,
    pub trend: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionsAnalytics {
    pub sessions_this_week: i64,
    pub total_sessions: i64,
    /// Mean over the bounded recent sample, not all sessions
    pub average_duration_seconds: i64,
    pub last_session_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardAlerts {
    pub has_alert: bool,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// The full per-child dashboard row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardRecord {
    pub child_id: String,
    pub family_id: String,
    pub latest_mood: LatestMood,
    pub sessions_analytics: SessionsAnalytics,
    pub emotional_trend: EmotionalTrend,
    pub active_concerns: ActiveConcerns,
    pub alerts: DashboardAlerts,
    pub communication_insights: Vec<CommunicationInsight>,
    pub growth_development_insights: Vec<String>,
    pub family_communication_summary: String,
    pub conversation_organization: String,
    pub family_wellness_tips: Vec<String>,
    pub family_communication_goals: Vec<FamilyGoal>,
    pub updated_at: DateTime<Utc>,
}

// ============================================
// AGGREGATOR
// ============================================

pub struct Aggregator<'a> {
    store: &'a SqliteStore,
    model: &'a dyn LanguageModel,
}

impl<'a> Aggregator<'a> {
    pub fn new(store: &'a SqliteStore, model: &'a dyn LanguageModel) -> Self {
        Self { store, model }
    }

    /// Recompute and upsert the dashboard row for one child.
    ///
    /// `latest_session` must be a persisted session for `child_id`; callers
    /// fetch it (typically the most recent one) before triggering a refresh.
    pub async fn refresh(
        &self,
        child_id: &str,
        latest_session: &SessionRow,
        family_id: &str,
    ) -> Result<DashboardRecord> {
        let total_sessions = self.store.count_sessions(child_id)?;
        if total_sessions == 0 {
            bail!("child {child_id} has no recorded sessions; refusing to build an empty dashboard");
        }

        let week_start = start_of_week(Local::now());
        let sessions_this_week = self.store.count_sessions_since(child_id, week_start)?;

        let recent = self.store.recent_sessions(child_id, NARRATIVE_SAMPLE_SIZE)?;
        let average_duration_seconds = mean_duration(&recent);

        let insights = insight::request_insights(self.model, &recent).await?;

        let latest_mood = mood::derive_latest_mood(latest_session.mood_analysis.as_ref());
        let alerts = derive_alerts(&insights.active_concerns);

        // Statistics computed above are ground truth; the strict insight
        // schema already dropped anything the model said about counts.
        let record = DashboardRecord {
            child_id: child_id.to_string(),
            family_id: family_id.to_string(),
            latest_mood,
            sessions_analytics: SessionsAnalytics {
                sessions_this_week,
                total_sessions,
                average_duration_seconds,
                last_session_at: latest_session.created_at,
            },
            emotional_trend: insights.emotional_trend,
            active_concerns: insights.active_concerns,
            alerts,
            communication_insights: insights.communication_insights,
            growth_development_insights: insights.growth_development_insights,
            family_communication_summary: insights.family_communication_summary,
            conversation_organization: insights.conversation_organization,
            family_wellness_tips: insights.family_wellness_tips,
            family_communication_goals: insights.family_communication_goals,
            updated_at: Utc::now(),
        };

        self.store.upsert_analytics(&record)?;
        Ok(record)
    }
}

/// Dashboard alert flag comes strictly from the model's own concern level.
/// The per-message numeric screening in `screening` is a separate, stricter
/// layer with its own thresholds.
fn derive_alerts(concerns: &ActiveConcerns) -> DashboardAlerts {
    if concerns.level == ConcernLevel::HighPriority {
        DashboardAlerts {
            has_alert: true,
            title: Some("High-priority concerns flagged".to_string()),
            description: concerns.concerns.first().cloned(),
        }
    } else {
        DashboardAlerts {
            has_alert: false,
            title: None,
            description: None,
        }
    }
}

/// Mean session duration over the recent sample, rounded to nearest second.
fn mean_duration(sessions: &[SessionRow]) -> i64 {
    if sessions.is_empty() {
        return 0;
    }
    let sum: i64 = sessions.iter().map(|s| s.session_duration).sum();
    (sum as f64 / sessions.len() as f64).round() as i64
}

/// Most recent Sunday at 00:00 server-local time, as a UTC instant.
pub fn start_of_week(now: DateTime<Local>) -> DateTime<Utc> {
    let midnight = week_start_date(now.date_naive()).and_time(NaiveTime::MIN);
    match midnight.and_local_timezone(Local) {
        LocalResult::Single(dt) => dt.with_timezone(&Utc),
        LocalResult::Ambiguous(dt, _) => dt.with_timezone(&Utc),
        // DST gap at midnight: fall back to treating it as UTC
        LocalResult::None => Utc.from_utc_datetime(&midnight),
    }
}

fn week_start_date(today: NaiveDate) -> NaiveDate {
    today - Duration::days(today.weekday().num_days_from_sunday() as i64)
}
